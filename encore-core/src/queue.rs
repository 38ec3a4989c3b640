use std::{collections::VecDeque, sync::Arc};

use parking_lot::Mutex;

use crate::{ChannelId, CommandError, GuildId, Resolved, Store};

/// A single playable item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    /// The resolved, directly streamable source
    pub source: String,
    pub title: String,
    /// Where status messages about this track should be sent
    pub reply_to: ChannelId,
}

impl Track {
    pub fn new(resolved: Resolved, reply_to: ChannelId) -> Self {
        Self {
            source: resolved.source,
            title: resolved.title,
            reply_to,
        }
    }
}

/// The pending tracks of a guild, in play order.
/// The currently playing track is never part of the queue.
#[derive(Debug, Default)]
pub struct Queue {
    items: Mutex<VecDeque<Track>>,
}

impl Queue {
    /// Appends a track and returns its one-based position.
    pub fn push(&self, track: Track) -> usize {
        let mut items = self.items.lock();
        items.push_back(track);
        items.len()
    }

    pub fn pop(&self) -> Option<Track> {
        self.items.lock().pop_front()
    }

    /// Removes the track at the given one-based position.
    pub fn remove(&self, position: i64) -> Result<Track, CommandError> {
        let mut items = self.items.lock();
        let len = items.len();

        usize::try_from(position)
            .ok()
            .and_then(|p| p.checked_sub(1))
            .and_then(|index| items.remove(index))
            .ok_or(CommandError::Index {
                index: position,
                len,
            })
    }

    /// Empties the queue and returns how many tracks were dropped.
    pub fn clear(&self) -> usize {
        let mut items = self.items.lock();
        let amount = items.len();
        items.clear();
        amount
    }

    pub fn titles(&self) -> Vec<String> {
        self.items.lock().iter().map(|t| t.title.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

/// Maps guilds to their queues.
#[derive(Clone, Default)]
pub struct QueueStore {
    queues: Store<GuildId, Queue>,
}

impl QueueStore {
    pub fn get(&self, guild_id: GuildId) -> Option<Arc<Queue>> {
        self.queues.get(&guild_id).map(|q| q.clone())
    }

    pub fn insert(&self, guild_id: GuildId, queue: Arc<Queue>) {
        self.queues.insert(guild_id, queue);
    }

    /// Removes the queue of a guild, but only if it is still the given one.
    pub fn remove_if_same(&self, guild_id: GuildId, queue: &Arc<Queue>) -> bool {
        self.queues
            .remove_if(&guild_id, |_, q| Arc::ptr_eq(q, queue))
            .is_some()
    }

    /// A snapshot of the titles in a guild's queue. Empty if the guild has no queue.
    pub fn titles(&self, guild_id: GuildId) -> Vec<String> {
        self.get(guild_id).map(|q| q.titles()).unwrap_or_default()
    }

    pub fn contains(&self, guild_id: GuildId) -> bool {
        self.queues.contains_key(&guild_id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn track(title: &str) -> Track {
        Track {
            source: format!("https://cdn.example/{title}"),
            title: title.to_string(),
            reply_to: ChannelId::new(1),
        }
    }

    #[test]
    fn pops_in_insertion_order() {
        let queue = Queue::default();

        assert_eq!(queue.push(track("a")), 1);
        assert_eq!(queue.push(track("b")), 2);

        assert_eq!(queue.pop().map(|t| t.title), Some("a".to_string()));
        assert_eq!(queue.pop().map(|t| t.title), Some("b".to_string()));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn removes_by_one_based_position() {
        let queue = Queue::default();
        queue.push(track("a"));
        queue.push(track("b"));
        queue.push(track("c"));

        let removed = queue.remove(2).expect("position 2 exists");

        assert_eq!(removed.title, "b");
        assert_eq!(queue.titles(), vec!["a", "c"]);
    }

    #[test]
    fn out_of_range_removal_leaves_queue_untouched() {
        let queue = Queue::default();
        queue.push(track("a"));
        queue.push(track("b"));

        for position in [0, 3, -1, i64::MAX] {
            let error = queue.remove(position).expect_err("position is invalid");
            assert_eq!(
                error,
                CommandError::Index {
                    index: position,
                    len: 2
                }
            );
        }

        assert_eq!(queue.titles(), vec!["a", "b"]);
    }

    #[test]
    fn store_only_removes_matching_queue() {
        let store = QueueStore::default();
        let guild_id = GuildId::new(5);
        let old = Arc::new(Queue::default());
        let new = Arc::new(Queue::default());

        store.insert(guild_id, old.clone());
        store.insert(guild_id, new.clone());

        assert!(!store.remove_if_same(guild_id, &old));
        assert!(store.contains(guild_id));
        assert!(store.remove_if_same(guild_id, &new));
        assert!(!store.contains(guild_id));
    }
}
