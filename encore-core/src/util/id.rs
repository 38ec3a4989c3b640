use std::fmt::{Debug, Display};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crossbeam::atomic::AtomicCell;

pub type IdType = u64;
pub static ID_COUNTER: AtomicCell<IdType> = AtomicCell::new(1);

/// A typed identifier.
///
/// Ids either come from the outside world (Discord snowflakes for guilds and channels),
/// or are generated by the process with [Id::next].
pub struct Id<T> {
    value: IdType,
    kind: PhantomData<T>,
}

impl<T> Id<T> {
    /// Wraps an existing raw id.
    pub const fn new(value: IdType) -> Self {
        Self {
            value,
            kind: PhantomData,
        }
    }

    /// Creates a new process-unique id.
    pub fn next() -> Self {
        Self::new(ID_COUNTER.fetch_add(1))
    }

    pub fn value(&self) -> IdType {
        self.value
    }
}

impl<T> From<IdType> for Id<T> {
    fn from(value: IdType) -> Self {
        Self::new(value)
    }
}

impl<T> Debug for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> Display for Id<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state)
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}
impl<T> Eq for Id<T> {}

/// Marker for guild ids. A guild is one isolated playback context.
pub enum Guild {}

/// Marker for channel ids, both voice destinations and text reply channels.
pub enum Channel {}

/// Marker for playback attempt ids.
pub enum Attempt {}

pub type GuildId = Id<Guild>;
pub type ChannelId = Id<Channel>;
pub type AttemptId = Id<Attempt>;
