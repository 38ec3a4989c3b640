use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};

use crate::{Activity, AttemptId, GuildId, Queue, Store, VoiceConnection};

/// One guild's playback context.
///
/// The session is the guild's mutual exclusion domain: every sequence that touches the
/// connection or decides what plays next runs with it locked. The queue has its own
/// short lived lock so it can be read without waiting on connection I/O.
pub struct Tenant<C> {
    pub guild_id: GuildId,
    pub queue: Arc<Queue>,
    pub activity: Activity,
    session: Mutex<Session<C>>,
}

/// The mutable connection state of a tenant.
pub struct Session<C> {
    pub(crate) connection: Option<C>,
    pub(crate) current: Option<NowPlaying>,
    /// Set once the tenant has been removed. A released tenant is never reused.
    pub(crate) released: bool,
}

/// The attempt that is currently streaming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub attempt: AttemptId,
    pub title: String,
}

impl<C> Tenant<C>
where
    C: VoiceConnection,
{
    pub fn new(guild_id: GuildId) -> Self {
        Self {
            guild_id,
            queue: Default::default(),
            activity: Activity::now(),
            session: Mutex::new(Session {
                connection: None,
                current: None,
                released: false,
            }),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, Session<C>> {
        self.session.lock().await
    }

    /// Locks the session only if nobody else holds it.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, Session<C>>> {
        self.session.try_lock().ok()
    }
}

impl<C> Session<C>
where
    C: VoiceConnection,
{
    /// The live connection, unless the tenant was released or never connected.
    pub fn connection(&mut self) -> Option<&mut C> {
        if self.released {
            return None;
        }

        self.connection.as_mut()
    }

    pub fn is_connected(&self) -> bool {
        !self.released && self.connection.is_some()
    }

    /// Whether an attempt is running that has not reported completion yet.
    pub fn is_playing(&self) -> bool {
        self.current.is_some()
    }

    pub fn now_playing(&self) -> Option<&NowPlaying> {
        self.current.as_ref()
    }
}

/// Maps guilds to their tenants.
pub struct TenantRegistry<C> {
    tenants: Store<GuildId, Tenant<C>>,
}

impl<C> TenantRegistry<C>
where
    C: VoiceConnection,
{
    pub fn get(&self, guild_id: GuildId) -> Option<Arc<Tenant<C>>> {
        self.tenants.get(&guild_id).map(|t| t.clone())
    }

    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<Tenant<C>> {
        self.tenants
            .entry(guild_id)
            .or_insert_with(|| Arc::new(Tenant::new(guild_id)))
            .clone()
    }

    pub fn remove(&self, guild_id: GuildId) -> Option<Arc<Tenant<C>>> {
        self.tenants.remove(&guild_id).map(|(_, t)| t)
    }

    /// Removes the tenant of a guild, but only if it is still the given one.
    pub fn remove_if_same(&self, guild_id: GuildId, tenant: &Arc<Tenant<C>>) -> bool {
        self.tenants
            .remove_if(&guild_id, |_, t| Arc::ptr_eq(t, tenant))
            .is_some()
    }

    /// All tenants at this instant. Holding the result does not lock the registry.
    pub fn snapshot(&self) -> Vec<Arc<Tenant<C>>> {
        self.tenants.iter().map(|t| t.clone()).collect()
    }

    pub fn contains(&self, guild_id: GuildId) -> bool {
        self.tenants.contains_key(&guild_id)
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }
}

impl<C> Clone for TenantRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            tenants: self.tenants.clone(),
        }
    }
}

impl<C> Default for TenantRegistry<C> {
    fn default() -> Self {
        Self {
            tenants: Default::default(),
        }
    }
}
