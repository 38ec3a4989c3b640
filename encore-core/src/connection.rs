use std::{sync::Arc, time::Duration};

use log::{debug, error, info, warn};

use crate::{
    ChannelId, ConnectionError, GuildId, OrchestratorContext, ReleaseReason, Session, Tenant,
    TenantEvent, VoiceConnection, VoiceGateway,
};

type ConnectionOf<G> = <G as VoiceGateway>::Connection;

/// Acquires, moves and releases the voice connection of each guild.
pub struct ConnectionManager<G>
where
    G: VoiceGateway,
{
    context: OrchestratorContext<ConnectionOf<G>>,
    gateway: G,
}

impl<G> ConnectionManager<G>
where
    G: VoiceGateway,
{
    pub fn new(context: &OrchestratorContext<ConnectionOf<G>>, gateway: G) -> Self {
        Self {
            context: context.clone(),
            gateway,
        }
    }

    /// Makes sure the guild is connected to the given channel.
    ///
    /// Connects if there is no connection, moves the existing one if it is bound elsewhere,
    /// and does nothing else otherwise. On success the guild's activity is refreshed and
    /// its queue exists. A failed first connection leaves no tenant behind, and a failed
    /// move leaves the connection where it was.
    pub async fn ensure(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Arc<Tenant<ConnectionOf<G>>>, ConnectionError> {
        loop {
            let tenant = self.context.registry.get_or_create(guild_id);
            let mut session = tenant.lock().await;

            // Lost a race against a release, the next iteration creates a fresh tenant.
            if session.released {
                continue;
            }

            match session.connection.as_mut() {
                None => match self.gateway.connect(guild_id, channel_id).await {
                    Ok(connection) => {
                        session.connection = Some(connection);

                        info!("Connected to channel {} in guild {}", channel_id, guild_id);
                        self.context.emit(TenantEvent::Connected {
                            guild_id,
                            channel_id,
                        });
                    }
                    Err(error) => {
                        session.released = true;
                        drop(session);
                        self.context.registry.remove_if_same(guild_id, &tenant);

                        warn!(
                            "Could not connect to channel {} in guild {}: {}",
                            channel_id, guild_id, error
                        );
                        return Err(error);
                    }
                },
                Some(connection) => {
                    // Asked live, the platform may have moved the connection without us.
                    let previous = connection.channel_id().await;

                    if previous != Some(channel_id) {
                        if let Err(error) = connection.move_to(channel_id).await {
                            warn!(
                                "Could not move to channel {} in guild {}: {}",
                                channel_id, guild_id, error
                            );
                            return Err(error);
                        }

                        info!(
                            "Moved from channel {:?} to {} in guild {}",
                            previous.map(|c| c.value()),
                            channel_id,
                            guild_id
                        );
                        self.context.emit(TenantEvent::Moved {
                            guild_id,
                            channel_id,
                        });
                    }
                }
            }

            tenant.activity.touch();
            self.context.queues.insert(guild_id, tenant.queue.clone());

            drop(session);
            return Ok(tenant);
        }
    }

    /// Disconnects a guild and drops its tenant and queue.
    ///
    /// Returns whether a live connection was dropped. Releasing a guild that is not
    /// connected does nothing.
    pub async fn release(&self, guild_id: GuildId, reason: ReleaseReason) -> bool {
        let Some(tenant) = self.context.registry.get(guild_id) else {
            debug!("Guild {} is already released", guild_id);
            return false;
        };

        // Stays registered until the lock is held, a concurrent `ensure` must wait for us.
        let mut session = tenant.lock().await;
        self.release_locked(&tenant, &mut session, reason).await
    }

    /// Releases the guild if it is not playing and has been inactive for longer than the timeout.
    ///
    /// The checks and the release happen under the same lock, so a track that starts right
    /// before the decision always prevents it. A guild that is busy with another operation
    /// is left alone until the next attempt.
    pub async fn release_if_idle(
        &self,
        tenant: &Arc<Tenant<ConnectionOf<G>>>,
        idle_timeout: Duration,
    ) -> bool {
        let Some(mut session) = tenant.try_lock() else {
            debug!("Guild {} is busy, not reaping", tenant.guild_id);
            return false;
        };

        let Some(connection) = session.connection() else {
            return false;
        };

        if connection.is_playing().await {
            return false;
        }

        if session.is_playing() || tenant.activity.idle_for() <= idle_timeout {
            return false;
        }

        info!(
            "Guild {} has been inactive for {}s, disconnecting",
            tenant.guild_id,
            tenant.activity.idle_for().as_secs()
        );

        self.release_locked(tenant, &mut session, ReleaseReason::Inactive)
            .await
    }

    async fn release_locked(
        &self,
        tenant: &Arc<Tenant<ConnectionOf<G>>>,
        session: &mut Session<ConnectionOf<G>>,
        reason: ReleaseReason,
    ) -> bool {
        let guild_id = tenant.guild_id;

        if session.released {
            return false;
        }

        session.released = true;
        session.current = None;

        self.context.registry.remove_if_same(guild_id, tenant);
        self.context.queues.remove_if_same(guild_id, &tenant.queue);
        tenant.queue.clear();

        let Some(mut connection) = session.connection.take() else {
            return false;
        };

        // Stopping fires the completion, which finds the tenant released and does nothing.
        connection.stop_stream().await;

        // The entry is gone either way, a failed disconnect must not leave a stuck tenant.
        if let Err(error) = connection.disconnect().await {
            error!("Error disconnecting from guild {}: {}", guild_id, error);
        }

        info!("Released guild {} ({:?})", guild_id, reason);
        self.context
            .emit(TenantEvent::Released { guild_id, reason });

        true
    }

    /// Releases every guild, used on shutdown.
    pub async fn release_all(&self) {
        let guilds: Vec<_> = self
            .context
            .registry
            .snapshot()
            .iter()
            .map(|t| t.guild_id)
            .collect();

        for guild_id in guilds {
            self.release(guild_id, ReleaseReason::Requested).await;
        }
    }

    pub fn context(&self) -> &OrchestratorContext<ConnectionOf<G>> {
        &self.context
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::{setup, GUILD, OTHER_VOICE, VOICE};

    #[tokio::test]
    async fn connects_once_and_reuses_the_connection() {
        let (orchestrator, mocks) = setup();
        let connections = orchestrator.connections();

        connections.ensure(GUILD, VOICE).await.expect("connects");
        connections.ensure(GUILD, VOICE).await.expect("reuses");

        assert_eq!(mocks.gateway.connects(), vec![(GUILD, VOICE)]);
        assert!(orchestrator.context().queues.contains(GUILD));
    }

    #[tokio::test]
    async fn failed_connection_leaves_no_tenant() {
        let (orchestrator, mocks) = setup();
        mocks.gateway.refuse(VOICE);

        let error = orchestrator
            .connections()
            .ensure(GUILD, VOICE)
            .await
            .err()
            .expect("channel is refused");

        assert!(matches!(error, ConnectionError::Forbidden(_)));
        assert!(!orchestrator.context().registry.contains(GUILD));
        assert!(!orchestrator.context().queues.contains(GUILD));
    }

    #[tokio::test]
    async fn moves_existing_connection() {
        let (orchestrator, mocks) = setup();
        let connections = orchestrator.connections();

        connections.ensure(GUILD, VOICE).await.expect("connects");
        let tenant = connections.ensure(GUILD, OTHER_VOICE).await.expect("moves");

        assert_eq!(mocks.gateway.connects().len(), 1);
        let mut session = tenant.lock().await;
        let connection = session.connection().expect("connected");
        assert_eq!(connection.channel_id().await, Some(OTHER_VOICE));
    }

    #[tokio::test]
    async fn moves_back_after_being_dragged_away() {
        let (orchestrator, mocks) = setup();
        let connections = orchestrator.connections();
        let events = orchestrator.events();

        connections.ensure(GUILD, VOICE).await.expect("connects");
        mocks.gateway.drag(GUILD, OTHER_VOICE);

        let tenant = connections.ensure(GUILD, VOICE).await.expect("moves back");

        assert_eq!(mocks.gateway.connects().len(), 1);
        assert!(events.try_iter().any(|event| event
            == TenantEvent::Moved {
                guild_id: GUILD,
                channel_id: VOICE,
            }));

        let mut session = tenant.lock().await;
        let connection = session.connection().expect("connected");
        assert_eq!(connection.channel_id().await, Some(VOICE));
    }

    #[tokio::test]
    async fn failed_move_keeps_previous_channel() {
        let (orchestrator, mocks) = setup();
        let connections = orchestrator.connections();

        let tenant = connections.ensure(GUILD, VOICE).await.expect("connects");
        mocks.gateway.refuse(OTHER_VOICE);

        assert!(connections.ensure(GUILD, OTHER_VOICE).await.is_err());

        let mut session = tenant.lock().await;
        let connection = session.connection().expect("connected");
        assert_eq!(connection.channel_id().await, Some(VOICE));
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let (orchestrator, mocks) = setup();
        let connections = orchestrator.connections();
        connections.ensure(GUILD, VOICE).await.expect("connects");

        assert!(connections.release(GUILD, ReleaseReason::Requested).await);
        assert!(!connections.release(GUILD, ReleaseReason::Requested).await);

        assert_eq!(mocks.gateway.disconnects(), vec![GUILD]);
        assert!(!orchestrator.context().registry.contains(GUILD));
        assert!(!orchestrator.context().queues.contains(GUILD));
    }

    #[tokio::test]
    async fn failed_disconnect_still_removes_tenant() {
        let (orchestrator, mocks) = setup();
        let connections = orchestrator.connections();
        connections.ensure(GUILD, VOICE).await.expect("connects");
        mocks.gateway.fail_disconnects();

        assert!(connections.release(GUILD, ReleaseReason::Inactive).await);
        assert!(!orchestrator.context().registry.contains(GUILD));
    }

    #[tokio::test]
    async fn reconnects_after_release() {
        let (orchestrator, mocks) = setup();
        let connections = orchestrator.connections();

        let old = connections.ensure(GUILD, VOICE).await.expect("connects");
        connections.release(GUILD, ReleaseReason::Requested).await;
        let new = connections.ensure(GUILD, VOICE).await.expect("reconnects");

        assert!(!Arc::ptr_eq(&old, &new));
        assert_eq!(mocks.gateway.connects().len(), 2);
        assert!(orchestrator.context().queues.contains(GUILD));
    }

    #[tokio::test]
    async fn ensure_waits_for_a_pending_release() {
        let (orchestrator, mocks) = setup();
        let connections = orchestrator.connections().clone();

        let old = connections.ensure(GUILD, VOICE).await.expect("connects");
        let guard = old.lock().await;

        let releasing = tokio::spawn({
            let connections = connections.clone();
            async move { connections.release(GUILD, ReleaseReason::Requested).await }
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        let ensuring = tokio::spawn({
            let connections = connections.clone();
            async move { connections.ensure(GUILD, VOICE).await.map(|_| ()) }
        });
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        // Both are parked on the old tenant, nothing has connected a second time.
        assert_eq!(mocks.gateway.connects().len(), 1);
        assert!(orchestrator.context().registry.contains(GUILD));

        drop(guard);

        assert!(releasing.await.expect("release task"));
        ensuring
            .await
            .expect("ensure task")
            .expect("reconnects");

        assert_eq!(mocks.gateway.connects().len(), 2);
        assert_eq!(mocks.gateway.disconnects(), vec![GUILD]);

        let new = orchestrator.context().registry.get(GUILD).expect("registered");
        assert!(!Arc::ptr_eq(&old, &new));
        assert!(!new.lock().await.released);
    }
}
