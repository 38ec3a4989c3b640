use log::{debug, error, info};
use tokio::sync::mpsc::UnboundedSender;

use crate::{
    AttemptId, ChannelId, CommandError, CommandResult, Completion, ConnectionError, Finished,
    GuildId, Notifier, NowPlaying, OrchestratorContext, Session, StreamError, Tenant, TenantEvent,
    Track, VoiceConnection,
};

/// What happened to a track handed to the sequencer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Playback {
    /// Nothing was playing, the track started right away.
    Started { title: String },
    /// Something was playing, the track was appended to the queue.
    Queued { title: String, position: usize },
}

impl Playback {
    pub fn started_immediately(&self) -> bool {
        matches!(self, Self::Started { .. })
    }
}

/// Decides what each guild plays, and advances the queue when a track finishes.
pub struct Sequencer<C, N> {
    context: OrchestratorContext<C>,
    notifier: N,
    completions: UnboundedSender<Finished>,
}

impl<C, N> Sequencer<C, N>
where
    C: VoiceConnection,
    N: Notifier,
{
    pub fn new(
        context: &OrchestratorContext<C>,
        notifier: N,
        completions: UnboundedSender<Finished>,
    ) -> Self {
        Self {
            context: context.clone(),
            notifier,
            completions,
        }
    }

    /// Plays the track if the guild is silent, otherwise queues it.
    pub async fn start_or_enqueue(
        &self,
        guild_id: GuildId,
        track: Track,
    ) -> CommandResult<Playback> {
        let tenant = self
            .context
            .registry
            .get(guild_id)
            .ok_or(ConnectionError::Closed)?;

        let mut session = tenant.lock().await;

        if !session.is_connected() {
            return Err(ConnectionError::Closed.into());
        }

        if session.is_playing() {
            let position = tenant.queue.push(track.clone());
            tenant.activity.touch();

            info!(
                "Queued {} at position {} in guild {}",
                track.title, position, guild_id
            );

            return Ok(Playback::Queued {
                title: track.title,
                position,
            });
        }

        self.start(&tenant, &mut session, &track).await?;

        Ok(Playback::Started { title: track.title })
    }

    /// Handles the end of a playback attempt.
    ///
    /// Completions of attempts that are no longer current (already advanced, or the guild was
    /// stopped and restarted since) are ignored. A failed attempt still advances the queue.
    pub async fn advance(&self, finished: Finished) {
        let Finished {
            guild_id,
            attempt,
            error,
        } = finished;

        let Some(tenant) = self.context.registry.get(guild_id) else {
            debug!(
                "Ignoring completion of attempt {} for released guild {}",
                attempt, guild_id
            );
            return;
        };

        let mut session = tenant.lock().await;

        let title = match session.current.take() {
            Some(current) if current.attempt == attempt && !session.released => current.title,
            other => {
                session.current = other;
                debug!(
                    "Ignoring stale completion of attempt {} in guild {}",
                    attempt, guild_id
                );
                return;
            }
        };

        match &error {
            Some(error) => error!(
                "Error after playing {} in guild {}: {}",
                title, guild_id, error
            ),
            None => debug!("Finished playing {} in guild {}", title, guild_id),
        }

        self.context.emit(TenantEvent::TrackFinished {
            guild_id,
            attempt,
            error,
        });

        let mut announcements = Vec::new();

        while let Some(track) = tenant.queue.pop() {
            match self.start(&tenant, &mut session, &track).await {
                Ok(()) => {
                    announcements.push((track.reply_to, format!("Now playing: **{}**", track.title)));
                    break;
                }
                Err(error) => {
                    error!(
                        "Could not start {} in guild {}: {}",
                        track.title, guild_id, error
                    );
                    announcements.push((
                        track.reply_to,
                        format!("Failed to play **{}**: {}", track.title, error),
                    ));
                }
            }
        }

        if !session.is_playing() {
            tenant.activity.touch();

            info!("Queue of guild {} is empty, idling", guild_id);
            self.context.emit(TenantEvent::Idle { guild_id });
        }

        // Messages go out after the session is unlocked, they may be slow.
        drop(session);

        for (channel_id, text) in announcements {
            self.notify(channel_id, &text).await;
        }
    }

    /// Stops the current track. The queue advances as if it finished on its own.
    /// Returns the title of the skipped track.
    pub async fn skip(&self, guild_id: GuildId) -> CommandResult<String> {
        let tenant = self
            .context
            .registry
            .get(guild_id)
            .ok_or(CommandError::NotPlaying)?;

        let mut session = tenant.lock().await;

        let title = session
            .now_playing()
            .map(|p| p.title.clone())
            .ok_or(CommandError::NotPlaying)?;

        let connection = session.connection().ok_or(CommandError::NotPlaying)?;
        connection.stop_stream().await;
        tenant.activity.touch();

        info!("Skipped {} in guild {}", title, guild_id);

        Ok(title)
    }

    /// Clears the queue and stops the current track. Returns how many queued tracks were dropped.
    pub async fn stop(&self, guild_id: GuildId) -> CommandResult<usize> {
        let tenant = self
            .context
            .registry
            .get(guild_id)
            .ok_or(CommandError::NotPlaying)?;

        let mut session = tenant.lock().await;

        if !session.is_playing() {
            return Err(CommandError::NotPlaying);
        }

        // The queue is cleared under the session lock before stopping, so the completion
        // that the stop triggers can never pick up a stale track.
        let cleared = tenant.queue.clear();

        let connection = session.connection().ok_or(CommandError::NotPlaying)?;
        connection.stop_stream().await;
        tenant.activity.touch();

        info!(
            "Stopped playback in guild {} and dropped {} queued tracks",
            guild_id, cleared
        );

        Ok(cleared)
    }

    /// Removes a queued track by its one-based position. Never touches the current track.
    pub fn remove_at(&self, guild_id: GuildId, position: i64) -> CommandResult<Track> {
        let removed = match self.context.queues.get(guild_id) {
            Some(queue) => queue.remove(position)?,
            None => {
                return Err(CommandError::Index {
                    index: position,
                    len: 0,
                })
            }
        };

        self.touch(guild_id);

        Ok(removed)
    }

    /// Empties the queue of a guild. Returns [None] if the guild has no queue.
    pub fn clear(&self, guild_id: GuildId) -> Option<usize> {
        let cleared = self.context.queues.get(guild_id)?.clear();
        self.touch(guild_id);

        Some(cleared)
    }

    /// The titles of the queued tracks, in play order.
    pub fn list(&self, guild_id: GuildId) -> Vec<String> {
        self.context.queues.titles(guild_id)
    }

    /// The title of the track currently playing in a guild.
    pub async fn now_playing(&self, guild_id: GuildId) -> Option<String> {
        let tenant = self.context.registry.get(guild_id)?;
        let session = tenant.lock().await;

        session.now_playing().map(|p| p.title.clone())
    }

    async fn start(
        &self,
        tenant: &Tenant<C>,
        session: &mut Session<C>,
        track: &Track,
    ) -> Result<(), StreamError> {
        let guild_id = tenant.guild_id;

        let connection = session
            .connection()
            .ok_or_else(|| StreamError::Start(ConnectionError::Closed.to_string()))?;

        let attempt = AttemptId::next();
        let completion = Completion::new(guild_id, attempt, self.completions.clone());

        connection.start_stream(&track.source, completion).await?;

        session.current = Some(NowPlaying {
            attempt,
            title: track.title.clone(),
        });
        tenant.activity.touch();

        info!("Now playing {} in guild {}", track.title, guild_id);
        self.context.emit(TenantEvent::TrackStarted {
            guild_id,
            attempt,
            title: track.title.clone(),
        });

        Ok(())
    }

    async fn notify(&self, channel_id: ChannelId, text: &str) {
        if let Err(error) = self.notifier.send(channel_id, text).await {
            error!("Error sending message to channel {}: {}", channel_id, error);
        }
    }

    fn touch(&self, guild_id: GuildId) {
        if let Some(tenant) = self.context.registry.get(guild_id) {
            tenant.activity.touch();
        }
    }
}
