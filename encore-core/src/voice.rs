use async_trait::async_trait;
use log::{debug, warn};
use tokio::sync::mpsc::UnboundedSender;

use crate::{AttemptId, ChannelId, ConnectionError, Finished, GuildId, StreamError};

/// Establishes voice connections. Implemented by the transport.
#[async_trait]
pub trait VoiceGateway: Send + Sync + 'static {
    type Connection: VoiceConnection;

    /// Connects to the given channel of a guild that is not connected yet.
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Self::Connection, ConnectionError>;
}

/// One live voice session, bound to a channel, that can stream one source at a time.
#[async_trait]
pub trait VoiceConnection: Send + Sync + 'static {
    /// The channel this connection is bound to right now, as seen by the platform.
    /// Someone else may have moved the bot since we last did, or dropped it from voice.
    async fn channel_id(&self) -> Option<ChannelId>;

    /// Moves the connection to another channel of the same guild.
    /// On failure the connection must stay bound to its previous channel.
    async fn move_to(&mut self, channel_id: ChannelId) -> Result<(), ConnectionError>;

    async fn disconnect(&mut self) -> Result<(), ConnectionError>;

    /// Starts streaming the given source.
    /// The sink must call [Completion::complete] exactly once when the stream ends or is stopped.
    async fn start_stream(&mut self, source: &str, completion: Completion)
        -> Result<(), StreamError>;

    /// Stops the current stream, if any. This causes its completion to fire.
    async fn stop_stream(&mut self);

    /// Whether the sink is currently streaming something.
    async fn is_playing(&self) -> bool;
}

/// A one-shot handle the streaming sink uses to report that a playback attempt is over.
///
/// Completing does not run any playback logic on the caller's context, it only hands a
/// [Finished] message to the orchestrator, which advances the guild on its own tasks.
/// Dropping a completion without calling it reports the attempt as abandoned.
pub struct Completion {
    guild_id: GuildId,
    attempt: AttemptId,
    sender: Option<UnboundedSender<Finished>>,
}

impl Completion {
    pub fn new(guild_id: GuildId, attempt: AttemptId, sender: UnboundedSender<Finished>) -> Self {
        Self {
            guild_id,
            attempt,
            sender: Some(sender),
        }
    }

    pub fn attempt(&self) -> AttemptId {
        self.attempt
    }

    /// Reports the end of the attempt, with an error if it did not end cleanly.
    pub fn complete(mut self, error: Option<StreamError>) {
        self.send(error)
    }

    fn send(&mut self, error: Option<StreamError>) {
        let Some(sender) = self.sender.take() else {
            return;
        };

        let finished = Finished {
            guild_id: self.guild_id,
            attempt: self.attempt,
            error,
        };

        if sender.send(finished).is_err() {
            debug!(
                "Completion of attempt {} for guild {} arrived after shutdown",
                self.attempt, self.guild_id
            );
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.sender.is_some() {
            warn!(
                "Attempt {} for guild {} was dropped without completing",
                self.attempt, self.guild_id
            );

            self.send(Some(StreamError::Abandoned(self.attempt)));
        }
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Completion({}:{})", self.guild_id, self.attempt)
    }
}
