//! The command surface offered to the transport, one handler per user command.

use std::fmt::Display;

use log::info;

use crate::{
    resolve_with_retry, ChannelId, CommandError, CommandResult, GuildId, MissingContext,
    Notifier, Orchestrator, Playback, ReleaseReason, Resolver, Track, VoiceGateway,
};

/// Who issued a command, and from where.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    /// The guild the command was issued in, if any
    pub guild_id: Option<GuildId>,
    /// The voice channel the caller is currently in, if any
    pub voice_channel: Option<ChannelId>,
    /// Where replies and later status messages should go
    pub reply_channel: ChannelId,
}

impl Request {
    pub fn guild(&self) -> CommandResult<GuildId> {
        self.guild_id
            .ok_or(CommandError::NoTenantContext(MissingContext::Guild))
    }

    pub fn voice_channel(&self) -> CommandResult<ChannelId> {
        self.voice_channel
            .ok_or(CommandError::NoTenantContext(MissingContext::VoiceChannel))
    }

    /// The guild and voice channel a joining command needs, checked in that order.
    pub fn voice_target(&self) -> CommandResult<(GuildId, ChannelId)> {
        Ok((self.guild()?, self.voice_channel()?))
    }
}

/// A successful command outcome, rendered for the user with [Display].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Connected { channel_id: ChannelId },
    Disconnected,
    NotConnected,
    NowPlaying { title: String },
    Queued { title: String, position: usize },
    Skipped { title: String },
    Stopped { cleared: usize },
    Queue { titles: Vec<String> },
    QueueEmpty,
    Removed { title: String },
    QueueCleared,
    QueueAlreadyEmpty,
}

impl Reply {
    /// Whether only the caller should see this reply.
    pub fn is_ephemeral(&self) -> bool {
        !matches!(
            self,
            Self::NowPlaying { .. } | Self::Queued { .. } | Self::Queue { .. }
        )
    }
}

impl Display for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected { channel_id } => write!(f, "Connected to **<#{}>**", channel_id),
            Self::Disconnected => write!(f, "Disconnected."),
            Self::NotConnected => write!(f, "Not connected to any voice channel."),
            Self::NowPlaying { title } => write!(f, "Now playing: **{}**", title),
            Self::Queued { title, .. } => write!(f, "**{}** added to the queue.", title),
            Self::Skipped { .. } => write!(f, "Song skipped."),
            Self::Stopped { .. } => write!(f, "Playback stopped and queue cleared."),
            Self::Queue { titles } => {
                write!(f, "Song Queue:")?;
                for (index, title) in titles.iter().enumerate() {
                    write!(f, "\n{}. {}", index + 1, title)?;
                }
                Ok(())
            }
            Self::QueueEmpty => write!(f, "The queue is empty."),
            Self::Removed { title } => write!(f, "Removed **{}** from the queue.", title),
            Self::QueueCleared => write!(f, "Queue cleared."),
            Self::QueueAlreadyEmpty => write!(f, "The queue is already empty."),
        }
    }
}

impl<G, R, N> Orchestrator<G, R, N>
where
    G: VoiceGateway,
    R: Resolver,
    N: Notifier,
{
    /// Joins the caller's voice channel, moving there if already connected elsewhere.
    pub async fn join(&self, request: &Request) -> CommandResult<Reply> {
        let (guild_id, channel_id) = request.voice_target()?;

        self.connections().ensure(guild_id, channel_id).await?;

        Ok(Reply::Connected { channel_id })
    }

    /// Leaves the voice channel and forgets the queue.
    pub async fn leave(&self, request: &Request) -> CommandResult<Reply> {
        let guild_id = request.guild()?;

        let released = self
            .connections()
            .release(guild_id, ReleaseReason::Requested)
            .await;

        if released {
            Ok(Reply::Disconnected)
        } else {
            Ok(Reply::NotConnected)
        }
    }

    /// Resolves the locator and plays it, or queues it behind the current track.
    pub async fn play(&self, request: &Request, locator: &str) -> CommandResult<Reply> {
        let (guild_id, channel_id) = request.voice_target()?;

        self.connections().ensure(guild_id, channel_id).await?;

        let resolved =
            resolve_with_retry(&self.resolver, locator, self.context.config.retry_policy()).await?;

        info!("Resolved {} to {}", locator, resolved.title);

        let track = Track::new(resolved, request.reply_channel);

        let reply = match self.sequencer().start_or_enqueue(guild_id, track).await? {
            Playback::Started { title } => Reply::NowPlaying { title },
            Playback::Queued { title, position } => Reply::Queued { title, position },
        };

        Ok(reply)
    }

    pub async fn skip(&self, request: &Request) -> CommandResult<Reply> {
        let guild_id = request.guild()?;
        let title = self.sequencer().skip(guild_id).await?;

        Ok(Reply::Skipped { title })
    }

    pub async fn stop(&self, request: &Request) -> CommandResult<Reply> {
        let guild_id = request.guild()?;
        let cleared = self.sequencer().stop(guild_id).await?;

        Ok(Reply::Stopped { cleared })
    }

    pub fn queue(&self, request: &Request) -> CommandResult<Reply> {
        let guild_id = request.guild()?;
        let titles = self.sequencer().list(guild_id);

        if titles.is_empty() {
            Ok(Reply::QueueEmpty)
        } else {
            Ok(Reply::Queue { titles })
        }
    }

    /// Removes a queued track by its one-based position.
    pub fn remove(&self, request: &Request, position: i64) -> CommandResult<Reply> {
        let guild_id = request.guild()?;
        let removed = self.sequencer().remove_at(guild_id, position)?;

        Ok(Reply::Removed {
            title: removed.title,
        })
    }

    /// Clears the queue of a connected guild, even one with nothing queued.
    pub fn clear_queue(&self, request: &Request) -> CommandResult<Reply> {
        let guild_id = request.guild()?;

        match self.sequencer().clear(guild_id) {
            Some(_) => Ok(Reply::QueueCleared),
            None => Ok(Reply::QueueAlreadyEmpty),
        }
    }
}
