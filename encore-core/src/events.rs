use crossbeam::channel::{Receiver, Sender};

use crate::{AttemptId, ChannelId, GuildId, StreamError};

pub type EventSender = Sender<TenantEvent>;
pub type EventReceiver = Receiver<TenantEvent>;

/// Why a guild was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
    /// Someone asked the bot to leave, or the process is shutting down.
    Requested,
    /// The reaper found the guild idle for too long.
    Inactive,
    /// The transport reported that the connection went away on its own.
    ExternalDisconnect,
}

/// Describes the events that can be emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum TenantEvent {
    /// A new connection was established for a guild.
    Connected {
        guild_id: GuildId,
        channel_id: ChannelId,
    },
    /// An existing connection moved to another channel.
    Moved {
        guild_id: GuildId,
        channel_id: ChannelId,
    },
    /// A track started streaming.
    TrackStarted {
        guild_id: GuildId,
        attempt: AttemptId,
        title: String,
    },
    /// A playback attempt finished, naturally, by being stopped, or with an error.
    TrackFinished {
        guild_id: GuildId,
        attempt: AttemptId,
        error: Option<StreamError>,
    },
    /// The queue ran dry, the connection stays open.
    Idle { guild_id: GuildId },
    /// The guild's connection and queue were dropped.
    Released {
        guild_id: GuildId,
        reason: ReleaseReason,
    },
}

/// Sent by a [crate::Completion] when the sink reports that a playback attempt is over.
#[derive(Debug)]
pub struct Finished {
    pub guild_id: GuildId,
    pub attempt: AttemptId,
    pub error: Option<StreamError>,
}
