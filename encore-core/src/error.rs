use std::fmt::Display;

use thiserror::Error;

use crate::AttemptId;

/// The connection to a voice channel could not be established, moved or torn down.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("Destination is unreachable: {0}")]
    Unreachable(String),

    #[error("Not allowed to join the destination: {0}")]
    Forbidden(String),

    #[error("Failed to disconnect: {0}")]
    Disconnect(String),

    #[error("Connection was closed")]
    Closed,
}

/// A locator could not be turned into a playable source.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Nothing playable was found")]
    NotFound,

    #[error("Resource is unavailable")]
    Unavailable,

    #[error("Failed to parse resolver output: {0}")]
    Parse(String),

    #[error("{0}")]
    Other(String),

    #[error("{last} (gave up after {attempts} attempts)")]
    Exhausted {
        attempts: u32,
        last: Box<ResolutionError>,
    },
}

/// The streaming sink failed to start or finished abnormally.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StreamError {
    #[error("Failed to start stream: {0}")]
    Start(String),

    #[error("Stream failed: {0}")]
    Playback(String),

    #[error("Stream of attempt {0} ended without reporting completion")]
    Abandoned(AttemptId),
}

/// A status message could not be delivered.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Failed to send message: {0}")]
pub struct NotifyError(pub String);

/// The part of a caller's context that a command needs but did not have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingContext {
    Guild,
    VoiceChannel,
}

impl Display for MissingContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Guild => "This command can only be used in a server.",
            Self::VoiceChannel => "You need to be in a voice channel to use this command.",
        };

        f.write_str(text)
    }
}

pub type CommandResult<T> = Result<T, CommandError>;

/// Errors returned by the command handlers. The display text is meant for the user.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Failed to connect to your voice channel.")]
    Connection(#[from] ConnectionError),

    #[error("Failed to extract audio: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("No song is playing.")]
    NotPlaying,

    #[error("Invalid index.")]
    Index { index: i64, len: usize },

    #[error("{0}")]
    NoTenantContext(MissingContext),

    #[error("Failed to play: {0}")]
    Stream(#[from] StreamError),
}
