use std::path::PathBuf;

use colored::Colorize;
use log::{error, info};
use poise::serenity_prelude as serenity;
use settings::Settings;
use thiserror::Error;
use tokio::runtime::{self, Runtime};

mod discord;
mod logging;
mod settings;
mod ytdl;

pub struct Encore {
    settings: Settings,
    runtime: Runtime,
}

#[derive(Debug, Error)]
pub enum EncoreError {
    #[error("Environment variable {0} is not set")]
    MissingVariable(&'static str),

    #[error("Environment variable {name} has an invalid value: {value}")]
    InvalidVariable { name: &'static str, value: String },

    #[error("Cookie file {0} does not exist")]
    MissingCookies(PathBuf),

    #[error("Discord client failed: {0}")]
    Client(#[from] serenity::Error),

    #[error("Fatal error: {0}")]
    Fatal(String),
}

impl Encore {
    fn new() -> Result<Self, EncoreError> {
        let settings = Settings::from_env()?;

        info!("Building async runtime...");
        let runtime = runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("encore-async")
            .build()
            .map_err(|e| EncoreError::Fatal(e.to_string()))?;

        Ok(Self { settings, runtime })
    }

    fn run(self) -> Result<(), EncoreError> {
        let Self { settings, runtime } = self;

        info!(
            "Disconnecting after {}s of silence",
            settings.core.idle_timeout.as_secs()
        );

        runtime.block_on(discord::run(settings))
    }
}

impl EncoreError {
    fn hint(&self) -> String {
        match self {
            EncoreError::MissingVariable(_) => "Set the variable, for example in your shell or service definition, then try again.".to_string(),
            EncoreError::InvalidVariable { .. } => "Durations are whole seconds and counts are whole numbers.".to_string(),
            EncoreError::MissingCookies(_) => "Export your YouTube cookies in the Netscape format, or unset ENCORE_YOUTUBE_COOKIES.".to_string(),
            EncoreError::Client(_) => "Make sure the token is valid and the bot has the voice and message intents enabled.".to_string(),
            EncoreError::Fatal(_) => "This error is fatal, and should not happen.".to_string(),
        }
    }
}

fn report(error: EncoreError) {
    error!("{} Read the error below to troubleshoot the issue. If you think this might be a bug, please report it by making a GitHub issue.", "Encore stopped!".bold().red());
    error!("{}", error);
    error!("{}", format!("Hint: {}", error.hint()).dimmed().italic());
}

fn main() {
    if let Err(error) = logging::init_logger() {
        eprintln!("Could not initialize logging: {}", error);
    }

    match Encore::new() {
        Ok(encore) => {
            info!("Initialized successfully.");

            if let Err(error) = encore.run() {
                report(error);
            }
        }
        Err(error) => report(error),
    }
}
