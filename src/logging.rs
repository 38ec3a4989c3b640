use std::{fmt::Display, thread};

use colored::Colorize;
use encore_core::{EventReceiver, TenantEvent};
use log::{info, warn, Level};

/// External crates only need to log warnings and errors
const ALLOWED_EXTERNAL_LEVELS: [Level; 2] = [Level::Warn, Level::Error];
const ALLOWED_LEVELS: [Level; 3] = [Level::Info, Level::Warn, Level::Error];

pub fn init_logger() -> Result<(), log::SetLoggerError> {
    fern::Dispatch::new()
        .format(move |out, message, record| {
            let target = Target::from_str(record.target());
            let now = chrono::Local::now();

            out.finish(format_args!(
                "{:^5} {} {:^8} {}",
                level_to_string(&record.level()),
                now.format("%H:%M:%S").to_string().bright_black(),
                target,
                message
            ))
        })
        .filter(|meta| {
            let target = Target::from_str(meta.target());

            let is_allowed = ALLOWED_LEVELS.contains(&meta.level());
            let is_severe = ALLOWED_EXTERNAL_LEVELS.contains(&meta.level());

            target.is_local() && is_allowed || is_severe
        })
        .chain(std::io::stdout())
        .apply()
}

/// Logs orchestrator events on a dedicated thread until the orchestrator goes away.
pub fn spawn_event_logger(events: EventReceiver) {
    let spawned = thread::Builder::new()
        .name("encore-events".to_string())
        .spawn(move || {
            for event in events {
                log_event(&event);
            }
        });

    if let Err(error) = spawned {
        warn!("Could not start the event logger: {}", error);
    }
}

fn log_event(event: &TenantEvent) {
    match event {
        TenantEvent::Connected {
            guild_id,
            channel_id,
        } => info!("[{}] Joined {}", guild_id, channel_id),
        TenantEvent::Moved {
            guild_id,
            channel_id,
        } => info!("[{}] Moved to {}", guild_id, channel_id),
        TenantEvent::TrackStarted {
            guild_id, title, ..
        } => info!("[{}] Playing {}", guild_id, title.bold()),
        TenantEvent::TrackFinished {
            guild_id,
            error: Some(error),
            ..
        } => warn!("[{}] Track ended with an error: {}", guild_id, error),
        TenantEvent::TrackFinished { .. } => {}
        TenantEvent::Idle { guild_id } => info!("[{}] Queue is empty", guild_id),
        TenantEvent::Released { guild_id, reason } => {
            info!("[{}] Left voice ({:?})", guild_id, reason)
        }
    }
}

enum Target {
    External(String),
    Bot,
    Core,
}

impl Target {
    fn from_str(str: &str) -> Self {
        let module = str.split("::").next().unwrap_or_default();

        match module {
            "encore_core" => Self::Core,
            "encore" => Self::Bot,
            other => Target::External(other.to_string()),
        }
    }

    fn is_local(&self) -> bool {
        !matches!(self, Self::External(_))
    }
}

impl Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let result = match self {
            Target::External(x) => x.as_str().clear(),
            Target::Bot => "BOT".bright_green(),
            Target::Core => "CORE".blue(),
        };

        Display::fmt(&result, f)
    }
}

fn level_to_string(level: &Level) -> String {
    match level {
        Level::Error => " ERR ".black().on_red().bold().to_string(),
        Level::Warn => " WRN ".black().on_yellow().bold().to_string(),
        Level::Info => " INF ".black().on_blue().bold().to_string(),
        Level::Debug => " DBG ".white().on_black().to_string(),
        Level::Trace => " TRC ".to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn targets_are_grouped_by_crate() {
        assert!(matches!(
            Target::from_str("encore_core::reaper"),
            Target::Core
        ));
        assert!(matches!(Target::from_str("encore::discord::bot"), Target::Bot));
        assert!(!Target::from_str("serenity::gateway").is_local());
    }
}
