use std::{env, path::PathBuf, str::FromStr, time::Duration};

use encore_core::Config;

use crate::EncoreError;

const TOKEN: &str = "ENCORE_DISCORD_TOKEN";
const COOKIES: &str = "ENCORE_YOUTUBE_COOKIES";
const IDLE_TIMEOUT: &str = "ENCORE_IDLE_TIMEOUT_SECS";
const REAP_INTERVAL: &str = "ENCORE_REAP_INTERVAL_SECS";
const RESOLVE_ATTEMPTS: &str = "ENCORE_RESOLVE_ATTEMPTS";
const RESOLVE_DELAY: &str = "ENCORE_RESOLVE_DELAY_SECS";

/// Everything the bot needs to start, read from the environment.
#[derive(Debug, Clone)]
pub struct Settings {
    pub token: String,
    /// A Netscape cookie file handed to yt-dlp
    pub cookies: Option<PathBuf>,
    pub core: Config,
}

impl Settings {
    pub fn from_env() -> Result<Self, EncoreError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, EncoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup(TOKEN)
            .filter(|t| !t.trim().is_empty())
            .ok_or(EncoreError::MissingVariable(TOKEN))?;

        let cookies = lookup(COOKIES).map(PathBuf::from);

        if let Some(path) = &cookies {
            if !path.is_file() {
                return Err(EncoreError::MissingCookies(path.clone()));
            }
        }

        let defaults = Config::default();

        let core = Config {
            idle_timeout: parse_secs(&lookup, IDLE_TIMEOUT)?.unwrap_or(defaults.idle_timeout),
            reap_interval: parse_secs(&lookup, REAP_INTERVAL)?.unwrap_or(defaults.reap_interval),
            resolve_attempts: parse(&lookup, RESOLVE_ATTEMPTS)?
                .unwrap_or(defaults.resolve_attempts),
            resolve_retry_delay: parse_secs(&lookup, RESOLVE_DELAY)?
                .unwrap_or(defaults.resolve_retry_delay),
        };

        if core.reap_interval.is_zero() {
            return Err(EncoreError::InvalidVariable {
                name: REAP_INTERVAL,
                value: "0".to_string(),
            });
        }

        Ok(Self {
            token,
            cookies,
            core,
        })
    }
}

fn parse<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, EncoreError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(name)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| EncoreError::InvalidVariable { name, value })
        })
        .transpose()
}

fn parse_secs<F>(lookup: &F, name: &'static str) -> Result<Option<Duration>, EncoreError>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(parse::<F, u64>(lookup, name)?.map(Duration::from_secs))
}
