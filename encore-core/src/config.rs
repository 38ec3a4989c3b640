use std::time::Duration;

/// The configuration of the orchestrator
#[derive(Debug, Clone)]
pub struct Config {
    /// How long a connected guild may sit without playing before it is disconnected
    pub idle_timeout: Duration,
    /// How often the reaper scans for idle guilds
    pub reap_interval: Duration,
    /// How many times a locator is resolved before giving up
    pub resolve_attempts: u32,
    /// How long to wait between two resolution attempts
    pub resolve_retry_delay: Duration,
}

impl Config {
    /// The retry policy used when resolving locators
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.resolve_attempts,
            delay: self.resolve_retry_delay,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Ten minutes of silence is plenty
            idle_timeout: Duration::from_secs(600),
            reap_interval: Duration::from_secs(60),
            resolve_attempts: 3,
            resolve_retry_delay: Duration::from_secs(5),
        }
    }
}

/// A bounded retry policy with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one. Zero is treated as one.
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn attempts(&self) -> u32 {
        self.attempts.max(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Config::default().retry_policy()
    }
}
