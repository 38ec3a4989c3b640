use async_trait::async_trait;
use log::warn;

use crate::{ChannelId, ResolutionError, RetryPolicy};

/// A locator resolved into something the streaming sink can play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Directly streamable source, not the locator the user supplied
    pub source: String,
    pub title: String,
}

/// Turns user supplied locators into streamable sources. May fail transiently.
#[async_trait]
pub trait Resolver: Send + Sync + 'static {
    async fn resolve(&self, locator: &str) -> Result<Resolved, ResolutionError>;
}

/// Delivers status messages to a text channel. Best effort.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn send(&self, channel_id: ChannelId, text: &str) -> Result<(), crate::NotifyError>;
}

/// Resolves a locator, retrying with a fixed delay until the policy is exhausted.
pub async fn resolve_with_retry<R>(
    resolver: &R,
    locator: &str,
    policy: RetryPolicy,
) -> Result<Resolved, ResolutionError>
where
    R: Resolver + ?Sized,
{
    let attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        match resolver.resolve(locator).await {
            Ok(resolved) => return Ok(resolved),
            Err(error) if attempt < attempts => {
                warn!(
                    "Resolving {} failed (attempt {}/{}): {}",
                    locator, attempt, attempts, error
                );

                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(error) => {
                return Err(ResolutionError::Exhausted {
                    attempts,
                    last: Box::new(error),
                })
            }
        }
    }
}
