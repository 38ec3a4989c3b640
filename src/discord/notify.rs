use std::sync::Arc;

use async_trait::async_trait;
use encore_core::{ChannelId, Notifier, NotifyError};
use poise::serenity_prelude::Http;

use super::to_serenity_channel;

/// Posts status messages to text channels.
pub struct DiscordNotifier {
    http: Arc<Http>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn send(&self, channel_id: ChannelId, text: &str) -> Result<(), NotifyError> {
        to_serenity_channel(channel_id)
            .say(&*self.http, text)
            .await
            .map(|_| ())
            .map_err(|e| NotifyError(e.to_string()))
    }
}
