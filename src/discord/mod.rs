//! The Discord side of encore: slash commands, voice through songbird, and status messages.

mod bot;
mod commands;
mod notify;
mod voice;

use std::sync::Arc;

use encore_core::{ChannelId, GuildId, Orchestrator};
use poise::serenity_prelude as serenity;

use crate::ytdl::YtDlpResolver;

pub use bot::*;
pub use notify::*;
pub use voice::*;

pub type Bot = Orchestrator<SongbirdGateway, YtDlpResolver, DiscordNotifier>;
pub type Data = Arc<Bot>;
pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
pub type FrameworkContext<'a> = poise::FrameworkContext<'a, Data, Error>;
pub type CommandList = Vec<poise::Command<Data, Error>>;

fn guild_id(id: serenity::GuildId) -> GuildId {
    GuildId::new(id.get())
}

fn channel_id(id: serenity::ChannelId) -> ChannelId {
    ChannelId::new(id.get())
}

fn to_serenity_guild(id: GuildId) -> serenity::GuildId {
    serenity::GuildId::new(id.value())
}

fn to_serenity_channel(id: ChannelId) -> serenity::ChannelId {
    serenity::ChannelId::new(id.value())
}
