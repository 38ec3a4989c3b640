use std::sync::Arc;

use log::{error, info};
use poise::serenity_prelude::{self as serenity, FullEvent, GatewayIntents};
use songbird::{SerenityInit, Songbird};

use crate::{settings::Settings, ytdl::YtDlpResolver, EncoreError};

use super::{
    commands, guild_id, Bot, Data, DiscordNotifier, Error, FrameworkContext, SongbirdGateway,
};

/// Runs the bot until the gateway connection ends or the process is interrupted.
pub async fn run(settings: Settings) -> Result<(), EncoreError> {
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_VOICE_STATES;

    let voice = Songbird::serenity();
    let http = Arc::new(serenity::Http::new(&settings.token));

    let encore: Data = Arc::new(Bot::new(
        settings.core.clone(),
        SongbirdGateway::new(voice.clone()),
        YtDlpResolver::new(settings.cookies.clone()),
        DiscordNotifier::new(http),
    ));

    crate::logging::spawn_event_logger(encore.events());

    let data = encore.clone();
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: commands::commands(),
            event_handler: |ctx, event, framework, data| {
                Box::pin(handle_event(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, _ready, framework| {
            Box::pin(async move {
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(data)
            })
        })
        .build();

    let mut client = serenity::ClientBuilder::new(&settings.token, intents)
        .framework(framework)
        .register_songbird_with(voice)
        .await?;

    let shard_manager = client.shard_manager.clone();

    tokio::select! {
        result = client.start() => {
            if let Err(error) = result {
                error!("Discord client stopped: {}", error);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down...");
        }
    }

    encore.shutdown().await;
    shard_manager.shutdown_all().await;

    Ok(())
}

async fn handle_event(
    _ctx: &serenity::Context,
    event: &FullEvent,
    framework: FrameworkContext<'_>,
    encore: &Data,
) -> Result<(), Error> {
    if let FullEvent::Ready { data_about_bot } = event {
        info!("Bot connected to Discord as {}", data_about_bot.user.name);

        encore.start_reaper();
    }

    if let FullEvent::VoiceStateUpdate { new, .. } = event {
        // The bot was kicked or the channel went away, the connection is gone.
        if new.channel_id.is_none() && new.user_id == framework.bot_id {
            if let Some(guild) = new.guild_id {
                encore.handle_external_disconnect(guild_id(guild)).await;
            }
        }
    }

    Ok(())
}
