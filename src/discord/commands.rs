use encore_core::{CommandResult, Reply, Request};
use log::warn;
use poise::CreateReply;

use super::{channel_id, guild_id, CommandList, Context, Error};

/// Builds the caller's context from the cache. The cache guard is released before returning.
fn request(ctx: &Context<'_>) -> Request {
    let voice_channel = ctx.guild().and_then(|guild| {
        guild
            .voice_states
            .get(&ctx.author().id)
            .and_then(|state| state.channel_id)
    });

    Request {
        guild_id: ctx.guild_id().map(guild_id),
        voice_channel: voice_channel.map(channel_id),
        reply_channel: channel_id(ctx.channel_id()),
    }
}

async fn respond(ctx: Context<'_>, result: CommandResult<Reply>) -> Result<(), Error> {
    let (content, ephemeral) = match result {
        Ok(reply) => (reply.to_string(), reply.is_ephemeral()),
        Err(error) => {
            warn!("/{} failed: {:?}", ctx.command().name, error);
            (error.to_string(), true)
        }
    };

    ctx.send(CreateReply::default().content(content).ephemeral(ephemeral))
        .await?;

    Ok(())
}

/// Like [respond], for a command that deferred publicly. An error would inherit the
/// public deferral, so the placeholder is deleted and the error sent to the caller alone.
async fn respond_deferred(ctx: Context<'_>, result: CommandResult<Reply>) -> Result<(), Error> {
    if result.is_err() {
        if let poise::Context::Application(app) = ctx {
            app.interaction.delete_response(ctx.http()).await?;
        }
    }

    respond(ctx, result).await
}

/// Join your voice channel
#[poise::command(slash_command)]
async fn join(ctx: Context<'_>) -> Result<(), Error> {
    let request = request(&ctx);
    let result = ctx.data().join(&request).await;

    respond(ctx, result).await
}

/// Leave the voice channel and clear the queue
#[poise::command(slash_command)]
async fn leave(ctx: Context<'_>) -> Result<(), Error> {
    let request = request(&ctx);
    let result = ctx.data().leave(&request).await;

    respond(ctx, result).await
}

/// Play a song, or add it to the queue
#[poise::command(slash_command)]
async fn play(
    ctx: Context<'_>,
    #[description = "A URL or a search query"] query: String,
) -> Result<(), Error> {
    let request = request(&ctx);

    // Rejected before deferring, so the reply can still be ephemeral.
    if let Err(error) = request.voice_target() {
        return respond(ctx, Err(error)).await;
    }

    // Resolving can take a while, longer than Discord waits for a response.
    ctx.defer().await?;

    let result = ctx.data().play(&request, &query).await;

    respond_deferred(ctx, result).await
}

/// Skip the current song
#[poise::command(slash_command)]
async fn skip(ctx: Context<'_>) -> Result<(), Error> {
    let request = request(&ctx);
    let result = ctx.data().skip(&request).await;

    respond(ctx, result).await
}

/// Stop playback and clear the queue
#[poise::command(slash_command)]
async fn stop(ctx: Context<'_>) -> Result<(), Error> {
    let request = request(&ctx);
    let result = ctx.data().stop(&request).await;

    respond(ctx, result).await
}

/// Show the queued songs
#[poise::command(slash_command)]
async fn queue(ctx: Context<'_>) -> Result<(), Error> {
    let result = ctx.data().queue(&request(&ctx));

    respond(ctx, result).await
}

/// Remove a song from the queue
#[poise::command(slash_command)]
async fn remove(
    ctx: Context<'_>,
    #[description = "Position in the queue, starting at 1"] index: i64,
) -> Result<(), Error> {
    let result = ctx.data().remove(&request(&ctx), index);

    respond(ctx, result).await
}

/// Clear the queue, keeping the current song
#[poise::command(slash_command, rename = "clearqueue")]
async fn clear_queue(ctx: Context<'_>) -> Result<(), Error> {
    let result = ctx.data().clear_queue(&request(&ctx));

    respond(ctx, result).await
}

pub fn commands() -> CommandList {
    vec![
        join(),
        leave(),
        play(),
        skip(),
        stop(),
        queue(),
        remove(),
        clear_queue(),
    ]
}
