use std::sync::Arc;

use async_trait::async_trait;
use encore_core::{
    ChannelId, Completion, ConnectionError, GuildId, StreamError, VoiceConnection, VoiceGateway,
};
use log::{debug, warn};
use parking_lot::Mutex;
use poise::serenity_prelude as serenity;
use songbird::{
    error::JoinError,
    input::HttpRequest,
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler, Songbird, TrackEvent,
};

use super::{to_serenity_channel, to_serenity_guild};

/// Connects to voice channels through songbird.
pub struct SongbirdGateway {
    manager: Arc<Songbird>,
    client: reqwest::Client,
}

impl SongbirdGateway {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self {
            manager,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    type Connection = SongbirdConnection;

    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Self::Connection, ConnectionError> {
        let guild = to_serenity_guild(guild_id);

        let call = match self.manager.join(guild, to_serenity_channel(channel_id)).await {
            Ok(call) => call,
            Err(error) => {
                // A failed join can leave a half-open call behind.
                self.manager.remove(guild).await.ok();
                return Err(join_error(error));
            }
        };

        Ok(SongbirdConnection {
            guild,
            manager: self.manager.clone(),
            client: self.client.clone(),
            call,
            track: None,
        })
    }
}

/// The voice connection of a single guild.
pub struct SongbirdConnection {
    guild: serenity::GuildId,
    manager: Arc<Songbird>,
    client: reqwest::Client,
    call: Arc<tokio::sync::Mutex<Call>>,
    track: Option<TrackHandle>,
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    async fn channel_id(&self) -> Option<ChannelId> {
        let call = self.call.lock().await;

        call.current_channel()
            .map(|channel| ChannelId::new(channel.0.get()))
    }

    async fn move_to(&mut self, channel_id: ChannelId) -> Result<(), ConnectionError> {
        self.call = self
            .manager
            .join(self.guild, to_serenity_channel(channel_id))
            .await
            .map_err(join_error)?;

        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ConnectionError> {
        self.track = None;

        self.manager
            .remove(self.guild)
            .await
            .map_err(|e| ConnectionError::Disconnect(e.to_string()))
    }

    async fn start_stream(
        &mut self,
        source: &str,
        completion: Completion,
    ) -> Result<(), StreamError> {
        let input = HttpRequest::new(self.client.clone(), source.to_string());

        let handle = {
            let mut call = self.call.lock().await;
            call.stop();
            call.play_input(input.into())
        };

        let completion = Arc::new(Mutex::new(Some(completion)));

        for event in [TrackEvent::End, TrackEvent::Error] {
            let finisher = Finisher {
                completion: completion.clone(),
            };

            if let Err(error) = handle.add_event(Event::Track(event), finisher) {
                handle.stop().ok();
                return Err(StreamError::Start(error.to_string()));
            }
        }

        self.track = Some(handle);
        Ok(())
    }

    async fn stop_stream(&mut self) {
        if let Some(track) = self.track.take() {
            if let Err(error) = track.stop() {
                debug!("Track in guild {} was already stopped: {}", self.guild, error);
            }
        }
    }

    async fn is_playing(&self) -> bool {
        let Some(track) = &self.track else {
            return false;
        };

        match track.get_info().await {
            Ok(state) => matches!(state.playing, PlayMode::Play | PlayMode::Pause),
            Err(_) => false,
        }
    }
}

/// Completes a playback attempt the first time its track ends or fails.
struct Finisher {
    completion: Arc<Mutex<Option<Completion>>>,
}

#[async_trait]
impl EventHandler for Finisher {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let error = match ctx {
            EventContext::Track(tracks) => tracks.iter().find_map(|(state, _)| match &state.playing {
                PlayMode::Errored(error) => Some(StreamError::Playback(format!("{:?}", error))),
                _ => None,
            }),
            _ => None,
        };

        if let Some(completion) = self.completion.lock().take() {
            if let Some(error) = &error {
                warn!("Track of attempt {} failed: {}", completion.attempt(), error);
            }

            completion.complete(error);
        }

        Some(Event::Cancel)
    }
}

fn join_error(error: JoinError) -> ConnectionError {
    match error {
        JoinError::TimedOut => ConnectionError::Unreachable("voice connection timed out".into()),
        other => ConnectionError::Unreachable(other.to_string()),
    }
}
