use crossbeam::channel::unbounded;
use dashmap::DashMap;
use log::{debug, info};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

mod commands;
mod config;
mod connection;
mod error;
mod events;
mod queue;
mod reaper;
mod registry;
mod resolve;
mod sequencer;
mod util;
mod voice;

#[cfg(test)]
mod testing;

pub use commands::*;
pub use config::*;
pub use connection::*;
pub use error::*;
pub use events::*;
pub use queue::*;
pub use reaper::*;
pub use registry::*;
pub use resolve::*;
pub use sequencer::*;
pub use util::*;
pub use voice::*;

// Reduces verbosity
type Store<Id, T> = Arc<DashMap<Id, Arc<T>>>;

/// Plays audio into the voice channels of many guilds at once.
pub struct Orchestrator<G, R, N>
where
    G: VoiceGateway,
{
    context: OrchestratorContext<G::Connection>,
    connections: Arc<ConnectionManager<G>>,
    sequencer: Arc<Sequencer<G::Connection, N>>,
    resolver: R,
    reaper: parking_lot::Mutex<Option<Reaper>>,

    event_receiver: EventReceiver,
}

/// A type passed to the components of the orchestrator, to access shared state and emit events.
pub struct OrchestratorContext<C> {
    pub config: Config,
    pub registry: TenantRegistry<C>,
    pub queues: QueueStore,

    event_sender: EventSender,
}

impl<C> OrchestratorContext<C> {
    /// Emits an event. Nobody listening is not an error.
    pub fn emit(&self, event: TenantEvent) {
        self.event_sender.send(event).ok();
    }
}

impl<C> Clone for OrchestratorContext<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            registry: self.registry.clone(),
            queues: self.queues.clone(),
            event_sender: self.event_sender.clone(),
        }
    }
}

impl<G, R, N> Orchestrator<G, R, N>
where
    G: VoiceGateway,
    R: Resolver,
    N: Notifier,
{
    /// Creates the orchestrator. Must be called from within a tokio runtime.
    pub fn new(config: Config, gateway: G, resolver: R, notifier: N) -> Self {
        let (event_sender, event_receiver) = unbounded();
        let (completion_sender, completion_receiver) = unbounded_channel();

        let context = OrchestratorContext {
            config,
            registry: Default::default(),
            queues: Default::default(),
            event_sender,
        };

        let connections = Arc::new(ConnectionManager::new(&context, gateway));
        let sequencer = Arc::new(Sequencer::new(&context, notifier, completion_sender));

        spawn_completion_handler(Arc::downgrade(&sequencer), completion_receiver);

        Self {
            context,
            connections,
            sequencer,
            resolver,
            reaper: Default::default(),
            event_receiver,
        }
    }

    /// Starts scanning for idle guilds in the background. Does nothing if already started.
    pub fn start_reaper(&self) {
        let mut reaper = self.reaper.lock();

        if reaper.is_none() {
            *reaper = Some(Reaper::spawn(self.connections.clone(), &self.context.config));
        }
    }

    /// Stops the reaper and disconnects every guild.
    pub async fn shutdown(&self) {
        let reaper = self.reaper.lock().take();
        drop(reaper);

        info!(
            "Shutting down, releasing {} guilds",
            self.context.registry.len()
        );
        self.connections.release_all().await;
    }

    /// Forgets a guild whose voice connection was dropped by the platform rather than by us.
    pub async fn handle_external_disconnect(&self, guild_id: GuildId) -> bool {
        self.connections
            .release(guild_id, ReleaseReason::ExternalDisconnect)
            .await
    }

    /// Returns a receiver for the events emitted by the orchestrator.
    pub fn events(&self) -> EventReceiver {
        self.event_receiver.clone()
    }

    pub fn connections(&self) -> &Arc<ConnectionManager<G>> {
        &self.connections
    }

    pub fn sequencer(&self) -> &Arc<Sequencer<G::Connection, N>> {
        &self.sequencer
    }

    pub fn context(&self) -> &OrchestratorContext<G::Connection> {
        &self.context
    }
}

/// Feeds finished playback attempts back into the sequencer.
///
/// Each completion is handled on its own task so a slow guild never delays another.
fn spawn_completion_handler<C, N>(
    sequencer: Weak<Sequencer<C, N>>,
    mut receiver: UnboundedReceiver<Finished>,
) where
    C: VoiceConnection,
    N: Notifier,
{
    tokio::spawn(async move {
        while let Some(finished) = receiver.recv().await {
            let Some(sequencer) = sequencer.upgrade() else {
                break;
            };

            tokio::spawn(async move { sequencer.advance(finished).await });
        }

        debug!("Completion handler stopped");
    });
}
