//! In-memory collaborators for exercising the orchestrator without a voice platform.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    ChannelId, Completion, Config, ConnectionError, GuildId, NotifyError, Notifier,
    Orchestrator, ResolutionError, Resolved, Resolver, StreamError, Track, VoiceConnection,
    VoiceGateway,
};

pub const GUILD: GuildId = GuildId::new(1);
pub const OTHER_GUILD: GuildId = GuildId::new(2);
pub const VOICE: ChannelId = ChannelId::new(10);
pub const OTHER_VOICE: ChannelId = ChannelId::new(11);
pub const REPLY: ChannelId = ChannelId::new(20);

/// Sources containing this marker fail to start.
pub const BAD_SOURCE: &str = "broken";

pub type TestOrchestrator = Orchestrator<MockGateway, MockResolver, MockNotifier>;

pub struct Mocks {
    pub gateway: MockGateway,
    pub resolver: MockResolver,
    pub notifier: MockNotifier,
}

pub fn setup() -> (TestOrchestrator, Mocks) {
    let mocks = Mocks {
        gateway: MockGateway::default(),
        resolver: MockResolver::default(),
        notifier: MockNotifier::default(),
    };

    let orchestrator = Orchestrator::new(
        Config::default(),
        mocks.gateway.clone(),
        mocks.resolver.clone(),
        mocks.notifier.clone(),
    );

    (orchestrator, mocks)
}

pub fn track(title: &str) -> Track {
    Track {
        source: format!("source:{}", title),
        title: title.to_string(),
        reply_to: REPLY,
    }
}

/// Yields to other tasks until the condition holds, panicking if it never does.
pub async fn eventually<F>(mut condition: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..1000 {
        if condition() {
            return;
        }

        tokio::task::yield_now().await;
    }

    panic!("condition was never met");
}

#[derive(Default)]
struct GatewayState {
    connects: Vec<(GuildId, ChannelId)>,
    disconnects: Vec<GuildId>,
    refused: HashSet<ChannelId>,
    channels: HashMap<GuildId, ChannelId>,
    fail_disconnects: bool,
    started: Vec<(GuildId, String)>,
    streams: HashMap<GuildId, Completion>,
}

/// A voice gateway that records what it was asked to do.
/// Streams play until [MockGateway::finish] or a stop ends them.
#[derive(Clone, Default)]
pub struct MockGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl MockGateway {
    pub fn connects(&self) -> Vec<(GuildId, ChannelId)> {
        self.state.lock().connects.clone()
    }

    pub fn disconnects(&self) -> Vec<GuildId> {
        self.state.lock().disconnects.clone()
    }

    /// Makes connecting or moving to the channel fail.
    pub fn refuse(&self, channel_id: ChannelId) {
        self.state.lock().refused.insert(channel_id);
    }

    /// Moves the bot to another channel behind the orchestrator's back.
    pub fn drag(&self, guild_id: GuildId, channel_id: ChannelId) {
        self.state.lock().channels.insert(guild_id, channel_id);
    }

    pub fn fail_disconnects(&self) {
        self.state.lock().fail_disconnects = true;
    }

    /// The sources that started streaming, in order.
    pub fn started(&self) -> Vec<(GuildId, String)> {
        self.state.lock().started.clone()
    }

    pub fn is_streaming(&self, guild_id: GuildId) -> bool {
        self.state.lock().streams.contains_key(&guild_id)
    }

    /// Ends the stream of a guild as if the sink reached its end, or failed.
    pub fn finish(&self, guild_id: GuildId, error: Option<StreamError>) -> bool {
        let completion = self.state.lock().streams.remove(&guild_id);

        match completion {
            Some(completion) => {
                completion.complete(error);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl VoiceGateway for MockGateway {
    type Connection = MockConnection;

    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Self::Connection, ConnectionError> {
        let mut state = self.state.lock();

        if state.refused.contains(&channel_id) {
            return Err(ConnectionError::Forbidden(format!("channel {}", channel_id)));
        }

        state.connects.push((guild_id, channel_id));
        state.channels.insert(guild_id, channel_id);

        Ok(MockConnection {
            guild_id,
            state: self.state.clone(),
        })
    }
}

pub struct MockConnection {
    guild_id: GuildId,
    state: Arc<Mutex<GatewayState>>,
}

#[async_trait]
impl VoiceConnection for MockConnection {
    async fn channel_id(&self) -> Option<ChannelId> {
        self.state.lock().channels.get(&self.guild_id).copied()
    }

    async fn move_to(&mut self, channel_id: ChannelId) -> Result<(), ConnectionError> {
        let mut state = self.state.lock();

        if state.refused.contains(&channel_id) {
            return Err(ConnectionError::Forbidden(format!("channel {}", channel_id)));
        }

        state.channels.insert(self.guild_id, channel_id);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ConnectionError> {
        let mut state = self.state.lock();
        state.disconnects.push(self.guild_id);
        state.channels.remove(&self.guild_id);

        if state.fail_disconnects {
            return Err(ConnectionError::Disconnect("gateway hung up".into()));
        }

        Ok(())
    }

    async fn start_stream(
        &mut self,
        source: &str,
        completion: Completion,
    ) -> Result<(), StreamError> {
        if source.contains(BAD_SOURCE) {
            return Err(StreamError::Start(format!("cannot open {}", source)));
        }

        let previous = {
            let mut state = self.state.lock();
            state.started.push((self.guild_id, source.to_string()));
            state.streams.insert(self.guild_id, completion)
        };

        // A replaced stream ends the way a stopped one does.
        if let Some(previous) = previous {
            previous.complete(None);
        }

        Ok(())
    }

    async fn stop_stream(&mut self) {
        let completion = self.state.lock().streams.remove(&self.guild_id);

        if let Some(completion) = completion {
            completion.complete(None);
        }
    }

    async fn is_playing(&self) -> bool {
        self.state.lock().streams.contains_key(&self.guild_id)
    }
}

/// Resolves every locator to itself, after failing a configurable number of times.
#[derive(Clone, Default)]
pub struct MockResolver {
    failures: Arc<AtomicU32>,
    calls: Arc<AtomicU32>,
}

impl MockResolver {
    pub fn failing(times: u32) -> Self {
        let resolver = Self::default();
        resolver.fail_next(times);
        resolver
    }

    pub fn fail_next(&self, times: u32) {
        self.failures.store(times, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resolver for MockResolver {
    async fn resolve(&self, locator: &str) -> Result<Resolved, ResolutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let failed = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();

        if failed {
            return Err(ResolutionError::Unavailable);
        }

        Ok(Resolved {
            source: format!("source:{}", locator),
            title: locator.to_string(),
        })
    }
}

/// Collects status messages instead of sending them.
#[derive(Clone, Default)]
pub struct MockNotifier {
    sent: Arc<Mutex<Vec<(ChannelId, String)>>>,
    fail: Arc<Mutex<bool>>,
}

impl MockNotifier {
    pub fn sent(&self) -> Vec<(ChannelId, String)> {
        self.sent.lock().clone()
    }

    pub fn fail(&self) {
        *self.fail.lock() = true;
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(&self, channel_id: ChannelId, text: &str) -> Result<(), NotifyError> {
        if *self.fail.lock() {
            return Err(NotifyError("channel is gone".into()));
        }

        self.sent.lock().push((channel_id, text.to_string()));
        Ok(())
    }
}
