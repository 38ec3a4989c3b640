use std::{sync::Arc, time::Duration};

use futures_util::future::join_all;
use log::{debug, info};
use tokio::{
    task::JoinHandle,
    time::{interval_at, Instant, MissedTickBehavior},
};

use crate::{Config, ConnectionManager, VoiceGateway};

/// Periodically disconnects guilds that have been idle for too long.
/// The background task stops when the reaper is dropped.
pub struct Reaper {
    handle: JoinHandle<()>,
}

impl Reaper {
    pub fn spawn<G>(connections: Arc<ConnectionManager<G>>, config: &Config) -> Self
    where
        G: VoiceGateway,
    {
        let period = config.reap_interval;
        let idle_timeout = config.idle_timeout;

        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                let reaped = reap(&connections, idle_timeout).await;
                if reaped > 0 {
                    info!("Reaped {} inactive guilds", reaped);
                }
            }
        });

        debug!(
            "Reaper started, scanning every {}s for guilds idle longer than {}s",
            period.as_secs(),
            idle_timeout.as_secs()
        );

        Self { handle }
    }
}

impl Drop for Reaper {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Scans every guild once and releases the idle ones. Returns how many were released.
///
/// Guilds are checked concurrently, a slow disconnect in one guild does not hold up the others.
pub async fn reap<G>(connections: &ConnectionManager<G>, idle_timeout: Duration) -> usize
where
    G: VoiceGateway,
{
    let tenants = connections.context().registry.snapshot();

    let evictions = tenants
        .iter()
        .map(|tenant| connections.release_if_idle(tenant, idle_timeout));

    join_all(evictions)
        .await
        .into_iter()
        .filter(|released| *released)
        .count()
}
