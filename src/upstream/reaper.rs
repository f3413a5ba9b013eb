//! Periodic release of idle upstream connections.
//!
//! # Responsibilities
//! - Tick every `idle_reap_interval_secs`
//! - Swap a fresh client into the shared slot so the old pool drains
//! - Exit when the shutdown signal fires

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::{self, Instant};

use crate::upstream::UpstreamClient;

pub struct IdleReaper {
    client: Arc<UpstreamClient>,
    interval: Duration,
}

impl IdleReaper {
    pub fn new(client: Arc<UpstreamClient>, interval: Duration) -> Self {
        Self { client, interval }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            "Idle connection reaper starting"
        );

        // first tick one full interval from now, not immediately
        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.client.refresh() {
                        Ok(()) => tracing::debug!("Upstream connection pool recycled"),
                        Err(e) => tracing::warn!(error = %e, "Failed to rebuild upstream client"),
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Idle connection reaper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
