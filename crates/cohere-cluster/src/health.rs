use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use cohere_core::HealthConfig;

use crate::registry::NodeRegistry;

/// Periodic driver of [`NodeRegistry::health_check_servers`].
pub struct HealthMonitor {
    registry: Arc<NodeRegistry>,
    config: HealthConfig,
}

impl HealthMonitor {
    pub fn new(registry: Arc<NodeRegistry>, config: HealthConfig) -> Self {
        Self { registry, config }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    /// Sweep every `interval` until `shutdown` flips to true. The first sweep
    /// happens one interval after start.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let period = self.config.interval().max(Duration::from_millis(1));
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(interval_ms = self.config.interval_ms, "Health monitor started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Health monitor shutting down");
                        return;
                    }
                }
                _ = interval.tick() => {
                    if self.registry.is_empty() {
                        debug!("No registered nodes, skipping health sweep");
                        continue;
                    }
                    self.registry
                        .health_check_servers(
                            self.config.probe_timeout(),
                            self.config.failure_threshold,
                        )
                        .await;
                }
            }
        }
    }
}
