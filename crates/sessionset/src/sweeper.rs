//! Background expiry sweeps.

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::Result;
use crate::registry::SessionRegistry;

/// Periodically prunes a [`SessionRegistry`] on the tokio runtime.
///
/// Every `sweep_interval` the registry's lazy sweep runs. With
/// `full_rebuild_every = Some(n)`, every nth tick runs the full sweep
/// instead, which repairs any drift between the map and the order.
pub struct Sweeper;

impl Sweeper {
    /// Start sweeping. Must be called from within a tokio runtime.
    ///
    /// The registry's configuration is validated first. With
    /// `enable_sweeper = false` no task is started and the returned handle
    /// is already finished.
    pub fn spawn(registry: SessionRegistry) -> Result<SweeperHandle> {
        registry.config().validate()?;

        let cancel = CancellationToken::new();
        if !registry.config().enable_sweeper {
            debug!("Session sweeper disabled");
            return Ok(SweeperHandle { cancel, task: None });
        }
        let token = cancel.clone();
        let period = registry.config().sweep_interval;
        let full_every = registry.config().full_rebuild_every;

        let task = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick completes immediately.
            ticker.tick().await;

            info!(interval_ms = period.as_millis() as u64, "Session sweeper started");
            let mut ticks: u64 = 0;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        ticks += 1;
                        let full = full_every.is_some_and(|n| ticks % u64::from(n) == 0);
                        let report = if full {
                            registry.full_sweep()
                        } else {
                            registry.sweep()
                        };
                        debug!(
                            full,
                            evicted = report.evicted,
                            remaining = report.remaining,
                            "Sweep finished"
                        );
                    }
                }
            }
            debug!("Session sweeper stopped");
        });

        Ok(SweeperHandle {
            cancel,
            task: Some(task),
        })
    }
}

/// Handle to a running [`Sweeper`]. Dropping it stops the sweeper.
pub struct SweeperHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for it to exit.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }

    /// Whether the sweep task has exited (or was never started).
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|t| t.is_finished())
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
