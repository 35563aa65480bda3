//! Post-cycle cleanup.
//!
//! After every cycle, whatever the outcome, the link is drained of stray
//! bytes, the window is checked clear again and the module is given a short
//! settle before the next command goes out.

use crate::presence::PresenceMonitor;
use fingerbridge_core::constants::{DEFAULT_LIFT_TIMEOUT_MS, DEFAULT_SETTLE_MS};
use fingerbridge_hardware::{SensorDriver, SerialLink};
use std::time::Duration;
use tracing::{debug, warn};

/// What one cleanup pass found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReclaimReport {
    pub drained_bytes: usize,
    /// Whether the window settled clear within the limit.
    pub idle: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reclaimer {
    settle: Duration,
    idle_limit: Duration,
}

impl Default for Reclaimer {
    fn default() -> Self {
        Self::new(
            Duration::from_millis(DEFAULT_SETTLE_MS),
            Duration::from_millis(DEFAULT_LIFT_TIMEOUT_MS),
        )
    }
}

impl Reclaimer {
    pub fn new(settle: Duration, idle_limit: Duration) -> Self {
        Self { settle, idle_limit }
    }

    /// Run one cleanup pass. Failures are logged and never returned: a
    /// cycle that already has an outcome keeps it.
    pub async fn reclaim<L: SerialLink>(
        &self,
        sensor: &mut SensorDriver<L>,
        monitor: &PresenceMonitor,
    ) -> ReclaimReport {
        let mut report = ReclaimReport::default();

        match sensor.drain().await {
            Ok(n) => report.drained_bytes = n,
            Err(e) => warn!(error = %e, "Drain during cleanup failed"),
        }

        match monitor.ensure_idle(sensor, self.idle_limit).await {
            Ok(idle) => report.idle = idle,
            Err(e) => warn!(error = %e, "Idle check during cleanup failed"),
        }
        if !report.idle {
            warn!(
                limit_ms = self.idle_limit.as_millis() as u64,
                "Sensor window not clear after cleanup"
            );
        }

        tokio::time::sleep(self.settle).await;
        debug!(drained = report.drained_bytes, idle = report.idle, "Cleanup done");
        report
    }
}
