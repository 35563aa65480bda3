//! Finger presence monitor.
//!
//! Presence is sampled with the module's capture query. Arming requires the
//! window to be clear for a quiet period first, so a finger left on the
//! glass from the previous cycle is never taken as a new placement.

use crate::channel::{AbortProbe, NeverAbort};
use fingerbridge_core::constants::{
    DEFAULT_IDLE_POLL_MS, DEFAULT_LIFT_POLL_MS, DEFAULT_LIFT_TIMEOUT_MS,
    DEFAULT_POLL_INTERVAL_MS, DEFAULT_QUIET_PERIOD_MS,
};
use fingerbridge_hardware::{Result, SensorDriver, SerialLink};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Poll periods and bounds used by the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceTiming {
    /// Continuous absence required before arming.
    pub quiet_period: Duration,
    /// Poll period while checking for a clear window.
    pub idle_poll: Duration,
    /// Poll period while waiting for a placement.
    pub poll_interval: Duration,
    /// Poll period while waiting for a lift.
    pub lift_poll: Duration,
    pub lift_timeout: Duration,
}

impl Default for PresenceTiming {
    fn default() -> Self {
        Self {
            quiet_period: Duration::from_millis(DEFAULT_QUIET_PERIOD_MS),
            idle_poll: Duration::from_millis(DEFAULT_IDLE_POLL_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            lift_poll: Duration::from_millis(DEFAULT_LIFT_POLL_MS),
            lift_timeout: Duration::from_millis(DEFAULT_LIFT_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    Placed,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lift {
    Lifted,
    TimedOut,
}

impl std::fmt::Display for Lift {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lift::Lifted => f.write_str("lifted"),
            Lift::TimedOut => f.write_str("timed out"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reading {
    Present,
    Absent,
    /// The query was garbled; the link has been drained.
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Idle {
    Settled,
    Aborted,
    TimedOut,
}

#[derive(Debug, Clone, Default)]
pub struct PresenceMonitor {
    timing: PresenceTiming,
}

impl PresenceMonitor {
    pub fn new(timing: PresenceTiming) -> Self {
        Self { timing }
    }

    pub fn timing(&self) -> &PresenceTiming {
        &self.timing
    }

    /// Wait until the window has been clear for the quiet period, giving up
    /// after `limit`. Returns whether the window settled.
    pub async fn ensure_idle<L: SerialLink>(
        &self,
        sensor: &mut SensorDriver<L>,
        limit: Duration,
    ) -> Result<bool> {
        let idle = self.quiet_window(sensor, &mut NeverAbort, Some(limit)).await?;
        Ok(idle == Idle::Settled)
    }

    /// Arm on a clear window, then wait for a finger.
    ///
    /// `probe` is checked before every query, so an abort never consumes a
    /// placement.
    pub async fn wait_for_finger<L, P>(
        &self,
        sensor: &mut SensorDriver<L>,
        probe: &mut P,
    ) -> Result<Placement>
    where
        L: SerialLink,
        P: AbortProbe,
    {
        match self.quiet_window(sensor, probe, None).await? {
            Idle::Aborted => return Ok(Placement::Aborted),
            Idle::Settled | Idle::TimedOut => {}
        }

        loop {
            if probe.abort_requested() {
                return Ok(Placement::Aborted);
            }
            if self.read(sensor).await? == Reading::Present {
                info!("Finger detected");
                return Ok(Placement::Placed);
            }
            tokio::time::sleep(self.timing.poll_interval).await;
        }
    }

    /// Wait for the finger to leave the window.
    pub async fn wait_for_lift<L: SerialLink>(&self, sensor: &mut SensorDriver<L>) -> Result<Lift> {
        let deadline = Instant::now() + self.timing.lift_timeout;
        loop {
            if self.read(sensor).await? == Reading::Absent {
                debug!("Finger lifted");
                return Ok(Lift::Lifted);
            }
            if Instant::now() >= deadline {
                warn!(
                    timeout_ms = self.timing.lift_timeout.as_millis() as u64,
                    "Finger not lifted in time"
                );
                return Ok(Lift::TimedOut);
            }
            tokio::time::sleep(self.timing.lift_poll).await;
        }
    }

    async fn quiet_window<L, P>(
        &self,
        sensor: &mut SensorDriver<L>,
        probe: &mut P,
        limit: Option<Duration>,
    ) -> Result<Idle>
    where
        L: SerialLink,
        P: AbortProbe,
    {
        let started = Instant::now();
        let mut clear_since: Option<Instant> = None;

        loop {
            if probe.abort_requested() {
                return Ok(Idle::Aborted);
            }
            if self.read(sensor).await? == Reading::Absent {
                let since = *clear_since.get_or_insert_with(Instant::now);
                if since.elapsed() >= self.timing.quiet_period {
                    debug!("Sensor window clear");
                    return Ok(Idle::Settled);
                }
            } else {
                clear_since = None;
            }
            if limit.is_some_and(|limit| started.elapsed() >= limit) {
                return Ok(Idle::TimedOut);
            }
            tokio::time::sleep(self.timing.idle_poll).await;
        }
    }

    async fn read<L: SerialLink>(&self, sensor: &mut SensorDriver<L>) -> Result<Reading> {
        match sensor.finger_present().await {
            Ok(true) => Ok(Reading::Present),
            Ok(false) => Ok(Reading::Absent),
            Err(e) if e.is_out_of_step() => {
                let drained = sensor.drain().await?;
                warn!(error = %e, drained, "Presence query out of step");
                Ok(Reading::Unknown)
            }
            Err(e) => Err(e),
        }
    }
}
