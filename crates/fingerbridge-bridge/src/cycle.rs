//! Capture cycle state machine.
//!
//! One cycle takes one sample from placement to a clean sensor:
//!
//! ```text
//! Idle → WaitingForFinger → Capturing → Uploading → WaitingForLift → CleaningUp → Idle
//! ```
//!
//! An abort while waiting returns straight to `Idle`. A hardware failure
//! while waiting skips to `CleaningUp`. Every upload outcome, good or bad,
//! goes through the lift wait and cleanup so the next cycle starts from a
//! known state.

use crate::channel::AbortProbe;
use crate::error::Result;
use crate::presence::{Lift, Placement, PresenceMonitor};
use crate::reclaim::{ReclaimReport, Reclaimer};
use fingerbridge_core::{Error, JobMode};
use fingerbridge_hardware::{HardwareError, SensorDriver, SerialLink, Signal, StatusIndicator};
use fingerbridge_network::{UploadClient, UploadError, UploadRequest, UploadResult};
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Transitions kept for diagnostics.
const MAX_HISTORY_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CycleState {
    Idle,
    WaitingForFinger,
    Capturing,
    Uploading,
    WaitingForLift,
    CleaningUp,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleState::Idle => "Idle",
            CycleState::WaitingForFinger => "WaitingForFinger",
            CycleState::Capturing => "Capturing",
            CycleState::Uploading => "Uploading",
            CycleState::WaitingForLift => "WaitingForLift",
            CycleState::CleaningUp => "CleaningUp",
        };
        f.write_str(name)
    }
}

impl CycleState {
    /// Check whether `target` may follow this state.
    ///
    /// ```
    /// use fingerbridge_bridge::CycleState;
    ///
    /// assert!(CycleState::Idle.can_transition_to(&CycleState::WaitingForFinger));
    /// assert!(!CycleState::Idle.can_transition_to(&CycleState::Uploading));
    /// ```
    pub fn can_transition_to(&self, target: &CycleState) -> bool {
        matches!(
            (self, target),
            (CycleState::Idle, CycleState::WaitingForFinger)
                | (
                    CycleState::WaitingForFinger,
                    CycleState::Capturing | CycleState::Idle | CycleState::CleaningUp
                )
                | (CycleState::Capturing, CycleState::Uploading)
                | (CycleState::Uploading, CycleState::WaitingForLift)
                | (CycleState::WaitingForLift, CycleState::CleaningUp)
                | (CycleState::CleaningUp, CycleState::Idle)
        )
    }

    /// Signal shown on entering this state, if any.
    pub fn entry_signal(&self) -> Option<Signal> {
        match self {
            CycleState::WaitingForFinger => Some(Signal::Ready),
            CycleState::Capturing => Some(Signal::Off),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CycleTransition {
    pub from: CycleState,
    pub to: CycleState,
    pub timestamp: Instant,
}

/// Transition bookkeeping for one runner.
#[derive(Debug)]
pub struct CycleMachine {
    current: CycleState,
    entered_at: Instant,
    history: VecDeque<CycleTransition>,
}

impl Default for CycleMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleMachine {
    pub fn new() -> Self {
        Self {
            current: CycleState::Idle,
            entered_at: Instant::now(),
            history: VecDeque::with_capacity(MAX_HISTORY_SIZE),
        }
    }

    pub fn current_state(&self) -> CycleState {
        self.current
    }

    pub fn time_in_current_state(&self) -> Duration {
        self.entered_at.elapsed()
    }

    /// Most recent transitions, oldest first.
    pub fn history(&self) -> &VecDeque<CycleTransition> {
        &self.history
    }

    /// Move to `target`.
    ///
    /// # Errors
    ///
    /// `Error::InvalidStateTransition` if `target` cannot follow the current
    /// state; the machine is left unchanged.
    pub fn transition_to(&mut self, target: CycleState) -> fingerbridge_core::Result<()> {
        if !self.current.can_transition_to(&target) {
            return Err(Error::InvalidStateTransition {
                from: self.current.to_string(),
                to: target.to_string(),
            });
        }
        if self.history.len() == MAX_HISTORY_SIZE {
            self.history.pop_front();
        }
        self.history.push_back(CycleTransition {
            from: self.current,
            to: target,
            timestamp: Instant::now(),
        });
        debug!(from = %self.current, to = %target, "Cycle transition");
        self.current = target;
        self.entered_at = Instant::now();
        Ok(())
    }
}

/// Why a sample did not count.
#[derive(Debug)]
pub enum CycleFailure {
    /// The sensor failed before an upload began.
    Hardware(HardwareError),
    /// The upload did not complete, including sensor errors mid-stream.
    Upload(UploadError),
    /// The service answered with a non-2xx status.
    Rejected(UploadResult),
    /// An identification was answered without a recognised identity.
    NoMatch(UploadResult),
}

impl fmt::Display for CycleFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleFailure::Hardware(e) => write!(f, "{e}"),
            CycleFailure::Upload(e) => write!(f, "{e}"),
            CycleFailure::Rejected(result) => {
                write!(f, "service answered status {}", result.status_code)
            }
            CycleFailure::NoMatch(_) => f.write_str("no match"),
        }
    }
}

#[derive(Debug)]
pub enum CycleOutcome {
    Success(UploadResult),
    /// The operator stopped the job; carries the reason reported back.
    Aborted(String),
    Failed(CycleFailure),
}

impl CycleOutcome {
    /// Apply the success policy for `mode` to a completed upload.
    ///
    /// Enrollment needs a 2xx status. Identification succeeds on a
    /// recognised identity in the body whatever the status; without one a
    /// 2xx is a miss and anything else a rejection.
    pub fn judge(mode: JobMode, result: UploadResult) -> Self {
        match mode {
            JobMode::Detect if result.match_identity().is_some() => CycleOutcome::Success(result),
            _ if !result.is_success() => CycleOutcome::Failed(CycleFailure::Rejected(result)),
            JobMode::Enroll => CycleOutcome::Success(result),
            JobMode::Detect => CycleOutcome::Failed(CycleFailure::NoMatch(result)),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CycleOutcome::Success(_))
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, CycleOutcome::Aborted(_))
    }

    pub fn upload_result(&self) -> Option<&UploadResult> {
        match self {
            CycleOutcome::Success(result)
            | CycleOutcome::Failed(CycleFailure::Rejected(result))
            | CycleOutcome::Failed(CycleFailure::NoMatch(result)) => Some(result),
            _ => None,
        }
    }

    pub fn match_identity(&self) -> Option<&str> {
        match self {
            CycleOutcome::Success(result) => result.match_identity(),
            _ => None,
        }
    }
}

/// Everything one cycle produced.
#[derive(Debug)]
pub struct CycleReport {
    pub filename: String,
    pub outcome: CycleOutcome,
    /// `None` when the cycle never reached the lift wait, or the wait failed.
    pub lift: Option<Lift>,
    pub reclaim: ReclaimReport,
}

/// Runs capture cycles against one sensor, indicator and service.
#[derive(Debug)]
pub struct CycleRunner<L, I> {
    sensor: SensorDriver<L>,
    indicator: I,
    client: UploadClient,
    monitor: PresenceMonitor,
    reclaimer: Reclaimer,
    machine: CycleMachine,
}

impl<L, I> CycleRunner<L, I>
where
    L: SerialLink,
    I: StatusIndicator,
{
    pub fn new(
        sensor: SensorDriver<L>,
        indicator: I,
        client: UploadClient,
        monitor: PresenceMonitor,
        reclaimer: Reclaimer,
    ) -> Self {
        Self {
            sensor,
            indicator,
            client,
            monitor,
            reclaimer,
            machine: CycleMachine::new(),
        }
    }

    pub fn state(&self) -> CycleState {
        self.machine.current_state()
    }

    pub fn machine(&self) -> &CycleMachine {
        &self.machine
    }

    pub fn sensor_mut(&mut self) -> &mut SensorDriver<L> {
        &mut self.sensor
    }

    pub fn client(&self) -> &UploadClient {
        &self.client
    }

    /// Show the ready signal once the bridge is up, before any job arrives.
    pub async fn announce_ready(&mut self) {
        self.show(Signal::Ready).await;
    }

    /// Run one cycle for `request`.
    ///
    /// Sample failures end up in the report's outcome; the error path is
    /// reserved for a broken state machine.
    pub async fn run<P: AbortProbe>(
        &mut self,
        request: &UploadRequest,
        probe: &mut P,
    ) -> Result<CycleReport> {
        let filename = request.filename().to_string();
        self.enter(CycleState::WaitingForFinger).await?;

        match self.monitor.wait_for_finger(&mut self.sensor, probe).await {
            Ok(Placement::Placed) => {}
            Ok(Placement::Aborted) => {
                info!(%filename, "Cycle aborted while waiting for finger");
                self.enter(CycleState::Idle).await?;
                return Ok(CycleReport {
                    filename,
                    outcome: CycleOutcome::Aborted("aborted".to_string()),
                    lift: None,
                    reclaim: ReclaimReport::default(),
                });
            }
            Err(e) => {
                warn!(%filename, error = %e, "Sensor failed while waiting for finger");
                self.show(Signal::Failure).await;
                let reclaim = self.clean_up().await?;
                return Ok(CycleReport {
                    filename,
                    outcome: CycleOutcome::Failed(CycleFailure::Hardware(e)),
                    lift: None,
                    reclaim,
                });
            }
        }

        self.enter(CycleState::Capturing).await?;
        self.enter(CycleState::Uploading).await?;
        let outcome = match self.client.upload_from_sensor(request, &mut self.sensor).await {
            Ok(result) => CycleOutcome::judge(request.mode(), result),
            Err(e) => CycleOutcome::Failed(CycleFailure::Upload(e)),
        };

        match &outcome {
            CycleOutcome::Success(result) => {
                info!(%filename, status = result.status_code, "Sample accepted");
                self.show(Signal::Success).await;
            }
            CycleOutcome::Failed(failure) => {
                warn!(%filename, reason = %failure, "Sample failed");
                self.show(Signal::Failure).await;
                if matches!(failure, CycleFailure::Upload(_)) {
                    // An interrupted download keeps streaming.
                    match self.sensor.drain().await {
                        Ok(drained) => debug!(drained, "Drained link after failed upload"),
                        Err(e) => warn!(error = %e, "Drain after failed upload failed"),
                    }
                }
            }
            CycleOutcome::Aborted(_) => {}
        }

        self.enter(CycleState::WaitingForLift).await?;
        let lift = match self.monitor.wait_for_lift(&mut self.sensor).await {
            Ok(lift) => Some(lift),
            Err(e) => {
                warn!(error = %e, "Lift wait failed");
                None
            }
        };

        let reclaim = self.clean_up().await?;
        info!(
            %filename,
            success = outcome.is_success(),
            lift = ?lift,
            drained = reclaim.drained_bytes,
            "Cycle complete"
        );

        Ok(CycleReport {
            filename,
            outcome,
            lift,
            reclaim,
        })
    }

    async fn clean_up(&mut self) -> Result<ReclaimReport> {
        self.enter(CycleState::CleaningUp).await?;
        let report = self.reclaimer.reclaim(&mut self.sensor, &self.monitor).await;
        self.enter(CycleState::Idle).await?;
        Ok(report)
    }

    async fn enter(&mut self, state: CycleState) -> Result<()> {
        self.machine.transition_to(state)?;
        if let Some(signal) = state.entry_signal() {
            self.show(signal).await;
        }
        Ok(())
    }

    async fn show(&mut self, signal: Signal) {
        if let Err(e) = self.indicator.signal(signal).await {
            warn!(%signal, error = %e, "Indicator update failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use rstest::rstest;

    #[rstest]
    #[case(CycleState::Idle, CycleState::WaitingForFinger)]
    #[case(CycleState::WaitingForFinger, CycleState::Capturing)]
    #[case(CycleState::WaitingForFinger, CycleState::Idle)]
    #[case(CycleState::WaitingForFinger, CycleState::CleaningUp)]
    #[case(CycleState::Capturing, CycleState::Uploading)]
    #[case(CycleState::Uploading, CycleState::WaitingForLift)]
    #[case(CycleState::WaitingForLift, CycleState::CleaningUp)]
    #[case(CycleState::CleaningUp, CycleState::Idle)]
    fn test_valid_transitions(#[case] from: CycleState, #[case] to: CycleState) {
        assert!(from.can_transition_to(&to));
    }

    #[rstest]
    #[case(CycleState::Idle, CycleState::Capturing)]
    #[case(CycleState::Capturing, CycleState::Idle)]
    #[case(CycleState::Uploading, CycleState::Idle)]
    #[case(CycleState::Uploading, CycleState::CleaningUp)]
    #[case(CycleState::WaitingForLift, CycleState::Idle)]
    #[case(CycleState::CleaningUp, CycleState::WaitingForFinger)]
    fn test_invalid_transitions(#[case] from: CycleState, #[case] to: CycleState) {
        assert!(!from.can_transition_to(&to));
    }

    #[test]
    fn test_machine_records_history() {
        let mut machine = CycleMachine::new();
        for state in [
            CycleState::WaitingForFinger,
            CycleState::Capturing,
            CycleState::Uploading,
            CycleState::WaitingForLift,
            CycleState::CleaningUp,
            CycleState::Idle,
        ] {
            machine.transition_to(state).unwrap();
        }
        assert_eq!(machine.current_state(), CycleState::Idle);
        assert_eq!(machine.history().len(), 6);
        assert_eq!(machine.history()[0].from, CycleState::Idle);
        assert_eq!(machine.history()[5].to, CycleState::Idle);
    }

    #[test]
    fn test_machine_rejects_invalid_transition() {
        let mut machine = CycleMachine::new();
        let err = machine.transition_to(CycleState::Uploading).unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
        assert_eq!(machine.current_state(), CycleState::Idle);
        assert!(machine.history().is_empty());
    }

    #[test]
    fn test_history_is_bounded() {
        let mut machine = CycleMachine::new();
        for _ in 0..MAX_HISTORY_SIZE {
            machine.transition_to(CycleState::WaitingForFinger).unwrap();
            machine.transition_to(CycleState::Idle).unwrap();
        }
        assert_eq!(machine.history().len(), MAX_HISTORY_SIZE);
    }

    fn result(status: u16, body: &str) -> UploadResult {
        UploadResult::new(status, Bytes::copy_from_slice(body.as_bytes()))
    }

    #[test]
    fn test_enroll_needs_2xx() {
        assert!(CycleOutcome::judge(JobMode::Enroll, result(201, "")).is_success());
        assert!(matches!(
            CycleOutcome::judge(JobMode::Enroll, result(500, "")),
            CycleOutcome::Failed(CycleFailure::Rejected(_))
        ));
    }

    #[test]
    fn test_detect_needs_identity_or_2xx() {
        let matched = CycleOutcome::judge(JobMode::Detect, result(200, r#"{"match_id":"7"}"#));
        assert_eq!(matched.match_identity(), Some("7"));

        assert!(matches!(
            CycleOutcome::judge(JobMode::Detect, result(200, r#"{"score":0.2}"#)),
            CycleOutcome::Failed(CycleFailure::NoMatch(_))
        ));
        assert!(matches!(
            CycleOutcome::judge(JobMode::Detect, result(404, r#"{"error":"unknown"}"#)),
            CycleOutcome::Failed(CycleFailure::Rejected(_))
        ));
    }

    #[test]
    fn test_detect_identity_wins_over_status() {
        let matched = CycleOutcome::judge(JobMode::Detect, result(404, r#"{"match_id":"7"}"#));
        assert!(matched.is_success());
        assert_eq!(matched.match_identity(), Some("7"));

        assert!(matches!(
            CycleOutcome::judge(JobMode::Enroll, result(404, r#"{"match_id":"7"}"#)),
            CycleOutcome::Failed(CycleFailure::Rejected(_))
        ));
    }

    #[test]
    fn test_failure_messages() {
        assert_eq!(
            CycleFailure::Rejected(result(503, "")).to_string(),
            "service answered status 503"
        );
        assert_eq!(CycleFailure::NoMatch(result(200, "")).to_string(), "no match");
    }
}
