//! Command orchestrator.
//!
//! Reads one request line at a time, runs the capture cycles it asks for
//! and writes exactly one response line per request. Blank lines are
//! skipped. The loop ends when the input closes.

use crate::channel::CommandChannel;
use crate::cycle::{CycleFailure, CycleOutcome, CycleRunner};
use crate::error::Result;
use fingerbridge_core::{CaptureJob, FingerLabel, Identity, SensorGeometry};
use fingerbridge_hardware::{SerialLink, StatusIndicator};
use fingerbridge_network::UploadRequest;
use fingerbridge_protocol::{HostCommand, HostCommandError, HostResponse};
use futures::SinkExt;
use std::num::NonZeroU32;
use tokio::io::AsyncWrite;
use tokio_util::codec::{FramedWrite, LinesCodec};
use tracing::{error, info, warn};

/// Fingers and sample count captured for every enrollment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentPlan {
    pub fingers: Vec<FingerLabel>,
    pub samples_per_finger: NonZeroU32,
}

pub struct Orchestrator<W, L, I> {
    commands: CommandChannel,
    output: FramedWrite<W, LinesCodec>,
    runner: CycleRunner<L, I>,
    geometry: SensorGeometry,
    plan: EnrollmentPlan,
    next_detect: u64,
}

impl<W, L, I> Orchestrator<W, L, I>
where
    W: AsyncWrite + Unpin,
    L: SerialLink,
    I: StatusIndicator,
{
    pub fn new(
        commands: CommandChannel,
        output: W,
        runner: CycleRunner<L, I>,
        geometry: SensorGeometry,
        plan: EnrollmentPlan,
    ) -> Self {
        Self {
            commands,
            output: FramedWrite::new(output, LinesCodec::new()),
            runner,
            geometry,
            plan,
            next_detect: 1,
        }
    }

    pub fn runner(&self) -> &CycleRunner<L, I> {
        &self.runner
    }

    /// Number the next DETECT will use in its filename.
    pub fn next_detect(&self) -> u64 {
        self.next_detect
    }

    /// Serve requests until the input closes.
    ///
    /// # Errors
    ///
    /// Only a failure to write a response ends the loop early.
    pub async fn run(&mut self) -> Result<()> {
        info!("Waiting for commands");
        while let Some(line) = self.commands.next_line().await {
            let response = match line {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => self.handle_line(&line).await,
                Err(e) => {
                    warn!(error = %e, "Unreadable command line");
                    HostResponse::from(HostCommandError::InvalidJson)
                }
            };
            self.respond(&response).await?;
        }
        info!("Command input closed");
        Ok(())
    }

    /// Handle one request line and build its response.
    pub async fn handle_line(&mut self, line: &str) -> HostResponse {
        match HostCommand::parse(line) {
            Ok(HostCommand::Enroll { identity }) => self.enroll(identity).await,
            Ok(HostCommand::Detect) => self.detect().await,
            Err(e) => {
                warn!(%line, error = %e, "Rejected command");
                e.into()
            }
        }
    }

    async fn enroll(&mut self, identity: Identity) -> HostResponse {
        let job = match CaptureJob::enroll(
            identity.clone(),
            self.plan.fingers.clone(),
            self.plan.samples_per_finger,
        ) {
            Ok(job) => job,
            Err(e) => return HostResponse::enroll_error(&identity, e.to_string()),
        };
        let total = job.total_samples();
        info!(nid = %identity, total, "Enrollment started");

        let mut failed = 0u32;
        for slot in job.slots() {
            let Some(finger) = slot.finger.as_ref() else {
                continue;
            };
            let request = UploadRequest::enroll(self.geometry, &identity, finger, slot.number);
            info!(
                nid = %identity,
                %finger,
                sample = slot.number,
                ordinal = slot.ordinal,
                total,
                "Place finger"
            );

            match self.runner.run(&request, &mut self.commands).await {
                Ok(report) => match report.outcome {
                    CycleOutcome::Success(_) => {}
                    CycleOutcome::Aborted(reason) => {
                        info!(nid = %identity, completed = slot.ordinal - 1, "Enrollment aborted");
                        return HostResponse::enroll_error(&identity, reason);
                    }
                    CycleOutcome::Failed(_) => failed += 1,
                },
                Err(e) => {
                    error!(nid = %identity, error = %e, "Enrollment stopped");
                    return HostResponse::enroll_error(&identity, e.to_string());
                }
            }
        }

        if failed == 0 {
            info!(nid = %identity, total, "Enrollment complete");
            HostResponse::enroll_success(&identity)
        } else {
            warn!(nid = %identity, failed, total, "Enrollment finished with failures");
            HostResponse::enroll_error(&identity, format!("{failed} of {total} samples failed"))
        }
    }

    async fn detect(&mut self) -> HostResponse {
        let n = self.next_detect;
        self.next_detect += 1;
        let request = UploadRequest::detect(self.geometry, n);
        info!(filename = request.filename(), "Identification started");

        let report = match self.runner.run(&request, &mut self.commands).await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Identification stopped");
                return HostResponse::detect_error(e.to_string());
            }
        };

        match report.outcome {
            CycleOutcome::Success(result) => match result.match_identity() {
                Some(identity) => {
                    info!(nid = identity, "Identified");
                    HostResponse::detect_match(identity)
                }
                None => HostResponse::detect_no_match(),
            },
            CycleOutcome::Aborted(reason) => HostResponse::detect_error(reason),
            CycleOutcome::Failed(CycleFailure::Rejected(_) | CycleFailure::NoMatch(_)) => {
                HostResponse::detect_no_match()
            }
            CycleOutcome::Failed(failure) => HostResponse::detect_error(failure.to_string()),
        }
    }

    async fn respond(&mut self, response: &HostResponse) -> Result<()> {
        self.output.send(response.to_line()).await?;
        Ok(())
    }
}
