//! Sensor-to-service bridge.
//!
//! Ties the sensor driver and the upload client into capture cycles and
//! serves host commands over a line-oriented channel:
//!
//! - [`CommandChannel`] queues request lines and doubles as the abort probe
//! - [`PresenceMonitor`] arms on a clear window and waits for place and lift
//! - [`CycleRunner`] drives one sample through the [`CycleState`] machine
//! - [`Reclaimer`] returns the sensor to a known state after every cycle
//! - [`Orchestrator`] maps requests to cycles and writes one response each
//! - [`BridgeConfig`] loads the TOML configuration

pub mod channel;
pub mod config;
pub mod cycle;
pub mod error;
pub mod orchestrator;
pub mod presence;
pub mod reclaim;

pub use channel::{AbortProbe, CommandChannel, NeverAbort};
pub use config::{BridgeConfig, ConfigError};
pub use cycle::{
    CycleFailure, CycleMachine, CycleOutcome, CycleReport, CycleRunner, CycleState,
    CycleTransition,
};
pub use error::{BridgeError, Result};
pub use orchestrator::{EnrollmentPlan, Orchestrator};
pub use presence::{Lift, Placement, PresenceMonitor, PresenceTiming};
pub use reclaim::{ReclaimReport, Reclaimer};
