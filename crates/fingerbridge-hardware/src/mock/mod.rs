//! Mock device implementations for testing and development.
//!
//! This module provides a simulated sensor module that answers the packet
//! protocol over an in-memory link, and an indicator that records every
//! signal. Both come with a handle for driving them from a test.

pub mod indicator;
pub mod sensor;

// Re-export commonly used types
pub use indicator::{MockIndicator, MockIndicatorHandle};
pub use sensor::{MockSensorConfig, MockSensorHandle, MockSensorLink};
