//! Mock status indicator recording every signal.

use crate::Result;
use crate::traits::{Signal, StatusIndicator};
use std::sync::{Arc, Mutex, PoisonError};

/// Indicator that remembers what it was told.
///
/// # Examples
///
/// ```
/// use fingerbridge_hardware::mock::MockIndicator;
/// use fingerbridge_hardware::{Signal, StatusIndicator};
///
/// #[tokio::main]
/// async fn main() -> fingerbridge_hardware::Result<()> {
///     let (mut indicator, handle) = MockIndicator::new();
///     indicator.signal(Signal::Ready).await?;
///     assert_eq!(handle.signals(), vec![Signal::Ready]);
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockIndicator {
    signals: Arc<Mutex<Vec<Signal>>>,
}

impl MockIndicator {
    pub fn new() -> (Self, MockIndicatorHandle) {
        let signals = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                signals: Arc::clone(&signals),
            },
            MockIndicatorHandle { signals },
        )
    }
}

impl StatusIndicator for MockIndicator {
    async fn signal(&mut self, signal: Signal) -> Result<()> {
        self.signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(signal);
        Ok(())
    }
}

/// Handle for inspecting a [`MockIndicator`].
#[derive(Debug, Clone)]
pub struct MockIndicatorHandle {
    signals: Arc<Mutex<Vec<Signal>>>,
}

impl MockIndicatorHandle {
    /// Every signal received so far, oldest first.
    pub fn signals(&self) -> Vec<Signal> {
        self.signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Only the `Success` and `Failure` signals, oldest first.
    pub fn outcomes(&self) -> Vec<Signal> {
        self.signals()
            .into_iter()
            .filter(|s| matches!(s, Signal::Success | Signal::Failure))
            .collect()
    }

    pub fn clear(&self) {
        self.signals
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
