use crate::{
    Result,
    constants::{DEFAULT_SENSOR_HEIGHT, DEFAULT_SENSOR_WIDTH, packed_image_len},
    error::Error,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;

/// Returns true for characters that cannot travel inside a request header value.
fn is_header_unsafe(c: char) -> bool {
    c.is_control()
}

/// Opaque identifier of an enrollment subject.
///
/// The matching service treats it as an uninterpreted string. It is echoed
/// back in responses and embedded in upload headers, so control characters
/// are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    /// Create a new identity with validation.
    ///
    /// # Errors
    /// Returns `Error::InvalidIdentity` if the value is empty after trimming
    /// or contains control characters.
    pub fn new(value: &str) -> Result<Self> {
        let value = value.trim();
        if value.is_empty() {
            return Err(Error::InvalidIdentity("identity must not be empty".to_string()));
        }
        if value.chars().any(is_header_unsafe) {
            return Err(Error::InvalidIdentity(
                "identity must not contain control characters".to_string(),
            ));
        }
        Ok(Identity(value.to_string()))
    }

    /// Get the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Identity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Identity::new(s)
    }
}

impl TryFrom<String> for Identity {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Identity::new(&value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

/// Label of a finger in the enrollment plan (e.g. `thumb`, `index`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FingerLabel(String);

impl FingerLabel {
    /// Create a new finger label.
    ///
    /// Labels are normalized to lowercase.
    ///
    /// # Errors
    /// Returns `Error::InvalidFingerLabel` if the label is empty or contains
    /// anything other than ASCII letters, digits, `-` or `_`.
    pub fn new(label: &str) -> Result<Self> {
        let label = label.trim().to_ascii_lowercase();
        if label.is_empty() {
            return Err(Error::InvalidFingerLabel("label must not be empty".to_string()));
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(Error::InvalidFingerLabel(format!(
                "label '{label}' must be alphanumeric"
            )));
        }
        Ok(FingerLabel(label))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FingerLabel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for FingerLabel {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        FingerLabel::new(&value)
    }
}

impl From<FingerLabel> for String {
    fn from(label: FingerLabel) -> Self {
        label.0
    }
}

/// Image geometry of the attached sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorGeometry {
    pub width: u32,
    pub height: u32,
}

impl SensorGeometry {
    /// Create a geometry, rejecting zero or odd-area images.
    ///
    /// # Errors
    /// Returns `Error::Config` if either side is zero or the pixel count is
    /// odd (a packed image stores two pixels per byte).
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::Config(format!(
                "sensor geometry must be non-zero, got {width}x{height}"
            )));
        }
        if (u64::from(width) * u64::from(height)) % 2 != 0 {
            return Err(Error::Config(format!(
                "sensor geometry {width}x{height} has an odd pixel count"
            )));
        }
        Ok(Self { width, height })
    }

    /// Byte size of one packed image: the declared upload body length.
    #[must_use]
    pub fn packed_len(&self) -> usize {
        packed_image_len(self.width, self.height)
    }
}

impl Default for SensorGeometry {
    fn default() -> Self {
        Self {
            width: DEFAULT_SENSOR_WIDTH,
            height: DEFAULT_SENSOR_HEIGHT,
        }
    }
}

/// What a capture job asks of the matching service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobMode {
    /// Store samples under an identity.
    Enroll,
    /// Single-shot identification.
    Detect,
}

impl JobMode {
    /// Header/response token for this mode.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            JobMode::Enroll => "enroll",
            JobMode::Detect => "detect",
        }
    }

    /// Whether the service is asked to identify the sample.
    #[must_use]
    pub fn identify(&self) -> bool {
        matches!(self, JobMode::Detect)
    }
}

impl fmt::Display for JobMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One sample position inside a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleSlot {
    /// Finger being captured; `None` for identification.
    pub finger: Option<FingerLabel>,

    /// 1-based sample number for this finger.
    pub number: u32,

    /// 1-based position within the whole job.
    pub ordinal: u32,
}

/// The set of samples requested by one command.
///
/// A job with an identity is an enrollment and covers every finger in the
/// sequence `samples_per_finger` times. A job without one is a single
/// identification sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureJob {
    identity: Option<Identity>,
    finger_sequence: Vec<FingerLabel>,
    samples_per_finger: NonZeroU32,
}

impl CaptureJob {
    /// Create an enrollment job.
    ///
    /// # Errors
    /// Returns `Error::InvalidJob` if the finger sequence is empty.
    pub fn enroll(
        identity: Identity,
        finger_sequence: Vec<FingerLabel>,
        samples_per_finger: NonZeroU32,
    ) -> Result<Self> {
        if finger_sequence.is_empty() {
            return Err(Error::InvalidJob(
                "enrollment requires at least one finger".to_string(),
            ));
        }
        Ok(Self {
            identity: Some(identity),
            finger_sequence,
            samples_per_finger,
        })
    }

    /// Create a single-shot identification job.
    #[must_use]
    pub fn detect() -> Self {
        Self {
            identity: None,
            finger_sequence: Vec::new(),
            samples_per_finger: NonZeroU32::MIN,
        }
    }

    #[must_use]
    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    #[must_use]
    pub fn finger_sequence(&self) -> &[FingerLabel] {
        &self.finger_sequence
    }

    #[must_use]
    pub fn samples_per_finger(&self) -> u32 {
        self.samples_per_finger.get()
    }

    #[must_use]
    pub fn mode(&self) -> JobMode {
        if self.identity.is_some() {
            JobMode::Enroll
        } else {
            JobMode::Detect
        }
    }

    /// Total number of capture cycles the job requires.
    #[must_use]
    pub fn total_samples(&self) -> u32 {
        match self.mode() {
            JobMode::Enroll => self.finger_sequence.len() as u32 * self.samples_per_finger.get(),
            JobMode::Detect => 1,
        }
    }

    /// Sample slots in capture order: every sample of the first finger,
    /// then every sample of the next.
    pub fn slots(&self) -> impl Iterator<Item = SampleSlot> + '_ {
        let (fingers, per_finger): (Vec<Option<&FingerLabel>>, u32) = match self.mode() {
            JobMode::Enroll => (
                self.finger_sequence.iter().map(Some).collect(),
                self.samples_per_finger.get(),
            ),
            JobMode::Detect => (vec![None], 1),
        };

        fingers
            .into_iter()
            .enumerate()
            .flat_map(move |(finger_idx, finger)| {
                (1..=per_finger).map(move |number| SampleSlot {
                    finger: finger.cloned(),
                    number,
                    ordinal: finger_idx as u32 * per_finger + number,
                })
            })
    }
}
