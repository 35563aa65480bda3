//! Line-delimited JSON protocol spoken with the host operator.
//!
//! # Requests
//!
//! ```text
//! {"cmd":"ENROLL","nid":"42"}
//! {"cmd":"DETECT"}
//! ```
//!
//! # Responses
//!
//! ```text
//! {"status":"success","action":"enroll","nid":"42"}
//! {"status":"error","action":"detect","nid":null}
//! {"status":"error","message":"Missing NID"}
//! ```
//!
//! Every request yields exactly one response line. Fields that do not
//! apply are omitted rather than sent as `null`, except `nid` on a failed
//! identification, which is an explicit `null`.

use fingerbridge_core::{Identity, JobMode, constants::ABORT_WORDS};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// A parsed host request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCommand {
    /// Enroll every configured finger under an identity.
    Enroll { identity: Identity },
    /// Identify a single placement.
    Detect,
}

/// Reasons a request line cannot be turned into a [`HostCommand`].
///
/// The display strings are part of the wire protocol.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostCommandError {
    #[error("Invalid JSON")]
    InvalidJson,

    #[error("Missing NID")]
    MissingIdentity,

    #[error("Invalid NID")]
    InvalidIdentity,

    #[error("Unknown command")]
    UnknownCommand(String),
}

impl HostCommand {
    /// Parse one request line.
    ///
    /// The `cmd` field is matched case-insensitively. A numeric `nid` is
    /// accepted and kept in its decimal form; `null`, `false`, `0` and the
    /// empty string count as missing.
    ///
    /// # Errors
    /// Returns the [`HostCommandError`] whose message is sent back verbatim.
    pub fn parse(line: &str) -> Result<Self, HostCommandError> {
        let value: Value =
            serde_json::from_str(line.trim()).map_err(|_| HostCommandError::InvalidJson)?;
        let object = value.as_object().ok_or(HostCommandError::InvalidJson)?;

        let cmd = match object.get("cmd") {
            Some(Value::String(s)) => s.to_ascii_uppercase(),
            Some(other) => other.to_string().to_ascii_uppercase(),
            None => String::new(),
        };

        match cmd.as_str() {
            "ENROLL" => {
                let identity = identity_field(object.get("nid"))?;
                Ok(HostCommand::Enroll { identity })
            }
            "DETECT" => Ok(HostCommand::Detect),
            _ => Err(HostCommandError::UnknownCommand(cmd)),
        }
    }

    #[must_use]
    pub fn mode(&self) -> JobMode {
        match self {
            HostCommand::Enroll { .. } => JobMode::Enroll,
            HostCommand::Detect => JobMode::Detect,
        }
    }
}

fn identity_field(value: Option<&Value>) -> Result<Identity, HostCommandError> {
    let raw = match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => {
            return Err(HostCommandError::MissingIdentity);
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            return Err(HostCommandError::MissingIdentity);
        }
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => {
            return Err(HostCommandError::MissingIdentity);
        }
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(_) => return Err(HostCommandError::InvalidIdentity),
    };
    Identity::new(&raw).map_err(|_| HostCommandError::InvalidIdentity)
}

/// Whether a line received while waiting for a finger cancels the job.
///
/// Accepts the bare words `stop`, `quit` and `exit` in any case, and the
/// JSON form `{"cmd":"STOP"}`.
#[must_use]
pub fn is_abort_request(line: &str) -> bool {
    let line = line.trim();
    if ABORT_WORDS.iter().any(|w| line.eq_ignore_ascii_case(w)) {
        return true;
    }
    serde_json::from_str::<Value>(line)
        .ok()
        .and_then(|v| v.get("cmd").and_then(Value::as_str).map(str::to_owned))
        .is_some_and(|cmd| ABORT_WORDS.iter().any(|w| cmd.eq_ignore_ascii_case(w)))
}

/// Outcome token of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// One response line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostResponse {
    pub status: ResponseStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<JobMode>,

    /// Outer `None` omits the field, `Some(None)` sends `null`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nid: Option<Option<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl HostResponse {
    /// Bare error with no action context.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            action: None,
            nid: None,
            message: Some(message.into()),
        }
    }

    pub fn enroll_success(identity: &Identity) -> Self {
        Self {
            status: ResponseStatus::Success,
            action: Some(JobMode::Enroll),
            nid: Some(Some(identity.to_string())),
            message: None,
        }
    }

    pub fn enroll_error(identity: &Identity, message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            action: Some(JobMode::Enroll),
            nid: Some(Some(identity.to_string())),
            message: Some(message.into()),
        }
    }

    pub fn detect_match(identity: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Success,
            action: Some(JobMode::Detect),
            nid: Some(Some(identity.into())),
            message: None,
        }
    }

    /// The service answered but recognised nobody.
    pub fn detect_no_match() -> Self {
        Self {
            status: ResponseStatus::Error,
            action: Some(JobMode::Detect),
            nid: Some(None),
            message: None,
        }
    }

    pub fn detect_error(message: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Error,
            action: Some(JobMode::Detect),
            nid: None,
            message: Some(message.into()),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }

    /// Serialize to a single JSON line (without the trailing newline).
    #[must_use]
    pub fn to_line(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(
                "{{\"status\":\"error\",\"message\":{}}}",
                Value::String(e.to_string())
            )
        })
    }
}

impl From<HostCommandError> for HostResponse {
    fn from(err: HostCommandError) -> Self {
        HostResponse::error(err.to_string())
    }
}
