//! Matching service responses.
//!
//! Only the status code is required. The body, when it is a JSON object,
//! may carry the service's decision; anything else leaves the result
//! status-only.

use bytes::Bytes;
use serde_json::{Map, Value};
use tracing::debug;

/// Keys accepted for the matched identity, in priority order.
const IDENTITY_KEYS: [&str; 3] = ["match_id", "matchId", "nid"];

/// What the service decided about an identification sample.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchDecision {
    /// Recognised identity; `None` when nobody matched.
    pub match_identity: Option<String>,
    pub score: f64,
    pub threshold: f64,
}

impl MatchDecision {
    /// Interpret a response body.
    ///
    /// Returns `None` unless the body is a JSON object. Numeric identities
    /// are rendered in decimal; empty strings, `null` and `false` count as
    /// no match. Missing scores read as `0.0`.
    pub fn from_body(body: &[u8]) -> Option<Self> {
        let object = match serde_json::from_slice::<Value>(body) {
            Ok(Value::Object(object)) => object,
            Ok(_) => {
                debug!("Response body is JSON but not an object");
                return None;
            }
            Err(e) => {
                if !body.is_empty() {
                    debug!(error = %e, "Response body is not JSON");
                }
                return None;
            }
        };

        Some(Self {
            match_identity: identity_from(&object),
            score: number_from(&object, "score"),
            threshold: number_from(&object, "threshold"),
        })
    }
}

fn identity_from(object: &Map<String, Value>) -> Option<String> {
    IDENTITY_KEYS.iter().find_map(|key| match object.get(*key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn number_from(object: &Map<String, Value>, key: &str) -> f64 {
    match object.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Outcome of one upload as reported by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadResult {
    /// HTTP status; `0` if the status line could not be read.
    pub status_code: u16,
    pub body: Bytes,
    pub parsed: Option<MatchDecision>,
}

impl UploadResult {
    /// Build a result, interpreting the body when possible.
    pub fn new(status_code: u16, body: Bytes) -> Self {
        let parsed = MatchDecision::from_body(&body);
        Self {
            status_code,
            body,
            parsed,
        }
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// The recognised identity, if the body named one.
    pub fn match_identity(&self) -> Option<&str> {
        self.parsed
            .as_ref()
            .and_then(|decision| decision.match_identity.as_deref())
    }
}

/// Status code from a response head; `0` when the status line is unreadable.
pub fn parse_status_code(head: &str) -> u16 {
    head.lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
        .unwrap_or(0)
}

/// `Content-Length` from a response head, if present and numeric.
pub fn parse_content_length(head: &str) -> Option<usize> {
    head.lines().skip(1).find_map(|line| {
        let (name, value) = line.split_once(':')?;
        if name.trim().eq_ignore_ascii_case("content-length") {
            value.trim().parse().ok()
        } else {
            None
        }
    })
}
