//! Error types for stream resolution
//!
//! Three layers of failure live here:
//! - [`TransportError`] for a single outbound HTTP call
//! - [`ProviderFailure`] for one provider attempt, kept in the diagnostic trail
//! - [`ResolveError`] for the terminal outcome surfaced to callers

use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Failure of one outbound HTTP call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Upstream answered with a non-success status
    #[error("upstream returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    /// Request did not complete within its deadline
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Connection, TLS or body decoding failure
    #[error("request failed: {0}")]
    Network(String),

    /// Body arrived but could not be decoded
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl TransportError {
    /// Upstream status code, when the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_decode() {
            TransportError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            TransportError::Status {
                status: status.as_u16(),
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

/// Failure of the HTML extraction seam
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractError {
    /// Input cannot be treated as an HTML document
    #[error("malformed document: {0}")]
    MalformedDocument(String),

    /// A `SelectorSpec` path is not valid CSS
    #[error("invalid selector `{selector}` for field `{field}`")]
    InvalidSelector { field: String, selector: String },
}

/// Why a single provider attempt did not produce sources
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ProviderFailure {
    /// No search candidate reached the confidence threshold
    NoTitleMatch,
    /// Title matched but the requested episode is not listed
    EpisodeNotFound { episode: f64 },
    /// Episode exists but yielded no entry points
    NoEntryPoints,
    /// Entry points could not be turned into any stream source
    NoSources,
    /// Outbound call failed; upstream status kept when known
    TransportFailure {
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        message: String,
    },
    /// The attempt exceeded its overall budget
    TimedOut { budget_ms: u64 },
}

impl ProviderFailure {
    /// Whether this failure came from the network rather than from content
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ProviderFailure::TransportFailure { .. } | ProviderFailure::TimedOut { .. }
        )
    }
}

impl From<&TransportError> for ProviderFailure {
    fn from(e: &TransportError) -> Self {
        match e {
            TransportError::Timeout(_) => ProviderFailure::TransportFailure {
                status: None,
                message: e.to_string(),
            },
            other => ProviderFailure::TransportFailure {
                status: other.status(),
                message: other.to_string(),
            },
        }
    }
}

impl From<ExtractError> for ProviderFailure {
    fn from(e: ExtractError) -> Self {
        ProviderFailure::TransportFailure {
            status: None,
            message: e.to_string(),
        }
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderFailure::NoTitleMatch => write!(f, "no title match"),
            ProviderFailure::EpisodeNotFound { episode } => {
                write!(f, "episode {} not found", episode)
            }
            ProviderFailure::NoEntryPoints => write!(f, "no entry points"),
            ProviderFailure::NoSources => write!(f, "no playable sources"),
            ProviderFailure::TransportFailure {
                status: Some(status),
                message,
            } => write!(f, "transport failure (HTTP {}): {}", status, message),
            ProviderFailure::TransportFailure {
                status: None,
                message,
            } => write!(f, "transport failure: {}", message),
            ProviderFailure::TimedOut { budget_ms } => {
                write!(f, "timed out after {}ms", budget_ms)
            }
        }
    }
}

/// One entry of the per-request diagnostic trail
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAttempt {
    pub provider_id: String,
    pub failure: ProviderFailure,
}

impl fmt::Display for ProviderAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.provider_id, self.failure)
    }
}

fn join_attempts(attempts: &[ProviderAttempt]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Terminal error of a resolution call
///
/// Implements Display for human-readable messages and Serialize
/// so it can be returned as-is from HTTP handlers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    /// Malformed input, rejected before any provider is consulted
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Every selected provider failed
    #[error("No provider produced a playable source ({})", join_attempts(.attempts))]
    AllProvidersExhausted { attempts: Vec<ProviderAttempt> },

    /// A single explicitly requested provider could not be reached
    #[error("Provider {provider} is unreachable: {reason}")]
    ProviderUnavailable {
        provider: String,
        reason: ProviderFailure,
    },

    /// Unexpected fault inside the resolver
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ResolveError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Ordered diagnostic trail, empty for errors raised before any attempt
    pub fn attempts(&self) -> &[ProviderAttempt] {
        match self {
            ResolveError::AllProvidersExhausted { attempts } => attempts,
            _ => &[],
        }
    }
}

impl Serialize for ResolveError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Result type alias for resolution operations
pub type Result<T> = std::result::Result<T, ResolveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_status_is_preserved() {
        let error = TransportError::Status {
            status: 404,
            url: "https://provider/api".to_string(),
        };
        assert_eq!(error.status(), Some(404));
        let failure = ProviderFailure::from(&error);
        assert_eq!(
            failure,
            ProviderFailure::TransportFailure {
                status: Some(404),
                message: "upstream returned HTTP 404 for https://provider/api".to_string(),
            }
        );
    }

    #[test]
    fn test_malformed_document_counts_as_transport() {
        let failure = ProviderFailure::from(ExtractError::MalformedDocument("empty".into()));
        assert!(failure.is_transport());
        assert!(!ProviderFailure::NoTitleMatch.is_transport());
        assert!(ProviderFailure::TimedOut { budget_ms: 10 }.is_transport());
    }

    #[test]
    fn test_exhausted_message_lists_attempts_in_order() {
        let error = ResolveError::AllProvidersExhausted {
            attempts: vec![
                ProviderAttempt {
                    provider_id: "p1".to_string(),
                    failure: ProviderFailure::EpisodeNotFound { episode: 1.0 },
                },
                ProviderAttempt {
                    provider_id: "p2".to_string(),
                    failure: ProviderFailure::NoTitleMatch,
                },
            ],
        };
        assert_eq!(
            error.to_string(),
            "No provider produced a playable source (p1: episode 1 not found; p2: no title match)"
        );
        assert_eq!(error.attempts().len(), 2);
    }

    #[test]
    fn test_error_display_invalid_request() {
        let error = ResolveError::invalid("title must not be empty");
        assert_eq!(error.to_string(), "Invalid request: title must not be empty");
        assert!(error.attempts().is_empty());
    }

    #[test]
    fn test_error_serialize() {
        let error = ResolveError::Internal("boom".to_string());
        let json = serde_json::to_string(&error).expect("Serialization should succeed");
        assert_eq!(json, "\"Internal error: boom\"");
    }

    #[test]
    fn test_failure_serializes_tagged() {
        let failure = ProviderFailure::TransportFailure {
            status: Some(500),
            message: "down".to_string(),
        };
        let json = serde_json::to_value(&failure).expect("Serialization should succeed");
        assert_eq!(json["kind"], "transportFailure");
        assert_eq!(json["status"], 500);
    }
}
