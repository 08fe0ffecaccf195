//! vCloud client error types

use thiserror::Error;

/// vCloud client errors
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status} from {url}: {body}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("Task {urn} {operation} completed unsuccessfully")]
    TaskFailed { urn: String, operation: String },

    #[error("Some tasks failed on {entity}: {tasks}")]
    TasksFailed { entity: String, tasks: String },

    #[error("Tasks on {entity} left in an unexpected state: {tasks}")]
    InconsistentTasks { entity: String, tasks: String },

    #[error("Timeout after {waited_secs}s waiting for {operation} on {entity}")]
    Timeout {
        entity: String,
        operation: String,
        waited_secs: u64,
    },

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Whether another attempt at the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Transport(_) => true,
            ClientError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        ClientError::NotFound {
            kind,
            name: name.into(),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_builder() {
            ClientError::InvalidUrl(e.to_string())
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(ClientError::Transport("connection reset".into()).is_transient());
        assert!(
            ClientError::Http {
                status: 503,
                url: "u".into(),
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            !ClientError::Http {
                status: 404,
                url: "u".into(),
                body: String::new()
            }
            .is_transient()
        );
        assert!(!ClientError::not_found("Virtual datacenter", "vdc1").is_transient());
        assert!(
            !ClientError::Timeout {
                entity: "e".into(),
                operation: "op".into(),
                waited_secs: 1
            }
            .is_transient()
        );
    }

    #[test]
    fn test_not_found_message_names_resource() {
        let err = ClientError::not_found("Virtual datacenter", "acme-vdc");
        assert_eq!(err.to_string(), "Virtual datacenter not found: acme-vdc");
    }
}
