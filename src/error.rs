//! Error type shared by every rportcli component.
//!
//! Nothing here is retried or recovered locally: each variant aborts the one
//! in-flight operation and is printed verbatim by the binary.

use std::time::Duration;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the resolver, the tunnel provisioner, the execution
/// driver and the companion launchers.
#[derive(Error, Debug)]
pub enum Error {
    /// A required parameter is missing or malformed.
    #[error("{0}")]
    InvalidInput(String),

    /// Neither a client id nor a client name was supplied.
    #[error("no client id nor name provided")]
    MissingIdentity,

    /// The search term matched more than one client.
    #[error("client identified by '{0}' is ambiguous, use a more precise name or use the client id")]
    Ambiguous(String),

    /// The search term matched no client.
    #[error("unknown client '{0}'")]
    NotFound(String),

    /// HTTP transport error (connection refused, DNS failure, TLS, ...).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// WebSocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    /// The server answered with a non-2xx status.
    #[error("server error (HTTP {status}): {message}")]
    Service { status: u16, message: String },

    /// The server answered with something we could not decode.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server rejected a command submitted over the execution channel.
    #[error("server rejected the command: {0}")]
    Remote(String),

    /// The client-side deadline elapsed before the operation finished.
    #[error("timeout of {0:?} elapsed before the operation completed")]
    Timeout(Duration),

    /// The execution channel closed before a terminal job frame arrived.
    #[error("connection closed before the job reached a terminal status")]
    IncompleteExecution,

    /// The ssh or remote-desktop companion process failed.
    #[error("{0}")]
    CompanionProcessFailure(String),

    /// The operator interrupted the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Whether this error came from the REST or WebSocket transport.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Request(_) | Error::WebSocket(_) | Error::Service { .. } | Error::Protocol(_)
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for Error {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Error::WebSocket(Box::new(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ambiguous_message_names_the_search_term() {
        let err = Error::Ambiguous("some client".into());
        assert_eq!(
            err.to_string(),
            "client identified by 'some client' is ambiguous, use a more precise name or use the client id"
        );
    }

    #[test]
    fn companion_failure_is_verbatim() {
        let err = Error::CompanionProcessFailure("ssh failure".into());
        assert_eq!(err.to_string(), "ssh failure");
    }

    #[test]
    fn service_errors_are_transport() {
        let err = Error::Service {
            status: 404,
            message: "not found".into(),
        };
        assert!(err.is_transport());
        assert!(!Error::MissingIdentity.is_transport());
    }
}
