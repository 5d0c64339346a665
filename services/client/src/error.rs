//! services/client/src/error.rs
//!
//! Defines the primary error type for the client service.

use crate::config::ConfigError;
use crate::ics::IcsError;
use study_buddy_core::ports::PortError;

/// The primary error type for the `client` service.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// A calendar file could not be parsed locally.
    #[error("Calendar Error: {0}")]
    Calendar(#[from] IcsError),

    /// Represents an error building the underlying HTTP client.
    #[error("HTTP Client Error: {0}")]
    Http(#[from] reqwest::Error),

    /// A result could not be rendered as JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Represents a standard Input/Output error (e.g., reading an upload from disk).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// The message shown to the user for each kind of failure.
    pub fn user_message(&self) -> String {
        match self {
            ClientError::Port(PortError::Unauthenticated) => {
                "Your session has ended. Please sign in again.".to_string()
            }
            ClientError::Port(PortError::InvalidRequest { status: 404, .. }) => {
                "That item no longer exists.".to_string()
            }
            ClientError::Port(PortError::InvalidRequest { message, .. }) => {
                format!("The request was rejected: {}", message)
            }
            ClientError::Port(PortError::QuotaExceeded(_)) => {
                "You have reached your generation limit. Upgrade or try again later.".to_string()
            }
            ClientError::Port(PortError::ServiceUnavailable(_)) => {
                "The study service is unavailable right now. Please try again.".to_string()
            }
            ClientError::Port(PortError::Validation(e)) => {
                format!("This {} is unavailable right now.", e.target)
            }
            ClientError::Config(e) => format!("Configuration problem: {}", e),
            ClientError::Calendar(e) => format!("Could not read the calendar file: {}", e),
            ClientError::Http(_) => "Could not start the HTTP client.".to_string(),
            ClientError::Json(_) => "Could not display the result.".to_string(),
            ClientError::Io(e) => format!("Could not read the file: {}", e),
        }
    }
}
