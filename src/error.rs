//! Application error types.
//!
//! These errors are serializable so an embedding UI can render them as
//! structured objects instead of parsing display strings.

use serde::Serialize;
use thiserror::Error;

/// Application-level errors returned by the sync services.
///
/// All variants serialize to a structured JSON object.
#[derive(Debug, Clone, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum AppError {
    /// Post or review service returned a non-success response.
    #[error("Backend API error: {message}")]
    BackendApi {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        status_code: Option<u16>,
        #[serde(skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
    },

    /// Network request failed.
    #[error("Network error: {message}")]
    Network { message: String },

    /// Login failed or the session lacks the required role.
    #[error("Authentication error: {message}")]
    Authentication { message: String },

    /// Requested resource not found.
    #[error("Not found: {resource}")]
    NotFound {
        resource: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<String>,
    },

    /// Invalid input provided.
    #[error("Invalid input: {message}")]
    InvalidInput {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        field: Option<String>,
    },

    /// Notification stream transport failed or ended.
    #[error("Notification stream error: {message}")]
    Stream { message: String },

    /// A payload could not be decoded.
    #[error("Decode error: {message}")]
    Decode {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<String>,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Internal application error.
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl AppError {
    /// Create a backend API error.
    pub fn backend_api(message: impl Into<String>) -> Self {
        Self::BackendApi {
            message: message.into(),
            status_code: None,
            endpoint: None,
        }
    }

    /// Create a backend API error with status code and endpoint.
    pub fn backend_api_full(
        message: impl Into<String>,
        status_code: u16,
        endpoint: impl Into<String>,
    ) -> Self {
        Self::BackendApi {
            message: message.into(),
            status_code: Some(status_code),
            endpoint: Some(endpoint.into()),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create a not found error with ID.
    pub fn not_found_with_id(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: Some(id.into()),
        }
    }

    /// Create an invalid input error with field name.
    pub fn invalid_input_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a stream error.
    pub fn stream(message: impl Into<String>) -> Self {
        Self::Stream {
            message: message.into(),
        }
    }

    /// Create a decode error, keeping the offending payload for diagnostics.
    pub fn decode_payload(message: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
            payload: Some(payload.into()),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// HTTP status code if this is a backend API error that carried one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::BackendApi { status_code, .. } => *status_code,
            _ => None,
        }
    }

    /// Whether this error came from the transport rather than the backend.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Stream { .. })
    }
}

// Conversions from common error types

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network("Request timed out")
        } else if err.is_connect() {
            Self::network("Failed to connect to server")
        } else if err.is_status() {
            Self::backend_api(format!("HTTP error: {}", err))
        } else if err.is_decode() {
            Self::Decode {
                message: err.to_string(),
                payload: None,
            }
        } else {
            Self::network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode {
            message: format!("JSON error: {}", err),
            payload: None,
        }
    }
}
