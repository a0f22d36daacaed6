//! Error types for the reconciler

use thiserror::Error;

/// Error codes and symbolic names that control planes use for "no such resource".
const NOT_FOUND_NAMES: &[&str] = &[
    "ResourceNotFoundException",
    "ResourceNotFound",
    "NoSuchEntity",
    "NoSuchEntityException",
    "NotFoundException",
    "NotFound",
    "ParameterNotFound",
];

#[derive(Error, Debug)]
pub enum Error {
    /// Declared input is malformed. Raised before any remote call.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// A remote call returned a non-success status.
    #[error("api error ({status}){}: {message}", code_suffix(.code, .error_type))]
    Api {
        status: u16,
        /// Symbolic error name, e.g. from an `x-amzn-ErrorType` header.
        error_type: Option<String>,
        /// Error code field from the response body.
        code: Option<String>,
        message: String,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("timed out after {elapsed_secs}s waiting for {id} to reach {target}")]
    Timeout {
        id: String,
        target: String,
        elapsed_secs: u64,
    },

    #[error("resource {id} entered failure status {status}")]
    TerminalStatus { id: String, status: String },

    #[error("update not supported for properties: {}", .properties.join(", "))]
    UpdateNotSupported { properties: Vec<String> },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn invalid_event(message: impl Into<String>) -> Self {
        Self::InvalidEvent(message.into())
    }

    pub fn api(status: u16, code: Option<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            error_type: None,
            code,
            message: message.into(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn timeout(id: impl Into<String>, target: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            id: id.into(),
            target: target.into(),
            elapsed_secs,
        }
    }

    pub fn terminal_status(id: impl Into<String>, status: impl Into<String>) -> Self {
        Self::TerminalStatus {
            id: id.into(),
            status: status.into(),
        }
    }

    /// True when the error means the addressed resource does not exist.
    ///
    /// Any one of: a symbolic error name, an error code field, or an HTTP 404.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Api {
                status,
                error_type,
                code,
                ..
            } => {
                *status == 404
                    || error_type.as_deref().is_some_and(is_not_found_name)
                    || code.as_deref().is_some_and(is_not_found_name)
            }
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

fn code_suffix(code: &Option<String>, error_type: &Option<String>) -> String {
    match code.as_deref().or(error_type.as_deref()) {
        Some(c) => format!(" {c}"),
        None => String::new(),
    }
}

fn is_not_found_name(name: &str) -> bool {
    // "ns#ResourceNotFoundException:http://..." -> "ResourceNotFoundException"
    let name = name.split(':').next().unwrap_or(name);
    let short = name.rsplit('#').next().unwrap_or(name);
    NOT_FOUND_NAMES.contains(&short)
}

/// Turn a not-found result into `Ok(None)`; other errors pass through.
pub fn tolerate_not_found<T>(result: Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
