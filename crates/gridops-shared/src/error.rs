//! Error types for GridOps.
//!
//! `ErrorKind` is the stable, serialisable classification surfaced in
//! response envelopes. `GridError` carries the human-readable cause.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

/// Stable error classification.
///
/// Serialised through [`ErrorKind::code`], e.g. `BACKEND_HTTP_503`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BackendConnection,
    BackendTimeout,
    BackendHttp(u16),
    /// Structured-output extraction failed. Always absorbed with a default.
    ParseFailure,
    DateUnresolved,
    NoFeatureData,
    ModelNotTrained,
    PredictionFailed,
    ExecutionFailed,
    StorageFailed,
    InvalidRequest,
    Internal,
}

impl ErrorKind {
    pub fn code(&self) -> String {
        match self {
            ErrorKind::BackendConnection => "BACKEND_CONNECTION".to_string(),
            ErrorKind::BackendTimeout => "BACKEND_TIMEOUT".to_string(),
            ErrorKind::BackendHttp(status) => format!("BACKEND_HTTP_{}", status),
            ErrorKind::ParseFailure => "PARSE_FAILURE".to_string(),
            ErrorKind::DateUnresolved => "DATE_UNRESOLVED".to_string(),
            ErrorKind::NoFeatureData => "NO_FEATURE_DATA".to_string(),
            ErrorKind::ModelNotTrained => "MODEL_NOT_TRAINED".to_string(),
            ErrorKind::PredictionFailed => "PREDICTION_FAILED".to_string(),
            ErrorKind::ExecutionFailed => "EXECUTION_FAILED".to_string(),
            ErrorKind::StorageFailed => "STORAGE_FAILED".to_string(),
            ErrorKind::InvalidRequest => "INVALID_REQUEST".to_string(),
            ErrorKind::Internal => "INTERNAL".to_string(),
        }
    }

    /// Parse a code produced by [`ErrorKind::code`].
    pub fn from_code(code: &str) -> Option<Self> {
        if let Some(status) = code.strip_prefix("BACKEND_HTTP_") {
            return status.parse().ok().map(ErrorKind::BackendHttp);
        }
        match code {
            "BACKEND_CONNECTION" => Some(ErrorKind::BackendConnection),
            "BACKEND_TIMEOUT" => Some(ErrorKind::BackendTimeout),
            "PARSE_FAILURE" => Some(ErrorKind::ParseFailure),
            "DATE_UNRESOLVED" => Some(ErrorKind::DateUnresolved),
            "NO_FEATURE_DATA" => Some(ErrorKind::NoFeatureData),
            "MODEL_NOT_TRAINED" => Some(ErrorKind::ModelNotTrained),
            "PREDICTION_FAILED" => Some(ErrorKind::PredictionFailed),
            "EXECUTION_FAILED" => Some(ErrorKind::ExecutionFailed),
            "STORAGE_FAILED" => Some(ErrorKind::StorageFailed),
            "INVALID_REQUEST" => Some(ErrorKind::InvalidRequest),
            "INTERNAL" => Some(ErrorKind::Internal),
            _ => None,
        }
    }

    /// True for the transport failures of a backend call.
    pub fn is_backend(&self) -> bool {
        matches!(
            self,
            ErrorKind::BackendConnection | ErrorKind::BackendTimeout | ErrorKind::BackendHttp(_)
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.code())
    }
}

impl<'de> Deserialize<'de> for ErrorKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        ErrorKind::from_code(&code)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown error kind: {}", code)))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GridError {
    #[error("Backend connection error: {0}")]
    BackendConnection(String),

    #[error("Backend timed out: {0}")]
    BackendTimeout(String),

    #[error("Backend API error ({status}): {message}")]
    BackendHttp { status: u16, message: String },

    #[error("Could not parse backend output: {0}")]
    Parse(String),

    #[error("Could not understand the target date. Backend responded: '{0}'")]
    DateUnresolved(String),

    #[error("No forecasted load data found for {0}")]
    NoFeatureData(String),

    #[error("Model not trained: {0}")]
    ModelNotTrained(String),

    #[error("Prediction engine error: {0}")]
    Prediction(String),

    #[error("Query execution failed: {0}")]
    Execution(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GridError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GridError::BackendConnection(_) => ErrorKind::BackendConnection,
            GridError::BackendTimeout(_) => ErrorKind::BackendTimeout,
            GridError::BackendHttp { status, .. } => ErrorKind::BackendHttp(*status),
            GridError::Parse(_) => ErrorKind::ParseFailure,
            GridError::DateUnresolved(_) => ErrorKind::DateUnresolved,
            GridError::NoFeatureData(_) => ErrorKind::NoFeatureData,
            GridError::ModelNotTrained(_) => ErrorKind::ModelNotTrained,
            GridError::Prediction(_) => ErrorKind::PredictionFailed,
            GridError::Execution(_) => ErrorKind::ExecutionFailed,
            GridError::Storage(_) => ErrorKind::StorageFailed,
            GridError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            GridError::Internal(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, GridError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_code_carries_status() {
        assert_eq!(ErrorKind::BackendHttp(503).code(), "BACKEND_HTTP_503");
        assert_eq!(
            ErrorKind::from_code("BACKEND_HTTP_429"),
            Some(ErrorKind::BackendHttp(429))
        );
        assert_eq!(ErrorKind::from_code("BACKEND_HTTP_abc"), None);
    }

    #[test]
    fn test_kind_serializes_as_code() {
        let json = serde_json::to_string(&ErrorKind::NoFeatureData).unwrap();
        assert_eq!(json, "\"NO_FEATURE_DATA\"");
        let back: ErrorKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ErrorKind::NoFeatureData);
    }

    #[test]
    fn test_error_maps_to_kind() {
        let err = GridError::BackendHttp {
            status: 401,
            message: "unauthorized".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::BackendHttp(401));
        assert!(err.kind().is_backend());
        assert!(!GridError::NoFeatureData("2025-06-02".into()).kind().is_backend());
    }

    #[test]
    fn test_unknown_kind_code_is_rejected() {
        let err = serde_json::from_str::<ErrorKind>("\"TEAPOT\"").unwrap_err();
        assert!(err.to_string().contains("unknown error kind: TEAPOT"));
    }

    #[test]
    fn test_result_alias_carries_grid_error() {
        fn lookup(found: bool) -> Result<u32> {
            if found {
                Ok(7)
            } else {
                Err(GridError::NoFeatureData("2025-06-02".into()))
            }
        }
        assert_eq!(lookup(true), Ok(7));
        assert_eq!(lookup(false).unwrap_err().kind(), ErrorKind::NoFeatureData);
    }
}
