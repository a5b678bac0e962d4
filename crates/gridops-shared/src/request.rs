//! Inbound chat request types.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Which language-model provider serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendTarget {
    /// Same-host inference endpoint.
    #[default]
    Local,
    /// Hosted API behind a credential.
    Remote,
}

impl BackendTarget {
    /// Lenient parse: `local`, `remote`, `cloud`, any case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" => Some(Self::Local),
            "remote" | "cloud" => Some(Self::Remote),
            _ => None,
        }
    }
}

impl fmt::Display for BackendTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Local => "local",
            Self::Remote => "remote",
        };
        write!(f, "{}", s)
    }
}

impl<'de> Deserialize<'de> for BackendTarget {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        BackendTarget::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown backend: {}", raw)))
    }
}

/// A user request. Immutable once accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(
        default,
        rename = "backendPreference",
        alias = "backend_preference",
        alias = "model_type"
    )]
    pub backend_preference: BackendTarget,
}

impl ChatRequest {
    pub fn new(message: &str, backend_preference: BackendTarget) -> Self {
        Self {
            message: message.to_string(),
            backend_preference,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_camel_case() {
        let req: ChatRequest =
            serde_json::from_str(r#"{"message":"hi","backendPreference":"REMOTE"}"#).unwrap();
        assert_eq!(req.backend_preference, BackendTarget::Remote);
    }

    #[test]
    fn test_parse_request_legacy_model_type() {
        let req: ChatRequest =
            serde_json::from_str(r#"{"message":"hi","model_type":"cloud"}"#).unwrap();
        assert_eq!(req.backend_preference, BackendTarget::Remote);
    }

    #[test]
    fn test_missing_preference_defaults_local() {
        let req: ChatRequest = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert_eq!(req.backend_preference, BackendTarget::Local);
    }

    #[test]
    fn test_unknown_preference_rejected() {
        let res = serde_json::from_str::<ChatRequest>(r#"{"message":"hi","model_type":"gpu"}"#);
        assert!(res.is_err());
    }
}
