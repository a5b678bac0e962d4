//! Query generation and sanitisation.
//!
//! Produces statement text from natural language. The statement is never
//! executed here. A reply that signals a transport failure is turned into a
//! `SYSTEM_ERROR:` sentinel that callers must check before execution.

use crate::backend::{BackendReply, BackendRoute};
use crate::prompts;
use chrono::NaiveDateTime;
use gridops_shared::{extract_code_fence, ErrorKind};
use tracing::warn;

/// Prefix marking a statement that must not be executed
pub const SYSTEM_ERROR_PREFIX: &str = "SYSTEM_ERROR: ";

/// Statement text plus the reply it came from
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedQuery {
    pub statement: String,
    pub raw_reply: String,
    /// Provider failure behind a sentinel, when known
    pub failure: Option<ErrorKind>,
}

impl GeneratedQuery {
    pub fn is_error_sentinel(&self) -> bool {
        is_error_sentinel(&self.statement)
    }

    /// Human-readable cause carried by a sentinel
    pub fn sentinel_message(&self) -> Option<&str> {
        self.statement.strip_prefix(SYSTEM_ERROR_PREFIX)
    }
}

pub fn is_error_sentinel(statement: &str) -> bool {
    statement.starts_with(SYSTEM_ERROR_PREFIX.trim_end())
}

/// Generate a statement for `query` against `schema`.
pub async fn generate(
    route: &BackendRoute,
    query: &str,
    schema: &str,
    now: NaiveDateTime,
) -> GeneratedQuery {
    let reply = route
        .call("generate", &prompts::sql_prompt(query, schema, now))
        .await;
    sanitize(reply)
}

/// Pure sanitisation of one backend reply.
pub fn sanitize(reply: BackendReply) -> GeneratedQuery {
    if reply.signals_transport_failure() {
        warn!("Query generation reply signals a transport failure, not executing");
        let failure = reply
            .provider_error
            .as_ref()
            .map(|e| e.kind)
            .unwrap_or(ErrorKind::BackendConnection);
        return GeneratedQuery {
            statement: format!("{}{}", SYSTEM_ERROR_PREFIX, reply.raw_text.trim()),
            raw_reply: reply.raw_text,
            failure: Some(failure),
        };
    }

    let statement = extract_code_fence(&reply.raw_text, "sql").unwrap_or_default();
    GeneratedQuery {
        statement,
        raw_reply: reply.raw_text,
        failure: None,
    }
}
