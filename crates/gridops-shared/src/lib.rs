//! Shared types and utilities for GridOps components.
//!
//! Everything here is pure: no network, no storage, no clock.

pub mod envelope;
pub mod error;
pub mod extract;
pub mod request;
pub mod table;

pub use envelope::{ChartKind, EnvelopeKind, Insight, Intent, ResponseEnvelope};
pub use error::{ErrorKind, GridError};
pub use extract::{extract_code_fence, extract_json, parse_structured, Extracted, StructuredPayload};
pub use request::{BackendTarget, ChatRequest};
pub use table::ResultTable;

/// Package version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
