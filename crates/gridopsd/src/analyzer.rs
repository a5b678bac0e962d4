//! Insight analysis over a result table.
//!
//! Analysis never blocks delivery: an empty table short-circuits without a
//! backend call, and an unusable reply degrades to a TABLE insight.

use crate::backend::BackendRoute;
use crate::prompts;
use gridops_shared::{parse_structured, ChartKind, Extracted, Insight, ResultTable, StructuredPayload};
use tracing::{debug, warn};

pub const EMPTY_TABLE_SUMMARY: &str = "No data found matching your query.";
pub const DEGRADED_SUMMARY: &str = "Analysis failed or raw text returned.";
pub const DEFAULT_SUMMARY: &str = "Data retrieved successfully.";

/// Propose a summary and visualization hint for `table`.
pub async fn analyze(
    route: &BackendRoute,
    table: &ResultTable,
    query: &str,
    sample_rows: usize,
) -> Insight {
    if table.is_empty() {
        debug!("Empty table, skipping analysis call");
        return Insight::table(EMPTY_TABLE_SUMMARY);
    }

    let sample = table.head_records(sample_rows.min(5));
    let reply = route
        .call("analyze", &prompts::analyst_prompt(query, &sample))
        .await;

    if reply.provider_error.is_some() {
        warn!("Analysis backend call failed, degrading to table");
        return degraded(&reply.raw_text);
    }

    insight_from_reply(&reply.raw_text)
}

/// Pure mapping from reply text to insight.
pub fn insight_from_reply(raw: &str) -> Insight {
    match parse_structured(raw) {
        Extracted::Payload(payload) => insight_from_payload(&payload),
        Extracted::Malformed(text) => degraded(&text),
    }
}

fn insight_from_payload(payload: &StructuredPayload) -> Insight {
    let summary = payload
        .get_text("summary")
        .unwrap_or_else(|| DEFAULT_SUMMARY.to_string());
    let kind = payload
        .get_str("visualization_type")
        .or_else(|| payload.get_str("chart_kind"))
        .map(ChartKind::parse_lenient)
        .unwrap_or_default();

    Insight {
        summary,
        chart_kind: kind,
        x_column: payload.get_text("x_column"),
        y_column: payload.get_text("y_column"),
        raw: None,
    }
}

fn degraded(raw: &str) -> Insight {
    Insight {
        raw: Some(raw.to_string()),
        ..Insight::table(DEGRADED_SUMMARY)
    }
}
