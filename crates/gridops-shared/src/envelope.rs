//! The uniform response envelope and its parts.

use crate::error::{ErrorKind, GridError};
use crate::table::ResultTable;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classified purpose of a request. Derived per request, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    #[default]
    Query,
    Forecast,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Query => "query",
            Self::Forecast => "forecast",
        };
        write!(f, "{}", s)
    }
}

/// Visualization hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Line,
    Bar,
    #[default]
    Table,
    None,
}

impl ChartKind {
    /// Parse a backend-proposed kind. Anything unrecognised is `Table`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "line" => Self::Line,
            "bar" => Self::Bar,
            "none" => Self::None,
            _ => Self::Table,
        }
    }

    /// Kinds that can be drawn on two axes.
    pub fn is_plottable(&self) -> bool {
        matches!(self, Self::Line | Self::Bar)
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Line => "line",
            Self::Bar => "bar",
            Self::Table => "table",
            Self::None => "none",
        };
        write!(f, "{}", s)
    }
}

/// One-sentence summary plus a visualization hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub summary: String,
    pub chart_kind: ChartKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_column: Option<String>,
    /// Raw backend reply, kept only when analysis degraded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl Insight {
    pub fn table(summary: &str) -> Self {
        Self {
            summary: summary.to_string(),
            chart_kind: ChartKind::Table,
            x_column: None,
            y_column: None,
            raw: None,
        }
    }

    pub fn chart(summary: &str, kind: ChartKind, x: &str, y: &str) -> Self {
        Self {
            summary: summary.to_string(),
            chart_kind: kind,
            x_column: Some(x.to_string()),
            y_column: Some(y.to_string()),
            raw: None,
        }
    }

    /// Both axis columns, when present and non-blank.
    pub fn axes(&self) -> Option<(&str, &str)> {
        let x = self.x_column.as_deref().filter(|s| !s.trim().is_empty())?;
        let y = self.y_column.as_deref().filter(|s| !s.trim().is_empty())?;
        Some((x, y))
    }

    /// True when a chart document should be requested for this insight.
    pub fn wants_chart(&self) -> bool {
        self.chart_kind.is_plottable() && self.axes().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeKind {
    Data,
    Error,
}

/// The response for exactly one request, success or failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub kind: EnvelopeKind,
    pub content: String,
    pub intent: Intent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<ResultTable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_query: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insight: Option<Insight>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_document: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
}

impl ResponseEnvelope {
    /// Completed DATA envelope. Content is the insight summary.
    pub fn data(
        intent: Intent,
        table: ResultTable,
        generated_query: Option<String>,
        insight: Insight,
        chart_document: Option<String>,
    ) -> Self {
        Self {
            kind: EnvelopeKind::Data,
            content: insight.summary.clone(),
            intent,
            table: Some(table),
            generated_query: generated_query.filter(|q| !q.is_empty()),
            insight: Some(insight),
            chart_document,
            error: None,
        }
    }

    /// ERROR envelope. Table and insight are always absent.
    pub fn error(intent: Intent, kind: ErrorKind, content: &str) -> Self {
        Self {
            kind: EnvelopeKind::Error,
            content: content.to_string(),
            intent,
            table: None,
            generated_query: None,
            insight: None,
            chart_document: None,
            error: Some(kind),
        }
    }

    pub fn from_error(intent: Intent, err: &GridError) -> Self {
        Self::error(intent, err.kind(), &err.to_string())
    }

    pub fn is_error(&self) -> bool {
        self.kind == EnvelopeKind::Error
    }
}
