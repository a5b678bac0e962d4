//! Forecast date resolution from relative phrasing.

use crate::backend::BackendRoute;
use crate::prompts;
use chrono::NaiveDate;
use gridops_shared::GridError;
use regex::Regex;
use std::sync::LazyLock;
use tracing::info;

static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9]{4}-[0-9]{2}-[0-9]{2}").expect("valid date regex")
});

/// Resolve the target date of `query` relative to `today`.
///
/// Backend failures surface as their backend error kind. A reply without a
/// valid `YYYY-MM-DD` date is `DateUnresolved`.
pub async fn resolve_date(
    route: &BackendRoute,
    query: &str,
    today: NaiveDate,
) -> Result<NaiveDate, GridError> {
    let reply = route
        .call("resolve_date", &prompts::date_prompt(query, today))
        .await;

    if let Some(err) = reply.provider_error {
        return Err(err.into_grid_error());
    }

    let date = date_from_reply(&reply.raw_text)?;
    info!("Resolved forecast date {}", date);
    Ok(date)
}

/// First `YYYY-MM-DD` token in `raw` that is a real calendar date.
pub fn date_from_reply(raw: &str) -> Result<NaiveDate, GridError> {
    DATE_RE
        .find_iter(raw)
        .find_map(|token| NaiveDate::parse_from_str(token.as_str(), "%Y-%m-%d").ok())
        .ok_or_else(|| GridError::DateUnresolved(raw.trim().to_string()))
}
