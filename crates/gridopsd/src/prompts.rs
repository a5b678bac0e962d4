//! Prompt building for each backend-driven stage.
//!
//! Every prompt opens with a fixed role line. Tests key fake replies on
//! these lines, so they are exported as constants.

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde_json::{Map, Value};

pub const CLASSIFIER_ROLE: &str = "You are an intent classifier.";
pub const SQL_ROLE: &str = "Role: Expert SQL Generator.";
pub const DATE_ROLE: &str = "Task: Extract the target date";
pub const ANALYST_ROLE: &str = "Role: Data Analyst.";

/// Intent classification. Only an exact FORECAST payload leads to forecasting.
pub fn classifier_prompt(query: &str, today: NaiveDate) -> String {
    format!(
        r#"{role}
Context: Today is {today}.
1. If the query asks about REVENUE for a future date -> JSON: {{"intent": "FORECAST"}}
2. Else (historical usage, load, users, anything else) -> JSON: {{"intent": "QUERY"}}
Output JSON ONLY. Query: {query}"#,
        role = CLASSIFIER_ROLE,
        today = today.format("%Y-%m-%d"),
        query = query,
    )
}

/// Statement generation against the fixed schema description.
pub fn sql_prompt(query: &str, schema: &str, now: NaiveDateTime) -> String {
    format!(
        r#"{role}
Database Schema: {schema}
Context:
- Today is {now} ({weekday}).
- Dates in meter_loads.date_time are formatted 'YYYY-MM-DD HH:MM:SS'.
- For relative dates like "next Thursday", calculate the exact date based on Today.
Task: Convert this query to executable SQLite SQL. Return ONLY SQL. No markdown, no explanation.
Query: {query}"#,
        role = SQL_ROLE,
        schema = schema,
        now = now.format("%Y-%m-%d %H:%M:%S"),
        weekday = now.format("%A"),
        query = query,
    )
}

/// Target-date extraction with explicit arithmetic rules.
pub fn date_prompt(query: &str, today: NaiveDate) -> String {
    let today_str = today.format("%Y-%m-%d");
    format!(
        r#"Context: Today is {today} ({weekday}, Year: {year}).
{role} from this query: '{query}'.

Rules:
1. "Tomorrow" = {today} + 1 day.
2. "Next <weekday>" = the nearest future occurrence of that weekday after {today}.
3. DO NOT CHANGE THE YEAR unless the query explicitly says "next year".
4. Return ONLY the date in YYYY-MM-DD format.

Query: {query}"#,
        today = today_str,
        weekday = today.format("%A"),
        year = today.year(),
        role = DATE_ROLE,
        query = query,
    )
}

/// Insight proposal over a bounded sample of records.
pub fn analyst_prompt(query: &str, sample: &[Map<String, Value>]) -> String {
    let sample_json = Value::Array(sample.iter().cloned().map(Value::Object).collect());
    format!(
        r#"{role}
Task: Analyze this data snippet and the user's query.
Return a JSON object with:
1. "summary": A 1-sentence insight.
2. "visualization_type": "line", "bar", or "table".
3. "x_column": The best column for X-axis (or null).
4. "y_column": The best column for Y-axis (or null).

Query: {query}
Data Sample: {sample}
JSON Output Only:"#,
        role = ANALYST_ROLE,
        query = query,
        sample = sample_json,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[test]
    fn test_classifier_prompt_carries_date_and_labels() {
        let p = classifier_prompt("revenue tomorrow?", day());
        assert!(p.starts_with(CLASSIFIER_ROLE));
        assert!(p.contains("Today is 2025-06-01"));
        assert!(p.contains(r#"{"intent": "FORECAST"}"#));
        assert!(p.contains(r#"{"intent": "QUERY"}"#));
    }

    #[test]
    fn test_sql_prompt_has_weekday() {
        let now = day().and_hms_opt(14, 30, 0).unwrap();
        let p = sql_prompt("usage", "users (username TEXT)", now);
        assert!(p.contains("2025-06-01 14:30:00 (Sunday)"));
        assert!(p.contains("users (username TEXT)"));
        assert!(p.contains("Return ONLY SQL"));
    }

    #[test]
    fn test_date_prompt_pins_year() {
        let p = date_prompt("next friday", day());
        assert!(p.contains(DATE_ROLE));
        assert!(p.contains("Year: 2025"));
        assert!(p.contains("DO NOT CHANGE THE YEAR"));
    }

    #[test]
    fn test_analyst_prompt_embeds_sample() {
        let mut rec = Map::new();
        rec.insert("meter_id".into(), json!(1003));
        let p = analyst_prompt("q", &[rec]);
        assert!(p.contains(r#"[{"meter_id":1003}]"#));
    }
}
