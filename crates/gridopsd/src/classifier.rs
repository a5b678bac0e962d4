//! Intent classification: FORECAST vs QUERY.

use crate::backend::{BackendReply, BackendRoute};
use crate::prompts;
use chrono::NaiveDate;
use gridops_shared::{parse_structured, Extracted, Intent};
use tracing::{debug, info};

/// Outcome of classification.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub intent: Intent,
    /// The failed reply when the backend could not be reached. The query
    /// stage reuses it instead of calling the same target again.
    pub unavailable: Option<BackendReply>,
}

/// Classify `query`. Never fails: anything but an exact FORECAST is QUERY.
pub async fn classify(route: &BackendRoute, query: &str, today: NaiveDate) -> Classification {
    let reply = route
        .call("classify", &prompts::classifier_prompt(query, today))
        .await;

    if reply.provider_error.is_some() {
        info!("Classifier backend unavailable, defaulting to query");
        return Classification {
            intent: Intent::Query,
            unavailable: Some(reply),
        };
    }

    Classification {
        intent: intent_from_reply(&reply.raw_text),
        unavailable: None,
    }
}

/// Pure mapping from reply text to intent.
pub fn intent_from_reply(raw: &str) -> Intent {
    match parse_structured(raw) {
        Extracted::Payload(payload) => match payload.get_str("intent") {
            Some("FORECAST") => Intent::Forecast,
            other => {
                debug!("Classifier payload intent {:?}, using query", other);
                Intent::Query
            }
        },
        Extracted::Malformed(_) => {
            debug!("Classifier reply had no JSON object, using query");
            Intent::Query
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FakeBackend;
    use gridops_shared::{BackendTarget, ErrorKind};
    use std::sync::Arc;
    use std::time::Duration;

    fn route(fake: FakeBackend) -> BackendRoute {
        BackendRoute::new(Arc::new(fake), BackendTarget::Local, Duration::from_secs(1))
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[test]
    fn test_exact_forecast_only() {
        assert_eq!(intent_from_reply(r#"{"intent": "FORECAST"}"#), Intent::Forecast);
        assert_eq!(
            intent_from_reply("Sure:\n```json\n{\"intent\": \"FORECAST\"}\n```"),
            Intent::Forecast
        );
        assert_eq!(intent_from_reply(r#"{"intent": "forecast"}"#), Intent::Query);
        assert_eq!(intent_from_reply(r#"{"intent": "REVENUE_FORECAST"}"#), Intent::Query);
        assert_eq!(intent_from_reply(r#"{"intent": null}"#), Intent::Query);
        assert_eq!(intent_from_reply(r#"{"label": "FORECAST"}"#), Intent::Query);
        assert_eq!(intent_from_reply("FORECAST"), Intent::Query);
        assert_eq!(intent_from_reply(""), Intent::Query);
    }

    #[tokio::test]
    async fn test_classify_with_backend() {
        let fake = FakeBackend::new().respond_when(prompts::CLASSIFIER_ROLE, r#"{"intent":"FORECAST"}"#);
        let outcome = classify(&route(fake), "revenue tomorrow", today()).await;
        assert_eq!(outcome.intent, Intent::Forecast);
        assert!(outcome.unavailable.is_none());
    }

    #[tokio::test]
    async fn test_classify_backend_down_is_query() {
        let fake = FakeBackend::new().otherwise_fail(ErrorKind::BackendTimeout);
        let outcome = classify(&route(fake), "revenue tomorrow", today()).await;
        assert_eq!(outcome.intent, Intent::Query);
        let reply = outcome.unavailable.unwrap();
        assert_eq!(reply.provider_error.unwrap().kind, ErrorKind::BackendTimeout);
    }
}
