//! Query orchestration pipeline.
//!
//! One request in, one envelope out:
//!
//! ```text
//! RECEIVED -> CLASSIFIED -> FORECASTING | QUERYING -> ANALYZED -> ASSEMBLED
//!                  \______________ any failure ______________/-> ERRORED
//! ```
//!
//! The pipeline holds only immutable configuration and shared collaborator
//! handles, so concurrent requests never contend on it. Stages run strictly
//! in sequence and nothing is retried.

use crate::analyzer;
use crate::backend::{Backend, BackendReply, BackendRoute};
use crate::classifier;
use crate::config::{AnalysisConfig, BackendConfig, Config};
use crate::date_resolver;
use crate::predictor::Predictor;
use crate::query_gen;
use crate::render::ChartRenderer;
use crate::storage::{Storage, SCHEMA_DESCRIPTION};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use gridops_shared::{
    ChartKind, ChatRequest, ErrorKind, GridError, Insight, Intent, ResponseEnvelope, ResultTable,
};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Pipeline states, logged on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    Classified,
    Forecasting,
    Querying,
    Analyzed,
    Assembled,
    Errored,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "RECEIVED",
            Self::Classified => "CLASSIFIED",
            Self::Forecasting => "FORECASTING",
            Self::Querying => "QUERYING",
            Self::Analyzed => "ANALYZED",
            Self::Assembled => "ASSEMBLED",
            Self::Errored => "ERRORED",
        };
        write!(f, "{}", s)
    }
}

fn enter(stage: PipelineStage) {
    info!(stage = %stage, "pipeline stage");
}

/// Why a request stopped before assembly
#[derive(Debug)]
struct Halt {
    kind: ErrorKind,
    content: String,
}

impl From<GridError> for Halt {
    fn from(err: GridError) -> Self {
        Self {
            kind: err.kind(),
            content: err.to_string(),
        }
    }
}

/// Everything a DATA envelope needs besides the chart document
struct Fulfilled {
    table: ResultTable,
    generated_query: Option<String>,
    insight: Insight,
}

pub struct Pipeline {
    backend: Arc<dyn Backend>,
    storage: Arc<dyn Storage>,
    predictor: Arc<dyn Predictor>,
    renderer: Arc<dyn ChartRenderer>,
    backend_config: BackendConfig,
    analysis: AnalysisConfig,
}

impl Pipeline {
    pub fn new(
        backend: Arc<dyn Backend>,
        storage: Arc<dyn Storage>,
        predictor: Arc<dyn Predictor>,
        renderer: Arc<dyn ChartRenderer>,
        config: &Config,
    ) -> Self {
        Self {
            backend,
            storage,
            predictor,
            renderer,
            backend_config: config.backend.clone(),
            analysis: config.analysis.clone(),
        }
    }

    /// Handle a request against the server's current local time.
    pub async fn handle(&self, request: &ChatRequest) -> ResponseEnvelope {
        self.handle_at(request, chrono::Local::now().naive_local())
            .await
    }

    /// Handle a request with an explicit "now".
    pub async fn handle_at(&self, request: &ChatRequest, now: NaiveDateTime) -> ResponseEnvelope {
        let span = info_span!(
            "request",
            id = %Uuid::new_v4(),
            target = %request.backend_preference
        );
        self.run(request, now).instrument(span).await
    }

    async fn run(&self, request: &ChatRequest, now: NaiveDateTime) -> ResponseEnvelope {
        enter(PipelineStage::Received);
        let message = request.message.trim();
        if message.is_empty() {
            enter(PipelineStage::Errored);
            return ResponseEnvelope::error(
                Intent::Query,
                ErrorKind::InvalidRequest,
                "Message must not be empty",
            );
        }

        let route = BackendRoute::from_config(
            self.backend.clone(),
            request.backend_preference,
            &self.backend_config,
        );

        let classification = classifier::classify(&route, message, now.date()).await;
        let intent = classification.intent;
        enter(PipelineStage::Classified);
        info!(intent = %intent, "classified");

        let outcome = match intent {
            Intent::Forecast => self.forecast(&route, message, now.date()).await,
            Intent::Query => {
                self.query(&route, message, now, classification.unavailable)
                    .await
            }
        };

        match outcome {
            Ok(fulfilled) => self.assemble(intent, fulfilled),
            Err(halt) => {
                enter(PipelineStage::Errored);
                warn!(kind = %halt.kind, "request failed: {}", halt.content);
                ResponseEnvelope::error(intent, halt.kind, &halt.content)
            }
        }
    }

    async fn forecast(
        &self,
        route: &BackendRoute,
        message: &str,
        today: NaiveDate,
    ) -> Result<Fulfilled, Halt> {
        enter(PipelineStage::Forecasting);
        let date = date_resolver::resolve_date(route, message, today).await?;
        let date_key = date.format("%Y-%m-%d").to_string();

        let feature = self
            .storage
            .lookup_feature(&date_key)
            .await?
            .ok_or_else(|| GridError::NoFeatureData(date_key.clone()))?;

        let value = self
            .predictor
            .predict(feature, date.month(), date.weekday().num_days_from_monday())
            .await?;
        let value = (value * 100.0).round() / 100.0;

        let table = ResultTable::new(vec!["date".to_string(), "value".to_string()])
            .with_row(vec![json!(date_key), json!(value)]);
        let summary = format!("Revenue Forecast for {}: ${:.2}", date_key, value);

        Ok(Fulfilled {
            table,
            generated_query: None,
            insight: Insight::chart(&summary, ChartKind::Line, "date", "value"),
        })
    }

    async fn query(
        &self,
        route: &BackendRoute,
        message: &str,
        now: NaiveDateTime,
        unavailable: Option<BackendReply>,
    ) -> Result<Fulfilled, Halt> {
        enter(PipelineStage::Querying);
        // A target that already failed classification is not called again
        let generated = match unavailable {
            Some(reply) => query_gen::sanitize(reply),
            None => query_gen::generate(route, message, SCHEMA_DESCRIPTION, now).await,
        };

        if generated.is_error_sentinel() {
            return Err(Halt {
                kind: generated.failure.unwrap_or(ErrorKind::BackendConnection),
                content: generated
                    .sentinel_message()
                    .unwrap_or(&generated.statement)
                    .to_string(),
            });
        }

        let table = self.storage.execute(&generated.statement).await?;
        info!(rows = table.row_count(), "statement executed");

        let insight = analyzer::analyze(
            route,
            &table,
            message,
            self.analysis.effective_sample_rows(),
        )
        .await;

        Ok(Fulfilled {
            table,
            generated_query: Some(generated.statement),
            insight,
        })
    }

    fn assemble(&self, intent: Intent, fulfilled: Fulfilled) -> ResponseEnvelope {
        enter(PipelineStage::Analyzed);
        let chart_document = if fulfilled.insight.wants_chart() {
            self.renderer.render(&fulfilled.table, &fulfilled.insight)
        } else {
            None
        };

        let envelope = ResponseEnvelope::data(
            intent,
            fulfilled.table,
            fulfilled.generated_query,
            fulfilled.insight,
            chart_document,
        );
        enter(PipelineStage::Assembled);
        envelope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FakeBackend;
    use crate::predictor::FakePredictor;
    use crate::prompts;
    use crate::render::PlotlyRenderer;
    use crate::storage::FakeStorage;
    use gridops_shared::BackendTarget;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn pipeline(backend: FakeBackend, storage: FakeStorage, predictor: FakePredictor) -> Pipeline {
        Pipeline::new(
            Arc::new(backend),
            Arc::new(storage),
            Arc::new(predictor),
            Arc::new(PlotlyRenderer),
            &Config::default(),
        )
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(PipelineStage::Forecasting.to_string(), "FORECASTING");
        assert_eq!(PipelineStage::Errored.to_string(), "ERRORED");
    }

    #[tokio::test]
    async fn test_blank_message_is_invalid() {
        let p = pipeline(FakeBackend::new(), FakeStorage::new(), FakePredictor::returning(1.0));
        let env = p
            .handle_at(&ChatRequest::new("   ", BackendTarget::Local), now())
            .await;
        assert_eq!(env.error, Some(ErrorKind::InvalidRequest));
    }

    #[tokio::test]
    async fn test_forecast_weekday_and_month() {
        let backend = FakeBackend::new()
            .respond_when(prompts::CLASSIFIER_ROLE, r#"{"intent": "FORECAST"}"#)
            .respond_when(prompts::DATE_ROLE, "2025-06-02");
        let predictor = Arc::new(FakePredictor::returning(1234.567));
        let p = Pipeline::new(
            Arc::new(backend),
            Arc::new(FakeStorage::new().with_feature("2025-06-02", 480.0)),
            predictor.clone(),
            Arc::new(PlotlyRenderer),
            &Config::default(),
        );

        let env = p
            .handle_at(&ChatRequest::new("revenue tomorrow", BackendTarget::Local), now())
            .await;
        assert_eq!(env.content, "Revenue Forecast for 2025-06-02: $1234.57");
        // 2025-06-02 is a Monday
        assert_eq!(predictor.calls(), vec![(480.0, 6, 0)]);
    }

    #[tokio::test]
    async fn test_untrained_model() {
        let backend = FakeBackend::new()
            .respond_when(prompts::CLASSIFIER_ROLE, r#"{"intent": "FORECAST"}"#)
            .respond_when(prompts::DATE_ROLE, "2025-06-02");
        let p = pipeline(
            backend,
            FakeStorage::new().with_feature("2025-06-02", 1.0),
            FakePredictor::untrained(),
        );
        let env = p
            .handle_at(&ChatRequest::new("revenue tomorrow", BackendTarget::Local), now())
            .await;
        assert_eq!(env.error, Some(ErrorKind::ModelNotTrained));
        assert!(env.table.is_none());
    }

    #[tokio::test]
    async fn test_execution_message_is_verbatim() {
        let backend = FakeBackend::new().respond_when(prompts::SQL_ROLE, "SELECT nope FROM nowhere");
        let p = pipeline(
            backend,
            FakeStorage::new().failing_with("no such table: nowhere"),
            FakePredictor::returning(1.0),
        );
        let env = p
            .handle_at(&ChatRequest::new("show nowhere", BackendTarget::Local), now())
            .await;
        assert_eq!(env.error, Some(ErrorKind::ExecutionFailed));
        assert!(env.content.contains("no such table: nowhere"));
        assert_eq!(env.intent, Intent::Query);
    }
}
