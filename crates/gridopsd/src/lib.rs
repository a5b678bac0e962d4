//! GridOps daemon library - exposes modules for testing.

pub mod analyzer;
pub mod backend;
pub mod classifier;
pub mod config;
pub mod date_resolver;
pub mod pipeline;
pub mod predictor;
pub mod prompts;
pub mod query_gen;
pub mod render;
pub mod routes;
pub mod server;
pub mod storage;

pub use backend::{Backend, BackendReply, BackendRoute, FakeBackend, HttpBackend};
pub use config::Config;
pub use pipeline::{Pipeline, PipelineStage};
pub use predictor::{ArtifactPredictor, FakePredictor, Predictor};
pub use render::{ChartRenderer, PlotlyRenderer};
pub use storage::{FakeStorage, SqliteStorage, Storage};
