//! Prediction collaborator - revenue from `(feature, month, weekday)`.
//!
//! The trained network and its min-max scaler live in two JSON artifacts.
//! Both are read on every call so a retrained model is picked up without a
//! restart, and no state is shared between requests.

use crate::config::ForecastConfig;
use async_trait::async_trait;
use gridops_shared::GridError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Number of model inputs: feature, month, weekday
pub const INPUT_WIDTH: usize = 3;

#[async_trait]
pub trait Predictor: Send + Sync {
    /// `month` is 1-12, `weekday` is 0 (Monday) to 6 (Sunday).
    async fn predict(&self, feature: f64, month: u32, weekday: u32) -> Result<f64, GridError>;
}

// ============================================================================
// Artifacts
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    #[default]
    Linear,
}

/// Fully connected layer; `weights[i][j]` connects input `i` to output `j`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    #[serde(default)]
    pub activation: Activation,
}

impl DenseLayer {
    fn forward(&self, input: &[f64]) -> Vec<f64> {
        let mut out = self.bias.clone();
        for (x, row) in input.iter().zip(&self.weights) {
            for (o, w) in out.iter_mut().zip(row) {
                *o += x * w;
            }
        }
        if self.activation == Activation::Relu {
            out.iter_mut().for_each(|v| *v = v.max(0.0));
        }
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseModel {
    pub layers: Vec<DenseLayer>,
}

impl DenseModel {
    /// Check that layer shapes chain from 3 inputs to 1 output.
    pub fn validate(&self) -> Result<(), String> {
        if self.layers.is_empty() {
            return Err("model has no layers".to_string());
        }
        let mut width = INPUT_WIDTH;
        for (idx, layer) in self.layers.iter().enumerate() {
            if layer.weights.len() != width {
                return Err(format!(
                    "layer {} expects {} inputs, got {}",
                    idx,
                    layer.weights.len(),
                    width
                ));
            }
            if layer.weights.iter().any(|row| row.len() != layer.bias.len()) {
                return Err(format!("layer {} weight rows do not match its bias", idx));
            }
            width = layer.bias.len();
        }
        if width != 1 {
            return Err(format!("model produces {} outputs, expected 1", width));
        }
        Ok(())
    }

    pub fn forward(&self, input: &[f64]) -> f64 {
        let out = self
            .layers
            .iter()
            .fold(input.to_vec(), |acc, layer| layer.forward(&acc));
        out.first().copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub x_min: [f64; INPUT_WIDTH],
    pub x_max: [f64; INPUT_WIDTH],
    pub y_min: f64,
    pub y_max: f64,
}

impl MinMaxScaler {
    pub fn scale_inputs(&self, raw: [f64; INPUT_WIDTH]) -> [f64; INPUT_WIDTH] {
        let mut scaled = [0.0; INPUT_WIDTH];
        for i in 0..INPUT_WIDTH {
            let range = self.x_max[i] - self.x_min[i];
            scaled[i] = if range.abs() < f64::EPSILON {
                0.0
            } else {
                (raw[i] - self.x_min[i]) / range
            };
        }
        scaled
    }

    pub fn unscale_output(&self, scaled: f64) -> f64 {
        scaled * (self.y_max - self.y_min) + self.y_min
    }
}

// ============================================================================
// Artifact predictor (production)
// ============================================================================

pub struct ArtifactPredictor {
    model_path: PathBuf,
    scaler_path: PathBuf,
}

impl ArtifactPredictor {
    pub fn new(model_path: impl AsRef<Path>, scaler_path: impl AsRef<Path>) -> Self {
        Self {
            model_path: model_path.as_ref().to_path_buf(),
            scaler_path: scaler_path.as_ref().to_path_buf(),
        }
    }

    pub fn from_config(config: &ForecastConfig) -> Self {
        Self::new(&config.model_path, &config.scaler_path)
    }

    async fn load<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, GridError> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(GridError::ModelNotTrained(format!(
                    "{} is missing",
                    path.display()
                )))
            }
            Err(e) => {
                return Err(GridError::Prediction(format!(
                    "reading {}: {}",
                    path.display(),
                    e
                )))
            }
        };
        serde_json::from_str(&text)
            .map_err(|e| GridError::Prediction(format!("parsing {}: {}", path.display(), e)))
    }
}

#[async_trait]
impl Predictor for ArtifactPredictor {
    async fn predict(&self, feature: f64, month: u32, weekday: u32) -> Result<f64, GridError> {
        let model: DenseModel = Self::load(&self.model_path).await?;
        let scaler: MinMaxScaler = Self::load(&self.scaler_path).await?;
        model.validate().map_err(GridError::Prediction)?;

        let scaled = scaler.scale_inputs([feature, month as f64, weekday as f64]);
        let value = scaler.unscale_output(model.forward(&scaled));
        debug!(feature, month, weekday, value, "Prediction");

        if value.is_finite() {
            Ok(value)
        } else {
            Err(GridError::Prediction("model produced a non-finite value".to_string()))
        }
    }
}

// ============================================================================
// Fake predictor (testing)
// ============================================================================

pub struct FakePredictor {
    outcome: Result<f64, GridError>,
    calls: Arc<Mutex<Vec<(f64, u32, u32)>>>,
}

impl FakePredictor {
    pub fn returning(value: f64) -> Self {
        Self {
            outcome: Ok(value),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn untrained() -> Self {
        Self {
            outcome: Err(GridError::ModelNotTrained("no artifacts".to_string())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn calls(&self) -> Vec<(f64, u32, u32)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Predictor for FakePredictor {
    async fn predict(&self, feature: f64, month: u32, weekday: u32) -> Result<f64, GridError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((feature, month, weekday));
        }
        self.outcome.clone()
    }
}
