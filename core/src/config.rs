use crate::error::{EngramError, ErrorCode};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use thiserror::Error;

pub const DEFAULT_MAX_DEPTH: usize = 5;
pub const DEFAULT_MAX_BRANCHES: usize = 3;
pub const DEFAULT_MIN_ACTIVATION: f64 = 0.005;
pub const DEFAULT_TAG_SIM_FLOOR: f64 = 0.15;
pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_DATABASE: &str = "memorygraph";
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum InvalidConfig {
    #[error("max_depth must be positive")]
    NonPositiveDepth,
    #[error("max_branches must be positive")]
    NonPositiveBranches,
    #[error("min_activation must not be negative, got {0}")]
    NegativeMinActivation(f64),
    #[error("tag_sim_floor must be within [0, 1), got {0}")]
    TagSimFloorOutOfRange(f64),
    #[error("{name} must be between 0 and 1, got {value}")]
    WeightOutOfRange { name: &'static str, value: f32 },
    #[error("at least one of bm25_weight or dense_weight must be above zero")]
    AllWeightsZero,
}

impl EngramError for InvalidConfig {
    fn error_code(&self) -> ErrorCode {
        ErrorCode::InvalidArgument
    }
}

/// Tuning knobs of one graph exploration.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Hard cap on BFS iterations.
    pub max_depth: usize,
    /// Per-parent expansion cap per depth.
    pub max_branches: usize,
    /// Strict lower bound a candidate's transfer energy must exceed.
    pub min_activation: f64,
    /// Jaccard floor for a tag mismatch under a tagged query.
    pub tag_sim_floor: f64,
    /// Additional per-exploration attempts on transient failure.
    pub max_retries: u32,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_branches: DEFAULT_MAX_BRANCHES,
            min_activation: DEFAULT_MIN_ACTIVATION,
            tag_sim_floor: DEFAULT_TAG_SIM_FLOOR,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl RetrieverConfig {
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        if self.max_depth == 0 {
            return Err(InvalidConfig::NonPositiveDepth);
        }
        if self.max_branches == 0 {
            return Err(InvalidConfig::NonPositiveBranches);
        }
        if self.min_activation < 0.0 {
            return Err(InvalidConfig::NegativeMinActivation(self.min_activation));
        }
        if !(0.0..1.0).contains(&self.tag_sim_floor) {
            return Err(InvalidConfig::TagSimFloorOutOfRange(self.tag_sim_floor));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GraphConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    #[serde(default = "default_database")]
    pub database: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorConfig {
    pub endpoint: String,
    #[serde(default)]
    pub token: Option<String>,
    pub collection: String,
    pub sparse_field: String,
    pub dense_field: String,
    pub bm25_weight: f32,
    pub dense_weight: f32,
    /// Minimum fused score a hit must reach; off unless the collection asks
    /// for it.
    #[serde(default)]
    pub min_score: Option<f32>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    pub endpoint: String,
    pub api_key: String,
    pub model: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub graph: GraphConfig,
    pub vector: VectorConfig,
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retriever: RetrieverConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .add_source(File::with_name("config/default"))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            .add_source(Environment::with_prefix("ENGRAM").separator("__"));

        builder.build()?.try_deserialize()
    }
}

fn default_database() -> String {
    DEFAULT_DATABASE.to_string()
}

const fn default_dimensions() -> usize {
    DEFAULT_EMBEDDING_DIMENSIONS
}
