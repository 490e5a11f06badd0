pub mod explorer;
pub mod projection;
pub mod seeds;
pub mod traversal;

pub use explorer::{ExplorationStream, GraphExplorer};
pub use projection::{
    to_d3, to_debug_cypher, to_llm_context, AttributeSections, D3Graph, DebugCypher, LlmContext,
};
pub use seeds::SeedRetriever;
pub use traversal::GraphTraversalState;

use engram_core::config::InvalidConfig;
use engram_core::error::{EngramError, ErrorCode};
use stores::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrieverError {
    #[error("invalid configuration: {0}")]
    Config(#[from] InvalidConfig),
    #[error("store unavailable: {0}")]
    Store(#[from] StoreError),
}

impl EngramError for RetrieverError {
    fn error_code(&self) -> ErrorCode {
        match self {
            RetrieverError::Config(error) => error.error_code(),
            RetrieverError::Store(error) => error.error_code(),
        }
    }
}
