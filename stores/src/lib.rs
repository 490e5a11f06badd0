pub mod embedding;
pub mod error;
pub mod graph;
pub mod memory;
pub mod vector;

pub use embedding::{EmbeddingProvider, HashEmbedder, OpenAiEmbedder};
pub use error::StoreError;
pub use graph::{ExpandOptions, GraphStore, GraphTx, Neo4jHttpStore};
pub use memory::{MemoryGraph, MemoryGraphStore, MemoryVectorEntry, MemoryVectorSearcher};
pub use vector::{HybridSearchRequest, MilvusHttpSearcher, VectorHit, VectorSearcher, WeightedRanker};
