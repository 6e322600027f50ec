//! Elicit Graph - dual (surface + canonical) knowledge-graph model,
//! in-memory store, embeddings, and coverage matching

pub mod canonical_state;
pub mod coverage;
pub mod embedding;
pub mod model;
pub mod store;

pub use canonical_state::compute_canonical_state;
pub use embedding::{cosine_similarity, EmbeddingService, EMBEDDING_DIM};
pub use model::*;
pub use store::MemoryStore;
