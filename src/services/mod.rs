//! Service layer: external clients and the generation pipeline.

pub mod analysis;
pub mod enrichment;
pub mod llm_client;
pub mod recommender;
pub mod search_client;

pub use enrichment::EnrichmentGateway;
pub use llm_client::{LlmClient, LlmError};
pub use search_client::{SearchClient, SearchResult};
