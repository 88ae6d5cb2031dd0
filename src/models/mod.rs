//! Domain models shared across db, services and api layers.

pub mod recommendation;
pub mod round;

pub use recommendation::{normalized_key, CandidateSong, RecommendationBatch};
pub use round::RoundStatus;
