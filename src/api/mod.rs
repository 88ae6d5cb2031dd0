//! HTTP API handlers.

pub mod health;
pub mod playlist;
pub mod rounds;
pub mod sessions;
