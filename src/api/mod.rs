//! HTTP API boundary - task lifecycle endpoints and the progress stream.

pub mod routes;
pub mod types;

pub use routes::{serve, AppState};
