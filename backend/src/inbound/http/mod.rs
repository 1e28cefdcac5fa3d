//! HTTP inbound adapter exposing REST endpoints.

pub mod error;
pub mod health;
pub mod notes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::HttpState;
