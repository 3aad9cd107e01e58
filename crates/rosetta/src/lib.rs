//! The Rosetta API surface.
//!
//! Typed request/response models, the numbered error taxonomy, the data
//! and construction services, and the axum router binding them to the
//! Rosetta HTTP endpoints.

mod error;
mod router;
pub mod services;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use router::router;
pub use services::Services;
