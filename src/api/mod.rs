pub mod error;
pub mod middleware;
pub mod rest;

pub use error::ApiError;
pub use rest::{create_router, AppState};
