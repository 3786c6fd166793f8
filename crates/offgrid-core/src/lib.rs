//! OffGridFlow Core: domain models, error types and the repository
//! contract consumed by the auth layer.

pub mod error;
pub mod models;
pub mod repository;

pub use error::{OffgridError, OffgridResult};
