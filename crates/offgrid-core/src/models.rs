//! Domain models for OffGridFlow.
//!
//! Tenants partition all data; users and API keys always belong to
//! exactly one tenant.

pub mod api_key;
pub mod tenant;
pub mod user;
