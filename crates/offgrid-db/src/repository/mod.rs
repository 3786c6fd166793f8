//! In-memory repository implementations.

mod api_key;
mod tenant;
mod user;

pub use api_key::MemoryApiKeyRepository;
pub use tenant::MemoryTenantRepository;
pub use user::MemoryUserRepository;
