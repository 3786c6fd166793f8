//! Shared table handle backing the in-memory repositories.

use std::collections::HashMap;
use std::sync::Arc;

use offgrid_core::models::{api_key::ApiKey, tenant::Tenant, user::User};
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default)]
pub(crate) struct Tables {
    pub(crate) tenants: HashMap<Uuid, Tenant>,
    pub(crate) users: HashMap<Uuid, User>,
    pub(crate) api_keys: HashMap<Uuid, ApiKey>,
}

/// Cheaply cloneable handle to one in-memory database.
///
/// Clones share the same tables, so repositories built from clones of a
/// single handle see each other's writes.
#[derive(Debug, Clone, Default)]
pub struct MemoryDb {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        debug!("Creating in-memory store");
        Self::default()
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        f(&self.tables.read())
    }

    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
        f(&mut self.tables.write())
    }
}
