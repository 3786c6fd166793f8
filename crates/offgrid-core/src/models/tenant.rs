//! Tenant domain model.
//!
//! A tenant is the isolation boundary for every other entity: users,
//! API keys and all downstream data are scoped to exactly one tenant.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::OffgridError;

/// Subscription plan of a tenant.
///
/// Deserializes through [`FromStr`], so an empty string yields
/// [`Plan::Free`] in payloads and config files alike.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Plan {
    #[default]
    Free,
    Pro,
    Enterprise,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
            Plan::Enterprise => "enterprise",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An empty string parses as [`Plan::Free`].
impl FromStr for Plan {
    type Err = OffgridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "free" => Ok(Plan::Free),
            "pro" => Ok(Plan::Pro),
            "enterprise" => Ok(Plan::Enterprise),
            other => Err(OffgridError::validation(format!("invalid plan {other:?}"))),
        }
    }
}

impl TryFrom<String> for Plan {
    type Error = OffgridError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    /// Human-readable name.
    pub name: String,
    /// URL-safe identifier (e.g. `acme-corp`).
    pub slug: String,
    pub plan: Plan,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn validate(&self) -> Result<(), OffgridError> {
        if self.name.trim().is_empty() {
            return Err(OffgridError::validation("tenant name is required"));
        }
        Ok(())
    }
}

/// Fields required to create a new tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenant {
    pub name: String,
    /// Derived from the name when `None`.
    pub slug: Option<String>,
    pub plan: Plan,
    pub is_active: bool,
}

impl CreateTenant {
    pub fn validate(&self) -> Result<(), OffgridError> {
        if self.name.trim().is_empty() {
            return Err(OffgridError::validation("tenant name is required"));
        }
        Ok(())
    }

    /// The explicit slug, or one derived from the name.
    pub fn resolved_slug(&self) -> String {
        match &self.slug {
            Some(slug) if !slug.trim().is_empty() => slug.trim().to_string(),
            _ => slugify(&self.name),
        }
    }
}

/// Fields that can be updated on an existing tenant.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UpdateTenant {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub plan: Option<Plan>,
    pub is_active: Option<bool>,
}

/// Lower-case the input and collapse every run of non-alphanumeric
/// characters into a single `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
