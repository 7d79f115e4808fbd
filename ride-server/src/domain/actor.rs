//! The acting party behind a request.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{AdminId, CaptainId, DomainError, RiderId};

/// Who is performing an operation.
///
/// Resolved once at the boundary (from the authenticated session) and passed
/// explicitly through the core; nothing below the web layer inspects raw
/// request fields to decide the role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "lowercase")]
pub enum Actor {
    Rider(RiderId),
    Captain(CaptainId),
    Admin(AdminId),
}

impl Actor {
    pub fn role(&self) -> &'static str {
        match self {
            Actor::Rider(_) => "rider",
            Actor::Captain(_) => "captain",
            Actor::Admin(_) => "admin",
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Rider(id) => write!(f, "rider:{id}"),
            Actor::Captain(id) => write!(f, "captain:{id}"),
            Actor::Admin(id) => write!(f, "admin:{id}"),
        }
    }
}

impl FromStr for Actor {
    type Err = DomainError;

    /// Parse `rider:<id>`, `captain:<id>` or `admin:<id>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (role, id) = s
            .split_once(':')
            .ok_or_else(|| DomainError::InvalidActor(s.to_string()))?;
        match role.trim().to_ascii_lowercase().as_str() {
            "rider" => Ok(Actor::Rider(id.parse()?)),
            "captain" => Ok(Actor::Captain(id.parse()?)),
            "admin" => Ok(Actor::Admin(id.parse()?)),
            _ => Err(DomainError::InvalidActor(s.to_string())),
        }
    }
}
