//! Domain types for API keys and scopes.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// Permission granted to a caller's key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiScope {
    /// Enqueue and retry jobs.
    JobsWrite,
    /// Read job records and download artifacts.
    JobsRead,
}

impl ApiScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::JobsWrite => "jobs_write",
            Self::JobsRead => "jobs_read",
        }
    }

    pub fn all() -> &'static [ApiScope] {
        &[Self::JobsWrite, Self::JobsRead]
    }
}

impl Display for ApiScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiScope {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "jobs_write" => Ok(Self::JobsWrite),
            "jobs_read" => Ok(Self::JobsRead),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiKeyRecord {
    pub id: Uuid,
    /// Caller label; becomes the owner of every job the key enqueues.
    pub name: String,
    pub prefix: String,
    pub hashed_secret: Vec<u8>,
    pub scopes: Vec<ApiScope>,
    pub expires_at: Option<OffsetDateTime>,
    pub revoked_at: Option<OffsetDateTime>,
    pub last_used_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl ApiKeyRecord {
    pub fn is_active_at(&self, now: OffsetDateTime) -> bool {
        if self.revoked_at.is_some_and(|revoked_at| revoked_at <= now) {
            return false;
        }
        self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}
