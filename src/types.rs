//! Core types shared across the migration engine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier assigned by the target store
pub type EntityId = u64;

/// WordPress post/attachment/comment identifier from the export
pub type WpId = u64;

/// Account every unmapped author falls back to
pub const ADMIN_ID: EntityId = 1;

/// Placeholder id handed out instead of a real one during a dry run
pub const SENTINEL_ID: EntityId = 999;

/// Kinds of entity the pipeline creates in the target store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    User,
    Media,
    Term,
    Node,
    Comment,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Media => "media",
            Self::Term => "term",
            Self::Node => "node",
            Self::Comment => "comment",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How WordPress authors are mapped onto target-store accounts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UserStrategy {
    /// Every author becomes the admin account; no accounts are written
    #[default]
    MapToAdmin,
    /// Look up or create one account per author
    CreateUsers,
}

impl fmt::Display for UserStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MapToAdmin => f.write_str("map-to-admin"),
            Self::CreateUsers => f.write_str("create-users"),
        }
    }
}
