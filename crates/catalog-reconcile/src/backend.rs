//! Backend selection from a database URL.

use crate::error::{ReconcileError, Result};

/// Database backends the reconciler can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Embedded SQLite (pragma introspection).
    Sqlite,
    /// PostgreSQL (catalog introspection).
    Postgres,
}

impl Backend {
    /// Picks the backend from a connection URL.
    pub fn from_url(url: &str) -> Result<Self> {
        if url.starts_with("sqlite:") {
            Ok(Self::Sqlite)
        } else if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            Ok(Self::Postgres)
        } else {
            Err(ReconcileError::UnsupportedDatabaseUrl(url.to_string()))
        }
    }

    /// Picks the backend from a dialect name (`sqlite`, `postgres`, `postgresql`).
    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "postgres" | "postgresql" => Ok(Self::Postgres),
            _ => Err(ReconcileError::UnsupportedDatabaseUrl(name.to_string())),
        }
    }
}
