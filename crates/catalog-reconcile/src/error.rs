//! Error types for schema reconciliation.

/// Errors that can occur while reconciling the catalog schema.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// A column spec is malformed (empty identifier, NOT NULL without default).
    #[error("Invalid column spec: {0}")]
    InvalidSpec(String),

    /// The catalog lookup for a column failed; add-vs-skip cannot be decided.
    #[error("Failed to introspect {table}.{column}: {source}")]
    Introspection {
        /// Target table.
        table: String,
        /// Target column.
        column: String,
        /// Driver error.
        #[source]
        source: sqlx::Error,
    },

    /// The ALTER statement was rejected for a reason other than "already exists".
    #[error("Failed to add column {table}.{column}: {source}")]
    AlterFailed {
        /// Target table.
        table: String,
        /// Target column.
        column: String,
        /// Driver error.
        #[source]
        source: sqlx::Error,
    },

    /// Filling NULLs with the column default failed.
    #[error("Failed to backfill {table}.{column}: {source}")]
    BackfillFailed {
        /// Target table.
        table: String,
        /// Target column.
        column: String,
        /// Driver error.
        #[source]
        source: sqlx::Error,
    },

    /// Database error outside of a single column step (connect, close).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The database URL names a backend we do not speak.
    #[error("Unsupported database URL: {0}")]
    UnsupportedDatabaseUrl(String),

    /// IO error (reading spec files).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Spec file could not be parsed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Multiple column-level errors occurred.
    #[error("Multiple errors occurred:\n{}", .0.iter().map(|e| format!("  - {}", e)).collect::<Vec<_>>().join("\n"))]
    Multiple(Vec<ReconcileError>),
}

impl ReconcileError {
    /// Returns whether this error is confined to a single column.
    ///
    /// Column-level errors are recorded and the batch moves on; everything
    /// else aborts the run.
    #[must_use]
    pub fn is_column_level(&self) -> bool {
        matches!(
            self,
            Self::InvalidSpec(_) | Self::AlterFailed { .. } | Self::BackfillFailed { .. }
        )
    }
}

/// Result type for reconciliation operations.
pub type Result<T> = std::result::Result<T, ReconcileError>;
