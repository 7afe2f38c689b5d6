//! Idempotent schema reconciliation for the storefront catalog.
//!
//! `catalog-reconcile` makes the physical column set of the catalog tables a
//! superset of what the model layer declares, for deployments whose database
//! drifted (an interrupted deploy, a migration recorded but never applied):
//! - Missing columns are added, present ones are left alone
//! - Re-running is always safe; "already exists" is success, not failure
//! - A column the backend refuses is logged and skipped, the rest still land
//! - Columns are never dropped or renamed
//!
//! # Architecture
//!
//! - **Schema** - `ColumnSpec`, the column a table must have
//! - **Dialect** - `SchemaIntrospector`, per-backend column lookup and SQL
//! - **Reconciler** - walks the specs, adds and backfills, reports per column
//! - **Catalog** - the storefront column list and JSON spec files
//!
//! # Example
//!
//! ```rust,ignore
//! use catalog_reconcile::prelude::*;
//! use sqlx::{Connection, SqliteConnection};
//!
//! let mut conn = SqliteConnection::connect("sqlite:db.sqlite3").await?;
//! let reconciler = Reconciler::new(SqliteIntrospector::new());
//!
//! let report = reconciler.reconcile(&mut conn, &storefront_columns()).await?;
//! for failed in report.failures() {
//!     eprintln!("{}.{} was not added", failed.table, failed.column);
//! }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Add whatever is missing
//! catalog-reconcile --database postgres://shop@localhost/shop reconcile
//!
//! # Report drift without altering anything
//! catalog-reconcile check
//!
//! # Print the statements for a dialect
//! catalog-reconcile sql --dialect postgres
//! ```

pub mod backend;
pub mod catalog;
pub mod dialect;
pub mod error;
pub mod reconciler;
pub mod schema;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::backend::Backend;
    pub use crate::catalog::{load_specs, storefront_columns, SpecFile};
    pub use crate::dialect::{PostgresIntrospector, SchemaIntrospector, SqliteIntrospector};
    pub use crate::error::{ReconcileError, Result};
    pub use crate::reconciler::{ColumnOutcome, ColumnStatus, ReconcileReport, Reconciler};
    pub use crate::schema::{ColumnSpec, DefaultValue, SqlType};
}
