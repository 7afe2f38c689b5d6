//! Database dialect implementations.
//!
//! Each dialect knows how to ask its backend whether a column exists and how
//! to render the ALTER/UPDATE statements that add and backfill one. The
//! reconciler only ever talks to [`SchemaIntrospector`].

mod postgres;
mod sqlite;

pub use postgres::PostgresIntrospector;
pub use sqlite::SqliteIntrospector;

use crate::schema::{ColumnSpec, DefaultValue, SqlType};

/// Backend capability used by the reconciler.
///
/// Every call takes the connection explicitly; implementations hold no
/// connection state of their own.
#[allow(async_fn_in_trait)]
pub trait SchemaIntrospector {
    /// Connection handle the backend operates on.
    type Connection;

    /// Returns the dialect name.
    fn name(&self) -> &'static str;

    /// Returns whether `table` currently has a column named `column`.
    async fn column_exists(
        &self,
        conn: &mut Self::Connection,
        table: &str,
        column: &str,
    ) -> sqlx::Result<bool>;

    /// Executes a DDL/DML statement and returns the number of rows affected.
    async fn execute(&self, conn: &mut Self::Connection, sql: &str) -> sqlx::Result<u64>;

    /// Returns whether `err` is the backend's "column already exists" rejection.
    fn is_duplicate_column(&self, err: &sqlx::Error) -> bool;

    /// Returns the SQL type name for the given type.
    fn type_name(&self, sql_type: &SqlType) -> String;

    /// Renders a default value as a SQL literal.
    fn default_literal(&self, default: &DefaultValue) -> Option<String> {
        default.to_sql()
    }

    /// Quote an identifier (table name, column name).
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    /// Renders the type expression that follows the column name in
    /// `ADD COLUMN`, e.g. `BOOLEAN DEFAULT FALSE NOT NULL`.
    fn type_expression(&self, spec: &ColumnSpec) -> String {
        let mut parts = vec![self.type_name(&spec.sql_type)];

        if let Some(default_sql) = self.default_literal(&spec.default) {
            parts.push(format!("DEFAULT {}", default_sql));
        }

        if !spec.nullable {
            parts.push("NOT NULL".to_string());
        }

        parts.join(" ")
    }

    /// Generates SQL for adding a column.
    fn add_column_sql(&self, table: &str, column: &str, type_expr: &str) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            self.quote_identifier(table),
            self.quote_identifier(column),
            type_expr
        )
    }

    /// Generates SQL that replaces NULLs in a column with its default.
    fn backfill_sql(&self, table: &str, column: &str, default_expr: &str) -> String {
        let column = self.quote_identifier(column);
        format!(
            "UPDATE {} SET {} = {} WHERE {} IS NULL",
            self.quote_identifier(table),
            column,
            default_expr,
            column
        )
    }
}
