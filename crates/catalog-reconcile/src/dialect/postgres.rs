//! PostgreSQL dialect.

use sqlx::PgConnection;

use crate::schema::{DefaultValue, SqlType};

use super::SchemaIntrospector;

/// SQLSTATE `duplicate_column`.
const DUPLICATE_COLUMN: &str = "42701";

/// Looks a column up in the information schema of the session's current
/// schema. Identifiers are compared exactly since the ALTER quotes them.
const COLUMN_EXISTS_SQL: &str = r#"
SELECT EXISTS (
    SELECT 1
    FROM information_schema.columns
    WHERE table_schema = current_schema()
      AND table_name::text = $1
      AND column_name::text = $2
)
"#;

/// Catalog-introspection dialect for PostgreSQL.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresIntrospector;

impl PostgresIntrospector {
    /// Creates a new PostgreSQL introspector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl SchemaIntrospector for PostgresIntrospector {
    type Connection = PgConnection;

    fn name(&self) -> &'static str {
        "postgresql"
    }

    async fn column_exists(
        &self,
        conn: &mut PgConnection,
        table: &str,
        column: &str,
    ) -> sqlx::Result<bool> {
        sqlx::query_scalar(COLUMN_EXISTS_SQL)
            .bind(table)
            .bind(column)
            .fetch_one(&mut *conn)
            .await
    }

    async fn execute(&self, conn: &mut PgConnection, sql: &str) -> sqlx::Result<u64> {
        let result = sqlx::query(sql).execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }

    fn is_duplicate_column(&self, err: &sqlx::Error) -> bool {
        err.as_database_error()
            .and_then(|db| db.code())
            .is_some_and(|code| code == DUPLICATE_COLUMN)
    }

    fn type_name(&self, sql_type: &SqlType) -> String {
        match sql_type {
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::Integer => "INTEGER".to_string(),
            SqlType::BigInt => "BIGINT".to_string(),
            SqlType::Text => "TEXT".to_string(),
            SqlType::Varchar(len) => format!("VARCHAR({})", len),
            SqlType::Custom(expr) => expr.clone(),
        }
    }

    fn default_literal(&self, default: &DefaultValue) -> Option<String> {
        match default {
            DefaultValue::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
            other => other.to_sql(),
        }
    }
}
