//! SQLite dialect.
//!
//! SQLite has no information schema; table structure comes from the
//! `table_info` pragma. We use its table-valued form so the table name can be
//! bound as a parameter instead of spliced into the statement.

use sqlx::SqliteConnection;

use crate::schema::SqlType;

use super::SchemaIntrospector;

/// Pragma-introspection dialect for SQLite.
#[derive(Debug, Clone, Default)]
pub struct SqliteIntrospector;

impl SqliteIntrospector {
    /// Creates a new SQLite introspector.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Lists the column names of `table`, in declaration order.
    ///
    /// An unknown table yields an empty list.
    pub async fn columns(&self, conn: &mut SqliteConnection, table: &str) -> sqlx::Result<Vec<String>> {
        sqlx::query_scalar("SELECT name FROM pragma_table_info(?1)")
            .bind(table)
            .fetch_all(&mut *conn)
            .await
    }
}

impl SchemaIntrospector for SqliteIntrospector {
    type Connection = SqliteConnection;

    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn column_exists(
        &self,
        conn: &mut SqliteConnection,
        table: &str,
        column: &str,
    ) -> sqlx::Result<bool> {
        // SQLite column names are case-insensitive.
        let columns = self.columns(conn, table).await?;
        Ok(columns.iter().any(|c| c.eq_ignore_ascii_case(column)))
    }

    async fn execute(&self, conn: &mut SqliteConnection, sql: &str) -> sqlx::Result<u64> {
        let result = sqlx::query(sql).execute(&mut *conn).await?;
        Ok(result.rows_affected())
    }

    fn is_duplicate_column(&self, err: &sqlx::Error) -> bool {
        err.as_database_error()
            .is_some_and(|db| db.message().contains("duplicate column name"))
    }

    fn type_name(&self, sql_type: &SqlType) -> String {
        match sql_type {
            SqlType::Boolean => "BOOLEAN".to_string(),
            SqlType::Integer | SqlType::BigInt => "INTEGER".to_string(),
            SqlType::Text => "TEXT".to_string(),
            SqlType::Varchar(len) => format!("VARCHAR({})", len),
            SqlType::Custom(expr) => expr.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSpec, DefaultValue};
    use sqlx::Connection;

    fn dialect() -> SqliteIntrospector {
        SqliteIntrospector::new()
    }

    async fn memory_conn() -> SqliteConnection {
        let mut conn = SqliteConnection::connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory SQLite database");
        sqlx::query("CREATE TABLE products_product (id INTEGER PRIMARY KEY, Name TEXT NOT NULL)")
            .execute(&mut conn)
            .await
            .unwrap();
        conn
    }

    #[test]
    fn test_add_column_sql() {
        let spec = ColumnSpec::new("products_product", "image_5", SqlType::Varchar(200));
        let sql = dialect().add_column_sql("products_product", "image_5", &dialect().type_expression(&spec));
        assert_eq!(
            sql,
            "ALTER TABLE \"products_product\" ADD COLUMN \"image_5\" VARCHAR(200)"
        );
    }

    #[test]
    fn test_type_names() {
        assert_eq!(dialect().type_name(&SqlType::BigInt), "INTEGER");
        assert_eq!(dialect().type_name(&SqlType::Boolean), "BOOLEAN");
        assert_eq!(
            dialect().type_name(&SqlType::Custom("TEXT COLLATE NOCASE".to_string())),
            "TEXT COLLATE NOCASE"
        );
        assert_eq!(
            dialect().default_literal(&DefaultValue::Bool(true)),
            Some("1".to_string())
        );
    }

    #[tokio::test]
    async fn test_columns_lists_declared_columns() {
        let mut conn = memory_conn().await;
        let columns = dialect().columns(&mut conn, "products_product").await.unwrap();
        assert_eq!(columns, vec!["id".to_string(), "Name".to_string()]);

        let missing = dialect().columns(&mut conn, "no_such_table").await.unwrap();
        assert!(missing.is_empty());
    }

    #[tokio::test]
    async fn test_column_exists_is_case_insensitive() {
        let mut conn = memory_conn().await;
        let d = dialect();

        assert!(d.column_exists(&mut conn, "products_product", "name").await.unwrap());
        assert!(d.column_exists(&mut conn, "products_product", "NAME").await.unwrap());
        assert!(!d.column_exists(&mut conn, "products_product", "image_5").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_column_is_recognised() {
        let mut conn = memory_conn().await;
        let d = dialect();

        let err = d
            .execute(&mut conn, "ALTER TABLE \"products_product\" ADD COLUMN \"name\" TEXT")
            .await
            .unwrap_err();
        assert!(d.is_duplicate_column(&err));

        let other = d
            .execute(&mut conn, "ALTER TABLE \"no_such_table\" ADD COLUMN \"x\" TEXT")
            .await
            .unwrap_err();
        assert!(!d.is_duplicate_column(&other));
    }
}
