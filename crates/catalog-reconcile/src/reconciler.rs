//! Column reconciler.
//!
//! Brings a table's physical column set up to a required superset, one
//! column at a time. Each column moves `ABSENT -> PRESENT` at most once;
//! re-running against a reconciled catalog issues no ALTER at all.
//!
//! Failures are isolated per column: a rejected ALTER or backfill is logged
//! and recorded in the [`ReconcileReport`] while the batch moves on. Only
//! failures that leave us unable to decide add-vs-skip (introspection,
//! connection) abort the run.

use tracing::{debug, info, warn};

use crate::dialect::SchemaIntrospector;
use crate::error::{ReconcileError, Result};
use crate::schema::ColumnSpec;

/// What happened to a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnStatus {
    /// The column was missing and has been added.
    Added,
    /// The column already existed; nothing was altered.
    AlreadyPresent,
    /// Dry run: the column is missing and would be added.
    Planned,
}

/// Outcome of reconciling one [`ColumnSpec`].
#[derive(Debug)]
pub struct ColumnOutcome {
    /// Target table.
    pub table: String,
    /// Target column.
    pub column: String,
    /// Status, or the column-level error that stopped this column.
    pub result: Result<ColumnStatus>,
    /// Rows whose NULL was replaced by the column default.
    pub backfilled: u64,
}

impl ColumnOutcome {
    /// Returns the status if this column succeeded.
    #[must_use]
    pub fn status(&self) -> Option<ColumnStatus> {
        self.result.as_ref().ok().copied()
    }

    /// Returns whether this column failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.result.is_err()
    }
}

/// Per-column results of a [`Reconciler::reconcile`] run, in input order.
#[derive(Debug)]
pub struct ReconcileReport {
    /// Dialect the run was made against.
    pub dialect: &'static str,
    /// One outcome per input spec.
    pub outcomes: Vec<ColumnOutcome>,
}

impl ReconcileReport {
    fn count(&self, status: ColumnStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status() == Some(status))
            .count()
    }

    /// Number of columns added by this run.
    #[must_use]
    pub fn added(&self) -> usize {
        self.count(ColumnStatus::Added)
    }

    /// Number of columns that were already present.
    #[must_use]
    pub fn already_present(&self) -> usize {
        self.count(ColumnStatus::AlreadyPresent)
    }

    /// Number of columns a dry run would add.
    #[must_use]
    pub fn planned(&self) -> usize {
        self.count(ColumnStatus::Planned)
    }

    /// Total rows backfilled across all columns.
    #[must_use]
    pub fn backfilled(&self) -> u64 {
        self.outcomes.iter().map(|o| o.backfilled).sum()
    }

    /// Outcomes that failed.
    pub fn failures(&self) -> impl Iterator<Item = &ColumnOutcome> {
        self.outcomes.iter().filter(|o| o.is_failed())
    }

    /// Returns whether every column succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Collapses the report into a single result, aggregating all column
    /// failures into [`ReconcileError::Multiple`].
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        let errors = self
            .outcomes
            .into_iter()
            .filter_map(|o| o.result.err())
            .collect();
        Err(ReconcileError::Multiple(errors))
    }
}

/// Applies [`ColumnSpec`]s through a [`SchemaIntrospector`].
pub struct Reconciler<I: SchemaIntrospector> {
    introspector: I,
    dry_run: bool,
}

impl<I: SchemaIntrospector> Reconciler<I> {
    /// Creates a new reconciler.
    pub fn new(introspector: I) -> Self {
        Self {
            introspector,
            dry_run: false,
        }
    }

    /// Enables dry-run mode (catalog is inspected, nothing is altered).
    #[must_use]
    pub fn dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Returns the introspector.
    #[must_use]
    pub fn introspector(&self) -> &I {
        &self.introspector
    }

    /// Ensures `table.column` exists, adding it with `type_expr` if absent.
    ///
    /// "Already exists" is never an error, whether it is seen by the lookup
    /// or reported by the backend when the ALTER itself runs.
    pub async fn ensure_column(
        &self,
        conn: &mut I::Connection,
        table: &str,
        column: &str,
        type_expr: &str,
    ) -> Result<ColumnStatus> {
        if table.trim().is_empty() || column.trim().is_empty() {
            return Err(ReconcileError::InvalidSpec(format!(
                "empty identifier in '{}.{}'",
                table, column
            )));
        }

        let exists = self
            .introspector
            .column_exists(conn, table, column)
            .await
            .map_err(|source| ReconcileError::Introspection {
                table: table.to_string(),
                column: column.to_string(),
                source,
            })?;

        if exists {
            debug!(table = %table, column = %column, "Column already present");
            return Ok(ColumnStatus::AlreadyPresent);
        }

        let sql = self.introspector.add_column_sql(table, column, type_expr);

        if self.dry_run {
            info!(table = %table, column = %column, sql = %sql, "Column missing (dry run)");
            return Ok(ColumnStatus::Planned);
        }

        debug!(sql = %sql, "Executing SQL");
        match self.introspector.execute(conn, &sql).await {
            Ok(_) => {
                info!(table = %table, column = %column, "Column added");
                Ok(ColumnStatus::Added)
            }
            Err(err) if self.introspector.is_duplicate_column(&err) => {
                debug!(table = %table, column = %column, "Column appeared concurrently");
                Ok(ColumnStatus::AlreadyPresent)
            }
            Err(source) => Err(ReconcileError::AlterFailed {
                table: table.to_string(),
                column: column.to_string(),
                source,
            }),
        }
    }

    /// Replaces NULLs in `table.column` with `default_expr`.
    ///
    /// Returns the number of rows changed; zero when there were no NULLs.
    pub async fn backfill_null_defaults(
        &self,
        conn: &mut I::Connection,
        table: &str,
        column: &str,
        default_expr: &str,
    ) -> Result<u64> {
        let sql = self.introspector.backfill_sql(table, column, default_expr);

        if self.dry_run {
            debug!(sql = %sql, "Skipping backfill (dry run)");
            return Ok(0);
        }

        debug!(sql = %sql, "Executing SQL");
        let rows = self
            .introspector
            .execute(conn, &sql)
            .await
            .map_err(|source| ReconcileError::BackfillFailed {
                table: table.to_string(),
                column: column.to_string(),
                source,
            })?;

        if rows > 0 {
            info!(table = %table, column = %column, rows, "Backfilled NULL values");
        }
        Ok(rows)
    }

    async fn reconcile_one(
        &self,
        conn: &mut I::Connection,
        spec: &ColumnSpec,
    ) -> Result<(ColumnStatus, u64)> {
        spec.validate()?;

        let type_expr = self.introspector.type_expression(spec);
        let status = self
            .ensure_column(conn, &spec.table, &spec.column, &type_expr)
            .await?;

        if status == ColumnStatus::Planned || !spec.needs_backfill() {
            return Ok((status, 0));
        }

        let backfilled = match self.introspector.default_literal(&spec.default) {
            Some(default_expr) => {
                self.backfill_null_defaults(conn, &spec.table, &spec.column, &default_expr)
                    .await?
            }
            None => 0,
        };

        Ok((status, backfilled))
    }

    /// Reconciles every spec, in order.
    ///
    /// Returns `Err` only for failures that make the rest of the run unsafe;
    /// column-level failures are logged and reported in the returned report.
    pub async fn reconcile(
        &self,
        conn: &mut I::Connection,
        specs: &[ColumnSpec],
    ) -> Result<ReconcileReport> {
        info!(
            dialect = self.introspector.name(),
            columns = specs.len(),
            dry_run = self.dry_run,
            "Reconciling catalog columns"
        );

        let mut outcomes = Vec::with_capacity(specs.len());

        for spec in specs {
            let (result, backfilled) = match self.reconcile_one(conn, spec).await {
                Ok((status, backfilled)) => (Ok(status), backfilled),
                Err(err) if err.is_column_level() => {
                    warn!(
                        table = %spec.table,
                        column = %spec.column,
                        error = %err,
                        "Column reconciliation failed, continuing"
                    );
                    (Err(err), 0)
                }
                Err(err) => return Err(err),
            };

            outcomes.push(ColumnOutcome {
                table: spec.table.clone(),
                column: spec.column.clone(),
                result,
                backfilled,
            });
        }

        let report = ReconcileReport {
            dialect: self.introspector.name(),
            outcomes,
        };

        info!(
            added = report.added(),
            present = report.already_present(),
            planned = report.planned(),
            failed = report.failures().count(),
            backfilled = report.backfilled(),
            "Reconciliation finished"
        );

        Ok(report)
    }

    /// Returns the specs whose column is absent, without altering anything.
    pub async fn missing<'a>(
        &self,
        conn: &mut I::Connection,
        specs: &'a [ColumnSpec],
    ) -> Result<Vec<&'a ColumnSpec>> {
        let mut missing = Vec::new();
        for spec in specs {
            let exists = self
                .introspector
                .column_exists(conn, &spec.table, &spec.column)
                .await
                .map_err(|source| ReconcileError::Introspection {
                    table: spec.table.clone(),
                    column: spec.column.clone(),
                    source,
                })?;
            if !exists {
                missing.push(spec);
            }
        }
        Ok(missing)
    }

    /// Reverse direction of a reconciliation. Columns are never dropped, so
    /// this only reports what is being left in place.
    pub fn revert(&self, specs: &[ColumnSpec]) {
        for spec in specs {
            info!(
                table = %spec.table,
                column = %spec.column,
                "Column removal is not performed, leaving column in place"
            );
        }
    }

    /// Generates the statements a run against a catalog lacking every column
    /// would issue.
    #[must_use]
    pub fn sql_for(&self, specs: &[ColumnSpec]) -> Vec<String> {
        let mut all_sql = Vec::new();
        for spec in specs {
            let type_expr = self.introspector.type_expression(spec);
            all_sql.push(
                self.introspector
                    .add_column_sql(&spec.table, &spec.column, &type_expr),
            );
            if spec.needs_backfill() {
                if let Some(default_expr) = self.introspector.default_literal(&spec.default) {
                    all_sql.push(self.introspector.backfill_sql(
                        &spec.table,
                        &spec.column,
                        &default_expr,
                    ));
                }
            }
        }
        all_sql
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use super::*;
    use crate::catalog::storefront_columns;
    use crate::dialect::PostgresIntrospector;
    use crate::schema::{DefaultValue, SqlType};

    /// In-memory stand-in for a database cursor: records every statement
    /// and keeps a tiny catalog of table columns and NULL counts.
    #[derive(Debug, Default)]
    struct MockCatalog {
        tables: BTreeMap<String, Vec<String>>,
        nulls: BTreeMap<(String, String), u64>,
        statements: Vec<String>,
    }

    impl MockCatalog {
        fn with_table(mut self, table: &str, columns: &[&str]) -> Self {
            self.tables.insert(
                table.to_string(),
                columns.iter().map(|c| (*c).to_string()).collect(),
            );
            self
        }

        fn alters(&self) -> Vec<&String> {
            self.statements
                .iter()
                .filter(|s| s.starts_with("ALTER TABLE"))
                .collect()
        }

        fn has_column(&self, table: &str, column: &str) -> bool {
            self.tables
                .get(table)
                .is_some_and(|cols| cols.iter().any(|c| c == column))
        }
    }

    /// Mock dialect rendering SQL the PostgreSQL way.
    #[derive(Debug, Default)]
    struct MockIntrospector {
        reject: BTreeSet<String>,
        broken_catalog: bool,
        stale_catalog: bool,
    }

    impl MockIntrospector {
        fn rejecting(columns: &[&str]) -> Self {
            Self {
                reject: columns.iter().map(|c| (*c).to_string()).collect(),
                ..Self::default()
            }
        }
    }

    fn quoted_names(sql: &str) -> (String, String) {
        let parts: Vec<&str> = sql.split('"').collect();
        (parts[1].to_string(), parts[3].to_string())
    }

    impl SchemaIntrospector for MockIntrospector {
        type Connection = MockCatalog;

        fn name(&self) -> &'static str {
            "mock"
        }

        async fn column_exists(
            &self,
            conn: &mut MockCatalog,
            table: &str,
            column: &str,
        ) -> sqlx::Result<bool> {
            if self.broken_catalog {
                return Err(sqlx::Error::Protocol("catalog unavailable".to_string()));
            }
            Ok(!self.stale_catalog && conn.has_column(table, column))
        }

        async fn execute(&self, conn: &mut MockCatalog, sql: &str) -> sqlx::Result<u64> {
            conn.statements.push(sql.to_string());
            let (table, column) = quoted_names(sql);

            if sql.starts_with("ALTER TABLE") {
                if self.reject.contains(&column) {
                    return Err(sqlx::Error::Protocol(format!("type rejected for {column}")));
                }
                if conn.has_column(&table, &column) {
                    return Err(sqlx::Error::Protocol(format!("duplicate column {column}")));
                }
                conn.tables.entry(table).or_default().push(column);
                return Ok(0);
            }

            Ok(conn.nulls.remove(&(table, column)).unwrap_or(0))
        }

        fn is_duplicate_column(&self, err: &sqlx::Error) -> bool {
            matches!(err, sqlx::Error::Protocol(msg) if msg.starts_with("duplicate column"))
        }

        fn type_name(&self, sql_type: &SqlType) -> String {
            PostgresIntrospector::new().type_name(sql_type)
        }

        fn default_literal(&self, default: &DefaultValue) -> Option<String> {
            PostgresIntrospector::new().default_literal(default)
        }
    }

    fn storefront() -> MockCatalog {
        MockCatalog::default()
            .with_table("products_category", &["id", "name"])
            .with_table("products_product", &["id", "name", "image_1"])
    }

    #[tokio::test]
    async fn test_adds_missing_columns() {
        let reconciler = Reconciler::new(MockIntrospector::default());
        let mut conn = storefront();

        let report = reconciler
            .reconcile(&mut conn, &storefront_columns())
            .await
            .unwrap();

        assert!(report.is_success());
        assert_eq!(report.added(), 5);
        assert!(conn.has_column("products_category", "featured_on_homepage"));
        for column in ["image_5", "image_6", "image_7", "image_8"] {
            assert!(conn.has_column("products_product", column));
        }
        assert_eq!(
            conn.alters()[0],
            "ALTER TABLE \"products_category\" ADD COLUMN \"featured_on_homepage\" \
             BOOLEAN DEFAULT FALSE NOT NULL"
        );
    }

    #[tokio::test]
    async fn test_present_column_issues_no_alter() {
        let reconciler = Reconciler::new(MockIntrospector::default());
        let mut conn = MockCatalog::default().with_table(
            "products_category",
            &["id", "name", "featured_on_homepage"],
        );

        let spec = storefront_columns().remove(0);
        let report = reconciler.reconcile(&mut conn, &[spec]).await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.already_present(), 1);
        assert!(conn.alters().is_empty());
    }

    #[tokio::test]
    async fn test_second_run_is_noop() {
        let reconciler = Reconciler::new(MockIntrospector::default());
        let mut conn = storefront();
        let specs = storefront_columns();

        reconciler.reconcile(&mut conn, &specs).await.unwrap();
        let catalog_after_first = conn.tables.clone();
        let alters_after_first = conn.alters().len();

        let report = reconciler.reconcile(&mut conn, &specs).await.unwrap();

        assert_eq!(report.already_present(), specs.len());
        assert_eq!(conn.tables, catalog_after_first);
        assert_eq!(conn.alters().len(), alters_after_first);
    }

    #[tokio::test]
    async fn test_rejected_alter_does_not_stop_batch() {
        let reconciler = Reconciler::new(MockIntrospector::rejecting(&["image_6"]));
        let mut conn = storefront();

        let report = reconciler
            .reconcile(&mut conn, &storefront_columns())
            .await
            .unwrap();

        assert!(!report.is_success());
        assert_eq!(report.added(), 4);
        assert!(!conn.has_column("products_product", "image_6"));
        assert!(conn.has_column("products_product", "image_7"));
        assert!(conn.has_column("products_product", "image_8"));

        let failed: Vec<&ColumnOutcome> = report.failures().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].column, "image_6");
        assert!(matches!(
            failed[0].result,
            Err(ReconcileError::AlterFailed { .. })
        ));

        assert!(matches!(
            report.into_result(),
            Err(ReconcileError::Multiple(errors)) if errors.len() == 1
        ));
    }

    #[tokio::test]
    async fn test_introspection_failure_aborts() {
        let reconciler = Reconciler::new(MockIntrospector {
            broken_catalog: true,
            ..MockIntrospector::default()
        });
        let mut conn = storefront();

        let result = reconciler.reconcile(&mut conn, &storefront_columns()).await;

        assert!(matches!(result, Err(ReconcileError::Introspection { .. })));
        assert!(conn.statements.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_from_alter_counts_as_present() {
        let reconciler = Reconciler::new(MockIntrospector {
            stale_catalog: true,
            ..MockIntrospector::default()
        });
        let mut conn = MockCatalog::default().with_table("products_product", &["id", "image_5"]);

        let status = reconciler
            .ensure_column(&mut conn, "products_product", "image_5", "VARCHAR(200)")
            .await
            .unwrap();

        assert_eq!(status, ColumnStatus::AlreadyPresent);
        assert_eq!(conn.alters().len(), 1);
    }

    #[tokio::test]
    async fn test_backfill_runs_only_for_not_null_defaults() {
        let reconciler = Reconciler::new(MockIntrospector::default());
        let mut conn = MockCatalog::default()
            .with_table("products_category", &["id", "featured_on_homepage"])
            .with_table("products_product", &["id"]);
        conn.nulls.insert(
            ("products_category".to_string(), "featured_on_homepage".to_string()),
            3,
        );

        let report = reconciler
            .reconcile(&mut conn, &storefront_columns())
            .await
            .unwrap();

        assert_eq!(report.backfilled(), 3);
        let updates: Vec<&String> = conn
            .statements
            .iter()
            .filter(|s| s.starts_with("UPDATE"))
            .collect();
        assert_eq!(updates.len(), 1);
        assert!(updates[0].contains("\"featured_on_homepage\" = FALSE"));

        // Nothing left to fill.
        let again = reconciler
            .backfill_null_defaults(&mut conn, "products_category", "featured_on_homepage", "FALSE")
            .await
            .unwrap();
        assert_eq!(again, 0);
    }

    #[tokio::test]
    async fn test_dry_run_plans_without_altering() {
        let reconciler = Reconciler::new(MockIntrospector::default()).dry_run(true);
        let mut conn = storefront();

        let report = reconciler
            .reconcile(&mut conn, &storefront_columns())
            .await
            .unwrap();

        assert_eq!(report.planned(), 5);
        assert!(conn.statements.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_spec_is_column_level() {
        let reconciler = Reconciler::new(MockIntrospector::default());
        let mut conn = storefront();
        let specs = vec![
            ColumnSpec::new("products_product", "", SqlType::Text),
            ColumnSpec::new("products_product", "image_5", SqlType::Varchar(200)),
        ];

        let report = reconciler.reconcile(&mut conn, &specs).await.unwrap();

        assert!(matches!(
            report.outcomes[0].result,
            Err(ReconcileError::InvalidSpec(_))
        ));
        assert_eq!(report.outcomes[1].status(), Some(ColumnStatus::Added));
    }

    #[tokio::test]
    async fn test_missing_reports_absent_columns() {
        let reconciler = Reconciler::new(MockIntrospector::default());
        let mut conn = MockCatalog::default()
            .with_table("products_category", &["id", "featured_on_homepage"])
            .with_table("products_product", &["id", "image_5", "image_6"]);
        let specs = storefront_columns();

        let missing = reconciler.missing(&mut conn, &specs).await.unwrap();
        let names: Vec<&str> = missing.iter().map(|s| s.column.as_str()).collect();

        assert_eq!(names, vec!["image_7", "image_8"]);
        assert!(conn.statements.is_empty());
    }

    #[test]
    fn test_sql_for_includes_backfill() {
        let reconciler = Reconciler::new(PostgresIntrospector::new());
        let sql = reconciler.sql_for(&storefront_columns());

        assert_eq!(sql.len(), 6);
        assert!(sql[1].starts_with("UPDATE \"products_category\""));
        assert_eq!(
            sql[2],
            "ALTER TABLE \"products_product\" ADD COLUMN \"image_5\" VARCHAR(200)"
        );
    }
}
