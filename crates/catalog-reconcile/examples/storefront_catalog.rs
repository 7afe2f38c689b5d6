//! Example: Reconciling a drifted storefront catalog
//!
//! Builds an in-memory SQLite catalog as an interrupted deploy would have
//! left it, shows the statements each dialect would issue, then reconciles
//! twice to show the second run is a no-op.
//!
//! Run with: cargo run --example storefront_catalog -p catalog-reconcile

use catalog_reconcile::prelude::*;
use sqlx::{Connection, SqliteConnection};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let specs = storefront_columns();

    println!("=== PostgreSQL ===");
    for sql in Reconciler::new(PostgresIntrospector::new()).sql_for(&specs) {
        println!("{};", sql);
    }

    println!("\n=== SQLite ===");
    for sql in Reconciler::new(SqliteIntrospector::new()).sql_for(&specs) {
        println!("{};", sql);
    }

    let mut conn = SqliteConnection::connect("sqlite::memory:").await?;
    sqlx::query("CREATE TABLE products_category (id INTEGER PRIMARY KEY, name TEXT NOT NULL)")
        .execute(&mut conn)
        .await?;
    sqlx::query(
        "CREATE TABLE products_product (id INTEGER PRIMARY KEY, name TEXT NOT NULL, image_5 VARCHAR(200))",
    )
    .execute(&mut conn)
    .await?;
    sqlx::query("INSERT INTO products_category (name) VALUES ('Phones'), ('Laptops')")
        .execute(&mut conn)
        .await?;

    let reconciler = Reconciler::new(SqliteIntrospector::new());

    for run in 1..=2 {
        let report = reconciler.reconcile(&mut conn, &specs).await?;
        println!(
            "\nRun {}: {} added, {} already present, {} failed",
            run,
            report.added(),
            report.already_present(),
            report.failures().count()
        );
    }

    conn.close().await?;
    Ok(())
}
