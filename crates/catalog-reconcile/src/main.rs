//! catalog-reconcile CLI
//!
//! Deployment step that adds catalog columns the database is missing.

use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, Subcommand};
use sqlx::{Connection, PgConnection, SqliteConnection};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use catalog_reconcile::prelude::*;

/// Idempotent column reconciliation for the storefront catalog.
#[derive(Parser)]
#[command(name = "catalog-reconcile")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (sqlite: path or postgres:// connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// JSON spec file (built-in storefront columns if not specified).
    #[arg(short, long, env = "CATALOG_SPECS")]
    specs: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add missing columns and backfill NOT NULL defaults.
    Reconcile {
        /// Inspect only; report what would be added.
        #[arg(long)]
        dry_run: bool,

        /// Reverse direction. Columns are never dropped, so this only reports.
        #[arg(short, long)]
        reverse: bool,
    },

    /// Report columns missing from the database.
    Check,

    /// Show SQL without connecting.
    Sql {
        /// Dialect to render for (derived from the database URL if not specified).
        #[arg(long)]
        dialect: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let specs = match &cli.specs {
        Some(path) => {
            info!(path = %path.display(), "Loading column specs");
            load_specs(path)?
        }
        None => storefront_columns(),
    };

    match cli.command {
        Commands::Sql { dialect } => {
            let backend = match dialect {
                Some(name) => Backend::from_name(&name)?,
                None => Backend::from_url(&cli.database)?,
            };
            let statements = match backend {
                Backend::Sqlite => Reconciler::new(SqliteIntrospector::new()).sql_for(&specs),
                Backend::Postgres => Reconciler::new(PostgresIntrospector::new()).sql_for(&specs),
            };
            for sql in statements {
                println!("{};", sql);
            }
        }

        Commands::Reconcile { reverse: true, .. } => {
            Reconciler::new(SqliteIntrospector::new()).revert(&specs);
        }

        Commands::Reconcile { dry_run, .. } => match Backend::from_url(&cli.database)? {
            Backend::Sqlite => {
                let mut conn = SqliteConnection::connect(&cli.database).await?;
                let reconciler = Reconciler::new(SqliteIntrospector::new()).dry_run(dry_run);
                let result = reconciler.reconcile(&mut conn, &specs).await;
                conn.close().await?;
                finish(result?)?;
            }
            Backend::Postgres => {
                let mut conn = PgConnection::connect(&cli.database).await?;
                let reconciler = Reconciler::new(PostgresIntrospector::new()).dry_run(dry_run);
                let result = reconciler.reconcile(&mut conn, &specs).await;
                conn.close().await?;
                finish(result?)?;
            }
        },

        Commands::Check => {
            let missing: Vec<String> = match Backend::from_url(&cli.database)? {
                Backend::Sqlite => {
                    let mut conn = SqliteConnection::connect(&cli.database).await?;
                    let reconciler = Reconciler::new(SqliteIntrospector::new());
                    let result = reconciler.missing(&mut conn, &specs).await;
                    conn.close().await?;
                    result?.iter().map(|s| s.qualified_name()).collect()
                }
                Backend::Postgres => {
                    let mut conn = PgConnection::connect(&cli.database).await?;
                    let reconciler = Reconciler::new(PostgresIntrospector::new());
                    let result = reconciler.missing(&mut conn, &specs).await;
                    conn.close().await?;
                    result?.iter().map(|s| s.qualified_name()).collect()
                }
            };

            if missing.is_empty() {
                info!("All {} columns present.", specs.len());
            } else {
                println!("\nMissing columns:");
                println!("{:-<60}", "");
                for name in &missing {
                    println!(" [ ] {}", name);
                }
                println!();
                bail!("{} of {} columns missing", missing.len(), specs.len());
            }
        }
    }

    Ok(())
}

/// Prints the per-column report and fails if any column failed.
fn finish(report: ReconcileReport) -> anyhow::Result<()> {
    println!("\nColumns ({}):", report.dialect);
    println!("{:-<60}", "");

    for outcome in &report.outcomes {
        let name = format!("{}.{}", outcome.table, outcome.column);
        match &outcome.result {
            Ok(ColumnStatus::Added) => println!(" [+] {}", name),
            Ok(ColumnStatus::AlreadyPresent) => println!(" [=] {}", name),
            Ok(ColumnStatus::Planned) => println!(" [?] {} (would add)", name),
            Err(err) => println!(" [!] {}: {}", name, err),
        }
        if outcome.backfilled > 0 {
            println!("     {} rows backfilled", outcome.backfilled);
        }
    }
    println!();

    report.into_result()?;
    Ok(())
}
