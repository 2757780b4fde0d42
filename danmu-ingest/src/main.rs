//! danmu-ingest - import live chat recordings into the danmaku database
//!
//! Each file given on the command line is imported on its own: a failure in
//! one file is logged and the rest still run. The exit status is non-zero if
//! any file failed.

use anyhow::{Context, Result};
use clap::Parser;
use danmu_common::config::{load_config, DatabaseConfig, DatabaseKind};
use danmu_ingest::store::{MySqlStore, RegistryShape, SqliteStore};
use danmu_ingest::{dry_run, ingest_file, IngestOptions, IngestReport};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Command-line arguments for danmu-ingest
#[derive(Parser, Debug)]
#[command(name = "danmu-ingest")]
#[command(about = "Import live chat subtitle recordings into the danmaku database")]
#[command(version)]
struct Args {
    /// Chat recordings (.ass) to import
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// TOML config file (default: $DANMU_CONFIG, then the user/system config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write to this SQLite database instead of the configured backend
    #[arg(long)]
    sqlite: Option<PathBuf>,

    /// Parse only; do not touch any database
    #[arg(long)]
    dry_run: bool,

    /// Print each import report as JSON on stdout
    #[arg(long)]
    json: bool,
}

enum Backend {
    Sqlite(SqliteStore),
    MySql(MySqlStore),
}

impl Backend {
    async fn open(config: &DatabaseConfig, offset: chrono::FixedOffset) -> Result<Self> {
        match config.kind {
            DatabaseKind::Sqlite => {
                let pool = danmu_common::db::open_sqlite(&config.sqlite_file)
                    .await
                    .with_context(|| format!("Failed to open {}", config.sqlite_file.display()))?;
                let shape = if config.name_history {
                    RegistryShape::Intervals
                } else {
                    RegistryShape::CurrentName
                };
                Ok(Backend::Sqlite(SqliteStore::new(pool, offset).with_registry_shape(shape)))
            }
            DatabaseKind::Mysql => {
                let pool = danmu_common::db::open_mysql(config)
                    .await
                    .context("Failed to connect to MySQL")?;
                Ok(Backend::MySql(MySqlStore::new(pool, offset)))
            }
        }
    }

    async fn ingest(&self, path: &Path, options: &IngestOptions) -> danmu_ingest::Result<IngestReport> {
        match self {
            Backend::Sqlite(store) => ingest_file(store, path, options).await,
            Backend::MySql(store) => ingest_file(store, path, options).await,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config first so its log level applies; RUST_LOG still wins
    let loaded = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    let config = &loaded.config;

    let level = &config.logging.level;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("danmu_ingest={level},danmu_common={level}").into()
            }),
        )
        .init();

    info!(
        "Starting danmu-ingest v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    loaded.log_source();

    let offset = config.ingest.civil_offset()?;
    let options = IngestOptions {
        start_time_scan_lines: config.ingest.start_time_scan_lines,
    };

    let database = args
        .sqlite
        .as_ref()
        .map(|path| DatabaseConfig::sqlite(path.clone()))
        .or(config.database.clone());

    let backend = match (&database, args.dry_run) {
        (_, true) => None,
        (Some(db), false) => {
            info!("Database backend: {}", db.kind);
            Some(Backend::open(db, offset).await?)
        }
        (None, false) => {
            warn!("No database configured; parsing only");
            None
        }
    };

    let mut failed = 0usize;
    for path in &args.files {
        let outcome = match &backend {
            Some(backend) => backend.ingest(path, &options).await,
            None => dry_run(path),
        };

        match outcome {
            Ok(report) => {
                info!(
                    "{}: live {} {:?}, parsed {}, persisted {}, skipped {}",
                    path.display(),
                    report.live_id,
                    report.status,
                    report.parsed,
                    report.persisted,
                    report.skipped.len()
                );
                if args.json {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
            }
            Err(e) => {
                failed += 1;
                error!("Failed to import {}: {}", path.display(), e);
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{} of {} files failed to import", failed, args.files.len());
    }

    Ok(())
}
