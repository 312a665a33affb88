// ABOUTME: Main entry point for the headless admin server
// ABOUTME: Initializes logging, loads config, opens the document database and serves the admin

use anyhow::{Context, Result};
use clap::Parser;
use headless_admin::{config::Config, db::SqliteDatabase, paths, server};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Admin panel for a headless content store
#[derive(Parser, Debug)]
#[command(name = "headless-admin")]
#[command(about = "Serve the admin panel and form-state API")]
struct Args {
    /// Config file (defaults to HEADLESS_ADMIN_CONFIG, ./config.toml, then the XDG config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on, overriding the config
    #[arg(short, long)]
    port: Option<u16>,

    /// Only log to stdout
    #[arg(long)]
    no_log_file: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    dotenvy::dotenv().ok();

    let file_appender = if args.no_log_file {
        None
    } else {
        match RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix("headless-admin")
            .filename_suffix("log")
            .build(paths::log_dir())
        {
            Ok(appender) => Some(appender),
            Err(e) => {
                eprintln!("Failed to open log directory, logging to stdout only: {}", e);
                None
            }
        }
    };
    let (file_writer, _log_guard) = match file_appender {
        Some(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "headless_admin=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_writer.map(|writer| {
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
        }))
        .init();

    tracing::info!("Starting headless admin");

    let mut config = match &args.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!(
        admin_route = %config.routes.admin,
        api_route = %config.routes.api,
        collections = config.collections.len(),
        globals = config.globals.len(),
        bind = %config.bind_address(),
        "Configuration loaded"
    );

    let db_path = config.database.resolved_path();
    let db = SqliteDatabase::open(&db_path)
        .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "Document database opened");

    server::serve(Arc::new(config), Arc::new(db)).await
}
