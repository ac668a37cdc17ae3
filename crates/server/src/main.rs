//! list server entry point.

mod import;

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use list_api::{AppState, JwtAuth};
use list_common::{Config, RetryConfig};
use list_core::{
    ContentService, EventPublisherService, GroupService, JobService, JobWatcher, LambdaClient,
    LambdaService, TagService,
};
use list_db::repositories::{
    ContentRepository, GroupRepository, InviteRepository, JobRepository, TagRepository,
};
use list_realtime::{RealtimeHub, RedisPubSub};
use sea_orm::DatabaseConnection;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::import::ImportArgs;

const DEFAULT_LOG_FILTER: &str = "list=info,tower_http=info";

/// How often idle realtime topics are dropped.
const HUB_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Parser)]
#[command(name = "list", version, about = "Hierarchical, tag-filtered content lists")]
struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true, env = "LIST_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// Address to bind (overrides config)
        #[arg(long)]
        host: Option<String>,
    },
    /// Run pending database migrations
    Migrate,
    /// Import a directory tree as content
    Import(ImportArgs),
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

async fn connect(config: &Config) -> anyhow::Result<Arc<DatabaseConnection>> {
    let db = list_db::init(config).await?;
    info!("Connected to database");
    Ok(Arc::new(db))
}

async fn migrate(db: &DatabaseConnection) -> anyhow::Result<()> {
    info!("Running database migrations...");
    list_db::migrate(db).await?;
    info!("Migrations completed");
    Ok(())
}

/// Build the application state from a connection and an event publisher.
fn build_state(
    config: &Config,
    db: &Arc<DatabaseConnection>,
    events: EventPublisherService,
) -> anyhow::Result<AppState> {
    let content_repo = ContentRepository::new(Arc::clone(db))
        .with_search_superset(config.listing.search_superset);
    let tag_repo = TagRepository::new(Arc::clone(db));
    let group_repo = GroupRepository::new(Arc::clone(db));
    let invite_repo = InviteRepository::new(Arc::clone(db));
    let job_repo = JobRepository::new(Arc::clone(db));

    let lambda = LambdaService::new(Arc::new(LambdaClient::new(&config.lambda)?));

    Ok(AppState {
        content_service: ContentService::new(
            content_repo,
            tag_repo.clone(),
            lambda.clone(),
            events.clone(),
        ),
        tag_service: TagService::new(tag_repo),
        group_service: GroupService::new(group_repo, invite_repo)
            .with_retry_config(RetryConfig::default()),
        job_service: JobService::new(job_repo, lambda.clone(), events.clone()),
        lambda_service: lambda,
        events,
        auth: JwtAuth::new(&config.auth)?,
        listing: config.listing.clone(),
    })
}

async fn serve(config: Config, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    info!("Starting list server...");

    let db = connect(&config).await?;
    migrate(&db).await?;

    let hub = Arc::new(RealtimeHub::new());
    let cleanup = hub.spawn_cleanup(HUB_CLEANUP_INTERVAL);

    let pubsub = match &config.redis.url {
        Some(url) => {
            info!("Connecting to Redis...");
            let pubsub = RedisPubSub::new(url, &config.redis.prefix, hub.clone()).await?;
            pubsub.start().await?;
            info!(prefix = %config.redis.prefix, "Realtime relayed through Redis");
            Some(pubsub)
        }
        None => {
            info!("Redis not configured, realtime events stay in this process");
            None
        }
    };
    let events: EventPublisherService = match &pubsub {
        Some(pubsub) => Arc::new(pubsub.clone()),
        None => hub.clone(),
    };

    // Every instance reads the job table itself, so updates go to the local hub only.
    let job_watcher = JobWatcher::new(JobRepository::new(Arc::clone(&db)), hub.clone())
        .spawn(Duration::from_millis(config.jobs.watch_interval_ms));

    let state = build_state(&config, &db, events)?;
    let app = list_api::app(state);

    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let listener = tokio::net::TcpListener::bind((host.as_str(), port)).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(pubsub) = pubsub {
        if let Err(e) = pubsub.shutdown().await {
            warn!(error = %e, "Failed to close Redis clients");
        }
    }
    job_watcher.abort();
    cleanup.abort();

    info!("Server shutdown complete");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let config = Config::load()?;

    match cli.command {
        Command::Serve { port, host } => serve(config, host, port).await,
        Command::Migrate => {
            let db = connect(&config).await?;
            migrate(&db).await
        }
        Command::Import(args) => import::run(&config, args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::try_parse_from(["list", "serve", "--port", "8080", "--host", "127.0.0.1"])
            .unwrap_or_else(|e| panic!("{e}"));
        match cli.command {
            Command::Serve { port, host } => {
                assert_eq!(port, Some(8080));
                assert_eq!(host.as_deref(), Some("127.0.0.1"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_import_defaults() {
        let cli = Cli::try_parse_from([
            "list", "import", "./notes", "--user-id", "u1", "--group-id", "g1",
        ])
        .unwrap_or_else(|e| panic!("{e}"));
        let Command::Import(args) = cli.command else {
            panic!("expected import");
        };
        assert_eq!(args.dir, std::path::PathBuf::from("./notes"));
        assert_eq!(args.max_file_size, 10);
        assert!(args.skip_hidden);
        assert!(!args.dry_run);
        assert!(!args.yes);
        assert!(args.types.is_none());
    }

    #[test]
    fn test_parse_import_flags() {
        let cli = Cli::try_parse_from([
            "list",
            "--log-json",
            "import",
            "./notes",
            "--user-id",
            "u1",
            "--group-id",
            "g1",
            "--types",
            ".md,.txt",
            "--map",
            ".md=note",
            "--max-file-size",
            "2",
            "--skip-hidden=false",
            "--dry-run",
            "--yes",
        ])
        .unwrap_or_else(|e| panic!("{e}"));
        assert!(cli.log_json);
        let Command::Import(args) = cli.command else {
            panic!("expected import");
        };
        assert_eq!(args.types.as_deref(), Some(".md,.txt"));
        assert_eq!(args.map.as_deref(), Some(".md=note"));
        assert_eq!(args.max_file_size, 2);
        assert!(!args.skip_hidden);
        assert!(args.dry_run);
        assert!(args.yes);
    }
}
