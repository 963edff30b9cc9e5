use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use seller_pulse::application::handlers::{router, stats_handler::AppState};
use seller_pulse::application::services::position_service::PositionService;
use seller_pulse::application::services::snapshot_export::export_snapshot;
use seller_pulse::application::services::stats_service::{ReportSettings, StatsService};
use seller_pulse::config::{parse_date, read_queries_file, AppConfig, ConfigError};
use seller_pulse::domain::entities::catalog::ScanSummary;
use seller_pulse::domain::services::position_tracker::PositionTracker;
use seller_pulse::domain::services::sales_summary::build_report;
use seller_pulse::infrastructure::memory_cache::MemoryCache;
use seller_pulse::infrastructure::search_client::SearchClient;
use seller_pulse::infrastructure::statistics_client::StatisticsClient;
use seller_pulse::persistence::position_repository::PositionRepository;
use seller_pulse::persistence::init_with_config;
use seller_pulse::rate_limit::{create_rate_limiter, RateLimiterConfig};
use seller_pulse::secrets::{ApiToken, EnvTokenProvider, StaticTokenProvider, TokenProvider};

#[derive(Parser)]
#[command(name = "seller-pulse", version, about = "Daily sales reports and search positions for marketplace sellers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile orders, sales and returns for one day
    Report {
        /// Seller account; defaults to WB_ACTOR
        #[arg(long)]
        actor: Option<String>,

        /// Day to report, YYYY-MM-DD (default: today)
        #[arg(long)]
        date: Option<String>,

        /// API token, overriding the configured sources
        #[arg(long)]
        token: Option<String>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Also write the raw reconciled records to this file
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Find where the seller's products rank for search keywords
    Positions {
        /// Keywords to scan
        queries: Vec<String>,

        /// Read keywords from a file, one per line
        #[arg(long, short = 'f')]
        queries_file: Option<PathBuf>,

        /// Seller name to look for (repeatable)
        #[arg(long = "seller")]
        sellers: Vec<String>,

        /// Seller id to look for (repeatable)
        #[arg(long = "seller-id")]
        seller_ids: Vec<String>,

        /// Brand to look for (repeatable)
        #[arg(long = "brand")]
        brands: Vec<String>,

        #[arg(long)]
        max_pages: Option<u32>,

        /// Do not store the results in the history database
        #[arg(long)]
        no_save: bool,

        /// Print the scans as JSON
        #[arg(long)]
        json: bool,
    },

    /// Serve reports over HTTP
    Serve {
        /// Listen address; defaults to SERVER_ADDR
        #[arg(long)]
        addr: Option<std::net::SocketAddr>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging; stdout is reserved for reports
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seller_pulse=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env();

    match cli.command {
        Command::Report {
            actor,
            date,
            token,
            json,
            export,
        } => run_report(config, actor, date, token, json, export).await,
        Command::Positions {
            queries,
            queries_file,
            sellers,
            seller_ids,
            brands,
            max_pages,
            no_save,
            json,
        } => {
            let mut config = config;
            if !sellers.is_empty() {
                config.search.target.names = sellers;
            }
            if !seller_ids.is_empty() {
                config.search.target.ids = seller_ids;
            }
            if !brands.is_empty() {
                config.search.target.brands = brands;
            }
            if let Some(pages) = max_pages {
                config.search.scan.max_pages = pages.max(1);
            }

            let mut queries = queries;
            if let Some(path) = queries_file {
                queries.extend(read_queries_file(&path)?);
            }
            if queries.is_empty() {
                return Err(ConfigError::NoQueries.into());
            }

            run_positions(config, queries, !no_save, json).await
        }
        Command::Serve { addr } => {
            let mut config = config;
            if let Some(addr) = addr {
                config.server.bind_addr = addr;
            }
            run_server(config).await
        }
    }
}

async fn run_report(
    config: AppConfig,
    actor: Option<String>,
    date: Option<String>,
    token: Option<String>,
    json: bool,
    export: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let actor = actor.unwrap_or_else(|| config.default_actor.clone());
    let date = match date {
        Some(raw) => parse_date(&raw)?,
        None => Local::now().date_naive(),
    };

    let tokens: Arc<dyn TokenProvider> = match token {
        Some(token) => Arc::new(StaticTokenProvider::new().with_token(actor.clone(), ApiToken::new(token)?)),
        None => Arc::new(EnvTokenProvider::new(config.secrets.clone())),
    };
    let service = StatsService::new(
        Arc::new(StatisticsClient::new(&config.stats)?),
        Arc::new(MemoryCache::new(config.cache.capacity)),
        tokens,
        ReportSettings::from_config(&config),
    );

    info!(actor = %actor, date = %date, "Building report");

    let report = match export {
        Some(path) => {
            let reconciliation = service.reconcile_day(&actor, date).await?;
            export_snapshot(&path, &actor, date, &reconciliation).await?;
            build_report(&actor, date, &reconciliation, config.stats.display_limit)
        }
        None => service.daily_report(&actor, date).await?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report);
    }
    Ok(())
}

async fn run_positions(
    config: AppConfig,
    queries: Vec<String>,
    save: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = Arc::new(SearchClient::new(&config.search)?);
    let tracker = PositionTracker::new(catalog, config.search.target.clone(), config.search.scan.clone());

    let repository = if save {
        let pool = init_with_config(&config.database).await?;
        Some(PositionRepository::new(pool))
    } else {
        None
    };

    let service = PositionService::new(tracker, repository);
    let scans = service.track(&queries).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&scans)?);
    } else {
        print!("{}", ScanSummary(&scans));
    }
    Ok(())
}

async fn run_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let tokens = Arc::new(EnvTokenProvider::new(config.secrets.clone()));
    match tokens.token_for(&config.default_actor) {
        Ok(_) => info!(actor = %config.default_actor, "API token loaded"),
        Err(e) => warn!(actor = %config.default_actor, error = %e, "No API token for default actor"),
    }

    let stats = StatsService::new(
        Arc::new(StatisticsClient::new(&config.stats)?),
        Arc::new(MemoryCache::new(config.cache.capacity)),
        tokens,
        ReportSettings::from_config(&config),
    );
    let limiter = create_rate_limiter(RateLimiterConfig {
        requests_per_minute: config.server.requests_per_minute,
    });
    let app = router(
        AppState {
            stats: Arc::new(stats),
        },
        limiter,
    );

    let addr = config.server.bind_addr;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let server = axum::serve(listener, app);

    let shutdown_signal = async {
        let ctrl_c = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received Ctrl+C signal"),
                Err(e) => error!("Failed to install Ctrl+C handler: {}", e),
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sig) => {
                    sig.recv().await;
                    info!("Received SIGTERM signal");
                }
                Err(e) => error!("Failed to install SIGTERM handler: {}", e),
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {},
            _ = terminate => {},
        }
    };

    server.with_graceful_shutdown(shutdown_signal).await?;
    info!("Shutdown complete");
    Ok(())
}
