mod check;
mod ingest;
mod scheduler;
mod search;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use pricewatch_core::AppConfig;
use pricewatch_db::ProductSearch;
use sqlx::SqlitePool;
use tracing_subscriber::EnvFilter;

use crate::ingest::{IngestOptions, RunnerSettings, TriggerSource};
use crate::scheduler::{IngestScheduler, RunGuard, ScheduledIngest};

#[derive(Debug, Parser)]
#[command(name = "pricewatch")]
#[command(about = "Product price aggregation: ingest, check and search store catalogs")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch products from the configured stores and persist them
    Ingest {
        /// Store key from the stores file; repeat for several. Defaults to every enabled store
        #[arg(long = "store")]
        stores: Vec<String>,

        /// Comma-separated search terms, e.g. "laptop,iphone"
        #[arg(long)]
        queries: Option<String>,

        /// Use the built-in list of popular searches
        #[arg(long)]
        all_queries: bool,

        /// Products per query (defaults to PRICEWATCH_LIMIT_PER_QUERY)
        #[arg(long)]
        limit: Option<usize>,

        /// Ingest a local feed export for a single feed store instead of fetching
        #[arg(long)]
        file: Option<PathBuf>,

        /// Print what would be ingested without fetching or writing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Test connectivity for each store
    Check {
        /// Store key; repeat for several. Defaults to every enabled store
        #[arg(long = "store")]
        stores: Vec<String>,
    },
    /// List provider categories for a Mercado Libre store
    Categories {
        #[arg(long)]
        store: String,
    },
    /// Search persisted products
    Search {
        /// Case-insensitive substring of the product name
        query: String,

        #[arg(long)]
        store_id: Option<i64>,

        #[arg(long)]
        category_id: Option<i64>,

        #[arg(long)]
        min_price: Option<f64>,

        #[arg(long)]
        max_price: Option<f64>,

        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 20)]
        per_page: u32,
    },
    /// Run ingestion on PRICEWATCH_SCHEDULE_CRON until interrupted
    Schedule {
        /// Also start one run immediately
        #[arg(long)]
        run_now: bool,
    },
    /// Apply pending database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = pricewatch_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("no command given; run `pricewatch --help` for usage");
        return Ok(());
    };

    match command {
        Commands::Migrate => {
            let pool = connect(&config).await?;
            let applied = pricewatch_db::run_migrations(&pool).await?;
            println!("applied {applied} migrations");
        }
        Commands::Ingest {
            stores,
            queries,
            all_queries,
            limit,
            file,
            dry_run,
        } => {
            if file.is_some() && stores.len() != 1 {
                anyhow::bail!("--file requires exactly one --store");
            }
            let limit = limit.unwrap_or(config.limit_per_query);
            if limit == 0 {
                anyhow::bail!("--limit must be greater than zero");
            }
            let options = IngestOptions {
                queries: ingest::resolve_queries(queries.as_deref(), all_queries, file.is_some()),
                limit,
                file,
                dry_run,
                trigger: TriggerSource::Cli,
            };
            run_ingest(&config, &stores, &options).await?;
        }
        Commands::Check { stores } => {
            let stores_file = pricewatch_core::load_stores(&config.stores_path)?;
            let selected = ingest::select_stores(&stores_file, &stores)?;
            let settings = RunnerSettings::from_app_config(&config);
            check::run_check(&selected, &settings.http).await?;
        }
        Commands::Categories { store } => {
            let stores_file = pricewatch_core::load_stores(&config.stores_path)?;
            let store = stores_file
                .find(&store)
                .ok_or_else(|| anyhow::anyhow!("unknown store key '{store}'"))?;
            let settings = RunnerSettings::from_app_config(&config);
            check::run_categories(store, &settings.http).await?;
        }
        Commands::Search {
            query,
            store_id,
            category_id,
            min_price,
            max_price,
            page,
            per_page,
        } => {
            let pool = open_pool(&config).await?;
            let search = ProductSearch {
                query: Some(query.trim().to_string()).filter(|q| !q.is_empty()),
                store_id,
                category_id,
                min_price,
                max_price,
                page,
                per_page,
            };
            search::run_search(&pool, &search).await?;
        }
        Commands::Schedule { run_now } => run_schedule(&config, run_now).await?,
    }

    Ok(())
}

async fn connect(config: &AppConfig) -> anyhow::Result<SqlitePool> {
    let pool_config = pricewatch_db::PoolConfig::from_app_config(config);
    Ok(pricewatch_db::connect_pool(&config.database_url, pool_config).await?)
}

/// Connects and brings the schema up to date.
async fn open_pool(config: &AppConfig) -> anyhow::Result<SqlitePool> {
    let pool = connect(config).await?;
    pricewatch_db::run_migrations(&pool).await?;
    Ok(pool)
}

async fn run_ingest(
    config: &AppConfig,
    store_keys: &[String],
    options: &IngestOptions,
) -> anyhow::Result<()> {
    let stores_file = pricewatch_core::load_stores(&config.stores_path)?;
    let selected = ingest::select_stores(&stores_file, store_keys)?;

    let pool = open_pool(config).await?;
    let settings = RunnerSettings::from_app_config(config);
    let summary = ingest::run_ingestion(&pool, &settings, &selected, options).await?;
    if !options.dry_run {
        println!(
            "ingested {} batches: {} inserted, {} updated, {} dropped ({} failed, {} skipped)",
            summary.batches,
            summary.inserted,
            summary.updated,
            summary.dropped,
            summary.failed_batches,
            summary.skipped_batches,
        );
    }
    Ok(())
}

async fn run_schedule(config: &AppConfig, run_now: bool) -> anyhow::Result<()> {
    let stores_file = pricewatch_core::load_stores(&config.stores_path)?;
    let job = Arc::new(ScheduledIngest {
        pool: open_pool(config).await?,
        settings: RunnerSettings::from_app_config(config),
        stores: ingest::select_stores(&stores_file, &[])?,
        options: IngestOptions {
            queries: ingest::DEFAULT_QUERIES
                .iter()
                .map(ToString::to_string)
                .collect(),
            limit: config.limit_per_query,
            file: None,
            dry_run: false,
            trigger: TriggerSource::Scheduler,
        },
        guard: RunGuard::default(),
    });

    let scheduler = IngestScheduler::build(Arc::clone(&job), &config.schedule_cron).await?;
    scheduler.start().await?;
    tracing::info!(
        cron = %config.schedule_cron,
        stores = job.stores.len(),
        "scheduler running; press ctrl-c to stop"
    );

    if run_now {
        let job = Arc::clone(&job);
        tokio::spawn(async move {
            job.run_once().await;
        });
    }

    shutdown_signal().await;
    scheduler.shutdown().await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, stopping scheduler");
}
