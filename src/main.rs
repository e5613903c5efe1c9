//! sokbo CLI
//!
//! Crawl breaking news, queue it, and publish it to Discord.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sokbo::models::{Config, FilterConfig};
use sokbo::pipeline::{self, EnqueueService};
use sokbo::publish::run_maintenance;
use sokbo::storage::{
    ArticleStore, MemoryArticleStore, MemoryPublishedStore, MemoryQueueStore, PublishedStore,
    QueueStore,
};
use sokbo::{QueueEngine, Result};

/// sokbo - Breaking News Publisher
#[derive(Parser, Debug)]
#[command(name = "sokbo", version, about = "Breaking-news collector and Discord publisher")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one crawl cycle, enqueue new articles, then exit
    RunAll {
        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Crawl all sources into the article store, then exit
    Crawl,

    /// Start the publisher worker loop (Ctrl-C to stop)
    Publish,

    /// Queue maintenance operations
    Queue {
        #[command(subcommand)]
        command: QueueCommand,
    },
}

#[derive(Subcommand, Debug)]
enum QueueCommand {
    /// Show per-status item counts
    Status,

    /// Requeue failed items below the retry gate
    Retry,

    /// Delete completed items past the retention window
    Clean,

    /// Enqueue stored articles matching the filters
    Add {
        #[command(flatten)]
        filter: FilterArgs,
    },
}

/// Enqueue filter overrides; unset flags fall back to the config file.
#[derive(Args, Debug)]
struct FilterArgs {
    /// Only this platform tag (e.g. YTN)
    #[arg(long)]
    platform: Option<String>,

    /// Only this category (e.g. politics)
    #[arg(long)]
    category: Option<String>,

    /// Look-back window in hours
    #[arg(long)]
    hours: Option<i64>,

    /// Max articles to enqueue
    #[arg(long)]
    limit: Option<usize>,
}

impl FilterArgs {
    fn merge_into(self, mut base: FilterConfig) -> FilterConfig {
        if let Some(platform) = self.platform {
            base.platforms = vec![platform];
        }
        if let Some(category) = self.category {
            base.categories = vec![category];
        }
        if self.hours.is_some() {
            base.hours = self.hours;
        }
        if self.limit.is_some() {
            base.limit = self.limit;
        }
        base
    }
}

struct Stores {
    articles: Arc<dyn ArticleStore>,
    queue: Arc<dyn QueueStore>,
    published: Arc<dyn PublishedStore>,
}

fn memory_stores() -> Stores {
    warn!("using in-memory stores; queue state will not survive this process");
    Stores {
        articles: Arc::new(MemoryArticleStore::new()),
        queue: Arc::new(MemoryQueueStore::new()),
        published: Arc::new(MemoryPublishedStore::new()),
    }
}

#[cfg(feature = "postgres")]
async fn build_stores(config: &Config) -> Result<Stores> {
    use sokbo::storage::postgres::{
        connect, init_schema, PgArticleStore, PgPublishedStore, PgQueueStore,
    };

    if config.database.url.trim().is_empty() {
        return Ok(memory_stores());
    }

    let pool = connect(&config.database.url).await?;
    init_schema(&pool).await?;
    info!("connected to postgres");
    Ok(Stores {
        articles: Arc::new(PgArticleStore::new(pool.clone())),
        queue: Arc::new(PgQueueStore::new(pool.clone())),
        published: Arc::new(PgPublishedStore::new(pool)),
    })
}

#[cfg(not(feature = "postgres"))]
async fn build_stores(_config: &Config) -> Result<Stores> {
    Ok(memory_stores())
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let default_filter = if verbose { "sokbo=debug,info" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn print_queue_status(queue: &QueueEngine) -> Result<()> {
    let counts = queue.status().await?;
    info!(
        pending = counts.pending,
        processing = counts.processing,
        completed = counts.completed,
        failed = counts.failed,
        total = counts.total(),
        "queue status"
    );
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);
    config.apply_env_overrides();

    let stores = build_stores(&config).await?;
    let queue = QueueEngine::new(Arc::clone(&stores.queue));

    match cli.command {
        Command::RunAll { filter } => {
            let summary = pipeline::run_crawl(&config, &stores.articles).await?;
            info!(
                inserted = summary.inserted,
                duplicates = summary.duplicates,
                failed_sources = summary.failed_sources,
                "crawl finished"
            );

            let filter = filter.merge_into(config.filter.clone());
            let service = EnqueueService::new(
                Arc::clone(&stores.articles),
                queue.clone(),
                Arc::clone(&stores.published),
            );
            let added = service.add_articles_from_db(&filter).await?;
            info!(added, "articles queued");

            run_maintenance(&queue, stores.published.as_ref(), &config.queue).await?;
            print_queue_status(&queue).await?;
        }

        Command::Crawl => {
            let summary = pipeline::run_crawl(&config, &stores.articles).await?;
            info!(
                collected = summary.collected,
                inserted = summary.inserted,
                "crawl finished"
            );
        }

        Command::Publish => {
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("shutdown signal received");
                    let _ = shutdown_tx.send(true);
                }
            });

            pipeline::run_publisher(
                &config,
                queue.clone(),
                Arc::clone(&stores.published),
                shutdown_rx,
            )
            .await?;
        }

        Command::Queue { command } => match command {
            QueueCommand::Status => print_queue_status(&queue).await?,

            QueueCommand::Retry => {
                let moved = queue.retry(config.queue.max_retries).await?;
                info!(moved, "failed items requeued");
            }

            QueueCommand::Clean => {
                let deleted = queue.clean(config.queue.clean_age()).await?;
                info!(deleted, "completed items removed");
            }

            QueueCommand::Add { filter } => {
                let filter = filter.merge_into(config.filter.clone());
                let service = EnqueueService::new(
                    Arc::clone(&stores.articles),
                    queue.clone(),
                    Arc::clone(&stores.published),
                );
                let added = service.add_articles_from_db(&filter).await?;
                info!(added, "articles queued");
            }
        },
    }

    Ok(())
}
