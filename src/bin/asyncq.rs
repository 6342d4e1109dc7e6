//! asyncq CLI: drive a synthetic workload through a task queue.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use asyncq::config::{Config, QueueConfig};
use asyncq::telemetry::{TelemetryConfig, init_telemetry};
use asyncq::{Error, TaskQueue, sleep};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "asyncq", about = "Bounded-concurrency task queue")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process synthetic items through a queue
    Run {
        /// Number of items to submit
        #[arg(long, default_value_t = 10)]
        items: usize,
        /// Simulated work per item, in milliseconds
        #[arg(long, default_value_t = 200)]
        delay_ms: u64,
        /// Fail every Nth item (0 disables failures)
        #[arg(long, default_value_t = 0)]
        fail_every: usize,
        /// Override the configured concurrency limit
        #[arg(long)]
        concurrency: Option<usize>,
        /// Keep the queue open until every item settled, then close it explicitly
        #[arg(long)]
        keep_alive: bool,
        /// TOML file with a [queue] table; replaces ASYNCQ_* variables
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the queue configuration resolved from the environment or a file
    Config {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Run {
            items,
            delay_ms,
            fail_every,
            concurrency,
            keep_alive,
            config: path,
        } => {
            let _guard = init_telemetry(TelemetryConfig {
                endpoint: config.otel_endpoint.clone(),
                service_name: "asyncq".to_string(),
                default_filter: config.log_level.clone(),
            })?;
            let mut queue_config = resolve_queue_config(config.queue, path)?;
            queue_config.keep_alive |= keep_alive;
            let workload = Workload {
                items,
                delay: Duration::from_millis(delay_ms),
                fail_every,
            };
            cmd_run(queue_config, concurrency, workload).await
        }
        Command::Config { config: path } => {
            let queue_config = resolve_queue_config(config.queue, path)?;
            println!("concurrency_limit: {}", queue_config.concurrency_limit);
            println!("keep_alive:        {}", queue_config.keep_alive);
            println!(
                "idle_check:        {}ms",
                queue_config.idle_check_interval.as_millis()
            );
            println!(
                "drain_poll:        {}ms",
                queue_config.drain_poll_interval.as_millis()
            );
            Ok(())
        }
    }
}

struct Workload {
    items: usize,
    delay: Duration,
    fail_every: usize,
}

fn resolve_queue_config(
    from_env: QueueConfig,
    path: Option<PathBuf>,
) -> anyhow::Result<QueueConfig> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("cannot read {}: {e}", path.display()))?;
            Ok(QueueConfig::from_toml_str(&content)?)
        }
        None => Ok(from_env),
    }
}

async fn cmd_run(
    queue_config: QueueConfig,
    concurrency: Option<usize>,
    workload: Workload,
) -> anyhow::Result<()> {
    let settled = Arc::new(AtomicUsize::new(0));
    let delay = workload.delay;
    let fail_every = workload.fail_every;
    let keep_alive = queue_config.keep_alive;

    let mut builder = TaskQueue::builder(move |n: usize| async move {
        sleep::sleep(delay).await;
        if fail_every > 0 && n % fail_every == 0 {
            anyhow::bail!("item {n} failed on purpose");
        }
        Ok(n)
    })
    .config(queue_config)
    .on_start(|| async { info!("queue started") })
    .on_end(|| async { info!("queue drained") });
    if let Some(limit) = concurrency {
        builder = builder.concurrency_limit(limit);
    }

    let processed = Arc::clone(&settled);
    let failed = Arc::clone(&settled);
    let queue = builder
        .on_item_processed(move |n| {
            let processed = Arc::clone(&processed);
            async move {
                processed.fetch_add(1, Ordering::SeqCst);
                info!(item = n, "processed");
            }
        })
        .on_error(move |n, error| {
            let failed = Arc::clone(&failed);
            async move {
                failed.fetch_add(1, Ordering::SeqCst);
                warn!(item = n, %error, "failed");
            }
        })
        .build()?;

    let started = Instant::now();
    queue.submit(1..=workload.items);
    queue.start().await?;

    if keep_alive {
        let total = workload.items;
        sleep::until(
            || settled.load(Ordering::SeqCst) >= total,
            queue.config().drain_poll_interval,
        )
        .await;
        match queue.close().await {
            Ok(()) | Err(Error::AlreadyClosed) => {}
            Err(e) => return Err(e.into()),
        }
    } else {
        queue.closed().await?;
    }

    println!(
        "{} item(s) settled in {}ms",
        settled.load(Ordering::SeqCst),
        started.elapsed().as_millis()
    );
    Ok(())
}
