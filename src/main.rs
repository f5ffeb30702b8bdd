use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use jobtrack_perf::{
    Config, ConnectionFactory, ConnectionPool, MetricSources, PerfError, PerformanceMonitor,
};
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "jobtrack-perf")]
#[command(about = "Performance monitoring and backend-client pooling for the job application tracker")]
#[command(version)]
struct Cli {
    /// Emit logs as JSON (also enabled by LOG_FORMAT=json)
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive the monitor and pool with simulated traffic and print the report
    Run {
        /// Collection interval in milliseconds (defaults to the configured interval)
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Number of collection ticks to run before reporting
        #[arg(long, default_value = "5")]
        ticks: u32,
        /// Simulated requests issued per tick
        #[arg(long, default_value = "20")]
        requests_per_tick: usize,
        /// Also print the Prometheus exposition of the latest snapshot
        #[arg(long)]
        prometheus: bool,
    },
    /// Print the effective configuration
    Config,
}

/// Stand-in backend client handed out by the simulated factory
#[derive(Debug)]
struct SimulatedClient {
    id: u64,
    pool_type: String,
}

#[derive(Default)]
struct SimulatedFactory {
    next_id: AtomicU64,
}

#[async_trait]
impl ConnectionFactory for SimulatedFactory {
    type Client = SimulatedClient;

    async fn create(&self, pool_type: &str) -> jobtrack_perf::Result<SimulatedClient> {
        let handshake_ms = rand::thread_rng().gen_range(1..5);
        tokio::time::sleep(Duration::from_millis(handshake_ms)).await;

        Ok(SimulatedClient {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            pool_type: pool_type.to_string(),
        })
    }
}

fn init_tracing(config: &Config, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level.0));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let json = cli.json_logs
        || std::env::var("LOG_FORMAT")
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
    init_tracing(&config, json);

    match cli.command {
        Some(Commands::Config) => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Some(Commands::Run {
            interval_ms,
            ticks,
            requests_per_tick,
            prometheus,
        }) => {
            let interval = interval_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.monitor.collection_interval());
            run(config, interval, ticks, requests_per_tick, prometheus).await
        }
        None => {
            let interval = config.monitor.collection_interval();
            run(config, interval, 5, 20, false).await
        }
    }
}

async fn run(
    config: Config,
    interval: Duration,
    ticks: u32,
    requests_per_tick: usize,
    prometheus: bool,
) -> Result<()> {
    let pool = Arc::new(ConnectionPool::new(
        SimulatedFactory::default(),
        config.pool.clone(),
    ));
    let sources = MetricSources::default().with_connections(pool.clone());
    let monitor = PerformanceMonitor::with_sources(config.monitor.clone(), sources);

    info!(
        ticks,
        requests_per_tick,
        interval_ms = interval.as_millis() as u64,
        "Starting simulated workload"
    );

    pool.start_health_checks();
    monitor.start_monitoring(interval);

    for tick in 0..ticks {
        let started = Instant::now();
        for _ in 0..requests_per_tick {
            simulate_request(&monitor, &pool).await?;
        }
        debug!(tick, "Simulated tick complete");

        if let Some(rest) = interval.checked_sub(started.elapsed()) {
            tokio::time::sleep(rest).await;
        }
    }

    let report = monitor.get_performance_report().await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    if prometheus {
        let text = monitor
            .export_prometheus()
            .await
            .context("Failed to render Prometheus metrics")?;
        println!("{text}");
    }

    monitor.stop_monitoring().await;
    monitor.destroy().await;
    pool.destroy().await;
    Ok(())
}

async fn simulate_request(
    monitor: &PerformanceMonitor,
    pool: &ConnectionPool<SimulatedFactory>,
) -> Result<()> {
    let (pool_type, query_ms, query_fails, status) = {
        let mut rng = rand::thread_rng();
        let pool_type = if rng.gen_bool(0.8) { "primary" } else { "secondary" };
        let status = match rng.gen_range(0..100) {
            0..=2 => 500,
            3..=6 => 404,
            _ => 200,
        };
        (pool_type, rng.gen_range(2..40), rng.gen_bool(0.02), status)
    };

    let request_started = Instant::now();
    let outcome = monitor
        .measure(Some("simulated_request"), || {
            pool.execute(pool_type, |client| async move {
                tokio::time::sleep(Duration::from_millis(query_ms)).await;
                if query_fails {
                    return Err(PerfError::Operation(format!(
                        "query on {} client {} failed",
                        client.pool_type, client.id
                    )));
                }
                Ok(())
            })
        })
        .await;

    let query_time = Duration::from_millis(query_ms);
    match outcome {
        Ok(_) => monitor.record_database_query(query_time, true),
        Err(PerfError::Operation(message)) => {
            debug!("Simulated query failed: {}", message);
            monitor.record_database_query(query_time, false);
        }
        Err(e) => return Err(e.into()),
    }

    monitor.record_api_request(request_started.elapsed(), status);
    monitor.record_metric("requests", 1.0, &[("pool", pool_type)]);
    Ok(())
}
