use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use clap::Parser;
use rand::Rng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use floodgate::config::{LimiterConfig, LimiterKind};
use floodgate::ratelimit::Limiter;

/// Drive a rate limiter with synthetic per-key traffic and report the
/// admission outcomes.
#[derive(Parser, Debug)]
#[command(name = "floodgate", version, about)]
struct Args {
    /// Algorithm to exercise: sliding_window or token_bucket
    #[arg(long, default_value = "sliding_window")]
    algorithm: String,

    /// Sliding window: maximum admissions per window
    #[arg(long, default_value_t = 100)]
    max_requests: usize,

    /// Sliding window: window width in seconds
    #[arg(long, default_value_t = 60.0)]
    window_secs: f64,

    /// Token bucket: maximum token balance per key
    #[arg(long, default_value_t = 100.0)]
    capacity: f64,

    /// Token bucket: refill rate in tokens per second
    #[arg(long, default_value_t = 10.0)]
    refill_rate: f64,

    /// Number of distinct identity keys in the synthetic population
    #[arg(long, default_value_t = 8)]
    keys: usize,

    /// Admission checks issued per worker thread
    #[arg(long, default_value_t = 10_000)]
    requests: usize,

    /// Number of worker threads
    #[arg(long, default_value_t = 4)]
    threads: usize,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if args.json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    info!("Starting Floodgate load driver");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let kind: LimiterKind = args.algorithm.parse()?;
    let config = match kind {
        LimiterKind::SlidingWindow => LimiterConfig::SlidingWindow {
            max_requests: args.max_requests,
            window_secs: args.window_secs,
        },
        LimiterKind::TokenBucket => LimiterConfig::TokenBucket {
            capacity: args.capacity,
            refill_rate: args.refill_rate,
        },
    };

    let limiter: Arc<Limiter<String>> = Arc::new(Limiter::new(config)?);
    info!(kind = %kind, threads = args.threads, keys = args.keys, "Limiter initialized");

    let admitted = Arc::new(AtomicU64::new(0));
    let denied = Arc::new(AtomicU64::new(0));
    let started = Instant::now();

    let mut handles = Vec::with_capacity(args.threads);
    for _ in 0..args.threads {
        let limiter = Arc::clone(&limiter);
        let admitted = Arc::clone(&admitted);
        let denied = Arc::clone(&denied);
        let keys = args.keys.max(1);
        let requests = args.requests;

        handles.push(thread::spawn(move || {
            let mut rng = rand::thread_rng();
            for _ in 0..requests {
                let key = format!("key-{}", rng.gen_range(0..keys));
                if limiter.allow(key) {
                    admitted.fetch_add(1, Ordering::Relaxed);
                } else {
                    denied.fetch_add(1, Ordering::Relaxed);
                }
            }
        }));
    }
    for handle in handles {
        handle.join().expect("Worker thread panicked");
    }

    let elapsed = started.elapsed();
    let admitted = admitted.load(Ordering::Relaxed);
    let denied = denied.load(Ordering::Relaxed);
    let total = admitted + denied;
    let checks_per_sec = (total as f64 / elapsed.as_secs_f64()) as u64;

    info!(
        admitted,
        denied,
        tracked_keys = limiter.tracked_keys(),
        elapsed_ms = elapsed.as_millis() as u64,
        checks_per_sec,
        "Load run complete"
    );

    Ok(())
}
