use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use shot_keyed::LimiterConfig;
use shot_keyed::RateLimiterService;
use shot_keyed::StrategyParams;
use shot_keyed::TOKEN_BUCKET;

/// Fire a series of requests for one key and print each decision.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// JSON limiter configuration; overrides the strategy flags below
    #[arg(long)]
    config: Option<PathBuf>,

    /// Strategy kind
    #[arg(long, default_value = TOKEN_BUCKET)]
    kind: String,

    /// Token bucket: maximum burst per key
    #[arg(long, default_value_t = 5)]
    capacity: usize,

    /// Token bucket: tokens returned per second
    #[arg(long, default_value_t = 1.0)]
    refill_rate: f64,

    /// Fixed window: requests per window
    #[arg(long, default_value_t = 5)]
    limit: usize,

    /// Fixed window: window length
    #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
    window: Duration,

    /// Key the requests are made for
    #[arg(long, default_value = "user_123")]
    key: String,

    /// Number of requests to make
    #[arg(long, default_value_t = 10)]
    requests: usize,

    /// Pause between requests
    #[arg(long, default_value = "500ms", value_parser = humantime::parse_duration)]
    interval: Duration,
}

impl Args {
    fn limiter_config(&self) -> Result<LimiterConfig, Box<dyn Error>> {
        if let Some(path) = &self.config {
            let text = std::fs::read_to_string(path)?;
            return Ok(LimiterConfig::from_json(&text)?);
        }

        let params = StrategyParams {
            capacity: Some(self.capacity),
            refill_rate: Some(self.refill_rate),
            limit: Some(self.limit),
            window_size: Some(self.window),
            idle_ttl: None,
        };
        Ok(LimiterConfig::new(&self.kind, params))
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = args.limiter_config()?;
    info!(kind = %config.kind, params = ?config.params, "starting demo");

    let service = RateLimiterService::from_config(&config)?;

    for i in 0..args.requests {
        let verdict = if service.allow(&args.key) {
            "ALLOWED"
        } else {
            "BLOCKED"
        };
        println!("Request {}: {}", i + 1, verdict);
        std::thread::sleep(args.interval);
    }

    Ok(())
}
