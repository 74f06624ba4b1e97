// src/main.rs - sajtmaskin-cache admin CLI
use clap::{Parser, Subcommand};
use sajtmaskin_cache::admin::{self, DEFAULT_CLEAR_PATTERNS};
use sajtmaskin_cache::monitoring::metrics;
use sajtmaskin_cache::monitoring::{init_tracing, MonitoringConfig};
use sajtmaskin_cache::{CacheConfig, StoreHandle};
use serde::Serialize;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "sajtmaskin-cache", version, about = "Inspect and administer the Redis cache")]
struct Cli {
    /// Print the Prometheus exposition to stderr when done
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connectivity, memory usage, key count and uptime
    Health,
    /// TTL and payload shape of keys matching a pattern (uses SCAN)
    Inspect {
        #[arg(long, default_value = "*")]
        pattern: String,
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
    /// Delete keys matching patterns (dry run unless --execute)
    Clear {
        /// Comma-separated glob patterns
        #[arg(long, value_delimiter = ',', default_values = DEFAULT_CLEAR_PATTERNS)]
        patterns: Vec<String>,
        #[arg(long)]
        execute: bool,
        /// Required together with --execute
        #[arg(long)]
        yes: bool,
    },
    /// Delete every key in the store
    Flush {
        /// Required confirmation
        #[arg(long)]
        yes: bool,
    },
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(out) => {
            println!("{}", out);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Failed to render output: {}", e);
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let _log_guard = match init_tracing(&MonitoringConfig::from_env()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialise logging: {}", e);
            None
        }
    };

    let config = CacheConfig::from_env();
    let handle = StoreHandle::from_config(&config);
    if !handle.is_available() {
        eprintln!("Cache is not configured (set REDIS_HOST and REDIS_PASSWORD)");
        return ExitCode::FAILURE;
    }

    metrics::init();
    let code = run(cli.command, &handle).await;
    if cli.metrics {
        eprint!("{}", metrics::render_metrics());
    }
    code
}

async fn run(command: Command, handle: &StoreHandle) -> ExitCode {
    match command {
        Command::Health => {
            let report = admin::health_report(handle).await;
            let code = print_json(&report);
            if report.connected {
                code
            } else {
                ExitCode::FAILURE
            }
        }
        Command::Inspect { pattern, limit } => {
            match admin::inspect_pattern(handle, &pattern, limit).await {
                Ok(found) => print_json(&found),
                Err(e) => {
                    eprintln!("{}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Command::Clear {
            patterns,
            execute,
            yes,
        } => {
            if execute && !yes {
                eprintln!("Refusing to clear without --yes");
                return ExitCode::FAILURE;
            }
            match admin::clear_patterns(handle, &patterns, !execute).await {
                Ok(report) => print_json(&report),
                Err(e) => {
                    eprintln!("{}", e);
                    ExitCode::FAILURE
                }
            }
        }
        Command::Flush { yes } => {
            if !yes {
                eprintln!("Refusing to flush without --yes");
                return ExitCode::FAILURE;
            }
            if admin::flush_all(handle).await {
                println!("Cache flushed");
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
