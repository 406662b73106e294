//! `cloudtask-sim` -- runs simulated VM operations through the executor.
//!
//! Submits a batch of simulated start operations, waits for every callback,
//! and prints the aggregated error snapshot.
//!
//! # Usage
//!
//! ```bash
//! # Eight operations, every third one failing
//! cargo run --bin cloudtask-sim
//!
//! # Larger clean run with a faster polling loop
//! cargo run --bin cloudtask-sim -- --tasks 50 --fail-every 0 --poll-interval-ms 50
//!
//! # Verbose executor logs
//! CLOUDTASK_LOG=debug cargo run --bin cloudtask-sim
//! ```

use std::sync::Arc;

use clap::Parser;
use cloudtask::errors::CloudErrorMap;
use cloudtask::tasks::AsyncTaskExecutor;
use cloudtask_sim::config::{SimCliArgs, SimConfig};
use cloudtask_sim::scenario;

#[tokio::main]
async fn main() {
    let cli = SimCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match SimConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing with the resolved log level.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let executor = match AsyncTaskExecutor::new(config.executor.clone()) {
        Ok(executor) => executor,
        Err(e) => {
            tracing::error!(error = %e, "failed to create executor");
            std::process::exit(1);
        }
    };
    if let Err(e) = executor.start(&config.executor_name) {
        tracing::error!(error = %e, "failed to start executor");
        std::process::exit(1);
    }

    let errors = Arc::new(CloudErrorMap::default());
    let report = scenario::run(&config.scenario, &executor, &errors).await;
    executor.dispose().await;

    println!(
        "{} submitted, {} started, {} failed",
        report.submitted, report.succeeded, report.failed
    );
    match report.snapshot {
        None => println!("status: ok"),
        Some(info) => match toml::to_string(&*info) {
            Ok(rendered) => print!("status: error\n{rendered}"),
            Err(e) => {
                tracing::warn!(error = %e, "failed to render error snapshot");
                println!("status: error: {}", info.message);
            }
        },
    }
}
