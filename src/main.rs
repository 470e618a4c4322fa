// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the inverter-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the Modbus TCP inverter simulator

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use tokio::signal;

use inverter_simulator::config::{utils, Config};
use inverter_simulator::daemon::{ServerLoop, ServerSettings};
use inverter_simulator::telemetry::{InverterModel, MinimalModel, ModelKind, OverflowPolicy};

/// Solar inverter simulator serving telemetry over Modbus TCP
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file (YAML format)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to a configuration to validate and exit
    #[arg(long)]
    validate_config: Option<PathBuf>,

    /// Output the configuration schema as JSON and exit
    #[arg(long)]
    show_config_schema: bool,

    /// Modbus server address
    #[arg(long)]
    address: Option<String>,

    /// Modbus server port
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Register refresh interval in milliseconds
    #[arg(long)]
    cadence_ms: Option<u64>,

    /// Request timeout in milliseconds (0 disables it)
    #[arg(long)]
    connection_timeout_ms: Option<u64>,

    /// Simulated device
    #[arg(long, value_enum)]
    model: Option<ModelKind>,

    /// Seed of the jitter generator
    #[arg(long)]
    seed: Option<u64>,

    /// Encoding of values wider than 16 bits
    #[arg(long, value_enum)]
    overflow: Option<OverflowPolicy>,

    /// Do not print the field values after each refresh
    #[arg(long)]
    no_status: bool,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Disable all logging output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.quiet {
        log::LevelFilter::Off
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if args.show_config_schema {
        return utils::output_config_schema();
    }

    if let Some(validate_path) = args.validate_config {
        if !validate_path.exists() {
            return Err(anyhow::anyhow!(
                "Configuration file does not exist: {}",
                validate_path.display()
            ));
        }
        Config::from_file(&validate_path)
            .map_err(|err| anyhow::anyhow!("Configuration validation failed: {}", err))?;
        println!("Configuration file is valid: {}", validate_path.display());
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    config.apply_args(
        args.address.clone(),
        args.port,
        args.cadence_ms,
        args.connection_timeout_ms,
        args.model,
        args.seed,
        args.overflow,
        args.no_status,
    );
    utils::validate_specific_rules(&config).context("Invalid command line arguments")?;

    let settings = ServerSettings::from_config(&config);
    info!(
        "Simulating {} model, registers refreshed every {} ms",
        config.simulation.model, config.simulation.cadence_ms
    );
    let mut server = match config.simulation.model {
        ModelKind::Inverter => {
            let seed = config.simulation.seed.unwrap_or_else(rand::random);
            info!("Jitter seed: {} (pass --seed {} to replay this run)", seed, seed);
            ServerLoop::start(
                settings,
                InverterModel::seeded(seed, config.simulation.overflow),
            )
            .await?
        }
        ModelKind::Minimal => ServerLoop::start(settings, MinimalModel::new()).await?,
    };
    println!("Modbus TCP server listening on {}", server.local_addr());

    let loop_result = tokio::select! {
        signal = shutdown_signal() => {
            signal?;
            info!("Received shutdown signal, stopping simulator");
            None
        }
        result = server.stopped() => Some(result),
    };

    let stop_result = server.stop().await;
    if let Some(Err(err)) = loop_result {
        error!("Cadence loop terminated: {}", err);
        return Err(err.into());
    }
    stop_result?;

    Ok(())
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?;
        tokio::select! {
            result = signal::ctrl_c() => result.context("Failed to listen for Ctrl+C")?,
            _ = sigterm.recv() => info!("Received SIGTERM"),
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl+C")
    }
}
