// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the inverter-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Module
//!
//! Runs the simulator as a background service: the Modbus TCP listener and the
//! cadence loop refreshing the registers, started together and shut down
//! together.
//!
//! ## Usage
//!
//! ```no_run
//! use inverter_simulator::config::Config;
//! use inverter_simulator::daemon::{ServerLoop, ServerSettings};
//! use inverter_simulator::telemetry::InverterModel;
//!
//! async fn run() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let model = InverterModel::seeded(42, config.simulation.overflow);
//!
//!     let mut server = ServerLoop::start(ServerSettings::from_config(&config), model).await?;
//!
//!     // Wait for shutdown signal (e.g., Ctrl+C)
//!     tokio::signal::ctrl_c().await?;
//!
//!     // Clean shutdown
//!     server.stop().await?;
//!     Ok(())
//! }
//! ```

pub mod server_loop;

pub use server_loop::{ServerLoop, ServerSettings};
