// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the inverter-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Inverter simulator library
//!
//! Impersonates a solar inverter on the network: a Modbus TCP server exposes
//! holding registers whose values are refreshed on a fixed cadence by a
//! telemetry model.
//!
//! ## Modules
//!
//! - [`config`]: YAML configuration validated against a JSON schema
//! - [`daemon`]: lifecycle of the listener and the cadence loop
//! - [`modbus`]: register store, Modbus service and register maps
//! - [`telemetry`]: simulated devices (rich inverter and minimal demo)
//! - [`error`]: error types

pub mod config;
pub mod daemon;
pub mod error;
pub mod modbus;
pub mod telemetry;

pub use config::Config;
pub use daemon::{ServerLoop, ServerSettings};
pub use error::{SimulatorError, StoreError};
pub use modbus::RegisterStore;
pub use telemetry::{InverterModel, MinimalModel, ModelKind, OverflowPolicy, TelemetryModel};
