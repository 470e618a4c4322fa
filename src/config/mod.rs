// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the inverter-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the inverter simulator
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings. The configuration is backed by a YAML file and
//! validated against a JSON schema for robustness.
//!
//! ## Configuration Structure
//!
//! - `modbus`: Settings of the Modbus TCP listener
//! - `simulation`: Telemetry model, cadence and jitter seed
//!
//! ## Usage
//!
//! ```no_run
//! use inverter_simulator::config::Config;
//! use std::path::Path;
//!
//! // Load configuration from a file
//! let config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! println!("Listening on {}", config.modbus.bind_address());
//! ```
//!
//! When the configuration file fails validation, a `config.sample.yaml`
//! holding the default values is written next to it.

mod modbus;
mod simulation;
pub mod utils;

pub use modbus::ModbusConfig;
pub use simulation::SimulationConfig;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

use crate::telemetry::{ModelKind, OverflowPolicy};

/// Root configuration of the simulator.
///
/// Every section is optional in the YAML file; missing sections and fields
/// take their default values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Modbus TCP listener settings
    #[serde(default)]
    pub modbus: ModbusConfig,

    /// Telemetry model settings
    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Creating sample configuration file at {:?}", sample_path);

        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    ///
    /// A missing file is created with the default values. An existing file is
    /// checked against the embedded JSON schema, deserialized, then checked by
    /// [`utils::validate_specific_rules`].
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        let yaml_value: serde_yml::Value = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML configuration from {:?}", path))?;

        // The schema validator works on JSON values
        let json_value = serde_json::to_value(&yaml_value).with_context(|| {
            format!("Failed to convert YAML to JSON for validation: {:?}", path)
        })?;

        let schema: serde_json::Value =
            serde_json::from_str(utils::CONFIG_SCHEMA).context("Failed to parse JSON schema")?;

        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        debug!("Validating {} configuration against schema", path.display());
        if let Err(error) = validator.validate(&json_value) {
            error!("Configuration validation error before deserialization");
            Self::create_sample_config(path)?;
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        let config: Config = match serde_yml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                error!("Configuration deserialization error: {}", err);
                if let Err(e) = Self::create_sample_config(path) {
                    error!("Failed to create sample config: {}", e);
                }
                return Err(anyhow::anyhow!(
                    "Failed to deserialize configuration from {}: {}",
                    path.display(),
                    err
                ));
            }
        };

        if let Err(err) = utils::validate_specific_rules(&config) {
            error!("Configuration specific validation error: {}", err);
            Self::create_sample_config(path)?;
            return Err(err);
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only arguments that were given on the command line replace the values
    /// loaded from the file (or the defaults).
    ///
    /// # Parameters
    ///
    /// * `address` - Modbus bind address
    /// * `port` - Modbus TCP port
    /// * `cadence_ms` - Register refresh interval in milliseconds
    /// * `connection_timeout_ms` - Request timeout in milliseconds, `0` disables it
    /// * `model` - Simulated device
    /// * `seed` - Seed of the jitter generator
    /// * `overflow` - Encoding of values wider than 16 bits
    /// * `no_status` - If true, the per-tick status report is disabled
    ///
    /// # Example
    ///
    /// ```rust
    /// use inverter_simulator::config::Config;
    /// use inverter_simulator::telemetry::ModelKind;
    ///
    /// let mut config = Config::default();
    /// config.apply_args(
    ///     Some("0.0.0.0".to_string()), // Modbus address
    ///     Some(1502),                  // Modbus port
    ///     Some(500),                   // Cadence
    ///     None,                        // Connection timeout
    ///     Some(ModelKind::Minimal),    // Model
    ///     Some(42),                    // Seed
    ///     None,                        // Overflow policy
    ///     true,                        // No status report
    /// );
    /// assert_eq!(config.modbus.port, 1502);
    /// assert!(!config.simulation.print_status);
    /// ```
    #[allow(clippy::too_many_arguments)]
    pub fn apply_args(
        &mut self,
        address: Option<String>,
        port: Option<u16>,
        cadence_ms: Option<u64>,
        connection_timeout_ms: Option<u64>,
        model: Option<ModelKind>,
        seed: Option<u64>,
        overflow: Option<OverflowPolicy>,
        no_status: bool,
    ) {
        if let Some(address) = address {
            debug!("Overriding Modbus address from command line: {}", address);
            self.modbus.address = address;
        }
        if let Some(port) = port {
            debug!("Overriding Modbus port from command line: {}", port);
            self.modbus.port = port;
        }
        if let Some(timeout) = connection_timeout_ms {
            debug!(
                "Overriding connection timeout from command line: {} ms",
                timeout
            );
            self.modbus.connection_timeout_ms = Some(timeout);
        }

        if let Some(cadence) = cadence_ms {
            debug!("Overriding cadence from command line: {} ms", cadence);
            self.simulation.cadence_ms = cadence;
        }
        if let Some(model) = model {
            debug!("Overriding model from command line: {}", model);
            self.simulation.model = model;
        }
        if let Some(seed) = seed {
            debug!("Overriding seed from command line: {}", seed);
            self.simulation.seed = Some(seed);
        }
        if let Some(overflow) = overflow {
            debug!("Overriding overflow policy from command line: {:?}", overflow);
            self.simulation.overflow = overflow;
        }
        if no_status {
            self.simulation.print_status = false;
        }
    }

    /// Request timeout applied to every client connection.
    ///
    /// An unset value falls back to the model's default, `0` disables the
    /// timeout.
    pub fn connection_timeout(&self) -> Option<Duration> {
        match self.modbus.connection_timeout_ms {
            None => self.simulation.model.default_connection_timeout(),
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_timeout_follows_model_default() {
        let mut config = Config::default();
        assert_eq!(config.connection_timeout(), Some(Duration::from_secs(1)));

        config.simulation.model = ModelKind::Minimal;
        assert_eq!(config.connection_timeout(), None);

        config.modbus.connection_timeout_ms = Some(250);
        assert_eq!(config.connection_timeout(), Some(Duration::from_millis(250)));

        config.simulation.model = ModelKind::Inverter;
        config.modbus.connection_timeout_ms = Some(0);
        assert_eq!(config.connection_timeout(), None);
    }

    #[test]
    fn apply_args_only_overrides_given_values() {
        let mut config = Config::default();
        config.apply_args(None, Some(1502), None, None, None, None, None, false);

        assert_eq!(config.modbus.port, 1502);
        assert_eq!(config.modbus.address, "127.0.0.1");
        assert_eq!(config.simulation.cadence_ms, 1000);
        assert!(config.simulation.print_status);

        config.apply_args(
            Some("0.0.0.0".to_string()),
            None,
            Some(250),
            Some(0),
            Some(ModelKind::Minimal),
            Some(7),
            Some(OverflowPolicy::Wrap),
            true,
        );
        assert_eq!(config.modbus.address, "0.0.0.0");
        assert_eq!(config.modbus.port, 1502);
        assert_eq!(config.modbus.connection_timeout_ms, Some(0));
        assert_eq!(config.simulation.cadence_ms, 250);
        assert_eq!(config.simulation.model, ModelKind::Minimal);
        assert_eq!(config.simulation.seed, Some(7));
        assert_eq!(config.simulation.overflow, OverflowPolicy::Wrap);
        assert!(!config.simulation.print_status);
    }
}
