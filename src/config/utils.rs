// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the inverter-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use anyhow::{Context, Result};
use log::{debug, warn};

use super::Config;

/// JSON schema the configuration file is validated against.
pub const CONFIG_SCHEMA: &str = include_str!("../../resources/config.schema.json");

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// # Example
///
/// ```bash
/// ./inverter_simulator --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema: serde_json::Value =
        serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Check if a string is a valid IP address
///
/// Validates that a string represents a valid IPv4 or IPv6 address,
/// or is one of the special values like "localhost" or "0.0.0.0".
pub fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }

    matches!(addr, "localhost" | "::" | "::0" | "0.0.0.0")
}

/// Validates the configuration against rules the JSON schema cannot express.
///
/// # Validation Rules
///
/// - **Port**: must not be 0, the simulator needs a fixed port clients can
///   reach
/// - **Cadence**: the refresh interval must be at least one millisecond
/// - **Address**: an empty bind address is rejected, anything that is not an
///   IP address is only reported since it may be a resolvable host name
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    if config.modbus.port == 0 {
        anyhow::bail!("Invalid Modbus port number: {}", config.modbus.port);
    }

    if config.modbus.address.trim().is_empty() {
        anyhow::bail!("Modbus bind address must not be empty");
    }

    if !is_valid_ip_address(&config.modbus.address) {
        warn!(
            "Modbus address {} is not an IP address, it will be resolved at startup",
            config.modbus.address
        );
    }

    if config.simulation.cadence_ms == 0 {
        anyhow::bail!("Simulation cadence must be at least 1 ms");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes() {
        assert!(validate_specific_rules(&Config::default()).is_ok());
    }

    #[test]
    fn rejects_zero_port_and_cadence() {
        let mut config = Config::default();
        config.modbus.port = 0;
        assert!(validate_specific_rules(&config).is_err());

        let mut config = Config::default();
        config.simulation.cadence_ms = 0;
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn host_names_are_accepted() {
        let mut config = Config::default();
        config.modbus.address = "simulator.local".to_string();
        assert!(validate_specific_rules(&config).is_ok());
        assert!(!is_valid_ip_address("simulator.local"));
        assert!(is_valid_ip_address("::1"));
    }

    #[test]
    fn embedded_schema_is_valid_json() {
        let schema: serde_json::Value = serde_json::from_str(CONFIG_SCHEMA).unwrap();
        assert!(schema["properties"]["modbus"].is_object());
        assert!(schema["properties"]["simulation"].is_object());
    }
}
