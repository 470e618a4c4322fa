// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the inverter-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP server configuration
//!
//! This module defines the structures for configuring the Modbus TCP listener
//! of the simulator.

use serde::{Deserialize, Serialize};

/// Configuration for the Modbus TCP listener.
///
/// # Fields
///
/// * `address` - Network address to bind to (default: 127.0.0.1)
/// * `port` - TCP port number (default: 502)
/// * `connection_timeout_ms` - Time a client may take to complete a request
///   once it started sending it. Absent means the model's default, `0`
///   disables the timeout.
///
/// # Example
///
/// ```
/// use inverter_simulator::config::ModbusConfig;
///
/// let modbus_config = ModbusConfig {
///     port: 1502,
///     address: "0.0.0.0".to_string(),
///     connection_timeout_ms: Some(2000),
/// };
/// assert_eq!(modbus_config.bind_address(), "0.0.0.0:1502");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModbusConfig {
    /// The network address the Modbus server will bind to.
    ///
    /// Can be an IPv4/IPv6 address or a hostname. Use "0.0.0.0" to bind to all
    /// IPv4 interfaces.
    pub address: String,

    /// The TCP port the Modbus server will listen on.
    ///
    /// 502 is the standard Modbus TCP port and usually needs elevated
    /// privileges to bind.
    pub port: u16,

    /// Request timeout in milliseconds.
    pub connection_timeout_ms: Option<u64>,
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1".to_string(), // Localhost for security
            port: 502,                        // Standard Modbus TCP port
            connection_timeout_ms: None,
        }
    }
}

impl ModbusConfig {
    /// `address:port` string accepted by `TcpListener::bind`.
    ///
    /// Bare IPv6 addresses are wrapped in brackets.
    pub fn bind_address(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}
