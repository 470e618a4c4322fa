// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the inverter-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus communication module
//!
//! This module holds everything the simulator hands to the Modbus TCP engine
//! (`tokio-modbus`): the shared register table, the request service reading
//! and writing it, the per-connection stream guard and the register maps.
//!
//! ## Key Components
//!
//! - [`RegisterStore`]: fixed-length holding register table shared between
//!   the cadence loop and client connections.
//! - [`InverterModbusServer`]: the `tokio_modbus` service answering requests
//!   from the store.
//! - [`ConnectionStream`]: applies the request timeout and closes connections
//!   on shutdown.
//! - [`register_map`]: addresses, units and scaling of every register.

pub mod connection;
pub mod modbus_server;
pub mod register_map;
pub mod register_store;

pub use connection::ConnectionStream;
pub use modbus_server::InverterModbusServer;
pub use register_store::RegisterStore;
