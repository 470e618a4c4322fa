// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the inverter-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Error types shared by the register store and the server loop

use std::io;

use thiserror::Error;

/// Contract violations on the [`RegisterStore`](crate::modbus::RegisterStore).
///
/// Both variants indicate a programming error (an encoding table that does
/// not match the register count) rather than a transient condition.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Register address {address} is out of range (store holds {len} registers)")]
    OutOfRange { address: usize, len: usize },

    #[error("Expected {expected} register values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Failures owned by the simulator itself.
///
/// Protocol errors raised by remote clients never surface here, they are
/// answered with Modbus exception codes by the service.
#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("Failed to bind Modbus listener on {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Cadence task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
