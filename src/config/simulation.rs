// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the inverter-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulation configuration
//!
//! Selects the simulated device and controls the cadence loop that refreshes
//! its registers.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::telemetry::{ModelKind, OverflowPolicy};

/// Settings of the telemetry model and its update cadence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Device served over Modbus (`inverter` or `minimal`).
    pub model: ModelKind,

    /// Interval between two register refreshes, in milliseconds.
    pub cadence_ms: u64,

    /// Seed of the jitter generator.
    ///
    /// When absent a seed is drawn at startup and logged, so any run can be
    /// replayed by setting it here.
    pub seed: Option<u64>,

    /// How values wider than 16 bits are written into registers.
    pub overflow: OverflowPolicy,

    /// Print the field values to stdout after every refresh.
    pub print_status: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            model: ModelKind::Inverter,
            cadence_ms: 1000,
            seed: None,
            overflow: OverflowPolicy::Saturate,
            print_status: true,
        }
    }
}

impl SimulationConfig {
    pub fn cadence(&self) -> Duration {
        Duration::from_millis(self.cadence_ms)
    }
}
