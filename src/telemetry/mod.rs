// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the inverter-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulated telemetry
//!
//! A telemetry model owns the semantic fields of a simulated device, mutates
//! them once per cadence tick and encodes them into the ordered register list
//! served over Modbus.
//!
//! ## Models
//!
//! - [`InverterModel`]: 13 registers with scaled power, voltage, temperature
//!   and energy counters, jittered every tick.
//! - [`MinimalModel`]: 3 static registers (power, voltage, frequency).
//!
//! ## Field kinds
//!
//! - Bounded-random fields are resampled independently every tick
//!   ([`BoundedRandom`]).
//! - Accumulators only grow ([`Accumulator`]).
//! - Static fields never change after construction.

pub mod field;
pub mod inverter;
pub mod minimal;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::modbus::register_map::{RegisterDef, INVERTER_REGISTERS, MINIMAL_REGISTERS};

pub use field::{Accumulator, BoundedRandom, OverflowPolicy};
pub use inverter::{InverterFields, InverterModel};
pub use minimal::{MinimalFields, MinimalModel};

/// Source of truth for the values served by one simulator instance.
///
/// `tick` is pure arithmetic over fixed bounds and cannot fail. The length of
/// `encode`'s output is the model's register count and never changes.
pub trait TelemetryModel: Send + 'static {
    /// Semantic field set. `Display` renders the human readable status report.
    type Fields: Clone + fmt::Debug + fmt::Display + Send;

    /// Number of registers produced by [`encode`](Self::encode).
    fn register_count(&self) -> usize;

    /// Baseline field set used to seed the register store.
    fn initial(&self) -> Self::Fields;

    /// Advance every mutable field once and return the updated field set.
    fn tick(&mut self) -> Self::Fields;

    /// Map each field to its register address and integer scale.
    fn encode(&self, fields: &Self::Fields) -> Vec<u16>;

    /// True when `tick` never changes anything. The status report of a static
    /// model is printed once at startup instead of after every tick.
    fn is_static(&self) -> bool {
        false
    }
}

/// Which device the simulator impersonates.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Rich 13 register inverter
    #[default]
    Inverter,
    /// Three static registers
    Minimal,
}

impl ModelKind {
    pub fn register_map(self) -> &'static [RegisterDef] {
        match self {
            ModelKind::Inverter => &INVERTER_REGISTERS,
            ModelKind::Minimal => &MINIMAL_REGISTERS,
        }
    }

    /// Per-connection request timeout used when the configuration sets none.
    pub fn default_connection_timeout(self) -> Option<Duration> {
        match self {
            ModelKind::Inverter => Some(Duration::from_secs(1)),
            ModelKind::Minimal => None,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Inverter => write!(f, "inverter"),
            ModelKind::Minimal => write!(f, "minimal"),
        }
    }
}
