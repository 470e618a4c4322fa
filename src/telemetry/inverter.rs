// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the inverter-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rich inverter telemetry model
//!
//! Thirteen fields laid out as in [`INVERTER_REGISTERS`](crate::modbus::register_map::INVERTER_REGISTERS).
//! Power, voltage, current, temperature and efficiency jitter around fixed
//! centers, the energy counters grow every tick and the status, power factor
//! and frequency fields stay at their baseline.

use std::fmt;

use rand::{rngs::StdRng, SeedableRng};
use serde::Serialize;

use super::{Accumulator, BoundedRandom, OverflowPolicy, TelemetryModel};
use crate::modbus::register_map::INVERTER_REGISTERS;

pub const ACTIVE_POWER: BoundedRandom = BoundedRandom::new(1000, -200, 200);
pub const REACTIVE_POWER: BoundedRandom = BoundedRandom::new(500, -100, 100);
pub const VOLTAGE: BoundedRandom = BoundedRandom::new(2200, -50, 50);
pub const CURRENT: BoundedRandom = BoundedRandom::new(100, -20, 20);
pub const TEMPERATURE: BoundedRandom = BoundedRandom::new(45, -5, 5);
pub const EFFICIENCY: BoundedRandom = BoundedRandom::new(980, -30, 20);

pub const DAILY_ENERGY: Accumulator = Accumulator::new(100);
pub const TOTAL_ENERGY: Accumulator = Accumulator::new(200);

/// Semantic inverter state, already in register units (see the register map
/// for the scale of each field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InverterFields {
    pub connection_status: u16,
    pub device_status: u16,
    pub error_code: u16,
    pub active_power: u32,
    pub reactive_power: u32,
    pub power_factor: u32,
    pub frequency: u32,
    pub voltage: u32,
    pub current: u32,
    pub temperature: u32,
    pub daily_energy: u64,
    pub total_energy: u64,
    pub efficiency: u32,
}

impl Default for InverterFields {
    fn default() -> Self {
        Self {
            connection_status: 1,
            device_status: 1,
            error_code: 0,
            active_power: ACTIVE_POWER.center,
            reactive_power: REACTIVE_POWER.center,
            power_factor: 950,
            frequency: 50,
            voltage: VOLTAGE.center,
            current: CURRENT.center,
            temperature: TEMPERATURE.center,
            daily_energy: 5000,
            total_energy: 100_000,
            efficiency: EFFICIENCY.center,
        }
    }
}

impl fmt::Display for InverterFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Active power: {:.2} kW",
            f64::from(self.active_power) / 1000.0
        )?;
        writeln!(
            f,
            "Reactive power: {:.2} kVar",
            f64::from(self.reactive_power) / 1000.0
        )?;
        writeln!(f, "Voltage: {:.1} V", f64::from(self.voltage) / 10.0)?;
        writeln!(f, "Current: {:.2} A", f64::from(self.current) / 100.0)?;
        writeln!(f, "Temperature: {} °C", self.temperature)?;
        writeln!(
            f,
            "Daily energy: {:.2} kWh",
            self.daily_energy as f64 / 1000.0
        )?;
        writeln!(
            f,
            "Total energy: {:.2} kWh",
            self.total_energy as f64 / 1000.0
        )?;
        write!(f, "Efficiency: {:.1} %", f64::from(self.efficiency) / 10.0)
    }
}

/// Jittering inverter driven by an owned, seedable generator.
#[derive(Debug, Clone)]
pub struct InverterModel {
    baseline: InverterFields,
    current: InverterFields,
    overflow: OverflowPolicy,
    rng: StdRng,
}

impl InverterModel {
    /// Model whose jitter sequence is fully determined by `seed`.
    pub fn seeded(seed: u64, overflow: OverflowPolicy) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), overflow)
    }

    pub fn with_rng(rng: StdRng, overflow: OverflowPolicy) -> Self {
        let baseline = InverterFields::default();
        Self {
            baseline,
            current: baseline,
            overflow,
            rng,
        }
    }

    pub fn overflow(&self) -> OverflowPolicy {
        self.overflow
    }

    /// Field set produced by the latest tick (the baseline before the first one).
    pub fn current(&self) -> &InverterFields {
        &self.current
    }
}

impl TelemetryModel for InverterModel {
    type Fields = InverterFields;

    fn register_count(&self) -> usize {
        INVERTER_REGISTERS.len()
    }

    fn initial(&self) -> InverterFields {
        self.baseline
    }

    fn tick(&mut self) -> InverterFields {
        let rng = &mut self.rng;
        let fields = &mut self.current;

        fields.active_power = ACTIVE_POWER.sample(rng);
        fields.reactive_power = REACTIVE_POWER.sample(rng);
        fields.voltage = VOLTAGE.sample(rng);
        fields.current = CURRENT.sample(rng);
        fields.temperature = TEMPERATURE.sample(rng);
        fields.daily_energy = DAILY_ENERGY.advance(fields.daily_energy, rng);
        fields.total_energy = TOTAL_ENERGY.advance(fields.total_energy, rng);
        fields.efficiency = EFFICIENCY.sample(rng);

        self.current
    }

    fn encode(&self, fields: &InverterFields) -> Vec<u16> {
        let wide = |value: u32| self.overflow.encode(u64::from(value));
        vec![
            fields.connection_status,
            fields.device_status,
            fields.error_code,
            wide(fields.active_power),
            wide(fields.reactive_power),
            wide(fields.power_factor),
            wide(fields.frequency),
            wide(fields.voltage),
            wide(fields.current),
            wide(fields.temperature),
            self.overflow.encode(fields.daily_energy),
            self.overflow.encode(fields.total_energy),
            wide(fields.efficiency),
        ]
    }
}
