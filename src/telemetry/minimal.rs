// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the inverter-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Three register demo device with no mutation policy

use std::fmt;

use serde::Serialize;

use super::TelemetryModel;
use crate::modbus::register_map::MINIMAL_REGISTERS;

/// Unscaled power (W), voltage (V) and frequency (Hz).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MinimalFields {
    pub power: u16,
    pub voltage: u16,
    pub frequency: u16,
}

impl Default for MinimalFields {
    fn default() -> Self {
        Self {
            power: 1000,
            voltage: 2200,
            frequency: 50,
        }
    }
}

impl fmt::Display for MinimalFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Power: {} W", self.power)?;
        writeln!(f, "Voltage: {} V", self.voltage)?;
        write!(f, "Frequency: {} Hz", self.frequency)
    }
}

/// Static demo device. Ticking it changes nothing.
#[derive(Debug, Clone, Default)]
pub struct MinimalModel {
    fields: MinimalFields,
}

impl MinimalModel {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TelemetryModel for MinimalModel {
    type Fields = MinimalFields;

    fn register_count(&self) -> usize {
        MINIMAL_REGISTERS.len()
    }

    fn initial(&self) -> MinimalFields {
        self.fields
    }

    fn tick(&mut self) -> MinimalFields {
        self.fields
    }

    fn encode(&self, fields: &MinimalFields) -> Vec<u16> {
        vec![fields.power, fields.voltage, fields.frequency]
    }

    fn is_static(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_is_a_no_op() {
        let mut model = MinimalModel::new();
        let baseline = model.encode(&model.initial());
        assert_eq!(baseline, vec![1000, 2200, 50]);
        for _ in 0..10 {
            let fields = model.tick();
            assert_eq!(model.encode(&fields), baseline);
        }
        assert_eq!(model.register_count(), 3);
        assert!(model.is_static());
    }
}
