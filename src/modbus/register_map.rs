// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the inverter-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Holding register maps
//!
//! Every physical quantity is stored as an integer equal to the true value
//! multiplied by a power of ten, so the wire never carries floating point.
//!
//! ## Inverter model
//!
//! | Address | Field | Unit | Scaling |
//! |---------|-------|------|---------|
//! | 0 | Connection status | - | 1 = connected |
//! | 1 | Device status | - | 1 = running |
//! | 2 | Error code | - | 0 = none |
//! | 3 | Active power | kW | ÷1000 |
//! | 4 | Reactive power | kVar | ÷1000 |
//! | 5 | Power factor | - | ÷1000 |
//! | 6 | Frequency | Hz | ÷1 |
//! | 7 | Voltage | V | ÷10 |
//! | 8 | Current | A | ÷100 |
//! | 9 | Temperature | °C | ÷1 |
//! | 10 | Daily energy | kWh | ÷1000 |
//! | 11 | Total energy | kWh | ÷1000 |
//! | 12 | Efficiency | % | ÷10 |
//!
//! ## Minimal model
//!
//! | Address | Field | Unit |
//! |---------|-------|------|
//! | 0 | Power | W |
//! | 1 | Voltage | V |
//! | 2 | Frequency | Hz |

use serde::Serialize;

/// Static description of one holding register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterDef {
    pub address: u16,
    pub name: &'static str,
    pub unit: &'static str,
    /// Raw value divided by this gives the physical value.
    pub divisor: u32,
}

impl RegisterDef {
    const fn new(address: u16, name: &'static str, unit: &'static str, divisor: u32) -> Self {
        Self {
            address,
            name,
            unit,
            divisor,
        }
    }

    pub fn physical(&self, raw: u16) -> f64 {
        f64::from(raw) / f64::from(self.divisor)
    }
}

pub const INVERTER_REGISTERS: [RegisterDef; 13] = [
    RegisterDef::new(0, "connection_status", "", 1),
    RegisterDef::new(1, "device_status", "", 1),
    RegisterDef::new(2, "error_code", "", 1),
    RegisterDef::new(3, "active_power", "kW", 1000),
    RegisterDef::new(4, "reactive_power", "kVar", 1000),
    RegisterDef::new(5, "power_factor", "", 1000),
    RegisterDef::new(6, "frequency", "Hz", 1),
    RegisterDef::new(7, "voltage", "V", 10),
    RegisterDef::new(8, "current", "A", 100),
    RegisterDef::new(9, "temperature", "°C", 1),
    RegisterDef::new(10, "daily_energy", "kWh", 1000),
    RegisterDef::new(11, "total_energy", "kWh", 1000),
    RegisterDef::new(12, "efficiency", "%", 10),
];

pub const MINIMAL_REGISTERS: [RegisterDef; 3] = [
    RegisterDef::new(0, "power", "W", 1),
    RegisterDef::new(1, "voltage", "V", 1),
    RegisterDef::new(2, "frequency", "Hz", 1),
];

/// One register read back from a device and interpreted through its map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedRegister {
    pub address: u16,
    pub name: String,
    pub raw: u16,
    pub value: f64,
    pub unit: String,
}

/// Interpret `raw` values read from `start` onwards.
///
/// Addresses not covered by `map` are reported with their raw value and no unit.
pub fn decode(map: &[RegisterDef], start: u16, raw: &[u16]) -> Vec<DecodedRegister> {
    raw.iter()
        .zip(start..)
        .map(
            |(value, address)| match map.iter().find(|def| def.address == address) {
                Some(def) => DecodedRegister {
                    address,
                    name: def.name.to_string(),
                    raw: *value,
                    value: def.physical(*value),
                    unit: def.unit.to_string(),
                },
                None => DecodedRegister {
                    address,
                    name: format!("register_{address}"),
                    raw: *value,
                    value: f64::from(*value),
                    unit: String::new(),
                },
            },
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_are_contiguous_from_zero() {
        for map in [&INVERTER_REGISTERS[..], &MINIMAL_REGISTERS[..]] {
            for (index, def) in map.iter().enumerate() {
                assert_eq!(usize::from(def.address), index);
            }
        }
    }

    #[test]
    fn decode_applies_scaling() {
        let decoded = decode(&INVERTER_REGISTERS, 3, &[1000, 500, 950, 50, 2200, 100]);
        assert_eq!(decoded.len(), 6);
        assert_eq!(decoded[0].name, "active_power");
        assert!((decoded[0].value - 1.0).abs() < f64::EPSILON);
        assert!((decoded[1].value - 0.5).abs() < f64::EPSILON);
        assert!((decoded[2].value - 0.95).abs() < 1e-9);
        assert!((decoded[4].value - 220.0).abs() < f64::EPSILON);
        assert_eq!(decoded[4].unit, "V");
        assert!((decoded[5].value - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn decode_handles_unmapped_addresses() {
        let decoded = decode(&MINIMAL_REGISTERS, 2, &[50, 7]);
        assert_eq!(decoded[0].name, "frequency");
        assert_eq!(decoded[1].name, "register_3");
        assert_eq!(decoded[1].raw, 7);
    }
}
