// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the inverter-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Mutation policies for telemetry fields and 16-bit register encoding

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A value resampled every tick as `center + U[low, high]`, truncated toward zero.
///
/// The sample has no memory of the previous value. Offsets are signed so that
/// asymmetric ranges (efficiency drifts further down than up) can be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundedRandom {
    pub center: u32,
    pub low: i32,
    pub high: i32,
}

impl BoundedRandom {
    pub const fn new(center: u32, low: i32, high: i32) -> Self {
        Self { center, low, high }
    }

    /// Smallest value [`sample`](Self::sample) can return.
    pub fn min(&self) -> u32 {
        (i64::from(self.center) + i64::from(self.low)).max(0) as u32
    }

    /// Largest value [`sample`](Self::sample) can return.
    pub fn max(&self) -> u32 {
        (i64::from(self.center) + i64::from(self.high)).max(0) as u32
    }

    /// Draw a fresh value from the inclusive range.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        let jitter = rng.random_range(f64::from(self.low)..=f64::from(self.high));
        let value = (f64::from(self.center) + jitter).trunc();
        // Clamp guards against float rounding at the range edges.
        (value as i64).clamp(i64::from(self.min()), i64::from(self.max())) as u32
    }
}

/// A counter that only grows, by `trunc(U[0, max_increment])` per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accumulator {
    pub max_increment: u32,
}

impl Accumulator {
    pub const fn new(max_increment: u32) -> Self {
        Self { max_increment }
    }

    /// Return `value` advanced by one random increment.
    pub fn advance<R: Rng + ?Sized>(&self, value: u64, rng: &mut R) -> u64 {
        let step = rng
            .random_range(0.0..=f64::from(self.max_increment))
            .trunc() as u64;
        value.saturating_add(step.min(u64::from(self.max_increment)))
    }
}

/// How a semantic value wider than 16 bits is written into a register.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Clamp to 65535. Accumulators stay non-decreasing on the wire.
    #[default]
    Saturate,
    /// Keep the low 16 bits, so the register rolls over to 0.
    Wrap,
}

impl OverflowPolicy {
    pub fn encode(self, value: u64) -> u16 {
        match self {
            OverflowPolicy::Saturate => u16::try_from(value).unwrap_or(u16::MAX),
            OverflowPolicy::Wrap => (value & 0xFFFF) as u16,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn bounded_random_stays_in_range() {
        let field = BoundedRandom::new(980, -30, 20);
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(field.min(), 950);
        assert_eq!(field.max(), 1000);
        for _ in 0..10_000 {
            let value = field.sample(&mut rng);
            assert!((950..=1000).contains(&value), "{value} out of range");
        }
    }

    #[test]
    fn bounded_random_covers_both_sides_of_center() {
        let field = BoundedRandom::new(1000, -200, 200);
        let mut rng = StdRng::seed_from_u64(1);
        let samples: Vec<u32> = (0..1000).map(|_| field.sample(&mut rng)).collect();
        assert!(samples.iter().any(|v| *v < 1000));
        assert!(samples.iter().any(|v| *v > 1000));
    }

    #[test]
    fn accumulator_is_non_decreasing_and_bounded() {
        let field = Accumulator::new(100);
        let mut rng = StdRng::seed_from_u64(3);
        let mut value = 5000;
        for _ in 0..10_000 {
            let next = field.advance(value, &mut rng);
            assert!(next >= value);
            assert!(next - value <= 100);
            value = next;
        }
    }

    #[test]
    fn accumulator_saturates_instead_of_overflowing() {
        let field = Accumulator::new(200);
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(field.advance(u64::MAX, &mut rng), u64::MAX);
    }

    #[test]
    fn overflow_policies() {
        assert_eq!(OverflowPolicy::Saturate.encode(65_535), 65_535);
        assert_eq!(OverflowPolicy::Saturate.encode(100_000), 65_535);
        assert_eq!(OverflowPolicy::Wrap.encode(65_535), 65_535);
        assert_eq!(OverflowPolicy::Wrap.encode(65_536), 0);
        assert_eq!(OverflowPolicy::Wrap.encode(100_000), 34_464);
    }
}
