// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the inverter-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Shared holding register table
//!
//! The store is the only state shared between the cadence loop (the single
//! writer of whole snapshots) and the Modbus service (reading on behalf of any
//! number of remote clients). Every operation takes the same mutex for its
//! whole duration, so a multi-register read always observes either the
//! previous or the next snapshot, never a mix of both.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::debug;

use crate::error::StoreError;

/// A fixed-length table of 16-bit holding registers starting at address 0.
///
/// Cloning the store is cheap and yields a handle to the same registers.
/// The number of registers is set at construction and never changes.
#[derive(Debug, Clone)]
pub struct RegisterStore {
    registers: Arc<Mutex<Vec<u16>>>,
    len: usize,
}

impl RegisterStore {
    /// Create a store seeded with `initial`, whose length becomes the store length.
    pub fn new(initial: Vec<u16>) -> Self {
        let len = initial.len();
        Self {
            registers: Arc::new(Mutex::new(initial)),
            len,
        }
    }

    /// Number of registers held by the store.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True for a store holding no register at all.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    // The vector is always replaced or patched in full before the guard is
    // released, so a panic elsewhere cannot leave it half-written.
    fn lock(&self) -> MutexGuard<'_, Vec<u16>> {
        self.registers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Read the register at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::OutOfRange`] if `address` is not below [`len`](Self::len).
    pub fn get(&self, address: usize) -> Result<u16, StoreError> {
        let registers = self.lock();
        registers
            .get(address)
            .copied()
            .ok_or(StoreError::OutOfRange {
                address,
                len: self.len,
            })
    }

    /// Read `count` consecutive registers starting at `address` under one lock.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::OutOfRange`] with the first address that does not
    /// exist if the range runs past the end of the store.
    pub fn read_range(&self, address: usize, count: usize) -> Result<Vec<u16>, StoreError> {
        let registers = self.lock();
        let end = self.checked_end(address, count)?;
        Ok(registers[address..end].to_vec())
    }

    /// Replace every register at once.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LengthMismatch`] if `values` does not hold exactly
    /// [`len`](Self::len) entries. The store is left untouched in that case.
    pub fn set_all(&self, values: &[u16]) -> Result<(), StoreError> {
        if values.len() != self.len {
            return Err(StoreError::LengthMismatch {
                expected: self.len,
                actual: values.len(),
            });
        }
        let mut registers = self.lock();
        registers.copy_from_slice(values);
        Ok(())
    }

    /// Overwrite consecutive registers starting at `address`.
    ///
    /// Used for client write requests. Nothing is written unless the whole
    /// range fits in the store.
    pub fn write_range(&self, address: usize, values: &[u16]) -> Result<(), StoreError> {
        let mut registers = self.lock();
        let end = self.checked_end(address, values.len())?;
        registers[address..end].copy_from_slice(values);
        debug!(
            "Wrote {} registers starting at address {}",
            values.len(),
            address
        );
        Ok(())
    }

    /// Copy of the whole register table.
    pub fn snapshot(&self) -> Vec<u16> {
        self.lock().clone()
    }

    fn checked_end(&self, address: usize, count: usize) -> Result<usize, StoreError> {
        match address.checked_add(count) {
            Some(end) if end <= self.len => Ok(end),
            _ => Err(StoreError::OutOfRange {
                address: address.max(self.len),
                len: self.len,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    #[test]
    fn get_returns_seeded_values() {
        let store = RegisterStore::new(vec![1000, 2200, 50]);
        assert_eq!(store.len(), 3);
        assert!(!store.is_empty());
        assert!(RegisterStore::new(Vec::new()).is_empty());
        assert_eq!(store.get(0), Ok(1000));
        assert_eq!(store.get(1), Ok(2200));
        assert_eq!(store.get(2), Ok(50));
    }

    #[test]
    fn get_out_of_range_fails() {
        let store = RegisterStore::new(vec![1, 2, 3]);
        assert_eq!(
            store.get(3),
            Err(StoreError::OutOfRange { address: 3, len: 3 })
        );
    }

    #[test]
    fn set_all_with_wrong_length_leaves_store_unchanged() {
        let store = RegisterStore::new(vec![1, 2, 3]);

        let err = store.set_all(&[9, 9]).unwrap_err();
        assert_eq!(
            err,
            StoreError::LengthMismatch {
                expected: 3,
                actual: 2
            }
        );
        assert!(store.set_all(&[9, 9, 9, 9]).is_err());
        assert_eq!(store.snapshot(), vec![1, 2, 3]);

        store.set_all(&[7, 8, 9]).unwrap();
        assert_eq!(store.snapshot(), vec![7, 8, 9]);
    }

    #[test]
    fn read_range_checks_bounds() {
        let store = RegisterStore::new((0..13).collect());
        assert_eq!(store.read_range(10, 3).unwrap(), vec![10, 11, 12]);
        assert_eq!(store.read_range(0, 0).unwrap(), Vec::<u16>::new());
        assert!(matches!(
            store.read_range(12, 2),
            Err(StoreError::OutOfRange { .. })
        ));
        assert!(store.read_range(usize::MAX, 2).is_err());
    }

    #[test]
    fn write_range_is_all_or_nothing() {
        let store = RegisterStore::new(vec![0; 4]);
        store.write_range(1, &[5, 6]).unwrap();
        assert_eq!(store.snapshot(), vec![0, 5, 6, 0]);

        assert!(store.write_range(3, &[1, 2]).is_err());
        assert_eq!(store.snapshot(), vec![0, 5, 6, 0]);
    }

    #[test]
    fn clones_share_registers() {
        let store = RegisterStore::new(vec![0; 2]);
        let handle = store.clone();
        handle.set_all(&[4, 2]).unwrap();
        assert_eq!(store.get(1), Ok(2));
    }

    #[test]
    fn concurrent_reads_never_observe_torn_snapshots() {
        const LEN: usize = 13;
        const WRITES: u16 = 20_000;

        let store = RegisterStore::new(vec![0; LEN]);
        let done = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let done = done.clone();
                thread::spawn(move || {
                    let mut reads = 0usize;
                    loop {
                        let values = store.read_range(0, LEN).unwrap();
                        let first = values[0];
                        assert!(
                            values.iter().all(|v| *v == first),
                            "torn read: {values:?}"
                        );
                        reads += 1;
                        if done.load(Ordering::Relaxed) {
                            break reads;
                        }
                    }
                })
            })
            .collect();

        for generation in 1..=WRITES {
            store.set_all(&[generation; LEN]).unwrap();
        }
        done.store(true, Ordering::Relaxed);

        for reader in readers {
            assert!(reader.join().unwrap() > 0);
        }
        assert_eq!(store.snapshot(), vec![WRITES; LEN]);
    }
}
