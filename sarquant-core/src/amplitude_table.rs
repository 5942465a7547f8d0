use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{QuantError, Result};

/// Number of entries in an amplitude calibration table (one per `u8` index).
pub const AMPLITUDE_TABLE_SIZE: usize = 256;

static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one `AmplitudeTable` instance.
///
/// Ids are never reused, so a cache keyed by `TableId` cannot confuse a
/// dropped table with a later one allocated at the same address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId(u64);

impl TableId {
    fn next() -> Self {
        TableId(NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Caller-owned calibration curve: amplitude index -> physical magnitude.
///
/// Immutable once built. Cloning yields a new instance with a new identity,
/// which therefore gets its own cached context.
#[derive(Debug)]
pub struct AmplitudeTable {
    id: TableId,
    values: Box<[f64; AMPLITUDE_TABLE_SIZE]>,
}

impl AmplitudeTable {
    pub fn new(values: [f64; AMPLITUDE_TABLE_SIZE]) -> Self {
        Self {
            id: TableId::next(),
            values: Box::new(values),
        }
    }

    /// Builds a table from a slice that must hold exactly 256 values.
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        let array: [f64; AMPLITUDE_TABLE_SIZE] =
            values.try_into().map_err(|_| QuantError::InvalidTableLength {
                expected: AMPLITUDE_TABLE_SIZE,
                actual: values.len(),
            })?;
        Ok(Self::new(array))
    }

    /// Builds a table by evaluating `f` at every amplitude index.
    pub fn from_fn(mut f: impl FnMut(u8) -> f64) -> Self {
        let mut values = [0.0; AMPLITUDE_TABLE_SIZE];
        for (i, v) in values.iter_mut().enumerate() {
            *v = f(i as u8);
        }
        Self::new(values)
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    #[inline]
    pub fn get(&self, amplitude: u8) -> f64 {
        self.values[amplitude as usize]
    }

    pub fn values(&self) -> &[f64; AMPLITUDE_TABLE_SIZE] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.values.iter().copied()
    }
}

impl Clone for AmplitudeTable {
    fn clone(&self) -> Self {
        Self::new(*self.values)
    }
}

/// Value equality; identity is deliberately not compared.
impl PartialEq for AmplitudeTable {
    fn eq(&self, other: &Self) -> bool {
        self.values[..] == other.values[..]
    }
}
