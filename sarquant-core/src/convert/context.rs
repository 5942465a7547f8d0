use std::sync::OnceLock;

use log::{debug, info};

use crate::amplitude_table::{AmplitudeTable, TableId, AMPLITUDE_TABLE_SIZE};
use crate::convert::decode::{self, DecodeTable};
use crate::convert::{nearest, phase};
use crate::error::{QuantError, Result};
use crate::sample::{AmpPhase, ComplexSample};

/// Which amplitude scheme a context was built for.
#[derive(Debug, Clone, PartialEq)]
pub enum Calibration {
    /// No table: the amplitude index is the magnitude.
    Default,
    /// A caller-supplied table, copied at build time.
    Table {
        id: TableId,
        values: Box<[f64; AMPLITUDE_TABLE_SIZE]>,
    },
}

impl Calibration {
    pub fn from_table(table: &AmplitudeTable) -> Self {
        Calibration::Table {
            id: table.id(),
            values: Box::new(*table.values()),
        }
    }

    #[inline]
    pub fn amplitude(&self, index: u8) -> f64 {
        match self {
            Calibration::Default => index as f64,
            Calibration::Table { values, .. } => values[index as usize],
        }
    }

    pub fn table_id(&self) -> Option<TableId> {
        match self {
            Calibration::Default => None,
            Calibration::Table { id, .. } => Some(*id),
        }
    }
}

/// Reference magnitude of every amplitude index, non-decreasing.
#[derive(Debug, Clone, PartialEq)]
pub struct MagnitudeTable {
    values: [f32; AMPLITUDE_TABLE_SIZE],
}

impl MagnitudeTable {
    /// Decodes `(i, phase 0)` for every index and keeps the modulus.
    ///
    /// # Errors
    /// * `NonFiniteAmplitude` if a calibration entry is NaN or infinite, or
    ///   too large for its `f32` magnitude.
    /// * `UnsortedMagnitudes` if the derived sequence ever decreases; the
    ///   nearest-neighbor search depends on ordering and never re-checks it.
    pub fn build(calibration: &Calibration) -> Result<Self> {
        let mut values = [0.0f32; AMPLITUDE_TABLE_SIZE];
        for (i, slot) in values.iter_mut().enumerate() {
            let amplitude = calibration.amplitude(i as u8);
            if !amplitude.is_finite() {
                return Err(QuantError::NonFiniteAmplitude { index: i });
            }
            *slot = decode::polar(amplitude, 0).norm();
            if !slot.is_finite() {
                return Err(QuantError::NonFiniteAmplitude { index: i });
            }
        }

        for i in 1..AMPLITUDE_TABLE_SIZE {
            if values[i] < values[i - 1] {
                return Err(QuantError::UnsortedMagnitudes {
                    index: i,
                    previous: values[i - 1],
                    current: values[i],
                });
            }
        }

        Ok(Self { values })
    }

    #[inline]
    pub fn values(&self) -> &[f32; AMPLITUDE_TABLE_SIZE] {
        &self.values
    }

    #[inline]
    pub fn get(&self, index: u8) -> f32 {
        self.values[index as usize]
    }
}

/// Unit vector of every phase bucket, stored as parallel real/imag arrays
/// so lane backends can gather each component directly.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseDirectionTable {
    re: [f32; AMPLITUDE_TABLE_SIZE],
    im: [f32; AMPLITUDE_TABLE_SIZE],
}

impl PhaseDirectionTable {
    pub fn new(phase_delta: f32) -> Self {
        let mut re = [0.0f32; AMPLITUDE_TABLE_SIZE];
        let mut im = [0.0f32; AMPLITUDE_TABLE_SIZE];
        for i in 0..AMPLITUDE_TABLE_SIZE {
            let angle = i as f32 * phase_delta;
            let (sin, cos) = angle.sin_cos();
            re[i] = cos;
            im[i] = sin;
        }
        Self { re, im }
    }

    #[inline]
    pub fn get(&self, phase: u8) -> (f32, f32) {
        (self.re[phase as usize], self.im[phase as usize])
    }

    pub fn re(&self) -> &[f32; AMPLITUDE_TABLE_SIZE] {
        &self.re
    }

    pub fn im(&self) -> &[f32; AMPLITUDE_TABLE_SIZE] {
        &self.im
    }
}

/// Angle between the decodes of (1, 0) and (1, 1) under `calibration`.
///
/// Amplitude index 1 is resolved through the calibration, so the f32
/// narrowing in `polar` (and with it the spacing) follows the active table.
///
/// # Errors
/// `DegeneratePhaseSpacing` if the angle is not positive and finite, e.g. a
/// table whose entry 1 is zero.
fn derive_phase_delta(calibration: &Calibration) -> Result<f32> {
    let magnitude = calibration.amplitude(1);
    let p0 = phase::angle(decode::polar(magnitude, 0));
    let p1 = phase::angle(decode::polar(magnitude, 1));
    let delta = (p1 - p0) as f32;
    if !(delta.is_finite() && delta > 0.0) {
        return Err(QuantError::DegeneratePhaseSpacing { delta });
    }
    Ok(delta)
}

/// Everything the encoder and decoder need for one calibration identity.
///
/// Immutable after `build`; share it behind an `Arc`. The 256x256 decode
/// table is built on first use.
pub struct ConverterContext {
    calibration: Calibration,
    magnitudes: MagnitudeTable,
    directions: PhaseDirectionTable,
    phase_delta: f32,
    decode_table: OnceLock<DecodeTable>,
}

impl ConverterContext {
    pub fn build(calibration: Calibration) -> Result<Self> {
        let magnitudes = MagnitudeTable::build(&calibration)?;
        let phase_delta = derive_phase_delta(&calibration)?;
        let directions = PhaseDirectionTable::new(phase_delta);

        match calibration.table_id() {
            Some(id) => info!(
                "Converter context built for amplitude table #{} (phase_delta: {:.9}, magnitude range: {}..{})",
                id.get(), phase_delta, magnitudes.get(0), magnitudes.get(u8::MAX)
            ),
            None => info!("Converter context built for default scheme (phase_delta: {:.9})", phase_delta),
        }

        Ok(Self {
            calibration,
            magnitudes,
            directions,
            phase_delta,
            decode_table: OnceLock::new(),
        })
    }

    /// An uncached default-scheme context. Most callers want `cache::default_context()`.
    pub fn default_scheme() -> Result<Self> {
        Self::build(Calibration::Default)
    }

    /// An uncached context for `table`. Most callers want `ContextCache::for_table`.
    pub fn for_table(table: &AmplitudeTable) -> Result<Self> {
        Self::build(Calibration::from_table(table))
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    pub fn magnitudes(&self) -> &MagnitudeTable {
        &self.magnitudes
    }

    pub fn directions(&self) -> &PhaseDirectionTable {
        &self.directions
    }

    #[inline]
    pub fn phase_delta(&self) -> f32 {
        self.phase_delta
    }

    #[inline]
    pub fn amplitude(&self, index: u8) -> f64 {
        self.calibration.amplitude(index)
    }

    #[inline]
    pub fn encode(&self, sample: ComplexSample) -> AmpPhase {
        nearest::encode(sample, self)
    }

    #[inline]
    pub fn decode(&self, pixel: AmpPhase) -> ComplexSample {
        decode::decode(pixel, self)
    }

    pub fn decode_table(&self) -> &DecodeTable {
        self.decode_table.get_or_init(|| {
            debug!("Building 256x256 decode table");
            DecodeTable::build(self)
        })
    }
}

impl std::fmt::Debug for ConverterContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConverterContext")
            .field("table", &self.calibration.table_id())
            .field("phase_delta", &self.phase_delta)
            .field("decode_table_built", &self.decode_table.get().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_default_magnitudes_are_indices() {
        let ctx = ConverterContext::default_scheme().unwrap();
        for i in 0..=u8::MAX {
            assert_eq!(ctx.magnitudes().get(i), i as f32);
        }
    }

    #[test]
    fn test_first_magnitude_is_minimum() {
        let ctx = ConverterContext::default_scheme().unwrap();
        let first = ctx.magnitudes().get(0);
        assert_eq!(first, ctx.decode(AmpPhase::new(0, 0)).norm());
        assert!(ctx.magnitudes().values().iter().all(|&m| first <= m));
    }

    #[test]
    fn test_phase_delta_is_one_bucket() {
        let ctx = ConverterContext::default_scheme().unwrap();
        let expected = (2.0 * PI / 256.0) as f32;
        assert!((ctx.phase_delta() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_directions_are_unit_vectors() {
        let ctx = ConverterContext::default_scheme().unwrap();
        for p in 0..=u8::MAX {
            let (re, im) = ctx.directions().get(p);
            assert!(((re * re + im * im) - 1.0).abs() < 1e-5, "phase {}", p);
        }
        assert_eq!(ctx.directions().get(0), (1.0, 0.0));
    }

    #[test]
    fn test_unsorted_table_is_rejected() {
        let table = AmplitudeTable::from_fn(|i| if i == 100 { 1.0 } else { i as f64 });
        let err = ConverterContext::for_table(&table).unwrap_err();
        match err {
            QuantError::UnsortedMagnitudes { index, previous, current } => {
                assert_eq!(index, 100);
                assert_eq!(previous, 99.0);
                assert_eq!(current, 1.0);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_table_is_rejected() {
        let table = AmplitudeTable::from_fn(|i| if i == 7 { f64::NAN } else { i as f64 });
        let err = ConverterContext::for_table(&table).unwrap_err();
        assert_eq!(err, QuantError::NonFiniteAmplitude { index: 7 });
        assert!(err.is_configuration());
    }

    #[test]
    fn test_flat_table_is_accepted() {
        // Non-decreasing, not strictly increasing.
        let table = AmplitudeTable::from_fn(|i| (i / 16) as f64 + 1.0);
        let ctx = ConverterContext::for_table(&table).unwrap();
        assert_eq!(ctx.magnitudes().get(15), 1.0);
        assert_eq!(ctx.magnitudes().get(255), 16.0);
        assert_eq!(ctx.calibration().table_id(), Some(table.id()));
    }

    #[test]
    fn test_phase_delta_follows_calibration() {
        let entry = 1.0237;
        let table = AmplitudeTable::from_fn(|i| if i == 0 { 0.0 } else { entry + (i - 1) as f64 });
        let ctx = ConverterContext::for_table(&table).unwrap();

        let p0 = phase::angle(decode::polar(entry, 0));
        let p1 = phase::angle(decode::polar(entry, 1));
        assert_eq!(ctx.phase_delta(), (p1 - p0) as f32);
        // Narrowing at this magnitude lands one ulp away from the default grid.
        assert_ne!(ctx.phase_delta(), ConverterContext::default_scheme().unwrap().phase_delta());

        let (re, im) = ctx.directions().get(1);
        assert_eq!((re, im), (ctx.phase_delta().cos(), ctx.phase_delta().sin()));
    }

    #[test]
    fn test_zero_entry_one_has_no_phase_spacing() {
        let table = AmplitudeTable::from_fn(|i| (i / 2) as f64);
        let err = ConverterContext::for_table(&table).unwrap_err();
        assert!(matches!(err, QuantError::DegeneratePhaseSpacing { .. }));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_amplitude_beyond_f32_range_is_rejected() {
        let table = AmplitudeTable::from_fn(|i| if i == 200 { 1.0e39 } else { i as f64 });
        let err = ConverterContext::for_table(&table).unwrap_err();
        assert_eq!(err, QuantError::NonFiniteAmplitude { index: 200 });
    }
}
