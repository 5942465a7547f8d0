use std::f64::consts::PI;

use crate::amplitude_table::AMPLITUDE_TABLE_SIZE;
use crate::convert::context::ConverterContext;
use crate::sample::{AmpPhase, ComplexSample};

const PHASE_STEPS: f64 = 256.0;

/// Places `magnitude` on the ray of phase bucket `phase`.
///
/// `S = A * (cos 2piP, sin 2piP)` with `P = phase / 256`, evaluated in double
/// precision and narrowed per component. Context construction derives both
/// its tables from this function, so it is the single definition of the grid.
#[inline]
pub fn polar(magnitude: f64, phase: u8) -> ComplexSample {
    let p = phase as f64 / PHASE_STEPS;
    let angle = 2.0 * PI * p;
    let (sin, cos) = angle.sin_cos();
    ComplexSample::new((magnitude * cos) as f32, (magnitude * sin) as f32)
}

/// Reconstructs the complex sample for one (amplitude, phase) pixel.
#[inline]
pub fn decode(pixel: AmpPhase, context: &ConverterContext) -> ComplexSample {
    polar(context.amplitude(pixel.amplitude), pixel.phase)
}

/// Every decodable value, precomputed: 256 amplitudes x 256 phases.
///
/// Row-major by amplitude. Entries are produced by `decode`, so a lookup is
/// bit-identical to the direct computation.
pub struct DecodeTable {
    values: Vec<ComplexSample>,
}

impl DecodeTable {
    pub fn build(context: &ConverterContext) -> Self {
        let mut values = Vec::with_capacity(AMPLITUDE_TABLE_SIZE * AMPLITUDE_TABLE_SIZE);
        for amplitude in 0..=u8::MAX {
            let magnitude = context.amplitude(amplitude);
            for phase in 0..=u8::MAX {
                values.push(polar(magnitude, phase));
            }
        }
        Self { values }
    }

    #[inline]
    pub fn get(&self, pixel: AmpPhase) -> ComplexSample {
        self.values[(pixel.amplitude as usize) * AMPLITUDE_TABLE_SIZE + pixel.phase as usize]
    }

    /// Sequential table decode of a slice. `out` must be as long as `pixels`.
    pub fn decode_into(&self, pixels: &[AmpPhase], out: &mut [ComplexSample]) {
        for (p, o) in pixels.iter().zip(out.iter_mut()) {
            *o = self.get(*p);
        }
    }
}
