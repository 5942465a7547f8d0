//! Scalar nearest-neighbor encoder.
//!
//! This is the reference every other strategy must reproduce bit for bit.
//! The lane routine in `unseq` mirrors each arithmetic step below; change one
//! and the other has to change with it.

use crate::amplitude_table::AMPLITUDE_TABLE_SIZE;
use crate::convert::context::ConverterContext;
use crate::convert::phase;
use crate::sample::{AmpPhase, ComplexSample};

/// Index of the first entry `>= value` (`table.len()` if none).
///
/// Written as the classic count/step loop rather than `partition_point` so
/// its iteration structure matches the lane version exactly.
#[inline]
pub fn lower_bound(table: &[f32; AMPLITUDE_TABLE_SIZE], value: f32) -> usize {
    let mut first = 0usize;
    let mut count = table.len();
    while count > 0 {
        let step = count / 2;
        let it = first + step;
        if table[it] < value {
            first = it + 1;
            count -= step + 1;
        } else {
            count = step;
        }
    }
    first
}

/// Index of the table entry closest to `value`; ties go to the lower index.
/// Values outside the table clamp to 0 or 255.
#[inline]
pub fn nearest(table: &[f32; AMPLITUDE_TABLE_SIZE], value: f32) -> u8 {
    let it = lower_bound(table, value);
    if it == 0 {
        return 0;
    }
    let prev = it - 1;
    if it == AMPLITUDE_TABLE_SIZE {
        return prev as u8;
    }
    if value - table[prev] <= table[it] - value {
        prev as u8
    } else {
        it as u8
    }
}

/// Length of `v` measured along the unit direction `(dir_re, dir_im)`.
///
/// The decoder rebuilds magnitude along the quantized direction, so the
/// search compares against this dot product rather than `|v|`.
#[inline]
pub fn projection(dir_re: f32, dir_im: f32, v: ComplexSample) -> f32 {
    (dir_re * v.re) + (dir_im * v.im)
}

#[inline]
pub fn encode(sample: ComplexSample, context: &ConverterContext) -> AmpPhase {
    let phase = phase::get_phase(sample, context.phase_delta());
    let (dir_re, dir_im) = context.directions().get(phase);
    let projected = projection(dir_re, dir_im, sample);
    let amplitude = nearest(context.magnitudes().values(), projected);
    AmpPhase { amplitude, phase }
}

/// Sequential batch encode. `out` must be as long as `samples`.
pub fn encode_into(context: &ConverterContext, samples: &[ComplexSample], out: &mut [AmpPhase]) {
    for (s, o) in samples.iter().zip(out.iter_mut()) {
        *o = encode(*s, context);
    }
}
