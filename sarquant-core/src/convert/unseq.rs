//! Data-parallel encoding: one generic routine, instantiated per lane backend.
//!
//! Samples are processed in blocks of `L::WIDTH`. Within a block all lanes run
//! the lower-bound loop in lock-step until every lane's search range is
//! empty; lanes that finish early keep iterating as no-ops. The leftover
//! tail that does not fill a block goes through the scalar encoder.

use log::debug;

use crate::amplitude_table::AMPLITUDE_TABLE_SIZE;
use crate::convert::context::ConverterContext;
use crate::convert::lanes::{ArrayLanes, Lanes, MAX_LANES};
use crate::convert::{nearest, phase};
use crate::sample::{AmpPhase, ComplexSample};

/// Lane instantiation used by the data-parallel strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LaneWidth {
    X4,
    X8,
    X16,
    /// The widest hardware backend detected at runtime, else `X8`.
    #[default]
    Native,
}

impl LaneWidth {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "4" | "x4" => Some(LaneWidth::X4),
            "8" | "x8" => Some(LaneWidth::X8),
            "16" | "x16" => Some(LaneWidth::X16),
            "native" => Some(LaneWidth::Native),
            _ => None,
        }
    }
}

/// Lock-step lower bound over `table` for every lane of `value`.
#[inline(always)]
fn lower_bound<L: Lanes>(lanes: L, table: &[f32; AMPLITUDE_TABLE_SIZE], value: L::F) -> L::I {
    let zero = lanes.splat_i(0);
    let one = lanes.splat_i(1);
    let mut first = zero;
    let mut count = lanes.splat_i(AMPLITUDE_TABLE_SIZE as i32);

    while lanes.any(lanes.gt_i(count, zero)) {
        let step = lanes.half_i(count);
        let it = lanes.add_i(first, step);
        let next = lanes.add_i(it, one);
        let advance = lanes.sub_i(count, lanes.add_i(step, one));

        // Finished lanes have count == 0, so step == 0 and `it` is their
        // answer: either an entry >= value or 256 (NaN). The test is false
        // and they stay put.
        let c = lanes.gather(table, it);
        let below = lanes.lt_f(c, value);
        first = lanes.select_i(below, next, first);
        count = lanes.select_i(below, advance, step);
    }
    first
}

/// Lane-wise `nearest::nearest`.
#[inline(always)]
fn nearest_lanes<L: Lanes>(lanes: L, table: &[f32; AMPLITUDE_TABLE_SIZE], value: L::F) -> L::I {
    let zero = lanes.splat_i(0);
    let end = lanes.splat_i(AMPLITUDE_TABLE_SIZE as i32);

    let it = lower_bound(lanes, table, value);
    let prev = lanes.sub_i(it, lanes.splat_i(1));

    // Out-of-range reads (prev == -1, it == 256) are NaN; the outer selects
    // override those lanes.
    let below = lanes.sub_f(value, lanes.gather(table, prev));
    let above = lanes.sub_f(lanes.gather(table, it), value);

    let pick = lanes.select_i(lanes.le_f(below, above), prev, it);
    let pick = lanes.select_i(lanes.eq_i(it, end), prev, pick);
    lanes.select_i(lanes.eq_i(it, zero), zero, pick)
}

/// Encodes exactly `L::WIDTH` samples.
#[inline(always)]
fn encode_block<L: Lanes>(lanes: L, context: &ConverterContext, src: &[ComplexSample], dst: &mut [AmpPhase]) {
    let w = L::WIDTH;
    let mut re = [0.0f32; MAX_LANES];
    let mut im = [0.0f32; MAX_LANES];
    let mut phases = [0i32; MAX_LANES];

    // The phase bucket needs a double-precision atan2; each lane evaluates
    // the scalar routine so the bucket is the scalar bucket.
    for (i, s) in src.iter().enumerate() {
        re[i] = s.re;
        im[i] = s.im;
        phases[i] = phase::get_phase(*s, context.phase_delta()) as i32;
    }

    let v_re = lanes.load_f(&re[..w]);
    let v_im = lanes.load_f(&im[..w]);
    let v_phase = lanes.load_i(&phases[..w]);

    let directions = context.directions();
    let dir_re = lanes.gather(directions.re(), v_phase);
    let dir_im = lanes.gather(directions.im(), v_phase);

    // Same operation order as `nearest::projection`.
    let projection = lanes.add_f(lanes.mul_f(dir_re, v_re), lanes.mul_f(dir_im, v_im));

    let amplitude = nearest_lanes(lanes, context.magnitudes().values(), projection);
    let mut amplitudes = [0i32; MAX_LANES];
    lanes.store_i(amplitude, &mut amplitudes[..w]);

    for i in 0..w {
        dst[i] = AmpPhase {
            amplitude: amplitudes[i] as u8,
            phase: phases[i] as u8,
        };
    }
}

/// Encodes `samples` into `out` using backend `lanes`. Lengths must match.
///
/// # Panics
/// If `L::WIDTH` is zero or wider than `MAX_LANES`.
#[inline(always)]
pub(crate) fn encode_lanes<L: Lanes>(
    lanes: L,
    context: &ConverterContext,
    samples: &[ComplexSample],
    out: &mut [AmpPhase],
) {
    let w = L::WIDTH;
    assert!(w > 0 && w <= MAX_LANES, "lane width {} outside 1..={}", w, MAX_LANES);
    debug_assert_eq!(samples.len(), out.len());

    let full = samples.len() - samples.len() % w;
    let (head, tail) = samples.split_at(full);
    let (head_out, tail_out) = out.split_at_mut(full);

    for (src, dst) in head.chunks_exact(w).zip(head_out.chunks_exact_mut(w)) {
        encode_block(lanes, context, src, dst);
    }

    nearest::encode_into(context, tail, tail_out);
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn encode_avx2(
    lanes: crate::convert::lanes::Avx2Lanes,
    context: &ConverterContext,
    samples: &[ComplexSample],
    out: &mut [AmpPhase],
) {
    encode_lanes(lanes, context, samples, out)
}

fn encode_native(context: &ConverterContext, samples: &[ComplexSample], out: &mut [AmpPhase]) -> &'static str {
    #[cfg(target_arch = "x86_64")]
    {
        if let Some(lanes) = crate::convert::lanes::Avx2Lanes::detect() {
            // SAFETY: `lanes` proves AVX2 is available on this CPU.
            unsafe { encode_avx2(lanes, context, samples, out) };
            return lanes.name();
        }
    }

    let lanes = ArrayLanes::<8>;
    encode_lanes(lanes, context, samples, out);
    lanes.name()
}

/// The dispatcher. Returns the name of the backend that ran.
pub fn encode(width: LaneWidth, context: &ConverterContext, samples: &[ComplexSample], out: &mut [AmpPhase]) -> &'static str {
    let backend = match width {
        LaneWidth::X4 => {
            encode_lanes(ArrayLanes::<4>, context, samples, out);
            ArrayLanes::<4>.name()
        }
        LaneWidth::X8 => {
            encode_lanes(ArrayLanes::<8>, context, samples, out);
            ArrayLanes::<8>.name()
        }
        LaneWidth::X16 => {
            encode_lanes(ArrayLanes::<16>, context, samples, out);
            ArrayLanes::<16>.name()
        }
        LaneWidth::Native => encode_native(context, samples, out),
    };
    debug!("Data-parallel encode of {} samples on {}", samples.len(), backend);
    backend
}
