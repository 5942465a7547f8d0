//! Phase bucket quantization.
//!
//! The 256 buckets are equally spaced, so the bucket is found arithmetically
//! rather than by search.

use std::f64::consts::PI;

use crate::sample::ComplexSample;

/// Angle of `v` normalized to `[0, 2pi)`, in double precision.
#[inline]
pub fn angle(v: ComplexSample) -> f64 {
    let phase = (v.im as f64).atan2(v.re as f64);
    if phase < 0.0 {
        phase + 2.0 * PI
    } else {
        phase
    }
}

/// Maps a sample to its phase bucket.
///
/// `256 * phase_delta` is only approximately `2pi`, so the rounded bucket can
/// be 256 for angles just below `2pi`. Narrowing through `i32` wraps that to
/// bucket 0, which is where the decoder puts the angle as well. (A direct
/// float-to-`u8` cast would saturate to 255 instead.)
///
/// Non-finite input is a caller error and is not checked here.
#[inline]
pub fn get_phase(v: ComplexSample, phase_delta: f32) -> u8 {
    let bucket = (angle(v) / phase_delta as f64).round() as i32;
    bucket as u8
}
