use num_complex::Complex32;

/// A complex SAR pixel: single-precision (real, imaginary).
pub type ComplexSample = Complex32;

/// The 8-bit (amplitude, phase) pixel.
///
/// # Layout
/// `#[repr(C)]` with `amplitude` first, so a slice of pixels has the same
/// interleaved byte layout the writer layer serializes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AmpPhase {
    pub amplitude: u8,
    pub phase: u8,
}

impl AmpPhase {
    pub const fn new(amplitude: u8, phase: u8) -> Self {
        Self { amplitude, phase }
    }
}

impl From<(u8, u8)> for AmpPhase {
    fn from((amplitude, phase): (u8, u8)) -> Self {
        Self { amplitude, phase }
    }
}

impl From<AmpPhase> for (u8, u8) {
    fn from(p: AmpPhase) -> Self {
        (p.amplitude, p.phase)
    }
}

/// Flattens pixels into interleaved `[amplitude, phase, amplitude, phase, ...]` bytes.
pub fn pixels_to_bytes(pixels: &[AmpPhase]) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixels.len() * 2);
    for p in pixels {
        out.push(p.amplitude);
        out.push(p.phase);
    }
    out
}

/// Reads interleaved byte pairs back into pixels. A trailing odd byte is ignored.
pub fn bytes_to_pixels(bytes: &[u8]) -> Vec<AmpPhase> {
    bytes
        .chunks_exact(2)
        .map(|pair| AmpPhase::new(pair[0], pair[1]))
        .collect()
}
