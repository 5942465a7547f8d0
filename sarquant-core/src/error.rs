use thiserror::Error;

use crate::sample::AmpPhase;

/// Failures surfaced by context construction and batch dispatch.
///
/// There is no per-sample error: every finite input maps to a grid point.
/// Errors are `Clone` so a failed build can be cached and replayed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QuantError {
    #[error("magnitudes must be sorted: entry {index} ({current}) is below its predecessor ({previous})")]
    UnsortedMagnitudes {
        index: usize,
        previous: f32,
        current: f32,
    },
    #[error("amplitude table must have {expected} entries, got {actual}")]
    InvalidTableLength { expected: usize, actual: usize },
    #[error("amplitude table entry {index} is not finite")]
    NonFiniteAmplitude { index: usize },
    #[error("derived phase spacing {delta} is not a positive finite angle")]
    DegeneratePhaseSpacing { delta: f32 },
    #[error("batch length mismatch: {inputs} inputs but {outputs} output slots")]
    LengthMismatch { inputs: usize, outputs: usize },
    #[error("a parallel worker panicked")]
    WorkerPanicked,
    #[error("{strategy} result at {index} is {actual:?}, sequential reference is {expected:?}")]
    ConsistencyFailure {
        index: usize,
        strategy: &'static str,
        expected: AmpPhase,
        actual: AmpPhase,
    },
}

impl QuantError {
    /// True for failures caused by the calibration input (the ConfigurationError family).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            QuantError::UnsortedMagnitudes { .. }
                | QuantError::InvalidTableLength { .. }
                | QuantError::NonFiniteAmplitude { .. }
                | QuantError::DegeneratePhaseSpacing { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, QuantError>;
