//! Batch encode/decode over sample buffers.
//!
//! Every strategy produces byte-identical output for identical input; they
//! differ only in how the work is scheduled. `results[i]` always corresponds
//! to `samples[i]`.

use std::fmt;
use std::str::FromStr;

use crossbeam_utils::thread;
use log::{debug, error};

use crate::config::BatchConfig;
use crate::convert::context::ConverterContext;
use crate::convert::{nearest, unseq};
use crate::error::{QuantError, Result};
use crate::sample::{AmpPhase, ComplexSample};

/// How a batch call is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strategy {
    /// Pick by input size (see `BatchConfig`).
    #[default]
    Auto,
    /// Element by element on the calling thread.
    Sequential,
    /// Contiguous chunks on scoped worker threads, joined before return.
    Parallel,
    /// Fixed-width lane blocks on the calling thread; no threads.
    DataParallel,
}

impl Strategy {
    pub fn name(self) -> &'static str {
        match self {
            Strategy::Auto => "auto",
            Strategy::Sequential => "seq",
            Strategy::Parallel => "par",
            Strategy::DataParallel => "unseq",
        }
    }

    /// The concrete strategy an encode of `len` samples runs with.
    ///
    /// Large inputs go to threads, anything that fills at least one lane
    /// block goes to lanes, the rest stays sequential.
    pub fn resolve_encode(self, len: usize, config: &BatchConfig) -> Strategy {
        match self {
            Strategy::Auto => {
                if len >= config.parallel_threshold && config.worker_threads() > 1 {
                    Strategy::Parallel
                } else if len >= 16 {
                    Strategy::DataParallel
                } else {
                    Strategy::Sequential
                }
            }
            other => other,
        }
    }

    /// Decoding is a table lookup, so only the thread split is worth choosing.
    pub fn resolve_decode(self, len: usize, config: &BatchConfig) -> Strategy {
        match self {
            Strategy::Auto if len >= config.parallel_threshold && config.worker_threads() > 1 => {
                Strategy::Parallel
            }
            Strategy::Parallel => Strategy::Parallel,
            _ => Strategy::Sequential,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" | "default" => Ok(Strategy::Auto),
            "seq" | "sequential" => Ok(Strategy::Sequential),
            "par" | "parallel" => Ok(Strategy::Parallel),
            "unseq" | "simd" | "data-parallel" => Ok(Strategy::DataParallel),
            other => Err(format!("unknown strategy '{}'", other)),
        }
    }
}

/// Length of each worker's slice: an even split over `threads`, but never
/// shorter than `min_chunk`.
fn chunk_len(len: usize, threads: usize, min_chunk: usize) -> usize {
    let even = len.div_ceil(threads.max(1));
    even.max(min_chunk).max(1)
}

/// Splits `inputs`/`outputs` into matching contiguous chunks and runs `work`
/// on each. A single chunk runs on the calling thread.
fn run_partitioned<T, U, F>(inputs: &[T], outputs: &mut [U], config: &BatchConfig, work: F) -> Result<()>
where
    T: Sync,
    U: Send,
    F: Fn(&[T], &mut [U]) + Sync,
{
    let chunk = chunk_len(inputs.len(), config.worker_threads(), config.min_chunk);
    if chunk >= inputs.len() {
        work(inputs, outputs);
        return Ok(());
    }

    debug!(
        "Parallel batch: {} items in {} chunks of {}",
        inputs.len(),
        inputs.len().div_ceil(chunk),
        chunk
    );

    let work = &work;
    thread::scope(|scope| {
        for (src, dst) in inputs.chunks(chunk).zip(outputs.chunks_mut(chunk)) {
            scope.spawn(move |_| work(src, dst));
        }
    })
    .map_err(|_| {
        error!("Parallel batch worker panicked");
        QuantError::WorkerPanicked
    })
}

fn check_lengths(inputs: usize, outputs: usize) -> Result<()> {
    if inputs != outputs {
        return Err(QuantError::LengthMismatch { inputs, outputs });
    }
    Ok(())
}

/// Compares `actual` against the sequential reference.
fn cross_check(
    context: &ConverterContext,
    samples: &[ComplexSample],
    actual: &[AmpPhase],
    strategy: Strategy,
) -> Result<()> {
    for (index, (s, a)) in samples.iter().zip(actual).enumerate() {
        let expected = nearest::encode(*s, context);
        if expected != *a {
            error!(
                "Consistency failure: {} produced {:?} for sample {} ({}), sequential gives {:?}",
                strategy, a, index, s, expected
            );
            return Err(QuantError::ConsistencyFailure {
                index,
                strategy: strategy.name(),
                expected,
                actual: *a,
            });
        }
    }
    Ok(())
}

/// Encodes `samples` into `results`.
///
/// # Errors
/// * `LengthMismatch` if the slices differ in length (nothing is written).
/// * `WorkerPanicked` if a parallel worker panicked.
/// * `ConsistencyFailure` if `config.verify` is set and an accelerated
///   strategy disagreed with the sequential encoder.
pub fn encode_batch(
    samples: &[ComplexSample],
    results: &mut [AmpPhase],
    context: &ConverterContext,
    config: &BatchConfig,
) -> Result<()> {
    check_lengths(samples.len(), results.len())?;

    let strategy = config.strategy.resolve_encode(samples.len(), config);
    debug!("Encoding {} samples with strategy {}", samples.len(), strategy);

    match strategy {
        Strategy::Sequential | Strategy::Auto => nearest::encode_into(context, samples, results),
        Strategy::Parallel => run_partitioned(samples, results, config, |src, dst| {
            nearest::encode_into(context, src, dst)
        })?,
        Strategy::DataParallel => {
            unseq::encode(config.lane_width, context, samples, results);
        }
    }

    if config.verify && strategy != Strategy::Sequential {
        cross_check(context, samples, results, strategy)?;
    }
    Ok(())
}

/// Decodes `pixels` into `results` through the context's lookup table.
///
/// # Errors
/// `LengthMismatch` or `WorkerPanicked`, as for `encode_batch`.
pub fn decode_batch(
    pixels: &[AmpPhase],
    results: &mut [ComplexSample],
    context: &ConverterContext,
    config: &BatchConfig,
) -> Result<()> {
    check_lengths(pixels.len(), results.len())?;

    let strategy = config.strategy.resolve_decode(pixels.len(), config);
    debug!("Decoding {} pixels with strategy {}", pixels.len(), strategy);

    let table = context.decode_table();
    match strategy {
        Strategy::Parallel => run_partitioned(pixels, results, config, |src, dst| table.decode_into(src, dst)),
        _ => {
            table.decode_into(pixels, results);
            Ok(())
        }
    }
}

/// Allocating form of `encode_batch`.
pub fn encode_vec(samples: &[ComplexSample], context: &ConverterContext, config: &BatchConfig) -> Result<Vec<AmpPhase>> {
    let mut results = vec![AmpPhase::default(); samples.len()];
    encode_batch(samples, &mut results, context, config)?;
    Ok(results)
}

/// Allocating form of `decode_batch`.
pub fn decode_vec(pixels: &[AmpPhase], context: &ConverterContext, config: &BatchConfig) -> Result<Vec<ComplexSample>> {
    let mut results = vec![ComplexSample::default(); pixels.len()];
    decode_batch(pixels, &mut results, context, config)?;
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convert::{default_context, LaneWidth};

    fn samples(n: usize) -> Vec<ComplexSample> {
        (0..n)
            .map(|i| {
                let f = i as f32 * 0.37;
                ComplexSample::new(f * (i as f32).cos(), -f * (i as f32 * 0.5).sin())
            })
            .collect()
    }

    #[test]
    fn test_chunk_len() {
        assert_eq!(chunk_len(100, 4, 1), 25);
        assert_eq!(chunk_len(100, 4, 40), 40);
        assert_eq!(chunk_len(101, 4, 1), 26);
        assert_eq!(chunk_len(0, 4, 0), 1);
        assert_eq!(chunk_len(5, 0, 0), 5);
    }

    #[test]
    fn test_auto_resolution() {
        let config = BatchConfig::default().with_parallel_threshold(1_000).with_max_threads(4);
        let auto = Strategy::Auto;
        assert_eq!(auto.resolve_encode(3, &config), Strategy::Sequential);
        assert_eq!(auto.resolve_encode(500, &config), Strategy::DataParallel);
        if config.worker_threads() > 1 {
            assert_eq!(auto.resolve_encode(1_000, &config), Strategy::Parallel);
            assert_eq!(auto.resolve_decode(1_000, &config), Strategy::Parallel);
        }
        assert_eq!(auto.resolve_decode(500, &config), Strategy::Sequential);
        assert_eq!(Strategy::DataParallel.resolve_decode(10, &config), Strategy::Sequential);
        assert_eq!(Strategy::Sequential.resolve_encode(1 << 20, &config), Strategy::Sequential);
    }

    #[test]
    fn test_strategy_parse_and_display() {
        for s in [Strategy::Auto, Strategy::Sequential, Strategy::Parallel, Strategy::DataParallel] {
            assert_eq!(s.to_string().parse::<Strategy>(), Ok(s));
        }
        assert!("fast".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_length_mismatch() {
        let ctx = default_context().unwrap();
        let mut out = vec![AmpPhase::default(); 2];
        let err = encode_batch(&samples(3), &mut out, &ctx, &BatchConfig::default()).unwrap_err();
        assert_eq!(err, QuantError::LengthMismatch { inputs: 3, outputs: 2 });

        let mut z = vec![ComplexSample::default(); 1];
        let err = decode_batch(&[AmpPhase::default(); 2], &mut z, &ctx, &BatchConfig::default()).unwrap_err();
        assert_eq!(err, QuantError::LengthMismatch { inputs: 2, outputs: 1 });
    }

    #[test]
    fn test_parallel_uses_small_chunks() {
        let ctx = default_context().unwrap();
        let input = samples(1_000);
        let reference = encode_vec(&input, &ctx, &BatchConfig::new(Strategy::Sequential)).unwrap();

        let config = BatchConfig::new(Strategy::Parallel)
            .with_min_chunk(7)
            .with_max_threads(8)
            .with_verify(true);
        assert_eq!(encode_vec(&input, &ctx, &config).unwrap(), reference);
    }

    #[test]
    fn test_every_strategy_verifies_clean() {
        let ctx = default_context().unwrap();
        let input = samples(333);
        for strategy in [Strategy::Auto, Strategy::Parallel, Strategy::DataParallel] {
            for width in [LaneWidth::X4, LaneWidth::X16, LaneWidth::Native] {
                let config = BatchConfig::new(strategy)
                    .with_min_chunk(10)
                    .with_lane_width(width)
                    .with_verify(true);
                encode_vec(&input, &ctx, &config).unwrap();
            }
        }
    }

    #[test]
    fn test_cross_check_reports_mismatch() {
        let ctx = default_context().unwrap();
        let input = samples(4);
        let mut out = encode_vec(&input, &ctx, &BatchConfig::new(Strategy::Sequential)).unwrap();
        out[2].amplitude = out[2].amplitude.wrapping_add(1);
        let err = cross_check(&ctx, &input, &out, Strategy::DataParallel).unwrap_err();
        match err {
            QuantError::ConsistencyFailure { index, strategy, .. } => {
                assert_eq!(index, 2);
                assert_eq!(strategy, "unseq");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_decode_strategies_agree() {
        let ctx = default_context().unwrap();
        let pixels: Vec<AmpPhase> = (0..5_000u32).map(|i| AmpPhase::new((i % 256) as u8, (i / 7 % 256) as u8)).collect();
        let seq = decode_vec(&pixels, &ctx, &BatchConfig::new(Strategy::Sequential)).unwrap();
        let par = decode_vec(&pixels, &ctx, &BatchConfig::new(Strategy::Parallel).with_min_chunk(100)).unwrap();
        assert_eq!(seq, par);
        for (p, z) in pixels.iter().zip(&seq) {
            assert_eq!(*z, ctx.decode(*p));
        }
    }
}
