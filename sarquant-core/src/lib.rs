//! SAR complex-pixel quantization.
//!
//! Converts complex `f32` samples to the 8-bit (amplitude, phase) pixel form
//! and back. Phase is quantized to 256 equally spaced buckets; amplitude is
//! the nearest entry of a sorted magnitude table, searched along the chosen
//! bucket's direction. The batch entry points can run sequentially, across
//! threads, or in lock-step lanes, and all three give identical bytes.
//!
//! ```no_run
//! use sarquant_core::{default_context, encode_vec, BatchConfig, ComplexSample};
//!
//! let ctx = default_context()?;
//! let pixels = encode_vec(&[ComplexSample::new(3.0, 4.0)], &ctx, &BatchConfig::default())?;
//! assert_eq!(pixels[0].amplitude, 5);
//! # Ok::<(), sarquant_core::QuantError>(())
//! ```

pub mod amplitude_table;
pub mod batch;
pub mod config;
pub mod convert;
pub mod error;
pub mod platform;
pub mod sample;

pub use amplitude_table::{AmplitudeTable, TableId, AMPLITUDE_TABLE_SIZE};
pub use batch::{decode_batch, decode_vec, encode_batch, encode_vec, Strategy};
pub use config::BatchConfig;
pub use convert::{decode, default_context, encode, ContextCache, ConverterContext, LaneWidth};
pub use error::{QuantError, Result};
pub use sample::{bytes_to_pixels, pixels_to_bytes, AmpPhase, ComplexSample};
