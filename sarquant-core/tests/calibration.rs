use std::sync::{Arc, Barrier};
use std::thread;

use sarquant_core::{
    decode_vec, default_context, encode_vec, AmpPhase, AmplitudeTable, BatchConfig, ComplexSample, ContextCache,
    ConverterContext, QuantError, Strategy,
};

fn log_table() -> AmplitudeTable {
    // Roughly logarithmic, as sensors tend to ship.
    AmplitudeTable::from_fn(|i| (1.0 + i as f64).ln() * 40.0)
}

#[test]
fn test_default_magnitudes_non_decreasing() {
    let ctx = default_context().unwrap();
    let m = ctx.magnitudes().values();
    assert!(m.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(m[0], ctx.decode(AmpPhase::new(0, 0)).norm());
}

#[test]
fn test_custom_magnitudes_non_decreasing() {
    let table = log_table();
    let ctx = ConverterContext::for_table(&table).unwrap();
    let m = ctx.magnitudes().values();
    assert!(m.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(m[255], (256.0f64.ln() * 40.0) as f32);
}

#[test]
fn test_non_monotonic_table_fails_before_encoding() {
    let cache = ContextCache::new();
    let table = AmplitudeTable::from_fn(|i| if i % 50 == 49 { 0.0 } else { i as f64 });
    let err = cache.for_table(&table).unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("magnitudes must be sorted"));
    assert!(matches!(err, QuantError::UnsortedMagnitudes { index: 49, .. }));
}

#[test]
fn test_custom_table_roundtrip() {
    let table = log_table();
    let ctx = ConverterContext::for_table(&table).unwrap();
    let pixels: Vec<AmpPhase> = (0..256u32)
        .flat_map(|a| [0u8, 31, 64, 200].map(move |p| AmpPhase::new(a as u8, p)))
        .filter(|p| p.amplitude > 0)
        .collect();
    let config = BatchConfig::default().with_verify(true);
    let decoded = decode_vec(&pixels, &ctx, &config).unwrap();
    let encoded = encode_vec(&decoded, &ctx, &config).unwrap();
    assert_eq!(encoded, pixels);
}

#[test]
fn test_encoded_amplitude_is_nearest_along_direction() {
    let table = log_table();
    let ctx = ConverterContext::for_table(&table).unwrap();
    for i in 0..500 {
        let r = i as f32 * 0.5;
        let a = i as f32 * 0.61;
        let z = ComplexSample::new(r * a.cos(), r * a.sin());
        let p = ctx.encode(z);
        let (dr, di) = ctx.directions().get(p.phase);
        let proj = dr * z.re + di * z.im;
        let m = ctx.magnitudes().values();
        let best = (proj - m[p.amplitude as usize]).abs();
        assert!(m.iter().all(|&v| (proj - v).abs() >= best), "sample {}", i);
    }
}

#[test]
fn test_concurrent_first_access_builds_once() {
    let cache = Arc::new(ContextCache::new());
    let table = Arc::new(log_table());
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            let table = table.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                cache.for_table(&table).unwrap()
            })
        })
        .collect();

    let contexts: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(contexts.iter().all(|c| Arc::ptr_eq(c, &contexts[0])));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_concurrent_default_context() {
    let handles: Vec<_> = (0..8).map(|_| thread::spawn(|| default_context().unwrap())).collect();
    let contexts: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(contexts.iter().all(|c| Arc::ptr_eq(c, &contexts[0])));
}

#[test]
fn test_decode_table_shared_by_threads() {
    let ctx = default_context().unwrap();
    let pixels: Vec<AmpPhase> = (0..=255u8).map(|a| AmpPhase::new(a, a)).collect();
    let config = BatchConfig::new(Strategy::Parallel).with_min_chunk(16);
    let decoded = decode_vec(&pixels, &ctx, &config).unwrap();
    for (p, z) in pixels.iter().zip(&decoded) {
        assert_eq!(*z, ctx.decode(*p));
    }
}
