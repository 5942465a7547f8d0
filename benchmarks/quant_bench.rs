use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sarquant_core::{
    decode_vec, default_context, encode_vec, AmplitudeTable, BatchConfig, ComplexSample, ContextCache,
    ConverterContext, LaneWidth, Strategy,
};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(author, version, about = "Times SAR pixel quantization under each batch strategy", long_about = None)]
struct Args {
    /// Pattern repetitions; the input holds four samples per repetition.
    #[arg(short, long, default_value_t = 1_000_000)]
    count: usize,

    #[arg(short, long, default_value_t = 5)]
    iterations: usize,

    /// Comma-separated list from seq, par, unseq, auto.
    #[arg(short, long, default_value = "seq,par,unseq")]
    strategies: String,

    /// Lane width for unseq: 4, 8, 16 or native.
    #[arg(short, long, default_value = "native")]
    lanes: String,

    #[arg(short, long)]
    threads: Option<usize>,

    /// quadrant (the fixed four-quadrant ramp) or random.
    #[arg(short, long, default_value = "quadrant")]
    pattern: String,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Calibrate with a logarithmic amplitude table instead of the default scheme.
    #[arg(long)]
    log_table: bool,

    #[arg(long)]
    json: bool,
}

#[derive(Serialize, Debug)]
struct StrategyRun {
    strategy: String,
    best_ms: f64,
    mean_ms: f64,
    samples_per_sec: f64,
    matches_sequential: bool,
}

#[derive(Serialize, Debug)]
struct Report {
    samples: usize,
    iterations: usize,
    calibration: &'static str,
    encode: Vec<StrategyRun>,
    decode_ms: f64,
}

/// For each i: (i, i), (-i, i), (i, -i), (-i, -i).
fn quadrant_pattern(count: usize) -> Vec<ComplexSample> {
    let mut samples = Vec::with_capacity(count * 4);
    for i in 0..count {
        let f = i as f32;
        samples.push(ComplexSample::new(f, f));
        samples.push(ComplexSample::new(-f, f));
        samples.push(ComplexSample::new(f, -f));
        samples.push(ComplexSample::new(-f, -f));
    }
    samples
}

fn random_pattern(count: usize, seed: u64) -> Vec<ComplexSample> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count * 4)
        .map(|_| ComplexSample::new(rng.gen_range(-300.0f32..300.0), rng.gen_range(-300.0f32..300.0)))
        .collect()
}

fn time_runs<F: FnMut() -> Result<()>>(iterations: usize, mut f: F) -> Result<Vec<Duration>> {
    let mut times = Vec::with_capacity(iterations);
    for _ in 0..iterations.max(1) {
        let start = Instant::now();
        f()?;
        times.push(start.elapsed());
    }
    Ok(times)
}

fn ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1e3
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let lane_width = match LaneWidth::parse(&args.lanes) {
        Some(w) => w,
        None => bail!("unknown lane width '{}'", args.lanes),
    };
    let strategies = args
        .strategies
        .split(',')
        .map(|s| s.trim().parse::<Strategy>().map_err(anyhow::Error::msg))
        .collect::<Result<Vec<_>>>()?;

    let samples = match args.pattern.as_str() {
        "quadrant" => quadrant_pattern(args.count),
        "random" => random_pattern(args.count, args.seed),
        other => bail!("unknown pattern '{}'", other),
    };

    let cache = ContextCache::new();
    let (ctx, calibration): (std::sync::Arc<ConverterContext>, &'static str) = if args.log_table {
        let table = AmplitudeTable::from_fn(|i| (1.0 + i as f64).ln() * 40.0);
        (cache.for_table(&table).context("building log-table context")?, "log-table")
    } else {
        (default_context().context("building default context")?, "default")
    };
    info!("Benchmarking {} samples, {} iterations, calibration {}", samples.len(), args.iterations, calibration);

    let base = BatchConfig::from_env().with_lane_width(lane_width).with_verify(false);
    let base = match args.threads {
        Some(n) => base.with_max_threads(n),
        None => base,
    };

    let reference = encode_vec(&samples, &ctx, &base.clone().with_strategy(Strategy::Sequential))?;

    let mut runs = Vec::new();
    for strategy in strategies {
        let config = base.clone().with_strategy(strategy);
        let mut output = Vec::new();
        let times = time_runs(args.iterations, || {
            output = encode_vec(&samples, &ctx, &config)?;
            Ok(())
        })?;

        let best = times.iter().copied().min().unwrap_or_default();
        let mean = times.iter().sum::<Duration>() / times.len() as u32;
        runs.push(StrategyRun {
            strategy: strategy.to_string(),
            best_ms: ms(best),
            mean_ms: ms(mean),
            samples_per_sec: samples.len() as f64 / best.as_secs_f64().max(f64::MIN_POSITIVE),
            matches_sequential: output == reference,
        });
    }

    let decode_times = time_runs(args.iterations, || {
        decode_vec(&reference, &ctx, &base).map(|_| ())?;
        Ok(())
    })?;
    let decode_best = decode_times.iter().copied().min().unwrap_or_default();

    let report = Report {
        samples: samples.len(),
        iterations: args.iterations,
        calibration,
        encode: runs,
        decode_ms: ms(decode_best),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("\n==================================================");
        println!("          SAR QUANTIZATION BENCHMARK             ");
        println!("==================================================");
        println!(" Samples:      {}", report.samples);
        println!(" Iterations:   {}", report.iterations);
        println!(" Calibration:  {}", report.calibration);
        println!(" Lanes:        {:?}", lane_width);
        println!("--------------------------------------------------");
        println!(" {:<8} {:>10} {:>10} {:>14} {:>6}", "strategy", "best ms", "mean ms", "samples/s", "match");
        for run in &report.encode {
            println!(
                " {:<8} {:>10.2} {:>10.2} {:>14.0} {:>6}",
                run.strategy,
                run.best_ms,
                run.mean_ms,
                run.samples_per_sec,
                if run.matches_sequential { "PASS" } else { "FAIL" }
            );
        }
        println!("--------------------------------------------------");
        println!(" Decode (table): {:.2} ms", report.decode_ms);
        println!("==================================================\n");
    }

    if report.encode.iter().any(|r| !r.matches_sequential) {
        bail!("a strategy produced output different from sequential");
    }
    Ok(())
}
