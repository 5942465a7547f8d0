use std::env;
use std::str::FromStr;

use log::warn;

use crate::batch::Strategy;
use crate::convert::LaneWidth;
use crate::platform::SystemTopology;

pub const DEFAULT_PARALLEL_THRESHOLD: usize = 65_536;
pub const DEFAULT_MIN_CHUNK: usize = 4_096;

/// Tuning for batch encode/decode. None of these settings affect results,
/// only which strategy produces them.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    pub strategy: Strategy,
    /// `Auto` goes thread-parallel at or above this many samples.
    pub parallel_threshold: usize,
    /// Smallest slice handed to one worker thread.
    pub min_chunk: usize,
    /// Cap on worker threads; `None` uses every online core.
    pub max_threads: Option<usize>,
    pub lane_width: LaneWidth,
    /// Re-run accelerated results through the sequential encoder and fail
    /// on any difference.
    pub verify: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Auto,
            parallel_threshold: DEFAULT_PARALLEL_THRESHOLD,
            min_chunk: DEFAULT_MIN_CHUNK,
            max_threads: None,
            lane_width: LaneWidth::Native,
            verify: cfg!(debug_assertions),
        }
    }
}

impl BatchConfig {
    pub fn new(strategy: Strategy) -> Self {
        Self { strategy, ..Self::default() }
    }

    /// Defaults overlaid with `SARQUANT_*` environment variables.
    ///
    /// Recognized: `SARQUANT_STRATEGY` (auto|seq|par|unseq),
    /// `SARQUANT_PAR_THRESHOLD`, `SARQUANT_MIN_CHUNK`, `SARQUANT_THREADS`,
    /// `SARQUANT_LANES` (4|8|16|native), `SARQUANT_VERIFY` (1|0|true|false).
    /// Unparsable values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(s) = env_parse::<Strategy>("SARQUANT_STRATEGY") {
            config.strategy = s;
        }
        if let Some(n) = env_parse::<usize>("SARQUANT_PAR_THRESHOLD") {
            config.parallel_threshold = n;
        }
        if let Some(n) = env_parse::<usize>("SARQUANT_MIN_CHUNK") {
            config.min_chunk = n;
        }
        if let Some(n) = env_parse::<usize>("SARQUANT_THREADS") {
            config.max_threads = Some(n);
        }
        if let Some(raw) = env_raw("SARQUANT_LANES") {
            match LaneWidth::parse(&raw) {
                Some(w) => config.lane_width = w,
                None => warn!("Ignoring SARQUANT_LANES={:?}: expected 4, 8, 16 or native", raw),
            }
        }
        if let Some(raw) = env_raw("SARQUANT_VERIFY") {
            match parse_flag(&raw) {
                Some(v) => config.verify = v,
                None => warn!("Ignoring SARQUANT_VERIFY={:?}: expected a boolean", raw),
            }
        }
        config
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_parallel_threshold(mut self, n: usize) -> Self {
        self.parallel_threshold = n;
        self
    }

    pub fn with_min_chunk(mut self, n: usize) -> Self {
        self.min_chunk = n;
        self
    }

    pub fn with_max_threads(mut self, n: usize) -> Self {
        self.max_threads = Some(n);
        self
    }

    pub fn with_lane_width(mut self, width: LaneWidth) -> Self {
        self.lane_width = width;
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn worker_threads(&self) -> usize {
        SystemTopology::global().worker_threads(self.max_threads)
    }
}

fn env_raw(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = env_raw(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid value", key, raw);
            None
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
