//! RAW capture replay
//!
//! Reads Flipper `.sub` RAW captures (`RAW_Data: 246 -123 ...`, positive =
//! high, negative = low, microseconds) and replays them as radio events from
//! a dedicated thread, interleaving scheduler ticks at the configured period.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, error, info};

use crate::decoder::EdgeEvent;
use crate::session::RadioEvent;

/// Capacity of the edge/tick queue between replay thread and session
pub const EVENT_QUEUE_CAPACITY: usize = 1024;

const RAW_DATA_KEY: &str = "RAW_Data:";
const FREQUENCY_KEY: &str = "Frequency:";
const PRESET_KEY: &str = "Preset:";

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to read capture: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: invalid duration '{token}'")]
    InvalidDuration { line: usize, token: String },

    #[error("capture contains no RAW_Data")]
    Empty,
}

/// Parsed capture file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCapture {
    pub frequency_hz: Option<u32>,
    pub preset: Option<String>,
    pub edges: Vec<EdgeEvent>,
}

impl RawCapture {
    /// Total signal time in microseconds
    pub fn duration_us(&self) -> u64 {
        self.edges.iter().map(|e| u64::from(e.duration_us)).sum()
    }
}

/// Parse one `RAW_Data:` line; other lines yield no edges
pub fn parse_raw_line(line: &str, line_no: usize) -> Result<Vec<EdgeEvent>, CaptureError> {
    let Some(data) = line.trim().strip_prefix(RAW_DATA_KEY) else {
        return Ok(Vec::new());
    };

    data.split_whitespace()
        .filter_map(|token| match token.parse::<i64>() {
            Ok(0) => None,
            Ok(v) => {
                let duration_us = u32::try_from(v.unsigned_abs()).unwrap_or(u32::MAX);
                Some(Ok(EdgeEvent::new(v > 0, duration_us)))
            }
            Err(_) => Some(Err(CaptureError::InvalidDuration {
                line: line_no,
                token: token.to_string(),
            })),
        })
        .collect()
}

pub fn read_raw_capture<R: BufRead>(reader: R) -> Result<RawCapture, CaptureError> {
    let mut capture = RawCapture::default();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();

        if let Some(freq) = trimmed.strip_prefix(FREQUENCY_KEY) {
            capture.frequency_hz = freq.trim().parse().ok();
        } else if let Some(preset) = trimmed.strip_prefix(PRESET_KEY) {
            capture.preset = Some(preset.trim().to_string());
        } else {
            capture.edges.extend(parse_raw_line(trimmed, i + 1)?);
        }
    }

    if capture.edges.is_empty() {
        return Err(CaptureError::Empty);
    }
    Ok(capture)
}

#[derive(Debug, Clone)]
pub struct ReplayConfig {
    /// Scheduler tick period
    pub tick_us: u64,
    /// Sleep for the signal time instead of replaying as fast as possible
    pub realtime: bool,
    /// Ticks sent after the last edge so timeouts can still fire
    pub trailing_ticks: u32,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            tick_us: 100_000,
            realtime: false,
            trailing_ticks: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct ReplayStats {
    pub edges_sent: AtomicU64,
    pub ticks_sent: AtomicU64,
}

impl ReplayStats {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

/// Replays a capture as a live front-end would post events
pub struct CaptureReplay {
    edges: Arc<[EdgeEvent]>,
    config: ReplayConfig,
    running: Arc<AtomicBool>,
    stats: Arc<ReplayStats>,
}

impl CaptureReplay {
    pub fn new(edges: Vec<EdgeEvent>, config: ReplayConfig) -> Self {
        Self {
            edges: edges.into(),
            config,
            running: Arc::new(AtomicBool::new(false)),
            stats: ReplayStats::new(),
        }
    }

    /// Start the replay thread and return the event queue
    pub fn start(&self) -> Result<Receiver<RadioEvent>, CaptureError> {
        info!(
            "Replaying {} edges (tick {} ms, realtime: {})",
            self.edges.len(),
            self.config.tick_us / 1000,
            self.config.realtime
        );

        let (event_tx, event_rx) = bounded::<RadioEvent>(EVENT_QUEUE_CAPACITY);

        let edges = self.edges.clone();
        let config = self.config.clone();
        let running = self.running.clone();
        let stats = self.stats.clone();

        running.store(true, Ordering::SeqCst);

        thread::Builder::new()
            .name("tpms-replay".to_string())
            .spawn(move || {
                run_replay(&edges, &config, &running, &stats, &event_tx);
                running.store(false, Ordering::SeqCst);
            })?;

        Ok(event_rx)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> &Arc<ReplayStats> {
        &self.stats
    }
}

/// Replay loop (runs in dedicated thread)
fn run_replay(
    edges: &[EdgeEvent],
    config: &ReplayConfig,
    running: &AtomicBool,
    stats: &ReplayStats,
    tx: &Sender<RadioEvent>,
) {
    let started = Instant::now();
    let mut elapsed_us: u64 = 0;
    let mut next_tick_us = config.tick_us;

    let send = |event: RadioEvent| -> bool {
        if tx.send(event).is_err() {
            debug!("Event consumer disconnected, stopping replay");
            return false;
        }
        match event {
            RadioEvent::Edge(_) => stats.edges_sent.fetch_add(1, Ordering::Relaxed),
            RadioEvent::Tick => stats.ticks_sent.fetch_add(1, Ordering::Relaxed),
        };
        true
    };

    for &edge in edges {
        if !running.load(Ordering::SeqCst) {
            info!("Replay stopped");
            return;
        }

        elapsed_us += u64::from(edge.duration_us);
        if config.realtime {
            pace(started, elapsed_us);
        }
        if !send(RadioEvent::Edge(edge)) {
            return;
        }

        while config.tick_us > 0 && elapsed_us >= next_tick_us {
            if !send(RadioEvent::Tick) {
                return;
            }
            next_tick_us += config.tick_us;
        }
    }

    for _ in 0..config.trailing_ticks {
        if !running.load(Ordering::SeqCst) {
            return;
        }
        if config.realtime {
            thread::sleep(Duration::from_micros(config.tick_us));
        }
        if !send(RadioEvent::Tick) {
            return;
        }
    }

    let edges_sent = stats.edges_sent.load(Ordering::Relaxed);
    if edges_sent != edges.len() as u64 {
        error!("Replay sent {} of {} edges", edges_sent, edges.len());
    }
    info!(
        "Replay finished: {} edges, {} ticks, {:.1} s of signal",
        edges_sent,
        stats.ticks_sent.load(Ordering::Relaxed),
        elapsed_us as f64 / 1e6
    );
}

/// Sleep until the wall clock catches up with signal time
fn pace(started: Instant, elapsed_us: u64) {
    let target = Duration::from_micros(elapsed_us);
    let now = started.elapsed();
    if target > now + Duration::from_millis(1) {
        thread::sleep(target - now);
    }
}
