//! TPMS Capture - replays RAW sub-GHz captures through the TPMS decoder
//!
//! Decodes edge timings into tire sensor readings, either on fixed radio
//! settings or by sweeping frequency/modulation combinations, and prints
//! surfaced events as JSON lines on stdout.

use std::fs::File;
use std::io::BufReader;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tpms_capture::capture::{read_raw_capture, CaptureReplay, RawCapture, ReplayConfig};
use tpms_capture::config::Config;
use tpms_capture::decoder::Receiver;
use tpms_capture::history::SensorHistory;
use tpms_capture::radio::{is_frequency_supported, LoggingFrontend, RadioSettings};
use tpms_capture::session::{ScanMode, Session, SessionEnd, SessionEvent};
use tpms_capture::sweep::SweepOutcome;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; stdout carries the event stream
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    info!("===========================================");
    info!("   TPMS Capture");
    info!("   Manchester edge decoder + sweep search");
    info!("===========================================");

    let config = Config::from_env().context("Invalid configuration")?;

    info!("Configuration:");
    info!(
        "  Capture: {}",
        config
            .capture_path
            .as_ref()
            .map_or_else(|| "<stdin>".to_string(), |p| p.display().to_string())
    );
    info!("  Mode: {}", config.scan_mode);
    info!("  Protocol filter: {}", config.protocol_filter);
    info!("  History size: {}", config.history_max);
    info!("  Tick: {} ms", config.tick_ms);
    if config.scan_mode == ScanMode::Sweep {
        info!(
            "  Sweep: {} s per combo, {} cycles, {} frequencies x {} presets",
            config.sweep_seconds_per_combo,
            config.sweep_max_cycles,
            config.frequencies.len(),
            config.presets.len()
        );
    }

    let capture = load_capture(&config)?;
    info!(
        "Loaded {} edges ({:.2} s of signal)",
        capture.edges.len(),
        capture.duration_us() as f64 / 1e6
    );
    if let Some(preset) = &capture.preset {
        info!("  Recorded with preset {}", preset);
    }

    let scan_settings = scan_settings(&config, &capture);

    // In sweep mode keep ticking after the capture ends so the search can finish
    let trailing_ticks = match config.scan_mode {
        ScanMode::Scan => 0,
        ScanMode::Sweep => {
            let sweep = config.sweep_config();
            let combos = u32::try_from(sweep.combo_count()).unwrap_or(u32::MAX);
            sweep
                .ticks_per_combo
                .saturating_mul(combos)
                .saturating_mul(sweep.max_cycles)
        }
    };

    let replay = CaptureReplay::new(
        capture.edges,
        ReplayConfig {
            tick_us: u64::from(config.tick_ms) * 1000,
            realtime: config.replay_realtime,
            trailing_ticks,
        },
    );

    let history = SensorHistory::new(config.history_max).with_filter(config.protocol_filter);
    let mut session = Session::new(LoggingFrontend::new(), Receiver::with_all(), history, config.tick_ms)
        .with_lock_state(config.lock);

    match config.scan_mode {
        ScanMode::Scan => session.start_scan(scan_settings),
        ScanMode::Sweep => session.start_sweep(config.sweep_config()),
    }
    .context("Failed to configure radio")?;

    let events = replay.start().context("Failed to start capture replay")?;

    // Ctrl+C requests cooperative cancellation, honoured on the next tick
    let abort = session.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl+C received, cancelling...");
            abort.store(true, Ordering::SeqCst);
        }
    });

    info!("===========================================");
    info!("  Decoding started on {}", session.settings());
    info!("  Press Ctrl+C to stop.");
    info!("===========================================");

    let (event_tx, mut event_rx) = mpsc::channel::<SessionEvent>(256);

    let session_handle = tokio::task::spawn_blocking(move || {
        let end = session.run(&events, |event| {
            if event_tx.blocking_send(event).is_err() {
                warn!("Event printer gone, dropping event");
            }
        });
        let status = session.status_line();
        (end, status)
    });

    while let Some(event) = event_rx.recv().await {
        match serde_json::to_string(&event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to serialize event: {}", e),
        }
    }

    let (end, status) = session_handle.await.context("Session task panicked")?;
    replay.stop();

    let end = match end {
        Ok(end) => end,
        Err(e) => {
            error!("Session failed: {}", e);
            return Err(e.into());
        }
    };

    match end {
        SessionEnd::SweepFinished(SweepOutcome::Found { settings, reading }) => {
            info!("Signal Found: {} on {}", reading.id_hex(), settings);
            for line in reading.summary().lines() {
                info!("  {}", line);
            }
        }
        SessionEnd::SweepFinished(_) => info!("No signal detected"),
        SessionEnd::Cancelled => info!("Cancelled"),
        SessionEnd::Disconnected => info!("Capture finished"),
    }

    info!("Shutdown complete. {}", status);
    Ok(())
}

fn load_capture(config: &Config) -> Result<RawCapture> {
    match &config.capture_path {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
            read_raw_capture(BufReader::new(file)).with_context(|| format!("Failed to read {}", path.display()))
        }
        None => read_raw_capture(std::io::stdin().lock()).context("Failed to read capture from stdin"),
    }
}

/// Fixed settings for scan mode: the capture's own frequency when it has a
/// usable one, else the first configured candidate
fn scan_settings(config: &Config, capture: &RawCapture) -> RadioSettings {
    let frequency_hz = capture
        .frequency_hz
        .filter(|&f| is_frequency_supported(f))
        .unwrap_or(config.frequencies[0]);
    RadioSettings::new(frequency_hz, config.presets[0])
}
