//! Receive session - the single consumer of radio events
//!
//! Owns the decoder pipeline, the sensor history, the optional sweep
//! controller and the front-end. Edge and tick events are handled one at a
//! time, so none of that state needs locking.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::decoder::{DecoderStats, EdgeEvent, Receiver};
use crate::history::{AddOutcome, HistoryEntry, SensorHistory};
use crate::radio::{RadioError, RadioFrontend, RadioSettings};
use crate::sweep::{SweepConfig, SweepController, SweepError, SweepOutcome, SweepStep};
use crate::tpms::Reading;

/// Statistics log interval
const STATS_INTERVAL_MS: u64 = 10_000;

/// Input posted by the front-end and the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioEvent {
    Edge(EdgeEvent),
    Tick,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanMode {
    #[default]
    Scan,
    Sweep,
}

impl FromStr for ScanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scan" | "scan_only" => Ok(ScanMode::Scan),
            "sweep" => Ok(ScanMode::Sweep),
            other => Err(format!("unknown scan mode '{}'", other)),
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanMode::Scan => f.write_str("scan"),
            ScanMode::Sweep => f.write_str("sweep"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockState {
    #[default]
    Unlocked,
    Locked,
}

/// Alert played when a new sensor appears
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCue {
    /// Green LED, vibration and a short tone
    Unlocked,
    /// Same, plus a backlight wake while the screen is locked
    Locked,
}

impl From<LockState> for NotificationCue {
    fn from(lock: LockState) -> Self {
        match lock {
            LockState::Unlocked => NotificationCue::Unlocked,
            LockState::Locked => NotificationCue::Locked,
        }
    }
}

/// Surfaced to the UI
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    ReadingAdded {
        index: usize,
        menu_text: String,
        entry: HistoryEntry,
        cue: NotificationCue,
    },
    SweepSucceeded {
        settings: RadioSettings,
        reading: Reading,
    },
    SweepExhausted {
        combos_visited: u64,
    },
    SweepCancelled,
}

/// Why a session stopped
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEnd {
    /// Event source closed
    Disconnected,
    SweepFinished(SweepOutcome),
    Cancelled,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("front-end reconfiguration failed: {0}")]
    Radio(#[from] RadioError),

    #[error("invalid sweep configuration: {0}")]
    Sweep(#[from] SweepError),
}

pub struct Session<F: RadioFrontend> {
    frontend: F,
    receiver: Receiver,
    history: SensorHistory,
    sweep: Option<SweepController>,
    settings: RadioSettings,
    lock: LockState,
    abort: Arc<AtomicBool>,
    tick_ms: u32,
    ticks: u64,
    duplicates: u64,
    filtered: u64,
    overflows: u64,
}

impl<F: RadioFrontend> Session<F> {
    pub fn new(frontend: F, receiver: Receiver, history: SensorHistory, tick_ms: u32) -> Self {
        Self {
            frontend,
            receiver,
            history,
            sweep: None,
            settings: RadioSettings::default(),
            lock: LockState::Unlocked,
            abort: Arc::new(AtomicBool::new(false)),
            tick_ms,
            ticks: 0,
            duplicates: 0,
            filtered: 0,
            overflows: 0,
        }
    }

    pub fn with_lock_state(mut self, lock: LockState) -> Self {
        self.lock = lock;
        self
    }

    /// Flag polled once per tick; setting it cancels the session
    pub fn abort_handle(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    pub fn history(&self) -> &SensorHistory {
        &self.history
    }

    pub fn decoder_stats(&self) -> &DecoderStats {
        self.receiver.stats()
    }

    pub fn settings(&self) -> RadioSettings {
        self.settings
    }

    pub fn sweep(&self) -> Option<&SweepController> {
        self.sweep.as_ref()
    }

    pub fn frontend(&self) -> &F {
        &self.frontend
    }

    pub fn duplicates(&self) -> u64 {
        self.duplicates
    }

    /// Listen on fixed settings
    pub fn start_scan(&mut self, settings: RadioSettings) -> Result<(), SessionError> {
        info!("Scanning on {}", settings);
        self.sweep = None;
        self.retune(settings)
    }

    /// Enter sweep mode; decoder state and history start empty
    pub fn start_sweep(&mut self, config: SweepConfig) -> Result<(), SessionError> {
        let sweep = SweepController::new(config)?;
        let start = sweep.current();
        info!(
            "Sweeping {} combinations x {} cycles, starting at {}",
            sweep.config().combo_count(),
            sweep.config().max_cycles,
            start
        );

        self.history.reset();
        self.sweep = Some(sweep);
        self.retune(start)
    }

    /// Stop receive, apply settings, drop partial frames, restart receive
    fn retune(&mut self, settings: RadioSettings) -> Result<(), SessionError> {
        self.frontend.stop_rx()?;
        self.frontend.configure(&settings)?;
        self.receiver.reset();
        self.frontend.start_rx()?;
        self.settings = settings;
        Ok(())
    }

    fn stop(&mut self) {
        if let Err(e) = self.frontend.stop_rx() {
            warn!("Failed to stop receiver: {}", e);
        }
        self.receiver.reset();
    }

    /// Handle one event; returns `Some` once the session has ended
    pub fn handle(
        &mut self,
        event: RadioEvent,
        emit: &mut impl FnMut(SessionEvent),
    ) -> Result<Option<SessionEnd>, SessionError> {
        match event {
            RadioEvent::Edge(edge) => Ok(self.on_edge(edge, emit)),
            RadioEvent::Tick => self.on_tick(emit),
        }
    }

    fn on_edge(&mut self, edge: EdgeEvent, emit: &mut impl FnMut(SessionEvent)) -> Option<SessionEnd> {
        for reading in self.receiver.feed(edge) {
            match self.history.add(&reading, self.settings, Utc::now()) {
                AddOutcome::New(index) => {
                    if let Some(entry) = self.history.get(index) {
                        emit(SessionEvent::ReadingAdded {
                            index,
                            menu_text: entry.menu_text(),
                            entry: entry.clone(),
                            cue: self.lock.into(),
                        });
                    }

                    if let Some(sweep) = self.sweep.as_mut() {
                        if let SweepStep::Finished(outcome) = sweep.on_reading(&reading) {
                            self.stop();
                            if let SweepOutcome::Found { settings, reading } = &outcome {
                                emit(SessionEvent::SweepSucceeded {
                                    settings: *settings,
                                    reading: reading.clone(),
                                });
                            }
                            return Some(SessionEnd::SweepFinished(outcome));
                        }
                    }
                }
                AddOutcome::Updated(index) => {
                    self.duplicates += 1;
                    debug!("Sensor {} seen again (entry {})", reading.id_hex(), index);
                }
                AddOutcome::Overflow => {
                    self.overflows += 1;
                    warn!("History full, {} {} not stored", reading.protocol, reading.id_hex());
                }
                AddOutcome::Filtered => self.filtered += 1,
            }
        }
        None
    }

    fn on_tick(&mut self, emit: &mut impl FnMut(SessionEvent)) -> Result<Option<SessionEnd>, SessionError> {
        self.ticks += 1;
        if self.tick_ms > 0 && (self.ticks * u64::from(self.tick_ms)) % STATS_INTERVAL_MS == 0 {
            self.log_stats();
        }

        let abort = self.abort.load(Ordering::SeqCst);
        let step = match self.sweep.as_mut() {
            Some(sweep) => sweep.on_tick(abort),
            None if abort => {
                info!("Scan cancelled");
                self.stop();
                return Ok(Some(SessionEnd::Cancelled));
            }
            None => return Ok(None),
        };

        match step {
            SweepStep::Continue => Ok(None),
            SweepStep::Retune(settings) => {
                self.retune(settings)?;
                Ok(None)
            }
            SweepStep::Finished(outcome) => {
                let combos_visited = self.sweep.as_ref().map_or(0, SweepController::combos_visited);
                self.stop();
                if outcome == SweepOutcome::Exhausted {
                    emit(SessionEvent::SweepExhausted { combos_visited });
                }
                Ok(Some(SessionEnd::SweepFinished(outcome)))
            }
            SweepStep::Cancelled => {
                self.stop();
                emit(SessionEvent::SweepCancelled);
                Ok(Some(SessionEnd::Cancelled))
            }
        }
    }

    /// Consume events until the source closes or the session ends
    pub fn run(
        &mut self,
        events: &crossbeam_channel::Receiver<RadioEvent>,
        mut emit: impl FnMut(SessionEvent),
    ) -> Result<SessionEnd, SessionError> {
        while let Ok(event) = events.recv() {
            if let Some(end) = self.handle(event, &mut emit)? {
                self.log_stats();
                return Ok(end);
            }
        }

        info!("Event source closed");
        self.stop();
        self.log_stats();
        Ok(SessionEnd::Disconnected)
    }

    fn log_stats(&self) {
        info!(
            "[Stats] {} | Sensors: {} | Duplicates: {} | Filtered: {} | Overflow: {}",
            self.receiver.stats(),
            self.history.len(),
            self.duplicates,
            self.filtered,
            self.overflows
        );
    }

    /// Frequency, preset and history fill; sweep countdown and cycle when sweeping
    pub fn status_line(&self) -> String {
        let mut line = if self.history.is_full() {
            self.history.space_text()
        } else {
            format!(
                "{} {} {}",
                self.settings.frequency_text(),
                self.settings.preset,
                self.history.space_text()
            )
        };

        if let Some(sweep) = &self.sweep {
            line.push_str(&format!(
                " | {}s cycle {}/{}",
                sweep.countdown_secs(self.tick_ms),
                sweep.cycle() + 1,
                sweep.config().max_cycles
            ));
        }
        line
    }
}
