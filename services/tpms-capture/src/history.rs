//! Sensor history and deduplication
//!
//! One entry per (protocol, sensor id), kept in first-seen order so list
//! indices stay stable for the UI. Repeat sightings only refresh the
//! last-seen time.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::radio::RadioSettings;
use crate::tpms::{ProtocolId, Reading, UnknownProtocol};

/// Default capacity of the history list
pub const DEFAULT_HISTORY_MAX: usize = 50;

/// Which protocols may enter the history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolFilter {
    #[default]
    All,
    Only(ProtocolId),
}

impl ProtocolFilter {
    pub fn matches(&self, protocol: ProtocolId) -> bool {
        match self {
            ProtocolFilter::All => true,
            ProtocolFilter::Only(p) => *p == protocol,
        }
    }
}

impl fmt::Display for ProtocolFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolFilter::All => f.write_str("All"),
            ProtocolFilter::Only(p) => write!(f, "{}", p),
        }
    }
}

impl FromStr for ProtocolFilter {
    type Err = UnknownProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(ProtocolFilter::All);
        }
        s.parse().map(ProtocolFilter::Only)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub reading: Reading,
    /// Front-end configuration the sensor was first heard on
    pub radio: RadioSettings,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    /// Cleared by the first repeat sighting, never re-armed
    pub is_new: bool,
}

impl HistoryEntry {
    /// One-line list text
    pub fn menu_text(&self) -> String {
        format!(
            "{} {} {:.1} PSI",
            self.reading.protocol.name(),
            self.reading.id_hex(),
            self.reading.pressure_psi()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// First sighting; index of the new entry
    New(usize),
    /// Known sensor, last-seen refreshed
    Updated(usize),
    /// Unknown sensor but the list is full
    Overflow,
    /// Protocol rejected by the active filter
    Filtered,
}

pub struct SensorHistory {
    entries: Vec<HistoryEntry>,
    index: HashMap<(ProtocolId, u32), usize>,
    max_entries: usize,
    filter: ProtocolFilter,
}

impl SensorHistory {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Vec::with_capacity(max_entries),
            index: HashMap::with_capacity(max_entries),
            max_entries,
            filter: ProtocolFilter::All,
        }
    }

    pub fn with_filter(mut self, filter: ProtocolFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn filter(&self) -> ProtocolFilter {
        self.filter
    }

    /// Record a validated reading
    pub fn add(&mut self, reading: &Reading, radio: RadioSettings, now: DateTime<Utc>) -> AddOutcome {
        if !self.filter.matches(reading.protocol) {
            debug!("{} {} filtered out", reading.protocol, reading.id_hex());
            return AddOutcome::Filtered;
        }

        let key = (reading.protocol, reading.sensor_id);
        if let Some(&idx) = self.index.get(&key) {
            let entry = &mut self.entries[idx];
            entry.last_seen = now;
            entry.is_new = false;
            return AddOutcome::Updated(idx);
        }

        if self.is_full() {
            debug!("History full, dropping {} {}", reading.protocol, reading.id_hex());
            return AddOutcome::Overflow;
        }

        let idx = self.entries.len();
        self.entries.push(HistoryEntry {
            reading: reading.clone(),
            radio,
            first_seen: now,
            last_seen: now,
            is_new: true,
        });
        self.index.insert(key, idx);

        info!(
            "New sensor {} {} on {} ({}/{})",
            reading.protocol,
            reading.id_hex(),
            radio,
            self.entries.len(),
            self.max_entries
        );
        AddOutcome::New(idx)
    }

    pub fn get(&self, idx: usize) -> Option<&HistoryEntry> {
        self.entries.get(idx)
    }

    pub fn find(&self, protocol: ProtocolId, sensor_id: u32) -> Option<&HistoryEntry> {
        self.index.get(&(protocol, sensor_id)).map(|&i| &self.entries[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    pub fn space_left(&self) -> usize {
        self.max_entries.saturating_sub(self.entries.len())
    }

    pub fn is_full(&self) -> bool {
        self.space_left() == 0
    }

    /// "NN/MM" fill level, or a warning once no slot is left
    pub fn space_text(&self) -> String {
        if self.is_full() {
            "Memory is FULL".to_string()
        } else {
            format!("{:02}/{:02}", self.entries.len(), self.max_entries)
        }
    }

    pub fn menu_text(&self, idx: usize) -> Option<String> {
        self.get(idx).map(HistoryEntry::menu_text)
    }

    /// Point-in-time copy for readers outside the decode task
    pub fn snapshot(&self) -> Vec<HistoryEntry> {
        self.entries.clone()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
        self.index.clear();
    }
}

impl Default for SensorHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_MAX)
    }
}
