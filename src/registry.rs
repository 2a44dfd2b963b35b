//! # Device Registry and Cross-Reference Table
//!
//! This module owns the two lookup structures both pipeline directions are
//! built on. The cross-reference table maps an opaque measurement key to the
//! signal references it populates; it is built once per configuration load
//! with each reference's cell index resolved, and is read-only until the
//! next reload replaces it. The device registry holds the mutable
//! per-device quality record that accumulates across frames for the life of
//! a connection - counters belong here, on the device's definition, never
//! on a transient cell.
//!
//! ## Key Components
//!
//! - `CrossReference`: measurement key to `SignalReference` list, one-to-many.
//! - `DeviceRecord` / `DeviceRegistry`: per-device identity and quality
//!   counters, indexed by device ID code.
//! - `UnknownDeviceTable`: synchronized counter table for cells arriving
//!   with an unregistered ID code; reports each device on first sight only.

use crate::channel::frame::CellTemplate;
use crate::channel::signal::{SignalKind, SignalReference};
use crate::config::MeasurementMapping;
use chrono::{DateTime, Utc};
use log::warn;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;

/// Measurement key to signal reference lookup.
///
/// One source measurement may populate multiple destination slots across
/// devices or within one device, so each key maps to a list. Keys absent
/// from this table are filtered out before the timing/sort stage - the
/// primary performance guard against reprocessing irrelevant input.
#[derive(Debug, Default)]
pub struct CrossReference {
    table: HashMap<String, Vec<SignalReference>>,
    resolved_rows: usize,
}

impl CrossReference {
    /// Builds the table from mapping rows, resolving and caching each
    /// reference's cell index via the template sequence. Rows naming an
    /// unconfigured acronym or an unknown signal kind are logged and
    /// skipped; the rest of the table still builds.
    pub fn build(mappings: &[MeasurementMapping], templates: &[CellTemplate]) -> Self {
        let cell_positions: HashMap<&str, usize> = templates
            .iter()
            .enumerate()
            .map(|(position, template)| (template.acronym.as_str(), position))
            .collect();

        let mut table: HashMap<String, Vec<SignalReference>> = HashMap::new();
        let mut resolved_rows = 0;

        for mapping in mappings {
            let mut signal = SignalReference::parse(&mapping.signal_reference);

            if signal.kind == SignalKind::Unknown {
                warn!(
                    "Skipping mapping for measurement \"{}\": unknown signal kind in \"{}\"",
                    mapping.key, mapping.signal_reference
                );
                continue;
            }

            match cell_positions.get(signal.acronym.as_str()) {
                Some(position) => signal.cell_index = *position,
                None => {
                    warn!(
                        "Skipping mapping for measurement \"{}\": no configured device \"{}\"",
                        mapping.key, signal.acronym
                    );
                    continue;
                }
            }

            table.entry(mapping.key.clone()).or_default().push(signal);
            resolved_rows += 1;
        }

        CrossReference {
            table,
            resolved_rows,
        }
    }

    /// Looks up the destinations for a measurement key.
    pub fn resolve(&self, key: &str) -> Option<&[SignalReference]> {
        self.table.get(key).map(|signals| signals.as_slice())
    }

    /// Number of distinct measurement keys in the table.
    pub fn key_count(&self) -> usize {
        self.table.len()
    }

    /// Number of mapping rows that resolved successfully.
    pub fn resolved_rows(&self) -> usize {
        self.resolved_rows
    }
}

/// Mutable per-device quality and identity record.
///
/// Lives in the registry for the duration of a connection and accumulates
/// across every frame referencing the device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceRecord {
    pub acronym: String,
    pub id_code: u16,
    pub total_frames: u64,
    pub data_quality_errors: u64,
    pub time_quality_errors: u64,
    pub device_errors: u64,
    pub last_report_time: Option<DateTime<Utc>>,
}

impl DeviceRecord {
    pub fn new(acronym: &str, id_code: u16) -> Self {
        DeviceRecord {
            acronym: acronym.to_uppercase(),
            id_code,
            total_frames: 0,
            data_quality_errors: 0,
            time_quality_errors: 0,
            device_errors: 0,
            last_report_time: None,
        }
    }
}

/// Registry of expected devices indexed by ID code.
///
/// Each device's record has a single writer at a time under normal
/// operation (a given device's cell arrives on one parsing thread), so the
/// registry itself needs no interior locking; status reporting takes
/// snapshots.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    records: HashMap<u16, DeviceRecord>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        DeviceRegistry {
            records: HashMap::new(),
        }
    }

    /// Registers an expected device. A repeated ID code replaces the prior
    /// record, which only happens across configuration reloads.
    pub fn register(&mut self, acronym: &str, id_code: u16) {
        self.records
            .insert(id_code, DeviceRecord::new(acronym, id_code));
    }

    pub fn get(&self, id_code: u16) -> Option<&DeviceRecord> {
        self.records.get(&id_code)
    }

    pub fn get_mut(&mut self, id_code: u16) -> Option<&mut DeviceRecord> {
        self.records.get_mut(&id_code)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Clones the current records for status reporting.
    pub fn snapshot(&self) -> Vec<DeviceRecord> {
        let mut records: Vec<DeviceRecord> = self.records.values().cloned().collect();
        records.sort_by(|a, b| a.acronym.cmp(&b.acronym));
        records
    }
}

/// Count-tracked table of devices encountered on the wire with no
/// registered definition.
///
/// Any device's frame can trigger an increment concurrently with another's,
/// so this table is the one shared structure the mapper synchronizes.
#[derive(Debug, Default)]
pub struct UnknownDeviceTable {
    counts: Mutex<HashMap<u16, u64>>,
}

impl UnknownDeviceTable {
    pub fn new() -> Self {
        UnknownDeviceTable {
            counts: Mutex::new(HashMap::new()),
        }
    }

    /// Counts one sighting of an unknown device. Returns `true` exactly
    /// when this is the first sighting, so callers log once per device
    /// rather than once per frame.
    pub fn note(&self, id_code: u16) -> bool {
        let mut counts = self.counts.lock();
        let count = counts.entry(id_code).or_insert(0);
        *count += 1;
        *count == 1
    }

    pub fn count(&self, id_code: u16) -> u64 {
        self.counts.lock().get(&id_code).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> Vec<(u16, u64)> {
        let mut entries: Vec<(u16, u64)> = self
            .counts
            .lock()
            .iter()
            .map(|(id, count)| (*id, *count))
            .collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }
}
