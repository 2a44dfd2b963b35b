//! # Outbound Concentration
//!
//! This module turns an unordered, continuously arriving stream of
//! timestamped scalar measurements into rate-locked, fully populated frames.
//! Incoming measurements are filtered through the cross-reference table,
//! decorated with every signal reference they resolve to, sorted into
//! per-timestamp buckets at `1 / frames_per_second` granularity, and placed
//! into the matching cell slot by signal kind. A periodic publish tick
//! closes each bucket once its lag window expires and hands the serialized
//! image to the transport hook.
//!
//! ## Key Components
//!
//! - `Measurement` / `SortedMeasurement`: the raw input record and its
//!   destination-decorated form.
//! - `FramePublisher`: the transport hook receiving serialized images.
//! - `Concentrator`: bucket assembler, placement switch, publish tick and
//!   lifetime counters.
//!
//! ## Usage
//!
//! The caller owns the threading: measurement intake and the publish tick
//! must not run concurrently against the same `Concentrator` (it takes
//! `&mut self`), which gives each in-flight bucket a single writer.
//! Configuration reload swaps the cross-reference table atomically, so
//! shared handles obtained before the reload stay valid.

use crate::channel::common::{FrameImage, MappingError, ParseError};
use crate::channel::frame::{CellTemplate, DataCell, DataFrame};
use crate::channel::signal::{SignalKind, SignalReference};
use crate::config::GatewayConfig;
use crate::registry::CrossReference;
use chrono::{DateTime, Duration, Timelike, Utc};
use log::{error, info, warn};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One timestamped scalar reading identified by its opaque measurement key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub key: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// A measurement decorated with one resolved destination.
///
/// A measurement resolving to several destinations produces one decorated
/// record per destination; each is placed independently.
#[derive(Debug, Clone)]
pub struct SortedMeasurement {
    pub measurement: Measurement,
    pub signal: SignalReference,
}

impl SortedMeasurement {
    /// Identity of this (measurement, destination) pair within one frame.
    /// Re-sorting the same pair into the same frame counts once.
    fn placement_key(&self) -> String {
        format!("{} {}", self.measurement.key, self.signal)
    }
}

/// Transport hook receiving each serialized frame image.
pub trait FramePublisher {
    fn publish(&mut self, frame_bytes: &[u8]);
}

/// Snapshot of the concentrator's counters and live state.
#[derive(Debug, Clone, Serialize)]
pub struct ConcentratorStatus {
    pub frames_per_second: u16,
    pub device_count: usize,
    pub active_buckets: usize,
    pub sorted_measurements: u64,
    pub discarded_measurements: u64,
    pub placement_skips: u64,
    pub placement_defects: u64,
    pub published_frames: u64,
    pub published_bytes: u64,
    /// Lifetime sorted-measurement throughput in measurements per second.
    pub measurements_per_second: f64,
}

/// Outbound frame assembler.
pub struct Concentrator {
    templates: Vec<CellTemplate>,
    cross: RwLock<Arc<CrossReference>>,
    frames_per_second: u16,
    lag: Duration,
    lead: Duration,
    process_data_valid_flag: bool,
    auto_publish_config: bool,
    configuration_image: Vec<u8>,
    buckets: BTreeMap<i64, DataFrame>,
    last_published_bucket: Option<i64>,
    last_published_cells: Option<Vec<DataCell>>,
    last_config_publish_minute: Option<i64>,
    started_at: DateTime<Utc>,
    sorted_measurements: u64,
    discarded_measurements: u64,
    placement_skips: u64,
    placement_defects: u64,
    published_frames: u64,
    published_bytes: u64,
}

impl Concentrator {
    /// Builds a concentrator from a configuration snapshot.
    ///
    /// Malformed device rows were already isolated by `cell_templates`; a
    /// snapshot yielding zero devices is rejected since every frame would
    /// be empty.
    pub fn build(config: &GatewayConfig) -> Result<Self, ParseError> {
        if config.frames_per_second == 0 || config.frames_per_second > 1000 {
            return Err(ParseError::InvalidConfiguration {
                message: format!(
                    "frames_per_second {} outside supported range 1..=1000",
                    config.frames_per_second
                ),
            });
        }
        let templates = config.cell_templates();
        if templates.is_empty() {
            return Err(ParseError::InvalidConfiguration {
                message: "no usable output device definitions".to_string(),
            });
        }
        let cross = CrossReference::build(&config.mappings, &templates);
        info!(
            "Concentrator configured: {} devices, {} measurement keys, {} frames/s",
            templates.len(),
            cross.key_count(),
            config.frames_per_second
        );

        let configuration_image =
            config
                .to_json()
                .map_err(|e| ParseError::InvalidConfiguration {
                    message: format!("configuration image serialization failed: {}", e),
                })?
                .into_bytes();

        Ok(Concentrator {
            templates,
            cross: RwLock::new(Arc::new(cross)),
            frames_per_second: config.frames_per_second,
            lag: seconds_to_duration(config.lag_seconds),
            lead: seconds_to_duration(config.lead_seconds),
            process_data_valid_flag: config.process_data_valid_flag,
            auto_publish_config: config.auto_publish_config_frame(),
            configuration_image,
            buckets: BTreeMap::new(),
            last_published_bucket: None,
            last_published_cells: None,
            last_config_publish_minute: None,
            started_at: Utc::now(),
            sorted_measurements: 0,
            discarded_measurements: 0,
            placement_skips: 0,
            placement_defects: 0,
            published_frames: 0,
            published_bytes: 0,
        })
    }

    /// Rebuilds device templates and the cross-reference table from a new
    /// snapshot, swapping the table atomically. Open buckets are dropped:
    /// the device shape may have changed underneath them.
    pub fn reload_configuration(&mut self, config: &GatewayConfig) -> Result<(), ParseError> {
        let rebuilt = Concentrator::build(config)?;
        if !self.buckets.is_empty() {
            info!(
                "Configuration reload dropping {} open timestamp buckets",
                self.buckets.len()
            );
        }
        self.templates = rebuilt.templates;
        *self.cross.write() = rebuilt.cross.into_inner();
        self.frames_per_second = rebuilt.frames_per_second;
        self.lag = rebuilt.lag;
        self.lead = rebuilt.lead;
        self.process_data_valid_flag = rebuilt.process_data_valid_flag;
        self.auto_publish_config = rebuilt.auto_publish_config;
        self.configuration_image = rebuilt.configuration_image;
        self.buckets.clear();
        self.last_published_cells = None;
        Ok(())
    }

    /// Shared handle to the current cross-reference table. Handles obtained
    /// before a reload keep observing the old table.
    pub fn cross_reference(&self) -> Arc<CrossReference> {
        self.cross.read().clone()
    }

    /// Filters a measurement batch through the cross-reference table,
    /// decorates each hit with its resolved destinations and sorts the
    /// decorated records into timestamp buckets.
    ///
    /// Measurements with no cross-reference entry are dropped before the
    /// timing stage. Measurements outside the lag/lead window, or aimed at
    /// an already-published bucket, are counted as discarded rather than
    /// force-placed into the nearest bucket.
    pub fn queue_measurements(&mut self, batch: &[Measurement], now: DateTime<Utc>) {
        let cross = self.cross_reference();
        for measurement in batch {
            let signals = match cross.resolve(&measurement.key) {
                Some(signals) => signals,
                None => continue,
            };
            for signal in signals {
                let sorted = SortedMeasurement {
                    measurement: measurement.clone(),
                    signal: signal.clone(),
                };
                self.sort_measurement(sorted, now);
            }
        }
    }

    fn sort_measurement(&mut self, sorted: SortedMeasurement, now: DateTime<Utc>) {
        let timestamp = sorted.measurement.timestamp;
        if timestamp > now + self.lead || timestamp < now - self.lag {
            self.discarded_measurements += 1;
            return;
        }

        let bucket = self.bucket_index(timestamp);
        if let Some(published) = self.last_published_bucket {
            if bucket <= published {
                self.discarded_measurements += 1;
                return;
            }
        }
        if !self.buckets.contains_key(&bucket) {
            match self.open_bucket(bucket) {
                Some(frame) => {
                    self.buckets.insert(bucket, frame);
                }
                None => {
                    self.discarded_measurements += 1;
                    return;
                }
            }
        }
        let frame = match self.buckets.get_mut(&bucket) {
            Some(frame) => frame,
            None => return,
        };

        match assign_measurement(frame, &sorted) {
            Ok(()) => {
                if frame.record_sorted(&sorted.placement_key()) {
                    self.sorted_measurements += 1;
                }
            }
            Err(MappingError::InternalContract { message }) => {
                error!("Measurement placement defect: {}", message);
                self.placement_defects += 1;
            }
            Err(e) => {
                warn!("Skipping measurement \"{}\": {}", sorted.measurement.key, e);
                self.placement_skips += 1;
            }
        }
    }

    /// Publishes every bucket whose lag window has expired, oldest first.
    /// Returns the number of data frames published.
    pub fn publish_due<P: FramePublisher>(&mut self, publisher: &mut P, now: DateTime<Utc>) -> usize {
        let mut published = 0;
        loop {
            let bucket = match self.buckets.keys().next() {
                Some(bucket) => *bucket,
                None => break,
            };
            let deadline = match self.bucket_timestamp(bucket + 1) {
                Some(frame_end) => frame_end + self.lag,
                None => now, // unreachable for a bucket that opened
            };
            if deadline > now {
                break;
            }
            if let Some(mut frame) = self.buckets.remove(&bucket) {
                self.publish_frame(&mut frame, publisher);
                self.last_published_bucket = Some(bucket);
                published += 1;
            }
        }
        published
    }

    fn publish_frame<P: FramePublisher>(&mut self, frame: &mut DataFrame, publisher: &mut P) {
        if self.process_data_valid_flag {
            for cell in &mut frame.cells {
                if !cell.all_values_assigned() {
                    cell.set_data_valid(false);
                }
            }
        }

        self.maybe_publish_configuration(frame.timestamp, publisher);

        let image = frame.to_bytes();
        publisher.publish(&image);
        self.published_frames += 1;
        self.published_bytes += image.len() as u64;

        let mut cells = std::mem::take(&mut frame.cells);
        for cell in &mut cells {
            cell.reset_assignments();
            cell.set_data_valid(true);
        }
        self.last_published_cells = Some(cells);
    }

    // Republish the configuration image at the top of each UTC minute,
    // latched so consecutive frames inside second zero emit it once.
    fn maybe_publish_configuration<P: FramePublisher>(
        &mut self,
        timestamp: DateTime<Utc>,
        publisher: &mut P,
    ) {
        if !self.auto_publish_config || timestamp.second() != 0 {
            return;
        }
        let minute = timestamp.timestamp() / 60;
        if self.last_config_publish_minute == Some(minute) {
            return;
        }
        publisher.publish(&self.configuration_image);
        self.published_bytes += self.configuration_image.len() as u64;
        self.last_config_publish_minute = Some(minute);
    }

    fn open_bucket(&self, bucket: i64) -> Option<DataFrame> {
        let timestamp = self.bucket_timestamp(bucket)?;
        Some(match &self.last_published_cells {
            Some(cells) => DataFrame::with_cells(timestamp, cells.clone()),
            None => DataFrame::from_templates(timestamp, &self.templates),
        })
    }

    fn bucket_index(&self, timestamp: DateTime<Utc>) -> i64 {
        timestamp.timestamp_micros() * self.frames_per_second as i64 / 1_000_000
    }

    fn bucket_timestamp(&self, bucket: i64) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_micros(bucket * 1_000_000 / self.frames_per_second as i64)
    }

    /// Current counters and live state.
    pub fn status(&self, now: DateTime<Utc>) -> ConcentratorStatus {
        let elapsed = (now - self.started_at).num_milliseconds().max(1) as f64 / 1000.0;
        ConcentratorStatus {
            frames_per_second: self.frames_per_second,
            device_count: self.templates.len(),
            active_buckets: self.buckets.len(),
            sorted_measurements: self.sorted_measurements,
            discarded_measurements: self.discarded_measurements,
            placement_skips: self.placement_skips,
            placement_defects: self.placement_defects,
            published_frames: self.published_frames,
            published_bytes: self.published_bytes,
            measurements_per_second: self.sorted_measurements as f64 / elapsed,
        }
    }

    /// Resets the lifetime counters and the throughput clock.
    pub fn reset_lifetime_counters(&mut self) {
        self.sorted_measurements = 0;
        self.discarded_measurements = 0;
        self.placement_skips = 0;
        self.placement_defects = 0;
        self.published_frames = 0;
        self.published_bytes = 0;
        self.started_at = Utc::now();
    }
}

fn seconds_to_duration(seconds: f64) -> Duration {
    Duration::microseconds((seconds * 1_000_000.0) as i64)
}

/// Routes one decorated measurement into its cell's composite slot.
///
/// The cell index was resolved at configuration build, so a miss there is a
/// wiring defect rather than bad input. Out-of-range composite indices and
/// unplaceable signal kinds are soft skips.
fn assign_measurement(
    frame: &mut DataFrame,
    sorted: &SortedMeasurement,
) -> Result<(), MappingError> {
    let signal = &sorted.signal;
    let value = sorted.measurement.value;
    let cell_count = frame.cells.len();
    let cell = frame
        .cells
        .get_mut(signal.cell_index)
        .ok_or_else(|| MappingError::InternalContract {
            message: format!(
                "signal {} resolved to cell index {} but the frame has {} cells",
                signal, signal.cell_index, cell_count
            ),
        })?;

    // Indexed kinds address 1-based channel positions; an address that
    // parsed without an index suffix has no channel to land on.
    if signal.kind.is_indexed() && signal.index == 0 {
        return Err(MappingError::IndexOutOfRange {
            message: format!("{}: indexed kinds address channels starting at 1", signal),
        });
    }
    let slot = signal.index.saturating_sub(1);
    let out_of_range = |count: usize| MappingError::IndexOutOfRange {
        message: format!("{}: cell defines {} channels of that kind", signal, count),
    };

    match signal.kind {
        SignalKind::Angle => {
            let count = cell.phasors.len();
            cell.phasors.get_mut(slot).ok_or_else(|| out_of_range(count))?.angle = value;
        }
        SignalKind::Magnitude => {
            let count = cell.phasors.len();
            cell.phasors
                .get_mut(slot)
                .ok_or_else(|| out_of_range(count))?
                .magnitude = value;
        }
        SignalKind::Frequency => cell.frequency.frequency = value,
        SignalKind::DfDt => cell.frequency.dfdt = value,
        SignalKind::Status => cell.status = value as u16,
        SignalKind::Digital => {
            let count = cell.digitals.len();
            cell.digitals.get_mut(slot).ok_or_else(|| out_of_range(count))?.word = value as u16;
        }
        SignalKind::Analog => {
            let count = cell.analogs.len();
            cell.analogs.get_mut(slot).ok_or_else(|| out_of_range(count))?.value = value;
        }
        SignalKind::Calculation | SignalKind::Unknown => {
            return Err(MappingError::UnknownSignalKind {
                message: format!("{} has no composite slot in a data cell", signal),
            });
        }
    }
    cell.note_assignment();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeviceSetup, MeasurementMapping, PhasorSetup};
    use crate::channel::common::{DataFormat, NominalFrequency};
    use chrono::TimeZone;

    struct CapturePublisher {
        images: Vec<Vec<u8>>,
    }

    impl CapturePublisher {
        fn new() -> Self {
            CapturePublisher { images: vec![] }
        }
    }

    impl FramePublisher for CapturePublisher {
        fn publish(&mut self, frame_bytes: &[u8]) {
            self.images.push(frame_bytes.to_vec());
        }
    }

    fn device(acronym: &str, id_code: u16) -> DeviceSetup {
        DeviceSetup {
            acronym: acronym.to_string(),
            id_code,
            is_virtual: false,
            data_format: DataFormat::Float32,
            nominal_frequency: NominalFrequency::Hz60,
            phasors: vec![PhasorSetup {
                label: "VA".to_string(),
                scale: 1.0,
            }],
            analogs: vec![],
            digitals: vec![],
        }
    }

    fn mapping(key: &str, reference: &str) -> MeasurementMapping {
        MeasurementMapping {
            key: key.to_string(),
            signal_reference: reference.to_string(),
            multiplier: 1.0,
            adder: 0.0,
        }
    }

    fn config() -> GatewayConfig {
        GatewayConfig {
            frames_per_second: 30,
            lag_seconds: 1.0,
            lead_seconds: 1.0,
            process_data_valid_flag: false,
            auto_publish_config: Some(false),
            has_command_channel: true,
            source_offset_seconds: 0,
            time_adjustment_seconds: 0.0,
            data_loss_interval_seconds: 5.0,
            devices: vec![device("D1", 1), device("D2", 2)],
            mappings: vec![
                mapping("PPA:1", "D1-PA1"),
                mapping("PPA:1", "D2-PA1"),
                mapping("PPA:2", "D1-FQ"),
            ],
        }
    }

    fn measurement(key: &str, timestamp: DateTime<Utc>, value: f64) -> Measurement {
        Measurement {
            key: key.to_string(),
            timestamp,
            value,
        }
    }

    #[test]
    fn test_one_key_updates_every_destination() {
        let mut concentrator = Concentrator::build(&config()).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 6, 12, 0, 30).unwrap();

        concentrator.queue_measurements(&[measurement("PPA:1", now, -42.5)], now);

        assert_eq!(concentrator.buckets.len(), 1);
        let frame = concentrator.buckets.values().next().unwrap();
        assert_eq!(frame.cells[0].phasors[0].angle, -42.5);
        assert_eq!(frame.cells[1].phasors[0].angle, -42.5);
        assert_eq!(frame.sorted_count(), 2);
    }

    #[test]
    fn test_unmapped_keys_filtered_before_sorting() {
        let mut concentrator = Concentrator::build(&config()).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 6, 12, 0, 30).unwrap();

        concentrator.queue_measurements(&[measurement("NOPE:9", now, 1.0)], now);

        assert!(concentrator.buckets.is_empty());
        assert_eq!(concentrator.discarded_measurements, 0);
    }

    #[test]
    fn test_bucket_isolation() {
        let mut concentrator = Concentrator::build(&config()).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 6, 12, 0, 30).unwrap();
        let later = now + Duration::milliseconds(500);

        concentrator.queue_measurements(
            &[
                measurement("PPA:2", now, 59.98),
                measurement("PPA:2", later, 60.02),
            ],
            now,
        );

        assert_eq!(concentrator.buckets.len(), 2);
    }

    #[test]
    fn test_out_of_window_measurement_discarded() {
        let mut concentrator = Concentrator::build(&config()).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 6, 12, 0, 30).unwrap();

        concentrator.queue_measurements(
            &[
                measurement("PPA:2", now - Duration::seconds(10), 59.9),
                measurement("PPA:2", now + Duration::seconds(10), 60.1),
            ],
            now,
        );

        assert!(concentrator.buckets.is_empty());
        assert_eq!(concentrator.discarded_measurements, 2);
    }

    #[test]
    fn test_publish_due_respects_lag() {
        let mut concentrator = Concentrator::build(&config()).unwrap();
        let mut publisher = CapturePublisher::new();
        let now = Utc.with_ymd_and_hms(2024, 6, 6, 12, 0, 30).unwrap();

        concentrator.queue_measurements(&[measurement("PPA:2", now, 59.98)], now);
        assert_eq!(concentrator.publish_due(&mut publisher, now), 0);

        let after_lag = now + Duration::seconds(2);
        assert_eq!(concentrator.publish_due(&mut publisher, after_lag), 1);
        assert_eq!(publisher.images.len(), 1);
        assert_eq!(concentrator.published_frames, 1);
        assert!(concentrator.published_bytes > 0);
    }

    #[test]
    fn test_late_measurement_not_placed_into_published_bucket() {
        let mut concentrator = Concentrator::build(&config()).unwrap();
        let mut publisher = CapturePublisher::new();
        let now = Utc.with_ymd_and_hms(2024, 6, 6, 12, 0, 30).unwrap();

        concentrator.queue_measurements(&[measurement("PPA:2", now, 59.98)], now);
        concentrator.publish_due(&mut publisher, now + Duration::seconds(2));

        // Window still open relative to "now", bucket already closed
        concentrator.queue_measurements(
            &[measurement("PPA:2", now, 60.0)],
            now + Duration::milliseconds(900),
        );
        assert!(concentrator.buckets.is_empty());
        assert_eq!(concentrator.discarded_measurements, 1);
    }

    #[test]
    fn test_data_valid_flag_marks_unassigned_cells() {
        let mut cfg = config();
        cfg.process_data_valid_flag = true;
        let mut concentrator = Concentrator::build(&cfg).unwrap();
        let mut publisher = CapturePublisher::new();
        let now = Utc.with_ymd_and_hms(2024, 6, 6, 12, 0, 30).unwrap();

        concentrator.queue_measurements(&[measurement("PPA:2", now, 59.98)], now);
        concentrator.publish_due(&mut publisher, now + Duration::seconds(2));

        // Both cells were partially populated at best, so both carry the
        // data-invalid status bit in the published image.
        let image = &publisher.images[0];
        let status_one = u16::from_be_bytes([image[10], image[11]]);
        assert_ne!(status_one & crate::channel::frame::STATUS_DATA_INVALID, 0);
    }

    #[test]
    fn test_config_image_published_once_per_minute() {
        let mut cfg = config();
        cfg.auto_publish_config = Some(true);
        cfg.lag_seconds = 0.1;
        let mut concentrator = Concentrator::build(&cfg).unwrap();
        let mut publisher = CapturePublisher::new();

        // Two frames inside second zero of the same minute
        let top = Utc.with_ymd_and_hms(2024, 6, 6, 12, 1, 0).unwrap();
        for offset in [0i64, 50] {
            let ts = top + Duration::milliseconds(offset);
            concentrator.queue_measurements(&[measurement("PPA:2", ts, 60.0)], ts);
        }
        concentrator.publish_due(&mut publisher, top + Duration::seconds(1));

        // config image + 2 data frames
        assert_eq!(publisher.images.len(), 3);
        assert!(serde_json::from_slice::<GatewayConfig>(&publisher.images[0]).is_ok());
    }

    #[test]
    fn test_out_of_range_index_is_soft_skip() {
        let mut cfg = config();
        cfg.mappings.push(mapping("PPA:3", "D1-PA7"));
        let mut concentrator = Concentrator::build(&cfg).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 6, 12, 0, 30).unwrap();

        concentrator.queue_measurements(&[measurement("PPA:3", now, 1.0)], now);

        assert_eq!(concentrator.placement_skips, 1);
        assert_eq!(concentrator.sorted_measurements, 0);
        // Bucket opened, frame simply holds defaults
        assert_eq!(concentrator.buckets.len(), 1);
    }

    #[test]
    fn test_unindexed_phasor_reference_never_lands_on_first_channel() {
        let mut cfg = config();
        cfg.mappings.push(mapping("PPA:99", "D1-PA"));
        let mut concentrator = Concentrator::build(&cfg).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 6, 12, 0, 30).unwrap();

        concentrator.queue_measurements(&[measurement("PPA:99", now, 77.7)], now);

        assert_eq!(concentrator.placement_skips, 1);
        assert_eq!(concentrator.sorted_measurements, 0);
        let frame = concentrator.buckets.values().next().unwrap();
        assert_eq!(frame.cells[0].phasors[0].angle, 0.0);
    }

    #[test]
    fn test_resort_same_destination_counts_once() {
        let mut concentrator = Concentrator::build(&config()).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 6, 12, 0, 30).unwrap();

        concentrator.queue_measurements(&[measurement("PPA:2", now, 59.98)], now);
        concentrator.queue_measurements(&[measurement("PPA:2", now, 59.99)], now);

        assert_eq!(concentrator.sorted_measurements, 1);
        let frame = concentrator.buckets.values().next().unwrap();
        assert_eq!(frame.cells[0].frequency.frequency, 59.99);
    }

    #[test]
    fn test_published_cells_seed_next_bucket() {
        let mut concentrator = Concentrator::build(&config()).unwrap();
        let mut publisher = CapturePublisher::new();
        let now = Utc.with_ymd_and_hms(2024, 6, 6, 12, 0, 30).unwrap();

        concentrator.queue_measurements(&[measurement("PPA:2", now, 59.5)], now);
        concentrator.publish_due(&mut publisher, now + Duration::seconds(2));

        let next = now + Duration::seconds(3);
        concentrator.queue_measurements(&[measurement("PPA:1", next, 10.0)], next);
        let frame = concentrator.buckets.values().next().unwrap();
        // Frequency carries the last published value as its default
        assert_eq!(frame.cells[0].frequency.frequency, 59.5);
    }

    #[test]
    fn test_reset_lifetime_counters() {
        let mut concentrator = Concentrator::build(&config()).unwrap();
        let now = Utc.with_ymd_and_hms(2024, 6, 6, 12, 0, 30).unwrap();
        concentrator.queue_measurements(&[measurement("PPA:1", now, 1.0)], now);
        assert!(concentrator.status(now).sorted_measurements > 0);

        concentrator.reset_lifetime_counters();
        let status = concentrator.status(now);
        assert_eq!(status.sorted_measurements, 0);
        assert_eq!(status.published_frames, 0);
    }
}
