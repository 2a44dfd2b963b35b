//! # Inbound Measurement Mapping
//!
//! This module converts parsed inbound frames into generically addressed
//! measurements and tracks the health of the devices producing them. Each
//! frame's timestamp is normalized to UTC and fine-tuned, each cell is
//! resolved against the device registry, per-device quality counters are
//! accumulated, and every composite value is looked up in the measurement
//! definition table by its canonical signal reference string.
//!
//! ## Key Components
//!
//! - `Mapper`: per-connection extraction engine, registry owner and
//!   connection state machine.
//! - `MappedMeasurement`: one extracted value stamped with its destination
//!   identity and linear adjustment.
//! - `DataMonitor`: data-silence watchdog thread; fires one reconnect
//!   request per silent interval and stays idle until restarted.
//! - `DeviceCommand`: protocol commands surfaced through a polled queue
//!   rather than callbacks.
//!
//! ## Usage
//!
//! The transport layer calls `on_bytes_received` from its I/O thread and
//! feeds parsed frames to `extract_frame`; the caller drains `poll_command`
//! and the watchdog's request channel on its own schedule.

use crate::channel::frame::{DataCell, DataFrame};
use crate::channel::signal::{SignalKind, SignalReference};
use crate::config::GatewayConfig;
use crate::registry::{DeviceRecord, DeviceRegistry, UnknownDeviceTable};
use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration as StdDuration;

/// One extracted composite value addressed for the host system.
///
/// `multiplier` and `adder` travel with the measurement so the consumer can
/// apply the configured linear adjustment where it sees fit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappedMeasurement {
    pub key: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub multiplier: f64,
    pub adder: f64,
}

impl MappedMeasurement {
    /// The value with the configured linear adjustment applied.
    pub fn adjusted_value(&self) -> f64 {
        self.value * self.multiplier + self.adder
    }
}

/// Destination identity and adjustment for one signal reference.
#[derive(Debug, Clone)]
struct MeasurementMetadata {
    key: String,
    multiplier: f64,
    adder: f64,
}

/// Connection lifecycle of the inbound link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Protocol commands the caller's transport should forward to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    SendConfiguration,
    EnableRealTimeData,
    DisableRealTimeData,
}

/// Snapshot of the mapper's state and lifetime counters.
#[derive(Debug, Clone, Serialize)]
pub struct MapperStatus {
    pub state: ConnectionState,
    pub total_frames: u64,
    pub out_of_order_frames: u64,
    pub mapped_measurements: u64,
    pub configuration_cached: bool,
    pub devices: Vec<DeviceRecord>,
    pub unknown_devices: Vec<(u16, u64)>,
}

/// Inbound extraction engine for one device connection (single device or a
/// downstream concentrator carrying many).
pub struct Mapper {
    registry: DeviceRegistry,
    measurements: HashMap<String, MeasurementMetadata>,
    unknown_devices: UnknownDeviceTable,
    source_offset: Duration,
    time_adjustment: Duration,
    data_loss_interval: StdDuration,
    state: ConnectionState,
    commands: VecDeque<DeviceCommand>,
    received_configuration: bool,
    cached_configuration: Option<Vec<u8>>,
    bytes_received: Arc<AtomicU64>,
    monitor: Option<DataMonitor>,
    last_report_time: Option<DateTime<Utc>>,
    total_frames: u64,
    out_of_order_frames: u64,
    mapped_measurements: u64,
}

impl Mapper {
    /// Builds a mapper from a configuration snapshot: registers every
    /// expected device by ID code and loads the measurement definition
    /// table keyed by canonical signal reference form. Rows with an
    /// unknown signal kind are logged and skipped.
    pub fn build(config: &GatewayConfig) -> Self {
        let mut registry = DeviceRegistry::new();
        for template in config.cell_templates() {
            registry.register(&template.acronym, template.id_code);
        }

        let mut measurements = HashMap::new();
        for mapping in &config.mappings {
            let signal = SignalReference::parse(&mapping.signal_reference);
            if signal.kind == SignalKind::Unknown {
                warn!(
                    "Skipping measurement definition \"{}\": unknown signal kind in \"{}\"",
                    mapping.key, mapping.signal_reference
                );
                continue;
            }
            measurements.insert(
                signal.to_string(),
                MeasurementMetadata {
                    key: mapping.key.clone(),
                    multiplier: mapping.multiplier,
                    adder: mapping.adder,
                },
            );
        }
        info!(
            "Mapper configured: {} expected devices, {} measurement definitions",
            registry.len(),
            measurements.len()
        );

        Mapper {
            registry,
            measurements,
            unknown_devices: UnknownDeviceTable::new(),
            source_offset: seconds_to_duration(config.source_offset_seconds as f64),
            time_adjustment: seconds_to_duration(config.time_adjustment_seconds),
            data_loss_interval: StdDuration::from_secs_f64(
                config.data_loss_interval_seconds.max(0.001),
            ),
            state: ConnectionState::Disconnected,
            commands: VecDeque::new(),
            received_configuration: false,
            cached_configuration: None,
            bytes_received: Arc::new(AtomicU64::new(0)),
            monitor: None,
            last_report_time: None,
            total_frames: 0,
            out_of_order_frames: 0,
            mapped_measurements: 0,
        }
    }

    /// Extracts every mappable composite value from a parsed frame.
    ///
    /// The frame timestamp is normalized to UTC (source clock offset) and
    /// fine-tuned before stamping. Cells from unregistered devices are
    /// counted and reported on first sight only; a registered cell always
    /// bumps its device's quality counters, mapped or not.
    pub fn extract_frame(&mut self, frame: &DataFrame) -> Vec<MappedMeasurement> {
        let timestamp = frame.timestamp - self.source_offset + self.time_adjustment;

        self.total_frames += 1;
        if let Some(last) = self.last_report_time {
            if timestamp < last {
                self.out_of_order_frames += 1;
                debug!(
                    "Out-of-order frame: {} arrived after {}",
                    timestamp, last
                );
            }
        }
        if self.last_report_time.map_or(true, |last| timestamp > last) {
            self.last_report_time = Some(timestamp);
        }

        let mut batch = Vec::new();
        let mut configuration_changed = false;

        for cell in &frame.cells {
            let acronym = match self.registry.get_mut(cell.id_code) {
                Some(record) => {
                    record.total_frames += 1;
                    if !cell.data_is_valid() {
                        record.data_quality_errors += 1;
                    }
                    if !cell.time_is_valid() {
                        record.time_quality_errors += 1;
                    }
                    if cell.device_error() {
                        record.device_errors += 1;
                    }
                    if record.last_report_time.map_or(true, |last| timestamp > last) {
                        record.last_report_time = Some(timestamp);
                    }
                    record.acronym.clone()
                }
                None => {
                    if self.unknown_devices.note(cell.id_code) {
                        warn!(
                            "Encountered a device with ID code {} that has no definition; \
                             its cells will be counted but not mapped",
                            cell.id_code
                        );
                    }
                    continue;
                }
            };

            if cell.configuration_changed() {
                configuration_changed = true;
            }
            self.map_cell(&acronym, cell, timestamp, &mut batch);
        }

        if configuration_changed {
            self.note_configuration_change();
        }
        self.mapped_measurements += batch.len() as u64;
        batch
    }

    // Walks every composite slot of one cell, synthesizing the canonical
    // signal reference string for each and emitting the values that have a
    // measurement definition.
    fn map_cell(
        &self,
        acronym: &str,
        cell: &DataCell,
        timestamp: DateTime<Utc>,
        batch: &mut Vec<MappedMeasurement>,
    ) {
        self.map_value(batch, acronym, SignalKind::Status, 0, cell.status as f64, timestamp);

        for (i, phasor) in cell.phasors.iter().enumerate() {
            self.map_value(batch, acronym, SignalKind::Angle, i + 1, phasor.angle, timestamp);
            self.map_value(
                batch,
                acronym,
                SignalKind::Magnitude,
                i + 1,
                phasor.magnitude,
                timestamp,
            );
        }

        self.map_value(
            batch,
            acronym,
            SignalKind::Frequency,
            0,
            cell.frequency.frequency,
            timestamp,
        );
        self.map_value(batch, acronym, SignalKind::DfDt, 0, cell.frequency.dfdt, timestamp);

        for (i, analog) in cell.analogs.iter().enumerate() {
            self.map_value(batch, acronym, SignalKind::Analog, i + 1, analog.value, timestamp);
        }
        for (i, digital) in cell.digitals.iter().enumerate() {
            self.map_value(
                batch,
                acronym,
                SignalKind::Digital,
                i + 1,
                digital.word as f64,
                timestamp,
            );
        }
    }

    fn map_value(
        &self,
        batch: &mut Vec<MappedMeasurement>,
        acronym: &str,
        kind: SignalKind,
        index: usize,
        value: f64,
        timestamp: DateTime<Utc>,
    ) {
        let name = SignalReference::name_of(acronym, kind, index);
        if let Some(metadata) = self.measurements.get(&name) {
            batch.push(MappedMeasurement {
                key: metadata.key.clone(),
                timestamp,
                value,
                multiplier: metadata.multiplier,
                adder: metadata.adder,
            });
        }
    }

    // A device signaled a configuration change: clear the received-config
    // latch and ask for a fresh configuration frame. Latched, so repeated
    // notifications before the new frame arrives request it once.
    fn note_configuration_change(&mut self) {
        if !self.received_configuration {
            return;
        }
        info!("Device configuration change notification; requesting a fresh configuration frame");
        self.received_configuration = false;
        self.commands.push_back(DeviceCommand::SendConfiguration);
    }

    /// Caches a received configuration frame image. Only the first frame
    /// per latch cycle is cached; repeats return `false` and are dropped.
    pub fn cache_configuration_frame(&mut self, image: &[u8]) -> bool {
        if self.received_configuration {
            debug!("Duplicate configuration frame ignored ({} bytes)", image.len());
            return false;
        }
        self.cached_configuration = Some(image.to_vec());
        self.received_configuration = true;
        info!("Configuration frame cached ({} bytes)", image.len());
        self.commands.push_back(DeviceCommand::EnableRealTimeData);
        true
    }

    /// The most recently cached configuration frame image, if any.
    pub fn cached_configuration(&self) -> Option<&[u8]> {
        self.cached_configuration.as_deref()
    }

    /// Begins a connection cycle: requests a configuration frame and, if a
    /// watchdog is running, restarts its silence interval.
    pub fn start_connection(&mut self) {
        self.state = ConnectionState::Connecting;
        self.commands.push_back(DeviceCommand::SendConfiguration);
        if let Some(monitor) = &self.monitor {
            monitor.restart();
        }
    }

    /// The transport reports an established link.
    pub fn on_connection_established(&mut self) {
        self.state = ConnectionState::Connected;
        if let Some(monitor) = &self.monitor {
            monitor.restart();
        }
    }

    /// Stops the connection: tells the device to stop streaming and drops
    /// to `Disconnected`. The watchdog, if any, is stopped with it.
    pub fn stop_connection(&mut self) {
        if self.state == ConnectionState::Connected {
            self.commands.push_back(DeviceCommand::DisableRealTimeData);
        }
        self.state = ConnectionState::Disconnected;
        if let Some(mut monitor) = self.monitor.take() {
            monitor.stop();
        }
    }

    /// Records received transport bytes. Callable from the I/O thread; any
    /// nonzero count within a watchdog interval keeps the link alive.
    pub fn on_bytes_received(&self, count: usize) {
        self.bytes_received.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Next pending protocol command, if any.
    pub fn poll_command(&mut self) -> Option<DeviceCommand> {
        self.commands.pop_front()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.state
    }

    /// Starts the data-silence watchdog, returning the channel on which it
    /// delivers reconnect requests. Replaces any previous watchdog.
    pub fn start_data_monitor(&mut self) -> Receiver<()> {
        if let Some(mut monitor) = self.monitor.take() {
            monitor.stop();
        }
        let (monitor, requests) =
            DataMonitor::start(self.data_loss_interval, self.bytes_received.clone());
        self.monitor = Some(monitor);
        requests
    }

    /// Current state and counters.
    pub fn status(&self) -> MapperStatus {
        MapperStatus {
            state: self.state,
            total_frames: self.total_frames,
            out_of_order_frames: self.out_of_order_frames,
            mapped_measurements: self.mapped_measurements,
            configuration_cached: self.received_configuration,
            devices: self.registry.snapshot(),
            unknown_devices: self.unknown_devices.snapshot(),
        }
    }
}

fn seconds_to_duration(seconds: f64) -> Duration {
    Duration::microseconds((seconds * 1_000_000.0) as i64)
}

enum MonitorControl {
    Restart,
    Stop,
}

/// Data-silence watchdog.
///
/// A monitor thread samples a shared received-byte counter once per
/// interval. When a full interval passes with no movement it sends exactly
/// one reconnect request, then idles until restarted - a half-open link
/// produces one request per reconnect cycle, not one per interval.
pub struct DataMonitor {
    control: Sender<MonitorControl>,
    handle: Option<thread::JoinHandle<()>>,
}

impl DataMonitor {
    /// Spawns the monitor thread. Reconnect requests arrive on the
    /// returned channel.
    pub fn start(interval: StdDuration, bytes_received: Arc<AtomicU64>) -> (Self, Receiver<()>) {
        let (control_tx, control_rx) = mpsc::channel();
        let (request_tx, request_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("data-monitor".to_string())
            .spawn(move || monitor_loop(interval, bytes_received, control_rx, request_tx));
        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Data monitor thread failed to start: {}", e);
                None
            }
        };
        (
            DataMonitor {
                control: control_tx,
                handle,
            },
            request_rx,
        )
    }

    /// Restarts the silence interval, e.g. after a successful reconnect.
    pub fn restart(&self) {
        let _ = self.control.send(MonitorControl::Restart);
    }

    /// Stops the monitor thread and waits for it to exit.
    pub fn stop(&mut self) {
        let _ = self.control.send(MonitorControl::Stop);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DataMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn monitor_loop(
    interval: StdDuration,
    bytes_received: Arc<AtomicU64>,
    control: Receiver<MonitorControl>,
    requests: Sender<()>,
) {
    let mut observed = bytes_received.load(Ordering::Relaxed);
    loop {
        match control.recv_timeout(interval) {
            Ok(MonitorControl::Restart) => observed = bytes_received.load(Ordering::Relaxed),
            Ok(MonitorControl::Stop) | Err(RecvTimeoutError::Disconnected) => return,
            Err(RecvTimeoutError::Timeout) => {
                let current = bytes_received.load(Ordering::Relaxed);
                if current != observed {
                    observed = current;
                    continue;
                }
                warn!(
                    "No data received in {:.1} seconds; requesting a reconnect cycle",
                    interval.as_secs_f64()
                );
                if requests.send(()).is_err() {
                    return;
                }
                // Single shot: idle until the caller restarts the cycle
                match control.recv() {
                    Ok(MonitorControl::Restart) => {
                        observed = bytes_received.load(Ordering::Relaxed)
                    }
                    Ok(MonitorControl::Stop) | Err(_) => return,
                }
            }
        }
    }
}
