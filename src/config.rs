//! # Configuration Snapshots
//!
//! This module defines the read-only configuration tables supplied by an
//! external loader at initialization and on explicit reload: the device
//! table, the per-device channel tables and the measurement-to-signal-
//! reference table. The engine never mutates a snapshot; a reload builds a
//! fresh snapshot and swaps it in atomically.
//!
//! ## Key Components
//!
//! - `DeviceSetup` plus `PhasorSetup` / `AnalogSetup` / `DigitalSetup`: one
//!   output or expected device and its ordered channel definitions.
//! - `MeasurementMapping`: one row of the measurement key to signal
//!   reference table.
//! - `GatewayConfig`: the complete snapshot, serde round-trippable.
//!
//! ## Usage
//!
//! `GatewayConfig::cell_templates` resolves devices into `CellTemplate`s,
//! isolating malformed rows: a device that fails to build is logged and
//! skipped so the remaining configuration still loads.

use crate::channel::common::{DataFormat, NominalFrequency, ParseError};
use crate::channel::frame::CellTemplate;
use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One phasor channel definition: label plus the units-per-step scale used
/// by the fixed-integer encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhasorSetup {
    pub label: String,
    pub scale: f64,
}

/// One analog channel definition with its linear adjustment pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalogSetup {
    pub label: String,
    pub multiplier: f64,
    pub adder: f64,
}

/// One digital channel definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigitalSetup {
    pub label: String,
}

/// One device row: identity, data format and ordered channel tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSetup {
    pub acronym: String,
    pub id_code: u16,
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub data_format: DataFormat,
    #[serde(default)]
    pub nominal_frequency: NominalFrequency,
    #[serde(default)]
    pub phasors: Vec<PhasorSetup>,
    #[serde(default)]
    pub analogs: Vec<AnalogSetup>,
    #[serde(default)]
    pub digitals: Vec<DigitalSetup>,
}

impl DeviceSetup {
    /// Resolves this row into a cell template.
    pub fn cell_template(&self) -> Result<CellTemplate, ParseError> {
        let acronym = self.acronym.trim().to_uppercase();
        if acronym.is_empty() {
            return Err(ParseError::InvalidConfiguration {
                message: format!("device with ID code {} has an empty acronym", self.id_code),
            });
        }
        for phasor in &self.phasors {
            if phasor.scale < 0.0 {
                return Err(ParseError::InvalidConfiguration {
                    message: format!(
                        "device {}: phasor \"{}\" has a negative scale",
                        acronym, phasor.label
                    ),
                });
            }
        }
        Ok(CellTemplate {
            acronym,
            id_code: self.id_code,
            format: self.data_format,
            nominal: self.nominal_frequency,
            phasor_scales: self.phasors.iter().map(|p| p.scale).collect(),
            analog_factors: self
                .analogs
                .iter()
                .map(|a| (if a.multiplier == 0.0 { 1.0 } else { a.multiplier }, a.adder))
                .collect(),
            digital_count: self.digitals.len(),
        })
    }
}

/// One row of the measurement-to-signal-reference table.
///
/// `key` is the opaque point identity of the source measurement; the same
/// key may appear on multiple rows when one measurement populates several
/// destination slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasurementMapping {
    pub key: String,
    pub signal_reference: String,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    #[serde(default)]
    pub adder: f64,
}

fn default_multiplier() -> f64 {
    1.0
}

fn default_frames_per_second() -> u16 {
    30
}

fn default_lag_seconds() -> f64 {
    3.0
}

fn default_lead_seconds() -> f64 {
    1.0
}

fn default_data_loss_seconds() -> f64 {
    5.0
}

/// The complete read-only configuration snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_frames_per_second")]
    pub frames_per_second: u16,
    /// Seconds to wait past a bucket's timestamp before publishing it.
    #[serde(default = "default_lag_seconds")]
    pub lag_seconds: f64,
    /// Seconds a timestamp may lead the wall clock before being discarded.
    #[serde(default = "default_lead_seconds")]
    pub lead_seconds: f64,
    /// Mark a cell data-invalid at publication when not all of its expected
    /// values arrived.
    #[serde(default)]
    pub process_data_valid_flag: bool,
    /// Republish the configuration image at the top of each UTC minute.
    /// When unset, defaults to true exactly when no command channel exists
    /// to request it on demand.
    #[serde(default)]
    pub auto_publish_config: Option<bool>,
    /// Whether a command channel is configured for on-demand configuration
    /// requests.
    #[serde(default)]
    pub has_command_channel: bool,
    /// Offset of the source device clock from UTC, in seconds. Subtracted
    /// from inbound frame timestamps to normalize them to UTC.
    #[serde(default)]
    pub source_offset_seconds: i32,
    /// Manual fine-tuning adjustment added to inbound frame timestamps
    /// after the UTC correction, in seconds.
    #[serde(default)]
    pub time_adjustment_seconds: f64,
    /// Data-silence interval for the inbound watchdog, in seconds.
    #[serde(default = "default_data_loss_seconds")]
    pub data_loss_interval_seconds: f64,
    pub devices: Vec<DeviceSetup>,
    #[serde(default)]
    pub mappings: Vec<MeasurementMapping>,
}

impl GatewayConfig {
    /// Resolves device rows into cell templates, preserving configured
    /// order. Malformed rows and duplicate identities are logged and
    /// skipped; the remaining configuration still loads.
    pub fn cell_templates(&self) -> Vec<CellTemplate> {
        let mut templates: Vec<CellTemplate> = Vec::with_capacity(self.devices.len());
        let mut seen_acronyms: HashSet<String> = HashSet::new();
        let mut seen_ids: HashSet<u16> = HashSet::new();

        for device in &self.devices {
            match device.cell_template() {
                Ok(template) => {
                    if !seen_acronyms.insert(template.acronym.clone()) {
                        warn!(
                            "Skipping device \"{}\": duplicate acronym in configuration",
                            template.acronym
                        );
                        continue;
                    }
                    if !seen_ids.insert(template.id_code) {
                        warn!(
                            "Skipping device \"{}\": duplicate ID code {}",
                            template.acronym, template.id_code
                        );
                        continue;
                    }
                    templates.push(template);
                }
                Err(e) => {
                    warn!("Skipping malformed device definition: {}", e);
                }
            }
        }
        templates
    }

    /// The effective auto-publish policy: an explicit setting wins,
    /// otherwise publish automatically only when no command channel exists.
    pub fn auto_publish_config_frame(&self) -> bool {
        self.auto_publish_config
            .unwrap_or(!self.has_command_channel)
    }

    /// Serializes the snapshot to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Loads a snapshot from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
