//! # Frames and Device Cells
//!
//! This module defines the structural heart of the composite channel model:
//! a `DataFrame` owns an ordered sequence of `DataCell`s (one per physical
//! or virtual device), and a cell owns its typed composite value
//! collections. Both compose the `FrameImage` contract recursively, so a
//! frame's body image is the concatenation of its cells' images and a
//! cell's image is its header fields followed by its values' images.
//!
//! ## Key Components
//!
//! - `CellTemplate`: The configuration-resolved shape of one device's cell
//!   (format, nominal frequency, per-channel scales). Templates must exist
//!   before any body image can be generated or parsed.
//! - `DataCell`: One device's readings within a frame, with validity flags
//!   carried in a 16-bit status word.
//! - `DataFrame`: One complete cross-device sample with a UTC timestamp and
//!   a running count of measurements sorted into it.
//!
//! ## Usage
//!
//! A concrete protocol adapter wraps `body_length` / `write_body_image` /
//! `parse_body_image` with its own sync bytes, frame-type discriminant and
//! footer. Frames are created empty at the start of a timing window or upon
//! parse of an inbound image, mutated, then published or forwarded - never
//! reused.

use super::common::{require_bytes, DataFormat, FrameImage, NominalFrequency, ParseError};
use super::values::{AnalogValue, DigitalValue, FrequencyValue, PhasorValue};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Data invalid flag (set when the device reports bad data, or when expected
/// values did not arrive before publication).
pub const STATUS_DATA_INVALID: u16 = 0x8000;
/// Device hardware error flag.
pub const STATUS_DEVICE_ERROR: u16 = 0x4000;
/// Time synchronization lost flag.
pub const STATUS_TIME_INVALID: u16 = 0x2000;
/// Device-initiated configuration change notification flag.
pub const STATUS_CONFIG_CHANGE: u16 = 0x0400;

/// The configuration-resolved shape of one device's cell.
///
/// Composite value counts and encodings are fixed by the device's
/// configuration and must match across every frame referencing the device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellTemplate {
    pub acronym: String,
    pub id_code: u16,
    pub format: DataFormat,
    pub nominal: NominalFrequency,
    /// Units-per-step scale for each phasor channel, in configured order.
    pub phasor_scales: Vec<f64>,
    /// (multiplier, adder) for each analog channel, in configured order.
    pub analog_factors: Vec<(f64, f64)>,
    pub digital_count: usize,
}

impl CellTemplate {
    /// Builds an empty cell matching this template: zeroed phasors, the
    /// frequency at nominal, zeroed analogs and digitals, all flags clear.
    pub fn build_cell(&self) -> DataCell {
        DataCell {
            id_code: self.id_code,
            status: 0,
            phasors: self
                .phasor_scales
                .iter()
                .map(|scale| PhasorValue::new(self.format, *scale))
                .collect(),
            frequency: FrequencyValue::new(self.format, self.nominal),
            analogs: self
                .analog_factors
                .iter()
                .map(|(multiplier, adder)| AnalogValue::new(self.format, *multiplier, *adder))
                .collect(),
            digitals: vec![DigitalValue::default(); self.digital_count],
            assigned: 0,
        }
    }
}

/// One device's readings within a frame.
///
/// Validity flags live in the raw 16-bit status word; the per-connection
/// quality counters they feed belong to the device's definition record in
/// the registry, not to this transient cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataCell {
    pub id_code: u16,
    /// Raw status word; see the `STATUS_*` flag constants.
    pub status: u16,
    pub phasors: Vec<PhasorValue>,
    pub frequency: FrequencyValue,
    pub analogs: Vec<AnalogValue>,
    pub digitals: Vec<DigitalValue>,
    // Count of composite slots assigned since the cell was created
    #[serde(skip)]
    assigned: usize,
}

impl DataCell {
    pub fn data_is_valid(&self) -> bool {
        self.status & STATUS_DATA_INVALID == 0
    }

    pub fn set_data_valid(&mut self, valid: bool) {
        if valid {
            self.status &= !STATUS_DATA_INVALID;
        } else {
            self.status |= STATUS_DATA_INVALID;
        }
    }

    pub fn time_is_valid(&self) -> bool {
        self.status & STATUS_TIME_INVALID == 0
    }

    pub fn set_time_valid(&mut self, valid: bool) {
        if valid {
            self.status &= !STATUS_TIME_INVALID;
        } else {
            self.status |= STATUS_TIME_INVALID;
        }
    }

    pub fn device_error(&self) -> bool {
        self.status & STATUS_DEVICE_ERROR != 0
    }

    pub fn set_device_error(&mut self, error: bool) {
        if error {
            self.status |= STATUS_DEVICE_ERROR;
        } else {
            self.status &= !STATUS_DEVICE_ERROR;
        }
    }

    pub fn configuration_changed(&self) -> bool {
        self.status & STATUS_CONFIG_CHANGE != 0
    }

    /// Records one composite slot assignment.
    pub fn note_assignment(&mut self) {
        self.assigned += 1;
    }

    pub fn assigned_count(&self) -> usize {
        self.assigned
    }

    /// Whether every composite slot, status included, received a value.
    pub fn all_values_assigned(&self) -> bool {
        self.assigned >= 2 * self.phasors.len() + 2 + self.analogs.len() + self.digitals.len() + 1
    }

    /// Resets the assignment counter, keeping current values as last-known
    /// defaults for the next timing window.
    pub fn reset_assignments(&mut self) {
        self.assigned = 0;
    }
}

impl FrameImage for DataCell {
    fn byte_length(&self) -> usize {
        let mut length = 4; // id_code + status
        length += self.phasors.iter().map(|p| p.byte_length()).sum::<usize>();
        length += self.frequency.byte_length();
        length += self.analogs.iter().map(|a| a.byte_length()).sum::<usize>();
        length += self.digitals.iter().map(|d| d.byte_length()).sum::<usize>();
        length
    }

    fn write_image(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.id_code.to_be_bytes());
        out.extend_from_slice(&self.status.to_be_bytes());
        for phasor in &self.phasors {
            phasor.write_image(out);
        }
        self.frequency.write_image(out);
        for analog in &self.analogs {
            analog.write_image(out);
        }
        for digital in &self.digitals {
            digital.write_image(out);
        }
    }

    fn parse_image(
        &mut self,
        buffer: &[u8],
        start: usize,
        length: usize,
    ) -> Result<usize, ParseError> {
        require_bytes("DataCell header", 4, buffer, start, length)?;
        let parsed_id = u16::from_be_bytes([buffer[start], buffer[start + 1]]);
        if parsed_id != self.id_code {
            return Err(ParseError::InvalidFormat {
                message: format!(
                    "DataCell: expected device ID code {}, image carries {}",
                    self.id_code, parsed_id
                ),
            });
        }
        self.status = u16::from_be_bytes([buffer[start + 2], buffer[start + 3]]);
        let mut offset = start + 4;
        let mut remaining = length - 4;

        for phasor in &mut self.phasors {
            let consumed = phasor.parse_image(buffer, offset, remaining)?;
            offset += consumed;
            remaining -= consumed;
        }
        let consumed = self.frequency.parse_image(buffer, offset, remaining)?;
        offset += consumed;
        remaining -= consumed;
        for analog in &mut self.analogs {
            let consumed = analog.parse_image(buffer, offset, remaining)?;
            offset += consumed;
            remaining -= consumed;
        }
        for digital in &mut self.digitals {
            let consumed = digital.parse_image(buffer, offset, remaining)?;
            offset += consumed;
            remaining -= consumed;
        }

        Ok(offset - start)
    }
}

/// One complete, time-stamped, multi-device sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataFrame {
    pub timestamp: DateTime<Utc>,
    pub cells: Vec<DataCell>,
    // Measurement keys sorted into this frame. A key re-sorted into the
    // same frame (down-sampling) counts once.
    #[serde(skip)]
    sorted_keys: HashSet<String>,
}

impl DataFrame {
    /// Creates an empty frame with one cell per template, in template order.
    pub fn from_templates(timestamp: DateTime<Utc>, templates: &[CellTemplate]) -> Self {
        DataFrame {
            timestamp,
            cells: templates.iter().map(|t| t.build_cell()).collect(),
            sorted_keys: HashSet::new(),
        }
    }

    /// Creates a frame from pre-built cells, preserving their current
    /// values as last-known defaults for channels that go unreported.
    pub fn with_cells(timestamp: DateTime<Utc>, cells: Vec<DataCell>) -> Self {
        DataFrame {
            timestamp,
            cells,
            sorted_keys: HashSet::new(),
        }
    }

    /// Records a successfully placed measurement key. Returns `true` when
    /// the key was not already counted for this frame.
    pub fn record_sorted(&mut self, key: &str) -> bool {
        self.sorted_keys.insert(key.to_string())
    }

    /// Number of distinct measurements successfully placed into this frame.
    pub fn sorted_count(&self) -> usize {
        self.sorted_keys.len()
    }

    /// Length in bytes of the cell body (no timestamp header).
    pub fn body_length(&self) -> usize {
        self.cells.iter().map(|c| c.byte_length()).sum()
    }

    /// Appends the concatenated cell images. A protocol adapter wraps this
    /// with its own header and footer.
    pub fn write_body_image(&self, out: &mut Vec<u8>) {
        for cell in &self.cells {
            cell.write_image(out);
        }
    }

    /// Parses the cell body from a byte image, returning bytes consumed.
    /// The frame must have been built from templates first; value counts and
    /// encodings come from configuration, not from the image.
    pub fn parse_body_image(
        &mut self,
        buffer: &[u8],
        start: usize,
        length: usize,
    ) -> Result<usize, ParseError> {
        let mut offset = start;
        let mut remaining = length;
        for cell in &mut self.cells {
            let consumed = cell.parse_image(buffer, offset, remaining)?;
            offset += consumed;
            remaining -= consumed;
        }
        Ok(offset - start)
    }
}

impl FrameImage for DataFrame {
    fn byte_length(&self) -> usize {
        8 + self.body_length()
    }

    fn write_image(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.timestamp.timestamp_micros().to_be_bytes());
        self.write_body_image(out);
    }

    fn parse_image(
        &mut self,
        buffer: &[u8],
        start: usize,
        length: usize,
    ) -> Result<usize, ParseError> {
        require_bytes("DataFrame timestamp", 8, buffer, start, length)?;
        let micros = i64::from_be_bytes(
            buffer[start..start + 8]
                .try_into()
                .map_err(|_| ParseError::InvalidFormat {
                    message: "DataFrame: timestamp field unreadable".to_string(),
                })?,
        );
        self.timestamp =
            DateTime::from_timestamp_micros(micros).ok_or_else(|| ParseError::InvalidFormat {
                message: format!("DataFrame: timestamp {} out of range", micros),
            })?;
        let consumed = self.parse_body_image(buffer, start + 8, length - 8)?;
        Ok(8 + consumed)
    }
}
