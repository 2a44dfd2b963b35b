//! # Shared Channel Model Types
//!
//! This module defines the types shared by every element of the composite
//! channel model: the error taxonomy for frame parsing and measurement
//! mapping, the per-device data format selection, the nominal line frequency,
//! and the `FrameImage` contract that frames, cells and values implement to
//! produce and consume their big-endian wire images.
//!
//! ## Key Components
//!
//! - `ParseError`: Enumerates errors encountered while parsing a frame image,
//!   such as insufficient buffer length or a malformed field.
//! - `MappingError`: Soft failures raised while routing measurements into or
//!   out of frame cells (out-of-range indices, unplaceable signal kinds).
//! - `DataFormat`: Per-device choice between 16-bit scaled-integer and 32-bit
//!   floating-point serialization of composite values.
//! - `NominalFrequency`: 50 Hz / 60 Hz line frequency, the reference for
//!   fixed-point frequency deviation encoding.
//! - `FrameImage`: The binary image contract - byte length, image production
//!   and image parsing - composed recursively by frames, cells and values.
//!
//! ## Usage
//!
//! Every module in this crate builds on these types. Protocol adapters wrap
//! the `FrameImage` body hooks with their own header and footer layouts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Represents errors that can occur while parsing a frame image.
///
/// Parse failures are confined to the responsible frame: a frame that fails
/// to parse is reported upward without corrupting previously parsed frames.
///
/// # Variants
///
/// * `InvalidLength`: Buffer is too short for the declared structure.
/// * `InvalidFormat`: A field does not conform to the expected layout.
/// * `InvalidConfiguration`: A device or channel definition is malformed.
#[derive(Debug)]
pub enum ParseError {
    InvalidLength { message: String },
    InvalidFormat { message: String },
    InvalidConfiguration { message: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::InvalidLength { message } => write!(f, "Invalid length: {}", message),
            ParseError::InvalidFormat { message } => write!(f, "Invalid format: {}", message),
            ParseError::InvalidConfiguration { message } => {
                write!(f, "Invalid configuration: {}", message)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Soft failures raised while routing a measurement into or out of a cell.
///
/// None of these are fatal: the affected measurement is skipped and counted,
/// and processing continues with the next one.
///
/// # Variants
///
/// * `IndexOutOfRange`: A composite index exceeds the cell's configured
///   count, or an indexed kind carries no index at all.
/// * `UnknownSignalKind`: A signal reference with an unrecognized type code.
/// * `InternalContract`: A defect-class wiring error; indicates a bug in the
///   caller, not an environmental condition.
#[derive(Debug)]
pub enum MappingError {
    IndexOutOfRange { message: String },
    UnknownSignalKind { message: String },
    InternalContract { message: String },
}

impl fmt::Display for MappingError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MappingError::IndexOutOfRange { message } => {
                write!(f, "Composite index out of range: {}", message)
            }
            MappingError::UnknownSignalKind { message } => {
                write!(f, "Unknown signal kind: {}", message)
            }
            MappingError::InternalContract { message } => {
                write!(f, "Internal contract violation: {}", message)
            }
        }
    }
}

impl std::error::Error for MappingError {}

/// Per-device serialization format for composite numeric values.
///
/// This is a runtime selection resolved from configuration at the cell
/// definition level before any body image is generated or parsed, not a
/// compile-time type choice. Every composite value in a cell follows the
/// cell's format.
///
/// # Variants
///
/// * `FixedInt16`: Values serialize as scaled 16-bit signed integers.
/// * `Float32`: Values serialize as IEEE 754 32-bit floats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataFormat {
    FixedInt16,
    Float32,
}

impl DataFormat {
    /// Size in bytes of one scalar in this format.
    pub fn scalar_size(&self) -> usize {
        match self {
            DataFormat::FixedInt16 => 2,
            DataFormat::Float32 => 4,
        }
    }

    /// Size in bytes of one phasor (two scalars) in this format.
    pub fn phasor_size(&self) -> usize {
        2 * self.scalar_size()
    }
}

impl Default for DataFormat {
    fn default() -> Self {
        DataFormat::Float32
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DataFormat::FixedInt16 => write!(f, "16-bit scaled integer"),
            DataFormat::Float32 => write!(f, "32-bit floating point"),
        }
    }
}

/// Nominal line frequency of a device.
///
/// Fixed-integer frequency values serialize as deviation from this nominal
/// in millihertz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NominalFrequency {
    Hz50,
    Hz60,
}

impl NominalFrequency {
    pub fn hz(&self) -> f64 {
        match self {
            NominalFrequency::Hz50 => 50.0,
            NominalFrequency::Hz60 => 60.0,
        }
    }
}

impl Default for NominalFrequency {
    fn default() -> Self {
        NominalFrequency::Hz60
    }
}

/// The binary image contract implemented by every frame, cell and value.
///
/// Images are big-endian throughout. A frame's image is the concatenation of
/// its cells' images; a cell's image is its own header fields followed by its
/// values' images. Parsing is bounded by the byte length of one frame - no
/// operation on this contract blocks or scans past `length`.
pub trait FrameImage {
    /// Length in bytes of the generated image.
    fn byte_length(&self) -> usize;

    /// Appends the image of this element to `out`.
    fn write_image(&self, out: &mut Vec<u8>);

    /// Parses field state back out of a byte image.
    ///
    /// Reads at most `length` bytes from `buffer` starting at `start` and
    /// returns the number of bytes consumed. Fails with
    /// `ParseError::InvalidLength` when `length` is insufficient for the
    /// declared structure.
    fn parse_image(&mut self, buffer: &[u8], start: usize, length: usize)
        -> Result<usize, ParseError>;

    /// Produces the complete image as an owned byte vector.
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_length());
        self.write_image(&mut out);
        out
    }
}

/// Checks that at least `needed` bytes remain in a parse window. The window
/// is bounded by the declared `length` and by the bytes actually present in
/// `buffer` past `start`, whichever is smaller, so an over-declared length
/// fails here instead of reading past the buffer.
pub(crate) fn require_bytes(
    context: &str,
    needed: usize,
    buffer: &[u8],
    start: usize,
    length: usize,
) -> Result<(), ParseError> {
    let available = length.min(buffer.len().saturating_sub(start));
    if needed > available {
        return Err(ParseError::InvalidLength {
            message: format!(
                "{}: expected at least {} bytes, but only {} remain",
                context, needed, available
            ),
        });
    }
    Ok(())
}
