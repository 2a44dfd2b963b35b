//! # Composite Channel Values
//!
//! This module defines the four composite value types carried by a frame
//! cell: phasors, frequency, analogs and digitals. Each value owns one or
//! two scalar readings, every one of which is individually addressable by a
//! signal reference, plus the serialization knobs resolved from its channel
//! definition (data format, scale, adder, nominal frequency).
//!
//! ## Key Components
//!
//! - `PhasorValue`: Magnitude and angle composites; serializes in
//!   rectangular form as either scaled 16-bit integers or 32-bit floats.
//! - `FrequencyValue`: Frequency and df/dt composites; fixed form encodes
//!   millihertz deviation from nominal and df/dt in centihertz per second.
//! - `AnalogValue`: Single scalar with a multiplier/adder pair applied to
//!   the fixed-integer encoding.
//! - `DigitalValue`: A 16-bit status word, format-independent.
//!
//! ## Usage
//!
//! Values are created from channel definitions when a cell is built and
//! implement `FrameImage` so cells can concatenate their images. Byte order
//! is big-endian throughout.

use super::common::{require_bytes, DataFormat, FrameImage, NominalFrequency, ParseError};
use serde::{Deserialize, Serialize};

fn read_i16(buffer: &[u8], at: usize) -> i16 {
    i16::from_be_bytes([buffer[at], buffer[at + 1]])
}

fn read_u16(buffer: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([buffer[at], buffer[at + 1]])
}

fn read_f32(buffer: &[u8], at: usize) -> f32 {
    f32::from_be_bytes([buffer[at], buffer[at + 1], buffer[at + 2], buffer[at + 3]])
}

/// A phasor measurement exposing magnitude and angle composites.
///
/// The wire form is rectangular (real, imaginary). Fixed-integer images
/// divide each component by `scale` before rounding to 16 bits; float
/// images carry the components directly as 32-bit floats. The angle is
/// held in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhasorValue {
    pub magnitude: f64,
    /// Phase angle in degrees.
    pub angle: f64,
    pub format: DataFormat,
    /// Units per integer step for the fixed format.
    pub scale: f64,
}

impl PhasorValue {
    pub fn new(format: DataFormat, scale: f64) -> Self {
        PhasorValue {
            magnitude: 0.0,
            angle: 0.0,
            format,
            scale,
        }
    }

    /// Real (in-phase) component of the phasor.
    pub fn real(&self) -> f64 {
        self.magnitude * self.angle.to_radians().cos()
    }

    /// Imaginary (quadrature) component of the phasor.
    pub fn imaginary(&self) -> f64 {
        self.magnitude * self.angle.to_radians().sin()
    }

    fn set_rectangular(&mut self, real: f64, imaginary: f64) {
        self.magnitude = (real * real + imaginary * imaginary).sqrt();
        self.angle = imaginary.atan2(real).to_degrees();
    }
}

impl FrameImage for PhasorValue {
    fn byte_length(&self) -> usize {
        self.format.phasor_size()
    }

    fn write_image(&self, out: &mut Vec<u8>) {
        match self.format {
            DataFormat::FixedInt16 => {
                let scale = if self.scale == 0.0 { 1.0 } else { self.scale };
                let real = (self.real() / scale).round() as i16;
                let imaginary = (self.imaginary() / scale).round() as i16;
                out.extend_from_slice(&real.to_be_bytes());
                out.extend_from_slice(&imaginary.to_be_bytes());
            }
            DataFormat::Float32 => {
                out.extend_from_slice(&(self.real() as f32).to_be_bytes());
                out.extend_from_slice(&(self.imaginary() as f32).to_be_bytes());
            }
        }
    }

    fn parse_image(
        &mut self,
        buffer: &[u8],
        start: usize,
        length: usize,
    ) -> Result<usize, ParseError> {
        let needed = self.byte_length();
        require_bytes("PhasorValue", needed, buffer, start, length)?;
        match self.format {
            DataFormat::FixedInt16 => {
                let real = read_i16(buffer, start) as f64 * self.scale;
                let imaginary = read_i16(buffer, start + 2) as f64 * self.scale;
                self.set_rectangular(real, imaginary);
            }
            DataFormat::Float32 => {
                let real = read_f32(buffer, start) as f64;
                let imaginary = read_f32(buffer, start + 4) as f64;
                self.set_rectangular(real, imaginary);
            }
        }
        Ok(needed)
    }
}

/// Frequency and rate-of-change-of-frequency composites.
///
/// The fixed-integer image encodes frequency as signed millihertz deviation
/// from the nominal line frequency and df/dt in hundredths of Hz/s. The
/// float image carries both values directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyValue {
    /// Line frequency in Hz.
    pub frequency: f64,
    /// Rate of change of frequency in Hz/s.
    pub dfdt: f64,
    pub format: DataFormat,
    pub nominal: NominalFrequency,
}

impl FrequencyValue {
    pub fn new(format: DataFormat, nominal: NominalFrequency) -> Self {
        FrequencyValue {
            frequency: nominal.hz(),
            dfdt: 0.0,
            format,
            nominal,
        }
    }
}

impl FrameImage for FrequencyValue {
    fn byte_length(&self) -> usize {
        2 * self.format.scalar_size()
    }

    fn write_image(&self, out: &mut Vec<u8>) {
        match self.format {
            DataFormat::FixedInt16 => {
                let deviation = ((self.frequency - self.nominal.hz()) * 1000.0).round() as i16;
                let dfdt = (self.dfdt * 100.0).round() as i16;
                out.extend_from_slice(&deviation.to_be_bytes());
                out.extend_from_slice(&dfdt.to_be_bytes());
            }
            DataFormat::Float32 => {
                out.extend_from_slice(&(self.frequency as f32).to_be_bytes());
                out.extend_from_slice(&(self.dfdt as f32).to_be_bytes());
            }
        }
    }

    fn parse_image(
        &mut self,
        buffer: &[u8],
        start: usize,
        length: usize,
    ) -> Result<usize, ParseError> {
        let needed = self.byte_length();
        require_bytes("FrequencyValue", needed, buffer, start, length)?;
        match self.format {
            DataFormat::FixedInt16 => {
                self.frequency = self.nominal.hz() + read_i16(buffer, start) as f64 / 1000.0;
                self.dfdt = read_i16(buffer, start + 2) as f64 / 100.0;
            }
            DataFormat::Float32 => {
                self.frequency = read_f32(buffer, start) as f64;
                self.dfdt = read_f32(buffer, start + 4) as f64;
            }
        }
        Ok(needed)
    }
}

/// A single analog reading.
///
/// The fixed-integer image applies the channel's multiplier/adder pair:
/// `raw = (value - adder) / multiplier` on write and the inverse on parse.
/// The float image carries the value unscaled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalogValue {
    pub value: f64,
    pub format: DataFormat,
    pub multiplier: f64,
    pub adder: f64,
}

impl AnalogValue {
    pub fn new(format: DataFormat, multiplier: f64, adder: f64) -> Self {
        AnalogValue {
            value: 0.0,
            format,
            multiplier: if multiplier == 0.0 { 1.0 } else { multiplier },
            adder,
        }
    }
}

impl FrameImage for AnalogValue {
    fn byte_length(&self) -> usize {
        self.format.scalar_size()
    }

    fn write_image(&self, out: &mut Vec<u8>) {
        match self.format {
            DataFormat::FixedInt16 => {
                let raw = ((self.value - self.adder) / self.multiplier).round() as i16;
                out.extend_from_slice(&raw.to_be_bytes());
            }
            DataFormat::Float32 => {
                out.extend_from_slice(&(self.value as f32).to_be_bytes());
            }
        }
    }

    fn parse_image(
        &mut self,
        buffer: &[u8],
        start: usize,
        length: usize,
    ) -> Result<usize, ParseError> {
        let needed = self.byte_length();
        require_bytes("AnalogValue", needed, buffer, start, length)?;
        match self.format {
            DataFormat::FixedInt16 => {
                self.value = read_i16(buffer, start) as f64 * self.multiplier + self.adder;
            }
            DataFormat::Float32 => {
                self.value = read_f32(buffer, start) as f64;
            }
        }
        Ok(needed)
    }
}

/// A 16-bit digital status word. Always two bytes regardless of the cell's
/// data format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalValue {
    pub word: u16,
}

impl FrameImage for DigitalValue {
    fn byte_length(&self) -> usize {
        2
    }

    fn write_image(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.word.to_be_bytes());
    }

    fn parse_image(
        &mut self,
        buffer: &[u8],
        start: usize,
        length: usize,
    ) -> Result<usize, ParseError> {
        require_bytes("DigitalValue", 2, buffer, start, length)?;
        self.word = read_u16(buffer, start);
        Ok(2)
    }
}
