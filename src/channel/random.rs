//! # Random Frame Generators
//!
//! This module provides utilities for generating random cell templates and
//! data frames for testing parsing and placement logic. Generated values
//! stay within the representable range of the requested data format, so a
//! generated frame always survives an image round trip modulo the format's
//! precision loss.
//!
//! ## Key Components
//!
//! - `random_templates`: Generates a set of cell templates with varied
//!   channel counts.
//! - `random_data_frame`: Populates a frame from templates with randomized
//!   in-range values.

use super::common::DataFormat;
use super::frame::{CellTemplate, DataFrame};
use chrono::{DateTime, Utc};
use rand::Rng;

/// Generates `count` cell templates with varied channel counts.
///
/// Acronyms are `STATION01`, `STATION02`, ... with ID codes starting at 1.
pub fn random_templates(count: usize, format: DataFormat) -> Vec<CellTemplate> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|i| {
            let phasor_count = rng.gen_range(1..=4);
            let analog_count = rng.gen_range(0..=3);
            let digital_count = rng.gen_range(0..=2);
            CellTemplate {
                acronym: format!("STATION{:02}", i + 1),
                id_code: (i + 1) as u16,
                format,
                nominal: Default::default(),
                phasor_scales: (0..phasor_count).map(|_| rng.gen_range(1.0..10.0)).collect(),
                analog_factors: (0..analog_count)
                    .map(|_| (rng.gen_range(0.5..4.0), rng.gen_range(-10.0..10.0)))
                    .collect(),
                digital_count,
            }
        })
        .collect()
}

/// Builds a frame from the templates and fills every composite slot with a
/// random value representable in the template's data format.
pub fn random_data_frame(timestamp: DateTime<Utc>, templates: &[CellTemplate]) -> DataFrame {
    let mut rng = rand::thread_rng();
    let mut frame = DataFrame::from_templates(timestamp, templates);

    for (cell, template) in frame.cells.iter_mut().zip(templates) {
        for (phasor, scale) in cell.phasors.iter_mut().zip(&template.phasor_scales) {
            // Keep scaled rectangular components inside i16 range
            phasor.magnitude = rng.gen_range(0.0..scale * 20_000.0);
            phasor.angle = rng.gen_range(-180.0..180.0);
        }
        cell.frequency.frequency = template.nominal.hz() + rng.gen_range(-0.2..0.2);
        cell.frequency.dfdt = rng.gen_range(-0.5..0.5);
        for (analog, (multiplier, adder)) in cell.analogs.iter_mut().zip(&template.analog_factors)
        {
            // Keep the raw fixed-point form inside i16 range
            analog.value = adder + multiplier * rng.gen_range(-1_000.0..1_000.0);
        }
        for digital in &mut cell.digitals {
            digital.word = rng.gen();
        }
    }
    frame
}
