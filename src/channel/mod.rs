//! # Composite Channel Model
//!
//! This module implements the protocol-independent composite channel model:
//! frames made of per-device cells, cells made of typed composite values,
//! and the big-endian binary image contract they all share. Everything a
//! concrete synchrophasor protocol adapter needs below its own sync bytes,
//! frame-type discriminant and checksum lives here.
//!
//! ## Submodules
//!
//! - `common`: Shared types - `ParseError`, `MappingError`, `DataFormat`,
//!   `NominalFrequency` and the `FrameImage` binary image contract.
//! - `signal`: `SignalKind` and `SignalReference`, the structured address
//!   of one composite scalar (`ACRONYM-CC[N]` text form).
//! - `values`: Phasor, frequency, analog and digital composite values with
//!   fixed-integer and floating-point serializations.
//! - `frame`: `DataFrame` and `DataCell` plus the body image hooks a
//!   protocol adapter wraps.
//! - `random`: Random template/frame generators for testing parsing and
//!   placement logic.

pub mod common;
pub mod frame;
pub mod random;
pub mod signal;
pub mod values;
