//! # Signal Reference Addressing
//!
//! This module defines the structured address that identifies a single
//! composite scalar within a frame: a device acronym, a signal kind and an
//! optional 1-based index for repeated channels. The textual form
//! `ACRONYM-CC[N]` (e.g. `SUB1-PA2`) is the shared addressing scheme between
//! the concentrator's cross-reference table and the mapper's measurement
//! definition table.
//!
//! ## Key Components
//!
//! - `SignalKind`: The fundamental kind of a signal (angle, magnitude,
//!   frequency, df/dt, status, digital, analog, calculation).
//! - `SignalReference`: Parsed address with a cached cell index, ordered by
//!   acronym (case-insensitive), then kind, then index.
//!
//! ## Usage
//!
//! Signal references parse from and serialize back to their exact textual
//! form. Unknown two-character type codes map to `SignalKind::Unknown`;
//! callers skip or report unknown signals rather than failing.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Fundamental signal kinds used to suffix a formatted signal reference.
///
/// Together with an optional index, the kind identifies a signal's location
/// within a frame cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SignalKind {
    /// Phase angle.
    Angle,
    /// Phase magnitude.
    Magnitude,
    /// Line frequency.
    Frequency,
    /// Frequency delta over time (dF/dt).
    DfDt,
    /// Status flags.
    Status,
    /// Digital value.
    Digital,
    /// Analog value.
    Analog,
    /// Calculated value.
    Calculation,
    /// Undetermined signal kind.
    Unknown,
}

impl SignalKind {
    /// Parses a two-character type code into a `SignalKind`.
    ///
    /// Unrecognized codes map to `Unknown` rather than failing; downstream
    /// logic skips or reports unknown signals.
    pub fn parse_code(code: &str) -> SignalKind {
        match code {
            "PA" => SignalKind::Angle,
            "PM" => SignalKind::Magnitude,
            "FQ" => SignalKind::Frequency,
            "DF" => SignalKind::DfDt,
            "SF" => SignalKind::Status,
            "DV" => SignalKind::Digital,
            "AV" => SignalKind::Analog,
            "CV" => SignalKind::Calculation,
            _ => SignalKind::Unknown,
        }
    }

    /// The two-character type code for this kind (`??` for `Unknown`).
    pub fn code(&self) -> &'static str {
        match self {
            SignalKind::Angle => "PA",
            SignalKind::Magnitude => "PM",
            SignalKind::Frequency => "FQ",
            SignalKind::DfDt => "DF",
            SignalKind::Status => "SF",
            SignalKind::Digital => "DV",
            SignalKind::Analog => "AV",
            SignalKind::Calculation => "CV",
            SignalKind::Unknown => "??",
        }
    }

    /// Whether this kind repeats per channel and therefore carries an index
    /// of 1 or greater when serialized.
    pub fn is_indexed(&self) -> bool {
        matches!(
            self,
            SignalKind::Angle | SignalKind::Magnitude | SignalKind::Digital | SignalKind::Analog
        )
    }
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A signal that can be referenced by its constituent components.
///
/// The textual form is `ACRONYM-CC` when the index is zero, otherwise
/// `ACRONYM-CC{index}`. Acronyms may themselves contain dashes; parsing
/// splits at the last dash in the input.
///
/// `cell_index` is a resolved, cached lookup (device acronym to position
/// within a frame's cell sequence) populated from a side table at
/// configuration build. It participates in neither equality nor ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalReference {
    pub acronym: String,
    pub kind: SignalKind,
    /// 1-based index for repeated channels; 0 for non-repeated kinds and
    /// for "no suffix" addresses.
    pub index: usize,
    /// Cached position of the acronym's device within a frame's cell
    /// sequence. Memoized at configuration build, not per-instance state.
    pub cell_index: usize,
}

impl SignalReference {
    /// Creates a reference with an unresolved cell index.
    pub fn new(acronym: &str, kind: SignalKind, index: usize) -> Self {
        SignalReference {
            acronym: acronym.trim().to_uppercase(),
            kind,
            index,
            cell_index: 0,
        }
    }

    /// Parses a signal reference from its textual form.
    ///
    /// The input may contain multiple dashes; everything after the last one
    /// is the type-code suffix. A suffix longer than two characters is an
    /// indexed signal (e.g. `CORDOVA-PA2`): the first two characters select
    /// the kind and the remainder parses as a positive integer index. An
    /// input with no dash yields the whole string as the acronym with kind
    /// `Unknown` - the best recovery available for a malformed address.
    pub fn parse(signal: &str) -> SignalReference {
        match signal.rfind('-') {
            Some(split) => {
                let acronym = signal[..split].trim().to_uppercase();
                let suffix = signal[split + 1..].trim().to_uppercase();

                if suffix.len() > 2 {
                    let kind = SignalKind::parse_code(&suffix[..2]);
                    let index = if kind == SignalKind::Unknown {
                        0
                    } else {
                        suffix[2..].parse::<usize>().unwrap_or(0)
                    };
                    SignalReference {
                        acronym,
                        kind,
                        index,
                        cell_index: 0,
                    }
                } else {
                    SignalReference {
                        acronym,
                        kind: SignalKind::parse_code(&suffix),
                        index: 0,
                        cell_index: 0,
                    }
                }
            }
            None => SignalReference {
                acronym: signal.trim().to_uppercase(),
                kind: SignalKind::Unknown,
                index: 0,
                cell_index: 0,
            },
        }
    }

    /// Formats the textual form for an arbitrary acronym, kind and index
    /// without building a `SignalReference`.
    pub fn name_of(acronym: &str, kind: SignalKind, index: usize) -> String {
        if index > 0 {
            format!("{}-{}{}", acronym, kind.code(), index)
        } else {
            format!("{}-{}", acronym, kind.code())
        }
    }
}

impl fmt::Display for SignalReference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.index > 0 {
            write!(f, "{}-{}{}", self.acronym, self.kind.code(), self.index)
        } else {
            write!(f, "{}-{}", self.acronym, self.kind.code())
        }
    }
}

impl PartialEq for SignalReference {
    fn eq(&self, other: &Self) -> bool {
        self.acronym.eq_ignore_ascii_case(&other.acronym)
            && self.kind == other.kind
            && self.index == other.index
    }
}

impl Eq for SignalReference {}

impl Hash for SignalReference {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.acronym.to_uppercase().hash(state);
        self.kind.hash(state);
        self.index.hash(state);
    }
}

impl PartialOrd for SignalReference {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SignalReference {
    fn cmp(&self, other: &Self) -> Ordering {
        self.acronym
            .to_uppercase()
            .cmp(&other.acronym.to_uppercase())
            .then(self.kind.cmp(&other.kind))
            .then(self.index.cmp(&other.index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple() {
        let signal = SignalReference::parse("SUB1-FQ");
        assert_eq!(signal.acronym, "SUB1");
        assert_eq!(signal.kind, SignalKind::Frequency);
        assert_eq!(signal.index, 0);
    }

    #[test]
    fn test_parse_indexed() {
        let signal = SignalReference::parse("CORDOVA-PA2");
        assert_eq!(signal.acronym, "CORDOVA");
        assert_eq!(signal.kind, SignalKind::Angle);
        assert_eq!(signal.index, 2);
    }

    #[test]
    fn test_parse_embedded_dashes() {
        // Acronyms may carry dashes; only the last one splits the suffix
        let signal = SignalReference::parse("SHELBY-BUS2-PM11");
        assert_eq!(signal.acronym, "SHELBY-BUS2");
        assert_eq!(signal.kind, SignalKind::Magnitude);
        assert_eq!(signal.index, 11);
    }

    #[test]
    fn test_parse_unknown_code() {
        let signal = SignalReference::parse("SUB1-ZZ4");
        assert_eq!(signal.kind, SignalKind::Unknown);
        assert_eq!(signal.index, 0);
    }

    #[test]
    fn test_parse_no_dash() {
        let signal = SignalReference::parse("ORPHAN");
        assert_eq!(signal.acronym, "ORPHAN");
        assert_eq!(signal.kind, SignalKind::Unknown);
    }

    #[test]
    fn test_round_trip_all_kinds() {
        let kinds = [
            SignalKind::Angle,
            SignalKind::Magnitude,
            SignalKind::Frequency,
            SignalKind::DfDt,
            SignalKind::Status,
            SignalKind::Digital,
            SignalKind::Analog,
            SignalKind::Calculation,
        ];
        for kind in kinds {
            for index in [0usize, 1, 3, 12] {
                let original = SignalReference::new("MID-WEST-STN", kind, index);
                let parsed = SignalReference::parse(&original.to_string());
                assert_eq!(parsed, original, "round trip failed for {}", original);
            }
        }
    }

    #[test]
    fn test_equality_ignores_case_and_cell_index() {
        let mut a = SignalReference::new("sub1", SignalKind::Angle, 1);
        let b = SignalReference::new("SUB1", SignalKind::Angle, 1);
        a.cell_index = 7;
        assert_eq!(a, b);
    }

    #[test]
    fn test_ordering() {
        let a = SignalReference::new("ALPHA", SignalKind::Magnitude, 1);
        let b = SignalReference::new("ALPHA", SignalKind::Magnitude, 2);
        let c = SignalReference::new("BRAVO", SignalKind::Angle, 1);
        assert!(a < b);
        assert!(b < c);
    }
}
