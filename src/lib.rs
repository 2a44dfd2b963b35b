//! # Bidirectional Synchrophasor Concentration and Mapping
//!
//! This crate provides the protocol-independent engine at the heart of a
//! synchrophasor data gateway: an outbound concentrator that assembles
//! loose, unordered measurements into rate-locked multi-device frames, and
//! an inbound mapper that decomposes parsed frames back into generically
//! addressed measurements while tracking device health. Both directions are
//! built on a shared composite channel model (frames, per-device cells,
//! typed composite values) with a recursive big-endian binary image
//! contract, and on the `ACRONYM-CC[N]` signal reference addressing scheme.
//!
//! ## Submodules
//!
//! - `channel`: The composite channel model.
//!   - `common`: Error taxonomy, data formats and the `FrameImage` contract.
//!   - `signal`: Signal kinds and structured signal reference addresses.
//!   - `values`: Phasor, frequency, analog and digital composite values.
//!   - `frame`: Data frames, device cells and protocol-adapter body hooks.
//!   - `random`: Random frame generators for testing.
//! - `config`: Read-only configuration snapshot tables supplied by an
//!   external loader at initialization and on explicit reload.
//! - `registry`: Device quality records and the measurement-key to
//!   signal-reference cross-reference table.
//! - `concentrator`: Outbound direction - filtering, time bucketing,
//!   placement by signal kind and rate-locked publication.
//! - `mapper`: Inbound direction - frame extraction, per-device health
//!   counters, connection lifecycle and the data-silence watchdog.
//!
//! ## Usage
//!
//! A host application supplies configuration snapshots, a transport for
//! each direction (a `FramePublisher` outbound, byte/frame callbacks
//! inbound) and a concrete wire protocol wrapped around the frame body
//! image hooks. The engine owns no sockets and never terminates the host:
//! every failure path logs and continues at the smallest reasonable
//! granularity - one device, one frame, one measurement.

pub mod channel;
pub mod concentrator;
pub mod config;
pub mod mapper;
pub mod registry;
