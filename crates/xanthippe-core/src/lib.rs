//! # xanthippe-core
//!
//! LCD snooping and button-sequence exploration for a pocket calculator -
//! THE LOGIC.
//!
//! Two engines share this crate:
//!
//! - **Acquisition & decode**: backplane edges drive a state machine that
//!   collects four checksummed shift-register captures per refresh cycle,
//!   assembles them into a 14-byte [`Frame`], and records frames as
//!   intervals in a [`TemporalLog`]. The [`decoder`] turns a frame into
//!   digits and annunciators.
//! - **Exploration**: the [`Explorer`] picks button sequences through a
//!   rotation of strategies, replays them on a [`Calculator`], and records
//!   the screen of every prefix in a redb-backed [`CoverageStore`].
//!
//! ## Architectural Constraints
//!
//! - No async, no network dependencies
//! - Integer nanosecond time; no floating point
//! - Hardware (lines, keypad, clock, status display) behind [`hal`] traits
//! - Tables (buttons, glyphs, annunciator bits) are immutable after load

// =============================================================================
// MODULES
// =============================================================================

pub mod acquisition;
pub mod assembler;
pub mod buttons;
pub mod calculator;
pub mod config;
pub mod decoder;
pub mod explorer;
pub mod hal;
pub mod primitives;
pub mod reader;
pub mod sim;
pub mod storage;
pub mod strategy;
pub mod temporal;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{ButtonSequence, Frame, Timestamp, XanthippeError};

// =============================================================================
// RE-EXPORTS: Acquisition & Decode
// =============================================================================

pub use acquisition::{AcquisitionStateMachine, AcquisitionStats, RawSample, TriggerOutcome};
pub use assembler::{assemble, disassemble};
pub use decoder::{Annunciator, Cell, DisplayModel, render};
pub use reader::LcdReader;
pub use temporal::{LogEntry, RecordOutcome, TemporalLog};

// =============================================================================
// RE-EXPORTS: Exploration
// =============================================================================

pub use buttons::{ButtonCode, ButtonTable, REFERENCE_BINDINGS};
pub use calculator::{Calculator, Session};
pub use config::{ExploreSettings, StrategyKind, Timing};
pub use explorer::{ExploreReport, Explorer, RunSummary, StepOutcome, StopReason};
pub use storage::{CoverageRecord, CoverageStats, CoverageStore, UpsertMode, UpsertOutcome};
pub use strategy::{Candidate, Rotation, Strategy};

// =============================================================================
// RE-EXPORTS: Hardware
// =============================================================================

pub use hal::{
    ButtonPresser, Clock, InputLine, Keypad, LogDisplay, OutputLine, SampleSource, ShiftIn,
    StatusDisplay, SystemClock,
};
pub use sim::SimulatedDevice;
