//! Sweep execution engine.
//!
//! - [`entry`] - sweep entry validation and point generation
//! - [`controller`] - the state machine that applies points to a device and
//!   waits for the macro door to settle between steps

pub mod controller;
pub mod entry;

pub use controller::{EngineState, RunStatus, SweepController, SweepRun, SweepSettings};
pub use entry::SweepEntry;
