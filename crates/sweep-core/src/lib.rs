//! Shared types for the attribute sweep system.
//!
//! This crate holds the pieces every other crate depends on:
//!
//! - [`error`] - the structured error taxonomy (`SweepError`)
//! - [`capabilities`] - async traits for device attribute access and the
//!   macro-execution door
//! - [`document`] - the run document model emitted by the sweep controller

pub mod capabilities;
pub mod document;
pub mod error;

pub use error::{SweepError, SweepResult};
