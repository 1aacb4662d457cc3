//! Custom error types for the sweep system.
//!
//! This module defines the primary error type, `SweepError`, used across the
//! workspace. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle the different kinds of errors that can occur,
//! from configuration issues to device faults during a running sweep.
//!
//! ## Error Hierarchy
//!
//! `SweepError` consolidates several error sources:
//!
//! - **`InvalidRange`**: A sweep entry's numeric parameters are unusable
//!   (non-finite value, zero step, or step sign pointing away from the end).
//!   Always raised *before* any device call.
//! - **`UnknownAttribute` / `AttributeOutOfRange`**: Structured faults from
//!   the device attribute interface.
//! - **`UnknownDevice`**: An entry references a device id that is not
//!   registered.
//! - **`Busy` / `NotRunning`**: State-machine violations on the controller.
//! - **`SettleTimeout`**: The macro door did not settle within the configured
//!   deadline. Transient in principle, but the run ends as failed.
//! - **`Door`**: Macro execution faults reported by the door itself.
//! - **`Configuration`**: Semantic errors in the device catalog that pass
//!   parsing but are logically incorrect.
//! - **`Io`**: Wraps standard `std::io::Error` for file operations.

use thiserror::Error;

/// Convenience alias for results using the sweep error type.
pub type SweepResult<T> = std::result::Result<T, SweepError>;

/// Primary error type for the sweep system.
///
/// # Error Categories
///
/// Errors fall into three broad categories:
///
/// 1. **Validation Errors** - `InvalidRange`, `EntryDisabled`, `Configuration`
///    - Caught before any device interaction
///    - Recovery: fix the entry or the catalog and retry
///
/// 2. **Device Errors** - `UnknownDevice`, `UnknownAttribute`,
///    `AttributeOutOfRange`, `Door`
///    - Occur while talking to a device or the macro door
///    - Recovery: check the catalog and device limits
///
/// 3. **Runtime Errors** - `Busy`, `NotRunning`, `SettleTimeout`
///    - State-related; usually resolve once the current run ends
#[derive(Error, Debug)]
pub enum SweepError {
    /// Sweep entry parameters cannot describe a valid sweep.
    ///
    /// Raised by entry validation before any attribute is written, for
    /// non-finite bounds, a zero step, or a step whose sign points away
    /// from the end value.
    #[error("Invalid sweep range: {0}")]
    InvalidRange(String),

    /// The device does not expose the named attribute.
    #[error("Device '{device}' has no attribute '{attribute}'")]
    UnknownAttribute { device: String, attribute: String },

    /// A written attribute value falls outside the device's limits.
    #[error(
        "Value {value} out of range for '{device}.{attribute}' (limits [{min}, {max}])"
    )]
    AttributeOutOfRange {
        device: String,
        attribute: String,
        value: f64,
        min: f64,
        max: f64,
    },

    /// The referenced device id is not in the registry.
    #[error("Unknown device '{0}'")]
    UnknownDevice(String),

    /// The entry is disabled and refused without touching any device.
    #[error("Sweep entry for '{0}' is disabled")]
    EntryDisabled(String),

    /// A run is already in progress; only one may run at a time.
    #[error("Sweep controller is busy (a run is already in progress)")]
    Busy,

    /// The controller has no run to act on.
    #[error("No sweep is running")]
    NotRunning,

    /// The macro door did not settle within the configured deadline.
    #[error("Door '{door}' did not settle within {timeout_ms} ms")]
    SettleTimeout { door: String, timeout_ms: u64 },

    /// Macro execution fault reported by the door.
    #[error("Door error: {0}")]
    Door(String),

    /// Configuration validation failed.
    ///
    /// Values parsed correctly but fail semantic validation (duplicate device
    /// id, unordered attribute limits, etc.).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Standard I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
