//! Device Capabilities
//!
//! This module defines the capability traits the sweep controller drives.
//! Instead of a single monolithic device trait, devices implement the
//! specific capabilities they actually support:
//!
//! - A motor or camera implements `AttributeAccess` (named numeric attributes)
//! - The macro-execution door implements `MacroDoor`
//!
//! The set of device behaviours is closed: the controller only ever calls
//! through these traits, never through name-based dynamic dispatch.
//!
//! # Design
//!
//! Each capability trait:
//! - Is async (uses #[async_trait])
//! - Is thread-safe (requires Send + Sync)
//! - Returns structured `SweepError` values so callers can match on faults
//! - Takes `&self`; implementations use interior mutability for state

use async_trait::async_trait;

use crate::error::SweepResult;

/// Macro-execution door state, as reported by `MacroDoor::state`.
///
/// `On` is the idle state; a door returns to `On` once the running macro
/// finishes. `Off` means the door is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorState {
    /// Idle and ready to accept a macro
    On,
    /// A macro is currently executing
    Running,
    /// Door is offline
    Off,
}

impl std::fmt::Display for DoorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DoorState::On => write!(f, "ON"),
            DoorState::Running => write!(f, "RUNNING"),
            DoorState::Off => write!(f, "OFF"),
        }
    }
}

/// Capability: Named Numeric Attributes
///
/// Devices exposing a fixed set of named scalar attributes (exposure time,
/// speed, position, ...).
///
/// # Contract
/// - Attribute names are exact strings; an unknown name is
///   `SweepError::UnknownAttribute`, never a silent no-op
/// - `set_attribute` validates against device limits and returns
///   `SweepError::AttributeOutOfRange` on violation, leaving the previous
///   value in place
/// - Values are in device-native units
///
/// # Thread Safety
/// - All methods are async and take `&self`; implementations use interior
///   mutability (Mutex/RwLock) for state
#[async_trait]
pub trait AttributeAccess: Send + Sync {
    /// Read the current value of a named attribute.
    async fn get_attribute(&self, name: &str) -> SweepResult<f64>;

    /// Write a named attribute.
    ///
    /// # Returns
    /// - Ok(()) if the value was applied
    /// - `UnknownAttribute` if the name is not recognized
    /// - `AttributeOutOfRange` if the value violates device limits
    async fn set_attribute(&self, name: &str, value: f64) -> SweepResult<()>;

    /// Names of all attributes this device exposes.
    async fn attribute_names(&self) -> Vec<String>;
}

/// Capability: Macro-Execution Door
///
/// The door runs macros on behalf of the sweep controller and signals
/// completion indirectly: macro output accumulates in a debug log buffer,
/// and the door state returns to [`DoorState::On`] when the macro finishes.
///
/// # Contract
/// - `run_macro` is fire-and-forget: it returns once the macro has been
///   accepted, not when it completes
/// - Completion is inferred by polling: the log buffer is non-empty AND
///   `state()` is back to `On`
/// - `clear_log_buffer` must be called before each macro so stale output
///   from a previous step cannot satisfy the settle condition
#[async_trait]
pub trait MacroDoor: Send + Sync {
    /// Submit a macro for execution.
    ///
    /// `args` is the macro name followed by its arguments, e.g.
    /// `["ct", "0.1"]`.
    async fn run_macro(&self, args: &[String]) -> SweepResult<()>;

    /// Current door state.
    async fn state(&self) -> DoorState;

    /// Discard any buffered macro output.
    async fn clear_log_buffer(&self);

    /// Macro output accumulated since the last clear.
    async fn log_buffer(&self) -> Vec<String>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::SweepError;
    use std::sync::Mutex;

    // Minimal in-memory implementations for exercising the trait contracts

    struct FixedAttributes {
        values: Mutex<std::collections::HashMap<String, f64>>,
    }

    #[async_trait]
    impl AttributeAccess for FixedAttributes {
        async fn get_attribute(&self, name: &str) -> SweepResult<f64> {
            self.values
                .lock()
                .unwrap()
                .get(name)
                .copied()
                .ok_or_else(|| SweepError::UnknownAttribute {
                    device: "fixed".into(),
                    attribute: name.into(),
                })
        }

        async fn set_attribute(&self, name: &str, value: f64) -> SweepResult<()> {
            let mut values = self.values.lock().unwrap();
            match values.get_mut(name) {
                Some(slot) => {
                    *slot = value;
                    Ok(())
                }
                None => Err(SweepError::UnknownAttribute {
                    device: "fixed".into(),
                    attribute: name.into(),
                }),
            }
        }

        async fn attribute_names(&self) -> Vec<String> {
            self.values.lock().unwrap().keys().cloned().collect()
        }
    }

    #[tokio::test]
    async fn test_attribute_access_trait() {
        let device = FixedAttributes {
            values: Mutex::new([("Speed".to_string(), 1.0)].into_iter().collect()),
        };

        device.set_attribute("Speed", 2.5).await.unwrap();
        assert_eq!(device.get_attribute("Speed").await.unwrap(), 2.5);

        let err = device.get_attribute("Gain").await.unwrap_err();
        assert!(matches!(err, SweepError::UnknownAttribute { .. }));
    }

    #[test]
    fn test_door_state_display() {
        assert_eq!(DoorState::On.to_string(), "ON");
        assert_eq!(DoorState::Running.to_string(), "RUNNING");
        assert_eq!(DoorState::Off.to_string(), "OFF");
    }
}
