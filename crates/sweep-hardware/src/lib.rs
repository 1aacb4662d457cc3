//! Device catalog and drivers for the sweep system.
//!
//! - [`registry`] - thread-safe device registry with capability accessors
//! - [`drivers`] - mock drivers standing in for the control-system proxies
//! - [`catalog`] - TOML catalog loading and validation

pub mod catalog;
pub mod drivers;
pub mod registry;

pub use registry::{DeviceConfig, DeviceRegistry, DriverType};
