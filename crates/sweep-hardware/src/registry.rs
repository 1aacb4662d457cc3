//! Central registry for sweep-target devices and the macro door.
//!
//! The registry is the only way the sweep controller reaches hardware: it
//! resolves device ids to capability trait objects, so the controller never
//! dispatches on device names or types.
//!
//! # Thread Safety
//!
//! DeviceRegistry is internally thread-safe using DashMap for the devices
//! collection. Pass it as `Arc<DeviceRegistry>` and call methods directly;
//! individual lookups only lock the entry being accessed.

use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::info;

use sweep_core::capabilities::{AttributeAccess, MacroDoor};
use sweep_core::error::{SweepError, SweepResult};

use crate::drivers::{MockCamera, MockDoor, MockMotor};

// =============================================================================
// Device Identification
// =============================================================================

/// Unique identifier for a registered device
///
/// Format: lowercase alphanumeric with underscores (e.g., "motor_1", "door")
pub type DeviceId = String;

/// Capabilities a device can have (for introspection)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Named numeric attributes (sweep targets)
    AttributeAccess,
    /// Macro-execution door
    Door,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::AttributeAccess => write!(f, "attribute_access"),
            Capability::Door => write!(f, "door"),
        }
    }
}

// =============================================================================
// Driver Types (Configuration)
// =============================================================================

/// Driver configuration for instantiating a device
///
/// Each variant corresponds to a driver with its required configuration.
/// The set is closed: a catalog can only name drivers listed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DriverType {
    /// Simulated motor with Speed / Step / Position attributes
    MockMotor {
        /// Initial position
        #[serde(default)]
        initial_position: f64,
    },

    /// Simulated camera with Exposure Time / Aperture attributes
    MockCamera {
        /// Initial exposure time in seconds
        #[serde(default = "default_exposure_s")]
        exposure_s: f64,
    },

    /// Simulated macro door
    MockDoor {
        /// How long a submitted macro takes to complete
        #[serde(default = "default_macro_duration_ms")]
        macro_duration_ms: u64,
    },
}

fn default_exposure_s() -> f64 {
    0.1
}

fn default_macro_duration_ms() -> u64 {
    50
}

/// Upper bound on a configured mock macro duration (10 minutes)
const MAX_MACRO_DURATION_MS: u64 = 600_000;

impl DriverType {
    /// Get the capabilities this driver type provides
    pub fn capabilities(&self) -> Vec<Capability> {
        match self {
            DriverType::MockMotor { .. } | DriverType::MockCamera { .. } => {
                vec![Capability::AttributeAccess]
            }
            DriverType::MockDoor { .. } => vec![Capability::Door],
        }
    }

    /// Get human-readable driver type name
    pub fn driver_name(&self) -> &'static str {
        match self {
            DriverType::MockMotor { .. } => "mock_motor",
            DriverType::MockCamera { .. } => "mock_camera",
            DriverType::MockDoor { .. } => "mock_door",
        }
    }

    /// Validate the driver configuration before instantiation.
    ///
    /// A driver must not come up reporting a value its own attribute limits
    /// would refuse, and a macro duration must stay plausible. Violations
    /// are `SweepError::Configuration`.
    pub fn validate(&self) -> SweepResult<()> {
        match self {
            DriverType::MockMotor { initial_position } => {
                let (min, max) = MockMotor::POSITION_LIMITS;
                if !initial_position.is_finite()
                    || *initial_position < min
                    || *initial_position > max
                {
                    return Err(SweepError::Configuration(format!(
                        "initial_position {} outside motor limits [{}, {}]",
                        initial_position, min, max
                    )));
                }
            }
            DriverType::MockCamera { exposure_s } => {
                let (min, max) = MockCamera::EXPOSURE_LIMITS;
                if !exposure_s.is_finite() || *exposure_s < min || *exposure_s > max {
                    return Err(SweepError::Configuration(format!(
                        "exposure_s {} outside camera limits [{}, {}]",
                        exposure_s, min, max
                    )));
                }
            }
            DriverType::MockDoor { macro_duration_ms } => {
                if *macro_duration_ms > MAX_MACRO_DURATION_MS {
                    return Err(SweepError::Configuration(format!(
                        "macro_duration_ms {} exceeds the maximum of {}",
                        macro_duration_ms, MAX_MACRO_DURATION_MS
                    )));
                }
            }
        }
        Ok(())
    }
}

// =============================================================================
// Device Configuration
// =============================================================================

/// Configuration for registering a device
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Unique identifier (e.g., "motor_1", "door")
    pub id: DeviceId,
    /// Human-readable name (e.g., "Dummy Motor 1")
    pub name: String,
    /// Driver type and configuration
    pub driver: DriverType,
}

/// Information about a registered device (returned by list operations)
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    /// Unique identifier
    pub id: DeviceId,
    /// Human-readable name
    pub name: String,
    /// Driver type name (e.g., "mock_motor")
    pub driver_type: String,
    /// Capabilities this device supports
    pub capabilities: Vec<Capability>,
}

// =============================================================================
// Registered Device (Internal)
// =============================================================================

/// A registered device with its driver instance
struct RegisteredDevice {
    /// Device configuration
    config: DeviceConfig,
    /// AttributeAccess implementation (if supported)
    attribute_access: Option<Arc<dyn AttributeAccess>>,
    /// MacroDoor implementation (if supported)
    door: Option<Arc<dyn MacroDoor>>,
}

impl RegisteredDevice {
    /// Compute capabilities from the actual registered trait objects.
    fn capabilities(&self) -> Vec<Capability> {
        let mut caps = Vec::new();
        if self.attribute_access.is_some() {
            caps.push(Capability::AttributeAccess);
        }
        if self.door.is_some() {
            caps.push(Capability::Door);
        }
        caps
    }
}

// =============================================================================
// Device Registry
// =============================================================================

/// Central registry for device management
///
/// The DeviceRegistry is the primary interface for:
/// - Registering devices from configuration
/// - Accessing devices by capability
/// - Querying device information
#[derive(Default)]
pub struct DeviceRegistry {
    /// Registered devices by ID (thread-safe via DashMap)
    devices: DashMap<DeviceId, RegisteredDevice>,
}

impl DeviceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            devices: DashMap::new(),
        }
    }

    /// Register a device from its configuration.
    ///
    /// Instantiates the driver named by `config.driver` and stores its
    /// capability trait objects. Duplicate ids, empty ids and driver
    /// configuration the driver's own limits would refuse are
    /// `SweepError::Configuration`.
    pub fn register(&self, config: DeviceConfig) -> SweepResult<()> {
        if config.id.is_empty() {
            return Err(SweepError::Configuration(
                "device id must not be empty".to_string(),
            ));
        }
        if self.devices.contains_key(&config.id) {
            return Err(SweepError::Configuration(format!(
                "device '{}' is already registered",
                config.id
            )));
        }
        config.driver.validate()?;

        let (attribute_access, door): (
            Option<Arc<dyn AttributeAccess>>,
            Option<Arc<dyn MacroDoor>>,
        ) = match &config.driver {
            DriverType::MockMotor { initial_position } => (
                Some(Arc::new(MockMotor::new(&config.id, *initial_position))),
                None,
            ),
            DriverType::MockCamera { exposure_s } => {
                (Some(Arc::new(MockCamera::new(&config.id, *exposure_s))), None)
            }
            DriverType::MockDoor { macro_duration_ms } => (
                None,
                Some(Arc::new(MockDoor::new(
                    std::time::Duration::from_millis(*macro_duration_ms),
                ))),
            ),
        };

        info!(
            device = %config.id,
            driver = %config.driver.driver_name(),
            "Registered device"
        );

        self.devices.insert(
            config.id.clone(),
            RegisteredDevice {
                config,
                attribute_access,
                door,
            },
        );
        Ok(())
    }

    /// Remove a device from the registry.
    pub fn unregister(&self, id: &str) -> SweepResult<()> {
        match self.devices.remove(id) {
            Some(_) => {
                info!(device = %id, "Unregistered device");
                Ok(())
            }
            None => Err(SweepError::UnknownDevice(id.to_string())),
        }
    }

    /// Check whether a device id is registered
    pub fn contains(&self, id: &str) -> bool {
        self.devices.contains_key(id)
    }

    /// Number of registered devices
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// True if no devices are registered
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// List all registered devices
    pub fn list_devices(&self) -> Vec<DeviceInfo> {
        let mut infos: Vec<DeviceInfo> = self
            .devices
            .iter()
            .map(|entry| DeviceInfo {
                id: entry.config.id.clone(),
                name: entry.config.name.clone(),
                driver_type: entry.config.driver.driver_name().to_string(),
                capabilities: entry.capabilities(),
            })
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    /// Get a device's attribute interface, if it has one
    pub fn get_attribute_access(&self, id: &str) -> Option<Arc<dyn AttributeAccess>> {
        self.devices
            .get(id)
            .and_then(|entry| entry.attribute_access.clone())
    }

    /// Get a device's macro-door interface, if it has one
    pub fn get_door(&self, id: &str) -> Option<Arc<dyn MacroDoor>> {
        self.devices.get(id).and_then(|entry| entry.door.clone())
    }
}
