//! Device catalog loading from TOML files.
//!
//! A catalog lists the devices to register at startup as a `[[devices]]`
//! array. Loading validates the catalog before any driver is instantiated,
//! so a bad file fails fast instead of leaving a half-registered system.
//!
//! # Usage
//!
//! ```rust,ignore
//! use sweep_hardware::catalog::load_catalog;
//! use std::path::Path;
//!
//! let catalog = load_catalog(Path::new("config/sweep.toml"))?;
//! catalog.register_all(&registry)?;
//! ```

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use figment::{
    providers::{Format, Toml},
    Figment,
};
use serde::Deserialize;
use tracing::{debug, info};

use crate::registry::{DeviceConfig, DeviceRegistry};

/// Error types for catalog loading.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// File not found
    #[error("Catalog file not found: {0}")]
    NotFound(String),

    /// Parse error (invalid TOML)
    #[error("Failed to parse catalog: {0}")]
    ParseError(String),

    /// Validation error
    #[error("Catalog validation failed: {0}")]
    ValidationError(String),
}

/// A device catalog parsed from TOML.
///
/// Sections other than `[[devices]]` (e.g. `[controller]`) are ignored here
/// and extracted separately by their consumers.
#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    /// Devices to register, in file order
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

impl Catalog {
    /// Validate catalog-level invariants.
    ///
    /// Per-driver value validation happens at registration; this checks what
    /// only the whole file can show, currently duplicate and empty ids.
    pub fn validate(&self) -> Result<(), CatalogError> {
        let mut seen = HashSet::new();
        for device in &self.devices {
            if device.id.is_empty() {
                return Err(CatalogError::ValidationError(
                    "device id must not be empty".to_string(),
                ));
            }
            if !seen.insert(device.id.as_str()) {
                return Err(CatalogError::ValidationError(format!(
                    "duplicate device id '{}'",
                    device.id
                )));
            }
        }
        Ok(())
    }

    /// Register every catalog device with the registry.
    pub fn register_all(&self, registry: &DeviceRegistry) -> Result<()> {
        for device in &self.devices {
            registry
                .register(device.clone())
                .with_context(|| format!("Failed to register device '{}'", device.id))?;
        }
        info!("Registered {} device(s) from catalog", self.devices.len());
        Ok(())
    }
}

/// Load a device catalog from a TOML file.
///
/// This function:
/// 1. Reads the TOML file via Figment
/// 2. Deserializes the `[[devices]]` array
/// 3. Validates catalog-level invariants (duplicate ids)
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    if !path.exists() {
        return Err(CatalogError::NotFound(path.display().to_string()).into());
    }

    debug!("Loading device catalog from: {}", path.display());

    let figment = Figment::new().merge(Toml::file(path));
    let catalog: Catalog = figment
        .extract()
        .with_context(|| format!("Failed to parse catalog file: {}", path.display()))?;

    catalog.validate()?;

    info!(
        "Loaded catalog with {} device(s) from {}",
        catalog.devices.len(),
        path.display()
    );

    Ok(catalog)
}

/// Load a device catalog from a TOML string.
///
/// Useful for testing or loading catalogs from embedded resources.
pub fn load_catalog_from_str(toml_content: &str) -> Result<Catalog> {
    let catalog: Catalog =
        toml::from_str(toml_content).with_context(|| "Failed to parse TOML content")?;
    catalog.validate()?;
    Ok(catalog)
}
