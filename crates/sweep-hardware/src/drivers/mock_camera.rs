//! Mock camera implementation.

use async_trait::async_trait;

use sweep_core::capabilities::AttributeAccess;
use sweep_core::error::SweepResult;

use super::common::{AttributeBank, AttributeSpec};

/// Simulated camera exposing Exposure Time and Aperture attributes.
pub struct MockCamera {
    attributes: AttributeBank,
}

impl MockCamera {
    /// Exposure limits in seconds, enforced on writes and on the configured
    /// initial exposure at registration
    pub const EXPOSURE_LIMITS: (f64, f64) = (0.0, 60.0);

    /// Create a new mock camera with the given initial exposure in seconds.
    pub fn new(device_id: &str, exposure_s: f64) -> Self {
        let specs = [
            AttributeSpec {
                name: "Exposure Time",
                initial: exposure_s,
                min: Self::EXPOSURE_LIMITS.0,
                max: Self::EXPOSURE_LIMITS.1,
            },
            AttributeSpec {
                name: "Aperture",
                initial: 2.8,
                min: 1.0,
                max: 22.0,
            },
        ];
        Self {
            attributes: AttributeBank::new(device_id, &specs),
        }
    }
}

#[async_trait]
impl AttributeAccess for MockCamera {
    async fn get_attribute(&self, name: &str) -> SweepResult<f64> {
        self.attributes.get(name).await
    }

    async fn set_attribute(&self, name: &str, value: f64) -> SweepResult<()> {
        tracing::debug!(attribute = %name, value = %value, "MockCamera: set attribute");
        self.attributes.set(name, value).await
    }

    async fn attribute_names(&self) -> Vec<String> {
        self.attributes.names()
    }
}
