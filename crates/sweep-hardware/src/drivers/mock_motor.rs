//! Mock motor implementation.

use async_trait::async_trait;

use sweep_core::capabilities::AttributeAccess;
use sweep_core::error::SweepResult;

use super::common::{AttributeBank, AttributeSpec};

/// Simulated motor exposing Speed, Step and Position attributes.
///
/// Position is the usual sweep target; Speed and Step are configuration
/// attributes with the same access semantics.
pub struct MockMotor {
    attributes: AttributeBank,
}

const MOTOR_ATTRIBUTES: &[AttributeSpec] = &[
    AttributeSpec {
        name: "Speed",
        initial: 1.0,
        min: 0.0,
        max: 100.0,
    },
    AttributeSpec {
        name: "Step",
        initial: 1.0,
        min: 0.0,
        max: 1000.0,
    },
    AttributeSpec {
        name: "Position",
        initial: 0.0,
        min: MockMotor::POSITION_LIMITS.0,
        max: MockMotor::POSITION_LIMITS.1,
    },
];

impl MockMotor {
    /// Position limits, enforced on writes and on the configured initial
    /// position at registration
    pub const POSITION_LIMITS: (f64, f64) = (-1000.0, 1000.0);

    /// Create a new mock motor at the given initial position.
    pub fn new(device_id: &str, initial_position: f64) -> Self {
        let mut specs = MOTOR_ATTRIBUTES.to_vec();
        for spec in &mut specs {
            if spec.name == "Position" {
                spec.initial = initial_position;
            }
        }
        Self {
            attributes: AttributeBank::new(device_id, &specs),
        }
    }
}

#[async_trait]
impl AttributeAccess for MockMotor {
    async fn get_attribute(&self, name: &str) -> SweepResult<f64> {
        self.attributes.get(name).await
    }

    async fn set_attribute(&self, name: &str, value: f64) -> SweepResult<()> {
        tracing::debug!(attribute = %name, value = %value, "MockMotor: set attribute");
        self.attributes.set(name, value).await
    }

    async fn attribute_names(&self) -> Vec<String> {
        self.attributes.names()
    }
}
