//! Shared attribute storage for mock drivers.

use std::collections::HashMap;

use tokio::sync::RwLock;

use sweep_core::error::{SweepError, SweepResult};

/// Declaration of one named attribute with its range limits.
#[derive(Debug, Clone, Copy)]
pub struct AttributeSpec {
    /// Attribute name as exposed to clients (e.g., "Exposure Time")
    pub name: &'static str,
    /// Initial value
    pub initial: f64,
    /// Lower limit (inclusive)
    pub min: f64,
    /// Upper limit (inclusive)
    pub max: f64,
}

/// In-memory attribute table with limit enforcement.
///
/// Mock drivers delegate their `AttributeAccess` implementation here so the
/// unknown-name and out-of-range semantics are identical across device types.
pub struct AttributeBank {
    device_id: String,
    values: RwLock<HashMap<String, f64>>,
    limits: HashMap<String, (f64, f64)>,
    // Declaration order, for stable attribute_names() output
    order: Vec<String>,
}

impl AttributeBank {
    pub fn new(device_id: &str, specs: &[AttributeSpec]) -> Self {
        let mut values = HashMap::new();
        let mut limits = HashMap::new();
        let mut order = Vec::new();
        for spec in specs {
            values.insert(spec.name.to_string(), spec.initial);
            limits.insert(spec.name.to_string(), (spec.min, spec.max));
            order.push(spec.name.to_string());
        }
        Self {
            device_id: device_id.to_string(),
            values: RwLock::new(values),
            limits,
            order,
        }
    }

    pub async fn get(&self, name: &str) -> SweepResult<f64> {
        self.values
            .read()
            .await
            .get(name)
            .copied()
            .ok_or_else(|| self.unknown(name))
    }

    pub async fn set(&self, name: &str, value: f64) -> SweepResult<()> {
        let (min, max) = *self.limits.get(name).ok_or_else(|| self.unknown(name))?;
        if value < min || value > max {
            return Err(SweepError::AttributeOutOfRange {
                device: self.device_id.clone(),
                attribute: name.to_string(),
                value,
                min,
                max,
            });
        }
        let mut values = self.values.write().await;
        if let Some(slot) = values.get_mut(name) {
            *slot = value;
        }
        Ok(())
    }

    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    fn unknown(&self, name: &str) -> SweepError {
        SweepError::UnknownAttribute {
            device: self.device_id.clone(),
            attribute: name.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn bank() -> AttributeBank {
        AttributeBank::new(
            "dev",
            &[AttributeSpec {
                name: "Speed",
                initial: 1.0,
                min: 0.0,
                max: 10.0,
            }],
        )
    }

    #[tokio::test]
    async fn test_limits_enforced() {
        let bank = bank();

        bank.set("Speed", 5.0).await.unwrap();
        assert_eq!(bank.get("Speed").await.unwrap(), 5.0);

        let err = bank.set("Speed", 11.0).await.unwrap_err();
        assert!(matches!(err, SweepError::AttributeOutOfRange { .. }));
        // Previous value stays in place after a rejected write
        assert_eq!(bank.get("Speed").await.unwrap(), 5.0);
    }

    #[tokio::test]
    async fn test_unknown_attribute() {
        let bank = bank();
        assert!(matches!(
            bank.get("Gain").await.unwrap_err(),
            SweepError::UnknownAttribute { .. }
        ));
        assert!(matches!(
            bank.set("Gain", 1.0).await.unwrap_err(),
            SweepError::UnknownAttribute { .. }
        ));
    }
}
