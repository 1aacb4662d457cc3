//! Sweep entries and point generation.
//!
//! A [`SweepEntry`] describes one sweep: a device attribute driven from
//! `start` towards `end` (exclusive) in increments of `step`. Validation is
//! strict and happens before any device call - a bad range is an error, not
//! a warning.

use serde::{Deserialize, Serialize};

use sweep_core::error::{SweepError, SweepResult};

/// One row of the sweep table: which attribute to drive, and how.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepEntry {
    /// Target device id
    pub device: String,
    /// Target attribute name (e.g., "Position", "Exposure Time")
    pub attribute: String,
    /// First value applied (inclusive)
    pub start: f64,
    /// Bound the sweep never reaches (exclusive)
    pub end: f64,
    /// Increment per step, may be negative for descending sweeps
    pub step: f64,
    /// Disabled entries are skipped by the controller
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Largest number of points a single sweep may visit.
///
/// A tiny step over a wide range is a typo, not a sweep; without a cap an
/// entry like `{0, 1, 1e-12}` would grind through ~10^12 iterations.
pub const MAX_SWEEP_POINTS: u32 = 1_000_000;

impl SweepEntry {
    /// Create an enabled entry.
    pub fn new(device: &str, attribute: &str, start: f64, end: f64, step: f64) -> Self {
        Self {
            device: device.to_string(),
            attribute: attribute.to_string(),
            start,
            end,
            step,
            enabled: true,
        }
    }

    /// Validate the numeric range.
    ///
    /// Checks, in order:
    /// - `start`, `end` and `step` are finite
    /// - `step` is not zero
    /// - `start` and `end` differ
    /// - `step` points from `start` towards `end`
    /// - the sweep visits at most [`MAX_SWEEP_POINTS`] points
    ///
    /// Any violation is `SweepError::InvalidRange`; the caller must not have
    /// touched the device yet.
    pub fn validate(&self) -> SweepResult<()> {
        for (label, value) in [("start", self.start), ("end", self.end), ("step", self.step)] {
            if !value.is_finite() {
                return Err(SweepError::InvalidRange(format!(
                    "{} must be a finite number (not NaN or infinity), got {}",
                    label, value
                )));
            }
        }
        if self.step == 0.0 {
            return Err(SweepError::InvalidRange(
                "step must not be zero".to_string(),
            ));
        }
        if self.start == self.end {
            return Err(SweepError::InvalidRange(format!(
                "start and end must differ, both are {}",
                self.start
            )));
        }
        if (self.end - self.start) * self.step < 0.0 {
            return Err(SweepError::InvalidRange(format!(
                "step {} points away from end (start {}, end {})",
                self.step, self.start, self.end
            )));
        }
        // Positive after the sign check above
        let span = (self.end - self.start) / self.step;
        if span > f64::from(MAX_SWEEP_POINTS) {
            return Err(SweepError::InvalidRange(format!(
                "sweep would visit about {:.0} points (limit {})",
                span, MAX_SWEEP_POINTS
            )));
        }
        Ok(())
    }

    /// Iterator over the values this sweep visits, in order.
    ///
    /// Values are computed as `start + i * step` rather than by repeated
    /// addition, so rounding error cannot accumulate into an extra point at
    /// the boundary. The `end` value itself is never produced.
    pub fn points(&self) -> SweepPoints {
        SweepPoints {
            start: self.start,
            end: self.end,
            step: self.step,
            index: 0,
        }
    }

    /// Number of points the sweep will visit.
    ///
    /// Counts by iterating so it always agrees with [`points`](Self::points);
    /// `validate()` bounds the count, so call it first.
    pub fn num_points(&self) -> usize {
        self.points().count()
    }
}

/// Iterator yielding sweep values `start, start + step, ...` up to but
/// excluding `end`.
#[derive(Debug, Clone)]
pub struct SweepPoints {
    start: f64,
    end: f64,
    step: f64,
    index: u32,
}

impl Iterator for SweepPoints {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        let value = self.start + f64::from(self.index) * self.step;
        let in_range = if self.step > 0.0 {
            value < self.end
        } else {
            value > self.end
        };
        if in_range {
            self.index += 1;
            Some(value)
        } else {
            None
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn entry(start: f64, end: f64, step: f64) -> SweepEntry {
        SweepEntry::new("motor_1", "Position", start, end, step)
    }

    #[test]
    fn test_points_exclude_end() {
        let values: Vec<f64> = entry(0.0, 1.0, 0.2).points().collect();
        let expected = [0.0, 0.2, 0.4, 0.6, 0.8];

        assert_eq!(values.len(), expected.len());
        for (got, want) in values.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-9, "got {} want {}", got, want);
        }
        // The end value itself is never visited
        assert!(values.iter().all(|v| *v < 1.0));
    }

    #[test]
    fn test_points_strictly_ascending() {
        let values: Vec<f64> = entry(0.0, 1.0, 0.2).points().collect();
        for pair in values.windows(2) {
            assert!(pair[1] > pair[0], "not ascending: {:?}", pair);
        }
    }

    #[test]
    fn test_descending_sweep() {
        let values: Vec<f64> = entry(1.0, 0.0, -0.25).points().collect();
        let expected = [1.0, 0.75, 0.5, 0.25];
        assert_eq!(values.len(), expected.len());
        for (got, want) in values.iter().zip(expected.iter()) {
            assert!((got - want).abs() < 1e-9);
        }
    }

    #[test]
    fn test_num_points() {
        assert_eq!(entry(0.0, 1.0, 0.2).num_points(), 5);
        assert_eq!(entry(0.0, 1.0, 0.5).num_points(), 2);
        assert_eq!(entry(0.0, 1.0, 2.0).num_points(), 1);
    }

    #[test]
    fn test_validate_rejects_zero_step() {
        let err = entry(0.0, 1.0, 0.0).validate().unwrap_err();
        assert!(matches!(err, SweepError::InvalidRange(_)));
    }

    #[test]
    fn test_validate_rejects_wrong_sign() {
        assert!(entry(0.0, 1.0, -0.2).validate().is_err());
        assert!(entry(1.0, 0.0, 0.2).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_finite() {
        assert!(entry(f64::NAN, 1.0, 0.2).validate().is_err());
        assert!(entry(0.0, f64::INFINITY, 0.2).validate().is_err());
        assert!(entry(0.0, 1.0, f64::NEG_INFINITY).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_equal_bounds() {
        assert!(entry(1.0, 1.0, 0.2).validate().is_err());
    }

    #[test]
    fn test_validate_rejects_absurd_point_count() {
        let err = entry(0.0, 1.0, 1e-12).validate().unwrap_err();
        assert!(matches!(err, SweepError::InvalidRange(_)));
        // A large but bounded sweep is still fine
        assert!(entry(0.0, 1.0, 1e-5).validate().is_ok());
    }

    #[test]
    fn test_validate_accepts_good_ranges() {
        assert!(entry(0.0, 1.0, 0.2).validate().is_ok());
        assert!(entry(5.0, -5.0, -1.0).validate().is_ok());
    }

    #[test]
    fn test_enabled_defaults_to_true_in_toml() {
        let toml_str = r#"
            device = "motor_1"
            attribute = "Position"
            start = 0.0
            end = 1.0
            step = 0.2
        "#;
        let entry: SweepEntry = toml::from_str(toml_str).unwrap();
        assert!(entry.enabled);
    }
}
