//! Temperature alert thresholds.
//!
//! Bounds are expressed in the unit the user picked them in. Readings in any
//! other unit are converted through the canonical unit before comparison, so
//! switching the display unit never changes whether an alert fires.
//!
//! # Example
//!
//! ```
//! use skylog_types::{TemperatureUnit, ThresholdAlert, Thresholds};
//!
//! let thresholds = Thresholds::new(TemperatureUnit::Celsius)
//!     .lower(10.0)
//!     .upper(30.0);
//!
//! // 35 °C reading given in Kelvin
//! let alert = thresholds.evaluate(308.15, TemperatureUnit::Kelvin);
//! assert!(matches!(alert, Some(ThresholdAlert::Above { .. })));
//! ```

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::unit::TemperatureUnit;

/// Optional lower and upper alert bounds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(default))]
pub struct Thresholds {
    /// Alert when a reading is strictly below this value.
    pub lower: Option<f64>,
    /// Alert when a reading is strictly above this value.
    pub upper: Option<f64>,
    /// Unit the bounds are expressed in.
    pub unit: TemperatureUnit,
}

impl Thresholds {
    /// Thresholds with no bounds set.
    pub fn new(unit: TemperatureUnit) -> Self {
        Self {
            lower: None,
            upper: None,
            unit,
        }
    }

    /// Set the lower bound.
    #[must_use]
    pub fn lower(mut self, bound: f64) -> Self {
        self.lower = Some(bound);
        self
    }

    /// Set the upper bound.
    #[must_use]
    pub fn upper(mut self, bound: f64) -> Self {
        self.upper = Some(bound);
        self
    }

    /// Whether any bound is configured.
    pub fn is_empty(&self) -> bool {
        self.lower.is_none() && self.upper.is_none()
    }

    /// Check a reading given in `value_unit` against the bounds.
    ///
    /// A reading exactly on a bound does not alert.
    pub fn evaluate(&self, value: f64, value_unit: TemperatureUnit) -> Option<ThresholdAlert> {
        let value = if value_unit == self.unit {
            value
        } else {
            self.unit.convert(value_unit.to_canonical(value))
        };

        if let Some(bound) = self.lower {
            if value < bound {
                return Some(ThresholdAlert::Below {
                    value,
                    bound,
                    unit: self.unit,
                });
            }
        }

        if let Some(bound) = self.upper {
            if value > bound {
                return Some(ThresholdAlert::Above {
                    value,
                    bound,
                    unit: self.unit,
                });
            }
        }

        None
    }
}

/// A reading that crossed a configured bound.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ThresholdAlert {
    /// Reading is below the lower bound.
    Below {
        /// The reading, in the thresholds' unit.
        value: f64,
        /// The bound that was crossed.
        bound: f64,
        /// Unit of `value` and `bound`.
        unit: TemperatureUnit,
    },
    /// Reading is above the upper bound.
    Above {
        /// The reading, in the thresholds' unit.
        value: f64,
        /// The bound that was crossed.
        bound: f64,
        /// Unit of `value` and `bound`.
        unit: TemperatureUnit,
    },
}

impl fmt::Display for ThresholdAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThresholdAlert::Below { value, bound, unit } => write!(
                f,
                "temperature {value:.2}{} is below {bound:.2}{}",
                unit.symbol(),
                unit.symbol()
            ),
            ThresholdAlert::Above { value, bound, unit } => write!(
                f,
                "temperature {value:.2}{} is above {bound:.2}{}",
                unit.symbol(),
                unit.symbol()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn celsius_bounds() -> Thresholds {
        Thresholds::new(TemperatureUnit::Celsius).lower(10.0).upper(30.0)
    }

    #[test]
    fn test_no_bounds_never_alerts() {
        let thresholds = Thresholds::new(TemperatureUnit::Celsius);
        assert!(thresholds.is_empty());
        assert_eq!(thresholds.evaluate(500.0, TemperatureUnit::Kelvin), None);
    }

    #[test]
    fn test_in_range_reading() {
        assert_eq!(celsius_bounds().evaluate(20.0, TemperatureUnit::Celsius), None);
    }

    #[test]
    fn test_bound_is_exclusive() {
        let thresholds = celsius_bounds();
        assert_eq!(thresholds.evaluate(10.0, TemperatureUnit::Celsius), None);
        assert_eq!(thresholds.evaluate(30.0, TemperatureUnit::Celsius), None);
    }

    #[test]
    fn test_below_lower_bound() {
        let alert = celsius_bounds().evaluate(5.0, TemperatureUnit::Celsius);
        match alert {
            Some(ThresholdAlert::Below { value, bound, unit }) => {
                assert_eq!(value, 5.0);
                assert_eq!(bound, 10.0);
                assert_eq!(unit, TemperatureUnit::Celsius);
            }
            other => panic!("expected Below, got {other:?}"),
        }
    }

    #[test]
    fn test_reading_in_other_unit_is_converted() {
        // 95 °F = 35 °C
        let alert = celsius_bounds().evaluate(95.0, TemperatureUnit::Fahrenheit);
        match alert {
            Some(ThresholdAlert::Above { value, .. }) => assert!((value - 35.0).abs() < 1e-9),
            other => panic!("expected Above, got {other:?}"),
        }
    }

    #[test]
    fn test_alert_display() {
        let alert = celsius_bounds()
            .evaluate(35.0, TemperatureUnit::Celsius)
            .unwrap();
        assert_eq!(alert.to_string(), "temperature 35.00°C is above 30.00°C");
    }
}
