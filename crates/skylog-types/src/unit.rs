//! Temperature units and conversion from the canonical unit.

use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

const KELVIN_OFFSET: f64 = 273.15;

/// Display unit for temperature values.
///
/// Samples are always stored in Kelvin. Every other unit is an affine
/// function of Kelvin, so converting before or after averaging gives the
/// same mean.
///
/// # Examples
///
/// ```
/// use skylog_types::TemperatureUnit;
///
/// let unit: TemperatureUnit = "F".parse().unwrap();
/// assert_eq!(unit, TemperatureUnit::Fahrenheit);
/// assert!((unit.convert(373.15) - 212.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(Serialize, Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum TemperatureUnit {
    /// Kelvin, the canonical storage unit.
    Kelvin,
    /// Degrees Celsius.
    #[default]
    Celsius,
    /// Degrees Fahrenheit.
    Fahrenheit,
}

impl TemperatureUnit {
    /// The unit every sample is stored in.
    pub const CANONICAL: TemperatureUnit = TemperatureUnit::Kelvin;

    /// Convert a canonical (Kelvin) value into this unit.
    #[must_use]
    pub fn convert(self, kelvin: f64) -> f64 {
        match self {
            TemperatureUnit::Kelvin => kelvin,
            TemperatureUnit::Celsius => kelvin - KELVIN_OFFSET,
            TemperatureUnit::Fahrenheit => (kelvin - KELVIN_OFFSET) * 9.0 / 5.0 + 32.0,
        }
    }

    /// Convert a value expressed in this unit back to Kelvin.
    #[must_use]
    pub fn to_canonical(self, value: f64) -> f64 {
        match self {
            TemperatureUnit::Kelvin => value,
            TemperatureUnit::Celsius => value + KELVIN_OFFSET,
            TemperatureUnit::Fahrenheit => (value - 32.0) * 5.0 / 9.0 + KELVIN_OFFSET,
        }
    }

    /// Short symbol used when rendering values.
    pub fn symbol(self) -> &'static str {
        match self {
            TemperatureUnit::Kelvin => "K",
            TemperatureUnit::Celsius => "°C",
            TemperatureUnit::Fahrenheit => "°F",
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TemperatureUnit::Kelvin => "kelvin",
            TemperatureUnit::Celsius => "celsius",
            TemperatureUnit::Fahrenheit => "fahrenheit",
        };
        f.write_str(name)
    }
}

impl FromStr for TemperatureUnit {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "k" | "kelvin" => Ok(TemperatureUnit::Kelvin),
            "c" | "celsius" => Ok(TemperatureUnit::Celsius),
            "f" | "fahrenheit" => Ok(TemperatureUnit::Fahrenheit),
            _ => Err(ParseError::InvalidUnit(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_freezing_point() {
        assert_eq!(TemperatureUnit::Kelvin.convert(273.15), 273.15);
        assert!(TemperatureUnit::Celsius.convert(273.15).abs() < 1e-9);
        assert!((TemperatureUnit::Fahrenheit.convert(273.15) - 32.0).abs() < 1e-9);
    }

    #[test]
    fn test_convert_minus_forty_is_shared() {
        let kelvin = 233.15;
        let c = TemperatureUnit::Celsius.convert(kelvin);
        let f = TemperatureUnit::Fahrenheit.convert(kelvin);
        assert!((c - -40.0).abs() < 1e-9);
        assert!((f - -40.0).abs() < 1e-9);
    }

    #[test]
    fn test_to_canonical_inverts_convert() {
        for unit in [
            TemperatureUnit::Kelvin,
            TemperatureUnit::Celsius,
            TemperatureUnit::Fahrenheit,
        ] {
            let back = unit.to_canonical(unit.convert(301.4));
            assert!((back - 301.4).abs() < 1e-9, "{unit}");
        }
    }

    #[test]
    fn test_parse_unit_names() {
        assert_eq!("Kelvin".parse::<TemperatureUnit>().unwrap(), TemperatureUnit::Kelvin);
        assert_eq!(" c ".parse::<TemperatureUnit>().unwrap(), TemperatureUnit::Celsius);
        assert_eq!(
            "FAHRENHEIT".parse::<TemperatureUnit>().unwrap(),
            TemperatureUnit::Fahrenheit
        );
        assert!(matches!(
            "rankine".parse::<TemperatureUnit>(),
            Err(ParseError::InvalidUnit(_))
        ));
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for unit in [
            TemperatureUnit::Kelvin,
            TemperatureUnit::Celsius,
            TemperatureUnit::Fahrenheit,
        ] {
            assert_eq!(unit.to_string().parse::<TemperatureUnit>().unwrap(), unit);
        }
    }

    #[test]
    fn test_default_display_unit() {
        assert_eq!(TemperatureUnit::default(), TemperatureUnit::Celsius);
        assert_eq!(TemperatureUnit::CANONICAL, TemperatureUnit::Kelvin);
    }
}
