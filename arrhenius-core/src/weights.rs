//! Absorption weight functions
//!
//! A weight function is a named, stateless mapping from a gas concentration
//! to an absorption weight in `[0, 1]`. Two are selected per run, one for
//! CO2 and one for H2O, by identifier in the configuration; identifiers are
//! resolved once at validation time.
//!
//! The module also carries the rule for combining the two gases' weights
//! into a single absorbed fraction ([`CombinationRule`]) and the saturation
//! relationship that turns temperature and relative humidity into a
//! water-vapor column ([`water_vapor_column`]), which is what the H2O weight
//! function is evaluated on. The vapor column grows with temperature, which
//! is the feedback the solver iterates over.

use crate::errors::{ArrheniusError, ArrheniusResult};
use crate::FloatValue;
use serde::{Deserialize, Serialize};

/// Largest CO2 concentration (as a multiple of the 1895 baseline) covered by
/// Arrhenius' transparency table. Used to normalise the analytic weight
/// functions so they saturate at the table's edge.
const CO2_TABLE_MAX: FloatValue = 40.0;

/// Atmospheric transparency (percent) along the CO2 axis of Arrhenius' 1896
/// table, at a water-vapor column of 1.0 Arrhenius units.
const CO2_TRANSPARENCY_TABLE: [(FloatValue, FloatValue); 11] = [
    (1.0, 30.7),
    (1.2, 28.6),
    (1.5, 25.9),
    (2.0, 21.9),
    (2.5, 19.0),
    (3.0, 16.3),
    (4.0, 12.7),
    (6.0, 8.7),
    (10.0, 5.2),
    (20.0, 2.2),
    (40.0, 0.67),
];

// Antoine equation constants for water over the atmospheric temperature
// range, pressure in bar and temperature in kelvin.
const ANTOINE_A: FloatValue = 4.6543;
const ANTOINE_B: FloatValue = 1435.264;
const ANTOINE_C: FloatValue = -64.848;

/// Named, pure mapping from concentration to an absorption weight in `[0, 1]`.
///
/// Every variant is total over positive concentrations: no input `> 0` can
/// make evaluation fail or leave the unit interval.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightFunction {
    /// `ln(1 + c) / ln(1 + 40)`, clamped. Arrhenius' observation that
    /// absorption grows roughly logarithmically with CO2.
    Logarithmic,
    /// `1 - exp(-c)`. Suited to water-vapor columns, which are of order one
    /// in Arrhenius units.
    Saturating,
    /// `c / 40`, clamped.
    Linear,
    /// Nearest-neighbour lookup of Arrhenius' transparency table along its
    /// CO2 axis, converted to an absorption weight `1 - transparency/100`.
    Table,
}

impl WeightFunction {
    /// Resolve a configuration identifier to a weight function.
    pub fn from_identifier(identifier: &str) -> ArrheniusResult<Self> {
        match identifier {
            "logarithmic" => Ok(Self::Logarithmic),
            "saturating" => Ok(Self::Saturating),
            "linear" => Ok(Self::Linear),
            "table" => Ok(Self::Table),
            other => Err(ArrheniusError::UnknownWeightFunction(other.to_string())),
        }
    }

    pub fn identifier(&self) -> &'static str {
        match self {
            Self::Logarithmic => "logarithmic",
            Self::Saturating => "saturating",
            Self::Linear => "linear",
            Self::Table => "table",
        }
    }

    /// Evaluate the weight at a concentration.
    ///
    /// Non-positive concentrations map to zero weight.
    pub fn evaluate(&self, concentration: FloatValue) -> FloatValue {
        if !(concentration > 0.0) {
            return 0.0;
        }
        match self {
            Self::Logarithmic => {
                ((1.0 + concentration).ln() / (1.0 + CO2_TABLE_MAX).ln()).clamp(0.0, 1.0)
            }
            Self::Saturating => 1.0 - (-concentration).exp(),
            Self::Linear => (concentration / CO2_TABLE_MAX).clamp(0.0, 1.0),
            Self::Table => {
                let (_, transparency) = CO2_TRANSPARENCY_TABLE
                    .iter()
                    .min_by(|(a, _), (b, _)| {
                        (a - concentration)
                            .abs()
                            .total_cmp(&(b - concentration).abs())
                    })
                    .copied()
                    .unwrap_or((1.0, 100.0));
                1.0 - transparency / 100.0
            }
        }
    }
}

/// Rule for combining the CO2 and H2O weights into one absorbed fraction.
///
/// The exact overlap behaviour of the two gases' absorption bands is not
/// known precisely enough to hard-code; the rule is configurable and the
/// default documented here. Either way the result stays in `[0, 1]`: the
/// total absorbed fraction can never exceed 1.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombinationRule {
    /// `w_co2 * (1 - w_h2o)`: CO2 absorption attenuated by the fraction of
    /// the band already saturated by water vapor. This is the default,
    /// reflecting overlapping absorption bands.
    #[default]
    Multiplicative,
    /// `min(w_co2 + w_h2o, 1)`: independent bands, capped at full
    /// absorption.
    AdditiveCapped,
}

impl CombinationRule {
    pub fn from_identifier(identifier: &str) -> ArrheniusResult<Self> {
        match identifier {
            "multiplicative" => Ok(Self::Multiplicative),
            "additive_capped" => Ok(Self::AdditiveCapped),
            other => Err(ArrheniusError::InvalidConfig(format!(
                "unknown combination rule '{other}'"
            ))),
        }
    }

    /// Combine a CO2 weight and an H2O weight into one absorbed fraction.
    pub fn combine(&self, w_co2: FloatValue, w_h2o: FloatValue) -> FloatValue {
        match self {
            Self::Multiplicative => w_co2 * (1.0 - w_h2o),
            Self::AdditiveCapped => (w_co2 + w_h2o).min(1.0),
        }
    }
}

/// Combined baseline absorbance of a layer holding both gases.
///
/// Complement-product form: a photon escapes only if it escapes both gases,
/// so the combined absorbed fraction is bounded by 1 regardless of the
/// configured forcing combination rule.
pub fn combined_absorbance(co2_absorbance: FloatValue, h2o_absorbance: FloatValue) -> FloatValue {
    1.0 - (1.0 - co2_absorbance.clamp(0.0, 1.0)) * (1.0 - h2o_absorbance.clamp(0.0, 1.0))
}

/// Water-vapor column traversed by a vertical ray, in Arrhenius units
/// (1 unit = 10 g/m^3 of absolute humidity).
///
/// Saturation pressure comes from the Antoine equation; the actual vapor
/// pressure is the saturation pressure scaled by relative humidity (a
/// fraction in `[0, 1]`).
pub fn water_vapor_column(temperature: FloatValue, relative_humidity: FloatValue) -> FloatValue {
    if temperature + ANTOINE_C <= 0.0 {
        // Below the valid range of the Antoine fit; effectively no vapor.
        return 0.0;
    }
    let saturation_bar = 10f64.powf(ANTOINE_A - ANTOINE_B / (temperature + ANTOINE_C));
    let saturation_pa = saturation_bar * 1e5;
    let vapor_pressure = relative_humidity.clamp(0.0, 1.0) * saturation_pa;
    let absolute_humidity = 2.16679 * vapor_pressure / temperature;
    absolute_humidity / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    #[test]
    fn identifiers_round_trip() {
        for name in ["logarithmic", "saturating", "linear", "table"] {
            let f = WeightFunction::from_identifier(name).unwrap();
            assert_eq!(f.identifier(), name);
        }
    }

    #[test]
    fn unknown_identifier_is_an_error() {
        let result = WeightFunction::from_identifier("closest");
        assert!(matches!(
            result,
            Err(ArrheniusError::UnknownWeightFunction(_))
        ));
    }

    #[test]
    fn weights_stay_in_unit_interval() {
        let concentrations = [1e-6, 0.3, 1.0, 2.0, 10.0, 40.0, 1e6];
        for f in [
            WeightFunction::Logarithmic,
            WeightFunction::Saturating,
            WeightFunction::Linear,
            WeightFunction::Table,
        ] {
            for c in concentrations {
                let w = f.evaluate(c);
                assert!((0.0..=1.0).contains(&w), "{f:?}({c}) = {w}");
            }
        }
    }

    #[test]
    fn analytic_weights_are_monotonic() {
        for f in [
            WeightFunction::Logarithmic,
            WeightFunction::Saturating,
            WeightFunction::Linear,
        ] {
            let mut previous = 0.0;
            for c in [0.5, 1.0, 2.0, 4.0, 10.0, 40.0] {
                let w = f.evaluate(c);
                assert!(w >= previous, "{f:?} not monotonic at {c}");
                previous = w;
            }
        }
    }

    #[test]
    fn table_weight_matches_arrhenius_values() {
        let f = WeightFunction::Table;
        // Baseline atmosphere: 30.7% transparent.
        assert!(is_close!(f.evaluate(1.0), 1.0 - 0.307));
        // Doubled CO2: 21.9% transparent.
        assert!(is_close!(f.evaluate(2.0), 1.0 - 0.219));
        // 1.9 rounds to the nearest tabulated concentration, 2.0.
        assert!(is_close!(f.evaluate(1.9), 1.0 - 0.219));
    }

    #[test]
    fn combination_rules_bounded() {
        for rule in [CombinationRule::Multiplicative, CombinationRule::AdditiveCapped] {
            for w1 in [0.0, 0.4, 1.0] {
                for w2 in [0.0, 0.7, 1.0] {
                    let combined = rule.combine(w1, w2);
                    assert!((0.0..=1.0).contains(&combined));
                }
            }
        }
        assert!(is_close!(
            CombinationRule::Multiplicative.combine(0.5, 0.4),
            0.3
        ));
        assert!(is_close!(
            CombinationRule::AdditiveCapped.combine(0.8, 0.7),
            1.0
        ));
    }

    #[test]
    fn combined_absorbance_bounded() {
        assert_eq!(combined_absorbance(0.0, 0.0), 0.0);
        assert!(is_close!(combined_absorbance(0.4, 0.0), 0.4));
        assert!(is_close!(combined_absorbance(0.5, 0.5), 0.75));
        assert_eq!(combined_absorbance(1.0, 0.3), 1.0);
    }

    #[test]
    fn vapor_column_grows_with_temperature_and_humidity() {
        let cold = water_vapor_column(273.15, 0.5);
        let warm = water_vapor_column(288.15, 0.5);
        let humid = water_vapor_column(288.15, 0.9);
        assert!(cold > 0.0);
        assert!(warm > cold);
        assert!(humid > warm);
        // At 288 K and 50% humidity the column is of order one Arrhenius
        // unit, the scale the historical tables were built around.
        assert!(warm > 0.2 && warm < 2.0);
    }

    #[test]
    fn vapor_column_zero_outside_antoine_range() {
        assert_eq!(water_vapor_column(50.0, 0.5), 0.0);
        assert_eq!(water_vapor_column(288.15, 0.0), 0.0);
    }
}
