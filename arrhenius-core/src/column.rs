//! Atmosphere columns
//!
//! An [`AtmosphereColumn`] is the per-grid-cell vertical stack of [`Layer`]s
//! carrying baseline state. Level 0 is the surface; every column in a run
//! has the same layer count (uniform vertical discretization).
//!
//! Surface baselines come from the [`DataProvider`]; levels above the
//! surface derive their baselines from the surface values through a
//! [`VerticalProfile`] policy. The policy is pluggable so alternative
//! vertical structures can be substituted without touching the solver.

use crate::errors::{ArrheniusError, ArrheniusResult};
use crate::grid::{GridCell, GridSpec};
use crate::provider::{DataProvider, FieldKind};
use crate::FloatValue;
use serde::{Deserialize, Serialize};

/// One atmospheric layer of a column.
///
/// Albedo is meaningful only at the surface layer and is zero above it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub level_index: usize,
    /// Baseline temperature in kelvin.
    pub temperature: FloatValue,
    /// Relative humidity as a fraction in `[0, 1]`.
    pub humidity: FloatValue,
    pub co2_absorbance: FloatValue,
    pub h2o_absorbance: FloatValue,
    pub albedo: FloatValue,
}

/// Policy deriving upper-layer baselines from surface values.
///
/// The original model tied layer structure to reanalysis pressure levels;
/// here the vertical distribution is an explicit, configurable strategy
/// resolved by identifier at validation time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerticalProfile {
    /// Humidity and absorbance decay as `exp(-rate * level)`; temperature
    /// falls by `lapse` kelvin per level.
    Exponential { rate: FloatValue, lapse: FloatValue },
    /// Upper layers carry no humidity or absorbance and keep the surface
    /// temperature. Under this profile a multi-layer run degenerates
    /// exactly to the single-layer model.
    SurfaceOnly,
    /// Upper layers repeat the surface values unchanged.
    Uniform,
}

impl VerticalProfile {
    /// Default exponential profile: scale height of two levels, 6.5 K lapse
    /// per level.
    pub fn default_exponential() -> Self {
        Self::Exponential {
            rate: 0.5,
            lapse: 6.5,
        }
    }

    pub fn from_identifier(
        identifier: &str,
        rate: FloatValue,
        lapse: FloatValue,
    ) -> ArrheniusResult<Self> {
        match identifier {
            "exponential" => Ok(Self::Exponential { rate, lapse }),
            "surface_only" => Ok(Self::SurfaceOnly),
            "uniform" => Ok(Self::Uniform),
            other => Err(ArrheniusError::UnknownProfile(other.to_string())),
        }
    }

    fn decay(&self, surface_value: FloatValue, level: usize) -> FloatValue {
        match self {
            Self::Exponential { rate, .. } => surface_value * (-rate * level as FloatValue).exp(),
            Self::SurfaceOnly => 0.0,
            Self::Uniform => surface_value,
        }
    }

    fn temperature(&self, surface_temperature: FloatValue, level: usize) -> FloatValue {
        match self {
            Self::Exponential { lapse, .. } => surface_temperature - lapse * level as FloatValue,
            Self::SurfaceOnly | Self::Uniform => surface_temperature,
        }
    }
}

/// Vertical stack of layers for one grid cell, surface first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AtmosphereColumn {
    pub cell: GridCell,
    layers: Vec<Layer>,
}

impl AtmosphereColumn {
    /// Build a column of `layers` layers over `cell`.
    ///
    /// Surface baselines are looked up from `provider` at the cell's center
    /// coordinates; upper levels derive from the surface through `profile`.
    /// Fails with [`ArrheniusError::MissingData`] if the provider has no
    /// coverage for the cell, and with
    /// [`ArrheniusError::InvalidConfig`] if `layers` is zero.
    pub fn build(
        cell: GridCell,
        grid: &GridSpec,
        layers: usize,
        provider: &dyn DataProvider,
        profile: &VerticalProfile,
    ) -> ArrheniusResult<Self> {
        if layers == 0 {
            return Err(ArrheniusError::InvalidConfig(
                "a column needs at least one layer".to_string(),
            ));
        }

        let lat = grid.center_lat(cell.lat_index);
        let lon = grid.center_lon(cell.lon_index);

        let temperature = provider.lookup(FieldKind::Temperature, lat, lon, 0)?;
        let humidity = provider.lookup(FieldKind::Humidity, lat, lon, 0)?;
        let albedo = provider.lookup(FieldKind::Albedo, lat, lon, 0)?;
        let co2_absorbance = provider.lookup(FieldKind::Co2Absorbance, lat, lon, 0)?;
        let h2o_absorbance = provider.lookup(FieldKind::H2oAbsorbance, lat, lon, 0)?;

        let mut stack = Vec::with_capacity(layers);
        stack.push(Layer {
            level_index: 0,
            temperature,
            humidity,
            co2_absorbance,
            h2o_absorbance,
            albedo,
        });
        for level in 1..layers {
            stack.push(Layer {
                level_index: level,
                temperature: profile.temperature(temperature, level),
                humidity: profile.decay(humidity, level),
                co2_absorbance: profile.decay(co2_absorbance, level),
                h2o_absorbance: profile.decay(h2o_absorbance, level),
                albedo: 0.0,
            });
        }

        Ok(Self { cell, layers: stack })
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn surface(&self) -> &Layer {
        // Construction guarantees at least one layer.
        &self.layers[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ConstantProvider;
    use is_close::is_close;

    fn provider() -> ConstantProvider {
        ConstantProvider::new(288.15, 0.5, 0.3, 0.4)
    }

    fn grid() -> GridSpec {
        GridSpec::new(10.0, 10.0).unwrap()
    }

    #[test]
    fn single_layer_column_takes_surface_values() {
        let column = AtmosphereColumn::build(
            GridCell::new(3, 7),
            &grid(),
            1,
            &provider(),
            &VerticalProfile::default_exponential(),
        )
        .unwrap();
        assert_eq!(column.layer_count(), 1);
        let surface = column.surface();
        assert_eq!(surface.level_index, 0);
        assert_eq!(surface.temperature, 288.15);
        assert_eq!(surface.humidity, 0.5);
        assert_eq!(surface.albedo, 0.3);
        assert_eq!(surface.co2_absorbance, 0.4);
    }

    #[test]
    fn exponential_profile_decays_with_height() {
        let column = AtmosphereColumn::build(
            GridCell::new(0, 0),
            &grid(),
            3,
            &provider(),
            &VerticalProfile::Exponential {
                rate: 0.5,
                lapse: 6.5,
            },
        )
        .unwrap();
        let layers = column.layers();
        assert_eq!(layers.len(), 3);
        assert!(is_close!(layers[1].humidity, 0.5 * (-0.5f64).exp()));
        assert!(is_close!(layers[2].humidity, 0.5 * (-1.0f64).exp()));
        assert!(is_close!(layers[1].temperature, 288.15 - 6.5));
        assert!(layers[1].co2_absorbance < layers[0].co2_absorbance);
        // Albedo only lives at the surface.
        assert_eq!(layers[1].albedo, 0.0);
        assert_eq!(layers[2].albedo, 0.0);
    }

    #[test]
    fn surface_only_profile_empties_upper_layers() {
        let column = AtmosphereColumn::build(
            GridCell::new(0, 0),
            &grid(),
            3,
            &provider(),
            &VerticalProfile::SurfaceOnly,
        )
        .unwrap();
        for layer in &column.layers()[1..] {
            assert_eq!(layer.humidity, 0.0);
            assert_eq!(layer.co2_absorbance, 0.0);
            assert_eq!(layer.h2o_absorbance, 0.0);
            assert_eq!(layer.temperature, 288.15);
        }
    }

    #[test]
    fn zero_layers_rejected() {
        let result = AtmosphereColumn::build(
            GridCell::new(0, 0),
            &grid(),
            0,
            &provider(),
            &VerticalProfile::Uniform,
        );
        assert!(matches!(result, Err(ArrheniusError::InvalidConfig(_))));
    }

    #[test]
    fn unknown_profile_identifier() {
        let result = VerticalProfile::from_identifier("isothermal", 0.5, 6.5);
        assert!(matches!(result, Err(ArrheniusError::UnknownProfile(_))));
    }
}
