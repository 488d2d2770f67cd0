//! Run configuration
//!
//! [`ModelConfig`] is the structured document a run starts from. Strategy
//! fields (weight functions, aggregations, vertical profile, data sources)
//! are plain identifiers in the document; [`ModelConfig::resolve`] performs
//! every registry lookup and range check up front, so an unknown identifier
//! or out-of-range value fails at validation time, never mid-run.
//!
//! Configurations load from TOML or JSON; the historical model shipped JSON
//! documents, TOML matches the rest of this workspace.

use crate::aggregate::{LatAggregation, LevelAggregation};
use crate::column::VerticalProfile;
use crate::errors::{ArrheniusError, ArrheniusResult};
use crate::grid::GridSpec;
use crate::solver::Co2Scenario;
use crate::weights::{CombinationRule, WeightFunction};
use crate::FloatValue;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What to do when the data provider has no coverage for a cell.
///
/// This is an explicit configuration choice: `abort` fails the whole run on
/// the first gap, `skip` leaves a hole in the result and counts the cell in
/// the run summary.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingDataPolicy {
    #[default]
    Abort,
    Skip,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridDims {
    /// Latitude step in degrees.
    pub lat: FloatValue,
    /// Longitude step in degrees.
    pub lon: FloatValue,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    pub dims: GridDims,
}

/// Vertical distribution policy selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default = "defaults::profile_name")]
    pub name: String,
    /// Decay rate per level for the exponential profile.
    #[serde(default = "defaults::profile_rate")]
    pub rate: FloatValue,
    /// Temperature lapse per level in kelvin for the exponential profile.
    #[serde(default = "defaults::profile_lapse")]
    pub lapse: FloatValue,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            name: defaults::profile_name(),
            rate: defaults::profile_rate(),
            lapse: defaults::profile_lapse(),
        }
    }
}

/// The `*_src` data-source identifiers, resolved against a
/// [`SourceRegistry`](crate::provider::SourceRegistry).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceSelection {
    pub temp_src: String,
    pub humidity_src: String,
    pub albedo_src: String,
    pub absorbance_src: String,
}

/// A validated-against-schema configuration document for one model run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub co2: Co2Scenario,
    pub grid: GridConfig,
    #[serde(default = "defaults::layers")]
    pub layers: usize,
    #[serde(default = "defaults::iters")]
    pub iters: usize,
    #[serde(default = "defaults::tolerance")]
    pub tolerance: FloatValue,
    /// Spatial and intensity scale factors, applied multiplicatively to
    /// convert net surface flux into a temperature update.
    #[serde(default = "defaults::scale")]
    pub scale: [FloatValue; 2],
    #[serde(default = "defaults::aggregate_lat")]
    pub aggregate_lat: String,
    #[serde(default = "defaults::aggregate_level")]
    pub aggregate_level: String,
    #[serde(rename = "CO2_weight", default = "defaults::co2_weight")]
    pub co2_weight: String,
    #[serde(rename = "H2O_weight", default = "defaults::h2o_weight")]
    pub h2o_weight: String,
    #[serde(default = "defaults::combine")]
    pub combine: String,
    #[serde(default)]
    pub missing_data: MissingDataPolicy,
    #[serde(default)]
    pub profile: ProfileConfig,
    #[serde(default = "defaults::source")]
    pub temp_src: String,
    #[serde(default = "defaults::source")]
    pub humidity_src: String,
    #[serde(default = "defaults::source")]
    pub albedo_src: String,
    #[serde(default = "defaults::source")]
    pub absorbance_src: String,
}

mod defaults {
    use super::FloatValue;

    pub fn layers() -> usize {
        1
    }
    pub fn iters() -> usize {
        1
    }
    pub fn tolerance() -> FloatValue {
        1e-6
    }
    pub fn scale() -> [FloatValue; 2] {
        [1.0, 1.0]
    }
    pub fn aggregate_lat() -> String {
        "none".to_string()
    }
    pub fn aggregate_level() -> String {
        "surface".to_string()
    }
    pub fn co2_weight() -> String {
        "table".to_string()
    }
    pub fn h2o_weight() -> String {
        "saturating".to_string()
    }
    pub fn combine() -> String {
        "multiplicative".to_string()
    }
    pub fn profile_name() -> String {
        "exponential".to_string()
    }
    pub fn profile_rate() -> FloatValue {
        0.5
    }
    pub fn profile_lapse() -> FloatValue {
        6.5
    }
    pub fn source() -> String {
        "static".to_string()
    }
}

impl ModelConfig {
    pub fn from_toml_str(document: &str) -> ArrheniusResult<Self> {
        toml::from_str(document).map_err(|e| ArrheniusError::InvalidConfig(e.to_string()))
    }

    pub fn from_json_str(document: &str) -> ArrheniusResult<Self> {
        serde_json::from_str(document).map_err(|e| ArrheniusError::InvalidConfig(e.to_string()))
    }

    /// Load a configuration file, dispatching on the file extension
    /// (`.json` is JSON, anything else is treated as TOML).
    pub fn from_path(path: &Path) -> ArrheniusResult<Self> {
        let document = std::fs::read_to_string(path).map_err(|e| {
            ArrheniusError::InvalidConfig(format!("cannot read {}: {e}", path.display()))
        })?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&document),
            _ => Self::from_toml_str(&document),
        }
    }

    /// Validate every field and resolve all strategy identifiers.
    ///
    /// Returns the fully resolved model parameters, or the first
    /// validation error. Nothing here touches the grid or a provider beyond
    /// construction; no cell work happens before this succeeds.
    pub fn resolve(&self) -> ArrheniusResult<ResolvedModel> {
        if self.layers == 0 {
            return Err(ArrheniusError::InvalidConfig(
                "layers must be at least 1".to_string(),
            ));
        }

        let co2 = Co2Scenario::new(self.co2.from, self.co2.to)?;
        let grid = GridSpec::new(self.grid.dims.lat, self.grid.dims.lon)?;
        let co2_weight = WeightFunction::from_identifier(&self.co2_weight)?;
        let h2o_weight = WeightFunction::from_identifier(&self.h2o_weight)?;
        let rule = CombinationRule::from_identifier(&self.combine)?;
        let aggregate_lat = LatAggregation::from_identifier(&self.aggregate_lat)?;
        let aggregate_level = LevelAggregation::from_identifier(&self.aggregate_level)?;
        let profile =
            VerticalProfile::from_identifier(&self.profile.name, self.profile.rate, self.profile.lapse)?;

        Ok(ResolvedModel {
            grid,
            co2,
            layers: self.layers,
            iters: self.iters,
            tolerance: self.tolerance,
            scale: self.scale,
            co2_weight,
            h2o_weight,
            rule,
            aggregate_lat,
            aggregate_level,
            profile,
            missing_data: self.missing_data,
            sources: SourceSelection {
                temp_src: self.temp_src.clone(),
                humidity_src: self.humidity_src.clone(),
                albedo_src: self.albedo_src.clone(),
                absorbance_src: self.absorbance_src.clone(),
            },
        })
    }
}

/// A configuration with every identifier resolved and every range checked.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedModel {
    pub grid: GridSpec,
    pub co2: Co2Scenario,
    pub layers: usize,
    pub iters: usize,
    pub tolerance: FloatValue,
    pub scale: [FloatValue; 2],
    pub co2_weight: WeightFunction,
    pub h2o_weight: WeightFunction,
    pub rule: CombinationRule,
    pub aggregate_lat: LatAggregation,
    pub aggregate_level: LevelAggregation,
    pub profile: VerticalProfile,
    pub missing_data: MissingDataPolicy,
    pub sources: SourceSelection,
}
