//! Result aggregation
//!
//! The solver produces a per-cell, per-layer delta field; this module
//! reduces it to the dimensionality the configuration requests and wraps it
//! in the immutable [`ResultField`] handed to the external output writer.
//!
//! Both reductions are independent, named strategies resolved by identifier
//! at configuration-validation time; an unknown identifier is an
//! [`ArrheniusError::UnknownAggregation`] before any cell is solved.

use crate::errors::{ArrheniusError, ArrheniusResult};
use crate::grid::GridCell;
use crate::FloatValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Reduction across longitude within each latitude band.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LatAggregation {
    /// Keep the full two-dimensional grid.
    #[default]
    None,
    /// Zonal mean: average all cells of a latitude band.
    Mean,
}

impl LatAggregation {
    pub fn from_identifier(identifier: &str) -> ArrheniusResult<Self> {
        match identifier {
            "none" => Ok(Self::None),
            "mean" => Ok(Self::Mean),
            other => Err(ArrheniusError::UnknownAggregation {
                identifier: other.to_string(),
                dimension: "latitude".to_string(),
            }),
        }
    }
}

/// Selection of the vertical level(s) contributing to the reported result.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelAggregation {
    /// Report the surface layer (level 0) only.
    #[default]
    Surface,
    /// Average across all levels.
    Mean,
    /// Keep every level, adding a level index to the result keys.
    None,
}

impl LevelAggregation {
    pub fn from_identifier(identifier: &str) -> ArrheniusResult<Self> {
        match identifier {
            "surface" => Ok(Self::Surface),
            "mean" => Ok(Self::Mean),
            "none" => Ok(Self::None),
            other => Err(ArrheniusError::UnknownAggregation {
                identifier: other.to_string(),
                dimension: "level".to_string(),
            }),
        }
    }
}

/// Key of one entry in a [`ResultField`].
///
/// `lon_index` is absent after latitude aggregation, `level_index` is
/// present only when all levels are kept.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResultKey {
    pub lat_index: usize,
    pub lon_index: Option<usize>,
    pub level_index: Option<usize>,
}

impl ResultKey {
    pub fn cell(lat_index: usize, lon_index: usize) -> Self {
        Self {
            lat_index,
            lon_index: Some(lon_index),
            level_index: None,
        }
    }

    pub fn cell_level(lat_index: usize, lon_index: usize, level_index: usize) -> Self {
        Self {
            lat_index,
            lon_index: Some(lon_index),
            level_index: Some(level_index),
        }
    }

    pub fn zonal(lat_index: usize) -> Self {
        Self {
            lat_index,
            lon_index: None,
            level_index: None,
        }
    }

    pub fn zonal_level(lat_index: usize, level_index: usize) -> Self {
        Self {
            lat_index,
            lon_index: None,
            level_index: Some(level_index),
        }
    }
}

/// Final output of a model run: temperature deltas keyed by grid position.
///
/// Immutable once produced; cells skipped over missing data are simply
/// absent.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultField {
    deltas: BTreeMap<ResultKey, FloatValue>,
}

/// One serializable entry of a [`ResultField`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub lat_index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_index: Option<usize>,
    pub delta: FloatValue,
}

impl ResultField {
    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn get(&self, key: &ResultKey) -> Option<FloatValue> {
        self.deltas.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResultKey, &FloatValue)> {
        self.deltas.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = FloatValue> + '_ {
        self.deltas.values().copied()
    }

    /// Entries in deterministic key order, for serialization by an external
    /// writer.
    pub fn to_entries(&self) -> Vec<ResultEntry> {
        self.deltas
            .iter()
            .map(|(key, delta)| ResultEntry {
                lat_index: key.lat_index,
                lon_index: key.lon_index,
                level_index: key.level_index,
                delta: *delta,
            })
            .collect()
    }

    pub fn mean(&self) -> Option<FloatValue> {
        if self.deltas.is_empty() {
            return None;
        }
        Some(self.values().sum::<FloatValue>() / self.len() as FloatValue)
    }

    pub fn min(&self) -> Option<FloatValue> {
        self.values().reduce(FloatValue::min)
    }

    pub fn max(&self) -> Option<FloatValue> {
        self.values().reduce(FloatValue::max)
    }
}

/// Reduce the raw per-cell, per-layer deltas into the configured shape.
pub fn aggregate(
    raw: &BTreeMap<GridCell, Vec<FloatValue>>,
    lat: LatAggregation,
    level: LevelAggregation,
) -> ResultField {
    // Vertical reduction first: each cell collapses to the reported levels.
    let reduced: BTreeMap<GridCell, Vec<(Option<usize>, FloatValue)>> = raw
        .iter()
        .map(|(cell, deltas)| {
            let reported = match level {
                LevelAggregation::Surface => vec![(None, deltas[0])],
                LevelAggregation::Mean => {
                    let mean = deltas.iter().sum::<FloatValue>() / deltas.len() as FloatValue;
                    vec![(None, mean)]
                }
                LevelAggregation::None => deltas
                    .iter()
                    .enumerate()
                    .map(|(index, delta)| (Some(index), *delta))
                    .collect(),
            };
            (*cell, reported)
        })
        .collect();

    let mut field = ResultField::default();
    match lat {
        LatAggregation::None => {
            for (cell, reported) in &reduced {
                for (level_index, delta) in reported {
                    let key = match level_index {
                        Some(level) => ResultKey::cell_level(cell.lat_index, cell.lon_index, *level),
                        None => ResultKey::cell(cell.lat_index, cell.lon_index),
                    };
                    field.deltas.insert(key, *delta);
                }
            }
        }
        LatAggregation::Mean => {
            // Average over the cells actually present in each band, so holes
            // from skipped cells do not bias the zonal mean toward zero.
            let mut sums: BTreeMap<(usize, Option<usize>), (FloatValue, usize)> = BTreeMap::new();
            for (cell, reported) in &reduced {
                for (level_index, delta) in reported {
                    let slot = sums.entry((cell.lat_index, *level_index)).or_insert((0.0, 0));
                    slot.0 += delta;
                    slot.1 += 1;
                }
            }
            for ((lat_index, level_index), (sum, count)) in sums {
                let key = match level_index {
                    Some(level) => ResultKey::zonal_level(lat_index, level),
                    None => ResultKey::zonal(lat_index),
                };
                field.deltas.insert(key, sum / count as FloatValue);
            }
        }
    }
    field
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    fn raw() -> BTreeMap<GridCell, Vec<FloatValue>> {
        let mut raw = BTreeMap::new();
        raw.insert(GridCell::new(0, 0), vec![1.0, 3.0]);
        raw.insert(GridCell::new(0, 1), vec![2.0, 4.0]);
        raw.insert(GridCell::new(1, 0), vec![5.0, 7.0]);
        raw
    }

    #[test]
    fn surface_selection_keeps_level_zero() {
        let field = aggregate(&raw(), LatAggregation::None, LevelAggregation::Surface);
        assert_eq!(field.len(), 3);
        assert_eq!(field.get(&ResultKey::cell(0, 0)), Some(1.0));
        assert_eq!(field.get(&ResultKey::cell(0, 1)), Some(2.0));
        assert_eq!(field.get(&ResultKey::cell(1, 0)), Some(5.0));
    }

    #[test]
    fn level_mean_averages_the_column() {
        let field = aggregate(&raw(), LatAggregation::None, LevelAggregation::Mean);
        assert_eq!(field.get(&ResultKey::cell(0, 0)), Some(2.0));
        assert_eq!(field.get(&ResultKey::cell(1, 0)), Some(6.0));
    }

    #[test]
    fn level_none_keeps_all_levels() {
        let field = aggregate(&raw(), LatAggregation::None, LevelAggregation::None);
        assert_eq!(field.len(), 6);
        assert_eq!(field.get(&ResultKey::cell_level(0, 0, 0)), Some(1.0));
        assert_eq!(field.get(&ResultKey::cell_level(0, 0, 1)), Some(3.0));
    }

    #[test]
    fn zonal_mean_collapses_longitude() {
        let field = aggregate(&raw(), LatAggregation::Mean, LevelAggregation::Surface);
        assert_eq!(field.len(), 2);
        assert!(is_close!(field.get(&ResultKey::zonal(0)).unwrap(), 1.5));
        assert!(is_close!(field.get(&ResultKey::zonal(1)).unwrap(), 5.0));
    }

    #[test]
    fn zonal_mean_ignores_missing_cells() {
        // Band 0 has one hole; the mean is over present cells only.
        let mut raw = raw();
        raw.remove(&GridCell::new(0, 1));
        let field = aggregate(&raw, LatAggregation::Mean, LevelAggregation::Surface);
        assert!(is_close!(field.get(&ResultKey::zonal(0)).unwrap(), 1.0));
    }

    #[test]
    fn statistics_over_field() {
        let field = aggregate(&raw(), LatAggregation::None, LevelAggregation::Surface);
        assert!(is_close!(field.mean().unwrap(), (1.0 + 2.0 + 5.0) / 3.0));
        assert_eq!(field.min(), Some(1.0));
        assert_eq!(field.max(), Some(5.0));
        assert_eq!(ResultField::default().mean(), None);
    }

    #[test]
    fn unknown_identifiers_fail_at_resolution() {
        assert!(matches!(
            LatAggregation::from_identifier("median"),
            Err(ArrheniusError::UnknownAggregation { dimension, .. }) if dimension == "latitude"
        ));
        assert!(matches!(
            LevelAggregation::from_identifier("top"),
            Err(ArrheniusError::UnknownAggregation { dimension, .. }) if dimension == "level"
        ));
        assert!(LatAggregation::from_identifier("mean").is_ok());
        assert!(LevelAggregation::from_identifier("surface").is_ok());
    }
}
