//! Baseline data providers
//!
//! A [`DataProvider`] supplies the gridded baseline fields the model
//! consumes: temperature, humidity, albedo and absorbance. Providers are
//! queried only while atmosphere columns are constructed, a clearly
//! separated phase before the (pure) solve phase; a provider signals a
//! coverage gap with [`ArrheniusError::MissingData`] and the run
//! configuration decides whether that skips the cell or aborts the run.
//!
//! Data acquisition itself (reanalysis downloads, NetCDF readers) is
//! external; this module ships an in-memory [`GriddedProvider`] and the
//! static baselines of a [`ConstantProvider`], plus the [`SourceRegistry`]
//! that maps the `*_src` configuration identifiers onto providers.

use crate::errors::{ArrheniusError, ArrheniusResult};
use crate::FloatValue;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The baseline fields a provider can be asked for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Temperature,
    Humidity,
    Albedo,
    Co2Absorbance,
    H2oAbsorbance,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::Temperature => "temperature",
            FieldKind::Humidity => "humidity",
            FieldKind::Albedo => "albedo",
            FieldKind::Co2Absorbance => "co2_absorbance",
            FieldKind::H2oAbsorbance => "h2o_absorbance",
        };
        f.write_str(name)
    }
}

/// Supplier of baseline gridded geophysical fields.
///
/// Coordinates are degrees (latitude in `[-90, 90]`, longitude in
/// `[-180, 180)`); `level` is the vertical level the value is wanted for,
/// with 0 meaning the surface.
pub trait DataProvider: Send + Sync {
    fn lookup(
        &self,
        field: FieldKind,
        lat: FloatValue,
        lon: FloatValue,
        level: usize,
    ) -> ArrheniusResult<FloatValue>;
}

/// Provider returning the same value everywhere for each field.
///
/// Useful as the builtin `static` source and as a synthetic provider in
/// tests. The single absorbance value feeds both the CO2 and H2O absorbance
/// fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConstantProvider {
    pub temperature: FloatValue,
    pub humidity: FloatValue,
    pub albedo: FloatValue,
    pub absorbance: FloatValue,
}

impl ConstantProvider {
    pub fn new(
        temperature: FloatValue,
        humidity: FloatValue,
        albedo: FloatValue,
        absorbance: FloatValue,
    ) -> Self {
        Self {
            temperature,
            humidity,
            albedo,
            absorbance,
        }
    }

    /// The static baselines the original model shipped for runs without any
    /// dataset on disk: 288.15 K, 50% relative humidity, 0.3 albedo and the
    /// 0.70 static atmospheric absorbance.
    pub fn arrhenius_baseline() -> Self {
        Self::new(288.15, 0.5, 0.3, 0.70)
    }
}

impl DataProvider for ConstantProvider {
    fn lookup(
        &self,
        field: FieldKind,
        _lat: FloatValue,
        _lon: FloatValue,
        _level: usize,
    ) -> ArrheniusResult<FloatValue> {
        Ok(match field {
            FieldKind::Temperature => self.temperature,
            FieldKind::Humidity => self.humidity,
            FieldKind::Albedo => self.albedo,
            FieldKind::Co2Absorbance | FieldKind::H2oAbsorbance => self.absorbance,
        })
    }
}

/// In-memory gridded provider with nearest-neighbour sampling.
///
/// Each field is a `(lat, lon)` array covering the whole globe on its own
/// native resolution; lookups sample the nearest native cell, so data can be
/// served onto any run grid without an explicit regridding pass. `NaN`
/// entries are coverage holes and surface as [`ArrheniusError::MissingData`].
#[derive(Clone, Debug, Default)]
pub struct GriddedProvider {
    fields: HashMap<FieldKind, Array2<FloatValue>>,
}

impl GriddedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a field on its native grid. The array must be non-empty.
    pub fn with_field(mut self, field: FieldKind, data: Array2<FloatValue>) -> ArrheniusResult<Self> {
        if data.is_empty() {
            return Err(ArrheniusError::InvalidConfig(format!(
                "empty data array for field {field}"
            )));
        }
        self.fields.insert(field, data);
        Ok(self)
    }

    fn nearest_index(coordinate: FloatValue, origin: FloatValue, extent: FloatValue, cells: usize) -> usize {
        let step = extent / cells as FloatValue;
        let index = ((coordinate - origin) / step).floor();
        (index.max(0.0) as usize).min(cells - 1)
    }
}

impl DataProvider for GriddedProvider {
    fn lookup(
        &self,
        field: FieldKind,
        lat: FloatValue,
        lon: FloatValue,
        level: usize,
    ) -> ArrheniusResult<FloatValue> {
        let missing = || ArrheniusError::MissingData {
            field: field.to_string(),
            lat,
            lon,
            level,
        };

        let data = self.fields.get(&field).ok_or_else(missing)?;
        let (lat_cells, lon_cells) = data.dim();
        let i = Self::nearest_index(lat, -90.0, 180.0, lat_cells);
        let j = Self::nearest_index(lon, -180.0, 360.0, lon_cells);
        let value = data[[i, j]];
        if value.is_nan() {
            return Err(missing());
        }
        Ok(value)
    }
}

/// Per-field provider selection, routing each [`FieldKind`] to the provider
/// chosen by the matching `*_src` configuration identifier.
#[derive(Clone)]
pub struct CompositeProvider {
    temperature: Arc<dyn DataProvider>,
    humidity: Arc<dyn DataProvider>,
    albedo: Arc<dyn DataProvider>,
    absorbance: Arc<dyn DataProvider>,
}

impl DataProvider for CompositeProvider {
    fn lookup(
        &self,
        field: FieldKind,
        lat: FloatValue,
        lon: FloatValue,
        level: usize,
    ) -> ArrheniusResult<FloatValue> {
        let provider = match field {
            FieldKind::Temperature => &self.temperature,
            FieldKind::Humidity => &self.humidity,
            FieldKind::Albedo => &self.albedo,
            FieldKind::Co2Absorbance | FieldKind::H2oAbsorbance => &self.absorbance,
        };
        provider.lookup(field, lat, lon, level)
    }
}

/// Registry mapping data-source identifiers to providers.
///
/// Source identifiers from the configuration (`temp_src`, `humidity_src`,
/// `albedo_src`, `absorbance_src`) are resolved here at validation time;
/// unknown identifiers fail before any cell is touched.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<String, Arc<dyn DataProvider>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding only the builtin `static` source.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("static", Arc::new(ConstantProvider::arrhenius_baseline()));
        registry
    }

    pub fn register(&mut self, identifier: &str, provider: Arc<dyn DataProvider>) {
        self.sources.insert(identifier.to_string(), provider);
    }

    fn resolve(&self, identifier: &str, field: &str) -> ArrheniusResult<Arc<dyn DataProvider>> {
        self.sources
            .get(identifier)
            .cloned()
            .ok_or_else(|| ArrheniusError::UnknownSource {
                identifier: identifier.to_string(),
                field: field.to_string(),
            })
    }

    /// Resolve the four `*_src` identifiers into a composite provider.
    pub fn build(
        &self,
        temp_src: &str,
        humidity_src: &str,
        albedo_src: &str,
        absorbance_src: &str,
    ) -> ArrheniusResult<CompositeProvider> {
        Ok(CompositeProvider {
            temperature: self.resolve(temp_src, "temp_src")?,
            humidity: self.resolve(humidity_src, "humidity_src")?,
            albedo: self.resolve(albedo_src, "albedo_src")?,
            absorbance: self.resolve(absorbance_src, "absorbance_src")?,
        })
    }
}
