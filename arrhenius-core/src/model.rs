//! Model run orchestration
//!
//! [`ModelRun`] ties the pieces together in order: grid construction,
//! column construction from the data provider (the only phase that touches
//! anything resembling I/O), the parallel per-cell equilibrium solve, and
//! aggregation into the final [`ResultField`].
//!
//! Cells are solved independently, so the solve phase fans out over a rayon
//! worker pool; each worker owns disjoint columns and the results are merged
//! into the write-once field afterwards. Per-cell missing-data failures are
//! isolated under the `skip` policy and surface in the [`RunSummary`]
//! together with the count of columns that exhausted their iteration budget.

use crate::aggregate::{aggregate, LatAggregation, LevelAggregation, ResultField};
use crate::column::AtmosphereColumn;
use crate::config::{MissingDataPolicy, ModelConfig};
use crate::errors::{ArrheniusError, ArrheniusResult};
use crate::provider::{DataProvider, SourceRegistry};
use crate::solver::{Co2Scenario, ColumnSolution, EquilibriumSolver};
use crate::FloatValue;
use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Per-run diagnostics reported alongside the result.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub cells_total: usize,
    /// Cells absent from the result because the provider had no coverage
    /// (skip policy only).
    pub cells_skipped: usize,
    /// Columns whose iteration budget ran out before the tolerance was met.
    /// Their best-effort estimates are still part of the result.
    pub columns_non_converged: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cells ({} skipped, {} non-converged)",
            self.cells_total, self.cells_skipped, self.columns_non_converged
        )
    }
}

/// Result of one [`ModelRun::run`] invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct RunOutput {
    pub field: ResultField,
    pub summary: RunSummary,
}

/// One configured model, ready to run.
///
/// Construction performs all validation and registry resolution; `run` can
/// then only fail on provider gaps (under the `abort` policy) or numeric
/// instability. Each invocation is independent and shares no state with
/// previous runs.
pub struct ModelRun {
    model: crate::config::ResolvedModel,
    provider: Arc<dyn DataProvider>,
}

impl ModelRun {
    /// Validate `config` and attach an explicit data provider.
    pub fn new(config: &ModelConfig, provider: Arc<dyn DataProvider>) -> ArrheniusResult<Self> {
        let model = config.resolve()?;
        // Fail on bad scale/tolerance now rather than at run time.
        Self::build_solver(&model)?;
        Ok(Self { model, provider })
    }

    /// Validate `config` and resolve its `*_src` identifiers against a
    /// source registry.
    pub fn from_registry(config: &ModelConfig, registry: &SourceRegistry) -> ArrheniusResult<Self> {
        let model = config.resolve()?;
        let provider = registry.build(
            &model.sources.temp_src,
            &model.sources.humidity_src,
            &model.sources.albedo_src,
            &model.sources.absorbance_src,
        )?;
        Self::new(config, Arc::new(provider))
    }

    fn build_solver(model: &crate::config::ResolvedModel) -> ArrheniusResult<EquilibriumSolver> {
        EquilibriumSolver::new(
            model.co2,
            model.co2_weight,
            model.h2o_weight,
            model.rule,
            model.scale,
            model.tolerance,
            model.iters,
        )
    }

    pub fn set_co2(&mut self, co2: Co2Scenario) {
        self.model.co2 = co2;
    }

    pub fn set_iterations(&mut self, iters: usize) {
        self.model.iters = iters;
    }

    pub fn set_layers(&mut self, layers: usize) -> ArrheniusResult<()> {
        if layers == 0 {
            return Err(ArrheniusError::InvalidConfig(
                "layers must be at least 1".to_string(),
            ));
        }
        self.model.layers = layers;
        Ok(())
    }

    pub fn set_aggregations(&mut self, lat: LatAggregation, level: LevelAggregation) {
        self.model.aggregate_lat = lat;
        self.model.aggregate_level = level;
    }

    pub fn set_missing_data_policy(&mut self, policy: MissingDataPolicy) {
        self.model.missing_data = policy;
    }

    /// Execute the model: construct columns, solve every cell, aggregate.
    pub fn run(&self) -> ArrheniusResult<RunOutput> {
        let model = &self.model;
        let cells_total = model.grid.cell_count();
        info!(
            "model run: {} cells, {} layer(s), CO2 {} -> {}, {} iteration budget",
            cells_total, model.layers, model.co2.from, model.co2.to, model.iters
        );

        // Phase 1: column construction, the only phase that queries the
        // provider. Sequential; providers may be file-backed.
        let mut columns = Vec::with_capacity(cells_total);
        let mut cells_skipped = 0usize;
        for cell in model.grid.cells() {
            match AtmosphereColumn::build(
                cell,
                &model.grid,
                model.layers,
                self.provider.as_ref(),
                &model.profile,
            ) {
                Ok(column) => columns.push(column),
                Err(error @ ArrheniusError::MissingData { .. }) => {
                    if model.missing_data == MissingDataPolicy::Skip {
                        debug!("skipping cell ({}, {}): {error}", cell.lat_index, cell.lon_index);
                        cells_skipped += 1;
                    } else {
                        return Err(error);
                    }
                }
                Err(error) => return Err(error),
            }
        }

        // Phase 2: pure computation, parallel across disjoint columns.
        let solver = Self::build_solver(model)?;
        let solutions: Vec<ColumnSolution> = columns
            .par_iter()
            .map(|column| solver.solve_column(column))
            .collect::<ArrheniusResult<Vec<_>>>()?;

        // Phase 3: merge and aggregate. Each cell appears exactly once, so
        // assembling the field is a plain reduce.
        let mut raw: BTreeMap<_, Vec<FloatValue>> = BTreeMap::new();
        let mut columns_non_converged = 0usize;
        for solution in solutions {
            if !solution.converged {
                columns_non_converged += 1;
            }
            raw.insert(solution.cell, solution.deltas);
        }
        let field = aggregate(&raw, model.aggregate_lat, model.aggregate_level);

        let summary = RunSummary {
            cells_total,
            cells_skipped,
            columns_non_converged,
        };
        info!("model run finished: {summary}");

        Ok(RunOutput { field, summary })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::ResultKey;
    use crate::provider::{ConstantProvider, FieldKind, GriddedProvider};
    use ndarray::Array2;

    fn config(json: &str) -> ModelConfig {
        ModelConfig::from_json_str(json).unwrap()
    }

    fn coarse_config() -> ModelConfig {
        config(
            r#"{
                "co2": {"from": 1.0, "to": 2.0},
                "grid": {"dims": {"lat": 45.0, "lon": 90.0}},
                "iters": 50
            }"#,
        )
    }

    fn constant_provider() -> Arc<dyn DataProvider> {
        Arc::new(ConstantProvider::new(288.15, 0.5, 0.3, 0.4))
    }

    #[test]
    fn constant_inputs_give_uniform_warming() {
        let run = ModelRun::new(&coarse_config(), constant_provider()).unwrap();
        let output = run.run().unwrap();

        assert_eq!(output.field.len(), 4 * 4);
        assert_eq!(output.summary.cells_skipped, 0);
        assert_eq!(output.summary.columns_non_converged, 0);

        let first = output.field.values().next().unwrap();
        assert!(first > 0.0);
        for value in output.field.values() {
            assert!(value.is_finite());
            assert_eq!(value, first);
        }
    }

    #[test]
    fn identity_scenario_is_exactly_zero_everywhere() {
        let mut run = ModelRun::new(&coarse_config(), constant_provider()).unwrap();
        run.set_co2(Co2Scenario::new(2.0, 2.0).unwrap());
        let output = run.run().unwrap();
        assert!(output.field.values().all(|v| v == 0.0));
    }

    #[test]
    fn multilayer_surface_result_matches_single_layer_under_degenerate_profile() {
        let document = r#"{
            "co2": {"from": 1.0, "to": 2.0},
            "grid": {"dims": {"lat": 45.0, "lon": 90.0}},
            "iters": 50,
            "aggregate_level": "surface",
            "profile": {"name": "surface_only"}
        }"#;
        let mut run = ModelRun::new(&config(document), constant_provider()).unwrap();

        run.set_layers(1).unwrap();
        let single = run.run().unwrap();
        run.set_layers(3).unwrap();
        let triple = run.run().unwrap();

        // Upper layers carry no absorbing gas under this profile, so the
        // surface results coincide exactly.
        assert_eq!(single.field, triple.field);
    }

    #[test]
    fn missing_cell_aborts_strict_run() {
        let mut temperature = Array2::from_elem((4, 4), 288.15);
        temperature[[1, 2]] = f64::NAN;
        let provider = GriddedProvider::new()
            .with_field(FieldKind::Temperature, temperature)
            .unwrap()
            .with_field(FieldKind::Humidity, Array2::from_elem((4, 4), 0.5))
            .unwrap()
            .with_field(FieldKind::Albedo, Array2::from_elem((4, 4), 0.3))
            .unwrap()
            .with_field(FieldKind::Co2Absorbance, Array2::from_elem((4, 4), 0.4))
            .unwrap()
            .with_field(FieldKind::H2oAbsorbance, Array2::from_elem((4, 4), 0.4))
            .unwrap();

        let run = ModelRun::new(&coarse_config(), Arc::new(provider.clone())).unwrap();
        assert!(matches!(
            run.run(),
            Err(ArrheniusError::MissingData { .. })
        ));

        // The same provider under the skip policy leaves one hole.
        let mut run = ModelRun::new(&coarse_config(), Arc::new(provider)).unwrap();
        run.set_missing_data_policy(MissingDataPolicy::Skip);
        let output = run.run().unwrap();
        assert_eq!(output.summary.cells_skipped, 1);
        assert_eq!(output.field.len(), 15);
        assert_eq!(output.field.get(&ResultKey::cell(1, 2)), None);
    }

    #[test]
    fn zonal_mean_produces_one_value_per_band() {
        let mut run = ModelRun::new(&coarse_config(), constant_provider()).unwrap();
        run.set_aggregations(LatAggregation::Mean, LevelAggregation::Surface);
        let output = run.run().unwrap();
        assert_eq!(output.field.len(), 4);
        assert!(output.field.get(&ResultKey::zonal(0)).is_some());
    }

    #[test]
    fn runs_are_independent() {
        let run = ModelRun::new(&coarse_config(), constant_provider()).unwrap();
        let first = run.run().unwrap();
        let second = run.run().unwrap();
        assert_eq!(first.field, second.field);
        assert_eq!(first.summary, second.summary);
    }

    #[test]
    fn registry_backed_run_uses_static_baselines() {
        let registry = SourceRegistry::with_builtins();
        let run = ModelRun::from_registry(&coarse_config(), &registry).unwrap();
        let output = run.run().unwrap();
        assert!(output.field.values().all(|v| v > 0.0));
    }
}
