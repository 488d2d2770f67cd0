//! Radiative-equilibrium solver
//!
//! For each [`AtmosphereColumn`] the solver computes the steady-state
//! temperature change induced by moving the atmospheric CO2 concentration
//! from `co2.from` to `co2.to`.
//!
//! A single pass evaluates absorption weights for both concentrations,
//! derives the incremental radiative forcing per layer, propagates the flux
//! from the top layer down to the surface (each layer absorbing its share
//! and transmitting the rest) and converts the net surface flux into a
//! temperature update via the configured scale factors. Passes repeat with
//! the updated temperature driving the humidity-dependent weights until the
//! update falls below the tolerance or the iteration budget runs out.
//! Exhausting the budget is not an error: the best-effort estimate is
//! returned tagged as non-converged.
//!
//! Columns are independent; solving holds no shared state and performs no
//! I/O, so the caller is free to fan columns out across a worker pool.

use crate::column::AtmosphereColumn;
use crate::errors::{ArrheniusError, ArrheniusResult};
use crate::grid::GridCell;
use crate::weights::{combined_absorbance, water_vapor_column, CombinationRule, WeightFunction};
use crate::FloatValue;
use is_close::is_close;
use log::{debug, trace};
use serde::{Deserialize, Serialize};

/// Stefan-Boltzmann constant, W m^-2 K^-4.
const STEFAN_BOLTZMANN: FloatValue = 5.670374419e-8;

/// A hypothesized change in atmospheric CO2 concentration, in multiples of
/// the baseline.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Co2Scenario {
    pub from: FloatValue,
    pub to: FloatValue,
}

impl Co2Scenario {
    pub fn new(from: FloatValue, to: FloatValue) -> ArrheniusResult<Self> {
        if !(from > 0.0) || !(to > 0.0) {
            return Err(ArrheniusError::InvalidConfig(format!(
                "CO2 concentrations must be positive, got from={from}, to={to}"
            )));
        }
        Ok(Self { from, to })
    }

    /// The identity case: no concentration change, zero forcing.
    pub fn is_identity(&self) -> bool {
        is_close!(self.from, self.to)
    }
}

/// Per-column scratch state during iteration. Created and discarded within
/// one [`EquilibriumSolver::solve_column`] call.
#[derive(Debug)]
struct ConvergenceState {
    /// Current surface temperature delta estimate.
    delta: FloatValue,
    iterations: usize,
    /// Magnitude of the most recent update.
    last_step: FloatValue,
}

/// Result of solving one column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnSolution {
    pub cell: GridCell,
    /// Temperature delta per layer, surface first.
    pub deltas: Vec<FloatValue>,
    pub converged: bool,
    pub iterations: usize,
}

/// The radiative-equilibrium solver for one run's configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EquilibriumSolver {
    co2: Co2Scenario,
    co2_weight: WeightFunction,
    h2o_weight: WeightFunction,
    rule: CombinationRule,
    /// Product of the spatial and intensity scale factors.
    scale: FloatValue,
    tolerance: FloatValue,
    iters: usize,
}

impl EquilibriumSolver {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        co2: Co2Scenario,
        co2_weight: WeightFunction,
        h2o_weight: WeightFunction,
        rule: CombinationRule,
        scale: [FloatValue; 2],
        tolerance: FloatValue,
        iters: usize,
    ) -> ArrheniusResult<Self> {
        let scale_product = scale[0] * scale[1];
        if !scale_product.is_finite() || scale_product == 0.0 {
            return Err(ArrheniusError::InvalidConfig(format!(
                "scale factors {scale:?} have a non-finite or zero product"
            )));
        }
        if !(tolerance >= 0.0) {
            return Err(ArrheniusError::InvalidConfig(format!(
                "convergence tolerance must be non-negative, got {tolerance}"
            )));
        }
        Ok(Self {
            co2,
            co2_weight,
            h2o_weight,
            rule,
            scale: scale_product,
            tolerance,
            iters,
        })
    }

    pub fn co2(&self) -> Co2Scenario {
        self.co2
    }

    pub fn iters(&self) -> usize {
        self.iters
    }

    /// Solve one column to radiative equilibrium.
    ///
    /// `iters = 0` returns the single first-pass estimate with no iterative
    /// refinement; this is documented behaviour, not an error. A column that
    /// exhausts its budget is returned with `converged == false`.
    pub fn solve_column(&self, column: &AtmosphereColumn) -> ArrheniusResult<ColumnSolution> {
        let cell = column.cell;

        // Identity scenario: zero forcing by definition, skip the iteration
        // entirely.
        if self.co2.is_identity() {
            return Ok(ColumnSolution {
                cell,
                deltas: vec![0.0; column.layer_count()],
                converged: true,
                iterations: 0,
            });
        }

        let mut state = ConvergenceState {
            delta: 0.0,
            iterations: 0,
            last_step: FloatValue::INFINITY,
        };
        let mut layer_deltas = vec![0.0; column.layer_count()];
        let mut converged = false;

        // One mandatory first pass, then up to `iters` refinements.
        for pass in 0..=self.iters {
            let pass_deltas = self.column_pass(column, state.delta);
            let surface_delta = pass_deltas[0];
            if !surface_delta.is_finite() {
                return Err(ArrheniusError::NumericInstability {
                    lat_index: cell.lat_index,
                    lon_index: cell.lon_index,
                    detail: format!("surface delta became {surface_delta} on pass {pass}"),
                });
            }

            state.last_step = (surface_delta - state.delta).abs();
            state.delta = surface_delta;
            state.iterations = pass + 1;
            layer_deltas = pass_deltas;

            trace!(
                "cell ({}, {}) pass {pass}: delta {:.6} K, step {:.2e}",
                cell.lat_index,
                cell.lon_index,
                state.delta,
                state.last_step
            );

            if state.last_step < self.tolerance {
                converged = true;
                break;
            }
        }

        if !converged {
            debug!(
                "cell ({}, {}) did not converge within {} iterations (last step {:.2e})",
                cell.lat_index, cell.lon_index, self.iters, state.last_step
            );
        }

        if layer_deltas.iter().any(|delta| !delta.is_finite()) {
            return Err(ArrheniusError::NumericInstability {
                lat_index: cell.lat_index,
                lon_index: cell.lon_index,
                detail: "non-finite layer delta".to_string(),
            });
        }

        Ok(ColumnSolution {
            cell,
            deltas: layer_deltas,
            converged,
            iterations: state.iterations,
        })
    }

    /// One evaluation of the energy balance at the current temperature
    /// estimate, returning per-layer temperature deltas.
    ///
    /// The current surface delta shifts every layer's baseline uniformly, so
    /// the humidity feedback and emission both see the updated state.
    fn column_pass(&self, column: &AtmosphereColumn, current_delta: FloatValue) -> Vec<FloatValue> {
        let w_co2_from = self.co2_weight.evaluate(self.co2.from);
        let w_co2_to = self.co2_weight.evaluate(self.co2.to);

        let mut deltas = vec![0.0; column.layer_count()];
        // Downward flux arriving from the layers above, top first.
        let mut incoming = 0.0;
        for layer in column.layers().iter().rev() {
            let temperature = layer.temperature + current_delta;
            let vapor = water_vapor_column(temperature, layer.humidity);
            let w_h2o = self.h2o_weight.evaluate(vapor);
            let w_from = self.rule.combine(w_co2_from, w_h2o);
            let w_to = self.rule.combine(w_co2_to, w_h2o);

            let absorbance = combined_absorbance(layer.co2_absorbance, layer.h2o_absorbance);
            // Incremental forcing generated at this layer by the
            // concentration change.
            let generated = (w_to - w_from)
                * absorbance
                * STEFAN_BOLTZMANN
                * temperature.powi(4)
                * (1.0 - layer.albedo);

            if layer.level_index == 0 {
                // The surface absorbs whatever arrives plus its own forcing.
                deltas[0] = (incoming + generated) / self.scale;
            } else {
                // A zero-absorbance layer traps nothing and transmits the
                // full flux unchanged.
                deltas[layer.level_index] = incoming * absorbance / self.scale;
                incoming = incoming * (1.0 - absorbance) + generated;
            }
        }
        deltas
    }
}
