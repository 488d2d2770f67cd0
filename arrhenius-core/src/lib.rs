//! Core of the Arrhenius radiative-equilibrium climate model
//!
//! Given gridded baseline fields and a hypothesized CO2 concentration
//! change, the crate computes the converged surface temperature change per
//! grid cell. Configuration parsing lives in [`config`], the physics in
//! [`solver`], orchestration in [`model`]; data acquisition and output
//! writing are external collaborators behind the [`provider::DataProvider`]
//! trait and the [`aggregate::ResultField`] type.

pub mod aggregate;
pub mod column;
pub mod config;
pub mod grid;
pub mod model;
pub mod provider;
pub mod solver;
pub mod weights;

pub mod errors;

/// Float type used for all model values.
pub type FloatValue = f64;
