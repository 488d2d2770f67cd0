//! Arrhenius radiative-equilibrium climate model
//!
//! Thin facade over [`arrhenius_core`]; the command-line runner in this
//! package loads a configuration, runs the model, and writes the resulting
//! temperature-delta field as JSON.

pub use arrhenius_core::*;
