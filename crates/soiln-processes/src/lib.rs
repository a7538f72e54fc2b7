//! Daily soil carbon and nitrogen process engine
//!
//! Each process is a component constructed from its parameter struct that
//! updates one patch's [`LayerState`](soiln_core::layers::LayerState) in place:
//!
//! - `residues`: decomposition of surface residues into biomass and humus,
//!   limited by the mineral N available near the surface
//! - `organic_matter`: humus, microbial biomass and fresh organic matter turnover
//! - `hydrolysis`: urea hydrolysis to ammonium
//! - `nitrification`: single-step nitrification, or the two-step
//!   nitritation/nitratation path with codenitrification
//! - `denitrification`: nitrate loss to N2 and N2O
//!
//! [`ProcessEngine`] runs them in the daily order and then applies the
//! negative-value policy to every pool.

mod environment;

pub mod denitrification;
pub mod engine;
pub mod hydrolysis;
pub mod nitrification;
pub mod organic_matter;
pub mod residues;

pub use engine::ProcessEngine;
pub use environment::LayerEnvironment;
pub use residues::{ActualDecomposition, PotentialDecomposition, ResidueActual, ResiduePotential};
