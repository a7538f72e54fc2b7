//! Core types for patch-resolved soil carbon and nitrogen modelling.
//!
//! This crate holds everything the process engine and the patch manager share:
//!
//! - `errors`: the fatal error conditions raised during a simulated day
//! - `parameters`: immutable, serde-loadable configuration with reference defaults
//! - `soil`: static soil description and the daily physical conditions
//! - `response`: environmental limiting factors (temperature, moisture, pH, ...)
//! - `layers`: per-layer pool state and the daily flux record
//! - `negative`: the three-tier negative-value policy
//! - `balance`: start-of-day snapshots and the daily C and N balance

pub mod balance;
pub mod errors;
pub mod layers;
pub mod negative;
pub mod parameters;
pub mod response;
pub mod soil;
pub mod utils;

/// Floating point type used for every pool and flux.
pub type FloatValue = f64;

/// Simulation day counter, as supplied by the outer clock.
pub type Day = i64;

/// Values smaller than this are treated as zero by the process logic.
pub const EPSILON: FloatValue = 1e-12;

/// Number of fresh organic matter sub-pools (carbohydrate, cellulose, lignin).
pub const FOM_POOLS: usize = 3;
