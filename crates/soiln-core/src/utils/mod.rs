//! Numeric helpers shared by the process engine and the patch manager.

pub mod interpolation;
