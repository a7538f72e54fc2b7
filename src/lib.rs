//! Patch-resolved soil carbon and nitrogen transformations.
//!
//! The workspace is split into three crates, re-exported here:
//!
//! - [`soiln_core`]: shared state, parameters, soil description and mass balance
//! - [`soiln_processes`]: the daily process engine run on each patch
//! - [`soiln_patches`]: the patch manager, which splits the paddock into
//!   patches and presents it to other models as a single soil

pub use soiln_core;
pub use soiln_patches;
pub use soiln_processes;

pub use soiln_core::errors::{SoilNError, SoilNResult};
pub use soiln_core::parameters::SoilNitrogenParameters;
pub use soiln_patches::{PatchManager, SoilDescription};
