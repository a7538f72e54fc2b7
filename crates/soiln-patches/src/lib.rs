//! Patch lifecycle management for spatially heterogeneous soil C and N.
//!
//! A paddock is split into patches, each covering a fraction of its area and
//! holding its own carbon and nitrogen pools. Patches share the soil profile
//! and the daily conditions; the relative areas of all patches sum to one.
//!
//! - `initialisation`: derive the starting pools from a soil description
//! - `patch`: one patch and the changes other models made to it today
//! - `commands`: add-patch, merge, N change and FOM incorporation requests
//! - `manager`: the [`PatchManager`], which runs the processes on every
//!   patch, creates and merges patches, and reports paddock values
//!
//! ```
//! use soiln_core::parameters::SoilNitrogenParameters;
//! use soiln_core::soil::SoilConditions;
//! use soiln_patches::commands::{AddPatchCommand, DepositionType};
//! use soiln_patches::initialisation::SoilDescription;
//! use soiln_patches::manager::solutes::Solute;
//! use soiln_patches::PatchManager;
//! use soiln_processes::PotentialDecomposition;
//!
//! let soil = SoilDescription::uniform(3, 100.0, 1.3, 1.2);
//! let mut manager = PatchManager::new(SoilNitrogenParameters::default(), &soil, 1).unwrap();
//!
//! manager.begin_day(1);
//! let urine = AddPatchCommand::new(DepositionType::ToNewPatch, 0.05)
//!     .affecting_names(&["base"])
//!     .named("urine")
//!     .with_solute(Solute::Urea, vec![500.0]);
//! manager.add_patch(&urine).unwrap();
//!
//! let conditions = SoilConditions::uniform(3, 15.0, 0.25);
//! manager
//!     .run_day(&conditions, &PotentialDecomposition::default())
//!     .unwrap();
//! manager.end_of_day().unwrap();
//!
//! assert_eq!(manager.n_patches(), 2);
//! ```

pub mod commands;
pub mod initialisation;
pub mod manager;
pub mod patch;

pub use commands::{AddPatchCommand, DepositionType, MergeCommand, NitrogenChange};
pub use initialisation::SoilDescription;
pub use manager::outputs::{Flux, PatchSummary};
pub use manager::solutes::{CallerKind, Solute};
pub use manager::PatchManager;
pub use patch::Patch;
