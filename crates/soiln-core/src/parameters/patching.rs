//! Patch management parameters
//!
//! Options controlling how incoming deltas are partitioned between patches and
//! when patches are considered similar enough to be amalgamated.

use crate::errors::SoilNError;
use crate::FloatValue;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// How deltas from transport and plant uptake are split between patches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartitionApproach {
    /// Weight by each patch's amount in the affected layer
    BasedOnLayerConcentration,
    /// Weight by each patch's amount from the surface down to the affected layer
    BasedOnSoilConcentration,
    /// Layer weighting for removals, soil weighting for additions
    BasedOnConcentrationAndDelta,
}

impl FromStr for PartitionApproach {
    type Err = SoilNError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "basedonlayerconcentration" => Ok(PartitionApproach::BasedOnLayerConcentration),
            "basedonsoilconcentration" => Ok(PartitionApproach::BasedOnSoilConcentration),
            "basedonconcentrationanddelta" => Ok(PartitionApproach::BasedOnConcentrationAndDelta),
            _ => Err(SoilNError::UnknownOption {
                kind: "partition approach".to_string(),
                value: raw.to_string(),
            }),
        }
    }
}

/// Strategy used when looking for patches that can be amalgamated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AmalgamationApproach {
    /// Compare every pair of patches once, then merge all equal pairs
    CompareAll,
    /// Compare each patch with the base patch first, merging as they are found
    CompareBase,
    /// Compare each patch with all later patches, merging as they are found
    CompareMerge,
}

impl FromStr for AmalgamationApproach {
    type Err = SoilNError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compareall" => Ok(AmalgamationApproach::CompareAll),
            "comparebase" => Ok(AmalgamationApproach::CompareBase),
            "comparemerge" => Ok(AmalgamationApproach::CompareMerge),
            _ => Err(SoilNError::UnknownOption {
                kind: "amalgamation approach".to_string(),
                value: raw.to_string(),
            }),
        }
    }
}

/// How the base patch is chosen for the relaxed comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BaseApproach {
    /// The first patch
    IdBased,
    /// The patch with the largest area
    AreaBased,
}

impl FromStr for BaseApproach {
    type Err = SoilNError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "idbased" => Ok(BaseApproach::IdBased),
            "areabased" => Ok(BaseApproach::AreaBased),
            _ => Err(SoilNError::UnknownOption {
                kind: "base patch approach".to_string(),
                value: raw.to_string(),
            }),
        }
    }
}

/// Relative and absolute tolerance used when comparing one variable.
///
/// A negative value disables that half of the test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub relative: FloatValue,
    pub absolute: FloatValue,
}

impl Tolerance {
    pub const fn new(relative: FloatValue, absolute: FloatValue) -> Self {
        Self { relative, absolute }
    }

    /// Whether `a` and `b` differ by more than the tolerance scaled by `adjust`.
    ///
    /// `base` is the value the relative difference is computed against.
    pub fn exceeded(&self, a: FloatValue, b: FloatValue, base: FloatValue, adjust: FloatValue) -> bool {
        let diff = (a - b).abs();
        if self.absolute >= 0.0 && diff > self.absolute * adjust {
            return true;
        }
        self.relative > 0.0 && base > crate::EPSILON && diff / base > self.relative * adjust
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchParameters {
    /// Partitioning of transport and uptake deltas between patches
    /// default: BasedOnConcentrationAndDelta
    pub partition_approach: PartitionApproach,

    /// Depth of soil considered when partitioning by soil concentration
    /// unit: mm
    /// default: 0.0 (down to the affected layer)
    pub layer_for_partition_cutoff: FloatValue,

    /// Whether patches are amalgamated automatically at the end of each day
    /// default: true
    pub auto_amalgamation: bool,

    /// Strategy used to find similar patches
    /// default: CompareAll
    pub amalgamation_approach: AmalgamationApproach,

    /// How the base patch is chosen
    /// default: AreaBased
    pub base_patch_approach: BaseApproach,

    /// Merge patches older than `age_for_merging` into the first patch
    /// default: false
    pub amalgamation_by_age: bool,

    /// Age above which patches are merged back
    /// unit: years
    /// default: 3.0
    pub age_for_merging: FloatValue,

    /// Factor applied to the tolerances when comparing against the base patch
    /// default: 0.5
    pub diff_adjust_factor: FloatValue,

    /// Depth down to which layer-by-layer values are compared
    /// unit: mm
    /// default: 99.0
    pub depth_to_test_by_layer: FloatValue,

    /// Smallest area a patch may have
    /// unit: 0-1
    /// default: 1e-6
    pub min_patch_area: FloatValue,

    /// Tolerance on total organic C
    /// unit: kg/ha
    /// default: relative 0.02, absolute 500
    pub org_c_tolerance: Tolerance,

    /// Tolerance on total organic N
    /// unit: kg/ha
    /// default: relative 0.02, absolute 50
    pub org_n_tolerance: Tolerance,

    /// Tolerance on total microbial biomass C
    /// unit: kg/ha
    /// default: relative 0.02, absolute 50
    pub biom_c_tolerance: Tolerance,

    /// Tolerance on total urea
    /// unit: kg/ha
    /// default: relative 0.02, absolute 2
    pub urea_tolerance: Tolerance,

    /// Tolerance on total NH4
    /// unit: kg/ha
    /// default: relative 0.02, absolute 5
    pub nh4_tolerance: Tolerance,

    /// Tolerance on total NO3
    /// unit: kg/ha
    /// default: relative 0.02, absolute 5
    pub no3_tolerance: Tolerance,

    /// Tolerance on layer values
    /// unit: ppm
    /// default: relative 0.02, absolute 1
    pub layer_tolerance: Tolerance,

    /// Upper limit of the total mineral N available to plants in the root zone
    /// unit: kg/ha
    /// default: 9999.9
    pub max_total_n_available_to_plants: FloatValue,
}

impl Default for PatchParameters {
    fn default() -> Self {
        Self {
            partition_approach: PartitionApproach::BasedOnConcentrationAndDelta,
            layer_for_partition_cutoff: 0.0,
            auto_amalgamation: true,
            amalgamation_approach: AmalgamationApproach::CompareAll,
            base_patch_approach: BaseApproach::AreaBased,
            amalgamation_by_age: false,
            age_for_merging: 3.0,
            diff_adjust_factor: 0.5,
            depth_to_test_by_layer: 99.0,
            min_patch_area: 1e-6,
            org_c_tolerance: Tolerance::new(0.02, 500.0),
            org_n_tolerance: Tolerance::new(0.02, 50.0),
            biom_c_tolerance: Tolerance::new(0.02, 50.0),
            urea_tolerance: Tolerance::new(0.02, 2.0),
            nh4_tolerance: Tolerance::new(0.02, 5.0),
            no3_tolerance: Tolerance::new(0.02, 5.0),
            layer_tolerance: Tolerance::new(0.02, 1.0),
            max_total_n_available_to_plants: 9999.9,
        }
    }
}

impl PatchParameters {
    /// Age in days after which a patch is merged back, when age merging is on.
    pub fn age_for_merging_days(&self) -> FloatValue {
        self.age_for_merging * 364.0
    }
}
