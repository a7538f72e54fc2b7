//! Daily process sequence for one patch.
//!
//! The order is fixed, and each process applies its deltas before the next
//! one runs:
//!
//! 1. residue decomposition
//! 2. urea hydrolysis
//! 3. denitrification
//! 4. soil organic matter turnover
//! 5. nitrification
//! 6. negative-value check of every pool

use crate::denitrification::Denitrification;
use crate::hydrolysis::UreaHydrolysis;
use crate::nitrification::Nitrification;
use crate::organic_matter::OrganicMatterTurnover;
use crate::residues::{ActualDecomposition, PotentialDecomposition, ResidueDecomposition};
use log::trace;
use serde::{Deserialize, Serialize};
use soiln_core::errors::{SoilNError, SoilNResult};
use soiln_core::layers::LayerState;
use soiln_core::negative::NegativeValuePolicy;
use soiln_core::parameters::SoilNitrogenParameters;
use soiln_core::soil::{SoilConditions, SoilProfile};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessEngine {
    residues: ResidueDecomposition,
    hydrolysis: UreaHydrolysis,
    denitrification: Denitrification,
    organic_matter: OrganicMatterTurnover,
    nitrification: Nitrification,
    #[serde(skip)]
    policy: NegativeValuePolicy,
}

impl ProcessEngine {
    pub fn new() -> Self {
        Self::from_parameters(&SoilNitrogenParameters::default())
    }

    pub fn from_parameters(parameters: &SoilNitrogenParameters) -> Self {
        Self {
            residues: ResidueDecomposition::from_parameters(
                parameters.residues.clone(),
                parameters.soil_organic_matter.biomass_cn_ratio,
            ),
            hydrolysis: UreaHydrolysis::from_parameters(parameters.hydrolysis.clone()),
            denitrification: Denitrification::from_parameters(parameters.denitrification.clone()),
            organic_matter: OrganicMatterTurnover::from_parameters(
                parameters.fom.clone(),
                parameters.soil_organic_matter.clone(),
            ),
            nitrification: Nitrification::from_parameters(
                parameters.nitrification.clone(),
                parameters.codenitrification.clone(),
                parameters.denitrification.clone(),
            ),
            policy: NegativeValuePolicy::new(&parameters.negative_values),
        }
    }

    pub fn policy(&self) -> &NegativeValuePolicy {
        &self.policy
    }

    /// Run one day of transformations on one patch.
    ///
    /// Returns the residue decomposition realised in this patch.
    pub fn run_day(
        &self,
        profile: &SoilProfile,
        conditions: &SoilConditions,
        residues: &PotentialDecomposition,
        state: &mut LayerState,
    ) -> SoilNResult<ActualDecomposition> {
        conditions.check_layers(profile)?;
        if state.n_layers() != profile.n_layers() {
            return Err(SoilNError::LayerMismatch {
                variable: "layer state".to_string(),
                expected: profile.n_layers(),
                actual: state.n_layers(),
            });
        }

        let actual = self.residues.solve(profile, conditions, residues, state)?;
        self.hydrolysis.solve(profile, conditions, state)?;
        self.denitrification.solve(profile, conditions, state)?;
        self.organic_matter.solve(profile, conditions, state)?;
        self.nitrification.solve(profile, conditions, state)?;
        state.check_pools(&self.policy, "daily processes")?;

        trace!(
            "processes done: total N {:.4} kg/ha, total C {:.4} kg/ha",
            state.sum_total_n(),
            state.sum_total_c()
        );
        Ok(actual)
    }
}

impl Default for ProcessEngine {
    fn default() -> Self {
        Self::new()
    }
}
