//! Mineral N solutes exchanged with the rest of the simulation.
//!
//! Outside models see one value per layer for each solute, the area-weighted
//! sum over patches. Changes they make come back as deltas, which are either
//! split between patches in proportion to what each holds (transport and
//! plant uptake) or applied identically to every patch.

use super::partition::partition_delta;
use super::PatchManager;
use log::debug;
use serde::{Deserialize, Serialize};
use soiln_core::errors::{SoilNError, SoilNResult};
use soiln_core::{FloatValue, EPSILON};
use std::fmt;
use std::str::FromStr;

/// Mineral N forms other models can read and change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Solute {
    Urea,
    NH4,
    NO3,
}

impl Solute {
    pub const ALL: [Solute; 3] = [Solute::Urea, Solute::NH4, Solute::NO3];

    pub fn name(&self) -> &'static str {
        match self {
            Solute::Urea => "urea",
            Solute::NH4 => "nh4",
            Solute::NO3 => "no3",
        }
    }
}

impl fmt::Display for Solute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Solute {
    type Err = SoilNError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "urea" => Ok(Solute::Urea),
            "nh4" => Ok(Solute::NH4),
            "no3" => Ok(Solute::NO3),
            _ => Err(SoilNError::UnknownSolute(raw.to_string())),
        }
    }
}

/// Kind of model sending a change.
///
/// Determines both the attribution bucket and whether the change is
/// partitioned between patches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallerKind {
    /// Water and solute transport (leaching, runoff)
    Transport,
    Plant,
    Fertiliser,
    Other,
}

impl CallerKind {
    /// Whether a change from this caller is split between patches.
    pub fn partitions(&self) -> bool {
        matches!(self, CallerKind::Transport | CallerKind::Plant)
    }
}

impl FromStr for CallerKind {
    type Err = SoilNError;

    /// Unknown senders are treated as [`CallerKind::Other`].
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ok(match raw.trim().to_ascii_lowercase().as_str() {
            "transport" | "watermodule" | "soil" => CallerKind::Transport,
            "plant" => CallerKind::Plant,
            "fertiliser" | "fertilizer" => CallerKind::Fertiliser,
            _ => CallerKind::Other,
        })
    }
}

fn has_significant_values(values: &[FloatValue]) -> bool {
    values.iter().any(|v| v.abs() > EPSILON)
}

impl PatchManager {
    /// Area-weighted amount of a solute per layer (kg/ha).
    ///
    /// NH4 includes the NH3 pool.
    pub fn solute(&self, solute: Solute) -> Vec<FloatValue> {
        let mut result = vec![0.0; self.profile.n_layers()];
        for patch in &self.patches {
            let nh3 = &patch.state.nh3;
            for (layer, value) in patch.solute(solute).iter().enumerate() {
                let extra = if solute == Solute::NH4 { nh3[layer] } else { 0.0 };
                result[layer] += (value + extra) * patch.area;
            }
        }
        result
    }

    /// Set the paddock amount of a solute; the difference from the current
    /// amount is applied as a delta.
    pub fn set_solute(
        &mut self,
        solute: Solute,
        caller: CallerKind,
        values: &[FloatValue],
    ) -> SoilNResult<()> {
        let current = self.solute(solute);
        let delta: Vec<FloatValue> = values
            .iter()
            .zip(&current)
            .map(|(new, old)| new - old)
            .collect();
        self.set_solute_delta(solute, caller, &delta)
    }

    /// Apply a change in a solute made by another model.
    pub fn set_solute_delta(
        &mut self,
        solute: Solute,
        caller: CallerKind,
        delta: &[FloatValue],
    ) -> SoilNResult<()> {
        if !has_significant_values(delta) {
            return Ok(());
        }
        let n_layers = self.profile.n_layers();
        if delta.len() > n_layers {
            debug!(
                "{} delta has {} layers, only {} are used",
                solute,
                delta.len(),
                n_layers
            );
        }

        if self.patches.len() > 1 && caller.partitions() {
            let mut padded = vec![0.0; n_layers];
            for (target, value) in padded.iter_mut().zip(delta) {
                *target = *value;
            }
            let amounts: Vec<Vec<FloatValue>> = self
                .patches
                .iter()
                .map(|patch| {
                    if caller == CallerKind::Plant && solute != Solute::Urea {
                        patch.plant_available(
                            solute,
                            &self.profile,
                            self.root_depth,
                            self.parameters.patches.max_total_n_available_to_plants,
                        )
                    } else {
                        patch.solute(solute).to_vec()
                    }
                })
                .collect();
            let areas: Vec<FloatValue> = self.patches.iter().map(|p| p.area).collect();
            let partitioned = partition_delta(
                solute,
                &amounts,
                &areas,
                &padded,
                &self.profile,
                self.parameters.patches.partition_approach,
                self.parameters.patches.layer_for_partition_cutoff,
            )?;
            for (patch, patch_delta) in self.patches.iter_mut().zip(&partitioned) {
                patch.add_solute(solute, caller, patch_delta, &self.policy)?;
            }
        } else {
            for patch in self.patches.iter_mut() {
                patch.add_solute(solute, caller, delta, &self.policy)?;
            }
        }
        Ok(())
    }
}
