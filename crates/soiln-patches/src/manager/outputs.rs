//! Paddock-level outputs.
//!
//! Every value reported for the paddock is the area-weighted sum over
//! patches, $\sum_k A_k x_k$, so outputs are in kg/ha of paddock.

use super::solutes::Solute;
use super::PatchManager;
use crate::patch::{Attribution, Patch};
use serde::{Deserialize, Serialize};
use soiln_core::balance::MassBalance;
use soiln_core::errors::SoilNError;
use soiln_core::layers::{DailyFluxes, LayerState};
use soiln_core::{Day, FloatValue};
use std::str::FromStr;

/// Daily fluxes that can be reported per layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Flux {
    ResidueToBiomass,
    ResidueToHumus,
    ResidueToAtmosphere,
    ResidueNh4Mineralisation,
    ResidueNo3Mineralisation,
    HumusToBiomass,
    HumusToAtmosphere,
    HumusNMineralisation,
    BiomassToHumus,
    BiomassToAtmosphere,
    BiomassNMineralisation,
    FomToBiomass,
    FomToHumus,
    FomToAtmosphere,
    FomNMineralisation,
    Nh4DeficitImmobilisation,
    UreaHydrolysis,
    Nitrification,
    Nitratation,
    N2oNitrification,
    Codenitrification,
    N2oCodenitrification,
    Denitrification,
    N2oDenitrification,
    NetMineralisation,
    Co2Emission,
}

impl Flux {
    /// Value of the flux in one layer of one patch (kg/ha).
    pub fn value(&self, fluxes: &DailyFluxes, layer: usize) -> FloatValue {
        match self {
            Flux::ResidueToBiomass => fluxes.c_res_to_biom[layer],
            Flux::ResidueToHumus => fluxes.c_res_to_hum[layer],
            Flux::ResidueToAtmosphere => fluxes.c_res_to_atm[layer],
            Flux::ResidueNh4Mineralisation => fluxes.res_nh4_min[layer],
            Flux::ResidueNo3Mineralisation => fluxes.res_no3_min[layer],
            Flux::HumusToBiomass => fluxes.c_hum_to_biom[layer],
            Flux::HumusToAtmosphere => fluxes.c_hum_to_atm[layer],
            Flux::HumusNMineralisation => fluxes.n_hum_to_min[layer],
            Flux::BiomassToHumus => fluxes.c_biom_to_hum[layer],
            Flux::BiomassToAtmosphere => fluxes.c_biom_to_atm[layer],
            Flux::BiomassNMineralisation => fluxes.n_biom_to_min[layer],
            Flux::FomToBiomass => fluxes.c_fom_to_biom.column(layer).sum(),
            Flux::FomToHumus => fluxes.c_fom_to_hum.column(layer).sum(),
            Flux::FomToAtmosphere => fluxes.c_fom_to_atm.column(layer).sum(),
            Flux::FomNMineralisation => fluxes.n_fom_to_min[layer],
            Flux::Nh4DeficitImmobilisation => fluxes.nh4_deficit_immob[layer],
            Flux::UreaHydrolysis => fluxes.urea_hydrolysis[layer],
            Flux::Nitrification => fluxes.nitrification[layer],
            Flux::Nitratation => fluxes.nitratation[layer],
            Flux::N2oNitrification => fluxes.n2o_nitrif[layer],
            Flux::Codenitrification => fluxes.codenitrification[layer],
            Flux::N2oCodenitrification => fluxes.n2o_codenit[layer],
            Flux::Denitrification => fluxes.no3_dnit[layer],
            Flux::N2oDenitrification => fluxes.n2o_dnit[layer],
            Flux::NetMineralisation => fluxes.net_mineralisation(layer),
            Flux::Co2Emission => fluxes.co2_emission(layer),
        }
    }
}

impl FromStr for Flux {
    type Err = SoilNError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let flux = match raw.trim().to_ascii_lowercase().as_str() {
            "dlt_c_res_to_biom" => Flux::ResidueToBiomass,
            "dlt_c_res_to_hum" => Flux::ResidueToHumus,
            "dlt_c_res_to_atm" => Flux::ResidueToAtmosphere,
            "dlt_res_nh4_min" => Flux::ResidueNh4Mineralisation,
            "dlt_res_no3_min" => Flux::ResidueNo3Mineralisation,
            "dlt_c_hum_to_biom" => Flux::HumusToBiomass,
            "dlt_c_hum_to_atm" => Flux::HumusToAtmosphere,
            "dlt_n_hum_to_min" => Flux::HumusNMineralisation,
            "dlt_c_biom_to_hum" => Flux::BiomassToHumus,
            "dlt_c_biom_to_atm" => Flux::BiomassToAtmosphere,
            "dlt_n_biom_to_min" => Flux::BiomassNMineralisation,
            "dlt_c_fom_to_biom" => Flux::FomToBiomass,
            "dlt_c_fom_to_hum" => Flux::FomToHumus,
            "dlt_c_fom_to_atm" => Flux::FomToAtmosphere,
            "dlt_n_fom_to_min" => Flux::FomNMineralisation,
            "nh4_deficit_immob" => Flux::Nh4DeficitImmobilisation,
            "dlt_urea_hydrol" => Flux::UreaHydrolysis,
            "nitrification" => Flux::Nitrification,
            "nitratation" => Flux::Nitratation,
            "n2o_atm_nitrification" => Flux::N2oNitrification,
            "codenitrification" => Flux::Codenitrification,
            "n2o_atm_codenitrification" => Flux::N2oCodenitrification,
            "dlt_no3_dnit" | "denitrification" => Flux::Denitrification,
            "n2o_atm_denitrification" => Flux::N2oDenitrification,
            "mineral_n_net" | "net_mineralisation" => Flux::NetMineralisation,
            "co2_atm" => Flux::Co2Emission,
            _ => {
                return Err(SoilNError::UnknownOption {
                    kind: "flux".to_string(),
                    value: raw.to_string(),
                })
            }
        };
        Ok(flux)
    }
}

/// State of one patch, as reported to the outside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchSummary {
    pub name: String,
    pub area: FloatValue,
    pub creation_day: Day,
    /// kg/ha of patch
    pub total_c: FloatValue,
    /// kg/ha of patch
    pub total_n: FloatValue,
    pub mineral_n: FloatValue,
}

impl From<&Patch> for PatchSummary {
    fn from(patch: &Patch) -> Self {
        Self {
            name: patch.name.clone(),
            area: patch.area,
            creation_day: patch.creation_day,
            total_c: patch.state.sum_total_c(),
            total_n: patch.state.sum_total_n(),
            mineral_n: patch.state.profile_sum(LayerState::mineral_n),
        }
    }
}

impl PatchManager {
    /// Area-weighted profile total.
    pub fn paddock_total(&self, f: impl Fn(&LayerState) -> FloatValue) -> FloatValue {
        self.patches.iter().map(|p| f(&p.state) * p.area).sum()
    }

    /// Area-weighted value per layer.
    pub fn paddock_layers(&self, f: impl Fn(&LayerState, usize) -> FloatValue) -> Vec<FloatValue> {
        let mut result = vec![0.0; self.profile.n_layers()];
        for patch in &self.patches {
            for (layer, value) in result.iter_mut().enumerate() {
                *value += f(&patch.state, layer) * patch.area;
            }
        }
        result
    }

    pub fn organic_c(&self) -> Vec<FloatValue> {
        self.paddock_layers(LayerState::organic_c)
    }

    pub fn organic_n(&self) -> Vec<FloatValue> {
        self.paddock_layers(LayerState::organic_n)
    }

    pub fn mineral_n(&self) -> Vec<FloatValue> {
        self.paddock_layers(LayerState::mineral_n)
    }

    pub fn total_c(&self) -> Vec<FloatValue> {
        self.paddock_layers(LayerState::total_c)
    }

    pub fn total_n(&self) -> Vec<FloatValue> {
        self.paddock_layers(LayerState::total_n)
    }

    /// Today's value of a flux per layer.
    pub fn flux(&self, flux: Flux) -> Vec<FloatValue> {
        self.paddock_layers(|state, layer| flux.value(&state.fluxes, layer))
    }

    /// Today's C and N balance of the paddock; zero when mass is conserved.
    pub fn balance(&self) -> MassBalance {
        self.patches
            .iter()
            .fold(MassBalance::default(), |mut total, patch| {
                let balance = patch.balance();
                total.nitrogen += balance.nitrogen * patch.area;
                total.carbon += balance.carbon * patch.area;
                total
            })
    }

    /// Today's changes to a solute made by other models, by source.
    pub fn attribution(&self, solute: Solute) -> Attribution {
        let mut result = Attribution::zeros(self.profile.n_layers());
        for patch in &self.patches {
            let own = patch.attribution.get(solute);
            for (total, values) in [
                (&mut result.flow, &own.flow),
                (&mut result.uptake, &own.uptake),
                (&mut result.fertiliser, &own.fertiliser),
                (&mut result.other, &own.other),
            ] {
                for (x, y) in total.iter_mut().zip(values) {
                    *x += y * patch.area;
                }
            }
        }
        result
    }

    pub fn patch_names(&self) -> Vec<String> {
        self.patches.iter().map(|p| p.name.clone()).collect()
    }

    pub fn patch_areas(&self) -> Vec<FloatValue> {
        self.patches.iter().map(|p| p.area).collect()
    }

    pub fn patch_summaries(&self) -> Vec<PatchSummary> {
        self.patches.iter().map(PatchSummary::from).collect()
    }
}
