//! Per-layer pool state and the daily flux record.
//!
//! Every pool is held in kg/ha per soil layer. The three FOM sub-pools are
//! stored as `(FOM_POOLS, n_layers)` arrays so that a pool can be addressed as
//! `fom_c[[pool, layer]]` and a layer total taken as `fom_c.column(layer).sum()`.

use crate::errors::SoilNResult;
use crate::negative::NegativeValuePolicy;
use crate::{FloatValue, FOM_POOLS};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Area-weighted blend of `b` into `a`, in place.
fn blend(a: &mut [FloatValue], b: &[FloatValue], wa: FloatValue, wb: FloatValue) {
    let total = wa + wb;
    for (x, y) in a.iter_mut().zip(b) {
        *x = (*x * wa + y * wb) / total;
    }
}

/// Area-weighted average of two arrays. Both must have the same shape.
fn blend_array(a: &mut Array2<FloatValue>, b: &Array2<FloatValue>, wa: FloatValue, wb: FloatValue) {
    debug_assert_eq!(a.dim(), b.dim(), "blended arrays differ in shape");
    let total = wa + wb;
    a.zip_mut_with(b, |x, y| *x = (*x * wa + y * wb) / total);
}

/// Fluxes computed during one day. These are not carried across days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyFluxes {
    // residues
    pub c_res_to_biom: Vec<FloatValue>,
    pub c_res_to_hum: Vec<FloatValue>,
    pub c_res_to_atm: Vec<FloatValue>,
    pub res_nh4_min: Vec<FloatValue>,
    pub res_no3_min: Vec<FloatValue>,
    /// Actual C decomposed per residue and layer, `(n_residues, n_layers)`
    pub c_decomp: Array2<FloatValue>,
    /// Actual N decomposed per residue and layer, `(n_residues, n_layers)`
    pub n_decomp: Array2<FloatValue>,

    // humus
    pub c_hum_to_biom: Vec<FloatValue>,
    pub c_hum_to_atm: Vec<FloatValue>,
    pub n_hum_to_min: Vec<FloatValue>,

    // microbial biomass
    pub c_biom_to_hum: Vec<FloatValue>,
    pub c_biom_to_atm: Vec<FloatValue>,
    pub n_biom_to_min: Vec<FloatValue>,

    // fresh organic matter, `(FOM_POOLS, n_layers)`
    pub c_fom_to_biom: Array2<FloatValue>,
    pub c_fom_to_hum: Array2<FloatValue>,
    pub c_fom_to_atm: Array2<FloatValue>,
    pub n_fom: Array2<FloatValue>,
    pub n_fom_to_min: Vec<FloatValue>,

    /// NH4 deficit after SOM immobilisation, taken from NO3
    pub nh4_deficit_immob: Vec<FloatValue>,
    pub urea_hydrolysis: Vec<FloatValue>,
    /// NH4 nitrified (single step) or nitritated (two-step)
    pub nitrification: Vec<FloatValue>,
    /// NO2 converted to NO3 (two-step only)
    pub nitratation: Vec<FloatValue>,
    pub n2o_nitrif: Vec<FloatValue>,
    pub codenitrification: Vec<FloatValue>,
    pub n2o_codenit: Vec<FloatValue>,
    pub no3_dnit: Vec<FloatValue>,
    pub n2o_dnit: Vec<FloatValue>,
}

impl DailyFluxes {
    pub fn zeros(n_layers: usize) -> Self {
        let layered = || vec![0.0; n_layers];
        let pooled = || Array2::zeros((FOM_POOLS, n_layers));
        Self {
            c_res_to_biom: layered(),
            c_res_to_hum: layered(),
            c_res_to_atm: layered(),
            res_nh4_min: layered(),
            res_no3_min: layered(),
            c_decomp: Array2::zeros((0, n_layers)),
            n_decomp: Array2::zeros((0, n_layers)),
            c_hum_to_biom: layered(),
            c_hum_to_atm: layered(),
            n_hum_to_min: layered(),
            c_biom_to_hum: layered(),
            c_biom_to_atm: layered(),
            n_biom_to_min: layered(),
            c_fom_to_biom: pooled(),
            c_fom_to_hum: pooled(),
            c_fom_to_atm: pooled(),
            n_fom: pooled(),
            n_fom_to_min: layered(),
            nh4_deficit_immob: layered(),
            urea_hydrolysis: layered(),
            nitrification: layered(),
            nitratation: layered(),
            n2o_nitrif: layered(),
            codenitrification: layered(),
            n2o_codenit: layered(),
            no3_dnit: layered(),
            n2o_dnit: layered(),
        }
    }

    pub fn n_layers(&self) -> usize {
        self.c_res_to_biom.len()
    }

    /// CO2 respired from soil organic matter (FOM, humus and biomass) in a layer.
    pub fn som_respiration(&self, layer: usize) -> FloatValue {
        self.c_fom_to_atm.column(layer).sum()
            + self.c_hum_to_atm[layer]
            + self.c_biom_to_atm[layer]
    }

    /// Total CO2 respired in a layer, residues included.
    pub fn co2_emission(&self, layer: usize) -> FloatValue {
        self.som_respiration(layer) + self.c_res_to_atm[layer]
    }

    /// N lost from the soil to the atmosphere in a layer.
    pub fn n_losses(&self, layer: usize) -> FloatValue {
        self.n2o_nitrif[layer] + self.no3_dnit[layer] + self.codenitrification[layer]
    }

    /// Net N mineralisation in a layer (negative for immobilisation).
    pub fn net_mineralisation(&self, layer: usize) -> FloatValue {
        self.n_hum_to_min[layer]
            + self.n_biom_to_min[layer]
            + self.n_fom_to_min[layer]
            + self.res_nh4_min[layer]
            + self.res_no3_min[layer]
    }

    fn blend(&mut self, other: &Self, wa: FloatValue, wb: FloatValue) {
        for (a, b) in [
            (&mut self.c_res_to_biom, &other.c_res_to_biom),
            (&mut self.c_res_to_hum, &other.c_res_to_hum),
            (&mut self.c_res_to_atm, &other.c_res_to_atm),
            (&mut self.res_nh4_min, &other.res_nh4_min),
            (&mut self.res_no3_min, &other.res_no3_min),
            (&mut self.c_hum_to_biom, &other.c_hum_to_biom),
            (&mut self.c_hum_to_atm, &other.c_hum_to_atm),
            (&mut self.n_hum_to_min, &other.n_hum_to_min),
            (&mut self.c_biom_to_hum, &other.c_biom_to_hum),
            (&mut self.c_biom_to_atm, &other.c_biom_to_atm),
            (&mut self.n_biom_to_min, &other.n_biom_to_min),
            (&mut self.n_fom_to_min, &other.n_fom_to_min),
            (&mut self.nh4_deficit_immob, &other.nh4_deficit_immob),
            (&mut self.urea_hydrolysis, &other.urea_hydrolysis),
            (&mut self.nitrification, &other.nitrification),
            (&mut self.nitratation, &other.nitratation),
            (&mut self.n2o_nitrif, &other.n2o_nitrif),
            (&mut self.codenitrification, &other.codenitrification),
            (&mut self.n2o_codenit, &other.n2o_codenit),
            (&mut self.no3_dnit, &other.no3_dnit),
            (&mut self.n2o_dnit, &other.n2o_dnit),
        ] {
            blend(a, b, wa, wb);
        }
        for (a, b) in [
            (&mut self.c_decomp, &other.c_decomp),
            (&mut self.n_decomp, &other.n_decomp),
            (&mut self.c_fom_to_biom, &other.c_fom_to_biom),
            (&mut self.c_fom_to_hum, &other.c_fom_to_hum),
            (&mut self.c_fom_to_atm, &other.c_fom_to_atm),
            (&mut self.n_fom, &other.n_fom),
        ] {
            blend_array(a, b, wa, wb);
        }
    }
}

/// Carbon and nitrogen pools of one patch, by layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerState {
    pub urea: Vec<FloatValue>,
    pub nh4: Vec<FloatValue>,
    pub no3: Vec<FloatValue>,
    pub nh3: Vec<FloatValue>,
    pub no2: Vec<FloatValue>,

    /// Fresh organic matter C, `(FOM_POOLS, n_layers)`
    pub fom_c: Array2<FloatValue>,
    /// Fresh organic matter N, `(FOM_POOLS, n_layers)`
    pub fom_n: Array2<FloatValue>,
    pub biom_c: Vec<FloatValue>,
    pub biom_n: Vec<FloatValue>,
    /// Humic C, inert C included
    pub hum_c: Vec<FloatValue>,
    pub hum_n: Vec<FloatValue>,
    pub inert_c: Vec<FloatValue>,
    pub inert_n: Vec<FloatValue>,

    /// Water-soluble C estimated by (co)denitrification (ppm)
    pub water_soluble_c: Vec<FloatValue>,

    /// SOM respiration of the previous day, used by denitrification
    pub previous_som_respiration: Vec<FloatValue>,

    pub fluxes: DailyFluxes,
}

impl LayerState {
    pub fn zeros(n_layers: usize) -> Self {
        let layered = || vec![0.0; n_layers];
        Self {
            urea: layered(),
            nh4: layered(),
            no3: layered(),
            nh3: layered(),
            no2: layered(),
            fom_c: Array2::zeros((FOM_POOLS, n_layers)),
            fom_n: Array2::zeros((FOM_POOLS, n_layers)),
            biom_c: layered(),
            biom_n: layered(),
            hum_c: layered(),
            hum_n: layered(),
            inert_c: layered(),
            inert_n: layered(),
            water_soluble_c: layered(),
            previous_som_respiration: layered(),
            fluxes: DailyFluxes::zeros(n_layers),
        }
    }

    pub fn n_layers(&self) -> usize {
        self.nh4.len()
    }

    /// Start a new day: remember today's SOM respiration, then zero every flux.
    pub fn clear_fluxes(&mut self) {
        let n = self.n_layers();
        self.previous_som_respiration = (0..n).map(|i| self.fluxes.som_respiration(i)).collect();
        self.fluxes = DailyFluxes::zeros(n);
    }

    pub fn fom_c_total(&self, layer: usize) -> FloatValue {
        self.fom_c.column(layer).sum()
    }

    pub fn fom_n_total(&self, layer: usize) -> FloatValue {
        self.fom_n.column(layer).sum()
    }

    /// Organic C in a layer: FOM, biomass and humus (inert included).
    pub fn organic_c(&self, layer: usize) -> FloatValue {
        self.fom_c_total(layer) + self.biom_c[layer] + self.hum_c[layer]
    }

    pub fn organic_n(&self, layer: usize) -> FloatValue {
        self.fom_n_total(layer) + self.biom_n[layer] + self.hum_n[layer]
    }

    pub fn mineral_n(&self, layer: usize) -> FloatValue {
        self.urea[layer] + self.nh4[layer] + self.no3[layer] + self.nh3[layer] + self.no2[layer]
    }

    pub fn total_c(&self, layer: usize) -> FloatValue {
        self.organic_c(layer)
    }

    pub fn total_n(&self, layer: usize) -> FloatValue {
        self.organic_n(layer) + self.mineral_n(layer)
    }

    /// Profile sum of a per-layer quantity.
    pub fn profile_sum(&self, f: impl Fn(&Self, usize) -> FloatValue) -> FloatValue {
        (0..self.n_layers()).map(|layer| f(self, layer)).sum()
    }

    pub fn sum_total_c(&self) -> FloatValue {
        self.profile_sum(Self::total_c)
    }

    pub fn sum_total_n(&self) -> FloatValue {
        self.profile_sum(Self::total_n)
    }

    /// Area-weighted average of this state (area `own_area`) and `other` (area `other_area`).
    pub fn merge_weighted(&mut self, own_area: FloatValue, other: &Self, other_area: FloatValue) {
        let (wa, wb) = (own_area, other_area);
        for (a, b) in [
            (&mut self.urea, &other.urea),
            (&mut self.nh4, &other.nh4),
            (&mut self.no3, &other.no3),
            (&mut self.nh3, &other.nh3),
            (&mut self.no2, &other.no2),
            (&mut self.biom_c, &other.biom_c),
            (&mut self.biom_n, &other.biom_n),
            (&mut self.hum_c, &other.hum_c),
            (&mut self.hum_n, &other.hum_n),
            (&mut self.inert_c, &other.inert_c),
            (&mut self.inert_n, &other.inert_n),
            (&mut self.water_soluble_c, &other.water_soluble_c),
            (&mut self.previous_som_respiration, &other.previous_som_respiration),
        ] {
            blend(a, b, wa, wb);
        }
        blend_array(&mut self.fom_c, &other.fom_c, wa, wb);
        blend_array(&mut self.fom_n, &other.fom_n, wa, wb);
        self.fluxes.blend(&other.fluxes, wa, wb);
    }

    /// Apply the negative-value policy to every pool.
    pub fn check_pools(&mut self, policy: &NegativeValuePolicy, method: &str) -> SoilNResult<()> {
        for pool in 0..FOM_POOLS {
            let mut c = self.fom_c.row_mut(pool);
            for (layer, value) in c.iter_mut().enumerate() {
                policy.check(value, layer, &format!("fom_c[{}]", pool + 1), method)?;
            }
            let mut n = self.fom_n.row_mut(pool);
            for (layer, value) in n.iter_mut().enumerate() {
                policy.check(value, layer, &format!("fom_n[{}]", pool + 1), method)?;
            }
        }
        for (name, values) in [
            ("biom_c", &mut self.biom_c),
            ("hum_c", &mut self.hum_c),
            ("biom_n", &mut self.biom_n),
            ("hum_n", &mut self.hum_n),
            ("urea", &mut self.urea),
            ("nh4", &mut self.nh4),
            ("no3", &mut self.no3),
            ("nh3", &mut self.nh3),
            ("no2", &mut self.no2),
        ] {
            policy.check_layers(values, name, method)?;
        }
        Ok(())
    }
}
