//! Start-of-day snapshots and the daily carbon and nitrogen balance.
//!
//! With no external exchange the balance of a patch is zero to numerical
//! precision:
//!
//! $$B_N = -\left(\sum_i (N_2O_{nitrif} + NO_{3,dnit} + codenit) + \Delta N_{tot}\right)$$
//! $$B_C = -\left(\sum_i (C_{res \to atm} + C_{fom \to atm} + C_{hum \to atm} + C_{biom \to atm}) + \Delta C_{tot}\right)$$
//!
//! Inputs from outside the soil (residues, pond, fertiliser, transport) show
//! up as a non-zero balance on the day they occur.

use crate::layers::LayerState;
use crate::FloatValue;
use serde::{Deserialize, Serialize};

/// Totals captured at the start of the day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Profile total N (kg/ha)
    pub total_n: FloatValue,
    /// Profile total C (kg/ha)
    pub total_c: FloatValue,
    /// NH4 per layer (kg/ha)
    pub nh4: Vec<FloatValue>,
    /// NO3 per layer (kg/ha)
    pub no3: Vec<FloatValue>,
}

impl StatusSnapshot {
    pub fn capture(state: &LayerState) -> Self {
        Self {
            total_n: state.sum_total_n(),
            total_c: state.sum_total_c(),
            nh4: state.nh4.clone(),
            no3: state.no3.clone(),
        }
    }

    /// Area-weighted average of two snapshots, used when patches merge.
    pub fn blend(&mut self, own_area: FloatValue, other: &Self, other_area: FloatValue) {
        let total = own_area + other_area;
        let mix = |a: FloatValue, b: FloatValue| (a * own_area + b * other_area) / total;
        self.total_n = mix(self.total_n, other.total_n);
        self.total_c = mix(self.total_c, other.total_c);
        for (a, b) in self.nh4.iter_mut().zip(&other.nh4) {
            *a = mix(*a, *b);
        }
        for (a, b) in self.no3.iter_mut().zip(&other.no3) {
            *a = mix(*a, *b);
        }
    }
}

/// N lost to the atmosphere today, summed over the profile.
pub fn nitrogen_losses(state: &LayerState) -> FloatValue {
    (0..state.n_layers()).map(|i| state.fluxes.n_losses(i)).sum()
}

/// C respired today, summed over the profile.
pub fn carbon_losses(state: &LayerState) -> FloatValue {
    (0..state.n_layers()).map(|i| state.fluxes.co2_emission(i)).sum()
}

/// Daily mass balance of one patch (kg/ha).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MassBalance {
    pub nitrogen: FloatValue,
    pub carbon: FloatValue,
}

impl MassBalance {
    pub fn compute(state: &LayerState, status: &StatusSnapshot) -> Self {
        let delta_n = state.sum_total_n() - status.total_n;
        let delta_c = state.sum_total_c() - status.total_c;
        Self {
            nitrogen: -(nitrogen_losses(state) + delta_n),
            carbon: -(carbon_losses(state) + delta_c),
        }
    }
}
