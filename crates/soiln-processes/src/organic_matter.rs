//! Soil organic matter turnover
//!
//! Three groups of pools are decomposed in each layer, each only when the
//! group holds any carbon in the profile:
//!
//! **Humus** (the inert fraction does not decompose):
//! $$C = (C_{hum} - C_{inert}) k_{hum} f_T f_W, \quad C_{\to biom} = C(1 - r), \quad C_{\to atm} = C r$$
//! $$N_{min} = C / CN_{hum} - C_{\to biom} / CN_{biom}$$
//!
//! **Microbial biomass**:
//! $$C = C_{biom} k_{biom} f_T f_W, \quad C_{\to hum} = C(1 - r)(1 - f_b), \quad C_{\to atm} = C r$$
//! $$N_{min} = C / CN_{biom} - C_{\to hum} / CN_{hum} - (C - C_{\to atm} - C_{\to hum}) / CN_{biom}$$
//!
//! **Fresh organic matter**, per pool $p$, with a C:N ratio factor $f_{CN}$:
//! $$C_p = C_{fom,p} k_p f_{CN} f_T f_W$$
//! The gross C released is split into biomass, humus and respiration. When the
//! N demand of the new biomass and humus exceeds the mineral plus released N,
//! all transfers are reduced by $RF = \mathrm{clamp}(N_{min}/(N_d - N_{gross}), 0, 1)$.
//!
//! All deltas are computed first and applied together. Biomass and humus N
//! follow their C:N ratios, net mineralisation goes to NH4, and an NH4 deficit
//! is taken from NO3.

use crate::LayerEnvironment;
use serde::{Deserialize, Serialize};
use soiln_core::errors::{SoilNError, SoilNResult};
use soiln_core::layers::LayerState;
use soiln_core::parameters::{FomParameters, SoilOrganicMatterParameters};
use soiln_core::response::{cn_ratio_factor, Condition};
use soiln_core::soil::{SoilConditions, SoilProfile};
use soiln_core::utils::interpolation::divide;
use soiln_core::{FloatValue, EPSILON, FOM_POOLS};

/// Carbon and nitrogen leaving one pool in one layer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PoolTransfer {
    /// C moved to the receiving SOM pool (biomass for humus, humus for biomass)
    pub c_to_pool: FloatValue,
    pub c_to_atm: FloatValue,
    /// Net N mineralised, negative for immobilisation
    pub n_to_min: FloatValue,
}

/// Transfers out of the three FOM pools in one layer.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FomTransfer {
    pub c_to_biom: [FloatValue; FOM_POOLS],
    pub c_to_hum: [FloatValue; FOM_POOLS],
    pub c_to_atm: [FloatValue; FOM_POOLS],
    pub n_decomposed: [FloatValue; FOM_POOLS],
    pub n_to_min: FloatValue,
}

/// Humus, biomass and FOM turnover component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganicMatterTurnover {
    fom: FomParameters,
    som: SoilOrganicMatterParameters,
}

impl OrganicMatterTurnover {
    pub fn from_parameters(fom: FomParameters, som: SoilOrganicMatterParameters) -> Self {
        Self { fom, som }
    }

    /// Mineralisation of the active humus in one layer.
    pub fn humus(
        &self,
        condition: Condition,
        hum_c: FloatValue,
        inert_c: FloatValue,
        humus_cn_ratio: FloatValue,
        stf: FloatValue,
        swf: FloatValue,
    ) -> PoolTransfer {
        let potential = (hum_c - inert_c) * self.som.humus_turnover_rate.get(condition);
        if potential < EPSILON {
            return PoolTransfer::default();
        }
        let c = potential * stf * swf;
        let resp = self.som.humus_respiration_factor;
        let c_to_pool = c * (1.0 - resp);
        PoolTransfer {
            c_to_pool,
            c_to_atm: c * resp,
            n_to_min: divide(c, humus_cn_ratio, 0.0)
                - divide(c_to_pool, self.som.biomass_cn_ratio, 0.0),
        }
    }

    /// Turnover of the microbial biomass in one layer.
    pub fn biomass(
        &self,
        condition: Condition,
        biom_c: FloatValue,
        humus_cn_ratio: FloatValue,
        stf: FloatValue,
        swf: FloatValue,
    ) -> PoolTransfer {
        let potential = biom_c * self.som.biomass_turnover_rate.get(condition);
        if potential < EPSILON {
            return PoolTransfer::default();
        }
        let c = potential * stf * swf;
        let resp = self.som.biomass_respiration_factor;
        let bcn = self.som.biomass_cn_ratio;
        let c_to_pool = c * (1.0 - resp) * (1.0 - self.som.biomass_fraction_into_biomass);
        let c_to_atm = c * resp;
        PoolTransfer {
            c_to_pool,
            c_to_atm,
            n_to_min: divide(c, bcn, 0.0)
                - divide(c_to_pool, humus_cn_ratio, 0.0)
                - divide(c - c_to_atm - c_to_pool, bcn, 0.0),
        }
    }

    /// Decomposition of the FOM pools of one layer.
    #[allow(clippy::too_many_arguments)]
    pub fn fresh_organic_matter(
        &self,
        condition: Condition,
        fom_c: [FloatValue; FOM_POOLS],
        fom_n: [FloatValue; FOM_POOLS],
        mineral_n: FloatValue,
        humus_cn_ratio: FloatValue,
        stf: FloatValue,
        swf: FloatValue,
    ) -> FomTransfer {
        let total_c: FloatValue = fom_c.iter().sum();
        if total_c < EPSILON {
            return FomTransfer::default();
        }
        let total_n: FloatValue = fom_n.iter().sum();
        let mineral_n = mineral_n.max(0.0);
        let cnrf = cn_ratio_factor(
            total_c,
            total_n,
            mineral_n,
            self.fom.cn_threshold,
            self.fom.cn_coefficient,
        );

        let mut gross_c = [0.0; FOM_POOLS];
        let mut gross_n = [0.0; FOM_POOLS];
        for pool in 0..FOM_POOLS {
            let rate = self.fom.turnover_rate[pool].get(condition) * cnrf * stf * swf;
            gross_c[pool] = rate * fom_c[pool];
            gross_n[pool] = rate * fom_n[pool];
        }
        let sum_c: FloatValue = gross_c.iter().sum();
        let sum_n: FloatValue = gross_n.iter().sum();

        let resp = self.fom.respiration_factor;
        let into_biom = self.fom.fraction_into_biomass;
        let demand = divide(sum_c * (1.0 - resp) * into_biom, self.som.biomass_cn_ratio, 0.0)
            + divide(sum_c * (1.0 - resp) * (1.0 - into_biom), humus_cn_ratio, 0.0);

        let mut reduction = 1.0;
        if demand > mineral_n + sum_n {
            reduction = num::clamp(divide(mineral_n, demand - sum_n, 0.0), 0.0, 1.0);
        }

        let mut transfer = FomTransfer::default();
        for pool in 0..FOM_POOLS {
            let c = gross_c[pool] * reduction;
            transfer.c_to_biom[pool] = c * (1.0 - resp) * into_biom;
            transfer.c_to_hum[pool] = c * (1.0 - resp) * (1.0 - into_biom);
            transfer.c_to_atm[pool] = c * resp;
            transfer.n_decomposed[pool] = gross_n[pool] * reduction;
        }
        transfer.n_to_min = (sum_n - demand) * reduction;
        transfer
    }

    /// Compute and apply a day of SOM turnover to one patch.
    pub fn solve(
        &self,
        profile: &SoilProfile,
        conditions: &SoilConditions,
        state: &mut LayerState,
    ) -> SoilNResult<()> {
        let n_layers = state.n_layers();
        let condition = conditions.condition();
        let do_humus = state.hum_c.iter().sum::<FloatValue>() >= EPSILON;
        let do_biomass = state.biom_c.iter().sum::<FloatValue>() >= EPSILON;
        let do_fom = state.fom_c.sum() >= EPSILON;

        for layer in 0..n_layers {
            let env = LayerEnvironment::new(profile, conditions, layer);
            let stf = env.temperature_factor(&self.som.temperature_response, condition);
            let swf = env.moisture_factor(&self.som.moisture_response, condition);

            let humus = if do_humus {
                self.humus(
                    condition,
                    state.hum_c[layer],
                    state.inert_c[layer],
                    env.humus_cn_ratio,
                    stf,
                    swf,
                )
            } else {
                PoolTransfer::default()
            };
            let biomass = if do_biomass {
                self.biomass(condition, state.biom_c[layer], env.humus_cn_ratio, stf, swf)
            } else {
                PoolTransfer::default()
            };
            let fom = if do_fom {
                let fom_stf = env.temperature_factor(&self.fom.temperature_response, condition);
                let fom_swf = env.moisture_factor(&self.fom.moisture_response, condition);
                let column = |a: &ndarray::Array2<FloatValue>| {
                    [a[[0, layer]], a[[1, layer]], a[[2, layer]]]
                };
                self.fresh_organic_matter(
                    condition,
                    column(&state.fom_c),
                    column(&state.fom_n),
                    state.no3[layer] + state.nh4[layer],
                    env.humus_cn_ratio,
                    fom_stf,
                    fom_swf,
                )
            } else {
                FomTransfer::default()
            };

            let fluxes = &mut state.fluxes;
            fluxes.c_hum_to_biom[layer] = humus.c_to_pool;
            fluxes.c_hum_to_atm[layer] = humus.c_to_atm;
            fluxes.n_hum_to_min[layer] = humus.n_to_min;
            fluxes.c_biom_to_hum[layer] = biomass.c_to_pool;
            fluxes.c_biom_to_atm[layer] = biomass.c_to_atm;
            fluxes.n_biom_to_min[layer] = biomass.n_to_min;
            for pool in 0..FOM_POOLS {
                fluxes.c_fom_to_biom[[pool, layer]] = fom.c_to_biom[pool];
                fluxes.c_fom_to_hum[[pool, layer]] = fom.c_to_hum[pool];
                fluxes.c_fom_to_atm[[pool, layer]] = fom.c_to_atm[pool];
                fluxes.n_fom[[pool, layer]] = fom.n_decomposed[pool];
            }
            fluxes.n_fom_to_min[layer] = fom.n_to_min;
        }

        if do_humus || do_biomass || do_fom {
            self.apply(profile, state)?;
        }
        Ok(())
    }

    fn apply(&self, profile: &SoilProfile, state: &mut LayerState) -> SoilNResult<()> {
        for layer in 0..state.n_layers() {
            let f = &state.fluxes;
            let fom_to_biom = f.c_fom_to_biom.column(layer).sum();
            let fom_to_hum = f.c_fom_to_hum.column(layer).sum();
            let d_biom = f.c_hum_to_biom[layer] - f.c_biom_to_hum[layer] - f.c_biom_to_atm[layer]
                + fom_to_biom;
            let d_hum = f.c_biom_to_hum[layer] - f.c_hum_to_biom[layer] - f.c_hum_to_atm[layer]
                + fom_to_hum;
            let mineralised = f.n_hum_to_min[layer] + f.n_biom_to_min[layer] + f.n_fom_to_min[layer];
            let mut fom_c_loss = [0.0; FOM_POOLS];
            let mut fom_n_loss = [0.0; FOM_POOLS];
            for pool in 0..FOM_POOLS {
                fom_c_loss[pool] = f.c_fom_to_biom[[pool, layer]]
                    + f.c_fom_to_hum[[pool, layer]]
                    + f.c_fom_to_atm[[pool, layer]];
                fom_n_loss[pool] = f.n_fom[[pool, layer]];
            }

            state.biom_c[layer] += d_biom;
            state.hum_c[layer] += d_hum;
            state.biom_n[layer] = divide(state.biom_c[layer], self.som.biomass_cn_ratio, 0.0);
            state.hum_n[layer] = divide(state.hum_c[layer], profile.humus_cn_ratio[layer], 0.0);
            for pool in 0..FOM_POOLS {
                state.fom_c[[pool, layer]] -= fom_c_loss[pool];
                state.fom_n[[pool, layer]] -= fom_n_loss[pool];
            }

            state.nh4[layer] += mineralised;
            let deficit = if state.nh4[layer] < -EPSILON {
                let deficit = -state.nh4[layer];
                state.nh4[layer] = 0.0;
                deficit
            } else {
                0.0
            };
            state.fluxes.nh4_deficit_immob[layer] = deficit;
            state.no3[layer] -= deficit;
            if state.no3[layer] < -EPSILON {
                return Err(SoilNError::ImmobilisationShortfall {
                    process: "soil organic matter turnover".to_string(),
                    layer,
                    remaining: state.no3[layer],
                });
            }
        }
        Ok(())
    }
}
