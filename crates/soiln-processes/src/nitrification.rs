//! Nitrification
//!
//! Two alternatives are available, selected by
//! [`NitrificationParameters::use_two_step`]:
//!
//! **Single step** (NH4 → NO3), Michaelis-Menten kinetics on the NH4
//! concentration (ppm):
//! $$r = \min\left(\frac{V_{max} \, NH_4}{NH_4 + K_m} \min(f_W, f_T, f_{pH}) \max(0, 1 - I), NH_4\right)$$
//! A fixed fraction of the nitrified N is lost as N2O.
//!
//! **Two step** (NH4 → NO2 → NO3):
//!
//! 1. Nitritation, as above with its own kinetics and pH response. N2O lost
//!    during ammonia oxidation is $\min(r, p_1(e^{p_2 r} - 1))$ (ppm).
//! 2. Codenitrification of NO2 with NH3, driven by water-soluble carbon
//!    $wsc = a \, C^b$ from the active organic carbon, with the N2 fraction
//!    of the products looked up from the NH3 + NO2 concentration.
//! 3. Nitratation of the remaining NO2.
//!
//! The two-step path always uses the aerobic parameters.

use crate::LayerEnvironment;
use serde::{Deserialize, Serialize};
use soiln_core::errors::SoilNResult;
use soiln_core::layers::LayerState;
use soiln_core::parameters::{
    CodenitrificationParameters, DenitrificationParameters, NitrificationParameters,
};
use soiln_core::response::Condition;
use soiln_core::soil::{SoilConditions, SoilProfile};
use soiln_core::{FloatValue, EPSILON};

/// Result of the two-step path for one layer (kg/ha).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TwoStepFluxes {
    pub nitritation: FloatValue,
    pub n2o_nitritation: FloatValue,
    pub codenitrification: FloatValue,
    pub n2o_codenitrification: FloatValue,
    pub nitratation: FloatValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Nitrification {
    parameters: NitrificationParameters,
    codenitrification: CodenitrificationParameters,
    /// Source of the water-soluble carbon coefficients
    denitrification: DenitrificationParameters,
}

impl Nitrification {
    pub fn new() -> Self {
        Self::from_parameters(
            NitrificationParameters::default(),
            CodenitrificationParameters::default(),
            DenitrificationParameters::default(),
        )
    }

    pub fn from_parameters(
        parameters: NitrificationParameters,
        codenitrification: CodenitrificationParameters,
        denitrification: DenitrificationParameters,
    ) -> Self {
        Self {
            parameters,
            codenitrification,
            denitrification,
        }
    }

    /// NH4 nitrified in one layer by the single-step path (kg/ha).
    pub fn single_step(&self, env: &LayerEnvironment, condition: Condition, nh4: FloatValue) -> FloatValue {
        let p = &self.parameters;
        let ppm = env.to_ppm(nh4);
        let potential = p.kinetics.rate(ppm);
        if potential < EPSILON {
            return 0.0;
        }
        let stf = env.temperature_factor(&p.temperature_response, condition);
        let swf = env.moisture_factor(&p.moisture_response, condition);
        let phf = env.ph_factor(&p.ph_response);
        let rate = potential * swf.min(stf).min(phf) * (1.0 - env.inhibition).max(0.0);
        env.to_kgha(rate.min(ppm))
    }

    /// NH4 oxidised to NO2 in one layer (kg/ha).
    pub fn nitritation(&self, env: &LayerEnvironment, nh4: FloatValue) -> FloatValue {
        let p = &self.parameters;
        let ppm = env.to_ppm(nh4);
        let potential = p.nitritation_kinetics.rate(ppm);
        if potential < EPSILON {
            return 0.0;
        }
        let stf = env.temperature_factor(&p.temperature_response, Condition::Aerobic);
        let swf = env.moisture_factor(&p.moisture_response, Condition::Aerobic);
        let phf = env.ph_factor(&p.nitritation_ph_response);
        let rate = potential * swf.min(stf).min(phf) * (1.0 - env.inhibition).max(0.0);
        env.to_kgha(rate.min(ppm))
    }

    /// NO2 oxidised to NO3 in one layer (kg/ha).
    pub fn nitratation(&self, env: &LayerEnvironment, no2: FloatValue) -> FloatValue {
        let p = &self.parameters;
        let ppm = env.to_ppm(no2);
        let potential = p.nitratation_kinetics.rate(ppm);
        if potential < EPSILON {
            return 0.0;
        }
        let stf = env.temperature_factor(&p.temperature_response, Condition::Aerobic);
        let swf = env.moisture_factor(&p.moisture_response, Condition::Aerobic);
        let phf = env.ph_factor(&p.nitratation_ph_response);
        env.to_kgha((potential * swf.min(stf).min(phf)).min(ppm))
    }

    /// Codenitrification in one layer (kg/ha) and the water-soluble C it used (ppm).
    pub fn codenitrification(
        &self,
        env: &LayerEnvironment,
        active_c: FloatValue,
        soluble_organic_n: FloatValue,
        nh3: FloatValue,
        no2: FloatValue,
    ) -> (FloatValue, FloatValue) {
        let p = &self.codenitrification;
        let wsc = self
            .denitrification
            .water_soluble_carbon_exp(env.to_ppm(active_c));
        let organic_n = soluble_organic_n.min(nh3);
        let potential = p.rate_coefficient * wsc;
        let potential_n = 2.0 * no2.min(organic_n);
        if potential < EPSILON || potential_n < EPSILON {
            return (0.0, wsc);
        }
        let stf = env.temperature_factor(&p.temperature_response, Condition::Aerobic);
        let swf = env.moisture_factor(&p.moisture_response, Condition::Aerobic);
        let phf = env.ph_factor(&p.ph_response);
        (potential * potential_n * swf.min(stf).min(phf), wsc)
    }

    /// Fraction of codenitrification products released as N2.
    pub fn n2_fraction(&self, env: &LayerEnvironment, nh3: FloatValue, no2: FloatValue) -> FloatValue {
        self.codenitrification
            .n2_fraction_response
            .value(env.to_ppm(nh3 + no2))
    }

    pub fn solve(
        &self,
        profile: &SoilProfile,
        conditions: &SoilConditions,
        state: &mut LayerState,
    ) -> SoilNResult<()> {
        let n_layers = state.n_layers();
        if state.nh4.iter().sum::<FloatValue>() < EPSILON {
            for layer in 0..n_layers {
                state.fluxes.nitrification[layer] = 0.0;
                state.fluxes.nitratation[layer] = 0.0;
                state.fluxes.n2o_nitrif[layer] = 0.0;
                state.fluxes.codenitrification[layer] = 0.0;
                state.fluxes.n2o_codenit[layer] = 0.0;
            }
            return Ok(());
        }

        let condition = conditions.condition();
        for layer in 0..n_layers {
            let env = LayerEnvironment::new(profile, conditions, layer);
            if self.parameters.use_two_step {
                let fluxes = self.two_step_layer(&env, state, layer);
                let f = &mut state.fluxes;
                f.nitrification[layer] = fluxes.nitritation;
                f.n2o_nitrif[layer] = fluxes.n2o_nitritation;
                f.codenitrification[layer] = fluxes.codenitrification;
                f.n2o_codenit[layer] = fluxes.n2o_codenitrification;
                f.nitratation[layer] = fluxes.nitratation;
            } else {
                let nitrified = self.single_step(&env, condition, state.nh4[layer]);
                let n2o = nitrified * self.parameters.n2o_loss_fraction;
                state.nh4[layer] -= nitrified;
                state.no3[layer] += nitrified - n2o;
                let f = &mut state.fluxes;
                f.nitrification[layer] = nitrified;
                f.n2o_nitrif[layer] = n2o;
                f.codenitrification[layer] = 0.0;
                f.n2o_codenit[layer] = 0.0;
                f.nitratation[layer] = 0.0;
            }
        }
        Ok(())
    }

    /// Run nitritation, codenitrification and nitratation on one layer, updating the pools.
    fn two_step_layer(
        &self,
        env: &LayerEnvironment,
        state: &mut LayerState,
        layer: usize,
    ) -> TwoStepFluxes {
        let mut out = TwoStepFluxes {
            nitritation: self.nitritation(env, state.nh4[layer]),
            ..Default::default()
        };
        let n2o_ppm = self.parameters.ammox_n2o(env.to_ppm(out.nitritation));
        out.n2o_nitritation = env.to_kgha(n2o_ppm);
        state.no2[layer] += out.nitritation - out.n2o_nitritation;

        let active_c = state.hum_c[layer] - state.inert_c[layer]
            + state.biom_c[layer]
            + state.fom_c[[0, layer]];
        let soluble_organic_n = state.biom_n[layer] + state.fom_n[[0, layer]];
        let (codenit, wsc) = self.codenitrification(
            env,
            active_c,
            soluble_organic_n,
            state.nh3[layer],
            state.no2[layer],
        );
        state.water_soluble_c[layer] = wsc;
        let n2 = self.n2_fraction(env, state.nh3[layer], state.no2[layer]);
        out.codenitrification = codenit;
        out.n2o_codenitrification = codenit * (1.0 - n2);
        state.nh3[layer] -= 0.5 * codenit;
        state.no2[layer] -= 0.5 * codenit;

        out.nitratation = self.nitratation(env, state.no2[layer]);
        state.nh4[layer] -= out.nitritation;
        state.no2[layer] -= out.nitratation;
        state.no3[layer] += out.nitratation;
        out
    }
}

impl Default for Nitrification {
    fn default() -> Self {
        Self::new()
    }
}
