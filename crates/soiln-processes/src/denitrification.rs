//! Denitrification
//!
//! NO3 is lost to N2 and N2O at a rate driven by water-soluble carbon, which
//! is estimated from the humus and FOM carbon (ppm):
//! $$wsc = a + b\,C, \quad r = \min(k \, wsc \, NO_3 \, f_W f_T, NO_3)$$
//!
//! The N2:N2O ratio of the products follows Thorburn et al. (2010):
//! $$R = \max\left(0, k_1 \max\left(p_A, e^{p_B NO_3 / CO_2}\right) f_{WFPS}\right)$$
//! where $CO_2$ is the SOM respiration of the layer on the previous day.
//!
//! Aerobic parameters are used whether or not a pond is active.

use crate::LayerEnvironment;
use serde::{Deserialize, Serialize};
use soiln_core::errors::SoilNResult;
use soiln_core::layers::LayerState;
use soiln_core::parameters::DenitrificationParameters;
use soiln_core::response::Condition;
use soiln_core::soil::{SoilConditions, SoilProfile};
use soiln_core::{FloatValue, EPSILON};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Denitrification {
    parameters: DenitrificationParameters,
}

impl Denitrification {
    pub fn new() -> Self {
        Self::from_parameters(DenitrificationParameters::default())
    }

    pub fn from_parameters(parameters: DenitrificationParameters) -> Self {
        Self { parameters }
    }

    /// NO3 denitrified in one layer (kg/ha) and the water-soluble C used (ppm).
    pub fn denitrified(
        &self,
        env: &LayerEnvironment,
        no3: FloatValue,
        active_c: FloatValue,
    ) -> (FloatValue, FloatValue) {
        let p = &self.parameters;
        let wsc = p.water_soluble_carbon(env.to_ppm(active_c));
        let potential = p.rate_coefficient * wsc;
        if potential < EPSILON {
            return (0.0, wsc);
        }
        let stf = env.temperature_factor(&p.temperature_response, Condition::Aerobic);
        let swf = env.moisture_factor(&p.moisture_response, Condition::Aerobic);
        ((potential * no3 * swf * stf).min(no3), wsc)
    }

    /// N2:N2O ratio of the denitrification products.
    pub fn n2n2o_ratio(&self, env: &LayerEnvironment, no3: FloatValue, co2: FloatValue) -> FloatValue {
        let wfps = self.parameters.wfps_response.value(env.wfps);
        self.parameters.n2n2o_ratio(no3, co2, wfps)
    }

    pub fn solve(
        &self,
        profile: &SoilProfile,
        conditions: &SoilConditions,
        state: &mut LayerState,
    ) -> SoilNResult<()> {
        if state.no3.iter().sum::<FloatValue>() < EPSILON {
            state.fluxes.no3_dnit.iter_mut().for_each(|v| *v = 0.0);
            state.fluxes.n2o_dnit.iter_mut().for_each(|v| *v = 0.0);
            return Ok(());
        }
        for layer in 0..state.n_layers() {
            let env = LayerEnvironment::new(profile, conditions, layer);
            let active_c = state.hum_c[layer] + state.fom_c_total(layer);
            let (denitrified, wsc) = self.denitrified(&env, state.no3[layer], active_c);
            let ratio = self.n2n2o_ratio(&env, state.no3[layer], state.previous_som_respiration[layer]);
            state.water_soluble_c[layer] = wsc;
            state.fluxes.no3_dnit[layer] = denitrified;
            state.fluxes.n2o_dnit[layer] = denitrified / (ratio + 1.0);
            state.no3[layer] -= denitrified;
        }
        Ok(())
    }
}

impl Default for Denitrification {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    fn wet() -> (SoilProfile, SoilConditions) {
        (
            SoilProfile::uniform(2, 100.0, 1.2),
            SoilConditions::uniform(2, 25.0, 0.45),
        )
    }

    #[test]
    fn test_dry_soil_does_not_denitrify() {
        let profile = SoilProfile::uniform(1, 100.0, 1.2);
        let conditions = SoilConditions::uniform(1, 25.0, 0.1);
        let env = LayerEnvironment::new(&profile, &conditions, 0);
        let (denitrified, _) = Denitrification::new().denitrified(&env, 30.0, 10000.0);
        assert_eq!(denitrified, 0.0);
    }

    #[test]
    fn test_saturated_soil_denitrifies() {
        let (profile, conditions) = wet();
        let mut state = LayerState::zeros(2);
        state.no3 = vec![30.0, 10.0];
        state.hum_c = vec![20000.0, 10000.0];
        state.previous_som_respiration = vec![5.0, 0.0];

        Denitrification::new().solve(&profile, &conditions, &mut state).unwrap();

        let f = &state.fluxes;
        assert!(f.no3_dnit[0] > 0.0);
        assert!(f.n2o_dnit[0] > 0.0 && f.n2o_dnit[0] < f.no3_dnit[0]);
        assert!(is_close!(state.no3[0] + f.no3_dnit[0], 30.0));
        assert!(state.water_soluble_c[0] > 24.5);
    }

    #[test]
    fn test_ratio_without_co2_uses_parameter_floor() {
        let (profile, conditions) = wet();
        let env = LayerEnvironment::new(&profile, &conditions, 0);
        let component = Denitrification::new();
        let p = DenitrificationParameters::default();
        let expected = p.n2n2o_k1 * p.n2n2o_parm_a * p.wfps_response.value(env.wfps);
        assert!(is_close!(component.n2n2o_ratio(&env, 10.0, 0.0), expected));
    }

    #[test]
    fn test_no_nitrate_clears_fluxes() {
        let (profile, conditions) = wet();
        let mut state = LayerState::zeros(2);
        state.fluxes.no3_dnit[0] = 1.0;
        Denitrification::new().solve(&profile, &conditions, &mut state).unwrap();
        assert_eq!(state.fluxes.no3_dnit[0], 0.0);
    }
}
