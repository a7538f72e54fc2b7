//! Urea hydrolysis
//!
//! The potential fraction of urea hydrolysed each day depends on the organic
//! carbon content $C$ (%) and the pH of the layer:
//! $$k = \mathrm{clamp}(a + bC + c\,pH + d\,C\,pH, k_{min}, 1)$$
//! The actual amount is limited by the more limiting of the temperature and
//! moisture factors. Amounts below the numerical threshold are hydrolysed at
//! once.

use crate::LayerEnvironment;
use serde::{Deserialize, Serialize};
use soiln_core::errors::SoilNResult;
use soiln_core::layers::LayerState;
use soiln_core::parameters::HydrolysisParameters;
use soiln_core::response::Condition;
use soiln_core::soil::{SoilConditions, SoilProfile};
use soiln_core::{FloatValue, EPSILON};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UreaHydrolysis {
    parameters: HydrolysisParameters,
}

impl UreaHydrolysis {
    pub fn new() -> Self {
        Self::from_parameters(HydrolysisParameters::default())
    }

    pub fn from_parameters(parameters: HydrolysisParameters) -> Self {
        Self { parameters }
    }

    /// Urea hydrolysed in one layer (kg/ha).
    ///
    /// `organic_c` is the humus plus biomass C of the layer (kg/ha).
    pub fn hydrolysed(
        &self,
        env: &LayerEnvironment,
        condition: Condition,
        urea: FloatValue,
        organic_c: FloatValue,
    ) -> FloatValue {
        if urea < EPSILON {
            return urea;
        }
        // ppm to %
        let carbon_pct = env.to_ppm(organic_c) / 10000.0;
        let rate = self.parameters.potential_rate(carbon_pct, env.ph);
        if rate < EPSILON {
            return 0.0;
        }
        let stf = env.temperature_factor(&self.parameters.temperature_response, condition);
        let swf = env.moisture_factor(&self.parameters.moisture_response, condition);
        num::clamp(rate * urea * swf.min(stf), 0.0, urea)
    }

    pub fn solve(
        &self,
        profile: &SoilProfile,
        conditions: &SoilConditions,
        state: &mut LayerState,
    ) -> SoilNResult<()> {
        if state.urea.iter().sum::<FloatValue>() < EPSILON {
            state.fluxes.urea_hydrolysis.iter_mut().for_each(|v| *v = 0.0);
            return Ok(());
        }
        let condition = conditions.condition();
        for layer in 0..state.n_layers() {
            let env = LayerEnvironment::new(profile, conditions, layer);
            let organic_c = state.hum_c[layer] + state.biom_c[layer];
            let amount = self.hydrolysed(&env, condition, state.urea[layer], organic_c);
            state.fluxes.urea_hydrolysis[layer] = amount;
            state.urea[layer] -= amount;
            state.nh4[layer] += amount;
        }
        Ok(())
    }
}

impl Default for UreaHydrolysis {
    fn default() -> Self {
        Self::new()
    }
}
