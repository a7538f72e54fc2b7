//! Urea hydrolysis parameters
//!
//! The potential hydrolysis rate is an empirical function of soil organic
//! carbon and pH:
//!
//! $$k = \text{clamp}(A + B \cdot OC + C \cdot pH + D \cdot OC \cdot pH, k_{min}, 1)$$

use crate::response::{ResponseTable, TemperatureResponse};
use crate::FloatValue;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HydrolysisParameters {
    /// Lower limit of the potential hydrolysis rate
    /// unit: /day
    /// default: 0.25
    pub min_rate: FloatValue,

    /// Intercept of the rate equation
    /// default: -1.12
    pub coefficient_a: FloatValue,

    /// Organic carbon coefficient
    /// unit: /%
    /// default: 1.31
    pub coefficient_b: FloatValue,

    /// pH coefficient
    /// default: 0.203
    pub coefficient_c: FloatValue,

    /// Organic carbon by pH interaction coefficient
    /// default: -0.155
    pub coefficient_d: FloatValue,

    /// Temperature response of hydrolysis
    /// default: Topt 32, F0 0.2, n 1
    pub temperature_response: TemperatureResponse,

    /// Moisture response of hydrolysis (normalised water content)
    /// default: x [0, 1, 1.4, 2.4, 3], y [0.2, 0.2, 1, 1, 0.7]
    pub moisture_response: ResponseTable,
}

impl Default for HydrolysisParameters {
    fn default() -> Self {
        Self {
            min_rate: 0.25,
            coefficient_a: -1.12,
            coefficient_b: 1.31,
            coefficient_c: 0.203,
            coefficient_d: -0.155,
            temperature_response: TemperatureResponse::new(32.0, 0.2, 1.0),
            moisture_response: ResponseTable::new(
                vec![0.0, 1.0, 1.4, 2.4, 3.0],
                vec![0.2, 0.2, 1.0, 1.0, 0.7],
            ),
        }
    }
}

impl HydrolysisParameters {
    /// Potential hydrolysis rate for a given organic carbon (%) and pH.
    pub fn potential_rate(&self, organic_carbon: FloatValue, ph: FloatValue) -> FloatValue {
        let rate = self.coefficient_a
            + self.coefficient_b * organic_carbon
            + self.coefficient_c * ph
            + self.coefficient_d * organic_carbon * ph;
        num::clamp(rate, self.min_rate, 1.0)
    }
}
