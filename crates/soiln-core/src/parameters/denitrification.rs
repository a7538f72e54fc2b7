//! Denitrification parameters
//!
//! Denitrification rate is driven by water-soluble carbon, estimated from the
//! active organic carbon:
//!
//! $$C_{ws} = a + b \cdot C_{active}$$
//!
//! The N2:N2O ratio of the gaseous products follows Del Grosso et al. (2000):
//!
//! $$R = \max\left(0, k_1 \cdot \max\left(p_A, e^{p_B \cdot NO_3 / CO_2}\right) \cdot f_{WFPS}\right)$$

use crate::response::{ResponseTable, TemperatureResponse};
use crate::FloatValue;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DenitrificationParameters {
    /// Denitrification rate coefficient
    /// unit: kg/mg
    /// default: 0.0006
    pub rate_coefficient: FloatValue,

    /// Intercept of the water-soluble carbon estimate
    /// unit: ppm
    /// default: 24.5
    pub active_carbon_intercept: FloatValue,

    /// Slope of the water-soluble carbon estimate
    /// default: 0.0031
    pub active_carbon_slope: FloatValue,

    /// Coefficient of the power-law water-soluble carbon estimate used by codenitrification
    /// default: 0.011
    pub active_carbon_exp_coefficient: FloatValue,

    /// Exponent of the power-law water-soluble carbon estimate used by codenitrification
    /// default: 0.895
    pub active_carbon_exp_exponent: FloatValue,

    /// Scale of the N2:N2O ratio
    /// default: 25.1
    pub n2n2o_k1: FloatValue,

    /// Lower limit of the CO2 effect on the N2:N2O ratio
    /// default: 0.16
    pub n2n2o_parm_a: FloatValue,

    /// Exponent coefficient of the NO3:CO2 effect on the N2:N2O ratio
    /// default: -0.8
    pub n2n2o_parm_b: FloatValue,

    /// Temperature response
    /// default: Topt 50.06, F0 0.1, n 67108874
    pub temperature_response: TemperatureResponse,

    /// Moisture response (normalised water content)
    /// default: x [0, 2, 3], y [0, 0, 1]
    pub moisture_response: ResponseTable,

    /// Water-filled pore space response of the N2:N2O ratio
    /// unit: x in %
    /// default: x [0, 28, 88, 100], y [0.1, 0.1, 1, 1.18]
    pub wfps_response: ResponseTable,
}

impl Default for DenitrificationParameters {
    fn default() -> Self {
        Self {
            rate_coefficient: 0.0006,
            active_carbon_intercept: 24.5,
            active_carbon_slope: 0.0031,
            active_carbon_exp_coefficient: 0.011,
            active_carbon_exp_exponent: 0.895,
            n2n2o_k1: 25.1,
            n2n2o_parm_a: 0.16,
            n2n2o_parm_b: -0.8,
            temperature_response: TemperatureResponse::new(50.0561976737836, 0.1, 67108874.0),
            moisture_response: ResponseTable::new(vec![0.0, 2.0, 3.0], vec![0.0, 0.0, 1.0]),
            wfps_response: ResponseTable::new(
                vec![0.0, 28.0, 88.0, 100.0],
                vec![0.1, 0.1, 1.0, 1.18],
            ),
        }
    }
}

impl DenitrificationParameters {
    /// Water-soluble carbon (ppm) from active carbon (ppm), linear form.
    pub fn water_soluble_carbon(&self, active_carbon: FloatValue) -> FloatValue {
        self.active_carbon_intercept + self.active_carbon_slope * active_carbon
    }

    /// Water-soluble carbon (ppm) from active carbon (ppm), power-law form.
    pub fn water_soluble_carbon_exp(&self, active_carbon: FloatValue) -> FloatValue {
        self.active_carbon_exp_coefficient
            * active_carbon.max(0.0).powf(self.active_carbon_exp_exponent)
    }

    /// N2:N2O ratio of denitrification products.
    pub fn n2n2o_ratio(&self, no3: FloatValue, co2: FloatValue, wfps_factor: FloatValue) -> FloatValue {
        let co2_effect = if co2 > crate::EPSILON {
            self.n2n2o_parm_a.max((self.n2n2o_parm_b * no3 / co2).exp())
        } else {
            self.n2n2o_parm_a.max(0.0)
        };
        (self.n2n2o_k1 * co2_effect * wfps_factor).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parameters() {
        let params = DenitrificationParameters::default();
        assert!((params.rate_coefficient - 0.0006).abs() < 1e-12);
        assert!((params.active_carbon_intercept - 24.5).abs() < 1e-10);
        assert!((params.n2n2o_k1 - 25.1).abs() < 1e-10);
    }

    #[test]
    fn test_water_soluble_carbon() {
        let params = DenitrificationParameters::default();
        assert!((params.water_soluble_carbon(1000.0) - 27.6).abs() < 1e-10);
        assert_eq!(params.water_soluble_carbon_exp(0.0), 0.0);
    }

    #[test]
    fn test_n2n2o_ratio_without_co2() {
        let params = DenitrificationParameters::default();
        let ratio = params.n2n2o_ratio(10.0, 0.0, 1.0);
        assert!((ratio - 25.1 * 0.16).abs() < 1e-10);
    }

    #[test]
    fn test_n2n2o_ratio_with_co2() {
        let params = DenitrificationParameters::default();
        // exp(-0.8 * 1 / 10) ~ 0.923 > 0.16
        let ratio = params.n2n2o_ratio(1.0, 10.0, 0.5);
        let expected = 25.1 * (-0.08f64).exp() * 0.5;
        assert!((ratio - expected).abs() < 1e-10);
    }
}
