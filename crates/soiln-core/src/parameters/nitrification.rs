//! Nitrification parameters
//!
//! Two alternatives are supported. The single-step path converts NH4 straight
//! into NO3 with Michaelis-Menten kinetics. The two-step path converts NH4 into
//! NO2 (nitritation) and NO2 into NO3 (nitratation), with NO2 also lost through
//! codenitrification. [`NitrificationParameters::use_two_step`] selects between them.

use crate::response::{ResponseTable, TemperatureResponse};
use crate::FloatValue;
use serde::{Deserialize, Serialize};

fn default_ph_response() -> ResponseTable {
    ResponseTable::new(
        vec![0.0, 4.5, 6.0, 8.0, 9.0, 14.0],
        vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0],
    )
}

/// Michaelis-Menten kinetics for one nitrification step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MichaelisMenten {
    /// Maximum transformation rate
    /// unit: ppm/day
    pub max_rate: FloatValue,
    /// Concentration at half the maximum rate
    /// unit: ppm
    pub half_saturation: FloatValue,
}

impl MichaelisMenten {
    pub const fn new(max_rate: FloatValue, half_saturation: FloatValue) -> Self {
        Self {
            max_rate,
            half_saturation,
        }
    }

    /// Potential rate (ppm/day) at a substrate concentration (ppm).
    pub fn rate(&self, concentration: FloatValue) -> FloatValue {
        let denominator = concentration + self.half_saturation;
        if denominator <= 0.0 {
            0.0
        } else {
            self.max_rate * concentration / denominator
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NitrificationParameters {
    /// Use the two-step (nitritation, nitratation) path instead of the single step
    /// default: false
    pub use_two_step: bool,

    /// Single-step kinetics
    /// default: Vmax 40 ppm/day, Km 90 ppm
    pub kinetics: MichaelisMenten,

    /// Fraction of single-step nitrification lost as N2O
    /// unit: 0-1
    /// default: 0.0
    pub n2o_loss_fraction: FloatValue,

    /// Nitritation (NH4 to NO2) kinetics
    /// default: Vmax 40 ppm/day, Km 90 ppm
    pub nitritation_kinetics: MichaelisMenten,

    /// Nitratation (NO2 to NO3) kinetics
    /// default: Vmax 400 ppm/day, Km 90 ppm
    pub nitratation_kinetics: MichaelisMenten,

    /// First coefficient of N2O production during nitritation
    /// unit: ppm
    /// default: 0.0025
    pub ammox_n2o_coefficient_1: FloatValue,

    /// Second coefficient of N2O production during nitritation
    /// unit: /ppm
    /// default: 0.45
    pub ammox_n2o_coefficient_2: FloatValue,

    /// Temperature response of nitrification (both paths)
    /// default: Topt 32, F0 0, n 2
    pub temperature_response: TemperatureResponse,

    /// Moisture response of nitrification (normalised water content)
    /// default: x [0, 1, 1.25, 2, 3], y [0, 0, 1, 1, 0]
    pub moisture_response: ResponseTable,

    /// pH response of single-step nitrification
    /// default: x [0, 4.5, 6, 8, 9, 14], y [0, 0, 1, 1, 0, 0]
    pub ph_response: ResponseTable,

    /// pH response of nitritation
    pub nitritation_ph_response: ResponseTable,

    /// pH response of nitratation
    pub nitratation_ph_response: ResponseTable,
}

impl Default for NitrificationParameters {
    fn default() -> Self {
        Self {
            use_two_step: false,
            kinetics: MichaelisMenten::new(40.0, 90.0),
            n2o_loss_fraction: 0.0,
            nitritation_kinetics: MichaelisMenten::new(40.0, 90.0),
            nitratation_kinetics: MichaelisMenten::new(400.0, 90.0),
            ammox_n2o_coefficient_1: 0.0025,
            ammox_n2o_coefficient_2: 0.45,
            temperature_response: TemperatureResponse::new(32.0, 0.0, 2.0),
            moisture_response: ResponseTable::new(
                vec![0.0, 1.0, 1.25, 2.0, 3.0],
                vec![0.0, 0.0, 1.0, 1.0, 0.0],
            ),
            ph_response: default_ph_response(),
            nitritation_ph_response: default_ph_response(),
            nitratation_ph_response: default_ph_response(),
        }
    }
}

impl NitrificationParameters {
    /// N2O produced during nitritation (ppm) for a nitritation amount (ppm).
    pub fn ammox_n2o(&self, nitritation: FloatValue) -> FloatValue {
        let p1 = self.ammox_n2o_coefficient_1;
        let p2 = self.ammox_n2o_coefficient_2;
        nitritation.min(p1 * ((nitritation * p2).exp() - 1.0)).max(0.0)
    }
}

/// Parameters for codenitrification, the combined loss of NO2 and NH3.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CodenitrificationParameters {
    /// Rate coefficient
    /// unit: kg/mg
    /// default: 0.0006
    pub rate_coefficient: FloatValue,

    /// Temperature response
    /// default: Topt 50.05, F0 0.1, n 1000
    pub temperature_response: TemperatureResponse,

    /// Moisture response (normalised water content)
    /// default: x [0, 2, 3], y [0, 0, 1]
    pub moisture_response: ResponseTable,

    /// pH response
    /// default: x [0, 4.5, 6, 8, 9, 14], y [0, 0, 1, 1, 0, 0]
    pub ph_response: ResponseTable,

    /// Fraction of codenitrification emitted as N2, by NH3 + NO2 concentration (ppm)
    /// default: x [0, 4.5, 6, 8, 9, 14], y [0, 0, 1, 1, 0, 0]
    pub n2_fraction_response: ResponseTable,
}

impl Default for CodenitrificationParameters {
    fn default() -> Self {
        Self {
            rate_coefficient: 0.0006,
            temperature_response: TemperatureResponse::new(50.05, 0.1, 1000.0),
            moisture_response: ResponseTable::new(vec![0.0, 2.0, 3.0], vec![0.0, 0.0, 1.0]),
            ph_response: default_ph_response(),
            n2_fraction_response: default_ph_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parameters() {
        let params = NitrificationParameters::default();
        assert!(!params.use_two_step);
        assert!((params.kinetics.max_rate - 40.0).abs() < 1e-10);
        assert!((params.nitratation_kinetics.max_rate - 400.0).abs() < 1e-10);
        assert!((params.nitritation_kinetics.half_saturation - 90.0).abs() < 1e-10);
        assert_eq!(params.n2o_loss_fraction, 0.0);
    }

    #[test]
    fn test_michaelis_menten_half_saturation() {
        let mm = MichaelisMenten::new(40.0, 90.0);
        assert!((mm.rate(90.0) - 20.0).abs() < 1e-12);
        assert_eq!(mm.rate(0.0), 0.0);
    }

    #[test]
    fn test_ammox_n2o_bounded_by_nitritation() {
        let params = NitrificationParameters::default();
        for amount in [0.0, 0.1, 1.0, 10.0, 40.0] {
            let n2o = params.ammox_n2o(amount);
            assert!(n2o >= 0.0 && n2o <= amount, "n2o {} for {}", n2o, amount);
        }
    }

    #[test]
    fn test_default_codenitrification_parameters() {
        let params = CodenitrificationParameters::default();
        assert!((params.rate_coefficient - 0.0006).abs() < 1e-12);
        assert!((params.temperature_response.optimum.aerobic - 50.05).abs() < 1e-10);
    }
}
