//! Organic matter parameters
//!
//! Parameters for surface residue decomposition, fresh organic matter (FOM)
//! decomposition and the mineralisation of soil organic matter (humus and
//! microbial biomass).

use crate::response::{ConditionPair, ResponseTable, TemperatureResponse};
use crate::FloatValue;
use serde::{Deserialize, Serialize};

/// Parameters for the N-limited decomposition of surface residues.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResidueParameters {
    /// Fraction of decomposed residue C lost as CO2
    /// unit: 0-1
    /// default: 0.6
    pub respiration_factor: FloatValue,

    /// Fraction of retained residue C going to microbial biomass (remainder to humus)
    /// unit: 0-1
    /// default: 0.9
    pub fraction_into_biomass: FloatValue,

    /// Depth down to which soil mineral N is available for residue decomposition
    /// and into which decomposition products are incorporated
    /// unit: mm
    /// default: 100.0
    pub decomposition_depth: FloatValue,
}

impl Default for ResidueParameters {
    fn default() -> Self {
        Self {
            respiration_factor: 0.6,
            fraction_into_biomass: 0.9,
            decomposition_depth: 100.0,
        }
    }
}

/// Parameters for fresh organic matter decomposition.
///
/// FOM is split into three sub-pools (carbohydrate, cellulose and lignin-like),
/// each with its own turnover rate pair. Decomposition is limited by the C:N
/// ratio of FOM plus available mineral N:
///
/// $$f_{CN} = \text{clamp}\left(e^{-k (CN - CN_{opt}) / CN_{opt}}, 0, 1\right)$$
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FomParameters {
    /// Potential turnover rate of each FOM sub-pool, per condition
    /// unit: /day
    /// default: carbohydrate {0.2, 0.1}, cellulose {0.05, 0.25}, lignin {0.0095, 0.003}
    pub turnover_rate: [ConditionPair; 3],

    /// Fraction of decomposed FOM C lost as CO2
    /// unit: 0-1
    /// default: 0.6
    pub respiration_factor: FloatValue,

    /// Fraction of retained FOM C going to microbial biomass (remainder to humus)
    /// unit: 0-1
    /// default: 0.9
    pub fraction_into_biomass: FloatValue,

    /// C:N ratio above which decomposition is limited
    /// default: 25.0
    pub cn_threshold: FloatValue,

    /// Coefficient of the exponential C:N limitation
    /// default: 0.693
    pub cn_coefficient: FloatValue,

    /// Temperature response of FOM decomposition
    /// default: Topt 32, F0 0, n 2
    pub temperature_response: TemperatureResponse,

    /// Moisture response of FOM decomposition (normalised water content)
    /// default: x [0, 1, 1.5, 2, 3], y [0, 0, 1, 1, 0.5]
    pub moisture_response: ResponseTable,
}

impl Default for FomParameters {
    fn default() -> Self {
        Self {
            turnover_rate: [
                ConditionPair::new(0.2, 0.1),
                ConditionPair::new(0.05, 0.25),
                ConditionPair::new(0.0095, 0.003),
            ],
            respiration_factor: 0.6,
            fraction_into_biomass: 0.9,
            cn_threshold: 25.0,
            cn_coefficient: 0.693,
            temperature_response: TemperatureResponse::new(32.0, 0.0, 2.0),
            moisture_response: ResponseTable::new(
                vec![0.0, 1.0, 1.5, 2.0, 3.0],
                vec![0.0, 0.0, 1.0, 1.0, 0.5],
            ),
        }
    }
}

/// Parameters for humus and microbial biomass mineralisation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SoilOrganicMatterParameters {
    /// Potential turnover rate of the decomposable humus, per condition
    /// unit: /day
    /// default: {0.00015, 0.00007}
    pub humus_turnover_rate: ConditionPair,

    /// Fraction of mineralised humus C lost as CO2
    /// unit: 0-1
    /// default: 0.6
    pub humus_respiration_factor: FloatValue,

    /// Potential turnover rate of microbial biomass, per condition
    /// unit: /day
    /// default: {0.0081, 0.004}
    pub biomass_turnover_rate: ConditionPair,

    /// Fraction of mineralised biomass C lost as CO2
    /// unit: 0-1
    /// default: 0.6
    pub biomass_respiration_factor: FloatValue,

    /// Fraction of retained biomass C that stays in the biomass (remainder to humus)
    /// unit: 0-1
    /// default: 0.6
    pub biomass_fraction_into_biomass: FloatValue,

    /// C:N ratio of microbial biomass, constant throughout the profile
    /// default: 8.0
    pub biomass_cn_ratio: FloatValue,

    /// Temperature response of SOM mineralisation
    /// default: Topt 32, F0 0, n 2
    pub temperature_response: TemperatureResponse,

    /// Moisture response of SOM mineralisation (normalised water content)
    /// default: x [0, 1, 1.5, 2, 3], y [0, 0, 1, 1, 0.5]
    pub moisture_response: ResponseTable,
}

impl Default for SoilOrganicMatterParameters {
    fn default() -> Self {
        Self {
            humus_turnover_rate: ConditionPair::new(0.00015, 0.00007),
            humus_respiration_factor: 0.6,
            biomass_turnover_rate: ConditionPair::new(0.0081, 0.004),
            biomass_respiration_factor: 0.6,
            biomass_fraction_into_biomass: 0.6,
            biomass_cn_ratio: 8.0,
            temperature_response: TemperatureResponse::new(32.0, 0.0, 2.0),
            moisture_response: ResponseTable::new(
                vec![0.0, 1.0, 1.5, 2.0, 3.0],
                vec![0.0, 0.0, 1.0, 1.0, 0.5],
            ),
        }
    }
}

/// Partitioning of incoming organic matter into the three FOM sub-pools.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FomType {
    pub name: String,
    /// Fraction going to the carbohydrate-like pool
    pub carbohydrate: FloatValue,
    /// Fraction going to the cellulose-like pool
    pub cellulose: FloatValue,
    /// Fraction going to the lignin-like pool
    pub lignin: FloatValue,
}

impl FomType {
    pub fn new(name: &str, carbohydrate: FloatValue, cellulose: FloatValue, lignin: FloatValue) -> Self {
        Self {
            name: name.to_string(),
            carbohydrate,
            cellulose,
            lignin,
        }
    }

    /// Fractions in pool order.
    pub fn fractions(&self) -> [FloatValue; 3] {
        [self.carbohydrate, self.cellulose, self.lignin]
    }
}

/// The reference FOM types; the first entry is used when a type is unknown.
pub fn default_fom_types() -> Vec<FomType> {
    vec![
        FomType::new("default", 0.2, 0.7, 0.1),
        FomType::new("manure", 0.3, 0.3, 0.4),
        FomType::new("mucuna", 0.54, 0.37, 0.09),
        FomType::new("lablab", 0.57, 0.37, 0.06),
        FomType::new("shemp", 0.45, 0.47, 0.08),
        FomType::new("stable", 0.0, 0.1, 0.9),
    ]
}
