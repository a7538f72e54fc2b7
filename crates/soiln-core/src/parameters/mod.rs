//! Soil nitrogen parameters
//!
//! This module contains the parameter structures for every process and for
//! patch management. Each struct carries the reference defaults, so a partial
//! TOML document only needs to list the values that differ.
//!
//! ```
//! use soiln_core::parameters::SoilNitrogenParameters;
//!
//! let params = SoilNitrogenParameters::from_toml_str(
//!     r#"
//!     [nitrification]
//!     use_two_step = true
//!
//!     [patches]
//!     amalgamation_approach = "CompareMerge"
//!     "#,
//! )
//! .unwrap();
//! assert!(params.nitrification.use_two_step);
//! assert!((params.fom.respiration_factor - 0.6).abs() < 1e-12);
//! ```

mod denitrification;
mod hydrolysis;
mod nitrification;
mod organic_matter;
mod patching;

pub use denitrification::DenitrificationParameters;
pub use hydrolysis::HydrolysisParameters;
pub use nitrification::{CodenitrificationParameters, MichaelisMenten, NitrificationParameters};
pub use organic_matter::{
    default_fom_types, FomParameters, FomType, ResidueParameters, SoilOrganicMatterParameters,
};
pub use patching::{
    AmalgamationApproach, BaseApproach, PartitionApproach, PatchParameters, Tolerance,
};

use crate::errors::{SoilNError, SoilNResult};
use crate::response::ResponseTable;
use crate::FloatValue;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Thresholds of the negative-value policy.
///
/// Values below `fatal` abort the day, values below `warning` are reset to
/// zero with a warning and smaller negatives are reset silently.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NegativeValueThresholds {
    /// unit: kg/ha
    /// default: -1e-10
    pub warning: FloatValue,
    /// unit: kg/ha
    /// default: -1e-6
    pub fatal: FloatValue,
}

impl Default for NegativeValueThresholds {
    fn default() -> Self {
        Self {
            warning: -1e-10,
            fatal: -1e-6,
        }
    }
}

/// Complete, immutable configuration shared by every patch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SoilNitrogenParameters {
    /// Carbon content of incoming organic matter
    /// unit: 0-1
    /// default: 0.4
    pub carbon_fraction_in_fom: FloatValue,

    pub residues: ResidueParameters,
    pub fom: FomParameters,
    pub soil_organic_matter: SoilOrganicMatterParameters,
    pub hydrolysis: HydrolysisParameters,
    pub nitrification: NitrificationParameters,
    pub codenitrification: CodenitrificationParameters,
    pub denitrification: DenitrificationParameters,
    pub patches: PatchParameters,
    pub negative_values: NegativeValueThresholds,

    /// Known partitions of incoming organic matter; the first is the fallback
    pub fom_types: Vec<FomType>,
}

impl Default for SoilNitrogenParameters {
    fn default() -> Self {
        Self {
            carbon_fraction_in_fom: 0.4,
            residues: ResidueParameters::default(),
            fom: FomParameters::default(),
            soil_organic_matter: SoilOrganicMatterParameters::default(),
            hydrolysis: HydrolysisParameters::default(),
            nitrification: NitrificationParameters::default(),
            codenitrification: CodenitrificationParameters::default(),
            denitrification: DenitrificationParameters::default(),
            patches: PatchParameters::default(),
            negative_values: NegativeValueThresholds::default(),
            fom_types: default_fom_types(),
        }
    }
}

impl SoilNitrogenParameters {
    /// Parameter set for sandy soils.
    ///
    /// Microbial biomass turns over faster and organic matter still decomposes,
    /// slowly, in dry soil.
    pub fn for_sand() -> Self {
        let mut params = Self::default();
        let dry_moisture = ResponseTable::new(
            vec![0.0, 1.0, 1.5, 2.0, 3.0],
            vec![0.05, 0.05, 1.0, 1.0, 0.5],
        );
        params.soil_organic_matter.biomass_turnover_rate =
            crate::response::ConditionPair::new(0.0324, 0.015);
        params.soil_organic_matter.moisture_response = dry_moisture.clone();
        params.fom.moisture_response = dry_moisture;
        params
    }

    pub fn from_toml_str(source: &str) -> SoilNResult<Self> {
        let params: Self =
            toml::from_str(source).map_err(|e| SoilNError::Configuration(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> SoilNResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            SoilNError::Configuration(format!("could not read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&source)
    }

    pub fn to_toml_string(&self) -> SoilNResult<String> {
        toml::to_string(self).map_err(|e| SoilNError::Configuration(e.to_string()))
    }

    /// Check internal consistency of the parameters.
    pub fn validate(&self) -> SoilNResult<()> {
        let tables = [
            ("fom.moisture_response", &self.fom.moisture_response),
            (
                "soil_organic_matter.moisture_response",
                &self.soil_organic_matter.moisture_response,
            ),
            ("hydrolysis.moisture_response", &self.hydrolysis.moisture_response),
            ("nitrification.moisture_response", &self.nitrification.moisture_response),
            ("nitrification.ph_response", &self.nitrification.ph_response),
            (
                "nitrification.nitritation_ph_response",
                &self.nitrification.nitritation_ph_response,
            ),
            (
                "nitrification.nitratation_ph_response",
                &self.nitrification.nitratation_ph_response,
            ),
            (
                "codenitrification.moisture_response",
                &self.codenitrification.moisture_response,
            ),
            ("codenitrification.ph_response", &self.codenitrification.ph_response),
            (
                "codenitrification.n2_fraction_response",
                &self.codenitrification.n2_fraction_response,
            ),
            (
                "denitrification.moisture_response",
                &self.denitrification.moisture_response,
            ),
            ("denitrification.wfps_response", &self.denitrification.wfps_response),
        ];
        for (name, table) in tables {
            table.validate(name)?;
        }

        let fractions = [
            ("residues.respiration_factor", self.residues.respiration_factor),
            ("residues.fraction_into_biomass", self.residues.fraction_into_biomass),
            ("fom.respiration_factor", self.fom.respiration_factor),
            ("fom.fraction_into_biomass", self.fom.fraction_into_biomass),
            (
                "soil_organic_matter.humus_respiration_factor",
                self.soil_organic_matter.humus_respiration_factor,
            ),
            (
                "soil_organic_matter.biomass_respiration_factor",
                self.soil_organic_matter.biomass_respiration_factor,
            ),
            (
                "soil_organic_matter.biomass_fraction_into_biomass",
                self.soil_organic_matter.biomass_fraction_into_biomass,
            ),
            ("carbon_fraction_in_fom", self.carbon_fraction_in_fom),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(SoilNError::Configuration(format!(
                    "{name} must be between 0 and 1, got {value}"
                )));
            }
        }

        if self.soil_organic_matter.biomass_cn_ratio <= 0.0 {
            return Err(SoilNError::Configuration(
                "soil_organic_matter.biomass_cn_ratio must be positive".to_string(),
            ));
        }
        if self.residues.decomposition_depth <= 0.0 {
            return Err(SoilNError::Configuration(
                "residues.decomposition_depth must be positive".to_string(),
            ));
        }
        if self.negative_values.fatal > self.negative_values.warning
            || self.negative_values.warning > 0.0
        {
            return Err(SoilNError::Configuration(format!(
                "negative value thresholds must satisfy fatal <= warning <= 0, got {} and {}",
                self.negative_values.fatal, self.negative_values.warning
            )));
        }
        if self.patches.min_patch_area <= 0.0 {
            return Err(SoilNError::Configuration(
                "patches.min_patch_area must be positive".to_string(),
            ));
        }
        if self.fom_types.is_empty() {
            return Err(SoilNError::Configuration(
                "at least one FOM type is required".to_string(),
            ));
        }
        for fom_type in &self.fom_types {
            let total: FloatValue = fom_type.fractions().iter().sum();
            if (total - 1.0).abs() > 1e-6 {
                return Err(SoilNError::Configuration(format!(
                    "fractions of FOM type {} sum to {total}, expected 1",
                    fom_type.name
                )));
            }
        }
        Ok(())
    }

    /// Pool fractions of a FOM type, falling back to the first type when unknown.
    pub fn fom_fractions(&self, name: &str) -> [FloatValue; 3] {
        if let Some(fom_type) = self
            .fom_types
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
        {
            return fom_type.fractions();
        }
        log::warn!("FOM type '{name}' not recognised, using the default fractions");
        self.fom_types
            .first()
            .map(FomType::fractions)
            .unwrap_or([0.2, 0.7, 0.1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_parameters_validate() {
        let params = SoilNitrogenParameters::default();
        assert!(params.validate().is_ok());
        assert!((params.carbon_fraction_in_fom - 0.4).abs() < 1e-12);
        assert!((params.negative_values.fatal + 1e-6).abs() < 1e-15);
    }

    #[test]
    fn test_sand_parameters() {
        let params = SoilNitrogenParameters::for_sand();
        assert!(params.validate().is_ok());
        assert!((params.soil_organic_matter.biomass_turnover_rate.aerobic - 0.0324).abs() < 1e-12);
        assert!((params.soil_organic_matter.biomass_turnover_rate.anaerobic - 0.015).abs() < 1e-12);
        assert_eq!(params.fom.moisture_response.y[0], 0.05);
        assert_eq!(params.soil_organic_matter.moisture_response.y[1], 0.05);
    }

    #[test]
    fn test_toml_round_trip() {
        let params = SoilNitrogenParameters::for_sand();
        let serialised = params.to_toml_string().unwrap();
        let deserialised = SoilNitrogenParameters::from_toml_str(&serialised).unwrap();
        assert_eq!(
            deserialised.soil_organic_matter.biomass_turnover_rate,
            params.soil_organic_matter.biomass_turnover_rate
        );
        assert_eq!(deserialised.fom_types, params.fom_types);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let params = SoilNitrogenParameters::from_toml_str(
            r#"
            carbon_fraction_in_fom = 0.42

            [patches]
            base_patch_approach = "IdBased"
            "#,
        )
        .unwrap();
        assert!((params.carbon_fraction_in_fom - 0.42).abs() < 1e-12);
        assert_eq!(params.patches.base_patch_approach, BaseApproach::IdBased);
        assert_eq!(params.patches.amalgamation_approach, AmalgamationApproach::CompareAll);
    }

    #[test]
    fn test_unknown_option_in_toml_fails() {
        let result = SoilNitrogenParameters::from_toml_str(
            r#"
            [patches]
            partition_approach = "Random"
            "#,
        );
        assert!(matches!(result, Err(SoilNError::Configuration(_))));
    }

    #[test]
    fn test_invalid_fraction_rejected() {
        let mut params = SoilNitrogenParameters::default();
        params.fom.respiration_factor = 1.5;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let mut params = SoilNitrogenParameters::default();
        params.negative_values.fatal = -1e-12;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_fom_fractions_lookup() {
        let params = SoilNitrogenParameters::default();
        assert_eq!(params.fom_fractions("manure"), [0.3, 0.3, 0.4]);
        assert_eq!(params.fom_fractions("Stable"), [0.0, 0.1, 0.9]);
        assert_eq!(params.fom_fractions("unknown"), [0.2, 0.7, 0.1]);
    }
}
