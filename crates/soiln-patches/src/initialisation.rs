//! Initial carbon and nitrogen state from a soil description.
//!
//! Organic carbon is split into three pools:
//!
//! $$C_{inert} = f_{inert} \, C_{soil}$$
//! $$C_{biom} = \frac{(C_{soil} - C_{inert}) \, f_{biom}}{1 + f_{biom}}$$
//! $$C_{hum} = C_{soil} - C_{biom}$$
//!
//! so the humic pool includes the inert fraction. N follows from the humus and
//! biomass C:N ratios. Fresh organic matter comes from the initial root mass,
//! distributed down to `fom_depth` with an exponentially decreasing weight
//! $w_i = \phi_i \exp(-k \min(1, z_i / z_{fom}))$, normalised to sum to one.
//!
//! Layered inputs that are shorter than the profile are padded (with a
//! warning) and longer ones are truncated. The physical properties
//! (thickness, bulk density, water limits) must match exactly.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use soiln_core::errors::{SoilNError, SoilNResult};
use soiln_core::layers::LayerState;
use soiln_core::parameters::SoilNitrogenParameters;
use soiln_core::soil::SoilProfile;
use soiln_core::utils::interpolation::divide;
use soiln_core::{FloatValue, FOM_POOLS};

const DEFAULT_PH: FloatValue = 6.0;

/// Description of the soil and its initial contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoilDescription {
    /// unit: mm
    pub thickness: Vec<FloatValue>,
    /// unit: g/cm3
    pub bulk_density: Vec<FloatValue>,
    /// unit: mm/mm
    pub ll15: Vec<FloatValue>,
    /// unit: mm/mm
    pub dul: Vec<FloatValue>,
    /// unit: mm/mm
    pub sat: Vec<FloatValue>,
    /// Soil pH; defaults to 6 when not given
    pub ph: Vec<FloatValue>,
    /// Organic carbon
    /// unit: %
    pub organic_carbon: Vec<FloatValue>,
    /// Fraction of non-inert organic C in microbial biomass
    pub fbiom: Vec<FloatValue>,
    /// Fraction of organic C that is inert
    pub finert: Vec<FloatValue>,
    /// C:N ratio of the humus
    pub humus_cn_ratio: Vec<FloatValue>,
    /// unit: ppm
    pub urea: Vec<FloatValue>,
    /// unit: ppm
    pub nh4: Vec<FloatValue>,
    /// unit: ppm
    pub no3: Vec<FloatValue>,
    /// Initial root mass in the profile
    /// unit: kg/ha
    pub root_wt: FloatValue,
    /// C:N ratio of the initial root mass
    /// default: 40
    pub root_cn_ratio: FloatValue,
    /// FOM type used to split the root mass into pools
    /// default: "default"
    pub fom_type: String,
    /// Depth the initial root mass is spread over; the full profile when absent
    /// unit: mm
    pub fom_depth: Option<FloatValue>,
    /// Shape of the exponential root mass distribution
    /// default: 3.0
    pub fom_distribution_coefficient: FloatValue,
}

impl Default for SoilDescription {
    fn default() -> Self {
        Self {
            thickness: Vec::new(),
            bulk_density: Vec::new(),
            ll15: Vec::new(),
            dul: Vec::new(),
            sat: Vec::new(),
            ph: Vec::new(),
            organic_carbon: Vec::new(),
            fbiom: Vec::new(),
            finert: Vec::new(),
            humus_cn_ratio: Vec::new(),
            urea: Vec::new(),
            nh4: Vec::new(),
            no3: Vec::new(),
            root_wt: 0.0,
            root_cn_ratio: 40.0,
            fom_type: "default".to_string(),
            fom_depth: None,
            fom_distribution_coefficient: 3.0,
        }
    }
}

/// Pad or truncate a layered input to `n` values, warning about either.
fn fit_layers(values: &[FloatValue], n: usize, name: &str, fill: FloatValue) -> Vec<FloatValue> {
    if values.is_empty() {
        warn!("No values were supplied for the initial {name}, {fill} will be assumed");
    } else if values.len() < n {
        warn!("Values supplied for the initial {name} do not cover all layers, {fill} will be assumed");
    } else if values.len() > n {
        warn!("More values were supplied for the initial {name} than the number of layers, excess will be ignored");
    }
    let mut result = values.to_vec();
    result.resize(n, fill);
    result
}

impl SoilDescription {
    /// A profile of identical layers with uniform organic carbon.
    pub fn uniform(
        n_layers: usize,
        thickness: FloatValue,
        bulk_density: FloatValue,
        organic_carbon: FloatValue,
    ) -> Self {
        let layered = |value: FloatValue| vec![value; n_layers];
        Self {
            thickness: layered(thickness),
            bulk_density: layered(bulk_density),
            ll15: layered(0.1),
            dul: layered(0.3),
            sat: layered(0.45),
            ph: layered(DEFAULT_PH),
            organic_carbon: layered(organic_carbon),
            fbiom: layered(0.04),
            finert: layered(0.4),
            humus_cn_ratio: layered(12.0),
            urea: layered(0.0),
            nh4: layered(1.0),
            no3: layered(5.0),
            ..Default::default()
        }
    }

    pub fn with_mineral_n(mut self, urea: Vec<FloatValue>, nh4: Vec<FloatValue>, no3: Vec<FloatValue>) -> Self {
        self.urea = urea;
        self.nh4 = nh4;
        self.no3 = no3;
        self
    }

    pub fn with_roots(mut self, root_wt: FloatValue, root_cn_ratio: FloatValue) -> Self {
        self.root_wt = root_wt;
        self.root_cn_ratio = root_cn_ratio;
        self
    }

    pub fn n_layers(&self) -> usize {
        self.thickness.len()
    }

    /// The static soil profile, with missing pH and humus C:N filled in.
    pub fn profile(&self) -> SoilNResult<SoilProfile> {
        let n = self.n_layers();
        if self.humus_cn_ratio.is_empty() {
            return Err(SoilNError::Configuration(
                "the humus C:N ratio must be given for at least one layer".to_string(),
            ));
        }
        // Missing humus C:N layers take the deepest value given.
        let last_cn = self.humus_cn_ratio[self.humus_cn_ratio.len() - 1];
        SoilProfile::new(
            self.thickness.clone(),
            self.bulk_density.clone(),
            self.ll15.clone(),
            self.dul.clone(),
            self.sat.clone(),
            fit_layers(&self.ph, n, "pH", DEFAULT_PH),
            fit_layers(&self.humus_cn_ratio, n, "humus C:N ratio", last_cn),
        )
    }

    /// Fraction of the initial root mass in each layer; sums to one.
    pub fn fom_distribution(&self, profile: &SoilProfile) -> Vec<FloatValue> {
        let n = profile.n_layers();
        let depth = self.fom_depth.unwrap_or_else(|| profile.depth());
        let mut fractions = vec![0.0; n];
        if n == 0 || depth <= 0.0 {
            return fractions;
        }
        let deepest = profile.cumulative_index(depth);
        let mut cumulative = 0.0;
        for layer in 0..=deepest {
            let in_layer = divide(depth - cumulative, profile.thickness[layer], 0.0).min(1.0);
            cumulative += profile.thickness[layer];
            fractions[layer] = in_layer
                * (-self.fom_distribution_coefficient * divide(cumulative, depth, 0.0).min(1.0)).exp();
        }
        let total: FloatValue = fractions.iter().sum();
        for fraction in fractions.iter_mut() {
            *fraction = divide(*fraction, total, 0.0);
        }
        fractions
    }

    fn validate(&self, n: usize) -> SoilNResult<()> {
        for (name, values) in [("fbiom", &self.fbiom), ("finert", &self.finert)] {
            if let Some(bad) = values.iter().take(n).find(|v| !(0.0..=1.0).contains(*v)) {
                return Err(SoilNError::Configuration(format!(
                    "{name} must be between 0 and 1, got {bad}"
                )));
            }
        }
        if self.root_wt < 0.0 {
            return Err(SoilNError::Configuration(format!(
                "root_wt must not be negative, got {}",
                self.root_wt
            )));
        }
        Ok(())
    }

    /// Pools of a patch at the start of the simulation.
    pub fn initial_state(
        &self,
        profile: &SoilProfile,
        parameters: &SoilNitrogenParameters,
    ) -> SoilNResult<LayerState> {
        let n = profile.n_layers();
        self.validate(n)?;

        let oc = fit_layers(&self.organic_carbon, n, "organic carbon", 0.0);
        let fbiom = fit_layers(&self.fbiom, n, "biomass fraction", 0.0);
        let finert = fit_layers(&self.finert, n, "inert fraction", 0.0);
        let urea = fit_layers(&self.urea, n, "urea", 0.0);
        let nh4 = fit_layers(&self.nh4, n, "nh4", 0.0);
        let no3 = fit_layers(&self.no3, n, "no3", 0.0);

        let fom_fractions = parameters.fom_fractions(&self.fom_type);
        let distribution = self.fom_distribution(profile);
        let biomass_cn = parameters.soil_organic_matter.biomass_cn_ratio;

        let mut state = LayerState::zeros(n);
        for layer in 0..n {
            state.urea[layer] = profile.ppm_to_kgha(layer, urea[layer]);
            state.nh4[layer] = profile.ppm_to_kgha(layer, nh4[layer]);
            state.no3[layer] = profile.ppm_to_kgha(layer, no3[layer]);

            // % to ppm, then to kg/ha
            let soil_c = profile.ppm_to_kgha(layer, oc[layer] * 10000.0);
            let humus_cn = profile.humus_cn_ratio[layer];

            state.inert_c[layer] = finert[layer] * soil_c;
            state.inert_n[layer] = divide(state.inert_c[layer], humus_cn, 0.0);
            state.biom_c[layer] =
                divide((soil_c - state.inert_c[layer]) * fbiom[layer], 1.0 + fbiom[layer], 0.0);
            state.biom_n[layer] = divide(state.biom_c[layer], biomass_cn, 0.0);
            state.hum_c[layer] = soil_c - state.biom_c[layer];
            state.hum_n[layer] = divide(state.hum_c[layer], humus_cn, 0.0);

            let root_c = self.root_wt * distribution[layer] * parameters.carbon_fraction_in_fom;
            for pool in 0..FOM_POOLS {
                let c = root_c * fom_fractions[pool];
                state.fom_c[[pool, layer]] = c;
                state.fom_n[[pool, layer]] = divide(c, self.root_cn_ratio, 0.0);
            }
        }
        Ok(state)
    }

    /// Profile and initial pools in one step.
    pub fn initialise(
        &self,
        parameters: &SoilNitrogenParameters,
    ) -> SoilNResult<(SoilProfile, LayerState)> {
        let profile = self.profile()?;
        let state = self.initial_state(&profile, parameters)?;
        info!(
            "Initialised {} layers to {:.0} mm: organic C {:.1} kg/ha, total N {:.1} kg/ha, mineral N {:.2} kg/ha",
            profile.n_layers(),
            profile.depth(),
            state.profile_sum(LayerState::organic_c),
            state.sum_total_n(),
            state.profile_sum(LayerState::mineral_n),
        );
        Ok((profile, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    fn description() -> SoilDescription {
        SoilDescription::uniform(3, 100.0, 1.25, 2.0)
    }

    // ===== Pool Split Tests =====

    #[test]
    fn test_organic_carbon_split() {
        let params = SoilNitrogenParameters::default();
        let (profile, state) = description().initialise(&params).unwrap();

        // 2 % of 1250 t/ha of soil
        let soil_c = 25000.0;
        assert!(is_close!(profile.ppm_to_kgha(0, 20000.0), soil_c));
        assert!(is_close!(state.inert_c[0], 0.4 * soil_c));
        let biom = (soil_c - 0.4 * soil_c) * 0.04 / 1.04;
        assert!(is_close!(state.biom_c[0], biom));
        assert!(is_close!(state.hum_c[0], soil_c - biom));
        assert!(is_close!(state.hum_n[0], (soil_c - biom) / 12.0));
        assert!(is_close!(state.biom_n[0], biom / params.soil_organic_matter.biomass_cn_ratio));
        assert!(state.hum_c[0] >= state.inert_c[0]);
        assert!(is_close!(state.organic_c(0), soil_c));
    }

    #[test]
    fn test_mineral_n_converted_from_ppm() {
        let params = SoilNitrogenParameters::default();
        let (_, state) = description().initialise(&params).unwrap();
        // conv factor 100 / (1.25 * 100) = 0.8
        assert!(is_close!(state.nh4[0], 1.25));
        assert!(is_close!(state.no3[2], 6.25));
        assert_eq!(state.urea[1], 0.0);
    }

    // ===== FOM Distribution Tests =====

    #[test]
    fn test_fom_distribution_sums_to_one() {
        let desc = description();
        let profile = desc.profile().unwrap();
        let distribution = desc.fom_distribution(&profile);
        let total: FloatValue = distribution.iter().sum();
        assert!(is_close!(total, 1.0));
        assert!(distribution[0] > distribution[1]);
        assert!(distribution[1] > distribution[2]);
    }

    #[test]
    fn test_fom_distribution_limited_depth() {
        let mut desc = description();
        desc.fom_depth = Some(150.0);
        let profile = desc.profile().unwrap();
        let distribution = desc.fom_distribution(&profile);
        assert_eq!(distribution[2], 0.0);
        let w0 = (-3.0 * (100.0_f64 / 150.0)).exp();
        let w1 = 0.5 * (-3.0_f64).exp();
        assert!(is_close!(distribution[0], w0 / (w0 + w1)));
    }

    #[test]
    fn test_root_mass_split_into_pools() {
        let params = SoilNitrogenParameters::default();
        let desc = description().with_roots(1000.0, 40.0);
        let (_, state) = desc.initialise(&params).unwrap();
        let fom_c: FloatValue = state.fom_c.sum();
        assert!(is_close!(fom_c, 400.0));
        assert!(is_close!(state.fom_n.sum(), 10.0));
        // default type: 0.2 carbohydrate, 0.7 cellulose, 0.1 lignin
        let layer0 = state.fom_c_total(0);
        assert!(is_close!(state.fom_c[[1, 0]], 0.7 * layer0));
    }

    // ===== Padding Tests =====

    #[test]
    fn test_short_inputs_are_padded() {
        let params = SoilNitrogenParameters::default();
        let mut desc = description();
        desc.ph = Vec::new();
        desc.organic_carbon = vec![2.0];
        desc.humus_cn_ratio = vec![11.0, 13.0];
        desc.no3 = vec![5.0, 5.0, 5.0, 5.0];
        let (profile, state) = desc.initialise(&params).unwrap();
        assert_eq!(profile.ph, vec![6.0; 3]);
        assert_eq!(profile.humus_cn_ratio, vec![11.0, 13.0, 13.0]);
        assert_eq!(state.hum_c[1], 0.0);
        assert_eq!(state.no3.len(), 3);
    }

    #[test]
    fn test_mismatched_physical_properties_fail() {
        let params = SoilNitrogenParameters::default();
        let mut desc = description();
        desc.bulk_density = vec![1.25];
        assert!(matches!(
            desc.initialise(&params),
            Err(SoilNError::LayerMismatch { .. })
        ));
    }

    #[test]
    fn test_invalid_fraction_fails() {
        let params = SoilNitrogenParameters::default();
        let mut desc = description();
        desc.finert = vec![1.5; 3];
        assert!(matches!(
            desc.initialise(&params),
            Err(SoilNError::Configuration(_))
        ));
    }

    #[test]
    fn test_description_from_toml() {
        let desc: SoilDescription = toml::from_str(
            r#"
            thickness = [150.0, 150.0]
            bulk_density = [1.1, 1.3]
            ll15 = [0.1, 0.1]
            dul = [0.3, 0.3]
            sat = [0.45, 0.45]
            organic_carbon = [3.0, 1.0]
            fbiom = [0.04, 0.02]
            finert = [0.3, 0.6]
            humus_cn_ratio = [12.0]
            root_wt = 500.0
            "#,
        )
        .unwrap();
        assert_eq!(desc.root_cn_ratio, 40.0);
        assert_eq!(desc.fom_type, "default");
        let params = SoilNitrogenParameters::default();
        let (profile, _) = desc.initialise(&params).unwrap();
        assert_eq!(profile.n_layers(), 2);
    }
}
