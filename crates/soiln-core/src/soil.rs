//! Soil description and daily physical conditions.
//!
//! [`SoilProfile`] is the static layered description of the soil (thickness,
//! bulk density, water limits, pH). [`SoilConditions`] carries what the outer
//! water and temperature models supply each day. Both are shared read-only by
//! every patch.

use crate::errors::{SoilNError, SoilNResult};
use crate::response::Condition;
use crate::utils::interpolation::divide;
use crate::FloatValue;
use serde::{Deserialize, Serialize};

/// Static layered description of the soil.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SoilProfile {
    /// Layer thickness
    /// unit: mm
    pub thickness: Vec<FloatValue>,
    /// Bulk density
    /// unit: g/cm3
    pub bulk_density: Vec<FloatValue>,
    /// Water content at the lower limit (15 bar)
    /// unit: mm/mm
    pub ll15: Vec<FloatValue>,
    /// Drained upper limit (field capacity)
    /// unit: mm/mm
    pub dul: Vec<FloatValue>,
    /// Saturated water content
    /// unit: mm/mm
    pub sat: Vec<FloatValue>,
    /// Soil pH
    pub ph: Vec<FloatValue>,
    /// C:N ratio of soil humus
    pub humus_cn_ratio: Vec<FloatValue>,
}

impl SoilProfile {
    /// Build a profile, checking that every layered property has one value per layer.
    pub fn new(
        thickness: Vec<FloatValue>,
        bulk_density: Vec<FloatValue>,
        ll15: Vec<FloatValue>,
        dul: Vec<FloatValue>,
        sat: Vec<FloatValue>,
        ph: Vec<FloatValue>,
        humus_cn_ratio: Vec<FloatValue>,
    ) -> SoilNResult<Self> {
        let profile = Self {
            thickness,
            bulk_density,
            ll15,
            dul,
            sat,
            ph,
            humus_cn_ratio,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// A profile of `n_layers` identical layers.
    ///
    /// Water limits default to 0.1/0.3/0.45 mm/mm, pH to 6 and humus C:N to 10;
    /// use the `with_*` methods to change them.
    pub fn uniform(n_layers: usize, thickness: FloatValue, bulk_density: FloatValue) -> Self {
        Self {
            thickness: vec![thickness; n_layers],
            bulk_density: vec![bulk_density; n_layers],
            ll15: vec![0.1; n_layers],
            dul: vec![0.3; n_layers],
            sat: vec![0.45; n_layers],
            ph: vec![6.0; n_layers],
            humus_cn_ratio: vec![10.0; n_layers],
        }
    }

    pub fn with_water_limits(mut self, ll15: FloatValue, dul: FloatValue, sat: FloatValue) -> Self {
        let n = self.n_layers();
        self.ll15 = vec![ll15; n];
        self.dul = vec![dul; n];
        self.sat = vec![sat; n];
        self
    }

    pub fn with_ph(mut self, ph: FloatValue) -> Self {
        self.ph = vec![ph; self.n_layers()];
        self
    }

    pub fn with_humus_cn_ratio(mut self, cn_ratio: FloatValue) -> Self {
        self.humus_cn_ratio = vec![cn_ratio; self.n_layers()];
        self
    }

    fn validate(&self) -> SoilNResult<()> {
        let n = self.thickness.len();
        if n == 0 {
            return Err(SoilNError::Configuration(
                "soil profile must have at least one layer".to_string(),
            ));
        }
        for (name, values) in [
            ("bulk_density", &self.bulk_density),
            ("ll15", &self.ll15),
            ("dul", &self.dul),
            ("sat", &self.sat),
            ("ph", &self.ph),
            ("humus_cn_ratio", &self.humus_cn_ratio),
        ] {
            if values.len() != n {
                return Err(SoilNError::LayerMismatch {
                    variable: name.to_string(),
                    expected: n,
                    actual: values.len(),
                });
            }
        }
        Ok(())
    }

    pub fn n_layers(&self) -> usize {
        self.thickness.len()
    }

    /// Factor converting kg/ha into ppm for a layer: `100 / (BD * thickness)`.
    pub fn conv_factor(&self, layer: usize) -> FloatValue {
        divide(
            100.0,
            self.bulk_density[layer] * self.thickness[layer],
            0.0,
        )
    }

    pub fn kgha_to_ppm(&self, layer: usize, value: FloatValue) -> FloatValue {
        value * self.conv_factor(layer)
    }

    pub fn ppm_to_kgha(&self, layer: usize, value: FloatValue) -> FloatValue {
        divide(value, self.conv_factor(layer), 0.0)
    }

    /// Total depth of the profile (mm).
    pub fn depth(&self) -> FloatValue {
        self.thickness.iter().sum()
    }

    /// Index of the first layer at which the cumulative thickness reaches `depth`.
    ///
    /// Returns the last layer when the profile is shallower than `depth`.
    pub fn cumulative_index(&self, depth: FloatValue) -> usize {
        let mut cumulative = 0.0;
        for (layer, dz) in self.thickness.iter().enumerate() {
            cumulative += dz;
            if cumulative >= depth {
                return layer;
            }
        }
        self.n_layers().saturating_sub(1)
    }

    /// Fraction (0-1) of each layer lying between the surface and `depth`.
    pub fn fraction_layer(&self, depth: FloatValue) -> Vec<FloatValue> {
        let mut result = vec![0.0; self.n_layers()];
        let deepest = self.cumulative_index(depth);
        let mut cumulative = 0.0;
        for layer in 0..=deepest {
            result[layer] = divide(depth - cumulative, self.thickness[layer], 0.0).min(1.0);
            cumulative += self.thickness[layer];
        }
        result
    }
}

/// Carbon delivered to the surface layer by a pond model.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct PondInputs {
    /// Biomass C from residue breakdown in the pond (kg/ha)
    pub biom_c: FloatValue,
    /// Humic C from residue breakdown in the pond (kg/ha)
    pub hum_c: FloatValue,
}

/// Daily physical conditions supplied by the water and temperature models.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SoilConditions {
    /// Soil temperature
    /// unit: °C
    pub temperature: Vec<FloatValue>,
    /// Volumetric soil water content
    /// unit: mm/mm
    pub sw: Vec<FloatValue>,
    /// Nitrification inhibition (0-1), zero when no inhibitor is present
    pub nitrification_inhibition: Vec<FloatValue>,
    /// Rooting depth used for plant-available N (mm); `None` uses the full profile
    pub root_depth: Option<FloatValue>,
    /// Present when a pond is active, which switches processes to anaerobic parameters
    pub pond: Option<PondInputs>,
}

impl SoilConditions {
    pub fn new(temperature: Vec<FloatValue>, sw: Vec<FloatValue>) -> Self {
        let n = temperature.len();
        Self {
            temperature,
            sw,
            nitrification_inhibition: vec![0.0; n],
            root_depth: None,
            pond: None,
        }
    }

    /// Same temperature and water content in every layer.
    pub fn uniform(n_layers: usize, temperature: FloatValue, sw: FloatValue) -> Self {
        Self::new(vec![temperature; n_layers], vec![sw; n_layers])
    }

    pub fn with_pond(mut self, pond: PondInputs) -> Self {
        self.pond = Some(pond);
        self
    }

    pub fn with_inhibition(mut self, inhibition: Vec<FloatValue>) -> Self {
        self.nitrification_inhibition = inhibition;
        self
    }

    pub fn with_root_depth(mut self, depth: FloatValue) -> Self {
        self.root_depth = Some(depth);
        self
    }

    /// Aerobic unless a pond is active.
    pub fn condition(&self) -> Condition {
        if self.pond.is_some() {
            Condition::Anaerobic
        } else {
            Condition::Aerobic
        }
    }

    /// Check the layered values against a profile.
    pub fn check_layers(&self, profile: &SoilProfile) -> SoilNResult<()> {
        let n = profile.n_layers();
        for (name, values) in [
            ("temperature", &self.temperature),
            ("sw", &self.sw),
            ("nitrification_inhibition", &self.nitrification_inhibition),
        ] {
            if values.len() != n {
                return Err(SoilNError::LayerMismatch {
                    variable: name.to_string(),
                    expected: n,
                    actual: values.len(),
                });
            }
        }
        Ok(())
    }

    /// Water-filled pore space of a layer (%).
    pub fn wfps(&self, profile: &SoilProfile, layer: usize) -> FloatValue {
        divide(self.sw[layer], profile.sat[layer], 0.0) * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> SoilProfile {
        SoilProfile::new(
            vec![100.0, 200.0, 300.0],
            vec![1.2, 1.3, 1.4],
            vec![0.1; 3],
            vec![0.3; 3],
            vec![0.45; 3],
            vec![6.5; 3],
            vec![10.0; 3],
        )
        .unwrap()
    }

    #[test]
    fn test_conv_factor() {
        let p = profile();
        assert!((p.conv_factor(0) - 100.0 / 120.0).abs() < 1e-12);
        assert!((p.kgha_to_ppm(0, 12.0) - 10.0).abs() < 1e-12);
        assert!((p.ppm_to_kgha(0, 10.0) - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_cumulative_index() {
        let p = profile();
        assert_eq!(p.cumulative_index(50.0), 0);
        assert_eq!(p.cumulative_index(100.0), 0);
        assert_eq!(p.cumulative_index(150.0), 1);
        assert_eq!(p.cumulative_index(10_000.0), 2);
    }

    #[test]
    fn test_fraction_layer() {
        let p = profile();
        let frac = p.fraction_layer(150.0);
        assert_eq!(frac[0], 1.0);
        assert!((frac[1] - 0.25).abs() < 1e-12);
        assert_eq!(frac[2], 0.0);
    }

    #[test]
    fn test_mismatched_layers_rejected() {
        let result = SoilProfile::new(
            vec![100.0, 100.0],
            vec![1.2],
            vec![0.1; 2],
            vec![0.3; 2],
            vec![0.45; 2],
            vec![6.5; 2],
            vec![10.0; 2],
        );
        assert!(matches!(result, Err(SoilNError::LayerMismatch { .. })));
    }

    #[test]
    fn test_uniform_builder() {
        let p = SoilProfile::uniform(4, 100.0, 1.3)
            .with_water_limits(0.12, 0.32, 0.5)
            .with_ph(7.0)
            .with_humus_cn_ratio(12.0);
        assert_eq!(p.n_layers(), 4);
        assert_eq!(p.dul[3], 0.32);
        assert_eq!(p.ph[2], 7.0);
        assert_eq!(p.humus_cn_ratio[0], 12.0);
        assert_eq!(p.depth(), 400.0);
    }

    #[test]
    fn test_condition_follows_pond() {
        let c = SoilConditions::uniform(3, 20.0, 0.3);
        assert_eq!(c.condition(), Condition::Aerobic);
        let c = c.with_pond(PondInputs::default());
        assert_eq!(c.condition(), Condition::Anaerobic);
    }

    #[test]
    fn test_wfps() {
        let p = profile();
        let c = SoilConditions::uniform(3, 20.0, 0.225);
        assert!((c.wfps(&p, 0) - 50.0).abs() < 1e-10);
    }
}
