//! A patch: a fraction of the paddock with its own carbon and nitrogen state.
//!
//! Patches share the soil profile and the daily conditions, so only the pools,
//! the start-of-day status and the record of outside changes live here.

use crate::manager::solutes::{CallerKind, Solute};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use soiln_core::balance::{MassBalance, StatusSnapshot};
use soiln_core::errors::SoilNResult;
use soiln_core::layers::LayerState;
use soiln_core::negative::NegativeValuePolicy;
use soiln_core::soil::SoilProfile;
use soiln_core::utils::interpolation::divide;
use soiln_core::{Day, FloatValue, FOM_POOLS};

/// Changes to one solute made by other models today, by source (kg/ha).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attribution {
    pub flow: Vec<FloatValue>,
    pub uptake: Vec<FloatValue>,
    pub fertiliser: Vec<FloatValue>,
    pub other: Vec<FloatValue>,
}

impl Attribution {
    pub fn zeros(n_layers: usize) -> Self {
        Self {
            flow: vec![0.0; n_layers],
            uptake: vec![0.0; n_layers],
            fertiliser: vec![0.0; n_layers],
            other: vec![0.0; n_layers],
        }
    }

    fn bucket_mut(&mut self, caller: CallerKind) -> &mut Vec<FloatValue> {
        match caller {
            CallerKind::Transport => &mut self.flow,
            CallerKind::Plant => &mut self.uptake,
            CallerKind::Fertiliser => &mut self.fertiliser,
            CallerKind::Other => &mut self.other,
        }
    }

    pub fn record(&mut self, caller: CallerKind, layer: usize, value: FloatValue) {
        if let Some(slot) = self.bucket_mut(caller).get_mut(layer) {
            *slot += value;
        }
    }

    fn blend(&mut self, own_area: FloatValue, other: &Self, other_area: FloatValue) {
        let total = own_area + other_area;
        for (a, b) in [
            (&mut self.flow, &other.flow),
            (&mut self.uptake, &other.uptake),
            (&mut self.fertiliser, &other.fertiliser),
            (&mut self.other, &other.other),
        ] {
            for (x, y) in a.iter_mut().zip(b) {
                *x = (*x * own_area + y * other_area) / total;
            }
        }
    }
}

/// Attribution of the three mineral N solutes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoluteAttribution {
    pub urea: Attribution,
    pub nh4: Attribution,
    pub no3: Attribution,
}

impl SoluteAttribution {
    pub fn zeros(n_layers: usize) -> Self {
        Self {
            urea: Attribution::zeros(n_layers),
            nh4: Attribution::zeros(n_layers),
            no3: Attribution::zeros(n_layers),
        }
    }

    pub fn get(&self, solute: Solute) -> &Attribution {
        match solute {
            Solute::Urea => &self.urea,
            Solute::NH4 => &self.nh4,
            Solute::NO3 => &self.no3,
        }
    }

    fn get_mut(&mut self, solute: Solute) -> &mut Attribution {
        match solute {
            Solute::Urea => &mut self.urea,
            Solute::NH4 => &mut self.nh4,
            Solute::NO3 => &mut self.no3,
        }
    }

    fn blend(&mut self, own_area: FloatValue, other: &Self, other_area: FloatValue) {
        self.urea.blend(own_area, &other.urea, other_area);
        self.nh4.blend(own_area, &other.nh4, other_area);
        self.no3.blend(own_area, &other.no3, other_area);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub name: String,
    /// Fraction of the paddock covered by this patch (0-1)
    pub area: FloatValue,
    pub creation_day: Day,
    pub state: LayerState,
    /// Totals and mineral N at the start of the day
    pub status: StatusSnapshot,
    pub attribution: SoluteAttribution,
}

impl Patch {
    pub fn new(name: &str, area: FloatValue, creation_day: Day, state: LayerState) -> Self {
        let n_layers = state.n_layers();
        let status = StatusSnapshot::capture(&state);
        Self {
            name: name.to_string(),
            area,
            creation_day,
            state,
            status,
            attribution: SoluteAttribution::zeros(n_layers),
        }
    }

    pub fn n_layers(&self) -> usize {
        self.state.n_layers()
    }

    /// Days since creation, counting the creation day itself.
    pub fn age(&self, today: Day) -> Day {
        today - self.creation_day + 1
    }

    /// Remember the start-of-day status and clear the daily records.
    pub fn begin_day(&mut self) {
        self.status = StatusSnapshot::capture(&self.state);
        self.state.clear_fluxes();
        self.attribution = SoluteAttribution::zeros(self.n_layers());
    }

    /// Today's C and N balance of this patch.
    pub fn balance(&self) -> MassBalance {
        MassBalance::compute(&self.state, &self.status)
    }

    pub fn solute(&self, solute: Solute) -> &[FloatValue] {
        match solute {
            Solute::Urea => &self.state.urea,
            Solute::NH4 => &self.state.nh4,
            Solute::NO3 => &self.state.no3,
        }
    }

    fn solute_mut(&mut self, solute: Solute) -> &mut Vec<FloatValue> {
        match solute {
            Solute::Urea => &mut self.state.urea,
            Solute::NH4 => &mut self.state.nh4,
            Solute::NO3 => &mut self.state.no3,
        }
    }

    /// Add a per-layer change to a solute and record who made it.
    ///
    /// Values beyond the last layer are ignored.
    pub fn add_solute(
        &mut self,
        solute: Solute,
        caller: CallerKind,
        delta: &[FloatValue],
        policy: &NegativeValuePolicy,
    ) -> SoilNResult<()> {
        let method = format!("patch {}: delta {}", self.name, solute);
        let n = self.n_layers().min(delta.len());
        for (layer, value) in delta.iter().take(n).enumerate() {
            let pool = &mut self.solute_mut(solute)[layer];
            *pool += value;
            policy.check(pool, layer, solute.name(), &method)?;
            self.attribution.get_mut(solute).record(caller, layer, *value);
        }
        Ok(())
    }

    /// Add changes to the FOM pools, given as `(pool, layer)` arrays.
    pub fn add_fom(
        &mut self,
        fom_c: &Array2<FloatValue>,
        fom_n: &Array2<FloatValue>,
        policy: &NegativeValuePolicy,
    ) -> SoilNResult<()> {
        let method = format!("patch {}: delta FOM", self.name);
        for (values, target, label) in [
            (fom_c, &mut self.state.fom_c, "fom_c"),
            (fom_n, &mut self.state.fom_n, "fom_n"),
        ] {
            let (pools, layers) = values.dim();
            for pool in 0..pools.min(FOM_POOLS) {
                for layer in 0..layers.min(target.ncols()) {
                    let slot = &mut target[[pool, layer]];
                    *slot += values[[pool, layer]];
                    policy.check(slot, layer, &format!("{}[{}]", label, pool + 1), &method)?;
                }
            }
        }
        Ok(())
    }

    /// NH4 plus NO3 from the surface down to the layer containing `root_depth`.
    pub fn mineral_n_in_root_zone(&self, profile: &SoilProfile, root_depth: FloatValue) -> FloatValue {
        let deepest = profile.cumulative_index(root_depth);
        (0..=deepest.min(self.n_layers().saturating_sub(1)))
            .map(|layer| self.state.nh4[layer] + self.state.no3[layer])
            .sum()
    }

    /// NH4 or NO3 in the root zone that plants may take up, per layer.
    ///
    /// When the root zone holds more mineral N than `max_available`, every
    /// layer is scaled down by the same fraction. Urea is never available.
    pub fn plant_available(
        &self,
        solute: Solute,
        profile: &SoilProfile,
        root_depth: FloatValue,
        max_available: FloatValue,
    ) -> Vec<FloatValue> {
        let mut result = vec![0.0; self.n_layers()];
        if solute == Solute::Urea || self.n_layers() == 0 {
            return result;
        }
        let in_root_zone = self.mineral_n_in_root_zone(profile, root_depth);
        let fraction = divide(max_available, in_root_zone, 0.0).min(1.0);
        let deepest = profile.cumulative_index(root_depth).min(self.n_layers() - 1);
        let amounts = self.solute(solute);
        for layer in 0..=deepest {
            result[layer] = amounts[layer] * fraction;
        }
        result
    }

    /// Fold `other` into this patch, averaging every pool by area.
    ///
    /// The resulting area is the sum of both.
    pub fn absorb(&mut self, other: &Patch) {
        self.state.merge_weighted(self.area, &other.state, other.area);
        self.status.blend(self.area, &other.status, other.area);
        self.attribution.blend(self.area, &other.attribution, other.area);
        self.area += other.area;
    }

    /// Replace the pools with `initial`, keeping today's fluxes.
    pub fn reset_pools(&mut self, initial: &LayerState) {
        let mut state = initial.clone();
        std::mem::swap(&mut state.fluxes, &mut self.state.fluxes);
        std::mem::swap(
            &mut state.previous_som_respiration,
            &mut self.state.previous_som_respiration,
        );
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;
    use soiln_core::errors::SoilNError;

    fn patch_with_mineral_n() -> Patch {
        let mut state = LayerState::zeros(3);
        state.nh4 = vec![10.0, 5.0, 5.0];
        state.no3 = vec![30.0, 15.0, 5.0];
        Patch::new("base", 1.0, 0, state)
    }

    // ===== Solute Tests =====

    #[test]
    fn test_add_solute_records_attribution() {
        let mut patch = patch_with_mineral_n();
        let policy = NegativeValuePolicy::default();
        patch
            .add_solute(Solute::NO3, CallerKind::Fertiliser, &[5.0, 1.0], &policy)
            .unwrap();
        patch
            .add_solute(Solute::NO3, CallerKind::Plant, &[-2.0, 0.0, -1.0], &policy)
            .unwrap();

        assert!(is_close!(patch.state.no3[0], 33.0));
        assert!(is_close!(patch.state.no3[1], 16.0));
        assert!(is_close!(patch.state.no3[2], 4.0));
        assert_eq!(patch.attribution.no3.fertiliser, vec![5.0, 1.0, 0.0]);
        assert_eq!(patch.attribution.no3.uptake, vec![-2.0, 0.0, -1.0]);
        assert_eq!(patch.attribution.nh4.uptake, vec![0.0; 3]);
    }

    #[test]
    fn test_add_solute_ignores_extra_layers() {
        let mut patch = patch_with_mineral_n();
        let policy = NegativeValuePolicy::default();
        patch
            .add_solute(Solute::Urea, CallerKind::Other, &[1.0, 1.0, 1.0, 1.0], &policy)
            .unwrap();
        assert_eq!(patch.state.urea, vec![1.0; 3]);
    }

    #[test]
    fn test_add_solute_fatal_negative() {
        let mut patch = patch_with_mineral_n();
        let policy = NegativeValuePolicy::default();
        let result = patch.add_solute(Solute::NH4, CallerKind::Plant, &[-11.0], &policy);
        assert!(matches!(result, Err(SoilNError::NegativePool { .. })));
    }

    #[test]
    fn test_begin_day_clears_attribution() {
        let mut patch = patch_with_mineral_n();
        let policy = NegativeValuePolicy::default();
        patch
            .add_solute(Solute::NH4, CallerKind::Transport, &[-1.0], &policy)
            .unwrap();
        patch.begin_day();
        assert_eq!(patch.attribution.nh4.flow, vec![0.0; 3]);
        assert!(is_close!(patch.status.total_n, 69.0));
    }

    // ===== Plant Available N Tests =====

    #[test]
    fn test_plant_available_within_root_zone() {
        let patch = patch_with_mineral_n();
        let profile = SoilProfile::uniform(3, 100.0, 1.3);
        let nh4 = patch.plant_available(Solute::NH4, &profile, 150.0, 9999.9);
        assert_eq!(nh4, vec![10.0, 5.0, 0.0]);
    }

    #[test]
    fn test_plant_available_scaled_by_maximum() {
        let patch = patch_with_mineral_n();
        let profile = SoilProfile::uniform(3, 100.0, 1.3);
        // root zone holds 60 kg/ha, only 30 may be taken
        let no3 = patch.plant_available(Solute::NO3, &profile, 200.0, 30.0);
        assert!(is_close!(no3[0], 15.0));
        assert!(is_close!(no3[1], 7.5));
        assert_eq!(no3[2], 0.0);
        assert_eq!(
            patch.plant_available(Solute::Urea, &profile, 200.0, 30.0),
            vec![0.0; 3]
        );
    }

    // ===== Merge Tests =====

    #[test]
    fn test_absorb_weights_by_area() {
        let mut a = patch_with_mineral_n();
        a.area = 0.6;
        let mut b = patch_with_mineral_n();
        b.area = 0.4;
        b.state.nh4 = vec![20.0, 0.0, 0.0];
        b.status.nh4 = vec![20.0, 0.0, 0.0];

        a.absorb(&b);

        assert!(is_close!(a.area, 1.0));
        assert!(is_close!(a.state.nh4[0], (10.0 * 0.6 + 20.0 * 0.4) / 1.0));
        assert!(is_close!(a.state.nh4[1], 3.0));
        assert!(is_close!(a.status.nh4[0], 14.0));
    }

    #[test]
    fn test_absorb_blends_attribution() {
        let policy = NegativeValuePolicy::default();
        let mut a = patch_with_mineral_n();
        a.area = 0.6;
        a.add_solute(Solute::NO3, CallerKind::Fertiliser, &[10.0], &policy)
            .unwrap();
        a.add_solute(Solute::Urea, CallerKind::Other, &[0.0, 5.0], &policy)
            .unwrap();
        let mut b = patch_with_mineral_n();
        b.area = 0.4;
        b.add_solute(Solute::NH4, CallerKind::Plant, &[-2.0], &policy)
            .unwrap();

        a.absorb(&b);

        assert!(is_close!(a.attribution.no3.fertiliser[0], 6.0));
        assert!(is_close!(a.attribution.urea.other[1], 3.0));
        assert!(is_close!(a.attribution.nh4.uptake[0], -0.8));
        assert_eq!(a.attribution.no3.flow, vec![0.0; 3]);
    }

    #[test]
    fn test_reset_pools_keeps_fluxes() {
        let mut patch = patch_with_mineral_n();
        patch.state.fluxes.no3_dnit[0] = 0.5;
        let initial = LayerState::zeros(3);
        patch.reset_pools(&initial);
        assert_eq!(patch.state.no3, vec![0.0; 3]);
        assert_eq!(patch.state.fluxes.no3_dnit[0], 0.5);
    }

    #[test]
    fn test_age_counts_creation_day() {
        let patch = Patch::new("p", 1.0, 10, LayerState::zeros(1));
        assert_eq!(patch.age(10), 1);
        assert_eq!(patch.age(374), 365);
    }
}
