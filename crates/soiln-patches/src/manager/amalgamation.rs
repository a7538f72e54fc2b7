//! Finding patches that have become alike and merging them.
//!
//! Two patches are considered equal when, for every variable tested, the
//! difference between them stays within both an absolute and a relative
//! tolerance:
//!
//! $$|x_k - x_j| \le a \, f \quad \text{and} \quad \frac{|x_k - x_j|}{|x_k|} \le r \, f$$
//!
//! where $f$ is the adjustment factor, different from one only when patch
//! $k$, the one compared against, is the base patch. Profile totals of organic C and N, biomass
//! C, urea, NH4 and NO3 are tested first, then biomass C, urea, NH4 and NO3
//! layer by layer (in ppm) down to a given depth.

use super::PatchManager;
use crate::patch::Patch;
use log::debug;
use soiln_core::errors::{SoilNError, SoilNResult};
use soiln_core::layers::LayerState;
use soiln_core::parameters::{AmalgamationApproach, BaseApproach, Tolerance};
use soiln_core::{FloatValue, EPSILON};

type Total = fn(&LayerState) -> FloatValue;

fn organic_c(state: &LayerState) -> FloatValue {
    state.profile_sum(LayerState::organic_c)
}

fn organic_n(state: &LayerState) -> FloatValue {
    state.profile_sum(LayerState::organic_n)
}

fn biomass_c(state: &LayerState) -> FloatValue {
    state.biom_c.iter().sum()
}

fn urea(state: &LayerState) -> FloatValue {
    state.urea.iter().sum()
}

fn nh4(state: &LayerState) -> FloatValue {
    state.nh4.iter().sum()
}

fn no3(state: &LayerState) -> FloatValue {
    state.no3.iter().sum()
}

impl PatchManager {
    /// Whether patch `k` is the base patch.
    fn is_base_patch(&self, k: usize) -> bool {
        match self.parameters.patches.base_patch_approach {
            BaseApproach::IdBased => k == 0,
            BaseApproach::AreaBased => {
                let largest = self
                    .patches
                    .iter()
                    .map(|p| p.area)
                    .fold(FloatValue::MIN, FloatValue::max);
                (self.patches[k].area - largest).abs() <= EPSILON
            }
        }
    }

    /// Whether patches `k` and `j` are alike enough to be merged.
    ///
    /// Relative differences are taken against patch `k`, and the base patch
    /// tolerance adjustment only applies when `k` is the base patch.
    pub fn patches_are_equal(&self, k: usize, j: usize) -> bool {
        let parameters = &self.parameters.patches;
        let adjust = if self.is_base_patch(k) {
            parameters.diff_adjust_factor
        } else {
            1.0
        };
        let a = &self.patches[k].state;
        let b = &self.patches[j].state;

        let totals: [(Total, &Tolerance); 6] = [
            (organic_c, &parameters.org_c_tolerance),
            (organic_n, &parameters.org_n_tolerance),
            (biomass_c, &parameters.biom_c_tolerance),
            (urea, &parameters.urea_tolerance),
            (nh4, &parameters.nh4_tolerance),
            (no3, &parameters.no3_tolerance),
        ];
        for (total, tolerance) in totals {
            let (x, y) = (total(a), total(b));
            if tolerance.exceeded(x, y, x.abs(), adjust) {
                return false;
            }
        }

        let deepest = if parameters.depth_to_test_by_layer <= EPSILON {
            self.profile.n_layers().saturating_sub(1)
        } else {
            self.profile
                .cumulative_index(parameters.depth_to_test_by_layer)
        };
        let tolerance = &parameters.layer_tolerance;
        for layer in 0..=deepest.min(a.n_layers().saturating_sub(1)) {
            for (x, y) in [
                (a.biom_c[layer], b.biom_c[layer]),
                (a.urea[layer], b.urea[layer]),
                (a.nh4[layer], b.nh4[layer]),
                (a.no3[layer], b.no3[layer]),
            ] {
                let x = self.profile.kgha_to_ppm(layer, x);
                let y = self.profile.kgha_to_ppm(layer, y);
                if tolerance.exceeded(x, y, x.abs(), adjust) {
                    return false;
                }
            }
        }
        true
    }

    /// Fold patch `j` into patch `k`. Patch `j` is left in place.
    fn merge_pair(&mut self, k: usize, j: usize) -> SoilNResult<()> {
        if k == j {
            return Ok(());
        }
        let merged = self.patches[k].area + self.patches[j].area;
        if 1.0 - merged < -self.parameters.patches.min_patch_area {
            return Err(SoilNError::MergeAreaExceeded {
                receiver: k,
                merged: j,
                area: merged,
            });
        }
        let (receiver, donor): (&mut Patch, &Patch) = if k < j {
            let (left, right) = self.patches.split_at_mut(j);
            (&mut left[k], &right[0])
        } else {
            let (left, right) = self.patches.split_at_mut(k);
            (&mut right[0], &left[j])
        };
        receiver.absorb(donor);
        debug!(
            "Merged patch({}) into patch({}), new patch area = {:.4}",
            j, k, receiver.area
        );
        Ok(())
    }

    /// Merge every listed patch into the first one listed.
    pub(crate) fn amalgamate(&mut self, ids: &[usize]) -> SoilNResult<()> {
        let Some((&k, rest)) = ids.split_first() else {
            return Ok(());
        };
        for &j in rest {
            self.merge_pair(k, j)?;
        }
        self.delete_patches(rest.to_vec());
        Ok(())
    }

    /// Merge patches found to be equal, following the configured approach.
    pub(crate) fn amalgamate_similar(&mut self) -> SoilNResult<()> {
        match self.parameters.patches.amalgamation_approach {
            AmalgamationApproach::CompareAll => self.compare_all(),
            AmalgamationApproach::CompareBase => self.compare_base(),
            AmalgamationApproach::CompareMerge => self.compare_merge(),
        }
    }

    /// Compare every pair against the day's starting state, then merge.
    ///
    /// Each patch is merged at most once, into the first patch it equals.
    fn compare_all(&mut self) -> SoilNResult<()> {
        let n = self.patches.len();
        let mut merge_into: Vec<Option<usize>> = vec![None; n];
        for k in 0..n.saturating_sub(1) {
            if merge_into[k].is_some() {
                continue;
            }
            for j in k + 1..n {
                if merge_into[j].is_none() && self.patches_are_equal(k, j) {
                    merge_into[j] = Some(k);
                }
            }
        }

        let mut to_delete = Vec::new();
        for (j, target) in merge_into.into_iter().enumerate() {
            if let Some(k) = target {
                self.merge_pair(k, j)?;
                to_delete.push(j);
            }
        }
        if !to_delete.is_empty() {
            debug!("Amalgamation merged {} patches", to_delete.len());
        }
        self.delete_patches(to_delete);
        Ok(())
    }

    /// Compare each patch with the ones after it and merge those equal.
    ///
    /// A patch that absorbed others is compared again with the remaining
    /// ones; the next patch is taken only once a pass finds no match.
    fn compare_base(&mut self) -> SoilNResult<()> {
        let mut k = 0;
        while k + 1 < self.patches.len() {
            let equal: Vec<usize> = (k + 1..self.patches.len())
                .filter(|&j| self.patches_are_equal(k, j))
                .collect();
            if equal.is_empty() {
                k += 1;
                continue;
            }
            for &j in &equal {
                self.merge_pair(k, j)?;
            }
            self.delete_patches(equal);
        }
        Ok(())
    }

    /// Like [`Self::compare_base`] but merging as soon as a match is found,
    /// so later comparisons see the merged patch.
    fn compare_merge(&mut self) -> SoilNResult<()> {
        let mut k = 0;
        while k + 1 < self.patches.len() {
            let mut merged = Vec::new();
            for j in k + 1..self.patches.len() {
                if self.patches_are_equal(k, j) {
                    self.merge_pair(k, j)?;
                    merged.push(j);
                }
            }
            if merged.is_empty() {
                k += 1;
            } else {
                self.delete_patches(merged);
            }
        }
        Ok(())
    }

    /// Merge patches older than the configured age into the first patch.
    pub(crate) fn merge_old_patches(&mut self) -> SoilNResult<()> {
        let max_age = self.parameters.patches.age_for_merging_days();
        let old: Vec<usize> = (1..self.patches.len())
            .filter(|&j| self.patches[j].age(self.today) as FloatValue > max_age)
            .collect();
        for &j in &old {
            self.merge_pair(0, j)?;
        }
        if !old.is_empty() {
            debug!("Merged {} patches older than {:.0} days", old.len(), max_age);
        }
        self.delete_patches(old);
        Ok(())
    }
}
