//! The patch manager owns every patch of a paddock.
//!
//! It runs the process engine on each patch, creates patches when urine,
//! dung or fertiliser lands on part of the paddock, merges patches that have
//! become alike or old, and presents the paddock to other models as a single
//! soil whose values are the area-weighted sums over patches.
//!
//! A day is driven in this order:
//!
//! 1. [`PatchManager::begin_day`]
//! 2. any number of commands and solute changes
//! 3. [`PatchManager::run_day`]
//! 4. [`PatchManager::end_of_day`], and [`PatchManager::end_of_month`] on the
//!    last day of a month

pub mod amalgamation;
pub mod outputs;
pub mod partition;
pub mod solutes;

use crate::commands::{
    AddPatchCommand, DepositionType, FomIncorporation, FomPoolIncorporation, MergeCommand,
    NitrogenChange,
};
use crate::initialisation::SoilDescription;
use crate::patch::Patch;
use log::{debug, warn};
use ndarray::Array2;
use soiln_core::errors::{SoilNError, SoilNResult};
use soiln_core::layers::LayerState;
use soiln_core::negative::NegativeValuePolicy;
use soiln_core::parameters::SoilNitrogenParameters;
use soiln_core::soil::{SoilConditions, SoilProfile};
use soiln_core::{Day, FloatValue, EPSILON, FOM_POOLS};
use soiln_processes::{ActualDecomposition, PotentialDecomposition, ProcessEngine};
use solutes::{CallerKind, Solute};

const BASE_PATCH: &str = "base";

#[derive(Debug, Clone)]
pub struct PatchManager {
    parameters: SoilNitrogenParameters,
    profile: SoilProfile,
    engine: ProcessEngine,
    policy: NegativeValuePolicy,
    /// Pools set at initialisation, restored by [`PatchManager::reset`]
    initial_state: LayerState,
    patches: Vec<Patch>,
    today: Day,
    /// Rooting depth used for plant-available N (mm)
    root_depth: FloatValue,
}

/// Zero every pool row whose sum is not significant.
fn significant_pools(values: &Array2<FloatValue>) -> (Array2<FloatValue>, bool) {
    let mut result = values.clone();
    let mut any = false;
    for mut row in result.rows_mut() {
        if row.sum().abs() > EPSILON {
            any = true;
        } else {
            row.fill(0.0);
        }
    }
    (result, any)
}

impl PatchManager {
    /// Set up a single `base` patch covering the whole paddock.
    pub fn new(
        parameters: SoilNitrogenParameters,
        description: &SoilDescription,
        today: Day,
    ) -> SoilNResult<Self> {
        parameters.validate()?;
        let (profile, state) = description.initialise(&parameters)?;
        Self::from_state(parameters, profile, state, today)
    }

    /// Set up a single `base` patch from an explicit state.
    pub fn from_state(
        parameters: SoilNitrogenParameters,
        profile: SoilProfile,
        state: LayerState,
        today: Day,
    ) -> SoilNResult<Self> {
        if state.n_layers() != profile.n_layers() {
            return Err(SoilNError::LayerMismatch {
                variable: "initial state".to_string(),
                expected: profile.n_layers(),
                actual: state.n_layers(),
            });
        }
        let engine = ProcessEngine::from_parameters(&parameters);
        let policy = *engine.policy();
        let root_depth = profile.depth();
        Ok(Self {
            parameters,
            engine,
            policy,
            root_depth,
            patches: vec![Patch::new(BASE_PATCH, 1.0, today, state.clone())],
            initial_state: state,
            profile,
            today,
        })
    }

    pub fn parameters(&self) -> &SoilNitrogenParameters {
        &self.parameters
    }

    pub fn profile(&self) -> &SoilProfile {
        &self.profile
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    pub fn n_patches(&self) -> usize {
        self.patches.len()
    }

    pub fn patch(&self, index: usize) -> SoilNResult<&Patch> {
        self.patches
            .get(index)
            .ok_or(SoilNError::PatchOutOfRange(index))
    }

    pub fn today(&self) -> Day {
        self.today
    }

    pub fn set_root_depth(&mut self, depth: FloatValue) {
        self.root_depth = if depth > EPSILON {
            depth
        } else {
            self.profile.depth()
        };
    }

    /// Start a new day: store each patch's status and clear the daily records.
    pub fn begin_day(&mut self, today: Day) {
        self.today = today;
        for patch in self.patches.iter_mut() {
            patch.begin_day();
        }
    }

    /// Run the daily processes on every patch.
    ///
    /// Returns the residue decomposition realised over the paddock, the
    /// area-weighted sum of the patches.
    pub fn run_day(
        &mut self,
        conditions: &SoilConditions,
        residues: &PotentialDecomposition,
    ) -> SoilNResult<ActualDecomposition> {
        if let Some(depth) = conditions.root_depth {
            self.set_root_depth(depth);
        }
        let mut actual = ActualDecomposition::none(residues);
        for patch in self.patches.iter_mut() {
            let realised = self
                .engine
                .run_day(&self.profile, conditions, residues, &mut patch.state)?;
            actual.accumulate(&realised, patch.area);
        }
        Ok(actual)
    }

    /// Merge patches that have become alike, when enabled.
    pub fn end_of_day(&mut self) -> SoilNResult<()> {
        if self.parameters.patches.auto_amalgamation && self.patches.len() > 1 {
            self.amalgamate_similar()?;
        }
        Ok(())
    }

    /// Merge old patches back into the first one, when enabled.
    pub fn end_of_month(&mut self) -> SoilNResult<()> {
        if self.parameters.patches.amalgamation_by_age && self.patches.len() > 1 {
            self.merge_old_patches()?;
        }
        Ok(())
    }

    /// Resolve patch selectors, by name first and then by index.
    ///
    /// Repeated and unknown entries are dropped.
    pub fn check_patch_ids(&self, ids: &[usize], names: &[String]) -> Vec<usize> {
        let mut selected: Vec<usize> = Vec::new();
        for (i, name) in names.iter().enumerate() {
            if names[..i].contains(name) {
                continue;
            }
            match self.patches.iter().position(|p| &p.name == name) {
                Some(k) if !selected.contains(&k) => selected.push(k),
                Some(_) => {}
                None => warn!("Patch named '{name}' does not exist and will be ignored"),
            }
        }
        for &id in ids {
            if selected.contains(&id) {
                continue;
            }
            if id < self.patches.len() {
                selected.push(id);
            } else {
                warn!("Patch index {id} does not exist and will be ignored");
            }
        }
        if selected.is_empty() {
            debug!("No valid patch was found among the patches selected");
        }
        selected
    }

    /// Add N and organic matter to the paddock, creating patches if asked.
    pub fn add_patch(&mut self, command: &AddPatchCommand) -> SoilNResult<()> {
        if let Some(reason) = command.invalid_reason() {
            warn!("Command to add patch ignored: {reason}");
            return Ok(());
        }
        match command.deposition {
            DepositionType::ToAllPaddock => {
                let all: Vec<usize> = (0..self.patches.len()).collect();
                self.add_to_patches(&all, command)
            }
            DepositionType::ToSpecificPatch => {
                let selected =
                    self.check_patch_ids(&command.affected_ids, &command.affected_names);
                self.add_to_patches(&selected, command)
            }
            DepositionType::ToNewPatch | DepositionType::NewOverlappingPatches => {
                self.split_patches(command)
            }
        }
    }

    /// Create new patches from the affected ones and add the payload to them.
    fn split_patches(&mut self, command: &AddPatchCommand) -> SoilNResult<()> {
        let (affected, area_affected) = if command.deposition == DepositionType::ToNewPatch {
            let ids = self.check_patch_ids(&command.affected_ids, &command.affected_names);
            let area: FloatValue = ids.iter().map(|&k| self.patches[k].area).sum();
            (ids, area)
        } else {
            ((0..self.patches.len()).collect::<Vec<_>>(), 1.0)
        };
        if affected.is_empty() {
            warn!("Command to add patch ignored: none of the patches selected exist");
            return Ok(());
        }

        let min_area = self.parameters.patches.min_patch_area;
        if area_affected - command.area < -min_area {
            return Err(SoilNError::InvalidPatchArea(format!(
                "area of selected patches ({area_affected:.3}) is smaller than area of new patch ({:.3})",
                command.area
            )));
        }

        // Check every split before changing anything
        let mut splits = Vec::with_capacity(affected.len());
        for &id in &affected {
            let old_area = self.patches[id].area;
            let new_area = command.area * old_area / area_affected;
            let remaining = old_area - new_area;
            if new_area < min_area {
                return Err(SoilNError::InvalidPatchArea(format!(
                    "attempt to create a new patch with area too small or negative ({new_area:.3e})"
                )));
            }
            if remaining < -min_area {
                return Err(SoilNError::InvalidPatchArea(format!(
                    "attempt to create a new patch with area ({new_area:.3}) greater than the existing patch area ({old_area:.3})"
                )));
            }
            splits.push((id, new_area, remaining));
        }

        let mut created = Vec::with_capacity(splits.len());
        let mut to_delete = Vec::new();
        for (i, (id, new_area, remaining)) in splits.into_iter().enumerate() {
            let k = self.patches.len();
            let mut patch = self.patches[id].clone();
            patch.area = new_area;
            patch.creation_day = self.today;
            patch.name = if command.name.is_empty() {
                format!("patch{k}")
            } else {
                format!("{}_{i}", command.name)
            };

            if remaining < min_area {
                warn!(
                    "Attempt to set the area of patch({id}) to a value too small or negative ({remaining:.3e}), the patch will be eliminated"
                );
                to_delete.push(id);
            } else {
                self.patches[id].area = remaining;
                debug!(
                    "Created patch '{}' with area {:.4}, based on patch({}), whose area is now {:.4}",
                    patch.name, new_area, id, remaining
                );
            }
            self.patches.push(patch);
            created.push(k);
        }

        self.add_to_patches(&created, command)?;
        self.delete_patches(to_delete);
        Ok(())
    }

    /// Apply the payload of an add-patch command to the listed patches.
    fn add_to_patches(&mut self, ids: &[usize], command: &AddPatchCommand) -> SoilNResult<()> {
        let fom = match (&command.fom_c, &command.fom_n) {
            (None, None) => None,
            (c, n) => {
                let shape = c
                    .as_ref()
                    .or(n.as_ref())
                    .map(|a| a.dim())
                    .unwrap_or((FOM_POOLS, 0));
                let (c, c_any) = significant_pools(&c.clone().unwrap_or_else(|| Array2::zeros(shape)));
                let (n, n_any) = significant_pools(&n.clone().unwrap_or_else(|| Array2::zeros(shape)));
                (c_any || n_any).then_some((c, n))
            }
        };

        for &k in ids.iter().rev() {
            let patch = &mut self.patches[k];
            for solute in Solute::ALL {
                let values = command.solute(solute);
                if values.iter().sum::<FloatValue>().abs() > EPSILON {
                    patch.add_solute(solute, command.sender, values, &self.policy)?;
                }
            }
            if let Some((c, n)) = &fom {
                patch.add_fom(c, n, &self.policy)?;
            }
        }
        Ok(())
    }

    /// Remove patches by index.
    fn delete_patches(&mut self, mut ids: Vec<usize>) {
        ids.sort_unstable();
        ids.dedup();
        for &k in ids.iter().rev() {
            self.patches.remove(k);
        }
    }

    /// Merge patches on request.
    pub fn merge_patches(&mut self, command: &MergeCommand) -> SoilNResult<()> {
        let ids = if command.merge_all {
            (0..self.patches.len()).collect()
        } else if command.ids.len() + command.names.len() > 1 {
            self.check_patch_ids(&command.ids, &command.names)
        } else {
            warn!("Command to merge patches ignored: at least two patches must be given");
            return Ok(());
        };
        if ids.len() > 1 {
            self.amalgamate(&ids)?;
        }
        Ok(())
    }

    /// Add changes in mineral N made by another model.
    pub fn set_nitrogen_changed(&mut self, change: &NitrogenChange) -> SoilNResult<()> {
        for solute in Solute::ALL {
            self.set_solute_delta(solute, change.sender, change.solute(solute))?;
        }
        Ok(())
    }

    /// Incorporate organic matter given as a single amount per layer.
    ///
    /// Returns whether anything was added. Both C and N must be known for the
    /// addition to go ahead; N comes from the C:N ratio when one is given.
    pub fn incorporate_fom(&mut self, fom: &FomIncorporation) -> SoilNResult<bool> {
        let n_layers = self.profile.n_layers();
        if fom.layers.len() > n_layers {
            warn!("Information passed contained more layers than the soil, these will be ignored");
        }
        let carbon_fraction = self.parameters.carbon_fraction_in_fom;

        let mut layer_amounts = vec![(0.0, 0.0); n_layers];
        let (mut total_c, mut total_n) = (0.0, 0.0);
        let (mut c_not_added, mut n_not_added) = (0.0, 0.0);
        for (layer, given) in fom.layers.iter().take(n_layers).enumerate() {
            if given.amount >= EPSILON {
                let c = given.amount * carbon_fraction;
                let n = if given.cn_ratio > EPSILON {
                    c / given.cn_ratio
                } else if given.n > EPSILON {
                    given.n
                } else {
                    c_not_added += c;
                    continue;
                };
                total_c += c;
                total_n += n;
                layer_amounts[layer] = (c, n);
            } else if given.n >= EPSILON {
                n_not_added += given.n;
            }
        }

        if total_c < EPSILON || total_n < EPSILON {
            warn_fom_not_added(c_not_added, n_not_added);
            return Ok(false);
        }

        let fractions = self.parameters.fom_fractions(&fom.fom_type);
        let mut fom_c = Array2::zeros((FOM_POOLS, n_layers));
        let mut fom_n = Array2::zeros((FOM_POOLS, n_layers));
        for (layer, (c, n)) in layer_amounts.into_iter().enumerate() {
            for pool in 0..FOM_POOLS {
                fom_c[[pool, layer]] = c * fractions[pool];
                fom_n[[pool, layer]] = n * fractions[pool];
            }
        }
        self.incorporate(&fom_c, &fom_n, &[], &[])?;
        Ok(true)
    }

    /// Incorporate organic matter already split into pools, with mineral N.
    pub fn incorporate_fom_pools(&mut self, fom: &FomPoolIncorporation) -> SoilNResult<bool> {
        let n_layers = self.profile.n_layers();
        if fom.layers.len() > n_layers {
            warn!("Information passed contained more layers than the soil, these will be ignored");
        }

        let (mut total_c, mut total_n) = (0.0, 0.0);
        let (mut c_not_added, mut n_not_added) = (0.0, 0.0);
        let mut fom_c = Array2::zeros((FOM_POOLS, n_layers));
        let mut fom_n = Array2::zeros((FOM_POOLS, n_layers));
        let mut nh4 = vec![0.0; n_layers];
        let mut no3 = vec![0.0; n_layers];
        for (layer, given) in fom.layers.iter().take(n_layers).enumerate() {
            for (pool, amount) in given.pools.iter().enumerate() {
                if amount.c >= EPSILON {
                    total_c += amount.c;
                    total_n += amount.n;
                } else {
                    c_not_added += amount.c;
                    n_not_added += amount.n;
                }
                fom_c[[pool, layer]] = amount.c;
                fom_n[[pool, layer]] = amount.n;
            }
            nh4[layer] = given.nh4;
            no3[layer] = given.no3;
        }

        if total_c < EPSILON || total_n < EPSILON {
            warn_fom_not_added(c_not_added, n_not_added);
            return Ok(false);
        }
        self.incorporate(&fom_c, &fom_n, &nh4, &no3)?;
        Ok(true)
    }

    /// Add FOM and mineral N to every patch.
    fn incorporate(
        &mut self,
        fom_c: &Array2<FloatValue>,
        fom_n: &Array2<FloatValue>,
        nh4: &[FloatValue],
        no3: &[FloatValue],
    ) -> SoilNResult<()> {
        for patch in self.patches.iter_mut() {
            patch.add_fom(fom_c, fom_n, &self.policy)?;
            for (solute, values) in [(Solute::NH4, nh4), (Solute::NO3, no3)] {
                if values.iter().any(|v| v.abs() > EPSILON) {
                    patch.add_solute(solute, CallerKind::Other, values, &self.policy)?;
                }
            }
        }
        Ok(())
    }

    /// Restore every patch's pools to their initial values.
    ///
    /// Patches and their areas are kept; the change shows up in today's
    /// balance.
    pub fn reset(&mut self) {
        let before_n = self.paddock_total(LayerState::sum_total_n);
        let before_c = self.paddock_total(LayerState::sum_total_c);
        for patch in self.patches.iter_mut() {
            patch.reset_pools(&self.initial_state);
        }
        warn!(
            "Re-setting soil carbon and nitrogen state: N changed by {:.3} kg/ha, C by {:.3} kg/ha",
            self.paddock_total(LayerState::sum_total_n) - before_n,
            self.paddock_total(LayerState::sum_total_c) - before_c,
        );
    }
}

fn warn_fom_not_added(c_not_added: FloatValue, n_not_added: FloatValue) {
    let reason = if c_not_added >= EPSILON {
        format!("only C amount was given ({c_not_added:.2} kg/ha)")
    } else if n_not_added >= EPSILON {
        format!("only N amount was given ({n_not_added:.2} kg/ha)")
    } else {
        "no amount was given".to_string()
    };
    warn!("FOM addition was not carried out because {reason}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{FomLayer, FomPoolAmount, FomPoolLayer};
    use is_close::is_close;

    fn manager() -> PatchManager {
        let description = SoilDescription::uniform(3, 100.0, 1.25, 1.5)
            .with_mineral_n(vec![0.0; 3], vec![4.0; 3], vec![8.0; 3]);
        PatchManager::new(SoilNitrogenParameters::default(), &description, 0).unwrap()
    }

    fn total_area(m: &PatchManager) -> FloatValue {
        m.patches().iter().map(|p| p.area).sum()
    }

    // ===== Initialisation Tests =====

    #[test]
    fn test_starts_with_base_patch() {
        let m = manager();
        assert_eq!(m.n_patches(), 1);
        assert_eq!(m.patches()[0].name, "base");
        assert_eq!(m.patches()[0].area, 1.0);
        assert!(matches!(m.patch(1), Err(SoilNError::PatchOutOfRange(1))));
    }

    // ===== Add Patch Tests =====

    #[test]
    fn test_new_patch_splits_base() {
        let mut m = manager();
        m.begin_day(5);
        let command = AddPatchCommand::new(DepositionType::ToNewPatch, 0.2)
            .affecting_names(&["base"])
            .named("urine")
            .with_solute(Solute::Urea, vec![100.0]);
        m.add_patch(&command).unwrap();

        assert_eq!(m.n_patches(), 2);
        assert!(is_close!(m.patches()[0].area, 0.8));
        assert!(is_close!(m.patches()[1].area, 0.2));
        assert_eq!(m.patches()[1].name, "urine_0");
        assert_eq!(m.patches()[1].creation_day, 5);
        assert_eq!(m.patches()[0].state.urea[0], 0.0);
        assert!(is_close!(m.patches()[1].state.urea[0], 100.0));
        assert!(is_close!(m.solute(Solute::Urea)[0], 20.0));
        assert!(is_close!(total_area(&m), 1.0));
    }

    #[test]
    fn test_default_patch_names() {
        let mut m = manager();
        let command =
            AddPatchCommand::new(DepositionType::ToNewPatch, 0.1).affecting_ids(vec![0]);
        m.add_patch(&command).unwrap();
        assert_eq!(m.patches()[1].name, "patch1");
    }

    #[test]
    fn test_overlapping_patches_split_every_patch() {
        let mut m = manager();
        m.add_patch(&AddPatchCommand::new(DepositionType::ToNewPatch, 0.5).affecting_ids(vec![0]))
            .unwrap();
        let command = AddPatchCommand::new(DepositionType::NewOverlappingPatches, 0.1)
            .named("dung")
            .with_solute(Solute::NH4, vec![10.0, 10.0]);
        m.add_patch(&command).unwrap();

        assert_eq!(m.n_patches(), 4);
        assert!(is_close!(m.patches()[2].area, 0.05));
        assert!(is_close!(m.patches()[3].area, 0.05));
        assert_eq!(m.patches()[3].name, "dung_1");
        assert!(is_close!(total_area(&m), 1.0));
        let base_nh4 = m.patches()[0].state.nh4[0];
        assert!(is_close!(m.patches()[2].state.nh4[0], base_nh4 + 10.0));
    }

    #[test]
    fn test_whole_patch_replaced_when_remainder_too_small() {
        let mut m = manager();
        let command = AddPatchCommand::new(DepositionType::ToNewPatch, 1.0)
            .affecting_ids(vec![0])
            .named("all")
            .with_solute(Solute::NO3, vec![1.0]);
        m.add_patch(&command).unwrap();
        assert_eq!(m.n_patches(), 1);
        assert_eq!(m.patches()[0].name, "all_0");
        assert!(is_close!(m.patches()[0].area, 1.0));
        assert!(is_close!(m.patches()[0].state.no3[0], 11.0));
    }

    #[test]
    fn test_new_patch_larger_than_selection_fails() {
        let mut m = manager();
        m.add_patch(&AddPatchCommand::new(DepositionType::ToNewPatch, 0.3).affecting_ids(vec![0]))
            .unwrap();
        let command = AddPatchCommand::new(DepositionType::ToNewPatch, 0.5).affecting_ids(vec![1]);
        assert!(matches!(
            m.add_patch(&command),
            Err(SoilNError::InvalidPatchArea(_))
        ));
        assert_eq!(m.n_patches(), 2);
    }

    #[test]
    fn test_tiny_new_patch_fails() {
        let mut m = manager();
        let command =
            AddPatchCommand::new(DepositionType::ToNewPatch, 1e-9).affecting_ids(vec![0]);
        assert!(matches!(
            m.add_patch(&command),
            Err(SoilNError::InvalidPatchArea(_))
        ));
    }

    #[test]
    fn test_invalid_command_is_skipped() {
        let mut m = manager();
        let command = AddPatchCommand::new(DepositionType::ToNewPatch, 0.2);
        m.add_patch(&command).unwrap();
        let unknown =
            AddPatchCommand::new(DepositionType::ToNewPatch, 0.2).affecting_names(&["nowhere"]);
        m.add_patch(&unknown).unwrap();
        assert_eq!(m.n_patches(), 1);
    }

    #[test]
    fn test_add_to_specific_patch() {
        let mut m = manager();
        m.add_patch(&AddPatchCommand::new(DepositionType::ToNewPatch, 0.5).affecting_ids(vec![0]))
            .unwrap();
        let before = m.patches()[0].state.no3[1];
        let command = AddPatchCommand::new(DepositionType::ToSpecificPatch, 0.0)
            .affecting_ids(vec![1])
            .from_sender(CallerKind::Fertiliser)
            .with_solute(Solute::NO3, vec![0.0, 6.0]);
        m.add_patch(&command).unwrap();
        assert_eq!(m.patches()[0].state.no3[1], before);
        assert!(is_close!(m.patches()[1].state.no3[1], before + 6.0));
        assert_eq!(m.patches()[1].attribution.no3.fertiliser[1], 6.0);
    }

    #[test]
    fn test_add_fom_payload() {
        let mut m = manager();
        let mut fom_c = Array2::zeros((3, 3));
        fom_c[[0, 0]] = 50.0;
        let mut fom_n = Array2::zeros((3, 3));
        fom_n[[0, 0]] = 2.0;
        let before = m.patches()[0].state.fom_c[[0, 0]];
        m.add_patch(&AddPatchCommand::default().with_fom(fom_c, fom_n))
            .unwrap();
        assert!(is_close!(m.patches()[0].state.fom_c[[0, 0]], before + 50.0));
    }

    // ===== Patch Selection Tests =====

    #[test]
    fn test_check_patch_ids() {
        let mut m = manager();
        m.add_patch(&AddPatchCommand::new(DepositionType::ToNewPatch, 0.2).affecting_ids(vec![0]).named("a"))
            .unwrap();
        m.add_patch(&AddPatchCommand::new(DepositionType::ToNewPatch, 0.2).affecting_ids(vec![0]).named("b"))
            .unwrap();

        let names = vec!["b_0".to_string(), "b_0".to_string(), "zzz".to_string()];
        let selected = m.check_patch_ids(&[0, 2, 2, 7], &names);
        assert_eq!(selected, vec![2, 0]);
        assert!(m.check_patch_ids(&[], &[]).is_empty());
    }

    // ===== Merge Tests =====

    #[test]
    fn test_explicit_merge_restores_single_patch() {
        let mut m = manager();
        let original = m.patches()[0].state.clone();
        m.add_patch(&AddPatchCommand::new(DepositionType::ToNewPatch, 0.4).affecting_ids(vec![0]))
            .unwrap();
        m.merge_patches(&MergeCommand::all()).unwrap();

        assert_eq!(m.n_patches(), 1);
        assert!(is_close!(m.patches()[0].area, 1.0));
        for layer in 0..3 {
            assert!(is_close!(m.patches()[0].state.hum_c[layer], original.hum_c[layer]));
            assert!(is_close!(m.patches()[0].state.no3[layer], original.no3[layer]));
        }
    }

    #[test]
    fn test_merge_needs_two_patches() {
        let mut m = manager();
        m.add_patch(&AddPatchCommand::new(DepositionType::ToNewPatch, 0.4).affecting_ids(vec![0]))
            .unwrap();
        m.merge_patches(&MergeCommand::of_ids(vec![1])).unwrap();
        assert_eq!(m.n_patches(), 2);
        m.merge_patches(&MergeCommand::of_ids(vec![1, 0])).unwrap();
        assert_eq!(m.n_patches(), 1);
        assert!(is_close!(m.patches()[0].area, 1.0));
    }

    // ===== Solute Exchange Tests =====

    #[test]
    fn test_solute_includes_nh3() {
        let mut m = manager();
        m.patches[0].state.nh3[0] = 0.5;
        let nh4 = m.solute(Solute::NH4);
        assert!(is_close!(nh4[0], 5.5));
    }

    #[test]
    fn test_set_solute_applies_difference() {
        let mut m = manager();
        m.set_solute(Solute::NO3, CallerKind::Transport, &[12.0, 10.0, 0.0])
            .unwrap();
        let no3 = m.solute(Solute::NO3);
        assert!(is_close!(no3[0], 12.0));
        assert!(is_close!(no3[1], 10.0));
        assert_eq!(no3[2], 0.0);
        assert!(is_close!(m.patches()[0].attribution.no3.flow[0], 2.0));
    }

    #[test]
    fn test_uptake_partitioned_between_patches() {
        let mut m = manager();
        m.add_patch(
            &AddPatchCommand::new(DepositionType::ToNewPatch, 0.5)
                .affecting_ids(vec![0])
                .with_solute(Solute::NO3, vec![30.0]),
        )
        .unwrap();
        // layer 0 NO3: 10 in the base patch, 40 in the new one
        let change = NitrogenChange::new(CallerKind::Plant)
            .with_solute(Solute::NO3, vec![-5.0, 0.0, 0.0]);
        m.set_nitrogen_changed(&change).unwrap();

        assert!(is_close!(m.patches()[0].state.no3[0], 10.0 - 2.0));
        assert!(is_close!(m.patches()[1].state.no3[0], 40.0 - 8.0));
        assert!(is_close!(m.solute(Solute::NO3)[0], 20.0));
    }

    #[test]
    fn test_fertiliser_applied_uniformly() {
        let mut m = manager();
        m.add_patch(&AddPatchCommand::new(DepositionType::ToNewPatch, 0.5).affecting_ids(vec![0]))
            .unwrap();
        let change = NitrogenChange::new(CallerKind::Fertiliser)
            .with_solute(Solute::NH4, vec![3.0]);
        m.set_nitrogen_changed(&change).unwrap();
        assert!(is_close!(m.patches()[0].state.nh4[0], 8.0));
        assert!(is_close!(m.patches()[1].state.nh4[0], 8.0));
    }

    // ===== FOM Incorporation Tests =====

    #[test]
    fn test_incorporate_fom_with_cn_ratio() {
        let mut m = manager();
        let before = m.patches()[0].state.clone();
        let fom = FomIncorporation {
            fom_type: "manure".to_string(),
            layers: vec![FomLayer {
                amount: 1000.0,
                n: 0.0,
                cn_ratio: 20.0,
            }],
        };
        assert!(m.incorporate_fom(&fom).unwrap());
        let state = &m.patches()[0].state;
        assert!(is_close!(state.fom_c_total(0) - before.fom_c_total(0), 400.0));
        assert!(is_close!(state.fom_n_total(0) - before.fom_n_total(0), 20.0));
        assert!(is_close!(state.fom_c[[2, 0]] - before.fom_c[[2, 0]], 0.4 * 400.0));
        assert_eq!(state.fom_c_total(1), before.fom_c_total(1));
    }

    #[test]
    fn test_incorporate_fom_without_n_rejected() {
        let mut m = manager();
        let before = m.patches()[0].state.clone();
        let fom = FomIncorporation {
            fom_type: "default".to_string(),
            layers: vec![FomLayer {
                amount: 1000.0,
                ..Default::default()
            }],
        };
        assert!(!m.incorporate_fom(&fom).unwrap());
        assert_eq!(m.patches()[0].state, before);
    }

    #[test]
    fn test_incorporate_fom_pools() {
        let mut m = manager();
        let before = m.patches()[0].state.clone();
        let mut layer = FomPoolLayer {
            nh4: 1.0,
            ..Default::default()
        };
        layer.pools[1] = FomPoolAmount { c: 30.0, n: 1.5 };
        let fom = FomPoolIncorporation {
            layers: vec![FomPoolLayer::default(), layer],
        };
        assert!(m.incorporate_fom_pools(&fom).unwrap());
        let state = &m.patches()[0].state;
        assert!(is_close!(state.fom_c[[1, 1]] - before.fom_c[[1, 1]], 30.0));
        assert!(is_close!(state.nh4[1] - before.nh4[1], 1.0));
        assert_eq!(state.nh4[0], before.nh4[0]);
    }

    // ===== Reset Tests =====

    #[test]
    fn test_reset_restores_initial_pools() {
        let mut m = manager();
        let initial = m.patches()[0].state.clone();
        m.set_nitrogen_changed(
            &NitrogenChange::new(CallerKind::Fertiliser).with_solute(Solute::Urea, vec![50.0]),
        )
        .unwrap();
        m.reset();
        assert_eq!(m.patches()[0].state.urea, initial.urea);
        assert_eq!(m.patches()[0].state.hum_c, initial.hum_c);
    }
}
