//! Conservation tests for the patch manager.
//!
//! These tests drive a paddock through patch creation, daily processes,
//! solute exchange and amalgamation, and check that:
//! - the relative areas of all patches always sum to one
//! - the paddock C and N balance closes every day
//! - splitting, merging and partitioning never create or destroy mass

use approx::assert_relative_eq;
use soiln_core::layers::LayerState;
use soiln_core::parameters::{AmalgamationApproach, SoilNitrogenParameters};
use soiln_core::soil::SoilConditions;
use soiln_core::FloatValue;
use soiln_patches::commands::{AddPatchCommand, DepositionType, MergeCommand, NitrogenChange};
use soiln_patches::initialisation::SoilDescription;
use soiln_patches::{CallerKind, PatchManager, Solute};
use soiln_processes::{PotentialDecomposition, ResiduePotential};

fn description() -> SoilDescription {
    let mut soil = SoilDescription::uniform(4, 150.0, 1.3, 1.2);
    soil.organic_carbon = vec![2.0, 1.2, 0.6, 0.3];
    soil.no3 = vec![12.0, 8.0, 4.0, 2.0];
    soil.with_roots(800.0, 40.0)
}

fn manager(parameters: SoilNitrogenParameters) -> PatchManager {
    PatchManager::new(parameters, &description(), 0).unwrap()
}

fn weather(day: i64) -> SoilConditions {
    let temperature = 14.0 + 6.0 * ((day as FloatValue) / 15.0).sin();
    let sw = if day % 9 == 0 { 0.43 } else { 0.26 };
    SoilConditions::uniform(4, temperature, sw).with_root_depth(300.0)
}

fn total_area(m: &PatchManager) -> FloatValue {
    m.patches().iter().map(|p| p.area).sum()
}

fn urine(area: FloatValue, name: &str) -> AddPatchCommand {
    AddPatchCommand::new(DepositionType::ToNewPatch, area)
        .affecting_ids(vec![0])
        .named(name)
        .with_solute(Solute::Urea, vec![300.0, 100.0])
}

mod area_conservation {
    use super::*;

    #[test]
    fn test_areas_sum_to_one_through_lifecycle() {
        let mut m = manager(SoilNitrogenParameters::default());
        m.add_patch(&urine(0.1, "a")).unwrap();
        m.add_patch(&urine(0.2, "b")).unwrap();
        assert_relative_eq!(total_area(&m), 1.0, epsilon = 1e-12);

        let overlap = AddPatchCommand::new(DepositionType::NewOverlappingPatches, 0.05)
            .named("dung")
            .with_solute(Solute::NH4, vec![40.0]);
        m.add_patch(&overlap).unwrap();
        assert_eq!(m.n_patches(), 6);
        assert_relative_eq!(total_area(&m), 1.0, epsilon = 1e-12);

        m.merge_patches(&MergeCommand::of_names(&["a_0", "dung_1"]))
            .unwrap();
        assert_eq!(m.n_patches(), 5);
        assert_relative_eq!(total_area(&m), 1.0, epsilon = 1e-12);

        m.merge_patches(&MergeCommand::all()).unwrap();
        assert_eq!(m.n_patches(), 1);
        assert_relative_eq!(m.patches()[0].area, 1.0, epsilon = 1e-12);
    }
}

mod mass_conservation {
    use super::*;

    fn paddock_n(m: &PatchManager) -> FloatValue {
        m.paddock_total(LayerState::sum_total_n)
    }

    fn paddock_c(m: &PatchManager) -> FloatValue {
        m.paddock_total(LayerState::sum_total_c)
    }

    #[test]
    fn test_split_and_merge_conserve_mass() {
        let mut m = manager(SoilNitrogenParameters::default());
        let n_start = paddock_n(&m);
        let c_start = paddock_c(&m);

        let plain = AddPatchCommand::new(DepositionType::ToNewPatch, 0.3).affecting_ids(vec![0]);
        m.add_patch(&plain).unwrap();
        assert_relative_eq!(paddock_n(&m), n_start, max_relative = 1e-12);

        m.add_patch(&urine(0.1, "urine")).unwrap();
        let added = 0.1 * 400.0;
        assert_relative_eq!(paddock_n(&m), n_start + added, max_relative = 1e-12);

        m.merge_patches(&MergeCommand::all()).unwrap();
        assert_relative_eq!(paddock_n(&m), n_start + added, max_relative = 1e-12);
        assert_relative_eq!(paddock_c(&m), c_start, max_relative = 1e-12);
    }

    #[test]
    fn test_partitioned_exchange_matches_request() {
        let mut m = manager(SoilNitrogenParameters::default());
        m.add_patch(&urine(0.2, "urine")).unwrap();
        m.add_patch(
            &AddPatchCommand::new(DepositionType::ToNewPatch, 0.1)
                .affecting_ids(vec![0])
                .with_solute(Solute::NO3, vec![60.0, 30.0, 10.0]),
        )
        .unwrap();

        let before = m.solute(Solute::NO3);
        let uptake = vec![-3.0, -2.0, -1.0, 0.0];
        m.set_nitrogen_changed(&NitrogenChange::new(CallerKind::Plant).with_solute(Solute::NO3, uptake.clone()))
            .unwrap();
        let after = m.solute(Solute::NO3);
        for layer in 0..4 {
            assert_relative_eq!(after[layer] - before[layer], uptake[layer], epsilon = 1e-10);
        }

        let leaching = vec![-0.5, 0.3, 0.2, 0.0];
        m.set_solute_delta(Solute::NO3, CallerKind::Transport, &leaching)
            .unwrap();
        let moved = m.solute(Solute::NO3);
        for layer in 0..4 {
            assert_relative_eq!(moved[layer] - after[layer], leaching[layer], epsilon = 1e-10);
        }
        assert!(m
            .patches()
            .iter()
            .all(|p| p.state.no3.iter().all(|v| *v >= 0.0)));
    }

    /// The paddock balance closes daily while patches are created and merged.
    #[test]
    fn test_daily_balance_closes_with_patches() {
        for approach in [
            AmalgamationApproach::CompareAll,
            AmalgamationApproach::CompareBase,
            AmalgamationApproach::CompareMerge,
        ] {
            let mut parameters = SoilNitrogenParameters::default();
            parameters.patches.amalgamation_approach = approach;
            let mut m = manager(parameters);
            let residues = PotentialDecomposition::new(vec![ResiduePotential::new(
                "wheat", "wheat", 20.0, 0.4,
            )]);

            for day in 1..=90 {
                m.begin_day(day);
                let actual = m.run_day(&weather(day), &residues).unwrap();
                m.end_of_day().unwrap();

                let balance = m.balance();
                assert_relative_eq!(balance.nitrogen, -actual.total_n(), epsilon = 1e-7);
                assert_relative_eq!(balance.carbon, -actual.total_c(), epsilon = 1e-7);
                assert_relative_eq!(total_area(&m), 1.0, epsilon = 1e-10);

                if day % 30 == 10 {
                    m.add_patch(&urine(0.05, &format!("urine{day}"))).unwrap();
                }
            }
        }
    }

    #[test]
    fn test_identical_patches_merge_back() {
        let mut m = manager(SoilNitrogenParameters::default());
        let plain = AddPatchCommand::new(DepositionType::ToNewPatch, 0.3).affecting_ids(vec![0]);
        m.add_patch(&plain).unwrap();
        assert_eq!(m.n_patches(), 2);
        m.begin_day(1);
        m.run_day(&weather(1), &PotentialDecomposition::default())
            .unwrap();
        m.end_of_day().unwrap();
        assert_eq!(m.n_patches(), 1);
    }
}
