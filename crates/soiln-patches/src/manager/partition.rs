//! Splitting a paddock-level solute delta between patches.
//!
//! For each layer $i$ with a non-zero delta $\delta_i$, patch $k$ receives
//!
//! $$\delta_{k,i} = \frac{\delta_i \, w_{k,i}}{A_k}, \quad w_{k,i} = \frac{S_{k,i} A_k}{\sum_j S_{j,i} A_j}$$
//!
//! where $S_{k,i}$ is either the amount in layer $i$ (layer concentration) or
//! the amount from layer $i$ up to the surface, optionally limited to a
//! thickness (soil concentration). The area-weighted sum of the patch deltas
//! equals $\delta_i$.

use super::solutes::Solute;
use soiln_core::errors::{SoilNError, SoilNResult};
use soiln_core::parameters::PartitionApproach;
use soiln_core::soil::SoilProfile;
use soiln_core::{FloatValue, EPSILON};

/// Amount weighting each patch for one layer, times the patch area.
fn weighted_amount(
    amounts: &[FloatValue],
    area: FloatValue,
    layer: usize,
    use_layer: bool,
    profile: &SoilProfile,
    cutoff: FloatValue,
) -> FloatValue {
    if use_layer {
        return amounts[layer] * area;
    }
    let mut total = 0.0;
    let mut thickness = 0.0;
    for z in (0..=layer).rev() {
        total += amounts[z];
        thickness += profile.thickness[z];
        if cutoff > EPSILON && thickness >= cutoff {
            break;
        }
    }
    total * area
}

/// Split `delta` (kg/ha, per layer) between patches.
///
/// `amounts[k]` is the solute in patch `k` used for weighting and `areas[k]`
/// its relative area. Returns one delta per patch per layer. When no patch
/// holds any of the solute in a layer, an addition is split by area alone.
pub fn partition_delta(
    solute: Solute,
    amounts: &[Vec<FloatValue>],
    areas: &[FloatValue],
    delta: &[FloatValue],
    profile: &SoilProfile,
    approach: PartitionApproach,
    cutoff: FloatValue,
) -> SoilNResult<Vec<Vec<FloatValue>>> {
    let n_patches = amounts.len();
    let n_layers = profile.n_layers();
    for values in amounts {
        if values.len() != n_layers {
            return Err(SoilNError::LayerMismatch {
                variable: solute.name().to_string(),
                expected: n_layers,
                actual: values.len(),
            });
        }
    }

    let mut result = vec![vec![0.0; n_layers]; n_patches];
    let total_area: FloatValue = areas.iter().sum();

    for (layer, &layer_delta) in delta.iter().enumerate().take(n_layers) {
        if layer_delta.abs() <= EPSILON {
            continue;
        }
        let use_layer = match approach {
            PartitionApproach::BasedOnLayerConcentration => true,
            PartitionApproach::BasedOnSoilConcentration => false,
            PartitionApproach::BasedOnConcentrationAndDelta => layer_delta < EPSILON,
        };

        let patch_amounts: Vec<FloatValue> = amounts
            .iter()
            .zip(areas)
            .map(|(values, &area)| weighted_amount(values, area, layer, use_layer, profile, cutoff))
            .collect();
        let total: FloatValue = patch_amounts.iter().sum();

        if total + layer_delta < -EPSILON {
            return Err(SoilNError::PartitionShortfall {
                solute: solute.name().to_string(),
                layer,
                delta: layer_delta,
            });
        }

        for k in 0..n_patches {
            let weight = if total >= EPSILON {
                patch_amounts[k] / total
            } else {
                areas[k] / total_area
            };
            result[k][layer] = if areas[k] > 0.0 {
                layer_delta * weight / areas[k]
            } else {
                0.0
            };
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;

    fn profile() -> SoilProfile {
        SoilProfile::uniform(3, 100.0, 1.3)
    }

    // ===== Layer Concentration Tests =====

    #[test]
    fn test_layer_concentration_split() {
        let amounts = vec![vec![2.0, 0.0, 0.0], vec![8.0, 0.0, 0.0]];
        let result = partition_delta(
            Solute::NO3,
            &amounts,
            &[0.5, 0.5],
            &[10.0, 0.0, 0.0],
            &profile(),
            PartitionApproach::BasedOnLayerConcentration,
            0.0,
        )
        .unwrap();
        assert!(is_close!(result[0][0], 4.0));
        assert!(is_close!(result[1][0], 16.0));
        assert_eq!(result[0][1], 0.0);
    }

    #[test]
    fn test_area_weighted_sum_equals_delta() {
        let amounts = vec![
            vec![30.0, 10.0, 40.0],
            vec![10.0, 50.0, 90.0],
            vec![20.0, 60.0, 50.0],
        ];
        let areas = [0.2, 0.3, 0.5];
        let delta = [-2.5, 1.5, 3.0];
        let result = partition_delta(
            Solute::NH4,
            &amounts,
            &areas,
            &delta,
            &profile(),
            PartitionApproach::BasedOnConcentrationAndDelta,
            0.0,
        )
        .unwrap();
        for layer in 0..3 {
            let sum: FloatValue = (0..3).map(|k| result[k][layer] * areas[k]).sum();
            assert!(is_close!(sum, delta[layer]));
        }
    }

    // ===== Soil Concentration Tests =====

    #[test]
    fn test_soil_concentration_sums_to_surface() {
        // layer 2 weights: patch 0 = 1 + 1 + 1, patch 1 = 0 + 0 + 3
        let amounts = vec![vec![1.0, 1.0, 1.0], vec![0.0, 0.0, 3.0]];
        let result = partition_delta(
            Solute::NO3,
            &amounts,
            &[0.5, 0.5],
            &[0.0, 0.0, 6.0],
            &profile(),
            PartitionApproach::BasedOnSoilConcentration,
            0.0,
        )
        .unwrap();
        assert!(is_close!(result[0][2], 6.0));
        assert!(is_close!(result[1][2], 6.0));
    }

    #[test]
    fn test_soil_concentration_cutoff() {
        // with a 100 mm cutoff only layer 2 itself is used
        let amounts = vec![vec![1.0, 1.0, 1.0], vec![0.0, 0.0, 3.0]];
        let result = partition_delta(
            Solute::NO3,
            &amounts,
            &[0.5, 0.5],
            &[0.0, 0.0, 8.0],
            &profile(),
            PartitionApproach::BasedOnSoilConcentration,
            100.0,
        )
        .unwrap();
        assert!(is_close!(result[0][2], 4.0));
        assert!(is_close!(result[1][2], 12.0));
    }

    #[test]
    fn test_concentration_and_delta_uses_layer_for_removal() {
        let amounts = vec![vec![4.0, 1.0, 0.0], vec![0.0, 1.0, 0.0]];
        let result = partition_delta(
            Solute::NH4,
            &amounts,
            &[0.5, 0.5],
            &[0.0, -1.0, 0.0],
            &profile(),
            PartitionApproach::BasedOnConcentrationAndDelta,
            0.0,
        )
        .unwrap();
        assert!(is_close!(result[0][1], -1.0));
        assert!(is_close!(result[1][1], -1.0));
    }

    // ===== Edge Case Tests =====

    #[test]
    fn test_removal_exceeding_content_fails() {
        let amounts = vec![vec![1.0, 0.0, 0.0], vec![1.0, 0.0, 0.0]];
        let result = partition_delta(
            Solute::Urea,
            &amounts,
            &[0.5, 0.5],
            &[-2.0, 0.0, 0.0],
            &profile(),
            PartitionApproach::BasedOnLayerConcentration,
            0.0,
        );
        assert!(matches!(
            result,
            Err(SoilNError::PartitionShortfall { layer: 0, .. })
        ));
    }

    #[test]
    fn test_addition_to_empty_layer_split_by_area() {
        let amounts = vec![vec![0.0; 3], vec![0.0; 3]];
        let result = partition_delta(
            Solute::NO3,
            &amounts,
            &[0.25, 0.75],
            &[2.0, 0.0, 0.0],
            &profile(),
            PartitionApproach::BasedOnLayerConcentration,
            0.0,
        )
        .unwrap();
        assert!(is_close!(result[0][0], 2.0));
        assert!(is_close!(result[1][0], 2.0));
    }
}
