//! Surface residue decomposition
//!
//! The residue model supplies the potential C and N decomposition of each
//! residue. Here that potential is checked against the mineral N available
//! down to the decomposition depth $z_d$, and the realised C is added to the
//! biomass and humus pools of the layers within $z_d$.
//!
//! # Algorithm
//!
//! 1. Potential transfers per residue:
//!    $C_{biom} = C_{pot}(1 - r)f_b$ and $C_{hum} = C_{pot}(1 - r)(1 - f_b)$
//! 2. N demand of the transfers:
//!    $$N_d = \frac{\sum C_{biom}}{CN_{biom}} + \sum_i \frac{\sum C_{hum} \, w_i}{CN_{hum,i}}, \quad w_i = \frac{\Delta z_i \, \phi_i}{z_d}$$
//!    where $\phi_i$ is the fraction of layer $i$ above $z_d$
//! 3. When $N_d$ exceeds the mineral N plus the residue N, decomposition is
//!    reduced by $RF = \mathrm{clamp}(N_{min} / (N_d - \sum N_{pot}), 0, 1)$
//! 4. Net mineralisation goes to NH4 by $w_i$; net immobilisation is drawn
//!    from NH4 then NO3, layer by layer
//!
//! With an active pond the pond model has already broken the residues down,
//! and its biomass and humus C are added to the top layer without an N check.

use log::debug;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use soiln_core::errors::{SoilNError, SoilNResult};
use soiln_core::layers::LayerState;
use soiln_core::parameters::ResidueParameters;
use soiln_core::soil::{SoilConditions, SoilProfile};
use soiln_core::utils::interpolation::divide;
use soiln_core::{FloatValue, EPSILON};

/// Potential decomposition of one surface residue (kg/ha, profile totals).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResiduePotential {
    pub name: String,
    pub residue_type: String,
    pub c: FloatValue,
    pub n: FloatValue,
    pub p: FloatValue,
}

impl ResiduePotential {
    pub fn new(name: &str, residue_type: &str, c: FloatValue, n: FloatValue) -> Self {
        Self {
            name: name.to_string(),
            residue_type: residue_type.to_string(),
            c,
            n,
            p: 0.0,
        }
    }
}

/// Request from the residue model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PotentialDecomposition {
    pub residues: Vec<ResiduePotential>,
}

impl PotentialDecomposition {
    pub fn new(residues: Vec<ResiduePotential>) -> Self {
        Self { residues }
    }

    pub fn is_empty(&self) -> bool {
        self.residues.is_empty()
    }

    pub fn total_c(&self) -> FloatValue {
        self.residues.iter().map(|r| r.c).sum()
    }

    pub fn total_n(&self) -> FloatValue {
        self.residues.iter().map(|r| r.n).sum()
    }
}

/// Realised decomposition of one residue (kg/ha).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResidueActual {
    pub name: String,
    pub residue_type: String,
    pub c: FloatValue,
    pub n: FloatValue,
}

/// Reply to the residue model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActualDecomposition {
    pub residues: Vec<ResidueActual>,
}

impl ActualDecomposition {
    /// Zero decomposition for every residue of a request.
    pub fn none(request: &PotentialDecomposition) -> Self {
        Self {
            residues: request
                .residues
                .iter()
                .map(|r| ResidueActual {
                    name: r.name.clone(),
                    residue_type: r.residue_type.clone(),
                    c: 0.0,
                    n: 0.0,
                })
                .collect(),
        }
    }

    /// Sum over layers of the per-layer decomposition recorded in the fluxes.
    fn from_fluxes(request: &PotentialDecomposition, state: &LayerState) -> Self {
        let mut actual = Self::none(request);
        for (r, residue) in actual.residues.iter_mut().enumerate() {
            let c: FloatValue = state.fluxes.c_decomp.row(r).sum();
            let n: FloatValue = state.fluxes.n_decomp.row(r).sum();
            residue.c = if c < EPSILON { 0.0 } else { c };
            residue.n = if n < EPSILON { 0.0 } else { n };
        }
        actual
    }

    /// Add another patch's decomposition, weighted by its relative area.
    pub fn accumulate(&mut self, other: &Self, area: FloatValue) {
        for (a, b) in self.residues.iter_mut().zip(&other.residues) {
            a.c += b.c * area;
            a.n += b.n * area;
        }
    }

    pub fn total_c(&self) -> FloatValue {
        self.residues.iter().map(|r| r.c).sum()
    }

    pub fn total_n(&self) -> FloatValue {
        self.residues.iter().map(|r| r.n).sum()
    }
}

/// Residue decomposition component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResidueDecomposition {
    parameters: ResidueParameters,
    biomass_cn_ratio: FloatValue,
}

impl ResidueDecomposition {
    pub fn from_parameters(parameters: ResidueParameters, biomass_cn_ratio: FloatValue) -> Self {
        Self {
            parameters,
            biomass_cn_ratio,
        }
    }

    /// Decompose today's residues into one patch.
    pub fn solve(
        &self,
        profile: &SoilProfile,
        conditions: &SoilConditions,
        request: &PotentialDecomposition,
        state: &mut LayerState,
    ) -> SoilNResult<ActualDecomposition> {
        let n_layers = state.n_layers();
        let fluxes = &mut state.fluxes;
        for values in [
            &mut fluxes.c_res_to_biom,
            &mut fluxes.c_res_to_hum,
            &mut fluxes.c_res_to_atm,
            &mut fluxes.res_nh4_min,
            &mut fluxes.res_no3_min,
        ] {
            values.iter_mut().for_each(|v| *v = 0.0);
        }
        fluxes.c_decomp = Array2::zeros((request.residues.len(), n_layers));
        fluxes.n_decomp = Array2::zeros((request.residues.len(), n_layers));

        let actual = match conditions.pond {
            Some(pond) => {
                state.fluxes.c_res_to_biom[0] += pond.biom_c;
                state.fluxes.c_res_to_hum[0] += pond.hum_c;
                ActualDecomposition::none(request)
            }
            None => {
                self.partition(profile, request, state)?;
                ActualDecomposition::from_fluxes(request, state)
            }
        };

        let added: FloatValue = state.fluxes.c_res_to_biom.iter().sum::<FloatValue>()
            + state.fluxes.c_res_to_hum.iter().sum::<FloatValue>();
        if added >= EPSILON {
            for layer in 0..n_layers {
                state.biom_c[layer] += state.fluxes.c_res_to_biom[layer];
                state.hum_c[layer] += state.fluxes.c_res_to_hum[layer];
                state.hum_n[layer] = divide(state.hum_c[layer], profile.humus_cn_ratio[layer], 0.0);
                state.biom_n[layer] = divide(state.biom_c[layer], self.biomass_cn_ratio, 0.0);
                state.nh4[layer] += state.fluxes.res_nh4_min[layer];
                state.no3[layer] += state.fluxes.res_no3_min[layer];
            }
        }
        Ok(actual)
    }

    /// Fill the residue fluxes, limited by the mineral N available.
    fn partition(
        &self,
        profile: &SoilProfile,
        request: &PotentialDecomposition,
        state: &mut LayerState,
    ) -> SoilNResult<()> {
        let p = &self.parameters;
        let depth = p.decomposition_depth;
        let deepest = profile.cumulative_index(depth);
        let frac = profile.fraction_layer(depth);

        let retained = 1.0 - p.respiration_factor;
        let into_biom: Vec<FloatValue> = request
            .residues
            .iter()
            .map(|r| r.c * retained * p.fraction_into_biomass)
            .collect();
        let into_hum: Vec<FloatValue> = request
            .residues
            .iter()
            .map(|r| r.c * retained * (1.0 - p.fraction_into_biomass))
            .collect();
        let sum_biom: FloatValue = into_biom.iter().sum();
        let sum_hum: FloatValue = into_hum.iter().sum();
        let pot_n = request.total_n();

        let weights: Vec<FloatValue> = (0..=deepest)
            .map(|i| divide(profile.thickness[i] * frac[i], depth, 0.0))
            .collect();
        let nh4_available: Vec<FloatValue> =
            (0..=deepest).map(|i| state.nh4[i].max(0.0) * frac[i]).collect();
        let no3_available: Vec<FloatValue> =
            (0..=deepest).map(|i| state.no3[i].max(0.0) * frac[i]).collect();
        let mineral_available: FloatValue =
            nh4_available.iter().sum::<FloatValue>() + no3_available.iter().sum::<FloatValue>();

        let mut demand = divide(sum_biom, self.biomass_cn_ratio, 0.0);
        for (i, w) in weights.iter().enumerate() {
            demand += divide(sum_hum * w, profile.humus_cn_ratio[i], 0.0);
        }

        let mut reduction = 1.0;
        if demand > mineral_available + pot_n {
            reduction = num::clamp(divide(mineral_available, demand - pot_n, 0.0), 0.0, 1.0);
            debug!(
                "residue decomposition limited by mineral N: demand {:.4}, available {:.4}, factor {:.4}",
                demand,
                mineral_available + pot_n,
                reduction
            );
        }

        let fluxes = &mut state.fluxes;
        let mut n_decomposed = 0.0;
        for (i, w) in weights.iter().enumerate() {
            for (r, residue) in request.residues.iter().enumerate() {
                fluxes.c_decomp[[r, i]] = residue.c * reduction * w;
                fluxes.n_decomp[[r, i]] = residue.n * reduction * w;
                n_decomposed += fluxes.n_decomp[[r, i]];
                fluxes.c_res_to_biom[i] += into_biom[r] * reduction * w;
                fluxes.c_res_to_hum[i] += into_hum[r] * reduction * w;
                fluxes.c_res_to_atm[i] += residue.c * p.respiration_factor.max(0.0) * reduction * w;
            }
        }

        let mut remaining = n_decomposed - demand * reduction;
        if remaining > EPSILON {
            for (i, w) in weights.iter().enumerate() {
                fluxes.res_nh4_min[i] = remaining * w;
            }
        } else if remaining < -EPSILON {
            for (i, available) in nh4_available.iter().enumerate() {
                fluxes.res_nh4_min[i] = -available.min(remaining.abs());
                remaining -= fluxes.res_nh4_min[i];
            }
            for (i, available) in no3_available.iter().enumerate() {
                fluxes.res_no3_min[i] = -available.min(remaining.abs());
                remaining -= fluxes.res_no3_min[i];
            }
            if remaining.abs() >= EPSILON {
                return Err(SoilNError::ImmobilisationShortfall {
                    process: "residue decomposition".to_string(),
                    layer: deepest,
                    remaining,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use is_close::is_close;
    use soiln_core::soil::PondInputs;

    fn profile() -> SoilProfile {
        SoilProfile::uniform(3, 100.0, 1.2)
    }

    fn state(nh4: FloatValue, no3: FloatValue) -> LayerState {
        let mut state = LayerState::zeros(3);
        state.nh4 = vec![nh4; 3];
        state.no3 = vec![no3; 3];
        state.hum_c = vec![10000.0; 3];
        state.hum_n = vec![1000.0; 3];
        state.biom_c = vec![200.0; 3];
        state.biom_n = vec![25.0; 3];
        state
    }

    fn component() -> ResidueDecomposition {
        ResidueDecomposition::from_parameters(ResidueParameters::default(), 8.0)
    }

    // ===== Partition Tests =====

    #[test]
    fn test_residue_carbon_goes_to_top_layer() {
        let profile = profile();
        let conditions = SoilConditions::uniform(3, 20.0, 0.3);
        let request = PotentialDecomposition::new(vec![ResiduePotential::new("wheat", "wheat", 10.0, 0.5)]);
        let mut s = state(10.0, 10.0);

        let actual = component().solve(&profile, &conditions, &request, &mut s).unwrap();

        // decomposition depth 100 mm equals the first layer
        assert!(is_close!(s.fluxes.c_res_to_biom[0], 10.0 * 0.4 * 0.9));
        assert!(is_close!(s.fluxes.c_res_to_hum[0], 10.0 * 0.4 * 0.1));
        assert!(is_close!(s.fluxes.c_res_to_atm[0], 6.0));
        assert_eq!(s.fluxes.c_res_to_biom[1], 0.0);
        assert!(is_close!(actual.total_c(), 10.0));
        assert!(is_close!(actual.total_n(), 0.5));
        assert_eq!(actual.residues[0].name, "wheat");
    }

    #[test]
    fn test_immobilisation_drawn_from_mineral_n() {
        let profile = profile();
        let conditions = SoilConditions::uniform(3, 20.0, 0.3);
        // wide C:N residue needs N from the soil
        let request = PotentialDecomposition::new(vec![ResiduePotential::new("straw", "wheat", 100.0, 0.5)]);
        let mut s = state(10.0, 10.0);
        let n_before = s.nh4[0] + s.no3[0];

        component().solve(&profile, &conditions, &request, &mut s).unwrap();

        let demand = 100.0 * 0.4 * 0.9 / 8.0 + 100.0 * 0.4 * 0.1 / 10.0;
        assert!(is_close!(s.fluxes.res_nh4_min[0], -(demand - 0.5)));
        assert!(is_close!(n_before - (s.nh4[0] + s.no3[0]), demand - 0.5));
        assert_eq!(s.fluxes.res_no3_min[0], 0.0);
    }

    #[test]
    fn test_reduction_when_mineral_n_is_short() {
        let profile = profile();
        let conditions = SoilConditions::uniform(3, 20.0, 0.3);
        let request = PotentialDecomposition::new(vec![ResiduePotential::new("straw", "wheat", 1000.0, 1.0)]);
        let mut s = state(1.0, 1.0);

        let actual = component().solve(&profile, &conditions, &request, &mut s).unwrap();

        assert!(actual.total_c() < 1000.0);
        assert!(s.nh4[0].abs() < 1e-9);
        assert!(s.no3[0].abs() < 1e-9);
    }

    #[test]
    fn test_no_residues_no_change() {
        let profile = profile();
        let conditions = SoilConditions::uniform(3, 20.0, 0.3);
        let mut s = state(10.0, 10.0);
        let before = s.clone();
        let actual = component()
            .solve(&profile, &conditions, &PotentialDecomposition::default(), &mut s)
            .unwrap();
        assert!(actual.residues.is_empty());
        assert_eq!(s.nh4, before.nh4);
        assert_eq!(s.hum_c, before.hum_c);
    }

    // ===== Pond Tests =====

    #[test]
    fn test_pond_adds_carbon_to_top_layer() {
        let profile = profile();
        let conditions = SoilConditions::uniform(3, 20.0, 0.45).with_pond(PondInputs {
            biom_c: 2.0,
            hum_c: 1.0,
        });
        let request = PotentialDecomposition::new(vec![ResiduePotential::new("rice", "rice", 10.0, 0.5)]);
        let mut s = state(10.0, 10.0);

        let actual = component().solve(&profile, &conditions, &request, &mut s).unwrap();

        assert!(is_close!(s.biom_c[0], 202.0));
        assert!(is_close!(s.hum_c[0], 10001.0));
        assert!(is_close!(s.biom_n[0], 202.0 / 8.0));
        assert_eq!(actual.total_c(), 0.0);
    }

    // ===== Aggregation Tests =====

    #[test]
    fn test_accumulate_area_weighted() {
        let request = PotentialDecomposition::new(vec![ResiduePotential::new("a", "wheat", 1.0, 0.1)]);
        let mut total = ActualDecomposition::none(&request);
        let mut patch = ActualDecomposition::none(&request);
        patch.residues[0].c = 2.0;
        patch.residues[0].n = 0.2;
        total.accumulate(&patch, 0.25);
        total.accumulate(&patch, 0.75);
        assert!(is_close!(total.residues[0].c, 2.0));
        assert!(is_close!(total.residues[0].n, 0.2));
    }
}
