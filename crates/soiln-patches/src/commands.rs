//! Requests made to the patch manager by other models and by management.
//!
//! All amounts are per layer in kg/ha. Every command can be built in code or
//! deserialised, e.g. from a JSON management schedule.

use crate::manager::solutes::{CallerKind, Solute};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use soiln_core::errors::SoilNError;
use soiln_core::{FloatValue, FOM_POOLS};
use std::str::FromStr;

/// Where the contents of an add-patch command go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DepositionType {
    /// No new patch; the payload is added to every patch
    #[default]
    ToAllPaddock,
    /// No new patch; the payload is added to the selected patches
    ToSpecificPatch,
    /// The selected patches are split and the payload added to the new parts
    ToNewPatch,
    /// Every patch is split and the payload added to the new parts
    NewOverlappingPatches,
}

impl DepositionType {
    /// Whether the command creates patches.
    pub fn creates_patches(&self) -> bool {
        matches!(
            self,
            DepositionType::ToNewPatch | DepositionType::NewOverlappingPatches
        )
    }
}

impl FromStr for DepositionType {
    type Err = SoilNError;

    /// An empty string means [`DepositionType::ToAllPaddock`].
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "toallpaddock" => Ok(DepositionType::ToAllPaddock),
            "tospecificpatch" => Ok(DepositionType::ToSpecificPatch),
            "tonewpatch" => Ok(DepositionType::ToNewPatch),
            "newoverlappingpatches" => Ok(DepositionType::NewOverlappingPatches),
            _ => Err(SoilNError::UnknownDepositionType(raw.to_string())),
        }
    }
}

/// Add mineral N and organic matter to the paddock, optionally creating patches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddPatchCommand {
    pub deposition: DepositionType,
    /// Relative area of the new patches (0-1)
    pub area: FloatValue,
    /// Patches affected, by index
    pub affected_ids: Vec<usize>,
    /// Patches affected, by name
    pub affected_names: Vec<String>,
    /// Base name of the new patches
    pub name: String,
    pub sender: CallerKind,
    pub urea: Vec<FloatValue>,
    pub nh4: Vec<FloatValue>,
    pub no3: Vec<FloatValue>,
    /// FOM C added, `(pool, layer)`
    pub fom_c: Option<Array2<FloatValue>>,
    /// FOM N added, `(pool, layer)`
    pub fom_n: Option<Array2<FloatValue>>,
}

impl Default for AddPatchCommand {
    fn default() -> Self {
        Self {
            deposition: DepositionType::ToAllPaddock,
            area: 0.0,
            affected_ids: Vec::new(),
            affected_names: Vec::new(),
            name: String::new(),
            sender: CallerKind::Other,
            urea: Vec::new(),
            nh4: Vec::new(),
            no3: Vec::new(),
            fom_c: None,
            fom_n: None,
        }
    }
}

impl AddPatchCommand {
    pub fn new(deposition: DepositionType, area: FloatValue) -> Self {
        Self {
            deposition,
            area,
            ..Default::default()
        }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn affecting_ids(mut self, ids: Vec<usize>) -> Self {
        self.affected_ids = ids;
        self
    }

    pub fn affecting_names(mut self, names: &[&str]) -> Self {
        self.affected_names = names.iter().map(|n| n.to_string()).collect();
        self
    }

    pub fn from_sender(mut self, sender: CallerKind) -> Self {
        self.sender = sender;
        self
    }

    pub fn with_solute(mut self, solute: Solute, values: Vec<FloatValue>) -> Self {
        match solute {
            Solute::Urea => self.urea = values,
            Solute::NH4 => self.nh4 = values,
            Solute::NO3 => self.no3 = values,
        }
        self
    }

    pub fn with_fom(mut self, fom_c: Array2<FloatValue>, fom_n: Array2<FloatValue>) -> Self {
        self.fom_c = Some(fom_c);
        self.fom_n = Some(fom_n);
        self
    }

    pub fn solute(&self, solute: Solute) -> &[FloatValue] {
        match solute {
            Solute::Urea => &self.urea,
            Solute::NH4 => &self.nh4,
            Solute::NO3 => &self.no3,
        }
    }

    /// Problems that make the command impossible to carry out.
    ///
    /// These are not fatal: the command is skipped with a warning.
    pub fn invalid_reason(&self) -> Option<&'static str> {
        let no_selection = self.affected_ids.is_empty() && self.affected_names.is_empty();
        match self.deposition {
            DepositionType::ToNewPatch if no_selection => {
                Some("no valid patch was given as base for the new one")
            }
            DepositionType::ToSpecificPatch if no_selection => {
                Some("no valid patch was given to receive the additions")
            }
            DepositionType::ToNewPatch | DepositionType::NewOverlappingPatches
                if self.area <= 0.0 =>
            {
                Some("no valid area fraction was given for the new patch")
            }
            _ => None,
        }
    }
}

/// Merge a list of patches, or all of them, into the first one listed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MergeCommand {
    pub ids: Vec<usize>,
    pub names: Vec<String>,
    pub merge_all: bool,
}

impl MergeCommand {
    pub fn all() -> Self {
        Self {
            merge_all: true,
            ..Default::default()
        }
    }

    pub fn of_ids(ids: Vec<usize>) -> Self {
        Self {
            ids,
            ..Default::default()
        }
    }

    pub fn of_names(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }
}

/// Changes in mineral N made by another model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NitrogenChange {
    pub sender: CallerKind,
    #[serde(default)]
    pub urea: Vec<FloatValue>,
    #[serde(default)]
    pub nh4: Vec<FloatValue>,
    #[serde(default)]
    pub no3: Vec<FloatValue>,
}

impl NitrogenChange {
    pub fn new(sender: CallerKind) -> Self {
        Self {
            sender,
            urea: Vec::new(),
            nh4: Vec::new(),
            no3: Vec::new(),
        }
    }

    pub fn with_solute(mut self, solute: Solute, values: Vec<FloatValue>) -> Self {
        match solute {
            Solute::Urea => self.urea = values,
            Solute::NH4 => self.nh4 = values,
            Solute::NO3 => self.no3 = values,
        }
        self
    }

    pub fn solute(&self, solute: Solute) -> &[FloatValue] {
        match solute {
            Solute::Urea => &self.urea,
            Solute::NH4 => &self.nh4,
            Solute::NO3 => &self.no3,
        }
    }
}

/// Organic matter added to one layer as a single amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FomLayer {
    /// Dry matter (kg/ha)
    pub amount: FloatValue,
    /// N content (kg/ha), ignored when `cn_ratio` is given
    pub n: FloatValue,
    pub cn_ratio: FloatValue,
}

/// Organic matter incorporated into the soil, split into pools by FOM type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FomIncorporation {
    pub fom_type: String,
    pub layers: Vec<FomLayer>,
}

/// C and N of one FOM pool (kg/ha).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FomPoolAmount {
    pub c: FloatValue,
    pub n: FloatValue,
}

/// Organic matter and mineral N added to one layer, already split into pools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FomPoolLayer {
    pub nh4: FloatValue,
    pub no3: FloatValue,
    pub pools: [FomPoolAmount; FOM_POOLS],
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FomPoolIncorporation {
    pub layers: Vec<FomPoolLayer>,
}
