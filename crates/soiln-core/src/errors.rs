use thiserror::Error;

use crate::FloatValue;

/// Fatal conditions raised while simulating a day.
///
/// Recoverable situations (an unknown patch name, an incomplete FOM payload)
/// are logged and skipped instead, so everything here aborts the day.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SoilNError {
    #[error("{method}: attempt to change {variable}[{layer}] to a value ({value}) below the fatal threshold ({threshold})")]
    NegativePool {
        variable: String,
        layer: usize,
        value: FloatValue,
        threshold: FloatValue,
        method: String,
    },
    #[error("{process}: immobilisation demand in layer {layer} could not be met (remaining {remaining})")]
    ImmobilisationShortfall {
        process: String,
        layer: usize,
        remaining: FloatValue,
    },
    #[error("Invalid condition index {0}, expected 0 (aerobic) or 1 (anaerobic)")]
    InvalidConditionIndex(usize),
    #[error("The solute {0} is not recognised")]
    UnknownSolute(String),
    #[error("Unrecognised deposition type '{0}'")]
    UnknownDepositionType(String),
    #[error("Unrecognised {kind} '{value}'")]
    UnknownOption { kind: String, value: String },
    #[error("Invalid patch area: {0}")]
    InvalidPatchArea(String),
    #[error("The merge of patch {merged} into patch {receiver} resulted in area greater than one ({area})")]
    MergeAreaExceeded {
        receiver: usize,
        merged: usize,
        area: FloatValue,
    },
    #[error("Attempt to change {solute}[{layer}] to a negative value while partitioning a delta of {delta}")]
    PartitionShortfall {
        solute: String,
        layer: usize,
        delta: FloatValue,
    },
    #[error("Expected {expected} layers for {variable}, got {actual}")]
    LayerMismatch {
        variable: String,
        expected: usize,
        actual: usize,
    },
    #[error("Patch index {0} is out of range")]
    PatchOutOfRange(usize),
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

/// Convenience type for `Result<T, SoilNError>`.
pub type SoilNResult<T> = Result<T, SoilNError>;
