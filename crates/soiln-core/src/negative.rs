//! Three-tier negative-value policy.
//!
//! Every pool write made by the engine or the patch manager is passed
//! through [`NegativeValuePolicy::check`]:
//!
//! - below the fatal threshold: [`SoilNError::NegativePool`]
//! - below the warning threshold: reset to zero and log a warning
//! - any other negative value: reset to zero silently

use crate::errors::{SoilNError, SoilNResult};
use crate::parameters::NegativeValueThresholds;
use crate::FloatValue;
use log::warn;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NegativeValuePolicy {
    warning: FloatValue,
    fatal: FloatValue,
}

impl NegativeValuePolicy {
    pub fn new(thresholds: &NegativeValueThresholds) -> Self {
        Self {
            warning: thresholds.warning,
            fatal: thresholds.fatal,
        }
    }

    /// Check one value, clamping it to zero when it is a tolerable negative.
    pub fn check(
        &self,
        value: &mut FloatValue,
        layer: usize,
        variable: &str,
        method: &str,
    ) -> SoilNResult<()> {
        if *value >= 0.0 {
            return Ok(());
        }
        if *value < self.fatal {
            return Err(SoilNError::NegativePool {
                variable: variable.to_string(),
                layer,
                value: *value,
                threshold: self.fatal,
                method: method.to_string(),
            });
        }
        if *value < self.warning {
            warn!(
                "{}: attempt to change {}[{}] to a negative value ({}), value reset to zero",
                method, variable, layer, value
            );
        }
        *value = 0.0;
        Ok(())
    }

    /// Check every layer of a pool.
    pub fn check_layers(
        &self,
        values: &mut [FloatValue],
        variable: &str,
        method: &str,
    ) -> SoilNResult<()> {
        for (layer, value) in values.iter_mut().enumerate() {
            self.check(value, layer, variable, method)?;
        }
        Ok(())
    }
}

impl Default for NegativeValuePolicy {
    fn default() -> Self {
        Self::new(&NegativeValueThresholds::default())
    }
}
