//! Environmental Response Library
//!
//! Pure functions mapping soil temperature, moisture, pH, water-filled pore
//! space and C:N ratio to dimensionless limiting factors.
//!
//! Two parameter shapes are used:
//!
//! - [`TemperatureResponse`]: a three-parameter bent curve, given as a pair of
//!   values indexed by [`Condition`] (aerobic, anaerobic)
//! - [`ResponseTable`]: a piecewise-linear breakpoint table
//!
//! # Temperature factor
//!
//! $$T_0 = T_{opt} \frac{F_0^{1/n}}{F_0^{1/n} - 1}, \quad \beta = \frac{1}{T_{opt} - T_0}$$
//! $$f_T = \min\left(1, \left(\beta \max(0, T - T_0)\right)^n\right)$$
//!
//! # Moisture factor
//!
//! Soil water is first normalised to 0 (dry), 1 (LL15), 2 (DUL) and 3 (SAT)
//! by linear interpolation, then looked up in the table. Under anaerobic
//! conditions the factor is 1.

use crate::errors::{SoilNError, SoilNResult};
use crate::utils::interpolation::{divide, linear_interp};
use crate::FloatValue;
use serde::{Deserialize, Serialize};

/// Soil aeration state, which selects the parameter of each pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    Aerobic,
    /// A pond is active
    Anaerobic,
}

impl Condition {
    pub fn index(self) -> usize {
        match self {
            Condition::Aerobic => 0,
            Condition::Anaerobic => 1,
        }
    }

    /// Resolve a raw condition index, failing for anything but 0 or 1.
    pub fn from_index(index: usize) -> SoilNResult<Self> {
        match index {
            0 => Ok(Condition::Aerobic),
            1 => Ok(Condition::Anaerobic),
            other => Err(SoilNError::InvalidConditionIndex(other)),
        }
    }
}

/// A pair of values, one per [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConditionPair {
    pub aerobic: FloatValue,
    pub anaerobic: FloatValue,
}

impl ConditionPair {
    pub const fn new(aerobic: FloatValue, anaerobic: FloatValue) -> Self {
        Self { aerobic, anaerobic }
    }

    pub const fn same(value: FloatValue) -> Self {
        Self::new(value, value)
    }

    pub fn get(&self, condition: Condition) -> FloatValue {
        match condition {
            Condition::Aerobic => self.aerobic,
            Condition::Anaerobic => self.anaerobic,
        }
    }
}

/// Bent-curve temperature response parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TemperatureResponse {
    /// Temperature at which the factor reaches 1 (°C)
    pub optimum: ConditionPair,
    /// Factor value at 0 °C
    pub value_at_zero: ConditionPair,
    /// Curve exponent
    pub exponent: ConditionPair,
}

impl TemperatureResponse {
    pub const fn new(optimum: FloatValue, value_at_zero: FloatValue, exponent: FloatValue) -> Self {
        Self {
            optimum: ConditionPair::same(optimum),
            value_at_zero: ConditionPair::same(value_at_zero),
            exponent: ConditionPair::same(exponent),
        }
    }

    pub fn factor(&self, condition: Condition, temperature: FloatValue) -> FloatValue {
        temperature_factor(
            temperature,
            self.optimum.get(condition),
            self.value_at_zero.get(condition),
            self.exponent.get(condition),
        )
    }

    /// Same as [`TemperatureResponse::factor`] but from a raw condition index.
    pub fn factor_at_index(&self, index: usize, temperature: FloatValue) -> SoilNResult<FloatValue> {
        Ok(self.factor(Condition::from_index(index)?, temperature))
    }
}

/// Piecewise-linear breakpoint table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseTable {
    pub x: Vec<FloatValue>,
    pub y: Vec<FloatValue>,
}

impl ResponseTable {
    pub fn new(x: Vec<FloatValue>, y: Vec<FloatValue>) -> Self {
        Self { x, y }
    }

    pub fn value(&self, x: FloatValue) -> FloatValue {
        linear_interp(x, &self.x, &self.y)
    }

    /// Check that the table is usable: same length, non-empty, ascending x.
    pub fn validate(&self, name: &str) -> SoilNResult<()> {
        if self.x.is_empty() || self.x.len() != self.y.len() {
            return Err(SoilNError::Configuration(format!(
                "{name}: table needs matching, non-empty x and y ({} vs {})",
                self.x.len(),
                self.y.len()
            )));
        }
        if self.x.windows(2).any(|w| w[1] < w[0]) {
            return Err(SoilNError::Configuration(format!(
                "{name}: x breakpoints must be ascending"
            )));
        }
        Ok(())
    }
}

/// Bent-curve temperature factor (0-1).
pub fn temperature_factor(
    temperature: FloatValue,
    optimum: FloatValue,
    value_at_zero: FloatValue,
    exponent: FloatValue,
) -> FloatValue {
    let aux = value_at_zero.powf(1.0 / exponent);
    if (aux - 1.0).abs() <= FloatValue::EPSILON {
        // flat curve
        return 1.0;
    }
    let t_zero = optimum * aux / (aux - 1.0);
    let beta = 1.0 / (optimum - t_zero);
    let factor = (beta * (temperature - t_zero).max(0.0)).powf(exponent).min(1.0);
    if factor.is_nan() {
        0.0
    } else {
        factor.max(0.0)
    }
}

/// Soil water normalised to 0 (dry), 1 (LL15), 2 (DUL) and 3 (SAT).
pub fn normalised_water(sw: FloatValue, ll15: FloatValue, dul: FloatValue, sat: FloatValue) -> FloatValue {
    linear_interp(sw, &[0.0, ll15, dul, sat], &[0.0, 1.0, 2.0, 3.0])
}

/// Moisture factor; 1 under anaerobic conditions.
pub fn moisture_factor(
    table: &ResponseTable,
    condition: Condition,
    sw: FloatValue,
    ll15: FloatValue,
    dul: FloatValue,
    sat: FloatValue,
) -> FloatValue {
    match condition {
        Condition::Aerobic => table.value(normalised_water(sw, ll15, dul, sat)),
        Condition::Anaerobic => 1.0,
    }
}

/// Moisture factor from a raw condition index, failing fast on anything but 0 or 1.
pub fn moisture_factor_at_index(
    table: &ResponseTable,
    index: usize,
    sw: FloatValue,
    ll15: FloatValue,
    dul: FloatValue,
    sat: FloatValue,
) -> SoilNResult<FloatValue> {
    Ok(moisture_factor(
        table,
        Condition::from_index(index)?,
        sw,
        ll15,
        dul,
        sat,
    ))
}

/// Water-filled pore space factor; 1 under anaerobic conditions.
///
/// This follows the table directly and may exceed 1 when the table does.
pub fn wfps_factor(table: &ResponseTable, condition: Condition, wfps: FloatValue) -> FloatValue {
    match condition {
        Condition::Aerobic => table.value(wfps),
        Condition::Anaerobic => 1.0,
    }
}

pub fn ph_factor(table: &ResponseTable, ph: FloatValue) -> FloatValue {
    table.value(ph)
}

/// C:N ratio factor for fresh organic matter decomposition (0-1).
///
/// `cnr = fom_c / (fom_n + mineral_n)`, with mineral N floored at zero, and
/// the factor decays exponentially once `cnr` exceeds `optimum`.
pub fn cn_ratio_factor(
    fom_c: FloatValue,
    fom_n: FloatValue,
    mineral_n: FloatValue,
    optimum: FloatValue,
    rate: FloatValue,
) -> FloatValue {
    let cnr = divide(fom_c, fom_n + mineral_n.max(0.0), 0.0);
    num::clamp((-rate * (cnr - optimum) / optimum).exp(), 0.0, 1.0)
}
