use soiln_core::response::{
    moisture_factor, ph_factor, wfps_factor, Condition, ResponseTable, TemperatureResponse,
};
use soiln_core::soil::{SoilConditions, SoilProfile};
use soiln_core::FloatValue;

/// Physical conditions of a single layer on the current day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerEnvironment {
    pub temperature: FloatValue,
    pub sw: FloatValue,
    pub ll15: FloatValue,
    pub dul: FloatValue,
    pub sat: FloatValue,
    pub ph: FloatValue,
    /// Water-filled pore space (%)
    pub wfps: FloatValue,
    /// kg/ha to ppm conversion factor
    pub conv: FloatValue,
    pub humus_cn_ratio: FloatValue,
    pub inhibition: FloatValue,
}

impl LayerEnvironment {
    pub fn new(profile: &SoilProfile, conditions: &SoilConditions, layer: usize) -> Self {
        Self {
            temperature: conditions.temperature[layer],
            sw: conditions.sw[layer],
            ll15: profile.ll15[layer],
            dul: profile.dul[layer],
            sat: profile.sat[layer],
            ph: profile.ph[layer],
            wfps: conditions.wfps(profile, layer),
            conv: profile.conv_factor(layer),
            humus_cn_ratio: profile.humus_cn_ratio[layer],
            inhibition: conditions.nitrification_inhibition[layer],
        }
    }

    pub fn temperature_factor(&self, response: &TemperatureResponse, condition: Condition) -> FloatValue {
        response.factor(condition, self.temperature)
    }

    pub fn moisture_factor(&self, table: &ResponseTable, condition: Condition) -> FloatValue {
        moisture_factor(table, condition, self.sw, self.ll15, self.dul, self.sat)
    }

    pub fn ph_factor(&self, table: &ResponseTable) -> FloatValue {
        ph_factor(table, self.ph)
    }

    pub fn wfps_factor(&self, table: &ResponseTable, condition: Condition) -> FloatValue {
        wfps_factor(table, condition, self.wfps)
    }

    pub fn to_ppm(&self, kgha: FloatValue) -> FloatValue {
        kgha * self.conv
    }

    pub fn to_kgha(&self, ppm: FloatValue) -> FloatValue {
        if self.conv > 0.0 {
            ppm / self.conv
        } else {
            0.0
        }
    }
}
