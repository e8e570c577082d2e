use serde::{Deserialize, Serialize};

/// One environmental reading per cycle; never persisted, dropped after use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvSample {
    pub temperature_c: f32,
    pub humidity_pct: f32,
    pub gas_ppm: f32,
}

impl EnvSample {
    /// A cycle transmits only when temperature and humidity are well-defined
    /// numbers and the gas reading is strictly positive.
    pub fn is_valid(&self) -> bool {
        self.temperature_c.is_finite() && self.humidity_pct.is_finite() && self.gas_ppm > 0.0
    }
}

/// 12-bit ADC codes (0..=4095) from the three power-rail channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPowerReadings {
    pub solar_raw: u16,
    pub battery_raw: u16,
    pub current_raw: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerSample {
    pub solar_voltage_v: f32,
    pub battery_voltage_v: f32,
    pub current_a: f32,
    pub power_generated_w: f32,
    pub power_consumed_w: f32,
}

/// Running energy totals for the current process uptime. Lost on reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyTotals {
    pub generated_wh: f64,
    pub consumed_wh: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connected,
    Disconnected,
}
