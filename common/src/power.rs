use crate::config::CalibrationConfig;
use crate::types::{EnergyTotals, PowerSample, RawPowerReadings};

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Converts raw rail readings to power figures and integrates them into
/// running energy totals. Owns the accumulator and the last-measurement
/// timestamp so the loop carries no global state.
#[derive(Debug, Clone)]
pub struct PowerMonitor {
    calibration: CalibrationConfig,
    generated_wh: f64,
    consumed_wh: f64,
    last_measurement_ms: Option<u64>,
}

impl PowerMonitor {
    pub fn new(calibration: CalibrationConfig) -> Self {
        Self {
            calibration,
            generated_wh: 0.0,
            consumed_wh: 0.0,
            last_measurement_ms: None,
        }
    }

    /// Takes one power measurement and advances the energy totals by
    /// rectangular integration over the time since the previous call.
    /// Readings pass through the linear calibration untouched: no clamping,
    /// no smoothing, no outlier rejection. A single current sensor feeds both
    /// rails, so generated and consumed power share the same current figure
    /// and are approximations of the real split.
    pub fn measure(&mut self, raw: RawPowerReadings, now_ms: u64) -> PowerSample {
        let solar_voltage_v = self.rail_voltage(raw.solar_raw);
        let battery_voltage_v = self.rail_voltage(raw.battery_raw);
        let current_a = self.current(raw.current_raw);

        let sample = PowerSample {
            solar_voltage_v,
            battery_voltage_v,
            current_a,
            power_generated_w: solar_voltage_v * current_a,
            power_consumed_w: battery_voltage_v * current_a,
        };

        let elapsed_ms = self
            .last_measurement_ms
            .map_or(0, |last| now_ms.saturating_sub(last));
        let dt_hours = elapsed_ms as f64 / MS_PER_HOUR;
        self.generated_wh += sample.power_generated_w as f64 * dt_hours;
        self.consumed_wh += sample.power_consumed_w as f64 * dt_hours;
        self.last_measurement_ms = Some(now_ms);

        sample
    }

    /// Rail voltage ahead of the divider feeding the ADC pin.
    pub fn rail_voltage(&self, raw: u16) -> f32 {
        self.pin_voltage(raw) / self.calibration.voltage_divider_ratio
    }

    /// Voltage actually present at the ADC pin.
    pub fn pin_voltage(&self, raw: u16) -> f32 {
        raw as f32 / self.calibration.adc_full_scale as f32 * self.calibration.adc_reference_volts
    }

    /// Bidirectional current from the hall-style sensor: the output idles at
    /// the zero offset (1.65 V) and swings by the configured sensitivity.
    pub fn current(&self, raw: u16) -> f32 {
        (self.pin_voltage(raw) - self.calibration.current_zero_offset_v)
            / self.calibration.current_sensitivity_v_per_a
    }

    pub fn totals(&self) -> EnergyTotals {
        EnergyTotals {
            generated_wh: self.generated_wh,
            consumed_wh: self.consumed_wh,
        }
    }
}
