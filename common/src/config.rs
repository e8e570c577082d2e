use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub wifi_ssid: String,
    pub wifi_pass: String,
    pub connect_timeout_ms: u64,
    pub connect_poll_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            wifi_ssid: String::new(),
            wifi_pass: String::new(),
            connect_timeout_ms: 20_000,
            connect_poll_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub channel_id: u32,
    pub write_key: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            channel_id: 0,
            write_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub cycle_period_ms: u64,
    pub invalid_retry_delay_ms: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            cycle_period_ms: 10_000,
            invalid_retry_delay_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    pub voltage_divider_ratio: f32,
    pub current_sensitivity_v_per_a: f32,
    pub current_zero_offset_v: f32,
    // Carried in deployed configs but not part of the current calculation:
    // the sensor reports an offset voltage directly, not a shunt drop.
    pub shunt_resistance_ohms: f32,
    pub adc_reference_volts: f32,
    pub adc_full_scale: u16,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            voltage_divider_ratio: 0.5,
            current_sensitivity_v_per_a: 0.1,
            current_zero_offset_v: 1.65,
            shunt_resistance_ohms: 0.1,
            adc_reference_volts: 3.3,
            adc_full_scale: 4095,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationConfig {
    pub network: NetworkConfig,
    pub channel: ChannelConfig,
    pub sampling: SamplingConfig,
    pub calibration: CalibrationConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_match_deployment_constants() {
        let config = StationConfig::default();

        assert_eq!(config.network.connect_timeout_ms, 20_000);
        assert_eq!(config.network.connect_poll_ms, 500);
        assert_eq!(config.sampling.cycle_period_ms, 10_000);
        assert_eq!(config.sampling.invalid_retry_delay_ms, 10_000);
        assert_eq!(config.calibration.voltage_divider_ratio, 0.5);
        assert_eq!(config.calibration.current_sensitivity_v_per_a, 0.1);
        assert_eq!(config.calibration.current_zero_offset_v, 1.65);
        assert_eq!(config.calibration.adc_full_scale, 4095);
    }

    #[test]
    fn config_round_trips_through_json() {
        let mut config = StationConfig::default();
        config.network.wifi_ssid = "greenhouse".to_string();
        config.channel.channel_id = 2_915_306;
        config.channel.write_key = "XXXXXXXXXXXXXXXX".to_string();

        let payload = serde_json::to_string(&config).unwrap();
        let restored: StationConfig = serde_json::from_str(&payload).unwrap();

        assert_eq!(restored.network.wifi_ssid, "greenhouse");
        assert_eq!(restored.channel.channel_id, 2_915_306);
        assert_eq!(restored.sampling.cycle_period_ms, 10_000);
    }
}
