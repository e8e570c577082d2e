use thiserror::Error;

use crate::types::{EnvSample, PowerSample};

/// A channel accepts at most eight numeric field slots per submission.
pub const MAX_FIELDS: usize = 8;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FieldError {
    #[error("field index {0} is outside the channel's 1..=8 range")]
    IndexOutOfRange(u8),
}

/// One pending channel submission: positionally addressed numeric fields,
/// kept in index order. The layout is a fixed contract with the remote
/// service, so the named constructors below are the only places that decide
/// which reading lands in which slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelUpdate {
    fields: Vec<(u8, f32)>,
}

impl ChannelUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fields 1..3: temperature (°C), humidity (%), gas concentration (PPM).
    pub fn basic(env: &EnvSample) -> Self {
        Self {
            fields: vec![
                (1, env.temperature_c),
                (2, env.humidity_pct),
                (3, env.gas_ppm),
            ],
        }
    }

    /// Fields 1..8: the basic layout plus solar voltage (V), battery voltage
    /// (V), current draw (mA), generated power (W), consumed power (W).
    pub fn extended(env: &EnvSample, power: &PowerSample) -> Self {
        Self {
            fields: vec![
                (1, env.temperature_c),
                (2, env.humidity_pct),
                (3, env.gas_ppm),
                (4, power.solar_voltage_v),
                (5, power.battery_voltage_v),
                (6, power.current_a * 1000.0),
                (7, power.power_generated_w),
                (8, power.power_consumed_w),
            ],
        }
    }

    /// Sets or replaces one field slot.
    pub fn set_field(&mut self, index: u8, value: f32) -> Result<(), FieldError> {
        if index == 0 || index as usize > MAX_FIELDS {
            return Err(FieldError::IndexOutOfRange(index));
        }

        match self.fields.iter_mut().find(|(slot, _)| *slot == index) {
            Some(entry) => entry.1 = value,
            None => {
                self.fields.push((index, value));
                self.fields.sort_by_key(|&(slot, _)| slot);
            }
        }
        Ok(())
    }

    pub fn fields(&self) -> &[(u8, f32)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Query string for the service's single-write endpoint:
    /// `api_key=KEY&field1=..&field2=..` in field order.
    pub fn query_string(&self, write_key: &str) -> String {
        use core::fmt::Write as _;

        let mut query = format!("api_key={write_key}");
        for (index, value) in &self.fields {
            let _ = write!(&mut query, "&field{index}={value}");
        }
        query
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn env() -> EnvSample {
        EnvSample {
            temperature_c: 25.0,
            humidity_pct: 50.0,
            gas_ppm: 300.0,
        }
    }

    #[test]
    fn basic_layout_uses_first_three_slots() {
        let update = ChannelUpdate::basic(&env());
        assert_eq!(update.fields(), &[(1, 25.0), (2, 50.0), (3, 300.0)]);
    }

    #[test]
    fn extended_layout_fills_all_eight_slots() {
        let power = PowerSample {
            solar_voltage_v: 4.8,
            battery_voltage_v: 4.5,
            current_a: 1.2,
            power_generated_w: 5.9,
            power_consumed_w: 5.5,
        };
        let update = ChannelUpdate::extended(&env(), &power);

        assert_eq!(update.fields().len(), 8);
        assert_eq!(update.fields()[3], (4, 4.8));
        assert_eq!(update.fields()[4], (5, 4.5));
        // Current is reported in milliamps.
        assert_eq!(update.fields()[5], (6, 1200.0));
        assert_eq!(update.fields()[6], (7, 5.9));
        assert_eq!(update.fields()[7], (8, 5.5));
    }

    #[test]
    fn set_field_rejects_out_of_range_slots() {
        let mut update = ChannelUpdate::new();
        assert_eq!(update.set_field(0, 1.0), Err(FieldError::IndexOutOfRange(0)));
        assert_eq!(update.set_field(9, 1.0), Err(FieldError::IndexOutOfRange(9)));
        assert!(update.is_empty());
    }

    #[test]
    fn set_field_replaces_and_keeps_index_order() {
        let mut update = ChannelUpdate::new();
        update.set_field(3, 30.0).unwrap();
        update.set_field(1, 10.0).unwrap();
        update.set_field(3, 33.0).unwrap();

        assert_eq!(update.fields(), &[(1, 10.0), (3, 33.0)]);
    }

    #[test]
    fn query_string_carries_key_and_ordered_fields() {
        let update = ChannelUpdate::basic(&env());
        assert_eq!(
            update.query_string("WRITEKEY"),
            "api_key=WRITEKEY&field1=25&field2=50&field3=300"
        );
    }
}
