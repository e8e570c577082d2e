use crate::config::SamplingConfig;
use crate::fields::ChannelUpdate;
use crate::power::PowerMonitor;
use crate::types::{EnergyTotals, EnvSample, LinkState, PowerSample, RawPowerReadings};

/// Result of one sample-validate-aggregate pass.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// The environmental sample failed validation: no upload this cycle, the
    /// sample is dropped, and the loop waits the retry delay before the next
    /// pass. Power measurement (when fitted) already ran and is reported here
    /// for diagnostics.
    Discarded {
        power: Option<PowerSample>,
        retry_delay_ms: u64,
    },
    /// Valid sample with its prepared channel submission.
    Ready {
        update: ChannelUpdate,
        env: EnvSample,
        power: Option<PowerSample>,
    },
}

/// What the loop should do with an upload response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadVerdict {
    Accepted,
    /// Non-200 while the link is down: run one bounded reconnect attempt.
    /// No backoff, no retry cap; the dropped sample is not resubmitted.
    RetryConnection,
    /// Non-200 with the link still up. The sample is dropped, nothing else.
    Dropped,
}

/// The per-cycle core of the station: pure state, no I/O. The firmware layer
/// feeds it readings and a monotonic timestamp and acts on the outcome.
/// Constructing it with a `PowerMonitor` selects the extended (solar) variant.
#[derive(Debug)]
pub struct StationEngine {
    sampling: SamplingConfig,
    power: Option<PowerMonitor>,
}

impl StationEngine {
    pub fn new(sampling: SamplingConfig, power: Option<PowerMonitor>) -> Self {
        Self { sampling, power }
    }

    pub fn has_power_monitor(&self) -> bool {
        self.power.is_some()
    }

    pub fn cycle_period_ms(&self) -> u64 {
        self.sampling.cycle_period_ms
    }

    /// Runs one cycle. Power measurement happens before environmental
    /// validation; the energy totals therefore advance on every cycle that
    /// reaches this point, including ones whose sample is rejected.
    pub fn evaluate_cycle(
        &mut self,
        env: EnvSample,
        raw: Option<RawPowerReadings>,
        now_ms: u64,
    ) -> CycleOutcome {
        let power = match (self.power.as_mut(), raw) {
            (Some(monitor), Some(raw)) => Some(monitor.measure(raw, now_ms)),
            _ => None,
        };

        if !env.is_valid() {
            return CycleOutcome::Discarded {
                power,
                retry_delay_ms: self.sampling.invalid_retry_delay_ms,
            };
        }

        let update = match power.as_ref() {
            Some(sample) => ChannelUpdate::extended(&env, sample),
            None => ChannelUpdate::basic(&env),
        };

        CycleOutcome::Ready { update, env, power }
    }

    pub fn classify_upload(&self, status_code: u16, link: LinkState) -> UploadVerdict {
        if status_code == 200 {
            return UploadVerdict::Accepted;
        }
        match link {
            LinkState::Disconnected => UploadVerdict::RetryConnection,
            LinkState::Connected => UploadVerdict::Dropped,
        }
    }

    pub fn energy_totals(&self) -> Option<EnergyTotals> {
        self.power.as_ref().map(PowerMonitor::totals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CalibrationConfig;
    use pretty_assertions::assert_eq;

    fn extended_engine() -> StationEngine {
        StationEngine::new(
            SamplingConfig::default(),
            Some(PowerMonitor::new(CalibrationConfig::default())),
        )
    }

    fn basic_engine() -> StationEngine {
        StationEngine::new(SamplingConfig::default(), None)
    }

    fn valid_env() -> EnvSample {
        EnvSample {
            temperature_c: 25.0,
            humidity_pct: 50.0,
            gas_ppm: 300.0,
        }
    }

    fn rail_readings() -> RawPowerReadings {
        RawPowerReadings {
            solar_raw: 3000,
            battery_raw: 2800,
            current_raw: 2200,
        }
    }

    #[test]
    fn invalid_sample_skips_upload_but_energy_still_advances() {
        let mut engine = extended_engine();

        // Prime the integrator so the next measurement covers a real interval.
        engine.evaluate_cycle(valid_env(), Some(rail_readings()), 0);

        let bad = EnvSample {
            temperature_c: f32::NAN,
            humidity_pct: 45.0,
            gas_ppm: 120.0,
        };
        let outcome = engine.evaluate_cycle(bad, Some(rail_readings()), 10_000);

        match outcome {
            CycleOutcome::Discarded {
                power,
                retry_delay_ms,
            } => {
                assert!(power.is_some());
                assert_eq!(retry_delay_ms, 10_000);
            }
            CycleOutcome::Ready { .. } => panic!("NaN temperature must not upload"),
        }

        let totals = engine.energy_totals().unwrap();
        assert!(totals.generated_wh > 0.0);
        assert!(totals.consumed_wh > 0.0);
    }

    #[test]
    fn extended_cycle_builds_eight_exact_fields() {
        let mut engine = extended_engine();
        let outcome = engine.evaluate_cycle(valid_env(), Some(rail_readings()), 0);

        let CycleOutcome::Ready { update, power, .. } = outcome else {
            panic!("valid sample must be ready for upload");
        };
        let power = power.unwrap();

        let solar_v = 3000.0 / 4095.0 * 3.3 / 0.5;
        let battery_v = 2800.0 / 4095.0 * 3.3 / 0.5;
        let current_a = (2200.0_f32 / 4095.0 * 3.3 - 1.65) / 0.1;

        assert!((power.solar_voltage_v - solar_v).abs() < 1e-5);
        assert!((power.battery_voltage_v - battery_v).abs() < 1e-5);
        assert!((power.current_a - current_a).abs() < 1e-5);

        let fields = update.fields();
        assert_eq!(fields.len(), 8);
        assert_eq!(fields[0], (1, 25.0));
        assert_eq!(fields[1], (2, 50.0));
        assert_eq!(fields[2], (3, 300.0));
        assert_eq!(fields[3].1, power.solar_voltage_v);
        assert_eq!(fields[4].1, power.battery_voltage_v);
        assert_eq!(fields[5].1, power.current_a * 1000.0);
        assert_eq!(fields[6].1, power.solar_voltage_v * power.current_a);
        assert_eq!(fields[7].1, power.battery_voltage_v * power.current_a);
    }

    #[test]
    fn basic_cycle_builds_exactly_three_fields() {
        let mut engine = basic_engine();
        let outcome = engine.evaluate_cycle(valid_env(), None, 0);

        let CycleOutcome::Ready { update, power, .. } = outcome else {
            panic!("valid sample must be ready for upload");
        };

        assert!(power.is_none());
        assert_eq!(update.fields(), &[(1, 25.0), (2, 50.0), (3, 300.0)]);
        assert!(engine.energy_totals().is_none());
    }

    #[test]
    fn accepted_upload_never_triggers_reconnect() {
        let engine = extended_engine();
        assert_eq!(
            engine.classify_upload(200, LinkState::Connected),
            UploadVerdict::Accepted
        );
        assert_eq!(
            engine.classify_upload(200, LinkState::Disconnected),
            UploadVerdict::Accepted
        );
    }

    #[test]
    fn failed_upload_reconnects_only_when_link_is_down() {
        let engine = extended_engine();
        assert_eq!(
            engine.classify_upload(401, LinkState::Disconnected),
            UploadVerdict::RetryConnection
        );
        assert_eq!(
            engine.classify_upload(401, LinkState::Connected),
            UploadVerdict::Dropped
        );
        assert_eq!(
            engine.classify_upload(500, LinkState::Connected),
            UploadVerdict::Dropped
        );
    }

    #[test]
    fn every_cycle_outcome_continues_the_loop() {
        // Both outcome arms carry a follow-up (wait and resample); neither
        // encodes a terminal state, so the loop can never end on its own.
        let mut engine = extended_engine();

        let bad = EnvSample {
            temperature_c: f32::NAN,
            humidity_pct: f32::NAN,
            gas_ppm: -1.0,
        };
        for cycle in 0..100_u64 {
            let env = if cycle % 2 == 0 { valid_env() } else { bad };
            match engine.evaluate_cycle(env, Some(rail_readings()), cycle * 10_000) {
                CycleOutcome::Discarded { retry_delay_ms, .. } => {
                    assert!(retry_delay_ms > 0)
                }
                CycleOutcome::Ready { update, .. } => assert!(!update.is_empty()),
            }
        }
    }
}
