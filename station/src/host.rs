use std::time::{Duration, Instant};

use tracing::{info, warn};

use airsense_common::{
    CycleOutcome, EnvSample, LinkState, RawPowerReadings, StationConfig, StationEngine,
    UploadVerdict,
};
#[cfg(feature = "solar")]
use airsense_common::PowerMonitor;

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut config = StationConfig::default();
    config.channel.channel_id = std::env::var("TS_CHANNEL_ID")
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(0);
    config.channel.write_key = std::env::var("TS_WRITE_KEY").unwrap_or_default();

    #[cfg(feature = "solar")]
    let power = Some(PowerMonitor::new(config.calibration.clone()));
    #[cfg(not(feature = "solar"))]
    let power = None;

    let mut engine = StationEngine::new(config.sampling.clone(), power);

    info!(
        channel = config.channel.channel_id,
        extended = engine.has_power_monitor(),
        "station simulator started"
    );

    let started = Instant::now();
    let mut tick: u64 = 0;
    let mut interval = tokio::time::interval(Duration::from_millis(engine.cycle_period_ms()));

    loop {
        interval.tick().await;
        tick = tick.saturating_add(1);
        let now_ms = started.elapsed().as_millis() as u64;

        // Hardware integration point:
        // replace these simulated readings with DHT11 + MQ135 + ADC drivers on ESP target.
        let env = EnvSample {
            temperature_c: 24.0 + ((tick % 8) as f32 * 0.2),
            humidity_pct: 48.0 + ((tick % 6) as f32 * 0.5),
            gas_ppm: 280.0 + ((tick % 10) as f32 * 3.0),
        };
        #[cfg(feature = "solar")]
        let raw = Some(RawPowerReadings {
            solar_raw: 3000 + (tick % 50) as u16,
            battery_raw: 2800,
            current_raw: 2200,
        });
        #[cfg(not(feature = "solar"))]
        let raw: Option<RawPowerReadings> = None;

        match engine.evaluate_cycle(env, raw, now_ms) {
            CycleOutcome::Discarded { retry_delay_ms, .. } => {
                warn!(retry_delay_ms, "invalid sensor readings; skipping cycle");
                tokio::time::sleep(Duration::from_millis(retry_delay_ms)).await;
            }
            CycleOutcome::Ready { update, env, power } => {
                info!(
                    temperature_c = env.temperature_c,
                    humidity_pct = env.humidity_pct,
                    gas_ppm = env.gas_ppm,
                    "sampled"
                );
                if let Some(power) = power {
                    info!(
                        solar_v = power.solar_voltage_v,
                        battery_v = power.battery_voltage_v,
                        current_ma = power.current_a * 1000.0,
                        "power rails"
                    );
                }
                if let Some(totals) = engine.energy_totals() {
                    info!(
                        generated_wh = totals.generated_wh,
                        consumed_wh = totals.consumed_wh,
                        "energy since start"
                    );
                }

                // No network on the host build; log the submission that the
                // ESP target would send and treat it as accepted.
                info!(
                    query = %update.query_string("<write-key>"),
                    "would upload channel update"
                );
                let verdict = engine.classify_upload(200, LinkState::Connected);
                if verdict != UploadVerdict::Accepted {
                    warn!(?verdict, "unexpected verdict for simulated upload");
                }
            }
        }
    }
}
