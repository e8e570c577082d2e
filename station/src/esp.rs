use std::{
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context};
use dht_sensor::dht11;
use embedded_svc::{
    http::{client::Client as HttpClient, Method, Status},
    wifi::{AuthMethod, ClientConfiguration, Configuration},
};
use esp_idf_hal::{
    adc::attenuation::DB_11,
    adc::oneshot::{
        config::{AdcChannelConfig, Calibration},
        AdcChannelDriver, AdcDriver,
    },
    delay::Ets,
    gpio::{ADCPin, AnyIOPin, IOPin, InputOutput, PinDriver, Pull},
};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::prelude::Peripherals,
    http::client::{Configuration as HttpClientConfiguration, EspHttpConnection},
    log::EspLogger,
    nvs::EspDefaultNvsPartition,
    wifi::EspWifi,
};
use log::{info, warn};

use airsense_common::{
    ChannelConfig, ChannelUpdate, CycleOutcome, EnvSample, LinkState, NetworkConfig, PowerSample,
    RawPowerReadings, StationConfig, StationEngine, UploadVerdict,
};
#[cfg(feature = "solar")]
use airsense_common::PowerMonitor;

const DHT_PIN: i32 = 18;
const GAS_PIN: i32 = 34;

const THINGSPEAK_UPDATE_URL: &str = "https://api.thingspeak.com/update";
const UPLOAD_TIMEOUT_SECS: u64 = 30;

struct DhtSensor {
    pin: PinDriver<'static, AnyIOPin, InputOutput>,
    delay: Ets,
}

impl DhtSensor {
    fn new(pin: AnyIOPin) -> anyhow::Result<Self> {
        let mut pin = PinDriver::input_output_od(pin)?;
        pin.set_pull(Pull::Up)?;
        pin.set_high()?;
        Ok(Self { pin, delay: Ets })
    }

    /// One read per cycle, no retries. Failures surface as NaN so the
    /// validation step discards the whole cycle.
    fn read(&mut self) -> (f32, f32) {
        if let Err(err) = self.pin.set_high() {
            warn!("failed to release DHT11 line before read: {err:?}");
            return (f32::NAN, f32::NAN);
        }

        match dht11::blocking::read(&mut self.delay, &mut self.pin) {
            Ok(reading) => (
                reading.temperature as f32,
                reading.relative_humidity as f32,
            ),
            Err(err) => {
                warn!("DHT11 read failed on GPIO{DHT_PIN}: {err:?}");
                (f32::NAN, f32::NAN)
            }
        }
    }
}

/// MQ135 response collapsed to a linear fit over the usable band. A read
/// failure maps to 0 PPM, which the validation step rejects.
fn adc_to_ppm(raw: u16) -> f32 {
    const PPM_FULL_SCALE: f32 = 1000.0;
    raw as f32 / 4095.0 * PPM_FULL_SCALE
}

fn read_raw_code<'d, P, M>(label: &str, channel: &mut AdcChannelDriver<'d, P, M>) -> u16
where
    P: ADCPin,
    M: core::borrow::Borrow<AdcDriver<'d, P::Adc>>,
{
    match channel.read_raw() {
        Ok(code) => code,
        Err(err) => {
            warn!("{label} ADC read failed: {err:?}");
            0
        }
    }
}

struct ThingSpeakClient {
    channel: ChannelConfig,
}

impl ThingSpeakClient {
    /// Sets the pending fields on the remote channel with one synchronous
    /// write request and returns the HTTP status code. The write key alone
    /// addresses the channel on the wire; the numeric id is diagnostic.
    fn upload(&self, update: &ChannelUpdate) -> anyhow::Result<u16> {
        let url = format!(
            "{THINGSPEAK_UPDATE_URL}?{}",
            update.query_string(&self.channel.write_key)
        );

        let http_conf = HttpClientConfiguration {
            timeout: Some(Duration::from_secs(UPLOAD_TIMEOUT_SECS)),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        let mut client = HttpClient::wrap(EspHttpConnection::new(&http_conf)?);

        let request = client
            .request(Method::Get, &url, &[])
            .context("failed to build channel write request")?;
        let response = request.submit().map_err(|e| anyhow!("{e:?}"))?;

        Ok(response.status())
    }
}

fn configure_wifi(wifi: &mut EspWifi<'static>, network: &NetworkConfig) -> anyhow::Result<()> {
    let auth_method = if network.wifi_pass.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPAWPA2Personal
    };

    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: network
            .wifi_ssid
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi ssid too long"))?,
        password: network
            .wifi_pass
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi password too long"))?,
        auth_method,
        ..Default::default()
    }))?;
    wifi.start()?;
    Ok(())
}

/// One bounded association attempt: request the connection, then poll link
/// status at the configured sub-interval until the netif is up or the timeout
/// elapses. Failure is non-fatal; the caller decides when to try again.
fn connect_wifi(wifi: &mut EspWifi<'static>, network: &NetworkConfig) -> bool {
    info!("connecting to `{}`", network.wifi_ssid);

    let _ = wifi.disconnect();
    if let Err(err) = wifi.connect() {
        warn!("wifi connect request failed: {err:?}");
        return false;
    }

    let deadline = Instant::now() + Duration::from_millis(network.connect_timeout_ms);
    loop {
        match wifi.is_up() {
            Ok(true) => break,
            Ok(false) => {}
            Err(err) => {
                warn!("wifi status poll failed: {err:?}");
                return false;
            }
        }
        if Instant::now() >= deadline {
            warn!(
                "wifi connect timed out after {} ms",
                network.connect_timeout_ms
            );
            return false;
        }
        thread::sleep(Duration::from_millis(network.connect_poll_ms));
    }

    match wifi.sta_netif().get_ip_info() {
        Ok(ip_info) => info!("wifi connected, ip {}", ip_info.ip),
        Err(_) => info!("wifi connected"),
    }
    true
}

fn link_state(wifi: &EspWifi<'_>) -> LinkState {
    if wifi.is_connected().unwrap_or(false) {
        LinkState::Connected
    } else {
        LinkState::Disconnected
    }
}

fn load_config() -> StationConfig {
    let mut config = StationConfig::default();
    config.network.wifi_ssid = option_env!("WIFI_SSID").unwrap_or("CHANGE_ME").to_string();
    config.network.wifi_pass = option_env!("WIFI_PASS").unwrap_or("CHANGE_ME").to_string();
    config.channel.channel_id = option_env!("TS_CHANNEL_ID")
        .and_then(|value| value.parse().ok())
        .unwrap_or(0);
    config.channel.write_key = option_env!("TS_WRITE_KEY")
        .unwrap_or("CHANGE_ME")
        .to_string();
    config
}

fn log_readings(env: &EnvSample, engine: &StationEngine, outcome_power: Option<&PowerSample>) {
    info!("temperature: {:.2} °C", env.temperature_c);
    info!("humidity: {:.2} %", env.humidity_pct);
    info!("gas concentration: {:.2} PPM", env.gas_ppm);

    if let Some(power) = outcome_power {
        info!(
            "solar {:.2} V, battery {:.2} V, current {:.0} mA",
            power.solar_voltage_v,
            power.battery_voltage_v,
            power.current_a * 1000.0
        );
        info!(
            "power: generated {:.2} W, consumed {:.2} W",
            power.power_generated_w, power.power_consumed_w
        );
    }
    if let Some(totals) = engine.energy_totals() {
        info!(
            "energy since boot: generated {:.4} Wh, consumed {:.4} Wh",
            totals.generated_wh, totals.consumed_wh
        );
    }
}

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let config = load_config();
    info!(
        "starting air quality station (channel {})",
        config.channel.channel_id
    );

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let peripherals = Peripherals::take()?;

    let mut wifi = EspWifi::new(peripherals.modem, sys_loop.clone(), Some(nvs))?;
    configure_wifi(&mut wifi, &config.network)?;
    if connect_wifi(&mut wifi, &config.network) {
        info!("station ready");
    } else {
        warn!("continuing without connectivity; uploads will fail until the link recovers");
    }

    let mut dht =
        DhtSensor::new(peripherals.pins.gpio18.downgrade()).context("failed to set up DHT11")?;

    let adc = AdcDriver::new(peripherals.adc1)?;
    let channel_config = AdcChannelConfig {
        attenuation: DB_11,
        calibration: Calibration::None,
        ..Default::default()
    };
    let mut gas_pin = AdcChannelDriver::new(&adc, peripherals.pins.gpio34, &channel_config)
        .with_context(|| format!("failed to set up gas ADC on GPIO{GAS_PIN}"))?;
    #[cfg(feature = "solar")]
    let mut solar_pin = AdcChannelDriver::new(&adc, peripherals.pins.gpio32, &channel_config)
        .context("failed to set up solar ADC")?;
    #[cfg(feature = "solar")]
    let mut battery_pin = AdcChannelDriver::new(&adc, peripherals.pins.gpio33, &channel_config)
        .context("failed to set up battery ADC")?;
    #[cfg(feature = "solar")]
    let mut current_pin = AdcChannelDriver::new(&adc, peripherals.pins.gpio35, &channel_config)
        .context("failed to set up current ADC")?;

    #[cfg(feature = "solar")]
    let power = Some(PowerMonitor::new(config.calibration.clone()));
    #[cfg(not(feature = "solar"))]
    let power = None;

    let mut engine = StationEngine::new(config.sampling.clone(), power);
    let uploader = ThingSpeakClient {
        channel: config.channel.clone(),
    };

    let started = Instant::now();
    loop {
        let now_ms = started.elapsed().as_millis() as u64;

        // Power measurement comes first so the energy totals advance even
        // when the environmental sample is rejected below.
        #[cfg(feature = "solar")]
        let raw = Some(RawPowerReadings {
            solar_raw: read_raw_code("solar", &mut solar_pin),
            battery_raw: read_raw_code("battery", &mut battery_pin),
            current_raw: read_raw_code("current", &mut current_pin),
        });
        #[cfg(not(feature = "solar"))]
        let raw: Option<RawPowerReadings> = None;

        let (temperature_c, humidity_pct) = dht.read();
        let env = EnvSample {
            temperature_c,
            humidity_pct,
            gas_ppm: adc_to_ppm(read_raw_code("gas", &mut gas_pin)),
        };

        match engine.evaluate_cycle(env, raw, now_ms) {
            CycleOutcome::Discarded { retry_delay_ms, .. } => {
                warn!("invalid sensor readings; skipping transmission this cycle");
                thread::sleep(Duration::from_millis(retry_delay_ms));
            }
            CycleOutcome::Ready { update, env, power } => {
                log_readings(&env, &engine, power.as_ref());

                match uploader.upload(&update) {
                    Ok(status) => match engine.classify_upload(status, link_state(&wifi)) {
                        UploadVerdict::Accepted => {
                            info!(
                                "telemetry accepted by channel {}",
                                config.channel.channel_id
                            );
                        }
                        UploadVerdict::Dropped => {
                            warn!("upload rejected with HTTP {status}; sample dropped");
                        }
                        UploadVerdict::RetryConnection => {
                            warn!("upload failed with HTTP {status} and the link is down");
                            if !connect_wifi(&mut wifi, &config.network) {
                                warn!("reconnect attempt failed; staying degraded");
                            }
                        }
                    },
                    Err(err) => {
                        warn!("upload request failed: {err:#}");
                        if link_state(&wifi) == LinkState::Disconnected
                            && !connect_wifi(&mut wifi, &config.network)
                        {
                            warn!("reconnect attempt failed; staying degraded");
                        }
                    }
                }

                thread::sleep(Duration::from_millis(engine.cycle_period_ms()));
            }
        }
    }
}
