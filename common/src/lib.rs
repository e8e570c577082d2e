pub mod config;
pub mod fields;
pub mod power;
pub mod station;
pub mod types;

pub use config::{CalibrationConfig, ChannelConfig, NetworkConfig, SamplingConfig, StationConfig};
pub use fields::{ChannelUpdate, FieldError, MAX_FIELDS};
pub use power::PowerMonitor;
pub use station::{CycleOutcome, StationEngine, UploadVerdict};
pub use types::{EnergyTotals, EnvSample, LinkState, PowerSample, RawPowerReadings};
