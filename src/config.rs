// Copyright (C) 2025 Paul Hampson
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License version 3 as  published by the
// Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <https://www.gnu.org/licenses/>.

//! Device configuration: read once at startup, immutable afterwards.

use crate::calibration::CalibrationProfile;
use crate::connectivity::{Credentials, Endpoint};
use beescale_messages::discovery::DEFAULT_DISCOVERY_PREFIX;
use beescale_messages::DEFAULT_TOPIC_ROOT;
use embassy_time::Duration;
use heapless::String;

pub const MAX_DEVICE_ID_LEN: usize = 32;
pub const MAX_SETTING_TEXT_LEN: usize = 64;
pub const MAX_LOAD_CELL_SAMPLES: usize = 32;

pub const DEFAULT_SLEEP_INTERVAL: Duration = Duration::from_secs(2 * 60 * 60);
pub const DEFAULT_BUTTON_SLEEP: Duration = Duration::from_secs(60);
pub const DEFAULT_DEFERRED_BUTTON_SLEEP: Duration = Duration::from_secs(1);
pub const DEFAULT_SCREEN_DWELL: Duration = Duration::from_millis(2000);
pub const DEFAULT_LOAD_CELL_SAMPLES: usize = 10;
pub const DEFAULT_LOAD_CELL_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_CLIMATE_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_BATTERY_TIMEOUT: Duration = Duration::from_millis(200);
pub const DEFAULT_PUBLISH_BUDGET: Duration = Duration::from_secs(20);
pub const DEFAULT_RETRY_PAUSE: Duration = Duration::from_secs(2);
pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const DEFAULT_HTTP_PORT: u16 = 80;
pub const DEFAULT_HTTP_PATH: &str = "/api/readings";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigurationError {
    InvalidScaleFactor,
    InvalidDividerRatio,
    InvalidBatteryOffset,
    InvalidAdcScale,
    InvalidSampleCount,
    InvalidSleepInterval,
    InvalidPublishBudget,
    /// Device id is empty, too long or contains characters unsafe in a topic
    InvalidIdentity,
    InvalidEndpoint,
    /// Neither a transport nor an enabled panel, nothing would ever leave the node
    NoOutput,
    Missing(SettingsAccessorId),
    WrongType(SettingsAccessorId),
    ValueTooLong(SettingsAccessorId),
}

impl core::fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ConfigurationError::InvalidScaleFactor => {
                write!(f, "scale factor must be finite and non-zero")
            }
            ConfigurationError::InvalidDividerRatio => {
                write!(f, "battery divider ratio must be positive")
            }
            ConfigurationError::InvalidBatteryOffset => write!(f, "battery offset must be finite"),
            ConfigurationError::InvalidAdcScale => {
                write!(f, "battery ADC full scale and reference must be positive")
            }
            ConfigurationError::InvalidSampleCount => write!(
                f,
                "load cell sample count must be between 1 and {}",
                MAX_LOAD_CELL_SAMPLES
            ),
            ConfigurationError::InvalidSleepInterval => write!(f, "sleep interval must be non-zero"),
            ConfigurationError::InvalidPublishBudget => write!(f, "publish budget must be non-zero"),
            ConfigurationError::InvalidIdentity => write!(f, "device id is not usable"),
            ConfigurationError::InvalidEndpoint => write!(f, "endpoint host or port missing"),
            ConfigurationError::NoOutput => write!(f, "no transport and no enabled panel"),
            ConfigurationError::Missing(id) => write!(f, "required setting {:?} missing", id),
            ConfigurationError::WrongType(id) => write!(f, "setting {:?} has the wrong type", id),
            ConfigurationError::ValueTooLong(id) => write!(f, "setting {:?} is too long", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SettingsAccessorId {
    DeviceId,
    DeviceName,
    NetworkSsid,
    NetworkPassword,
    EndpointUser,
    EndpointPassword,
    /// `"mqtt"` or `"http"`
    EndpointKind,
    EndpointHost,
    EndpointPort,
    /// Topic root for MQTT, request path for HTTP
    EndpointPath,
    ScaleFactor,
    ScaleOffset,
    BatteryDividerRatio,
    BatteryOffset,
    AdcFullScale,
    AdcReferenceVolts,
    SleepIntervalSeconds,
    ButtonSleepSeconds,
    DisplayEnabled,
    ScreenDwellMs,
    LoadCellSamples,
    PublishBudgetMs,
    RetryPauseMs,
    DiscoveryPrefix,
}

#[derive(Clone, PartialEq, Debug, Default)]
pub enum SettingValue {
    #[default]
    Default,
    Float(f32),
    SmallUInt(u8),
    UInt(u32),
    Int(i32),
    Bool(bool),
    Text(String<MAX_SETTING_TEXT_LEN>),
}

/// Read side of whatever persists the node's settings.
pub trait SettingsAccessor {
    async fn get_setting(&self, id: SettingsAccessorId) -> Option<SettingValue>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceConfig {
    pub device_id: String<MAX_DEVICE_ID_LEN>,
    /// Human readable name used in discovery documents
    pub device_name: String<MAX_DEVICE_ID_LEN>,
    pub credentials: Credentials,
    pub endpoint: Endpoint,
    pub calibration: CalibrationProfile,
    pub sleep_interval: Duration,
    /// Sleep after a button triggered peek
    pub button_sleep: Duration,
    /// Sleep when a press arrived while a cycle was running
    pub deferred_button_sleep: Duration,
    pub display_enabled: bool,
    pub screen_dwell: Duration,
    pub load_cell_samples: usize,
    pub load_cell_timeout: Duration,
    pub climate_timeout: Duration,
    pub battery_timeout: Duration,
    pub publish_budget: Duration,
    pub retry_pause: Duration,
    pub discovery_prefix: String<32>,
}

impl DeviceConfig {
    /// Configuration with every tunable at its default.
    pub fn new(device_id: &str, endpoint: Endpoint) -> Result<Self, ConfigurationError> {
        let device_id: String<MAX_DEVICE_ID_LEN> =
            String::try_from(device_id).map_err(|_| ConfigurationError::InvalidIdentity)?;

        let config = Self {
            device_name: device_id.clone(),
            device_id,
            credentials: Credentials::default(),
            endpoint,
            calibration: CalibrationProfile::default(),
            sleep_interval: DEFAULT_SLEEP_INTERVAL,
            button_sleep: DEFAULT_BUTTON_SLEEP,
            deferred_button_sleep: DEFAULT_DEFERRED_BUTTON_SLEEP,
            display_enabled: true,
            screen_dwell: DEFAULT_SCREEN_DWELL,
            load_cell_samples: DEFAULT_LOAD_CELL_SAMPLES,
            load_cell_timeout: DEFAULT_LOAD_CELL_TIMEOUT,
            climate_timeout: DEFAULT_CLIMATE_TIMEOUT,
            battery_timeout: DEFAULT_BATTERY_TIMEOUT,
            publish_budget: DEFAULT_PUBLISH_BUDGET,
            retry_pause: DEFAULT_RETRY_PAUSE,
            discovery_prefix: String::try_from(DEFAULT_DISCOVERY_PREFIX)
                .map_err(|_| ConfigurationError::ValueTooLong(SettingsAccessorId::DiscoveryPrefix))?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Build the configuration from stored settings. Absent tunables take their defaults, the
    /// device id and endpoint host have none.
    pub async fn load<SA: SettingsAccessor>(settings: &SA) -> Result<Self, ConfigurationError> {
        let result = Self::load_unchecked(settings).await.and_then(|config| {
            config.validate()?;
            Ok(config)
        });
        if let Err(e) = &result {
            error!("Configuration rejected: {:?}", e);
        }
        result
    }

    async fn load_unchecked<SA: SettingsAccessor>(
        settings: &SA,
    ) -> Result<Self, ConfigurationError> {
        use SettingsAccessorId as Id;
        let reader = SettingsReader(settings);

        let device_id = reader
            .text::<MAX_DEVICE_ID_LEN>(Id::DeviceId)
            .await?
            .ok_or(ConfigurationError::Missing(Id::DeviceId))?;
        let endpoint = reader.endpoint().await?;

        let mut config = Self::new(device_id.as_str(), endpoint)?;

        if let Some(name) = reader.text(Id::DeviceName).await? {
            config.device_name = name;
        }
        config.credentials = Credentials {
            network_ssid: reader.text(Id::NetworkSsid).await?.unwrap_or_default(),
            network_password: reader.text(Id::NetworkPassword).await?.unwrap_or_default(),
            username: reader.text(Id::EndpointUser).await?.unwrap_or_default(),
            password: reader.text(Id::EndpointPassword).await?.unwrap_or_default(),
        };

        let defaults = CalibrationProfile::default();
        let adc_full_scale = reader
            .uint(Id::AdcFullScale, defaults.adc_full_scale() as u32)
            .await?
            .try_into()
            .map_err(|_| ConfigurationError::InvalidAdcScale)?;
        config.calibration = CalibrationProfile::new(
            reader.float(Id::ScaleFactor, defaults.scale_factor()).await?,
            reader.int(Id::ScaleOffset, defaults.scale_offset()).await?,
            reader
                .float(Id::BatteryDividerRatio, defaults.battery_divider_ratio())
                .await?,
            reader.float(Id::BatteryOffset, defaults.battery_offset()).await?,
        )?
        .with_adc(
            adc_full_scale,
            reader
                .float(Id::AdcReferenceVolts, defaults.adc_reference_volts())
                .await?,
        )?;

        config.sleep_interval = reader
            .seconds(Id::SleepIntervalSeconds, DEFAULT_SLEEP_INTERVAL)
            .await?;
        config.button_sleep = reader
            .seconds(Id::ButtonSleepSeconds, DEFAULT_BUTTON_SLEEP)
            .await?;
        config.display_enabled = reader.flag(Id::DisplayEnabled, true).await?;
        config.screen_dwell = reader.millis(Id::ScreenDwellMs, DEFAULT_SCREEN_DWELL).await?;
        config.load_cell_samples = reader
            .uint(Id::LoadCellSamples, DEFAULT_LOAD_CELL_SAMPLES as u32)
            .await? as usize;
        config.publish_budget = reader
            .millis(Id::PublishBudgetMs, DEFAULT_PUBLISH_BUDGET)
            .await?;
        config.retry_pause = reader.millis(Id::RetryPauseMs, DEFAULT_RETRY_PAUSE).await?;
        if let Some(prefix) = reader.text(Id::DiscoveryPrefix).await? {
            config.discovery_prefix = prefix;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.device_id.is_empty()
            || !self
                .device_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ConfigurationError::InvalidIdentity);
        }
        if self.endpoint.host().is_empty() || self.endpoint.port() == 0 {
            return Err(ConfigurationError::InvalidEndpoint);
        }
        self.calibration.validate()?;
        if self.load_cell_samples == 0 || self.load_cell_samples > MAX_LOAD_CELL_SAMPLES {
            return Err(ConfigurationError::InvalidSampleCount);
        }
        if self.sleep_interval == Duration::from_ticks(0) {
            return Err(ConfigurationError::InvalidSleepInterval);
        }
        if self.publish_budget == Duration::from_ticks(0) {
            return Err(ConfigurationError::InvalidPublishBudget);
        }
        Ok(())
    }
}

/// Typed reads on top of a [`SettingsAccessor`]. Absent or `Default` values fall back to the
/// supplied default, a value of the wrong kind is an error.
struct SettingsReader<'s, SA>(&'s SA);

impl<SA: SettingsAccessor> SettingsReader<'_, SA> {
    async fn text<const N: usize>(
        &self,
        id: SettingsAccessorId,
    ) -> Result<Option<String<N>>, ConfigurationError> {
        match self.0.get_setting(id).await {
            None | Some(SettingValue::Default) => Ok(None),
            Some(SettingValue::Text(t)) => String::try_from(t.as_str())
                .map(Some)
                .map_err(|_| ConfigurationError::ValueTooLong(id)),
            Some(_) => Err(ConfigurationError::WrongType(id)),
        }
    }

    async fn float(&self, id: SettingsAccessorId, default: f32) -> Result<f32, ConfigurationError> {
        match self.0.get_setting(id).await {
            None | Some(SettingValue::Default) => Ok(default),
            Some(SettingValue::Float(v)) => Ok(v),
            Some(SettingValue::Int(v)) => Ok(v as f32),
            Some(SettingValue::UInt(v)) => Ok(v as f32),
            Some(SettingValue::SmallUInt(v)) => Ok(v as f32),
            Some(_) => Err(ConfigurationError::WrongType(id)),
        }
    }

    async fn int(&self, id: SettingsAccessorId, default: i32) -> Result<i32, ConfigurationError> {
        match self.0.get_setting(id).await {
            None | Some(SettingValue::Default) => Ok(default),
            Some(SettingValue::Int(v)) => Ok(v),
            Some(SettingValue::SmallUInt(v)) => Ok(v as i32),
            Some(SettingValue::UInt(v)) => {
                v.try_into().map_err(|_| ConfigurationError::WrongType(id))
            }
            Some(_) => Err(ConfigurationError::WrongType(id)),
        }
    }

    async fn uint(&self, id: SettingsAccessorId, default: u32) -> Result<u32, ConfigurationError> {
        match self.0.get_setting(id).await {
            None | Some(SettingValue::Default) => Ok(default),
            Some(SettingValue::UInt(v)) => Ok(v),
            Some(SettingValue::SmallUInt(v)) => Ok(v as u32),
            Some(SettingValue::Int(v)) => {
                v.try_into().map_err(|_| ConfigurationError::WrongType(id))
            }
            Some(_) => Err(ConfigurationError::WrongType(id)),
        }
    }

    async fn flag(&self, id: SettingsAccessorId, default: bool) -> Result<bool, ConfigurationError> {
        match self.0.get_setting(id).await {
            None | Some(SettingValue::Default) => Ok(default),
            Some(SettingValue::Bool(v)) => Ok(v),
            Some(SettingValue::SmallUInt(v)) => Ok(v != 0),
            Some(_) => Err(ConfigurationError::WrongType(id)),
        }
    }

    async fn seconds(
        &self,
        id: SettingsAccessorId,
        default: Duration,
    ) -> Result<Duration, ConfigurationError> {
        let secs = self.uint(id, default.as_secs() as u32).await?;
        Ok(Duration::from_secs(secs as u64))
    }

    async fn millis(
        &self,
        id: SettingsAccessorId,
        default: Duration,
    ) -> Result<Duration, ConfigurationError> {
        let millis = self.uint(id, default.as_millis() as u32).await?;
        Ok(Duration::from_millis(millis as u64))
    }

    async fn endpoint(&self) -> Result<Endpoint, ConfigurationError> {
        use SettingsAccessorId as Id;

        let kind: Option<String<8>> = self.text(Id::EndpointKind).await?;
        let host: String<64> = self
            .text(Id::EndpointHost)
            .await?
            .ok_or(ConfigurationError::Missing(Id::EndpointHost))?;
        let path: Option<String<64>> = self.text(Id::EndpointPath).await?;

        match kind.as_deref().unwrap_or("mqtt") {
            "mqtt" => Endpoint::mqtt(
                host.as_str(),
                self.port(DEFAULT_MQTT_PORT).await?,
                path.as_deref().unwrap_or(DEFAULT_TOPIC_ROOT),
            )
            .map_err(|_| ConfigurationError::ValueTooLong(Id::EndpointPath)),
            "http" => Endpoint::http(
                host.as_str(),
                self.port(DEFAULT_HTTP_PORT).await?,
                path.as_deref().unwrap_or(DEFAULT_HTTP_PATH),
            )
            .map_err(|_| ConfigurationError::ValueTooLong(Id::EndpointPath)),
            _ => Err(ConfigurationError::WrongType(Id::EndpointKind)),
        }
    }

    async fn port(&self, default: u16) -> Result<u16, ConfigurationError> {
        self.uint(SettingsAccessorId::EndpointPort, default as u32)
            .await?
            .try_into()
            .map_err(|_| ConfigurationError::InvalidEndpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemorySettings;
    use embassy_futures::block_on;

    fn mqtt() -> Endpoint {
        Endpoint::mqtt("broker.local", DEFAULT_MQTT_PORT, DEFAULT_TOPIC_ROOT).unwrap()
    }

    fn minimal_settings() -> MemorySettings {
        MemorySettings::new()
            .with_text(SettingsAccessorId::DeviceId, "hive01")
            .with_text(SettingsAccessorId::EndpointHost, "broker.local")
    }

    #[test]
    fn defaults_follow_deployed_templates() {
        let config = DeviceConfig::new("hive01", mqtt()).unwrap();
        assert_eq!(config.sleep_interval, Duration::from_secs(7200));
        assert_eq!(config.load_cell_samples, 10);
        assert_eq!(config.screen_dwell, Duration::from_millis(2000));
        assert_eq!(config.calibration.battery_divider_ratio(), 2.0);
        assert_eq!(config.calibration.adc_full_scale(), 4095);
        assert_eq!(config.discovery_prefix.as_str(), "homeassistant");
        assert_eq!(config.device_name.as_str(), "hive01");
    }

    #[test]
    fn device_id_must_be_topic_safe() {
        assert_eq!(
            DeviceConfig::new("hive 01", mqtt()),
            Err(ConfigurationError::InvalidIdentity)
        );
        assert_eq!(
            DeviceConfig::new("hive/01", mqtt()),
            Err(ConfigurationError::InvalidIdentity)
        );
        assert_eq!(
            DeviceConfig::new("", mqtt()),
            Err(ConfigurationError::InvalidIdentity)
        );
    }

    #[test]
    fn validate_catches_edited_fields() {
        let mut config = DeviceConfig::new("hive01", mqtt()).unwrap();
        config.load_cell_samples = 0;
        assert_eq!(config.validate(), Err(ConfigurationError::InvalidSampleCount));

        let mut config = DeviceConfig::new("hive01", mqtt()).unwrap();
        config.load_cell_samples = MAX_LOAD_CELL_SAMPLES + 1;
        assert_eq!(config.validate(), Err(ConfigurationError::InvalidSampleCount));

        let mut config = DeviceConfig::new("hive01", mqtt()).unwrap();
        config.sleep_interval = Duration::from_ticks(0);
        assert_eq!(config.validate(), Err(ConfigurationError::InvalidSleepInterval));

        let mut config = DeviceConfig::new("hive01", mqtt()).unwrap();
        config.publish_budget = Duration::from_ticks(0);
        assert_eq!(config.validate(), Err(ConfigurationError::InvalidPublishBudget));
    }

    #[test]
    fn load_fills_defaults_around_required_settings() {
        let config = block_on(DeviceConfig::load(&minimal_settings())).unwrap();

        assert_eq!(config.device_id.as_str(), "hive01");
        assert_eq!(config.endpoint, mqtt());
        assert_eq!(config.sleep_interval, DEFAULT_SLEEP_INTERVAL);
        assert!(config.display_enabled);
    }

    #[test]
    fn load_reads_calibration_and_timing() {
        let settings = minimal_settings()
            .with(SettingsAccessorId::ScaleFactor, SettingValue::Float(520.0))
            .with(SettingsAccessorId::ScaleOffset, SettingValue::Int(100000))
            .with(SettingsAccessorId::BatteryOffset, SettingValue::Float(0.05))
            .with(SettingsAccessorId::SleepIntervalSeconds, SettingValue::UInt(900))
            .with(SettingsAccessorId::LoadCellSamples, SettingValue::SmallUInt(5))
            .with(SettingsAccessorId::DisplayEnabled, SettingValue::Bool(false))
            .with_text(SettingsAccessorId::DeviceName, "North row 3");

        let config = block_on(DeviceConfig::load(&settings)).unwrap();

        assert_eq!(config.calibration.scale_factor(), 520.0);
        assert_eq!(config.calibration.scale_offset(), 100000);
        assert_eq!(config.calibration.battery_offset(), 0.05);
        assert_eq!(config.sleep_interval, Duration::from_secs(900));
        assert_eq!(config.load_cell_samples, 5);
        assert!(!config.display_enabled);
        assert_eq!(config.device_name.as_str(), "North row 3");
    }

    #[test]
    fn zero_scale_factor_halts_loading() {
        let settings =
            minimal_settings().with(SettingsAccessorId::ScaleFactor, SettingValue::Float(0.0));
        assert_eq!(
            block_on(DeviceConfig::load(&settings)),
            Err(ConfigurationError::InvalidScaleFactor)
        );
    }

    #[test]
    fn missing_identity_or_host_is_fatal() {
        let no_id = MemorySettings::new().with_text(SettingsAccessorId::EndpointHost, "broker");
        assert_eq!(
            block_on(DeviceConfig::load(&no_id)),
            Err(ConfigurationError::Missing(SettingsAccessorId::DeviceId))
        );

        let no_host = MemorySettings::new().with_text(SettingsAccessorId::DeviceId, "hive01");
        assert_eq!(
            block_on(DeviceConfig::load(&no_host)),
            Err(ConfigurationError::Missing(SettingsAccessorId::EndpointHost))
        );
    }

    #[test]
    fn load_reads_endpoint_host_and_port() {
        let settings = MemorySettings::new()
            .with_text(SettingsAccessorId::DeviceId, "hive01")
            .with_text(SettingsAccessorId::EndpointHost, "apiary-gateway.lan")
            .with(SettingsAccessorId::EndpointPort, SettingValue::UInt(8883))
            .with_text(SettingsAccessorId::EndpointPath, "apiary");
        let config = block_on(DeviceConfig::load(&settings)).unwrap();

        assert_eq!(
            config.endpoint,
            Endpoint::mqtt("apiary-gateway.lan", 8883, "apiary").unwrap()
        );
    }

    #[test]
    fn http_endpoint_gets_its_own_defaults() {
        let settings = minimal_settings().with_text(SettingsAccessorId::EndpointKind, "http");
        let config = block_on(DeviceConfig::load(&settings)).unwrap();

        match config.endpoint {
            Endpoint::Http { port, path, .. } => {
                assert_eq!(port, DEFAULT_HTTP_PORT);
                assert_eq!(path.as_str(), DEFAULT_HTTP_PATH);
            }
            other => panic!("unexpected endpoint {:?}", other),
        }
    }

    #[test]
    fn mistyped_settings_are_rejected() {
        let settings =
            minimal_settings().with(SettingsAccessorId::ScaleFactor, SettingValue::Bool(true));
        assert_eq!(
            block_on(DeviceConfig::load(&settings)),
            Err(ConfigurationError::WrongType(SettingsAccessorId::ScaleFactor))
        );

        let settings = minimal_settings().with_text(SettingsAccessorId::EndpointKind, "coap");
        assert_eq!(
            block_on(DeviceConfig::load(&settings)),
            Err(ConfigurationError::WrongType(SettingsAccessorId::EndpointKind))
        );
    }
}
