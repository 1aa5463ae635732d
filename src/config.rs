// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Environment configuration.
//!
//! | Variable | Default |
//! |---|---|
//! | `LITTERROBOT_LOCAL` | `false` |
//! | `LITTERROBOT_EMAIL` | required for the cloud backend |
//! | `LITTERROBOT_PASSWORD` | required for the cloud backend |
//! | `LITTERROBOT_APIKEY` | key of the vendor app |
//! | `LITTERROBOT_LOOKUPINTERVAL` | `37s` |
//! | `LITTERROBOT_KNOWN` | empty; `id:address,id:address` |
//! | `MQTT_BROKER` | `tcp://localhost:1883` |
//! | `MQTT_CLIENTID` | generated |
//! | `MQTT_USERNAME` / `MQTT_PASSWORD` | none |
//! | `MQTT_DISCOVERY` | `false` |
//! | `MQTT_DISCOVERYPREFIX` | `homeassistant` |
//! | `MQTT_DISCOVERYNAME` | `litterrobot` |
//! | `MQTT_TOPICPREFIX` | `home/litterrobot` |
//! | `DEBUG` | `false` |
//!
//! Empty values count as unset.

use std::time::Duration;

use crate::appliance::{Backend, CloudConfig, LocalConfig};
use crate::error::{ConfigError, ProtocolError};
use crate::model::KnownRobots;
use crate::protocol::MqttSettings;
use crate::sink::SinkConfig;

const LOCAL: &str = "LITTERROBOT_LOCAL";
const EMAIL: &str = "LITTERROBOT_EMAIL";
const PASSWORD: &str = "LITTERROBOT_PASSWORD";
const API_KEY: &str = "LITTERROBOT_APIKEY";
const LOOKUP_INTERVAL: &str = "LITTERROBOT_LOOKUPINTERVAL";
const KNOWN: &str = "LITTERROBOT_KNOWN";
const MQTT_BROKER: &str = "MQTT_BROKER";
const MQTT_CLIENT_ID: &str = "MQTT_CLIENTID";
const MQTT_USERNAME: &str = "MQTT_USERNAME";
const MQTT_PASSWORD: &str = "MQTT_PASSWORD";
const MQTT_DISCOVERY: &str = "MQTT_DISCOVERY";
const MQTT_DISCOVERY_PREFIX: &str = "MQTT_DISCOVERYPREFIX";
const MQTT_DISCOVERY_NAME: &str = "MQTT_DISCOVERYNAME";
const MQTT_TOPIC_PREFIX: &str = "MQTT_TOPICPREFIX";
const DEBUG: &str = "DEBUG";

/// Which backend to talk to, with its settings.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    /// Vendor cloud API.
    Cloud(CloudConfig),
    /// Local UDP.
    Local(LocalConfig),
}

impl BackendConfig {
    /// Builds the backend client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn into_backend(self) -> Result<Backend, ProtocolError> {
        Ok(match self {
            Self::Cloud(config) => Backend::Cloud(config.into_client()?),
            Self::Local(config) => Backend::Local(config.into_client()),
        })
    }
}

/// Complete bridge configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend selection and settings.
    pub backend: BackendConfig,
    /// Broker connection.
    pub mqtt: MqttSettings,
    /// Topic layout and discovery.
    pub sink: SinkConfig,
    /// Robots to subscribe to and address commands at.
    pub known_robots: KnownRobots,
    /// Log at debug level.
    pub debug: bool,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns error if a value cannot be parsed or the cloud backend lacks
    /// credentials.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns error if a value cannot be parsed or the cloud backend lacks
    /// credentials.
    ///
    /// # Examples
    ///
    /// ```
    /// use litterbridge::config::{BackendConfig, Config};
    ///
    /// let config = Config::from_lookup(|key| match key {
    ///     "LITTERROBOT_LOCAL" => Some("true".to_string()),
    ///     "LITTERROBOT_KNOWN" => Some("a0b1c2:192.168.1.20".to_string()),
    ///     _ => None,
    /// })
    /// .unwrap();
    ///
    /// assert!(matches!(config.backend, BackendConfig::Local(_)));
    /// assert_eq!(config.known_robots.address("a0b1c2"), Some("192.168.1.20"));
    /// ```
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let flag = |key: &str| get(key).map_or(Ok(false), |value| parse_bool(key, &value));

        let backend = if flag(LOCAL)? {
            BackendConfig::Local(LocalConfig::new())
        } else {
            let email = get(EMAIL).ok_or_else(|| ConfigError::Missing(EMAIL.to_string()))?;
            let password =
                get(PASSWORD).ok_or_else(|| ConfigError::Missing(PASSWORD.to_string()))?;
            let mut cloud = CloudConfig::new(email, password);
            if let Some(api_key) = get(API_KEY) {
                cloud = cloud.with_api_key(api_key);
            }
            if let Some(interval) = get(LOOKUP_INTERVAL) {
                cloud = cloud.with_lookup_interval(parse_duration(LOOKUP_INTERVAL, &interval)?);
            }
            BackendConfig::Cloud(cloud)
        };

        let defaults = MqttSettings::default();
        let mqtt = MqttSettings {
            broker: get(MQTT_BROKER).unwrap_or(defaults.broker),
            client_id: get(MQTT_CLIENT_ID),
            username: get(MQTT_USERNAME),
            password: get(MQTT_PASSWORD),
            keep_alive: defaults.keep_alive,
        };

        let defaults = SinkConfig::default();
        let sink = SinkConfig {
            discovery: flag(MQTT_DISCOVERY)?,
            discovery_prefix: get(MQTT_DISCOVERY_PREFIX).unwrap_or(defaults.discovery_prefix),
            discovery_name: get(MQTT_DISCOVERY_NAME).unwrap_or(defaults.discovery_name),
            topic_prefix: get(MQTT_TOPIC_PREFIX).unwrap_or(defaults.topic_prefix),
        };

        Ok(Self {
            backend,
            mqtt,
            sink,
            known_robots: get(KNOWN)
                .map(|known| KnownRobots::parse(&known))
                .unwrap_or_default(),
            debug: flag(DEBUG)?,
        })
    }
}

/// Parses `true/false/1/0/yes/no`, ignoring case.
///
/// # Errors
///
/// Returns error for anything else.
pub fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Parses durations like `37s`, `2m`, `500ms`, `1h30m`, or `0`.
///
/// # Errors
///
/// Returns error for a missing or unknown unit, a missing number, or an
/// overflowing total.
pub fn parse_duration(key: &str, value: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration {
        key: key.to_string(),
        value: value.to_string(),
    };

    let text = value.trim();
    if text == "0" {
        return Ok(Duration::ZERO);
    }
    if text.is_empty() {
        return Err(invalid());
    }

    let mut total = Duration::ZERO;
    let mut rest = text;

    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        if digits == 0 {
            return Err(invalid());
        }
        let amount: u64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];

        let unit_len = rest.find(|c: char| c.is_ascii_digit()).unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let part = match unit {
            "ms" => Duration::from_millis(amount),
            "s" => Duration::from_secs(amount),
            "m" => Duration::from_secs(amount.checked_mul(60).ok_or_else(invalid)?),
            "h" => Duration::from_secs(amount.checked_mul(3600).ok_or_else(invalid)?),
            _ => return Err(invalid()),
        };
        total = total.checked_add(part).ok_or_else(invalid)?;
    }

    Ok(total)
}
