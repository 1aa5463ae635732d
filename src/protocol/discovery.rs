// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Home Assistant MQTT discovery descriptors.

use serde::Serialize;

use crate::model::Category;

/// Device block shared by every entity of one robot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// Identifiers Home Assistant groups entities by.
    pub identifiers: Vec<String>,
    /// Device display name.
    pub name: String,
    /// Bridge version.
    pub sw_version: String,
}

/// One discovery message, announcing a single robot field as an entity.
///
/// Only the entity attributes are serialized; the component and config
/// topic decide where the message goes.
///
/// # Examples
///
/// ```
/// use litterbridge::model::Category;
/// use litterbridge::protocol::{DeviceInfo, Discovery};
///
/// let discovery = Discovery {
///     component: Category::Sensor,
///     config_topic: "homeassistant/sensor/litterrobot/abc_unitstatus/config".to_string(),
///     name: "litterrobot abc unitstatus".to_string(),
///     unique_id: "litterrobot.abc.unitstatus".to_string(),
///     availability_topic: "home/litterrobot/status".to_string(),
///     state_topic: "home/litterrobot/abc/unitstatus/state".to_string(),
///     command_topic: None,
///     unit_of_measurement: None,
///     device: DeviceInfo {
///         identifiers: vec!["litterrobot.abc".to_string()],
///         name: "litterrobot abc".to_string(),
///         sw_version: "0.1.0".to_string(),
///     },
/// };
///
/// let json = discovery.to_json().unwrap();
/// assert!(json.contains(r#""unique_id":"litterrobot.abc.unitstatus""#));
/// assert!(!json.contains("command_topic"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discovery {
    /// Entity component.
    #[serde(skip)]
    pub component: Category,
    /// Topic the descriptor is published to.
    #[serde(skip)]
    pub config_topic: String,
    /// Entity display name.
    pub name: String,
    /// Globally unique entity id.
    pub unique_id: String,
    /// Topic carrying `online`/`offline`.
    pub availability_topic: String,
    /// Topic carrying the entity state.
    pub state_topic: String,
    /// Topic accepting `ON`/`OFF`; switches only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_topic: Option<String>,
    /// Unit for numeric sensors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
    /// Device the entity belongs to.
    pub device: DeviceInfo,
}

impl Discovery {
    /// Encodes the descriptor as the JSON config payload.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn switch() -> Discovery {
        Discovery {
            component: Category::Switch,
            config_topic: "homeassistant/switch/lr/abc_power/config".to_string(),
            name: "lr abc power".to_string(),
            unique_id: "lr.abc.power".to_string(),
            availability_topic: "home/lr/status".to_string(),
            state_topic: "home/lr/abc/power/state".to_string(),
            command_topic: Some("home/lr/abc/power/command".to_string()),
            unit_of_measurement: None,
            device: DeviceInfo {
                identifiers: vec!["lr.abc".to_string()],
                name: "lr abc".to_string(),
                sw_version: "1.2.3".to_string(),
            },
        }
    }

    #[test]
    fn switch_payload_shape() {
        let value: serde_json::Value = serde_json::from_str(&switch().to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "lr abc power",
                "unique_id": "lr.abc.power",
                "availability_topic": "home/lr/status",
                "state_topic": "home/lr/abc/power/state",
                "command_topic": "home/lr/abc/power/command",
                "device": {
                    "identifiers": ["lr.abc"],
                    "name": "lr abc",
                    "sw_version": "1.2.3"
                }
            })
        );
    }

    #[test]
    fn unit_is_serialized_when_set() {
        let discovery = Discovery {
            unit_of_measurement: Some("min".to_string()),
            command_topic: None,
            ..switch()
        };
        let value: serde_json::Value =
            serde_json::from_str(&discovery.to_json().unwrap()).unwrap();
        assert_eq!(value["unit_of_measurement"], "min");
        assert!(value.get("command_topic").is_none());
    }
}
