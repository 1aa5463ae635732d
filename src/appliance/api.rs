// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wire types of the vendor cloud API.
//!
//! The API is inconsistent about value types: counters come back as strings
//! or numbers depending on the firmware, and `cycleCapacity` switches between
//! the two for the same robot. Every text field therefore goes through
//! [`loose_string`], and flags through [`loose_flag`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{ApplianceState, ON_FLAG};

/// Body of `POST /login`.
#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    #[serde(rename = "oneSignalPlayerId")]
    pub one_signal_player_id: &'a str,
    pub password: &'a str,
}

/// Response of `POST /login`.
#[derive(Debug, Deserialize)]
pub(crate) struct LoginResponse {
    #[serde(default, deserialize_with = "loose_string")]
    pub token: String,
    #[serde(default)]
    pub user: LoginUser,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LoginUser {
    #[serde(default, rename = "userId", deserialize_with = "loose_string")]
    pub user_id: String,
}

/// Body of `POST .../dispatch-commands`.
#[derive(Debug, Serialize)]
pub(crate) struct CommandBody<'a> {
    pub command: &'a str,
    #[serde(rename = "litterRobotId")]
    pub litter_robot_id: &'a str,
}

/// One element of `GET /users/{id}/litter-robots`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RobotResponse {
    #[serde(default, deserialize_with = "loose_string")]
    pub litter_robot_id: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub litter_robot_serial: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub litter_robot_nickname: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub power_status: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub unit_status: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub cycle_count: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub cycle_capacity: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub cycles_after_drawer_full: String,
    #[serde(default, rename = "DFICycleCount", deserialize_with = "loose_string")]
    pub dfi_cycle_count: String,
    #[serde(default, deserialize_with = "loose_string")]
    pub clean_cycle_wait_time_minutes: String,
    #[serde(default, deserialize_with = "loose_flag")]
    pub panel_lock_active: bool,
    #[serde(default, deserialize_with = "loose_flag")]
    pub night_light_active: bool,
    #[serde(default, deserialize_with = "loose_flag")]
    pub sleep_mode_active: bool,
    #[serde(default, rename = "isDFITriggered", deserialize_with = "loose_flag")]
    pub is_dfi_triggered: bool,
    #[serde(default, deserialize_with = "loose_flag")]
    pub did_notify_offline: bool,
}

impl From<RobotResponse> for ApplianceState {
    fn from(robot: RobotResponse) -> Self {
        Self {
            robot_id: robot.litter_robot_id,
            robot_serial: robot.litter_robot_serial,
            name_or_ip: robot.litter_robot_nickname,
            power_status: robot.power_status,
            unit_status: robot.unit_status,
            cycle_count: robot.cycle_count,
            cycle_capacity: robot.cycle_capacity,
            cycles_after_drawer_full: robot.cycles_after_drawer_full,
            dfi_cycle_count: robot.dfi_cycle_count,
            clean_cycle_wait_time_minutes: robot.clean_cycle_wait_time_minutes,
            panel_lock_active: robot.panel_lock_active,
            night_light_active: robot.night_light_active,
            did_notify_offline: robot.did_notify_offline,
            dfi_triggered: robot.is_dfi_triggered,
            sleep_mode_active: robot.sleep_mode_active,
        }
    }
}

/// Accepts a string, number, or boolean and keeps its text form.
fn loose_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text,
        Some(other) => other.to_string(),
    })
}

/// Accepts `"1"`, `1`, `true` as set; everything else as clear.
fn loose_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(flag)) => flag,
        Some(Value::String(text)) => text == ON_FLAG || text.eq_ignore_ascii_case("true"),
        Some(Value::Number(number)) => number.as_u64() == Some(1),
        _ => false,
    })
}
