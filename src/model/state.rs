// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Canonical robot state.

use crate::appliance::ApplianceState;

/// Unit status reported while the robot is switched off.
const UNIT_STATUS_OFF: &str = "OFF";

/// Prefix shared by all clean-cycle unit statuses (`CCP`, `CCC`).
const CLEAN_CYCLE_PREFIX: &str = "CC";

/// Normalized snapshot of one Litter-Robot.
///
/// Measured values stay strings: the vendor API is not consistent about
/// their types (`cycleCapacity` is a string when the drawer is full and a
/// number otherwise), so no numeric meaning is assumed.
///
/// # Examples
///
/// ```
/// use litterbridge::appliance::ApplianceState;
/// use litterbridge::model::RobotState;
///
/// let state = RobotState::from(ApplianceState {
///     robot_id: "a63afb501d65cb".to_string(),
///     unit_status: "CCP".to_string(),
///     ..ApplianceState::default()
/// });
/// assert!(state.power);
/// assert!(state.cycle);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotState {
    /// Opaque robot identifier, used for topics and command addressing.
    pub id: String,
    /// Hardware serial number, when the backend reports one.
    pub serial: String,
    /// Nickname (cloud) or sender IP address (local).
    pub name_or_ip: String,

    /// Raw power status code (`AC`, `DC`, `NC`).
    pub power_status: String,
    /// Unit status code; the sink maps it to a label when publishing.
    pub unit_status: String,
    /// Unit status code, always published verbatim.
    pub unit_status_raw: String,
    /// Number of completed cycles.
    pub cycle_count: String,
    /// Number of cycles before the drawer is considered full.
    pub cycle_capacity: String,
    /// Cycles run since the drawer-full indicator tripped.
    pub cycles_after_drawer_full: String,
    /// Device-internal drawer-full cycle counter.
    pub dfi_cycle_count: String,
    /// Delay before a clean cycle starts, in minutes.
    pub clean_cycle_wait_time_minutes: String,

    /// Whether the cloud already reported the robot offline.
    pub did_notify_offline: bool,
    /// Drawer-full indicator.
    pub dfi_triggered: bool,
    /// Sleep mode is active.
    pub sleep_mode_active: bool,
    /// Derived: awake and not switched off.
    pub power: bool,
    /// Derived: awake and in a clean cycle.
    pub cycle: bool,
    /// Control panel lock is active.
    pub panel_lock_active: bool,
    /// Night light is active.
    pub night_light_active: bool,
}

impl RobotState {
    /// Creates an empty state carrying only the identifier.
    ///
    /// Used to seed the sink's cache and to address commands.
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Returns the identifier as it appears in topics and cache keys.
    #[must_use]
    pub fn topic_id(&self) -> String {
        self.id.to_ascii_lowercase()
    }

    /// Recomputes [`power`](Self::power) and [`cycle`](Self::cycle) from the
    /// unit status and sleep mode.
    pub fn refresh_derived(&mut self) {
        let awake = !self.sleep_mode_active;
        self.power = awake && self.unit_status != UNIT_STATUS_OFF;
        self.cycle = awake && self.unit_status.starts_with(CLEAN_CYCLE_PREFIX);
    }
}

impl From<ApplianceState> for RobotState {
    fn from(info: ApplianceState) -> Self {
        let mut state = Self {
            id: info.robot_id,
            serial: info.robot_serial,
            name_or_ip: info.name_or_ip,
            power_status: info.power_status,
            unit_status_raw: info.unit_status.clone(),
            unit_status: info.unit_status,
            cycle_count: info.cycle_count,
            cycle_capacity: info.cycle_capacity,
            cycles_after_drawer_full: info.cycles_after_drawer_full,
            dfi_cycle_count: info.dfi_cycle_count,
            clean_cycle_wait_time_minutes: info.clean_cycle_wait_time_minutes,
            did_notify_offline: info.did_notify_offline,
            dfi_triggered: info.dfi_triggered,
            sleep_mode_active: info.sleep_mode_active,
            power: false,
            cycle: false,
            panel_lock_active: info.panel_lock_active,
            night_light_active: info.night_light_active,
        };
        state.refresh_derived();
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn appliance(unit_status: &str, sleeping: bool) -> ApplianceState {
        ApplianceState {
            robot_id: "A63afb501d65cb".to_string(),
            unit_status: unit_status.to_string(),
            sleep_mode_active: sleeping,
            ..ApplianceState::default()
        }
    }

    #[test]
    fn derived_flags_follow_unit_status_and_sleep_mode() {
        let cases = [
            ("RDY", false, true, false),
            ("OFF", false, false, false),
            ("CCP", false, true, true),
            ("CCC", false, true, true),
            ("CST", false, true, false),
            ("CCP", true, false, false),
            ("RDY", true, false, false),
            ("", false, true, false),
        ];

        for (status, sleeping, power, cycle) in cases {
            let state = RobotState::from(appliance(status, sleeping));
            assert_eq!(state.power, power, "power for {status} sleeping={sleeping}");
            assert_eq!(state.cycle, cycle, "cycle for {status} sleeping={sleeping}");
        }
    }

    #[test]
    fn conversion_copies_unit_status_to_raw() {
        let state = RobotState::from(appliance("DF1", false));
        assert_eq!(state.unit_status, "DF1");
        assert_eq!(state.unit_status_raw, "DF1");
    }

    #[test]
    fn conversion_keeps_identity_and_passthrough_fields() {
        let state = RobotState::from(ApplianceState {
            robot_id: "A63afb501d65cb".to_string(),
            robot_serial: "LR3A134568".to_string(),
            name_or_ip: "Kitchen".to_string(),
            cycle_capacity: "30".to_string(),
            panel_lock_active: true,
            did_notify_offline: true,
            ..ApplianceState::default()
        });

        assert_eq!(state.id, "A63afb501d65cb");
        assert_eq!(state.serial, "LR3A134568");
        assert_eq!(state.name_or_ip, "Kitchen");
        assert_eq!(state.cycle_capacity, "30");
        assert!(state.panel_lock_active);
        assert!(state.did_notify_offline);
        assert!(!state.night_light_active);
    }

    #[test]
    fn with_id_is_otherwise_empty() {
        let state = RobotState::with_id("abc");
        assert_eq!(state.id, "abc");
        assert!(state.unit_status.is_empty());
        assert!(!state.power);
    }

    #[test]
    fn refresh_derived_after_patch() {
        let mut state = RobotState::from(appliance("RDY", false));
        assert!(state.power);

        state.unit_status = "OFF".to_string();
        state.refresh_derived();
        assert!(!state.power);
        assert!(!state.cycle);

        state.unit_status = "CCP".to_string();
        state.refresh_derived();
        assert!(state.power);
        assert!(state.cycle);
    }

    #[test]
    fn topic_id_is_lowercase() {
        assert_eq!(
            RobotState::with_id("A63afb501d65cb").topic_id(),
            "a63afb501d65cb"
        );
    }
}
