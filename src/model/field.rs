// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static description of every [`RobotState`] field.
//!
//! The sink walks [`FIELDS`] to publish state and to build discovery
//! descriptors. Adding a field to [`RobotState`] means adding a row here.

use std::fmt;

use serde::Serialize;

use super::RobotState;

/// Home Assistant component a field is exposed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Free-text telemetry.
    Sensor,
    /// Read-only boolean.
    BinarySensor,
    /// Boolean that accepts commands.
    Switch,
}

impl Category {
    /// Returns the component name used in discovery topics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sensor => "sensor",
            Self::BinarySensor => "binary_sensor",
            Self::Switch => "switch",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a field independently of its bus name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKey {
    /// [`RobotState::id`].
    Id,
    /// [`RobotState::serial`].
    Serial,
    /// [`RobotState::name_or_ip`].
    NameOrIp,
    /// [`RobotState::power_status`].
    PowerStatus,
    /// [`RobotState::unit_status`].
    UnitStatus,
    /// [`RobotState::unit_status_raw`].
    UnitStatusRaw,
    /// [`RobotState::cycle_count`].
    CycleCount,
    /// [`RobotState::cycle_capacity`].
    CycleCapacity,
    /// [`RobotState::cycles_after_drawer_full`].
    CyclesAfterDrawerFull,
    /// [`RobotState::dfi_cycle_count`].
    DfiCycleCount,
    /// [`RobotState::clean_cycle_wait_time_minutes`].
    CleanCycleWaitTimeMinutes,
    /// [`RobotState::did_notify_offline`].
    DidNotifyOffline,
    /// [`RobotState::dfi_triggered`].
    DfiTriggered,
    /// [`RobotState::sleep_mode_active`].
    SleepModeActive,
    /// [`RobotState::power`].
    Power,
    /// [`RobotState::cycle`].
    Cycle,
    /// [`RobotState::panel_lock_active`].
    PanelLockActive,
    /// [`RobotState::night_light_active`].
    NightLightActive,
}

/// Value read out of a [`RobotState`] field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    /// A loosely typed text field.
    Text(&'a str),
    /// A boolean field.
    Flag(bool),
}

/// One row of the field table.
#[derive(Clone, Copy)]
pub struct FieldDescriptor {
    /// Which field this row describes.
    pub key: FieldKey,
    /// Lower-cased field name.
    pub name: &'static str,
    /// Topic segment used instead of `name`, if any.
    pub rename: Option<&'static str>,
    /// Discovery component.
    pub category: Category,
    /// Never published to a state topic.
    pub ignore_publish: bool,
    /// Never announced through discovery.
    pub ignore_discovery: bool,
    /// Reads the field from a state.
    pub read: fn(&RobotState) -> FieldValue<'_>,
}

impl FieldDescriptor {
    /// Returns the topic segment for this field.
    #[must_use]
    pub fn bus_name(&self) -> &'static str {
        self.rename.unwrap_or(self.name)
    }

    /// Returns true if the field is published on state topics.
    #[must_use]
    pub fn is_published(&self) -> bool {
        !self.ignore_publish
    }

    /// Returns true if the field gets a discovery descriptor.
    #[must_use]
    pub fn is_discoverable(&self) -> bool {
        !self.ignore_publish && !self.ignore_discovery
    }

    /// Reads this field from `state`.
    #[must_use]
    pub fn value<'a>(&self, state: &'a RobotState) -> FieldValue<'a> {
        (self.read)(state)
    }

    /// Finds the descriptor whose bus name is `name`.
    #[must_use]
    pub fn by_bus_name(name: &str) -> Option<&'static Self> {
        FIELDS.iter().find(|field| field.bus_name() == name)
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("key", &self.key)
            .field("name", &self.bus_name())
            .field("category", &self.category)
            .field("ignore_publish", &self.ignore_publish)
            .field("ignore_discovery", &self.ignore_discovery)
            .finish_non_exhaustive()
    }
}

const fn identity(
    key: FieldKey,
    name: &'static str,
    read: fn(&RobotState) -> FieldValue<'_>,
) -> FieldDescriptor {
    FieldDescriptor {
        key,
        name,
        rename: None,
        category: Category::Sensor,
        ignore_publish: true,
        ignore_discovery: true,
        read,
    }
}

const fn exposed(
    key: FieldKey,
    name: &'static str,
    category: Category,
    read: fn(&RobotState) -> FieldValue<'_>,
) -> FieldDescriptor {
    FieldDescriptor {
        key,
        name,
        rename: None,
        category,
        ignore_publish: false,
        ignore_discovery: false,
        read,
    }
}

/// Every field of [`RobotState`], in declaration order.
pub static FIELDS: [FieldDescriptor; 18] = [
    identity(FieldKey::Id, "id", |s| FieldValue::Text(&s.id)),
    identity(FieldKey::Serial, "serial", |s| FieldValue::Text(&s.serial)),
    identity(FieldKey::NameOrIp, "nameorip", |s| {
        FieldValue::Text(&s.name_or_ip)
    }),
    exposed(
        FieldKey::PowerStatus,
        "powerstatus",
        Category::Sensor,
        |s| FieldValue::Text(&s.power_status),
    ),
    exposed(FieldKey::UnitStatus, "unitstatus", Category::Sensor, |s| {
        FieldValue::Text(&s.unit_status)
    }),
    exposed(
        FieldKey::UnitStatusRaw,
        "unitstatusraw",
        Category::Sensor,
        |s| FieldValue::Text(&s.unit_status_raw),
    ),
    exposed(FieldKey::CycleCount, "cyclecount", Category::Sensor, |s| {
        FieldValue::Text(&s.cycle_count)
    }),
    exposed(
        FieldKey::CycleCapacity,
        "cyclecapacity",
        Category::Sensor,
        |s| FieldValue::Text(&s.cycle_capacity),
    ),
    exposed(
        FieldKey::CyclesAfterDrawerFull,
        "cyclesafterdrawerfull",
        Category::Sensor,
        |s| FieldValue::Text(&s.cycles_after_drawer_full),
    ),
    exposed(
        FieldKey::DfiCycleCount,
        "dficyclecount",
        Category::Sensor,
        |s| FieldValue::Text(&s.dfi_cycle_count),
    ),
    exposed(
        FieldKey::CleanCycleWaitTimeMinutes,
        "cleancyclewaittimeminutes",
        Category::Sensor,
        |s| FieldValue::Text(&s.clean_cycle_wait_time_minutes),
    ),
    exposed(
        FieldKey::DidNotifyOffline,
        "didnotifyoffline",
        Category::BinarySensor,
        |s| FieldValue::Flag(s.did_notify_offline),
    ),
    exposed(
        FieldKey::DfiTriggered,
        "dfitriggered",
        Category::BinarySensor,
        |s| FieldValue::Flag(s.dfi_triggered),
    ),
    exposed(
        FieldKey::SleepModeActive,
        "sleepmodeactive",
        Category::BinarySensor,
        |s| FieldValue::Flag(s.sleep_mode_active),
    ),
    exposed(FieldKey::Power, "power", Category::Switch, |s| {
        FieldValue::Flag(s.power)
    }),
    exposed(FieldKey::Cycle, "cycle", Category::Switch, |s| {
        FieldValue::Flag(s.cycle)
    }),
    exposed(
        FieldKey::PanelLockActive,
        "panellockactive",
        Category::Switch,
        |s| FieldValue::Flag(s.panel_lock_active),
    ),
    exposed(
        FieldKey::NightLightActive,
        "nightlightactive",
        Category::Switch,
        |s| FieldValue::Flag(s.night_light_active),
    ),
];
