// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Commands travelling from the bus toward the appliance.

use std::fmt;

use super::RobotState;

/// A command the bridge can relay to a robot.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Command {
    /// Unrecognised command; ignored by the source.
    #[default]
    Unknown,
    /// Start a clean cycle.
    Cycle,
    /// Set the clean-cycle wait time (minutes, passed through verbatim).
    Wait(String),
    /// Wake the robot up.
    PowerOn,
    /// Switch the robot off.
    PowerOff,
    /// Lock the control panel.
    PanelLockOn,
    /// Unlock the control panel.
    PanelLockOff,
    /// Turn the night light on.
    NightLightOn,
    /// Turn the night light off.
    NightLightOff,
}

impl Command {
    /// Picks the on or off variant depending on an `ON`/`OFF` bus payload.
    ///
    /// The comparison is case-insensitive; anything but `ON` means off.
    #[must_use]
    pub fn from_switch(payload: &str, on: Self, off: Self) -> Self {
        if payload.trim().eq_ignore_ascii_case("ON") {
            on
        } else {
            off
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => f.write_str("unknown"),
            Self::Cycle => f.write_str("cycle"),
            Self::Wait(minutes) => write!(f, "wait {minutes}"),
            Self::PowerOn => f.write_str("power on"),
            Self::PowerOff => f.write_str("power off"),
            Self::PanelLockOn => f.write_str("panel lock on"),
            Self::PanelLockOff => f.write_str("panel lock off"),
            Self::NightLightOn => f.write_str("night light on"),
            Self::NightLightOff => f.write_str("night light off"),
        }
    }
}

/// A command addressed to one robot.
///
/// Only `state.id` is meaningful; the rest of the state is empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    /// What to do.
    pub command: Command,
    /// Which robot to do it to.
    pub state: RobotState,
}

impl CommandRequest {
    /// Creates a request for the robot identified by `id`.
    #[must_use]
    pub fn new(command: Command, id: impl Into<String>) -> Self {
        Self {
            command,
            state: RobotState::with_id(id),
        }
    }

    /// Returns the target robot identifier.
    #[must_use]
    pub fn robot_id(&self) -> &str {
        &self.state.id
    }
}
