// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Clients for the Litter-Robot backends.
//!
//! Two backends produce [`ApplianceState`] records and accept commands:
//!
//! - [`CloudClient`]: polls the vendor HTTP API on a fixed interval and
//!   dispatches commands through it.
//! - [`LocalClient`]: listens for the UDP status packets robots broadcast on
//!   the local network and sends commands straight to the robot.
//!
//! Both implement [`ApplianceClient`], the only interface the source adapter
//! depends on. [`Backend`] picks one at startup.

mod api;
mod cloud;
mod local;

use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use cloud::{CloudClient, CloudConfig};
pub use local::{LocalClient, LocalConfig, parse_packet};

use crate::error::ProtocolError;

/// Flag value the vendor uses for "on".
pub(crate) const ON_FLAG: &str = "1";

/// Flag value the vendor uses for "off".
pub(crate) const OFF_FLAG: &str = "0";

/// State of one robot as reported by a backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplianceState {
    /// Vendor robot identifier.
    pub robot_id: String,
    /// Hardware serial number (cloud only).
    pub robot_serial: String,
    /// Nickname (cloud) or sender IP address (local).
    pub name_or_ip: String,
    /// Power status code.
    pub power_status: String,
    /// Unit status code.
    pub unit_status: String,
    /// Completed cycles.
    pub cycle_count: String,
    /// Cycle capacity.
    pub cycle_capacity: String,
    /// Cycles since the drawer filled up.
    pub cycles_after_drawer_full: String,
    /// Drawer-full cycle counter.
    pub dfi_cycle_count: String,
    /// Clean-cycle wait time in minutes.
    pub clean_cycle_wait_time_minutes: String,
    /// Control panel lock.
    pub panel_lock_active: bool,
    /// Night light.
    pub night_light_active: bool,
    /// Offline notification already sent by the cloud.
    pub did_notify_offline: bool,
    /// Drawer-full indicator.
    pub dfi_triggered: bool,
    /// Sleep mode.
    pub sleep_mode_active: bool,
}

/// A command in the robot's own vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// `<P1`
    PowerOn,
    /// `<P0`
    PowerOff,
    /// `<C`
    Cycle,
    /// `<N1`
    NightLightOn,
    /// `<N0`
    NightLightOff,
    /// `<L1`
    PanelLockOn,
    /// `<L0`
    PanelLockOff,
    /// `<W` followed by the wait time in minutes.
    Wait(String),
}

impl Instruction {
    /// Returns the wire form understood by the robot and the cloud API.
    #[must_use]
    pub fn wire(&self) -> String {
        match self {
            Self::PowerOn => format!("<P{ON_FLAG}"),
            Self::PowerOff => format!("<P{OFF_FLAG}"),
            Self::Cycle => "<C".to_string(),
            Self::NightLightOn => format!("<N{ON_FLAG}"),
            Self::NightLightOff => format!("<N{OFF_FLAG}"),
            Self::PanelLockOn => format!("<L{ON_FLAG}"),
            Self::PanelLockOff => format!("<L{OFF_FLAG}"),
            Self::Wait(minutes) => format!("<W{minutes}"),
        }
    }
}

/// A backend that reports robot state and accepts commands.
///
/// Commands are fire-and-forget: the returned error only describes the
/// transport, never whether the robot acted on it.
pub trait ApplianceClient: Send + Sync + 'static {
    /// Starts the backend's own polling or listening loop.
    ///
    /// Every state the backend observes is sent on `states`. The loop ends
    /// when the receiving side is dropped.
    fn run(&self, states: mpsc::Sender<ApplianceState>) -> JoinHandle<()>;

    /// Sends an instruction to the robot `robot_id`, reachable at `address`.
    ///
    /// The cloud backend ignores `address`.
    fn send(
        &self,
        robot_id: &str,
        address: &str,
        instruction: Instruction,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Wakes the robot up.
    fn power_on(
        &self,
        robot_id: &str,
        address: &str,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send {
        tracing::debug!(robot = %robot_id, "Sending power on command");
        self.send(robot_id, address, Instruction::PowerOn)
    }

    /// Switches the robot off.
    fn power_off(
        &self,
        robot_id: &str,
        address: &str,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send {
        tracing::debug!(robot = %robot_id, "Sending power off command");
        self.send(robot_id, address, Instruction::PowerOff)
    }

    /// Starts a clean cycle.
    fn cycle(
        &self,
        robot_id: &str,
        address: &str,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send {
        tracing::debug!(robot = %robot_id, "Sending cycle command");
        self.send(robot_id, address, Instruction::Cycle)
    }

    /// Sets the clean-cycle wait time.
    fn wait(
        &self,
        robot_id: &str,
        address: &str,
        minutes: &str,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send {
        tracing::debug!(robot = %robot_id, minutes = %minutes, "Sending wait command");
        self.send(robot_id, address, Instruction::Wait(minutes.to_string()))
    }

    /// Turns the night light on.
    fn night_light_on(
        &self,
        robot_id: &str,
        address: &str,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send {
        tracing::debug!(robot = %robot_id, "Sending night light on command");
        self.send(robot_id, address, Instruction::NightLightOn)
    }

    /// Turns the night light off.
    fn night_light_off(
        &self,
        robot_id: &str,
        address: &str,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send {
        tracing::debug!(robot = %robot_id, "Sending night light off command");
        self.send(robot_id, address, Instruction::NightLightOff)
    }

    /// Locks the control panel.
    fn panel_lock_on(
        &self,
        robot_id: &str,
        address: &str,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send {
        tracing::debug!(robot = %robot_id, "Sending panel lock on command");
        self.send(robot_id, address, Instruction::PanelLockOn)
    }

    /// Unlocks the control panel.
    fn panel_lock_off(
        &self,
        robot_id: &str,
        address: &str,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send {
        tracing::debug!(robot = %robot_id, "Sending panel lock off command");
        self.send(robot_id, address, Instruction::PanelLockOff)
    }
}

/// The backend selected by configuration.
#[derive(Debug, Clone)]
pub enum Backend {
    /// Vendor cloud API.
    Cloud(CloudClient),
    /// Local UDP.
    Local(LocalClient),
}

impl ApplianceClient for Backend {
    fn run(&self, states: mpsc::Sender<ApplianceState>) -> JoinHandle<()> {
        match self {
            Self::Cloud(client) => client.run(states),
            Self::Local(client) => client.run(states),
        }
    }

    async fn send(
        &self,
        robot_id: &str,
        address: &str,
        instruction: Instruction,
    ) -> Result<(), ProtocolError> {
        match self {
            Self::Cloud(client) => client.send(robot_id, address, instruction).await,
            Self::Local(client) => client.send(robot_id, address, instruction).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instruction_wire_forms() {
        assert_eq!(Instruction::PowerOn.wire(), "<P1");
        assert_eq!(Instruction::PowerOff.wire(), "<P0");
        assert_eq!(Instruction::Cycle.wire(), "<C");
        assert_eq!(Instruction::NightLightOn.wire(), "<N1");
        assert_eq!(Instruction::NightLightOff.wire(), "<N0");
        assert_eq!(Instruction::PanelLockOn.wire(), "<L1");
        assert_eq!(Instruction::PanelLockOff.wire(), "<L0");
        assert_eq!(Instruction::Wait("7".to_string()).wire(), "<W7");
    }
}
