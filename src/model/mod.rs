// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The bridge's canonical data model.
//!
//! Everything in here is a plain value: the canonical robot state, the static
//! field table used to walk it, the command vocabulary, the unit status labels
//! and the configured robot list.

mod command;
mod field;
mod known_robots;
mod state;
mod status;

pub use command::{Command, CommandRequest};
pub use field::{Category, FIELDS, FieldDescriptor, FieldKey, FieldValue};
pub use known_robots::{KnownRobot, KnownRobots};
pub use state::RobotState;
pub use status::StatusLabels;
