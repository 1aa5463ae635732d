// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `litterbridge` - Bridges Litter-Robot appliances to an MQTT bus.
//!
//! Robot state is read from the vendor cloud API or the robots' local UDP
//! traffic, normalized, and published as retained per-field topics. Switch
//! commands arriving on the bus are sent back to the robots.
//!
//! # Architecture
//!
//! ```text
//!            states                    states
//! backend ─────────▶ Source ──────────────────▶ Sink ─────▶ MQTT
//! backend ◀───────── Source ◀────────────────── Sink ◀───── MQTT
//!          instructions        commands                commands
//! ```
//!
//! - [`appliance`]: the cloud and local backends behind [`ApplianceClient`]
//! - [`source`]: converts backend states and executes commands
//! - [`sink`]: publishes state, discovery and availability; parses commands
//! - [`protocol`]: the [`Bus`] trait and its MQTT implementation
//! - [`comms`]: the bounded channel pair between source and sink
//!
//! # Supported Features
//!
//! - **State publishing**: one retained topic per field, deduplicated
//! - **Commands**: power, clean cycle, night light, panel lock
//! - **Home Assistant discovery**: sensors, binary sensors and switches
//! - **Availability**: `online` on connect, `offline` as last will
//!
//! # Quick Start
//!
//! ```no_run
//! use litterbridge::{Bridge, Config};
//!
//! #[tokio::main]
//! async fn main() -> litterbridge::Result<()> {
//!     let config = Config::from_env()?;
//!     Bridge::connect(config)?.run().await
//! }
//! ```
//!
//! # Error Handling
//!
//! Startup failures are returned as [`Error`]. Once running, failures are
//! logged through `tracing` and the bridge moves on to the next event.

pub mod appliance;
pub mod bridge;
pub mod comms;
pub mod config;
pub mod error;
pub mod model;
pub mod protocol;
pub mod sink;
pub mod source;

pub use appliance::{ApplianceClient, ApplianceState, Backend, CloudClient, LocalClient};
pub use bridge::Bridge;
pub use comms::Comms;
pub use config::Config;
pub use error::{ConfigError, Error, ParseError, ProtocolError, Result};
pub use model::{Command, CommandRequest, KnownRobots, RobotState};
pub use protocol::{Bus, BusEvent, MqttBus};
pub use sink::{Sink, SinkConfig};
pub use source::Source;
