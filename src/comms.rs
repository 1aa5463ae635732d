// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The channel pair coupling the source and the sink.
//!
//! ```text
//!  Source ──states──▶ Sink
//!  Source ◀─commands── Sink
//! ```
//!
//! Both channels are bounded. A full channel makes the sender wait, which
//! throttles the producing side instead of buffering without limit.

use tokio::sync::mpsc;

use crate::model::{CommandRequest, RobotState};

/// Default capacity of each channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// Both halves of the channel pair, before they are handed out.
#[derive(Debug)]
pub struct Comms {
    source: SourceChannels,
    sink: SinkChannels,
}

/// The source's ends: sends states, receives commands.
#[derive(Debug)]
pub struct SourceChannels {
    /// Canonical states toward the sink.
    pub states: mpsc::Sender<RobotState>,
    /// Commands from the sink.
    pub commands: mpsc::Receiver<CommandRequest>,
}

/// The sink's ends: receives states, sends commands.
#[derive(Debug)]
pub struct SinkChannels {
    /// Canonical states from the source.
    pub states: mpsc::Receiver<RobotState>,
    /// Commands toward the source.
    pub commands: mpsc::Sender<CommandRequest>,
}

impl Comms {
    /// Creates the channel pair with [`DEFAULT_CHANNEL_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Creates the channel pair with the given capacity per channel.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (state_tx, state_rx) = mpsc::channel(capacity);
        let (command_tx, command_rx) = mpsc::channel(capacity);

        Self {
            source: SourceChannels {
                states: state_tx,
                commands: command_rx,
            },
            sink: SinkChannels {
                states: state_rx,
                commands: command_tx,
            },
        }
    }

    /// Splits the pair into the source's and the sink's ends.
    #[must_use]
    pub fn split(self) -> (SourceChannels, SinkChannels) {
        (self.source, self.sink)
    }
}

impl Default for Comms {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Command;

    #[tokio::test]
    async fn states_flow_from_source_to_sink() {
        let (source, mut sink) = Comms::new().split();

        source
            .states
            .send(RobotState::with_id("first"))
            .await
            .unwrap();
        source
            .states
            .send(RobotState::with_id("second"))
            .await
            .unwrap();

        assert_eq!(sink.states.recv().await.unwrap().id, "first");
        assert_eq!(sink.states.recv().await.unwrap().id, "second");
    }

    #[tokio::test]
    async fn commands_flow_from_sink_to_source() {
        let (mut source, sink) = Comms::new().split();

        sink.commands
            .send(CommandRequest::new(Command::Cycle, "abc"))
            .await
            .unwrap();

        let request = source.commands.recv().await.unwrap();
        assert_eq!(request.command, Command::Cycle);
        assert_eq!(request.robot_id(), "abc");
    }

    #[test]
    fn channels_are_bounded() {
        let (source, _sink) = Comms::with_capacity(1).split();

        assert!(source.states.try_send(RobotState::default()).is_ok());
        assert!(source.states.try_send(RobotState::default()).is_err());
        assert_eq!(source.states.max_capacity(), 1);
    }

    #[test]
    fn default_capacity() {
        let (source, sink) = Comms::default().split();
        assert_eq!(source.states.max_capacity(), DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(sink.commands.max_capacity(), DEFAULT_CHANNEL_CAPACITY);
    }
}
