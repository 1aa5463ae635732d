// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The source adapter: robot state in from the backend, commands out to it.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::appliance::{ApplianceClient, ApplianceState};
use crate::comms::{DEFAULT_CHANNEL_CAPACITY, SourceChannels};
use crate::model::{Command, CommandRequest, KnownRobots, RobotState};

/// Feeds canonical state to the sink and executes its commands.
#[derive(Debug)]
pub struct Source<C: ApplianceClient> {
    client: C,
    known_robots: Arc<KnownRobots>,
    states: mpsc::Sender<RobotState>,
    commands: Option<mpsc::Receiver<CommandRequest>>,
}

impl<C: ApplianceClient> Source<C> {
    /// Creates a source around `client`.
    #[must_use]
    pub fn new(client: C, known_robots: Arc<KnownRobots>, channels: SourceChannels) -> Self {
        Self {
            client,
            known_robots,
            states: channels.states,
            commands: Some(channels.commands),
        }
    }

    /// Returns the backend client.
    #[must_use]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Starts the backend and spawns the source's loop.
    ///
    /// The loop forwards every backend state to the sink and dispatches every
    /// command from it. It ends once both the backend and the command channel
    /// are closed.
    pub fn run(self) -> JoinHandle<()> {
        let (vendor_tx, vendor_rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        let backend = self.client.run(vendor_tx);
        tokio::spawn(self.serve(vendor_rx, backend))
    }

    async fn serve(mut self, mut vendor: mpsc::Receiver<ApplianceState>, backend: JoinHandle<()>) {
        let Some(mut commands) = self.commands.take() else {
            tracing::error!("Source started twice");
            return;
        };
        let mut vendor_open = true;
        let mut commands_open = true;

        loop {
            tokio::select! {
                info = vendor.recv(), if vendor_open => match info {
                    Some(info) => self.forward_state(info).await,
                    None => {
                        tracing::debug!("Backend stopped producing states");
                        vendor_open = false;
                    }
                },
                request = commands.recv(), if commands_open => match request {
                    Some(request) => self.dispatch(request).await,
                    None => {
                        tracing::debug!("Command channel closed");
                        commands_open = false;
                    }
                },
                else => break,
            }
        }

        backend.abort();
        tracing::info!("Source stopped");
    }

    /// Converts a backend state and sends it to the sink.
    ///
    /// Waits while the state channel is full.
    pub async fn forward_state(&self, info: ApplianceState) {
        let state = RobotState::from(info);
        tracing::debug!(robot = %state.id, unit_status = %state.unit_status, "Forwarding state");

        if self.states.send(state).await.is_err() {
            tracing::error!("State channel closed, dropping state");
        }
    }

    /// Executes a command from the sink.
    ///
    /// Commands for robots missing from the configuration are ignored, since
    /// there is no address to reach them at. Backend errors are logged.
    pub async fn dispatch(&self, request: CommandRequest) {
        let Some(robot) = self.known_robots.get(request.robot_id()) else {
            tracing::warn!(
                robot = %request.robot_id(),
                command = %request.command,
                "Ignoring command for unknown robot"
            );
            return;
        };
        let (id, address) = (robot.id.as_str(), robot.address.as_str());

        let result = match &request.command {
            Command::Cycle => self.client.cycle(id, address).await,
            Command::Wait(minutes) => self.client.wait(id, address, minutes).await,
            Command::PowerOn => self.client.power_on(id, address).await,
            Command::PowerOff => self.client.power_off(id, address).await,
            Command::NightLightOn => self.client.night_light_on(id, address).await,
            Command::NightLightOff => self.client.night_light_off(id, address).await,
            Command::PanelLockOn => self.client.panel_lock_on(id, address).await,
            Command::PanelLockOff => self.client.panel_lock_off(id, address).await,
            Command::Unknown => {
                tracing::warn!(robot = %id, "Ignoring unknown command");
                return;
            }
        };

        if let Err(e) = result {
            tracing::error!(
                robot = %id,
                command = %request.command,
                error = %e,
                "Error sending command to Litter-Robot"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appliance::Instruction;
    use crate::comms::Comms;
    use crate::error::ProtocolError;
    use parking_lot::Mutex;

    #[derive(Debug, Default)]
    struct MockClient {
        sent: Arc<Mutex<Vec<(String, String, Instruction)>>>,
        reports: Vec<ApplianceState>,
        fail: bool,
    }

    impl ApplianceClient for MockClient {
        fn run(&self, states: mpsc::Sender<ApplianceState>) -> JoinHandle<()> {
            let reports = self.reports.clone();
            tokio::spawn(async move {
                for report in reports {
                    if states.send(report).await.is_err() {
                        return;
                    }
                }
            })
        }

        async fn send(
            &self,
            robot_id: &str,
            address: &str,
            instruction: Instruction,
        ) -> Result<(), ProtocolError> {
            self.sent
                .lock()
                .push((robot_id.to_string(), address.to_string(), instruction));
            if self.fail {
                Err(ProtocolError::ConnectionFailed("unreachable".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn known() -> Arc<KnownRobots> {
        Arc::new(KnownRobots::parse("A63afb501d65cb:192.168.1.20"))
    }

    #[tokio::test]
    async fn known_robot_commands_reach_the_client() {
        let client = MockClient::default();
        let sent = Arc::clone(&client.sent);
        let (source_channels, _sink) = Comms::new().split();
        let source = Source::new(client, known(), source_channels);

        source
            .dispatch(CommandRequest::new(Command::PowerOff, "a63afb501d65cb"))
            .await;
        source
            .dispatch(CommandRequest::new(Command::Wait("7".to_string()), "A63AFB501D65CB"))
            .await;

        let sent = sent.lock().clone();
        assert_eq!(
            sent,
            vec![
                (
                    "A63afb501d65cb".to_string(),
                    "192.168.1.20".to_string(),
                    Instruction::PowerOff
                ),
                (
                    "A63afb501d65cb".to_string(),
                    "192.168.1.20".to_string(),
                    Instruction::Wait("7".to_string())
                ),
            ]
        );
    }

    #[tokio::test]
    async fn every_command_maps_to_its_instruction() {
        let cases = [
            (Command::Cycle, Instruction::Cycle),
            (Command::PowerOn, Instruction::PowerOn),
            (Command::NightLightOn, Instruction::NightLightOn),
            (Command::NightLightOff, Instruction::NightLightOff),
            (Command::PanelLockOn, Instruction::PanelLockOn),
            (Command::PanelLockOff, Instruction::PanelLockOff),
        ];

        for (command, instruction) in cases {
            let client = MockClient::default();
            let sent = Arc::clone(&client.sent);
            let (source_channels, _sink) = Comms::new().split();
            let source = Source::new(client, known(), source_channels);

            source
                .dispatch(CommandRequest::new(command, "a63afb501d65cb"))
                .await;
            assert_eq!(sent.lock()[0].2, instruction);
        }
    }

    #[tokio::test]
    async fn unknown_robots_and_commands_are_ignored() {
        let client = MockClient::default();
        let sent = Arc::clone(&client.sent);
        let (source_channels, _sink) = Comms::new().split();
        let source = Source::new(client, known(), source_channels);

        source
            .dispatch(CommandRequest::new(Command::Cycle, "ffff0000"))
            .await;
        source
            .dispatch(CommandRequest::new(Command::Unknown, "a63afb501d65cb"))
            .await;

        assert!(sent.lock().is_empty());
    }

    #[tokio::test]
    async fn client_errors_are_swallowed() {
        let client = MockClient {
            fail: true,
            ..MockClient::default()
        };
        let sent = Arc::clone(&client.sent);
        let (source_channels, _sink) = Comms::new().split();
        let source = Source::new(client, known(), source_channels);

        source
            .dispatch(CommandRequest::new(Command::Cycle, "a63afb501d65cb"))
            .await;
        assert_eq!(sent.lock().len(), 1);
    }

    #[tokio::test]
    async fn run_forwards_converted_states() {
        let client = MockClient {
            reports: vec![ApplianceState {
                robot_id: "A63afb501d65cb".to_string(),
                unit_status: "CCC".to_string(),
                ..ApplianceState::default()
            }],
            ..MockClient::default()
        };
        let (source_channels, mut sink) = Comms::new().split();
        let handle = Source::new(client, known(), source_channels).run();

        let state = sink.states.recv().await.unwrap();
        assert_eq!(state.id, "A63afb501d65cb");
        assert_eq!(state.unit_status_raw, "CCC");
        assert!(state.power);
        assert!(state.cycle);

        drop(sink);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn run_dispatches_commands() {
        let client = MockClient::default();
        let sent = Arc::clone(&client.sent);
        let (source_channels, sink) = Comms::new().split();
        let handle = Source::new(client, known(), source_channels).run();

        sink.commands
            .send(CommandRequest::new(Command::NightLightOn, "a63afb501d65cb"))
            .await
            .unwrap();
        drop(sink);
        handle.await.unwrap();

        assert_eq!(sent.lock()[0].2, Instruction::NightLightOn);
    }
}
