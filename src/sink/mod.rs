// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The sink adapter: robot state out to the bus, commands in from it.
//!
//! The sink keeps the last state seen for every robot and the last payload
//! published on every topic. Unchanged payloads are not published again,
//! except on the availability topic.
//!
//! Switch commands are answered optimistically: the command is queued for
//! the source and the cached state is patched and republished right away,
//! so a dashboard reflects the change before the next poll confirms or
//! contradicts it.

mod topics;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub use topics::Topics;

use crate::comms::SinkChannels;
use crate::model::{
    Category, Command, CommandRequest, FIELDS, FieldDescriptor, FieldKey, FieldValue, KnownRobots,
    RobotState, StatusLabels,
};
use crate::protocol::{Bus, BusEvent, DeviceInfo, Discovery, Message, ONLINE};

const PAYLOAD_ON: &str = "ON";
const PAYLOAD_OFF: &str = "OFF";
const UNIT_OF_MINUTES: &str = "min";

/// Unit status set optimistically for each command.
const STATUS_OFF: &str = "OFF";
const STATUS_READY: &str = "RDY";
const STATUS_CYCLING: &str = "CCP";

/// Bus-side settings of the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    /// Publish Home Assistant discovery descriptors on connect.
    pub discovery: bool,
    /// Prefix of discovery config topics.
    pub discovery_prefix: String,
    /// Node name used in discovery names and unique ids.
    pub discovery_name: String,
    /// Prefix of state, command, and availability topics.
    pub topic_prefix: String,
}

impl SinkConfig {
    /// Returns the topic layout for these settings.
    #[must_use]
    pub fn topics(&self) -> Topics {
        Topics::new(
            self.topic_prefix.clone(),
            self.discovery_prefix.clone(),
            self.discovery_name.clone(),
        )
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            discovery: false,
            discovery_prefix: "homeassistant".to_string(),
            discovery_name: "litterrobot".to_string(),
            topic_prefix: "home/litterrobot".to_string(),
        }
    }
}

/// Publishes robot state to a [`Bus`] and turns bus commands into
/// [`CommandRequest`]s.
pub struct Sink<B: Bus> {
    bus: B,
    config: SinkConfig,
    topics: Topics,
    labels: StatusLabels,
    known_robots: Arc<KnownRobots>,
    states: Option<mpsc::Receiver<RobotState>>,
    commands: mpsc::Sender<CommandRequest>,
    last_state: HashMap<String, RobotState>,
    last_published: HashMap<String, String>,
}

impl<B: Bus> Sink<B> {
    /// Creates a sink. The cache starts with an empty state for every known
    /// robot, so commands can be answered before the first poll.
    #[must_use]
    pub fn new(
        bus: B,
        config: SinkConfig,
        known_robots: Arc<KnownRobots>,
        labels: StatusLabels,
        channels: SinkChannels,
    ) -> Self {
        let last_state = known_robots
            .iter()
            .map(|robot| {
                let state = RobotState::with_id(robot.id.clone());
                (state.topic_id(), state)
            })
            .collect();

        Self {
            bus,
            topics: config.topics(),
            config,
            labels,
            known_robots,
            states: Some(channels.states),
            commands: channels.commands,
            last_state,
            last_published: HashMap::new(),
        }
    }

    /// Returns the topic layout.
    #[must_use]
    pub fn topics(&self) -> &Topics {
        &self.topics
    }

    /// Returns the bus.
    #[must_use]
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Returns the cached state of a robot.
    #[must_use]
    pub fn last_state(&self, id: &str) -> Option<&RobotState> {
        self.last_state.get(&id.to_ascii_lowercase())
    }

    /// Spawns the sink's loop.
    ///
    /// The loop publishes every state arriving from the source and reacts to
    /// `events` from the bus. It ends once both inputs are closed.
    pub fn run(self, events: mpsc::Receiver<BusEvent>) -> JoinHandle<()> {
        tokio::spawn(self.serve(events))
    }

    async fn serve(mut self, mut events: mpsc::Receiver<BusEvent>) {
        let Some(mut states) = self.states.take() else {
            tracing::error!("Sink started twice");
            return;
        };
        let mut states_open = true;
        let mut events_open = true;

        loop {
            tokio::select! {
                state = states.recv(), if states_open => match state {
                    Some(state) => {
                        self.publish(state).await;
                    }
                    None => {
                        tracing::debug!("State channel closed");
                        states_open = false;
                    }
                },
                event = events.recv(), if events_open => match event {
                    Some(event) => {
                        self.handle_event(event).await;
                    }
                    None => {
                        tracing::debug!("Bus event channel closed");
                        events_open = false;
                    }
                },
                else => break,
            }
        }

        tracing::info!("Sink stopped");
    }

    /// Reacts to one bus event.
    pub async fn handle_event(&mut self, event: BusEvent) {
        match event {
            BusEvent::Connected => self.on_connect().await,
            BusEvent::Message { topic, payload } => {
                self.handle_message(&topic, &payload).await;
            }
            BusEvent::Disconnected(reason) => {
                tracing::error!(reason = %reason, "Disconnected from MQTT");
            }
        }
    }

    /// Announces availability, subscribes to the command topics of every
    /// known robot, and registers discovery descriptors.
    pub async fn on_connect(&mut self) {
        tracing::info!("Connected to MQTT");
        self.announce_availability().await;
        self.subscribe().await;
        self.register_discovery().await;
    }

    /// Publishes `online` on the availability topic.
    pub async fn announce_availability(&mut self) -> Option<Message> {
        let topic = self.topics.availability();
        self.publish_message(topic, ONLINE.to_string()).await
    }

    /// Subscribes to every switch command topic of every known robot.
    pub async fn subscribe(&self) {
        let switches = FIELDS.iter().filter(|f| f.category == Category::Switch);

        for field in switches {
            for robot in self.known_robots.iter() {
                let topic = self.topics.command(&robot.id, field.bus_name());
                tracing::info!(topic = %topic, "Subscribing to a new topic");

                if let Err(e) = self.bus.subscribe(&topic).await {
                    tracing::error!(topic = %topic, error = %e, "Error subscribing to topic");
                }
            }
        }
    }

    /// Builds the discovery descriptors of every known robot.
    ///
    /// Returns nothing when discovery is disabled.
    #[must_use]
    pub fn discovery(&self) -> Vec<Discovery> {
        if !self.config.discovery {
            return Vec::new();
        }

        let availability = self.topics.availability();
        let mut descriptors = Vec::new();

        for robot in self.known_robots.iter() {
            let device = DeviceInfo {
                identifiers: vec![self.topics.device_id(&robot.id)],
                name: self.topics.device_name(&robot.id),
                sw_version: env!("CARGO_PKG_VERSION").to_string(),
            };

            for field in FIELDS.iter().filter(|f| f.is_discoverable()) {
                let name = field.bus_name();
                descriptors.push(Discovery {
                    component: field.category,
                    config_topic: self.topics.config(field.category, &robot.id, name),
                    name: self.topics.unique_name(&robot.id, name),
                    unique_id: self.topics.unique_id(&robot.id, name),
                    availability_topic: availability.clone(),
                    state_topic: self.topics.state(&robot.id, name),
                    command_topic: (field.category == Category::Switch)
                        .then(|| self.topics.command(&robot.id, name)),
                    unit_of_measurement: (field.key == FieldKey::CleanCycleWaitTimeMinutes)
                        .then(|| UNIT_OF_MINUTES.to_string()),
                    device: device.clone(),
                });
            }
        }

        descriptors
    }

    async fn register_discovery(&self) {
        for discovery in self.discovery() {
            tracing::debug!(topic = %discovery.config_topic, "Publishing discovery");
            if let Err(e) = self.bus.register_discovery(&discovery).await {
                tracing::error!(
                    unique_id = %discovery.unique_id,
                    error = %e,
                    "Error publishing discovery"
                );
            }
        }
    }

    /// Publishes every exposed field of `state` and caches it.
    ///
    /// Returns the messages actually handed to the bus.
    pub async fn publish(&mut self, state: RobotState) -> Vec<Message> {
        if !self.known_robots.contains(&state.id) {
            tracing::warn!(
                robot = %state.id,
                serial = %state.serial,
                "New litter robot observed"
            );
        }

        let mut sent = Vec::new();

        for field in FIELDS.iter().filter(|f| f.is_published()) {
            let payload = match field.value(&state) {
                FieldValue::Flag(true) => PAYLOAD_ON,
                FieldValue::Flag(false) => PAYLOAD_OFF,
                FieldValue::Text(code) if field.key == FieldKey::UnitStatus => {
                    self.labels.display(code)
                }
                FieldValue::Text(text) => text,
            };

            if payload.is_empty() {
                continue;
            }

            let topic = self.topics.state(&state.id, field.bus_name());
            let payload = payload.to_string();
            if let Some(message) = self.publish_message(topic, payload).await {
                sent.push(message);
            }
        }

        self.last_state.insert(state.topic_id(), state);
        sent
    }

    async fn publish_message(&mut self, topic: String, payload: String) -> Option<Message> {
        let repeatable = topic == self.topics.availability();
        if !repeatable && self.last_published.get(&topic) == Some(&payload) {
            tracing::debug!(topic = %topic, payload = %payload, "Duplicate payload");
            return None;
        }

        tracing::info!(topic = %topic, payload = %payload, "Publishing to MQTT");

        if let Err(e) = self.bus.publish(&topic, &payload).await {
            tracing::error!(topic = %topic, error = %e, "Publishing error");
            return None;
        }

        self.last_published.insert(topic.clone(), payload.clone());
        Some(Message { topic, payload })
    }

    /// Routes a bus message to the matching command handler.
    pub async fn handle_message(&mut self, topic: &str, payload: &str) -> Vec<Message> {
        let switch = self
            .topics
            .command_field(topic)
            .and_then(FieldDescriptor::by_bus_name)
            .filter(|field| field.category == Category::Switch);

        match switch.map(|field| field.key) {
            Some(FieldKey::Power) => self.command_power(topic, payload).await,
            Some(FieldKey::Cycle) => self.command_cycle(topic, payload).await,
            Some(FieldKey::NightLightActive) => self.command_night_light(topic, payload).await,
            Some(FieldKey::PanelLockActive) => self.command_panel_lock(topic, payload).await,
            _ => {
                tracing::error!(topic = %topic, payload = %payload, "Unexpected message");
                Vec::new()
            }
        }
    }

    /// Handles `ON`/`OFF` on a power command topic.
    pub async fn command_power(&mut self, topic: &str, payload: &str) -> Vec<Message> {
        let command = Command::from_switch(payload, Command::PowerOn, Command::PowerOff);
        self.apply_command(topic, command).await
    }

    /// Handles any payload on a cycle command topic.
    pub async fn command_cycle(&mut self, topic: &str, _payload: &str) -> Vec<Message> {
        self.apply_command(topic, Command::Cycle).await
    }

    /// Handles `ON`/`OFF` on a night light command topic.
    pub async fn command_night_light(&mut self, topic: &str, payload: &str) -> Vec<Message> {
        let command = Command::from_switch(payload, Command::NightLightOn, Command::NightLightOff);
        self.apply_command(topic, command).await
    }

    /// Handles `ON`/`OFF` on a panel lock command topic.
    pub async fn command_panel_lock(&mut self, topic: &str, payload: &str) -> Vec<Message> {
        let command = Command::from_switch(payload, Command::PanelLockOn, Command::PanelLockOff);
        self.apply_command(topic, command).await
    }

    async fn apply_command(&mut self, topic: &str, command: Command) -> Vec<Message> {
        let Some(id) = self.topics.parse_identifier(topic) else {
            tracing::error!(topic = %topic, "Unable to find a robot identifier in command topic");
            return Vec::new();
        };

        tracing::info!(robot = %id, command = %command, "Received command");

        if self
            .commands
            .send(CommandRequest::new(command.clone(), id.clone()))
            .await
            .is_err()
        {
            tracing::error!(robot = %id, "Command channel closed, dropping command");
        }

        let mut state = self
            .last_state
            .get(&id.to_ascii_lowercase())
            .cloned()
            .unwrap_or_else(|| RobotState::with_id(id));
        patch(&mut state, &command);

        self.publish(state).await
    }
}

/// Applies the expected outcome of `command` to `state`.
fn patch(state: &mut RobotState, command: &Command) {
    match command {
        Command::PowerOff => state.unit_status = STATUS_OFF.to_string(),
        Command::PowerOn => state.unit_status = STATUS_READY.to_string(),
        Command::Cycle => {
            state.unit_status = STATUS_CYCLING.to_string();
            state.unit_status_raw = STATUS_CYCLING.to_string();
        }
        Command::NightLightOn => state.night_light_active = true,
        Command::NightLightOff => state.night_light_active = false,
        Command::PanelLockOn => state.panel_lock_active = true,
        Command::PanelLockOff => state.panel_lock_active = false,
        Command::Wait(_) | Command::Unknown => {}
    }
    state.refresh_derived();
}

impl<B: Bus + std::fmt::Debug> std::fmt::Debug for Sink<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sink")
            .field("bus", &self.bus)
            .field("config", &self.config)
            .field("known_robots", &self.known_robots)
            .field("cached", &self.last_state.len())
            .finish_non_exhaustive()
    }
}
