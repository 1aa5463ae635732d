// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Message bus abstraction and its MQTT implementation.
//!
//! The sink only depends on the [`Bus`] trait, so it can be driven by an
//! in-memory double in tests. [`MqttBus`] is the production implementation.

mod discovery;
mod mqtt;

use std::future::Future;

pub use discovery::{DeviceInfo, Discovery};
pub use mqtt::{
    MqttBus, MqttBusBuilder, MqttSettings, OFFLINE, ONLINE, ReconnectDelay, parse_mqtt_url,
};

use crate::error::ProtocolError;

/// A topic and payload pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Message {
    /// Topic.
    pub topic: String,
    /// UTF-8 payload.
    pub payload: String,
}

impl Message {
    /// Creates a message.
    #[must_use]
    pub fn new(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Something that happened on the bus connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    /// The broker accepted the connection (first connect or reconnect).
    Connected,
    /// A message arrived on a subscribed topic.
    Message {
        /// Topic the message arrived on.
        topic: String,
        /// UTF-8 payload.
        payload: String,
    },
    /// The connection was lost.
    Disconnected(String),
}

/// A publish/subscribe message bus.
pub trait Bus: Send + Sync + 'static {
    /// Publishes a retained message.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the message cannot be handed to the bus.
    fn publish(
        &self,
        topic: &str,
        payload: &str,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Subscribes to a topic. Matching messages arrive as
    /// [`BusEvent::Message`].
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if the subscription cannot be requested.
    fn subscribe(&self, topic: &str) -> impl Future<Output = Result<(), ProtocolError>> + Send;

    /// Publishes a discovery descriptor to its config topic.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolError` if encoding or publishing fails.
    fn register_discovery(
        &self,
        discovery: &Discovery,
    ) -> impl Future<Output = Result<(), ProtocolError>> + Send {
        let encoded = discovery.to_json();
        let topic = discovery.config_topic.clone();
        async move {
            let payload = encoded?;
            self.publish(&topic, &payload).await
        }
    }
}
