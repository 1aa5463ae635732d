// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! MQTT bus connection.
//!
//! [`MqttBus`] owns a `rumqttc` client. Its event loop runs on its own task,
//! reconnects with [`ReconnectDelay`] after failures, and forwards
//! connection changes and inbound messages as [`BusEvent`]s.
//!
//! # Examples
//!
//! ```no_run
//! use litterbridge::protocol::{Bus, BusEvent, MqttBus};
//!
//! # async fn example() -> Result<(), litterbridge::error::ProtocolError> {
//! let (bus, mut events) = MqttBus::builder()
//!     .broker("tcp://192.168.1.50:1883")
//!     .credentials("user", "password")
//!     .last_will("home/litterrobot/status")
//!     .connect()?;
//!
//! while let Some(event) = events.recv().await {
//!     if matches!(event, BusEvent::Connected) {
//!         bus.publish("home/litterrobot/status", "online").await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, LastWill, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::{Bus, BusEvent};
use crate::error::ProtocolError;

/// Payload of the availability topic while the bridge is up.
pub const ONLINE: &str = "online";

/// Payload the broker publishes on the availability topic when the bridge
/// drops off.
pub const OFFLINE: &str = "offline";

const DEFAULT_PORT: u16 = 1883;
const CLIENT_ID_PREFIX: &str = "litterbridge-";
const REQUEST_CAPACITY: usize = 100;
const DEFAULT_EVENT_CAPACITY: usize = 100;

/// Connection parameters for the MQTT broker.
#[derive(Clone)]
pub struct MqttSettings {
    /// Broker URL: `tcp://host:port`, `mqtt://host:port`, or `host[:port]`.
    pub broker: String,
    /// Client identifier; generated when unset.
    pub client_id: Option<String>,
    /// Broker username.
    pub username: Option<String>,
    /// Broker password.
    pub password: Option<String>,
    /// Keep-alive interval.
    pub keep_alive: Duration,
}

impl Default for MqttSettings {
    fn default() -> Self {
        Self {
            broker: "tcp://localhost:1883".to_string(),
            client_id: None,
            username: None,
            password: None,
            keep_alive: Duration::from_secs(30),
        }
    }
}

impl fmt::Debug for MqttSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttSettings")
            .field("broker", &self.broker)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("keep_alive", &self.keep_alive)
            .finish()
    }
}

/// Delay before the next reconnection attempt.
///
/// Starts at zero. Each failure moves to the next step: 2 s, then double the
/// previous delay, falling back to 2 s once the delay would exceed two
/// minutes. A successful connection resets it to zero.
///
/// # Examples
///
/// ```
/// use litterbridge::protocol::ReconnectDelay;
/// use std::time::Duration;
///
/// let mut delay = ReconnectDelay::new();
/// assert_eq!(delay.current(), Duration::ZERO);
/// assert_eq!(delay.next_delay(), Duration::from_secs(2));
/// assert_eq!(delay.next_delay(), Duration::from_secs(4));
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconnectDelay {
    current: Duration,
}

impl ReconnectDelay {
    /// Delay after the first failure.
    pub const INITIAL: Duration = Duration::from_secs(2);
    /// Longest delay before wrapping back to [`Self::INITIAL`].
    pub const MAX: Duration = Duration::from_secs(120);

    /// Creates a delay at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            current: Duration::ZERO,
        }
    }

    /// Returns the current delay.
    #[must_use]
    pub const fn current(&self) -> Duration {
        self.current
    }

    /// Advances after a failure and returns the delay to wait.
    pub fn next_delay(&mut self) -> Duration {
        self.current = if self.current.is_zero() {
            Self::INITIAL
        } else {
            let doubled = self.current.saturating_mul(2);
            if doubled > Self::MAX {
                Self::INITIAL
            } else {
                doubled
            }
        };
        self.current
    }

    /// Resets to zero after a successful connection.
    pub fn reset(&mut self) {
        self.current = Duration::ZERO;
    }
}

/// Connection to the MQTT broker.
///
/// Cheap to clone; clones share the connection.
#[derive(Clone)]
pub struct MqttBus {
    inner: Arc<MqttBusInner>,
}

struct MqttBusInner {
    client: AsyncClient,
    host: String,
    port: u16,
    client_id: String,
    connected: Arc<AtomicBool>,
}

impl MqttBus {
    /// Creates a new builder.
    #[must_use]
    pub fn builder() -> MqttBusBuilder {
        MqttBusBuilder::default()
    }

    /// Returns whether the broker acknowledged the current connection.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::Acquire)
    }

    /// Returns the broker host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.inner.host
    }

    /// Returns the broker port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.inner.port
    }

    /// Returns the client identifier in use.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.inner.client_id
    }

    /// Disconnects from the broker. The event loop stops afterwards.
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be queued.
    pub async fn disconnect(&self) -> Result<(), ProtocolError> {
        tracing::info!(
            host = %self.inner.host,
            port = %self.inner.port,
            "Disconnecting from MQTT broker"
        );

        self.inner
            .client
            .disconnect()
            .await
            .map_err(ProtocolError::Mqtt)?;

        self.inner.connected.store(false, Ordering::Release);
        Ok(())
    }
}

impl fmt::Debug for MqttBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttBus")
            .field("host", &self.inner.host)
            .field("port", &self.inner.port)
            .field("client_id", &self.inner.client_id)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Bus for MqttBus {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), ProtocolError> {
        self.inner
            .client
            .publish(topic, QoS::AtMostOnce, true, payload)
            .await
            .map_err(ProtocolError::Mqtt)
    }

    async fn subscribe(&self, topic: &str) -> Result<(), ProtocolError> {
        self.inner
            .client
            .subscribe(topic, QoS::AtMostOnce)
            .await
            .map_err(ProtocolError::Mqtt)
    }
}

/// Builder for an [`MqttBus`].
#[derive(Debug)]
pub struct MqttBusBuilder {
    settings: MqttSettings,
    last_will: Option<String>,
    event_capacity: usize,
}

impl Default for MqttBusBuilder {
    fn default() -> Self {
        Self {
            settings: MqttSettings::default(),
            last_will: None,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl MqttBusBuilder {
    /// Replaces all connection parameters.
    #[must_use]
    pub fn settings(mut self, settings: MqttSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the broker URL.
    #[must_use]
    pub fn broker(mut self, url: impl Into<String>) -> Self {
        self.settings.broker = url.into();
        self
    }

    /// Sets the client identifier.
    #[must_use]
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.settings.client_id = Some(client_id.into());
        self
    }

    /// Sets authentication credentials.
    #[must_use]
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.settings.username = Some(username.into());
        self.settings.password = Some(password.into());
        self
    }

    /// Sets the keep-alive interval (default: 30 seconds).
    #[must_use]
    pub fn keep_alive(mut self, duration: Duration) -> Self {
        self.settings.keep_alive = duration;
        self
    }

    /// Has the broker publish a retained `offline` on `topic` when the
    /// connection drops.
    #[must_use]
    pub fn last_will(mut self, topic: impl Into<String>) -> Self {
        self.last_will = Some(topic.into());
        self
    }

    /// Sets how many events may queue up before new ones are dropped.
    #[must_use]
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity.max(1);
        self
    }

    /// Creates the client and starts its event loop.
    ///
    /// Returns immediately; [`BusEvent::Connected`] arrives on the returned
    /// receiver once the broker accepts the connection, and again after
    /// every reconnection.
    ///
    /// # Errors
    ///
    /// Returns error if the broker URL is invalid.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn connect(self) -> Result<(MqttBus, mpsc::Receiver<BusEvent>), ProtocolError> {
        let (host, port) = parse_mqtt_url(&self.settings.broker)?;
        let client_id = self
            .settings
            .client_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(generate_client_id);

        let mut options = MqttOptions::new(&client_id, &host, port);
        options.set_keep_alive(self.settings.keep_alive);
        options.set_clean_session(true);

        if let Some(username) = self.settings.username.filter(|u| !u.is_empty()) {
            options.set_credentials(username, self.settings.password.unwrap_or_default());
        }

        if let Some(topic) = self.last_will {
            options.set_last_will(LastWill::new(topic, OFFLINE, QoS::AtMostOnce, true));
        }

        let (client, event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let (events_tx, events_rx) = mpsc::channel(self.event_capacity);
        let connected = Arc::new(AtomicBool::new(false));

        tracing::info!(host = %host, port = %port, client_id = %client_id, "Connecting to MQTT broker");

        tokio::spawn(handle_bus_events(
            event_loop,
            events_tx,
            Arc::clone(&connected),
        ));

        let bus = MqttBus {
            inner: Arc::new(MqttBusInner {
                client,
                host,
                port,
                client_id,
                connected,
            }),
        };

        Ok((bus, events_rx))
    }
}

/// Splits a broker URL into host and port.
///
/// Accepts `mqtt://` and `tcp://` schemes or none; the port defaults to 1883.
///
/// # Errors
///
/// Returns error if the host is empty or the port is not a number.
pub fn parse_mqtt_url(url: &str) -> Result<(String, u16), ProtocolError> {
    let address = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url)
        .trim_end_matches('/');

    let (host, port) = if let Some((h, p)) = address.rsplit_once(':') {
        let port = p
            .parse()
            .map_err(|_| ProtocolError::InvalidAddress(format!("Invalid port: {p}")))?;
        (h, port)
    } else {
        (address, DEFAULT_PORT)
    };

    if host.is_empty() {
        return Err(ProtocolError::InvalidAddress(format!(
            "MQTT broker host is required: {url}"
        )));
    }

    Ok((host.to_string(), port))
}

fn generate_client_id() -> String {
    let unique = uuid::Uuid::new_v4().simple().to_string();
    format!("{CLIENT_ID_PREFIX}{}", &unique[..10])
}

/// Forwards an event without ever waiting on the receiver.
fn forward(events: &mpsc::Sender<BusEvent>, event: BusEvent) {
    match events.try_send(event) {
        Ok(()) | Err(TrySendError::Closed(_)) => {}
        Err(TrySendError::Full(event)) => {
            tracing::warn!(?event, "Event queue full, dropping MQTT event");
        }
    }
}

/// Drives the `rumqttc` event loop until the bus or its receiver is gone.
async fn handle_bus_events(
    mut event_loop: EventLoop,
    events: mpsc::Sender<BusEvent>,
    connected: Arc<AtomicBool>,
) {
    let mut delay = ReconnectDelay::new();

    while !events.is_closed() {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::info!(?connack, "Connected to MQTT broker");
                connected.store(true, Ordering::Release);
                delay.reset();
                forward(&events, BusEvent::Connected);
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                tracing::debug!(?suback, "MQTT subscription acknowledged");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                match String::from_utf8(publish.payload.to_vec()) {
                    Ok(payload) => {
                        tracing::debug!(
                            topic = %publish.topic,
                            payload = %payload,
                            "MQTT message received"
                        );
                        forward(
                            &events,
                            BusEvent::Message {
                                topic: publish.topic,
                                payload,
                            },
                        );
                    }
                    Err(_) => {
                        tracing::warn!(topic = %publish.topic, "Ignoring non UTF-8 MQTT payload");
                    }
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                connected.store(false, Ordering::Release);
                forward(
                    &events,
                    BusEvent::Disconnected("broker closed the connection".to_string()),
                );
            }
            Ok(_) => {}
            Err(ConnectionError::RequestsDone) => {
                tracing::debug!("MQTT client dropped, stopping event loop");
                break;
            }
            Err(e) => {
                let was_connected = connected.swap(false, Ordering::AcqRel);
                if was_connected {
                    forward(&events, BusEvent::Disconnected(e.to_string()));
                }

                let wait = delay.next_delay();
                tracing::error!(
                    error = %e,
                    delay = ?wait,
                    "MQTT connection error, sleeping before reconnecting"
                );
                tokio::time::sleep(wait).await;
            }
        }
    }

    connected.store(false, Ordering::Release);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mqtt_url_with_port() {
        let (host, port) = parse_mqtt_url("mqtt://192.168.1.50:1883").unwrap();
        assert_eq!(host, "192.168.1.50");
        assert_eq!(port, 1883);
    }

    #[test]
    fn parse_mqtt_url_default_port() {
        let (host, port) = parse_mqtt_url("192.168.1.50").unwrap();
        assert_eq!(host, "192.168.1.50");
        assert_eq!(port, 1883);
    }

    #[test]
    fn parse_mqtt_url_tcp_scheme() {
        let (host, port) = parse_mqtt_url("tcp://broker.local:8883").unwrap();
        assert_eq!(host, "broker.local");
        assert_eq!(port, 8883);
    }

    #[test]
    fn parse_mqtt_url_rejects_bad_input() {
        assert!(matches!(
            parse_mqtt_url("tcp://broker:port"),
            Err(ProtocolError::InvalidAddress(_))
        ));
        assert!(matches!(
            parse_mqtt_url("tcp://:1883"),
            Err(ProtocolError::InvalidAddress(_))
        ));
    }

    #[test]
    fn reconnect_delay_sequence() {
        let mut delay = ReconnectDelay::new();
        let waits: Vec<u64> = (0..8).map(|_| delay.next_delay().as_secs()).collect();
        assert_eq!(waits, [2, 4, 8, 16, 32, 64, 2, 4]);
    }

    #[test]
    fn reconnect_delay_resets() {
        let mut delay = ReconnectDelay::new();
        delay.next_delay();
        delay.next_delay();
        delay.reset();
        assert_eq!(delay.current(), Duration::ZERO);
        assert_eq!(delay.next_delay(), ReconnectDelay::INITIAL);
    }

    #[test]
    fn generated_client_ids_are_unique() {
        let a = generate_client_id();
        let b = generate_client_id();
        assert!(a.starts_with(CLIENT_ID_PREFIX));
        assert_eq!(a.len(), CLIENT_ID_PREFIX.len() + 10);
        assert_ne!(a, b);
    }

    #[test]
    fn settings_debug_redacts_password() {
        let settings = MqttSettings {
            password: Some("hunter2".to_string()),
            ..MqttSettings::default()
        };
        let printed = format!("{settings:?}");
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn builder_defaults() {
        let builder = MqttBusBuilder::default();
        assert_eq!(builder.settings.broker, "tcp://localhost:1883");
        assert_eq!(builder.settings.keep_alive, Duration::from_secs(30));
        assert!(builder.last_will.is_none());
        assert_eq!(builder.event_capacity, DEFAULT_EVENT_CAPACITY);
    }

    #[test]
    fn builder_chain() {
        let builder = MqttBus::builder()
            .broker("tcp://broker:1884")
            .client_id("bridge")
            .credentials("user", "pass")
            .keep_alive(Duration::from_secs(45))
            .last_will("home/litterrobot/status")
            .event_capacity(0);

        assert_eq!(builder.settings.broker, "tcp://broker:1884");
        assert_eq!(builder.settings.client_id.as_deref(), Some("bridge"));
        assert_eq!(builder.settings.username.as_deref(), Some("user"));
        assert_eq!(builder.last_will.as_deref(), Some("home/litterrobot/status"));
        assert_eq!(builder.event_capacity, 1);
    }

    #[tokio::test]
    async fn connect_rejects_invalid_broker() {
        let result = MqttBus::builder().broker("tcp://broker:nope").connect();
        assert!(matches!(result, Err(ProtocolError::InvalidAddress(_))));
    }

    #[tokio::test]
    async fn connect_returns_before_broker_answers() {
        let (bus, _events) = MqttBus::builder()
            .broker("tcp://127.0.0.1:1")
            .client_id("offline-test")
            .connect()
            .unwrap();
        assert_eq!(bus.host(), "127.0.0.1");
        assert_eq!(bus.port(), 1);
        assert_eq!(bus.client_id(), "offline-test");
        assert!(!bus.is_connected());
    }

    #[test]
    fn full_queue_drops_events() {
        let (tx, mut rx) = mpsc::channel(1);
        forward(&tx, BusEvent::Connected);
        forward(&tx, BusEvent::Disconnected("x".to_string()));
        assert_eq!(rx.try_recv().unwrap(), BusEvent::Connected);
        assert!(rx.try_recv().is_err());
    }
}
