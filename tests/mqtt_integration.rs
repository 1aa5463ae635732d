// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the MQTT bus using mockforge-mqtt.

use std::time::Duration;

use litterbridge::model::Category;
use litterbridge::protocol::{Bus, BusEvent, DeviceInfo, Discovery, MqttBus, MqttSettings};
use mockforge_mqtt::broker::MqttConfig;
use mockforge_mqtt::start_mqtt_server;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};

/// Helper to find an available port for testing.
fn get_test_port() -> u16 {
    use std::sync::atomic::{AtomicU16, Ordering};
    static PORT_COUNTER: AtomicU16 = AtomicU16::new(18950);
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Starts a mock MQTT broker on the given port.
async fn start_mock_broker(port: u16) {
    let config = MqttConfig {
        port,
        host: "127.0.0.1".to_string(),
        ..Default::default()
    };

    tokio::spawn(async move {
        let _ = start_mqtt_server(config).await;
    });

    // Give the broker time to start and bind to the port
    sleep(Duration::from_millis(500)).await;
}

/// Waits for the first `Connected` event.
async fn wait_connected(events: &mut mpsc::Receiver<BusEvent>) {
    let result = timeout(Duration::from_secs(5), async {
        while let Some(event) = events.recv().await {
            if event == BusEvent::Connected {
                return true;
            }
        }
        false
    })
    .await;

    assert_eq!(result, Ok(true), "broker never acknowledged the connection");
}

fn connect(broker: String, client_id: &str) -> (MqttBus, mpsc::Receiver<BusEvent>) {
    MqttBus::builder()
        .broker(broker)
        .client_id(client_id)
        .last_will("home/litterrobot/status")
        .connect()
        .unwrap()
}

// ============================================================================
// Connection Tests
// ============================================================================

mod connection {
    use super::*;

    #[tokio::test]
    async fn connect_to_broker() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let (bus, mut events) = connect(format!("mqtt://127.0.0.1:{port}"), "litterbridge-test");
        wait_connected(&mut events).await;

        assert!(bus.is_connected());
        assert_eq!(bus.host(), "127.0.0.1");
        assert_eq!(bus.port(), port);
        assert_eq!(bus.client_id(), "litterbridge-test");
    }

    #[tokio::test]
    async fn connect_with_tcp_scheme() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let (_bus, mut events) = connect(format!("tcp://127.0.0.1:{port}"), "tcp-scheme");
        wait_connected(&mut events).await;
    }

    #[tokio::test]
    async fn connect_with_settings() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let settings = MqttSettings {
            broker: format!("127.0.0.1:{port}"),
            client_id: None,
            ..MqttSettings::default()
        };
        let (bus, mut events) = MqttBus::builder().settings(settings).connect().unwrap();
        wait_connected(&mut events).await;

        assert!(bus.client_id().starts_with("litterbridge-"));
    }

    #[tokio::test]
    async fn unreachable_broker_never_connects() {
        let port = get_test_port();

        let (bus, mut events) = connect(format!("mqtt://127.0.0.1:{port}"), "nobody-home");
        let event = timeout(Duration::from_millis(500), events.recv()).await;

        assert!(event.is_err(), "unexpected event: {event:?}");
        assert!(!bus.is_connected());
    }

    #[tokio::test]
    async fn disconnect_stops_the_connection() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let (bus, mut events) = connect(format!("mqtt://127.0.0.1:{port}"), "leaving");
        wait_connected(&mut events).await;

        bus.disconnect().await.unwrap();
    }
}

// ============================================================================
// Publish and Subscribe Tests
// ============================================================================

mod messaging {
    use super::*;

    #[tokio::test]
    async fn publish_and_subscribe() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let (bus, mut events) = connect(format!("mqtt://127.0.0.1:{port}"), "messaging");
        wait_connected(&mut events).await;

        bus.subscribe("home/litterrobot/a63afb501d65cb/power/command")
            .await
            .unwrap();
        bus.publish("home/litterrobot/status", "online").await.unwrap();
        bus.publish("home/litterrobot/a63afb501d65cb/unitstatus/state", "Ready")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn register_discovery() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let (bus, mut events) = connect(format!("mqtt://127.0.0.1:{port}"), "discovery");
        wait_connected(&mut events).await;

        let discovery = Discovery {
            component: Category::Switch,
            config_topic: "homeassistant/switch/litterrobot/a63afb501d65cb_power/config"
                .to_string(),
            name: "litterrobot a63afb501d65cb power".to_string(),
            unique_id: "litterrobot.a63afb501d65cb.power".to_string(),
            availability_topic: "home/litterrobot/status".to_string(),
            state_topic: "home/litterrobot/a63afb501d65cb/power/state".to_string(),
            command_topic: Some("home/litterrobot/a63afb501d65cb/power/command".to_string()),
            unit_of_measurement: None,
            device: DeviceInfo {
                identifiers: vec!["litterrobot.a63afb501d65cb".to_string()],
                name: "litterrobot a63afb501d65cb".to_string(),
                sw_version: "test".to_string(),
            },
        };

        bus.register_discovery(&discovery).await.unwrap();
    }
}
