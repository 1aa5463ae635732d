// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Wiring of the source, the sink and the bus into one running bridge.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::appliance::{ApplianceClient, Backend};
use crate::comms::Comms;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{KnownRobots, StatusLabels};
use crate::protocol::{Bus, BusEvent, MqttBus, OFFLINE};
use crate::sink::{Sink, SinkConfig};
use crate::source::Source;

/// A source and a sink coupled through [`Comms`].
///
/// # Examples
///
/// ```no_run
/// use litterbridge::{Bridge, Config};
///
/// # async fn example() -> litterbridge::Result<()> {
/// let config = Config::from_env()?;
/// Bridge::connect(config)?.run().await
/// # }
/// ```
#[derive(Debug)]
pub struct Bridge<C: ApplianceClient = Backend, B: Bus + Clone = MqttBus> {
    source: Source<C>,
    sink: Sink<B>,
    events: mpsc::Receiver<BusEvent>,
}

impl Bridge {
    /// Builds the backend and connects to the broker.
    ///
    /// The broker connection is driven in the background, so this returns
    /// before the broker answers. Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if the backend client cannot be created or the broker
    /// address is invalid.
    pub fn connect(config: Config) -> Result<Self> {
        tracing::info!(
            backend = ?config.backend,
            mqtt = ?config.mqtt,
            sink = ?config.sink,
            known_robots = config.known_robots.len(),
            "Starting Litter-Robot bridge"
        );

        let backend = config.backend.into_backend()?;
        let topics = config.sink.topics();
        let (bus, events) = MqttBus::builder()
            .settings(config.mqtt)
            .last_will(topics.availability())
            .connect()?;

        Ok(Self::from_parts(
            backend,
            bus,
            events,
            config.sink,
            config.known_robots,
        ))
    }

    /// Runs until Ctrl-C, then announces the bridge offline and disconnects.
    ///
    /// # Errors
    ///
    /// Returns error if the source or the sink stops on its own.
    pub async fn run(self) -> Result<()> {
        let bus = self.sink.bus().clone();
        let result = self
            .run_until(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %e, "Failed to listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
                tracing::info!("Shutdown requested");
            })
            .await;

        if let Err(e) = bus.disconnect().await {
            tracing::warn!(error = %e, "Failed to disconnect from MQTT broker");
        }
        result
    }
}

impl<C: ApplianceClient, B: Bus + Clone> Bridge<C, B> {
    /// Couples an already built backend and bus.
    #[must_use]
    pub fn from_parts(
        client: C,
        bus: B,
        events: mpsc::Receiver<BusEvent>,
        sink_config: SinkConfig,
        known_robots: KnownRobots,
    ) -> Self {
        let known_robots = Arc::new(known_robots);
        let (source_channels, sink_channels) = Comms::new().split();

        Self {
            source: Source::new(client, Arc::clone(&known_robots), source_channels),
            sink: Sink::new(
                bus,
                sink_config,
                known_robots,
                StatusLabels::standard(),
                sink_channels,
            ),
            events,
        }
    }

    /// Runs both adapters until `shutdown` completes.
    ///
    /// On shutdown the availability topic is set to `offline`. The adapters
    /// are aborted.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] if an adapter stops before
    /// `shutdown` completes.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let bus = self.sink.bus().clone();
        let availability = self.sink.topics().availability();

        let mut source = self.source.run();
        let mut sink = self.sink.run(self.events);

        let result = tokio::select! {
            () = shutdown => Ok(()),
            _ = &mut source => Err(Error::ChannelClosed("source stopped".to_string())),
            _ = &mut sink => Err(Error::ChannelClosed("sink stopped".to_string())),
        };

        source.abort();
        sink.abort();

        if let Err(e) = bus.publish(&availability, OFFLINE).await {
            tracing::warn!(error = %e, "Failed to announce bridge offline");
        }
        tracing::info!("Litter-Robot bridge stopped");
        result
    }
}
