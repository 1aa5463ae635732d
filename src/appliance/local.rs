// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Local network UDP backend.
//!
//! Litter-Robot 3 units report their status to the vendor's dispatch server
//! over UDP. Redirecting that traffic (DNS or NAT) to this host lets the
//! bridge read the status packets directly. Each packet is relayed to the
//! real dispatch server so the vendor app keeps working.
//!
//! Status packets are comma-separated:
//!
//! ```text
//! >LR3,<id>,<?>,<power>,<unit status>,W<minutes>,NL<0|1>,SM<0|1>,PL<0|1>,...
//! ```
//!
//! Commands are sent back to the robot on port 2000 as
//! `<instruction>,LR3,<id>,<counter>,<crc>`.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{ApplianceClient, ApplianceState, Instruction, ON_FLAG};
use crate::error::{ParseError, ProtocolError};

const MODEL: &str = "LR3";
// TODO: derive the packet counter and CRC from the robot's own packets
// instead of replaying captured values.
const COUNTER: &str = "06EB";
const CRC: &str = "7AE2E42F";

const PACKET_SIZE: usize = 512;
const MIN_PACKET_PARTS: usize = 9;

/// Configuration for the local backend.
#[derive(Debug, Clone)]
pub struct LocalConfig {
    listen_port: u16,
    command_port: u16,
    relay: Option<String>,
    rebind_delay: Duration,
}

impl LocalConfig {
    /// Port the robots send status packets to.
    pub const DEFAULT_LISTEN_PORT: u16 = 2001;
    /// Port the robots accept commands on.
    pub const DEFAULT_COMMAND_PORT: u16 = 2000;
    /// The vendor's dispatch server.
    pub const DEFAULT_RELAY: &'static str = "dispatch.iothings.site:2001";
    /// Delay before retrying a failed bind.
    pub const DEFAULT_REBIND_DELAY: Duration = Duration::from_secs(5);

    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listen_port: Self::DEFAULT_LISTEN_PORT,
            command_port: Self::DEFAULT_COMMAND_PORT,
            relay: Some(Self::DEFAULT_RELAY.to_string()),
            rebind_delay: Self::DEFAULT_REBIND_DELAY,
        }
    }

    /// Sets the port to listen on.
    #[must_use]
    pub fn with_listen_port(mut self, port: u16) -> Self {
        self.listen_port = port;
        self
    }

    /// Sets the port commands are sent to.
    #[must_use]
    pub fn with_command_port(mut self, port: u16) -> Self {
        self.command_port = port;
        self
    }

    /// Sets where received packets are relayed; `None` disables relaying.
    #[must_use]
    pub fn with_relay(mut self, relay: Option<String>) -> Self {
        self.relay = relay;
        self
    }

    /// Sets the delay before retrying a failed bind.
    #[must_use]
    pub fn with_rebind_delay(mut self, delay: Duration) -> Self {
        self.rebind_delay = delay;
        self
    }

    /// Returns the listen port.
    #[must_use]
    pub fn listen_port(&self) -> u16 {
        self.listen_port
    }

    /// Returns the command port.
    #[must_use]
    pub fn command_port(&self) -> u16 {
        self.command_port
    }

    /// Returns the relay target.
    #[must_use]
    pub fn relay(&self) -> Option<&str> {
        self.relay.as_deref()
    }

    /// Creates a [`LocalClient`] from this configuration.
    #[must_use]
    pub fn into_client(self) -> LocalClient {
        LocalClient {
            config: Arc::new(self),
        }
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Client for robots on the local network.
#[derive(Debug, Clone)]
pub struct LocalClient {
    config: Arc<LocalConfig>,
}

impl LocalClient {
    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &LocalConfig {
        &self.config
    }

    /// Builds the datagram that carries `instruction` to robot `robot_id`.
    #[must_use]
    pub fn command_payload(robot_id: &str, instruction: &Instruction) -> String {
        format!(
            "{},{MODEL},{robot_id},{COUNTER},{CRC}",
            instruction.wire()
        )
    }

    async fn listen(self, states: mpsc::Sender<ApplianceState>) {
        loop {
            let socket = match UdpSocket::bind(("0.0.0.0", self.config.listen_port)).await {
                Ok(socket) => socket,
                Err(e) => {
                    tracing::error!(
                        port = self.config.listen_port,
                        error = %e,
                        "Unable to start UDP server"
                    );
                    tokio::time::sleep(self.config.rebind_delay).await;
                    continue;
                }
            };

            if let Ok(address) = socket.local_addr() {
                tracing::info!(address = %address, "Listening for Litter-Robot UDP packets");
            }

            self.receive(&socket, &states).await;
            if states.is_closed() {
                tracing::debug!("State receiver dropped, stopping UDP server");
                return;
            }
        }
    }

    async fn receive(&self, socket: &UdpSocket, states: &mpsc::Sender<ApplianceState>) {
        let mut buffer = [0u8; PACKET_SIZE];

        loop {
            let (len, remote) = match socket.recv_from(&mut buffer).await {
                Ok(received) => received,
                Err(e) => {
                    tracing::warn!(error = %e, "Error reading UDP packet");
                    continue;
                }
            };
            let packet = &buffer[..len];

            if let Some(relay) = self.config.relay.clone() {
                tokio::spawn(relay_packet(packet.to_vec(), relay));
            }

            let data = String::from_utf8_lossy(packet);
            tracing::info!(ip = %remote.ip(), data = %data.trim(), "Received UDP packet");

            match parse_packet(&data, remote.ip()) {
                Ok(state) => {
                    if states.send(state).await.is_err() {
                        return;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Skipping malformed UDP packet"),
            }
        }
    }
}

async fn relay_packet(packet: Vec<u8>, relay: String) {
    if let Err(e) = forward_datagram(&packet, &relay).await {
        tracing::debug!(relay = %relay, error = %e, "Unable to relay UDP packet");
    }
}

async fn forward_datagram(packet: &[u8], target: &str) -> std::io::Result<usize> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).await?;
    socket.send_to(packet, target).await
}

/// Parses a status packet received from `sender`.
///
/// # Errors
///
/// Returns error if the packet has fewer than nine comma-separated parts or
/// carries no robot identifier.
///
/// # Examples
///
/// ```
/// use litterbridge::appliance::parse_packet;
/// use std::net::{IpAddr, Ipv4Addr};
///
/// let sender = IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20));
/// let state = parse_packet(">LR3,a0b1c2,1,AC,DFS3,W7,NL1,SM0,PL0", sender).unwrap();
/// assert_eq!(state.robot_id, "a0b1c2");
/// assert_eq!(state.name_or_ip, "192.168.1.20");
/// assert!(state.dfi_triggered);
/// assert_eq!(state.cycles_after_drawer_full, "3");
/// ```
pub fn parse_packet(data: &str, sender: IpAddr) -> Result<ApplianceState, ParseError> {
    let parts: Vec<&str> = data.trim().split(',').map(str::trim).collect();
    if parts.len() < MIN_PACKET_PARTS {
        return Err(ParseError::UnexpectedFormat(format!(
            "expected at least {MIN_PACKET_PARTS} comma-separated parts, got {}",
            parts.len()
        )));
    }

    let robot_id = parts[1];
    if robot_id.is_empty() {
        return Err(ParseError::MissingField("robot id".to_string()));
    }

    let unit_status = parts[4];
    let (dfi_triggered, cycles_after_drawer_full) = match unit_status.strip_prefix("DFS") {
        Some("") => (true, "0".to_string()),
        Some(count) => (true, count.to_string()),
        None => (false, String::new()),
    };

    Ok(ApplianceState {
        robot_id: robot_id.to_string(),
        name_or_ip: sender.to_string(),
        power_status: parts[3].to_string(),
        unit_status: unit_status.to_string(),
        cycles_after_drawer_full,
        clean_cycle_wait_time_minutes: strip_tag(parts[5], "W").to_string(),
        night_light_active: strip_tag(parts[6], "NL") == ON_FLAG,
        sleep_mode_active: strip_tag(parts[7], "SM") == ON_FLAG,
        panel_lock_active: strip_tag(parts[8], "PL") == ON_FLAG,
        dfi_triggered,
        ..ApplianceState::default()
    })
}

fn strip_tag<'a>(part: &'a str, tag: &str) -> &'a str {
    part.strip_prefix(tag).unwrap_or(part)
}

impl ApplianceClient for LocalClient {
    fn run(&self, states: mpsc::Sender<ApplianceState>) -> JoinHandle<()> {
        tokio::spawn(self.clone().listen(states))
    }

    async fn send(
        &self,
        robot_id: &str,
        address: &str,
        instruction: Instruction,
    ) -> Result<(), ProtocolError> {
        if address.is_empty() {
            return Err(ProtocolError::InvalidAddress(format!(
                "no address configured for robot {robot_id}"
            )));
        }

        let payload = Self::command_payload(robot_id, &instruction);
        tracing::info!(
            robot = %robot_id,
            address = %address,
            payload = %payload,
            "Sending UDP command to Litter-Robot"
        );

        let socket = UdpSocket::bind(("0.0.0.0", 0))
            .await
            .map_err(ProtocolError::Io)?;
        socket
            .send_to(payload.as_bytes(), (address, self.config.command_port))
            .await
            .map_err(ProtocolError::Io)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tokio::time::timeout;

    const SENDER: IpAddr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7));

    #[test]
    fn parse_ready_packet() {
        let state = parse_packet(">LR3,a0b1c2d3e4f5a6,1,AC,RDY,W7,NL1,SM0,PL1,7F\n", SENDER)
            .unwrap();

        assert_eq!(state.robot_id, "a0b1c2d3e4f5a6");
        assert_eq!(state.name_or_ip, "10.0.0.7");
        assert_eq!(state.power_status, "AC");
        assert_eq!(state.unit_status, "RDY");
        assert_eq!(state.clean_cycle_wait_time_minutes, "7");
        assert!(state.night_light_active);
        assert!(!state.sleep_mode_active);
        assert!(state.panel_lock_active);
        assert!(!state.dfi_triggered);
        assert!(state.cycles_after_drawer_full.is_empty());
        assert!(state.robot_serial.is_empty());
    }

    #[test]
    fn parse_drawer_full_without_count() {
        let state = parse_packet(">LR3,abc,1,AC,DFS,W15,NL0,SM1,PL0", SENDER).unwrap();
        assert!(state.dfi_triggered);
        assert_eq!(state.cycles_after_drawer_full, "0");
        assert!(state.sleep_mode_active);
        assert_eq!(state.clean_cycle_wait_time_minutes, "15");
    }

    #[test]
    fn parse_rejects_short_packets() {
        let err = parse_packet(">LR3,abc,1,AC", SENDER).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedFormat(_)));
    }

    #[test]
    fn parse_rejects_missing_id() {
        let err = parse_packet(">LR3,,1,AC,RDY,W7,NL1,SM0,PL0", SENDER).unwrap_err();
        assert!(matches!(err, ParseError::MissingField(_)));
    }

    #[test]
    fn command_payload_format() {
        assert_eq!(
            LocalClient::command_payload("a0b1c2", &Instruction::NightLightOff),
            "<N0,LR3,a0b1c2,06EB,7AE2E42F"
        );
    }

    #[test]
    fn config_defaults() {
        let config = LocalConfig::default();
        assert_eq!(config.listen_port(), 2001);
        assert_eq!(config.command_port(), 2000);
        assert_eq!(config.relay(), Some("dispatch.iothings.site:2001"));
    }

    #[tokio::test]
    async fn send_requires_an_address() {
        let client = LocalConfig::new().into_client();
        let err = client.send("abc", "", Instruction::Cycle).await.unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn send_delivers_datagram() {
        let robot = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = robot.local_addr().unwrap().port();
        let client = LocalConfig::new().with_command_port(port).into_client();

        client.cycle("a0b1c2", "127.0.0.1").await.unwrap();

        let mut buffer = [0u8; 64];
        let (len, _) = timeout(Duration::from_secs(2), robot.recv_from(&mut buffer))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buffer[..len], b"<C,LR3,a0b1c2,06EB,7AE2E42F");
    }

    #[tokio::test]
    async fn listener_forwards_parsed_packets() {
        let port = {
            let probe = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
            probe.local_addr().unwrap().port()
        };
        let client = LocalConfig::new()
            .with_listen_port(port)
            .with_relay(None)
            .into_client();
        let (tx, mut rx) = mpsc::channel(4);
        let handle = client.run(tx);

        let robot = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut received = None;
        for _ in 0..50 {
            robot
                .send_to(b">LR3,a0b1c2,1,AC,CCP,W7,NL0,SM0,PL0", ("127.0.0.1", port))
                .await
                .unwrap();
            if let Ok(state) = timeout(Duration::from_millis(100), rx.recv()).await {
                received = state;
                break;
            }
        }

        let state = received.unwrap();
        assert_eq!(state.robot_id, "a0b1c2");
        assert_eq!(state.unit_status, "CCP");
        assert_eq!(state.name_or_ip, "127.0.0.1");
        handle.abort();
    }
}
