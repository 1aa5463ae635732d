// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the bridge.
//!
//! Only startup can fail with these errors. Once both adapters are running,
//! every failure is logged and the bridge carries on with the next event.

use thiserror::Error;

/// The main error type for this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Error occurred while talking to the vendor API or the MQTT broker.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Error occurred while parsing vendor data.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// One side of the bridge went away.
    #[error("channel closed: {0}")]
    ChannelClosed(String),
}

/// Errors raised while reading the environment configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A boolean variable held something other than a boolean.
    #[error("invalid boolean for {key}: {value}")]
    InvalidBool {
        /// The variable name.
        key: String,
        /// The rejected value.
        value: String,
    },

    /// A duration variable could not be parsed.
    #[error("invalid duration for {key}: {value}")]
    InvalidDuration {
        /// The variable name.
        key: String,
        /// The rejected value.
        value: String,
    },

    /// A variable required by the selected backend is missing.
    #[error("missing required setting: {0}")]
    Missing(String),
}

/// Errors related to network communication (HTTP, UDP, MQTT).
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// MQTT client request failed.
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// Socket operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection to the remote end failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Outgoing payload could not be encoded.
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    /// Invalid URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The vendor API rejected our credentials.
    #[error("authentication failed")]
    AuthenticationFailed,
}

/// Errors related to parsing vendor payloads.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Expected field is missing from the payload.
    #[error("missing field in payload: {0}")]
    MissingField(String),

    /// Unexpected payload format.
    #[error("unexpected payload format: {0}")]
    UnexpectedFormat(String),
}

/// A specialized Result type for this crate.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_display() {
        let err = ConfigError::InvalidDuration {
            key: "LITTERROBOT_LOOKUPINTERVAL".to_string(),
            value: "soon".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid duration for LITTERROBOT_LOOKUPINTERVAL: soon"
        );
    }

    #[test]
    fn error_from_config_error() {
        let err: Error = ConfigError::Missing("LITTERROBOT_EMAIL".to_string()).into();
        assert!(matches!(err, Error::Config(ConfigError::Missing(_))));
    }

    #[test]
    fn parse_error_display() {
        let err = ParseError::MissingField("unitStatus".to_string());
        assert_eq!(err.to_string(), "missing field in payload: unitStatus");
    }

    #[test]
    fn protocol_error_display() {
        let err = ProtocolError::InvalidAddress("tcp://:x".to_string());
        assert_eq!(err.to_string(), "invalid address: tcp://:x");
    }
}
