// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vendor cloud API backend.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Response, StatusCode};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::api::{CommandBody, LoginRequest, LoginResponse, RobotResponse};
use super::{ApplianceClient, ApplianceState, Instruction};
use crate::error::ProtocolError;

const API_KEY_HEADER: &str = "x-api-key";

/// Configuration for the cloud backend.
///
/// # Examples
///
/// ```
/// use litterbridge::appliance::CloudConfig;
/// use std::time::Duration;
///
/// let config = CloudConfig::new("cat@example.com", "secret")
///     .with_lookup_interval(Duration::from_secs(60));
/// assert_eq!(config.lookup_interval(), Duration::from_secs(60));
/// assert_eq!(config.api_key(), CloudConfig::DEFAULT_API_KEY);
/// ```
#[derive(Clone)]
pub struct CloudConfig {
    email: String,
    password: String,
    api_key: String,
    base_url: String,
    lookup_interval: Duration,
    timeout: Duration,
}

impl CloudConfig {
    /// Production endpoint of the vendor API.
    pub const DEFAULT_BASE_URL: &'static str =
        "https://muvnkjeut7.execute-api.us-east-1.amazonaws.com/staging";
    /// API key shipped with the vendor's mobile app.
    pub const DEFAULT_API_KEY: &'static str = "Gmdfw5Cq3F3Mk6xvvO0inHATJeoDv6C3KfwfOuh0";
    /// Default polling interval.
    pub const DEFAULT_LOOKUP_INTERVAL: Duration = Duration::from_secs(37);
    /// Default request timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Creates a configuration for the given account.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            api_key: Self::DEFAULT_API_KEY.to_string(),
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            lookup_interval: Self::DEFAULT_LOOKUP_INTERVAL,
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Points the client at another endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Sets the polling interval. Zero disables polling.
    #[must_use]
    pub fn with_lookup_interval(mut self, interval: Duration) -> Self {
        self.lookup_interval = interval;
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the account email.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Returns the API endpoint.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the polling interval.
    #[must_use]
    pub fn lookup_interval(&self) -> Duration {
        self.lookup_interval
    }

    /// Returns the request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Creates a [`CloudClient`] from this configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn into_client(self) -> Result<CloudClient, ProtocolError> {
        let http = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(ProtocolError::Http)?;

        Ok(CloudClient {
            inner: Arc::new(Inner {
                http,
                config: self,
                session: Mutex::new(None),
            }),
        })
    }
}

impl fmt::Debug for CloudConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudConfig")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("lookup_interval", &self.lookup_interval)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Authenticated session with the vendor API.
#[derive(Clone)]
struct Session {
    token: String,
    user_id: String,
}

struct Inner {
    http: Client,
    config: CloudConfig,
    session: Mutex<Option<Session>>,
}

/// Client for the vendor cloud API.
///
/// Logs in lazily on first use and reuses the session until the API answers
/// `401`, after which the next call logs in again. Cloning is cheap and
/// clones share the session.
#[derive(Clone)]
pub struct CloudClient {
    inner: Arc<Inner>,
}

impl CloudClient {
    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &CloudConfig {
        &self.inner.config
    }

    /// Returns true if a session is cached.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.inner.session.lock().is_some()
    }

    /// Fetches the current state of every robot on the account.
    ///
    /// # Errors
    ///
    /// Returns error if login fails, the request fails, or the API answers
    /// with a non-success status.
    pub async fn states(&self) -> Result<Vec<ApplianceState>, ProtocolError> {
        let session = self.session().await?;
        let url = format!(
            "{}/users/{}/litter-robots",
            self.inner.config.base_url,
            urlencoding::encode(&session.user_id)
        );

        tracing::debug!(url = %url, "Fetching robot states");

        let response = self
            .inner
            .http
            .get(&url)
            .header(API_KEY_HEADER, self.inner.config.api_key.as_str())
            .header(AUTHORIZATION, session.token.as_str())
            .send()
            .await
            .map_err(ProtocolError::Http)?;

        self.check_status(&response)?;

        let robots: Vec<RobotResponse> = response.json().await.map_err(ProtocolError::Http)?;

        tracing::debug!(count = robots.len(), "Fetched robot states");

        Ok(robots.into_iter().map(ApplianceState::from).collect())
    }

    /// Fetches all states and forwards them on `states`.
    ///
    /// Fetch errors are logged and swallowed. Returns false once the
    /// receiving side is gone.
    pub async fn publish(&self, states: &mpsc::Sender<ApplianceState>) -> bool {
        let fetched = match self.states().await {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::error!(error = %e, "Unable to fetch robot states");
                return true;
            }
        };

        for state in fetched {
            if states.send(state).await.is_err() {
                return false;
            }
        }
        true
    }

    async fn session(&self) -> Result<Session, ProtocolError> {
        let cached = self.inner.session.lock().clone();
        if let Some(session) = cached {
            return Ok(session);
        }
        self.login().await
    }

    async fn login(&self) -> Result<Session, ProtocolError> {
        tracing::debug!(email = %self.inner.config.email, "Logging in to the Litter-Robot API");

        let body = LoginRequest {
            email: &self.inner.config.email,
            one_signal_player_id: "0",
            password: &self.inner.config.password,
        };

        let response = self
            .inner
            .http
            .post(format!("{}/login", self.inner.config.base_url))
            .header(API_KEY_HEADER, self.inner.config.api_key.as_str())
            .json(&body)
            .send()
            .await
            .map_err(ProtocolError::Http)?;

        self.check_status(&response)?;

        let login: LoginResponse = response.json().await.map_err(ProtocolError::Http)?;
        if login.token.is_empty() {
            return Err(ProtocolError::AuthenticationFailed);
        }

        tracing::debug!("Login to the Litter-Robot API succeeded");

        let session = Session {
            token: login.token,
            user_id: login.user.user_id,
        };
        *self.inner.session.lock() = Some(session.clone());
        Ok(session)
    }

    fn check_status(&self, response: &Response) -> Result<(), ProtocolError> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            self.inner.session.lock().take();
            return Err(ProtocolError::AuthenticationFailed);
        }

        if !status.is_success() {
            return Err(ProtocolError::ConnectionFailed(format!(
                "HTTP {} - {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        Ok(())
    }

    async fn poll(self, states: mpsc::Sender<ApplianceState>) {
        let period = self.inner.config.lookup_interval;
        if period.is_zero() {
            tracing::warn!("Lookup interval is zero, not polling the Litter-Robot API");
            return;
        }

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if !self.publish(&states).await {
                tracing::debug!("State receiver dropped, stopping API polling");
                return;
            }
        }
    }
}

impl fmt::Debug for CloudClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CloudClient")
            .field("config", &self.inner.config)
            .field("logged_in", &self.is_logged_in())
            .finish()
    }
}

impl ApplianceClient for CloudClient {
    fn run(&self, states: mpsc::Sender<ApplianceState>) -> JoinHandle<()> {
        tracing::info!(
            interval = ?self.inner.config.lookup_interval,
            "Polling the Litter-Robot API"
        );
        tokio::spawn(self.clone().poll(states))
    }

    async fn send(
        &self,
        robot_id: &str,
        _address: &str,
        instruction: Instruction,
    ) -> Result<(), ProtocolError> {
        let session = self.session().await?;
        let command = instruction.wire();
        let url = format!(
            "{}/users/{}/litter-robots/{}/dispatch-commands",
            self.inner.config.base_url,
            urlencoding::encode(&session.user_id),
            urlencoding::encode(robot_id)
        );

        tracing::info!(robot = %robot_id, command = %command, "Sending command to Litter-Robot");

        let response = self
            .inner
            .http
            .post(&url)
            .header(API_KEY_HEADER, self.inner.config.api_key.as_str())
            .header(AUTHORIZATION, session.token.as_str())
            .json(&CommandBody {
                command: &command,
                litter_robot_id: robot_id,
            })
            .send()
            .await
            .map_err(ProtocolError::Http)?;

        self.check_status(&response)
    }
}
