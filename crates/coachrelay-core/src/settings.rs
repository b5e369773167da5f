//! Relay settings and deployment profiles.
//!
//! A `DeploymentProfile` is a named preset of timing and defaults for one
//! hosting target. `RelaySettings::for_profile` turns it into concrete
//! settings; `SettingsOverrides` layers CLI/env values on top.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{DEFAULT_MODEL, DEFAULT_TEMPERATURE, RequestDefaults};

/// Environment variable holding the upstream credential.
pub const API_KEY_ENV: &str = "DEEPSEEK_API_KEY";

/// Default chat-completion endpoint.
pub const DEFAULT_UPSTREAM_URL: &str = "https://api.deepseek.com/v1/chat/completions";

/// Upstream bearer credential.
///
/// `Debug` never prints the key.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Returns `None` for an empty or whitespace-only key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        if key.trim().is_empty() {
            None
        } else {
            Some(Self(key.trim().to_string()))
        }
    }

    /// Read the key from [`API_KEY_ENV`].
    #[must_use]
    pub fn from_env() -> Option<Self> {
        std::env::var(API_KEY_ENV).ok().and_then(Self::new)
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(****)")
    }
}

/// Hosting target a relay route is tuned for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentProfile {
    /// Long-running server process.
    #[default]
    Server,
    /// Classic serverless function with a short hard execution limit.
    Function,
    /// Edge function; streaming is kept alive by heartbeats.
    Edge,
}

impl DeploymentProfile {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Function => "function",
            Self::Edge => "edge",
        }
    }

    #[must_use]
    pub const fn all() -> [Self; 3] {
        [Self::Server, Self::Function, Self::Edge]
    }
}

impl fmt::Display for DeploymentProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentProfile {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "server" => Ok(Self::Server),
            "function" | "netlify" => Ok(Self::Function),
            "edge" => Ok(Self::Edge),
            other => Err(SettingsError::UnknownProfile(other.to_string())),
        }
    }
}

/// Shape of the liveness frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HeartbeatStyle {
    /// `data: {"ping":true}`
    #[default]
    #[serde(rename = "data")]
    DataPing,
    /// `: ping`
    Comment,
}

impl HeartbeatStyle {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DataPing => "data",
            Self::Comment => "comment",
        }
    }
}

impl FromStr for HeartbeatStyle {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "data" => Ok(Self::DataPing),
            "comment" => Ok(Self::Comment),
            other => Err(SettingsError::UnknownHeartbeatStyle(other.to_string())),
        }
    }
}

/// Effective configuration of one relay.
#[derive(Debug, Clone, PartialEq)]
pub struct RelaySettings {
    pub profile: DeploymentProfile,
    pub upstream_url: String,
    /// `None` means every chat request fails with a configuration error.
    pub api_key: Option<ApiKey>,
    pub default_model: String,
    pub default_temperature: f64,
    /// Mode used when the request omits `stream`.
    pub stream_default: bool,
    /// Deadline for the whole non-streaming upstream exchange.
    pub request_deadline: Duration,
    /// Deadline for upstream response headers in streaming mode.
    pub stream_deadline: Duration,
    pub heartbeat_interval: Duration,
    pub heartbeat_style: HeartbeatStyle,
    /// Longest allowed gap between upstream chunks.
    pub stream_idle_timeout: Option<Duration>,
    /// Hard cap on a streaming session's total lifetime.
    pub session_budget: Option<Duration>,
}

impl RelaySettings {
    /// Preset for a deployment profile. No credential is attached.
    #[must_use]
    pub fn for_profile(profile: DeploymentProfile) -> Self {
        let (deadline, heartbeat, idle, budget) = match profile {
            DeploymentProfile::Server => (60, 10, Some(120), None),
            DeploymentProfile::Function => (8, 5, None, Some(10)),
            DeploymentProfile::Edge => (25, 9, None, Some(30)),
        };

        Self {
            profile,
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            api_key: None,
            default_model: DEFAULT_MODEL.to_string(),
            default_temperature: DEFAULT_TEMPERATURE,
            stream_default: false,
            request_deadline: Duration::from_secs(deadline),
            stream_deadline: Duration::from_secs(deadline),
            heartbeat_interval: Duration::from_secs(heartbeat),
            heartbeat_style: HeartbeatStyle::default(),
            stream_idle_timeout: idle.map(Duration::from_secs),
            session_budget: budget.map(Duration::from_secs),
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, key: Option<ApiKey>) -> Self {
        self.api_key = key;
        self
    }

    #[must_use]
    pub fn with_upstream_url(mut self, url: impl Into<String>) -> Self {
        self.upstream_url = url.into();
        self
    }

    /// Copy the connection-level fields (endpoint, credential, model, stream
    /// default) from another settings value, keeping this profile's timing.
    #[must_use]
    pub fn inherit_connection(mut self, other: &Self) -> Self {
        self.upstream_url.clone_from(&other.upstream_url);
        self.api_key.clone_from(&other.api_key);
        self.default_model.clone_from(&other.default_model);
        self.default_temperature = other.default_temperature;
        self.stream_default = other.stream_default;
        self.heartbeat_style = other.heartbeat_style;
        self
    }

    /// Defaults applied while parsing a chat request.
    #[must_use]
    pub fn request_defaults(&self) -> RequestDefaults {
        RequestDefaults {
            model: self.default_model.clone(),
            temperature: self.default_temperature,
            stream: self.stream_default,
        }
    }

    /// Apply the `Some` fields of an override set.
    pub fn merge(&mut self, overrides: &SettingsOverrides) {
        if let Some(ref url) = overrides.upstream_url {
            self.upstream_url.clone_from(url);
        }
        if let Some(ref model) = overrides.default_model {
            self.default_model.clone_from(model);
        }
        if let Some(temperature) = overrides.default_temperature {
            self.default_temperature = temperature;
        }
        if let Some(stream) = overrides.stream_default {
            self.stream_default = stream;
        }
        if let Some(deadline) = overrides.request_deadline {
            self.request_deadline = deadline;
        }
        if let Some(deadline) = overrides.stream_deadline {
            self.stream_deadline = deadline;
        }
        if let Some(interval) = overrides.heartbeat_interval {
            self.heartbeat_interval = interval;
        }
        if let Some(style) = overrides.heartbeat_style {
            self.heartbeat_style = style;
        }
        if let Some(idle) = overrides.stream_idle_timeout {
            self.stream_idle_timeout = idle;
        }
        if let Some(budget) = overrides.session_budget {
            self.session_budget = budget;
        }
    }

    /// Validate settings, returning an error if any value is invalid.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(self.upstream_url.starts_with("http://") || self.upstream_url.starts_with("https://"))
        {
            return Err(SettingsError::InvalidUpstreamUrl(self.upstream_url.clone()));
        }

        if self.default_model.trim().is_empty() {
            return Err(SettingsError::EmptyModel);
        }

        if !self.default_temperature.is_finite() || self.default_temperature < 0.0 {
            return Err(SettingsError::InvalidTemperature(self.default_temperature));
        }

        for (name, value) in [
            ("request_deadline", Some(self.request_deadline)),
            ("stream_deadline", Some(self.stream_deadline)),
            ("heartbeat_interval", Some(self.heartbeat_interval)),
            ("stream_idle_timeout", self.stream_idle_timeout),
            ("session_budget", self.session_budget),
        ] {
            if value == Some(Duration::ZERO) {
                return Err(SettingsError::ZeroDuration(name));
            }
        }

        if let Some(idle) = self.stream_idle_timeout {
            if self.heartbeat_interval >= idle {
                return Err(SettingsError::HeartbeatNotShorterThanIdle {
                    heartbeat: self.heartbeat_interval,
                    idle,
                });
            }
        }

        Ok(())
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self::for_profile(DeploymentProfile::default())
    }
}

/// Partial settings update, typically built from CLI flags and env vars.
///
/// The optional timers use `Option<Option<Duration>>`:
/// - `None` = don't change this field
/// - `Some(None)` = disable the timer
/// - `Some(Some(value))` = set the timer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SettingsOverrides {
    pub upstream_url: Option<String>,
    pub default_model: Option<String>,
    pub default_temperature: Option<f64>,
    pub stream_default: Option<bool>,
    pub request_deadline: Option<Duration>,
    pub stream_deadline: Option<Duration>,
    pub heartbeat_interval: Option<Duration>,
    pub heartbeat_style: Option<HeartbeatStyle>,
    pub stream_idle_timeout: Option<Option<Duration>>,
    pub session_budget: Option<Option<Duration>>,
}

impl SettingsOverrides {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Settings validation error.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SettingsError {
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("Heartbeat interval {heartbeat:?} must be shorter than the idle timeout {idle:?}")]
    HeartbeatNotShorterThanIdle { heartbeat: Duration, idle: Duration },

    #[error("Upstream URL must be http(s), got '{0}'")]
    InvalidUpstreamUrl(String),

    #[error("Default temperature must be a non-negative number, got {0}")]
    InvalidTemperature(f64),

    #[error("Default model cannot be empty")]
    EmptyModel,

    #[error("Unknown deployment profile '{0}' (expected server, function or edge)")]
    UnknownProfile(String),

    #[error("Unknown heartbeat style '{0}' (expected data or comment)")]
    UnknownHeartbeatStyle(String),
}
