//! Commands enum and their arguments.

use std::time::Duration;

use clap::{Args, Subcommand};

use coachrelay_core::{
    DeploymentProfile, HeartbeatStyle, RelaySettings, SettingsError, SettingsOverrides,
};

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the relay HTTP server
    Serve(ServeArgs),

    /// Print the built-in settings of every deployment profile
    Profiles,
}

/// Arguments for `coachrelay serve`.
///
/// Every tuning flag is optional; unset flags keep the profile's preset.
#[derive(Debug, Clone, Args)]
pub struct ServeArgs {
    /// Host to bind to
    #[arg(long, env = "COACHRELAY_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "3001")]
    pub port: u16,

    /// Deployment profile of the primary chat route: server, function or edge
    #[arg(long, env = "COACHRELAY_PROFILE", default_value = "server")]
    pub profile: DeploymentProfile,

    /// Upstream chat-completion endpoint
    #[arg(long, env = "COACHRELAY_UPSTREAM_URL")]
    pub upstream_url: Option<String>,

    /// Model used when a request does not name one
    #[arg(long, env = "COACHRELAY_DEFAULT_MODEL")]
    pub default_model: Option<String>,

    /// Temperature used when a request does not set one
    #[arg(long, env = "COACHRELAY_DEFAULT_TEMPERATURE")]
    pub default_temperature: Option<f64>,

    /// Deadline in seconds for a buffered (non-streaming) exchange
    #[arg(long, env = "COACHRELAY_REQUEST_DEADLINE_SECS")]
    pub request_deadline_secs: Option<u64>,

    /// Deadline in seconds for upstream response headers when streaming
    #[arg(long, env = "COACHRELAY_STREAM_DEADLINE_SECS")]
    pub stream_deadline_secs: Option<u64>,

    /// Heartbeat interval in seconds
    #[arg(long, env = "COACHRELAY_HEARTBEAT_SECS")]
    pub heartbeat_secs: Option<u64>,

    /// Longest gap between upstream chunks in seconds (0 disables)
    #[arg(long, env = "COACHRELAY_IDLE_TIMEOUT_SECS")]
    pub idle_timeout_secs: Option<u64>,

    /// Cap on a streaming session's lifetime in seconds (0 disables)
    #[arg(long, env = "COACHRELAY_SESSION_BUDGET_SECS")]
    pub session_budget_secs: Option<u64>,

    /// Stream when a request omits the `stream` field
    #[arg(long, env = "COACHRELAY_STREAM_DEFAULT")]
    pub stream_default: Option<bool>,

    /// Heartbeat frame style: data or comment
    #[arg(long, env = "COACHRELAY_HEARTBEAT_STYLE")]
    pub heartbeat_style: Option<HeartbeatStyle>,
}

impl ServeArgs {
    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Flags that were given, as settings overrides.
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            upstream_url: self.upstream_url.clone(),
            default_model: self.default_model.clone(),
            default_temperature: self.default_temperature,
            stream_default: self.stream_default,
            request_deadline: self.request_deadline_secs.map(Duration::from_secs),
            stream_deadline: self.stream_deadline_secs.map(Duration::from_secs),
            heartbeat_interval: self.heartbeat_secs.map(Duration::from_secs),
            heartbeat_style: self.heartbeat_style,
            stream_idle_timeout: self.idle_timeout_secs.map(optional_secs),
            session_budget: self.session_budget_secs.map(optional_secs),
        }
    }

    /// Profile preset with the given flags applied, validated.
    ///
    /// The credential is not part of the arguments; attach it separately.
    pub fn to_settings(&self) -> Result<RelaySettings, SettingsError> {
        let mut settings = RelaySettings::for_profile(self.profile);
        settings.merge(&self.overrides());
        settings.validate()?;
        Ok(settings)
    }
}

/// `0` turns an optional limit off.
fn optional_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
