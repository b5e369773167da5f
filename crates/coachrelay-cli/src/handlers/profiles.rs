//! Profiles command handler.

use std::time::Duration;

use coachrelay_core::{DeploymentProfile, RelaySettings};

/// Print each profile's preset.
pub fn execute() {
    for profile in DeploymentProfile::all() {
        println!("{}", describe(&RelaySettings::for_profile(profile)));
    }
}

fn describe(settings: &RelaySettings) -> String {
    format!(
        "{}\n  request deadline:  {}\n  stream deadline:   {}\n  heartbeat:         {} ({})\n  idle timeout:      {}\n  session budget:    {}\n  stream by default: {}\n",
        settings.profile,
        secs(Some(settings.request_deadline)),
        secs(Some(settings.stream_deadline)),
        secs(Some(settings.heartbeat_interval)),
        settings.heartbeat_style.as_str(),
        secs(settings.stream_idle_timeout),
        secs(settings.session_budget),
        settings.stream_default,
    )
}

fn secs(value: Option<Duration>) -> String {
    value.map_or_else(|| "none".to_string(), |d| format!("{}s", d.as_secs()))
}
