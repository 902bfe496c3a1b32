//! Panel configuration.
//!
//! Two kinds of configuration live here:
//!
//! - [`PanelSettings`]: compile/boot-time tunables for the resilience
//!   state machine (press thresholds, watchdog timeout, retry policy).
//! - [`PanelConfig`]: the three user-provided strings (broker server, port,
//!   topic prefix) that are edited through the provisioning portal and
//!   persisted as a flat JSON document.

use core::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, StoreError};

/// Maximum length of the broker host name.
pub const SERVER_LEN: usize = 40;
/// Maximum length of the broker port string.
pub const PORT_LEN: usize = 6;
/// Maximum length of the topic prefix.
pub const TOPIC_PREFIX_LEN: usize = 40;
/// Maximum length of an access-point name.
pub const AP_NAME_LEN: usize = 32;

/// Maximum length of the broker client id.
pub const CLIENT_ID_LEN: usize = 24;

pub type ApName = heapless::String<AP_NAME_LEN>;
pub type ClientId = heapless::String<CLIENT_ID_LEN>;

/// Copy `src` into a bounded string, dropping whatever does not fit.
/// Truncation always lands on a UTF-8 character boundary.
pub(crate) fn truncated<const N: usize>(src: &str) -> heapless::String<N> {
    let mut end = src.len().min(N);
    while !src.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = heapless::String::new();
    // Cannot fail: `end <= N`.
    let _ = out.push_str(&src[..end]);
    out
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Resilience tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelSettings {
    // --- Trigger button ---
    /// Hold duration (seconds) that opens the portal on release.
    pub portal_hold_secs: u16,
    /// Hold duration (seconds) that factory-resets on release.
    pub factory_hold_secs: u16,
    /// `true` when the trigger reads low while pressed (pull-up wiring).
    pub trigger_active_low: bool,
    /// How long the trigger must stay asserted at boot to force a reset.
    pub boot_rescue_hold_ms: u32,

    // --- Connectivity ---
    /// Seconds without network link before the portal opens.
    pub watchdog_timeout_secs: u16,
    /// Minimum spacing between broker connect attempts (ms).
    pub connect_retry_interval_ms: u32,
    /// Consecutive failed connect attempts that open the portal.
    pub connect_failure_limit: u8,
    /// Client id presented to the broker.
    pub client_id: ClientId,

    // --- Broadcast ---
    /// Pause before each publish in a broadcast (ms).
    pub broadcast_throttle_ms: u32,

    // --- Portal access points ---
    pub setup_ap_name: ApName,
    pub on_demand_ap_name: ApName,
    pub recovery_ap_name: ApName,
}

impl Default for PanelSettings {
    fn default() -> Self {
        Self {
            portal_hold_secs: 3,
            factory_hold_secs: 10,
            trigger_active_low: true,
            boot_rescue_hold_ms: 2000,

            watchdog_timeout_secs: 60,
            connect_retry_interval_ms: 5000,
            connect_failure_limit: 5,
            client_id: truncated("mqttpanel"),

            broadcast_throttle_ms: 10,

            setup_ap_name: truncated("Panel_Setup"),
            on_demand_ap_name: truncated("Panel_OnDemand"),
            recovery_ap_name: truncated("Panel_Recovery"),
        }
    }
}

impl PanelSettings {
    pub fn portal_hold_ms(&self) -> u32 {
        u32::from(self.portal_hold_secs) * 1000
    }

    pub fn factory_hold_ms(&self) -> u32 {
        u32::from(self.factory_hold_secs) * 1000
    }

    pub fn watchdog_timeout_ms(&self) -> u32 {
        u32::from(self.watchdog_timeout_secs) * 1000
    }

    /// Reject settings that would make the state machine misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.portal_hold_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "portal_hold_secs must be > 0",
            ));
        }
        if self.factory_hold_secs <= self.portal_hold_secs {
            return Err(ConfigError::ValidationFailed(
                "factory_hold_secs must be > portal_hold_secs",
            ));
        }
        if self.watchdog_timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "watchdog_timeout_secs must be > 0",
            ));
        }
        if self.connect_failure_limit == 0 {
            return Err(ConfigError::ValidationFailed(
                "connect_failure_limit must be > 0",
            ));
        }
        if self.broadcast_throttle_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "broadcast_throttle_ms must be > 0",
            ));
        }
        if self.client_id.is_empty() {
            return Err(ConfigError::ValidationFailed("client_id must not be empty"));
        }
        if self.setup_ap_name.is_empty()
            || self.on_demand_ap_name.is_empty()
            || self.recovery_ap_name.is_empty()
        {
            return Err(ConfigError::ValidationFailed(
                "access point names must not be empty",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Persisted config
// ---------------------------------------------------------------------------

/// Broker parameters edited through the portal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PanelConfig {
    #[serde(rename = "mqtt_server")]
    pub server: heapless::String<SERVER_LEN>,
    #[serde(rename = "mqtt_port")]
    pub port: heapless::String<PORT_LEN>,
    #[serde(rename = "mqtt_topic")]
    pub topic: heapless::String<TOPIC_PREFIX_LEN>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            server: heapless::String::new(),
            port: truncated("1883"),
            topic: heapless::String::new(),
        }
    }
}

/// Wire shape of the stored document.  Owned strings so that over-long
/// values can be truncated instead of rejected.
#[derive(Deserialize)]
struct StoredConfig {
    #[serde(default)]
    mqtt_server: String,
    #[serde(default)]
    mqtt_port: String,
    #[serde(default)]
    mqtt_topic: String,
}

impl PanelConfig {
    /// Build from plain strings, truncating each field to its bound.
    pub fn new(server: &str, port: &str, topic: &str) -> Self {
        Self {
            server: truncated(server),
            port: truncated(port),
            topic: truncated(topic),
        }
    }

    /// Serialize as a flat JSON object.
    pub fn to_json(&self) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(self).map_err(|_| StoreError::IoError)
    }

    /// Parse a stored document.  Missing keys become empty strings.
    pub fn from_json(bytes: &[u8]) -> Result<Self, StoreError> {
        let stored: StoredConfig =
            serde_json::from_slice(bytes).map_err(|_| StoreError::Corrupted)?;
        Ok(Self::new(
            &stored.mqtt_server,
            &stored.mqtt_port,
            &stored.mqtt_topic,
        ))
    }

    /// Broker port as a number.  `None` when empty, malformed or zero.
    pub fn port_number(&self) -> Option<u16> {
        self.port.parse::<u16>().ok().filter(|p| *p > 0)
    }

    /// `mqtt://server:port`, or `None` without a usable server and port.
    pub fn broker_url(&self) -> Option<heapless::String<64>> {
        let port = self.port_number()?;
        if self.server.is_empty() {
            return None;
        }
        let mut url = heapless::String::new();
        write!(url, "mqtt://{}:{}", self.server, port).ok()?;
        Some(url)
    }
}
