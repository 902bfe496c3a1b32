//! Port traits: the boundary between the panel core and the platform.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Panel (domain)
//! ```
//!
//! The [`Panel`](super::panel::Panel) is generic over these traits, so the
//! channel engine and the resilience state machine never touch WiFi, MQTT,
//! flash or GPIO directly.  Host tests plug in recording mocks.

use embedded_hal::delay::DelayNs;
use log::warn;

use crate::channel::{MAX_PAYLOAD_LEN, MAX_TOPIC_LEN, Payload, Topic};
use crate::config::PanelConfig;
use crate::error::{PortalError, StoreError};

/// Inbound messages buffered between two ticks.
pub const INBOX_DEPTH: usize = 8;

// ───────────────────────────────────────────────────────────────
// Inbound queue
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub topic: Topic,
    pub payload: Payload,
}

impl InboundMessage {
    /// `None` when the topic or payload exceeds its bound.  A truncated
    /// topic could be routed to the wrong channel, so nothing is cut.
    pub fn new(topic: &str, payload: &[u8]) -> Option<Self> {
        if topic.len() > MAX_TOPIC_LEN || payload.len() > MAX_PAYLOAD_LEN {
            return None;
        }
        let mut t = Topic::new();
        t.push_str(topic).ok()?;
        Some(Self {
            topic: t,
            payload: Payload::from_slice(payload).ok()?,
        })
    }
}

/// Messages received during [`PubSubPort::poll`], drained by the next tick.
pub type Inbox = heapless::Deque<InboundMessage, INBOX_DEPTH>;

/// Queue a message, dropping it (with a warning) when it is oversized or
/// the inbox is full.
pub fn enqueue(inbox: &mut Inbox, topic: &str, payload: &[u8]) -> bool {
    let Some(msg) = InboundMessage::new(topic, payload) else {
        warn!("PANEL | dropped oversized message on '{}'", topic);
        return false;
    };
    if inbox.push_back(msg).is_err() {
        warn!("PANEL | inbox full, dropped message on '{}'", topic);
        return false;
    }
    true
}

// ───────────────────────────────────────────────────────────────
// Pub/sub transport
// ───────────────────────────────────────────────────────────────

/// Broker transport.  Delivery guarantees are the implementation's concern.
pub trait PubSubPort {
    /// Network link (e.g. WiFi association) is up.
    fn link_up(&self) -> bool;

    /// A broker session is established.
    fn connected(&self) -> bool;

    /// Open a broker session using `broker` with `client_id`.
    fn connect(&mut self, broker: &PanelConfig, client_id: &str) -> bool;

    /// Subscribe to `topic`.  Best effort.
    fn subscribe(&mut self, topic: &str) -> bool;

    /// Publish `payload` on `topic`.  `false` if the message was not accepted.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> bool;

    /// Move every message received since the last call into `inbox`.
    fn poll(&mut self, inbox: &mut Inbox);
}

// ───────────────────────────────────────────────────────────────
// Provisioning portal
// ───────────────────────────────────────────────────────────────

/// Captive configuration portal and the network credentials it manages.
pub trait PortalPort {
    /// Join the stored network, falling back to a portal under `ap_name`
    /// when that fails.  `Ok(Some(_))` carries values submitted through the
    /// portal, `Ok(None)` means the stored network was joined directly.
    fn auto_connect(
        &mut self,
        ap_name: &str,
        prefill: &PanelConfig,
    ) -> Result<Option<PanelConfig>, PortalError>;

    /// Run an interactive portal under `ap_name` with `prefill` shown in the
    /// form.  Returns the submitted values.
    fn run(&mut self, ap_name: &str, prefill: &PanelConfig) -> Result<PanelConfig, PortalError>;

    /// Forget the stored network credentials.
    fn erase_credentials(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Configuration store
// ───────────────────────────────────────────────────────────────

/// Persists the [`PanelConfig`] document.
pub trait ConfigPort {
    /// `Ok(None)` when nothing has been stored yet.
    fn load(&self) -> Result<Option<PanelConfig>, StoreError>;

    fn save(&mut self, config: &PanelConfig) -> Result<(), StoreError>;

    /// Delete the stored document.  Removing an absent document succeeds.
    fn remove(&mut self) -> Result<(), StoreError>;
}

// ───────────────────────────────────────────────────────────────
// Board I/O
// ───────────────────────────────────────────────────────────────

/// Trigger input, indicator output and blocking delays.
pub trait Board: DelayNs {
    /// Trigger is currently pressed (polarity already applied).
    fn trigger_asserted(&mut self) -> bool;

    fn set_indicator(&mut self, on: bool);
}
