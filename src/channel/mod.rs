//! Typed channel table.
//!
//! A channel binds one inbound control topic (`…/set`) to one application
//! variable owned by the host.  The table never owns the variables: each
//! [`Binding`] is a shared borrow of a `Cell` (or a [`TextSlot`]) so the host
//! keeps reading and writing its own values between ticks while the
//! dispatcher writes decoded payloads through the same borrow.
//!
//! ```text
//!  host: let lamp = Cell::new(false);
//!        panel.register_switch("home/lamp/set", &lamp)
//!                          │
//!   ┌──────────────────────▼───────────────────────────────┐
//!   │ ChannelTable  (fixed capacity, insertion order)      │
//!   │  [0] Switch  home/lamp/set  → home/lamp/val  &lamp   │
//!   │  [1] Dimmer  home/dim/set   → home/dim/val   &level  │
//!   │  [2] Sync    home/sync      → home/sync_val  —       │
//!   └──────────────────────────────────────────────────────┘
//! ```

pub mod codec;
pub mod dispatch;

use core::cell::{Cell, RefCell};
use core::fmt;

use log::{info, warn};

use crate::app::ports::PubSubPort;
use crate::config::truncated;
use crate::error::{CodecError, RegistrationError};

/// Maximum number of channels a panel can hold.
pub const MAX_CHANNELS: usize = 24;
/// Maximum topic length in bytes.  Longer topics are truncated.
pub const MAX_TOPIC_LEN: usize = 120;
/// Maximum payload length in bytes, both directions.
pub const MAX_PAYLOAD_LEN: usize = 256;

pub type Topic = heapless::String<MAX_TOPIC_LEN>;
pub type Payload = heapless::Vec<u8, MAX_PAYLOAD_LEN>;

// ---------------------------------------------------------------------------
// Value types and bindings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// On/off, `"1"` / `"0"`.
    Switch,
    /// Integer clamped to 0–100.
    Dimmer,
    /// Unbounded integer index.
    Select,
    /// Float read-out, publish only.
    Number,
    /// Free text bounded by the host's buffer.
    Text,
    /// Payload-less trigger that republishes every channel.
    Sync,
}

impl ValueType {
    /// Whether inbound messages can change a channel of this type.
    pub fn accepts_input(self) -> bool {
        !matches!(self, Self::Number)
    }

    /// Whether broadcast publishes a channel of this type.
    pub fn is_published(self) -> bool {
        !matches!(self, Self::Sync)
    }
}

/// Host-owned text storage a channel can write through.
///
/// Implemented for `RefCell<heapless::String<N>>` of any capacity.  Writes
/// never truncate: a value that does not fit is rejected and the previous
/// contents are kept.
pub trait TextSlot {
    /// Replace the stored text.
    fn replace(&self, text: &str) -> Result<(), CodecError>;

    /// Append the stored text to `out`.
    fn copy_into(&self, out: &mut Payload) -> Result<(), CodecError>;
}

impl<const N: usize> TextSlot for RefCell<heapless::String<N>> {
    fn replace(&self, text: &str) -> Result<(), CodecError> {
        if text.len() > N {
            return Err(CodecError::Overflow);
        }
        let mut slot = self.try_borrow_mut().map_err(|_| CodecError::DecodeIgnored)?;
        slot.clear();
        slot.push_str(text).map_err(|()| CodecError::Overflow)
    }

    fn copy_into(&self, out: &mut Payload) -> Result<(), CodecError> {
        let slot = self.try_borrow().map_err(|_| CodecError::DecodeIgnored)?;
        out.extend_from_slice(slot.as_bytes())
            .map_err(|()| CodecError::Overflow)
    }
}

/// Typed access to the variable behind a channel.
#[derive(Clone, Copy)]
pub enum Binding<'a> {
    Switch(&'a Cell<bool>),
    Dimmer(&'a Cell<i32>),
    Select(&'a Cell<i32>),
    Number(&'a Cell<f32>),
    Text(&'a dyn TextSlot),
    Sync,
}

impl Binding<'_> {
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Switch(_) => ValueType::Switch,
            Self::Dimmer(_) => ValueType::Dimmer,
            Self::Select(_) => ValueType::Select,
            Self::Number(_) => ValueType::Number,
            Self::Text(_) => ValueType::Text,
            Self::Sync => ValueType::Sync,
        }
    }
}

impl fmt::Debug for Binding<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Switch(c) => write!(f, "Switch({})", c.get()),
            Self::Dimmer(c) => write!(f, "Dimmer({})", c.get()),
            Self::Select(c) => write!(f, "Select({})", c.get()),
            Self::Number(c) => write!(f, "Number({})", c.get()),
            Self::Text(_) => write!(f, "Text"),
            Self::Sync => write!(f, "Sync"),
        }
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Index of a registered channel.  Stable for the table's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelHandle(usize);

impl ChannelHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug)]
pub struct Channel<'a> {
    set_topic: Topic,
    val_topic: Topic,
    binding: Binding<'a>,
}

impl<'a> Channel<'a> {
    pub fn new(set_topic: &str, binding: Binding<'a>) -> Self {
        Self {
            set_topic: truncated(set_topic),
            val_topic: derive_val_topic(set_topic),
            binding,
        }
    }

    pub fn value_type(&self) -> ValueType {
        self.binding.value_type()
    }

    pub fn set_topic(&self) -> &str {
        &self.set_topic
    }

    pub fn val_topic(&self) -> &str {
        &self.val_topic
    }

    pub fn binding(&self) -> &Binding<'a> {
        &self.binding
    }
}

/// Status topic for a control topic.
///
/// The first `"/set"` (anywhere, not only as a suffix) becomes `"/val"`;
/// without one, `"_val"` is appended as far as capacity allows.  The input
/// is truncated to [`MAX_TOPIC_LEN`] first, exactly like the stored
/// `set_topic`.
pub fn derive_val_topic(set_topic: &str) -> Topic {
    let base: Topic = truncated(set_topic);
    match base.find("/set") {
        Some(at) => {
            let mut out = Topic::new();
            // Same length as `base`: cannot overflow.
            let _ = out.push_str(&base[..at]);
            let _ = out.push_str("/val");
            let _ = out.push_str(&base[at + 4..]);
            out
        }
        None => {
            let mut out = base;
            for ch in "_val".chars() {
                if out.push(ch).is_err() {
                    break;
                }
            }
            out
        }
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Fixed-capacity, insertion-ordered channel table.
///
/// Entries occupy `[0, len)` with no gaps; the shape never changes after
/// start-up apart from appends.
#[derive(Debug, Default)]
pub struct ChannelTable<'a> {
    channels: heapless::Vec<Channel<'a>, MAX_CHANNELS>,
}

impl<'a> ChannelTable<'a> {
    pub fn new() -> Self {
        Self {
            channels: heapless::Vec::new(),
        }
    }

    /// Append a channel and subscribe its control topic.
    ///
    /// Capacity is checked before transport presence; either failure leaves
    /// the table untouched.  The subscription is fire-and-forget.  Number
    /// channels have no inbound path and are not subscribed.
    pub fn register<T: PubSubPort>(
        &mut self,
        transport: Option<&mut T>,
        set_topic: &str,
        binding: Binding<'a>,
    ) -> Result<ChannelHandle, RegistrationError> {
        if self.is_full() {
            warn!("PANEL | register '{}' rejected: table full", set_topic);
            return Err(RegistrationError::CapacityExceeded);
        }
        let Some(transport) = transport else {
            warn!("PANEL | register '{}' rejected: no transport", set_topic);
            return Err(RegistrationError::TransportUnavailable);
        };

        if set_topic.len() > MAX_TOPIC_LEN {
            warn!(
                "PANEL | topic '{}' truncated to {} bytes",
                set_topic, MAX_TOPIC_LEN
            );
        }

        let channel = Channel::new(set_topic, binding);
        let handle = ChannelHandle(self.channels.len());
        let kind = channel.value_type();
        if self.channels.push(channel).is_err() {
            return Err(RegistrationError::CapacityExceeded);
        }

        let entry = &self.channels[handle.0];
        if kind.accepts_input() {
            let _ = transport.subscribe(entry.set_topic());
        }
        info!(
            "PANEL | channel #{} {:?} {} -> {}",
            handle.0,
            kind,
            entry.set_topic(),
            entry.val_topic()
        );
        Ok(handle)
    }

    /// Subscribe every input channel again (after a broker reconnect).
    pub fn resubscribe<T: PubSubPort>(&self, transport: &mut T) {
        for ch in self.iter().filter(|c| c.value_type().accepts_input()) {
            let _ = transport.subscribe(ch.set_topic());
        }
    }

    /// First input channel whose control topic equals `topic`.
    ///
    /// Publish-only channels are never matched, so they cannot shadow an
    /// input channel registered on the same topic.
    pub fn find(&self, topic: &str) -> Option<(ChannelHandle, &Channel<'a>)> {
        self.channels
            .iter()
            .enumerate()
            .find(|(_, ch)| ch.value_type().accepts_input() && ch.set_topic() == topic)
            .map(|(i, ch)| (ChannelHandle(i), ch))
    }

    pub fn get(&self, handle: ChannelHandle) -> Option<&Channel<'a>> {
        self.channels.get(handle.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Channel<'a>> {
        self.channels.iter()
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.channels.is_full()
    }
}
