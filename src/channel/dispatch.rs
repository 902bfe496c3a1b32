//! Inbound routing and broadcast.
//!
//! ```text
//!  (topic, payload) ──► first channel with set_topic == topic
//!                          │
//!              ┌───────────┼──────────────┐
//!              ▼           ▼              ▼
//!           Stored     SyncRequested   DecodeIgnored
//!       (write cell)   → broadcast_all  (keep value)
//! ```

use embedded_hal::delay::DelayNs;
use log::{debug, warn};

use super::codec::{self, Applied};
use super::{ChannelHandle, ChannelTable};
use crate::app::ports::PubSubPort;
use crate::error::CodecError;

/// Result of routing one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No channel listens on the topic.
    NoMatch,
    /// The bound variable was updated.
    Applied(ChannelHandle),
    /// A Sync channel fired and `published` values went out.
    Broadcast { channel: ChannelHandle, published: usize },
    /// The payload was rejected; the variable keeps its prior value.
    Ignored(ChannelHandle, CodecError),
}

/// Routes messages into a [`ChannelTable`] and publishes its values.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    throttle_ms: u32,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(10)
    }
}

impl Dispatcher {
    /// `throttle_ms` is the pause before every broadcast publish.  Zero is
    /// raised to 1.
    pub fn new(throttle_ms: u32) -> Self {
        Self {
            throttle_ms: throttle_ms.max(1),
        }
    }

    pub fn throttle_ms(&self) -> u32 {
        self.throttle_ms
    }

    /// Apply `payload` to the first channel registered on `topic`.
    ///
    /// Does not touch the transport; a Sync request is reported as
    /// `Broadcast { published: 0 }` for the caller to act on.
    pub fn route(&self, table: &ChannelTable<'_>, topic: &str, payload: &[u8]) -> DispatchOutcome {
        let Some((handle, channel)) = table.find(topic) else {
            debug!("PANEL | no channel for '{}'", topic);
            return DispatchOutcome::NoMatch;
        };

        match codec::apply(channel.binding(), payload) {
            Ok(Applied::Stored) => {
                debug!("PANEL | {} <- {:?}", topic, channel.binding());
                DispatchOutcome::Applied(handle)
            }
            Ok(Applied::SyncRequested) => DispatchOutcome::Broadcast {
                channel: handle,
                published: 0,
            },
            Err(CodecError::DecodeIgnored) => {
                debug!("PANEL | {} payload ignored", topic);
                DispatchOutcome::Ignored(handle, CodecError::DecodeIgnored)
            }
            Err(e) => {
                warn!("PANEL | {} rejected: {}", topic, e);
                DispatchOutcome::Ignored(handle, e)
            }
        }
    }

    /// Route one message and, for a Sync trigger, broadcast every value.
    pub fn handle_message<T: PubSubPort, D: DelayNs>(
        &self,
        table: &ChannelTable<'_>,
        transport: &mut T,
        delay: &mut D,
        topic: &str,
        payload: &[u8],
    ) -> DispatchOutcome {
        match self.route(table, topic, payload) {
            DispatchOutcome::Broadcast { channel, .. } => DispatchOutcome::Broadcast {
                channel,
                published: self.broadcast_all(table, transport, delay),
            },
            other => other,
        }
    }

    /// Publish every non-Sync channel's value on its status topic, in table
    /// order, pausing before each publish.  Returns the number of publishes
    /// issued; nothing is sent without an active session.
    pub fn broadcast_all<T: PubSubPort, D: DelayNs>(
        &self,
        table: &ChannelTable<'_>,
        transport: &mut T,
        delay: &mut D,
    ) -> usize {
        if !transport.connected() {
            debug!("PANEL | broadcast skipped: not connected");
            return 0;
        }

        let mut issued = 0;
        for channel in table.iter().filter(|c| c.value_type().is_published()) {
            let payload = match codec::encode(channel.binding()) {
                Ok(p) => p,
                Err(e) => {
                    warn!("PANEL | cannot encode {}: {}", channel.val_topic(), e);
                    continue;
                }
            };
            delay.delay_ms(self.throttle_ms);
            if !transport.publish(channel.val_topic(), &payload) {
                warn!("PANEL | publish to {} failed", channel.val_topic());
            }
            issued += 1;
        }
        debug!("PANEL | broadcast {} values", issued);
        issued
    }
}
