//! Connectivity watchdog.
//!
//! Refreshes its timestamp on every connected sample.  Once the link has been
//! down for a full timeout it asks for the portal and restarts its clock, so
//! a link that never comes back fires once per interval.

use log::{info, warn};

use super::ProvisioningRequest;

#[derive(Debug, Clone)]
pub struct ConnectivityWatchdog {
    timeout_ms: u32,
    connected: bool,
    last_connected_ms: u32,
}

impl ConnectivityWatchdog {
    /// The clock starts at `now_ms`, as if the link had just been seen.
    pub fn new(timeout_ms: u32, now_ms: u32) -> Self {
        Self {
            timeout_ms,
            connected: false,
            last_connected_ms: now_ms,
        }
    }

    pub fn update(&mut self, now_ms: u32, connected: bool) -> Option<ProvisioningRequest> {
        if connected != self.connected {
            if connected {
                info!("WDOG | link up");
            } else {
                warn!("WDOG | link lost");
            }
            self.connected = connected;
        }

        if connected {
            self.last_connected_ms = now_ms;
            return None;
        }

        if now_ms.wrapping_sub(self.last_connected_ms) >= self.timeout_ms {
            warn!(
                "WDOG | no link for {} ms, requesting portal",
                self.timeout_ms
            );
            self.last_connected_ms = now_ms;
            return Some(ProvisioningRequest::OpenPortal);
        }
        None
    }

    /// Restart the clock without a sample (after a portal session).
    pub fn reset(&mut self, now_ms: u32) {
        self.last_connected_ms = now_ms;
    }

    /// How long the link has been down, `None` while connected.
    pub fn disconnected_for(&self, now_ms: u32) -> Option<u32> {
        (!self.connected).then(|| now_ms.wrapping_sub(self.last_connected_ms))
    }
}
