//! Resilience state machines.
//!
//! Three small, clock-driven trackers turn raw signals into provisioning
//! requests.  None of them touch hardware or the transport; the panel feeds
//! them `now_ms` and the sampled signal every tick and acts on the result.
//!
//! ```text
//!   trigger level ──► PressTracker ────────┐
//!                                          ├─► ProvisioningRequest
//!   link_up()     ──► ConnectivityWatchdog ┘     (press wins)
//!
//!   connect()     ──► ConnectSupervisor ──► LimitReached (portal)
//! ```
//!
//! All timestamps are `u32` milliseconds and compared with `wrapping_sub`,
//! so the ~49 day counter wrap is harmless.

pub mod link;
pub mod press;
pub mod watchdog;

pub use link::{ConnectStep, ConnectSupervisor};
pub use press::{HoldStage, PressTracker};
pub use watchdog::ConnectivityWatchdog;

/// Action requested by a tracker.  Consumed in the tick that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningRequest {
    OpenPortal,
    FactoryReset,
}
