//! MQTT panel library.
//!
//! Binds host-owned variables (switches, dimmers, selections, numbers, text)
//! to MQTT topics and recovers from network or configuration failures
//! through a button-driven provisioning portal.
//!
//! ```text
//!   channel/     Codec Set · Channel Table · Dispatcher
//!   resilience/  Press Tracker · Connectivity Watchdog · Connect Supervisor
//!   app/         Ports · Provisioning Coordinator · Panel service
//!   adapters/    ESP-IDF and embedded-hal implementations of the ports
//! ```
//!
//! Everything outside `adapters` is platform independent.  ESP-IDF code is
//! guarded by `#[cfg(target_os = "espidf")]` within each adapter, so the
//! whole crate builds and tests on the host.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod channel;
pub mod config;
pub mod error;
pub mod resilience;

pub use app::{Panel, PortalTrigger, RestartCause, TickOutcome};
pub use channel::{Binding, ChannelHandle, TextSlot, ValueType};
pub use config::{PanelConfig, PanelSettings};
