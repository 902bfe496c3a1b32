//! Application core: panel service and provisioning logic, zero I/O.
//!
//! All interaction with the network, flash and GPIO happens through the
//! **port traits** in [`ports`], so this layer runs unchanged under host
//! tests with mock adapters.

pub mod coordinator;
pub mod panel;
pub mod ports;

pub use coordinator::{PortalTrigger, ProvisioningCoordinator, RestartCause};
pub use panel::{MessageCallback, Panel, TickOutcome};
