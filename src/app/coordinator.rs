//! Provisioning coordinator.
//!
//! Owns the portal and config-store collaborators and turns provisioning
//! requests into portal sessions, factory resets and restarts.  Every path
//! out of here except a clean boot ends in a [`RestartCause`]: the caller
//! is expected to reboot.

use log::{error, info, warn};

use super::ports::{ConfigPort, PortalPort};
use crate::config::{PanelConfig, PanelSettings};
use crate::error::PortalError;

/// What asked for a portal session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortalTrigger {
    /// Trigger held past the portal threshold.
    Button,
    /// Network link down past the watchdog timeout.
    Watchdog,
    /// Too many consecutive broker connect failures.
    ConnectFailures,
}

impl PortalTrigger {
    /// Access point a portal for this trigger is served under.
    pub fn ap_name(self, settings: &PanelSettings) -> &str {
        match self {
            Self::Button => &settings.on_demand_ap_name,
            Self::Watchdog | Self::ConnectFailures => &settings.recovery_ap_name,
        }
    }
}

/// Why the panel wants the process restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartCause {
    /// A portal session completed and its values were adopted.
    PortalCompleted(PortalTrigger),
    /// A portal session ended without a submission.
    PortalTimeout(PortalTrigger),
    /// A portal session could not be started.
    PortalFailed(PortalTrigger),
    /// Credentials and stored config were erased.
    FactoryReset,
    /// Boot-time provisioning did not produce a network connection.
    BootProvisioningFailed,
}

pub struct ProvisioningCoordinator<P: PortalPort, S: ConfigPort> {
    portal: P,
    store: S,
}

impl<P: PortalPort, S: ConfigPort> ProvisioningCoordinator<P, S> {
    pub fn new(portal: P, store: S) -> Self {
        Self { portal, store }
    }

    /// Stored config, or defaults when absent or unreadable.
    pub fn load_config(&self) -> PanelConfig {
        match self.store.load() {
            Ok(Some(config)) => {
                info!(
                    "PORTAL | loaded config server='{}' port='{}' topic='{}'",
                    config.server, config.port, config.topic
                );
                config
            }
            Ok(None) => {
                info!("PORTAL | no stored config, using defaults");
                PanelConfig::default()
            }
            Err(e) => {
                warn!("PORTAL | stored config unusable ({}), using defaults", e);
                PanelConfig::default()
            }
        }
    }

    /// Join the network at boot, opening the setup portal if needed.
    pub fn boot_provision(
        &mut self,
        ap_name: &str,
        config: &mut PanelConfig,
    ) -> Result<(), RestartCause> {
        info!("PORTAL | auto-connect (fallback AP '{}')", ap_name);
        match self.portal.auto_connect(ap_name, config) {
            Ok(None) => Ok(()),
            Ok(Some(updated)) => {
                self.adopt(config, updated);
                Ok(())
            }
            Err(e) => {
                error!("PORTAL | boot provisioning failed: {}", e);
                Err(RestartCause::BootProvisioningFailed)
            }
        }
    }

    /// Run a portal session with `config` pre-filled.  Always ends in a
    /// restart, whatever the session outcome.
    pub fn open_portal(
        &mut self,
        trigger: PortalTrigger,
        ap_name: &str,
        config: &mut PanelConfig,
    ) -> RestartCause {
        info!("PORTAL | opening '{}' ({:?})", ap_name, trigger);
        match self.portal.run(ap_name, config) {
            Ok(updated) => {
                self.adopt(config, updated);
                RestartCause::PortalCompleted(trigger)
            }
            Err(PortalError::Timeout) => {
                warn!("PORTAL | session timed out");
                RestartCause::PortalTimeout(trigger)
            }
            Err(e) => {
                error!("PORTAL | {}", e);
                RestartCause::PortalFailed(trigger)
            }
        }
    }

    /// Forget network credentials and delete the stored config.
    pub fn factory_reset(&mut self) -> RestartCause {
        warn!("PORTAL | factory reset");
        self.portal.erase_credentials();
        if let Err(e) = self.store.remove() {
            error!("PORTAL | removing stored config failed: {}", e);
        }
        RestartCause::FactoryReset
    }

    fn adopt(&mut self, config: &mut PanelConfig, updated: PanelConfig) {
        *config = updated;
        match self.store.save(config) {
            Ok(()) => info!("PORTAL | config saved"),
            Err(e) => error!("PORTAL | saving config failed: {}", e),
        }
    }

    pub fn portal(&self) -> &P {
        &self.portal
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}
