//! Trigger hold-duration tracker.
//!
//! The trigger is sampled once per tick.  A press starts timing on the first
//! asserted sample and is classified once, on the first released sample:
//!
//! | Held for             | Request        | Indicator period |
//! |----------------------|----------------|------------------|
//! | < portal             | none           | 1000 ms          |
//! | ≥ portal, < factory  | `OpenPortal`   | 200 ms           |
//! | ≥ factory            | `FactoryReset` | 50 ms            |

use log::{debug, info};

use super::ProvisioningRequest;
use crate::config::PanelSettings;

const SHORT_BLINK_MS: u32 = 1000;
const PORTAL_BLINK_MS: u32 = 200;
const FACTORY_BLINK_MS: u32 = 50;

/// How far into a hold the trigger currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HoldStage {
    Short,
    Portal,
    Factory,
}

impl HoldStage {
    /// Indicator toggle period for this stage.
    pub fn blink_period_ms(self) -> u32 {
        match self {
            Self::Short => SHORT_BLINK_MS,
            Self::Portal => PORTAL_BLINK_MS,
            Self::Factory => FACTORY_BLINK_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PressState {
    Idle,
    Timing { since_ms: u32 },
}

#[derive(Debug, Clone)]
pub struct PressTracker {
    state: PressState,
    portal_ms: u32,
    factory_ms: u32,
}

impl PressTracker {
    /// Thresholds in milliseconds; `factory_ms` is expected above `portal_ms`.
    pub fn new(portal_ms: u32, factory_ms: u32) -> Self {
        Self {
            state: PressState::Idle,
            portal_ms,
            factory_ms,
        }
    }

    pub fn from_settings(settings: &PanelSettings) -> Self {
        Self::new(settings.portal_hold_ms(), settings.factory_hold_ms())
    }

    /// Feed one sample.  Returns a request only on the release edge.
    pub fn update(&mut self, now_ms: u32, asserted: bool) -> Option<ProvisioningRequest> {
        match (self.state, asserted) {
            (PressState::Idle, true) => {
                debug!("PRESS | trigger down");
                self.state = PressState::Timing { since_ms: now_ms };
                None
            }
            (PressState::Timing { since_ms }, false) => {
                self.state = PressState::Idle;
                let held = now_ms.wrapping_sub(since_ms);
                let request = self.classify(held);
                info!("PRESS | released after {} ms -> {:?}", held, request);
                request
            }
            _ => None,
        }
    }

    /// Request a hold of `held_ms` would produce on release.
    pub fn classify(&self, held_ms: u32) -> Option<ProvisioningRequest> {
        match self.stage_for(held_ms) {
            HoldStage::Factory => Some(ProvisioningRequest::FactoryReset),
            HoldStage::Portal => Some(ProvisioningRequest::OpenPortal),
            HoldStage::Short => None,
        }
    }

    pub fn is_timing(&self) -> bool {
        matches!(self.state, PressState::Timing { .. })
    }

    /// Milliseconds the trigger has been held, if it is.
    pub fn held_ms(&self, now_ms: u32) -> Option<u32> {
        match self.state {
            PressState::Timing { since_ms } => Some(now_ms.wrapping_sub(since_ms)),
            PressState::Idle => None,
        }
    }

    pub fn stage(&self, now_ms: u32) -> Option<HoldStage> {
        self.held_ms(now_ms).map(|held| self.stage_for(held))
    }

    /// Indicator level while held (square wave at the stage's period),
    /// `None` when idle.
    pub fn indicator_level(&self, now_ms: u32) -> Option<bool> {
        self.stage(now_ms)
            .map(|stage| (now_ms / stage.blink_period_ms()) % 2 == 1)
    }

    fn stage_for(&self, held_ms: u32) -> HoldStage {
        if held_ms >= self.factory_ms {
            HoldStage::Factory
        } else if held_ms >= self.portal_ms {
            HoldStage::Portal
        } else {
            HoldStage::Short
        }
    }
}
