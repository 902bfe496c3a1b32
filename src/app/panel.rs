//! Panel service: the host-facing context object.
//!
//! ```text
//!  init ─► start ─► tick ─► tick ─► … ─► Restart(cause)
//!                    │
//!                    ├─ 1. link: connect / poll transport into inbox
//!                    ├─ 2. drain inbox → Dispatcher (→ broadcast on Sync)
//!                    ├─ 3. PressTracker   (indicator blink)
//!                    ├─ 4. ConnectivityWatchdog
//!                    └─ 5. ProvisioningCoordinator (press beats watchdog)
//! ```
//!
//! The panel owns its collaborators and borrows the host's variables for
//! `'a`.  It never reboots by itself: every path that needs a restart is
//! reported as [`TickOutcome::Restart`].

use core::cell::Cell;

use log::{info, warn};

use super::coordinator::{PortalTrigger, ProvisioningCoordinator, RestartCause};
use super::ports::{Board, ConfigPort, Inbox, PortalPort, PubSubPort};
use crate::channel::codec;
use crate::channel::dispatch::{DispatchOutcome, Dispatcher};
use crate::channel::{Binding, ChannelHandle, ChannelTable, TextSlot};
use crate::config::{PanelConfig, PanelSettings};
use crate::error::{ConfigError, RegistrationError};
use crate::resilience::{
    ConnectStep, ConnectSupervisor, ConnectivityWatchdog, PressTracker, ProvisioningRequest,
};

const RESCUE_FLASHES: u32 = 5;
const RESCUE_FLASH_MS: u32 = 100;

/// Host hook called with every inbound message after channel dispatch.
pub type MessageCallback<'a> = Box<dyn FnMut(&str, &[u8]) + 'a>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// The process must restart now.
    Restart(RestartCause),
}

pub struct Panel<'a, T, P, S, B>
where
    T: PubSubPort,
    P: PortalPort,
    S: ConfigPort,
    B: Board,
{
    settings: PanelSettings,
    config: PanelConfig,
    transport: Option<T>,
    board: B,
    coordinator: ProvisioningCoordinator<P, S>,
    table: ChannelTable<'a>,
    dispatcher: Dispatcher,
    press: PressTracker,
    watchdog: ConnectivityWatchdog,
    /// Set by `start`: the next tick restarts the watchdog clock, since
    /// boot provisioning may block for a whole portal session.
    rearm_watchdog: bool,
    link: ConnectSupervisor,
    inbox: Inbox,
    on_message: Option<MessageCallback<'a>>,
}

impl<'a, T, P, S, B> Panel<'a, T, P, S, B>
where
    T: PubSubPort,
    P: PortalPort,
    S: ConfigPort,
    B: Board,
{
    /// Validate `settings`, load the stored config and arm every tracker
    /// with `now_ms` as the reference time.
    pub fn init(
        transport: T,
        portal: P,
        store: S,
        board: B,
        settings: PanelSettings,
        on_message: Option<MessageCallback<'a>>,
        now_ms: u32,
    ) -> Result<Self, ConfigError> {
        settings.validate()?;

        let coordinator = ProvisioningCoordinator::new(portal, store);
        let config = coordinator.load_config();

        info!(
            "PANEL | init: portal {} s, factory {} s, watchdog {} s",
            settings.portal_hold_secs, settings.factory_hold_secs, settings.watchdog_timeout_secs
        );

        Ok(Self {
            press: PressTracker::from_settings(&settings),
            watchdog: ConnectivityWatchdog::new(settings.watchdog_timeout_ms(), now_ms),
            rearm_watchdog: false,
            link: ConnectSupervisor::from_settings(&settings),
            dispatcher: Dispatcher::new(settings.broadcast_throttle_ms),
            settings,
            config,
            transport: Some(transport),
            board,
            coordinator,
            table: ChannelTable::new(),
            inbox: Inbox::new(),
            on_message,
        })
    }

    /// Boot sequence: trigger rescue, then network provisioning.
    pub fn start(&mut self) -> TickOutcome {
        if self.boot_rescue_held() {
            return self.factory_reset();
        }

        match self
            .coordinator
            .boot_provision(&self.settings.setup_ap_name, &mut self.config)
        {
            Ok(()) => {
                info!("PANEL | started");
                self.rearm_watchdog = true;
                TickOutcome::Continue
            }
            Err(cause) => TickOutcome::Restart(cause),
        }
    }

    /// One pass of the control loop.
    pub fn tick(&mut self, now_ms: u32) -> TickOutcome {
        if let Some(trigger) = self.service_link(now_ms) {
            return self.open_portal(trigger, now_ms);
        }
        self.drain_inbox();

        let was_timing = self.press.is_timing();
        let asserted = self.board.trigger_asserted();
        let press = self.press.update(now_ms, asserted);
        if let Some(level) = self.press.indicator_level(now_ms) {
            self.board.set_indicator(level);
        } else if was_timing {
            self.board.set_indicator(false);
        }

        if self.rearm_watchdog {
            self.watchdog.reset(now_ms);
            self.rearm_watchdog = false;
        }
        let link_up = self.is_connected();
        let overdue = self.watchdog.update(now_ms, link_up);

        let request = press
            .map(|r| (r, PortalTrigger::Button))
            .or(overdue.map(|r| (r, PortalTrigger::Watchdog)));

        match request {
            None => TickOutcome::Continue,
            Some((ProvisioningRequest::FactoryReset, _)) => self.factory_reset(),
            Some((ProvisioningRequest::OpenPortal, trigger)) => self.open_portal(trigger, now_ms),
        }
    }

    // ── Channel registration ───────────────────────────────────

    pub fn register_switch(
        &mut self,
        set_topic: &str,
        value: &'a Cell<bool>,
    ) -> Result<ChannelHandle, RegistrationError> {
        self.register(set_topic, Binding::Switch(value))
    }

    pub fn register_dimmer(
        &mut self,
        set_topic: &str,
        value: &'a Cell<i32>,
    ) -> Result<ChannelHandle, RegistrationError> {
        self.register(set_topic, Binding::Dimmer(value))
    }

    pub fn register_select(
        &mut self,
        set_topic: &str,
        value: &'a Cell<i32>,
    ) -> Result<ChannelHandle, RegistrationError> {
        self.register(set_topic, Binding::Select(value))
    }

    /// Publish-only: included in broadcasts, never subscribed.
    pub fn register_number(
        &mut self,
        set_topic: &str,
        value: &'a Cell<f32>,
    ) -> Result<ChannelHandle, RegistrationError> {
        self.register(set_topic, Binding::Number(value))
    }

    pub fn register_text(
        &mut self,
        set_topic: &str,
        value: &'a dyn TextSlot,
    ) -> Result<ChannelHandle, RegistrationError> {
        self.register(set_topic, Binding::Text(value))
    }

    /// A `"1"` on `set_topic` republishes every channel.
    pub fn register_sync(&mut self, set_topic: &str) -> Result<ChannelHandle, RegistrationError> {
        self.register(set_topic, Binding::Sync)
    }

    fn register(
        &mut self,
        set_topic: &str,
        binding: Binding<'a>,
    ) -> Result<ChannelHandle, RegistrationError> {
        self.table
            .register(self.transport.as_mut(), set_topic, binding)
    }

    // ── Messaging ──────────────────────────────────────────────

    /// Route one message as if it had arrived from the transport.
    pub fn handle_message(&mut self, topic: &str, payload: &[u8]) -> DispatchOutcome {
        let outcome = match self.transport.as_mut() {
            Some(transport) => self.dispatcher.handle_message(
                &self.table,
                transport,
                &mut self.board,
                topic,
                payload,
            ),
            None => self.dispatcher.route(&self.table, topic, payload),
        };
        if let Some(callback) = self.on_message.as_mut() {
            callback(topic, payload);
        }
        outcome
    }

    /// Publish every channel's current value.  Returns the publish count.
    pub fn broadcast_all(&mut self) -> usize {
        match self.transport.as_mut() {
            Some(transport) => self
                .dispatcher
                .broadcast_all(&self.table, transport, &mut self.board),
            None => 0,
        }
    }

    /// Raw publish.  `false` without an active broker session.
    pub fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        match self.transport.as_mut() {
            Some(t) if t.connected() => t.publish(topic, payload),
            _ => false,
        }
    }

    pub fn publish_switch(&mut self, topic: &str, on: bool) -> bool {
        self.publish(topic, &codec::encode_switch(on))
    }

    pub fn publish_dimmer(&mut self, topic: &str, level: i32) -> bool {
        self.publish(topic, &codec::encode_int(level))
    }

    pub fn publish_select(&mut self, topic: &str, index: i32) -> bool {
        self.publish(topic, &codec::encode_int(index))
    }

    pub fn publish_number(&mut self, topic: &str, value: f32) -> bool {
        match codec::encode_number(value) {
            Ok(payload) => self.publish(topic, &payload),
            Err(_) => false,
        }
    }

    pub fn publish_text(&mut self, topic: &str, text: &str) -> bool {
        self.publish(topic, text.as_bytes())
    }

    pub fn subscribe(&mut self, topic: &str) -> bool {
        self.transport.as_mut().is_some_and(|t| t.subscribe(topic))
    }

    /// Network link state.
    pub fn is_connected(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| t.link_up())
    }

    // ── Accessors ──────────────────────────────────────────────

    pub fn config(&self) -> &PanelConfig {
        &self.config
    }

    pub fn settings(&self) -> &PanelSettings {
        &self.settings
    }

    pub fn channels(&self) -> &ChannelTable<'a> {
        &self.table
    }

    pub fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    pub fn transport_mut(&mut self) -> Option<&mut T> {
        self.transport.as_mut()
    }

    /// Take the transport out; later registrations fail with
    /// [`RegistrationError::TransportUnavailable`].
    pub fn detach_transport(&mut self) -> Option<T> {
        self.transport.take()
    }

    pub fn board(&self) -> &B {
        &self.board
    }

    pub fn board_mut(&mut self) -> &mut B {
        &mut self.board
    }

    pub fn coordinator(&self) -> &ProvisioningCoordinator<P, S> {
        &self.coordinator
    }

    // ── Internals ──────────────────────────────────────────────

    /// Keep the broker session alive and collect inbound messages.
    /// Returns a portal trigger when the connect failure limit is hit.
    fn service_link(&mut self, now_ms: u32) -> Option<PortalTrigger> {
        let transport = self.transport.as_mut()?;
        if !transport.link_up() {
            return None;
        }
        if transport.connected() {
            transport.poll(&mut self.inbox);
            return None;
        }
        if !self.link.attempt_due(now_ms) {
            return None;
        }

        info!(
            "LINK | connecting to {}:{} as '{}'",
            self.config.server, self.config.port, self.settings.client_id
        );
        let ok = transport.connect(&self.config, &self.settings.client_id);
        match self.link.record(now_ms, ok) {
            ConnectStep::Connected => {
                if !self.config.topic.is_empty() {
                    let mut wildcard = heapless::String::<48>::new();
                    if wildcard.push_str(&self.config.topic).is_ok()
                        && wildcard.push_str("/#").is_ok()
                    {
                        let _ = transport.subscribe(&wildcard);
                    }
                }
                self.table.resubscribe(transport);
                None
            }
            ConnectStep::Failed { .. } => None,
            ConnectStep::LimitReached => Some(PortalTrigger::ConnectFailures),
        }
    }

    fn drain_inbox(&mut self) {
        while let Some(msg) = self.inbox.pop_front() {
            self.handle_message(&msg.topic, &msg.payload);
        }
    }

    fn boot_rescue_held(&mut self) -> bool {
        if !self.board.trigger_asserted() {
            return false;
        }
        warn!(
            "PANEL | trigger held at boot, checking again in {} ms",
            self.settings.boot_rescue_hold_ms
        );
        self.board.delay_ms(self.settings.boot_rescue_hold_ms);
        if !self.board.trigger_asserted() {
            info!("PANEL | trigger released, normal boot");
            return false;
        }
        for _ in 0..RESCUE_FLASHES {
            self.board.set_indicator(true);
            self.board.delay_ms(RESCUE_FLASH_MS);
            self.board.set_indicator(false);
            self.board.delay_ms(RESCUE_FLASH_MS);
        }
        true
    }

    fn open_portal(&mut self, trigger: PortalTrigger, now_ms: u32) -> TickOutcome {
        self.board.set_indicator(false);
        let cause =
            self.coordinator
                .open_portal(trigger, trigger.ap_name(&self.settings), &mut self.config);
        self.watchdog.reset(now_ms);
        TickOutcome::Restart(cause)
    }

    fn factory_reset(&mut self) -> TickOutcome {
        self.board.set_indicator(false);
        TickOutcome::Restart(self.coordinator.factory_reset())
    }
}
