//! Mock adapters for integration tests.
//!
//! Every port call is recorded so tests can assert on the full history
//! without a broker, a radio or flash.

use std::collections::VecDeque;

use embedded_hal::delay::DelayNs;
use mqttpanel::app::ports::{self, Board, ConfigPort, Inbox, PortalPort, PubSubPort};
use mqttpanel::error::{PortalError, StoreError};
use mqttpanel::{Panel, PanelConfig, PanelSettings};

// ── Transport ─────────────────────────────────────────────────

pub struct MockTransport {
    pub link: bool,
    pub session: bool,
    pub accept_connect: bool,
    pub connect_calls: Vec<String>,
    pub subscriptions: Vec<String>,
    pub published: Vec<(String, Vec<u8>)>,
    pub pending: VecDeque<(String, Vec<u8>)>,
}

#[allow(dead_code)]
impl MockTransport {
    /// Link up, session established.
    pub fn online() -> Self {
        Self {
            link: true,
            session: true,
            accept_connect: true,
            connect_calls: Vec::new(),
            subscriptions: Vec::new(),
            published: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    /// Link up, no session yet.
    pub fn link_only() -> Self {
        Self {
            session: false,
            ..Self::online()
        }
    }

    /// No link at all.
    pub fn offline() -> Self {
        Self {
            link: false,
            session: false,
            ..Self::online()
        }
    }

    pub fn deliver(&mut self, topic: &str, payload: &[u8]) {
        self.pending.push_back((topic.to_string(), payload.to_vec()));
    }

    pub fn published_topics(&self) -> Vec<&str> {
        self.published.iter().map(|(t, _)| t.as_str()).collect()
    }
}

impl PubSubPort for MockTransport {
    fn link_up(&self) -> bool {
        self.link
    }

    fn connected(&self) -> bool {
        self.link && self.session
    }

    fn connect(&mut self, _broker: &PanelConfig, client_id: &str) -> bool {
        self.connect_calls.push(client_id.to_string());
        self.session = self.accept_connect;
        self.accept_connect
    }

    fn subscribe(&mut self, topic: &str) -> bool {
        self.subscriptions.push(topic.to_string());
        true
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        self.published.push((topic.to_string(), payload.to_vec()));
        true
    }

    fn poll(&mut self, inbox: &mut Inbox) {
        while !inbox.is_full() {
            let Some((topic, payload)) = self.pending.pop_front() else {
                break;
            };
            ports::enqueue(inbox, &topic, &payload);
        }
    }
}

// ── Portal ────────────────────────────────────────────────────

pub struct MockPortal {
    pub auto_result: Result<Option<PanelConfig>, PortalError>,
    pub run_result: Result<PanelConfig, PortalError>,
    pub auto_calls: Vec<String>,
    pub runs: Vec<(String, PanelConfig)>,
    pub erased: bool,
}

impl Default for MockPortal {
    fn default() -> Self {
        Self {
            auto_result: Ok(None),
            run_result: Err(PortalError::Timeout),
            auto_calls: Vec::new(),
            runs: Vec::new(),
            erased: false,
        }
    }
}

impl PortalPort for MockPortal {
    fn auto_connect(
        &mut self,
        ap_name: &str,
        _prefill: &PanelConfig,
    ) -> Result<Option<PanelConfig>, PortalError> {
        self.auto_calls.push(ap_name.to_string());
        self.auto_result.clone()
    }

    fn run(&mut self, ap_name: &str, prefill: &PanelConfig) -> Result<PanelConfig, PortalError> {
        self.runs.push((ap_name.to_string(), prefill.clone()));
        self.run_result.clone()
    }

    fn erase_credentials(&mut self) {
        self.erased = true;
    }
}

// ── Config store ──────────────────────────────────────────────

#[derive(Default)]
pub struct MockStore {
    pub doc: Option<PanelConfig>,
    pub saves: usize,
    pub removes: usize,
}

#[allow(dead_code)]
impl MockStore {
    pub fn with(config: PanelConfig) -> Self {
        Self {
            doc: Some(config),
            ..Self::default()
        }
    }
}

impl ConfigPort for MockStore {
    fn load(&self) -> Result<Option<PanelConfig>, StoreError> {
        Ok(self.doc.clone())
    }

    fn save(&mut self, config: &PanelConfig) -> Result<(), StoreError> {
        self.saves += 1;
        self.doc = Some(config.clone());
        Ok(())
    }

    fn remove(&mut self) -> Result<(), StoreError> {
        self.removes += 1;
        self.doc = None;
        Ok(())
    }
}

// ── Board ─────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockBoard {
    pub trigger: bool,
    /// Release the trigger during the next delay (boot-rescue tests).
    pub release_on_delay: bool,
    pub indicator: bool,
    pub indicator_writes: Vec<bool>,
    pub delays_ms: Vec<u32>,
}

impl Board for MockBoard {
    fn trigger_asserted(&mut self) -> bool {
        self.trigger
    }

    fn set_indicator(&mut self, on: bool) {
        self.indicator = on;
        self.indicator_writes.push(on);
    }
}

impl DelayNs for MockBoard {
    fn delay_ns(&mut self, ns: u32) {
        self.delay_ms(ns / 1_000_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays_ms.push(ms);
        if self.release_on_delay {
            self.trigger = false;
        }
    }
}

// ── Panel construction ────────────────────────────────────────

pub type TestPanel<'a> = Panel<'a, MockTransport, MockPortal, MockStore, MockBoard>;

#[allow(dead_code)]
pub fn panel_with<'a>(transport: MockTransport, portal: MockPortal, store: MockStore) -> TestPanel<'a> {
    Panel::init(
        transport,
        portal,
        store,
        MockBoard::default(),
        PanelSettings::default(),
        None,
        0,
    )
    .unwrap()
}

#[allow(dead_code)]
pub fn online_panel<'a>() -> TestPanel<'a> {
    panel_with(
        MockTransport::online(),
        MockPortal::default(),
        MockStore::with(PanelConfig::new("broker.local", "1883", "home")),
    )
}
