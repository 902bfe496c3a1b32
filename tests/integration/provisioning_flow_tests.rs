//! End-to-end provisioning flows: trigger holds, connectivity loss, broker
//! connect failures and the boot sequence.

use std::cell::Cell;

use mqttpanel::error::PortalError;
use mqttpanel::{PanelConfig, PortalTrigger, RestartCause, TickOutcome};

use crate::mock_hw::{MockPortal, MockStore, MockTransport, TestPanel, online_panel, panel_with};

fn stored() -> PanelConfig {
    PanelConfig::new("broker.local", "1883", "home")
}

/// Hold the trigger from `from` to `to` (ticking every 100 ms), then release.
fn hold(panel: &mut TestPanel<'_>, from: u32, to: u32) -> TickOutcome {
    panel.board_mut().trigger = true;
    let mut t = from;
    while t < to {
        assert_eq!(panel.tick(t), TickOutcome::Continue, "no request while held (t={t})");
        t += 100;
    }
    panel.board_mut().trigger = false;
    panel.tick(to)
}

// ── Trigger holds ─────────────────────────────────────────────

#[test]
fn short_press_does_nothing() {
    let mut panel = online_panel();
    assert_eq!(hold(&mut panel, 1000, 3500), TickOutcome::Continue);
    assert!(panel.coordinator().portal().runs.is_empty());
}

#[test]
fn portal_hold_opens_on_demand_portal_with_prefill() {
    let mut panel = online_panel();
    let out = hold(&mut panel, 1000, 4200);

    assert_eq!(
        out,
        TickOutcome::Restart(RestartCause::PortalTimeout(PortalTrigger::Button))
    );
    let runs = &panel.coordinator().portal().runs;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].0, "Panel_OnDemand");
    assert_eq!(runs[0].1, stored());
}

#[test]
fn completed_portal_persists_new_values() {
    let portal = MockPortal {
        run_result: Ok(PanelConfig::new("10.0.0.9", "8883", "lab")),
        ..MockPortal::default()
    };
    let mut panel = panel_with(MockTransport::online(), portal, MockStore::with(stored()));

    let out = hold(&mut panel, 0, 5000);
    assert_eq!(
        out,
        TickOutcome::Restart(RestartCause::PortalCompleted(PortalTrigger::Button))
    );
    let expected = PanelConfig::new("10.0.0.9", "8883", "lab");
    assert_eq!(panel.config(), &expected);
    let store = panel.coordinator().store();
    assert_eq!(store.doc.as_ref(), Some(&expected));
    assert_eq!(store.saves, 1);
}

#[test]
fn factory_hold_erases_credentials_and_config() {
    let mut panel = online_panel();
    let out = hold(&mut panel, 0, 11_000);

    assert_eq!(out, TickOutcome::Restart(RestartCause::FactoryReset));
    let c = panel.coordinator();
    assert!(c.portal().erased);
    assert!(c.portal().runs.is_empty());
    assert_eq!(c.store().removes, 1);
    assert!(c.store().doc.is_none());
    assert!(!panel.board().indicator);
}

#[test]
fn indicator_blinks_while_held_and_clears_on_release() {
    let mut panel = online_panel();
    panel.board_mut().trigger = true;
    panel.tick(0);
    panel.tick(500);
    assert!(!panel.board().indicator);
    panel.tick(1500);
    assert!(panel.board().indicator);

    panel.board_mut().trigger = false;
    assert_eq!(panel.tick(1600), TickOutcome::Continue);
    assert_eq!(panel.board().indicator_writes.last(), Some(&false));
}

// ── Connectivity watchdog ─────────────────────────────────────

#[test]
fn watchdog_opens_recovery_portal_after_timeout() {
    let mut panel = panel_with(MockTransport::offline(), MockPortal::default(), MockStore::with(stored()));
    for s in 0..60 {
        assert_eq!(panel.tick(s * 1000), TickOutcome::Continue);
    }
    assert_eq!(
        panel.tick(60_000),
        TickOutcome::Restart(RestartCause::PortalTimeout(PortalTrigger::Watchdog))
    );
    let runs = &panel.coordinator().portal().runs;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].0, "Panel_Recovery");
}

#[test]
fn connected_panel_never_triggers_watchdog() {
    let mut panel = online_panel();
    for s in 0..=300 {
        assert_eq!(panel.tick(s * 1000), TickOutcome::Continue);
    }
}

#[test]
fn press_wins_over_watchdog_in_the_same_tick() {
    let mut panel = panel_with(MockTransport::offline(), MockPortal::default(), MockStore::with(stored()));
    for s in 0..57 {
        panel.tick(s * 1000);
    }
    // Released at 60 s after a 3 s hold: both trackers fire together.
    let out = hold(&mut panel, 57_000, 60_000);

    assert_eq!(
        out,
        TickOutcome::Restart(RestartCause::PortalTimeout(PortalTrigger::Button))
    );
    let runs = &panel.coordinator().portal().runs;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].0, "Panel_OnDemand");
}

// ── Broker connect supervisor ─────────────────────────────────

#[test]
fn five_connect_failures_open_the_portal() {
    let mut transport = MockTransport::link_only();
    transport.accept_connect = false;
    let mut panel = panel_with(transport, MockPortal::default(), MockStore::with(stored()));

    let mut t = 0;
    for _ in 0..4 {
        assert_eq!(panel.tick(t), TickOutcome::Continue);
        // Between attempts nothing is retried.
        assert_eq!(panel.tick(t + 1000), TickOutcome::Continue);
        t += 5000;
    }
    assert_eq!(
        panel.tick(t),
        TickOutcome::Restart(RestartCause::PortalTimeout(PortalTrigger::ConnectFailures))
    );

    let transport = panel.transport().unwrap();
    assert_eq!(transport.connect_calls.len(), 5);
    assert!(transport.connect_calls.iter().all(|id| id == "mqttpanel"));
    assert_eq!(panel.coordinator().portal().runs[0].0, "Panel_Recovery");
}

#[test]
fn successful_connect_subscribes_wildcard_and_channels() {
    let lamp = Cell::new(false);
    let mut panel = panel_with(MockTransport::link_only(), MockPortal::default(), MockStore::with(stored()));
    panel.register_switch("home/lamp/set", &lamp).unwrap();
    panel.transport_mut().unwrap().subscriptions.clear();

    assert_eq!(panel.tick(0), TickOutcome::Continue);

    let t = panel.transport().unwrap();
    assert_eq!(t.connect_calls.len(), 1);
    assert_eq!(t.subscriptions, ["home/#", "home/lamp/set"]);

    // Session is up: later ticks poll instead of reconnecting.
    panel.transport_mut().unwrap().deliver("home/lamp/set", b"1");
    panel.tick(100);
    assert!(lamp.get());
    assert_eq!(panel.transport().unwrap().connect_calls.len(), 1);
}

#[test]
fn no_wildcard_without_topic_prefix() {
    let mut panel = panel_with(MockTransport::link_only(), MockPortal::default(), MockStore::default());
    panel.tick(0);
    assert!(panel.transport().unwrap().subscriptions.is_empty());
}

// ── Boot sequence ─────────────────────────────────────────────

#[test]
fn boot_joins_stored_network() {
    let mut panel = online_panel();
    assert_eq!(panel.start(), TickOutcome::Continue);
    assert_eq!(panel.coordinator().portal().auto_calls, ["Panel_Setup"]);
    assert_eq!(panel.coordinator().store().saves, 0);
}

#[test]
fn boot_portal_values_are_persisted() {
    let portal = MockPortal {
        auto_result: Ok(Some(PanelConfig::new("192.168.1.5", "1883", "den"))),
        ..MockPortal::default()
    };
    let mut panel = panel_with(MockTransport::online(), portal, MockStore::default());
    assert_eq!(panel.start(), TickOutcome::Continue);
    assert_eq!(panel.config().server.as_str(), "192.168.1.5");
    assert_eq!(panel.coordinator().store().saves, 1);
}

#[test]
fn watchdog_clock_starts_after_boot_portal() {
    let portal = MockPortal {
        auto_result: Ok(Some(PanelConfig::new("192.168.1.5", "1883", "den"))),
        ..MockPortal::default()
    };
    let mut panel = panel_with(MockTransport::offline(), portal, MockStore::default());
    assert_eq!(panel.start(), TickOutcome::Continue);

    // The boot portal held the loop for 90 s; that is not link downtime.
    assert_eq!(panel.tick(90_000), TickOutcome::Continue);
    assert_eq!(panel.tick(149_000), TickOutcome::Continue);
    assert!(panel.coordinator().portal().runs.is_empty());

    assert_eq!(
        panel.tick(150_000),
        TickOutcome::Restart(RestartCause::PortalTimeout(PortalTrigger::Watchdog))
    );
    assert_eq!(panel.coordinator().portal().runs[0].0, "Panel_Recovery");
}

#[test]
fn boot_provisioning_failure_restarts() {
    let portal = MockPortal {
        auto_result: Err(PortalError::Timeout),
        ..MockPortal::default()
    };
    let mut panel = panel_with(MockTransport::online(), portal, MockStore::default());
    assert_eq!(
        panel.start(),
        TickOutcome::Restart(RestartCause::BootProvisioningFailed)
    );
}

#[test]
fn trigger_held_through_boot_rescue_factory_resets() {
    let mut panel = online_panel();
    panel.board_mut().trigger = true;

    assert_eq!(panel.start(), TickOutcome::Restart(RestartCause::FactoryReset));
    assert_eq!(panel.board().delays_ms.first(), Some(&2000));
    let c = panel.coordinator();
    assert!(c.portal().erased);
    assert!(c.portal().auto_calls.is_empty());
    assert_eq!(c.store().removes, 1);
}

#[test]
fn trigger_released_during_rescue_boots_normally() {
    let mut panel = online_panel();
    panel.board_mut().trigger = true;
    panel.board_mut().release_on_delay = true;

    assert_eq!(panel.start(), TickOutcome::Continue);
    assert!(!panel.coordinator().portal().erased);
    assert_eq!(panel.coordinator().portal().auto_calls.len(), 1);
}
