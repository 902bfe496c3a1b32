//! Channel binding, dispatch and broadcast through the `Panel` API.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use mqttpanel::app::ports::PubSubPort;
use mqttpanel::channel::dispatch::DispatchOutcome;
use mqttpanel::channel::MAX_CHANNELS;
use mqttpanel::error::{CodecError, RegistrationError};
use mqttpanel::{Panel, PanelConfig, PanelSettings, TickOutcome, ValueType};

use crate::mock_hw::{MockBoard, MockPortal, MockStore, MockTransport, online_panel, panel_with};

#[test]
fn registration_fills_table_up_to_capacity() {
    let mut panel = online_panel();
    for i in 0..MAX_CHANNELS {
        panel.register_sync(&format!("home/s{i}")).unwrap();
        assert_eq!(panel.channels().len(), i + 1);
    }
    assert_eq!(
        panel.register_sync("home/overflow"),
        Err(RegistrationError::CapacityExceeded)
    );
    assert_eq!(panel.channels().len(), MAX_CHANNELS);
}

#[test]
fn registration_without_transport_fails_cleanly() {
    let lamp = Cell::new(false);
    let mut panel = online_panel();
    let _ = panel.detach_transport();
    assert_eq!(
        panel.register_switch("home/lamp/set", &lamp),
        Err(RegistrationError::TransportUnavailable)
    );
    assert!(panel.channels().is_empty());
}

#[test]
fn registration_subscribes_control_topics() {
    let lamp = Cell::new(false);
    let temp = Cell::new(20.0f32);
    let mut panel = online_panel();
    panel.register_switch("home/lamp/set", &lamp).unwrap();
    panel.register_number("home/temp", &temp).unwrap();

    let t = panel.transport().unwrap();
    assert_eq!(t.subscriptions, vec!["home/lamp/set".to_string()]);

    let kinds: Vec<ValueType> = panel.channels().iter().map(|c| c.value_type()).collect();
    assert_eq!(kinds, [ValueType::Switch, ValueType::Number]);
}

#[test]
fn inbound_messages_update_bound_variables() {
    let lamp = Cell::new(false);
    let level = Cell::new(0);
    let scene = Cell::new(0);
    let label = RefCell::new(heapless::String::<16>::new());

    let mut panel = online_panel();
    panel.register_switch("home/lamp/set", &lamp).unwrap();
    panel.register_dimmer("home/dim/set", &level).unwrap();
    panel.register_select("home/scene/set", &scene).unwrap();
    panel.register_text("home/label/set", &label).unwrap();

    let t = panel.transport_mut().unwrap();
    t.deliver("home/lamp/set", b"1");
    t.deliver("home/dim/set", b"150");
    t.deliver("home/scene/set", b"7");
    t.deliver("home/label/set", b"kitchen");

    assert_eq!(panel.tick(10), TickOutcome::Continue);
    assert!(lamp.get());
    assert_eq!(level.get(), 100);
    assert_eq!(scene.get(), 7);
    assert_eq!(label.borrow().as_str(), "kitchen");
}

#[test]
fn invalid_payloads_keep_prior_values() {
    let lamp = Cell::new(true);
    let level = Cell::new(40);
    let mut panel = online_panel();
    let h = panel.register_switch("home/lamp/set", &lamp).unwrap();
    panel.register_dimmer("home/dim/set", &level).unwrap();

    assert_eq!(
        panel.handle_message("home/lamp/set", b"banana"),
        DispatchOutcome::Ignored(h, CodecError::DecodeIgnored)
    );
    assert!(lamp.get());

    assert_eq!(panel.handle_message("home/nothing/set", b"1"), DispatchOutcome::NoMatch);
    assert!(lamp.get());
    assert_eq!(level.get(), 40);

    panel.handle_message("home/dim/set", b"-5");
    assert_eq!(level.get(), 0);
}

#[test]
fn host_changes_are_published_on_sync() {
    let lamp = Cell::new(false);
    let level = Cell::new(10);
    let temp = Cell::new(21.456f32);
    let mut panel = online_panel();
    panel.register_switch("home/lamp/set", &lamp).unwrap();
    panel.register_dimmer("home/dim/set", &level).unwrap();
    panel.register_number("home/temp", &temp).unwrap();
    panel.register_sync("home/sync").unwrap();

    // Host writes between ticks.
    lamp.set(true);
    level.set(64);

    panel.transport_mut().unwrap().deliver("home/sync", b"1");
    panel.tick(10);

    let t = panel.transport().unwrap();
    assert_eq!(t.published_topics(), ["home/lamp/val", "home/dim/val", "home/temp_val"]);
    let payloads: Vec<&[u8]> = t.published.iter().map(|(_, p)| p.as_slice()).collect();
    assert_eq!(payloads, [b"1".as_slice(), b"64", b"21.46"]);
    assert_eq!(panel.board().delays_ms, [10, 10, 10]);
}

#[test]
fn sync_with_other_payload_does_nothing() {
    let lamp = Cell::new(false);
    let mut panel = online_panel();
    panel.register_switch("home/lamp/set", &lamp).unwrap();
    panel.register_sync("home/sync").unwrap();

    panel.handle_message("home/sync", b"0");
    assert!(panel.transport().unwrap().published.is_empty());
}

#[test]
fn broadcast_all_is_deterministic() {
    let a = Cell::new(3);
    let b = Cell::new(true);
    let mut panel = online_panel();
    panel.register_select("x/a/set", &a).unwrap();
    panel.register_switch("x/b/set", &b).unwrap();

    assert_eq!(panel.broadcast_all(), 2);
    let first = panel.transport().unwrap().published.clone();
    panel.transport_mut().unwrap().published.clear();
    assert_eq!(panel.broadcast_all(), 2);
    assert_eq!(panel.transport().unwrap().published, first);
}

#[test]
fn publish_helpers_require_a_session() {
    let mut panel = panel_with(
        MockTransport::link_only(),
        MockPortal::default(),
        MockStore::default(),
    );
    assert!(!panel.publish_switch("x/state", true));
    assert!(panel.transport().unwrap().published.is_empty());

    panel.transport_mut().unwrap().session = true;
    assert!(panel.publish_switch("x/state", true));
    assert!(panel.publish_dimmer("x/dim", 55));
    assert!(panel.publish_select("x/sel", -2));
    assert!(panel.publish_number("x/num", 3.14159));
    assert!(panel.publish_text("x/txt", "hello"));
    assert!(panel.publish("x/raw", &[0xde, 0xad]));

    let t = panel.transport().unwrap();
    let payloads: Vec<&[u8]> = t.published.iter().map(|(_, p)| p.as_slice()).collect();
    assert_eq!(
        payloads,
        [b"1".as_slice(), b"55", b"-2", b"3.14", b"hello", &[0xde_u8, 0xad][..]]
    );
}

#[test]
fn message_callback_sees_every_inbound_message() {
    let lamp = Cell::new(false);
    let seen: Rc<RefCell<Vec<String>>> = Rc::default();
    let sink = Rc::clone(&seen);

    let mut panel = Panel::init(
        MockTransport::online(),
        MockPortal::default(),
        MockStore::default(),
        MockBoard::default(),
        PanelSettings::default(),
        Some(Box::new(move |topic: &str, _payload: &[u8]| {
            sink.borrow_mut().push(topic.to_string());
        })),
        0,
    )
    .unwrap();
    panel.register_switch("home/lamp/set", &lamp).unwrap();

    let t = panel.transport_mut().unwrap();
    t.deliver("home/lamp/set", b"1");
    t.deliver("home/other", b"x");
    panel.tick(10);

    assert!(lamp.get());
    assert_eq!(*seen.borrow(), ["home/lamp/set", "home/other"]);
}

#[test]
fn is_connected_reports_link_state() {
    let mut panel = online_panel();
    assert!(panel.is_connected());
    panel.transport_mut().unwrap().link = false;
    assert!(!panel.is_connected());
    assert!(!panel.transport().unwrap().connected());
}

#[test]
fn stored_config_is_loaded_at_init() {
    let panel = online_panel();
    assert_eq!(panel.config(), &PanelConfig::new("broker.local", "1883", "home"));

    let fresh = panel_with(MockTransport::online(), MockPortal::default(), MockStore::default());
    assert_eq!(fresh.config(), &PanelConfig::default());
}

#[test]
fn invalid_settings_are_rejected() {
    let settings = PanelSettings {
        factory_hold_secs: 1,
        ..PanelSettings::default()
    };
    let result = Panel::init(
        MockTransport::online(),
        MockPortal::default(),
        MockStore::default(),
        MockBoard::default(),
        settings,
        None,
        0,
    );
    assert!(result.is_err());
}
