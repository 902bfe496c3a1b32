//! Fuzz target: arbitrary topic/payload pairs routed through a fully
//! populated channel table.
//!
//! Run: `cargo +nightly fuzz run fuzz_dispatch`
//!
//! Invariants:
//!   - Never panics.
//!   - Dimmer values stay within 0..=100.
//!   - Text slots only ever hold valid UTF-8 that fits their capacity.

#![no_main]

use core::cell::{Cell, RefCell};

use libfuzzer_sys::fuzz_target;
use mqttpanel::app::ports::{Inbox, PubSubPort};
use mqttpanel::channel::ChannelTable;
use mqttpanel::channel::dispatch::Dispatcher;
use mqttpanel::{Binding, PanelConfig};

struct NullTransport;

impl PubSubPort for NullTransport {
    fn link_up(&self) -> bool {
        true
    }
    fn connected(&self) -> bool {
        true
    }
    fn connect(&mut self, _: &PanelConfig, _: &str) -> bool {
        true
    }
    fn subscribe(&mut self, _: &str) -> bool {
        true
    }
    fn publish(&mut self, _: &str, _: &[u8]) -> bool {
        true
    }
    fn poll(&mut self, _: &mut Inbox) {}
}

const TOPICS: [&str; 6] = ["f/sw/set", "f/dim/set", "f/sel/set", "f/num", "f/txt/set", "f/sync"];

fuzz_target!(|data: &[u8]| {
    let Some((&selector, rest)) = data.split_first() else {
        return;
    };

    let switch = Cell::new(false);
    let dimmer = Cell::new(50);
    let select = Cell::new(0);
    let number = Cell::new(0.0f32);
    let text = RefCell::new(heapless::String::<16>::new());

    let mut transport = NullTransport;
    let mut table = ChannelTable::new();
    let bindings = [
        Binding::Switch(&switch),
        Binding::Dimmer(&dimmer),
        Binding::Select(&select),
        Binding::Number(&number),
        Binding::Text(&text),
        Binding::Sync,
    ];
    for (topic, binding) in TOPICS.iter().zip(bindings) {
        let _ = table.register(Some(&mut transport), topic, binding);
    }

    // Either a known topic (to reach the codecs) or a fuzzed one.
    let (topic, payload) = match TOPICS.get(usize::from(selector) % 8) {
        Some(t) => ((*t).to_string(), rest),
        None => {
            let split = rest.len() / 2;
            (String::from_utf8_lossy(&rest[..split]).into_owned(), &rest[split..])
        }
    };

    let dispatcher = Dispatcher::default();
    let _ = dispatcher.route(&table, &topic, payload);

    assert!((0..=100).contains(&dimmer.get()));
    assert!(text.borrow().len() <= 16);
});
