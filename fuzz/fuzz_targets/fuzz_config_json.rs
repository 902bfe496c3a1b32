//! Fuzz target: stored config documents.
//!
//! Run: `cargo +nightly fuzz run fuzz_config_json`
//!
//! Invariants:
//!   - `from_json` never panics on arbitrary bytes.
//!   - Anything it accepts serialises again and reloads unchanged.

#![no_main]

use libfuzzer_sys::fuzz_target;
use mqttpanel::PanelConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(config) = PanelConfig::from_json(data) else {
        return;
    };
    let _ = config.port_number();
    let _ = config.broker_url();

    let bytes = config.to_json().expect("loaded config must serialise");
    let again = PanelConfig::from_json(&bytes).expect("serialised config must load");
    assert_eq!(config, again);
});
