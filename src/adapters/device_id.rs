//! Device identity derived from the ESP32 factory MAC address.
//!
//! The broker client id is `panel-xxyyzz` (last 3 bytes of the 6-byte MAC in
//! lowercase hex): stable across reboots and unique per board, so two panels
//! on the same broker never kick each other off.

use core::fmt::Write;

use crate::config::ClientId;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// Broker client id from the last 3 MAC bytes, e.g. `panel-efcafe`.
pub fn client_id(mac: &MacAddress) -> ClientId {
    let mut id = ClientId::new();
    let _ = write!(id, "panel-{:02x}{:02x}{:02x}", mac[3], mac[4], mac[5]);
    id
}
