//! Adapters: concrete implementations of the port traits.
//!
//! | Adapter     | Implements   | Connects to                         |
//! |-------------|--------------|-------------------------------------|
//! | `hardware`  | Board        | embedded-hal trigger / indicator    |
//! | `mqtt`      | PubSubPort   | ESP-IDF WiFi STA + esp-mqtt client  |
//! | `nvs`       | ConfigPort   | NVS / in-memory store               |
//! | `portal`    | PortalPort   | Soft-AP + HTTP form                 |
//! | `time`      | —            | ESP32 system timer                  |
//! | `device_id` | —            | eFuse MAC                           |
//!
//! `mqtt` and the portal server exist only on `target_os = "espidf"`; the
//! rest compile everywhere with simulation backends.

pub mod device_id;
pub mod hardware;
#[cfg(target_os = "espidf")]
pub mod mqtt;
pub mod nvs;
pub mod portal;
pub mod time;

/// WiFi driver shared by the transport (station link state) and the portal
/// (access point, stored credentials).  Both live on the main task.
#[cfg(target_os = "espidf")]
pub type SharedWifi = std::rc::Rc<
    core::cell::RefCell<esp_idf_svc::wifi::BlockingWifi<esp_idf_svc::wifi::EspWifi<'static>>>,
>;
