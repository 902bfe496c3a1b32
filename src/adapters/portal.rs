//! Soft-AP configuration portal.
//!
//! ```text
//!   phone ──WiFi──► AP "<ap_name>" ──HTTP──► GET  /       form (prefilled)
//!                                            POST /save   JSON submission
//! ```
//!
//! The form collects the station credentials and the three broker fields.
//! On submission the station credentials are applied to the WiFi driver
//! (which persists them in its own NVS area) and the broker fields are
//! returned to the coordinator.  The page and the submission parser are
//! plain functions so they are testable on the host; the server itself
//! only exists on `target_os = "espidf"`.

use core::fmt::Write;

use serde::Deserialize;

use crate::config::PanelConfig;

/// Largest accepted submission body.
pub const MAX_SUBMISSION_LEN: usize = 512;

/// Values posted by the portal page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Submission {
    #[serde(default)]
    pub wifi_ssid: String,
    #[serde(default)]
    pub wifi_pass: String,
    #[serde(default)]
    pub mqtt_server: String,
    #[serde(default)]
    pub mqtt_port: String,
    #[serde(default)]
    pub mqtt_topic: String,
}

impl Submission {
    /// Parse a JSON body.  `None` when malformed, oversized or lacking an SSID.
    pub fn parse(body: &[u8]) -> Option<Self> {
        if body.len() > MAX_SUBMISSION_LEN {
            return None;
        }
        let s: Self = serde_json::from_slice(body).ok()?;
        let ssid_ok = !s.wifi_ssid.trim().is_empty() && s.wifi_ssid.len() <= 32;
        (ssid_ok && s.wifi_pass.len() <= 64).then_some(s)
    }

    pub fn panel_config(&self) -> PanelConfig {
        PanelConfig::new(
            self.mqtt_server.trim(),
            self.mqtt_port.trim(),
            self.mqtt_topic.trim(),
        )
    }
}

fn push_escaped(out: &mut String, value: &str) {
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
}

/// Portal page with the broker fields prefilled from `prefill`.
pub fn render_form(ap_name: &str, prefill: &PanelConfig) -> String {
    let mut page = String::with_capacity(2048);
    page.push_str("<!DOCTYPE html><html><head><meta charset=\"utf-8\">");
    page.push_str("<meta name=\"viewport\" content=\"width=device-width\"><title>");
    push_escaped(&mut page, ap_name);
    page.push_str("</title></head><body><h2>");
    push_escaped(&mut page, ap_name);
    page.push_str("</h2><form id=\"f\">");

    let fields: [(&str, &str, &str); 5] = [
        ("wifi_ssid", "WiFi network", ""),
        ("wifi_pass", "WiFi password", ""),
        ("mqtt_server", "MQTT server", prefill.server.as_str()),
        ("mqtt_port", "MQTT port", prefill.port.as_str()),
        ("mqtt_topic", "MQTT topic", prefill.topic.as_str()),
    ];
    for (name, label, value) in fields {
        let kind = if name == "wifi_pass" { "password" } else { "text" };
        let _ = write!(
            page,
            "<label>{label}<br><input name=\"{name}\" type=\"{kind}\" value=\""
        );
        push_escaped(&mut page, value);
        page.push_str("\"></label><br>");
    }

    page.push_str(
        "<button>Save</button></form><script>\
         document.getElementById('f').onsubmit=function(e){e.preventDefault();\
         var d={};new FormData(e.target).forEach(function(v,k){d[k]=v;});\
         fetch('/save',{method:'POST',body:JSON.stringify(d)})\
         .then(function(){document.body.innerHTML='<h2>Saved, restarting</h2>';});};\
         </script></body></html>",
    );
    page
}

#[cfg(target_os = "espidf")]
pub use esp::SoftApPortal;

#[cfg(target_os = "espidf")]
mod esp {
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};

    use esp_idf_svc::http::Method;
    use esp_idf_svc::http::server::{Configuration as HttpConfiguration, EspHttpServer};
    use esp_idf_svc::io::{Read, Write};
    use esp_idf_svc::wifi::{
        AccessPointConfiguration, AuthMethod, BlockingWifi, ClientConfiguration, Configuration,
        EspWifi,
    };
    use log::{info, warn};

    use super::{MAX_SUBMISSION_LEN, Submission, render_form};
    use crate::adapters::SharedWifi;
    use crate::app::ports::PortalPort;
    use crate::config::PanelConfig;
    use crate::error::PortalError;

    const POLL_MS: u64 = 200;
    const STATION_CONNECT_ATTEMPTS: u32 = 3;

    pub struct SoftApPortal {
        wifi: SharedWifi,
        timeout: Duration,
    }

    impl SoftApPortal {
        pub fn new(wifi: SharedWifi, timeout: Duration) -> Self {
            Self { wifi, timeout }
        }

        /// Join the network stored in the WiFi driver, if any.
        fn join_stored_network(&mut self) -> bool {
            let Ok(mut wifi) = self.wifi.try_borrow_mut() else {
                return false;
            };
            let has_ssid = matches!(
                wifi.get_configuration(),
                Ok(Configuration::Client(ref c)) if !c.ssid.is_empty()
            );
            if !has_ssid {
                info!("PORTAL | no stored network");
                return false;
            }
            if join_station(&mut wifi) {
                return true;
            }
            warn!("PORTAL | stored network unreachable");
            false
        }

        fn start_access_point(&mut self, ap_name: &str) -> Result<(), PortalError> {
            let mut wifi = self
                .wifi
                .try_borrow_mut()
                .map_err(|_| PortalError::StartFailed)?;
            let _ = wifi.stop();
            let ssid = ap_name.try_into().map_err(|_| PortalError::StartFailed)?;
            wifi.set_configuration(&Configuration::AccessPoint(AccessPointConfiguration {
                ssid,
                auth_method: AuthMethod::None,
                channel: 1,
                ..Default::default()
            }))
            .map_err(|_| PortalError::StartFailed)?;
            wifi.start().map_err(|_| PortalError::StartFailed)?;
            wifi.wait_netif_up().map_err(|_| PortalError::StartFailed)?;
            info!("PORTAL | access point '{}' up", ap_name);
            Ok(())
        }

        fn apply_station(&mut self, submission: &Submission) -> Result<(), PortalError> {
            let mut wifi = self
                .wifi
                .try_borrow_mut()
                .map_err(|_| PortalError::StartFailed)?;
            let ssid = submission
                .wifi_ssid
                .as_str()
                .try_into()
                .map_err(|_| PortalError::StartFailed)?;
            let password = submission
                .wifi_pass
                .as_str()
                .try_into()
                .map_err(|_| PortalError::StartFailed)?;
            let auth_method = if submission.wifi_pass.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPAWPA2Personal
            };
            let _ = wifi.stop();
            wifi.set_configuration(&Configuration::Client(ClientConfiguration {
                ssid,
                password,
                auth_method,
                ..Default::default()
            }))
            .map_err(|_| PortalError::StartFailed)?;
            Ok(())
        }

        /// Join the network just stored by [`Self::apply_station`].
        fn join_submitted_network(&mut self) -> bool {
            match self.wifi.try_borrow_mut() {
                Ok(mut wifi) => join_station(&mut wifi),
                Err(_) => false,
            }
        }
    }

    /// Start the station and join the configured network.  `true` once the
    /// interface has an address.
    fn join_station(wifi: &mut BlockingWifi<EspWifi<'static>>) -> bool {
        if wifi.start().is_err() {
            return false;
        }
        for attempt in 1..=STATION_CONNECT_ATTEMPTS {
            if wifi.connect().is_ok() && wifi.wait_netif_up().is_ok() {
                info!("PORTAL | joined network (attempt {})", attempt);
                return true;
            }
            let _ = wifi.disconnect();
        }
        false
    }

    impl PortalPort for SoftApPortal {
        fn auto_connect(
            &mut self,
            ap_name: &str,
            prefill: &PanelConfig,
        ) -> Result<Option<PanelConfig>, PortalError> {
            if self.join_stored_network() {
                return Ok(None);
            }
            let updated = self.run(ap_name, prefill)?;
            if !self.join_submitted_network() {
                warn!("PORTAL | submitted network unreachable");
                return Err(PortalError::StartFailed);
            }
            Ok(Some(updated))
        }

        fn run(&mut self, ap_name: &str, prefill: &PanelConfig) -> Result<PanelConfig, PortalError> {
            self.start_access_point(ap_name)?;

            let submitted: Arc<Mutex<Option<Submission>>> = Arc::new(Mutex::new(None));
            let page = render_form(ap_name, prefill);

            let conf = HttpConfiguration {
                stack_size: 10 * 1024,
                ..Default::default()
            };
            let mut server = EspHttpServer::new(&conf).map_err(|_| PortalError::StartFailed)?;

            server
                .fn_handler::<anyhow::Error, _>("/", Method::Get, move |req| {
                    req.into_response(200, Some("OK"), &[("Content-Type", "text/html; charset=utf-8")])?
                        .write_all(page.as_bytes())?;
                    Ok(())
                })
                .map_err(|_| PortalError::StartFailed)?;

            let slot = Arc::clone(&submitted);
            server
                .fn_handler::<anyhow::Error, _>("/save", Method::Post, move |mut req| {
                    let len = req.content_len().unwrap_or(0) as usize;
                    if len > MAX_SUBMISSION_LEN {
                        req.into_status_response(413)?;
                        return Ok(());
                    }
                    let mut body = vec![0u8; len];
                    req.read_exact(&mut body)?;
                    match Submission::parse(&body) {
                        Some(s) => {
                            if let Ok(mut guard) = slot.lock() {
                                *guard = Some(s);
                            }
                            req.into_ok_response()?.write_all(b"saved")?;
                        }
                        None => {
                            req.into_status_response(400)?.write_all(b"invalid")?;
                        }
                    }
                    Ok(())
                })
                .map_err(|_| PortalError::StartFailed)?;

            let deadline = Instant::now() + self.timeout;
            let submission = loop {
                if let Some(s) = submitted.lock().ok().and_then(|mut g| g.take()) {
                    break s;
                }
                if Instant::now() >= deadline {
                    drop(server);
                    return Err(PortalError::Timeout);
                }
                thread::sleep(Duration::from_millis(POLL_MS));
            };
            // Let the browser receive the response before the AP goes away.
            thread::sleep(Duration::from_millis(500));
            drop(server);

            self.apply_station(&submission)?;
            info!("PORTAL | submission for network '{}'", submission.wifi_ssid);
            Ok(submission.panel_config())
        }

        fn erase_credentials(&mut self) {
            // SAFETY: resets the WiFi driver's persisted config; no other
            // WiFi call is in flight on the single main task.
            let ret = unsafe { esp_idf_svc::sys::esp_wifi_restore() };
            if ret != esp_idf_svc::sys::ESP_OK {
                warn!("PORTAL | esp_wifi_restore failed ({})", ret);
            }
        }
    }
}
