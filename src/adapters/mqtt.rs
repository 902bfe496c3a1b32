//! MQTT transport over ESP-IDF WiFi.
//!
//! Implements [`PubSubPort`].  The `esp-mqtt` client delivers events on its
//! own task; the callback only records session state and copies received
//! messages into a bounded queue.  [`PubSubPort::poll`] moves them into the
//! panel inbox on the main task, so dispatch never runs inside the callback.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use esp_idf_svc::mqtt::client::{
    EspMqttClient, EventPayload, MqttClientConfiguration, QoS,
};
use log::{info, warn};

use super::SharedWifi;
use crate::app::ports::{self, INBOX_DEPTH, Inbox, PubSubPort};
use crate::config::PanelConfig;

/// How long `connect` waits for the broker's CONNACK.
const CONNECT_TIMEOUT_MS: u64 = 3000;
const CONNECT_POLL_MS: u64 = 50;
/// Messages held between polls before new ones are dropped.
const QUEUE_LIMIT: usize = INBOX_DEPTH * 2;

#[derive(Default)]
struct Session {
    connected: bool,
    queue: VecDeque<(String, Vec<u8>)>,
}

pub struct EspTransport {
    wifi: SharedWifi,
    client: Option<EspMqttClient<'static>>,
    session: Arc<Mutex<Session>>,
}

impl EspTransport {
    pub fn new(wifi: SharedWifi) -> Self {
        Self {
            wifi,
            client: None,
            session: Arc::new(Mutex::new(Session::default())),
        }
    }

    fn session_connected(&self) -> bool {
        self.session.lock().map(|s| s.connected).unwrap_or(false)
    }
}

impl PubSubPort for EspTransport {
    fn link_up(&self) -> bool {
        self.wifi
            .try_borrow()
            .ok()
            .and_then(|w| w.is_connected().ok())
            .unwrap_or(false)
    }

    fn connected(&self) -> bool {
        self.client.is_some() && self.session_connected()
    }

    fn connect(&mut self, broker: &PanelConfig, client_id: &str) -> bool {
        // Tear down a stale client first; its task owns the old socket.
        self.client = None;
        if let Ok(mut s) = self.session.lock() {
            s.connected = false;
            s.queue.clear();
        }

        let Some(url) = broker.broker_url() else {
            warn!("LINK | no usable broker address configured");
            return false;
        };

        let conf = MqttClientConfiguration {
            client_id: Some(client_id),
            ..Default::default()
        };

        let session = Arc::clone(&self.session);
        let client = EspMqttClient::new_cb(&url, &conf, move |event| {
            let Ok(mut s) = session.lock() else {
                return;
            };
            match event.payload() {
                EventPayload::Connected(_) => s.connected = true,
                EventPayload::Disconnected => s.connected = false,
                EventPayload::Received {
                    topic: Some(topic),
                    data,
                    ..
                } => {
                    if s.queue.len() < QUEUE_LIMIT {
                        s.queue.push_back((topic.to_string(), data.to_vec()));
                    } else {
                        warn!("LINK | receive queue full, dropped message on '{}'", topic);
                    }
                }
                _ => {}
            }
        });

        let client = match client {
            Ok(c) => c,
            Err(e) => {
                warn!("LINK | MQTT client creation failed: {}", e);
                return false;
            }
        };
        self.client = Some(client);

        let mut waited = 0;
        while waited < CONNECT_TIMEOUT_MS {
            if self.session_connected() {
                info!("LINK | session up at {}", url);
                return true;
            }
            thread::sleep(Duration::from_millis(CONNECT_POLL_MS));
            waited += CONNECT_POLL_MS;
        }

        self.client = None;
        false
    }

    fn subscribe(&mut self, topic: &str) -> bool {
        match self.client.as_mut() {
            Some(c) => c.subscribe(topic, QoS::AtMostOnce).is_ok(),
            None => false,
        }
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> bool {
        match self.client.as_mut() {
            Some(c) => c.publish(topic, QoS::AtMostOnce, false, payload).is_ok(),
            None => false,
        }
    }

    fn poll(&mut self, inbox: &mut Inbox) {
        let Ok(mut s) = self.session.lock() else {
            return;
        };
        while !inbox.is_full() {
            let Some((topic, data)) = s.queue.pop_front() else {
                break;
            };
            ports::enqueue(inbox, &topic, &data);
        }
    }
}
