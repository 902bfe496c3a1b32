//! MQTT panel firmware: main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  EspTransport    SoftApPortal    NvsConfigStore    PinBoard    │
//! │  (PubSubPort)    (PortalPort)    (ConfigPort)      (Board)     │
//! │        └──────── SharedWifi ────────┘                          │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │                 Panel (pure logic)                     │    │
//! │  │  ChannelTable · Dispatcher · PressTracker · Watchdog   │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use core::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use esp_idf_hal::delay::{Delay, FreeRtos};
use esp_idf_hal::gpio::{PinDriver, Pull};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};
use log::{error, info, warn};

use mqttpanel::adapters::device_id;
use mqttpanel::adapters::hardware::PinBoard;
use mqttpanel::adapters::mqtt::EspTransport;
use mqttpanel::adapters::nvs::NvsConfigStore;
use mqttpanel::adapters::portal::SoftApPortal;
use mqttpanel::adapters::time::MonotonicClock;
use mqttpanel::adapters::SharedWifi;
use mqttpanel::{Panel, PanelSettings, RestartCause, TickOutcome};

/// Portal sessions close after this long without a submission.
const PORTAL_TIMEOUT: Duration = Duration::from_secs(180);
const LOOP_PERIOD_MS: u32 = 10;

fn restart(cause: RestartCause) -> ! {
    warn!("PANEL | restarting: {:?}", cause);
    FreeRtos::delay_ms(100);
    // SAFETY: plain ESP-IDF reset, does not return.
    unsafe { esp_idf_svc::sys::esp_restart() }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  MqttPanel v{}                    ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let clock = MonotonicClock::new();
    let mac = device_id::read_mac();
    let settings = PanelSettings {
        client_id: device_id::client_id(&mac),
        ..PanelSettings::default()
    };

    // ── 2. Storage and radio ──────────────────────────────────
    let store = NvsConfigStore::new().map_err(|e| anyhow!("NVS init failed: {e}"))?;
    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let wifi = BlockingWifi::wrap(
        EspWifi::new(peripherals.modem, sys_loop.clone(), Some(nvs_partition))?,
        sys_loop,
    )?;
    let wifi: SharedWifi = Rc::new(RefCell::new(wifi));

    // ── 3. Trigger (BOOT button) and indicator LED ────────────
    let mut trigger = PinDriver::input(peripherals.pins.gpio0)?;
    trigger.set_pull(Pull::Up)?;
    let indicator = PinDriver::output(peripherals.pins.gpio2)?;
    let board = PinBoard::new(
        trigger,
        indicator,
        Delay::new_default(),
        settings.trigger_active_low,
    );

    // ── 4. Panel variables (outlive the panel) ────────────────
    let lamp = Cell::new(false);
    let brightness = Cell::new(0);
    let scene = Cell::new(0);
    let uptime_h = Cell::new(0.0f32);
    let label = RefCell::new(heapless::String::<32>::new());

    let mut panel = Panel::init(
        EspTransport::new(Rc::clone(&wifi)),
        SoftApPortal::new(Rc::clone(&wifi), PORTAL_TIMEOUT),
        store,
        board,
        settings,
        Some(Box::new(|topic: &str, payload: &[u8]| {
            info!("PANEL | rx {} ({} bytes)", topic, payload.len());
        })),
        clock.now_ms(),
    )
    .map_err(|e| anyhow!("panel settings rejected: {e}"))?;

    if let TickOutcome::Restart(cause) = panel.start() {
        restart(cause);
    }

    // ── 5. Channels under the configured topic prefix ─────────
    let prefix = panel.config().topic.clone();
    let topic = |leaf: &str| format!("{prefix}/{leaf}");
    let registrations = [
        panel.register_switch(&topic("lamp/set"), &lamp),
        panel.register_dimmer(&topic("brightness/set"), &brightness),
        panel.register_select(&topic("scene/set"), &scene),
        panel.register_number(&topic("uptime"), &uptime_h),
        panel.register_text(&topic("label/set"), &label),
        panel.register_sync(&topic("sync")),
    ];
    for r in registrations {
        if let Err(e) = r {
            error!("PANEL | channel registration failed: {}", e);
        }
    }

    // ── 6. Control loop ───────────────────────────────────────
    loop {
        let now = clock.now_ms();
        uptime_h.set(now as f32 / 3_600_000.0);

        if let TickOutcome::Restart(cause) = panel.tick(now) {
            restart(cause);
        }
        FreeRtos::delay_ms(LOOP_PERIOD_MS);
    }
}
