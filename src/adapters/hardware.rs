//! Hardware adapter: trigger button, indicator LED and delays.
//!
//! Implements [`Board`] over any `embedded-hal` 1.0 pins, so the same type
//! drives ESP-IDF `PinDriver`s on target and mock pins on the host.  This is
//! the only place trigger polarity is applied.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use log::warn;

use crate::app::ports::Board;

pub struct PinBoard<I, O, D> {
    trigger: I,
    indicator: O,
    delay: D,
    active_low: bool,
    read_error_logged: bool,
}

impl<I, O, D> PinBoard<I, O, D>
where
    I: InputPin,
    O: OutputPin,
    D: DelayNs,
{
    /// `active_low`: the trigger reads low while pressed (pull-up wiring).
    pub fn new(trigger: I, indicator: O, delay: D, active_low: bool) -> Self {
        Self {
            trigger,
            indicator,
            delay,
            active_low,
            read_error_logged: false,
        }
    }

    pub fn into_parts(self) -> (I, O, D) {
        (self.trigger, self.indicator, self.delay)
    }
}

impl<I, O, D> Board for PinBoard<I, O, D>
where
    I: InputPin,
    O: OutputPin,
    D: DelayNs,
{
    fn trigger_asserted(&mut self) -> bool {
        let level = if self.active_low {
            self.trigger.is_low()
        } else {
            self.trigger.is_high()
        };
        match level {
            Ok(pressed) => pressed,
            Err(_) => {
                // Once only: this is sampled every tick.
                if !self.read_error_logged {
                    warn!("PANEL | trigger pin read failed");
                    self.read_error_logged = true;
                }
                false
            }
        }
    }

    fn set_indicator(&mut self, on: bool) {
        let res = if on {
            self.indicator.set_high()
        } else {
            self.indicator.set_low()
        };
        if res.is_err() {
            warn!("PANEL | indicator pin write failed");
        }
    }
}

impl<I, O, D: DelayNs> DelayNs for PinBoard<I, O, D> {
    fn delay_ns(&mut self, ns: u32) {
        self.delay.delay_ns(ns);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}
