//! Memory-mapped I/O page with LEDs, buttons, and a transmit-only UART.
//!
//! Register offsets are relative to the base address the page is mapped at:
//!
//! | Offset | Register    | Access                                             |
//! |--------|-------------|----------------------------------------------------|
//! | `0x0`  | LEDs        | R/W, low 4 bits                                    |
//! | `0x4`  | Buttons     | Read only, driven by the host                      |
//! | `0x8`  | UART status | Read only, always `1` (ready to transmit)          |
//! | `0xC`  | UART data   | Write only, the low byte is transmitted            |

use crate::bus::{BusRequest, BusResponse, Memory};
use log::debug;

pub const LEDS: u32 = 0x0;
pub const BUTTONS: u32 = 0x4;
pub const UART_STATUS: u32 = 0x8;
pub const UART_DATA: u32 = 0xC;

const LED_MASK: u32 = 0b1111;

/// The I/O page. Every access completes without wait states; unmapped offsets read `0` and ignore
/// writes.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Io {
    leds: u32,
    buttons: u32,
    uart_output: Vec<u8>,
    read_data: u32,
}

impl Io {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leds(&self) -> u32 {
        self.leds
    }

    pub fn set_buttons(&mut self, buttons: u32) {
        self.buttons = buttons;
    }

    /// Returns every byte written to the UART data register so far.
    pub fn uart_output(&self) -> &[u8] {
        &self.uart_output
    }

    fn read(&self, offset: u32) -> u32 {
        match offset {
            LEDS => self.leds,
            BUTTONS => self.buttons,
            UART_STATUS => 1,
            _ => 0,
        }
    }

    fn write(&mut self, offset: u32, data: u32, mask: u8) {
        // Both registers only use their lowest byte lane.
        if mask & 0b1 == 0 {
            return;
        }
        match offset {
            LEDS => self.leds = data & LED_MASK,
            UART_DATA => {
                let byte = data as u8;
                debug!("uart: {:?}", byte as char);
                self.uart_output.push(byte);
            }
            _ => {}
        }
    }
}

impl Memory for Io {
    fn cycle(&mut self, request: &BusRequest) -> BusResponse {
        let offset = request.address & !0b11;
        if request.read {
            self.read_data = self.read(offset);
        } else if request.write {
            self.write(offset, request.write_data, request.write_mask);
        }
        BusResponse {
            read_data: self.read_data,
            read_busy: false,
            write_busy: false,
        }
    }

    /// Clears the LEDs and the read latch. The button state and UART output belong to the host and
    /// are kept.
    fn reset(&mut self) {
        self.leds = 0;
        self.read_data = 0;
    }
}
