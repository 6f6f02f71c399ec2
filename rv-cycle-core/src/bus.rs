//! The strobe/busy memory interface between the core and the devices it talks to.

use std::fmt::Debug;

/// The signals driven by the core on the memory bus during one tick.
///
/// At most one of `read` and `write` is set. Addresses are byte addresses; devices are organized
/// in 32-bit words and select the word at `address & !0b11`, while `write_mask` selects which of
/// its 4 byte lanes (bit 0 being the least significant byte) a write updates.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct BusRequest {
    pub address: u32,
    pub write_data: u32,
    pub write_mask: u8,
    /// Read strobe: start a read of the word at `address`.
    pub read: bool,
    /// Write strobe: start a write of `write_data` to the lanes of `write_mask`.
    pub write: bool,
}

impl BusRequest {
    /// A tick without any strobe.
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn read(address: u32) -> Self {
        Self {
            address,
            read: true,
            ..Self::default()
        }
    }

    pub fn write(address: u32, write_data: u32, write_mask: u8) -> Self {
        Self {
            address,
            write_data,
            write_mask,
            write: true,
            ..Self::default()
        }
    }

    /// Returns `true` if neither strobe is set.
    pub fn is_idle(&self) -> bool {
        !self.read && !self.write
    }
}

/// The signals driven back by a device during one tick.
///
/// `read_data` holds the result of the most recent read once `read_busy` is clear, and keeps
/// holding it on following ticks until the next read.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct BusResponse {
    pub read_data: u32,
    pub read_busy: bool,
    pub write_busy: bool,
}

/// A device on the memory bus.
///
/// [`cycle`](Self::cycle) is called exactly once per tick with the core's request for that tick.
/// A device may clear its busy flags in the same tick a strobe arrives (zero wait states), or keep
/// them set for as many ticks as it needs. It must accept a new strobe only once it isn't busy.
pub trait Memory: Debug {
    fn cycle(&mut self, request: &BusRequest) -> BusResponse;

    /// Abandons any access in progress. Stored contents are kept.
    fn reset(&mut self);
}
