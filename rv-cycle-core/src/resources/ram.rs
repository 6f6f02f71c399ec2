use crate::bus::{BusRequest, BusResponse, Memory};
use crate::load_store;
use log::trace;
use thiserror::Error;

/// Default RAM size: 64 KiB.
pub const DEFAULT_SIZE: usize = 64 * 1024;

/// Word-organized little-endian RAM with a fixed number of wait states per access.
///
/// The RAM is mapped at address `0`. Reads outside of it return `0`, and writes outside of it are
/// dropped.
///
/// A strobe performs the access right away. With wait states, the busy flag of the access is set
/// on the strobe tick and on the `wait_states` ticks after it. The read data stays valid until the
/// next read.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Ram {
    words: Vec<u32>,
    wait_states: u32,
    /// Wait states left for the access in progress.
    remaining: u32,
    /// Set if the access in progress is a write.
    writing: bool,
    read_data: u32,
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum LoadError {
    #[error("{len} bytes at {address:#010x} don't fit in a memory of {size} bytes")]
    OutOfRange {
        address: u32,
        len: usize,
        size: usize,
    },
}

impl Ram {
    /// Create a new zero-initialized RAM holding `size` bytes, rounded up to a whole word.
    pub fn new(size: usize, wait_states: u32) -> Self {
        Self {
            words: vec![0; size.div_ceil(4)],
            wait_states,
            remaining: 0,
            writing: false,
            read_data: 0,
        }
    }

    /// Returns the size expressed in bytes.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.words.len() * 4
    }

    pub fn wait_states(&self) -> u32 {
        self.wait_states
    }

    /// Copies `bytes` into RAM at `address`, without any timing. The whole buffer must fit.
    pub fn load(&mut self, address: u32, bytes: &[u8]) -> Result<(), LoadError> {
        let start = address as usize;
        if start.checked_add(bytes.len()).map_or(true, |end| end > self.len()) {
            return Err(LoadError::OutOfRange {
                address,
                len: bytes.len(),
                size: self.len(),
            });
        }
        for (offset, &byte) in bytes.iter().enumerate() {
            let address = start + offset;
            let word = &mut self.words[address / 4];
            let shift = (address % 4) * 8;
            *word = *word & !(0xFF << shift) | (byte as u32) << shift;
        }
        Ok(())
    }

    /// Returns the word containing `address`, without any timing. Returns `None` outside the RAM.
    pub fn read_word(&self, address: u32) -> Option<u32> {
        self.words.get(address as usize / 4).copied()
    }
}

impl Memory for Ram {
    fn cycle(&mut self, request: &BusRequest) -> BusResponse {
        let index = request.address as usize / 4;
        if request.read {
            self.read_data = self.words.get(index).copied().unwrap_or(0);
            self.remaining = self.wait_states;
            self.writing = false;
            trace!("ram read {:#010x} => {:#010x}", request.address, self.read_data);
        } else if request.write {
            if let Some(word) = self.words.get_mut(index) {
                *word = load_store::merge(*word, request.write_data, request.write_mask);
            }
            self.remaining = self.wait_states;
            self.writing = true;
            trace!(
                "ram write {:#010x} <= {:#010x} (mask {:#06b})",
                request.address,
                request.write_data,
                request.write_mask
            );
        }

        let busy = self.remaining > 0;
        if request.is_idle() {
            self.remaining = self.remaining.saturating_sub(1);
        }
        BusResponse {
            read_data: self.read_data,
            read_busy: busy && !self.writing,
            write_busy: busy && self.writing,
        }
    }

    fn reset(&mut self) {
        self.remaining = 0;
        self.writing = false;
        self.read_data = 0;
    }
}
