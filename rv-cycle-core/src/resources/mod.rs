//! Provides the devices found on the board: RAM and a small memory-mapped I/O page.

pub mod io;
pub mod ram;
