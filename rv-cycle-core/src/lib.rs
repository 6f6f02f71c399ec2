//! Cycle-accurate model of a small RV32I core with optional M and C extensions, in the style of
//! a multi-cycle soft core: one instruction at a time, a handful of ticks each.

#[macro_use]
extern crate static_assertions;

pub mod alu;
pub mod asm;
pub mod board;
pub mod branch;
pub mod bus;
pub mod compressed;
pub mod core;
pub mod csr;
pub mod instruction;
pub mod load_store;
pub mod registers;
pub mod resources;
pub mod simulator;
