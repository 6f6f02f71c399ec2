//! Control and status registers, and the trap entry/exit logic that goes with them.
//!
//! The execution engine only talks to the [`ControlStatus`] trait, so that a core without any
//! interrupt support ([`CycleCounter`]) and one with machine-mode traps ([`CsRegisters`]) are two
//! compositions of the same state machine.

use bitvec::{order::Lsb0, view::BitView};
use log::debug;
use std::fmt::Debug;

/// General 12-bit value representing a CSR specifier. Note that this can hold any 12-bit value,
/// even if the value represents an unsupported or non-existent CSR.
pub type CsrSpecifier = u16;

/// Machine status register.
pub const MSTATUS: CsrSpecifier = 0x300;
/// Machine trap-handler base address.
pub const MTVEC: CsrSpecifier = 0x305;
/// Machine exception program counter.
pub const MEPC: CsrSpecifier = 0x341;
/// Machine trap cause.
pub const MCAUSE: CsrSpecifier = 0x342;
/// Cycle counter for RDCYCLE instruction.
pub const CYCLE: CsrSpecifier = 0xC00;
/// Upper 32 bits of [`CYCLE`], RV32 only.
pub const CYCLEH: CsrSpecifier = 0xC80;

mod idx {
    /// Machine interrupt enable, in `mstatus`.
    pub const MIE: usize = 3;
    /// Interrupt flag, in `mcause`.
    pub const INTERRUPT: usize = 31;
}

/// The reason a trap is taken.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TrapCause {
    /// The external interrupt request line.
    Interrupt,
    IllegalInstruction,
    Breakpoint,
    EnvironmentCall,
}

impl TrapCause {
    /// Returns the exception code of this cause, as defined by the privileged architecture.
    pub fn code(self) -> u32 {
        match self {
            // Machine external interrupt
            Self::Interrupt => 11,
            Self::IllegalInstruction => 2,
            Self::Breakpoint => 3,
            // Environment call from M-mode
            Self::EnvironmentCall => 11,
        }
    }
}

/// The CSR file and trap logic, as seen by the execution engine.
///
/// Reads of unmapped CSRs return `0`; writes to unmapped or read-only CSRs are ignored. Neither
/// is an error.
pub trait ControlStatus: Debug {
    fn read(&self, specifier: CsrSpecifier) -> u32;

    fn write(&mut self, specifier: CsrSpecifier, value: u32);

    /// Advances the cycle counter. Called once for every tick the core is out of reset.
    fn tick(&mut self);

    /// Returns the 64-bit cycle counter.
    fn cycles(&self) -> u64;

    /// Returns `true` if an interrupt must be taken, given the level of the request line.
    fn interrupt_pending(&self, request: bool) -> bool;

    /// Records a trap for `cause`, to return to `return_address` later. Returns the trap vector to
    /// continue at, or `None` if traps are not supported.
    fn enter_trap(&mut self, cause: TrapCause, return_address: u32) -> Option<u32>;

    /// Leaves a trap handler (MRET). Returns the address to resume at, or `None` if traps are not
    /// supported.
    fn trap_return(&mut self) -> Option<u32>;

    /// Forces the registers back to their reset state.
    fn reset(&mut self);
}

/// Reduced CSR file holding nothing but the 64-bit cycle counter.
///
/// Interrupts are never taken, and trap entry or return is not supported.
#[derive(Debug, Clone, Default)]
pub struct CycleCounter {
    cycles: u64,
}

impl CycleCounter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ControlStatus for CycleCounter {
    fn read(&self, specifier: CsrSpecifier) -> u32 {
        match specifier {
            CYCLE => self.cycles as u32,
            CYCLEH => (self.cycles >> 32) as u32,
            _ => 0,
        }
    }

    fn write(&mut self, _specifier: CsrSpecifier, _value: u32) {
        // The cycle counter is read-only, nothing else is mapped.
    }

    fn tick(&mut self) {
        self.cycles = self.cycles.wrapping_add(1);
    }

    fn cycles(&self) -> u64 {
        self.cycles
    }

    fn interrupt_pending(&self, _request: bool) -> bool {
        false
    }

    fn enter_trap(&mut self, _cause: TrapCause, _return_address: u32) -> Option<u32> {
        None
    }

    fn trap_return(&mut self) -> Option<u32> {
        None
    }

    fn reset(&mut self) {
        self.cycles = 0;
    }
}

/// Machine-mode CSR file with interrupt support.
///
/// Only the MIE bit of `mstatus` and the interrupt bit of `mcause` are implemented. The interrupt
/// bit doubles as the "handler active" flag: while it is set, further interrupts are held off,
/// and MRET clears it.
///
/// Exceptions don't touch `mcause`. The exception being handled is tracked separately and holds
/// off interrupts in the same way until MRET, so that `mepc` can't be overwritten before the
/// handler returns.
#[derive(Debug, Clone, Default)]
pub struct CsRegisters {
    mstatus: u32,
    mtvec: u32,
    mepc: u32,
    mcause: u32,
    exception: Option<TrapCause>,
    counter: CycleCounter,
}

impl CsRegisters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the MIE (M-mode Interrupt Enable) bit is set.
    pub fn mie(&self) -> bool {
        self.mstatus.view_bits::<Lsb0>()[idx::MIE]
    }

    /// Returns `true` while an interrupt handler is running.
    pub fn in_interrupt(&self) -> bool {
        self.mcause.view_bits::<Lsb0>()[idx::INTERRUPT]
    }

    /// Returns the exception whose handler is running, if any.
    pub fn exception(&self) -> Option<TrapCause> {
        self.exception
    }

    pub fn mepc(&self) -> u32 {
        self.mepc
    }
}

impl ControlStatus for CsRegisters {
    fn read(&self, specifier: CsrSpecifier) -> u32 {
        match specifier {
            MSTATUS => self.mstatus,
            MTVEC => self.mtvec,
            MEPC => self.mepc,
            MCAUSE => self.mcause,
            _ => self.counter.read(specifier),
        }
    }

    fn write(&mut self, specifier: CsrSpecifier, value: u32) {
        match specifier {
            MSTATUS => {
                let mie = value.view_bits::<Lsb0>()[idx::MIE];
                self.mstatus = 0;
                self.mstatus.view_bits_mut::<Lsb0>().set(idx::MIE, mie);
            }
            MTVEC => self.mtvec = value,
            MEPC => self.mepc = value,
            MCAUSE => {
                let interrupt = value.view_bits::<Lsb0>()[idx::INTERRUPT];
                self.mcause = 0;
                self.mcause.view_bits_mut::<Lsb0>().set(idx::INTERRUPT, interrupt);
            }
            _ => self.counter.write(specifier, value),
        }
    }

    fn tick(&mut self) {
        self.counter.tick();
    }

    fn cycles(&self) -> u64 {
        self.counter.cycles()
    }

    fn interrupt_pending(&self, request: bool) -> bool {
        request && self.mie() && !self.in_interrupt() && self.exception.is_none()
    }

    fn enter_trap(&mut self, cause: TrapCause, return_address: u32) -> Option<u32> {
        debug!(
            "entering trap: cause {cause:?} (code {}), mepc {return_address:#010x}, mtvec {:#010x}",
            cause.code(),
            self.mtvec
        );
        self.mepc = return_address;
        match cause {
            TrapCause::Interrupt => self.mcause.view_bits_mut::<Lsb0>().set(idx::INTERRUPT, true),
            exception => self.exception = Some(exception),
        }
        Some(self.mtvec)
    }

    fn trap_return(&mut self) -> Option<u32> {
        self.mcause.view_bits_mut::<Lsb0>().set(idx::INTERRUPT, false);
        self.exception = None;
        Some(self.mepc)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}
