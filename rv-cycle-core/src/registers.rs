//! General purpose register file.

use std::fmt;

/// The number of `x` registers (indices start at `0` for `x0`).
pub const LEN: u8 = 32;

/// The 32 general purpose registers of an RV32I core.
///
/// > For RV32I, the 32 x registers are each 32 bits wide, i.e., XLEN=32. Register x0 is hardwired
/// > with all bits equal to 0.
///
/// The program counter is not part of the register file; it is owned by the
/// [`Core`](crate::core::Core), which masks it to the configured address width.
///
/// It is not possible to get a mutable reference to a register, since that would allow unchecked
/// writes to `x0`.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct RegisterFile {
    x: [u32; LEN as usize],
}

impl RegisterFile {
    /// Returns a register file with every register cleared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears every register back to zero.
    pub fn reset(&mut self) {
        self.x = [0; LEN as usize];
    }

    /// Returns the value of register `specifier`. Reading `x0` always yields `0`.
    pub fn read(&self, specifier: Specifier) -> u32 {
        self.x[usize::from(specifier)]
    }

    /// Writes `value` into register `specifier`.
    ///
    /// Writes to `x0` are accepted and have no effect.
    pub fn write(&mut self, specifier: Specifier, value: u32) {
        if specifier != Specifier::X0 {
            self.x[usize::from(specifier)] = value;
        }
    }

    /// Iterates over `(specifier, value)` for all 32 registers, starting at `x0`.
    pub fn iter(&self) -> impl Iterator<Item = (Specifier, u32)> + '_ {
        Specifier::iter_all().map(|s| (s, self.read(s)))
    }
}

/// An `x` register specifier, in the range `0..LEN`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Specifier(u8);

impl Specifier {
    /// Register `x0`, a.k.a. `zero`.
    pub const X0: Self = Self(0);
    /// Register `x1`, a.k.a. `ra`, the standard link register.
    pub const RA: Self = Self(1);
    /// Register `x2`, a.k.a. `sp`, the stack pointer used by the compressed stack forms.
    pub const SP: Self = Self(2);

    /// Creates a specifier from its index, returning `None` if `index > 31`.
    pub fn new<U: TryInto<u8>>(index: U) -> Option<Self> {
        let index = index.try_into().ok()?;
        (index < LEN).then_some(Self(index))
    }

    /// Converts the low 5 bits of `value` into a specifier. Higher bits are ignored, so this
    /// never fails for a field extracted from an instruction word.
    pub fn from_u5(value: u32) -> Self {
        const_assert_eq!(LEN, 32);
        Self((value & 0x1F) as u8)
    }

    /// Converts a 3-bit compressed register field (`rd'`, `rs1'`, `rs2'`) into the architectural
    /// register it names, `x8` up to `x15`.
    pub fn from_compressed(value: u32) -> Self {
        Self(8 + (value & 0b111) as u8)
    }

    /// Iterates over all specifiers, `x0` up to `x31`.
    pub fn iter_all() -> impl Iterator<Item = Self> {
        (0..LEN).map(Self)
    }

    /// Returns the standard ABI mnemonic of this register (`zero`, `ra`, `sp`, ...).
    pub fn abi_name(self) -> &'static str {
        const NAMES: [&str; LEN as usize] = [
            "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3",
            "a4", "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11",
            "t3", "t4", "t5", "t6",
        ];
        NAMES[usize::from(self)]
    }
}

impl From<Specifier> for u8 {
    fn from(value: Specifier) -> Self {
        value.0
    }
}

impl From<Specifier> for u32 {
    fn from(value: Specifier) -> Self {
        value.0 as u32
    }
}

impl From<Specifier> for usize {
    fn from(value: Specifier) -> Self {
        value.0 as usize
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}
