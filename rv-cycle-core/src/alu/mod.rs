//! Arithmetic/logic unit, including its multi-cycle shifter and divider.

mod divider;
mod shifter;

pub use divider::Divider;
pub use shifter::{ShiftKind, Shifter};

/// Every operation the ALU can be asked to perform.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AluOp {
    Add,
    Sub,
    Sll,
    Slt,
    Sltu,
    Xor,
    Srl,
    Sra,
    Or,
    And,
    Mul,
    Mulh,
    Mulhsu,
    Mulhu,
    Div,
    Divu,
    Rem,
    Remu,
}

impl AluOp {
    /// Returns the shift direction if this operation is executed by the [`Shifter`].
    pub fn shift_kind(self) -> Option<ShiftKind> {
        match self {
            Self::Sll => Some(ShiftKind::Left),
            Self::Srl => Some(ShiftKind::LogicalRight),
            Self::Sra => Some(ShiftKind::ArithmeticRight),
            _ => None,
        }
    }

    /// Returns `true` if this operation is executed by the [`Divider`].
    pub fn is_division(self) -> bool {
        matches!(self, Self::Div | Self::Divu | Self::Rem | Self::Remu)
    }

    /// Returns `true` if this operation belongs to the M extension.
    pub fn is_mul_div(self) -> bool {
        matches!(self, Self::Mul | Self::Mulh | Self::Mulhsu | Self::Mulhu) || self.is_division()
    }
}

/// Computes `op` for operations that complete in the cycle they are issued.
///
/// Returns `None` for shifts and divisions, which need the multi-cycle sub-units.
pub fn combinational(op: AluOp, a: u32, b: u32) -> Option<u32> {
    Some(match op {
        AluOp::Add => a.wrapping_add(b),
        AluOp::Sub => a.wrapping_sub(b),
        AluOp::Slt => ((a as i32) < (b as i32)) as u32,
        AluOp::Sltu => (a < b) as u32,
        AluOp::Xor => a ^ b,
        AluOp::Or => a | b,
        AluOp::And => a & b,
        AluOp::Mul | AluOp::Mulh | AluOp::Mulhsu | AluOp::Mulhu => multiply(op, a, b),
        AluOp::Sll | AluOp::Srl | AluOp::Sra => return None,
        AluOp::Div | AluOp::Divu | AluOp::Rem | AluOp::Remu => return None,
    })
}

/// Forms the full 64-bit product of `a` and `b`, each sign-extended or zero-extended as `op`
/// requires, and returns the half of it that `op` selects.
///
/// > MUL performs an XLEN-bit×XLEN-bit multiplication of rs1 by rs2 and places the lower XLEN
/// > bits in the destination register. MULH, MULHU, and MULHSU perform the same multiplication but
/// > return the upper XLEN bits of the full 2×XLEN-bit product, for signed×signed,
/// > unsigned×unsigned, and signed rs1×unsigned rs2 multiplication, respectively.
fn multiply(op: AluOp, a: u32, b: u32) -> u32 {
    let (a_signed, b_signed) = match op {
        AluOp::Mulh => (true, true),
        AluOp::Mulhsu => (true, false),
        _ => (false, false),
    };
    let a = if a_signed { a as i32 as i64 as u64 } else { a as u64 };
    let b = if b_signed { b as i32 as i64 as u64 } else { b as u64 };
    let product = a.wrapping_mul(b);
    match op {
        AluOp::Mul => product as u32,
        _ => (product >> 32) as u32,
    }
}

/// Which unit produced the value returned by [`Alu::result`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum Source {
    Combinational(u32),
    Shifter,
    Quotient,
    Remainder,
}

/// The ALU as seen by the execution state machine: an operation is [`issue`](Alu::issue)d once,
/// then the unit is [`tick`](Alu::tick)ed until it is no longer [`busy`](Alu::busy).
#[derive(Debug, Clone)]
pub struct Alu {
    shifter: Shifter,
    divider: Divider,
    source: Source,
}

impl Alu {
    pub fn new(two_level_shifter: bool) -> Self {
        Self {
            shifter: Shifter::new(two_level_shifter),
            divider: Divider::new(),
            source: Source::Combinational(0),
        }
    }

    /// Presents `op` with its operands. Single-cycle results are available right away, shifts and
    /// divisions start their sub-unit.
    pub fn issue(&mut self, op: AluOp, a: u32, b: u32) {
        self.source = if let Some(kind) = op.shift_kind() {
            self.shifter.start(kind, a, b);
            Source::Shifter
        } else if op.is_division() {
            self.divider.start(matches!(op, AluOp::Div | AluOp::Rem), a, b);
            match op {
                AluOp::Div | AluOp::Divu => Source::Quotient,
                _ => Source::Remainder,
            }
        } else {
            // Every other operation is combinational.
            Source::Combinational(combinational(op, a, b).unwrap_or_default())
        };
    }

    /// Advances whichever sub-unit is working by one step.
    pub fn tick(&mut self) {
        match self.source {
            Source::Shifter => self.shifter.tick(),
            Source::Quotient | Source::Remainder => self.divider.tick(),
            Source::Combinational(_) => {}
        }
    }

    pub fn busy(&self) -> bool {
        match self.source {
            Source::Shifter => self.shifter.busy(),
            Source::Quotient | Source::Remainder => self.divider.busy(),
            Source::Combinational(_) => false,
        }
    }

    /// Returns the result of the last issued operation. Only meaningful once not busy.
    pub fn result(&self) -> u32 {
        match self.source {
            Source::Combinational(value) => value,
            Source::Shifter => self.shifter.result(),
            Source::Quotient => self.divider.quotient(),
            Source::Remainder => self.divider.remainder(),
        }
    }

    /// Clears all transient state.
    pub fn reset(&mut self) {
        self.shifter.reset();
        self.divider.reset();
        self.source = Source::Combinational(0);
    }
}
