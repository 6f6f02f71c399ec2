//! Branch predicates and control-transfer targets.

use crate::instruction::BranchCondition;

/// Evaluates a conditional branch on the values of `rs1` and `rs2`.
///
/// > BEQ and BNE take the branch if registers rs1 and rs2 are equal or unequal respectively. BLT
/// > and BLTU take the branch if rs1 is less than rs2, using signed and unsigned comparison
/// > respectively. BGE and BGEU take the branch if rs1 is greater than or equal to rs2, using
/// > signed and unsigned comparison respectively.
pub fn taken(condition: BranchCondition, rs1: u32, rs2: u32) -> bool {
    match condition {
        BranchCondition::Beq => rs1 == rs2,
        BranchCondition::Bne => rs1 != rs2,
        BranchCondition::Blt => (rs1 as i32) < (rs2 as i32),
        BranchCondition::Bge => (rs1 as i32) >= (rs2 as i32),
        BranchCondition::Bltu => rs1 < rs2,
        BranchCondition::Bgeu => rs1 >= rs2,
    }
}

/// Returns the PC following a conditional branch of `length` bytes at `pc`.
pub fn branch_target(pc: u32, offset: i32, taken: bool, length: u32) -> u32 {
    if taken {
        pc.wrapping_add_signed(offset)
    } else {
        pc.wrapping_add(length)
    }
}

/// Returns the target of a JAL at `pc`.
pub fn jal_target(pc: u32, offset: i32) -> u32 {
    pc.wrapping_add_signed(offset)
}

/// Returns the target of a JALR: the sum of base and offset with its lowest bit cleared.
pub fn jalr_target(base: u32, offset: i32) -> u32 {
    base.wrapping_add_signed(offset) & !1
}

/// Returns the value an AUIPC at `pc` writes to its destination.
pub fn auipc(pc: u32, upper: i32) -> u32 {
    pc.wrapping_add_signed(upper)
}
