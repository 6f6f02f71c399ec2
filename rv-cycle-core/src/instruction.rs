//! Instruction decoding and immediate extraction.

use crate::alu::AluOp;
use crate::compressed;
use crate::csr::CsrSpecifier;
use crate::registers::Specifier;
use thiserror::Error;

/// The instruction-set extensions the decoder accepts on top of RV32I.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Extensions {
    /// M: integer multiplication and division.
    pub mul_div: bool,
    /// C: 16-bit compressed instructions.
    pub compressed: bool,
}

impl Default for Extensions {
    fn default() -> Self {
        Self {
            mul_div: true,
            compressed: true,
        }
    }
}

/// Coarse classification of an instruction by its major opcode.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum OpcodeClass {
    Load,
    Store,
    AluReg,
    AluImm,
    Branch,
    Jal,
    Jalr,
    Lui,
    Auipc,
    System,
    MiscMem,
}

/// The fully resolved operation of a decoded instruction.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Operation {
    Load(LoadWidth),
    Store(StoreWidth),
    AluReg(AluOp),
    AluImm(AluOp),
    Branch(BranchCondition),
    Jal,
    Jalr,
    Lui,
    Auipc,
    System(SystemOp),
    /// FENCE and FENCE.I. With a single in-order hart and no caches, both are no-ops.
    Fence,
}

impl Operation {
    pub fn class(self) -> OpcodeClass {
        match self {
            Self::Load(_) => OpcodeClass::Load,
            Self::Store(_) => OpcodeClass::Store,
            Self::AluReg(_) => OpcodeClass::AluReg,
            Self::AluImm(_) => OpcodeClass::AluImm,
            Self::Branch(_) => OpcodeClass::Branch,
            Self::Jal => OpcodeClass::Jal,
            Self::Jalr => OpcodeClass::Jalr,
            Self::Lui => OpcodeClass::Lui,
            Self::Auipc => OpcodeClass::Auipc,
            Self::System(_) => OpcodeClass::System,
            Self::Fence => OpcodeClass::MiscMem,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BranchCondition {
    Beq,
    Bne,
    Blt,
    Bge,
    Bltu,
    Bgeu,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LoadWidth {
    Lb,
    Lh,
    Lw,
    Lbu,
    Lhu,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum StoreWidth {
    Sb,
    Sh,
    Sw,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SystemOp {
    Ecall,
    Ebreak,
    Mret,
    /// Wait for interrupt. Implemented as a no-op, which the privileged architecture permits.
    Wfi,
    Csr {
        op: CsrOp,
        source: CsrSource,
        csr: CsrSpecifier,
    },
}

/// The read-modify-write flavor of a Zicsr instruction.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CsrOp {
    /// CSRRW / CSRRWI
    ReadWrite,
    /// CSRRS / CSRRSI
    ReadSet,
    /// CSRRC / CSRRCI
    ReadClear,
}

/// Where a Zicsr instruction takes its operand from.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CsrSource {
    Register(Specifier),
    /// 5-bit zero-extended immediate held in the `rs1` field.
    Immediate(u32),
}

/// All five immediate encodings of an instruction word, each sign-extended to 32 bits.
///
/// Only one of them is meaningful for any given instruction; which one is selected by its
/// [`OpcodeClass`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Immediates {
    pub i: i32,
    pub s: i32,
    pub b: i32,
    pub u: i32,
    pub j: i32,
}

impl Immediates {
    pub fn extract(raw_instruction: u32) -> Self {
        Self {
            i: i_imm(raw_instruction),
            s: s_imm(raw_instruction),
            b: b_imm(raw_instruction),
            u: u_imm(raw_instruction),
            j: j_imm(raw_instruction),
        }
    }

    /// Returns the immediate used by instructions of `class`, or `0` for register-register ALU
    /// instructions, which have none.
    pub fn select(&self, class: OpcodeClass) -> i32 {
        match class {
            OpcodeClass::Load
            | OpcodeClass::AluImm
            | OpcodeClass::Jalr
            | OpcodeClass::System
            | OpcodeClass::MiscMem => self.i,
            OpcodeClass::Store => self.s,
            OpcodeClass::Branch => self.b,
            OpcodeClass::Lui | OpcodeClass::Auipc => self.u,
            OpcodeClass::Jal => self.j,
            OpcodeClass::AluReg => 0,
        }
    }
}

/// An instruction in its decoded form. Derived from the instruction word by [`decode`] and never
/// modified afterwards.
///
/// [`decode`]: DecodedInstruction::decode
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct DecodedInstruction {
    /// The 32-bit instruction word, after expansion if the instruction was compressed.
    pub raw: u32,
    /// Size of the instruction in memory: `2` if compressed, `4` otherwise.
    pub length: u32,
    pub op: Operation,
    pub rd: Specifier,
    pub rs1: Specifier,
    pub rs2: Specifier,
    pub funct3: u8,
    pub funct7: u8,
    /// The immediate selected by the opcode class.
    pub immediate: i32,
}

impl DecodedInstruction {
    /// Decodes a 32-bit instruction word.
    pub fn decode(raw_instruction: u32, extensions: Extensions) -> Result<Self, DecodeError> {
        let op = operation(raw_instruction, extensions)?;
        Ok(Self {
            raw: raw_instruction,
            length: 4,
            op,
            rd: rd(raw_instruction),
            rs1: rs1(raw_instruction),
            rs2: rs2(raw_instruction),
            funct3: funct3(raw_instruction),
            funct7: funct7(raw_instruction),
            immediate: Immediates::extract(raw_instruction).select(op.class()),
        })
    }

    /// Expands a 16-bit compressed instruction and decodes the result.
    pub fn decode_compressed(parcel: u16, extensions: Extensions) -> Result<Self, DecodeError> {
        if !extensions.compressed {
            return Err(DecodeError::IllegalCompressed(parcel));
        }
        let expanded = compressed::expand(parcel)?;
        Ok(Self {
            length: 2,
            ..Self::decode(expanded, extensions)?
        })
    }

    pub fn class(&self) -> OpcodeClass {
        self.op.class()
    }
}

/// Returns `true` if `parcel` is the low half of a 16-bit compressed instruction, rather than of
/// a 32-bit one.
pub fn is_compressed(parcel: u16) -> bool {
    parcel & 0b11 != 0b11
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum DecodeError {
    #[error("instruction {0:#010x} has an unsupported opcode")]
    UnsupportedOpcode(u32),
    #[error("illegal instruction {0:#010x}")]
    IllegalInstruction(u32),
    #[error("illegal or unknown compressed instruction {0:#06x}")]
    IllegalCompressed(u16),
}

fn operation(raw_instruction: u32, extensions: Extensions) -> Result<Operation, DecodeError> {
    let illegal = DecodeError::IllegalInstruction(raw_instruction);
    #[allow(clippy::unusual_byte_groupings)]
    let op = match raw_instruction & 0x7F {
        0b00_000_11 => Operation::Load(load_width(raw_instruction).ok_or(illegal)?),
        0b00_011_11 => match funct3(raw_instruction) {
            0b000 | 0b001 => Operation::Fence,
            _ => return Err(illegal),
        },
        0b00_100_11 => Operation::AluImm(imm_funct(raw_instruction).ok_or(illegal)?),
        0b00_101_11 => Operation::Auipc,
        0b01_000_11 => Operation::Store(store_width(raw_instruction).ok_or(illegal)?),
        0b01_100_11 => match reg_funct(raw_instruction) {
            Some(op) if !op.is_mul_div() || extensions.mul_div => Operation::AluReg(op),
            _ => return Err(illegal),
        },
        0b01_101_11 => Operation::Lui,
        0b11_000_11 => Operation::Branch(branch_condition(raw_instruction).ok_or(illegal)?),
        0b11_001_11 if funct3(raw_instruction) == 0 => Operation::Jalr,
        0b11_011_11 => Operation::Jal,
        0b11_100_11 => Operation::System(system_op(raw_instruction).ok_or(illegal)?),
        0b11_001_11 => return Err(illegal),
        _ => return Err(DecodeError::UnsupportedOpcode(raw_instruction)),
    };
    Ok(op)
}

/// Returns the 5-bit *rd* value for R-type, I-type, U-type, J-type instructions.
fn rd(raw_instruction: u32) -> Specifier {
    Specifier::from_u5(raw_instruction >> 7)
}

/// Returns the 5-bit *rs1* value for R-type, I-type, S-type, B-type instructions.
fn rs1(raw_instruction: u32) -> Specifier {
    Specifier::from_u5(raw_instruction >> 15)
}

/// Returns the 5-bit *rs2* value for R-type, S-type, B-type instructions.
fn rs2(raw_instruction: u32) -> Specifier {
    Specifier::from_u5(raw_instruction >> 20)
}

fn imm_funct(raw_instruction: u32) -> Option<AluOp> {
    match (funct3(raw_instruction), funct7(raw_instruction)) {
        (0b000, _) => Some(AluOp::Add),
        (0b010, _) => Some(AluOp::Slt),
        (0b011, _) => Some(AluOp::Sltu),
        (0b100, _) => Some(AluOp::Xor),
        (0b110, _) => Some(AluOp::Or),
        (0b111, _) => Some(AluOp::And),
        // On RV32 the shift amount is 5 bits wide, the remaining upper immediate bits select
        // the shift kind and must otherwise be zero.
        (0b001, 0b0000000) => Some(AluOp::Sll),
        (0b101, 0b0000000) => Some(AluOp::Srl),
        (0b101, 0b0100000) => Some(AluOp::Sra),
        _ => None,
    }
}

fn reg_funct(raw_instruction: u32) -> Option<AluOp> {
    match (funct7(raw_instruction), funct3(raw_instruction)) {
        (0b0000000, 0b000) => Some(AluOp::Add),
        (0b0000000, 0b001) => Some(AluOp::Sll),
        (0b0000000, 0b010) => Some(AluOp::Slt),
        (0b0000000, 0b011) => Some(AluOp::Sltu),
        (0b0000000, 0b100) => Some(AluOp::Xor),
        (0b0000000, 0b101) => Some(AluOp::Srl),
        (0b0000000, 0b110) => Some(AluOp::Or),
        (0b0000000, 0b111) => Some(AluOp::And),
        (0b0100000, 0b000) => Some(AluOp::Sub),
        (0b0100000, 0b101) => Some(AluOp::Sra),
        (0b0000001, 0b000) => Some(AluOp::Mul),
        (0b0000001, 0b001) => Some(AluOp::Mulh),
        (0b0000001, 0b010) => Some(AluOp::Mulhsu),
        (0b0000001, 0b011) => Some(AluOp::Mulhu),
        (0b0000001, 0b100) => Some(AluOp::Div),
        (0b0000001, 0b101) => Some(AluOp::Divu),
        (0b0000001, 0b110) => Some(AluOp::Rem),
        (0b0000001, 0b111) => Some(AluOp::Remu),
        _ => None,
    }
}

fn branch_condition(raw_instruction: u32) -> Option<BranchCondition> {
    match funct3(raw_instruction) {
        0b000 => Some(BranchCondition::Beq),
        0b001 => Some(BranchCondition::Bne),
        0b100 => Some(BranchCondition::Blt),
        0b101 => Some(BranchCondition::Bge),
        0b110 => Some(BranchCondition::Bltu),
        0b111 => Some(BranchCondition::Bgeu),
        _ => None,
    }
}

fn load_width(raw_instruction: u32) -> Option<LoadWidth> {
    match funct3(raw_instruction) {
        0b000 => Some(LoadWidth::Lb),
        0b001 => Some(LoadWidth::Lh),
        0b010 => Some(LoadWidth::Lw),
        0b100 => Some(LoadWidth::Lbu),
        0b101 => Some(LoadWidth::Lhu),
        _ => None,
    }
}

fn store_width(raw_instruction: u32) -> Option<StoreWidth> {
    match funct3(raw_instruction) {
        0b000 => Some(StoreWidth::Sb),
        0b001 => Some(StoreWidth::Sh),
        0b010 => Some(StoreWidth::Sw),
        _ => None,
    }
}

fn system_op(raw_instruction: u32) -> Option<SystemOp> {
    let csr = (raw_instruction >> 20) as CsrSpecifier;
    let rs1 = rs1(raw_instruction);
    let zimm = u32::from(rs1);
    match funct3(raw_instruction) {
        0b000 if rs1 == Specifier::X0 && rd(raw_instruction) == Specifier::X0 => match csr {
            0x000 => Some(SystemOp::Ecall),
            0x001 => Some(SystemOp::Ebreak),
            0x302 => Some(SystemOp::Mret),
            0x105 => Some(SystemOp::Wfi),
            _ => None,
        },
        0b001 => Some(csr_op(CsrOp::ReadWrite, CsrSource::Register(rs1), csr)),
        0b010 => Some(csr_op(CsrOp::ReadSet, CsrSource::Register(rs1), csr)),
        0b011 => Some(csr_op(CsrOp::ReadClear, CsrSource::Register(rs1), csr)),
        0b101 => Some(csr_op(CsrOp::ReadWrite, CsrSource::Immediate(zimm), csr)),
        0b110 => Some(csr_op(CsrOp::ReadSet, CsrSource::Immediate(zimm), csr)),
        0b111 => Some(csr_op(CsrOp::ReadClear, CsrSource::Immediate(zimm), csr)),
        _ => None,
    }
}

fn csr_op(op: CsrOp, source: CsrSource, csr: CsrSpecifier) -> SystemOp {
    SystemOp::Csr { op, source, csr }
}

/// Returns the 3-bit *funct3* value for R-type, I-type, S-type, B-type instructions.
fn funct3(raw_instruction: u32) -> u8 {
    ((raw_instruction >> 12) & 0b111) as u8
}

/// Returns the 7-bit *funct7* value for R-type instructions.
fn funct7(raw_instruction: u32) -> u8 {
    (raw_instruction >> 25) as u8
}

/// Returns the 12-bit I-immediate sign-extended to 32 bits.
pub fn i_imm(raw_instruction: u32) -> i32 {
    raw_instruction as i32 >> 20
}

/// Returns the 12-bit S-immediate sign-extended to 32 bits.
pub fn s_imm(raw_instruction: u32) -> i32 {
    let imm_11_5 = raw_instruction & 0xFE00_0000;
    let imm_4_0 = raw_instruction & 0x0000_0F80;
    (imm_11_5 | (imm_4_0 << 13)) as i32 >> 20
}

/// Returns the 13-bit B-immediate sign-extended to 32 bits. Bit 0 is always zero.
pub fn b_imm(raw_instruction: u32) -> i32 {
    let imm_12 = raw_instruction & 0x8000_0000;
    let imm_10_5 = raw_instruction & 0x7E00_0000;
    let imm_4_1 = raw_instruction & 0x0000_0F00;
    let imm_11 = raw_instruction & 0x0000_0080;
    (imm_12 | (imm_11 << 23) | (imm_10_5 >> 1) | (imm_4_1 << 12)) as i32 >> 19
}

/// Returns the U-immediate: bits 31 to 12 in place, low 12 bits zero.
pub fn u_imm(raw_instruction: u32) -> i32 {
    (raw_instruction & 0xFFFF_F000) as i32
}

/// Returns the 21-bit J-immediate sign-extended to 32 bits. Bit 0 is always zero.
pub fn j_imm(raw_instruction: u32) -> i32 {
    let imm_20 = raw_instruction & 0x8000_0000;
    let imm_10_1 = raw_instruction & 0x7FE0_0000;
    let imm_11 = raw_instruction & 0x0010_0000;
    let imm_19_12 = raw_instruction & 0x000F_F000;
    (imm_20 | (imm_19_12 << 11) | (imm_11 << 2) | (imm_10_1 >> 9)) as i32 >> 11
}
