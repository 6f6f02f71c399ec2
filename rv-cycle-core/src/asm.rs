//! Minimal RV32IM assembler: one encoding function per instruction.
//!
//! Registers are given by index (`0..32`), immediates as signed byte offsets or values. Bits of an
//! immediate that don't fit its format are silently dropped, just like an assembler would reject
//! them, so callers are expected to pass in-range values.
//!
//! Used to build test programs and to expand compressed instructions.

#![allow(clippy::unusual_byte_groupings)]

const LOAD: u32 = 0b00_000_11;
const MISC_MEM: u32 = 0b00_011_11;
const OP_IMM: u32 = 0b00_100_11;
const AUIPC: u32 = 0b00_101_11;
const STORE: u32 = 0b01_000_11;
const OP: u32 = 0b01_100_11;
const LUI: u32 = 0b01_101_11;
const BRANCH: u32 = 0b11_000_11;
const JALR: u32 = 0b11_001_11;
const JAL: u32 = 0b11_011_11;
const SYSTEM: u32 = 0b11_100_11;

/// Encodes an R-type instruction.
pub fn r_type(opcode: u32, rd: u32, funct3: u32, rs1: u32, rs2: u32, funct7: u32) -> u32 {
    (funct7 & 0x7F) << 25
        | (rs2 & 0x1F) << 20
        | (rs1 & 0x1F) << 15
        | (funct3 & 0x7) << 12
        | (rd & 0x1F) << 7
        | (opcode & 0x7F)
}

/// Encodes an I-type instruction.
pub fn i_type(opcode: u32, rd: u32, funct3: u32, rs1: u32, imm: i32) -> u32 {
    ((imm as u32) & 0xFFF) << 20
        | (rs1 & 0x1F) << 15
        | (funct3 & 0x7) << 12
        | (rd & 0x1F) << 7
        | (opcode & 0x7F)
}

/// Encodes an S-type instruction.
pub fn s_type(opcode: u32, funct3: u32, rs1: u32, rs2: u32, imm: i32) -> u32 {
    let imm = imm as u32;
    ((imm >> 5) & 0x7F) << 25
        | (rs2 & 0x1F) << 20
        | (rs1 & 0x1F) << 15
        | (funct3 & 0x7) << 12
        | (imm & 0x1F) << 7
        | (opcode & 0x7F)
}

/// Encodes a B-type instruction. Bit 0 of `imm` is dropped.
pub fn b_type(opcode: u32, funct3: u32, rs1: u32, rs2: u32, imm: i32) -> u32 {
    let imm = imm as u32;
    ((imm >> 12) & 0x1) << 31
        | ((imm >> 5) & 0x3F) << 25
        | (rs2 & 0x1F) << 20
        | (rs1 & 0x1F) << 15
        | (funct3 & 0x7) << 12
        | ((imm >> 1) & 0xF) << 8
        | ((imm >> 11) & 0x1) << 7
        | (opcode & 0x7F)
}

/// Encodes a U-type instruction from the 20 upper immediate bits.
pub fn u_type(opcode: u32, rd: u32, upper: u32) -> u32 {
    (upper & 0xF_FFFF) << 12 | (rd & 0x1F) << 7 | (opcode & 0x7F)
}

/// Encodes a J-type instruction. Bit 0 of `imm` is dropped.
pub fn j_type(opcode: u32, rd: u32, imm: i32) -> u32 {
    let imm = imm as u32;
    ((imm >> 20) & 0x1) << 31
        | ((imm >> 1) & 0x3FF) << 21
        | ((imm >> 11) & 0x1) << 20
        | ((imm >> 12) & 0xFF) << 12
        | (rd & 0x1F) << 7
        | (opcode & 0x7F)
}

pub fn lui(rd: u32, upper: u32) -> u32 {
    u_type(LUI, rd, upper)
}

pub fn auipc(rd: u32, upper: u32) -> u32 {
    u_type(AUIPC, rd, upper)
}

pub fn jal(rd: u32, offset: i32) -> u32 {
    j_type(JAL, rd, offset)
}

pub fn jalr(rd: u32, rs1: u32, offset: i32) -> u32 {
    i_type(JALR, rd, 0b000, rs1, offset)
}

pub fn beq(rs1: u32, rs2: u32, offset: i32) -> u32 {
    b_type(BRANCH, 0b000, rs1, rs2, offset)
}

pub fn bne(rs1: u32, rs2: u32, offset: i32) -> u32 {
    b_type(BRANCH, 0b001, rs1, rs2, offset)
}

pub fn blt(rs1: u32, rs2: u32, offset: i32) -> u32 {
    b_type(BRANCH, 0b100, rs1, rs2, offset)
}

pub fn bge(rs1: u32, rs2: u32, offset: i32) -> u32 {
    b_type(BRANCH, 0b101, rs1, rs2, offset)
}

pub fn bltu(rs1: u32, rs2: u32, offset: i32) -> u32 {
    b_type(BRANCH, 0b110, rs1, rs2, offset)
}

pub fn bgeu(rs1: u32, rs2: u32, offset: i32) -> u32 {
    b_type(BRANCH, 0b111, rs1, rs2, offset)
}

pub fn lb(rd: u32, base: u32, offset: i32) -> u32 {
    i_type(LOAD, rd, 0b000, base, offset)
}

pub fn lh(rd: u32, base: u32, offset: i32) -> u32 {
    i_type(LOAD, rd, 0b001, base, offset)
}

pub fn lw(rd: u32, base: u32, offset: i32) -> u32 {
    i_type(LOAD, rd, 0b010, base, offset)
}

pub fn lbu(rd: u32, base: u32, offset: i32) -> u32 {
    i_type(LOAD, rd, 0b100, base, offset)
}

pub fn lhu(rd: u32, base: u32, offset: i32) -> u32 {
    i_type(LOAD, rd, 0b101, base, offset)
}

/// `sb src, offset(base)`
pub fn sb(src: u32, base: u32, offset: i32) -> u32 {
    s_type(STORE, 0b000, base, src, offset)
}

/// `sh src, offset(base)`
pub fn sh(src: u32, base: u32, offset: i32) -> u32 {
    s_type(STORE, 0b001, base, src, offset)
}

/// `sw src, offset(base)`
pub fn sw(src: u32, base: u32, offset: i32) -> u32 {
    s_type(STORE, 0b010, base, src, offset)
}

pub fn addi(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(OP_IMM, rd, 0b000, rs1, imm)
}

pub fn slti(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(OP_IMM, rd, 0b010, rs1, imm)
}

pub fn sltiu(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(OP_IMM, rd, 0b011, rs1, imm)
}

pub fn xori(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(OP_IMM, rd, 0b100, rs1, imm)
}

pub fn ori(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(OP_IMM, rd, 0b110, rs1, imm)
}

pub fn andi(rd: u32, rs1: u32, imm: i32) -> u32 {
    i_type(OP_IMM, rd, 0b111, rs1, imm)
}

pub fn slli(rd: u32, rs1: u32, shamt: u32) -> u32 {
    r_type(OP_IMM, rd, 0b001, rs1, shamt, 0b0000000)
}

pub fn srli(rd: u32, rs1: u32, shamt: u32) -> u32 {
    r_type(OP_IMM, rd, 0b101, rs1, shamt, 0b0000000)
}

pub fn srai(rd: u32, rs1: u32, shamt: u32) -> u32 {
    r_type(OP_IMM, rd, 0b101, rs1, shamt, 0b0100000)
}

macro_rules! reg_reg {
    ($($name:ident => ($funct3:expr, $funct7:expr)),* $(,)?) => {
        $(
            pub fn $name(rd: u32, rs1: u32, rs2: u32) -> u32 {
                r_type(OP, rd, $funct3, rs1, rs2, $funct7)
            }
        )*
    };
}

reg_reg! {
    add => (0b000, 0b0000000),
    sub => (0b000, 0b0100000),
    sll => (0b001, 0b0000000),
    slt => (0b010, 0b0000000),
    sltu => (0b011, 0b0000000),
    xor => (0b100, 0b0000000),
    srl => (0b101, 0b0000000),
    sra => (0b101, 0b0100000),
    or => (0b110, 0b0000000),
    and => (0b111, 0b0000000),
    mul => (0b000, 0b0000001),
    mulh => (0b001, 0b0000001),
    mulhsu => (0b010, 0b0000001),
    mulhu => (0b011, 0b0000001),
    div => (0b100, 0b0000001),
    divu => (0b101, 0b0000001),
    rem => (0b110, 0b0000001),
    remu => (0b111, 0b0000001),
}

pub fn fence() -> u32 {
    i_type(MISC_MEM, 0, 0b000, 0, 0x0FF)
}

pub fn ecall() -> u32 {
    i_type(SYSTEM, 0, 0b000, 0, 0x000)
}

pub fn ebreak() -> u32 {
    i_type(SYSTEM, 0, 0b000, 0, 0x001)
}

pub fn mret() -> u32 {
    i_type(SYSTEM, 0, 0b000, 0, 0x302)
}

pub fn wfi() -> u32 {
    i_type(SYSTEM, 0, 0b000, 0, 0x105)
}

pub fn csrrw(rd: u32, csr: u16, rs1: u32) -> u32 {
    i_type(SYSTEM, rd, 0b001, rs1, csr as i32)
}

pub fn csrrs(rd: u32, csr: u16, rs1: u32) -> u32 {
    i_type(SYSTEM, rd, 0b010, rs1, csr as i32)
}

pub fn csrrc(rd: u32, csr: u16, rs1: u32) -> u32 {
    i_type(SYSTEM, rd, 0b011, rs1, csr as i32)
}

pub fn csrrwi(rd: u32, csr: u16, zimm: u32) -> u32 {
    i_type(SYSTEM, rd, 0b101, zimm, csr as i32)
}

pub fn csrrsi(rd: u32, csr: u16, zimm: u32) -> u32 {
    i_type(SYSTEM, rd, 0b110, zimm, csr as i32)
}

pub fn csrrci(rd: u32, csr: u16, zimm: u32) -> u32 {
    i_type(SYSTEM, rd, 0b111, zimm, csr as i32)
}

/// Lays out instruction words as little-endian bytes, ready to be loaded into memory.
pub fn to_bytes(program: &[u32]) -> Vec<u8> {
    program.iter().flat_map(|word| word.to_le_bytes()).collect()
}
