//! Expansion of RV32C compressed instructions into their 32-bit equivalents.
//!
//! > The C extension [...] reduces static and dynamic code size by adding short 16-bit instruction
//! > encodings for common operations. [...] each RVC instruction expands into a single 32-bit
//! > instruction in either the base ISA (RV32I/E or RV64I) or the F and D standard extensions.
//!
//! Only the integer subset is expanded. Floating-point forms, reserved encodings and the all-zero
//! parcel are rejected.

use crate::asm;
use crate::instruction::DecodeError;
use crate::registers::Specifier;

/// The stack pointer, base register of the `*SP` forms.
const SP: u32 = 2;
/// The link register written by C.JAL and C.JALR.
const RA: u32 = 1;

/// Expands a 16-bit compressed instruction into the 32-bit instruction it stands for.
pub fn expand(parcel: u16) -> Result<u32, DecodeError> {
    let c = parcel as u32;
    let illegal = Err(DecodeError::IllegalCompressed(parcel));

    let funct3 = (c >> 13) & 0b111;
    // Full 5-bit fields.
    let rd = (c >> 7) & 0x1F;
    let rs2 = (c >> 2) & 0x1F;
    // 3-bit fields, naming x8 to x15.
    let rd_low = u32::from(Specifier::from_compressed(c >> 2));
    let rs1_high = u32::from(Specifier::from_compressed(c >> 7));

    let expanded = match (c & 0b11, funct3) {
        // C.ADDI4SPN
        (0b00, 0b000) => {
            let imm = ((c >> 7) & 0x30) | ((c >> 1) & 0x3C0) | ((c >> 4) & 0x4) | ((c >> 2) & 0x8);
            if imm == 0 {
                // Also covers the all-zero parcel, which is defined to be illegal.
                return illegal;
            }
            asm::addi(rd_low, SP, imm as i32)
        }
        // C.LW
        (0b00, 0b010) => asm::lw(rd_low, rs1_high, word_offset(c)),
        // C.SW
        (0b00, 0b110) => asm::sw(rd_low, rs1_high, word_offset(c)),

        // C.NOP, C.ADDI
        (0b01, 0b000) => asm::addi(rd, rd, ci_imm(c)),
        // C.JAL (RV32 only)
        (0b01, 0b001) => asm::jal(RA, cj_imm(c)),
        // C.LI
        (0b01, 0b010) => asm::addi(rd, 0, ci_imm(c)),
        // C.ADDI16SP
        (0b01, 0b011) if rd == SP => {
            let imm = ((c >> 3) & 0x200)
                | ((c >> 2) & 0x10)
                | ((c << 1) & 0x40)
                | ((c << 4) & 0x180)
                | ((c << 3) & 0x20);
            if imm == 0 {
                return illegal;
            }
            asm::addi(SP, SP, sign_extend(imm, 10))
        }
        // C.LUI
        (0b01, 0b011) => {
            let imm = ci_imm(c);
            if imm == 0 {
                return illegal;
            }
            asm::lui(rd, (imm as u32) & 0xF_FFFF)
        }
        (0b01, 0b100) => {
            let rd = rs1_high;
            match (c >> 10) & 0b11 {
                // C.SRLI, C.SRAI: shamt[5] must be zero on RV32
                0b00 | 0b01 if c & (1 << 12) != 0 => return illegal,
                0b00 => asm::srli(rd, rd, rs2),
                0b01 => asm::srai(rd, rd, rs2),
                // C.ANDI
                0b10 => asm::andi(rd, rd, ci_imm(c)),
                // C.SUBW and C.ADDW only exist on RV64
                _ if c & (1 << 12) != 0 => return illegal,
                _ => match (c >> 5) & 0b11 {
                    0b00 => asm::sub(rd, rd, rd_low),
                    0b01 => asm::xor(rd, rd, rd_low),
                    0b10 => asm::or(rd, rd, rd_low),
                    _ => asm::and(rd, rd, rd_low),
                },
            }
        }
        // C.J
        (0b01, 0b101) => asm::jal(0, cj_imm(c)),
        // C.BEQZ
        (0b01, 0b110) => asm::beq(rs1_high, 0, cb_imm(c)),
        // C.BNEZ
        (0b01, 0b111) => asm::bne(rs1_high, 0, cb_imm(c)),

        // C.SLLI
        (0b10, 0b000) => {
            if c & (1 << 12) != 0 {
                return illegal;
            }
            asm::slli(rd, rd, rs2)
        }
        // C.LWSP
        (0b10, 0b010) => {
            if rd == 0 {
                return illegal;
            }
            let imm = ((c >> 7) & 0x20) | ((c >> 2) & 0x1C) | ((c << 4) & 0xC0);
            asm::lw(rd, SP, imm as i32)
        }
        (0b10, 0b100) => match (c & (1 << 12) != 0, rd, rs2) {
            // C.JR with rs1 = 0 is reserved
            (false, 0, 0) => return illegal,
            // C.JR
            (false, rs1, 0) => asm::jalr(0, rs1, 0),
            // C.MV
            (false, rd, rs2) => asm::add(rd, 0, rs2),
            // C.EBREAK
            (true, 0, 0) => asm::ebreak(),
            // C.JALR
            (true, rs1, 0) => asm::jalr(RA, rs1, 0),
            // C.ADD
            (true, rd, rs2) => asm::add(rd, rd, rs2),
        },
        // C.SWSP
        (0b10, 0b110) => {
            let imm = ((c >> 7) & 0x3C) | ((c >> 1) & 0xC0);
            asm::sw(rs2, SP, imm as i32)
        }

        // Floating-point loads and stores, the reserved quadrant 0 slot, and quadrant 3 (which
        // isn't compressed at all).
        _ => return illegal,
    };
    Ok(expanded)
}

/// Sign-extends the low `bits` bits of `value`.
fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

/// The 6-bit signed immediate of the CI format: bit 12, then bits 6 to 2.
fn ci_imm(c: u32) -> i32 {
    sign_extend(((c >> 7) & 0x20) | ((c >> 2) & 0x1F), 6)
}

/// The scaled offset of C.LW and C.SW.
fn word_offset(c: u32) -> i32 {
    (((c >> 7) & 0x38) | ((c >> 4) & 0x4) | ((c << 1) & 0x40)) as i32
}

/// The 12-bit jump offset of C.J and C.JAL: `offset[11|4|9:8|10|6|7|3:1|5]`.
fn cj_imm(c: u32) -> i32 {
    let imm = ((c >> 1) & 0x800)
        | ((c >> 7) & 0x10)
        | ((c >> 1) & 0x300)
        | ((c << 2) & 0x400)
        | ((c >> 1) & 0x40)
        | ((c << 1) & 0x80)
        | ((c >> 2) & 0xE)
        | ((c << 3) & 0x20);
    sign_extend(imm, 12)
}

/// The 9-bit branch offset of C.BEQZ and C.BNEZ: `offset[8|4:3]` and `offset[7:6|2:1|5]`.
fn cb_imm(c: u32) -> i32 {
    let imm = ((c >> 4) & 0x100)
        | ((c >> 7) & 0x18)
        | ((c << 1) & 0xC0)
        | ((c >> 2) & 0x6)
        | ((c << 3) & 0x20);
    sign_extend(imm, 9)
}
