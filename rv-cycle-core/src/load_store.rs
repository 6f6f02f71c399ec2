//! Effective addresses and byte-lane handling for loads and stores.
//!
//! Memory is organized in 32-bit words. A sub-word access selects its lanes within the addressed
//! word by the two low address bits; halfword and word accesses that aren't naturally aligned
//! still select lanes this way instead of trapping.

use crate::instruction::{LoadWidth, StoreWidth};

/// Returns `base + offset`, masked to the address width by `address_mask`.
pub fn effective_address(base: u32, offset: i32, address_mask: u32) -> u32 {
    base.wrapping_add_signed(offset) & address_mask
}

/// Returns the 4-bit byte-lane write mask for a store of `width` to `address`.
pub fn write_mask(width: StoreWidth, address: u32) -> u8 {
    match width {
        StoreWidth::Sb => 1 << (address & 0b11),
        StoreWidth::Sh if address & 0b10 != 0 => 0b1100,
        StoreWidth::Sh => 0b0011,
        StoreWidth::Sw => 0b1111,
    }
}

/// Places the stored value `rs2` on the byte lanes selected by the low bits of `address`.
///
/// Lanes not enabled by [`write_mask`] may hold anything; the byte and halfword values are
/// replicated the same way the hardware's write-data multiplexers do it.
pub fn store_data(rs2: u32, address: u32) -> u32 {
    let [b0, b1, b2, b3] = rs2.to_le_bytes();
    let a0 = address & 0b01 != 0;
    let a1 = address & 0b10 != 0;
    u32::from_le_bytes([
        b0,
        if a0 { b0 } else { b1 },
        if a1 { b0 } else { b2 },
        if a0 {
            b0
        } else if a1 {
            b1
        } else {
            b3
        },
    ])
}

/// Extracts the value of a load of `width` at `address` from the memory `word` holding it.
pub fn load_value(width: LoadWidth, address: u32, word: u32) -> u32 {
    let halfword = if address & 0b10 != 0 {
        (word >> 16) as u16
    } else {
        word as u16
    };
    let byte = if address & 0b01 != 0 {
        (halfword >> 8) as u8
    } else {
        halfword as u8
    };
    match width {
        LoadWidth::Lb => byte as i8 as i32 as u32,
        LoadWidth::Lbu => byte as u32,
        LoadWidth::Lh => halfword as i16 as i32 as u32,
        LoadWidth::Lhu => halfword as u32,
        LoadWidth::Lw => word,
    }
}

/// Merges `data` into `word` on the lanes enabled by `mask`.
pub fn merge(word: u32, data: u32, mask: u8) -> u32 {
    let lanes = u32::from_le_bytes([0, 1, 2, 3].map(|lane| {
        if mask & (1 << lane) != 0 {
            0xFF
        } else {
            0x00
        }
    }));
    (word & !lanes) | (data & lanes)
}
