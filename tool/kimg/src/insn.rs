//
// Copyright 2025, UNSW
//
// SPDX-License-Identifier: BSD-2-Clause
//

// Document referenced:
// Arm Architecture Reference Manual for A-profile, C6.2.26 B (unconditional branch)

use log::info;

use crate::error::Result;
use crate::util::{mask, mb, sign_extend, unpack_uint};

/// Opcode bits of `B <label>`.
pub const B_OPCODE: u32 = 0x1400_0000;
/// Mask selecting the opcode class of an unconditional branch (top 6 bits).
pub const B_OPCODE_MASK: u32 = 0xFC00_0000;

const B_IMM26_BITS: u64 = 26;
/// The immediate is in words; once shifted into bytes it spans 28 bits.
const B_OFFSET_BITS: u32 = 28;

/// Largest distance, in bytes, we are willing to bridge with a single `B`.
pub const B_RANGE: u64 = mb(128);

pub fn is_branch(insn: u32) -> bool {
    insn & B_OPCODE_MASK == B_OPCODE
}

/// Whether a `B` placed at `from` can reach `to`.
///
/// This compares the absolute distance against 128 MiB rather than the exact
/// two's-complement range of the immediate, so it accepts `from + 128 MiB`
/// even though the hardware encoding tops out one word short of it.
pub fn can_encode_branch(from: u64, to: u64) -> bool {
    from.abs_diff(to) <= B_RANGE
}

/// Encode `B` at address `from` jumping to `to`.
pub fn encode_branch(from: u64, to: u64) -> Option<u32> {
    if !can_encode_branch(from, to) {
        return None;
    }

    let offset = to.wrapping_sub(from) & mask(B_OFFSET_BITS as u64);
    Some(B_OPCODE | (offset >> 2) as u32)
}

/// [`encode_branch`] as the little-endian bytes that go into an image.
pub fn branch_bytes(from: u64, to: u64) -> Option<[u8; 4]> {
    encode_branch(from, to).map(u32::to_le_bytes)
}

/// Resolve the target of `insn` located at `pc`.
///
/// Anything that is not an unconditional branch resolves to `pc` itself.
pub fn decode_branch_target(insn: u32, pc: u64) -> u64 {
    if !is_branch(insn) {
        return pc;
    }

    let imm26 = insn as u64 & mask(B_IMM26_BITS);
    let offset = sign_extend(imm26 << 2, B_OFFSET_BITS);
    pc.wrapping_add_signed(offset)
}

/// Follow a relocating thunk: if the function at `func_offset` in `image`
/// starts with a `B`, return where it lands, otherwise `func_offset`.
pub fn relocate_branch_func(image: &[u8], func_offset: u64) -> Result<u64> {
    let insn = unpack_uint(image, func_offset as usize, 4, false)? as u32;
    let target = decode_branch_target(insn, func_offset);
    if target != func_offset {
        info!("relocate branch function {func_offset:#x} to {target:#x}");
    }

    Ok(target)
}
