//
// Copyright 2024, UNSW
//
// SPDX-License-Identifier: BSD-2-Clause
//

use crate::error::{FormatError, Result};

pub const fn kb(n: u64) -> u64 {
    n * 1024
}

pub const fn mb(n: u64) -> u64 {
    n * 1024 * 1024
}

pub const fn divmod(x: u64, y: u64) -> (u64, u64) {
    (x / y, x % y)
}

pub const fn round_up(n: u64, x: u64) -> u64 {
    let (_, m) = divmod(n, x);
    if m == 0 {
        n
    } else {
        n + x - m
    }
}

pub fn mask(n: u64) -> u64 {
    (1 << n) - 1
}

/// Sign-extend the low `bits` bits of `value` to a full 64-bit integer.
pub fn sign_extend(value: u64, bits: u32) -> i64 {
    let shift = 64 - bits;
    ((value << shift) as i64) >> shift
}

/// Integer field widths the codec knows about. Anything else is read as a
/// single byte.
fn field_width(size: usize) -> usize {
    match size {
        8 | 4 | 2 => size,
        _ => 1,
    }
}

fn field<const N: usize>(bytes: &[u8], offset: usize) -> Result<[u8; N]> {
    let out_of_bounds = FormatError::OutOfBounds {
        offset,
        size: N,
        len: bytes.len(),
    };
    let end = offset.checked_add(N).ok_or(out_of_bounds.clone())?;
    match bytes.get(offset..end) {
        Some(slice) => {
            let mut buf = [0; N];
            buf.copy_from_slice(slice);
            Ok(buf)
        }
        None => Err(out_of_bounds.into()),
    }
}

/// Decode an unsigned integer of `size` bytes at `offset`, zero-extended to
/// 64 bits.
pub fn unpack_uint(bytes: &[u8], offset: usize, size: usize, big_endian: bool) -> Result<u64> {
    let value = match field_width(size) {
        8 => {
            let b = field::<8>(bytes, offset)?;
            if big_endian {
                u64::from_be_bytes(b)
            } else {
                u64::from_le_bytes(b)
            }
        }
        4 => {
            let b = field::<4>(bytes, offset)?;
            if big_endian {
                u32::from_be_bytes(b) as u64
            } else {
                u32::from_le_bytes(b) as u64
            }
        }
        2 => {
            let b = field::<2>(bytes, offset)?;
            if big_endian {
                u16::from_be_bytes(b) as u64
            } else {
                u16::from_le_bytes(b) as u64
            }
        }
        _ => field::<1>(bytes, offset)?[0] as u64,
    };

    Ok(value)
}

/// Decode a signed integer of `size` bytes at `offset`, sign-extended to
/// 64 bits.
pub fn unpack_int(bytes: &[u8], offset: usize, size: usize, big_endian: bool) -> Result<i64> {
    let width = field_width(size);
    let raw = unpack_uint(bytes, offset, width, big_endian)?;
    Ok(sign_extend(raw, (width * 8) as u32))
}

/// Encode the low `size` bytes of `value` in the requested byte order.
pub fn pack_uint(value: u64, size: usize, big_endian: bool) -> Vec<u8> {
    let width = field_width(size);
    let bytes = if big_endian {
        value.to_be_bytes()
    } else {
        value.to_le_bytes()
    };

    if big_endian {
        bytes[8 - width..].to_vec()
    } else {
        bytes[..width].to_vec()
    }
}

/// Produce a 'human readable' string for the size, rounded down to the
/// largest unit that fits.
pub fn human_size(size: u64) -> String {
    for (bits, label) in [(30, "GiB"), (20, "MiB"), (10, "KiB")] {
        let base = 1 << bits;
        if size >= base {
            let (count, extra) = divmod(size, base);
            if extra == 0 {
                return format!("{} {}", comma_sep_u64(count), label);
            }
            return format!("{}.{:02} {}", count, extra * 100 / base, label);
        }
    }

    format!("{} bytes", comma_sep_u64(size))
}

/// Take an integer, such as 1000000 and add commas such as:
/// 1,000,000.
pub fn comma_sep_u64(n: u64) -> String {
    let mut s = String::new();
    for (i, val) in n.to_string().chars().rev().enumerate() {
        if i != 0 && i % 3 == 0 {
            s.insert(0, ',');
        }
        s.insert(0, val);
    }

    s
}

/// Parse a decimal or `0x`-prefixed hexadecimal number.
pub fn parse_u64(s: &str) -> Option<u64> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok(),
        None => s.parse::<u64>().ok(),
    }
}
