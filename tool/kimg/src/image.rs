//
// Copyright 2025, UNSW
//
// SPDX-License-Identifier: BSD-2-Clause
//

// Document referenced:
// Linux: https://www.kernel.org/doc/html/latest/arch/arm64/booting.html
// Linux: arch/arm64/kernel/head.S

//! The arm64 kernel `Image` header.
//!
//! ```text
//!  0   code0 / "MZ"       UEFI images start with the PE stub signature,
//!  4   code1 / b stext    and the branch moves to the second word
//!  8   text_offset        Image load offset, little endian
//! 16   image_size         Effective Image size, little endian
//! 24   flags              kernel flags, little endian
//! 32   res2, res3, res4   reserved
//! 56   magic              "ARM\x64"
//! 60   res5               PE COFF offset on UEFI images
//! ```

use log::{debug, info};
use serde::Serialize;

use crate::container::ContainerInfo;
use crate::error::{FormatError, Result};
use crate::insn::{is_branch, B_OPCODE_MASK};
use crate::util::{pack_uint, unpack_uint};

pub const HEADER_SIZE: usize = 64;

pub const KERNEL_MAGIC: &[u8; 4] = b"ARM\x64";
pub const EFI_MAGIC_SIG: &[u8; 2] = b"MZ";

const TEXT_OFFSET_OFFSET: usize = 8;
const IMAGE_SIZE_OFFSET: usize = 16;
const FLAGS_OFFSET: usize = 24;
const MAGIC_OFFSET: usize = 56;
const PE_OFFSET_OFFSET: usize = 60;

const FLAG_BE: u64 = 0b0001;
const FLAG_PAGE_SIZE_SHIFT: u64 = 1;
const FLAG_PAGE_SIZE_MASK: u64 = 0b0110;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Arch {
    Aarch64,
}

/// Which of the two header shapes the image uses. Kernels built with the
/// EFI stub give up the first word to the "MZ" signature and branch from the
/// second word instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadIn {
    Efi,
    Plain,
}

impl LeadIn {
    fn detect(img: &[u8]) -> LeadIn {
        if img.starts_with(EFI_MAGIC_SIG) {
            LeadIn::Efi
        } else {
            LeadIn::Plain
        }
    }

    /// Byte offset of the branch to the kernel's primary entry.
    pub const fn branch_offset(&self) -> u32 {
        match self {
            LeadIn::Efi => 4,
            LeadIn::Plain => 0,
        }
    }
}

/// Page size the kernel was built for, from bits 1-2 of the header flags.
///
/// Unknown codes are treated as 4 KiB rather than rejected.
pub fn page_shift_from_flags(flags: u64) -> u32 {
    match (flags & FLAG_PAGE_SIZE_MASK) >> FLAG_PAGE_SIZE_SHIFT {
        2 => 14,
        3 => 16,
        1 => 12,
        code => {
            debug!("unspecified page size code {code}, assuming 4K");
            12
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KernelInfo {
    pub arch: Arch,
    pub is_64: bool,
    pub is_be: bool,
    pub uefi: bool,
    pub load_offset: u64,
    pub kernel_size: u64,
    pub page_shift: u32,
    pub b_stext_insn_offset: u32,
    pub primary_entry_offset: u32,
    pub pe_offset: Option<u32>,
    pub container: Option<ContainerInfo>,
}

impl KernelInfo {
    /// Parse the header of the kernel image in the first `len` bytes of `img`.
    pub fn parse(img: &[u8], len: usize) -> Result<KernelInfo> {
        let img = &img[..len.min(img.len())];
        if img.len() < HEADER_SIZE {
            return Err(FormatError::TooShort {
                len: img.len(),
                required: HEADER_SIZE,
            }
            .into());
        }

        let magic = &img[MAGIC_OFFSET..MAGIC_OFFSET + KERNEL_MAGIC.len()];
        if magic != KERNEL_MAGIC {
            let mut found = [0; 4];
            found.copy_from_slice(magic);
            return Err(FormatError::BadMagic { found }.into());
        }

        let lead_in = LeadIn::detect(img);
        let b_stext_insn_offset = lead_in.branch_offset();

        let b_primary_entry_insn = unpack_uint(img, b_stext_insn_offset as usize, 4, false)? as u32;
        if !is_branch(b_primary_entry_insn) {
            return Err(FormatError::NotBranch {
                insn: b_primary_entry_insn,
                offset: b_stext_insn_offset,
            }
            .into());
        }
        // The entry point always lies after the header, so the immediate is
        // taken as unsigned here.
        let imm = (b_primary_entry_insn & !B_OPCODE_MASK) << 2;
        let primary_entry_offset = imm + b_stext_insn_offset;

        let load_offset = unpack_uint(img, TEXT_OFFSET_OFFSET, 8, false)?;
        let kernel_size = unpack_uint(img, IMAGE_SIZE_OFFSET, 8, false)?;

        let flags = unpack_uint(img, FLAGS_OFFSET, 8, false)? & 0x0f;
        if flags & FLAG_BE != 0 {
            return Err(FormatError::BigEndian.into());
        }
        let page_shift = page_shift_from_flags(flags);

        let pe_offset = match lead_in {
            LeadIn::Efi => Some(unpack_uint(img, PE_OFFSET_OFFSET, 4, false)? as u32),
            LeadIn::Plain => None,
        };

        info!("kernel image_size: {:#010x}", img.len());
        info!("kernel uefi header: {}", lead_in == LeadIn::Efi);
        info!("kernel load_offset: {load_offset:#010x}");
        info!("kernel kernel_size: {kernel_size:#010x}");
        info!("kernel page_shift: {page_shift}");

        Ok(KernelInfo {
            arch: Arch::Aarch64,
            is_64: true,
            is_be: false,
            uefi: lead_in == LeadIn::Efi,
            load_offset,
            kernel_size,
            page_shift,
            b_stext_insn_offset,
            primary_entry_offset,
            pe_offset,
            container: None,
        })
    }

    pub fn lead_in(&self) -> LeadIn {
        if self.uefi {
            LeadIn::Efi
        } else {
            LeadIn::Plain
        }
    }

    pub fn page_size(&self) -> u64 {
        1 << self.page_shift
    }

    pub fn is_uncompressed_img(&self) -> bool {
        self.container.is_some()
    }
}

/// The bytes to store in the `image_size` header field for a kernel of
/// `new_len` bytes.
pub fn resize_kernel_field(info: &KernelInfo, new_len: u64) -> [u8; 8] {
    let mut field = [0; 8];
    field.copy_from_slice(&pack_uint(new_len, 8, info.is_be));
    field
}

/// Patch the `image_size` field of `img` in place. `info.kernel_size` is
/// updated to match.
pub fn kernel_resize(info: &mut KernelInfo, img: &mut [u8], new_len: u64) -> Result<()> {
    if img.len() < HEADER_SIZE {
        return Err(FormatError::TooShort {
            len: img.len(),
            required: HEADER_SIZE,
        }
        .into());
    }

    let field = resize_kernel_field(info, new_len);
    img[IMAGE_SIZE_OFFSET..IMAGE_SIZE_OFFSET + field.len()].copy_from_slice(&field);
    info.kernel_size = new_len;

    Ok(())
}
