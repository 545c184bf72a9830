//
// Copyright 2025, UNSW
//
// SPDX-License-Identifier: BSD-2-Clause
//

//! The `UNCOMPRESSED_IMG` container some vendor boot chains expect around a
//! raw kernel Image.
//!
//! ```text
//!  0   "UNCOMPRESSED_IMG"   magic, 16 bytes
//! 16   dtb offset           4 bytes, size of the kernel payload
//! 20   kernel Image
//! ```
//!
//! The device tree blob itself is appended by a separate step; the field only
//! records where it will start relative to the payload.

use std::path::Path;

use log::warn;
use serde::Serialize;

use crate::error::{FormatError, Result};
use crate::io::FileIo;
use crate::util::pack_uint;

pub const UNCOMPRESSED_IMG_MAGIC: &[u8; 16] = b"UNCOMPRESSED_IMG";
pub const UNCOMPRESSED_IMG_MAGIC_LEN: usize = UNCOMPRESSED_IMG_MAGIC.len();

/// Position of the dtb offset field.
pub const DTB_OFFSET: u32 = UNCOMPRESSED_IMG_MAGIC_LEN as u32;
/// Position of the kernel payload, directly after the dtb offset field.
pub const KIMG_OFFSET: u32 = DTB_OFFSET + 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ContainerInfo {
    pub dtb_offset: u32,
    pub kimg_offset: u32,
    pub kimg_real_size: u64,
}

impl ContainerInfo {
    fn new(total_len: u64) -> ContainerInfo {
        ContainerInfo {
            dtb_offset: DTB_OFFSET,
            kimg_offset: KIMG_OFFSET,
            kimg_real_size: total_len - KIMG_OFFSET as u64,
        }
    }
}

fn has_magic(bytes: &[u8]) -> bool {
    bytes.len() >= KIMG_OFFSET as usize && bytes.starts_with(UNCOMPRESSED_IMG_MAGIC)
}

/// Separate a possibly wrapped image already in memory into its container
/// description and the kernel Image it carries.
pub fn split(bytes: &[u8]) -> (Option<ContainerInfo>, &[u8]) {
    if has_magic(bytes) {
        let info = ContainerInfo::new(bytes.len() as u64);
        (Some(info), &bytes[info.kimg_offset as usize..])
    } else {
        (None, bytes)
    }
}

/// Read the kernel Image at `path`, looking through the container if there
/// is one.
pub fn read_kernel_image(io: &FileIo, path: &Path) -> Result<(Option<ContainerInfo>, Vec<u8>)> {
    let file_size = io.file_size(path)?;
    if file_size < KIMG_OFFSET as u64 {
        return Ok((None, io.read_whole(path)?));
    }

    let head = io.read_at(path, 0, KIMG_OFFSET as usize)?;
    if !has_magic(&head) {
        return Ok((None, io.read_whole(path)?));
    }

    warn!("kernel image with UNCOMPRESSED_IMG header");
    let info = ContainerInfo::new(file_size);
    let kimg = io.read_at(path, info.kimg_offset as u64, info.kimg_real_size as usize)?;

    Ok((Some(info), kimg))
}

/// Put `kimg` inside the container, recording its length at `dtb_offset` in
/// the requested byte order.
pub fn wrap(dtb_offset: u32, kimg: &[u8], is_be: bool) -> Result<Vec<u8>> {
    if !(DTB_OFFSET..=KIMG_OFFSET - 4).contains(&dtb_offset) {
        return Err(FormatError::BadDtbOffset { offset: dtb_offset }.into());
    }
    let kimg_len = u32::try_from(kimg.len())
        .map_err(|_| FormatError::PayloadTooLarge { len: kimg.len() })?;

    let kimg_offset = KIMG_OFFSET as usize;
    let mut img = vec![0; kimg_offset + kimg.len()];
    img[..UNCOMPRESSED_IMG_MAGIC_LEN].copy_from_slice(UNCOMPRESSED_IMG_MAGIC);

    let dtb_offset = dtb_offset as usize;
    img[dtb_offset..dtb_offset + 4].copy_from_slice(&pack_uint(kimg_len as u64, 4, is_be));
    img[kimg_offset..].copy_from_slice(kimg);

    Ok(img)
}

/// Rewrite the file at `path` with the container in front of its current
/// contents.
pub fn append_image_header(io: &FileIo, path: &Path, is_be: bool) -> Result<ContainerInfo> {
    let kimg = io.read_whole(path)?;
    let img = wrap(DTB_OFFSET, &kimg, is_be)?;
    io.write_whole(path, &img, false)?;

    Ok(ContainerInfo::new(img.len() as u64))
}
