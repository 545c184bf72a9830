//
// Copyright 2024, UNSW
//
// SPDX-License-Identifier: BSD-2-Clause
//

pub mod config;
pub mod container;
pub mod error;
pub mod image;
pub mod insn;
pub mod io;
pub mod logger;
pub mod report;
pub mod util;

pub use container::ContainerInfo;
pub use error::{Error, FormatError, IoError, Result};
pub use image::{Arch, KernelInfo};

use std::path::Path;

use crate::io::FileIo;

/// Read the kernel at `path`, looking through any container, and parse its
/// header.
pub fn load_kernel(io: &FileIo, path: &Path) -> Result<(KernelInfo, Vec<u8>)> {
    let (container, kimg) = container::read_kernel_image(io, path)?;
    let mut info = KernelInfo::parse(&kimg, kimg.len())?;
    info.container = container;

    Ok((info, kimg))
}
