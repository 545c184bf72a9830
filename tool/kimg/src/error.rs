//
// Copyright 2025, UNSW
//
// SPDX-License-Identifier: BSD-2-Clause
//

//! Error types shared by every part of the tool.
//!
//! Errors fall into two classes. An [`IoError`] means the file system let us
//! down, a [`FormatError`] means the bytes we were handed are not a kernel
//! image we are willing to touch. Both are fatal for the `kimg` binary, but a
//! library caller may want to tell them apart.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] IoError),

    #[error(transparent)]
    Format(#[from] FormatError),
}

impl Error {
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Io(_))
    }

    pub fn is_format(&self) -> bool {
        matches!(self, Error::Format(_))
    }
}

#[derive(Debug, Error)]
pub enum IoError {
    #[error("cannot open '{}': {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "short read from '{}' at offset {offset:#x}: wanted {expected} bytes, got {actual}",
        .path.display()
    )]
    ShortRead {
        path: PathBuf,
        offset: u64,
        expected: usize,
        actual: usize,
    },

    #[error("failed to write '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot stat '{}': {source}", .path.display())]
    Stat {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("'{}' is empty", .path.display())]
    EmptyFile { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("image is {len} bytes, need at least {required} for the header")]
    TooShort { len: usize, required: usize },

    #[error("kernel image magic error: {found:02x?}")]
    BadMagic { found: [u8; 4] },

    #[error("kernel primary entry at {offset:#x} is not a branch: {insn:#010x}")]
    NotBranch { insn: u32, offset: u32 },

    #[error("unexpected arm64 big endian image")]
    BigEndian,

    #[error("read of {size} bytes at offset {offset:#x} runs past the end of a {len} byte buffer")]
    OutOfBounds {
        offset: usize,
        size: usize,
        len: usize,
    },

    #[error("dtb offset {offset:#x} does not fit inside the container header")]
    BadDtbOffset { offset: u32 },

    #[error("payload of {len} bytes does not fit in a 32-bit size field")]
    PayloadTooLarge { len: usize },
}
