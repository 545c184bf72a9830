//
// Copyright 2025, UNSW
//
// SPDX-License-Identifier: BSD-2-Clause
//

//! Whole-file and positioned file access for kernel images.
//!
//! Every operation either transfers exactly the number of bytes asked for or
//! fails with an [`IoError`]; there is no partial success.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use log::debug;
use serde::Deserialize;

use crate::error::{IoError, Result};
use crate::util::round_up;

/// Controls whether file accesses are traced.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub enabled: bool,
    /// Maximum level for the stderr logger, one of the `log::LevelFilter` names.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            enabled: false,
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FileIo {
    log: LogConfig,
}

impl FileIo {
    pub fn new(log: LogConfig) -> FileIo {
        FileIo { log }
    }

    pub fn log_config(&self) -> &LogConfig {
        &self.log
    }

    fn open(&self, path: &Path) -> Result<File> {
        File::open(path).map_err(|source| {
            IoError::Open {
                path: path.to_path_buf(),
                source,
            }
            .into()
        })
    }

    /// Fill `buf` from `file` starting at `offset`, retrying interrupted reads.
    fn fill(&self, file: &mut File, path: &Path, offset: u64, buf: &mut [u8]) -> Result<()> {
        file.seek(SeekFrom::Start(offset))
            .map_err(|source| IoError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        let mut done = 0;
        while done < buf.len() {
            match file.read(&mut buf[done..]) {
                Ok(0) => {
                    return Err(IoError::ShortRead {
                        path: path.to_path_buf(),
                        offset,
                        expected: buf.len(),
                        actual: done,
                    }
                    .into())
                }
                Ok(n) => done += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(IoError::Read {
                        path: path.to_path_buf(),
                        source,
                    }
                    .into())
                }
            }
        }

        Ok(())
    }

    fn stream_len(&self, file: &mut File, path: &Path) -> Result<u64> {
        file.seek(SeekFrom::End(0)).map_err(|source| {
            IoError::Read {
                path: path.to_path_buf(),
                source,
            }
            .into()
        })
    }

    /// Read the entire contents of `path`.
    pub fn read_whole(&self, path: &Path) -> Result<Vec<u8>> {
        let (buf, _) = self.read_aligned(path, 1)?;
        Ok(buf)
    }

    /// Read the entire contents of `path` into a buffer whose length is
    /// rounded up to `align`, with the tail zero-filled. Returns the buffer
    /// and its padded length.
    pub fn read_aligned(&self, path: &Path, align: u64) -> Result<(Vec<u8>, usize)> {
        let mut file = self.open(path)?;
        let len = self.stream_len(&mut file, path)?;
        let padded_len = round_up(len, align.max(1)) as usize;

        let mut buf = vec![0; padded_len];
        self.fill(&mut file, path, 0, &mut buf[..len as usize])?;

        if self.log.enabled {
            debug!(
                "read {} bytes from '{}' (padded to {})",
                len,
                path.display(),
                padded_len
            );
        }

        Ok((buf, padded_len))
    }

    /// Read exactly `len` bytes of `path` starting at `offset`.
    pub fn read_at(&self, path: &Path, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut file = self.open(path)?;
        let mut buf = vec![0; len];
        self.fill(&mut file, path, offset, &mut buf)?;

        if self.log.enabled {
            debug!(
                "read {} bytes at {:#x} from '{}'",
                len,
                offset,
                path.display()
            );
        }

        Ok(buf)
    }

    /// Write `data` to `path`, truncating it first unless `append` is set.
    pub fn write_whole(&self, path: &Path, data: &[u8], append: bool) -> Result<()> {
        let mut options = OpenOptions::new();
        if append {
            options.append(true).create(true);
        } else {
            options.write(true).create(true).truncate(true);
        }

        let mut file = options.open(path).map_err(|source| IoError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let write_err = |source: std::io::Error| IoError::Write {
            path: path.to_path_buf(),
            source,
        };
        file.write_all(data).map_err(write_err)?;
        file.flush().map_err(write_err)?;

        if self.log.enabled {
            debug!(
                "{} {} bytes to '{}'",
                if append { "appended" } else { "wrote" },
                data.len(),
                path.display()
            );
        }

        Ok(())
    }

    /// Size of `path` in bytes. An empty file is an error.
    pub fn file_size(&self, path: &Path) -> Result<u64> {
        let metadata = fs::metadata(path).map_err(|source| IoError::Stat {
            path: path.to_path_buf(),
            source,
        })?;

        match metadata.len() {
            0 => Err(IoError::EmptyFile {
                path: path.to_path_buf(),
            }
            .into()),
            len => Ok(len),
        }
    }
}
