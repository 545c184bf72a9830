//
// Copyright 2025, UNSW
//
// SPDX-License-Identifier: BSD-2-Clause
//

use std::fs;
use std::path::Path;
use std::str::FromStr;

use log::LevelFilter;
use serde::Deserialize;

use crate::io::LogConfig;

/// Settings for the `kimg` tool. Every field may be omitted from the JSON
/// file, in which case the default is used.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    pub log: LogConfig,
    /// Images are read into buffers padded to this alignment.
    pub read_align: u64,
    /// Print reports as JSON instead of text.
    pub json: bool,
    /// Byte order of the size stamped into the UNCOMPRESSED_IMG container.
    pub big_endian_container: bool,
}

impl Default for ToolConfig {
    fn default() -> Self {
        ToolConfig {
            log: LogConfig::default(),
            read_align: 4,
            json: false,
            big_endian_container: false,
        }
    }
}

impl ToolConfig {
    pub fn from_json(json: &str) -> Result<ToolConfig, String> {
        let config: ToolConfig =
            serde_json::from_str(json).map_err(|e| format!("invalid configuration: {e}"))?;
        config.level_filter()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<ToolConfig, String> {
        let json = fs::read_to_string(path)
            .map_err(|e| format!("cannot read configuration '{}': {}", path.display(), e))?;
        Self::from_json(&json)
    }

    pub fn level_filter(&self) -> Result<LevelFilter, String> {
        LevelFilter::from_str(&self.log.level)
            .map_err(|_| format!("invalid log level '{}'", self.log.level))
    }
}
