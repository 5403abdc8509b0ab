/*++

Licensed under the Apache-2.0 license.

File Name:

   config.rs

Abstract:

    File contains utilities for parsing the tool configuration file

--*/

use anyhow::Context;
use marker_lid_verify::{MslPolicy, UakPolicy, DEFAULT_MSL_PATTERN};
use serde_derive::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Minimum Ship Level Configuration
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct MslConfig {
    /// Empty disables the check
    pub pattern: String,

    pub minimum: Option<String>,
}

impl Default for MslConfig {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_MSL_PATTERN.into(),
            minimum: None,
        }
    }
}

/// Update Access Key Configuration
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct UakConfig {
    pub enabled: bool,

    pub version_offset: usize,

    pub version_len: usize,
}

impl Default for UakConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            version_offset: 2,
            version_len: 7,
        }
    }
}

// Tool Configuration
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct ToolConfig {
    pub persist_dir: PathBuf,

    pub reset_file: PathBuf,

    pub os_release: PathBuf,

    pub inventory_file: PathBuf,

    pub msl: MslConfig,

    pub uak: UakConfig,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            persist_dir: "/var/lib/phosphor-software-manager/versions".into(),
            reset_file: "/var/lib/phosphor-software-manager/versions/reset-msl".into(),
            os_release: "/etc/os-release".into(),
            inventory_file: "/var/lib/phosphor-software-manager/inventory.toml".into(),
            msl: MslConfig::default(),
            uak: UakConfig::default(),
        }
    }
}

impl ToolConfig {
    pub fn msl_policy(&self) -> anyhow::Result<MslPolicy> {
        MslPolicy::new(&self.msl.pattern, self.msl.minimum.clone())
            .with_context(|| "Invalid [msl] configuration")
    }

    pub fn uak_policy(&self) -> UakPolicy {
        let start = self.uak.version_offset;
        UakPolicy {
            enabled: self.uak.enabled,
            version_range: start..start.saturating_add(self.uak.version_len),
        }
    }
}

/// Load Tool Configuration from file, or the defaults when no file is given
pub(crate) fn load_config(path: Option<&Path>) -> anyhow::Result<ToolConfig> {
    let Some(path) = path else {
        return Ok(ToolConfig::default());
    };

    let config_str = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read the config file {}", path.display()))?;

    let config: ToolConfig = toml::from_str(&config_str)
        .with_context(|| format!("Failed to parse config file {}", path.display()))?;

    Ok(config)
}
