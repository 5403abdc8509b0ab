/*++

Licensed under the Apache-2.0 license.

File Name:

    os_release.rs

Abstract:

    File contains the release metadata reader supplying the running version.

--*/

use crate::*;
use std::path::PathBuf;

pub const VERSION_ID_KEY: &str = "VERSION_ID";
pub const EXTENDED_VERSION_KEY: &str = "EXTENDED_VERSION";

/// os-release style `KEY=value` file
#[derive(Debug, Clone)]
pub struct OsRelease {
    path: PathBuf,
}

impl OsRelease {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Value of `key`, with surrounding quotes removed
    pub fn value(&self, key: &str) -> LidResult<String> {
        let contents = std::fs::read_to_string(&self.path).map_err(|e| LidError::Io {
            path: self.path.display().to_string(),
            reason: e.to_string(),
        })?;
        parse_value(&contents, key).ok_or_else(|| LidError::Io {
            path: self.path.display().to_string(),
            reason: format!("{key} not found"),
        })
    }

    pub fn version(&self) -> LidResult<String> {
        self.value(VERSION_ID_KEY)
    }

    pub fn extended_version(&self) -> LidResult<String> {
        self.value(EXTENDED_VERSION_KEY)
    }
}

fn parse_value(contents: &str, key: &str) -> Option<String> {
    contents.lines().find_map(|line| {
        let (k, v) = line.trim().split_once('=')?;
        (k == key).then(|| v.trim().trim_matches('"').to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const OS_RELEASE: &str = "ID=openbmc-phosphor\n\
        NAME=\"IBM eBMC (OpenBMC for IBM Enterprise Systems)\"\n\
        VERSION=\"fw1060.20-10\"\n\
        VERSION_ID=fw1060.20-10-5-gabcdef\n\
        EXTENDED_VERSION=\"fw1060.20-10.1-abcdef\"\n";

    #[test]
    fn test_parse_value() {
        assert_eq!(
            parse_value(OS_RELEASE, VERSION_ID_KEY).as_deref(),
            Some("fw1060.20-10-5-gabcdef")
        );
        assert_eq!(
            parse_value(OS_RELEASE, EXTENDED_VERSION_KEY).as_deref(),
            Some("fw1060.20-10.1-abcdef")
        );
        assert_eq!(parse_value(OS_RELEASE, "VERSION").as_deref(), Some("fw1060.20-10"));
        assert_eq!(parse_value(OS_RELEASE, "BUILD_ID"), None);
    }

    #[test]
    fn test_missing_file() {
        let release = OsRelease::new("/nonexistent/os-release");
        assert!(matches!(release.version(), Err(LidError::Io { .. })));
    }
}
