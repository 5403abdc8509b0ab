/*++

Licensed under the Apache-2.0 license.

File Name:

    uak.rs

Abstract:

    File contains the Update Access Key entitlement policy.

--*/

use crate::*;
use chrono::NaiveDate;
use core::ops::Range;
use std::path::Path;

/// Build date of an emergency service pack; always entitled
pub const EMERGENCY_BUILD_DATE: &str = "00000000";

const DATE_FORMAT: &str = "%Y%m%d";
const BUILD_ID_KEY: &str = "BuildId";

/// Update access key settings
#[derive(Debug, Clone)]
pub struct UakPolicy {
    /// Check FIPP service packs during LID validation
    pub enabled: bool,

    /// Substring of the running extended version compared with the pack version
    pub version_range: Range<usize>,
}

impl Default for UakPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            version_range: 2..9,
        }
    }
}

/// Update Access Key policy over an environment
pub struct UpdateAccessKey<'a, Env: LidVerificationEnv> {
    env: &'a Env,
    policy: &'a UakPolicy,
}

impl<'a, Env: LidVerificationEnv> UpdateAccessKey<'a, Env> {
    pub fn new(env: &'a Env, policy: &'a UakPolicy) -> Self {
        Self { env, policy }
    }

    /// Stored expiration date: motherboard inventory, then the flash copy
    pub fn expiration_date(&self) -> String {
        match read_value(self.env.inventory(), &UAK_KEY) {
            Some(value) if !is_uninitialized(&value) => value,
            _ => read_value(self.env.flash(), &UAK_KEY).unwrap_or_default(),
        }
    }

    /// Version of the running firmware comparable with a pack version
    pub fn running_pack_version(&self) -> Option<String> {
        let version = self
            .env
            .running_extended_version()
            .inspect_err(|err| log::info!("Unable to read the running extended version: {err}"))
            .ok()?;
        version
            .get(self.policy.version_range.clone())
            .map(str::to_string)
    }

    /// Accept a build dated on or before the expiration date
    pub fn check_validity(&self, build_date: &str) -> LidResult<()> {
        let build_date: String = build_date.chars().take(8).collect();
        if build_date == EMERGENCY_BUILD_DATE {
            log::info!("Emergency service pack, skipping Update Access Key check");
            return Ok(());
        }

        let expiration_date = self.expiration_date();
        if is_uninitialized(&expiration_date) {
            log::debug!("No Update Access Key expiration date set, skipping check");
            return Ok(());
        }

        let build = parse_date(&build_date);
        let expiration = parse_date(&expiration_date);
        if let (Some(build), Some(expiration)) = (build, expiration) {
            if build <= expiration {
                log::debug!("Access Key valid. Build date: {build_date}");
                return Ok(());
            }
        }

        log::error!(
            "Update Access Key validation failed. Expiration Date: {expiration_date}. Build date: {build_date}."
        );
        Err(LidError::ExpiredAccessKey {
            expiration_date,
            build_date,
        })
    }

    /// Accept an entitled service pack, or a one-off pack for the running version
    pub fn verify(&self, ga_date: &str, pack_version: &str, is_one_off: bool) -> LidResult<()> {
        let err = match self.check_validity(ga_date) {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };

        if is_one_off && !pack_version.is_empty() {
            if let Some(running) = self.running_pack_version() {
                if running == pack_version {
                    log::info!("One-off service pack {pack_version} matches the running version");
                    return Ok(());
                }
                log::debug!("One-off service pack {pack_version} differs from running {running}");
            }
        }
        Err(err)
    }

    /// Reconcile the motherboard, flash and panel copies of the expiration date
    pub fn sync(&self) {
        sync_locations(&[
            SyncLocation {
                name: "motherboard",
                store: self.env.inventory(),
                key: UAK_KEY,
                pad_to: None,
            },
            SyncLocation {
                name: "flash",
                store: self.env.flash(),
                key: UAK_KEY,
                pad_to: None,
            },
            SyncLocation {
                name: "panel",
                store: self.env.inventory(),
                key: UAK_PANEL_KEY,
                pad_to: None,
            },
        ]);
    }
}

/// Strict `YYYYMMDD`; chrono alone accepts single-digit fields
fn parse_date(date: &str) -> Option<NaiveDate> {
    if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(date, DATE_FORMAT).ok()
}

/// `BuildId` value from an image MANIFEST
pub fn build_id(manifest: &Path) -> LidResult<String> {
    let contents = std::fs::read_to_string(manifest).map_err(|e| LidError::Io {
        path: manifest.display().to_string(),
        reason: e.to_string(),
    })?;
    let build_id = contents
        .lines()
        .filter_map(|line| line.strip_prefix(BUILD_ID_KEY))
        .find_map(|rest| rest.split_once('=').map(|(_, v)| v.trim().to_string()))
        .unwrap_or_default();
    if build_id.is_empty() {
        log::error!("Build id is empty in {}", manifest.display());
    }
    Ok(build_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_env::*;

    fn env_expiring(date: &str) -> TestEnv {
        let env = TestEnv::running("fw1060.20-10", "fw1060.20-10.1-abcdef");
        env.inventory.set(&UAK_KEY, date);
        env
    }

    #[test]
    fn test_build_before_expiration_accepted() {
        let policy = UakPolicy::default();
        let env = env_expiring("20230601");
        let uak = UpdateAccessKey::new(&env, &policy);
        assert!(uak.verify("20230101", "1060.20", false).is_ok());
        assert!(uak.verify("20230601", "1060.20", false).is_ok());
    }

    #[test]
    fn test_build_after_expiration_rejected() {
        let policy = UakPolicy::default();
        let env = env_expiring("20230601");
        let uak = UpdateAccessKey::new(&env, &policy);
        assert_eq!(
            uak.verify("20230701", "1060.20", false),
            Err(LidError::ExpiredAccessKey {
                expiration_date: "20230601".into(),
                build_date: "20230701".into(),
            })
        );
    }

    #[test]
    fn test_one_off_matching_running_version_accepted() {
        let policy = UakPolicy::default();
        let env = env_expiring("20230601");
        let uak = UpdateAccessKey::new(&env, &policy);
        assert_eq!(uak.running_pack_version().as_deref(), Some("1060.20"));
        assert!(uak.verify("20230701", "1060.20", true).is_ok());
    }

    #[test]
    fn test_one_off_other_version_rejected() {
        let policy = UakPolicy::default();
        let env = env_expiring("20230601");
        let uak = UpdateAccessKey::new(&env, &policy);
        assert!(matches!(
            uak.verify("20230701", "1060.30", true),
            Err(LidError::ExpiredAccessKey { .. })
        ));
        assert!(uak.verify("20230701", "", true).is_err());
    }

    #[test]
    fn test_emergency_date_always_accepted() {
        let policy = UakPolicy::default();
        let env = env_expiring("20000101");
        let uak = UpdateAccessKey::new(&env, &policy);
        assert!(uak.verify("00000000", "", false).is_ok());
        assert!(uak.check_validity("00000000123456").is_ok());
    }

    #[test]
    fn test_build_date_truncated_to_day() {
        let policy = UakPolicy::default();
        let env = env_expiring("20230601");
        let uak = UpdateAccessKey::new(&env, &policy);
        assert!(uak.check_validity("20230601235959").is_ok());
        assert_eq!(
            uak.check_validity("20230602000000"),
            Err(LidError::ExpiredAccessKey {
                expiration_date: "20230601".into(),
                build_date: "20230602".into(),
            })
        );
    }

    #[test]
    fn test_malformed_dates_rejected() {
        let policy = UakPolicy::default();
        let env = env_expiring("20230601");
        let uak = UpdateAccessKey::new(&env, &policy);
        assert!(uak.check_validity("2023X701").is_err());
        assert!(uak.check_validity("20231301").is_err());
        assert_eq!(
            uak.check_validity("2023061"),
            Err(LidError::ExpiredAccessKey {
                expiration_date: "20230601".into(),
                build_date: "2023061".into(),
            })
        );
        assert!(uak.check_validity("2023-06-01").is_err());
        assert!(uak.check_validity("+2023061").is_err());

        let env = env_expiring("2023061");
        let uak = UpdateAccessKey::new(&env, &policy);
        assert!(uak.check_validity("20230101").is_err());

        let env = env_expiring("June 1st");
        let uak = UpdateAccessKey::new(&env, &policy);
        assert_eq!(
            uak.check_validity("20230101"),
            Err(LidError::ExpiredAccessKey {
                expiration_date: "June 1st".into(),
                build_date: "20230101".into(),
            })
        );
    }

    #[test]
    fn test_uninitialized_expiration_accepts() {
        let policy = UakPolicy::default();
        for date in ["", "        ", "00000000"] {
            let env = env_expiring(date);
            let uak = UpdateAccessKey::new(&env, &policy);
            assert!(uak.check_validity("20991231").is_ok());
        }
    }

    #[test]
    fn test_expiration_falls_back_to_flash() {
        let policy = UakPolicy::default();
        let env = env_expiring("");
        env.flash.set(&UAK_KEY, "20230601");
        let uak = UpdateAccessKey::new(&env, &policy);
        assert_eq!(uak.expiration_date(), "20230601");
        assert!(uak.check_validity("20230701").is_err());
    }

    #[test]
    fn test_running_pack_version_out_of_range() {
        let policy = UakPolicy::default();
        let env = TestEnv::running("", "fw10");
        let uak = UpdateAccessKey::new(&env, &policy);
        assert_eq!(uak.running_pack_version(), None);
    }

    #[test]
    fn test_sync_motherboard_wins() {
        let policy = UakPolicy::default();
        let env = env_expiring("20230601");
        env.flash.set(&UAK_KEY, "20220101");
        let uak = UpdateAccessKey::new(&env, &policy);
        uak.sync();
        assert_eq!(env.flash.get(&UAK_KEY), "20230601");
        assert_eq!(env.inventory.get(&UAK_PANEL_KEY), "20230601");
    }

    #[test]
    fn test_sync_from_flash_then_panel() {
        let policy = UakPolicy::default();
        let env = env_expiring("");
        env.flash.set(&UAK_KEY, "20230601");
        env.inventory.set(&UAK_PANEL_KEY, "20240101");
        let uak = UpdateAccessKey::new(&env, &policy);
        uak.sync();
        assert_eq!(env.inventory.get(&UAK_KEY), "20230601");
        assert_eq!(env.inventory.get(&UAK_PANEL_KEY), "20230601");

        let env = env_expiring("");
        env.inventory.set(&UAK_PANEL_KEY, "20240101");
        let uak = UpdateAccessKey::new(&env, &policy);
        uak.sync();
        assert_eq!(env.inventory.get(&UAK_KEY), "20240101");
        assert_eq!(env.flash.get(&UAK_KEY), "20240101");
    }

    #[test]
    fn test_sync_is_idempotent() {
        let policy = UakPolicy::default();
        let env = env_expiring("");
        env.flash.set(&UAK_KEY, "20230601");
        let uak = UpdateAccessKey::new(&env, &policy);
        uak.sync();
        let writes = (env.inventory.writes.get(), env.flash.writes.get());
        assert_eq!(writes, (2, 0));
        uak.sync();
        assert_eq!(
            (env.inventory.writes.get(), env.flash.writes.get()),
            writes
        );
    }

    #[test]
    fn test_build_id() {
        let dir = std::env::temp_dir().join(format!("marker-lid-build-id-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let manifest = dir.join("MANIFEST");
        std::fs::write(
            &manifest,
            "purpose=xyz.openbmc_project.Software.Version.VersionPurpose.BMC\n\
             version=fw1060.20-10\n\
             BuildId=20230701123000\n",
        )
        .unwrap();
        assert_eq!(build_id(&manifest).unwrap(), "20230701123000");

        std::fs::write(&manifest, "version=fw1060.20-10\n").unwrap();
        assert_eq!(build_id(&manifest).unwrap(), "");

        assert!(matches!(
            build_id(&dir.join("missing")),
            Err(LidError::Io { .. })
        ));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
