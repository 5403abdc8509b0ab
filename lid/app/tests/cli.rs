// Licensed under the Apache-2.0 license

use marker_lid_serde::{AdfEntry, MarkerLidImage};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

struct TmpDir(PathBuf);

impl TmpDir {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("{name}-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }

    fn path(&self) -> &Path {
        &self.0
    }
}

impl Drop for TmpDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

fn write_config(dir: &Path) -> PathBuf {
    std::fs::write(
        dir.join("os-release"),
        "VERSION_ID=\"fw1060.20-10\"\nEXTENDED_VERSION=\"fw1060.20-10.1\"\n",
    )
    .unwrap();
    let config = dir.join("lid-policy.toml");
    std::fs::write(
        &config,
        format!(
            "persist_dir = {:?}\nreset_file = {:?}\nos_release = {:?}\ninventory_file = {:?}\n",
            dir.join("persist"),
            dir.join("reset-msl"),
            dir.join("os-release"),
            dir.join("inventory.toml"),
        ),
    )
    .unwrap();
    config
}

fn tool(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_lid-policy-tool"))
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .unwrap()
}

fn write_lid(dir: &Path, name: &str, version: &str) -> String {
    let mut image = MarkerLidImage::new(version);
    image
        .push(AdfEntry::Spnm(version.into()))
        .push(AdfEntry::Fipp {
            flags: 0,
            date: "20230101".into(),
        })
        .push(AdfEntry::Terminator);
    let path = dir.join(name);
    std::fs::write(&path, image.to_bytes().unwrap()).unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn test_set_min_level_blocks_downgrade() {
    let dir = TmpDir::new("lid-policy-tool-msl");
    let config = write_config(dir.path());
    let older = write_lid(dir.path(), "older.lid", "FW1050.10");
    let newer = write_lid(dir.path(), "newer.lid", "FW1070.00");

    assert!(tool(&config, &["validate", &older]).status.success());
    assert!(tool(&config, &["set-min-level"]).status.success());
    assert_eq!(tool(&config, &["validate", &older]).status.code(), Some(3));
    assert!(tool(&config, &["validate", &newer]).status.success());

    assert!(tool(&config, &["sync-min-level"]).status.success());
    let flash = std::fs::read_to_string(dir.path().join("persist").join("VSYS.FV")).unwrap();
    assert_eq!(flash, "fw1060.20-10");

    assert!(tool(&config, &["reset-min-level"]).status.success());
    assert!(dir.path().join("reset-msl").exists());
    assert!(tool(&config, &["validate", &older]).status.success());
}

#[test]
fn test_check_access_key() {
    let dir = TmpDir::new("lid-policy-tool-uak");
    let config = write_config(dir.path());
    std::fs::create_dir_all(dir.path().join("persist")).unwrap();
    std::fs::write(dir.path().join("persist").join("UTIL.D8"), "20230601").unwrap();

    assert!(tool(&config, &["check-access-key", "--date", "20230501"])
        .status
        .success());
    assert_eq!(
        tool(&config, &["check-access-key", "--date", "20230701"])
            .status
            .code(),
        Some(3)
    );

    let manifest = dir.path().join("MANIFEST");
    std::fs::write(&manifest, "purpose=BMC\nBuildId=20230701\n").unwrap();
    assert_eq!(
        tool(&config, &["check-access-key", "--manifest", manifest.to_str().unwrap()])
            .status
            .code(),
        Some(3)
    );

    let missing = dir.path().join("NO-MANIFEST");
    assert_eq!(
        tool(&config, &["check-access-key", "--manifest", missing.to_str().unwrap()])
            .status
            .code(),
        Some(1)
    );

    assert!(tool(&config, &["sync-access-key"]).status.success());
    let inventory = std::fs::read_to_string(dir.path().join("inventory.toml")).unwrap();
    assert!(inventory.contains("20230601"));
}

#[test]
fn test_missing_argument() {
    let dir = TmpDir::new("lid-policy-tool-args");
    let config = write_config(dir.path());
    assert!(!tool(&config, &["check-access-key"]).status.success());
}
