/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    Marker LID verification library: ADF walking, version and service pack
    extraction, and the Minimum Ship Level and Update Access Key policies.

--*/

mod adf;
mod env;
mod extract;
mod msl;
mod os_release;
mod store;
mod uak;
mod validator;

#[cfg(test)]
mod test_env;

use core::fmt;

pub use adf::{AdfReader, AdfRecord, AdfScan};
pub use env::SystemEnv;
pub use extract::{msl_version, pack_version, service_pack_info, spnm_version_name, ServicePackInfo};
pub use marker_lid_error::{ErrorCode, LidError, LidResult};
pub use marker_lid_types::{AdfSignature, MarkerLidHeader, ServicePackFlags};
pub use msl::{
    MinimumShipLevel, MslPolicy, VersionPattern, VersionTriple, BMC_VERSION_PURPOSE,
    DEFAULT_MSL_PATTERN, MSL_RESET_BASELINE, MSL_SET_BASELINE, MSL_VERSION_PREFIX,
};
pub use os_release::OsRelease;
pub use store::{FlashStore, ResetFlagFile};
pub use uak::{build_id, UakPolicy, UpdateAccessKey, EMERGENCY_BUILD_DATE};
pub use validator::LidValidator;

pub const MOTHERBOARD_FRU: &str = "/xyz/openbmc_project/inventory/system/chassis/motherboard";
pub const PANEL_FRU: &str = "/xyz/openbmc_project/inventory/system/chassis/panel0";

/// Minimum ship level keyword
pub const MSL_KEY: PolicyKey = PolicyKey::new(MOTHERBOARD_FRU, "VSYS", "FV");

/// Update access key expiration date on the motherboard
pub const UAK_KEY: PolicyKey = PolicyKey::new(MOTHERBOARD_FRU, "UTIL", "D8");

/// Update access key expiration date on the operator panel
pub const UAK_PANEL_KEY: PolicyKey = PolicyKey::new(PANEL_FRU, "UTIL", "D8");

/// Location of a policy value: inventory object, record and keyword
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct PolicyKey {
    pub fru: &'static str,
    pub record: &'static str,
    pub keyword: &'static str,
}

impl PolicyKey {
    pub const fn new(fru: &'static str, record: &'static str, keyword: &'static str) -> Self {
        Self {
            fru,
            record,
            keyword,
        }
    }
}

impl fmt::Display for PolicyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}.{}", self.fru, self.record, self.keyword)
    }
}

/// Persistent keyword store
pub trait KeywordStore {
    /// Read the raw value of `key`. A missing value reads as empty.
    fn read(&self, key: &PolicyKey) -> LidResult<Vec<u8>>;

    /// Replace the value of `key`
    fn write(&self, key: &PolicyKey, value: &[u8]) -> LidResult<()>;
}

/// Marker LID Verification Environment
pub trait LidVerificationEnv {
    /// Inventory (VPD) copy of the policy values
    fn inventory(&self) -> &dyn KeywordStore;

    /// Flash file copy of the policy values
    fn flash(&self) -> &dyn KeywordStore;

    /// Version of the running firmware
    fn running_version(&self) -> LidResult<String>;

    /// Extended version of the running firmware
    fn running_extended_version(&self) -> LidResult<String>;

    /// Whether a minimum ship level reset was requested
    fn reset_requested(&self) -> bool;

    /// Request a minimum ship level reset on the next update
    fn request_reset(&self) -> LidResult<()>;

    /// Drop a pending minimum ship level reset request
    fn clear_reset(&self) -> LidResult<()>;
}

/// A policy value is uninitialized when it is empty or starts with NUL,
/// whitespace or `'0'`. Uninitialized values disable the matching check.
pub fn is_uninitialized(value: &str) -> bool {
    match value.chars().next() {
        None => true,
        Some(c) => c == '\0' || c.is_whitespace() || c == '0',
    }
}

/// Decode a stored value, dropping trailing NUL and whitespace padding
pub fn normalize_value(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
        .to_string()
}

/// Read `key` from `store`. `None` when the store could not be reached.
pub(crate) fn read_value(store: &dyn KeywordStore, key: &PolicyKey) -> Option<String> {
    match store.read(key) {
        Ok(raw) => Some(normalize_value(&raw)),
        Err(err) => {
            log::info!("Error reading {key}: {err}");
            None
        }
    }
}

/// One copy of a policy value taking part in a sync
pub(crate) struct SyncLocation<'a> {
    pub name: &'static str,
    pub store: &'a dyn KeywordStore,
    pub key: PolicyKey,
    /// Pad written values with spaces up to this length
    pub pad_to: Option<usize>,
}

impl SyncLocation<'_> {
    fn write(&self, value: &str) -> LidResult<()> {
        let mut bytes = value.as_bytes().to_vec();
        if let Some(len) = self.pad_to {
            if bytes.len() < len {
                bytes.resize(len, b' ');
            }
        }
        self.store.write(&self.key, &bytes)
    }
}

/// Propagate the first initialized value (in `locations` order) to every
/// other reachable location holding a different value. Locations that
/// cannot be read are neither a source nor a target.
pub(crate) fn sync_locations(locations: &[SyncLocation<'_>]) {
    let values: Vec<Option<String>> = locations
        .iter()
        .map(|loc| read_value(loc.store, &loc.key))
        .collect();

    let source = locations
        .iter()
        .zip(values.iter())
        .find_map(|(loc, value)| match value {
            Some(v) if !is_uninitialized(v) => Some((loc, v.clone())),
            _ => None,
        });

    let Some((source, value)) = source else {
        log::debug!("No initialized copy to sync");
        return;
    };

    for (loc, current) in locations.iter().zip(values.iter()) {
        let Some(current) = current else {
            continue;
        };
        if core::ptr::eq(loc, source) || *current == value {
            continue;
        }
        log::info!(
            "Syncing {} value {value:?} from {} to {}",
            loc.key,
            source.name,
            loc.name
        );
        if let Err(err) = loc.write(&value) {
            log::error!("Error writing {} to {}: {err}", loc.key, loc.name);
        }
    }
}
