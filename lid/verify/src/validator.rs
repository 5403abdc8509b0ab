/*++

Licensed under the Apache-2.0 license.

File Name:

    validator.rs

Abstract:

    File contains the Marker LID validator run before a host firmware
    update is accepted.

--*/

use crate::*;
use marker_lid_types::*;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

/// Marker LID Validator
pub struct LidValidator<Env: LidVerificationEnv> {
    /// Verification Environment
    env: Env,

    msl: MslPolicy,

    uak: UakPolicy,
}

impl<Env: LidVerificationEnv> LidValidator<Env> {
    /// Create a new instance `LidValidator`
    ///
    /// # Arguments
    ///
    /// * `env` - Environment
    /// * `msl` - Minimum ship level settings
    /// * `uak` - Update access key settings
    pub fn new(env: Env, msl: MslPolicy, uak: UakPolicy) -> Self {
        Self { env, msl, uak }
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    pub fn minimum_ship_level(&self) -> MinimumShipLevel<'_, Env> {
        MinimumShipLevel::new(&self.env, &self.msl)
    }

    pub fn update_access_key(&self) -> UpdateAccessKey<'_, Env> {
        UpdateAccessKey::new(&self.env, &self.uak)
    }

    /// Validate the Marker LID at `path`
    ///
    /// # Returns
    ///
    /// * `Err(BelowMinimumShipLevel)` or `Err(ExpiredAccessKey)` when the
    ///   update must be rejected. Unreadable or malformed files skip the checks.
    pub fn validate(&self, path: &Path) -> LidResult<()> {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(err) => {
                log::warn!("Unable to open Marker LID {}: {err}", path.display());
                return Ok(());
            }
        };
        log::info!("Validating Marker LID {}", path.display());
        self.validate_reader(BufReader::new(file))
    }

    /// Validate a Marker LID read from `reader`
    pub fn validate_reader<R: Read + Seek>(&self, reader: R) -> LidResult<()> {
        let mut lid = match AdfReader::new(reader) {
            Ok(lid) => lid,
            Err(err) => {
                log::warn!("Unable to read Marker LID header: {err}");
                return Ok(());
            }
        };

        let pack_version = pack_version(lid.header().mi_keyword()).unwrap_or_default();

        for record in lid.scan_any(&[ADF_SIGNATURE_SPNM, ADF_SIGNATURE_FIPP]) {
            let record = match record {
                Ok(record) => record,
                Err(err) => {
                    log::warn!("Marker LID scan stopped: {err}");
                    break;
                }
            };
            if record.signature() == ADF_SIGNATURE_SPNM {
                self.check_version_name(&record)?;
            } else {
                self.check_service_pack(&record, &pack_version)?;
            }
        }
        Ok(())
    }

    /// Minimum ship level check on the SPNM version name
    fn check_version_name(&self, record: &AdfRecord) -> LidResult<()> {
        let name = match spnm_version_name(record) {
            Ok(name) => name,
            Err(err) => {
                log::warn!("Unable to decode SPNM record: {err}");
                return Ok(());
            }
        };

        // A pending reset would store the synthetic revision as the new minimum
        if self.env.reset_requested() {
            log::info!("Minimum Ship Level reset pending, skipping check of {name}");
            return Ok(());
        }

        let Some(pattern) = &self.msl.pattern else {
            return Ok(());
        };
        let Some(version) = msl_version(&name) else {
            return Ok(());
        };
        if pattern.matched(&version).is_none() {
            log::debug!("Version {version} does not match {}", pattern.as_str());
            return Ok(());
        }
        self.minimum_ship_level().verify(&version)
    }

    /// Update access key check on the FIPP service pack
    fn check_service_pack(&self, record: &AdfRecord, pack_version: &str) -> LidResult<()> {
        if !self.uak.enabled {
            return Ok(());
        }
        let info = match service_pack_info(record) {
            Ok(info) => info,
            Err(err) => {
                log::warn!("Unable to decode FIPP record: {err}");
                return Ok(());
            }
        };
        log::info!(
            "Service pack {pack_version} GA date {} one-off {}",
            info.ga_date(),
            info.is_one_off()
        );
        self.update_access_key()
            .verify(info.ga_date(), pack_version, info.is_one_off())
    }
}
