/*++

Licensed under the Apache-2.0 license.

File Name:

    extract.rs

Abstract:

    File contains the SPNM and FIPP record decoders.

--*/

use crate::*;
use getset::{CopyGetters, Getters};
use marker_lid_types::*;
use regex::Regex;
use std::sync::LazyLock;

static PACK_VERSION_RE: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"FW(\d+\.\d{2})"));

/// Service pack metadata carried by a FIPP record
#[derive(Debug, Clone, Eq, PartialEq, CopyGetters, Getters)]
pub struct ServicePackInfo {
    /// GA date, copied verbatim
    #[getset(get = "pub")]
    ga_date: String,

    #[getset(get_copy = "pub")]
    flags: ServicePackFlags,
}

impl ServicePackInfo {
    pub fn is_one_off(&self) -> bool {
        self.flags.is_one_off()
    }
}

fn until_nul(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Version name (`FWxxxx.yy`) of an SPNM record
pub fn spnm_version_name(record: &AdfRecord) -> LidResult<String> {
    let header: SpnmAdfHeader = record.read_struct(ADF_HEADER_BYTE_SIZE)?;
    let name = record.bytes(header.offset.get() as usize, SPNM_NAME_LEN)?;
    Ok(until_nul(name))
}

/// Reshape an SPNM version name into the minimum ship level form.
///
/// `FW1020.04` becomes `fw1020.04-99`. LIDs carry no revision, so `99` sorts
/// above any revision used as a minimum.
pub fn msl_version(name: &str) -> Option<String> {
    let rest = name.get(2..)?;
    Some(format!("fw{rest}-99"))
}

/// Service pack flags and GA date of a FIPP record.
///
/// The flags and the date directly follow the sub-header. Its offset fields
/// are not consulted, as producers disagree on what they are relative to.
pub fn service_pack_info(record: &AdfRecord) -> LidResult<ServicePackInfo> {
    let flags_offset = ADF_HEADER_BYTE_SIZE + core::mem::size_of::<FippAdfHeader>();
    let raw_flags = record.read_u32(flags_offset)?;
    let date_offset = flags_offset + 4;
    let date_len = record
        .data()
        .len()
        .saturating_sub(date_offset)
        .min(FIPP_DATE_MAX_LEN);
    let date = record.bytes(date_offset, date_len)?;
    Ok(ServicePackInfo {
        ga_date: until_nul(date),
        flags: ServicePackFlags::from_raw(raw_flags),
    })
}

/// Pack version (`xxxx.yy`) named by the MI keyword, used for the
/// entitlement bypass. Independent of the SPNM version name.
pub fn pack_version(mi_keyword: &[u8]) -> Option<String> {
    let re = match PACK_VERSION_RE.as_ref() {
        Ok(re) => re,
        Err(err) => {
            log::error!("Pack version pattern: {err}");
            return None;
        }
    };
    let keyword = String::from_utf8_lossy(mi_keyword);
    re.captures(&keyword)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
