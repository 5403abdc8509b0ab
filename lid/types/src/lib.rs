/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    File contains data structures for the IBM Marker LID container.

    All multi-byte integers in a Marker LID are big-endian.

--*/

use core::fmt;

use zerocopy::byteorder::big_endian::U32;
use zerocopy::{FromBytes, FromZeros, Immutable, IntoBytes, KnownLayout, Unaligned};

pub const MI_KEYWORD_BYTE_SIZE: usize = 40;
pub const FIX_LEVEL_BYTE_SIZE: usize = 3;
pub const MARKER_LID_HEADER_BYTE_SIZE: usize = core::mem::size_of::<MarkerLidHeader>();
pub const ADF_HEADER_BYTE_SIZE: usize = core::mem::size_of::<AdfHeader>();

/// Visible characters of an SPNM version name (`FWxxxx.yy`)
pub const SPNM_NAME_LEN: usize = 9;

/// Upper bound on the FIPP service pack date field
pub const FIPP_DATE_MAX_LEN: usize = 9;

pub const ADF_SIGNATURE_SPNM: AdfSignature = AdfSignature(*b"SPNM");
pub const ADF_SIGNATURE_FIPP: AdfSignature = AdfSignature(*b"FIPP");
pub const ADF_SIGNATURE_I5FX: AdfSignature = AdfSignature(*b"I5FX");
pub const ADF_SIGNATURE_HMCV: AdfSignature = AdfSignature(*b"HMCV");
pub const ADF_SIGNATURE_SECV: AdfSignature = AdfSignature(*b"SECV");

pub type FixLevel = [u8; FIX_LEVEL_BYTE_SIZE];

/// Four ASCII bytes identifying an additional data field.
///
/// Compared as raw bytes in file order, never byte swapped.
#[repr(transparent)]
#[derive(
    FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned, Default, Copy, Clone, Eq, PartialEq,
)]
pub struct AdfSignature(pub [u8; 4]);

impl fmt::Debug for AdfSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AdfSignature({self})")
    }
}

impl fmt::Display for AdfSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            if b.is_ascii_graphic() {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{b:02x}")?;
            }
        }
        Ok(())
    }
}

/// Marker LID header found at offset 0 of the file
#[repr(C)]
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned, Debug, Copy, Clone)]
pub struct MarkerLidHeader {
    pub version_id: U32,
    pub offset_to_mi_keyword_section: U32,
    pub offset_to_iseries_marker: U32,
    pub size_of_mi_keyword: U32,
    pub mi_keyword: [u8; MI_KEYWORD_BYTE_SIZE],
    pub last_disruptive_apply_fix_level: FixLevel,
    pub last_disruptive_activation_fsp: FixLevel,
    pub last_disruptive_activation_phyp: FixLevel,
    pub last_disruptive_activation_pfw: FixLevel,
    pub last_changed_fix_level_fsp: FixLevel,
    pub last_changed_fix_level_phyp: FixLevel,
    pub last_changed_fix_level_pfw: FixLevel,
    pub reserved: FixLevel,
    pub offset_to_additional_data_fields: U32,
}

impl Default for MarkerLidHeader {
    fn default() -> Self {
        Self::new_zeroed()
    }
}

impl MarkerLidHeader {
    /// File offset of the ADF count
    pub fn adf_offset(&self) -> u64 {
        u64::from(self.offset_to_additional_data_fields.get())
    }

    /// MI keyword with trailing NUL and space padding removed
    pub fn mi_keyword(&self) -> &[u8] {
        let end = self
            .mi_keyword
            .iter()
            .rposition(|b| *b != 0 && *b != b' ')
            .map_or(0, |i| i + 1);
        &self.mi_keyword[..end]
    }
}

/// Leading fields shared by every additional data field.
///
/// `size` covers the whole record, including these eight bytes.
#[repr(C)]
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned, Default, Debug, Copy, Clone)]
pub struct AdfHeader {
    pub size: U32,
    pub signature: AdfSignature,
}

/// SPNM sub-header. `offset` is relative to the start of the record.
#[repr(C)]
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned, Default, Debug, Copy, Clone)]
pub struct SpnmAdfHeader {
    pub offset: U32,
    pub size: U32,
}

/// FIPP (firmware IP) sub-header. Offsets are relative to the start of the record.
#[repr(C)]
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned, Default, Debug, Copy, Clone)]
pub struct FippAdfHeader {
    pub sp_flags_offset: U32,
    pub sp_flags_size: U32,
    pub sp_date_offset: U32,
    pub sp_date_size: U32,
}

bitflags::bitflags! {
    /// Service pack flags carried by the FIPP record
    #[derive(Default, Copy, Clone, Debug, Eq, PartialEq)]
    pub struct ServicePackFlags : u32 {
        /// HIPER / one-off emergency service pack
        const ONE_OFF = 0x4000_0000;
    }
}

impl ServicePackFlags {
    /// Raw flags as stored in the LID; unknown bits are kept
    pub fn from_raw(raw: u32) -> Self {
        Self::from_bits_retain(raw)
    }

    pub fn is_one_off(&self) -> bool {
        self.contains(Self::ONE_OFF)
    }
}
