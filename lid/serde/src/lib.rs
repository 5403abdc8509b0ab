/*++

Licensed under the Apache-2.0 license.

File Name:

   lib.rs

Abstract:

    Marker LID serialization routines.

--*/
use anyhow::bail;
use marker_lid_types::*;
use std::io::Write;
use zerocopy::byteorder::big_endian::U32;
use zerocopy::IntoBytes;

/// Additional data field to emit
#[derive(Debug, Clone)]
pub enum AdfEntry {
    /// Version name record, e.g. `FW1020.04`
    Spnm(String),

    /// Firmware IP record with service pack flags and GA date
    Fipp { flags: u32, date: String },

    /// Arbitrary record; the size field is computed from the payload
    Raw {
        signature: AdfSignature,
        payload: Vec<u8>,
    },

    /// Zero-size record
    Terminator,
}

impl AdfEntry {
    fn encode(&self) -> anyhow::Result<Vec<u8>> {
        let mut body = Vec::new();
        let signature = match self {
            Self::Spnm(name) => {
                if name.len() > SPNM_NAME_LEN {
                    bail!("SPNM name {name:?} is longer than {SPNM_NAME_LEN} bytes");
                }
                let name_offset = ADF_HEADER_BYTE_SIZE + core::mem::size_of::<SpnmAdfHeader>();
                let sub_header = SpnmAdfHeader {
                    offset: U32::new(name_offset as u32),
                    size: U32::new(SPNM_NAME_LEN as u32),
                };
                body.extend_from_slice(sub_header.as_bytes());
                body.extend_from_slice(&padded(name.as_bytes(), SPNM_NAME_LEN + 1));
                ADF_SIGNATURE_SPNM
            }
            Self::Fipp { flags, date } => {
                if date.len() > FIPP_DATE_MAX_LEN {
                    bail!("FIPP date {date:?} is longer than {FIPP_DATE_MAX_LEN} bytes");
                }
                let flags_offset = ADF_HEADER_BYTE_SIZE + core::mem::size_of::<FippAdfHeader>();
                let sub_header = FippAdfHeader {
                    sp_flags_offset: U32::new(flags_offset as u32),
                    sp_flags_size: U32::new(4),
                    sp_date_offset: U32::new(flags_offset as u32 + 4),
                    sp_date_size: U32::new(FIPP_DATE_MAX_LEN as u32),
                };
                body.extend_from_slice(sub_header.as_bytes());
                body.extend_from_slice(&flags.to_be_bytes());
                body.extend_from_slice(&padded(date.as_bytes(), FIPP_DATE_MAX_LEN));
                ADF_SIGNATURE_FIPP
            }
            Self::Raw { signature, payload } => {
                body.extend_from_slice(payload);
                *signature
            }
            Self::Terminator => {
                return Ok(AdfHeader::default().as_bytes().to_vec());
            }
        };

        let header = AdfHeader {
            size: U32::new((ADF_HEADER_BYTE_SIZE + body.len()) as u32),
            signature,
        };
        let mut record = header.as_bytes().to_vec();
        record.extend_from_slice(&body);
        Ok(record)
    }
}

fn padded(bytes: &[u8], len: usize) -> Vec<u8> {
    let mut out = bytes.to_vec();
    out.resize(len, 0);
    out
}

/// Marker LID contents
#[derive(Debug, Default, Clone)]
pub struct MarkerLidImage {
    /// Header; the ADF offset is filled in by the writer
    pub header: MarkerLidHeader,

    /// Additional data fields, in file order
    pub entries: Vec<AdfEntry>,

    /// ADF count to record instead of `entries.len()`
    pub adf_count: Option<u32>,
}

impl MarkerLidImage {
    /// Create an image whose MI keyword is `mi_keyword`
    pub fn new(mi_keyword: &str) -> Self {
        let mut image = Self::default();
        let len = mi_keyword.len().min(MI_KEYWORD_BYTE_SIZE);
        image.header.mi_keyword[..len].copy_from_slice(&mi_keyword.as_bytes()[..len]);
        image.header.size_of_mi_keyword = U32::new(len as u32);
        image
    }

    pub fn push(&mut self, entry: AdfEntry) -> &mut Self {
        self.entries.push(entry);
        self
    }

    pub fn set_adf_count(&mut self, count: u32) -> &mut Self {
        self.adf_count = Some(count);
        self
    }

    /// Serialize into a byte vector
    pub fn to_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let mut buf = Vec::new();
        MarkerLidWriter::new(&mut buf).write(self)?;
        Ok(buf)
    }
}

/// Marker LID Writer
pub struct MarkerLidWriter<W: Write> {
    writer: W,
}

impl<W: Write> MarkerLidWriter<W> {
    /// Create an instance of `MarkerLidWriter`
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write the header, the ADF count and every ADF record
    pub fn write(&mut self, image: &MarkerLidImage) -> anyhow::Result<()> {
        let mut header = image.header;
        header.offset_to_additional_data_fields = U32::new(MARKER_LID_HEADER_BYTE_SIZE as u32);
        self.writer.write_all(header.as_bytes())?;

        let count = image.adf_count.unwrap_or(image.entries.len() as u32);
        self.writer.write_all(&count.to_be_bytes())?;

        for entry in &image.entries {
            self.writer.write_all(&entry.encode()?)?;
        }
        Ok(())
    }
}
