/*++

Licensed under the Apache-2.0 license.

File Name:

    adf.rs

Abstract:

    File contains the Additional Data Field walker for Marker LIDs.

--*/

use crate::*;
use getset::{CopyGetters, Getters};
use marker_lid_types::*;
use std::io::{Read, Seek, SeekFrom};
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// One additional data field located by a scan
#[derive(Debug, Clone, CopyGetters, Getters)]
pub struct AdfRecord {
    /// File offset of the record's size field
    #[getset(get_copy = "pub")]
    start: u64,

    /// Record size, including the size and signature fields
    #[getset(get_copy = "pub")]
    size: u32,

    #[getset(get_copy = "pub")]
    signature: AdfSignature,

    /// Whole record, starting at the size field
    #[getset(get = "pub")]
    data: Vec<u8>,
}

impl AdfRecord {
    /// Bytes following the signature
    pub fn payload(&self) -> &[u8] {
        &self.data[ADF_HEADER_BYTE_SIZE.min(self.data.len())..]
    }

    /// `len` bytes at a record-relative `offset`
    pub fn bytes(&self, offset: usize, len: usize) -> LidResult<&[u8]> {
        let available = self.data.len().saturating_sub(offset);
        if available < len {
            return Err(LidError::TruncatedRecord {
                offset: self.start + offset as u64,
                expected: len,
                actual: available,
            });
        }
        Ok(&self.data[offset..offset + len])
    }

    /// Big-endian `u32` at a record-relative `offset`
    pub fn read_u32(&self, offset: usize) -> LidResult<u32> {
        let bytes = self.bytes(offset, 4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Structure at a record-relative `offset`
    pub fn read_struct<T: FromBytes + KnownLayout + Immutable>(
        &self,
        offset: usize,
    ) -> LidResult<T> {
        let bytes = self.bytes(offset, core::mem::size_of::<T>())?;
        T::read_from_bytes(bytes).map_err(|_| LidError::MalformedAdf {
            offset: self.start + offset as u64,
        })
    }
}

/// Marker LID reader
///
/// Holds one seekable handle for its whole lifetime. Every scan restarts
/// from the ADF count, so scans may be repeated.
pub struct AdfReader<R> {
    reader: R,
    header: MarkerLidHeader,
}

impl<R: Read + Seek> AdfReader<R> {
    /// Create an `AdfReader`, reading the header at offset 0
    pub fn new(mut reader: R) -> LidResult<Self> {
        let header = read_struct_at::<_, MarkerLidHeader>(&mut reader, 0)?;
        Ok(Self { reader, header })
    }

    pub fn header(&self) -> &MarkerLidHeader {
        &self.header
    }

    /// Every record, in file order
    pub fn records(&mut self) -> AdfScan<'_, R> {
        AdfScan::new(self, Vec::new())
    }

    /// Records whose signature is `signature`
    pub fn scan(&mut self, signature: AdfSignature) -> AdfScan<'_, R> {
        AdfScan::new(self, vec![signature])
    }

    /// Records whose signature is any of `signatures`
    pub fn scan_any(&mut self, signatures: &[AdfSignature]) -> AdfScan<'_, R> {
        AdfScan::new(self, signatures.to_vec())
    }

    /// Big-endian `u32` at an absolute file offset
    pub fn read_u32_at(&mut self, offset: u64) -> LidResult<u32> {
        let mut bytes = [0u8; 4];
        read_exact_at(&mut self.reader, offset, &mut bytes)?;
        Ok(u32::from_be_bytes(bytes))
    }

    fn read_adf_header(&mut self, offset: u64) -> LidResult<AdfHeader> {
        read_struct_at(&mut self.reader, offset)
    }

    fn read_record(&mut self, start: u64, header: &AdfHeader) -> LidResult<AdfRecord> {
        let size = header.size.get();
        seek(&mut self.reader, start)?;
        let mut data = Vec::new();
        (&mut self.reader)
            .take(u64::from(size))
            .read_to_end(&mut data)
            .map_err(|_| LidError::MalformedAdf { offset: start })?;
        if data.len() < size as usize {
            return Err(LidError::TruncatedRecord {
                offset: start,
                expected: size as usize,
                actual: data.len(),
            });
        }
        Ok(AdfRecord {
            start,
            size,
            signature: header.signature,
            data,
        })
    }
}

fn seek<R: Seek>(reader: &mut R, offset: u64) -> LidResult<()> {
    reader
        .seek(SeekFrom::Start(offset))
        .map(|_| ())
        .map_err(|_| LidError::MalformedAdf { offset })
}

/// Fill `buf` from `offset`. A short read is reported, never padded.
fn read_exact_at<R: Read + Seek>(reader: &mut R, offset: u64, buf: &mut [u8]) -> LidResult<()> {
    seek(reader, offset)?;
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(_) => break,
        }
    }
    if filled < buf.len() {
        return Err(LidError::TruncatedRecord {
            offset,
            expected: buf.len(),
            actual: filled,
        });
    }
    Ok(())
}

fn read_struct_at<R: Read + Seek, T: FromBytes + KnownLayout + Immutable>(
    reader: &mut R,
    offset: u64,
) -> LidResult<T> {
    let mut buf = vec![0u8; core::mem::size_of::<T>()];
    read_exact_at(reader, offset, &mut buf)?;
    T::read_from_bytes(&buf).map_err(|_| LidError::MalformedAdf { offset })
}

/// Lazy walk over the ADF list
///
/// The loop counter is 8 bits wide and compared against the 32-bit ADF
/// count, as LIDs in the field were produced against that bound. With a
/// count above 255 the counter wraps and the walk ends only at a zero-size
/// record or the end of the file.
///
/// The first error ends the walk.
pub struct AdfScan<'a, R> {
    lid: &'a mut AdfReader<R>,
    filter: Vec<AdfSignature>,
    count: Option<u32>,
    index: u8,
    next: u64,
    done: bool,
}

impl<'a, R: Read + Seek> AdfScan<'a, R> {
    fn new(lid: &'a mut AdfReader<R>, filter: Vec<AdfSignature>) -> Self {
        let next = lid.header.adf_offset();
        Self {
            lid,
            filter,
            count: None,
            index: 0,
            next,
            done: false,
        }
    }

    fn wanted(&self, signature: AdfSignature) -> bool {
        self.filter.is_empty() || self.filter.contains(&signature)
    }

    fn step(&mut self) -> LidResult<Option<AdfRecord>> {
        loop {
            let count = match self.count {
                Some(count) => count,
                None => {
                    let base = self.lid.header.adf_offset();
                    let count = self.lid.read_u32_at(base)?;
                    if count > u32::from(u8::MAX) {
                        log::warn!("ADF count {count} exceeds the 8-bit walk counter");
                    }
                    self.count = Some(count);
                    self.next = base + 4;
                    count
                }
            };

            if u32::from(self.index) >= count {
                return Ok(None);
            }

            let start = self.next;
            let header = self.lid.read_adf_header(start)?;
            let size = header.size.get();
            if size == 0 {
                log::debug!("Zero-size ADF at {start:#x}, ending walk");
                return Ok(None);
            }
            if (size as usize) < ADF_HEADER_BYTE_SIZE {
                return Err(LidError::MalformedAdf { offset: start });
            }

            self.next = start + u64::from(size);
            self.index = self.index.wrapping_add(1);

            if self.wanted(header.signature) {
                return self.lid.read_record(start, &header).map(Some);
            }
        }
    }
}

impl<R: Read + Seek> Iterator for AdfScan<'_, R> {
    type Item = LidResult<AdfRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}
