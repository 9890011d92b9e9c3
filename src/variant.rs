//! Variant descriptor records
//!
//! Each variant starts with length-prefixed identifier fields and an allele
//! list, followed immediately by the genotype payload. Parsing a descriptor
//! resolves where that payload lives and how long it is, so the scan loop can
//! hop straight to the next descriptor without touching probability data.

use std::io::{Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::compress::Compression;
use crate::error::{Error, Result, VariantError, WriteError};
use crate::genotypes::Genotypes;
use crate::header::{Header, Layout};

/// A single variant: identifying fields plus the lazily-decoded genotypes.
#[derive(Debug)]
pub struct Variant {
    /// Variant identifier
    pub varid: String,
    /// rsID identifier
    pub rsid: String,
    /// Chromosome label
    pub chrom: String,
    /// Base-pair position
    pub pos: u32,
    /// Allele strings, reference first
    pub alleles: Vec<String>,
    /// Absolute file offset of this descriptor
    pub offset: u64,
    /// Payload decoder and cache for this variant
    pub(crate) geno: Genotypes,
}

impl Variant {
    /// Parses the descriptor at the handle's current position and leaves the
    /// handle positioned at the next descriptor.
    ///
    /// # Errors
    ///
    /// Fails with `Eof` if the file ends mid-descriptor, or with
    /// `SampleCountMismatch` when a layout-1 record embeds a sample count
    /// that disagrees with the header.
    pub(crate) fn from_reader<R: Read + Seek>(handle: &mut R, header: &Header) -> Result<Self> {
        let offset = handle.stream_position()?;
        match Self::parse(handle, header, offset) {
            Err(Error::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Err(VariantError::Eof { offset }.into())
            }
            other => other,
        }
    }

    fn parse<R: Read + Seek>(handle: &mut R, header: &Header, offset: u64) -> Result<Self> {
        if header.layout == Layout::One {
            let count = handle.read_u32::<LittleEndian>()?;
            if count != header.nsamples {
                return Err(VariantError::SampleCountMismatch {
                    expected: header.nsamples,
                    found: count,
                }
                .into());
            }
        }

        let varid = read_string16(handle)?;
        let rsid = read_string16(handle)?;
        let chrom = read_string16(handle)?;
        let pos = handle.read_u32::<LittleEndian>()?;

        let n_alleles = match header.layout {
            Layout::One => 2,
            Layout::Two => handle.read_u16::<LittleEndian>()?,
        };
        if n_alleles < 2 {
            return Err(VariantError::TooFewAlleles(n_alleles).into());
        }

        let mut alleles = Vec::with_capacity(n_alleles as usize);
        for _ in 0..n_alleles {
            alleles.push(read_string32(handle)?);
        }

        // resolve the payload extent; only layout 1 without compression has
        // no length prefix
        let prefix_pos = handle.stream_position()?;
        let (data_offset, data_len) = match (header.layout, header.compression) {
            (Layout::One, Compression::Uncompressed) => {
                (prefix_pos, u64::from(header.nsamples) * 6)
            }
            _ => {
                let len = handle.read_u32::<LittleEndian>()?;
                (prefix_pos + 4, u64::from(len))
            }
        };
        let next_offset = data_offset + data_len;
        handle.seek(SeekFrom::Start(next_offset))?;

        let geno = Genotypes::new(
            header.layout,
            header.compression,
            n_alleles,
            header.nsamples,
            data_offset,
            data_len,
        );

        Ok(Self {
            varid,
            rsid,
            chrom,
            pos,
            alleles,
            offset,
            geno,
        })
    }

    /// Number of alleles at this variant.
    #[must_use]
    pub fn n_alleles(&self) -> u16 {
        self.alleles.len() as u16
    }

    /// Absolute file offset of the descriptor following this variant.
    #[must_use]
    pub fn next_offset(&self) -> u64 {
        self.geno.next_offset()
    }
}

/// Writes the descriptor fields for one variant (everything up to, but not
/// including, the genotype payload).
pub(crate) fn write_descriptor<W: Write>(
    writer: &mut W,
    layout: Layout,
    varid: &str,
    rsid: &str,
    chrom: &str,
    pos: u32,
    alleles: &[String],
) -> Result<()> {
    if layout == Layout::One && alleles.len() != 2 {
        return Err(WriteError::BiallelicLayout(alleles.len() as u16).into());
    }

    write_string16(writer, varid)?;
    write_string16(writer, rsid)?;
    write_string16(writer, chrom)?;
    writer.write_u32::<LittleEndian>(pos)?;

    if layout == Layout::Two {
        writer.write_u16::<LittleEndian>(alleles.len() as u16)?;
    }
    for allele in alleles {
        writer.write_u32::<LittleEndian>(allele.len() as u32)?;
        writer.write_all(allele.as_bytes())?;
    }
    Ok(())
}

fn read_string16<R: Read>(handle: &mut R) -> Result<String> {
    let len = handle.read_u16::<LittleEndian>()?;
    let mut buf = vec![0u8; len as usize];
    handle.read_exact(&mut buf)?;
    Ok(std::str::from_utf8(&buf)?.to_owned())
}

fn read_string32<R: Read>(handle: &mut R) -> Result<String> {
    let len = handle.read_u32::<LittleEndian>()?;
    let mut buf = vec![0u8; len as usize];
    handle.read_exact(&mut buf)?;
    Ok(std::str::from_utf8(&buf)?.to_owned())
}

fn write_string16<W: Write>(writer: &mut W, value: &str) -> Result<()> {
    writer.write_u16::<LittleEndian>(value.len() as u16)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn layout2_header(compression: Compression) -> Header {
        Header {
            offset: 20,
            nvariants: 1,
            nsamples: 3,
            compression,
            layout: Layout::Two,
            has_sample_ids: false,
            free_text: String::new(),
        }
    }

    fn layout1_header(compression: Compression) -> Header {
        Header {
            layout: Layout::One,
            ..layout2_header(compression)
        }
    }

    /// Serializes a descriptor followed by a dummy payload region.
    fn descriptor_bytes(header: &Header, payload: &[u8], prefix: Option<u32>) -> Vec<u8> {
        let mut buf = Vec::new();
        if header.layout == Layout::One {
            buf.extend_from_slice(&header.nsamples.to_le_bytes());
        }
        write_descriptor(
            &mut buf,
            header.layout,
            "var1",
            "rs42",
            "21",
            12345,
            &["A".to_owned(), "GT".to_owned()],
        )
        .unwrap();
        if let Some(len) = prefix {
            buf.extend_from_slice(&len.to_le_bytes());
        }
        buf.extend_from_slice(payload);
        buf
    }

    #[test]
    fn test_parse_layout2_uncompressed() {
        let header = layout2_header(Compression::Uncompressed);
        let payload = vec![0u8; 40];
        let buf = descriptor_bytes(&header, &payload, Some(40));
        let mut cursor = Cursor::new(&buf);

        let variant = Variant::from_reader(&mut cursor, &header).unwrap();
        assert_eq!(variant.varid, "var1");
        assert_eq!(variant.rsid, "rs42");
        assert_eq!(variant.chrom, "21");
        assert_eq!(variant.pos, 12345);
        assert_eq!(variant.alleles, vec!["A", "GT"]);
        assert_eq!(variant.n_alleles(), 2);
        assert_eq!(variant.next_offset(), buf.len() as u64);
        assert_eq!(cursor.position(), buf.len() as u64);
    }

    #[test]
    fn test_parse_layout1_uncompressed_has_no_prefix() {
        let header = layout1_header(Compression::Uncompressed);
        // fixed payload of 6 bytes per sample
        let payload = vec![0u8; 18];
        let buf = descriptor_bytes(&header, &payload, None);
        let mut cursor = Cursor::new(&buf);

        let variant = Variant::from_reader(&mut cursor, &header).unwrap();
        assert_eq!(variant.next_offset(), buf.len() as u64);
    }

    #[test]
    fn test_parse_layout1_compressed_prefix() {
        let header = layout1_header(Compression::Zlib);
        let payload = vec![0u8; 11];
        let buf = descriptor_bytes(&header, &payload, Some(11));
        let mut cursor = Cursor::new(&buf);

        let variant = Variant::from_reader(&mut cursor, &header).unwrap();
        assert_eq!(variant.next_offset(), buf.len() as u64);
    }

    #[test]
    fn test_layout1_sample_count_mismatch() {
        let header = layout1_header(Compression::Uncompressed);
        let payload = vec![0u8; 18];
        let mut buf = descriptor_bytes(&header, &payload, None);
        // corrupt the embedded count
        buf[0..4].copy_from_slice(&7u32.to_le_bytes());
        let err = Variant::from_reader(&mut Cursor::new(&buf), &header).unwrap_err();
        assert!(matches!(
            err,
            Error::VariantError(VariantError::SampleCountMismatch {
                expected: 3,
                found: 7
            })
        ));
    }

    #[test]
    fn test_truncated_descriptor_is_eof() {
        let header = layout2_header(Compression::Uncompressed);
        let payload = vec![0u8; 40];
        let buf = descriptor_bytes(&header, &payload, Some(40));
        let err = Variant::from_reader(&mut Cursor::new(&buf[..10]), &header).unwrap_err();
        assert!(matches!(
            err,
            Error::VariantError(VariantError::Eof { offset: 0 })
        ));
    }

    #[test]
    fn test_empty_identifier_fields() {
        let header = layout2_header(Compression::Uncompressed);
        let mut buf = Vec::new();
        write_descriptor(
            &mut buf,
            Layout::Two,
            "",
            "",
            "",
            0,
            &[String::new(), String::new()],
        )
        .unwrap();
        buf.extend_from_slice(&0u32.to_le_bytes());

        let variant = Variant::from_reader(&mut Cursor::new(&buf), &header).unwrap();
        assert_eq!(variant.varid, "");
        assert_eq!(variant.alleles, vec!["", ""]);
    }

    #[test]
    fn test_write_descriptor_rejects_layout1_triallelic() {
        let mut buf = Vec::new();
        let alleles = vec!["A".to_owned(), "C".to_owned(), "T".to_owned()];
        let err =
            write_descriptor(&mut buf, Layout::One, "v", "r", "1", 1, &alleles).unwrap_err();
        assert!(matches!(
            err,
            Error::WriteError(WriteError::BiallelicLayout(3))
        ));
    }

    #[test]
    fn test_parse_multiallelic_layout2() {
        let header = layout2_header(Compression::Uncompressed);
        let mut buf = Vec::new();
        let alleles: Vec<String> = ["A", "C", "G", "T"].iter().map(|s| s.to_string()).collect();
        write_descriptor(&mut buf, Layout::Two, "v", "r", "1", 99, &alleles).unwrap();
        buf.extend_from_slice(&0u32.to_le_bytes());

        let variant = Variant::from_reader(&mut Cursor::new(&buf), &header).unwrap();
        assert_eq!(variant.n_alleles(), 4);
        assert_eq!(variant.alleles, alleles);
    }
}
