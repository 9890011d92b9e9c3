//! Header codec for BGEN files
//!
//! The header occupies the first `header_length + 4` bytes of the file:
//! a `u32` locating the first variant, four `u32`/magic fields, optional
//! free-form text, and a 32-bit flag word packing the compression scheme
//! (bits 0-1), the layout version (bits 2-5) and the sample-block presence
//! flag (bit 31). All fields are little-endian.

use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::compress::Compression;
use crate::error::{HeaderError, Result};

/// Magic bytes written by this library.
pub const MAGIC: &[u8; 4] = b"bgen";

/// Magic bytes emitted by some historical producers, accepted on read.
pub const MAGIC_LEGACY: &[u8; 4] = b"0000";

/// Number of fixed bytes in the header block (excluding the leading offset).
pub const SIZE_FIXED_HEADER: u32 = 20;

/// Probability payload layout version, as encoded in bits 2-5 of the flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// 16-bit scaled genotype triples, diploid biallelic only
    One,
    /// Bit-packed probabilities with per-sample ploidy and phasing
    #[default]
    Two,
}

impl Layout {
    /// Decodes the layout from its flag bits.
    ///
    /// # Errors
    ///
    /// Fails with `UnsupportedLayout` for anything other than 1 or 2.
    pub fn from_flag(bits: u8) -> Result<Self> {
        match bits {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            x => Err(HeaderError::UnsupportedLayout(x).into()),
        }
    }

    /// The layout's flag-bit value.
    #[must_use]
    pub fn flag(&self) -> u32 {
        match self {
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

/// Parsed BGEN file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Stored first-variant locator; the absolute file offset of the first
    /// variant is this value plus four (the locator itself sits after the
    /// leading `u32`)
    pub offset: u32,

    /// Number of variant records in the file
    pub nvariants: u32,

    /// Number of samples covered by every variant
    pub nsamples: u32,

    /// Payload compression scheme
    pub compression: Compression,

    /// Probability payload layout
    pub layout: Layout,

    /// Whether a sample identifier block follows the header
    pub has_sample_ids: bool,

    /// Free-form text carried between the fixed fields and the flag word
    pub free_text: String,
}

impl Header {
    /// Parses a header from the start of a reader.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// * the magic bytes are not `"bgen"` or `"0000"`
    /// * the layout or compression flag bits carry unsupported values
    /// * layout 1 is combined with zstd compression
    /// * the declared header length is shorter than the fixed fields
    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let offset = reader.read_u32::<LittleEndian>()?;
        let header_length = reader.read_u32::<LittleEndian>()?;
        let nvariants = reader.read_u32::<LittleEndian>()?;
        let nsamples = reader.read_u32::<LittleEndian>()?;

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC && &magic != MAGIC_LEGACY {
            return Err(HeaderError::BadMagic(magic).into());
        }

        if header_length < SIZE_FIXED_HEADER {
            return Err(HeaderError::HeaderLengthTooShort(header_length).into());
        }
        let mut free = vec![0u8; (header_length - SIZE_FIXED_HEADER) as usize];
        reader.read_exact(&mut free)?;
        let free_text = std::str::from_utf8(&free)?.to_owned();

        let flags = reader.read_u32::<LittleEndian>()?;
        let compression = Compression::from_flag((flags & 0b11) as u8)?;
        let layout = Layout::from_flag(((flags >> 2) & 0b1111) as u8)?;
        let has_sample_ids = (flags >> 31) & 1 == 1;

        if layout == Layout::One && compression == Compression::Zstd {
            return Err(HeaderError::ZstdWithLayoutOne.into());
        }

        Ok(Self {
            offset,
            nvariants,
            nsamples,
            compression,
            layout,
            has_sample_ids,
            free_text,
        })
    }

    /// Writes the header block, including the leading offset locator.
    ///
    /// # Errors
    ///
    /// Surfaces I/O errors from the underlying writer.
    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.offset)?;
        writer.write_u32::<LittleEndian>(self.header_length())?;
        writer.write_u32::<LittleEndian>(self.nvariants)?;
        writer.write_u32::<LittleEndian>(self.nsamples)?;
        writer.write_all(MAGIC)?;
        writer.write_all(self.free_text.as_bytes())?;
        writer.write_u32::<LittleEndian>(self.flags_word())?;
        Ok(())
    }

    /// Length of the header block in bytes (fixed fields plus free text).
    #[must_use]
    pub fn header_length(&self) -> u32 {
        SIZE_FIXED_HEADER + self.free_text.len() as u32
    }

    /// Absolute byte offset of the first variant descriptor.
    #[must_use]
    pub fn first_variant_offset(&self) -> u64 {
        u64::from(self.offset) + 4
    }

    /// Assembles the 32-bit flag word from the typed fields.
    #[must_use]
    pub fn flags_word(&self) -> u32 {
        let mut flags = self.compression.flag();
        flags |= self.layout.flag() << 2;
        flags |= u32::from(self.has_sample_ids) << 31;
        flags
    }
}
