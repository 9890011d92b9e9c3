//! Uniform decode/encode over the payload compression schemes
//!
//! BGEN genotype payloads are stored raw, zlib-wrapped DEFLATE, or zstd.
//! The decompressed length is always known in advance (from the header for
//! layout 1, from the payload prefix for layout 2), so decoding validates
//! the produced size instead of trusting the stream to terminate correctly.

use std::io::{Read, Write};

use flate2::Compression as ZlibLevel;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use zstd::stream::{copy_decode, copy_encode};

use crate::error::{GenotypeError, HeaderError, Result};

/// Default zstd compression level used on write.
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// Payload compression scheme, as encoded in bits 0-1 of the header flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Payloads are stored raw
    Uncompressed,
    /// Payloads are DEFLATE streams with the standard zlib wrapper
    #[default]
    Zlib,
    /// Payloads are zstandard frames
    Zstd,
}

impl Compression {
    /// Decodes the scheme from the low flag bits.
    ///
    /// # Errors
    ///
    /// Fails with `UnsupportedCompression` for values above 2.
    pub fn from_flag(bits: u8) -> Result<Self> {
        match bits {
            0 => Ok(Self::Uncompressed),
            1 => Ok(Self::Zlib),
            2 => Ok(Self::Zstd),
            x => Err(HeaderError::UnsupportedCompression(x).into()),
        }
    }

    /// The scheme's flag-bit value.
    #[must_use]
    pub fn flag(&self) -> u32 {
        match self {
            Self::Uncompressed => 0,
            Self::Zlib => 1,
            Self::Zstd => 2,
        }
    }
}

/// Decompresses `src` into a buffer of exactly `dst_len` bytes.
///
/// For [`Compression::Uncompressed`] this copies; `dst_len` is then simply
/// the source length. For the real schemes, `dst_len` is the producer's
/// declared decompressed length and disagreement is an error.
///
/// # Errors
///
/// Fails with `CompressionSize` when the produced length differs from
/// `dst_len`, or surfaces the codec's I/O error on a corrupt stream.
pub fn decompress(scheme: Compression, src: &[u8], dst_len: usize) -> Result<Vec<u8>> {
    let dst = match scheme {
        Compression::Uncompressed => src.to_vec(),
        Compression::Zlib => {
            let mut dst = Vec::with_capacity(dst_len);
            ZlibDecoder::new(src).read_to_end(&mut dst)?;
            dst
        }
        Compression::Zstd => {
            let mut dst = Vec::with_capacity(dst_len);
            copy_decode(src, &mut dst)?;
            dst
        }
    };
    if dst.len() != dst_len {
        return Err(GenotypeError::CompressionSize {
            expected: dst_len,
            found: dst.len(),
        }
        .into());
    }
    Ok(dst)
}

/// Compresses `src` with the given scheme.
///
/// [`Compression::Uncompressed`] copies; zlib uses its default settings and
/// zstd the crate default level.
pub fn compress(scheme: Compression, src: &[u8]) -> Result<Vec<u8>> {
    match scheme {
        Compression::Uncompressed => Ok(src.to_vec()),
        Compression::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), ZlibLevel::default());
            encoder.write_all(src)?;
            Ok(encoder.finish()?)
        }
        Compression::Zstd => {
            let mut dst = Vec::new();
            copy_encode(src, &mut dst, DEFAULT_ZSTD_LEVEL)?;
            Ok(dst)
        }
    }
}
