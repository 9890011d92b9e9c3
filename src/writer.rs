//! Writing of BGEN files
//!
//! A [`BgenWriter`] is configured through [`BgenWriterBuilder`], emits one
//! descriptor plus one genotype payload per variant, and backpatches the
//! variant count and first-variant offset into the header on [`finish`].
//!
//! [`finish`]: BgenWriter::finish

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use log::debug;

use crate::compress::{Compression, compress};
use crate::encode::{encode_layout1, encode_layout2};
use crate::error::{HeaderError, Result, WriteError};
use crate::header::{Header, Layout};
use crate::samples::Samples;
use crate::variant::write_descriptor;

/// File offset of the `nvariants` field inside the header.
const NVARIANTS_OFFSET: u64 = 8;

/// A builder for creating configured [`BgenWriter`] instances
///
/// # Examples
///
/// ```no_run
/// use bgen::{BgenWriterBuilder, Compression, Layout, Result};
///
/// fn main() -> Result<()> {
///     let mut writer = BgenWriterBuilder::default()
///         .compression(Compression::Zlib)
///         .layout(Layout::Two)
///         .free_text("study batch 7")
///         .samples(&["NA001".to_owned(), "NA002".to_owned()])
///         .create("out.bgen", 2)?;
///
///     writer.write_variant("v1", "rs1", "1", 5000, &["A".to_owned(), "C".to_owned()], 2)?;
///     writer.write_genotypes_constant(2, &[0.1, 0.8, 0.1, 1.0, 0.0, 0.0], 2, false, 8)?;
///     writer.finish()?;
///     Ok(())
/// }
/// ```
#[derive(Default)]
pub struct BgenWriterBuilder {
    compression: Option<Compression>,
    layout: Option<Layout>,
    free_text: Option<String>,
    samples: Option<Vec<String>>,
}

impl BgenWriterBuilder {
    /// Sets the payload compression scheme (default zlib).
    #[must_use]
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Sets the payload layout (default 2).
    #[must_use]
    pub fn layout(mut self, layout: Layout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Sets the free-form header text (default empty).
    #[must_use]
    pub fn free_text(mut self, free_text: &str) -> Self {
        self.free_text = Some(free_text.to_owned());
        self
    }

    /// Sets the sample IDs to embed in the sample block.
    ///
    /// Without this the file carries no sample block and readers fall back
    /// to a side-car file or numeric IDs.
    #[must_use]
    pub fn samples(mut self, samples: &[String]) -> Self {
        self.samples = Some(samples.to_vec());
        self
    }

    /// Creates the output file and writes the header and sample block.
    ///
    /// # Errors
    ///
    /// Fails when layout 1 is combined with zstd, when the sample ID count
    /// disagrees with `n_samples`, or on I/O errors creating the file.
    pub fn create<P: AsRef<Path>>(self, path: P, n_samples: u32) -> Result<BgenWriter> {
        BgenWriter::new(
            path,
            n_samples,
            self.compression.unwrap_or_default(),
            self.layout.unwrap_or_default(),
            &self.free_text.unwrap_or_default(),
            self.samples.unwrap_or_default(),
        )
    }
}

/// Streaming writer for BGEN files.
///
/// Variants are emitted as `write_variant` / `write_genotypes` pairs.
/// Dropping the writer without calling [`BgenWriter::finish`] leaves the
/// header's variant count at zero.
#[derive(Debug)]
pub struct BgenWriter {
    handle: BufWriter<File>,
    n_samples: u32,
    compression: Compression,
    layout: Layout,
    n_variants: u32,
    /// Stored first-variant locator (absolute offset minus four)
    variant_data_offset: u32,
    /// Whether a descriptor is awaiting its genotype payload
    awaiting_genotypes: bool,
}

impl BgenWriter {
    fn new<P: AsRef<Path>>(
        path: P,
        n_samples: u32,
        compression: Compression,
        layout: Layout,
        free_text: &str,
        samples: Vec<String>,
    ) -> Result<Self> {
        if layout == Layout::One && compression == Compression::Zstd {
            return Err(HeaderError::ZstdWithLayoutOne.into());
        }
        if !samples.is_empty() && samples.len() as u32 != n_samples {
            return Err(WriteError::SampleCountMismatch {
                expected: n_samples,
                found: samples.len() as u32,
            }
            .into());
        }

        let header = Header {
            // patched after the sample block lands
            offset: 0,
            nvariants: 0,
            nsamples: n_samples,
            compression,
            layout,
            has_sample_ids: !samples.is_empty(),
            free_text: free_text.to_owned(),
        };

        let mut handle = BufWriter::new(File::create(&path)?);
        header.write_bytes(&mut handle)?;
        let mut variant_data_offset = u64::from(header.header_length());
        if !samples.is_empty() {
            let block = Samples { ids: samples };
            variant_data_offset += block.write_bytes(&mut handle)?;
        }

        debug!(
            "created bgen writer at {:?}: {} samples, layout {:?}, compression {:?}",
            path.as_ref(),
            n_samples,
            layout,
            compression
        );
        let mut writer = Self {
            handle,
            n_samples,
            compression,
            layout,
            n_variants: 0,
            variant_data_offset: variant_data_offset as u32,
            awaiting_genotypes: false,
        };
        writer.write_at_offset(0, writer.variant_data_offset)?;
        Ok(writer)
    }

    /// Number of variants written so far.
    #[must_use]
    pub fn n_variants(&self) -> u32 {
        self.n_variants
    }

    /// Writes the descriptor for the next variant.
    ///
    /// # Errors
    ///
    /// Fails when `n_samples` disagrees with the writer configuration or
    /// when layout 1 is given anything but two alleles.
    pub fn write_variant(
        &mut self,
        varid: &str,
        rsid: &str,
        chrom: &str,
        pos: u32,
        alleles: &[String],
        n_samples: u32,
    ) -> Result<()> {
        if n_samples != self.n_samples {
            return Err(WriteError::SampleCountMismatch {
                expected: self.n_samples,
                found: n_samples,
            }
            .into());
        }
        if self.layout == Layout::One {
            self.handle.write_u32::<LittleEndian>(n_samples)?;
        }
        write_descriptor(
            &mut self.handle,
            self.layout,
            varid,
            rsid,
            chrom,
            pos,
            alleles,
        )?;
        self.n_variants += 1;
        self.awaiting_genotypes = true;
        Ok(())
    }

    /// Writes the genotype payload for the most recent descriptor, with a
    /// constant ploidy across all samples.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`BgenWriter::write_genotypes`].
    pub fn write_genotypes_constant(
        &mut self,
        n_alleles: u16,
        probs: &[f64],
        ploidy: u8,
        phased: bool,
        bit_depth: u8,
    ) -> Result<()> {
        let ploidy_vec = vec![ploidy; self.n_samples as usize];
        self.write_genotypes(n_alleles, probs, &ploidy_vec, ploidy, ploidy, phased, bit_depth)
    }

    /// Writes the genotype payload for the most recent descriptor.
    ///
    /// `probs` is a row-major matrix with `max_probs` columns: one row per
    /// sample when unphased, one row per haplotype when phased. Samples
    /// whose rows are entirely the missing marker are stored as missing.
    ///
    /// # Errors
    ///
    /// Fails when no descriptor precedes the payload, on shape or ploidy
    /// mismatches, on rows mixing missing and finite values, and on
    /// probabilities outside `[0, 1]`.
    #[allow(clippy::too_many_arguments)]
    pub fn write_genotypes(
        &mut self,
        n_alleles: u16,
        probs: &[f64],
        ploidy: &[u8],
        min_ploidy: u8,
        max_ploidy: u8,
        phased: bool,
        bit_depth: u8,
    ) -> Result<()> {
        if !self.awaiting_genotypes {
            return Err(WriteError::MissingDescriptor.into());
        }

        let encoded = match self.layout {
            Layout::One => {
                if n_alleles != 2 {
                    return Err(WriteError::BiallelicLayout(n_alleles).into());
                }
                encode_layout1(probs, self.n_samples)?
            }
            Layout::Two => encode_layout2(
                self.n_samples,
                n_alleles,
                probs,
                ploidy,
                min_ploidy,
                max_ploidy,
                phased,
                bit_depth,
            )?,
        };

        match (self.layout, self.compression) {
            (Layout::One, Compression::Uncompressed) => {
                self.handle.write_all(&encoded)?;
            }
            (Layout::One, scheme) => {
                let compressed = compress(scheme, &encoded)?;
                self.handle
                    .write_u32::<LittleEndian>(compressed.len() as u32)?;
                self.handle.write_all(&compressed)?;
            }
            (Layout::Two, Compression::Uncompressed) => {
                self.handle.write_u32::<LittleEndian>(encoded.len() as u32)?;
                self.handle.write_all(&encoded)?;
            }
            (Layout::Two, scheme) => {
                let compressed = compress(scheme, &encoded)?;
                self.handle
                    .write_u32::<LittleEndian>(compressed.len() as u32 + 4)?;
                self.handle.write_u32::<LittleEndian>(encoded.len() as u32)?;
                self.handle.write_all(&compressed)?;
            }
        }
        self.awaiting_genotypes = false;
        Ok(())
    }

    /// Backpatches the header and flushes the file.
    ///
    /// The variant count lands at byte 8 and the first-variant locator at
    /// byte 0, completing fields that were unknown at creation time.
    ///
    /// # Errors
    ///
    /// Surfaces I/O errors from seeking, writing, or flushing.
    pub fn finish(mut self) -> Result<()> {
        self.write_at_offset(0, self.variant_data_offset)?;
        self.write_at_offset(NVARIANTS_OFFSET, self.n_variants)?;
        self.handle.flush()?;
        debug!("finished bgen file: {} variants", self.n_variants);
        Ok(())
    }

    /// Writes a u32 at an absolute offset, restoring the stream position.
    fn write_at_offset(&mut self, position: u64, value: u32) -> Result<()> {
        let original = self.handle.stream_position()?;
        self.handle.seek(SeekFrom::Start(position))?;
        self.handle.write_u32::<LittleEndian>(value)?;
        self.handle.seek(SeekFrom::Start(original))?;
        Ok(())
    }
}
