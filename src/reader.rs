//! Reading of BGEN files
//!
//! Opening a file parses the header and sample IDs, then scans every variant
//! descriptor so variants can be accessed randomly. Genotype payloads stay
//! untouched until probabilities or dosages are requested for a specific
//! variant, and decoded results are cached per variant until invalidated.

use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;

use log::debug;

use crate::error::{ReadError, Result};
use crate::genotypes::ProbMatrix;
use crate::header::Header;
use crate::samples::Samples;
use crate::variant::Variant;

/// A BGEN file opened for reading.
///
/// # Examples
///
/// ```no_run
/// use bgen::{Bgen, Result};
///
/// fn main() -> Result<()> {
///     let mut bfile = Bgen::open("cohort.bgen")?;
///     for idx in 0..bfile.n_variants() {
///         let probs = bfile.probabilities(idx)?;
///         println!("{} rows of {}", probs.rows(), probs.cols());
///     }
///     Ok(())
/// }
/// ```
pub struct Bgen {
    handle: BufReader<File>,
    /// Parsed file header
    pub header: Header,
    /// Sample identifiers, from the file, a side-car, or numbered
    pub samples: Samples,
    variants: Vec<Variant>,
}

impl Bgen {
    /// Opens a BGEN file, taking sample IDs from the in-file block when
    /// present and numbering them otherwise.
    ///
    /// # Errors
    ///
    /// Fails on header or descriptor validation errors, or on I/O errors.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(path, None)
    }

    /// Opens a BGEN file with an external side-car sample file.
    ///
    /// The side-car is only consulted when the file itself carries no
    /// sample block.
    ///
    /// # Errors
    ///
    /// Same as [`Bgen::open`], plus side-car parse failures.
    pub fn open_with_sample_path<P: AsRef<Path>, Q: AsRef<Path>>(
        path: P,
        sample_path: Q,
    ) -> Result<Self> {
        Self::new(path, Some(sample_path.as_ref()))
    }

    fn new<P: AsRef<Path>>(path: P, sample_path: Option<&Path>) -> Result<Self> {
        let file = File::open(&path)?;
        if !file.metadata()?.is_file() {
            return Err(ReadError::IncompatibleFile.into());
        }
        let fsize = file.metadata()?.len();
        let mut handle = BufReader::new(file);

        let header = Header::from_reader(&mut handle)?;
        let samples = if header.has_sample_ids {
            Samples::from_reader(&mut handle, header.nsamples)?
        } else if let Some(sample_path) = sample_path {
            Samples::from_path(sample_path, header.nsamples)?
        } else {
            Samples::numbered(header.nsamples)
        };

        // materialise every descriptor up front; payloads stay on disk
        handle.seek(SeekFrom::Start(header.first_variant_offset()))?;
        let mut variants = Vec::with_capacity(header.nvariants as usize);
        let mut offset = header.first_variant_offset();
        while offset < fsize {
            let variant = Variant::from_reader(&mut handle, &header)?;
            offset = variant.next_offset();
            variants.push(variant);
        }
        debug!(
            "opened {:?}: {} samples, {} variants",
            path.as_ref(),
            header.nsamples,
            variants.len()
        );

        Ok(Self {
            handle,
            header,
            samples,
            variants,
        })
    }

    /// Number of samples in the file.
    #[must_use]
    pub fn n_samples(&self) -> u32 {
        self.header.nsamples
    }

    /// Number of variants currently enumerated (after any drops).
    #[must_use]
    pub fn n_variants(&self) -> usize {
        self.variants.len()
    }

    /// Whether the file holds no variants.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// The variant descriptor at `idx`.
    ///
    /// # Errors
    ///
    /// Fails with `OutOfRange` past the end of the variant list.
    pub fn variant(&self, idx: usize) -> Result<&Variant> {
        self.variants.get(idx).ok_or_else(|| {
            ReadError::OutOfRange {
                requested_index: idx,
                max_index: self.variants.len(),
            }
            .into()
        })
    }

    /// Iterates over the variant descriptors in order.
    pub fn iter(&self) -> impl Iterator<Item = &Variant> {
        self.variants.iter()
    }

    /// Drops the variants at the given indices.
    ///
    /// The surviving variants are re-sorted by increasing position, so a
    /// post-drop index always refers to the same genomic ordering.
    ///
    /// # Errors
    ///
    /// Fails with `DuplicateDropIndex` when an index appears twice and
    /// `OutOfRange` when one is past the end; the variant list is unchanged
    /// on error.
    pub fn drop_variants(&mut self, indices: &[usize]) -> Result<()> {
        let mut sorted = indices.to_vec();
        sorted.sort_unstable();
        for pair in sorted.windows(2) {
            if pair[0] == pair[1] {
                return Err(ReadError::DuplicateDropIndex(pair[0]).into());
            }
        }
        if let Some(&last) = sorted.last() {
            if last >= self.variants.len() {
                return Err(ReadError::OutOfRange {
                    requested_index: last,
                    max_index: self.variants.len(),
                }
                .into());
            }
        }

        for &idx in sorted.iter().rev() {
            self.variants.swap_remove(idx);
        }
        self.variants.sort_by_key(|v| v.pos);
        Ok(())
    }

    /// All variant IDs, in enumeration order.
    #[must_use]
    pub fn varids(&self) -> Vec<String> {
        self.variants.iter().map(|v| v.varid.clone()).collect()
    }

    /// All rsIDs, in enumeration order.
    #[must_use]
    pub fn rsids(&self) -> Vec<String> {
        self.variants.iter().map(|v| v.rsid.clone()).collect()
    }

    /// All chromosome labels, in enumeration order.
    #[must_use]
    pub fn chroms(&self) -> Vec<String> {
        self.variants.iter().map(|v| v.chrom.clone()).collect()
    }

    /// All positions, in enumeration order.
    #[must_use]
    pub fn positions(&self) -> Vec<u32> {
        self.variants.iter().map(|v| v.pos).collect()
    }

    /// The decoded probability matrix for the variant at `idx`.
    ///
    /// Decoding happens on first access and is cached until
    /// [`Bgen::clear_variant`].
    ///
    /// # Errors
    ///
    /// Fails with `OutOfRange` on a bad index or surfaces decode errors.
    pub fn probabilities(&mut self, idx: usize) -> Result<&ProbMatrix> {
        let max_index = self.variants.len();
        let variant = self.variants.get_mut(idx).ok_or(ReadError::OutOfRange {
            requested_index: idx,
            max_index,
        })?;
        variant.geno.probabilities(&mut self.handle)
    }

    /// Alternate-allele dosages for the variant at `idx` (biallelic only).
    ///
    /// # Errors
    ///
    /// Same as [`Bgen::probabilities`], plus `BiallelicRequired`.
    pub fn alt_dosage(&mut self, idx: usize) -> Result<&[f32]> {
        let max_index = self.variants.len();
        let variant = self.variants.get_mut(idx).ok_or(ReadError::OutOfRange {
            requested_index: idx,
            max_index,
        })?;
        variant.geno.alt_dosage(&mut self.handle)
    }

    /// Minor-allele dosages for the variant at `idx` (biallelic only).
    ///
    /// # Errors
    ///
    /// Same as [`Bgen::alt_dosage`].
    pub fn minor_allele_dosage(&mut self, idx: usize) -> Result<&[f32]> {
        let max_index = self.variants.len();
        let variant = self.variants.get_mut(idx).ok_or(ReadError::OutOfRange {
            requested_index: idx,
            max_index,
        })?;
        variant.geno.minor_allele_dosage(&mut self.handle)
    }

    /// Index of the minor allele for the variant at `idx` (biallelic only).
    ///
    /// # Errors
    ///
    /// Same as [`Bgen::alt_dosage`].
    pub fn minor_allele_index(&mut self, idx: usize) -> Result<usize> {
        let max_index = self.variants.len();
        let variant = self.variants.get_mut(idx).ok_or(ReadError::OutOfRange {
            requested_index: idx,
            max_index,
        })?;
        variant.geno.minor_allele_index(&mut self.handle)
    }

    /// Invalidates the cached decode state of the variant at `idx`.
    ///
    /// # Errors
    ///
    /// Fails with `OutOfRange` on a bad index.
    pub fn clear_variant(&mut self, idx: usize) -> Result<()> {
        let max_index = self.variants.len();
        let variant = self.variants.get_mut(idx).ok_or(ReadError::OutOfRange {
            requested_index: idx,
            max_index,
        })?;
        variant.geno.clear();
        Ok(())
    }
}
