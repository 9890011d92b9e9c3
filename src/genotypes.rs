//! Genotype probability payload decoding
//!
//! The payload of a variant is an individually-compressed block holding the
//! per-sample probability data. Layout 1 stores fixed 16-bit genotype triples;
//! layout 2 stores a small header, a ploidy/missingness byte per sample, and a
//! bit-packed probability region at an arbitrary bit depth.
//!
//! Decoding is lazy and cached per variant: the payload is read and
//! decompressed on first use, parsed into a [`ProbMatrix`] on demand, and kept
//! until [`Genotypes::clear`] resets the variant. Decode failures park the
//! variant in a terminal errored stage so a corrupt payload is not re-parsed
//! on every call.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{ByteOrder, LittleEndian};

use crate::bits::BitReader;
use crate::compress::{Compression, decompress};
use crate::error::{GenotypeError, Result};
use crate::header::Layout;
use crate::utils::{MISSING_PROB, n_choose_k};

/// Scale divisor for layout-1 probabilities.
const LAYOUT1_DIVISOR: f32 = 32768.0;

/// Row-major probability matrix of shape `rows x max_probs`.
///
/// Unphased payloads have one row per sample; phased payloads have one row
/// per haplotype (`ploidy` rows per sample). Columns beyond a row's own
/// probability count hold the missing marker.
#[derive(Debug, Clone, Default)]
pub struct ProbMatrix {
    data: Vec<f32>,
    rows: usize,
    cols: usize,
}

impl ProbMatrix {
    fn new(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![0.0; rows * cols],
            rows,
            cols,
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (`max_probs`).
    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// One row of probabilities.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of range.
    #[must_use]
    pub fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    /// The full matrix as a flat row-major slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    fn row_mut(&mut self, row: usize) -> &mut [f32] {
        &mut self.data[row * self.cols..(row + 1) * self.cols]
    }
}

/// Decode progress for one variant's payload.
///
/// Transitions are monotonic within one lifetime of the cache; `clear`
/// returns to `Described` and a decode failure parks the variant in
/// `Errored` until cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum Stage {
    #[default]
    Described,
    Decompressed,
    ProbsReady,
    DosagesReady,
    Errored,
}

/// Lazily-decoded genotype data for a single variant.
#[derive(Debug, Default)]
pub struct Genotypes {
    layout: Layout,
    compression: Compression,
    n_alleles: u16,
    n_samples: u32,
    /// Absolute file offset of the payload region (after any length prefix)
    data_offset: u64,
    /// Byte length of the payload region
    data_len: u64,

    pub(crate) stage: Stage,
    /// Decompressed payload bytes, kept for re-parsing after `clear_probs`
    raw: Option<Vec<u8>>,
    probs: Option<ProbMatrix>,

    /// Per-sample ploidy, filled during parse
    pub(crate) ploidy: Vec<u8>,
    /// Indices of samples flagged missing
    pub(crate) missing: Vec<u32>,
    pub(crate) phased: bool,
    pub(crate) min_ploidy: u8,
    pub(crate) max_ploidy: u8,
    pub(crate) constant_ploidy: bool,
    pub(crate) bit_depth: u8,
    pub(crate) max_probs: usize,

    /// Cached dosage vectors, filled by the dosage pass
    pub(crate) alt_dose: Option<Vec<f32>>,
    pub(crate) minor_dose: Option<Vec<f32>>,
    pub(crate) minor_idx: Option<usize>,
}

impl Genotypes {
    pub(crate) fn new(
        layout: Layout,
        compression: Compression,
        n_alleles: u16,
        n_samples: u32,
        data_offset: u64,
        data_len: u64,
    ) -> Self {
        Self {
            layout,
            compression,
            n_alleles,
            n_samples,
            data_offset,
            data_len,
            ..Self::default()
        }
    }

    /// Absolute file offset of the byte after this payload (the next
    /// descriptor, or the end of the file).
    #[must_use]
    pub fn next_offset(&self) -> u64 {
        self.data_offset + self.data_len
    }

    /// Number of alleles of the owning variant.
    #[must_use]
    pub fn n_alleles(&self) -> u16 {
        self.n_alleles
    }

    /// Number of samples in the file.
    #[must_use]
    pub fn n_samples(&self) -> u32 {
        self.n_samples
    }

    /// Decodes (or returns the cached) probability matrix for this variant.
    ///
    /// # Errors
    ///
    /// Surfaces payload validation errors; after any failure the variant is
    /// in the errored stage and keeps failing with `DecodeFailed` until
    /// [`Genotypes::clear`] is called.
    pub fn probabilities<R: Read + Seek>(&mut self, handle: &mut R) -> Result<&ProbMatrix> {
        match self.stage {
            Stage::Errored => return Err(GenotypeError::DecodeFailed.into()),
            Stage::ProbsReady | Stage::DosagesReady => {
                return Ok(self.probs.as_ref().expect("probs cached in ready stage"));
            }
            Stage::Described | Stage::Decompressed => {}
        }
        match self.decode(handle) {
            Ok(()) => Ok(self.probs.as_ref().expect("probs set by decode")),
            Err(e) => {
                self.stage = Stage::Errored;
                Err(e)
            }
        }
    }

    /// Drops all cached state, returning the variant to the described stage.
    pub fn clear(&mut self) {
        self.stage = Stage::Described;
        self.raw = None;
        self.probs = None;
        self.ploidy.clear();
        self.missing.clear();
        self.phased = false;
        self.min_ploidy = 0;
        self.max_ploidy = 0;
        self.constant_ploidy = false;
        self.bit_depth = 0;
        self.max_probs = 0;
        self.alt_dose = None;
        self.minor_dose = None;
        self.minor_idx = None;
    }

    fn decode<R: Read + Seek>(&mut self, handle: &mut R) -> Result<()> {
        if self.raw.is_none() {
            self.load(handle)?;
            self.stage = Stage::Decompressed;
        }
        let raw = self.raw.take().expect("payload loaded above");
        let parsed = match self.layout {
            Layout::One => self.parse_layout1(&raw),
            Layout::Two => self.parse_layout2(&raw),
        };
        self.raw = Some(raw);
        self.probs = Some(parsed?);
        self.stage = Stage::ProbsReady;
        Ok(())
    }

    /// Reads the payload region from the file and decompresses it.
    fn load<R: Read + Seek>(&mut self, handle: &mut R) -> Result<()> {
        handle.seek(SeekFrom::Start(self.data_offset))?;
        let raw = match (self.compression, self.layout) {
            (Compression::Uncompressed, _) => {
                let mut raw = vec![0u8; self.data_len as usize];
                handle.read_exact(&mut raw)?;
                raw
            }
            (_, Layout::One) => {
                let mut compressed = vec![0u8; self.data_len as usize];
                handle.read_exact(&mut compressed)?;
                let dst_len = self.n_samples as usize * 6;
                decompress(self.compression, &compressed, dst_len)?
            }
            (_, Layout::Two) => {
                // the region starts with the plaintext decompressed length
                let mut region = vec![0u8; self.data_len as usize];
                handle.read_exact(&mut region)?;
                if region.len() < 4 {
                    return Err(GenotypeError::Truncated { bit: 0 }.into());
                }
                let dst_len = LittleEndian::read_u32(&region[0..4]) as usize;
                decompress(self.compression, &region[4..], dst_len)?
            }
        };
        self.raw = Some(raw);
        Ok(())
    }

    /// Parses a layout-1 payload: one little-endian u16 triple per sample,
    /// scaled by 32768, with the all-zero triple as the missing signal.
    fn parse_layout1(&mut self, raw: &[u8]) -> Result<ProbMatrix> {
        let n = self.n_samples as usize;
        if raw.len() < n * 6 {
            return Err(GenotypeError::Truncated { bit: raw.len() * 8 }.into());
        }
        self.phased = false;
        self.min_ploidy = 2;
        self.max_ploidy = 2;
        self.constant_ploidy = true;
        self.bit_depth = 16;
        self.ploidy = vec![2; n];
        self.missing.clear();
        self.max_probs = 3;

        let mut probs = ProbMatrix::new(n, 3);
        for sample in 0..n {
            let base = sample * 6;
            let row = probs.row_mut(sample);
            for (slot, item) in row.iter_mut().enumerate() {
                let v = LittleEndian::read_u16(&raw[base + slot * 2..base + slot * 2 + 2]);
                *item = f32::from(v) / LAYOUT1_DIVISOR;
            }
            if row.iter().all(|&p| p == 0.0) {
                row.fill(MISSING_PROB);
                self.missing.push(sample as u32);
            }
        }
        Ok(probs)
    }

    /// Parses a layout-2 payload.
    fn parse_layout2(&mut self, raw: &[u8]) -> Result<ProbMatrix> {
        let n = self.n_samples as usize;
        if raw.len() < 10 + n {
            return Err(GenotypeError::Truncated { bit: raw.len() * 8 }.into());
        }

        let nn_samples = LittleEndian::read_u32(&raw[0..4]);
        if nn_samples != self.n_samples {
            return Err(GenotypeError::SampleCountMismatch {
                expected: self.n_samples,
                found: nn_samples,
            }
            .into());
        }
        let allele_check = LittleEndian::read_u16(&raw[4..6]);
        if allele_check != self.n_alleles {
            return Err(GenotypeError::AlleleCountMismatch {
                expected: self.n_alleles,
                found: allele_check,
            }
            .into());
        }

        self.min_ploidy = raw[6];
        self.max_ploidy = raw[7];
        self.constant_ploidy = self.min_ploidy == self.max_ploidy;
        self.parse_ploidy(&raw[8..8 + n]);

        self.phased = raw[8 + n] != 0;
        let bit_depth = raw[9 + n];
        if bit_depth < 1 || bit_depth > 32 {
            return Err(GenotypeError::BitDepthOutOfRange(bit_depth).into());
        }
        self.bit_depth = bit_depth;

        let k = self.n_alleles as u64;
        self.max_probs = if self.phased {
            k as usize
        } else {
            n_choose_k(u64::from(self.max_ploidy) + k - 1, k - 1) as usize
        };
        let nrows = if !self.phased {
            n
        } else if self.constant_ploidy {
            n * self.max_ploidy as usize
        } else {
            self.ploidy.iter().map(|&z| z as usize).sum()
        };

        let packed = &raw[10 + n..];
        let mut probs = ProbMatrix::new(nrows, self.max_probs);

        if self.bit_depth == 8
            && self.n_alleles == 2
            && self.constant_ploidy
            && self.max_ploidy == 2
            && !self.phased
        {
            self.unpack_diploid_u8(packed, &mut probs)?;
        } else {
            self.unpack_general(packed, &mut probs)?;
        }

        // missing samples consumed their bit span above; now blank their rows
        for &sample in &self.missing {
            let sample = sample as usize;
            let (start, count) = if !self.phased {
                (sample, 1)
            } else if self.constant_ploidy {
                let z = self.max_ploidy as usize;
                (sample * z, z)
            } else {
                let start: usize = self.ploidy[..sample].iter().map(|&z| z as usize).sum();
                (start, self.ploidy[sample] as usize)
            };
            for row in start..start + count {
                probs.row_mut(row).fill(MISSING_PROB);
            }
        }
        Ok(probs)
    }

    /// Extracts per-sample ploidy and missingness from the flag bytes.
    fn parse_ploidy(&mut self, flags: &[u8]) {
        self.missing.clear();
        if self.constant_ploidy {
            self.ploidy = vec![self.max_ploidy; flags.len()];
            // scan eight flag bytes at a time; fully-called chunks are the
            // common case and skip in one comparison
            let mut idx = 0;
            for chunk in flags.chunks_exact(8) {
                let word = u64::from_le_bytes(chunk.try_into().expect("chunk of 8"));
                if word & 0x8080_8080_8080_8080 != 0 {
                    for (off, &byte) in chunk.iter().enumerate() {
                        if byte & 0x80 != 0 {
                            self.missing.push((idx + off) as u32);
                        }
                    }
                }
                idx += 8;
            }
            for (off, &byte) in flags[idx..].iter().enumerate() {
                if byte & 0x80 != 0 {
                    self.missing.push((idx + off) as u32);
                }
            }
        } else {
            self.ploidy = Vec::with_capacity(flags.len());
            for (idx, &byte) in flags.iter().enumerate() {
                self.ploidy.push(byte & 0x3F);
                if byte & 0x80 != 0 {
                    self.missing.push(idx as u32);
                }
            }
        }
    }

    /// General packed-probability walk at any bit depth.
    fn unpack_general(&self, packed: &[u8], probs: &mut ProbMatrix) -> Result<()> {
        let k = self.n_alleles as u64;
        let divisor = ((1u64 << self.bit_depth) - 1) as f64;
        let stored_constant = self.max_probs - 1;

        let mut bits = BitReader::new(packed);
        for row in 0..probs.rows() {
            let n_probs = if self.phased {
                self.n_alleles as usize - 1
            } else if self.constant_ploidy {
                stored_constant
            } else {
                let z = u64::from(self.ploidy[row]);
                n_choose_k(z + k - 1, k - 1) as usize - 1
            };
            let mut remainder = 1.0f32;
            let out = probs.row_mut(row);
            for slot in out.iter_mut().take(n_probs) {
                let v = bits.read(self.bit_depth)?;
                let prob = (f64::from(v) / divisor) as f32;
                *slot = prob;
                remainder -= prob;
            }
            out[n_probs] = remainder;
            out[n_probs + 1..].fill(MISSING_PROB);
        }
        Ok(())
    }

    /// Fast path for the overwhelmingly common diploid biallelic unphased
    /// payload at bit depth 8: two direct byte loads per sample through a
    /// 256-entry table. Behaviourally identical to [`Self::unpack_general`].
    fn unpack_diploid_u8(&self, packed: &[u8], probs: &mut ProbMatrix) -> Result<()> {
        let n = probs.rows();
        if packed.len() < n * 2 {
            return Err(GenotypeError::Truncated {
                bit: packed.len() * 8,
            }
            .into());
        }
        let lut: [f32; 256] = std::array::from_fn(|v| (v as f64 / 255.0) as f32);
        for sample in 0..n {
            let a = lut[packed[sample * 2] as usize];
            let b = lut[packed[sample * 2 + 1] as usize];
            let row = probs.row_mut(sample);
            row[0] = a;
            row[1] = b;
            row[2] = 1.0 - a - b;
        }
        Ok(())
    }

    /// The cached probability matrix; only valid in the ready stages.
    pub(crate) fn probs_ref(&self) -> &ProbMatrix {
        self.probs.as_ref().expect("probabilities not decoded yet")
    }

    /// Byte ranges of the rows belonging to one sample in the matrix.
    pub(crate) fn sample_rows(&self, sample: usize) -> std::ops::Range<usize> {
        if !self.phased {
            sample..sample + 1
        } else if self.constant_ploidy {
            let z = self.max_ploidy as usize;
            sample * z..(sample + 1) * z
        } else {
            let start: usize = self.ploidy[..sample].iter().map(|&z| z as usize).sum();
            start..start + self.ploidy[sample] as usize
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress::compress;
    use crate::utils::is_missing;
    use std::io::Cursor;

    /// Hand-assembles a layout-2 payload header plus packed bytes.
    fn layout2_payload(
        n_samples: u32,
        n_alleles: u16,
        ploidy_bytes: &[u8],
        min_ploidy: u8,
        max_ploidy: u8,
        phased: bool,
        bit_depth: u8,
        packed: &[u8],
    ) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(&n_samples.to_le_bytes());
        raw.extend_from_slice(&n_alleles.to_le_bytes());
        raw.push(min_ploidy);
        raw.push(max_ploidy);
        raw.extend_from_slice(ploidy_bytes);
        raw.push(u8::from(phased));
        raw.push(bit_depth);
        raw.extend_from_slice(packed);
        raw
    }

    fn geno_over(raw: &[u8], layout: Layout, n_alleles: u16, n_samples: u32) -> Genotypes {
        Genotypes::new(
            layout,
            Compression::Uncompressed,
            n_alleles,
            n_samples,
            0,
            raw.len() as u64,
        )
    }

    #[test]
    fn test_layout1_triples() {
        // (1,0,0), (0,1,0), (0,0,1) scaled by 32768
        let mut raw = Vec::new();
        for triple in [[32768u16, 0, 0], [0, 32768, 0], [0, 0, 32768]] {
            for v in triple {
                raw.extend_from_slice(&v.to_le_bytes());
            }
        }
        let mut geno = geno_over(&raw, Layout::One, 2, 3);
        let probs = geno.probabilities(&mut Cursor::new(&raw)).unwrap();
        assert_eq!(probs.rows(), 3);
        assert_eq!(probs.cols(), 3);
        assert_eq!(probs.row(0), &[1.0, 0.0, 0.0]);
        assert_eq!(probs.row(1), &[0.0, 1.0, 0.0]);
        assert_eq!(probs.row(2), &[0.0, 0.0, 1.0]);
        assert_eq!(geno.ploidy, vec![2, 2, 2]);
        assert!(!geno.phased);
    }

    #[test]
    fn test_layout1_all_zero_triple_is_missing() {
        let mut raw = Vec::new();
        for triple in [[0u16, 0, 0], [16384, 16384, 0]] {
            for v in triple {
                raw.extend_from_slice(&v.to_le_bytes());
            }
        }
        let mut geno = geno_over(&raw, Layout::One, 2, 2);
        let probs = geno.probabilities(&mut Cursor::new(&raw)).unwrap();
        assert!(probs.row(0).iter().all(|&p| is_missing(p)));
        assert_eq!(probs.row(1), &[0.5, 0.5, 0.0]);
        assert_eq!(geno.missing, vec![0]);
    }

    #[test]
    fn test_layout2_diploid_u8_fast_path() {
        // one sample with stored bytes (51, 128); implicit third is 76/255
        let raw = layout2_payload(1, 2, &[2], 2, 2, false, 8, &[51, 128]);
        let mut geno = geno_over(&raw, Layout::Two, 2, 1);
        let probs = geno.probabilities(&mut Cursor::new(&raw)).unwrap();
        let row = probs.row(0);
        assert!((row[0] - 51.0 / 255.0).abs() < 1e-6);
        assert!((row[1] - 128.0 / 255.0).abs() < 1e-6);
        assert!((row[2] - 76.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_layout2_fast_path_matches_general() {
        // same packed bytes through both paths must give identical output
        let packed = [10u8, 20, 250, 0, 3, 128];
        let raw = layout2_payload(3, 2, &[2, 2, 2], 2, 2, false, 8, &packed);
        let mut geno = geno_over(&raw, Layout::Two, 2, 3);
        let fast = geno.probabilities(&mut Cursor::new(&raw)).unwrap().clone();

        let mut probs = ProbMatrix::new(3, 3);
        geno.unpack_general(&packed, &mut probs).unwrap();
        assert_eq!(fast.as_slice(), probs.as_slice());
    }

    #[test]
    fn test_layout2_bit_depth_3() {
        // one diploid biallelic sample, stored values 3 and 2 in 3-bit fields
        let packed = [0b0001_0011u8];
        let raw = layout2_payload(1, 2, &[2], 2, 2, false, 3, &packed);
        let mut geno = geno_over(&raw, Layout::Two, 2, 1);
        let probs = geno.probabilities(&mut Cursor::new(&raw)).unwrap();
        let row = probs.row(0);
        assert!((row[0] - 3.0 / 7.0).abs() < 1e-6);
        assert!((row[1] - 2.0 / 7.0).abs() < 1e-6);
        assert!((row[2] - 2.0 / 7.0).abs() < 1e-6);
    }

    #[test]
    fn test_layout2_phased_rows() {
        // two diploid samples, triallelic, phased: four rows of two stored
        // values each at depth 8
        let packed = [255u8, 0, 0, 255, 128, 0, 0, 0];
        let raw = layout2_payload(2, 3, &[2, 2], 2, 2, true, 8, &packed);
        let mut geno = geno_over(&raw, Layout::Two, 3, 2);
        let probs = geno.probabilities(&mut Cursor::new(&raw)).unwrap();
        assert_eq!(probs.rows(), 4);
        assert_eq!(probs.cols(), 3);
        assert_eq!(probs.row(0), &[1.0, 0.0, 0.0]);
        assert_eq!(probs.row(1), &[0.0, 1.0, 0.0]);
        let row = probs.row(2);
        assert!((row[0] - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(probs.row(3), &[0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_layout2_varying_ploidy() {
        // sample 0 haploid (1 stored prob), sample 1 triploid (3 stored) at
        // depth 8, biallelic unphased; max_probs = C(3+1, 1) = 4
        let packed = [255u8, 0, 128, 127];
        let raw = layout2_payload(2, 2, &[1, 3], 1, 3, false, 8, &packed);
        let mut geno = geno_over(&raw, Layout::Two, 2, 2);
        let probs = geno.probabilities(&mut Cursor::new(&raw)).unwrap();
        assert_eq!(probs.cols(), 4);

        let row0 = probs.row(0);
        assert_eq!(row0[0], 1.0);
        assert_eq!(row0[1], 0.0);
        assert!(is_missing(row0[2]) && is_missing(row0[3]));

        let row1 = probs.row(1);
        assert_eq!(row1[0], 0.0);
        assert!((row1[1] - 128.0 / 255.0).abs() < 1e-6);
        assert!((row1[2] - 127.0 / 255.0).abs() < 1e-6);
        assert!(row1[3].abs() < 1e-5);
    }

    #[test]
    fn test_layout2_missing_sample_row_blanked() {
        // sample 1 flagged missing; its stored bytes are garbage but must
        // still be consumed so sample 2 stays aligned
        let packed = [51u8, 128, 200, 200, 0, 255];
        let raw = layout2_payload(3, 2, &[2, 0x82, 2], 2, 2, false, 8, &packed);
        let mut geno = geno_over(&raw, Layout::Two, 2, 3);
        let probs = geno.probabilities(&mut Cursor::new(&raw)).unwrap();
        assert!(probs.row(1).iter().all(|&p| is_missing(p)));
        let row2 = probs.row(2);
        assert_eq!(row2[0], 0.0);
        assert_eq!(row2[1], 1.0);
        assert_eq!(geno.missing, vec![1]);
    }

    #[test]
    fn test_layout2_constant_ploidy_missing_scan_past_chunk() {
        // eleven samples exercises both the 8-wide scan and the remainder
        let mut ploidy_bytes = vec![2u8; 11];
        ploidy_bytes[3] = 0x82;
        ploidy_bytes[9] = 0x82;
        let packed = vec![0u8; 22];
        let raw = layout2_payload(11, 2, &ploidy_bytes, 2, 2, false, 8, &packed);
        let mut geno = geno_over(&raw, Layout::Two, 2, 11);
        geno.probabilities(&mut Cursor::new(&raw)).unwrap();
        assert_eq!(geno.missing, vec![3, 9]);
    }

    #[test]
    fn test_layout2_sample_count_mismatch() {
        let raw = layout2_payload(5, 2, &[2], 2, 2, false, 8, &[0, 0]);
        let mut geno = geno_over(&raw, Layout::Two, 2, 1);
        let err = geno.probabilities(&mut Cursor::new(&raw)).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::GenotypeError(GenotypeError::SampleCountMismatch { .. })
        ));
    }

    #[test]
    fn test_layout2_allele_count_mismatch() {
        let raw = layout2_payload(1, 3, &[2], 2, 2, false, 8, &[0, 0]);
        let mut geno = geno_over(&raw, Layout::Two, 2, 1);
        let err = geno.probabilities(&mut Cursor::new(&raw)).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::GenotypeError(GenotypeError::AlleleCountMismatch { .. })
        ));
    }

    #[test]
    fn test_layout2_bit_depth_out_of_range() {
        let raw = layout2_payload(1, 2, &[2], 2, 2, false, 0, &[]);
        let mut geno = geno_over(&raw, Layout::Two, 2, 1);
        let err = geno.probabilities(&mut Cursor::new(&raw)).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::GenotypeError(GenotypeError::BitDepthOutOfRange(0))
        ));
    }

    #[test]
    fn test_errored_stage_is_terminal_until_clear() {
        let raw = layout2_payload(1, 2, &[2], 2, 2, false, 0, &[]);
        let mut geno = geno_over(&raw, Layout::Two, 2, 1);
        assert!(geno.probabilities(&mut Cursor::new(&raw)).is_err());
        assert_eq!(geno.stage, Stage::Errored);

        let err = geno.probabilities(&mut Cursor::new(&raw)).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::GenotypeError(GenotypeError::DecodeFailed)
        ));

        geno.clear();
        assert_eq!(geno.stage, Stage::Described);
    }

    #[test]
    fn test_decode_is_cached() {
        let raw = layout2_payload(1, 2, &[2], 2, 2, false, 8, &[51, 128]);
        let mut geno = geno_over(&raw, Layout::Two, 2, 1);
        let first = geno.probabilities(&mut Cursor::new(&raw)).unwrap().clone();
        // a second call never touches the handle again
        let mut empty = Cursor::new(&[] as &[u8]);
        let second = geno.probabilities(&mut empty).unwrap();
        assert_eq!(first.as_slice(), second.as_slice());
    }

    #[test]
    fn test_compressed_region_with_embedded_length() {
        let inner = layout2_payload(1, 2, &[2], 2, 2, false, 8, &[51, 128]);
        let compressed = compress(Compression::Zlib, &inner).unwrap();
        let mut region = Vec::new();
        region.extend_from_slice(&(inner.len() as u32).to_le_bytes());
        region.extend_from_slice(&compressed);

        let mut geno = Genotypes::new(
            Layout::Two,
            Compression::Zlib,
            2,
            1,
            0,
            region.len() as u64,
        );
        let probs = geno.probabilities(&mut Cursor::new(&region)).unwrap();
        assert!((probs.row(0)[1] - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_truncated_packed_region() {
        // two diploid samples but only one stored byte of packed data
        let raw = layout2_payload(2, 2, &[2, 2], 2, 2, false, 16, &[0]);
        let mut geno = geno_over(&raw, Layout::Two, 2, 2);
        let err = geno.probabilities(&mut Cursor::new(&raw)).unwrap_err();
        assert!(err.is_truncation());
    }

    #[test]
    fn test_sample_rows_phased_varying() {
        let packed = [0u8; 3];
        let raw = layout2_payload(2, 2, &[1, 2], 1, 2, true, 8, &packed);
        let mut geno = geno_over(&raw, Layout::Two, 2, 2);
        geno.probabilities(&mut Cursor::new(&raw)).unwrap();
        assert_eq!(geno.sample_rows(0), 0..1);
        assert_eq!(geno.sample_rows(1), 1..3);
    }
}
