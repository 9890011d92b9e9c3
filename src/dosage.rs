//! Allele dosage derivation for biallelic variants
//!
//! The expected number of copies of an allele per sample follows linearly
//! from the decoded probabilities: an unphased row lists genotypes in
//! colexicographic order, so entry `k` carries `k` copies of the second
//! allele; a phased sample contributes its per-haplotype second-allele
//! probability once per chromosome copy.
//!
//! Identifying the minor allele does not need the whole cohort: dosage sums
//! are accumulated over interleaved uniform batches and the scan stops as
//! soon as the provisional frequency is bounded away from 0.5.

use std::io::{Read, Seek};

use crate::error::{GenotypeError, Result};
use crate::genotypes::{Genotypes, ProbMatrix, Stage};
use crate::utils::{MISSING_PROB, is_missing};

/// Width multiplier on the binomial standard error of the provisional
/// minor-allele frequency; the scan stops once `0.5` falls outside
/// `f ± EARLY_STOP_SIGMA * sqrt(f(1-f)/n)`.
const EARLY_STOP_SIGMA: f64 = 10.0;

impl Genotypes {
    /// Dosage of the second (alternate) allele for every sample.
    ///
    /// Missing samples carry the missing marker. Cached after the first call.
    ///
    /// # Errors
    ///
    /// Fails with `BiallelicRequired` on variants with more than two
    /// alleles, or surfaces any decode error from the probability pass.
    pub fn alt_dosage<R: Read + Seek>(&mut self, handle: &mut R) -> Result<&[f32]> {
        if self.n_alleles() != 2 {
            return Err(GenotypeError::BiallelicRequired(self.n_alleles()).into());
        }
        if self.alt_dose.is_none() {
            self.probabilities(handle)?;
            let dose = self.compute_alt_dosages(self.probs_ref());
            self.alt_dose = Some(dose);
            self.stage = Stage::DosagesReady;
        }
        Ok(self.alt_dose.as_ref().expect("alt dosage cached above"))
    }

    /// Dosage of the minor allele for every sample.
    ///
    /// The minor allele is the one with the smaller dosage sum over the
    /// cohort, ties breaking to the first allele. Cached after the first
    /// call.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Genotypes::alt_dosage`].
    pub fn minor_allele_dosage<R: Read + Seek>(&mut self, handle: &mut R) -> Result<&[f32]> {
        if self.minor_dose.is_none() {
            let minor = self.minor_allele_index(handle)?;
            let alt = self
                .alt_dose
                .as_ref()
                .expect("alt dosage computed by minor_allele_index");
            let dose = if minor == 1 {
                alt.clone()
            } else {
                // ref dosage is the ploidy complement of the alt dosage
                alt.iter()
                    .zip(&self.ploidy)
                    .map(|(&d, &z)| if is_missing(d) { d } else { f32::from(z) - d })
                    .collect()
            };
            self.minor_dose = Some(dose);
        }
        Ok(self.minor_dose.as_ref().expect("minor dosage cached above"))
    }

    /// Index of the minor allele (0 or 1), identified with the early-stop
    /// batch scan and cached.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`Genotypes::alt_dosage`].
    pub fn minor_allele_index<R: Read + Seek>(&mut self, handle: &mut R) -> Result<usize> {
        if let Some(idx) = self.minor_idx {
            return Ok(idx);
        }
        if self.n_alleles() != 2 {
            return Err(GenotypeError::BiallelicRequired(self.n_alleles()).into());
        }
        self.probabilities(handle)?;
        let idx = self.find_minor_allele(self.probs_ref());
        // the full vector is produced regardless, so later calls reuse it
        self.alt_dosage(handle)?;
        self.minor_idx = Some(idx);
        Ok(idx)
    }

    /// Alternate-allele dosage for one sample, or the missing marker.
    fn sample_alt_dosage(&self, probs: &ProbMatrix, sample: usize) -> f32 {
        if self.phased {
            let mut dose = 0.0f32;
            for row in self.sample_rows(sample) {
                let row = probs.row(row);
                if is_missing(row[0]) {
                    return MISSING_PROB;
                }
                dose += row[1];
            }
            dose
        } else {
            let row = probs.row(sample);
            if is_missing(row[0]) {
                return MISSING_PROB;
            }
            let z = self.ploidy[sample] as usize;
            row[1..=z]
                .iter()
                .enumerate()
                .map(|(k, &p)| (k + 1) as f32 * p)
                .sum()
        }
    }

    /// Full alternate-dosage vector, with a tight branch for the common
    /// constant-diploid unphased case.
    fn compute_alt_dosages(&self, probs: &ProbMatrix) -> Vec<f32> {
        let n = self.n_samples() as usize;
        if self.constant_ploidy && self.max_ploidy == 2 && !self.phased {
            (0..n)
                .map(|sample| {
                    let row = probs.row(sample);
                    if is_missing(row[0]) {
                        MISSING_PROB
                    } else {
                        row[1] + 2.0 * row[2]
                    }
                })
                .collect()
        } else {
            (0..n)
                .map(|sample| self.sample_alt_dosage(probs, sample))
                .collect()
        }
    }

    /// Identifies the minor allele without necessarily touching every sample.
    fn find_minor_allele(&self, probs: &ProbMatrix) -> usize {
        let n = self.n_samples() as usize;
        let n_batches = n.min(1000);
        let mut alt_sum = 0.0f64;
        let mut ref_sum = 0.0f64;
        let mut checked = 0usize;

        for batch in 0..n_batches {
            let mut sample = batch;
            while sample < n {
                let dose = self.sample_alt_dosage(probs, sample);
                if !is_missing(dose) {
                    let z = f64::from(self.ploidy[sample]);
                    alt_sum += f64::from(dose);
                    ref_sum += z - f64::from(dose);
                    checked += 1;
                }
                sample += n_batches;
            }
            let total = alt_sum + ref_sum;
            if checked > 0 && total > 0.0 {
                let f = alt_sum / total;
                let delta = EARLY_STOP_SIGMA * (f * (1.0 - f) / checked as f64).sqrt();
                // a degenerate provisional frequency has zero spread and says
                // nothing about the unseen remainder; keep scanning
                if delta > 0.0 {
                    if f + delta < 0.5 {
                        return 1;
                    }
                    if f - delta > 0.5 {
                        return 0;
                    }
                }
            }
        }
        // ties break to the first allele
        if alt_sum < ref_sum { 1 } else { 0 }
    }
}
