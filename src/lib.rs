#![doc = include_str!("../README.md")]
//!
//! # Overview
//!
//! The `bgen` library reads and writes BGEN genotype probability files:
//!
//! - Both payload layouts (1 and 2), with zlib, zstd, or no compression
//! - Arbitrary ploidy per sample, arbitrary allele counts, phased and
//!   unphased encodings, and per-sample missingness
//! - Bit depths from 1 to 32 bits per stored probability, including
//!   non-byte-aligned depths
//! - Allele dosages, with early-stopping minor-allele identification
//!
//! Files are opened through [`Bgen`], which scans all variant descriptors
//! up front and decodes genotype payloads lazily. Writing goes through
//! [`BgenWriter`], configured by [`BgenWriterBuilder`].
//!
//! The codec itself is pure over byte buffers: decoding distinct variants
//! concurrently is safe as long as each worker holds its own file handle
//! and scratch buffers.

/// Packed bit field extraction and insertion
pub mod bits;

/// Compression adapter over the payload schemes
pub mod compress;

/// Allele dosage derivation
mod dosage;

/// Genotype payload encoding
mod encode;

/// Error definitions
pub mod error;

/// Genotype payload decoding and caching
pub mod genotypes;

/// File header codec
pub mod header;

/// File reading and variant enumeration
pub mod reader;

/// Sample identifier handling
pub mod samples;

/// Shared numeric helpers
pub mod utils;

/// Variant descriptor codec
pub mod variant;

/// File writing
pub mod writer;

pub use compress::Compression;
pub use error::{Error, Result};
pub use genotypes::{Genotypes, ProbMatrix};
pub use header::{Header, Layout};
pub use reader::Bgen;
pub use samples::Samples;
pub use utils::{MISSING_PROB, is_missing};
pub use variant::Variant;
pub use writer::{BgenWriter, BgenWriterBuilder};
