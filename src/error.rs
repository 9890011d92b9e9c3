use std::error::Error as StdError;

/// Custom Result type for bgen operations, wrapping the custom [`Error`] type
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the bgen library, encompassing all possible error
/// cases that can occur while reading or writing BGEN files.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Errors related to the file header
    #[error("Error processing header: {0}")]
    HeaderError(#[from] HeaderError),

    /// Errors related to the sample identifier block or side-car file
    #[error("Error processing samples: {0}")]
    SampleError(#[from] SampleError),

    /// Errors related to variant descriptor records
    #[error("Error processing variant: {0}")]
    VariantError(#[from] VariantError),

    /// Errors related to genotype probability payloads
    #[error("Error processing genotypes: {0}")]
    GenotypeError(#[from] GenotypeError),

    /// Errors that occur during write operations
    #[error("Error writing file: {0}")]
    WriteError(#[from] WriteError),

    /// Errors that occur at the whole-file level while reading
    #[error("Error reading file: {0}")]
    ReadError(#[from] ReadError),

    /// Standard I/O errors
    #[error("Error with IO: {0}")]
    IoError(#[from] std::io::Error),

    /// UTF-8 conversion errors
    #[error("Error with UTF8: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),

    /// Generic errors for other unexpected situations
    #[error("Generic error: {0}")]
    GenericError(#[from] Box<dyn StdError + Send + Sync>),
}

impl Error {
    /// Checks whether the error indicates a truncated file or payload.
    ///
    /// Useful for distinguishing corrupt input from structurally invalid
    /// input when deciding whether a retry with a fresh download makes sense.
    #[must_use]
    pub fn is_truncation(&self) -> bool {
        matches!(
            self,
            Self::VariantError(VariantError::Eof { .. })
                | Self::GenotypeError(GenotypeError::Truncated { .. })
        )
    }
}

/// Errors specific to parsing and validating the BGEN file header
#[derive(thiserror::Error, Debug)]
pub enum HeaderError {
    /// The four magic bytes are neither `"bgen"` nor `"0000"`
    #[error("Invalid magic bytes: {0:?}")]
    BadMagic([u8; 4]),

    /// The layout encoded in the flag word is not 1 or 2
    #[error("Unsupported layout: {0} - expecting [1,2]")]
    UnsupportedLayout(u8),

    /// The compression scheme encoded in the flag word is not 0, 1 or 2
    #[error("Unsupported compression scheme: {0} - expecting [0,1,2]")]
    UnsupportedCompression(u8),

    /// Layout 1 files cannot carry zstd-compressed payloads
    #[error("Layout 1 cannot be combined with zstd compression")]
    ZstdWithLayoutOne,

    /// The declared header length is shorter than the 20 fixed bytes
    #[error("Header length ({0}) is shorter than the fixed 20 bytes")]
    HeaderLengthTooShort(u32),
}

/// Errors specific to the sample identifier block and side-car file
#[derive(thiserror::Error, Debug)]
pub enum SampleError {
    /// The number of sample IDs does not match the header sample count
    #[error("Inconsistent number of samples: expected {expected}, found {found}")]
    CountMismatch { expected: u32, found: u32 },
}

/// Errors that can occur while reading a variant descriptor record
#[derive(thiserror::Error, Debug)]
pub enum VariantError {
    /// The file ended in the middle of a descriptor
    #[error("Unexpected end of file in variant descriptor at byte offset {offset}")]
    Eof { offset: u64 },

    /// A layout-1 descriptor embeds a sample count that disagrees with the header
    #[error("Variant sample count ({found}) does not match the file header ({expected})")]
    SampleCountMismatch { expected: u32, found: u32 },

    /// Fewer than two alleles in a descriptor
    #[error("Variant carries {0} alleles - at least two are required")]
    TooFewAlleles(u16),
}

/// Errors that can occur while decoding a genotype probability payload
#[derive(thiserror::Error, Debug)]
pub enum GenotypeError {
    /// The payload's embedded sample count disagrees with the file header
    #[error("Payload sample count ({found}) does not match the file header ({expected})")]
    SampleCountMismatch { expected: u32, found: u32 },

    /// The payload's embedded allele count disagrees with the descriptor
    #[error("Payload allele count ({found}) does not match the descriptor ({expected})")]
    AlleleCountMismatch { expected: u16, found: u16 },

    /// The probability bit depth is outside 1..=32
    #[error("Probability bit depth out of bounds: {0} - expecting 1..=32")]
    BitDepthOutOfRange(u8),

    /// Decompression produced a different number of bytes than the payload declared
    #[error("Decompressed payload size mismatch: expected {expected} bytes, found {found}")]
    CompressionSize { expected: usize, found: usize },

    /// The packed probability region ended before all stored values were read
    #[error("Packed probability data truncated at bit position {bit}")]
    Truncated { bit: usize },

    /// Dosages were requested for a variant with more than two alleles
    #[error("Dosage requires a biallelic variant, found {0} alleles")]
    BiallelicRequired(u16),

    /// A previous decode of this variant failed; call `clear` before retrying
    #[error("A previous decode of this variant failed")]
    DecodeFailed,
}

/// Errors that can occur at the whole-file level while reading
#[derive(thiserror::Error, Debug)]
pub enum ReadError {
    /// The file being read is not a regular file
    #[error("File is not regular")]
    IncompatibleFile,

    /// Attempted to access a variant index beyond the available range
    #[error("Requested variant index ({requested_index}) is out of range ({max_index})")]
    OutOfRange {
        requested_index: usize,
        max_index: usize,
    },

    /// The same index appears more than once in a drop request
    #[error("Cannot drop variants with duplicate index {0}")]
    DuplicateDropIndex(usize),
}

/// Errors that can occur while writing binary genotype data
#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    /// The per-variant sample count disagrees with the writer configuration
    #[error("Variant sample count ({found}) does not match the writer ({expected})")]
    SampleCountMismatch { expected: u32, found: u32 },

    /// Layout 1 requires exactly two alleles per variant
    #[error("Layout 1 requires exactly two alleles, found {0}")]
    BiallelicLayout(u16),

    /// A probability row mixes missing markers and finite values
    #[error("Probability row {row} mixes missing and finite values")]
    MixedMissingness { row: usize },

    /// A scaled probability fell outside the representable range
    #[error("Scaled probability {value} at row {row} is out of bounds")]
    ProbabilityOutOfBounds { row: usize, value: f64 },

    /// The probability matrix length does not factor into the expected shape
    #[error("Probability matrix of {len} values does not match {rows} rows of {cols}")]
    ShapeMismatch { len: usize, rows: usize, cols: usize },

    /// The ploidy vector length does not match the sample count
    #[error("Ploidy vector of length {found} does not match {expected} samples")]
    PloidyLengthMismatch { expected: u32, found: usize },

    /// A genotype payload was pushed before its variant descriptor
    #[error("Genotype data pushed without a preceding variant descriptor")]
    MissingDescriptor,
}
