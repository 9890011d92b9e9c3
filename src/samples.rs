//! Sample identifier block and side-car file handling
//!
//! Sample IDs come from one of three places: the optional in-file block
//! directly after the header, an external whitespace-separated text file
//! with two header lines, or (when neither exists) synthetic numeric IDs.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Result, SampleError};

/// Ordered sample identifiers for one BGEN file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Samples {
    /// One ID per sample, in payload order
    pub ids: Vec<String>,
}

impl Samples {
    /// Parses the in-file sample block.
    ///
    /// The block is a `u32` byte length, a `u32` sample count, then one
    /// `(u16 length, bytes)` record per sample.
    ///
    /// # Errors
    ///
    /// Fails with `CountMismatch` when the block's own count disagrees with
    /// the header-level sample count.
    pub fn from_reader<R: Read>(reader: &mut R, nsamples: u32) -> Result<Self> {
        let _block_length = reader.read_u32::<LittleEndian>()?;
        let count = reader.read_u32::<LittleEndian>()?;
        if count != nsamples {
            return Err(SampleError::CountMismatch {
                expected: nsamples,
                found: count,
            }
            .into());
        }

        let mut ids = Vec::with_capacity(nsamples as usize);
        for _ in 0..nsamples {
            let id_len = reader.read_u16::<LittleEndian>()?;
            let mut id = vec![0u8; id_len as usize];
            reader.read_exact(&mut id)?;
            ids.push(std::str::from_utf8(&id)?.to_owned());
        }
        Ok(Self { ids })
    }

    /// Parses an external side-car sample file.
    ///
    /// The first two lines are headers and discarded. Every remaining
    /// non-empty line contributes its first whitespace-separated token as a
    /// sample ID. Trailing NUL characters are stripped first, so lines that
    /// are nothing but padding count as blank.
    ///
    /// # Errors
    ///
    /// Fails with `CountMismatch` when the file yields a different number
    /// of IDs than the header declares.
    pub fn from_path<P: AsRef<Path>>(path: P, nsamples: u32) -> Result<Self> {
        let handle = BufReader::new(File::open(path)?);
        let mut ids = Vec::with_capacity(nsamples as usize);
        for line in handle.lines().skip(2) {
            let line = line?;
            let line = line.trim_end_matches('\0');
            let Some(id) = line.split_whitespace().next() else {
                continue;
            };
            ids.push(id.to_owned());
        }
        if ids.len() as u32 != nsamples {
            return Err(SampleError::CountMismatch {
                expected: nsamples,
                found: ids.len() as u32,
            }
            .into());
        }
        Ok(Self { ids })
    }

    /// Numbers samples `"0".."nsamples - 1"` when no ID source exists.
    #[must_use]
    pub fn numbered(nsamples: u32) -> Self {
        let ids = (0..nsamples).map(|i| i.to_string()).collect();
        Self { ids }
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether the sample list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Writes the in-file sample block, returning the bytes written.
    ///
    /// # Errors
    ///
    /// Surfaces I/O errors from the underlying writer.
    pub fn write_bytes<W: Write>(&self, writer: &mut W) -> Result<u64> {
        let nchars: usize = self.ids.iter().map(String::len).sum();
        let block_length = 8 + 2 * self.ids.len() + nchars;
        writer.write_u32::<LittleEndian>(block_length as u32)?;
        writer.write_u32::<LittleEndian>(self.ids.len() as u32)?;
        for id in &self.ids {
            writer.write_u16::<LittleEndian>(id.len() as u16)?;
            writer.write_all(id.as_bytes())?;
        }
        Ok(block_length as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Cursor;

    fn reference_samples() -> Samples {
        Samples {
            ids: vec!["NA12878".into(), "NA12891".into(), "NA12892".into()],
        }
    }

    #[test]
    fn test_block_round_trip() {
        let samples = reference_samples();
        let mut buf = Vec::new();
        let written = samples.write_bytes(&mut buf).unwrap();
        assert_eq!(written as usize, buf.len());

        let parsed = Samples::from_reader(&mut Cursor::new(&buf), 3).unwrap();
        assert_eq!(parsed, samples);
    }

    #[test]
    fn test_block_length_field() {
        let samples = reference_samples();
        let mut buf = Vec::new();
        samples.write_bytes(&mut buf).unwrap();
        let declared = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        // 8 fixed + 3 * (2 + 7)
        assert_eq!(declared, 35);
    }

    #[test]
    fn test_block_count_mismatch() {
        let samples = reference_samples();
        let mut buf = Vec::new();
        samples.write_bytes(&mut buf).unwrap();
        let err = Samples::from_reader(&mut Cursor::new(&buf), 4).unwrap_err();
        assert!(matches!(
            err,
            Error::SampleError(SampleError::CountMismatch {
                expected: 4,
                found: 3
            })
        ));
    }

    #[test]
    fn test_empty_ids_permitted() {
        let samples = Samples {
            ids: vec![String::new(), "s1".into()],
        };
        let mut buf = Vec::new();
        samples.write_bytes(&mut buf).unwrap();
        let parsed = Samples::from_reader(&mut Cursor::new(&buf), 2).unwrap();
        assert_eq!(parsed.ids[0], "");
        assert_eq!(parsed.ids[1], "s1");
    }

    #[test]
    fn test_numbered_fallback() {
        let samples = Samples::numbered(4);
        assert_eq!(samples.ids, vec!["0", "1", "2", "3"]);
        assert_eq!(samples.len(), 4);
        assert!(!samples.is_empty());
    }

    #[test]
    fn test_sidecar_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cohort.sample");
        std::fs::write(
            &path,
            "ID_1 ID_2 missing\n0 0 0\nNA001 NA001 0\nNA002 NA002 0.1\n\nNA003\tNA003\t0\n",
        )
        .unwrap();

        let samples = Samples::from_path(&path, 3).unwrap();
        assert_eq!(samples.ids, vec!["NA001", "NA002", "NA003"]);
    }

    #[test]
    fn test_sidecar_trailing_nuls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cohort.sample");
        std::fs::write(&path, "h1\nh2\nNA001 x\0\0\n\0\0\nNA002\n").unwrap();

        let samples = Samples::from_path(&path, 2).unwrap();
        assert_eq!(samples.ids, vec!["NA001", "NA002"]);
    }

    #[test]
    fn test_sidecar_count_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cohort.sample");
        std::fs::write(&path, "h1\nh2\nNA001\n").unwrap();

        let err = Samples::from_path(&path, 2).unwrap_err();
        assert!(matches!(
            err,
            Error::SampleError(SampleError::CountMismatch { .. })
        ));
    }
}
