//! Named reference sequences and the container binding that ties a
//! compressed stream to the exact reference it was produced against.
//!
//! Sequences are stored two-bit packed with the positions of ambiguous
//! bases tracked separately, and entries are kept sorted by name so lookup
//! is a binary search. The set's CRC64 fingerprint is a pure function of
//! the sorted entry content; the source filename travels in the binding as
//! a display hint only and never participates in verification.

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

use memchr::memchr_iter;

use crate::error::{ReadError, ReferenceError, Result};
use crate::{CRC64, wire};

/// A single named reference sequence.
///
/// The sequence is case-folded to uppercase on load; ambiguous bases are
/// packed as `A` and restored from the recorded N-positions on decode.
#[derive(Clone, Debug)]
pub struct ReferenceEntry {
    name: Vec<u8>,
    packed: Vec<u64>,
    len: usize,
    npos: Vec<usize>,
}

impl ReferenceEntry {
    fn from_seq(name: Vec<u8>, seq: &[u8]) -> Result<Self> {
        let npos: Vec<usize> = memchr_iter(b'N', seq).collect();
        let mut packed = Vec::new();
        bitnuc::twobit::encode_with_invalid(seq, &mut packed)?;
        Ok(Self {
            name,
            packed,
            len: seq.len(),
            npos,
        })
    }

    /// The entry name (header text up to the first space).
    #[must_use]
    pub fn name(&self) -> &[u8] {
        &self.name
    }

    /// Number of bases in the sequence.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Decode the sequence back to ASCII nucleotides, restoring `N`s.
    pub fn decode_into(&self, out: &mut Vec<u8>) -> Result<()> {
        out.clear();
        bitnuc::twobit::decode(&self.packed, self.len, out)?;
        for &pos in &self.npos {
            if let Some(base) = out.get_mut(pos) {
                *base = b'N';
            }
        }
        Ok(())
    }

    fn crc_update(&self, digest: &mut crc::Digest<'static, u64>) {
        digest.update(&self.name);
        for word in &self.packed {
            digest.update(&word.to_le_bytes());
        }
    }
}

/// An ordered, name-indexed set of reference sequences.
#[derive(Clone, Debug, Default)]
pub struct ReferenceSet {
    /// Entries sorted by name so `get` can binary search
    entries: Vec<ReferenceEntry>,
    /// Source filename, carried in the binding as a display hint
    source: String,
}

fn is_nt_char(c: u8) -> bool {
    matches!(
        c,
        b'a' | b'A' | b'c' | b'C' | b'g' | b'G' | b't' | b'T' | b'n' | b'N'
    )
}

impl ReferenceSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a reference set from a FASTA file.
    ///
    /// Sequence lines may contain only nucleotide characters (`ACGTN`,
    /// either case); anything else is a fatal parse error. Entry names are
    /// the header text up to the first space and must be unique across the
    /// file.
    pub fn from_fasta<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut set = Self::new();
        set.load_fasta(path)?;
        Ok(set)
    }

    /// Load entries from a FASTA file into this set.
    pub fn load_fasta<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);

        let mut line = Vec::new();
        let mut name: Option<Vec<u8>> = None;
        let mut seq = Vec::new();

        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            if line.last() == Some(&b'\n') {
                line.pop();
            }

            if line.first() == Some(&b'>') {
                if let Some(name) = name.take() {
                    self.entries.push(ReferenceEntry::from_seq(name, &seq)?);
                }
                let header = &line[1..];
                let end = header
                    .iter()
                    .position(|&b| b == b' ')
                    .unwrap_or(header.len());
                name = Some(header[..end].to_vec());
                seq.clear();
            } else if name.is_some() {
                for &b in &line {
                    if !is_nt_char(b) {
                        return Err(ReferenceError::UnexpectedChar(b as char).into());
                    }
                    seq.push(b.to_ascii_uppercase());
                }
            } else if let Some(&b) = line.first() {
                // sequence data before the first header
                return Err(ReferenceError::UnexpectedChar(b as char).into());
            }
        }
        if let Some(name) = name.take() {
            self.entries.push(ReferenceEntry::from_seq(name, &seq)?);
        }

        self.entries.sort_by(|a, b| a.name.cmp(&b.name));
        for pair in self.entries.windows(2) {
            if pair[0].name == pair[1].name {
                let name = String::from_utf8_lossy(&pair[0].name).into_owned();
                return Err(ReferenceError::DuplicateName(name).into());
            }
        }

        self.source = path.display().to_string();
        Ok(())
    }

    /// Number of sequences in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The filename the set was loaded from (display hint only).
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Look up a sequence by name.
    #[must_use]
    pub fn get(&self, name: &[u8]) -> Option<&ReferenceEntry> {
        self.entries
            .binary_search_by(|e| e.name.as_slice().cmp(name))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Content fingerprint: CRC64 over every entry's name bytes followed by
    /// its packed sequence words, in sorted-by-name order.
    #[must_use]
    pub fn crc64(&self) -> u64 {
        let mut digest = CRC64.digest();
        for entry in &self.entries {
            entry.crc_update(&mut digest);
        }
        digest.finalize()
    }

    /// Serialize the reference binding into a container header.
    pub fn write_binding<W: Write>(&self, writer: &mut W) -> Result<()> {
        wire::write_u64(writer, self.crc64())?;
        wire::write_u32(writer, self.source.len() as u32)?;
        writer.write_all(self.source.as_bytes())?;
        wire::write_u32(writer, self.entries.len() as u32)?;
        for entry in &self.entries {
            wire::write_u32(writer, entry.name.len() as u32)?;
            writer.write_all(&entry.name)?;
            wire::write_u64(writer, entry.len as u64)?;
        }
        Ok(())
    }

    /// Read a reference binding and verify it describes exactly this set.
    ///
    /// The CRC64 fingerprint is compared first; the recorded filename is
    /// discarded (it may legitimately differ across machines). Entry count,
    /// names, and sequence lengths are then checked one by one.
    pub fn verify_binding<R: Read>(&self, reader: &mut R) -> Result<()> {
        if wire::read_u64(reader)? != self.crc64() {
            return Err(ReadError::ReferenceMismatch.into());
        }

        let fname_len = wire::read_u32(reader)? as usize;
        let mut scratch = vec![0u8; fname_len];
        wire::read_exact(reader, &mut scratch)?;

        if wire::read_u32(reader)? as usize != self.entries.len() {
            return Err(ReadError::ReferenceMismatch.into());
        }
        for entry in &self.entries {
            let name_len = wire::read_u32(reader)? as usize;
            if name_len != entry.name.len() {
                return Err(ReadError::ReferenceMismatch.into());
            }
            scratch.resize(name_len, 0);
            wire::read_exact(reader, &mut scratch)?;
            if scratch != entry.name {
                return Err(ReadError::ReferenceMismatch.into());
            }
            if wire::read_u64(reader)? != entry.len as u64 {
                return Err(ReadError::ReferenceMismatch.into());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod testing {
    use super::*;
    use crate::error::Error;

    fn write_fasta(path: &str, content: &str) {
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_load_and_get() -> Result<()> {
        let path = "test_refset_load.fa";
        write_fasta(path, ">chr2 description text\nACGTN\nACGT\n>chr1\nTTTT\n");
        let set = ReferenceSet::from_fasta(path)?;
        std::fs::remove_file(path).unwrap();

        assert_eq!(set.len(), 2);
        let entry = set.get(b"chr2").unwrap();
        assert_eq!(entry.len(), 9);
        let mut seq = Vec::new();
        entry.decode_into(&mut seq)?;
        assert_eq!(seq, b"ACGTNACGT");

        assert_eq!(set.get(b"chr1").unwrap().len(), 4);
        assert!(set.get(b"chr3").is_none());
        Ok(())
    }

    #[test]
    fn test_lowercase_is_folded() -> Result<()> {
        let path = "test_refset_case.fa";
        write_fasta(path, ">s\nacgtn\n");
        let set = ReferenceSet::from_fasta(path)?;
        std::fs::remove_file(path).unwrap();

        let mut seq = Vec::new();
        set.get(b"s").unwrap().decode_into(&mut seq)?;
        assert_eq!(seq, b"ACGTN");
        Ok(())
    }

    #[test]
    fn test_bad_character_is_fatal() {
        let path = "test_refset_badchar.fa";
        write_fasta(path, ">s\nACGX\n");
        let err = ReferenceSet::from_fasta(path).unwrap_err();
        std::fs::remove_file(path).unwrap();
        assert!(matches!(
            err,
            Error::ReferenceError(ReferenceError::UnexpectedChar('X'))
        ));
    }

    #[test]
    fn test_duplicate_name_is_fatal() {
        let path = "test_refset_dup.fa";
        write_fasta(path, ">s\nACGT\n>s\nTTTT\n");
        let err = ReferenceSet::from_fasta(path).unwrap_err();
        std::fs::remove_file(path).unwrap();
        assert!(matches!(
            err,
            Error::ReferenceError(ReferenceError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_crc64_is_order_invariant() -> Result<()> {
        let path_a = "test_refset_order_a.fa";
        let path_b = "test_refset_order_b.fa";
        write_fasta(path_a, ">a\nACGT\n>b\nTTTT\n");
        write_fasta(path_b, ">b\nTTTT\n>a\nACGT\n");
        let set_a = ReferenceSet::from_fasta(path_a)?;
        let set_b = ReferenceSet::from_fasta(path_b)?;
        std::fs::remove_file(path_a).unwrap();
        std::fs::remove_file(path_b).unwrap();

        assert_eq!(set_a.crc64(), set_b.crc64());
        Ok(())
    }

    #[test]
    fn test_crc64_depends_on_content() -> Result<()> {
        let path_a = "test_refset_content_a.fa";
        let path_b = "test_refset_content_b.fa";
        write_fasta(path_a, ">a\nACGT\n");
        write_fasta(path_b, ">a\nACGA\n");
        let set_a = ReferenceSet::from_fasta(path_a)?;
        let set_b = ReferenceSet::from_fasta(path_b)?;
        std::fs::remove_file(path_a).unwrap();
        std::fs::remove_file(path_b).unwrap();

        assert_ne!(set_a.crc64(), set_b.crc64());
        Ok(())
    }

    #[test]
    fn test_binding_roundtrip() -> Result<()> {
        let path = "test_refset_binding.fa";
        write_fasta(path, ">a\nACGT\n>b\nTTTTT\n");
        let set = ReferenceSet::from_fasta(path)?;
        std::fs::remove_file(path).unwrap();

        let mut buf = Vec::new();
        set.write_binding(&mut buf)?;
        set.verify_binding(&mut buf.as_slice())?;
        Ok(())
    }

    #[test]
    fn test_binding_rejects_different_set() -> Result<()> {
        let path_a = "test_refset_reject_a.fa";
        let path_b = "test_refset_reject_b.fa";
        write_fasta(path_a, ">a\nACGT\n");
        write_fasta(path_b, ">a\nACGG\n");
        let set_a = ReferenceSet::from_fasta(path_a)?;
        let set_b = ReferenceSet::from_fasta(path_b)?;
        std::fs::remove_file(path_a).unwrap();
        std::fs::remove_file(path_b).unwrap();

        let mut buf = Vec::new();
        set_a.write_binding(&mut buf)?;
        let err = set_b.verify_binding(&mut buf.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            Error::ReadError(ReadError::ReferenceMismatch)
        ));
        Ok(())
    }

    #[test]
    fn test_binding_ignores_filename() -> Result<()> {
        let path_a = "test_refset_fname_a.fa";
        let path_b = "test_refset_fname_b.fa";
        let content = ">a\nACGT\n";
        write_fasta(path_a, content);
        write_fasta(path_b, content);
        let set_a = ReferenceSet::from_fasta(path_a)?;
        let set_b = ReferenceSet::from_fasta(path_b)?;
        std::fs::remove_file(path_a).unwrap();
        std::fs::remove_file(path_b).unwrap();

        let mut buf = Vec::new();
        set_a.write_binding(&mut buf)?;
        set_b.verify_binding(&mut buf.as_slice())?;
        Ok(())
    }
}
