//! Git object identifier (SHA-1 hash)
//!
//! Object IDs are 40-character hexadecimal strings representing SHA-1 hashes.
//! They uniquely identify all objects in Git (blobs, trees, commits, tags).
//!
//! ## Storage
//!
//! Loose objects live in `.git/objects/<first-2-chars>/<remaining-38-chars>`,
//! packed objects are listed in binary form (20 bytes) inside pack indexes.

use crate::artifacts::objects::OBJECT_ID_LENGTH;
use std::io;
use std::path::PathBuf;

/// Git object identifier (SHA-1 hash)
///
/// A 40-character lowercase hexadecimal string that uniquely identifies an object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ObjectId(String);

impl ObjectId {
    /// Parse and validate an object ID from a string
    ///
    /// Upper-case digits are accepted and normalised to lower case, since
    /// that is the form every on-disk location uses.
    pub fn try_parse(id: String) -> anyhow::Result<Self> {
        if id.len() != OBJECT_ID_LENGTH {
            return Err(anyhow::anyhow!("Invalid object ID length: {}", id.len()));
        }
        if !id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(anyhow::anyhow!("Invalid object ID characters: {}", id));
        }
        Ok(Self(id.to_ascii_lowercase()))
    }

    /// Build an object ID from its raw 20-byte form
    pub fn from_raw(raw: &[u8]) -> anyhow::Result<Self> {
        if raw.len() != OBJECT_ID_LENGTH / 2 {
            anyhow::bail!("Invalid raw object ID length: {}", raw.len());
        }

        Ok(Self(raw.iter().map(|byte| format!("{byte:02x}")).collect()))
    }

    /// Read an object ID from binary format (20 bytes)
    ///
    /// Used when deserializing tree objects and reference deltas.
    pub fn read_h40_from<R: io::Read + ?Sized>(reader: &mut R) -> anyhow::Result<Self> {
        let mut raw = [0u8; OBJECT_ID_LENGTH / 2];
        reader.read_exact(&mut raw)?;

        Self::from_raw(&raw)
    }

    /// Convert to file system path for loose object storage
    ///
    /// Splits the hash as `XX/YYYYYY...` where XX is the first 2 chars.
    pub fn to_path(&self) -> PathBuf {
        let (dir, file) = self.0.split_at(2);
        PathBuf::from(dir).join(file)
    }

    /// Abbreviate the object ID to its first `len` characters
    ///
    /// Lengths beyond the full identifier yield the full identifier.
    pub fn abbreviate(&self, len: usize) -> &str {
        self.0.get(..len).unwrap_or(&self.0)
    }
}

impl AsRef<str> for ObjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
