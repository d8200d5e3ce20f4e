//! Git tree object
//!
//! Trees represent directory snapshots. They contain entries for files (blobs),
//! subdirectories (other trees) and submodules (commits of another repository),
//! along with their names and modes.
//!
//! ## Format
//!
//! On disk: `tree <size>\0<entries>`
//! Each entry: `<mode> <name>\0<20-byte-sha1>`

use crate::artifacts::objects::object::Unpackable;
use crate::artifacts::objects::object_id::ObjectId;
use anyhow::Context;
use derive_new::new;
use std::io::BufRead;

/// A single named entry of a tree
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct TreeEntry {
    pub name: String,
    pub mode: u32,
    pub oid: ObjectId,
}

/// Git tree object
///
/// Entries are kept in the order they are stored, which git keeps sorted by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, new)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    pub fn entries(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.iter()
    }

    pub fn into_entries(self) -> impl Iterator<Item = TreeEntry> {
        self.entries.into_iter()
    }
}

impl Unpackable for Tree {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        let mut entries = Vec::new();
        let mut reader = reader;

        // Reuse scratch buffers to reduce allocs
        let mut mode_bytes = Vec::new();
        let mut name_bytes = Vec::new();

        loop {
            mode_bytes.clear();
            // Read "mode " (space-delimited)
            let n = reader.read_until(b' ', &mut mode_bytes)?;
            if n == 0 {
                break; // clean EOF: no more entries
            }
            if mode_bytes.pop() != Some(b' ') {
                return Err(anyhow::anyhow!("unexpected EOF in mode"));
            }

            let mode_str = std::str::from_utf8(&mode_bytes)?;
            let mode = u32::from_str_radix(mode_str, 8)
                .with_context(|| format!("invalid tree entry mode {mode_str:?}"))?;

            // Read "name\0"
            name_bytes.clear();
            reader.read_until(b'\0', &mut name_bytes)?;
            if name_bytes.pop() != Some(b'\0') {
                return Err(anyhow::anyhow!("unexpected EOF in name"));
            }
            let name = String::from_utf8_lossy(&name_bytes).into_owned();

            let oid =
                ObjectId::read_h40_from(&mut reader).context("unexpected EOF in object id")?;

            entries.push(TreeEntry::new(name, mode, oid));
        }

        Ok(Tree { entries })
    }
}
