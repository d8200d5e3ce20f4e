//! Git commit object
//!
//! Only the structural part of a commit matters to the graph: its tree and
//! its parents. Author, committer, extra headers and the message are skipped.
//!
//! ## Format
//!
//! On disk:
//! ```text
//! commit <size>\0
//! tree <tree-sha>
//! parent <parent-sha>
//! author <name> <email> <timestamp> <timezone>
//! committer <name> <email> <timestamp> <timezone>
//!
//! <commit message>
//! ```

use crate::artifacts::objects::object::Unpackable;
use crate::artifacts::objects::object_id::ObjectId;
use anyhow::Context;
use derive_new::new;
use std::io::BufRead;

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Commit {
    /// Tree object ID representing the directory snapshot
    tree_oid: ObjectId,
    /// Parent commit IDs (empty for a root commit, several for merges)
    parents: Vec<ObjectId>,
}

impl Commit {
    pub fn tree_oid(&self) -> &ObjectId {
        &self.tree_oid
    }

    pub fn parents(&self) -> &[ObjectId] {
        &self.parents
    }
}

impl Unpackable for Commit {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        let mut tree_oid = None;
        let mut parents = Vec::new();

        for line in reader.split(b'\n') {
            let line = line?;
            // headers end at the first empty line
            if line.is_empty() {
                break;
            }

            if let Some(oid) = line.strip_prefix(b"tree ") {
                let oid = String::from_utf8(oid.to_vec())?;
                tree_oid = Some(ObjectId::try_parse(oid)?);
            } else if let Some(oid) = line.strip_prefix(b"parent ") {
                let oid = String::from_utf8(oid.to_vec())?;
                parents.push(ObjectId::try_parse(oid)?);
            }
        }

        let tree_oid = tree_oid.context("Invalid commit object: missing tree line")?;

        Ok(Commit::new(tree_oid, parents))
    }
}
