//! Git references (branches, HEAD, tags)
//!
//! This module reads Git references, the human-readable names pointing into
//! the object database. References can be:
//! - Direct: Containing a SHA-1 object ID
//! - Symbolic: Pointing to another reference (e.g., HEAD -> refs/heads/master)
//!
//! ## Storage
//!
//! References live either as loose text files below `.git/refs` or as lines
//! of the `.git/packed-refs` file. A loose file wins over a packed line of
//! the same name, since git only packs refs it is not currently updating.
//!
//! Loose files contain either:
//! - A 40-character SHA-1 hash (direct reference)
//! - `ref: <path>` for symbolic references

use crate::artifacts::graph::source::{HEAD_REF_NAME, HeadTarget, ReferenceStore};
use crate::artifacts::objects::object_id::ObjectId;
use anyhow::Context;
use derive_new::new;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::SystemTime;
use walkdir::WalkDir;

/// Regex pattern for parsing symbolic references
const SYMREF_REGEX: &str = r"^ref: (.+)$";

static SYMREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(SYMREF_REGEX).expect("symbolic ref pattern is valid"));

const REFS_DIR: &str = "refs";
const PACKED_REFS_FILE: &str = "packed-refs";
const LOCK_SUFFIX: &str = ".lock";
/// Same bound git uses when following symbolic references
const MAX_SYMREF_DEPTH: usize = 5;

/// Read-only Git references manager
#[derive(Debug, new)]
pub struct Refs {
    /// Directory holding `refs/` and `packed-refs` (the common git directory)
    path: Box<Path>,
    /// Directory holding HEAD (differs from `path` in linked worktrees)
    head_dir: Box<Path>,
    /// Last parsed `packed-refs`, reused while the file is unchanged
    #[new(default)]
    packed: Mutex<Option<(FileStamp, Arc<PackedRefs>)>>,
}

type PackedRefs = BTreeMap<String, ObjectId>;

/// Identifies one version of a file on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: SystemTime,
    len: u64,
}

/// Content of a single reference
#[derive(Debug, Clone, PartialEq, Eq)]
enum SymRefOrOid {
    /// Symbolic reference pointing to another ref
    SymRef { sym_ref_name: String },
    /// Direct object ID
    Oid(ObjectId),
}

impl SymRefOrOid {
    fn parse(content: &str) -> anyhow::Result<Option<SymRefOrOid>> {
        let content = content.trim();

        if content.is_empty() {
            return Ok(None);
        }

        if let Some(symref_match) = SYMREF.captures(content) {
            Ok(Some(SymRefOrOid::SymRef {
                sym_ref_name: symref_match[1].trim().to_string(),
            }))
        } else {
            Ok(Some(SymRefOrOid::Oid(ObjectId::try_parse(
                content.to_string(),
            )?)))
        }
    }

    fn read_symref_or_oid(path: &Path) -> anyhow::Result<Option<SymRefOrOid>> {
        // directories share names with ref namespaces (refs/heads)
        if !path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read ref file at {:?}", path))?;

        Self::parse(&content).with_context(|| format!("invalid ref file at {:?}", path))
    }
}

impl Refs {
    pub fn refs_path(&self) -> Box<Path> {
        self.path.join(REFS_DIR).into_boxed_path()
    }

    pub fn head_path(&self) -> Box<Path> {
        self.head_dir.join(HEAD_REF_NAME).into_boxed_path()
    }

    fn packed_refs_path(&self) -> Box<Path> {
        self.path.join(PACKED_REFS_FILE).into_boxed_path()
    }

    /// Names of all loose refs below `refs/`, relative to the git directory
    fn list_loose_refs(&self) -> anyhow::Result<Vec<String>> {
        let refs_path = self.refs_path();
        if !refs_path.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in WalkDir::new(&refs_path) {
            let entry =
                entry.with_context(|| format!("failed to walk refs at {:?}", refs_path))?;
            if !entry.file_type().is_file() {
                continue;
            }

            let relative_path = entry.path().strip_prefix(&self.path)?;
            let name = relative_path
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            if !name.ends_with(LOCK_SUFFIX) {
                names.push(name);
            }
        }

        Ok(names)
    }

    /// Entries of the `packed-refs` file, without peeled (`^`) lines
    ///
    /// The file is parsed again only when its size or modification time
    /// changed since the previous call.
    fn read_packed_refs(&self) -> anyhow::Result<Arc<PackedRefs>> {
        let path = self.packed_refs_path();
        if !path.is_file() {
            return Ok(Arc::default());
        }

        let metadata = std::fs::metadata(&path)
            .with_context(|| format!("failed to stat packed refs at {:?}", path))?;
        let stamp = FileStamp {
            modified: metadata.modified()?,
            len: metadata.len(),
        };

        let mut packed = self
            .packed
            .lock()
            .map_err(|_| anyhow::anyhow!("packed refs cache is poisoned"))?;
        if let Some((cached, refs)) = packed.as_ref()
            && *cached == stamp
        {
            return Ok(Arc::clone(refs));
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read packed refs at {:?}", path))?;
        let refs = Arc::new(Self::parse_packed_refs(&content)?);
        *packed = Some((stamp, Arc::clone(&refs)));

        Ok(refs)
    }

    fn parse_packed_refs(content: &str) -> anyhow::Result<PackedRefs> {
        let mut refs = BTreeMap::new();

        for line in content.lines() {
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') || line.starts_with('^') {
                continue;
            }

            let (oid, name) = line
                .split_once(' ')
                .with_context(|| format!("malformed packed ref line {line:?}"))?;
            refs.insert(name.to_string(), ObjectId::try_parse(oid.to_string())?);
        }

        Ok(refs)
    }

    fn read_ref_content(&self, name: &str) -> anyhow::Result<Option<SymRefOrOid>> {
        let path = if name == HEAD_REF_NAME {
            self.head_path()
        } else {
            self.path.join(name).into_boxed_path()
        };

        match SymRefOrOid::read_symref_or_oid(&path)? {
            Some(content) => Ok(Some(content)),
            None => Ok(self
                .read_packed_refs()?
                .get(name)
                .cloned()
                .map(SymRefOrOid::Oid)),
        }
    }
}

impl ReferenceStore for Refs {
    fn list_refs(&self) -> anyhow::Result<Vec<String>> {
        let mut names = self.list_loose_refs()?.into_iter().collect::<BTreeSet<_>>();
        names.extend(self.read_packed_refs()?.keys().cloned());

        Ok(names.into_iter().collect())
    }

    fn resolve(&self, name: &str) -> anyhow::Result<Option<ObjectId>> {
        let mut current = name.to_string();

        for _ in 0..=MAX_SYMREF_DEPTH {
            match self.read_ref_content(&current)? {
                Some(SymRefOrOid::Oid(oid)) => return Ok(Some(oid)),
                Some(SymRefOrOid::SymRef { sym_ref_name }) => current = sym_ref_name,
                None => return Ok(None),
            }
        }

        anyhow::bail!("symbolic reference chain from {name} is too deep")
    }

    fn read_head(&self) -> anyhow::Result<HeadTarget> {
        let head_path = self.head_path();

        match SymRefOrOid::read_symref_or_oid(&head_path)? {
            Some(SymRefOrOid::SymRef { sym_ref_name }) => Ok(HeadTarget::Symbolic(sym_ref_name)),
            Some(SymRefOrOid::Oid(oid)) => Ok(HeadTarget::Direct(oid)),
            None => anyhow::bail!("HEAD not found at {:?}", head_path),
        }
    }
}
