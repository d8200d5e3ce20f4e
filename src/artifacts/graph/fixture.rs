//! In-memory stores for exercising the graph without a repository on disk

use crate::artifacts::graph::source::{HeadTarget, ObjectStore, ReferenceStore};
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object::ObjectBox;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::{Tree, TreeEntry};
use std::collections::BTreeMap;

/// Object ID made of `prefix` padded with zeros
pub fn oid(prefix: &str) -> ObjectId {
    ObjectId::try_parse(format!("{prefix:0<40}")).unwrap()
}

#[derive(Debug, Clone, Default)]
pub struct MemoryObjects {
    objects: BTreeMap<ObjectId, ObjectBox>,
    failing: bool,
}

impl MemoryObjects {
    pub fn failing() -> Self {
        MemoryObjects {
            objects: BTreeMap::new(),
            failing: true,
        }
    }

    pub fn with_blob(mut self, id: &str) -> Self {
        let blob = Blob::new(7);
        self.objects.insert(oid(id), ObjectBox::Blob(Box::new(blob)));
        self
    }

    pub fn with_tree(mut self, id: &str, entries: &[(&str, &str)]) -> Self {
        let entries = entries
            .iter()
            .map(|(name, target)| TreeEntry::new(name.to_string(), 0o100644, oid(target)))
            .collect();
        self.objects
            .insert(oid(id), ObjectBox::Tree(Box::new(Tree::new(entries))));
        self
    }

    pub fn with_commit(mut self, id: &str, tree: &str, parents: &[&str]) -> Self {
        let commit = Commit::new(oid(tree), parents.iter().map(|parent| oid(parent)).collect());
        self.objects
            .insert(oid(id), ObjectBox::Commit(Box::new(commit)));
        self
    }

    pub fn with_unsupported(mut self, id: &str, object_type: ObjectType) -> Self {
        self.objects
            .insert(oid(id), ObjectBox::Unsupported(object_type));
        self
    }
}

impl ObjectStore for MemoryObjects {
    fn object_ids(&self) -> anyhow::Result<Vec<ObjectId>> {
        if self.failing {
            anyhow::bail!("object store is unreadable");
        }
        Ok(self.objects.keys().cloned().collect())
    }

    fn parse_object(&self, object_id: &ObjectId) -> anyhow::Result<ObjectBox> {
        self.objects
            .get(object_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("object {object_id} not found"))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryRefs {
    /// `None` for dangling references
    refs: BTreeMap<String, Option<ObjectId>>,
    head: Option<HeadTarget>,
}

impl MemoryRefs {
    pub fn attached(branch: &str) -> Self {
        MemoryRefs {
            refs: BTreeMap::new(),
            head: Some(HeadTarget::Symbolic(branch.to_string())),
        }
    }

    pub fn detached(id: &str) -> Self {
        MemoryRefs {
            refs: BTreeMap::new(),
            head: Some(HeadTarget::Direct(oid(id))),
        }
    }

    pub fn headless() -> Self {
        MemoryRefs::default()
    }

    pub fn with_ref(mut self, name: &str, target: &str) -> Self {
        self.refs.insert(name.to_string(), Some(oid(target)));
        self
    }

    pub fn with_dangling(mut self, name: &str) -> Self {
        self.refs.insert(name.to_string(), None);
        self
    }
}

impl ReferenceStore for MemoryRefs {
    fn list_refs(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.refs.keys().cloned().collect())
    }

    fn resolve(&self, name: &str) -> anyhow::Result<Option<ObjectId>> {
        Ok(self.refs.get(name).cloned().flatten())
    }

    fn read_head(&self) -> anyhow::Result<HeadTarget> {
        self.head
            .clone()
            .ok_or_else(|| anyhow::anyhow!("HEAD is missing"))
    }
}
