//! Point-in-time materialization of the object and reference graph
//!
//! A [`Snapshot`] maps a display key to one entity: object IDs for objects,
//! reference names for references. It is built once per render by a
//! [`SnapshotBuilder`] and thrown away afterwards.

use crate::artifacts::graph::entity::{
    BlobNode, CommitNode, Entity, NamedReference, SymbolicReference, TreeNode,
};
use crate::artifacts::graph::error::SnapshotError;
use crate::artifacts::graph::shorten::shorten_length;
use crate::artifacts::graph::source::{HEAD_REF_NAME, HeadTarget, ObjectStore, ReferenceStore};
use crate::artifacts::objects::object::ObjectBox;
use crate::artifacts::objects::object_id::ObjectId;
use derive_new::new;
use std::collections::HashMap;

/// Whether HEAD is drawn when its target is not part of the snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HeadVisibility {
    /// Always draw HEAD
    #[default]
    Show,
    /// Leave HEAD out when it dangles (fresh repository, unborn branch)
    HideBroken,
}

#[derive(Debug, Default)]
pub struct Snapshot {
    entities: HashMap<String, Entity>,
    /// Every object inserted, used to compute the shorten length
    object_ids: Vec<ObjectId>,
}

impl Snapshot {
    /// Insert an entity under `key`
    ///
    /// An existing entity with the same key is replaced: the last write wins,
    /// even across objects and references.
    pub fn insert(&mut self, key: String, entity: Entity) {
        self.entities.insert(key, entity);
    }

    pub fn insert_object(&mut self, oid: ObjectId, entity: Entity) {
        self.insert(oid.to_string(), entity);
        self.object_ids.push(oid);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entities.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Entity> {
        self.entities.get(key)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn object_ids(&self) -> &[ObjectId] {
        &self.object_ids
    }

    /// Abbreviation length keeping this snapshot's object IDs distinct
    pub fn shorten_length(&self) -> usize {
        shorten_length(&self.object_ids)
    }
}

/// Walks an object store and a reference store into a [`Snapshot`]
#[derive(Debug, new)]
pub struct SnapshotBuilder<O, R> {
    objects: O,
    refs: R,
    head_visibility: HeadVisibility,
}

impl<O: ObjectStore, R: ReferenceStore> SnapshotBuilder<O, R> {
    pub fn build(&self) -> Result<Snapshot, SnapshotError> {
        let mut snapshot = Snapshot::default();

        self.collect_objects(&mut snapshot)?;
        self.collect_refs(&mut snapshot)?;
        self.collect_head(&mut snapshot)?;

        tracing::debug!(
            entities = snapshot.len(),
            objects = snapshot.object_ids().len(),
            "snapshot taken"
        );

        Ok(snapshot)
    }

    fn collect_objects(&self, snapshot: &mut Snapshot) -> Result<(), SnapshotError> {
        let oids = self
            .objects
            .object_ids()
            .map_err(SnapshotError::StoreAccess)?;

        for oid in oids {
            let object = self
                .objects
                .parse_object(&oid)
                .map_err(SnapshotError::StoreAccess)?;

            let entity = match object {
                ObjectBox::Blob(blob) => {
                    tracing::trace!(%oid, size = blob.size(), "blob");
                    Entity::Blob(BlobNode::new(oid.clone()))
                }
                ObjectBox::Tree(tree) => {
                    Entity::Tree(TreeNode::new(oid.clone(), (*tree).into_entries().collect()))
                }
                ObjectBox::Commit(commit) => Entity::Commit(CommitNode::new(
                    oid.clone(),
                    commit.tree_oid().clone(),
                    commit.parents().to_vec(),
                )),
                ObjectBox::Unsupported(object_type) => {
                    tracing::trace!(%oid, %object_type, "skipping unsupported object");
                    continue;
                }
            };

            snapshot.insert_object(oid, entity);
        }

        Ok(())
    }

    fn collect_refs(&self, snapshot: &mut Snapshot) -> Result<(), SnapshotError> {
        let names = self
            .refs
            .list_refs()
            .map_err(SnapshotError::ReferenceResolution)?;

        for name in names {
            let target = self
                .refs
                .resolve(&name)
                .map_err(SnapshotError::ReferenceResolution)?;

            match target {
                Some(target) => {
                    let reference = NamedReference::new(name.clone(), target);
                    snapshot.insert(name, Entity::Reference(reference));
                }
                None => tracing::warn!(reference = %name, "skipping dangling symbolic reference"),
            }
        }

        Ok(())
    }

    fn collect_head(&self, snapshot: &mut Snapshot) -> Result<(), SnapshotError> {
        let target = self
            .refs
            .read_head()
            .map_err(SnapshotError::ReferenceResolution)?;

        let visible = match self.head_visibility {
            HeadVisibility::Show => true,
            HeadVisibility::HideBroken => match &target {
                HeadTarget::Symbolic(alias) => snapshot.contains_key(alias),
                HeadTarget::Direct(oid) => snapshot.contains_key(oid.as_ref()),
            },
        };

        if visible {
            let head = SymbolicReference::new(HEAD_REF_NAME.to_string(), target);
            snapshot.insert(HEAD_REF_NAME.to_string(), Entity::Symbolic(head));
        } else {
            tracing::debug!(?target, "hiding broken HEAD");
        }

        Ok(())
    }
}
