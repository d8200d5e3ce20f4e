//! Read-only views of a repository consumed by the snapshot builder
//!
//! The on-disk [`Database`](crate::areas::database::Database) and
//! [`Refs`](crate::areas::refs::Refs) implement these, and so can in-memory
//! fixtures.

use crate::artifacts::objects::object::ObjectBox;
use crate::artifacts::objects::object_id::ObjectId;

pub const HEAD_REF_NAME: &str = "HEAD";

/// Enumeration and lookup of stored objects
pub trait ObjectStore {
    /// Every object identifier in the store, deduplicated and sorted
    fn object_ids(&self) -> anyhow::Result<Vec<ObjectId>>;

    fn parse_object(&self, object_id: &ObjectId) -> anyhow::Result<ObjectBox>;
}

/// Enumeration and resolution of references
pub trait ReferenceStore {
    /// Every reference name below `refs/`, sorted
    fn list_refs(&self) -> anyhow::Result<Vec<String>>;

    /// Follow a reference to the object it ultimately names
    ///
    /// Returns `None` when the reference, or a symbolic reference on its
    /// chain, points at a name that does not exist.
    fn resolve(&self, name: &str) -> anyhow::Result<Option<ObjectId>>;

    /// What HEAD literally contains, without following it
    fn read_head(&self) -> anyhow::Result<HeadTarget>;
}

/// The raw target of HEAD
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadTarget {
    /// `ref: <name>`, the usual attached HEAD
    Symbolic(String),
    /// A detached HEAD holding an object ID
    Direct(ObjectId),
}

impl<T: ObjectStore + ?Sized> ObjectStore for &T {
    fn object_ids(&self) -> anyhow::Result<Vec<ObjectId>> {
        (**self).object_ids()
    }

    fn parse_object(&self, object_id: &ObjectId) -> anyhow::Result<ObjectBox> {
        (**self).parse_object(object_id)
    }
}

impl<T: ReferenceStore + ?Sized> ReferenceStore for &T {
    fn list_refs(&self) -> anyhow::Result<Vec<String>> {
        (**self).list_refs()
    }

    fn resolve(&self, name: &str) -> anyhow::Result<Option<ObjectId>> {
        (**self).resolve(name)
    }

    fn read_head(&self) -> anyhow::Result<HeadTarget> {
        (**self).read_head()
    }
}
