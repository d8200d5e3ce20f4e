use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use anyhow::Result;
use std::io::BufRead;

pub trait Unpackable {
    /// Parse the payload of an object whose header has already been consumed
    fn deserialize(reader: impl BufRead) -> Result<Self>
    where
        Self: Sized;
}

/// A parsed object as read back from the database
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectBox {
    Blob(Box<Blob>),
    Tree(Box<Tree>),
    Commit(Box<Commit>),
    /// A kind the graph does not draw (annotated tags)
    Unsupported(ObjectType),
}

impl ObjectBox {
    pub fn parse(object_type: ObjectType, reader: impl BufRead) -> Result<Self> {
        match object_type {
            ObjectType::Blob => Ok(ObjectBox::Blob(Box::new(Blob::deserialize(reader)?))),
            ObjectType::Tree => Ok(ObjectBox::Tree(Box::new(Tree::deserialize(reader)?))),
            ObjectType::Commit => Ok(ObjectBox::Commit(Box::new(Commit::deserialize(reader)?))),
            other => Ok(ObjectBox::Unsupported(other)),
        }
    }
}
