//! Graph nodes and the statements they contribute
//!
//! Every entity writes its own node declaration followed by its outgoing
//! edges, as Graphviz statements:
//!
//! ```text
//! "<label>" [<node attributes>]
//! "<from>" -> "<to>" [<edge attributes>]
//! ```
//!
//! Object labels are abbreviated to the snapshot's shorten length,
//! reference names are always written in full.

use crate::artifacts::graph::source::HeadTarget;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::TreeEntry;
use derive_new::new;
use std::borrow::Cow;
use std::io::{self, Write};

const BLOB_STYLE: &str = r##"shape=box,style=filled,fillcolor="#ddddff",color="#bbbbff""##;
const TREE_STYLE: &str = r##"shape=oval,style=filled,fillcolor="#99ff99""##;
const TREE_EDGE_LABEL_COLOR: &str = "#666666";
const COMMIT_STYLE: &str = r##"shape=hexagon,style=filled,fillcolor="#ffff99""##;
const REFERENCE_STYLE: &str = r##"shape=box,style=filled,fillcolor="#9999ff""##;
const SYMBOLIC_REFERENCE_STYLE: &str = r##"shape=box,style=filled,fillcolor="#ff9999""##;

/// Write the graph fragment describing one entity
pub trait Describe {
    fn describe(&self, shorten: usize, sink: &mut dyn Write) -> io::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct BlobNode {
    pub oid: ObjectId,
}

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct TreeNode {
    pub oid: ObjectId,
    pub entries: Vec<TreeEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct CommitNode {
    pub oid: ObjectId,
    pub tree: ObjectId,
    pub parents: Vec<ObjectId>,
}

/// A direct reference, or any non-HEAD reference once resolved
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct NamedReference {
    pub name: String,
    pub target: ObjectId,
}

/// HEAD, drawn towards whatever it literally contains
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct SymbolicReference {
    pub name: String,
    pub target: HeadTarget,
}

/// Every kind of node a snapshot can hold
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entity {
    Blob(BlobNode),
    Tree(TreeNode),
    Commit(CommitNode),
    Reference(NamedReference),
    Symbolic(SymbolicReference),
}

/// Escape a label for a double-quoted Graphviz string
fn quoted(label: &str) -> Cow<'_, str> {
    if label.contains(['"', '\\']) {
        Cow::Owned(label.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        Cow::Borrowed(label)
    }
}

fn write_node(sink: &mut dyn Write, label: &str, style: &str) -> io::Result<()> {
    writeln!(sink, "\"{}\" [{}]", quoted(label), style)
}

fn write_edge(sink: &mut dyn Write, from: &str, to: &str) -> io::Result<()> {
    writeln!(sink, "\"{}\" -> \"{}\"", quoted(from), quoted(to))
}

impl Describe for BlobNode {
    fn describe(&self, shorten: usize, sink: &mut dyn Write) -> io::Result<()> {
        write_node(sink, self.oid.abbreviate(shorten), BLOB_STYLE)
    }
}

impl Describe for TreeNode {
    fn describe(&self, shorten: usize, sink: &mut dyn Write) -> io::Result<()> {
        let label = self.oid.abbreviate(shorten);
        write_node(sink, label, TREE_STYLE)?;

        for entry in &self.entries {
            writeln!(
                sink,
                "\"{}\" -> \"{}\" [label=\"{}\",fontcolor=\"{}\"]",
                label,
                entry.oid.abbreviate(shorten),
                quoted(&entry.name),
                TREE_EDGE_LABEL_COLOR
            )?;
        }

        Ok(())
    }
}

impl Describe for CommitNode {
    fn describe(&self, shorten: usize, sink: &mut dyn Write) -> io::Result<()> {
        let label = self.oid.abbreviate(shorten);
        write_node(sink, label, COMMIT_STYLE)?;
        write_edge(sink, label, self.tree.abbreviate(shorten))?;

        for parent in &self.parents {
            write_edge(sink, label, parent.abbreviate(shorten))?;
        }

        Ok(())
    }
}

impl Describe for NamedReference {
    fn describe(&self, shorten: usize, sink: &mut dyn Write) -> io::Result<()> {
        write_node(sink, &self.name, REFERENCE_STYLE)?;
        write_edge(sink, &self.name, self.target.abbreviate(shorten))
    }
}

impl Describe for SymbolicReference {
    fn describe(&self, shorten: usize, sink: &mut dyn Write) -> io::Result<()> {
        write_node(sink, &self.name, SYMBOLIC_REFERENCE_STYLE)?;

        match &self.target {
            HeadTarget::Symbolic(alias) => write_edge(sink, &self.name, alias),
            HeadTarget::Direct(oid) => write_edge(sink, &self.name, oid.abbreviate(shorten)),
        }
    }
}

impl Describe for Entity {
    fn describe(&self, shorten: usize, sink: &mut dyn Write) -> io::Result<()> {
        match self {
            Entity::Blob(blob) => blob.describe(shorten, sink),
            Entity::Tree(tree) => tree.describe(shorten, sink),
            Entity::Commit(commit) => commit.describe(shorten, sink),
            Entity::Reference(reference) => reference.describe(shorten, sink),
            Entity::Symbolic(reference) => reference.describe(shorten, sink),
        }
    }
}
