use crate::artifacts::graph::entity::Describe;
use crate::artifacts::graph::snapshot::Snapshot;
use std::io::{self, Write};

pub const GRAPH_HEADER: &str = "digraph G {";
pub const GRAPH_TRAILER: &str = "}";

/// Write `snapshot` as one Graphviz digraph
///
/// Entities come out in no particular order; each one's node and edges stay
/// together. The sink is not flushed.
pub fn serialize(snapshot: &Snapshot, shorten: usize, sink: &mut dyn Write) -> io::Result<()> {
    writeln!(sink, "{GRAPH_HEADER}")?;

    for entity in snapshot.entities() {
        entity.describe(shorten, sink)?;
    }

    writeln!(sink, "{GRAPH_TRAILER}")
}
