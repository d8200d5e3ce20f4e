use crate::areas::repository::Repository;
use crate::artifacts::graph::serializer::serialize;
use crate::artifacts::graph::snapshot::{HeadVisibility, SnapshotBuilder};
use std::io::Write;

impl Repository {
    pub fn dump(&self, head: HeadVisibility, writer: &mut dyn Write) -> anyhow::Result<()> {
        let snapshot = SnapshotBuilder::new(self.database(), self.refs(), head).build()?;

        serialize(&snapshot, snapshot.shorten_length(), writer)?;
        writer.flush()?;

        Ok(())
    }
}
