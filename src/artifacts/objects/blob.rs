//! Git blob object
//!
//! Blobs store file content. The graph only needs to know a blob exists,
//! so only the payload size is kept.
//!
//! ## Format
//!
//! On disk: `blob <size>\0<content>`

use crate::artifacts::objects::object::Unpackable;
use derive_new::new;
use std::io::{self, BufRead};

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Blob {
    size: u64,
}

impl Blob {
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Unpackable for Blob {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        // the header has already been read
        let size = io::copy(&mut reader, &mut io::sink())?;

        Ok(Blob::new(size))
    }
}
