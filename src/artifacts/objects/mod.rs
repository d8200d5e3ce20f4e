//! Git object types
//!
//! Git stores all content as objects identified by SHA-1 hashes:
//!
//! - **Blob**: File content (raw bytes)
//! - **Tree**: Directory listing (names, modes, and object IDs)
//! - **Commit**: Snapshot with metadata (tree, parents, author, message)
//! - **Tag**: Annotated reference to another object
//!
//! Objects here are read-only: they are parsed from the `<type> <size>\0<content>`
//! format (or from pack entries) and never written back.

pub mod blob;
pub mod commit;
pub mod object;
pub mod object_id;
pub mod object_type;
pub mod tree;

/// Length of a SHA-1 hash in hexadecimal format
pub const OBJECT_ID_LENGTH: usize = 40;
