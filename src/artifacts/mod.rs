//! Graph data structures and algorithms
//!
//! - `core`: Run configuration
//! - `graph`: Snapshots of the object graph and their Graphviz form
//! - `objects`: Git object types (blob, tree, commit)
//! - `watch`: Change notifications, debouncing and renderer lifecycle

pub mod core;
pub mod graph;
pub mod objects;
pub mod watch;
