//! Command implementations
//!
//! Each command is an `impl Repository` block:
//!
//! - `dump`: Write one snapshot of the graph and exit
//! - `watch`: Keep a renderer showing the graph as the repository changes

pub mod dump;
pub mod watch;
