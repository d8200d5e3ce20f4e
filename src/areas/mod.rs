//! Read-only views of an on-disk repository
//!
//! - `database`: Object database, loose objects and packs
//! - `pack`: Pack index and pack file decoding
//! - `refs`: Loose and packed references, HEAD
//! - `repository`: Locating the git directory and opening the above

pub mod database;
pub mod pack;
pub mod refs;
pub mod repository;
