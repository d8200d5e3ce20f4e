//! Shared settings
//!
//! - `config`: what a graph run is configured with, whichever mode it runs in

pub mod config;
