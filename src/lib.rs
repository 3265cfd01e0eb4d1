//! bomgraph: an in-memory business object model.
//!
//! Typed object pools keyed per type, a relation index for parent/child
//! links, and a deterministic walker that dumps, serializes and restores the
//! tree hanging off a single root.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod sample;
pub mod util;
