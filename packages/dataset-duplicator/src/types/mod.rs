//! Domain types for duplication.

pub mod candidate;
pub mod config;
pub mod document;
pub mod status;
