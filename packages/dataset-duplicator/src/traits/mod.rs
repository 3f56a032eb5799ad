//! Trait seams between the duplication pipeline and its environment.

pub mod fetcher;
pub mod hook;
pub mod store;
