//! Store implementations.
//!
//! Available backends:
//! - `MemoryStore` - In-memory dataset (testing and development)
//! - `HttpStore` - Content lake HTTP API

pub mod http;
pub mod memory;

pub use http::{HttpStore, HttpStoreProvider};
pub use memory::{MemoryStore, MemoryStoreProvider};
