//! InMemory 実装

mod registry;

pub use registry::InMemoryConnectionRegistry;
