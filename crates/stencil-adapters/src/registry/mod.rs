//! Blueprint registry adapters.

mod memory;

pub use memory::InMemoryRegistry;
