//! Last-course memory
//!
//! Remembers the course of the previous run so the CLI can default to it.
//!
//! # Overview
//!
//! - `SessionMemory` - the remembered course
//! - `MemoryStore` - JSON persistence with atomic writes

mod manager;
mod types;

pub use manager::MemoryStore;
pub use types::SessionMemory;

#[cfg(test)]
mod manager_tests;
