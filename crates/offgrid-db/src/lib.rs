//! OffGridFlow Database: in-memory store implementing the
//! `offgrid-core` repository traits.
//!
//! This crate provides:
//! - A shared, thread-safe table handle ([`MemoryDb`])
//! - One repository per entity ([`repository`])
//!
//! Every read returns an owned copy; callers can never mutate stored
//! state through a returned value.

mod memory;
pub mod repository;

pub use memory::MemoryDb;
