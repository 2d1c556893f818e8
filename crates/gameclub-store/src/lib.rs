//! Store adapter for the gameclub aggregate engine.
//!
//! This crate provides:
//! - The [`Store`] / [`Transaction`] traits the engine is written against
//! - [`MemoryStore`], a single-writer in-memory implementation
//! - The key schema shared by writers and readers ([`keys`])
//!
//! ## Transactions
//!
//! Every multi-key update is staged on a transaction and made visible with a
//! single `commit`. A transaction that is dropped, or whose commit fails,
//! leaves the store untouched.

mod error;
pub mod keys;
mod memory;
mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use store::{Store, Transaction};
