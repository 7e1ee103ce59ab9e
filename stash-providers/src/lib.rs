// SPDX-License-Identifier: AGPL-3.0-or-later
//! Storage providers for Stash
//!
//! Backends that implement the authoritative [`stash_core::Storage`] contract.

#[cfg(feature = "local")]
mod local;
mod memory;

#[cfg(feature = "local")]
pub use local::LocalStorage;
pub use memory::MemoryStorage;
