// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stash cache coordination
//!
//! [`CacheCoordinator`] keeps a volatile cache consistent with an
//! authoritative storage across reads, writes, renames, copies, removals and
//! touches.

mod coordinator;


pub use coordinator::CacheCoordinator;
