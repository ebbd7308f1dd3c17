//! Pure domain logic for the fortune orchestration engine.
//!
//! Nothing in this crate performs I/O: category classification, expiry
//! arithmetic, input hashing, the deterministic fallback generator and the
//! ledger's sub-balance rules all live here so every other crate shares one
//! source of truth.

pub mod category;
pub mod error;
pub mod fallback;
pub mod hashing;
pub mod ledger;
pub mod profile;
pub mod schedule;
pub mod types;
