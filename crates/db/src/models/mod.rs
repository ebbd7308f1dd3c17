//! Row structs and insert DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row and the DTOs the repositories accept.

pub mod fortune;
pub mod token;
