//! Row structs and insert DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` entity struct matching
//! the database row and, where rows are created by callers, a create DTO.

pub mod audit;
pub mod campaign;
pub mod channel_account;
pub mod conversation;
pub mod recipient;
