//! Authentication primitives.
//!
//! - [`jwt`] -- access-token generation and validation.

pub mod jwt;
