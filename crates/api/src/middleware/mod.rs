//! Authentication and authorization extractors.
//!
//! - [`auth::AuthUser`] -- the caller from a JWT Bearer token.
//! - [`rbac::RequireViewer`], [`rbac::RequireOperator`], [`rbac::RequireAdmin`]
//!   -- minimum-role gates built on [`relay_core::roles::authorize`].

pub mod auth;
pub mod rbac;
