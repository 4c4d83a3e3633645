//! Outbound media staging.
//!
//! [`MediaStagingService`] validates an attachment, writes it to an
//! [`ObjectStore`] under a tenant/conversation scoped path, and hands back a
//! [`MediaAsset`] whose public URL is the only handle passed downstream.

pub mod config;
pub mod local;
pub mod object_store;
pub mod s3;
pub mod staging;

pub use config::{MediaBackend, MediaConfig};
pub use local::LocalObjectStore;
pub use object_store::{ObjectStore, ObjectStoreError};
pub use s3::S3ObjectStore;
pub use staging::{MediaAsset, MediaStagingService, MediaUpload, StagingError};
