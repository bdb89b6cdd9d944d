//! Network transport layer for hgloc.
//!
//! This crate provides:
//! - `ObjectStore`: blocking object storage seam, with `S3ObjectStore` (aws-sdk-s3)
//!   and `MemoryObjectStore` (in-process, instrumented) backends
//! - `ObjectStoreClient`: tree upload/download, listing, presigning and JSON helpers
//!   over one bucket scope
//! - `PublicHttp`: anonymous GET of public objects (`UreqPublicHttp`) plus `public_url`

pub mod client;
pub mod error;
pub mod http;
pub mod memory;
pub mod object_store;
pub mod s3;

pub use client::{join_key, ObjectStoreClient, UploadReport};
pub use error::{HttpError, StoreError};
pub use http::{public_url, PublicHttp, UreqPublicHttp};
pub use memory::{CallCounts, MemoryObjectStore, MemoryPublicGateway};
pub use object_store::{ListPage, ObjectHead, ObjectStore, ObjectSummary, PutOptions};
pub use s3::S3ObjectStore;
