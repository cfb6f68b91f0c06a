//! Domain components behind the HTTP layer.
//!
//! Each component receives its store and blob dependencies at construction
//! and holds no other state.

mod authz;
mod files;
mod groups;
mod identity;
mod sharing;

pub use authz::Authorizer;
pub use files::{ContentStream, FileCoordinator, FileUpdate, NewFile, resolve_version_name};
pub use groups::{GroupHierarchy, GroupUpdate, NewGroup, assemble_tree};
pub use identity::{IdentityService, LoginOutcome, NewAccount, UserUpdate};
pub use sharing::{SharingLedger, merge_shared_files};

use std::future::Future;
use std::time::Duration;

use crate::blob::BlobError;
use crate::error::{Error, Result};

/// Bounds a blob operation by `limit`, mapping expiry to `BlobTimeout`.
async fn blob_call<T>(
    limit: Duration,
    op: impl Future<Output = std::result::Result<T, BlobError>>,
) -> Result<T> {
    match tokio::time::timeout(limit, op).await {
        Ok(result) => result.map_err(Error::from),
        Err(_) => Err(Error::BlobTimeout),
    }
}
