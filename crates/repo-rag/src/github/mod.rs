//! GitHub ingestion: API client, sync state and incremental sync

mod client;
mod repo;
mod state;
mod sync;

pub use client::{ChangeSet, GitHubClient};
pub use repo::RepoRef;
pub use state::{RepoSource, SyncState, SyncStateStore};
pub use sync::{RepoSyncer, SyncReport};
