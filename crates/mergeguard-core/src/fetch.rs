//! The change-set fetcher facade.
//!
//! The engine depends only on this interface; the concrete platform
//! client lives in the host crate. [`MockFetcher`] is an in-memory
//! implementation for tests, so the whole engine can be exercised without
//! a network. The facade guarantees that file content is returned exactly
//! as stored — line endings included — so line-number arithmetic stays
//! stable.

use std::collections::HashMap;
use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::{FetchError, FetchResult};

/// One changed path in a merge request, as reported by the platform.
///
/// At least one of `old_path` / `new_path` is non-empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileChange {
    #[serde(default)]
    pub old_path: String,
    #[serde(default)]
    pub new_path: String,
    #[serde(default)]
    pub new_file: bool,
    #[serde(default)]
    pub renamed: bool,
    #[serde(default)]
    pub deleted: bool,
    /// Unified diff body for this file; may be empty.
    #[serde(default)]
    pub diff: String,
}

impl FileChange {
    /// The path to evaluate: the new path, or the old one for deletions.
    pub fn effective_path(&self) -> &str {
        if self.new_path.is_empty() {
            &self.old_path
        } else {
            &self.new_path
        }
    }
}

/// Read operations the engine performs against the platform.
///
/// Implementations retry transient failures internally; the engine treats
/// any returned error as final for the file (or MR) in question.
pub trait ChangeFetcher: Send + Sync {
    /// The changed files of a merge request, in platform order.
    fn changes(
        &self,
        project: u64,
        mr: u64,
    ) -> impl Future<Output = FetchResult<Vec<FileChange>>> + Send;

    /// Full text of a file at a revision, byte-exact.
    fn file_content(
        &self,
        project: u64,
        revision: &str,
        path: &str,
    ) -> impl Future<Output = FetchResult<String>> + Send;

    /// Head revision of the MR's source branch.
    fn source_revision(&self, project: u64, mr: u64)
    -> impl Future<Output = FetchResult<String>> + Send;

    /// Head revision of the MR's target branch.
    fn target_revision(&self, project: u64, mr: u64)
    -> impl Future<Output = FetchResult<String>> + Send;
}

/// Post-decision actions, used by the host wrapping the engine — never by
/// the engine itself.
pub trait ReviewActions: Send + Sync {
    fn post_comment(
        &self,
        project: u64,
        mr: u64,
        body: &str,
    ) -> impl Future<Output = FetchResult<()>> + Send;

    fn approve(&self, project: u64, mr: u64) -> impl Future<Output = FetchResult<()>> + Send;

    fn reset_approval(&self, project: u64, mr: u64)
    -> impl Future<Output = FetchResult<()>> + Send;
}

/// In-memory fetcher for tests.
///
/// Pre-populate changes, file contents per revision, and branch revisions;
/// optionally inject failures or latency per path.
#[derive(Debug, Default)]
pub struct MockFetcher {
    changes: HashMap<(u64, u64), Vec<FileChange>>,
    files: HashMap<(String, String), String>,
    source_revisions: HashMap<(u64, u64), String>,
    target_revisions: HashMap<(u64, u64), String>,
    failing_paths: HashMap<String, String>,
    delay_per_fetch: Option<std::time::Duration>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_changes(&mut self, project: u64, mr: u64, changes: Vec<FileChange>) {
        self.changes.insert((project, mr), changes);
    }

    pub fn add_file(
        &mut self,
        revision: impl Into<String>,
        path: impl Into<String>,
        content: impl Into<String>,
    ) {
        self.files
            .insert((revision.into(), path.into()), content.into());
    }

    pub fn set_revisions(
        &mut self,
        project: u64,
        mr: u64,
        source: impl Into<String>,
        target: impl Into<String>,
    ) {
        self.source_revisions.insert((project, mr), source.into());
        self.target_revisions.insert((project, mr), target.into());
    }

    /// Make every fetch of `path` fail with the given message.
    pub fn fail_path(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.failing_paths.insert(path.into(), message.into());
    }

    /// Add latency to every fetch, for deadline tests.
    pub fn set_delay(&mut self, delay: std::time::Duration) {
        self.delay_per_fetch = Some(delay);
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay_per_fetch {
            tokio::time::sleep(delay).await;
        }
    }
}

impl ChangeFetcher for MockFetcher {
    async fn changes(&self, project: u64, mr: u64) -> FetchResult<Vec<FileChange>> {
        self.pause().await;
        self.changes
            .get(&(project, mr))
            .cloned()
            .ok_or_else(|| FetchError::Failed(format!("no such merge request !{mr}")))
    }

    async fn file_content(&self, _project: u64, revision: &str, path: &str) -> FetchResult<String> {
        self.pause().await;
        if let Some(message) = self.failing_paths.get(path) {
            return Err(FetchError::Failed(message.clone()));
        }
        self.files
            .get(&(revision.to_string(), path.to_string()))
            .cloned()
            .ok_or_else(|| FetchError::NotFound {
                path: path.to_string(),
                revision: revision.to_string(),
            })
    }

    async fn source_revision(&self, project: u64, mr: u64) -> FetchResult<String> {
        self.pause().await;
        self.source_revisions
            .get(&(project, mr))
            .cloned()
            .ok_or_else(|| FetchError::Failed(format!("no source revision for !{mr}")))
    }

    async fn target_revision(&self, project: u64, mr: u64) -> FetchResult<String> {
        self.pause().await;
        self.target_revisions
            .get(&(project, mr))
            .cloned()
            .ok_or_else(|| FetchError::Failed(format!("no target revision for !{mr}")))
    }
}
