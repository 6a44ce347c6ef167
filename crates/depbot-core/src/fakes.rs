//! In-memory fakes for the collaborator traits (testing only)
//!
//! Provides `MemoryPlatform` and `MemoryWorkspace`, which satisfy the trait
//! contracts without a network or a git checkout. `MemoryPlatform` records
//! every call so tests can assert on the exact write operations of a pass.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{
    CreatedRequest, ExistingChangeRequest, FileUpdate, NewRequest, PlatformError, PlatformResult,
    RequestState, RequestUpdate, WorkspaceError,
};
use crate::platform::{Platform, Workspace};

// ---------------------------------------------------------------------------
// MemoryPlatform
// ---------------------------------------------------------------------------

/// One recorded call against [`MemoryPlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    ListOpenRequests,
    CreateBranch {
        name: String,
        base: String,
    },
    BranchExists {
        name: String,
    },
    DeleteBranch {
        name: String,
    },
    CommitChanges {
        branch: String,
        message: String,
        files: Vec<FileUpdate>,
        base: String,
    },
    CreateRequest(NewRequest),
    UpdateRequest {
        number: u64,
        update: RequestUpdate,
    },
    CloseRequest {
        number: u64,
    },
    AddComment {
        number: u64,
        text: String,
    },
}

impl PlatformCall {
    /// Whether the call mutates platform state.
    pub fn is_write(&self) -> bool {
        !matches!(
            self,
            PlatformCall::ListOpenRequests | PlatformCall::BranchExists { .. }
        )
    }
}

#[derive(Debug, Default)]
struct PlatformState {
    requests: BTreeMap<u64, ExistingChangeRequest>,
    /// Branch name → files of its last commit.
    branches: BTreeMap<String, Vec<FileUpdate>>,
    next_number: u64,
    calls: Vec<PlatformCall>,
    failing_titles: HashSet<String>,
    fail_listing: bool,
}

/// In-memory hosting platform.
#[derive(Debug)]
pub struct MemoryPlatform {
    author: String,
    state: Mutex<PlatformState>,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new("depbot[bot]")
    }
}

impl MemoryPlatform {
    /// `author` is recorded as the author of every request the fake creates.
    pub fn new(author: &str) -> Self {
        Self {
            author: author.to_string(),
            state: Mutex::new(PlatformState {
                next_number: 1,
                ..PlatformState::default()
            }),
        }
    }

    /// Seed an existing request (and its head branch).
    pub fn insert_request(&self, request: ExistingChangeRequest) {
        let mut state = self.state.lock().unwrap();
        state
            .branches
            .entry(request.head_branch.clone())
            .or_default();
        state.next_number = state.next_number.max(request.number + 1);
        state.requests.insert(request.number, request);
    }

    pub fn insert_branch(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.branches.entry(name.to_string()).or_default();
    }

    /// Make `create_request` fail for titles containing `needle`.
    pub fn fail_create_for(&self, needle: &str) {
        let mut state = self.state.lock().unwrap();
        state.failing_titles.insert(needle.to_string());
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.failing_titles.clear();
        state.fail_listing = false;
    }

    /// Make `list_open_requests` fail.
    pub fn fail_listing(&self) {
        self.state.lock().unwrap().fail_listing = true;
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn write_calls(&self) -> Vec<PlatformCall> {
        self.calls().into_iter().filter(|c| c.is_write()).collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn request(&self, number: u64) -> Option<ExistingChangeRequest> {
        self.state.lock().unwrap().requests.get(&number).cloned()
    }

    pub fn open_requests(&self) -> Vec<ExistingChangeRequest> {
        self.state
            .lock()
            .unwrap()
            .requests
            .values()
            .filter(|r| r.state == RequestState::Open)
            .cloned()
            .collect()
    }

    pub fn has_branch(&self, name: &str) -> bool {
        self.state.lock().unwrap().branches.contains_key(name)
    }

    /// Files of the last commit on `name`.
    pub fn branch_files(&self, name: &str) -> Option<Vec<FileUpdate>> {
        self.state.lock().unwrap().branches.get(name).cloned()
    }

    fn record(&self, call: PlatformCall) {
        self.state.lock().unwrap().calls.push(call);
    }
}

#[async_trait]
impl Platform for MemoryPlatform {
    async fn list_open_requests(&self) -> PlatformResult<Vec<ExistingChangeRequest>> {
        self.record(PlatformCall::ListOpenRequests);
        if self.state.lock().unwrap().fail_listing {
            return Err(PlatformError::Http("connection reset".to_string()));
        }
        Ok(self.open_requests())
    }

    async fn create_branch(&self, name: &str, base: &str) -> PlatformResult<()> {
        self.record(PlatformCall::CreateBranch {
            name: name.to_string(),
            base: base.to_string(),
        });
        let mut state = self.state.lock().unwrap();
        state.branches.insert(name.to_string(), Vec::new());
        Ok(())
    }

    async fn branch_exists(&self, name: &str) -> PlatformResult<bool> {
        self.record(PlatformCall::BranchExists {
            name: name.to_string(),
        });
        Ok(self.has_branch(name))
    }

    async fn delete_branch(&self, name: &str) -> PlatformResult<()> {
        self.record(PlatformCall::DeleteBranch {
            name: name.to_string(),
        });
        let mut state = self.state.lock().unwrap();
        state
            .branches
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| PlatformError::NotFound(format!("branch {name}")))
    }

    async fn commit_changes(
        &self,
        branch: &str,
        message: &str,
        files: &[FileUpdate],
        base: &str,
    ) -> PlatformResult<()> {
        self.record(PlatformCall::CommitChanges {
            branch: branch.to_string(),
            message: message.to_string(),
            files: files.to_vec(),
            base: base.to_string(),
        });
        let mut state = self.state.lock().unwrap();
        state.branches.insert(branch.to_string(), files.to_vec());
        Ok(())
    }

    async fn create_request(&self, request: &NewRequest) -> PlatformResult<CreatedRequest> {
        self.record(PlatformCall::CreateRequest(request.clone()));
        let mut state = self.state.lock().unwrap();
        if state
            .failing_titles
            .iter()
            .any(|needle| request.title.contains(needle.as_str()))
        {
            return Err(PlatformError::Api {
                status: 500,
                message: format!("refusing to create {:?}", request.title),
            });
        }

        let number = state.next_number;
        state.next_number += 1;
        state.requests.insert(
            number,
            ExistingChangeRequest {
                number,
                title: request.title.clone(),
                body: request.body.clone(),
                head_branch: request.head.clone(),
                base_branch: request.base.clone(),
                author: self.author.clone(),
                labels: request.labels.clone(),
                state: RequestState::Open,
            },
        );
        Ok(CreatedRequest {
            number,
            url: format!("https://example.test/pull/{number}"),
        })
    }

    async fn update_request(&self, number: u64, update: &RequestUpdate) -> PlatformResult<()> {
        self.record(PlatformCall::UpdateRequest {
            number,
            update: update.clone(),
        });
        let mut state = self.state.lock().unwrap();
        let request = state
            .requests
            .get_mut(&number)
            .ok_or_else(|| PlatformError::NotFound(format!("request #{number}")))?;
        request.title = update.title.clone();
        request.body = update.body.clone();
        request.labels = update.labels.clone();
        Ok(())
    }

    async fn close_request(&self, number: u64) -> PlatformResult<()> {
        self.record(PlatformCall::CloseRequest { number });
        let mut state = self.state.lock().unwrap();
        let request = state
            .requests
            .get_mut(&number)
            .ok_or_else(|| PlatformError::NotFound(format!("request #{number}")))?;
        request.state = RequestState::Closed;
        Ok(())
    }

    async fn add_comment(&self, number: u64, text: &str) -> PlatformResult<()> {
        self.record(PlatformCall::AddComment {
            number,
            text: text.to_string(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryWorkspace
// ---------------------------------------------------------------------------

/// In-memory working tree with per-revision file snapshots.
#[derive(Debug, Default)]
pub struct MemoryWorkspace {
    files: Mutex<BTreeMap<String, String>>,
    revs: Mutex<HashMap<String, BTreeMap<String, String>>>,
    resets: Mutex<Vec<String>>,
    fail_resets: AtomicBool,
    remote: Option<String>,
}

impl MemoryWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_remote(mut self, remote: &str) -> Self {
        self.remote = Some(remote.to_string());
        self
    }

    pub fn write(&self, path: &str, content: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
    }

    pub fn remove(&self, path: &str) {
        self.files.lock().unwrap().remove(path);
    }

    /// Make `path` readable at `rev` (e.g. `origin/depbot/update-npm`).
    pub fn set_rev_file(&self, rev: &str, path: &str, content: &str) {
        self.revs
            .lock()
            .unwrap()
            .entry(rev.to_string())
            .or_default()
            .insert(path.to_string(), content.to_string());
    }

    /// Bases passed to `reset_to_base`, in call order.
    pub fn resets(&self) -> Vec<String> {
        self.resets.lock().unwrap().clone()
    }

    pub fn fail_resets(&self, fail: bool) {
        self.fail_resets.store(fail, Ordering::SeqCst);
    }
}

impl Workspace for MemoryWorkspace {
    fn remote(&self) -> &str {
        self.remote.as_deref().unwrap_or("origin")
    }

    fn file_exists(&self, path: &str) -> bool {
        self.files.lock().unwrap().contains_key(path)
    }

    fn read_file(&self, path: &str) -> Result<String, WorkspaceError> {
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| {
                WorkspaceError::Io(io::Error::new(io::ErrorKind::NotFound, path.to_string()))
            })
    }

    fn show_file(&self, rev: &str, path: &str) -> Result<String, WorkspaceError> {
        self.revs
            .lock()
            .unwrap()
            .get(rev)
            .and_then(|files| files.get(path).cloned())
            .ok_or_else(|| WorkspaceError::MissingAtRev {
                rev: rev.to_string(),
                path: path.to_string(),
            })
    }

    fn reset_to_base(&self, base: &str) -> Result<(), WorkspaceError> {
        self.resets.lock().unwrap().push(base.to_string());
        if self.fail_resets.load(Ordering::SeqCst) {
            return Err(WorkspaceError::Git(format!(
                "cannot check out {base}: index.lock exists"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_request(title: &str, head: &str) -> NewRequest {
        NewRequest {
            title: title.to_string(),
            body: String::new(),
            head: head.to_string(),
            base: "main".to_string(),
            labels: vec![],
            reviewers: vec![],
            assignees: vec![],
        }
    }

    #[tokio::test]
    async fn test_created_requests_are_listed_open() {
        let platform = MemoryPlatform::default();
        let created = platform
            .create_request(&new_request("t", "depbot/update-npm"))
            .await
            .unwrap();
        let open = platform.list_open_requests().await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].number, created.number);
        assert_eq!(open[0].author, "depbot[bot]");

        platform.close_request(created.number).await.unwrap();
        assert!(platform.list_open_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_calls_exclude_reads() {
        let platform = MemoryPlatform::default();
        platform.list_open_requests().await.unwrap();
        platform.branch_exists("x").await.unwrap();
        platform.create_branch("x", "main").await.unwrap();
        assert_eq!(platform.calls().len(), 3);
        assert_eq!(platform.write_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_failing_create() {
        let platform = MemoryPlatform::default();
        platform.fail_create_for("docker");
        let err = platform
            .create_request(&new_request("update docker images", "depbot/update-docker"))
            .await
            .unwrap_err();
        assert!(matches!(err, PlatformError::Api { status: 500, .. }));
    }

    #[test]
    fn test_workspace_revisions() {
        let ws = MemoryWorkspace::new();
        ws.write("package.json", "{}");
        ws.set_rev_file("origin/b", "package.json", "{\"a\":1}");
        assert!(ws.file_exists("package.json"));
        assert_eq!(ws.show_file("origin/b", "package.json").unwrap(), "{\"a\":1}");
        assert!(matches!(
            ws.show_file("b", "package.json"),
            Err(WorkspaceError::MissingAtRev { .. })
        ));
        ws.fail_resets(true);
        assert!(ws.reset_to_base("main").is_err());
        assert_eq!(ws.resets(), vec!["main".to_string()]);
    }
}
