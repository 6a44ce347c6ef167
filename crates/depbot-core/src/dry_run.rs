//! Platform wrapper that performs reads and only logs writes.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::info;

use crate::domain::{
    CreatedRequest, ExistingChangeRequest, FileUpdate, NewRequest, PlatformResult, RequestUpdate,
};
use crate::platform::Platform;

pub struct DryRunPlatform {
    inner: Arc<dyn Platform>,
    planned: Mutex<Vec<String>>,
}

impl DryRunPlatform {
    pub fn new(inner: Arc<dyn Platform>) -> Self {
        Self {
            inner,
            planned: Mutex::new(Vec::new()),
        }
    }

    /// Writes that would have been performed, in order.
    pub fn planned(&self) -> Vec<String> {
        self.planned.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn plan(&self, action: String) {
        info!(event = "dry_run.write", action = %action);
        if let Ok(mut planned) = self.planned.lock() {
            planned.push(action);
        }
    }
}

#[async_trait]
impl Platform for DryRunPlatform {
    async fn list_open_requests(&self) -> PlatformResult<Vec<ExistingChangeRequest>> {
        self.inner.list_open_requests().await
    }

    async fn create_branch(&self, name: &str, base: &str) -> PlatformResult<()> {
        self.plan(format!("create branch {name} from {base}"));
        Ok(())
    }

    async fn branch_exists(&self, name: &str) -> PlatformResult<bool> {
        self.inner.branch_exists(name).await
    }

    async fn delete_branch(&self, name: &str) -> PlatformResult<()> {
        self.plan(format!("delete branch {name}"));
        Ok(())
    }

    async fn commit_changes(
        &self,
        branch: &str,
        message: &str,
        files: &[FileUpdate],
        base: &str,
    ) -> PlatformResult<()> {
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        self.plan(format!(
            "commit {:?} to {branch} (from {base}): {}",
            message,
            paths.join(", ")
        ));
        Ok(())
    }

    async fn create_request(&self, request: &NewRequest) -> PlatformResult<CreatedRequest> {
        self.plan(format!("open request {:?} from {}", request.title, request.head));
        Ok(CreatedRequest {
            number: 0,
            url: String::new(),
        })
    }

    async fn update_request(&self, number: u64, update: &RequestUpdate) -> PlatformResult<()> {
        self.plan(format!("update request #{number} to {:?}", update.title));
        Ok(())
    }

    async fn close_request(&self, number: u64) -> PlatformResult<()> {
        self.plan(format!("close request #{number}"));
        Ok(())
    }

    async fn add_comment(&self, number: u64, _text: &str) -> PlatformResult<()> {
        self.plan(format!("comment on request #{number}"));
        Ok(())
    }
}
