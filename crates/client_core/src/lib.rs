//! Controllers for the case workspace: the merge-target selector and the
//! per-case task list, plus the collaborators they are wired to.
//!
//! Every collaborator is a trait injected through a constructor as
//! `Arc<dyn Trait>`; [`transport::RestClient`] implements the server-facing
//! ones over HTTP.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use shared::{
    domain::{Case, CaseId, NewTask, Responder, Task, TaskId},
    protocol::{Page, ResponderAction, Route, RunResponderRequest, TaskPatch},
    query::{Query, Range, SortKey},
};

pub mod case_merge;
pub mod case_tasks;
pub mod error;
pub mod filtering;
pub mod grouping;
pub mod modal;
pub mod notify;
pub mod responders;
pub mod settings;
pub mod transport;

pub use case_merge::{CaseMergeSelector, SearchType};
pub use case_tasks::{TaskListEvent, TaskListManager};
pub use error::{ClientError, ClientResult};
pub use filtering::{FilterContext, Filtering};
pub use grouping::{build_groups, TaskGroup};
pub use modal::{ConfirmDialog, ConfirmRequest, ModalOutcome};
pub use notify::TracingNotifier;
pub use transport::RestClient;

/// Scope tag attached to every error raised from the task list.
pub const TASK_LIST_SCOPE: &str = "taskList";

#[async_trait]
pub trait CaseSearch: Send + Sync {
    async fn search_cases(&self, query: &Query, range: Range) -> ClientResult<Vec<Case>>;
}

/// Everything needed to fetch one view of a case's task list.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSearchRequest {
    pub case_id: CaseId,
    pub base_filter: Query,
    pub filter: Option<Query>,
    pub sort: Vec<SortKey>,
    pub page_size: usize,
    pub load_all: bool,
}

impl TaskSearchRequest {
    pub fn query(&self) -> Query {
        match &self.filter {
            Some(filter) => Query::and([self.base_filter.clone(), filter.clone()]),
            None => self.base_filter.clone(),
        }
    }

    pub fn range(&self) -> Range {
        if self.load_all {
            Range::All
        } else {
            Range::first_page(self.page_size)
        }
    }
}

#[async_trait]
pub trait TaskSearch: Send + Sync {
    async fn search_tasks(&self, request: &TaskSearchRequest) -> ClientResult<Page<Task>>;
}

#[async_trait]
pub trait TaskService: Send + Sync {
    async fn update_task(&self, task_id: &TaskId, patch: &TaskPatch) -> ClientResult<Task>;
    /// Creates an unflagged task under `case_id`.
    async fn create_task(&self, case_id: &CaseId, task: &NewTask) -> ClientResult<Task>;
}

#[async_trait]
pub trait ResponderService: Send + Sync {
    async fn list_responders(&self, object_type: &str, object_id: &str)
        -> ClientResult<Vec<Responder>>;
    async fn run_responder(
        &self,
        request: &RunResponderRequest,
        responder_name: &str,
    ) -> ClientResult<ResponderAction>;
}

pub struct MissingResponderService;

#[async_trait]
impl ResponderService for MissingResponderService {
    async fn list_responders(
        &self,
        _object_type: &str,
        _object_id: &str,
    ) -> ClientResult<Vec<Responder>> {
        Ok(Vec::new())
    }

    async fn run_responder(
        &self,
        request: &RunResponderRequest,
        _responder_name: &str,
    ) -> ClientResult<ResponderAction> {
        Err(ClientError::InvalidInput(format!(
            "responder {} is unavailable: no analyzer connector configured",
            request.responder_id
        )))
    }
}

pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, scope: &str, payload: &Value, status: u16);
}

pub trait Navigator: Send + Sync {
    fn go(&self, route: Route);
}

/// Persisted layout choices shared across views.
pub trait LayoutPreferences: Send + Sync {
    fn group_tasks(&self) -> bool;
    fn set_group_tasks(&self, enabled: bool);
}

#[derive(Debug, Default)]
pub struct InMemoryLayout {
    group_tasks: AtomicBool,
}

impl InMemoryLayout {
    pub fn new(group_tasks: bool) -> Self {
        Self {
            group_tasks: AtomicBool::new(group_tasks),
        }
    }
}

impl LayoutPreferences for InMemoryLayout {
    fn group_tasks(&self) -> bool {
        self.group_tasks.load(Ordering::Relaxed)
    }

    fn set_group_tasks(&self, enabled: bool) {
        self.group_tasks.store(enabled, Ordering::Relaxed);
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
