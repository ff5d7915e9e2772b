//! Task list of one case: loading, grouping, edits, status moves and responders.

use std::sync::Arc;

use serde_json::Value;
use shared::{
    domain::{CaseId, NewTask, Responder, ResponderId, Task, TaskId, TaskStatus},
    protocol::{Route, RunResponderRequest, TaskPatch, CASE_OBJECT_TYPE, TASK_OBJECT_TYPE},
    query::Query,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    error::{ClientError, ClientResult},
    filtering::FilterContext,
    grouping::{build_groups, group_names, TaskGroup},
    modal::{ConfirmDialog, ConfirmRequest},
    LayoutPreferences, Navigator, Notifier, ResponderService, TaskSearch, TaskSearchRequest,
    TaskService, TASK_LIST_SCOPE,
};

#[derive(Debug, Clone, PartialEq)]
pub enum TaskListEvent {
    TaskRemoved(Task),
    TasksUpdated { total: usize },
}

/// Responders fetched for a single task.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponderSlot {
    pub task_id: TaskId,
    pub responders: Vec<Responder>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskListView {
    /// Every task returned by the last load, in list sort order.
    pub all_tasks: Vec<Task>,
    /// Tasks on the current page.
    pub tasks: Vec<Task>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub groups: Vec<TaskGroup>,
    pub group_names: Vec<String>,
    pub show_grouped: bool,
    pub is_new_task: bool,
    pub new_task: NewTask,
    pub responders: Option<ResponderSlot>,
}

impl TaskListView {
    pub fn page_count(&self) -> usize {
        if self.page_size == 0 {
            return 1;
        }
        self.all_tasks.len().div_ceil(self.page_size).max(1)
    }

    fn refresh_page(&mut self) {
        self.page = self.page.min(self.page_count() - 1);
        self.tasks = if self.page_size == 0 {
            self.all_tasks.clone()
        } else {
            self.all_tasks
                .iter()
                .skip(self.page * self.page_size)
                .take(self.page_size)
                .cloned()
                .collect()
        };
        self.groups = build_groups(&self.tasks);
        self.group_names = group_names(&self.groups);
    }
}

pub struct TaskListDependencies {
    pub search: Arc<dyn TaskSearch>,
    pub tasks: Arc<dyn TaskService>,
    pub filtering: Arc<dyn FilterContext>,
    pub notifier: Arc<dyn Notifier>,
    pub responders: Arc<dyn ResponderService>,
    pub dialog: Arc<dyn ConfirmDialog>,
    pub navigator: Arc<dyn Navigator>,
    pub layout: Arc<dyn LayoutPreferences>,
}

pub struct TaskListManager {
    case_id: CaseId,
    search: Arc<dyn TaskSearch>,
    tasks: Arc<dyn TaskService>,
    filtering: Arc<dyn FilterContext>,
    notifier: Arc<dyn Notifier>,
    responders: Arc<dyn ResponderService>,
    dialog: Arc<dyn ConfirmDialog>,
    navigator: Arc<dyn Navigator>,
    layout: Arc<dyn LayoutPreferences>,
    view: Mutex<TaskListView>,
    events: broadcast::Sender<TaskListEvent>,
}

impl TaskListManager {
    pub fn new(case_id: CaseId, deps: TaskListDependencies) -> Self {
        let (events, _) = broadcast::channel(64);
        let view = TaskListView {
            show_grouped: deps.layout.group_tasks(),
            ..TaskListView::default()
        };
        Self {
            case_id,
            search: deps.search,
            tasks: deps.tasks,
            filtering: deps.filtering,
            notifier: deps.notifier,
            responders: deps.responders,
            dialog: deps.dialog,
            navigator: deps.navigator,
            layout: deps.layout,
            view: Mutex::new(view),
            events,
        }
    }

    pub fn case_id(&self) -> &CaseId {
        &self.case_id
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<TaskListEvent> {
        self.events.subscribe()
    }

    pub async fn view(&self) -> TaskListView {
        self.view.lock().await.clone()
    }

    pub async fn groups(&self) -> Vec<TaskGroup> {
        self.view.lock().await.groups.clone()
    }

    pub async fn responders(&self) -> Option<Vec<Responder>> {
        self.view
            .lock()
            .await
            .responders
            .as_ref()
            .map(|slot| slot.responders.clone())
    }

    pub async fn init(&self) -> ClientResult<()> {
        if let Err(err) = self.filtering.init_context(self.case_id.as_str()).await {
            self.report(&err);
            return Err(err);
        }
        self.load().await
    }

    /// Active tasks of this case; cancelled tasks are never listed.
    pub fn base_filter(&self) -> Query {
        Query::and([
            Query::parent(CASE_OBJECT_TYPE, Query::eq("_id", self.case_id.as_str())),
            Query::not(Query::eq("status", TaskStatus::Cancel.as_str())),
        ])
    }

    pub async fn search_request(&self) -> TaskSearchRequest {
        TaskSearchRequest {
            case_id: self.case_id.clone(),
            base_filter: self.base_filter(),
            filter: self.filtering.build_query().await,
            sort: self.filtering.sort().await,
            page_size: self.filtering.page_size().await,
            load_all: true,
        }
    }

    pub async fn load(&self) -> ClientResult<()> {
        let request = self.search_request().await;
        self.view.lock().await.page_size = request.page_size;
        match self.search.search_tasks(&request).await {
            Ok(page) => {
                debug!(case_id = %self.case_id, total = page.total, "task list loaded");
                self.apply_update(page.values, page.total).await;
                Ok(())
            }
            Err(err) => {
                self.report(&err);
                Err(err)
            }
        }
    }

    /// Replaces the bound result set and rebuilds the groups.
    pub async fn apply_update(&self, tasks: Vec<Task>, total: usize) {
        {
            let mut view = self.view.lock().await;
            view.all_tasks = tasks;
            view.total = total;
            view.refresh_page();
        }
        let _ = self.events.send(TaskListEvent::TasksUpdated { total });
    }

    pub async fn set_page(&self, page: usize) {
        let mut view = self.view.lock().await;
        view.page = page;
        view.refresh_page();
    }

    pub async fn set_page_size(&self, page_size: usize) {
        self.filtering.set_page_size(page_size).await;
        let page_size = self.filtering.page_size().await;
        let mut view = self.view.lock().await;
        view.page_size = page_size;
        view.refresh_page();
    }

    pub async fn toggle_stats(&self) {
        self.filtering.toggle_stats().await;
    }

    pub async fn toggle_filters(&self) {
        self.filtering.toggle_filters().await;
    }

    pub async fn filter(&self) -> ClientResult<()> {
        self.filter_step(self.filtering.apply_filters().await)?;
        self.search().await
    }

    pub async fn clear_filters(&self) -> ClientResult<()> {
        self.filter_step(self.filtering.clear_filters().await)?;
        self.search().await
    }

    pub async fn remove_filter(&self, index: usize) -> ClientResult<()> {
        self.filter_step(self.filtering.remove_filter(index).await)?;
        self.search().await
    }

    pub async fn add_filter_value(&self, field: &str, value: Value) -> ClientResult<()> {
        self.filtering.add_filter_value(field, value).await;
        self.search().await
    }

    /// Reloads with the current filters and persists them.
    pub async fn search(&self) -> ClientResult<()> {
        self.load().await?;
        let stored = self.filtering.store_context().await;
        self.filter_step(stored)
    }

    pub async fn toggle_grouped_view(&self) -> bool {
        let show_grouped = {
            let mut view = self.view.lock().await;
            view.show_grouped = !view.show_grouped;
            view.show_grouped
        };
        self.layout.set_group_tasks(show_grouped);
        show_grouped
    }

    pub async fn open_new_task_form(&self) {
        self.view.lock().await.is_new_task = true;
    }

    pub fn show_task(&self, task_id: &TaskId) {
        self.navigator.go(Route::TaskDetail {
            case_id: self.case_id.clone(),
            task_id: task_id.clone(),
        });
    }

    /// Sends a one-field patch. The list is not touched locally; the next
    /// load brings the new value.
    ///
    /// A `status` value is checked against the task's current status first.
    pub async fn update_field(&self, field: &str, value: Value, task: &Task) -> ClientResult<Task> {
        if field == "status" {
            let to = value
                .as_str()
                .unwrap_or_default()
                .parse::<TaskStatus>()
                .map_err(|err| ClientError::InvalidInput(err.to_string()))?;
            ensure_transition(task, to)?;
        }
        let patch = TaskPatch::field(field, value);
        self.tasks
            .update_task(&task.id, &patch)
            .await
            .inspect_err(|err| self.report(err))
    }

    /// Edits the new-task form in place.
    pub async fn edit_new_task(&self, edit: impl FnOnce(&mut NewTask)) {
        edit(&mut self.view.lock().await.new_task);
    }

    /// Creates a task from the current form contents.
    pub async fn submit_new_task(&self) -> ClientResult<Task> {
        let new_task = self.view.lock().await.new_task.clone();
        self.add_task(new_task).await
    }

    /// Creates `new_task` under this case. On success the form's title and
    /// group are cleared and the form is closed.
    pub async fn add_task(&self, new_task: NewTask) -> ClientResult<Task> {
        match self.tasks.create_task(&self.case_id, &new_task).await {
            Ok(created) => {
                {
                    let mut view = self.view.lock().await;
                    view.is_new_task = false;
                    view.new_task.title.clear();
                    view.new_task.group.clear();
                }
                info!(case_id = %self.case_id, task_id = %created.id, "task added");
                self.notifier.success("Task has been successfully added");
                Ok(created)
            }
            Err(err) => {
                self.report(&err);
                Err(err)
            }
        }
    }

    /// Soft-deletes `task` after confirmation. Returns whether it was removed.
    pub async fn remove_task(&self, task: &Task) -> ClientResult<bool> {
        ensure_transition(task, TaskStatus::Cancel)?;
        let request = ConfirmRequest::RemoveTask {
            title: task.title.clone(),
        };
        if !self.dialog.confirm(request).await.is_closed() {
            debug!(task_id = %task.id, "task removal dismissed");
            return Ok(false);
        }

        match self
            .tasks
            .update_task(&task.id, &TaskPatch::status(TaskStatus::Cancel))
            .await
        {
            Ok(_) => {
                let _ = self.events.send(TaskListEvent::TaskRemoved(task.clone()));
                self.notifier.success("Task has been successfully removed");
                Ok(true)
            }
            Err(err) => {
                self.report(&err);
                Err(err)
            }
        }
    }

    pub async fn start_task(&self, task: &Task) -> ClientResult<()> {
        if task.status == TaskStatus::Waiting {
            self.update_task_status(&task.id, TaskStatus::InProgress)
                .await?;
        }
        self.show_task(&task.id);
        Ok(())
    }

    /// Re-opens a completed task and shows it; other tasks are left alone.
    pub async fn open_task(&self, task: &Task) -> ClientResult<()> {
        if task.status != TaskStatus::Completed {
            return Ok(());
        }
        self.update_task_status(&task.id, TaskStatus::InProgress)
            .await?;
        self.show_task(&task.id);
        Ok(())
    }

    pub async fn close_task(&self, task: &Task) -> ClientResult<()> {
        if task.status != TaskStatus::InProgress {
            return Ok(());
        }
        self.update_task_status(&task.id, TaskStatus::Completed)
            .await?;
        self.notifier.success("Task has been successfully closed");
        Ok(())
    }

    pub async fn update_task_status(
        &self,
        task_id: &TaskId,
        status: TaskStatus,
    ) -> ClientResult<Task> {
        let updated = self
            .tasks
            .update_task(task_id, &TaskPatch::status(status))
            .await
            .inspect_err(|err| self.report(err))?;
        info!(case_id = %self.case_id, task_id = %task_id, status = %status, "task status updated");
        Ok(updated)
    }

    /// Fetches the responders of `task_id` unless they are already cached.
    ///
    /// The cache holds one task's responders; asking for another task or
    /// passing `force` refetches.
    pub async fn get_responders(&self, task_id: &TaskId, force: bool) -> ClientResult<()> {
        {
            let mut view = self.view.lock().await;
            let cached = view
                .responders
                .as_ref()
                .is_some_and(|slot| &slot.task_id == task_id);
            if cached && !force {
                return Ok(());
            }
            view.responders = None;
        }

        let responders = self
            .responders
            .list_responders(TASK_OBJECT_TYPE, task_id.as_str())
            .await
            .inspect_err(|err| self.report(err))?;
        debug!(task_id = %task_id, count = responders.len(), "task responders loaded");
        self.view.lock().await.responders = Some(ResponderSlot {
            task_id: task_id.clone(),
            responders,
        });
        Ok(())
    }

    pub async fn run_responder(
        &self,
        responder_id: ResponderId,
        responder_name: &str,
        task: &Task,
    ) -> ClientResult<()> {
        let request = RunResponderRequest::for_task(responder_id, &task.id);
        let action = self
            .responders
            .run_responder(&request, responder_name)
            .await
            .inspect_err(|err| self.report(err))?;
        self.notifier.success(&format!(
            "Responder {} started successfully on task {}",
            action.responder_name, task.title
        ));
        Ok(())
    }

    fn filter_step(&self, result: ClientResult<()>) -> ClientResult<()> {
        result.inspect_err(|err| self.report(err))
    }

    fn report(&self, err: &ClientError) {
        if err.is_cancelled() {
            debug!(case_id = %self.case_id, "operation cancelled by collaborator");
            return;
        }
        warn!(case_id = %self.case_id, status = err.status(), "task list request failed: {err}");
        self.notifier
            .error(TASK_LIST_SCOPE, &err.payload(), err.status());
    }
}

fn ensure_transition(task: &Task, to: TaskStatus) -> ClientResult<()> {
    if task.status.can_transition_to(to) {
        Ok(())
    } else {
        Err(ClientError::InvalidTransition {
            from: task.status,
            to,
        })
    }
}

#[cfg(test)]
#[path = "tests/case_tasks_tests.rs"]
mod tests;
