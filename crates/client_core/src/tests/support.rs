//! Recording fakes for controller tests.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Mutex,
};

use async_trait::async_trait;
use serde_json::{json, Value};
use shared::{
    domain::{Case, CaseId, CaseNumber, NewTask, Responder, ResponderId, Task, TaskId, TaskStatus},
    error::ApiError,
    protocol::{Page, ResponderAction, Route, RunResponderRequest, TaskPatch},
    query::{Query, Range},
};

use crate::{
    error::{ClientError, ClientResult},
    CaseSearch, Navigator, Notifier, ResponderService, TaskSearch, TaskSearchRequest,
    TaskService,
};

pub fn task(id: &str, group: &str, order: i64) -> Task {
    Task {
        id: TaskId::from(id),
        title: format!("task {id}"),
        group: group.to_string(),
        order,
        status: TaskStatus::Waiting,
        flag: false,
        start_date: None,
        description: None,
        owner: None,
    }
}

pub fn task_with_status(id: &str, status: TaskStatus) -> Task {
    let mut task = task(id, "default", 0);
    task.status = status;
    task
}

pub fn case(number: i64, title: &str) -> Case {
    Case {
        id: CaseId(format!("case-{number}")),
        case_id: CaseNumber(number),
        title: title.to_string(),
    }
}

pub fn api_error(status: u16) -> ClientError {
    ClientError::Api(ApiError::new(status, json!({ "message": "boom" })))
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Success(String),
    Error { scope: String, payload: Value, status: u16 },
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().expect("notices").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn success(&self, message: &str) {
        self.notices
            .lock()
            .expect("notices")
            .push(Notice::Success(message.to_string()));
    }

    fn error(&self, scope: &str, payload: &Value, status: u16) {
        self.notices.lock().expect("notices").push(Notice::Error {
            scope: scope.to_string(),
            payload: payload.clone(),
            status,
        });
    }
}

#[derive(Default)]
pub struct RecordingNavigator {
    pub routes: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    pub fn routes(&self) -> Vec<Route> {
        self.routes.lock().expect("routes").clone()
    }
}

impl Navigator for RecordingNavigator {
    fn go(&self, route: Route) {
        self.routes.lock().expect("routes").push(route);
    }
}

#[derive(Default)]
pub struct FakeCaseSearch {
    pub results: Vec<Case>,
    pub queries: Mutex<Vec<(Query, Range)>>,
}

#[async_trait]
impl CaseSearch for FakeCaseSearch {
    async fn search_cases(&self, query: &Query, range: Range) -> ClientResult<Vec<Case>> {
        self.queries
            .lock()
            .expect("queries")
            .push((query.clone(), range));
        Ok(self.results.clone())
    }
}

#[derive(Default)]
pub struct FakeTaskSearch {
    pub tasks: Mutex<Vec<Task>>,
    pub requests: Mutex<Vec<TaskSearchRequest>>,
    pub fail_status: Option<u16>,
}

impl FakeTaskSearch {
    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        Self {
            tasks: Mutex::new(tasks),
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<TaskSearchRequest> {
        self.requests.lock().expect("requests").clone()
    }
}

#[async_trait]
impl TaskSearch for FakeTaskSearch {
    async fn search_tasks(&self, request: &TaskSearchRequest) -> ClientResult<Page<Task>> {
        self.requests
            .lock()
            .expect("requests")
            .push(request.clone());
        if let Some(status) = self.fail_status {
            return Err(api_error(status));
        }
        let tasks = self.tasks.lock().expect("tasks").clone();
        let total = tasks.len();
        Ok(Page::new(tasks, total))
    }
}

#[derive(Default)]
pub struct FakeTaskService {
    pub updates: Mutex<Vec<(TaskId, TaskPatch)>>,
    pub created: Mutex<Vec<(CaseId, NewTask)>>,
    pub fail_status: Option<u16>,
}

impl FakeTaskService {
    pub fn failing(status: u16) -> Self {
        Self {
            fail_status: Some(status),
            ..Self::default()
        }
    }

    pub fn updates(&self) -> Vec<(TaskId, TaskPatch)> {
        self.updates.lock().expect("updates").clone()
    }

    pub fn created(&self) -> Vec<(CaseId, NewTask)> {
        self.created.lock().expect("created").clone()
    }
}

#[async_trait]
impl TaskService for FakeTaskService {
    async fn update_task(&self, task_id: &TaskId, patch: &TaskPatch) -> ClientResult<Task> {
        self.updates
            .lock()
            .expect("updates")
            .push((task_id.clone(), patch.clone()));
        if let Some(status) = self.fail_status {
            return Err(api_error(status));
        }
        let mut updated = task(task_id.as_str(), "default", 0);
        if let Some(status) = patch
            .get("status")
            .and_then(Value::as_str)
            .and_then(|raw| raw.parse::<TaskStatus>().ok())
        {
            updated.status = status;
        }
        Ok(updated)
    }

    async fn create_task(&self, case_id: &CaseId, new_task: &NewTask) -> ClientResult<Task> {
        self.created
            .lock()
            .expect("created")
            .push((case_id.clone(), new_task.clone()));
        if let Some(status) = self.fail_status {
            return Err(api_error(status));
        }
        let mut created = task("created", &new_task.group, 0);
        created.title = new_task.title.clone();
        Ok(created)
    }
}

pub enum RunBehavior {
    Succeed,
    Fail(u16),
    Cancel,
}

pub struct FakeResponders {
    pub list_calls: AtomicUsize,
    pub runs: Mutex<Vec<(RunResponderRequest, String)>>,
    pub fail_listing: bool,
    pub run_behavior: RunBehavior,
}

impl FakeResponders {
    pub fn new(run_behavior: RunBehavior) -> Self {
        Self {
            list_calls: AtomicUsize::new(0),
            runs: Mutex::new(Vec::new()),
            fail_listing: false,
            run_behavior,
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ResponderService for FakeResponders {
    async fn list_responders(
        &self,
        _object_type: &str,
        object_id: &str,
    ) -> ClientResult<Vec<Responder>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing {
            return Err(api_error(500));
        }
        Ok(vec![Responder {
            id: ResponderId(format!("responder-for-{object_id}")),
            name: "Mailer_1_0".to_string(),
            description: None,
            cortex_ids: vec!["local".to_string()],
        }])
    }

    async fn run_responder(
        &self,
        request: &RunResponderRequest,
        responder_name: &str,
    ) -> ClientResult<ResponderAction> {
        self.runs
            .lock()
            .expect("runs")
            .push((request.clone(), responder_name.to_string()));
        match self.run_behavior {
            RunBehavior::Succeed => Ok(ResponderAction {
                id: Some("action-1".to_string()),
                responder_name: responder_name.to_string(),
                status: Some("Waiting".to_string()),
            }),
            RunBehavior::Fail(status) => Err(api_error(status)),
            RunBehavior::Cancel => Err(ClientError::Cancelled),
        }
    }
}
