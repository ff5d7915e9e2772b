use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{CaseId, NewTask, ResponderId, TaskId, TaskStatus},
    query::Query,
};

pub const TASK_OBJECT_TYPE: &str = "case_task";
pub const CASE_OBJECT_TYPE: &str = "case";

#[derive(Debug, Clone, Serialize)]
pub struct SearchBody<'a> {
    pub query: &'a Query,
}

/// One page of search results; `total` counts every match, not just this page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub values: Vec<T>,
    pub total: usize,
}

impl<T> Page<T> {
    pub fn new(values: Vec<T>, total: usize) -> Self {
        Self { values, total }
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            values: Vec::new(),
            total: 0,
        }
    }
}

/// Partial update of a task: only the listed fields are touched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskPatch(pub BTreeMap<String, Value>);

impl TaskPatch {
    pub fn field(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(name.into(), value.into());
        Self(fields)
    }

    pub fn status(status: TaskStatus) -> Self {
        Self::field("status", status.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskBody {
    #[serde(flatten)]
    pub task: NewTask,
    pub flag: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponderRequest {
    pub responder_id: ResponderId,
    pub object_type: String,
    pub object_id: String,
}

impl RunResponderRequest {
    pub fn for_task(responder_id: ResponderId, task_id: &TaskId) -> Self {
        Self {
            responder_id,
            object_type: TASK_OBJECT_TYPE.to_string(),
            object_id: task_id.0.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponderAction {
    #[serde(default)]
    pub id: Option<String>,
    pub responder_name: String,
    #[serde(default)]
    pub status: Option<String>,
}

/// Route targets the controllers ask the host to navigate to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    TaskDetail { case_id: CaseId, task_id: TaskId },
}
