//! HTTP implementation of the server-facing collaborators.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Case, CaseId, NewTask, Responder, Task, TaskId},
    error::ApiError,
    protocol::{
        CreateTaskBody, Page, ResponderAction, RunResponderRequest, SearchBody, TaskPatch,
    },
    query::{Query, Range, SortKey},
};
use tracing::debug;
use url::Url;

use crate::{
    error::{ClientError, ClientResult},
    settings::ClientSettings,
    CaseSearch, ResponderService, TaskSearch, TaskSearchRequest, TaskService,
};

const TOTAL_HEADER: &str = "x-total";

pub struct RestClient {
    http: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl RestClient {
    pub fn new(base_url: &str) -> ClientResult<Self> {
        let base_url = Url::parse(base_url)
            .map_err(|err| ClientError::InvalidInput(format!("invalid server url {base_url}: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidInput(format!(
                "server url {base_url} cannot carry a path"
            )));
        }
        Ok(Self {
            http: Client::new(),
            base_url,
            api_key: None,
        })
    }

    pub fn from_settings(settings: &ClientSettings) -> ClientResult<Self> {
        let client = Self::new(&settings.server_url)?;
        Ok(match &settings.api_key {
            Some(key) => client.with_api_key(key.clone()),
            None => client,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> ClientResult<Response> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = match response.text().await {
            Ok(body) => body,
            Err(err) => {
                debug!(status = status.as_u16(), error = %err, "failed to read error body");
                String::new()
            }
        };
        debug!(status = status.as_u16(), "server rejected request");
        Err(ApiError::from_body(status.as_u16(), &body).into())
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> ClientResult<T> {
        let response = self.send(request).await?;
        Ok(response.json().await?)
    }
}

fn search_params(range: Range, sort: &[SortKey]) -> Vec<(&'static str, String)> {
    let mut params = vec![("range", range.to_string())];
    params.extend(sort.iter().map(|key| ("sort", key.to_string())));
    params
}

#[async_trait]
impl CaseSearch for RestClient {
    async fn search_cases(&self, query: &Query, range: Range) -> ClientResult<Vec<Case>> {
        let request = self
            .http
            .post(self.endpoint(&["api", "case", "_search"]))
            .query(&search_params(range, &[]))
            .json(&SearchBody { query });
        self.send_json(request).await
    }
}

#[async_trait]
impl TaskSearch for RestClient {
    async fn search_tasks(&self, request: &TaskSearchRequest) -> ClientResult<Page<Task>> {
        let query = request.query();
        let http_request = self
            .http
            .post(self.endpoint(&["api", "case", "task", "_search"]))
            .query(&search_params(request.range(), &request.sort))
            .json(&SearchBody { query: &query });
        let response = self.send(http_request).await?;
        let total = response
            .headers()
            .get(TOTAL_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<usize>().ok());
        let tasks: Vec<Task> = response.json().await?;
        let total = total.unwrap_or(tasks.len());
        debug!(case_id = %request.case_id, returned = tasks.len(), total, "task search answered");
        Ok(Page::new(tasks, total))
    }
}

#[async_trait]
impl TaskService for RestClient {
    async fn update_task(&self, task_id: &TaskId, patch: &TaskPatch) -> ClientResult<Task> {
        let request = self
            .http
            .patch(self.endpoint(&["api", "case", "task", task_id.as_str()]))
            .json(patch);
        self.send_json(request).await
    }

    async fn create_task(&self, case_id: &CaseId, task: &NewTask) -> ClientResult<Task> {
        let request = self
            .http
            .post(self.endpoint(&["api", "case", case_id.as_str(), "task"]))
            .json(&CreateTaskBody {
                task: task.clone(),
                flag: false,
            });
        self.send_json(request).await
    }
}

#[async_trait]
impl ResponderService for RestClient {
    async fn list_responders(
        &self,
        object_type: &str,
        object_id: &str,
    ) -> ClientResult<Vec<Responder>> {
        let request = self.http.get(self.endpoint(&[
            "api",
            "connector",
            "cortex",
            "responder",
            object_type,
            object_id,
        ]));
        self.send_json(request).await
    }

    async fn run_responder(
        &self,
        request: &RunResponderRequest,
        _responder_name: &str,
    ) -> ClientResult<ResponderAction> {
        let http_request = self
            .http
            .post(self.endpoint(&["api", "connector", "cortex", "action"]))
            .json(request);
        self.send_json(http_request).await
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
