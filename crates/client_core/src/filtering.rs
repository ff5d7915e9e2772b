//! Per-view filter, sort and paging state with pluggable persistence.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::query::{Query, SortKey};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{ClientError, ClientResult};

/// Values selected for one field. Several values mean "any of them".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterEntry {
    pub field: String,
    #[serde(default)]
    pub values: Vec<Value>,
}

impl FilterEntry {
    pub fn to_query(&self) -> Option<Query> {
        match self.values.as_slice() {
            [] => None,
            [single] => Some(Query::eq(self.field.clone(), single.clone())),
            many => Some(Query::any_of(self.field.clone(), many.to_vec())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteringContext {
    pub show_filters: bool,
    pub show_stats: bool,
    pub page_size: usize,
    pub sort: Vec<SortKey>,
    #[serde(default)]
    pub filters: Vec<FilterEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterDefaults {
    pub show_filters: bool,
    pub show_stats: bool,
    pub page_size: usize,
    pub sort: Vec<SortKey>,
    pub default_filter: Vec<FilterEntry>,
}

impl FilterDefaults {
    /// Task list defaults: flagged first, then by order, start date and title.
    pub fn case_tasks() -> Self {
        Self {
            show_filters: true,
            show_stats: false,
            page_size: 15,
            sort: vec![
                SortKey::desc("flag"),
                SortKey::asc("order"),
                SortKey::asc("startDate"),
                SortKey::asc("title"),
            ],
            default_filter: Vec::new(),
        }
    }

    fn context(&self) -> FilteringContext {
        FilteringContext {
            show_filters: self.show_filters,
            show_stats: self.show_stats,
            page_size: self.page_size,
            sort: self.sort.clone(),
            filters: self.default_filter.clone(),
        }
    }
}

#[async_trait]
pub trait ContextStore: Send + Sync {
    async fn load(&self, key: &str) -> ClientResult<Option<FilteringContext>>;
    async fn save(&self, key: &str, context: &FilteringContext) -> ClientResult<()>;
}

#[derive(Default)]
pub struct MemoryContextStore {
    contexts: Mutex<HashMap<String, FilteringContext>>,
}

#[async_trait]
impl ContextStore for MemoryContextStore {
    async fn load(&self, key: &str) -> ClientResult<Option<FilteringContext>> {
        Ok(self.contexts.lock().await.get(key).cloned())
    }

    async fn save(&self, key: &str, context: &FilteringContext) -> ClientResult<()> {
        self.contexts
            .lock()
            .await
            .insert(key.to_string(), context.clone());
        Ok(())
    }
}

/// Filter state a list view reads its query, sort and page size from.
#[async_trait]
pub trait FilterContext: Send + Sync {
    async fn init_context(&self, context_id: &str) -> ClientResult<()>;
    async fn context(&self) -> FilteringContext;
    async fn build_query(&self) -> Option<Query>;
    async fn sort(&self) -> Vec<SortKey>;
    async fn page_size(&self) -> usize;
    async fn set_page_size(&self, page_size: usize);
    async fn store_context(&self) -> ClientResult<()>;
    async fn toggle_stats(&self);
    async fn toggle_filters(&self);
    async fn add_filter_value(&self, field: &str, value: Value);
    async fn apply_filters(&self) -> ClientResult<()>;
    async fn clear_filters(&self) -> ClientResult<()>;
    async fn remove_filter(&self, index: usize) -> ClientResult<()>;
}

struct FilteringState {
    key: Option<String>,
    context: FilteringContext,
}

pub struct Filtering {
    section: String,
    defaults: FilterDefaults,
    store: Arc<dyn ContextStore>,
    state: Mutex<FilteringState>,
}

impl Filtering {
    pub fn new(
        section: impl Into<String>,
        defaults: FilterDefaults,
        store: Arc<dyn ContextStore>,
    ) -> Self {
        let context = defaults.context();
        Self {
            section: section.into(),
            defaults,
            store,
            state: Mutex::new(FilteringState { key: None, context }),
        }
    }

    fn key_for(&self, context_id: &str) -> String {
        format!("{}/{context_id}", self.section)
    }
}

#[async_trait]
impl FilterContext for Filtering {
    async fn init_context(&self, context_id: &str) -> ClientResult<()> {
        let key = self.key_for(context_id);
        let stored = self.store.load(&key).await?;
        let restored = stored.is_some();
        let mut state = self.state.lock().await;
        state.context = stored.unwrap_or_else(|| self.defaults.context());
        state.key = Some(key);
        debug!(section = %self.section, context_id, restored, "filter context initialised");
        Ok(())
    }

    async fn context(&self) -> FilteringContext {
        self.state.lock().await.context.clone()
    }

    async fn build_query(&self) -> Option<Query> {
        let state = self.state.lock().await;
        let operands: Vec<Query> = state
            .context
            .filters
            .iter()
            .filter_map(FilterEntry::to_query)
            .collect();
        if operands.is_empty() {
            None
        } else {
            Some(Query::and(operands))
        }
    }

    async fn sort(&self) -> Vec<SortKey> {
        self.state.lock().await.context.sort.clone()
    }

    async fn page_size(&self) -> usize {
        self.state.lock().await.context.page_size
    }

    async fn set_page_size(&self, page_size: usize) {
        if page_size > 0 {
            self.state.lock().await.context.page_size = page_size;
        }
    }

    async fn store_context(&self) -> ClientResult<()> {
        let (key, context) = {
            let state = self.state.lock().await;
            let key = state.key.clone().ok_or_else(|| {
                ClientError::InvalidInput(format!(
                    "filter context for {} was never initialised",
                    self.section
                ))
            })?;
            (key, state.context.clone())
        };
        self.store.save(&key, &context).await
    }

    async fn toggle_stats(&self) {
        let mut state = self.state.lock().await;
        state.context.show_stats = !state.context.show_stats;
    }

    async fn toggle_filters(&self) {
        let mut state = self.state.lock().await;
        state.context.show_filters = !state.context.show_filters;
    }

    async fn add_filter_value(&self, field: &str, value: Value) {
        let mut state = self.state.lock().await;
        let filters = &mut state.context.filters;
        match filters.iter_mut().find(|entry| entry.field == field) {
            Some(entry) => {
                if !entry.values.contains(&value) {
                    entry.values.push(value);
                }
            }
            None => filters.push(FilterEntry {
                field: field.to_string(),
                values: vec![value],
            }),
        }
    }

    async fn apply_filters(&self) -> ClientResult<()> {
        let mut state = self.state.lock().await;
        state.context.filters.retain(|entry| !entry.values.is_empty());
        Ok(())
    }

    async fn clear_filters(&self) -> ClientResult<()> {
        let mut state = self.state.lock().await;
        state.context.filters.clear();
        Ok(())
    }

    async fn remove_filter(&self, index: usize) -> ClientResult<()> {
        let mut state = self.state.lock().await;
        if index >= state.context.filters.len() {
            return Err(ClientError::InvalidInput(format!(
                "no filter at position {index}"
            )));
        }
        state.context.filters.remove(index);
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/filtering_tests.rs"]
mod tests;
