//! Modal flow for picking the case another case gets merged into.

use std::sync::Arc;

use shared::{
    domain::Case,
    query::{Query, Range},
};
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    error::{ClientError, ClientResult},
    modal::ModalOutcome,
    CaseSearch,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchType {
    Title,
    Number,
}

impl SearchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Number => "number",
        }
    }

    pub fn min_input_length(&self) -> usize {
        match self {
            Self::Title => 3,
            Self::Number => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSearch {
    pub search_type: SearchType,
    pub placeholder: String,
    pub min_input_length: usize,
    pub input: Option<String>,
    /// Current selection; never holds more than one case.
    pub cases: Vec<Case>,
}

pub struct CaseMergeSelector {
    search: Arc<dyn CaseSearch>,
    source: Case,
    title: String,
    prompt: String,
    state: Mutex<MergeSearch>,
}

impl CaseMergeSelector {
    pub fn new(
        search: Arc<dyn CaseSearch>,
        source: Case,
        title: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            search,
            source,
            title: title.into(),
            prompt: prompt.into(),
            state: Mutex::new(MergeSearch {
                search_type: SearchType::Title,
                placeholder: "Search by case title".to_string(),
                min_input_length: 1,
                input: None,
                cases: Vec::new(),
            }),
        }
    }

    pub fn source(&self) -> &Case {
        &self.source
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub async fn snapshot(&self) -> MergeSearch {
        self.state.lock().await.clone()
    }

    /// Whether `input` is long enough to be sent to [`Self::search`].
    pub async fn accepts_input(&self, input: &str) -> bool {
        let min = self.state.lock().await.min_input_length;
        input.chars().count() >= min
    }

    pub async fn set_input(&self, input: impl Into<String>) {
        self.state.lock().await.input = Some(input.into());
    }

    pub async fn search(&self, search_type: SearchType, input: &str) -> ClientResult<Vec<Case>> {
        let query = match search_type {
            SearchType::Title => Query::like("title", input),
            SearchType::Number => match parse_case_number(input) {
                Some(number) => Query::eq("caseId", number),
                None => {
                    debug!(input, "case number search skipped: not a number");
                    return Ok(Vec::new());
                }
            },
        };
        let cases = self.search.search_cases(&query, Range::All).await?;
        debug!(
            search_type = search_type.as_str(),
            results = cases.len(),
            "merge target search finished"
        );
        Ok(cases)
    }

    pub fn format(case: Option<&Case>) -> Option<String> {
        case.map(|case| format!("#{} - {}", case.case_id, case.title))
    }

    pub async fn clear_search(&self) {
        let mut state = self.state.lock().await;
        state.input = None;
        state.cases.clear();
    }

    pub async fn on_type_change(&self, search_type: SearchType) {
        self.clear_search().await;
        let mut state = self.state.lock().await;
        state.search_type = search_type;
        state.placeholder = format!("Search by case {}", search_type.as_str());
        state.min_input_length = search_type.min_input_length();
    }

    pub async fn select_one(&self, case: Case) {
        self.state.lock().await.cases = vec![case];
    }

    pub async fn selected(&self) -> Option<Case> {
        self.state.lock().await.cases.first().cloned()
    }

    pub async fn confirm(&self) -> ClientResult<ModalOutcome<Case>> {
        self.selected()
            .await
            .map(ModalOutcome::Closed)
            .ok_or(ClientError::NoSelection)
    }

    pub fn cancel(&self) -> ModalOutcome<Case> {
        ModalOutcome::Dismissed
    }
}

/// Reads the leading integer of `input`, ignoring anything after it.
/// A `0x`/`0X` prefix switches to hexadecimal digits.
pub fn parse_case_number(input: &str) -> Option<i64> {
    let trimmed = input.trim_start();
    let (sign, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (-1, &trimmed[1..]),
        Some(b'+') => (1, &trimmed[1..]),
        _ => (1, trimmed),
    };
    let (radix, rest) = match rest.get(..2) {
        Some("0x" | "0X") => (16, &rest[2..]),
        _ => (10, rest),
    };
    let digits: String = rest.chars().take_while(|c| c.is_digit(radix)).collect();
    i64::from_str_radix(&digits, radix)
        .ok()
        .map(|value| sign * value)
}

#[cfg(test)]
#[path = "tests/case_merge_tests.rs"]
mod tests;
