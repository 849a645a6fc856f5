use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::value::{FormValue, FormValues};

pub type HookFuture = BoxFuture<'static, anyhow::Result<()>>;

pub type ClickHook = Arc<dyn Fn() -> HookFuture + Send + Sync>;
pub type ValueHook = Arc<dyn Fn(FormValue) -> HookFuture + Send + Sync>;
pub type SubmitHook = Arc<dyn Fn(FormValues) -> HookFuture + Send + Sync>;
/// Receives the clicked row (if the index is on the current page) and the
/// absolute row index.
pub type RowActionHook = Arc<dyn Fn(Option<Value>, usize) -> HookFuture + Send + Sync>;
pub type InputValidator = Arc<dyn Fn(FormValue) -> BoxFuture<'static, Validation> + Send + Sync>;
pub type FormValidator = Arc<dyn Fn(FormValues) -> BoxFuture<'static, Validation> + Send + Sync>;
pub type PageRows = Arc<dyn Fn() -> Vec<Value> + Send + Sync>;
pub type PageFetch =
    Arc<dyn Fn(PageRequest) -> BoxFuture<'static, anyhow::Result<PageResponse>> + Send + Sync>;

/// Outcome of a user-supplied validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Valid,
    /// Rejected with a message shown next to the component.
    Message(String),
    /// Rejected without a message.
    Invalid,
}

impl Validation {
    pub fn error_message(self) -> Option<String> {
        match self {
            Validation::Valid => None,
            Validation::Message(message) => Some(message),
            Validation::Invalid => Some("Invalid value".into()),
        }
    }
}

impl From<bool> for Validation {
    fn from(valid: bool) -> Self {
        if valid {
            Validation::Valid
        } else {
            Validation::Invalid
        }
    }
}

impl From<Result<(), String>> for Validation {
    fn from(result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Validation::Valid,
            Err(message) => Validation::Message(message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSort {
    pub key: String,
    pub direction: SortDirection,
}

/// Arguments handed to a manual page-change handler.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub offset: usize,
    pub page_size: usize,
    pub search_query: Option<String>,
    pub sort_by: Vec<ColumnSort>,
    pub prev_search_query: Option<String>,
    /// `None` when the host asked for the total to be recomputed.
    pub prev_total_records: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageResponse {
    pub data: Vec<Value>,
    pub total_records: u64,
}

/// Where a paginated table gets its rows from.
#[derive(Clone)]
pub enum PageChange {
    /// The full dataset is produced locally and sliced per page.
    Auto(PageRows),
    /// Each page is fetched on demand.
    Manual(PageFetch),
}

impl fmt::Debug for PageChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageChange::Auto(_) => f.write_str("PageChange::Auto"),
            PageChange::Manual(_) => f.write_str("PageChange::Manual"),
        }
    }
}

impl PageChange {
    pub fn auto<F>(rows: F) -> Self
    where
        F: Fn() -> Vec<Value> + Send + Sync + 'static,
    {
        PageChange::Auto(Arc::new(rows))
    }

    pub fn manual<F, Fut>(fetch: F) -> Self
    where
        F: Fn(PageRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<PageResponse>> + Send + 'static,
    {
        PageChange::Manual(Arc::new(move |request| fetch(request).boxed()))
    }

    pub fn is_manual(&self) -> bool {
        matches!(self, PageChange::Manual(_))
    }
}
