//! Server-side pagination state for tables in a running session.
//!
//! One record exists per paginated table, keyed by the render it belongs
//! to and the table's id. Records outlive individual productions of the
//! tree so the current page survives rerenders.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::debounce::Debouncer;
use crate::model::ColumnSort;

pub const DEFAULT_OFFSET: usize = 0;
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// How fresh the page the browser is showing is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stale {
    /// Up to date.
    False,
    /// Never fetched; the browser shows a loading state.
    InitiallyStale,
    /// Refetch in flight; the browser keeps the table interactive.
    UpdateNotDisabled,
}

/// Sort and filter that apply to a table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TableView {
    pub sort_by: Vec<ColumnSort>,
    pub filter_by: Option<Value>,
}

#[derive(Debug, Clone)]
pub struct TableRecord {
    pub render_id: String,
    pub table_id: String,
    pub data: Vec<Value>,
    pub total_records: Option<u64>,
    pub search_query: Option<String>,
    pub offset: usize,
    pub page_size: usize,
    pub stale: Stale,
    /// What the producer asked for on the latest render.
    pub initial_view: TableView,
    /// What the browser is currently showing.
    pub active_view: TableView,
    pub debouncer: Debouncer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableSeed {
    pub data: Vec<Value>,
    pub total_records: Option<u64>,
    pub search_query: Option<String>,
    pub offset: usize,
    pub page_size: usize,
    pub stale: Stale,
    pub initial_view: TableView,
}

/// Partial update; unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableUpdate {
    pub data: Option<Vec<Value>>,
    pub total_records: Option<u64>,
    pub search_query: Option<Option<String>>,
    pub offset: Option<usize>,
    pub page_size: Option<usize>,
    pub stale: Option<Stale>,
    pub initial_view: Option<TableView>,
    pub active_sort: Option<Vec<ColumnSort>>,
}

pub type TableKey = (String, String);

#[derive(Debug)]
pub struct TableRegistry {
    debounce: Duration,
    records: Mutex<HashMap<TableKey, TableRecord>>,
}

fn key(render_id: &str, table_id: &str) -> TableKey {
    (render_id.to_string(), table_id.to_string())
}

impl TableRegistry {
    pub fn new(debounce: Duration) -> Self {
        Self {
            debounce,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub fn contains(&self, render_id: &str, table_id: &str) -> bool {
        self.records.lock().contains_key(&key(render_id, table_id))
    }

    pub fn get(&self, render_id: &str, table_id: &str) -> Option<TableRecord> {
        self.records.lock().get(&key(render_id, table_id)).cloned()
    }

    pub fn insert(&self, render_id: &str, table_id: &str, seed: TableSeed) {
        let record = TableRecord {
            render_id: render_id.to_string(),
            table_id: table_id.to_string(),
            data: seed.data,
            total_records: seed.total_records,
            search_query: seed.search_query,
            offset: seed.offset,
            page_size: seed.page_size,
            stale: seed.stale,
            active_view: seed.initial_view.clone(),
            initial_view: seed.initial_view,
            debouncer: Debouncer::new(self.debounce),
        };
        self.records.lock().insert(key(render_id, table_id), record);
    }

    /// Applies `update` and returns the resulting record. A change to the
    /// producer-supplied sort or filter discards whatever the browser had
    /// selected for that dimension.
    pub fn update(
        &self,
        render_id: &str,
        table_id: &str,
        update: TableUpdate,
    ) -> Option<TableRecord> {
        let mut records = self.records.lock();
        let record = records.get_mut(&key(render_id, table_id))?;

        if let Some(data) = update.data {
            record.data = data;
        }
        if let Some(total) = update.total_records {
            record.total_records = Some(total);
        }
        if let Some(search_query) = update.search_query {
            record.search_query = search_query;
        }
        if let Some(offset) = update.offset {
            record.offset = offset;
        }
        if let Some(page_size) = update.page_size {
            record.page_size = page_size;
        }
        if let Some(stale) = update.stale {
            record.stale = stale;
        }
        if let Some(sort) = update.active_sort {
            record.active_view.sort_by = sort;
        }
        if let Some(initial) = update.initial_view {
            if initial.sort_by != record.initial_view.sort_by {
                record.active_view.sort_by = initial.sort_by.clone();
            }
            if initial.filter_by != record.initial_view.filter_by {
                record.active_view.filter_by = initial.filter_by.clone();
            }
            record.initial_view = initial;
        }

        Some(record.clone())
    }

    pub fn remove(&self, render_id: &str, table_id: &str) {
        if let Some(record) = self.records.lock().remove(&key(render_id, table_id)) {
            record.debouncer.cleanup();
        }
    }

    pub fn remove_for_render(&self, render_id: &str) {
        let mut records = self.records.lock();
        records.retain(|(owner, _), record| {
            if owner == render_id {
                record.debouncer.cleanup();
                false
            } else {
                true
            }
        });
    }

    pub fn for_render(&self, render_id: &str) -> Vec<TableRecord> {
        let mut tables: Vec<TableRecord> = self
            .records
            .lock()
            .iter()
            .filter(|((owner, _), _)| owner == render_id)
            .map(|(_, record)| record.clone())
            .collect();
        tables.sort_by(|a, b| a.table_id.cmp(&b.table_id));
        tables
    }

    pub fn all(&self) -> Vec<TableRecord> {
        let mut tables: Vec<TableRecord> = self.records.lock().values().cloned().collect();
        tables.sort_by(|a, b| (&a.render_id, &a.table_id).cmp(&(&b.render_id, &b.table_id)));
        tables
    }

    /// True while a refetch for this table is waiting on its debouncer.
    pub fn has_queued_update(&self, render_id: &str, table_id: &str) -> bool {
        self.records
            .lock()
            .get(&key(render_id, table_id))
            .is_some_and(|record| record.debouncer.has_pending())
    }

    pub fn cleanup(&self) {
        let mut records = self.records.lock();
        for record in records.values() {
            record.debouncer.cleanup();
        }
        records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SortDirection;
    use serde_json::json;

    fn seed() -> TableSeed {
        TableSeed {
            data: vec![json!({"id": 1})],
            total_records: Some(1),
            search_query: None,
            offset: DEFAULT_OFFSET,
            page_size: DEFAULT_PAGE_SIZE,
            stale: Stale::InitiallyStale,
            initial_view: TableView::default(),
        }
    }

    fn sort(key: &str) -> Vec<ColumnSort> {
        vec![ColumnSort {
            key: key.into(),
            direction: SortDirection::Asc,
        }]
    }

    #[test]
    fn keys_by_render_and_table() {
        let registry = TableRegistry::new(Duration::from_millis(250));
        registry.insert("r1", "t", seed());
        registry.insert("r2", "t", seed());
        assert!(registry.contains("r1", "t"));
        registry.remove_for_render("r1");
        assert!(!registry.contains("r1", "t"));
        assert!(registry.contains("r2", "t"));
        assert_eq!(registry.all().len(), 1);
    }

    #[test]
    fn update_merges_fields() {
        let registry = TableRegistry::new(Duration::from_millis(250));
        registry.insert("r", "t", seed());
        let record = registry
            .update(
                "r",
                "t",
                TableUpdate {
                    offset: Some(20),
                    search_query: Some(Some("ada".into())),
                    stale: Some(Stale::False),
                    ..TableUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(record.offset, 20);
        assert_eq!(record.search_query.as_deref(), Some("ada"));
        assert_eq!(record.stale, Stale::False);
        assert_eq!(record.data.len(), 1);
        assert!(registry.update("r", "missing", TableUpdate::default()).is_none());
    }

    #[test]
    fn changed_initial_sort_resets_active_sort() {
        let registry = TableRegistry::new(Duration::from_millis(250));
        registry.insert("r", "t", seed());
        registry.update(
            "r",
            "t",
            TableUpdate {
                active_sort: Some(sort("name")),
                ..TableUpdate::default()
            },
        );

        let unchanged = registry
            .update(
                "r",
                "t",
                TableUpdate {
                    initial_view: Some(TableView::default()),
                    ..TableUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(unchanged.active_view.sort_by, sort("name"));

        let changed = registry
            .update(
                "r",
                "t",
                TableUpdate {
                    initial_view: Some(TableView {
                        sort_by: sort("age"),
                        filter_by: None,
                    }),
                    ..TableUpdate::default()
                },
            )
            .unwrap();
        assert_eq!(changed.active_view.sort_by, sort("age"));
    }
}
