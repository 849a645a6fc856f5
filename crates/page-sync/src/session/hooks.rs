//! Inbound browser events.
//!
//! Every handler looks up the render and component the event names in the
//! tree the browser was last sent. Lookups that fail are reported as
//! errors; a render that was closed in the meantime is ignored.

use std::sync::Arc;

use futures::FutureExt;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::render::RenderRecord;
use super::{RenderSlot, RunnerInner, SessionRunner, guarded};
use crate::compress;
use crate::error::{ProtocolError, Severity};
use crate::model::tree::{find_by_id, find_by_id_mut};
use crate::model::{ColumnSort, FormValue, Node, PageChange, PageRequest, PageResponse};
use crate::protocol::{ClientEvent, ServerMessage};
use crate::render::form::{form_error, input_errors, input_validators};
use crate::render::hydrate::hydrate;
use crate::table::{DEFAULT_OFFSET, Stale, TableRecord, TableUpdate};

const DEFAULT_FORM_ERROR: &str = "Form validation failed. Please correct the highlighted fields.";

/// The page a browser asked a table for.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageQuery {
    pub search_query: Option<String>,
    pub offset: usize,
    pub page_size: usize,
    pub sort_by: Vec<ColumnSort>,
}

impl PageQuery {
    pub(crate) fn from_record(record: &TableRecord) -> Self {
        Self {
            search_query: record.search_query.clone(),
            offset: record.offset,
            page_size: record.page_size,
            sort_by: record.active_view.sort_by.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InputEvent {
    Enter,
    Select,
    FileChange,
}

impl InputEvent {
    fn label(self) -> &'static str {
        match self {
            InputEvent::Enter => "on_enter",
            InputEvent::Select => "on_select",
            InputEvent::FileChange => "on_file_change",
        }
    }
}

enum Lookup<T> {
    Found(T),
    Closed,
    Missing,
}

impl SessionRunner {
    /// Routes a decoded browser event to its handler.
    pub async fn dispatch(&self, event: ClientEvent) {
        debug!(target: "page_sync::hooks", ?event, "inbound event");
        match event {
            ClientEvent::Click {
                render_id,
                component_id,
            } => self.on_click(&render_id, &component_id),
            ClientEvent::SubmitForm {
                render_id,
                form_component_id,
                form_data,
            } => {
                self.on_submit_form(&render_id, &form_component_id, form_data)
                    .await
            }
            ClientEvent::OnEnterHook {
                render_id,
                component_id,
                value,
            } => {
                self.inner
                    .on_input(InputEvent::Enter, &render_id, &component_id, value)
                    .await
            }
            ClientEvent::OnSelectHook {
                render_id,
                component_id,
                value,
            } => {
                self.inner
                    .on_input(InputEvent::Select, &render_id, &component_id, value)
                    .await
            }
            ClientEvent::OnFileChangeHook {
                render_id,
                component_id,
                value,
            } => {
                self.inner
                    .on_input(InputEvent::FileChange, &render_id, &component_id, value)
                    .await
            }
            ClientEvent::TableRowAction {
                render_id,
                component_id,
                action_idx,
                value,
            } => self.on_row_action(&render_id, &component_id, action_idx, value),
            ClientEvent::CloseModal { render_id } => self.on_close_modal(&render_id),
            ClientEvent::FileTransfer { file_id, contents } => {
                self.inner.files.insert(file_id, contents);
            }
            ClientEvent::TablePageChange {
                render_id,
                component_id,
                search_query,
                offset,
                page_size,
                sort_by,
            } => {
                let query = PageQuery {
                    search_query,
                    offset,
                    page_size,
                    sort_by,
                };
                self.on_table_page_change(&render_id, &component_id, query)
                    .await
            }
            ClientEvent::ConfirmResponse { id, response } => {
                self.inner.on_confirm_response(&id, response)
            }
        }
    }

    pub fn on_click(&self, render_id: &str, component_id: &str) {
        self.inner.on_click(render_id, component_id);
    }

    pub async fn on_submit_form(
        &self,
        render_id: &str,
        form_id: &str,
        form_data: Map<String, Value>,
    ) {
        self.inner.on_submit_form(render_id, form_id, form_data).await;
    }

    pub async fn on_enter(&self, render_id: &str, component_id: &str, value: Value) {
        self.inner
            .on_input(InputEvent::Enter, render_id, component_id, value)
            .await;
    }

    pub async fn on_select(&self, render_id: &str, component_id: &str, value: Value) {
        self.inner
            .on_input(InputEvent::Select, render_id, component_id, value)
            .await;
    }

    pub async fn on_file_change(&self, render_id: &str, component_id: &str, value: Value) {
        self.inner
            .on_input(InputEvent::FileChange, render_id, component_id, value)
            .await;
    }

    pub fn on_row_action(
        &self,
        render_id: &str,
        component_id: &str,
        action_idx: usize,
        value: Value,
    ) {
        self.inner
            .on_row_action(render_id, component_id, action_idx, value);
    }

    pub fn on_close_modal(&self, render_id: &str) {
        self.inner.on_close_modal(render_id);
    }

    pub async fn on_table_page_change(
        &self,
        render_id: &str,
        component_id: &str,
        query: PageQuery,
    ) {
        self.inner
            .on_table_page_change(render_id, component_id, query, false)
            .await;
    }

    pub fn on_confirm_response(&self, dialog_id: &str, response: bool) {
        self.inner.on_confirm_response(dialog_id, response);
    }
}

impl RunnerInner {
    fn lookup<T>(&self, render_id: &str, f: impl FnOnce(&RenderRecord) -> T) -> Lookup<T> {
        let core = self.core.lock();
        match core.slots.get(render_id) {
            None => Lookup::Missing,
            Some(RenderSlot::Resolved) => Lookup::Closed,
            Some(RenderSlot::Live(record)) => Lookup::Found(f(&**record)),
        }
    }

    fn report(&self, action: &str, err: ProtocolError, severity: Severity) {
        self.send_error(
            format!("An error occurred while trying to {action}:\n\n{err}"),
            severity,
        );
    }

    fn render_missing(&self, action: &str, render_id: &str, severity: Severity) {
        self.report(
            action,
            ProtocolError::RenderNotFound {
                render_id: render_id.to_string(),
            },
            severity,
        );
    }

    fn on_click(self: &Arc<Self>, render_id: &str, component_id: &str) {
        const ACTION: &str = "execute a click hook";
        let hook = match self.lookup(render_id, |record| {
            find_by_id(&record.tree, component_id)
                .and_then(Node::as_button)
                .filter(|button| !button.ty.is_chart())
                .and_then(|button| button.hooks.on_click.clone())
        }) {
            Lookup::Missing => return self.render_missing(ACTION, render_id, Severity::Warning),
            Lookup::Closed => return,
            Lookup::Found(hook) => hook,
        };
        if let Some(hook) = hook {
            self.spawn_hook(move || hook());
        }
    }

    async fn on_submit_form(
        self: &Arc<Self>,
        render_id: &str,
        form_id: &str,
        form_data: Map<String, Value>,
    ) {
        const ACTION: &str = "execute a form submission hook";
        let found = match self.lookup(render_id, |record| {
            let form = find_by_id(&record.tree, form_id)?;
            let layout = form.as_layout().filter(|layout| layout.is_form())?;
            let hydrated = hydrate(&form_data, form, &self.files);
            let validators = input_validators(&record.tree, &hydrated.values);
            Some((
                hydrated,
                validators,
                layout.hooks.validate.clone(),
                layout.hooks.on_submit.clone(),
            ))
        }) {
            Lookup::Missing => return self.render_missing(ACTION, render_id, Severity::Warning),
            Lookup::Closed => return,
            Lookup::Found(found) => found,
        };
        let Some((hydrated, validators, validate, on_submit)) = found else {
            return;
        };
        self.files
            .remove_all(hydrated.consumed_files.iter().map(String::as_str));
        let values = hydrated.values;

        let input_component_errors = input_errors(validators, &values).await;
        let form_error = form_error(validate, &values).await;
        if input_component_errors.is_some() || form_error.is_some() {
            self.send(ServerMessage::FormValidationError {
                render_id: render_id.to_string(),
                form_component_id: form_id.to_string(),
                input_component_errors,
                form_error: form_error.unwrap_or_else(|| DEFAULT_FORM_ERROR.to_string()),
            });
            return;
        }

        let Some(on_submit) = on_submit else {
            return;
        };
        self.send(ServerMessage::FormSubmissionSuccess {
            render_id: render_id.to_string(),
            form_component_id: form_id.to_string(),
        });
        self.spawn_hook(move || on_submit(values));
    }

    async fn on_input(
        self: &Arc<Self>,
        event: InputEvent,
        render_id: &str,
        component_id: &str,
        value: Value,
    ) {
        const ACTION: &str = "execute an input hook";
        let found = match self.lookup(render_id, |record| {
            let node = find_by_id(&record.tree, component_id).ok_or_else(|| {
                ProtocolError::NodeNotFound {
                    node_id: component_id.to_string(),
                }
            })?;
            let mut data = Map::new();
            data.insert(component_id.to_string(), value);
            let hydrated = hydrate(&data, node, &self.files);
            let input = node.as_input().ok_or_else(|| ProtocolError::NotAnInput {
                node_id: component_id.to_string(),
            })?;
            let validators = input_validators(&record.tree, &hydrated.values);
            Ok((hydrated, validators, input.ty, input.hooks.clone()))
        }) {
            Lookup::Missing => return self.render_missing(ACTION, render_id, Severity::Error),
            Lookup::Closed => return,
            Lookup::Found(found) => found,
        };
        let (hydrated, validators, ty, hooks) = match found {
            Ok(found) => found,
            Err(err) => return self.report(ACTION, err, Severity::Error),
        };
        self.files
            .remove_all(hydrated.consumed_files.iter().map(String::as_str));
        let mut values = hydrated.values;

        if let Some(mut errors) = input_errors(validators, &values).await {
            if let Some(error) = errors.remove(component_id) {
                self.send(ServerMessage::InputValidationError {
                    render_id: render_id.to_string(),
                    component_id: component_id.to_string(),
                    error,
                });
            }
            return;
        }

        let value = values
            .remove(component_id)
            .unwrap_or(FormValue::Json(Value::Null));
        let hook = match event {
            InputEvent::Enter if ty.supports_enter() => hooks.on_enter,
            InputEvent::Select if ty.supports_select() => hooks.on_select,
            InputEvent::FileChange if ty.supports_file_change() => hooks.on_file_change,
            _ => None,
        };
        match hook {
            Some(hook) => self.spawn_hook(move || hook(value)),
            None => debug!(
                target: "page_sync::hooks",
                event = event.label(),
                component_id,
                ty = ty.as_str(),
                "no hook to run"
            ),
        }
    }

    fn on_row_action(
        self: &Arc<Self>,
        render_id: &str,
        component_id: &str,
        action_idx: usize,
        value: Value,
    ) {
        const ACTION: &str = "execute a table row action hook";
        let found = match self.lookup(render_id, |record| {
            let node = find_by_id(&record.tree, component_id).ok_or_else(|| {
                ProtocolError::NodeNotFound {
                    node_id: component_id.to_string(),
                }
            })?;
            let table = node.as_table().ok_or_else(|| ProtocolError::NotATable {
                node_id: component_id.to_string(),
            })?;
            let hook = table
                .hooks
                .on_row_actions
                .get(action_idx)
                .cloned()
                .ok_or(ProtocolError::RowActionNotFound { index: action_idx })?;
            let rows = table.properties.get("data").cloned();
            Ok((hook, rows))
        }) {
            Lookup::Missing => return self.render_missing(ACTION, render_id, Severity::Warning),
            Lookup::Closed => return,
            Lookup::Found(found) => found,
        };
        let (hook, rows) = match found {
            Ok(found) => found,
            Err(err) => return self.report(ACTION, err, Severity::Error),
        };

        let (row, index) = match value.as_u64() {
            Some(index) => {
                let offset = self
                    .tables
                    .get(render_id, component_id)
                    .map_or(DEFAULT_OFFSET, |record| record.offset);
                let row = (index as usize)
                    .checked_sub(offset)
                    .and_then(|local| rows.as_ref()?.get(local).cloned());
                (row, index as usize)
            }
            None => (Some(value), 0),
        };
        self.spawn_hook(move || hook(row, index));
    }

    fn on_close_modal(&self, render_id: &str) {
        const ACTION: &str = "close a modal";
        let resolver = match self.lookup(render_id, |record| record.resolver.clone()) {
            Lookup::Missing => return self.render_missing(ACTION, render_id, Severity::Warning),
            Lookup::Closed => return,
            Lookup::Found(resolver) => resolver,
        };
        resolver.finish(None);
    }

    /// Serves a page of a paginated table. `refresh_total` asks a manual
    /// source to recount its records.
    pub(crate) async fn on_table_page_change(
        self: &Arc<Self>,
        render_id: &str,
        component_id: &str,
        query: PageQuery,
        refresh_total: bool,
    ) {
        const ACTION: &str = "execute a table page change hook";
        let found = match self.lookup(render_id, |record| {
            let node = find_by_id(&record.tree, component_id).ok_or_else(|| {
                ProtocolError::NodeNotFound {
                    node_id: component_id.to_string(),
                }
            })?;
            let table = node.as_table().ok_or_else(|| ProtocolError::NotATable {
                node_id: component_id.to_string(),
            })?;
            Ok(table.hooks.on_page_change.clone())
        }) {
            Lookup::Missing => return self.render_missing(ACTION, render_id, Severity::Warning),
            Lookup::Closed => return,
            Lookup::Found(found) => found,
        };
        let source = match found {
            Ok(source) => source,
            Err(err) => return self.report(ACTION, err, Severity::Error),
        };
        let Some(previous) = self.tables.get(render_id, component_id) else {
            return self.report(
                ACTION,
                ProtocolError::TableStateNotFound {
                    table_id: component_id.to_string(),
                },
                Severity::Error,
            );
        };

        // The browser already shows the requested position; record it
        // before the (possibly slow) fetch.
        self.tables.update(
            render_id,
            component_id,
            TableUpdate {
                offset: Some(query.offset),
                search_query: Some(query.search_query.clone()),
                ..TableUpdate::default()
            },
        );

        let Some(source) = source else {
            return self.report(
                ACTION,
                ProtocolError::NoPageChangeHandler {
                    table_id: component_id.to_string(),
                },
                Severity::Error,
            );
        };

        let page = match source {
            PageChange::Auto(rows) => {
                match guarded(move || async move { Ok(rows()) }.boxed()).await {
                    Ok(all) => PageResponse {
                        total_records: all.len() as u64,
                        data: all
                            .into_iter()
                            .skip(query.offset)
                            .take(query.page_size)
                            .collect(),
                    },
                    Err(err) => return self.page_hook_failed(err),
                }
            }
            PageChange::Manual(fetch) => {
                let request = PageRequest {
                    offset: query.offset,
                    page_size: query.page_size,
                    search_query: query.search_query.clone(),
                    sort_by: query.sort_by.clone(),
                    prev_search_query: previous.search_query.clone(),
                    prev_total_records: if refresh_total {
                        None
                    } else {
                        previous.total_records
                    },
                };
                match guarded(move || fetch(request)).await {
                    Ok(page) => page,
                    Err(err) => return self.page_hook_failed(err),
                }
            }
        };

        if previous.stale != Stale::False {
            let before = json!({
                "offset": previous.offset,
                "searchQuery": previous.search_query,
                "totalRecords": previous.total_records,
                "data": previous.data,
                "pageSize": previous.page_size,
                "sortBy": previous.active_view.sort_by,
            });
            let after = json!({
                "offset": query.offset,
                "searchQuery": query.search_query,
                "totalRecords": page.total_records,
                "data": page.data,
                "pageSize": query.page_size,
                "sortBy": query.sort_by,
            });
            if before == after {
                self.send(ServerMessage::StaleStateUpdate {
                    render_id: render_id.to_string(),
                    component_id: component_id.to_string(),
                    stale: self.settled_staleness(render_id, component_id),
                });
                self.tables.update(
                    render_id,
                    component_id,
                    TableUpdate {
                        stale: Some(Stale::False),
                        data: Some(page.data),
                        ..TableUpdate::default()
                    },
                );
                return;
            }
        }

        self.tables.update(
            render_id,
            component_id,
            TableUpdate {
                data: Some(page.data.clone()),
                total_records: Some(page.total_records),
                offset: Some(query.offset),
                search_query: Some(query.search_query.clone()),
                page_size: Some(query.page_size),
                stale: Some(Stale::False),
                active_sort: Some(query.sort_by.clone()),
                ..TableUpdate::default()
            },
        );

        let data = {
            let mut core = self.core.lock();
            let Some(node) = core
                .live_mut(render_id)
                .and_then(|record| find_by_id_mut(&mut record.tree, component_id))
            else {
                return;
            };
            let properties = node.properties_mut();
            properties.insert("data".into(), Value::Array(page.data));
            properties.insert("totalRecords".into(), page.total_records.into());
            properties.insert("offset".into(), query.offset.into());
            properties.insert(
                "searchQuery".into(),
                query.search_query.clone().map_or(Value::Null, Value::String),
            );
            properties.insert("pageSize".into(), query.page_size.into());
            compress::shallow(node)
                .properties()
                .get("data")
                .cloned()
                .unwrap_or(Value::Array(Vec::new()))
        };

        self.send(ServerMessage::TablePageChangeResponse {
            render_id: render_id.to_string(),
            component_id: component_id.to_string(),
            data,
            total_records: page.total_records,
            offset: query.offset,
            search_query: query.search_query,
            stale: self.settled_staleness(render_id, component_id),
        });
    }

    /// A table with another refetch queued is still catching up.
    fn settled_staleness(&self, render_id: &str, component_id: &str) -> Stale {
        if self.tables.has_queued_update(render_id, component_id) {
            Stale::UpdateNotDisabled
        } else {
            Stale::False
        }
    }

    fn page_hook_failed(&self, err: anyhow::Error) {
        self.send_error(
            format!("An error occurred while trying to execute a table page change hook:\n\n{err:#}"),
            Severity::Warning,
        );
    }
}
