//! One running app execution and everything it owns.
//!
//! A [`SessionRunner`] holds the ordered render slots of a page, the
//! session state, the table registry, and uploaded files. Producers are
//! re-run on state changes and only the difference against the tree the
//! browser already has goes out.

mod app;
pub mod audit;
mod dialog;
mod hooks;
mod inputs;
mod page;
mod render;

use std::collections::{BTreeMap, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::Instant;

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::compress;
use crate::config::EngineConfig;
use crate::error::Severity;
use crate::files::TempFileStore;
use crate::model::Node;
use crate::protocol::{Appearance, Envelope, ServerMessage};
use crate::render::{self as pipeline, DiffOutcome, Phase, RenderPatch};
use crate::state::SessionState;
use crate::table::{Stale, TableRegistry};
use crate::transport::OutboundSink;

pub use app::{AppContext, AppDefinition, AppHandler};
pub use dialog::ConfirmDialog;
pub use hooks::PageQuery;
pub use page::{LinkOptions, LogOptions, ModalOptions, Page};
pub use render::{Producer, ProducerFn, RenderHandle, RenderOptions, Resolver};

use audit::RateLimiter;
use render::{RenderRecord, RenderSlot};

/// Handle to a running app execution. Cheap to clone.
#[derive(Clone)]
pub struct SessionRunner {
    inner: Arc<RunnerInner>,
}

pub(crate) struct RunnerInner {
    app: AppDefinition,
    sink: Arc<dyn OutboundSink>,
    browser_session_id: String,
    execution_id: String,
    config: EngineConfig,
    state: SessionState,
    tables: TableRegistry,
    files: TempFileStore,
    core: Mutex<RunnerCore>,
    /// Serialises reconciliation passes.
    reconcile: tokio::sync::Mutex<()>,
    audit: Mutex<RateLimiter>,
}

#[derive(Default)]
pub(crate) struct RunnerCore {
    /// Render ids in the order they were registered.
    renders: Vec<String>,
    slots: HashMap<String, RenderSlot>,
    confirm: Option<ConfirmDialog>,
    defer_state_update: bool,
    defer_input_updates: bool,
    queued_inputs: Map<String, Value>,
}

impl RunnerCore {
    /// Every registered render has finished its first production.
    fn synced(&self) -> bool {
        self.renders.len() == self.slots.len()
    }

    fn live(&self, render_id: &str) -> Option<&RenderRecord> {
        match self.slots.get(render_id) {
            Some(RenderSlot::Live(record)) => Some(&**record),
            _ => None,
        }
    }

    fn live_mut(&mut self, render_id: &str) -> Option<&mut RenderRecord> {
        match self.slots.get_mut(render_id) {
            Some(RenderSlot::Live(record)) => Some(&mut **record),
            _ => None,
        }
    }
}

impl std::fmt::Debug for SessionRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.inner.core.lock();
        f.debug_struct("SessionRunner")
            .field("app", &self.inner.app.name())
            .field("browser_session_id", &self.inner.browser_session_id)
            .field("execution_id", &self.inner.execution_id)
            .field("renders", &core.renders)
            .finish()
    }
}

impl SessionRunner {
    /// Must be called from within a tokio runtime.
    pub fn new(
        app: AppDefinition,
        sink: Arc<dyn OutboundSink>,
        browser_session_id: impl Into<String>,
        execution_id: impl Into<String>,
        config: EngineConfig,
    ) -> Self {
        let browser_session_id = browser_session_id.into();
        let execution_id = execution_id.into();
        let inner = Arc::new_cyclic(|weak: &Weak<RunnerInner>| {
            let weak = weak.clone();
            let state = SessionState::new(app.initial_state(), config.state_debounce, move || {
                if let Some(runner) = weak.upgrade() {
                    runner.spawn_state_update();
                }
            });
            RunnerInner {
                tables: TableRegistry::new(config.table_debounce),
                audit: Mutex::new(RateLimiter::new(
                    config.audit_log_limit,
                    config.audit_log_window,
                )),
                app,
                sink,
                browser_session_id,
                execution_id,
                config,
                state,
                files: TempFileStore::new(),
                core: Mutex::new(RunnerCore::default()),
                reconcile: tokio::sync::Mutex::new(()),
            }
        });
        Self { inner }
    }

    pub fn execution_id(&self) -> &str {
        &self.inner.execution_id
    }

    pub fn browser_session_id(&self) -> &str {
        &self.inner.browser_session_id
    }

    pub fn state(&self) -> &SessionState {
        &self.inner.state
    }

    pub fn tables(&self) -> &TableRegistry {
        &self.inner.tables
    }

    pub fn files(&self) -> &TempFileStore {
        &self.inner.files
    }

    /// A page handle bound to this runner, as handed to the app handler.
    pub fn page(&self, params: Map<String, Value>) -> Page {
        Page::new(&self.inner, params)
    }

    /// Runs the app handler to completion. Failures are reported to the
    /// browser rather than returned.
    pub async fn execute(&self, params: Map<String, Value>) {
        let context = AppContext {
            page: self.page(params),
            state: self.inner.state.clone(),
        };
        let handler = self.inner.app.handler();
        debug!(
            target: "page_sync::runner",
            app = self.inner.app.name(),
            execution_id = %self.inner.execution_id,
            "executing app"
        );
        if let Err(err) = guarded(move || handler(context)).await {
            self.inner.send_error(
                format!("An error occurred while running the app:\n\n{err:#}"),
                Severity::Error,
            );
        }
    }

    /// Ids of every registered render, in registration order.
    pub fn render_ids(&self) -> Vec<String> {
        self.inner.core.lock().renders.clone()
    }

    /// The tree the browser currently holds for `render_id`.
    pub fn current_tree(&self, render_id: &str) -> Option<Node> {
        self.inner.core.lock().live(render_id).map(|record| record.tree.clone())
    }

    /// Tears the session down. Pending render handles resolve with `None`.
    pub fn cleanup(&self) {
        self.inner.state.cleanup();
        self.inner.tables.cleanup();
        self.inner.files.clear();
        let mut core = self.inner.core.lock();
        core.slots.clear();
        core.renders.clear();
        core.confirm = None;
        core.queued_inputs.clear();
        core.defer_state_update = false;
        core.defer_input_updates = false;
        debug!(
            target: "page_sync::runner",
            execution_id = %self.inner.execution_id,
            "session cleaned up"
        );
    }
}

impl RunnerInner {
    pub(crate) fn send(&self, message: ServerMessage) {
        let kind = message.kind();
        let envelope = Envelope {
            browser_session_id: self.browser_session_id.clone(),
            execution_id: self.execution_id.clone(),
            message,
        };
        match self.sink.send(envelope) {
            Ok(()) => trace!(target: "page_sync::runner", kind, "sent"),
            Err(err) => warn!(
                target: "page_sync::runner",
                kind,
                error = %err,
                "failed to send outbound message"
            ),
        }
    }

    pub(crate) fn send_error(&self, message: impl Into<String>, severity: Severity) {
        self.send(ServerMessage::AppError {
            error_message: message.into(),
            severity,
        });
    }

    fn timing(&self, phase: Phase, started: Instant, render_id: &str) {
        if self.config.debug {
            pipeline::record_timing(phase, started.elapsed(), render_id);
        }
    }

    /// Runs a hook in the background; failures surface as warnings.
    pub(crate) fn spawn_hook<F>(self: &Arc<Self>, make: F)
    where
        F: FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send + 'static,
    {
        let runner = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = guarded(make).await {
                runner.send_error(
                    format!("An error occurred while executing a callback function:\n\n{err:#}"),
                    Severity::Warning,
                );
            }
        });
    }

    /// Registers a render slot and starts producing it.
    pub(crate) fn render(
        self: &Arc<Self>,
        producer: Producer,
        options: RenderOptions,
    ) -> RenderHandle {
        let (sender, receiver) = oneshot::channel();
        let render_id = options
            .key
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        {
            let mut core = self.core.lock();
            if core.renders.contains(&render_id) {
                drop(core);
                self.send_error(
                    format!(
                        "An error occurred while rendering the UI:\n\nA render with the key '{render_id}' already exists"
                    ),
                    Severity::Error,
                );
                return RenderHandle::new(receiver);
            }
            core.renders.push(render_id.clone());
        }

        let resolver = Resolver::new(
            render_id.clone(),
            options.appearance,
            Arc::downgrade(self),
            sender,
        );
        let runner = Arc::clone(self);
        tokio::spawn(async move {
            runner.produce_initial(render_id, producer, resolver, options).await;
        });
        RenderHandle::new(receiver)
    }

    async fn produce(
        &self,
        producer: &Producer,
        resolver: &Resolver,
    ) -> anyhow::Result<Option<Node>> {
        match producer {
            Producer::Static(node) => Ok(Some(node.clone())),
            Producer::Reactive(produce) => {
                let produce = Arc::clone(produce);
                let resolver = resolver.clone();
                guarded(move || produce(resolver)).await
            }
        }
    }

    async fn produce_initial(
        self: Arc<Self>,
        render_id: String,
        producer: Producer,
        resolver: Resolver,
        options: RenderOptions,
    ) {
        let started = Instant::now();
        let produced = match self.produce(&producer, &resolver).await {
            Ok(produced) => produced,
            Err(err) => {
                self.send_error(
                    format!("An error occurred while rendering the UI:\n\n{err:#}"),
                    Severity::Error,
                );
                return;
            }
        };
        let tree = pipeline::finalize(produced, &render_id, &self.tables).await;
        self.timing(Phase::Produce, started, &render_id);

        let started = Instant::now();
        let validation = pipeline::validate(&tree, self.config.max_tree_depth);
        self.timing(Phase::Validate, started, &render_id);
        if let Err(err) = validation {
            self.send_error(err.to_string(), Severity::Error);
            return;
        }

        {
            let mut core = self.core.lock();
            // A modal resolved while it was still being produced stays closed.
            if matches!(core.slots.get(&render_id), Some(RenderSlot::Resolved)) {
                return;
            }
            core.slots.insert(
                render_id.clone(),
                RenderSlot::Live(Box::new(RenderRecord {
                    producer,
                    resolver,
                    tree,
                    appearance: options.appearance,
                    modal_header: options.modal_header,
                    modal_width: options.modal_width,
                    initial_transmission_sent: false,
                })),
            );
        }
        self.transmit_renders();
    }

    /// Sends every produced render that has not gone out yet, in
    /// registration order. Stops at the first render still being produced
    /// so later renders never overtake earlier ones.
    fn transmit_renders(self: &Arc<Self>) {
        let mut outgoing = Vec::new();
        let replay = {
            let mut core = self.core.lock();
            let mut complete = true;
            for (idx, render_id) in core.renders.clone().into_iter().enumerate() {
                let Some(slot) = core.slots.get_mut(&render_id) else {
                    complete = false;
                    break;
                };
                let RenderSlot::Live(record) = slot else {
                    continue;
                };
                if record.initial_transmission_sent {
                    continue;
                }
                record.initial_transmission_sent = true;

                let started = Instant::now();
                let ui = compress::tree(&record.tree);
                self.timing(Phase::Compress, started, &render_id);
                let message = ServerMessage::RenderUi {
                    ui,
                    render_id: render_id.clone(),
                    idx,
                    appearance: record.appearance,
                    modal_header: record.modal_header.clone(),
                    modal_width: record.modal_width,
                };
                outgoing.push((render_id, message));
            }

            if complete {
                let state = std::mem::take(&mut core.defer_state_update);
                let inputs = std::mem::take(&mut core.defer_input_updates)
                    .then(|| std::mem::take(&mut core.queued_inputs));
                Some((state, inputs))
            } else {
                None
            }
        };

        for (render_id, message) in outgoing {
            self.send(message);
            self.refresh_initially_stale(&render_id);
        }

        if let Some((state, inputs)) = replay {
            if state {
                self.spawn_state_update();
            }
            if let Some(inputs) = inputs.filter(|inputs| !inputs.is_empty()) {
                self.set_inputs(inputs);
            }
        }
    }

    /// Tables that have never been fetched get their first page right
    /// after the render carrying them goes out.
    fn refresh_initially_stale(self: &Arc<Self>, render_id: &str) {
        for table in self.tables.for_render(render_id) {
            if table.stale != Stale::InitiallyStale {
                continue;
            }
            self.send(ServerMessage::StaleStateUpdate {
                render_id: table.render_id.clone(),
                component_id: table.table_id.clone(),
                stale: Stale::InitiallyStale,
            });
            let runner = Arc::clone(self);
            tokio::spawn(async move {
                let query = PageQuery::from_record(&table);
                runner
                    .on_table_page_change(&table.render_id, &table.table_id, query, false)
                    .await;
            });
        }
    }

    pub(crate) fn spawn_state_update(self: &Arc<Self>) {
        let runner = Arc::clone(self);
        tokio::spawn(async move { runner.on_state_update().await });
    }

    /// Re-produces every reactive render and sends one batched patch.
    async fn on_state_update(self: Arc<Self>) {
        let _pass = self.reconcile.lock().await;
        let started_pass = Instant::now();

        let jobs: Vec<(String, Producer, Resolver)> = {
            let mut core = self.core.lock();
            if !core.synced() {
                core.defer_state_update = true;
                return;
            }
            if core.defer_state_update {
                return;
            }
            core.renders
                .iter()
                .filter_map(|render_id| {
                    let record = core.live(render_id)?;
                    record.producer.is_reactive().then(|| {
                        (render_id.clone(), record.producer.clone(), record.resolver.clone())
                    })
                })
                .collect()
        };

        let mut updated: BTreeMap<String, RenderPatch> = BTreeMap::new();
        for (render_id, producer, resolver) in jobs {
            let started = Instant::now();
            let produced = match self.produce(&producer, &resolver).await {
                Ok(produced) => produced,
                Err(err) => {
                    self.send_error(
                        format!(
                            "An error occurred while updating the UI from a page.update() call:\n\n{err:#}"
                        ),
                        Severity::Error,
                    );
                    continue;
                }
            };
            let tree = pipeline::finalize(produced, &render_id, &self.tables).await;
            self.timing(Phase::Produce, started, &render_id);

            let started = Instant::now();
            let validation = pipeline::validate(&tree, self.config.max_tree_depth);
            self.timing(Phase::Validate, started, &render_id);
            if let Err(err) = validation {
                self.send_error(err.to_string(), Severity::Error);
                continue;
            }

            let started = Instant::now();
            let patch = {
                let mut core = self.core.lock();
                let Some(record) = core.live_mut(&render_id) else {
                    continue;
                };
                let DiffOutcome { tree, patch, .. } = pipeline::diff(&record.tree, tree);
                record.tree = tree;
                patch
            };
            self.timing(Phase::Diff, started, &render_id);
            if !patch.is_empty() {
                updated.insert(render_id, patch);
            }
        }

        if !updated.is_empty() {
            self.send(ServerMessage::RerenderUi { diff: updated });
        }

        for table in self.tables.all() {
            if !matches!(table.stale, Stale::UpdateNotDisabled | Stale::InitiallyStale) {
                continue;
            }
            self.send(ServerMessage::StaleStateUpdate {
                render_id: table.render_id.clone(),
                component_id: table.table_id.clone(),
                stale: table.stale,
            });
            let weak = Arc::downgrade(&self);
            let (render_id, table_id) = (table.render_id.clone(), table.table_id.clone());
            table.debouncer.run(move || {
                let Some(runner) = weak.upgrade() else {
                    return;
                };
                let Some(current) = runner.tables.get(&render_id, &table_id) else {
                    return;
                };
                tokio::spawn(async move {
                    let query = PageQuery::from_record(&current);
                    runner
                        .on_table_page_change(&render_id, &table_id, query, true)
                        .await;
                });
            });
        }

        if self.config.debug {
            pipeline::record_timing(Phase::Update, started_pass.elapsed(), "*");
        }
    }

    pub(crate) fn on_render_resolved(&self, render_id: &str, appearance: Appearance) {
        if appearance != Appearance::Modal {
            return;
        }
        self.send(ServerMessage::CloseModal {
            render_id: render_id.to_string(),
        });
        self.core
            .lock()
            .slots
            .insert(render_id.to_string(), RenderSlot::Resolved);
        self.tables.remove_for_render(render_id);
    }
}

/// Runs a user future, turning panics into errors.
pub(crate) async fn guarded<F, T>(make: F) -> anyhow::Result<T>
where
    F: FnOnce() -> BoxFuture<'static, anyhow::Result<T>> + Send,
{
    let future = match std::panic::catch_unwind(AssertUnwindSafe(make)) {
        Ok(future) => future,
        Err(payload) => return Err(anyhow::anyhow!(panic_message(payload.as_ref()))),
    };
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(anyhow::anyhow!(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panicked".to_string()
    }
}
