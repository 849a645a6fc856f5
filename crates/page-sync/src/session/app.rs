use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;

use super::Page;
use crate::model::HookFuture;
use crate::state::{SessionState, StateMap};

pub type AppHandler = Arc<dyn Fn(AppContext) -> HookFuture + Send + Sync>;

/// What the app handler receives for one execution.
#[derive(Clone, Debug)]
pub struct AppContext {
    pub page: Page,
    pub state: SessionState,
}

#[derive(Clone)]
pub struct AppDefinition {
    name: String,
    route: String,
    initial_state: StateMap,
    handler: AppHandler,
}

impl std::fmt::Debug for AppDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppDefinition")
            .field("name", &self.name)
            .field("route", &self.route)
            .field("initial_state", &self.initial_state)
            .finish()
    }
}

impl AppDefinition {
    pub fn new<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(AppContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = name.into();
        Self {
            route: route_for(&name),
            name,
            initial_state: StateMap::new(),
            handler: Arc::new(move |context| handler(context).boxed()),
        }
    }

    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = route.into();
        self
    }

    /// Seeds the state of every execution. Non-object values are ignored.
    pub fn with_initial_state(mut self, state: Value) -> Self {
        if let Value::Object(map) = state {
            self.initial_state = map;
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn route(&self) -> &str {
        &self.route
    }

    pub fn initial_state(&self) -> &StateMap {
        &self.initial_state
    }

    pub(crate) fn handler(&self) -> AppHandler {
        Arc::clone(&self.handler)
    }
}

fn route_for(name: &str) -> String {
    let mut route = String::with_capacity(name.len());
    for ch in name.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            route.push(ch.to_ascii_lowercase());
        } else if !route.ends_with('-') {
            route.push('-');
        }
    }
    route.trim_matches('-').to_string()
}
