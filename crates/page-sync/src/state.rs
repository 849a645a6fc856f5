//! Session state shared between the app handler, producers, and hooks.
//!
//! Every mutation schedules a reconciliation pass through a debouncer, so a
//! burst of writes costs one immediate pass plus at most one trailing pass.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::debounce::Debouncer;

pub type StateMap = Map<String, Value>;

type OnUpdate = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
pub struct SessionState {
    inner: Arc<StateInner>,
}

struct StateInner {
    values: Mutex<StateMap>,
    debouncer: Debouncer,
    on_update: OnUpdate,
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("values", &*self.inner.values.lock())
            .field("debouncer", &self.inner.debouncer)
            .finish()
    }
}

impl SessionState {
    /// `initial` is copied; later changes to it are not observed.
    pub fn new<F>(initial: &StateMap, debounce: Duration, on_update: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(StateInner {
                values: Mutex::new(initial.clone()),
                debouncer: Debouncer::new(debounce),
                on_update: Arc::new(on_update),
            }),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.values.lock().get(key).cloned()
    }

    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|value| serde_json::from_value(value).ok())
    }

    pub fn snapshot(&self) -> StateMap {
        self.inner.values.lock().clone()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner.values.lock().insert(key.into(), value.into());
        self.schedule();
    }

    /// Shallow merge: top-level keys in `patch` replace existing ones.
    pub fn merge(&self, patch: StateMap) {
        self.inner.values.lock().extend(patch);
        self.schedule();
    }

    pub fn overwrite(&self, values: StateMap) {
        *self.inner.values.lock() = values;
        self.schedule();
    }

    /// Read-modify-write under the state lock.
    pub fn modify<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut StateMap) -> R,
    {
        let result = f(&mut self.inner.values.lock());
        self.schedule();
        result
    }

    /// Schedules a reconciliation without changing anything.
    pub fn update(&self) {
        self.schedule();
    }

    pub fn has_pending_update(&self) -> bool {
        self.inner.debouncer.has_pending()
    }

    pub fn cleanup(&self) {
        self.inner.debouncer.cleanup();
    }

    fn schedule(&self) {
        let on_update = Arc::clone(&self.inner.on_update);
        self.inner.debouncer.run(move || on_update());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn state(initial: Value) -> (SessionState, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let state = SessionState::new(
            initial.as_object().unwrap(),
            Duration::from_millis(10),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );
        (state, calls)
    }

    #[test_timeout::tokio_timeout_test(5, paused)]
    async fn mutations_are_visible_immediately() {
        let (state, _) = state(json!({"count": 0, "name": "x"}));
        state.set("count", 1);
        assert_eq!(state.get_as::<i64>("count"), Some(1));
        state.merge(json!({"name": "y", "extra": true}).as_object().cloned().unwrap());
        assert_eq!(state.get("name"), Some(json!("y")));
        assert_eq!(state.get("extra"), Some(json!(true)));
        state.overwrite(Map::new());
        assert!(state.snapshot().is_empty());
    }

    #[test_timeout::tokio_timeout_test(5, paused)]
    async fn initial_state_is_copied() {
        let mut initial = json!({"items": [1, 2]}).as_object().cloned().unwrap();
        let (state, _) = state(Value::Object(initial.clone()));
        initial.insert("items".into(), json!([]));
        assert_eq!(state.get("items"), Some(json!([1, 2])));
    }

    #[test_timeout::tokio_timeout_test(5, paused)]
    async fn burst_of_writes_schedules_twice() {
        let (state, calls) = state(json!({"count": 0}));
        for i in 0..50 {
            state.modify(|values| values.insert("count".into(), json!(i)));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(state.has_pending_update());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(state.get("count"), Some(json!(49)));
    }
}
