use std::time::Duration;

pub const DEFAULT_LOG_FILTER: &str = "info,page_sync=debug";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Quiet window for coalescing state mutations into one reconciliation.
    pub state_debounce: Duration,
    /// Quiet window for coalescing table refetches after state updates.
    pub table_debounce: Duration,
    pub max_tree_depth: usize,
    /// Emit per-phase timing diagnostics.
    pub debug: bool,
    pub audit_log_limit: u32,
    pub audit_log_window: Duration,
    pub log_filter: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            state_debounce: Duration::from_millis(10),
            table_debounce: Duration::from_millis(250),
            max_tree_depth: 100,
            debug: false,
            audit_log_limit: 10_000,
            audit_log_window: Duration::from_secs(60),
            log_filter: DEFAULT_LOG_FILTER.into(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let state_debounce =
            env_millis("PAGE_SYNC_STATE_DEBOUNCE_MS").unwrap_or(defaults.state_debounce);
        let table_debounce =
            env_millis("PAGE_SYNC_TABLE_DEBOUNCE_MS").unwrap_or(defaults.table_debounce);
        let max_tree_depth = std::env::var("PAGE_SYNC_MAX_TREE_DEPTH")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|depth| *depth > 0)
            .unwrap_or(defaults.max_tree_depth);
        let debug = std::env::var("PAGE_SYNC_DEBUG")
            .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "yes" | "on"))
            .unwrap_or(defaults.debug);
        let audit_log_limit = std::env::var("PAGE_SYNC_AUDIT_LOG_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.audit_log_limit);
        let log_filter = std::env::var("RUST_LOG").unwrap_or(defaults.log_filter);
        Self {
            state_debounce,
            table_debounce,
            max_tree_depth,
            debug,
            audit_log_limit,
            audit_log_window: defaults.audit_log_window,
            log_filter,
        }
    }
}

fn env_millis(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_millis)
}
