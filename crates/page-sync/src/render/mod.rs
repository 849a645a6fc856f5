//! The render pipeline: everything between a producer returning a tree and
//! that tree being sent or diffed.
//!
//! 1. submit buttons are normalised per form
//! 2. paginated tables receive their current page
//! 3. deferred properties are awaited and materialised
//!
//! The result is then validated and either sent whole (first render) or
//! diffed against the previously sent tree.

pub mod deferred;
pub mod diff;
pub mod form;
pub mod hydrate;
pub mod pagination;
pub mod submit;
pub mod validate;

use std::time::Duration;

use crate::model::{Node, ui};
use crate::table::TableRegistry;

pub use diff::{DiffOutcome, NodeMetadata, NodeUpdate, RenderPatch, diff};
pub use validate::{MAX_TREE_DEPTH, validate};

/// Post-processes a freshly produced tree. A producer that returned
/// nothing renders as an empty placeholder.
pub async fn finalize(produced: Option<Node>, render_id: &str, tables: &TableRegistry) -> Node {
    let node = produced.unwrap_or_else(ui::none);
    let node = submit::configure_submit_buttons(node);
    let node = pagination::configure_table_pagination(node, render_id, tables);
    deferred::resolve_deferred(node).await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Produce,
    Validate,
    Compress,
    Diff,
    Update,
}

impl Phase {
    fn label(self) -> &'static str {
        match self {
            Phase::Produce => "produce",
            Phase::Validate => "validate",
            Phase::Compress => "compress",
            Phase::Diff => "diff",
            Phase::Update => "update",
        }
    }

    pub fn threshold(self) -> Duration {
        Duration::from_millis(match self {
            Phase::Produce => 25,
            Phase::Validate => 10,
            Phase::Compress => 25,
            Phase::Diff => 50,
            Phase::Update => 75,
        })
    }
}

pub(crate) fn record_timing(phase: Phase, elapsed: Duration, render_id: &str) {
    if elapsed > phase.threshold() {
        tracing::warn!(
            target: "page_sync::render",
            phase = phase.label(),
            render_id,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow render phase"
        );
    } else {
        tracing::debug!(
            target: "page_sync::render",
            phase = phase.label(),
            render_id,
            elapsed_ms = elapsed.as_millis() as u64,
            "render phase"
        );
    }
}
