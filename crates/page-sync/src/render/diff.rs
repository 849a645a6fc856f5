//! Positional tree diff.
//!
//! Children are compared by index, not by id. Interactive nodes keep the
//! id they were first sent with: when a rerender produces the same node at
//! the same position, the new tree is rewritten to use the old id so the
//! browser can keep its local state. An interactive node whose id changes
//! is treated as a replacement.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::compress;
use crate::model::{Node, Properties};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeUpdate {
    pub properties: Properties,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeMetadata {
    #[serde(rename = "formId")]
    pub form_id: Option<String>,
}

/// What the browser needs to patch one render: added subtrees, deleted
/// ids, and property/child-list updates keyed by the id it already has.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderPatch {
    pub add: BTreeMap<String, Node>,
    pub delete: Vec<String>,
    pub update: BTreeMap<String, NodeUpdate>,
    pub root_id: String,
    pub metadata: BTreeMap<String, NodeMetadata>,
}

impl RenderPatch {
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.delete.is_empty() && self.update.is_empty()
    }
}

#[derive(Debug)]
pub struct DiffOutcome {
    /// The new tree with ids rewritten; becomes the next baseline.
    pub tree: Node,
    pub patch: RenderPatch,
    /// New id to the old id it was mapped onto.
    pub id_map: HashMap<String, String>,
}

impl DiffOutcome {
    pub fn changed(&self) -> bool {
        !self.patch.is_empty()
    }
}

#[derive(Default)]
struct Accumulator {
    add: BTreeMap<String, Node>,
    delete: Vec<String>,
    update: BTreeMap<String, NodeUpdate>,
    id_map: HashMap<String, String>,
}

pub fn diff(old: &Node, new: Node) -> DiffOutcome {
    let mut acc = Accumulator::default();
    diff_node(old, &new, &mut acc);

    let mut tree = new;
    apply_ids(&mut tree, &acc.id_map);
    let metadata = form_metadata(&tree);

    DiffOutcome {
        patch: RenderPatch {
            add: acc.add,
            delete: acc.delete,
            update: acc.update,
            root_id: tree.id().to_string(),
            metadata,
        },
        tree,
        id_map: acc.id_map,
    }
}

fn is_replacement(old: &Node, new: &Node) -> bool {
    if old.component_type() != new.component_type() {
        return true;
    }
    old.is_interactive() && !old.is_submit_button() && old.id() != new.id()
}

fn diff_node(old: &Node, new: &Node, acc: &mut Accumulator) {
    if is_replacement(old, new) {
        acc.delete.push(old.id().to_string());
        acc.add.insert(new.id().to_string(), compress::tree(new));
        return;
    }

    match (old, new) {
        (Node::Layout(old_layout), Node::Layout(new_layout)) => {
            let old_children = old_layout.children.as_slice();
            let new_children = new_layout.children.as_slice();
            let count = old_children.len().max(new_children.len());
            let mut child_ids = Vec::with_capacity(new_children.len());

            for idx in 0..count {
                match (old_children.get(idx), new_children.get(idx)) {
                    (Some(old_child), Some(new_child)) => {
                        diff_node(old_child, new_child, acc);
                        if acc.add.contains_key(new_child.id()) {
                            child_ids.push(new_child.id().to_string());
                        } else {
                            child_ids.push(old_child.id().to_string());
                        }
                    }
                    (None, Some(new_child)) => {
                        child_ids.push(new_child.id().to_string());
                        acc.add
                            .insert(new_child.id().to_string(), compress::tree(new_child));
                    }
                    (Some(old_child), None) => acc.delete.push(old_child.id().to_string()),
                    (None, None) => {}
                }
            }

            let children_changed = child_ids.len() != old_children.len()
                || child_ids
                    .iter()
                    .zip(old_children)
                    .any(|(id, child)| id != child.id());

            if old_layout.properties != new_layout.properties || children_changed {
                acc.update.insert(
                    old_layout.id.clone(),
                    NodeUpdate {
                        properties: new_layout.properties.clone(),
                        children: Some(child_ids),
                    },
                );
            }
        }
        _ => {
            if old.properties() != new.properties() {
                let compressed = compress::shallow(new);
                acc.update.insert(
                    old.id().to_string(),
                    NodeUpdate {
                        properties: compressed.properties().clone(),
                        children: None,
                    },
                );
            }
        }
    }

    acc.id_map
        .insert(new.id().to_string(), old.id().to_string());
}

fn apply_ids(root: &mut Node, id_map: &HashMap<String, String>) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if let Some(old_id) = id_map.get(node.id()) {
            let old_id = old_id.clone();
            node.set_id(old_id);
        }
        stack.extend(node.children_mut().iter_mut());
    }
}

/// Maps every node to the form it sits in, if any. A form maps to itself.
pub fn form_metadata(root: &Node) -> BTreeMap<String, NodeMetadata> {
    let mut metadata = BTreeMap::new();
    let mut stack: Vec<(&Node, Option<&str>)> = vec![(root, None)];
    while let Some((node, form_id)) = stack.pop() {
        let child_form = if node.is_form() {
            Some(node.id())
        } else {
            form_id
        };
        metadata.insert(
            node.id().to_string(),
            NodeMetadata {
                form_id: child_form.map(str::to_string),
            },
        );
        for child in node.children() {
            stack.push((child, child_form));
        }
    }
    metadata
}
