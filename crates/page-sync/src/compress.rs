//! Wire compaction for outbound trees.
//!
//! Tables dominate payload size, so their rows are re-keyed by column
//! position and the column list records the original key of each
//! position. Every other node passes through untouched.

use serde_json::{Map, Value};

use crate::model::{Children, Input, Node};

/// Compresses a node and all of its descendants.
pub fn tree(node: &Node) -> Node {
    match node {
        Node::Layout(layout) => {
            let mut layout = layout.clone();
            layout.children = match layout.children {
                Children::Single(child) => Children::Single(Box::new(tree(&child))),
                Children::Many(children) => Children::Many(children.iter().map(tree).collect()),
            };
            Node::Layout(layout)
        }
        other => shallow(other),
    }
}

/// Compresses only the node itself.
pub fn shallow(node: &Node) -> Node {
    match node {
        Node::Input(input) if input.is_table() => Node::Input(table(input)),
        other => other.clone(),
    }
}

fn table(input: &Input) -> Input {
    let mut input = input.clone();
    let Some(Value::Array(rows)) = input.properties.get("data") else {
        return input;
    };

    let columns: Vec<Value> = match input.properties.get("columns") {
        Some(Value::Array(columns)) => columns.clone(),
        _ => match rows.first() {
            Some(Value::Object(first)) => first.keys().cloned().map(Value::String).collect(),
            _ => return input,
        },
    };

    let mut keys = Vec::with_capacity(columns.len());
    let mut optimized = Vec::with_capacity(columns.len());
    for (idx, column) in columns.into_iter().enumerate() {
        let position = idx.to_string();
        match column {
            Value::String(original) => {
                let mut entry = Map::new();
                entry.insert("key".into(), Value::String(position));
                entry.insert("original".into(), Value::String(original.clone()));
                keys.push(original);
                optimized.push(Value::Object(entry));
            }
            Value::Object(mut entry) => {
                let original = entry
                    .get("key")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                entry.insert("key".into(), Value::String(position));
                entry.insert("original".into(), Value::String(original.clone()));
                keys.push(original);
                optimized.push(Value::Object(entry));
            }
            _ => continue,
        }
    }

    let compressed: Vec<Value> = rows
        .iter()
        .map(|row| {
            let mut out = Map::new();
            if let Value::Object(row) = row {
                for (idx, key) in keys.iter().enumerate() {
                    if let Some(value) = row.get(key) {
                        out.insert(idx.to_string(), value.clone());
                    }
                }
            }
            Value::Object(out)
        })
        .collect();

    input.properties.insert("columns".into(), Value::Array(optimized));
    input.properties.insert("data".into(), Value::Array(compressed));
    input
}
