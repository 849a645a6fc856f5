use std::collections::HashSet;

use crate::error::ValidationError;
use crate::model::Node;

pub const MAX_TREE_DEPTH: usize = 100;

/// Checks the structural rules a tree must satisfy before it is sent and
/// returns the first violation found in pre-order.
pub fn validate(root: &Node, max_depth: usize) -> Result<(), ValidationError> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut stack: Vec<(&Node, bool, usize)> = vec![(root, false, 0)];

    while let Some((node, inside_form, depth)) = stack.pop() {
        if depth > max_depth {
            return Err(ValidationError::MaxDepthExceeded { max: max_depth });
        }
        if node.id().is_empty() {
            return Err(ValidationError::EmptyId);
        }
        if node.is_form() && inside_form {
            return Err(ValidationError::NestedForm {
                id: node.id().to_string(),
            });
        }
        if let Node::Input(input) = node {
            if inside_form && input.hooks.on_enter.is_some() && input.ty.supports_enter() {
                return Err(ValidationError::OnEnterInsideForm {
                    id: input.id.clone(),
                });
            }
        }
        if !seen.insert(node.id()) {
            return Err(ValidationError::DuplicateId {
                id: node.id().to_string(),
            });
        }

        let child_in_form = inside_form || node.is_form();
        for child in node.children().iter().rev() {
            stack.push((child, child_in_form, depth + 1));
        }
    }

    Ok(())
}
