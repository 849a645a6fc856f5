//! Traversal helpers over a component tree.
//!
//! Lookups walk depth-first, pre-order, with an explicit stack. Edits
//! consume the tree and rebuild containers on the way back up.

use super::node::{ComponentType, Node};

pub fn find_by_predicate<P>(root: &Node, mut predicate: P) -> Option<&Node>
where
    P: FnMut(&Node) -> bool,
{
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if predicate(node) {
            return Some(node);
        }
        stack.extend(node.children().iter().rev());
    }
    None
}

pub fn find_by_id<'a>(root: &'a Node, id: &str) -> Option<&'a Node> {
    find_by_predicate(root, |node| node.id() == id)
}

pub fn find_by_id_mut<'a>(root: &'a mut Node, id: &str) -> Option<&'a mut Node> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.id() == id {
            return Some(node);
        }
        stack.extend(node.children_mut().iter_mut().rev());
    }
    None
}

pub fn find_by_type(root: &Node, ty: ComponentType) -> Option<&Node> {
    find_by_predicate(root, |node| node.component_type() == ty)
}

pub fn count_by_predicate<P>(root: &Node, mut predicate: P) -> usize
where
    P: FnMut(&Node) -> bool,
{
    let mut count = 0;
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if predicate(node) {
            count += 1;
        }
        stack.extend(node.children().iter().rev());
    }
    count
}

/// Visits every node in pre-order, awaiting each visit before moving on.
pub async fn visit_async<'a, F, Fut>(root: &'a Node, mut visit: F)
where
    F: FnMut(&'a Node) -> Fut,
    Fut: Future<Output = ()>,
{
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        visit(node).await;
        stack.extend(node.children().iter().rev());
    }
}

/// Replaces every node matching `predicate` with `edit(node)`. Traversal
/// continues into the children of the replacement, never the original.
pub fn edit_by_predicate<P, E>(root: Node, predicate: &mut P, edit: &mut E) -> Node
where
    P: FnMut(&Node) -> bool,
    E: FnMut(Node) -> Node,
{
    let node = if predicate(&root) { edit(root) } else { root };
    match node {
        Node::Layout(mut layout) => {
            layout.children = layout
                .children
                .map(|child| edit_by_predicate(child, &mut *predicate, &mut *edit));
            Node::Layout(layout)
        }
        leaf => leaf,
    }
}
