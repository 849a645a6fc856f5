use uuid::Uuid;

use crate::model::tree::find_by_predicate;
use crate::model::{Node, ui};

pub const DEFAULT_SUBMIT_LABEL: &str = "Submit";

/// Gives every form exactly the submit affordance it asked for: forms
/// without a submit button get one appended, and forms that hide their
/// submit button have every submit button inside them blanked out.
pub fn configure_submit_buttons(root: Node) -> Node {
    configure(root, false)
}

fn configure(node: Node, hide: bool) -> Node {
    match node {
        Node::Button(_) if node.is_submit_button() => {
            if hide {
                ui::none()
            } else {
                node
            }
        }
        Node::Layout(mut layout) => {
            let mut hide = hide;
            if layout.is_form() {
                hide = layout.hide_submit_button();
                let has_submit = layout
                    .children
                    .as_slice()
                    .iter()
                    .any(|child| find_by_predicate(child, Node::is_submit_button).is_some());
                if !has_submit {
                    if !hide {
                        layout.children.push(ui::submit_button(
                            Uuid::new_v4().to_string(),
                            DEFAULT_SUBMIT_LABEL,
                        ));
                    }
                    return Node::Layout(layout);
                }
                if !hide {
                    return Node::Layout(layout);
                }
            }
            layout.children = layout.children.map(|child| configure(child, hide));
            Node::Layout(layout)
        }
        other => other,
    }
}
