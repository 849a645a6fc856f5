use crate::model::Node;
use crate::model::tree::visit_async;

/// Awaits every deferred property in the tree, then writes the resolved
/// values into the owning nodes' properties.
pub async fn resolve_deferred(mut root: Node) -> Node {
    visit_async(&root, |node| {
        let pending = node.deferred().to_vec();
        async move {
            for deferred in pending {
                deferred.resolve().await;
            }
        }
    })
    .await;

    let mut stack = vec![&mut root];
    while let Some(node) = stack.pop() {
        for deferred in node.take_deferred() {
            if let Some(value) = deferred.peek() {
                node.properties_mut()
                    .insert(deferred.key().to_string(), value.clone());
            }
        }
        stack.extend(node.children_mut().iter_mut());
    }
    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ui;
    use serde_json::json;

    #[test_timeout::tokio_timeout_test]
    async fn resolves_nested_deferred_properties() {
        let tree = ui::stack(vec![ui::card(vec![
            ui::bar_chart("sales", async {
                tokio::task::yield_now().await;
                json!([{"label": "jan", "value": 3}])
            }),
            ui::text("static").with_deferred("caption", async { json!("ready") }),
        ])]);
        let tree = resolve_deferred(tree).await;
        let card = &tree.children()[0];
        assert_eq!(
            card.children()[0].properties()["data"],
            json!([{"label": "jan", "value": 3}])
        );
        assert_eq!(card.children()[1].properties()["caption"], json!("ready"));
        assert!(card.children()[0].deferred().is_empty());
    }
}
