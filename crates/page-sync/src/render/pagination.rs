use serde_json::Value;

use crate::model::tree::{count_by_predicate, edit_by_predicate};
use crate::model::{ColumnSort, Input, Node, PageChange};
use crate::table::{
    DEFAULT_OFFSET, DEFAULT_PAGE_SIZE, Stale, TableRegistry, TableSeed, TableUpdate, TableView,
};

/// Injects the current page of every paginated table into the tree and
/// keeps the registry in step with which tables are paginated.
pub fn configure_table_pagination(root: Node, render_id: &str, tables: &TableRegistry) -> Node {
    let paginated = count_by_predicate(&root, |node| {
        node.as_table()
            .is_some_and(|table| table.hooks.on_page_change.is_some())
    });
    if paginated == 0 {
        tables.remove_for_render(render_id);
        return root;
    }

    edit_by_predicate(
        root,
        &mut |node: &Node| node.as_table().is_some(),
        &mut |node: Node| match node {
            Node::Input(input) => Node::Input(paginate(input, render_id, tables)),
            other => other,
        },
    )
}

/// The producer-supplied sort and filter of a table.
pub fn initial_view(input: &Input) -> TableView {
    let sort_by = input
        .properties
        .get("sortBy")
        .cloned()
        .and_then(|value| serde_json::from_value::<Vec<ColumnSort>>(value).ok())
        .unwrap_or_default();
    let filter_by = input
        .properties
        .get("filterBy")
        .filter(|value| !value.is_null())
        .cloned();
    TableView { sort_by, filter_by }
}

fn paginate(mut input: Input, render_id: &str, tables: &TableRegistry) -> Input {
    let Some(source) = input.hooks.on_page_change.clone() else {
        if tables.contains(render_id, &input.id) {
            tables.remove(render_id, &input.id);
        }
        return input;
    };

    let current = tables.get(render_id, &input.id);
    let offset = current.as_ref().map_or(DEFAULT_OFFSET, |record| record.offset);
    let page_size = match &current {
        Some(record) => record.page_size,
        None => input
            .properties
            .get("pageSize")
            .and_then(Value::as_u64)
            .filter(|size| *size > 0)
            .map_or(DEFAULT_PAGE_SIZE, |size| size as usize),
    };
    let search_query = current.as_ref().and_then(|record| record.search_query.clone());
    let view = initial_view(&input);

    let (data, total_records) = match source {
        PageChange::Manual(_) => match &current {
            Some(record) => {
                let total = record
                    .total_records
                    .filter(|total| *total > 0)
                    .unwrap_or(record.data.len() as u64);
                tables.update(
                    render_id,
                    &input.id,
                    TableUpdate {
                        stale: Some(Stale::UpdateNotDisabled),
                        initial_view: Some(view),
                        ..TableUpdate::default()
                    },
                );
                (record.data.clone(), total)
            }
            None => {
                tables.insert(
                    render_id,
                    &input.id,
                    TableSeed {
                        data: Vec::new(),
                        total_records: None,
                        search_query: search_query.clone(),
                        offset,
                        page_size,
                        stale: Stale::InitiallyStale,
                        initial_view: view,
                    },
                );
                (Vec::new(), 0)
            }
        },
        PageChange::Auto(rows) => {
            let all = rows();
            let total = all.len() as u64;
            let page: Vec<Value> = all.into_iter().skip(offset).take(page_size).collect();
            match &current {
                Some(_) => {
                    tables.update(
                        render_id,
                        &input.id,
                        TableUpdate {
                            initial_view: Some(view),
                            ..TableUpdate::default()
                        },
                    );
                }
                None => tables.insert(
                    render_id,
                    &input.id,
                    TableSeed {
                        data: page.clone(),
                        total_records: Some(total),
                        search_query: search_query.clone(),
                        offset,
                        page_size,
                        stale: Stale::False,
                        initial_view: view,
                    },
                ),
            }
            (page, total)
        }
    };

    let properties = &mut input.properties;
    properties.insert("data".into(), Value::Array(data));
    properties.insert("totalRecords".into(), total_records.into());
    properties.insert("offset".into(), offset.into());
    properties.insert(
        "searchQuery".into(),
        search_query.map_or(Value::Null, Value::String),
    );
    properties.insert("pageSize".into(), page_size.into());
    input
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PageResponse, ui};
    use serde_json::json;
    use std::time::Duration;

    fn registry() -> TableRegistry {
        TableRegistry::new(Duration::from_millis(250))
    }

    fn rows(n: usize) -> Vec<Value> {
        (0..n).map(|i| json!({ "id": i })).collect()
    }

    fn manual_table(id: &str) -> Node {
        ui::table(id, Vec::new()).paginate(PageChange::manual(|_request| async {
            Ok(PageResponse::default())
        }))
    }

    #[test]
    fn unpaginated_tree_clears_render_tables() {
        let tables = registry();
        tables.insert(
            "r",
            "old",
            TableSeed {
                data: Vec::new(),
                total_records: None,
                search_query: None,
                offset: 0,
                page_size: 10,
                stale: Stale::False,
                initial_view: TableView::default(),
            },
        );
        let tree = ui::stack(vec![ui::table("plain", rows(3))]);
        configure_table_pagination(tree, "r", &tables);
        assert!(tables.for_render("r").is_empty());
    }

    #[test]
    fn auto_pagination_slices_first_page() {
        let tables = registry();
        let all = rows(250);
        let tree = ui::stack(vec![
            ui::table("t", Vec::new()).paginate(PageChange::auto(move || all.clone())),
        ]);
        let tree = configure_table_pagination(tree, "r", &tables);
        let table = &tree.children()[0];
        let properties = table.properties();
        assert_eq!(properties["data"].as_array().unwrap().len(), 100);
        assert_eq!(properties["totalRecords"], json!(250));
        assert_eq!(properties["offset"], json!(0));
        assert_eq!(properties["searchQuery"], Value::Null);
        let record = tables.get("r", "t").unwrap();
        assert_eq!(record.stale, Stale::False);
        assert_eq!(record.total_records, Some(250));
    }

    #[test]
    fn auto_pagination_respects_stored_offset() {
        let tables = registry();
        let all = rows(250);
        let build = || {
            let all = all.clone();
            ui::stack(vec![
                ui::table("t", Vec::new())
                    .with_property("pageSize", 50)
                    .paginate(PageChange::auto(move || all.clone())),
            ])
        };
        configure_table_pagination(build(), "r", &tables);
        tables.update(
            "r",
            "t",
            TableUpdate {
                offset: Some(200),
                ..TableUpdate::default()
            },
        );
        let tree = configure_table_pagination(build(), "r", &tables);
        let data = tree.children()[0].properties()["data"].as_array().unwrap().clone();
        assert_eq!(data.len(), 50);
        assert_eq!(data[0], json!({"id": 200}));
    }

    #[test]
    fn manual_pagination_starts_initially_stale() {
        let tables = registry();
        let tree = configure_table_pagination(ui::stack(vec![manual_table("t")]), "r", &tables);
        let properties = tree.children()[0].properties();
        assert_eq!(properties["data"], json!([]));
        assert_eq!(properties["totalRecords"], json!(0));
        let record = tables.get("r", "t").unwrap();
        assert_eq!(record.stale, Stale::InitiallyStale);
        assert_eq!(record.total_records, None);
    }

    #[test]
    fn manual_pagination_reuses_cached_page() {
        let tables = registry();
        configure_table_pagination(ui::stack(vec![manual_table("t")]), "r", &tables);
        tables.update(
            "r",
            "t",
            TableUpdate {
                data: Some(rows(2)),
                total_records: Some(40),
                stale: Some(Stale::False),
                ..TableUpdate::default()
            },
        );
        let tree = configure_table_pagination(ui::stack(vec![manual_table("t")]), "r", &tables);
        let properties = tree.children()[0].properties();
        assert_eq!(properties["data"].as_array().unwrap().len(), 2);
        assert_eq!(properties["totalRecords"], json!(40));
        assert_eq!(tables.get("r", "t").unwrap().stale, Stale::UpdateNotDisabled);
    }

    #[test]
    fn dropping_pagination_removes_record() {
        let tables = registry();
        configure_table_pagination(
            ui::stack(vec![manual_table("t"), manual_table("u")]),
            "r",
            &tables,
        );
        configure_table_pagination(
            ui::stack(vec![ui::table("t", Vec::new()), manual_table("u")]),
            "r",
            &tables,
        );
        assert!(!tables.contains("r", "t"));
        assert!(tables.contains("r", "u"));
    }
}
