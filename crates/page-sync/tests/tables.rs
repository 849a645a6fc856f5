mod common;

use std::sync::Arc;

use common::{Harness, kinds, settle, to_json};
use page_sync::model::{PageChange, PageRequest, PageResponse};
use page_sync::session::PageQuery;
use page_sync::table::Stale;
use page_sync::{AppContext, AppDefinition, Producer, ServerMessage, ui};
use parking_lot::Mutex;
use serde_json::{Value, json};

const TOTAL: u64 = 42;

fn order(id: usize) -> Value {
    json!({"id": id, "item": format!("order-{id}")})
}

fn orders_app(requests: Arc<Mutex<Vec<PageRequest>>>) -> AppDefinition {
    AppDefinition::new("orders", move |AppContext { page, .. }| {
        let requests = Arc::clone(&requests);
        async move {
            let _ = page.add_keyed(
                "main",
                Producer::from_fn(move |_| {
                    let requests = Arc::clone(&requests);
                    ui::table("orders", Vec::new())
                        .with_property("pageSize", 5)
                        .paginate(PageChange::manual(move |request: PageRequest| {
                            requests.lock().push(request.clone());
                            async move {
                                Ok(PageResponse {
                                    data: (request.offset..request.offset + request.page_size)
                                        .map(order)
                                        .collect(),
                                    total_records: TOTAL,
                                })
                            }
                        }))
                }),
            );
            Ok(())
        }
    })
}

fn stale_of(message: &ServerMessage) -> Option<Stale> {
    match message {
        ServerMessage::StaleStateUpdate { stale, .. } => Some(*stale),
        _ => None,
    }
}

#[test_timeout::tokio_timeout_test(5, paused)]
async fn manual_table_starts_initially_stale_and_fetches_first_page() {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let mut harness = Harness::launch(orders_app(Arc::clone(&requests))).await;
    let messages = harness.drain();

    assert_eq!(
        kinds(&messages),
        ["render_ui", "stale_state_update", "table_page_change_response"]
    );
    let render = to_json(&messages[0]);
    assert_eq!(render["ui"]["model"]["properties"]["data"], json!([]));
    assert_eq!(render["ui"]["model"]["properties"]["totalRecords"], 0);
    assert_eq!(stale_of(&messages[1]), Some(Stale::InitiallyStale));

    let response = to_json(&messages[2]);
    assert_eq!(response["componentId"], "orders");
    assert_eq!(response["totalRecords"], TOTAL);
    assert_eq!(response["stale"], "false");
    assert_eq!(response["data"].as_array().unwrap().len(), 5);

    let requests = requests.lock();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].offset, 0);
    assert_eq!(requests[0].page_size, 5);
    assert_eq!(requests[0].prev_total_records, None);

    let record = harness.runner.tables().get("main", "orders").unwrap();
    assert_eq!(record.stale, Stale::False);
    assert_eq!(record.total_records, Some(TOTAL));
}

#[test_timeout::tokio_timeout_test(5, paused)]
async fn refetch_of_unchanged_data_reports_not_stale_without_rows() {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let mut harness = Harness::launch(orders_app(Arc::clone(&requests))).await;
    harness.drain();

    harness.runner.page(serde_json::Map::new()).update();
    settle().await;
    let messages = harness.drain();

    assert_eq!(kinds(&messages), ["stale_state_update", "stale_state_update"]);
    assert_eq!(stale_of(&messages[0]), Some(Stale::UpdateNotDisabled));
    assert_eq!(stale_of(&messages[1]), Some(Stale::False));

    let requests = requests.lock();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].prev_total_records, None, "refresh recounts");
    assert_eq!(
        harness.runner.tables().get("main", "orders").unwrap().stale,
        Stale::False
    );
}

#[test_timeout::tokio_timeout_test(5, paused)]
async fn page_change_serves_the_requested_page() {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let mut harness = Harness::launch(orders_app(Arc::clone(&requests))).await;
    harness.drain();

    harness
        .runner
        .on_table_page_change(
            "main",
            "orders",
            PageQuery {
                search_query: Some("order".into()),
                offset: 10,
                page_size: 5,
                sort_by: Vec::new(),
            },
        )
        .await;
    let messages = harness.drain();
    assert_eq!(kinds(&messages), ["table_page_change_response"]);
    let response = to_json(&messages[0]);
    assert_eq!(response["offset"], 10);
    assert_eq!(response["searchQuery"], "order");

    let last = requests.lock().last().cloned().unwrap();
    assert_eq!(last.prev_search_query, None);
    assert_eq!(last.prev_total_records, Some(TOTAL));

    let tree = harness.runner.current_tree("main").unwrap();
    assert_eq!(tree.properties()["offset"], 10);
    assert_eq!(tree.properties()["data"][0], order(10));
}

#[test_timeout::tokio_timeout_test(5, paused)]
async fn auto_table_slices_rows_locally() {
    let app = AppDefinition::new("people", |AppContext { page, .. }| async move {
        let _ = page.add_keyed(
            "main",
            ui::table("people", Vec::new())
                .with_property("pageSize", 10)
                .paginate(PageChange::auto(|| (0..25).map(order).collect())),
        );
        Ok(())
    });
    let mut harness = Harness::launch(app).await;
    let render = to_json(&harness.drain()[0]);
    assert_eq!(render["ui"]["model"]["properties"]["totalRecords"], 25);
    assert_eq!(
        render["ui"]["model"]["properties"]["data"]
            .as_array()
            .unwrap()
            .len(),
        10
    );

    harness
        .runner
        .on_table_page_change(
            "main",
            "people",
            PageQuery {
                offset: 20,
                page_size: 10,
                ..PageQuery::default()
            },
        )
        .await;
    let messages = harness.drain();
    let response = to_json(&messages[0]);
    assert_eq!(response["totalRecords"], 25);
    assert_eq!(response["data"].as_array().unwrap().len(), 5);
}

#[test_timeout::tokio_timeout_test(5, paused)]
async fn page_change_on_a_plain_table_reports_missing_state() {
    let app = AppDefinition::new("plain", |AppContext { page, .. }| async move {
        let _ = page.add_keyed("main", ui::table("plain", vec![order(1)]));
        Ok(())
    });
    let mut harness = Harness::launch(app).await;
    harness.drain();

    harness
        .runner
        .on_table_page_change("main", "plain", PageQuery::default())
        .await;
    let errors = common::app_errors(&harness.drain());
    assert_eq!(
        errors[0].0,
        "An error occurred while trying to execute a table page change hook:\n\nThe table state was not found"
    );
}
