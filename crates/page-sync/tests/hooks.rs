mod common;

use std::sync::Arc;

use common::{Harness, app_errors, kinds, settle, to_json};
use page_sync::model::{FormValue, Validation};
use page_sync::protocol::ConfirmOptions;
use page_sync::{
    AppContext, AppDefinition, ClientEvent, ModalOptions, Producer, ServerMessage, Severity, ui,
};
use parking_lot::Mutex;
use serde_json::{Value, json};

#[test_timeout::tokio_timeout_test(5, paused)]
async fn clicks_on_unknown_renders_warn_and_unknown_nodes_are_ignored() {
    let app = AppDefinition::new("click", |AppContext { page, .. }| async move {
        let _ = page.add_keyed("main", ui::text("nothing to click"));
        Ok(())
    });
    let mut harness = Harness::launch(app).await;
    harness.drain();

    harness.runner.on_click("main", "ghost");
    harness.runner.on_click("missing", "ghost");
    settle().await;
    assert_eq!(
        app_errors(&harness.drain()),
        [(
            "An error occurred while trying to execute a click hook:\n\nThe render container was not found"
                .to_string(),
            Severity::Warning
        )]
    );
}

#[test_timeout::tokio_timeout_test(5, paused)]
async fn failing_hooks_are_reported_as_warnings() {
    let app = AppDefinition::new("faulty", |AppContext { page, .. }| async move {
        let _ = page.add_keyed(
            "main",
            ui::stack(vec![
                ui::button("error", "Error")
                    .on_click(|| async { Err(anyhow::anyhow!("bad click")) }),
                ui::button("panic", "Panic").on_click(|| async {
                    if true {
                        panic!("hook exploded");
                    }
                    Ok(())
                }),
            ]),
        );
        Ok(())
    });
    let mut harness = Harness::launch(app).await;
    harness.drain();

    harness.runner.on_click("main", "error");
    settle().await;
    harness.runner.on_click("main", "panic");
    settle().await;
    assert_eq!(
        app_errors(&harness.drain()),
        [
            (
                "An error occurred while executing a callback function:\n\nbad click".to_string(),
                Severity::Warning
            ),
            (
                "An error occurred while executing a callback function:\n\nhook exploded"
                    .to_string(),
                Severity::Warning
            ),
        ]
    );
}

#[test_timeout::tokio_timeout_test(5, paused)]
async fn enter_hook_validates_before_running() {
    let entered = Arc::new(Mutex::new(Vec::<FormValue>::new()));
    let sink = Arc::clone(&entered);
    let app = AppDefinition::new("search", move |AppContext { page, .. }| {
        let sink = Arc::clone(&sink);
        async move {
            let search = ui::text_input("query")
                .validate(|value: FormValue| async move {
                    Validation::from(value.as_str().is_some_and(|query| query.len() >= 3))
                })
                .on_enter(move |value| {
                    let sink = Arc::clone(&sink);
                    async move {
                        sink.lock().push(value);
                        Ok(())
                    }
                });
            let _ = page.add_keyed("main", search);
            Ok(())
        }
    });
    let mut harness = Harness::launch(app).await;
    harness.drain();

    harness.runner.on_enter("main", "query", json!("ab")).await;
    let messages = harness.drain();
    assert_eq!(kinds(&messages), ["input_validation_error"]);
    assert_eq!(to_json(&messages[0])["error"], "Invalid value");

    harness.runner.on_enter("main", "query", json!("abc")).await;
    settle().await;
    assert!(harness.drain().is_empty());
    assert_eq!(entered.lock()[0].as_str(), Some("abc"));

    harness.runner.on_select("main", "query", json!("abc")).await;
    settle().await;
    assert_eq!(entered.lock().len(), 1, "text inputs have no select hook");
}

#[test_timeout::tokio_timeout_test(5, paused)]
async fn input_events_for_non_inputs_are_errors() {
    let app = AppDefinition::new("inputs", |AppContext { page, .. }| async move {
        let _ = page.add_keyed("main", ui::button("go", "Go"));
        Ok(())
    });
    let mut harness = Harness::launch(app).await;
    harness.drain();

    harness.runner.on_enter("main", "go", json!("x")).await;
    harness.runner.on_enter("main", "nope", json!("x")).await;
    let errors: Vec<String> = app_errors(&harness.drain())
        .into_iter()
        .map(|(message, severity)| {
            assert_eq!(severity, Severity::Error);
            message
        })
        .collect();
    assert_eq!(
        errors,
        [
            "An error occurred while trying to execute an input hook:\n\nThe component is not an input",
            "An error occurred while trying to execute an input hook:\n\nThe component was not found",
        ]
    );
}

#[test_timeout::tokio_timeout_test(5, paused)]
async fn row_actions_receive_the_row_and_index() {
    let seen = Arc::new(Mutex::new(Vec::<(Option<Value>, usize)>::new()));
    let sink = Arc::clone(&seen);
    let app = AppDefinition::new("rows", move |AppContext { page, .. }| {
        let sink = Arc::clone(&sink);
        async move {
            let rows = vec![json!({"id": "a"}), json!({"id": "b"})];
            let table = ui::table("t", rows).on_row_action("Inspect", move |row, index| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().push((row, index));
                    Ok(())
                }
            });
            let _ = page.add_keyed("main", table);
            Ok(())
        }
    });
    let mut harness = Harness::launch(app).await;
    let render = to_json(&harness.drain()[0]);
    assert_eq!(
        render["ui"]["model"]["properties"]["actions"],
        json!([{"label": "Inspect"}])
    );

    harness.runner.on_row_action("main", "t", 0, json!(1));
    settle().await;
    assert_eq!(seen.lock().as_slice(), [(Some(json!({"id": "b"})), 1)]);

    harness.runner.on_row_action("main", "t", 3, json!(0));
    settle().await;
    assert_eq!(
        app_errors(&harness.drain()),
        [(
            "An error occurred while trying to execute a table row action hook:\n\nThe row action was not found"
                .to_string(),
            Severity::Error
        )]
    );
}

#[test_timeout::tokio_timeout_test(5, paused)]
async fn resolving_a_modal_closes_it() {
    let result = Arc::new(Mutex::new(None::<Option<Value>>));
    let sink = Arc::clone(&result);
    let app = AppDefinition::new("modal", move |AppContext { page, .. }| {
        let sink = Arc::clone(&sink);
        async move {
            let handle = page.modal(
                Producer::from_fn(|resolver| {
                    let resolver = resolver.clone();
                    ui::button("done", "Done").on_click(move || {
                        let resolver = resolver.clone();
                        async move {
                            resolver.resolve("picked");
                            Ok(())
                        }
                    })
                }),
                ModalOptions {
                    key: Some("picker".into()),
                    title: Some("Pick one".into()),
                    width: None,
                },
            );
            *sink.lock() = Some(handle.await);
            Ok(())
        }
    });
    let mut harness = Harness::launch(app).await;
    let render = to_json(&harness.drain()[0]);
    assert_eq!(render["appearance"], "modal");
    assert_eq!(render["modalHeader"], "Pick one");

    harness.runner.on_click("picker", "done");
    settle().await;
    let messages = harness.drain();
    assert!(matches!(
        messages.as_slice(),
        [ServerMessage::CloseModal { render_id }] if render_id == "picker"
    ));
    assert_eq!(*result.lock(), Some(Some(json!("picked"))));

    harness.runner.on_click("picker", "done");
    harness.runner.on_close_modal("picker");
    settle().await;
    assert!(harness.drain().is_empty(), "closed modals ignore events");
}

#[test_timeout::tokio_timeout_test(5, paused)]
async fn dismissed_modal_resolves_with_nothing() {
    let result = Arc::new(Mutex::new(None::<Option<Value>>));
    let sink = Arc::clone(&result);
    let app = AppDefinition::new("dismiss", move |AppContext { page, .. }| {
        let sink = Arc::clone(&sink);
        async move {
            let handle = page.modal(
                ui::text("Are you there?"),
                ModalOptions {
                    key: Some("m".into()),
                    ..ModalOptions::default()
                },
            );
            *sink.lock() = Some(handle.await);
            Ok(())
        }
    });
    let mut harness = Harness::launch(app).await;
    harness.drain();

    harness
        .runner
        .dispatch(ClientEvent::CloseModal {
            render_id: "m".into(),
        })
        .await;
    settle().await;
    assert_eq!(kinds(&harness.drain()), ["close_modal"]);
    assert_eq!(*result.lock(), Some(None));
}

#[test_timeout::tokio_timeout_test(5, paused)]
async fn only_one_confirm_dialog_at_a_time() {
    let mut harness = Harness::launch(AppDefinition::new("confirm", |_| async { Ok(()) })).await;
    let page = harness.runner.page(serde_json::Map::new());

    let first_page = page.clone();
    let first = tokio::spawn(async move {
        first_page
            .confirm(ConfirmOptions {
                title: Some("Delete?".into()),
                ..ConfirmOptions::default()
            })
            .await
    });
    settle().await;
    assert!(!page.confirm(ConfirmOptions::default()).await);
    assert!(!first.is_finished());

    let messages = harness.drain();
    assert_eq!(kinds(&messages), ["confirm", "app_error"]);
    let dialog_id = to_json(&messages[0])["component"]["id"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(to_json(&messages[0])["component"]["properties"]["title"], "Delete?");

    harness.runner.on_confirm_response("wrong", true);
    assert_eq!(
        app_errors(&harness.drain())[0].0,
        "An error occurred while trying to resolve a confirmation dialog:\n\nThe confirmation dialog was not found"
    );
    assert!(!first.is_finished());

    harness.runner.on_confirm_response(&dialog_id, true);
    assert!(first.await.unwrap());

    let second_page = page.clone();
    let second = tokio::spawn(async move { second_page.confirm(ConfirmOptions::default()).await });
    settle().await;
    assert_eq!(kinds(&harness.drain()), ["confirm"], "a new dialog may open");
    harness.runner.cleanup();
    assert!(!second.await.unwrap(), "teardown declines the open dialog");
}
