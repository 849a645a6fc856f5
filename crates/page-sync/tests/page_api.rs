mod common;

use common::{Harness, app_errors, kinds, params, settle, to_json};
use page_sync::protocol::{LogSeverity, ToastAppearance, ToastOptions, decode_download};
use page_sync::{
    AppContext, AppDefinition, EngineConfig, LinkOptions, LogOptions, Outbound, Severity, ui,
};
use serde_json::json;

#[test_timeout::tokio_timeout_test(5, paused)]
async fn inputs_set_before_the_first_render_are_replayed() {
    let app = AppDefinition::new("inputs", |AppContext { page, .. }| async move {
        let _ = page.add_keyed(
            "main",
            ui::stack(vec![ui::text_input("name"), ui::date_input("due")]),
        );
        page.set_inputs(params(json!({"name": "Ada", "due": "2024-03-09"})));
        Ok(())
    });
    let mut harness = Harness::launch(app).await;
    let messages = harness.drain();

    assert_eq!(kinds(&messages), ["render_ui", "set_inputs"]);
    assert_eq!(
        to_json(&messages[1])["inputs"],
        json!({"name": "Ada", "due": {"year": 2024, "month": 3, "day": 9}})
    );
}

#[test_timeout::tokio_timeout_test(5, paused)]
async fn set_inputs_rejects_unknown_and_unsettable_targets() {
    let app = AppDefinition::new("inputs", |AppContext { page, .. }| async move {
        let _ = page.add_keyed(
            "main",
            ui::stack(vec![ui::text_input("name"), ui::file_drop("upload")]),
        );
        let _ = page.add_keyed("other", ui::text_input("name"));
        Ok(())
    });
    let mut harness = Harness::launch(app).await;
    harness.drain();
    let page = harness.runner.page(serde_json::Map::new());

    page.set_inputs(params(json!({"missing": 1})));
    page.set_inputs(params(json!({"upload": null})));
    page.set_inputs(params(json!({"name": "twice"})));
    let prefix = "An error occurred while trying to set an input value:\n\n";
    assert_eq!(
        app_errors(&harness.drain()),
        [
            (
                format!("{prefix}No input was found with the ID: missing"),
                Severity::Warning
            ),
            (
                format!(
                    "{prefix}Inputs of type input-file-drop cannot be set using the page.set_inputs method"
                ),
                Severity::Warning
            ),
            (
                format!("{prefix}Multiple inputs were found with the same ID: name"),
                Severity::Warning
            ),
        ]
    );
}

#[test_timeout::tokio_timeout_test(5, paused)]
async fn navigation_and_feedback_messages() {
    let mut harness = Harness::launch(AppDefinition::new("nav", |_| async { Ok(()) })).await;
    let page = harness.runner.page(params(json!({"customer": 7})));
    assert_eq!(page.params()["customer"], 7);

    page.toast(
        "Saved",
        Some(ToastOptions {
            appearance: Some(ToastAppearance::Success),
            ..ToastOptions::default()
        }),
    );
    page.link("/orders", LinkOptions::default());
    page.loading(true, None);
    page.reload();

    let messages = harness.drain();
    assert_eq!(
        kinds(&messages),
        ["toast", "link", "update_loading", "reload_page"]
    );
    assert_eq!(to_json(&messages[0])["options"]["appearance"], "success");
    assert_eq!(
        to_json(&messages[1]),
        json!({"type": "link", "appRouteOrUrl": "/orders", "newTab": false, "params": {}})
    );
    assert_eq!(to_json(&messages[2]), json!({"type": "update_loading", "value": true}));
}

#[test_timeout::tokio_timeout_test(5, paused)]
async fn downloads_are_sent_as_binary_frames() {
    let mut harness = Harness::launch(AppDefinition::new("export", |_| async { Ok(()) })).await;
    let page = harness.runner.page(serde_json::Map::new());

    page.download(&b"id,total\n1,9.99\n"[..], "orders.csv");
    let frames = harness.drain_frames();
    assert_eq!(frames.len(), 1);
    let Outbound::Raw(frame) = &frames[0] else {
        panic!("expected a binary frame");
    };
    let (metadata, contents) =
        decode_download(frame, common::BROWSER_SESSION, common::EXECUTION).unwrap();
    assert_eq!(metadata.name, "orders.csv");
    assert!(metadata.download);
    assert!(!metadata.id.is_empty());
    assert_eq!(&contents[..], b"id,total\n1,9.99\n");
}

#[test_timeout::tokio_timeout_test(5, paused)]
async fn audit_logs_are_validated_and_rate_limited() {
    let config = EngineConfig {
        audit_log_limit: 2,
        ..EngineConfig::default()
    };
    let mut harness =
        Harness::with_config(AppDefinition::new("audit", |_| async { Ok(()) }), config);
    harness.start().await;
    let page = harness.runner.page(serde_json::Map::new());

    page.log(
        "refund issued",
        LogOptions {
            severity: Some(LogSeverity::Warn),
            data: Some(params(json!({"amount": 12}))),
        },
    );
    page.log("", LogOptions::default());
    page.log("third", LogOptions::default());

    let messages = harness.drain();
    assert_eq!(kinds(&messages), ["write_audit_log", "app_error", "app_error"]);
    assert_eq!(
        to_json(&messages[0]),
        json!({
            "type": "write_audit_log",
            "message": "refund issued",
            "severity": "warn",
            "data": {"amount": 12}
        })
    );
    assert_eq!(
        app_errors(&messages),
        [
            ("Audit log contained no message.".to_string(), Severity::Info),
            (
                "Audit log rate limit exceeded. Logs are hard capped at 2 per minute.".to_string(),
                Severity::Info
            ),
        ]
    );

    tokio::time::advance(std::time::Duration::from_secs(61)).await;
    page.log("next window", LogOptions::default());
    assert_eq!(kinds(&harness.drain()), ["write_audit_log"]);
    settle().await;
}
