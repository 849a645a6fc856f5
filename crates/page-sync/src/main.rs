use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use page_sync::model::{FormValue, PageChange, Validation};
use page_sync::telemetry::init_tracing;
use page_sync::{
    AppContext, AppDefinition, ChannelSink, ClientEvent, EngineConfig, Outbound, Producer,
    SessionRunner, ui,
};
use serde_json::{Map, Value, json};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(
    name = "page-sync",
    about = "Runs a scripted demo session and prints the outbound protocol",
    author,
    version
)]
struct Cli {
    /// Quiet window for coalescing state updates, in milliseconds.
    #[arg(long, env = "PAGE_SYNC_STATE_DEBOUNCE_MS")]
    state_debounce_ms: Option<u64>,
    /// Tracing filter directive (overrides RUST_LOG).
    #[arg(long)]
    log_filter: Option<String>,
    /// Print raw JSON lines instead of a summary per message.
    #[arg(long)]
    json: bool,
    /// Log per-phase render timings.
    #[arg(long)]
    debug_timings: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = EngineConfig::from_env();
    if let Some(ms) = cli.state_debounce_ms {
        config.state_debounce = Duration::from_millis(ms);
    }
    if let Some(filter) = &cli.log_filter {
        config.log_filter = filter.clone();
    }
    config.debug |= cli.debug_timings;
    init_tracing(&config.log_filter);

    let (sink, mut outbound) = ChannelSink::new();
    let execution_id = Uuid::new_v4().to_string();
    let runner = SessionRunner::new(
        demo_app(),
        Arc::new(sink),
        "demo-browser",
        execution_id.clone(),
        config,
    );
    info!(%execution_id, "starting demo session");

    let json = cli.json;
    let printer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            print_frame(&frame, json)?;
        }
        anyhow::Ok(())
    });

    let app = runner.clone();
    tokio::spawn(async move { app.execute(Map::new()).await });
    settle().await;

    for event in script() {
        info!(?event, "dispatching");
        runner.dispatch(event).await;
        settle().await;
    }

    runner.cleanup();
    drop(runner);
    printer.abort();
    match printer.await {
        Ok(result) => result,
        Err(err) if err.is_cancelled() => Ok(()),
        Err(err) => Err(err).context("printer task failed"),
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

fn print_frame(frame: &Outbound, json: bool) -> anyhow::Result<()> {
    match frame {
        Outbound::Raw(bytes) => println!("<binary frame, {} bytes>", bytes.len()),
        Outbound::Message(envelope) if !json => println!("{}", envelope.message.kind()),
        Outbound::Message(_) => {
            if let Some(line) = frame.to_json()? {
                println!("{line}");
            }
        }
    }
    Ok(())
}

fn people() -> Vec<Value> {
    (1..=25)
        .map(|id| json!({"id": id, "name": format!("Person {id}"), "score": id * 7 % 31}))
        .collect()
}

fn demo_app() -> AppDefinition {
    AppDefinition::new("Demo counter", |context: AppContext| async move {
        let AppContext { page, state } = context;
        let _ = page.add_keyed(
            "main",
            Producer::from_fn(move |_| {
                let count = state.get_as::<i64>("count").unwrap_or(0);
                let clicks = state.clone();
                ui::stack(vec![
                    ui::header(format!("Count: {count}")),
                    ui::button("increment", "Increment").on_click(move || {
                        let clicks = clicks.clone();
                        async move {
                            clicks.modify(|values| {
                                let next =
                                    values.get("count").and_then(Value::as_i64).unwrap_or(0) + 1;
                                values.insert("count".into(), next.into());
                            });
                            Ok(())
                        }
                    }),
                    ui::table("people", Vec::new())
                        .with_property("pageSize", 10)
                        .paginate(PageChange::auto(people)),
                    ui::form(
                        "signup",
                        vec![ui::email_input("email").validate(|value: FormValue| async move {
                            match value.as_str() {
                                Some(email) if email.contains('@') => Validation::Valid,
                                _ => Validation::Message("Enter an email address".into()),
                            }
                        })],
                    )
                    .on_submit(|values| async move {
                        info!(?values, "signup submitted");
                        Ok(())
                    }),
                ])
            }),
        );
        page.toast("Demo ready", None);
        Ok(())
    })
    .with_initial_state(json!({"count": 0}))
}

fn script() -> Vec<ClientEvent> {
    vec![
        ClientEvent::Click {
            render_id: "main".into(),
            component_id: "increment".into(),
        },
        ClientEvent::TablePageChange {
            render_id: "main".into(),
            component_id: "people".into(),
            search_query: None,
            offset: 10,
            page_size: 10,
            sort_by: Vec::new(),
        },
        ClientEvent::SubmitForm {
            render_id: "main".into(),
            form_component_id: "signup".into(),
            form_data: Map::from_iter([("email".to_string(), json!("not-an-email"))]),
        },
        ClientEvent::SubmitForm {
            render_id: "main".into(),
            form_component_id: "signup".into(),
            form_data: Map::from_iter([("email".to_string(), json!("ada@example.com"))]),
        },
    ]
}
