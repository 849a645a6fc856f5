#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use page_sync::{
    AppDefinition, ChannelSink, EngineConfig, Outbound, ServerMessage, SessionRunner, Severity,
};
use serde_json::{Map, Value};
use tokio::sync::mpsc::UnboundedReceiver;

pub const BROWSER_SESSION: &str = "browser-1";
pub const EXECUTION: &str = "exec-1";

/// A runner wired to a recording sink.
pub struct Harness {
    pub runner: SessionRunner,
    outbound: UnboundedReceiver<Outbound>,
}

impl Harness {
    pub fn new(app: AppDefinition) -> Self {
        Self::with_config(app, EngineConfig::default())
    }

    pub fn with_config(app: AppDefinition, config: EngineConfig) -> Self {
        let (sink, outbound) = ChannelSink::new();
        let runner = SessionRunner::new(app, Arc::new(sink), BROWSER_SESSION, EXECUTION, config);
        Self { runner, outbound }
    }

    /// Builds a harness and runs the app handler until the session is quiet.
    pub async fn launch(app: AppDefinition) -> Self {
        let harness = Self::new(app);
        harness.start().await;
        harness
    }

    pub async fn start(&self) {
        let runner = self.runner.clone();
        tokio::spawn(async move { runner.execute(Map::new()).await });
        settle().await;
    }

    pub fn drain_frames(&mut self) -> Vec<Outbound> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.outbound.try_recv() {
            frames.push(frame);
        }
        frames
    }

    pub fn drain(&mut self) -> Vec<ServerMessage> {
        self.drain_frames()
            .into_iter()
            .filter_map(|frame| match frame {
                Outbound::Message(envelope) => Some(envelope.message),
                Outbound::Raw(_) => None,
            })
            .collect()
    }
}

/// Lets spawned work and every debounce window run out. The tests run on
/// a paused clock, so this costs no wall time.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(500)).await;
}

pub fn to_json(message: &ServerMessage) -> Value {
    serde_json::to_value(message).expect("outbound messages serialize")
}

pub fn kinds(messages: &[ServerMessage]) -> Vec<&'static str> {
    messages.iter().map(ServerMessage::kind).collect()
}

pub fn app_errors(messages: &[ServerMessage]) -> Vec<(String, Severity)> {
    messages
        .iter()
        .filter_map(|message| match message {
            ServerMessage::AppError {
                error_message,
                severity,
            } => Some((error_message.clone(), *severity)),
            _ => None,
        })
        .collect()
}

pub fn rendered_ids(messages: &[ServerMessage]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|message| match message {
            ServerMessage::RenderUi { render_id, .. } => Some(render_id.clone()),
            _ => None,
        })
        .collect()
}

pub fn params(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
