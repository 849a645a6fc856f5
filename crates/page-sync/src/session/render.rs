use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::oneshot;

use super::RunnerInner;
use crate::model::Node;
use crate::protocol::{Appearance, ModalWidth};

pub type ProducerFn =
    Arc<dyn Fn(Resolver) -> BoxFuture<'static, anyhow::Result<Option<Node>>> + Send + Sync>;

/// What a render slot is built from. Static trees are produced once;
/// reactive producers are re-run on every reconciliation pass.
#[derive(Clone)]
pub enum Producer {
    Static(Node),
    Reactive(ProducerFn),
}

impl Producer {
    pub fn from_fn<F>(produce: F) -> Self
    where
        F: Fn(&Resolver) -> Node + Send + Sync + 'static,
    {
        Producer::Reactive(Arc::new(move |resolver| {
            let node = produce(&resolver);
            async move { Ok(Some(node)) }.boxed()
        }))
    }

    pub fn reactive<F, Fut>(produce: F) -> Self
    where
        F: Fn(Resolver) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Node> + Send + 'static,
    {
        Producer::Reactive(Arc::new(move |resolver| {
            let pending = produce(resolver);
            async move { Ok(Some(pending.await)) }.boxed()
        }))
    }

    /// The producer may fail, or return nothing to render an empty slot.
    pub fn fallible<F, Fut>(produce: F) -> Self
    where
        F: Fn(Resolver) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Option<Node>>> + Send + 'static,
    {
        Producer::Reactive(Arc::new(move |resolver| produce(resolver).boxed()))
    }

    pub fn is_reactive(&self) -> bool {
        matches!(self, Producer::Reactive(_))
    }
}

impl From<Node> for Producer {
    fn from(node: Node) -> Self {
        Producer::Static(node)
    }
}

impl std::fmt::Debug for Producer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Producer::Static(node) => f.debug_tuple("Static").field(&node.id()).finish(),
            Producer::Reactive(_) => f.write_str("Reactive"),
        }
    }
}

/// Completes the render it was handed to. Only the first resolution
/// counts; resolving a modal also closes it.
#[derive(Clone)]
pub struct Resolver {
    render_id: String,
    appearance: Appearance,
    runner: Weak<RunnerInner>,
    sender: Arc<Mutex<Option<oneshot::Sender<Option<Value>>>>>,
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("render_id", &self.render_id)
            .field("appearance", &self.appearance)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl Resolver {
    pub(crate) fn new(
        render_id: String,
        appearance: Appearance,
        runner: Weak<RunnerInner>,
        sender: oneshot::Sender<Option<Value>>,
    ) -> Self {
        Self {
            render_id,
            appearance,
            runner,
            sender: Arc::new(Mutex::new(Some(sender))),
        }
    }

    pub fn render_id(&self) -> &str {
        &self.render_id
    }

    pub fn is_resolved(&self) -> bool {
        self.sender.lock().is_none()
    }

    pub fn resolve(&self, value: impl Into<Value>) {
        self.finish(Some(value.into()));
    }

    pub(crate) fn finish(&self, value: Option<Value>) {
        let Some(sender) = self.sender.lock().take() else {
            return;
        };
        let _ = sender.send(value);
        if let Some(runner) = self.runner.upgrade() {
            runner.on_render_resolved(&self.render_id, self.appearance);
        }
    }
}

/// Resolves with the value passed to [`Resolver::resolve`], or `None` when
/// the render is dismissed or torn down without one.
#[derive(Debug)]
pub struct RenderHandle {
    receiver: oneshot::Receiver<Option<Value>>,
}

impl RenderHandle {
    pub(crate) fn new(receiver: oneshot::Receiver<Option<Value>>) -> Self {
        Self { receiver }
    }

    pub(crate) fn closed() -> Self {
        let (_, receiver) = oneshot::channel();
        Self { receiver }
    }
}

impl Future for RenderHandle {
    type Output = Option<Value>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver)
            .poll(cx)
            .map(|result| result.ok().flatten())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderOptions {
    pub key: Option<String>,
    pub appearance: Appearance,
    pub modal_header: Option<String>,
    pub modal_width: Option<ModalWidth>,
}

pub(crate) struct RenderRecord {
    pub(crate) producer: Producer,
    pub(crate) resolver: Resolver,
    /// The tree the browser currently has, with ids as the browser knows them.
    pub(crate) tree: Node,
    pub(crate) appearance: Appearance,
    pub(crate) modal_header: Option<String>,
    pub(crate) modal_width: Option<ModalWidth>,
    pub(crate) initial_transmission_sent: bool,
}

pub(crate) enum RenderSlot {
    Live(Box<RenderRecord>),
    /// A modal that has been resolved and closed.
    Resolved,
}
