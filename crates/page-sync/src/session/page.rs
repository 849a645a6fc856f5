//! The handle app code drives a session through.

use std::sync::{Arc, Weak};

use bytes::Bytes;
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use super::audit::validate_log;
use super::{Producer, RenderHandle, RenderOptions, RunnerInner};
use crate::error::Severity;
use crate::protocol::{
    self, Appearance, ConfirmOptions, DownloadMetadata, LoadingOptions, LogSeverity, ModalWidth,
    PageConfig, ServerMessage, ToastOptions,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModalOptions {
    pub key: Option<String>,
    pub title: Option<String>,
    pub width: Option<ModalWidth>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkOptions {
    pub new_tab: bool,
    pub params: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogOptions {
    pub severity: Option<LogSeverity>,
    pub data: Option<Map<String, Value>>,
}

/// Every method is a no-op once the session has been torn down.
#[derive(Clone)]
pub struct Page {
    runner: Weak<RunnerInner>,
    params: Arc<Map<String, Value>>,
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("params", &self.params)
            .field("attached", &(self.runner.strong_count() > 0))
            .finish()
    }
}

impl Page {
    pub(crate) fn new(runner: &Arc<RunnerInner>, params: Map<String, Value>) -> Self {
        Self {
            runner: Arc::downgrade(runner),
            params: Arc::new(params),
        }
    }

    fn with_runner<R>(
        &self,
        method: &'static str,
        f: impl FnOnce(&Arc<RunnerInner>) -> R,
    ) -> Option<R> {
        let runner = self.runner.upgrade()?;
        debug!(target: "page_sync::page", method, "page call");
        Some(f(&runner))
    }

    /// Route and query parameters the execution was started with.
    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Appends a render to the page.
    pub fn add(&self, producer: impl Into<Producer>) -> RenderHandle {
        self.render(producer.into(), RenderOptions::default())
    }

    /// Like [`Page::add`], with a caller-chosen render id.
    pub fn add_keyed(&self, key: impl Into<String>, producer: impl Into<Producer>) -> RenderHandle {
        self.render(
            producer.into(),
            RenderOptions {
                key: Some(key.into()),
                ..RenderOptions::default()
            },
        )
    }

    /// Opens a modal. The handle resolves when the modal is resolved or the
    /// user dismisses it (`None`).
    pub fn modal(&self, producer: impl Into<Producer>, options: ModalOptions) -> RenderHandle {
        self.render(
            producer.into(),
            RenderOptions {
                key: options.key,
                appearance: Appearance::Modal,
                modal_header: options.title,
                modal_width: options.width,
            },
        )
    }

    fn render(&self, producer: Producer, options: RenderOptions) -> RenderHandle {
        self.with_runner("add", |runner| runner.render(producer, options))
            .unwrap_or_else(RenderHandle::closed)
    }

    /// Asks the user to confirm. Resolves `false` when declined or when
    /// another dialog is already open.
    pub async fn confirm(&self, options: ConfirmOptions) -> bool {
        let Some(runner) = self.runner.upgrade() else {
            return false;
        };
        debug!(target: "page_sync::page", method = "confirm", "page call");
        runner.confirm(options).await
    }

    pub fn toast(&self, message: impl Into<String>, options: Option<ToastOptions>) {
        let message = message.into();
        self.with_runner("toast", |runner| {
            runner.send(ServerMessage::Toast { message, options })
        });
    }

    pub fn set_config(&self, config: PageConfig) {
        self.with_runner("set_config", |runner| {
            runner.send(ServerMessage::PageConfig { config })
        });
    }

    /// Navigates to another app route or an external URL.
    pub fn link(&self, app_route_or_url: impl Into<String>, options: LinkOptions) {
        let app_route_or_url = app_route_or_url.into();
        self.with_runner("link", |runner| {
            runner.send(ServerMessage::Link {
                app_route_or_url,
                new_tab: options.new_tab,
                params: options.params,
            })
        });
    }

    pub fn reload(&self) {
        self.with_runner("reload", |runner| runner.send(ServerMessage::ReloadPage));
    }

    pub fn loading(&self, value: bool, properties: Option<LoadingOptions>) {
        self.with_runner("loading", |runner| {
            runner.send(ServerMessage::UpdateLoading { value, properties })
        });
    }

    /// Sends a file to the browser as a binary frame.
    pub fn download(&self, contents: impl Into<Bytes>, name: impl Into<String>) {
        let contents = contents.into();
        let metadata = DownloadMetadata {
            name: name.into(),
            download: true,
            id: Uuid::new_v4().to_string(),
        };
        self.with_runner("download", |runner| {
            let frame = protocol::encode_download(
                &runner.browser_session_id,
                &runner.execution_id,
                &metadata,
                &contents,
            );
            let sent = match frame {
                Ok(frame) => runner.sink.send_raw(frame).map_err(|err| err.to_string()),
                Err(err) => Err(err.to_string()),
            };
            if let Err(err) = sent {
                runner.send_error(
                    format!("An error occurred while trying to download a file:\n\n{err}"),
                    Severity::Error,
                );
            }
        });
    }

    /// Writes an entry to the audit log. Rejected entries are reported to the
    /// browser at info severity.
    pub fn log(&self, message: impl Into<String>, options: LogOptions) {
        let message = message.into();
        self.with_runner("log", |runner| {
            let checked = {
                let mut limiter = runner.audit.lock();
                if limiter.invoke() {
                    Ok(())
                } else {
                    Err(crate::error::AuditLogError::RateLimited {
                        limit: limiter.limit(),
                    })
                }
            }
            .and_then(|()| validate_log(&message, options.data.as_ref()));

            match checked {
                Ok(()) => runner.send(ServerMessage::WriteAuditLog {
                    message,
                    severity: options.severity,
                    data: options.data,
                }),
                Err(err) => runner.send_error(err.to_string(), Severity::Info),
            }
        });
    }

    /// Sets the values of inputs by id across every render on the page.
    pub fn set_inputs(&self, values: Map<String, Value>) {
        self.with_runner("set_inputs", |runner| runner.set_inputs(values));
    }

    /// Re-runs every reactive producer without touching state.
    pub fn update(&self) {
        self.with_runner("update", |runner| runner.state.update());
    }
}
