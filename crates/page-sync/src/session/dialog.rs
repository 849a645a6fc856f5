use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::debug;
use uuid::Uuid;

use super::RunnerInner;
use crate::error::{ProtocolError, Severity};
use crate::protocol::{ConfirmDialogModel, ConfirmOptions, ServerMessage};

/// The one confirmation dialog a session may have open.
#[derive(Debug)]
pub struct ConfirmDialog {
    pub id: String,
    pub active: bool,
    responder: Option<oneshot::Sender<bool>>,
}

impl RunnerInner {
    /// Opens a confirmation dialog and waits for the browser's answer. A
    /// second dialog while one is open is refused and reads as declined.
    pub(crate) async fn confirm(self: &Arc<Self>, options: ConfirmOptions) -> bool {
        let receiver = {
            let mut core = self.core.lock();
            if core.confirm.as_ref().is_some_and(|dialog| dialog.active) {
                None
            } else {
                let (sender, receiver) = oneshot::channel();
                let id = Uuid::new_v4().to_string();
                core.confirm = Some(ConfirmDialog {
                    id: id.clone(),
                    active: true,
                    responder: Some(sender),
                });
                Some((id, receiver))
            }
        };

        let Some((id, receiver)) = receiver else {
            self.send_error(
                "An error occurred while trying to open a confirmation dialog:\n\nAnother confirmation dialog is already open",
                Severity::Error,
            );
            return false;
        };

        debug!(target: "page_sync::runner", dialog_id = %id, "confirm dialog opened");
        self.send(ServerMessage::Confirm {
            component: ConfirmDialogModel {
                id,
                properties: options,
            },
        });
        receiver.await.unwrap_or(false)
    }

    pub(crate) fn on_confirm_response(&self, dialog_id: &str, response: bool) {
        let responder = {
            let mut core = self.core.lock();
            match core.confirm.as_mut() {
                Some(dialog) if dialog.id == dialog_id => {
                    dialog.active = false;
                    Ok(dialog.responder.take())
                }
                _ => Err(ProtocolError::DialogNotFound {
                    dialog_id: dialog_id.to_string(),
                }),
            }
        };
        let responder = match responder {
            Ok(responder) => responder,
            Err(err) => {
                self.send_error(
                    format!(
                        "An error occurred while trying to resolve a confirmation dialog:\n\n{err}"
                    ),
                    Severity::Error,
                );
                return;
            }
        };
        if let Some(responder) = responder {
            let _ = responder.send(response);
        }
    }
}
