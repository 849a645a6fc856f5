//! Wire types exchanged with the browser-facing host.
//!
//! Outbound messages are JSON objects tagged by `type`; binary downloads
//! use a small length-prefixed frame (see [`encode_download`]).

use std::collections::BTreeMap;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Severity;
use crate::model::{ColumnSort, Node};
use crate::render::RenderPatch;
use crate::table::Stale;

/// Prefix of binary file-transfer frames.
pub const FILE_TRANSFER_PREFIX: &str = "bl";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Appearance {
    #[default]
    Default,
    Modal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModalWidth {
    Sm,
    Md,
    Lg,
    Xl,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastAppearance {
    Success,
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastDuration {
    Shortest,
    Short,
    Medium,
    Long,
    Longest,
    Infinite,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToastOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appearance: Option<ToastAppearance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<ToastDuration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadingOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_interaction: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding_top: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding_bottom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding_left: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub padding_right: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spacing_y: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_to_confirm_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirm_button_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_button_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appearance: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmDialogModel {
    pub id: String,
    pub properties: ConfirmOptions,
}

/// Audit-log severities accepted from app code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl std::str::FromStr for LogSeverity {
    type Err = crate::error::AuditLogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trace" => Ok(LogSeverity::Trace),
            "debug" => Ok(LogSeverity::Debug),
            "info" => Ok(LogSeverity::Info),
            "warn" => Ok(LogSeverity::Warn),
            "error" => Ok(LogSeverity::Error),
            "fatal" => Ok(LogSeverity::Fatal),
            other => Err(crate::error::AuditLogError::InvalidSeverity(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    RenderUi {
        ui: Node,
        render_id: String,
        idx: usize,
        appearance: Appearance,
        #[serde(skip_serializing_if = "Option::is_none")]
        modal_header: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        modal_width: Option<ModalWidth>,
    },
    RerenderUi {
        diff: BTreeMap<String, RenderPatch>,
    },
    CloseModal {
        render_id: String,
    },
    Confirm {
        component: ConfirmDialogModel,
    },
    Toast {
        message: String,
        options: Option<ToastOptions>,
    },
    UpdateLoading {
        value: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        properties: Option<LoadingOptions>,
    },
    PageConfig {
        config: PageConfig,
    },
    Link {
        app_route_or_url: String,
        new_tab: bool,
        params: Map<String, Value>,
    },
    ReloadPage,
    SetInputs {
        inputs: Map<String, Value>,
    },
    StaleStateUpdate {
        render_id: String,
        component_id: String,
        stale: Stale,
    },
    TablePageChangeResponse {
        render_id: String,
        component_id: String,
        data: Value,
        total_records: u64,
        offset: usize,
        search_query: Option<String>,
        stale: Stale,
    },
    InputValidationError {
        render_id: String,
        component_id: String,
        error: String,
    },
    FormValidationError {
        render_id: String,
        form_component_id: String,
        input_component_errors: Option<BTreeMap<String, String>>,
        form_error: String,
    },
    FormSubmissionSuccess {
        render_id: String,
        form_component_id: String,
    },
    AppError {
        error_message: String,
        severity: Severity,
    },
    WriteAuditLog {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        severity: Option<LogSeverity>,
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<Map<String, Value>>,
    },
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::RenderUi { .. } => "render_ui",
            ServerMessage::RerenderUi { .. } => "rerender_ui",
            ServerMessage::CloseModal { .. } => "close_modal",
            ServerMessage::Confirm { .. } => "confirm",
            ServerMessage::Toast { .. } => "toast",
            ServerMessage::UpdateLoading { .. } => "update_loading",
            ServerMessage::PageConfig { .. } => "page_config",
            ServerMessage::Link { .. } => "link",
            ServerMessage::ReloadPage => "reload_page",
            ServerMessage::SetInputs { .. } => "set_inputs",
            ServerMessage::StaleStateUpdate { .. } => "stale_state_update",
            ServerMessage::TablePageChangeResponse { .. } => "table_page_change_response",
            ServerMessage::InputValidationError { .. } => "input_validation_error",
            ServerMessage::FormValidationError { .. } => "form_validation_error",
            ServerMessage::FormSubmissionSuccess { .. } => "form_submission_success",
            ServerMessage::AppError { .. } => "app_error",
            ServerMessage::WriteAuditLog { .. } => "write_audit_log",
        }
    }
}

/// An outbound message addressed to one browser session and execution.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub browser_session_id: String,
    pub execution_id: String,
    #[serde(flatten)]
    pub message: ServerMessage,
}

/// Events delivered by the host on behalf of the browser.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    Click {
        render_id: String,
        component_id: String,
    },
    SubmitForm {
        render_id: String,
        form_component_id: String,
        #[serde(default)]
        form_data: Map<String, Value>,
    },
    OnEnterHook {
        render_id: String,
        component_id: String,
        #[serde(default)]
        value: Value,
    },
    OnSelectHook {
        render_id: String,
        component_id: String,
        #[serde(default)]
        value: Value,
    },
    OnFileChangeHook {
        render_id: String,
        component_id: String,
        #[serde(default)]
        value: Value,
    },
    TableRowAction {
        render_id: String,
        component_id: String,
        action_idx: usize,
        value: Value,
    },
    CloseModal {
        render_id: String,
    },
    FileTransfer {
        file_id: String,
        #[serde(default)]
        contents: Bytes,
    },
    TablePageChange {
        render_id: String,
        component_id: String,
        #[serde(default)]
        search_query: Option<String>,
        offset: usize,
        page_size: usize,
        #[serde(default)]
        sort_by: Vec<ColumnSort>,
    },
    ConfirmResponse {
        id: String,
        response: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadMetadata {
    pub name: String,
    pub download: bool,
    pub id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame too short")]
    Truncated,
    #[error("unexpected frame prefix")]
    BadPrefix,
    #[error("invalid frame metadata: {0}")]
    Metadata(#[from] serde_json::Error),
}

/// Layout: prefix, session id, execution id, u32 big-endian metadata
/// length, metadata JSON, file bytes.
pub fn encode_download(
    browser_session_id: &str,
    execution_id: &str,
    metadata: &DownloadMetadata,
    contents: &[u8],
) -> Result<Bytes, serde_json::Error> {
    let metadata = serde_json::to_vec(metadata)?;
    let header_len = FILE_TRANSFER_PREFIX.len() + browser_session_id.len() + execution_id.len();
    let mut frame = BytesMut::with_capacity(header_len + 4 + metadata.len() + contents.len());
    frame.put_slice(FILE_TRANSFER_PREFIX.as_bytes());
    frame.put_slice(browser_session_id.as_bytes());
    frame.put_slice(execution_id.as_bytes());
    frame.put_u32(metadata.len() as u32);
    frame.put_slice(&metadata);
    frame.put_slice(contents);
    Ok(frame.freeze())
}

/// Inverse of [`encode_download`] given the header length the host knows.
pub fn decode_download(
    frame: &[u8],
    browser_session_id: &str,
    execution_id: &str,
) -> Result<(DownloadMetadata, Bytes), FrameError> {
    let header = format!("{FILE_TRANSFER_PREFIX}{browser_session_id}{execution_id}");
    if frame.len() < header.len() + 4 {
        return Err(FrameError::Truncated);
    }
    if &frame[..header.len()] != header.as_bytes() {
        return Err(FrameError::BadPrefix);
    }
    let mut rest = &frame[header.len()..];
    let metadata_len = rest.get_u32() as usize;
    if rest.len() < metadata_len {
        return Err(FrameError::Truncated);
    }
    let metadata = serde_json::from_slice(&rest[..metadata_len])?;
    Ok((metadata, Bytes::copy_from_slice(&rest[metadata_len..])))
}
