//! Typed component tree.
//!
//! A tree is built from four closed node families (layout, display, input,
//! button). Each node carries a stable id, a kind-specific type tag, a
//! bag of JSON properties, and whatever hooks its family supports.

mod hooks;
mod node;
pub mod tree;
pub mod ui;
mod value;

pub use hooks::{
    ClickHook, ColumnSort, FormValidator, HookFuture, InputValidator, PageChange, PageFetch,
    PageRequest, PageResponse, PageRows, RowActionHook, SortDirection, SubmitHook, Validation,
    ValueHook,
};
pub use node::{
    Button, ButtonHooks, ButtonType, Children, ComponentType, Deferred, Display, DisplayType,
    Input, InputHooks, InputType, Layout, LayoutHooks, LayoutType, Node, NodeKind, Properties,
};
pub use value::{DateTimeValue, DateValue, FormValue, FormValues, TimeValue, UploadedFile};
