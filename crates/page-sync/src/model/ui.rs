//! Constructors for building trees by hand.
//!
//! Static nodes get a fresh random id on every call, matching how a
//! producer regenerates them each render. Interactive nodes and forms take
//! an explicit id so the browser can address them.

use std::sync::Arc;

use futures::FutureExt;
use serde_json::{Value, json};
use uuid::Uuid;

use super::hooks::{PageChange, Validation};
use super::node::{
    Button, ButtonHooks, ButtonType, Children, Deferred, Display, DisplayType, Input, InputHooks,
    InputType, Layout, LayoutHooks, LayoutType, Node, Properties,
};
use super::value::{FormValue, FormValues};

fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

fn layout(id: String, ty: LayoutType, children: impl Into<Children>) -> Node {
    Node::Layout(Layout {
        id,
        ty,
        properties: Properties::new(),
        children: children.into(),
        hooks: LayoutHooks::default(),
    })
}

fn display(ty: DisplayType, value: Option<Value>) -> Node {
    let mut properties = Properties::new();
    if let Some(value) = value {
        properties.insert("value".into(), value);
    }
    Node::Display(Display {
        id: fresh_id(),
        ty,
        properties,
        deferred: Vec::new(),
    })
}

pub fn input(id: impl Into<String>, ty: InputType) -> Node {
    Node::Input(Input {
        id: id.into(),
        ty,
        properties: Properties::new(),
        hooks: InputHooks::default(),
    })
}

fn button_of(id: impl Into<String>, ty: ButtonType, label: impl Into<String>) -> Node {
    let mut properties = Properties::new();
    properties.insert("label".into(), Value::String(label.into()));
    Node::Button(Button {
        id: id.into(),
        ty,
        properties,
        hooks: ButtonHooks::default(),
        deferred: Vec::new(),
    })
}

pub fn stack(children: impl Into<Children>) -> Node {
    layout(fresh_id(), LayoutType::Stack, children)
}

pub fn row(children: impl Into<Children>) -> Node {
    layout(fresh_id(), LayoutType::Row, children)
}

pub fn distributed_row(children: impl Into<Children>) -> Node {
    layout(fresh_id(), LayoutType::DistributedRow, children)
}

pub fn card(children: impl Into<Children>) -> Node {
    layout(fresh_id(), LayoutType::Card, children)
}

pub fn form(id: impl Into<String>, children: impl Into<Children>) -> Node {
    layout(id.into(), LayoutType::Form, children)
}

pub fn text(value: impl Into<String>) -> Node {
    display(DisplayType::Text, Some(Value::String(value.into())))
}

pub fn header(value: impl Into<String>) -> Node {
    display(DisplayType::Header, Some(Value::String(value.into())))
}

pub fn markdown(value: impl Into<String>) -> Node {
    display(DisplayType::Markdown, Some(Value::String(value.into())))
}

pub fn code(value: impl Into<String>) -> Node {
    display(DisplayType::Code, Some(Value::String(value.into())))
}

pub fn json_display(value: Value) -> Node {
    display(DisplayType::Json, Some(value))
}

pub fn image(src: impl Into<String>) -> Node {
    display(DisplayType::Image, None).with_property("src", Value::String(src.into()))
}

pub fn pdf(file: Value) -> Node {
    display(DisplayType::Pdf, Some(file))
}

pub fn spinner() -> Node {
    display(DisplayType::Spinner, None)
}

pub fn divider() -> Node {
    display(DisplayType::Divider, None)
}

pub fn none() -> Node {
    display(DisplayType::None, None)
}

pub fn text_input(id: impl Into<String>) -> Node {
    input(id, InputType::Text)
}

pub fn number_input(id: impl Into<String>) -> Node {
    input(id, InputType::Number)
}

pub fn email_input(id: impl Into<String>) -> Node {
    input(id, InputType::Email)
}

pub fn text_area(id: impl Into<String>) -> Node {
    input(id, InputType::TextArea)
}

pub fn checkbox(id: impl Into<String>) -> Node {
    input(id, InputType::Checkbox)
}

pub fn select(id: impl Into<String>, options: Vec<Value>) -> Node {
    input(id, InputType::SelectSingle).with_property("options", Value::Array(options))
}

pub fn date_input(id: impl Into<String>) -> Node {
    input(id, InputType::Date)
}

pub fn time_input(id: impl Into<String>) -> Node {
    input(id, InputType::Time)
}

pub fn datetime_input(id: impl Into<String>) -> Node {
    input(id, InputType::DateTime)
}

pub fn json_input(id: impl Into<String>) -> Node {
    input(id, InputType::Json)
}

pub fn file_drop(id: impl Into<String>) -> Node {
    input(id, InputType::FileDrop)
}

pub fn table(id: impl Into<String>, rows: Vec<Value>) -> Node {
    input(id, InputType::Table).with_property("data", Value::Array(rows))
}

pub fn button(id: impl Into<String>, label: impl Into<String>) -> Node {
    button_of(id, ButtonType::Default, label)
}

pub fn submit_button(id: impl Into<String>, label: impl Into<String>) -> Node {
    button_of(id, ButtonType::FormSubmit, label)
}

/// A bar chart whose series is computed asynchronously.
pub fn bar_chart<F>(id: impl Into<String>, data: F) -> Node
where
    F: Future<Output = Value> + Send + 'static,
{
    let mut chart = button_of(id, ButtonType::BarChart, "");
    chart.properties_mut().remove("label");
    chart.with_deferred("data", data)
}

impl Node {
    pub fn on_click<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        if let Node::Button(button) = &mut self {
            button.hooks.on_click = Some(Arc::new(move || hook().boxed()));
        }
        self
    }

    pub fn on_submit<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(FormValues) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        if let Node::Layout(layout) = &mut self {
            layout.hooks.on_submit = Some(Arc::new(move |values| hook(values).boxed()));
        }
        self
    }

    pub fn validate_form<F, Fut>(mut self, validator: F) -> Self
    where
        F: Fn(FormValues) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Validation> + Send + 'static,
    {
        if let Node::Layout(layout) = &mut self {
            layout.hooks.validate = Some(Arc::new(move |values| validator(values).boxed()));
        }
        self
    }

    pub fn validate<F, Fut>(mut self, validator: F) -> Self
    where
        F: Fn(FormValue) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Validation> + Send + 'static,
    {
        if let Node::Input(input) = &mut self {
            input.hooks.validate = Some(Arc::new(move |value| validator(value).boxed()));
        }
        self
    }

    pub fn on_enter<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(FormValue) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        if let Node::Input(input) = &mut self {
            input.hooks.on_enter = Some(Arc::new(move |value| hook(value).boxed()));
        }
        self
    }

    pub fn on_select<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(FormValue) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        if let Node::Input(input) = &mut self {
            input.hooks.on_select = Some(Arc::new(move |value| hook(value).boxed()));
        }
        self
    }

    pub fn on_file_change<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(FormValue) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        if let Node::Input(input) = &mut self {
            input.hooks.on_file_change = Some(Arc::new(move |value| hook(value).boxed()));
        }
        self
    }

    /// Appends a row action; the browser addresses actions by position.
    pub fn on_row_action<F, Fut>(mut self, label: impl Into<String>, hook: F) -> Self
    where
        F: Fn(Option<Value>, usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        if let Node::Input(input) = &mut self {
            input
                .hooks
                .on_row_actions
                .push(Arc::new(move |row, index| hook(row, index).boxed()));
            let labels = input
                .properties
                .entry("actions")
                .or_insert_with(|| Value::Array(Vec::new()));
            if let Value::Array(labels) = labels {
                labels.push(json!({ "label": label.into() }));
            }
        }
        self
    }

    pub fn paginate(mut self, source: PageChange) -> Self {
        if let Node::Input(input) = &mut self {
            input.properties.insert("paginate".into(), Value::Bool(true));
            input.hooks.on_page_change = Some(source);
        }
        self
    }

    pub fn with_deferred<F>(mut self, key: impl Into<String>, value: F) -> Self
    where
        F: Future<Output = Value> + Send + 'static,
    {
        let deferred = Deferred::new(key, value);
        match &mut self {
            Node::Display(display) => display.deferred.push(deferred),
            Node::Button(button) => button.deferred.push(deferred),
            _ => {}
        }
        self
    }

    pub fn hide_submit_button(self) -> Self {
        self.with_property("hideSubmitButton", true)
    }
}
