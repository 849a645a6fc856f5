use std::fmt;

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::ser::{SerializeSeq, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use super::hooks::{
    ClickHook, FormValidator, InputValidator, PageChange, RowActionHook, SubmitHook, ValueHook,
};

pub type Properties = Map<String, Value>;

/// The interaction family of a node, sent as `interactionType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Layout,
    Display,
    Input,
    Button,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutType {
    Stack,
    Row,
    DistributedRow,
    Card,
    Form,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DisplayType {
    Text,
    Header,
    Json,
    Code,
    Markdown,
    Image,
    Pdf,
    Spinner,
    Divider,
    /// Renders nothing. Used as a positional placeholder.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputType {
    Text,
    Number,
    Email,
    Url,
    Password,
    TextArea,
    RadioGroup,
    SelectSingle,
    SelectMulti,
    Checkbox,
    Table,
    FileDrop,
    Date,
    Time,
    DateTime,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ButtonType {
    Default,
    FormSubmit,
    BarChart,
    LineChart,
}

impl LayoutType {
    pub fn as_str(self) -> &'static str {
        match self {
            LayoutType::Stack => "layout-stack",
            LayoutType::Row => "layout-row",
            LayoutType::DistributedRow => "layout-distributed-row",
            LayoutType::Card => "layout-card",
            LayoutType::Form => "layout-form",
        }
    }
}

impl DisplayType {
    pub fn as_str(self) -> &'static str {
        match self {
            DisplayType::Text => "display-text",
            DisplayType::Header => "display-header",
            DisplayType::Json => "display-json",
            DisplayType::Code => "display-code",
            DisplayType::Markdown => "display-markdown",
            DisplayType::Image => "display-image",
            DisplayType::Pdf => "display-pdf",
            DisplayType::Spinner => "display-spinner",
            DisplayType::Divider => "display-divider",
            DisplayType::None => "display-none",
        }
    }
}

impl InputType {
    pub fn as_str(self) -> &'static str {
        match self {
            InputType::Text => "input-text",
            InputType::Number => "input-number",
            InputType::Email => "input-email",
            InputType::Url => "input-url",
            InputType::Password => "input-password",
            InputType::TextArea => "input-text-area",
            InputType::RadioGroup => "input-radio-group",
            InputType::SelectSingle => "input-select-dropdown-single",
            InputType::SelectMulti => "input-select-dropdown-multi",
            InputType::Checkbox => "input-checkbox",
            InputType::Table => "input-table",
            InputType::FileDrop => "input-file-drop",
            InputType::Date => "input-date",
            InputType::Time => "input-time",
            InputType::DateTime => "input-date-time",
            InputType::Json => "input-json",
        }
    }

    /// Inputs that fire `on_enter` when the user presses enter.
    pub fn supports_enter(self) -> bool {
        matches!(
            self,
            InputType::Text
                | InputType::Number
                | InputType::Email
                | InputType::Url
                | InputType::Password
                | InputType::Date
                | InputType::Time
                | InputType::DateTime
                | InputType::TextArea
        )
    }

    pub fn supports_select(self) -> bool {
        matches!(
            self,
            InputType::RadioGroup
                | InputType::SelectSingle
                | InputType::SelectMulti
                | InputType::Table
                | InputType::Checkbox
        )
    }

    pub fn supports_file_change(self) -> bool {
        self == InputType::FileDrop
    }

    /// Whether the value can be pushed from the server with `set_inputs`.
    pub fn is_settable(self) -> bool {
        !matches!(self, InputType::FileDrop | InputType::Table)
    }
}

impl ButtonType {
    pub fn as_str(self) -> &'static str {
        match self {
            ButtonType::Default => "button-default",
            ButtonType::FormSubmit => "button-form-submit",
            ButtonType::BarChart => "button-bar-chart",
            ButtonType::LineChart => "button-line-chart",
        }
    }

    pub fn is_chart(self) -> bool {
        matches!(self, ButtonType::BarChart | ButtonType::LineChart)
    }
}

/// Fully qualified component type, sent as `type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    Layout(LayoutType),
    Display(DisplayType),
    Input(InputType),
    Button(ButtonType),
}

impl ComponentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ComponentType::Layout(ty) => ty.as_str(),
            ComponentType::Display(ty) => ty.as_str(),
            ComponentType::Input(ty) => ty.as_str(),
            ComponentType::Button(ty) => ty.as_str(),
        }
    }

    pub fn kind(self) -> NodeKind {
        match self {
            ComponentType::Layout(_) => NodeKind::Layout,
            ComponentType::Display(_) => NodeKind::Display,
            ComponentType::Input(_) => NodeKind::Input,
            ComponentType::Button(_) => NodeKind::Button,
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ComponentType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A property whose value is produced asynchronously, such as chart data.
/// Resolved before the tree is validated and sent.
#[derive(Clone)]
pub struct Deferred {
    key: String,
    value: Shared<BoxFuture<'static, Value>>,
}

impl Deferred {
    pub fn new<F>(key: impl Into<String>, value: F) -> Self
    where
        F: Future<Output = Value> + Send + 'static,
    {
        Self {
            key: key.into(),
            value: value.boxed().shared(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub async fn resolve(&self) -> Value {
        self.value.clone().await
    }

    pub fn peek(&self) -> Option<&Value> {
        self.value.peek()
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deferred")
            .field("key", &self.key)
            .field("resolved", &self.peek().is_some())
            .finish()
    }
}

/// Children of a container. A single child is kept distinct from a list
/// of one so the wire shape matches what was built.
#[derive(Debug, Clone)]
pub enum Children {
    Single(Box<Node>),
    Many(Vec<Node>),
}

impl Default for Children {
    fn default() -> Self {
        Children::Many(Vec::new())
    }
}

impl Children {
    pub fn as_slice(&self) -> &[Node] {
        match self {
            Children::Single(node) => std::slice::from_ref(node.as_ref()),
            Children::Many(nodes) => nodes,
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [Node] {
        match self {
            Children::Single(node) => std::slice::from_mut(node.as_mut()),
            Children::Many(nodes) => nodes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    pub fn push(&mut self, node: Node) {
        match self {
            Children::Many(nodes) => nodes.push(node),
            Children::Single(_) => {
                let Children::Single(first) = std::mem::take(self) else {
                    return;
                };
                *self = Children::Many(vec![*first, node]);
            }
        }
    }

    /// Rebuilds the children, keeping the single/many shape.
    pub fn map<F>(self, mut f: F) -> Children
    where
        F: FnMut(Node) -> Node,
    {
        match self {
            Children::Single(node) => Children::Single(Box::new(f(*node))),
            Children::Many(nodes) => Children::Many(nodes.into_iter().map(f).collect()),
        }
    }
}

impl From<Vec<Node>> for Children {
    fn from(nodes: Vec<Node>) -> Self {
        Children::Many(nodes)
    }
}

impl From<Node> for Children {
    fn from(node: Node) -> Self {
        Children::Single(Box::new(node))
    }
}

impl Serialize for Children {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Children::Single(node) => node.serialize(serializer),
            Children::Many(nodes) => {
                let mut seq = serializer.serialize_seq(Some(nodes.len()))?;
                for node in nodes {
                    seq.serialize_element(node)?;
                }
                seq.end()
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct LayoutHooks {
    pub on_submit: Option<SubmitHook>,
    pub validate: Option<FormValidator>,
}

#[derive(Clone, Default)]
pub struct InputHooks {
    pub validate: Option<InputValidator>,
    pub on_enter: Option<ValueHook>,
    pub on_select: Option<ValueHook>,
    pub on_file_change: Option<ValueHook>,
    pub on_row_actions: Vec<RowActionHook>,
    pub on_page_change: Option<PageChange>,
}

#[derive(Clone, Default)]
pub struct ButtonHooks {
    pub on_click: Option<ClickHook>,
}

impl fmt::Debug for LayoutHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayoutHooks")
            .field("on_submit", &self.on_submit.is_some())
            .field("validate", &self.validate.is_some())
            .finish()
    }
}

impl fmt::Debug for InputHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputHooks")
            .field("validate", &self.validate.is_some())
            .field("on_enter", &self.on_enter.is_some())
            .field("on_select", &self.on_select.is_some())
            .field("on_file_change", &self.on_file_change.is_some())
            .field("on_row_actions", &self.on_row_actions.len())
            .field("on_page_change", &self.on_page_change)
            .finish()
    }
}

impl fmt::Debug for ButtonHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ButtonHooks")
            .field("on_click", &self.on_click.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Layout {
    pub id: String,
    pub ty: LayoutType,
    pub properties: Properties,
    pub children: Children,
    pub hooks: LayoutHooks,
}

#[derive(Debug, Clone)]
pub struct Display {
    pub id: String,
    pub ty: DisplayType,
    pub properties: Properties,
    pub deferred: Vec<Deferred>,
}

#[derive(Debug, Clone)]
pub struct Input {
    pub id: String,
    pub ty: InputType,
    pub properties: Properties,
    pub hooks: InputHooks,
}

#[derive(Debug, Clone)]
pub struct Button {
    pub id: String,
    pub ty: ButtonType,
    pub properties: Properties,
    pub hooks: ButtonHooks,
    pub deferred: Vec<Deferred>,
}

impl Layout {
    pub fn is_form(&self) -> bool {
        self.ty == LayoutType::Form
    }

    pub fn hide_submit_button(&self) -> bool {
        self.properties
            .get("hideSubmitButton")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

impl Input {
    pub fn is_table(&self) -> bool {
        self.ty == InputType::Table
    }
}

#[derive(Debug, Clone)]
pub enum Node {
    Layout(Layout),
    Display(Display),
    Input(Input),
    Button(Button),
}

impl Node {
    pub fn id(&self) -> &str {
        match self {
            Node::Layout(node) => &node.id,
            Node::Display(node) => &node.id,
            Node::Input(node) => &node.id,
            Node::Button(node) => &node.id,
        }
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        let id = id.into();
        match self {
            Node::Layout(node) => node.id = id,
            Node::Display(node) => node.id = id,
            Node::Input(node) => node.id = id,
            Node::Button(node) => node.id = id,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.component_type().kind()
    }

    pub fn component_type(&self) -> ComponentType {
        match self {
            Node::Layout(node) => ComponentType::Layout(node.ty),
            Node::Display(node) => ComponentType::Display(node.ty),
            Node::Input(node) => ComponentType::Input(node.ty),
            Node::Button(node) => ComponentType::Button(node.ty),
        }
    }

    pub fn properties(&self) -> &Properties {
        match self {
            Node::Layout(node) => &node.properties,
            Node::Display(node) => &node.properties,
            Node::Input(node) => &node.properties,
            Node::Button(node) => &node.properties,
        }
    }

    pub fn properties_mut(&mut self) -> &mut Properties {
        match self {
            Node::Layout(node) => &mut node.properties,
            Node::Display(node) => &mut node.properties,
            Node::Input(node) => &mut node.properties,
            Node::Button(node) => &mut node.properties,
        }
    }

    /// Empty for leaves.
    pub fn children(&self) -> &[Node] {
        match self {
            Node::Layout(node) => node.children.as_slice(),
            _ => &[],
        }
    }

    pub fn children_mut(&mut self) -> &mut [Node] {
        match self {
            Node::Layout(node) => node.children.as_mut_slice(),
            _ => &mut [],
        }
    }

    pub fn deferred(&self) -> &[Deferred] {
        match self {
            Node::Display(node) => &node.deferred,
            Node::Button(node) => &node.deferred,
            _ => &[],
        }
    }

    pub fn take_deferred(&mut self) -> Vec<Deferred> {
        match self {
            Node::Display(node) => std::mem::take(&mut node.deferred),
            Node::Button(node) => std::mem::take(&mut node.deferred),
            _ => Vec::new(),
        }
    }

    /// Inputs and buttons keep their identity across renders.
    pub fn is_interactive(&self) -> bool {
        matches!(self, Node::Input(_) | Node::Button(_))
    }

    pub fn is_form(&self) -> bool {
        matches!(self, Node::Layout(layout) if layout.is_form())
    }

    pub fn is_submit_button(&self) -> bool {
        matches!(self, Node::Button(button) if button.ty == ButtonType::FormSubmit)
    }

    pub fn as_layout(&self) -> Option<&Layout> {
        match self {
            Node::Layout(layout) => Some(layout),
            _ => None,
        }
    }

    pub fn as_input(&self) -> Option<&Input> {
        match self {
            Node::Input(input) => Some(input),
            _ => None,
        }
    }

    pub fn as_button(&self) -> Option<&Button> {
        match self {
            Node::Button(button) => Some(button),
            _ => None,
        }
    }

    pub fn as_table(&self) -> Option<&Input> {
        self.as_input().filter(|input| input.is_table())
    }

    pub fn as_table_mut(&mut self) -> Option<&mut Input> {
        match self {
            Node::Input(input) if input.is_table() => Some(input),
            _ => None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.set_id(id);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties_mut().insert(key.into(), value.into());
        self
    }
}

/// Wire shape: `{ type, interactionType, model: { id, properties, children? } }`.
impl Serialize for Node {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut node = serializer.serialize_struct("Node", 3)?;
        node.serialize_field("type", &self.component_type())?;
        node.serialize_field("interactionType", &self.kind())?;
        node.serialize_field("model", &Model(self))?;
        node.end()
    }
}

struct Model<'a>(&'a Node);

impl Serialize for Model<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let node = self.0;
        let children = node.as_layout().map(|layout| &layout.children);
        let len = if children.is_some() { 3 } else { 2 };
        let mut model = serializer.serialize_struct("Model", len)?;
        model.serialize_field("id", node.id())?;
        model.serialize_field("properties", node.properties())?;
        if let Some(children) = children {
            model.serialize_field("children", children)?;
        }
        model.end()
    }
}
