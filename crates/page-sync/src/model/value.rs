use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// A browser-submitted value after hydration.
#[derive(Debug, Clone, PartialEq)]
pub enum FormValue {
    Date(DateValue),
    Time(TimeValue),
    DateTime(DateTimeValue),
    Files(Vec<UploadedFile>),
    Json(Value),
}

pub type FormValues = BTreeMap<String, FormValue>;

impl FormValue {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            FormValue::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_json().and_then(Value::as_str)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FormValue::Json(Value::Null))
    }
}

impl From<Value> for FormValue {
    fn from(value: Value) -> Self {
        FormValue::Json(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateValue {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    /// Midnight UTC of the selected day.
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeValue {
    pub hour: u32,
    pub minute: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateTimeValue {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}
