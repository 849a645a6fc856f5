//! Turns browser-submitted form data into typed values.
//!
//! Typed entries arrive as `{ "value": ..., "type": ... }` where `type` is
//! the component type string. Anything that fails to convert is passed
//! through as the raw JSON it arrived as.

use std::collections::HashSet;

use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::files::TempFileStore;
use crate::model::tree::find_by_id;
use crate::model::{
    DateTimeValue, DateValue, FormValue, FormValues, InputType, Node, TimeValue, UploadedFile,
};

#[derive(Debug, Default)]
pub struct Hydrated {
    pub values: FormValues,
    /// Uploaded file ids that were moved into `values` and can be dropped.
    pub consumed_files: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
enum HydrateError {
    #[error("uploaded file '{0}' was never transferred")]
    MissingFile(String),
    #[error("malformed {0} value")]
    Malformed(&'static str),
    #[error(
        "An error occurred while trying to hydrate a table input: could not find the table within the component tree"
    )]
    TableNotFound,
    #[error("invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn hydrate(data: &Map<String, Value>, scope: &Node, files: &TempFileStore) -> Hydrated {
    let mut hydrated = Hydrated::default();
    for (key, raw) in data {
        let value = match hydrate_one(key, raw, scope, files, &mut hydrated.consumed_files) {
            Ok(value) => value,
            Err(err) => {
                tracing::debug!(
                    target: "page_sync::hydrate",
                    key = %key,
                    error = %err,
                    "passing raw form value through"
                );
                FormValue::Json(raw.clone())
            }
        };
        hydrated.values.insert(key.clone(), value);
    }
    hydrated
}

fn hydrate_one(
    key: &str,
    raw: &Value,
    scope: &Node,
    files: &TempFileStore,
    consumed: &mut Vec<String>,
) -> Result<FormValue, HydrateError> {
    if let Some(uploads) = as_file_list(raw) {
        let mut out = Vec::with_capacity(uploads.len());
        let mut ids = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let file_id = upload
                .get("fileId")
                .and_then(Value::as_str)
                .ok_or(HydrateError::Malformed("file"))?;
            let bytes = files
                .get(file_id)
                .ok_or_else(|| HydrateError::MissingFile(file_id.to_string()))?;
            out.push(UploadedFile {
                name: string_field(upload, "fileName"),
                content_type: string_field(upload, "fileType"),
                bytes,
            });
            ids.push(file_id.to_string());
        }
        consumed.extend(ids);
        return Ok(FormValue::Files(out));
    }

    let Some((value, ty)) = as_typed(raw) else {
        return Ok(FormValue::Json(raw.clone()));
    };

    let ty = match ty {
        t if t == InputType::Date.as_str() => InputType::Date,
        t if t == InputType::Time.as_str() => InputType::Time,
        t if t == InputType::DateTime.as_str() => InputType::DateTime,
        t if t == InputType::Table.as_str() => InputType::Table,
        t if t == InputType::Json.as_str() => InputType::Json,
        _ => return Ok(FormValue::Json(value.clone())),
    };

    if value.is_null() && matches!(ty, InputType::Date | InputType::Time | InputType::DateTime) {
        return Ok(FormValue::Json(Value::Null));
    }

    match ty {
        InputType::Date => {
            let (year, month, day) = ymd(value).ok_or(HydrateError::Malformed("date"))?;
            let timestamp = NaiveDate::from_ymd_opt(year, month, day)
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|naive| Utc.from_utc_datetime(&naive))
                .ok_or(HydrateError::Malformed("date"))?;
            Ok(FormValue::Date(DateValue {
                year,
                month,
                day,
                timestamp,
            }))
        }
        InputType::Time => {
            let (hour, minute) = hm(value).ok_or(HydrateError::Malformed("time"))?;
            Ok(FormValue::Time(TimeValue { hour, minute }))
        }
        InputType::DateTime => {
            let (year, month, day) = ymd(value).ok_or(HydrateError::Malformed("datetime"))?;
            let (hour, minute) = hm(value).ok_or(HydrateError::Malformed("datetime"))?;
            let timestamp = NaiveDate::from_ymd_opt(year, month, day)
                .and_then(|date| date.and_hms_opt(hour, minute, 0))
                .map(|naive| Utc.from_utc_datetime(&naive))
                .ok_or(HydrateError::Malformed("datetime"))?;
            Ok(FormValue::DateTime(DateTimeValue {
                year,
                month,
                day,
                hour,
                minute,
                timestamp,
            }))
        }
        InputType::Table => hydrate_table(key, value, scope),
        InputType::Json => {
            let text = value.as_str().ok_or(HydrateError::Malformed("json"))?;
            Ok(FormValue::Json(serde_json::from_str(text)?))
        }
        _ => Ok(FormValue::Json(value.clone())),
    }
}

fn hydrate_table(key: &str, value: &Value, scope: &Node) -> Result<FormValue, HydrateError> {
    let table = find_by_id(scope, key)
        .and_then(Node::as_table)
        .ok_or(HydrateError::TableNotFound)?;
    let selected = value.as_array().ok_or(HydrateError::Malformed("table"))?;
    let mode = table.properties.get("selectMode").and_then(Value::as_str);

    match mode {
        Some("id") => Ok(FormValue::Json(value.clone())),
        Some("index") => {
            let indexes = selected
                .iter()
                .map(|index| match index {
                    Value::String(s) => s
                        .trim()
                        .parse::<i64>()
                        .map(Value::from)
                        .map_err(|_| HydrateError::Malformed("table index")),
                    other => Ok(other.clone()),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(FormValue::Json(Value::Array(indexes)))
        }
        _ => {
            let empty = Vec::new();
            let data = table
                .properties
                .get("data")
                .and_then(Value::as_array)
                .unwrap_or(&empty);
            let rows = match table.properties.get("primaryKey").and_then(Value::as_str) {
                Some(primary_key) => {
                    let wanted: HashSet<String> = selected.iter().filter_map(key_string).collect();
                    data.iter()
                        .filter(|row| {
                            row.get(primary_key)
                                .and_then(key_string)
                                .is_some_and(|key| wanted.contains(&key))
                        })
                        .cloned()
                        .collect()
                }
                None => selected
                    .iter()
                    .map(|index| {
                        index
                            .as_u64()
                            .and_then(|idx| data.get(idx as usize))
                            .cloned()
                            .unwrap_or(Value::Null)
                    })
                    .collect(),
            };
            Ok(FormValue::Json(Value::Array(rows)))
        }
    }
}

fn as_file_list(raw: &Value) -> Option<&Vec<Value>> {
    let list = raw.as_array()?;
    list.first()?.get("fileId")?.as_str()?;
    Some(list)
}

fn as_typed(raw: &Value) -> Option<(&Value, &str)> {
    let object = raw.as_object()?;
    if object.len() != 2 {
        return None;
    }
    let ty = object.get("type")?.as_str()?;
    Some((object.get("value")?, ty))
}

fn string_field(object: &Value, key: &str) -> String {
    object
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Object keys compare as strings, so `1` and `"1"` select the same row.
fn key_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn ymd(value: &Value) -> Option<(i32, u32, u32)> {
    let year = i32::try_from(value.get("year")?.as_i64()?).ok()?;
    let month = u32::try_from(value.get("month")?.as_u64()?).ok()?;
    let day = u32::try_from(value.get("day")?.as_u64()?).ok()?;
    Some((year, month, day))
}

fn hm(value: &Value) -> Option<(u32, u32)> {
    let hour = u32::try_from(value.get("hour")?.as_u64()?).ok()?;
    let minute = u32::try_from(value.get("minute")?.as_u64()?).ok()?;
    Some((hour, minute))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ui;
    use bytes::Bytes;
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    fn form(data: Value) -> Map<String, Value> {
        data.as_object().cloned().unwrap()
    }

    fn scope() -> Node {
        ui::stack(vec![
            ui::table(
                "people",
                vec![json!({"id": 7, "name": "Ada"}), json!({"id": 9, "name": "Grace"})],
            ),
            ui::table("by_key", vec![json!({"id": 7}), json!({"id": 9})])
                .with_property("primaryKey", "id"),
            ui::table("by_index", Vec::new()).with_property("selectMode", "index"),
        ])
    }

    #[test]
    fn hydrates_dates_and_times() {
        let files = TempFileStore::new();
        let data = form(json!({
            "due": {"type": "input-date", "value": {"year": 2024, "month": 2, "day": 29}},
            "at": {"type": "input-time", "value": {"hour": 9, "minute": 30}},
            "when": {"type": "input-date-time", "value": {"year": 2024, "month": 1, "day": 2, "hour": 3, "minute": 4}},
            "empty": {"type": "input-date", "value": null},
        }));
        let hydrated = hydrate(&data, &scope(), &files);
        let FormValue::Date(due) = &hydrated.values["due"] else {
            panic!("expected date");
        };
        assert_eq!((due.year, due.month, due.day), (2024, 2, 29));
        assert_eq!(due.timestamp.day(), 29);
        assert_eq!(due.timestamp.hour(), 0);
        assert_eq!(
            hydrated.values["at"],
            FormValue::Time(TimeValue { hour: 9, minute: 30 })
        );
        let FormValue::DateTime(when) = &hydrated.values["when"] else {
            panic!("expected datetime");
        };
        assert_eq!(when.timestamp.minute(), 4);
        assert!(hydrated.values["empty"].is_null());
    }

    #[test]
    fn invalid_date_falls_back_to_raw_value() {
        let files = TempFileStore::new();
        let raw = json!({"type": "input-date", "value": {"year": 2023, "month": 2, "day": 30}});
        let hydrated = hydrate(&form(json!({ "due": raw.clone() })), &scope(), &files);
        assert_eq!(hydrated.values["due"], FormValue::Json(raw));
    }

    #[test]
    fn resolves_uploaded_files() {
        let files = TempFileStore::new();
        files.insert("f1", Bytes::from_static(b"hello"));
        let data = form(json!({
            "upload": [{"fileId": "f1", "fileName": "a.txt", "fileType": "text/plain"}]
        }));
        let hydrated = hydrate(&data, &scope(), &files);
        let FormValue::Files(uploaded) = &hydrated.values["upload"] else {
            panic!("expected files");
        };
        assert_eq!(uploaded[0].name, "a.txt");
        assert_eq!(uploaded[0].bytes, Bytes::from_static(b"hello"));
        assert_eq!(hydrated.consumed_files, vec!["f1".to_string()]);
    }

    #[test]
    fn missing_upload_passes_through() {
        let files = TempFileStore::new();
        let raw = json!([{"fileId": "gone", "fileName": "a", "fileType": "b"}]);
        let hydrated = hydrate(&form(json!({ "upload": raw.clone() })), &scope(), &files);
        assert_eq!(hydrated.values["upload"], FormValue::Json(raw));
        assert!(hydrated.consumed_files.is_empty());
    }

    #[test]
    fn table_selection_modes() {
        let files = TempFileStore::new();
        let data = form(json!({
            "people": {"type": "input-table", "value": [1]},
            "by_key": {"type": "input-table", "value": ["9"]},
            "by_index": {"type": "input-table", "value": ["0", 2]},
        }));
        let hydrated = hydrate(&data, &scope(), &files);
        assert_eq!(
            hydrated.values["people"],
            FormValue::Json(json!([{"id": 9, "name": "Grace"}]))
        );
        assert_eq!(hydrated.values["by_key"], FormValue::Json(json!([{"id": 9}])));
        assert_eq!(hydrated.values["by_index"], FormValue::Json(json!([0, 2])));
    }

    #[test]
    fn parses_json_inputs_and_passes_plain_values() {
        let files = TempFileStore::new();
        let data = form(json!({
            "config": {"type": "input-json", "value": "{\"a\": [1, 2]}"},
            "name": "Ada",
            "tagged": {"type": "input-text", "value": "x"},
        }));
        let hydrated = hydrate(&data, &scope(), &files);
        assert_eq!(hydrated.values["config"], FormValue::Json(json!({"a": [1, 2]})));
        assert_eq!(hydrated.values["name"].as_str(), Some("Ada"));
        assert_eq!(hydrated.values["tagged"].as_str(), Some("x"));
    }
}
