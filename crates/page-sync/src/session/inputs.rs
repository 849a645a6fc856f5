use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde_json::{Map, Value, json};

use super::{RunnerCore, RunnerInner};
use crate::error::Severity;
use crate::model::InputType;
use crate::model::tree::find_by_id;
use crate::protocol::ServerMessage;

impl RunnerInner {
    /// Pushes new values into inputs the browser is showing. Values set
    /// before every render has gone out are queued and replayed.
    pub(crate) fn set_inputs(self: &Arc<Self>, values: Map<String, Value>) {
        let resolved = {
            let mut core = self.core.lock();
            if !core.synced() || core.defer_input_updates {
                core.defer_input_updates = true;
                core.queued_inputs.extend(values);
                return;
            }
            resolve_inputs(&core, values)
        };
        match resolved {
            Ok(inputs) => self.send(ServerMessage::SetInputs { inputs }),
            Err(message) => self.send_error(
                format!("An error occurred while trying to set an input value:\n\n{message}"),
                Severity::Warning,
            ),
        }
    }
}

fn resolve_inputs(
    core: &RunnerCore,
    values: Map<String, Value>,
) -> Result<Map<String, Value>, String> {
    let mut inputs = Map::new();
    for (id, value) in values {
        let mut found: Option<InputType> = None;
        for render_id in &core.renders {
            let Some(record) = core.live(render_id) else {
                continue;
            };
            let Some(node) = find_by_id(&record.tree, &id) else {
                continue;
            };
            if found.is_some() {
                return Err(format!("Multiple inputs were found with the same ID: {id}"));
            }
            let Some(input) = node.as_input() else {
                return Err(format!(
                    "Components of type {} cannot be set using the page.set_inputs method",
                    node.component_type()
                ));
            };
            if !input.ty.is_settable() {
                return Err(format!(
                    "Inputs of type {} cannot be set using the page.set_inputs method",
                    input.ty.as_str()
                ));
            }
            found = Some(input.ty);
        }
        let Some(ty) = found else {
            return Err(format!("No input was found with the ID: {id}"));
        };
        inputs.insert(id, coerce(ty, value));
    }
    Ok(inputs)
}

/// Date and time inputs take their browser model shape; strings and epoch
/// milliseconds are converted, anything else is sent as given.
fn coerce(ty: InputType, value: Value) -> Value {
    let converted = match ty {
        InputType::Date => parse_instant(&value).map(|at| date_model(at.date())),
        InputType::Time => parse_time(&value).map(time_model),
        InputType::DateTime => parse_instant(&value).map(datetime_model),
        _ => None,
    };
    converted.unwrap_or(value)
}

fn parse_instant(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Number(millis) => {
            DateTime::<Utc>::from_timestamp_millis(millis.as_i64()?).map(|at| at.naive_utc())
        }
        Value::String(text) => {
            if let Ok(at) = DateTime::parse_from_rfc3339(text) {
                return Some(at.with_timezone(&Utc).naive_utc());
            }
            if let Ok(at) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S") {
                return Some(at);
            }
            if let Ok(at) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M") {
                return Some(at);
            }
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        }
        _ => None,
    }
}

fn parse_time(value: &Value) -> Option<NaiveTime> {
    if let Value::String(text) = value {
        for format in ["%H:%M", "%H:%M:%S"] {
            if let Ok(time) = NaiveTime::parse_from_str(text, format) {
                return Some(time);
            }
        }
    }
    parse_instant(value).map(|at| at.time())
}

fn date_model(date: NaiveDate) -> Value {
    json!({"year": date.year(), "month": date.month(), "day": date.day()})
}

fn time_model(time: NaiveTime) -> Value {
    json!({"hour": time.hour(), "minute": time.minute()})
}

fn datetime_model(at: NaiveDateTime) -> Value {
    json!({
        "year": at.year(),
        "month": at.month(),
        "day": at.day(),
        "hour": at.hour(),
        "minute": at.minute(),
    })
}
