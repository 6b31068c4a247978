//! Data shaping: raw upstream payloads to view models.
//!
//! Pure functions. A payload whose shape does not match the route's resource
//! kind is a server-side contract violation and fails with
//! [`PipelineError::Shape`].

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{PipelineError, Result};
use crate::resource::ResourceKind;

/// One upstream document, reduced to what templates commonly need.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub id: Option<String>,
    pub title: String,
    /// Markup as delivered by the CMS
    pub body: String,
    /// Every other field, untouched
    pub fields: Map<String, Value>,
}

impl Entry {
    fn from_object(mut object: Map<String, Value>) -> Self {
        let id = object
            .remove("id")
            .or_else(|| object.remove("nid"))
            .and_then(scalar_text);
        let title = object.remove("title").and_then(scalar_text).unwrap_or_default();
        let body = object.remove("body").map(body_text).unwrap_or_default();

        Self {
            id,
            title,
            body,
            fields: object,
        }
    }

    /// Field lookup for templates; non-string values render as JSON.
    pub fn field(&self, name: &str) -> String {
        self.fields.get(name).cloned().and_then(scalar_text).unwrap_or_default()
    }
}

/// A named group of entries in a multi view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub name: String,
    pub entries: Vec<Entry>,
}

/// What the renderer receives.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ViewModel {
    Item { entry: Entry },
    List { entries: Vec<Entry> },
    Multi { sections: Vec<Section> },
    Static { resource: String },
}

// == Shape ==
/// Transforms a raw payload into the view model for `kind`.
pub fn shape(kind: ResourceKind, raw: &str) -> Result<ViewModel> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| PipelineError::shape(kind.as_str(), format!("payload is not JSON: {e}")))?;

    match kind {
        ResourceKind::Item => match value {
            Value::Object(object) => Ok(ViewModel::Item {
                entry: Entry::from_object(object),
            }),
            other => Err(mismatch("item", "an object", &other)),
        },
        ResourceKind::List => Ok(ViewModel::List {
            entries: list_entries(value).map_err(|other| mismatch("list", "an array", &other))?,
        }),
        ResourceKind::Multi => match value {
            Value::Object(object) => {
                let sections = object
                    .into_iter()
                    .map(|(name, member)| -> Result<Section> {
                        let entries = match member {
                            Value::Object(inner) if !inner.contains_key("list") => {
                                vec![Entry::from_object(inner)]
                            }
                            other => list_entries(other).map_err(|other| {
                                mismatch("multi", &format!("section `{name}` to be an object or array"), &other)
                            })?,
                        };
                        Ok(Section { name, entries })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(ViewModel::Multi { sections })
            }
            other => Err(mismatch("multi", "an object", &other)),
        },
        ResourceKind::Static => Err(PipelineError::shape(
            "static",
            "static resources are rendered without a payload",
        )),
    }
}

/// Accepts a bare array or an object wrapping one under `list`.
fn list_entries(value: Value) -> std::result::Result<Vec<Entry>, Value> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut object) => match object.remove("list") {
            Some(Value::Array(items)) => items,
            _ => return Err(Value::Object(object)),
        },
        other => return Err(other),
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Object(object) => Ok(Entry::from_object(object)),
            other => Err(other),
        })
        .collect()
}

fn mismatch(expected: &str, wanted: &str, got: &Value) -> PipelineError {
    PipelineError::shape(expected, format!("expected {wanted}, got {}", type_name(got)))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Bodies arrive either as a string or as `{"value": "..."}`.
fn body_text(value: Value) -> String {
    match value {
        Value::Object(mut object) => object.remove("value").and_then(scalar_text).unwrap_or_default(),
        other => scalar_text(other).unwrap_or_default(),
    }
}
