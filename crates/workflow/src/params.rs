//! Typed step inputs and their decoding against a component's parameter schema.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;

use crate::component::{ParamType, WorkflowComponent};
use crate::error::StepError;

/// A decoded parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Boolean(bool),
    Integer(i64),
    Decimal(f64),
    Text(String),
}

impl ParamValue {
    pub fn param_type(&self) -> ParamType {
        match self {
            ParamValue::Boolean(_) => ParamType::Boolean,
            ParamValue::Integer(_) => ParamType::Integer,
            ParamValue::Decimal(_) => ParamType::Decimal,
            ParamValue::Text(_) => ParamType::Text,
        }
    }

    /// Decode a raw JSON value as `ty`. Integers are accepted where decimals are declared.
    pub fn from_json(value: &JsonValue, ty: ParamType) -> Option<Self> {
        match (ty, value) {
            (ParamType::Text, JsonValue::String(s)) => Some(ParamValue::Text(s.clone())),
            (ParamType::Boolean, JsonValue::Bool(b)) => Some(ParamValue::Boolean(*b)),
            (ParamType::Integer, JsonValue::Number(n)) => n.as_i64().map(ParamValue::Integer),
            (ParamType::Decimal, JsonValue::Number(n)) => n.as_f64().map(ParamValue::Decimal),
            _ => None,
        }
    }
}

/// A single parameter problem found while decoding step inputs.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ParamError {
    #[error("unknown parameter `{name}`")]
    Unknown { name: String },
    #[error("missing required parameter `{name}`")]
    Missing { name: String },
    #[error("parameter `{name}` is constant and cannot be set")]
    ConstantOverride { name: String },
    #[error("parameter `{name}` expects {expected:?}, got {found}")]
    TypeMismatch {
        name: String,
        expected: ParamType,
        found: String,
    },
}

/// Decoded, schema-checked inputs of one step.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StepInputs {
    values: BTreeMap<String, ParamValue>,
}

impl StepInputs {
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.values.get(name)
    }

    pub fn text(&self, name: &str) -> Result<&str, StepError> {
        match self.values.get(name) {
            Some(ParamValue::Text(s)) => Ok(s),
            other => Err(mismatch(name, "text", other)),
        }
    }

    pub fn integer(&self, name: &str) -> Result<i64, StepError> {
        match self.values.get(name) {
            Some(ParamValue::Integer(i)) => Ok(*i),
            other => Err(mismatch(name, "integer", other)),
        }
    }

    pub fn decimal(&self, name: &str) -> Result<f64, StepError> {
        self.opt_decimal(name)?
            .ok_or_else(|| mismatch(name, "decimal", None))
    }

    pub fn opt_decimal(&self, name: &str) -> Result<Option<f64>, StepError> {
        match self.values.get(name) {
            None => Ok(None),
            Some(ParamValue::Decimal(d)) => Ok(Some(*d)),
            Some(ParamValue::Integer(i)) => Ok(Some(*i as f64)),
            other => Err(mismatch(name, "decimal", other)),
        }
    }

    pub fn boolean(&self, name: &str) -> Result<bool, StepError> {
        match self.values.get(name) {
            Some(ParamValue::Boolean(b)) => Ok(*b),
            other => Err(mismatch(name, "boolean", other)),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn mismatch(name: &str, expected: &str, found: Option<&ParamValue>) -> StepError {
    StepError::Input(match found {
        None => format!("input `{name}` is not set"),
        Some(v) => format!("input `{name}` is not {expected}: {v:?}"),
    })
}

/// Decode raw stored inputs against `component`'s schema.
///
/// Collects every problem instead of stopping at the first one.
pub fn decode_inputs(
    component: &WorkflowComponent,
    raw: &Map<String, JsonValue>,
) -> Result<StepInputs, Vec<ParamError>> {
    let mut errors = Vec::new();
    let mut values = BTreeMap::new();

    for (name, value) in raw {
        let Some(spec) = component.param_spec(name) else {
            errors.push(ParamError::Unknown { name: name.clone() });
            continue;
        };
        if spec.constant {
            errors.push(ParamError::ConstantOverride { name: name.clone() });
            continue;
        }
        match ParamValue::from_json(value, spec.ty) {
            Some(decoded) => {
                values.insert(name.clone(), decoded);
            }
            None => errors.push(ParamError::TypeMismatch {
                name: name.clone(),
                expected: spec.ty,
                found: json_kind(value).to_string(),
            }),
        }
    }

    for spec in &component.params {
        if values.contains_key(&spec.name) || raw.contains_key(&spec.name) {
            continue;
        }
        match &spec.default {
            Some(default) => {
                values.insert(spec.name.clone(), default.clone());
            }
            None if spec.required => errors.push(ParamError::Missing {
                name: spec.name.clone(),
            }),
            None => {}
        }
    }

    if errors.is_empty() {
        Ok(StepInputs { values })
    } else {
        Err(errors)
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}
