//! Tree-shaped payload values.
//!
//! A `Value` is one node of a dynamically-shaped payload: an optional scalar
//! payload plus named, ordered, repeatable child groups. A child name may be
//! present with zero instances; that is NOT the same thing as the name being
//! absent. Closed-shape checking counts present names, so the distinction
//! matters (an optional recursive slot terminates with a present-but-empty
//! group).
//!
//! Documents arrive as JSON and are mapped onto this shape before checking:
//! - scalar / null documents become leaf / void values
//! - an object's `"$"` key (if any) supplies the node's payload
//! - every other key supplies a child group; an array value yields one
//!   instance per element, anything else yields a single instance
//! - arrays never nest directly inside arrays

use indexmap::IndexMap;
use serde_json::Value as Json;
use thiserror::Error;

// ------------------------------- Scalars ---------------------------------- //

/// Scalar payload carried by a value node.
///
/// Booleans exist on the JSON wire even though no concrete native tag accepts
/// them; a bool payload only passes `any`/`undefined` shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Double(f64),
    Int(i64),
    Bool(bool),
    Str(String),
}

/// Payload classification, used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Void,
    Double,
    Int,
    Bool,
    Str,
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValueKind::Void => "void",
            ValueKind::Double => "double",
            ValueKind::Int => "int",
            ValueKind::Bool => "bool",
            ValueKind::Str => "string",
        };
        write!(f, "{name}")
    }
}

// -------------------------------- Values ---------------------------------- //

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Value {
    payload: Option<Scalar>,
    /// Groups keep first-insertion order; a group may be empty.
    children: IndexMap<String, Vec<Value>>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("arrays may not nest directly inside arrays")]
    NestedArray,
    #[error("\"$\" must hold a scalar or null, got {0}")]
    NonScalarPayload(&'static str),
    #[error("a document must be a single node, not an array")]
    RootArray,
}

impl Value {
    /// A node with no payload and no children.
    pub fn void() -> Self {
        Self::default()
    }

    pub fn payload(&self) -> Option<&Scalar> {
        self.payload.as_ref()
    }

    pub fn kind(&self) -> ValueKind {
        match self.payload {
            None => ValueKind::Void,
            Some(Scalar::Double(_)) => ValueKind::Double,
            Some(Scalar::Int(_)) => ValueKind::Int,
            Some(Scalar::Bool(_)) => ValueKind::Bool,
            Some(Scalar::Str(_)) => ValueKind::Str,
        }
    }

    pub fn is_double(&self) -> bool {
        matches!(self.payload, Some(Scalar::Double(_)))
    }

    pub fn is_int(&self) -> bool {
        matches!(self.payload, Some(Scalar::Int(_)))
    }

    pub fn is_string(&self) -> bool {
        matches!(self.payload, Some(Scalar::Str(_)))
    }

    /// Append one instance under `name`, creating the group if needed.
    pub fn add_child(&mut self, name: impl Into<String>, child: Value) {
        self.children.entry(name.into()).or_default().push(child);
    }

    /// Make `name` present, possibly with zero instances.
    pub fn touch_children(&mut self, name: impl Into<String>) {
        self.children.entry(name.into()).or_default();
    }

    /// Name present with at least one instance.
    pub fn has_children(&self, name: &str) -> bool {
        self.children.get(name).is_some_and(|group| !group.is_empty())
    }

    /// Ordered instances under `name`; empty if the name is absent.
    pub fn get_children(&self, name: &str) -> &[Value] {
        self.children.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All present names in insertion order, including empty groups.
    pub fn children(&self) -> &IndexMap<String, Vec<Value>> {
        &self.children
    }

    /// Map a JSON document onto a value tree. The document root must be a
    /// single node (not an array).
    pub fn from_json(doc: &Json) -> Result<Self, ValueError> {
        match doc {
            Json::Array(_) => Err(ValueError::RootArray),
            other => node_from_json(other),
        }
    }
}

impl From<Scalar> for Value {
    fn from(payload: Scalar) -> Self {
        Value { payload: Some(payload), children: IndexMap::new() }
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Scalar::Double(x).into()
    }
}

impl From<i64> for Value {
    fn from(x: i64) -> Self {
        Scalar::Int(x).into()
    }
}

impl From<bool> for Value {
    fn from(x: bool) -> Self {
        Scalar::Bool(x).into()
    }
}

impl From<&str> for Value {
    fn from(x: &str) -> Self {
        Scalar::Str(x.to_string()).into()
    }
}

// ----------------------------- JSON mapping ------------------------------- //

fn node_from_json(doc: &Json) -> Result<Value, ValueError> {
    match doc {
        Json::Null => Ok(Value::void()),
        Json::Bool(b) => Ok((*b).into()),
        Json::Number(n) => Ok(scalar_from_number(n)),
        Json::String(s) => Ok(s.as_str().into()),
        Json::Array(_) => Err(ValueError::NestedArray),
        Json::Object(map) => {
            let mut out = match map.get("$") {
                None | Some(Json::Null) => Value::void(),
                Some(Json::Bool(b)) => (*b).into(),
                Some(Json::Number(n)) => scalar_from_number(n),
                Some(Json::String(s)) => s.as_str().into(),
                Some(Json::Array(_)) => return Err(ValueError::NonScalarPayload("array")),
                Some(Json::Object(_)) => return Err(ValueError::NonScalarPayload("object")),
            };
            for (name, entry) in map {
                if name == "$" {
                    continue;
                }
                match entry {
                    Json::Array(items) => {
                        // [] is meaningful: the name becomes present with
                        // zero instances.
                        out.touch_children(name);
                        for item in items {
                            out.add_child(name, node_from_json(item)?);
                        }
                    }
                    other => out.add_child(name, node_from_json(other)?),
                }
            }
            Ok(out)
        }
    }
}

fn scalar_from_number(n: &serde_json::Number) -> Value {
    if let Some(i) = n.as_i64() {
        i.into()
    } else {
        // u64 beyond i64::MAX, or a float; both land on double
        n.as_f64().unwrap_or(f64::NAN).into()
    }
}

// -------------------------------- Tests ----------------------------------- //
