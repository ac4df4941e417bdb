use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::{
    builtins::Realm,
    error::{ErrorKind, RunError, RunResult},
    heap::{Heap, InternalData, JsClass, JsObject, ObjectId, PropGet, RegexpData, array_length_prop},
    value::{Value, format_number},
};

/// A guest value that can be passed to or returned from the interpreter.
///
/// This is the public-facing type for guest values. It owns all its data and
/// can be freely cloned, serialized, or stored; unlike the internal `Value`
/// it does not reference the heap.
///
/// # Cycles
///
/// Guest object graphs may be cyclic. Lowering preserves the topology with
/// `Cycle(n)`: a back-reference to the `n`-th container produced during the
/// same lowering (preorder). Lifting re-links `Cycle` markers, so a
/// lower/lift round trip reproduces the original shape.
///
/// # JSON
///
/// JSON-shaped values (`Null`, `Bool`, `Number`, `String`, `Array`, `Map`)
/// convert losslessly to and from `serde_json::Value`; the remaining
/// variants are output-only conveniences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Object {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    /// Guest Array, element-wise.
    Array(Vec<Object>),
    /// Plain guest object as ordered key/value pairs.
    Map(Vec<(String, Object)>),
    /// Guest Date, as milliseconds since the epoch.
    Date(f64),
    /// Guest RegExp backing data.
    Regex { source: String, flags: String },
    /// Back-reference to an earlier container in the same value; see the
    /// type-level docs.
    Cycle(usize),
    /// Output-only rendering of values with no native counterpart
    /// (functions, boxed primitives).
    Repr(String),
}

impl Object {
    #[must_use]
    pub fn is_json_shaped(&self) -> bool {
        match self {
            Self::Null | Self::Bool(_) | Self::Number(_) | Self::String(_) => true,
            Self::Array(items) => items.iter().all(Self::is_json_shaped),
            Self::Map(pairs) => pairs.iter().all(|(_, v)| v.is_json_shaped()),
            Self::Undefined | Self::Date(_) | Self::Regex { .. } | Self::Cycle(_) | Self::Repr(_) => false,
        }
    }

    /// Natural JSON rendering. `None` for values JSON.stringify omits
    /// (undefined, functions); non-finite numbers render as null.
    #[must_use]
    pub fn to_json(&self) -> Option<serde_json::Value> {
        match self {
            Self::Undefined | Self::Repr(_) => None,
            Self::Null | Self::Cycle(_) => Some(serde_json::Value::Null),
            Self::Bool(b) => Some(serde_json::Value::Bool(*b)),
            Self::Number(n) => Some(if n.is_finite() {
                // Integral values render without a decimal point, the way
                // guest number-to-string does.
                if n.fract() == 0.0 && n.abs() <= 9_007_199_254_740_992.0 {
                    serde_json::Value::Number(serde_json::Number::from(*n as i64))
                } else {
                    serde_json::Number::from_f64(*n).map_or(serde_json::Value::Null, serde_json::Value::Number)
                }
            } else {
                serde_json::Value::Null
            }),
            Self::String(s) => Some(serde_json::Value::String(s.clone())),
            Self::Date(ms) => Some(serde_json::Value::String(crate::builtins::date::to_iso_string(*ms))),
            Self::Regex { .. } => Some(serde_json::Value::Object(serde_json::Map::new())),
            Self::Array(items) => Some(serde_json::Value::Array(
                items
                    .iter()
                    .map(|item| item.to_json().unwrap_or(serde_json::Value::Null))
                    .collect(),
            )),
            Self::Map(pairs) => {
                let mut map = serde_json::Map::new();
                for (key, value) in pairs {
                    if let Some(json) = value.to_json() {
                        map.insert(key.clone(), json);
                    }
                }
                Some(serde_json::Value::Object(map))
            }
        }
    }

    #[must_use]
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(*b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::String(s.clone()),
            serde_json::Value::Array(items) => Self::Array(items.iter().map(Self::from_json).collect()),
            serde_json::Value::Object(map) => {
                Self::Map(map.iter().map(|(k, v)| (k.clone(), Self::from_json(v))).collect())
            }
        }
    }
}

impl std::fmt::Display for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Undefined => f.write_str("undefined"),
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::String(s) => f.write_str(s),
            Self::Array(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(pairs) => {
                f.write_str("{")?;
                for (index, (name, value)) in pairs.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                f.write_str("}")
            }
            Self::Date(ms) => f.write_str(&crate::builtins::date::to_iso_string(*ms)),
            Self::Regex { source, flags } => write!(f, "/{source}/{flags}"),
            Self::Cycle(_) => f.write_str("[circular]"),
            Self::Repr(text) => f.write_str(text),
        }
    }
}

impl From<f64> for Object {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for Object {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<&str> for Object {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

/// `guest_to_native`: lowers a guest value, tracking visited containers so
/// cyclic graphs come out with their topology intact.
pub(crate) fn lower_value(heap: &Heap, value: &Value) -> Object {
    let mut seen: AHashMap<ObjectId, usize> = AHashMap::new();
    let mut counter = 0;
    lower_inner(heap, value, &mut seen, &mut counter)
}

fn lower_inner(heap: &Heap, value: &Value, seen: &mut AHashMap<ObjectId, usize>, counter: &mut usize) -> Object {
    let id = match value {
        Value::Undefined => return Object::Undefined,
        Value::Null => return Object::Null,
        Value::Bool(b) => return Object::Bool(*b),
        Value::Number(n) => return Object::Number(*n),
        Value::Str(s) => return Object::String(s.clone()),
        Value::Ref(id) => *id,
    };
    if let Some(&slot) = seen.get(&id) {
        return Object::Cycle(slot);
    }
    let object = heap.get(id);
    match &object.data {
        Some(InternalData::Regexp(data)) => {
            return Object::Regex {
                source: data.source.clone(),
                flags: data.flags.clone(),
            };
        }
        Some(InternalData::Date(ms)) => return Object::Date(*ms),
        Some(InternalData::Boxed(primitive)) => {
            return Object::Repr(primitive.to_string_primitive());
        }
        None => {}
    }
    if object.is_function() {
        let mut visited = ahash::AHashSet::new();
        return Object::Repr(heap.object_to_string(id, &mut visited));
    }
    match object.class {
        JsClass::Array => {
            seen.insert(id, *counter);
            *counter += 1;
            let length = heap.array_length(id);
            let mut items = Vec::with_capacity(length as usize);
            for index in 0..length {
                let element = match heap.get_prop(id, &format_number(f64::from(index))) {
                    PropGet::Value(v) => v,
                    PropGet::Getter(_) => Value::Undefined,
                };
                items.push(lower_inner(heap, &element, seen, counter));
            }
            Object::Array(items)
        }
        _ => {
            seen.insert(id, *counter);
            *counter += 1;
            let mut pairs = Vec::new();
            for name in heap.own_enumerable_keys(id) {
                let value = match heap.get_prop(id, &name) {
                    PropGet::Value(v) => v,
                    PropGet::Getter(_) => Value::Undefined,
                };
                pairs.push((name, lower_inner(heap, &value, seen, counter)));
            }
            Object::Map(pairs)
        }
    }
}

/// `native_to_guest`: lifts a host value into the heap. `Cycle` markers
/// reconnect to the container they reference.
pub(crate) fn lift_object(heap: &mut Heap, realm: &Realm, object: &Object) -> RunResult<Value> {
    let mut containers = Vec::new();
    lift_inner(heap, realm, object, &mut containers)
}

fn lift_inner(heap: &mut Heap, realm: &Realm, object: &Object, containers: &mut Vec<ObjectId>) -> RunResult<Value> {
    Ok(match object {
        Object::Undefined => Value::Undefined,
        Object::Null => Value::Null,
        Object::Bool(b) => Value::Bool(*b),
        Object::Number(n) => Value::Number(*n),
        Object::String(s) => Value::Str(s.clone()),
        Object::Regex { source, flags } => {
            let id = heap.alloc(JsObject::new(Some(realm.regexp_proto), JsClass::Regexp));
            let data = RegexpData::new(source, flags)?;
            heap.get_mut(id).data = Some(InternalData::Regexp(data));
            heap.set_prop(id, "lastIndex", Value::Number(0.0))?;
            Value::Ref(id)
        }
        Object::Date(ms) => {
            let id = heap.alloc(JsObject::new(Some(realm.date_proto), JsClass::Date));
            heap.get_mut(id).data = Some(InternalData::Date(*ms));
            Value::Ref(id)
        }
        Object::Cycle(slot) => {
            let id = containers.get(*slot).copied().ok_or_else(|| {
                RunError::throw(ErrorKind::TypeError, format!("dangling cycle reference #{slot}"))
            })?;
            Value::Ref(id)
        }
        Object::Repr(_) => {
            return Err(RunError::throw(
                ErrorKind::TypeError,
                "Repr values cannot be passed back into the interpreter",
            ));
        }
        Object::Array(items) => {
            let id = heap.alloc(JsObject::new(Some(realm.array_proto), JsClass::Array));
            heap.get_mut(id)
                .properties
                .insert("length".to_string(), array_length_prop(0));
            containers.push(id);
            for (index, item) in items.iter().enumerate() {
                let value = lift_inner(heap, realm, item, containers)?;
                heap.set_prop(id, &index.to_string(), value)?;
            }
            Value::Ref(id)
        }
        Object::Map(pairs) => {
            let id = heap.alloc(JsObject::new(Some(realm.object_proto), JsClass::Object));
            containers.push(id);
            for (name, item) in pairs {
                let value = lift_inner(heap, realm, item, containers)?;
                heap.set_prop(id, name, value)?;
            }
            Value::Ref(id)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip() {
        let json: serde_json::Value = serde_json::from_str(r#"{"a": [1, "two", null], "b": true}"#).unwrap();
        let object = Object::from_json(&json);
        assert_eq!(object.to_json().unwrap(), json);
        assert!(object.is_json_shaped());
    }

    #[test]
    fn undefined_is_omitted_from_json_maps() {
        let object = Object::Map(vec![
            ("keep".to_string(), Object::Number(1.0)),
            ("drop".to_string(), Object::Undefined),
        ]);
        assert_eq!(object.to_json().unwrap().to_string(), r#"{"keep":1}"#);
    }

    #[test]
    fn cycles_are_not_json_shaped() {
        let object = Object::Array(vec![Object::Cycle(0)]);
        assert!(!object.is_json_shaped());
    }
}
