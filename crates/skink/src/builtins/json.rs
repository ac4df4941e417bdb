use ahash::AHashSet;
use serde::Serialize;

use crate::{
    builtins::{NativeCtx, NativeFunc},
    error::{ErrorKind, RunError, RunResult},
    heap::{InternalData, JsClass, PropGet},
    object::{Object, lift_object, lower_value},
    value::Value,
};

fn contains_cycle(object: &Object) -> bool {
    match object {
        Object::Cycle(_) => true,
        Object::Array(items) => items.iter().any(contains_cycle),
        Object::Map(pairs) => pairs.iter().any(|(_, v)| contains_cycle(v)),
        _ => false,
    }
}

/// Applies an array-of-keys replacer to every nested plain object.
fn filter_keys(object: Object, keys: &AHashSet<String>) -> Object {
    match object {
        Object::Array(items) => Object::Array(items.into_iter().map(|item| filter_keys(item, keys)).collect()),
        Object::Map(pairs) => Object::Map(
            pairs
                .into_iter()
                .filter(|(name, _)| keys.contains(name))
                .map(|(name, value)| (name, filter_keys(value, keys)))
                .collect(),
        ),
        other => other,
    }
}

pub(crate) fn call(ctx: &mut NativeCtx<'_>, func: NativeFunc, _this: &Value, args: &[Value]) -> RunResult<Value> {
    Ok(match func {
        NativeFunc::JsonParse => {
            let text = ctx.arg_string(args, 0);
            let json: serde_json::Value = serde_json::from_str(&text)
                .map_err(|e| RunError::throw(ErrorKind::SyntaxError, format!("Unexpected token in JSON: {e}")))?;
            lift_object(ctx.heap, ctx.realm, &Object::from_json(&json))?
        }
        NativeFunc::JsonStringify => {
            let mut lowered = lower_value(ctx.heap, ctx.arg(args, 0));
            if contains_cycle(&lowered) {
                return Err(RunError::throw(
                    ErrorKind::TypeError,
                    "Converting circular structure to JSON",
                ));
            }
            // Array-of-keys replacer; function replacers are out of scope
            // for the native and arrive pre-applied via guest code.
            if let Value::Ref(id) = ctx.arg(args, 1)
                && ctx.heap.get(*id).class == JsClass::Array
            {
                let length = ctx.heap.array_length(*id);
                let mut keys = AHashSet::new();
                for index in 0..length {
                    if let PropGet::Value(v) = ctx.heap.get_prop(*id, &index.to_string()) {
                        keys.insert(ctx.heap.to_js_string(&v));
                    }
                }
                lowered = filter_keys(lowered, &keys);
            }
            let Some(json) = lowered.to_json() else {
                return Ok(Value::Undefined);
            };
            let indent = match ctx.arg(args, 2) {
                Value::Number(n) => {
                    let n = n.trunc().clamp(0.0, 10.0) as usize;
                    " ".repeat(n)
                }
                Value::Str(s) => s.chars().take(10).collect(),
                Value::Ref(id) => match &ctx.heap.get(*id).data {
                    Some(InternalData::Boxed(Value::Number(n))) => " ".repeat(n.trunc().clamp(0.0, 10.0) as usize),
                    Some(InternalData::Boxed(Value::Str(s))) => s.chars().take(10).collect(),
                    _ => String::new(),
                },
                _ => String::new(),
            };
            let text = if indent.is_empty() {
                serde_json::to_string(&json)
            } else {
                let mut out = Vec::new();
                let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
                let mut serializer = serde_json::Serializer::with_formatter(&mut out, formatter);
                json.serialize(&mut serializer).map(|()| {
                    String::from_utf8(out).expect("serde_json emits UTF-8")
                })
            }
            .map_err(|e| RunError::throw(ErrorKind::TypeError, format!("JSON serialization failed: {e}")))?;
            Value::Str(text)
        }
        other => unreachable!("not a JSON builtin: {other:?}"),
    })
}
