use ahash::AHashSet;

use crate::{
    builtins::{NativeCtx, NativeFunc},
    error::{ErrorKind, RunError, RunResult},
    heap::{JsClass, ObjectId, PropGet},
    value::Value,
};

fn this_array(this: &Value, who: &str) -> RunResult<ObjectId> {
    match this {
        Value::Ref(id) => Ok(*id),
        _ => Err(RunError::throw(ErrorKind::TypeError, format!("{who} called on non-object"))),
    }
}

fn element(ctx: &NativeCtx<'_>, id: ObjectId, index: u32) -> Option<Value> {
    let name = index.to_string();
    if !ctx.heap.has_prop(id, &name) {
        return None;
    }
    Some(match ctx.heap.get_prop(id, &name) {
        PropGet::Value(v) => v,
        PropGet::Getter(_) => Value::Undefined,
    })
}

fn set_element(ctx: &mut NativeCtx<'_>, id: ObjectId, index: u32, value: Value) -> RunResult<()> {
    ctx.heap.set_prop(id, &index.to_string(), value)?;
    Ok(())
}

fn delete_element(ctx: &mut NativeCtx<'_>, id: ObjectId, index: u32) {
    ctx.heap.delete_prop(id, &index.to_string());
}

fn set_length(ctx: &mut NativeCtx<'_>, id: ObjectId, length: u32) -> RunResult<()> {
    ctx.heap.set_prop(id, "length", Value::Number(f64::from(length)))?;
    Ok(())
}

/// Normalizes a possibly-negative relative index against `length`.
fn relative_index(n: f64, length: u32) -> u32 {
    if n.is_nan() {
        return 0;
    }
    if n < 0.0 {
        let from_end = f64::from(length) + n.trunc();
        if from_end < 0.0 { 0 } else { from_end as u32 }
    } else if n >= f64::from(length) {
        length
    } else {
        n.trunc() as u32
    }
}

pub(crate) fn call(ctx: &mut NativeCtx<'_>, func: NativeFunc, this: &Value, args: &[Value]) -> RunResult<Value> {
    use NativeFunc as N;
    Ok(match func {
        N::ArrayCtor => {
            let array = ctx.realm.create_array(ctx.heap);
            if args.len() == 1
                && let Value::Number(n) = &args[0]
            {
                let n = *n;
                let length = crate::value::to_uint32(n);
                if f64::from(length) != n {
                    return Err(RunError::throw(ErrorKind::RangeError, "Invalid array length"));
                }
                set_length(ctx, array, length)?;
            } else {
                for (index, value) in args.iter().enumerate() {
                    set_element(ctx, array, index as u32, value.clone())?;
                }
            }
            Value::Ref(array)
        }
        N::ArrayIsArray => Value::Bool(matches!(
            ctx.arg(args, 0),
            Value::Ref(id) if ctx.heap.get(*id).class == JsClass::Array
        )),
        N::ArrayConcat => {
            let id = this_array(this, "Array.prototype.concat")?;
            let out = ctx.realm.create_array(ctx.heap);
            let mut cursor = 0u32;
            let this_value = Value::Ref(id);
            for source in std::iter::once(&this_value).chain(args.iter()) {
                match source {
                    Value::Ref(src) if ctx.heap.get(*src).class == JsClass::Array => {
                        let length = ctx.heap.array_length(*src);
                        for index in 0..length {
                            if let Some(value) = element(ctx, *src, index) {
                                set_element(ctx, out, cursor + index, value)?;
                            }
                        }
                        cursor += length;
                        // Trailing holes still count toward the length.
                        set_length(ctx, out, cursor)?;
                    }
                    other => {
                        set_element(ctx, out, cursor, other.clone())?;
                        cursor += 1;
                    }
                }
            }
            Value::Ref(out)
        }
        N::ArrayIndexOf | N::ArrayLastIndexOf => {
            let id = this_array(this, "Array.prototype.indexOf")?;
            let length = ctx.heap.array_length(id);
            let search = ctx.arg(args, 0).clone();
            let forward = func == N::ArrayIndexOf;
            let mut found = -1.0;
            let start = if args.len() > 1 {
                ctx.arg_number(args, 1)
            } else if forward {
                0.0
            } else {
                f64::from(length) - 1.0
            };
            let indices: Vec<u32> = if forward {
                (relative_index(start, length)..length).collect()
            } else {
                let start = if start < 0.0 {
                    f64::from(length) + start.trunc()
                } else {
                    start.min(f64::from(length) - 1.0)
                };
                if start < 0.0 {
                    Vec::new()
                } else {
                    (0..=start as u32).rev().collect()
                }
            };
            for index in indices {
                if let Some(value) = element(ctx, id, index)
                    && value.strict_equals(&search)
                {
                    found = f64::from(index);
                    break;
                }
            }
            Value::Number(found)
        }
        N::ArrayJoin => {
            let id = this_array(this, "Array.prototype.join")?;
            let separator = match ctx.arg(args, 0) {
                Value::Undefined => ",".to_string(),
                other => ctx.heap.to_js_string(other),
            };
            let mut visited = AHashSet::new();
            Value::str(ctx.heap.array_join(id, &separator, &mut visited))
        }
        N::ArrayToString => {
            let id = this_array(this, "Array.prototype.toString")?;
            let mut visited = AHashSet::new();
            Value::str(ctx.heap.array_join(id, ",", &mut visited))
        }
        N::ArrayPop => {
            let id = this_array(this, "Array.prototype.pop")?;
            let length = ctx.heap.array_length(id);
            if length == 0 {
                return Ok(Value::Undefined);
            }
            let value = element(ctx, id, length - 1).unwrap_or(Value::Undefined);
            delete_element(ctx, id, length - 1);
            set_length(ctx, id, length - 1)?;
            value
        }
        N::ArrayPush => {
            let id = this_array(this, "Array.prototype.push")?;
            let mut length = ctx.heap.array_length(id);
            for value in args {
                set_element(ctx, id, length, value.clone())?;
                length += 1;
            }
            set_length(ctx, id, length)?;
            Value::Number(f64::from(length))
        }
        N::ArrayReverse => {
            let id = this_array(this, "Array.prototype.reverse")?;
            let length = ctx.heap.array_length(id);
            for low in 0..length / 2 {
                let high = length - 1 - low;
                let a = element(ctx, id, low);
                let b = element(ctx, id, high);
                match b {
                    Some(value) => set_element(ctx, id, low, value)?,
                    None => delete_element(ctx, id, low),
                }
                match a {
                    Some(value) => set_element(ctx, id, high, value)?,
                    None => delete_element(ctx, id, high),
                }
            }
            Value::Ref(id)
        }
        N::ArrayShift => {
            let id = this_array(this, "Array.prototype.shift")?;
            let length = ctx.heap.array_length(id);
            if length == 0 {
                return Ok(Value::Undefined);
            }
            let first = element(ctx, id, 0).unwrap_or(Value::Undefined);
            for index in 1..length {
                match element(ctx, id, index) {
                    Some(value) => set_element(ctx, id, index - 1, value)?,
                    None => delete_element(ctx, id, index - 1),
                }
            }
            delete_element(ctx, id, length - 1);
            set_length(ctx, id, length - 1)?;
            first
        }
        N::ArrayUnshift => {
            let id = this_array(this, "Array.prototype.unshift")?;
            let length = ctx.heap.array_length(id);
            let shift = args.len() as u32;
            for index in (0..length).rev() {
                match element(ctx, id, index) {
                    Some(value) => set_element(ctx, id, index + shift, value)?,
                    None => delete_element(ctx, id, index + shift),
                }
            }
            for (index, value) in args.iter().enumerate() {
                set_element(ctx, id, index as u32, value.clone())?;
            }
            set_length(ctx, id, length + shift)?;
            Value::Number(f64::from(length + shift))
        }
        N::ArraySlice => {
            let id = this_array(this, "Array.prototype.slice")?;
            let length = ctx.heap.array_length(id);
            let start = relative_index(ctx.arg_number(args, 0), length);
            let end = match ctx.arg(args, 1) {
                Value::Undefined => length,
                other => {
                    let other = other.clone();
                    relative_index(ctx.heap.to_number(&other), length)
                }
            };
            let out = ctx.realm.create_array(ctx.heap);
            let mut cursor = 0;
            for index in start..end {
                if let Some(value) = element(ctx, id, index) {
                    set_element(ctx, out, cursor, value)?;
                }
                cursor += 1;
            }
            if end > start {
                set_length(ctx, out, end - start)?;
            }
            Value::Ref(out)
        }
        N::ArraySplice => {
            let id = this_array(this, "Array.prototype.splice")?;
            let length = ctx.heap.array_length(id);
            let start = relative_index(ctx.arg_number(args, 0), length);
            let delete_count = if args.len() > 1 {
                let requested = ctx.arg_number(args, 1);
                let remaining = f64::from(length - start);
                if requested < 0.0 { 0 } else { requested.min(remaining) as u32 }
            } else {
                length - start
            };
            let removed = ctx.realm.create_array(ctx.heap);
            for offset in 0..delete_count {
                if let Some(value) = element(ctx, id, start + offset) {
                    set_element(ctx, removed, offset, value)?;
                }
            }
            if delete_count > 0 {
                set_length(ctx, removed, delete_count)?;
            }
            let items: Vec<Value> = args.iter().skip(2).cloned().collect();
            let inserted = items.len() as u32;
            let new_length = length - delete_count + inserted;
            if inserted < delete_count {
                for index in start + delete_count..length {
                    let target = index - delete_count + inserted;
                    match element(ctx, id, index) {
                        Some(value) => set_element(ctx, id, target, value)?,
                        None => delete_element(ctx, id, target),
                    }
                }
                for index in new_length..length {
                    delete_element(ctx, id, index);
                }
            } else if inserted > delete_count {
                for index in (start + delete_count..length).rev() {
                    let target = index - delete_count + inserted;
                    match element(ctx, id, index) {
                        Some(value) => set_element(ctx, id, target, value)?,
                        None => delete_element(ctx, id, target),
                    }
                }
            }
            for (offset, value) in items.into_iter().enumerate() {
                set_element(ctx, id, start + offset as u32, value)?;
            }
            set_length(ctx, id, new_length)?;
            Value::Ref(removed)
        }
        N::ArraySort => {
            // Comparator-free sort: string order, undefined after everything,
            // holes trail. The comparator path lives in the guest polyfill.
            let id = this_array(this, "Array.prototype.sort")?;
            let length = ctx.heap.array_length(id);
            let mut present = Vec::new();
            let mut undefined_count = 0u32;
            for index in 0..length {
                match element(ctx, id, index) {
                    Some(Value::Undefined) => undefined_count += 1,
                    Some(value) => present.push(value),
                    None => {}
                }
            }
            let mut keyed: Vec<(String, Value)> = present
                .into_iter()
                .map(|value| (ctx.heap.to_js_string(&value), value))
                .collect();
            keyed.sort_by(|a, b| a.0.cmp(&b.0));
            let mut cursor = 0u32;
            for (_, value) in keyed {
                set_element(ctx, id, cursor, value)?;
                cursor += 1;
            }
            for _ in 0..undefined_count {
                set_element(ctx, id, cursor, Value::Undefined)?;
                cursor += 1;
            }
            for index in cursor..length {
                delete_element(ctx, id, index);
            }
            Value::Ref(id)
        }
        other => unreachable!("not an Array builtin: {other:?}"),
    })
}
