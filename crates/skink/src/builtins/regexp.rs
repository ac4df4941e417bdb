use crate::{
    builtins::{NativeCtx, NativeFunc},
    error::{ErrorKind, RunError, RunResult},
    heap::{InternalData, JsClass, JsObject, ObjectId, PropGet, RegexpData},
    value::Value,
};

/// One successful match. Positions are UTF-16 code-unit indices into the
/// input, which is what guest code observes.
#[derive(Debug)]
pub(crate) struct MatchInfo {
    pub start: usize,
    pub end: usize,
    pub text: String,
    /// Capture groups: text when the group participated.
    pub groups: Vec<Option<String>>,
}

pub(crate) fn utf16_to_byte(s: &str, target: usize) -> Option<usize> {
    if target == 0 {
        return Some(0);
    }
    let mut units = 0;
    for (byte, c) in s.char_indices() {
        if units == target {
            return Some(byte);
        }
        units += c.len_utf16();
    }
    (units == target).then_some(s.len())
}

pub(crate) fn byte_to_utf16(s: &str, target: usize) -> usize {
    s[..target].encode_utf16().count()
}

/// Runs the pattern once against `input` starting at UTF-16 index `start`.
/// Sticky patterns must match exactly at `start`.
pub(crate) fn exec_at(data: &RegexpData, input: &str, start: usize) -> RunResult<Option<MatchInfo>> {
    let Some(byte_start) = utf16_to_byte(input, start) else {
        return Ok(None);
    };
    let regex = data.regex()?;
    let captures = regex
        .captures_from_pos(input, byte_start)
        .map_err(|e| RunError::throw(ErrorKind::SyntaxError, format!("regexp execution failed: {e}")))?;
    let Some(captures) = captures else {
        return Ok(None);
    };
    let full = captures.get(0).expect("capture 0 is the whole match");
    if data.has_flag('y') && full.start() != byte_start {
        return Ok(None);
    }
    let groups = (1..captures.len())
        .map(|i| captures.get(i).map(|m| m.as_str().to_string()))
        .collect();
    Ok(Some(MatchInfo {
        start: byte_to_utf16(input, full.start()),
        end: byte_to_utf16(input, full.end()),
        text: full.as_str().to_string(),
        groups,
    }))
}

/// Builds a guest RegExp object and wires its flag properties.
pub(crate) fn create_regexp(ctx: &mut NativeCtx<'_>, source: &str, flags: &str) -> RunResult<ObjectId> {
    let data = RegexpData::new(source, flags)?;
    let id = ctx.heap.alloc(JsObject::new(Some(ctx.realm.regexp_proto), JsClass::Regexp));
    populate_regexp(ctx, id, data);
    Ok(id)
}

/// Installs the backing data plus the `source`/flag/lastIndex properties.
pub(crate) fn populate_regexp(ctx: &mut NativeCtx<'_>, id: ObjectId, data: RegexpData) {
    use crate::heap::Prop;
    let frozen = |value: Value| Prop {
        value,
        writable: false,
        enumerable: false,
        configurable: false,
    };
    let object = ctx.heap.get_mut(id);
    object.properties.insert("source".to_string(), frozen(Value::str(&data.source)));
    object.properties.insert("global".to_string(), frozen(Value::Bool(data.has_flag('g'))));
    object
        .properties
        .insert("ignoreCase".to_string(), frozen(Value::Bool(data.has_flag('i'))));
    object
        .properties
        .insert("multiline".to_string(), frozen(Value::Bool(data.has_flag('m'))));
    object.properties.insert(
        "lastIndex".to_string(),
        Prop {
            value: Value::Number(0.0),
            writable: true,
            enumerable: false,
            configurable: false,
        },
    );
    object.data = Some(InternalData::Regexp(data));
}

/// `this` as a regexp's backing data, cloned out to release the borrow.
fn this_regexp(ctx: &NativeCtx<'_>, this: &Value, who: &str) -> RunResult<(ObjectId, RegexpData)> {
    if let Value::Ref(id) = this
        && let Some(InternalData::Regexp(data)) = &ctx.heap.get(*id).data
    {
        return Ok((*id, data.clone()));
    }
    Err(RunError::throw(
        ErrorKind::TypeError,
        format!("{who} requires that 'this' be a RegExp"),
    ))
}

/// Coerces a value to a regexp object: passes regexps through, compiles
/// anything else from its string form (used by String.prototype methods).
pub(crate) fn coerce_to_regexp(ctx: &mut NativeCtx<'_>, value: &Value) -> RunResult<ObjectId> {
    if let Value::Ref(id) = value
        && matches!(ctx.heap.get(*id).data, Some(InternalData::Regexp(_)))
    {
        return Ok(*id);
    }
    let source = match value {
        Value::Undefined => String::new(),
        other => ctx.heap.to_js_string(other),
    };
    create_regexp(ctx, &source, "")
}

/// Reads and clamps `lastIndex` for a global/sticky match.
fn last_index(ctx: &NativeCtx<'_>, id: ObjectId) -> usize {
    match ctx.heap.get_prop(id, "lastIndex") {
        PropGet::Value(v) => {
            let n = v.to_number_primitive();
            if n.is_nan() || n < 0.0 { 0 } else { n as usize }
        }
        PropGet::Getter(_) => 0,
    }
}

fn store_last_index(ctx: &mut NativeCtx<'_>, id: ObjectId, value: usize) -> RunResult<()> {
    ctx.heap.set_prop(id, "lastIndex", Value::Number(value as f64))?;
    Ok(())
}

/// Builds the exec() result array: match, captures, `index`, `input`.
pub(crate) fn match_to_array(ctx: &mut NativeCtx<'_>, info: &MatchInfo, input: &str) -> RunResult<Value> {
    let array = ctx.realm.create_array(ctx.heap);
    ctx.heap.set_prop(array, "0", Value::str(&info.text))?;
    for (slot, group) in info.groups.iter().enumerate() {
        let value = group.as_ref().map_or(Value::Undefined, |text| Value::str(text.as_str()));
        ctx.heap.set_prop(array, &(slot + 1).to_string(), value)?;
    }
    ctx.heap.set_prop(array, "index", Value::Number(info.start as f64))?;
    ctx.heap.set_prop(array, "input", Value::str(input))?;
    Ok(Value::Ref(array))
}

pub(crate) fn call(ctx: &mut NativeCtx<'_>, func: NativeFunc, this: &Value, args: &[Value]) -> RunResult<Value> {
    Ok(match func {
        NativeFunc::RegexpCtor => {
            let (source, flags) = match ctx.arg(args, 0) {
                Value::Ref(id) if matches!(ctx.heap.get(*id).data, Some(InternalData::Regexp(_))) => {
                    let Some(InternalData::Regexp(data)) = &ctx.heap.get(*id).data else {
                        unreachable!()
                    };
                    if !matches!(ctx.arg(args, 1), Value::Undefined) {
                        return Err(RunError::throw(
                            ErrorKind::TypeError,
                            "Cannot supply flags when constructing one RegExp from another",
                        ));
                    }
                    (data.source.clone(), data.flags.clone())
                }
                Value::Undefined => (String::new(), String::new()),
                pattern => {
                    let source = ctx.heap.to_js_string(pattern);
                    let flags = match ctx.arg(args, 1) {
                        Value::Undefined => String::new(),
                        other => ctx.heap.to_js_string(other),
                    };
                    (source, flags)
                }
            };
            if !flags.chars().all(|c| "gmsiy".contains(c)) {
                return Err(RunError::throw(ErrorKind::SyntaxError, "invalid regular expression flag"));
            }
            Value::Ref(create_regexp(ctx, &source, &flags)?)
        }
        NativeFunc::RegexpExec | NativeFunc::RegexpTest => {
            let (id, data) = this_regexp(ctx, this, "RegExp.prototype.exec")?;
            let input = ctx.arg_string(args, 0);
            let tracked = data.has_flag('g') || data.has_flag('y');
            let start = if tracked { last_index(ctx, id) } else { 0 };
            let result = exec_at(&data, &input, start)?;
            if tracked {
                match &result {
                    Some(info) => store_last_index(ctx, id, info.end)?,
                    None => store_last_index(ctx, id, 0)?,
                }
            }
            if func == NativeFunc::RegexpTest {
                Value::Bool(result.is_some())
            } else {
                match result {
                    Some(info) => match_to_array(ctx, &info, &input)?,
                    None => Value::Null,
                }
            }
        }
        NativeFunc::RegexpToString => {
            let (_, data) = this_regexp(ctx, this, "RegExp.prototype.toString")?;
            Value::str(format!("/{}/{}", data.source, data.flags))
        }
        other => unreachable!("not a RegExp builtin: {other:?}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf16_byte_mapping() {
        let s = "aé𝄞b";
        // a=1 unit, é=1 unit, 𝄞=2 units, b=1 unit.
        assert_eq!(utf16_to_byte(s, 0), Some(0));
        assert_eq!(utf16_to_byte(s, 1), Some(1));
        assert_eq!(utf16_to_byte(s, 2), Some(3));
        assert_eq!(utf16_to_byte(s, 4), Some(7));
        assert_eq!(utf16_to_byte(s, 5), Some(8));
        assert_eq!(utf16_to_byte(s, 3), None, "inside a surrogate pair");
        assert_eq!(byte_to_utf16(s, 7), 4);
    }

    #[test]
    fn exec_at_finds_and_anchors() {
        let data = RegexpData::new("a(b+)", "").unwrap();
        let info = exec_at(&data, "xxabbby", 0).unwrap().unwrap();
        assert_eq!(info.start, 2);
        assert_eq!(info.text, "abbb");
        assert_eq!(info.groups, vec![Some("bbb".to_string())]);

        let sticky = RegexpData::new("a", "y").unwrap();
        assert!(exec_at(&sticky, "xa", 0).unwrap().is_none());
        assert!(exec_at(&sticky, "xa", 1).unwrap().is_some());
    }

    #[test]
    fn case_insensitive_flag() {
        let data = RegexpData::new("abc", "i").unwrap();
        assert!(exec_at(&data, "xABC", 0).unwrap().is_some());
    }
}
