use crate::{
    builtins::{NativeCtx, NativeFunc, regexp},
    error::{ErrorKind, RunError, RunResult},
    heap::InternalData,
    value::Value,
};

/// CheckObjectCoercible + ToString, the prelude of every prototype method.
fn this_string(ctx: &NativeCtx<'_>, this: &Value, who: &str) -> RunResult<String> {
    match this {
        Value::Undefined | Value::Null => Err(RunError::throw(
            ErrorKind::TypeError,
            format!("{who} called on null or undefined"),
        )),
        other => Ok(ctx.heap.to_js_string(other)),
    }
}

fn units_of(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

fn from_units(units: &[u16]) -> String {
    String::from_utf16_lossy(units)
}

/// Clamps a possibly-negative relative index.
fn relative_index(n: f64, length: usize) -> usize {
    if n.is_nan() {
        return 0;
    }
    if n < 0.0 {
        let from_end = length as f64 + n.trunc();
        if from_end < 0.0 { 0 } else { from_end as usize }
    } else if n >= length as f64 {
        length
    } else {
        n.trunc() as usize
    }
}

/// Substring search in UTF-16 space.
fn find_units(haystack: &[u16], needle: &[u16], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(from.min(haystack.len()));
    }
    if needle.len() > haystack.len() {
        return None;
    }
    (from..=haystack.len() - needle.len()).find(|&i| haystack[i..i + needle.len()] == *needle)
}

fn rfind_units(haystack: &[u16], needle: &[u16], from: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(from.min(haystack.len()));
    }
    if needle.len() > haystack.len() {
        return None;
    }
    let last = from.min(haystack.len() - needle.len());
    (0..=last).rev().find(|&i| haystack[i..i + needle.len()] == *needle)
}

/// Expands `$&`, `$1`..`$99`, `$$`, `` $` ``, `$'` in a replacement string.
fn expand_replacement(
    replacement: &str,
    info: &regexp::MatchInfo,
    input: &str,
) -> String {
    let mut out = String::new();
    let chars: Vec<char> = replacement.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] != '$' || i + 1 >= chars.len() {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        match chars[i + 1] {
            '$' => {
                out.push('$');
                i += 2;
            }
            '&' => {
                out.push_str(&info.text);
                i += 2;
            }
            '`' => {
                let units = units_of(input);
                out.push_str(&from_units(&units[..info.start]));
                i += 2;
            }
            '\'' => {
                let units = units_of(input);
                out.push_str(&from_units(&units[info.end..]));
                i += 2;
            }
            d if d.is_ascii_digit() => {
                let mut number = d.to_digit(10).unwrap() as usize;
                let mut consumed = 2;
                if i + 2 < chars.len()
                    && chars[i + 2].is_ascii_digit()
                    && number * 10 + chars[i + 2].to_digit(10).unwrap() as usize <= info.groups.len()
                {
                    number = number * 10 + chars[i + 2].to_digit(10).unwrap() as usize;
                    consumed = 3;
                }
                if number >= 1 && number <= info.groups.len() {
                    if let Some(Some(group)) = info.groups.get(number - 1) {
                        out.push_str(group);
                    }
                    i += consumed;
                } else {
                    out.push('$');
                    i += 1;
                }
            }
            _ => {
                out.push('$');
                i += 1;
            }
        }
    }
    out
}

/// All matches of `re` against `input`, advancing past empty matches.
pub(crate) fn global_matches(
    data: &crate::heap::RegexpData,
    input: &str,
) -> RunResult<Vec<regexp::MatchInfo>> {
    let total = input.encode_utf16().count();
    let mut out = Vec::new();
    let mut pos = 0;
    while pos <= total {
        let Some(info) = regexp::exec_at(data, input, pos)? else {
            break;
        };
        pos = if info.end == info.start { info.end + 1 } else { info.end };
        out.push(info);
    }
    Ok(out)
}

pub(crate) fn call(
    ctx: &mut NativeCtx<'_>,
    func: NativeFunc,
    this: &Value,
    args: &[Value],
    construct: bool,
) -> RunResult<Value> {
    use NativeFunc as N;
    Ok(match func {
        N::StringCtor => {
            let text = match ctx.arg(args, 0) {
                Value::Undefined if args.is_empty() => String::new(),
                other => ctx.heap.to_js_string(other),
            };
            if construct {
                let boxed = ctx
                    .realm
                    .box_primitive(ctx.heap, &Value::str(text))
                    .expect("strings box");
                Value::Ref(boxed)
            } else {
                Value::str(text)
            }
        }
        N::StringFromCharCode => {
            let units: Vec<u16> = args
                .iter()
                .map(|arg| crate::value::to_uint32(ctx.heap.to_number(arg)) as u16)
                .collect();
            Value::str(from_units(&units))
        }
        N::StringToString => match this {
            Value::Str(_) => this.clone(),
            Value::Ref(id) => match &ctx.heap.get(*id).data {
                Some(InternalData::Boxed(Value::Str(s))) => Value::str(s.as_str()),
                _ => {
                    return Err(RunError::throw(
                        ErrorKind::TypeError,
                        "String.prototype.toString requires that 'this' be a String",
                    ));
                }
            },
            _ => {
                return Err(RunError::throw(
                    ErrorKind::TypeError,
                    "String.prototype.toString requires that 'this' be a String",
                ));
            }
        },
        N::StringCharAt => {
            let s = this_string(ctx, this, "String.prototype.charAt")?;
            let units = units_of(&s);
            // ToInteger: NaN positions read as 0.
            let n = ctx.arg_number(args, 0);
            let index = if n.is_nan() { 0.0 } else { n.trunc() };
            if index < 0.0 || index >= units.len() as f64 {
                Value::str("")
            } else {
                Value::str(from_units(&units[index as usize..=index as usize]))
            }
        }
        N::StringCharCodeAt => {
            let s = this_string(ctx, this, "String.prototype.charCodeAt")?;
            let units = units_of(&s);
            let n = ctx.arg_number(args, 0);
            let index = if n.is_nan() { 0.0 } else { n.trunc() };
            if index < 0.0 || index >= units.len() as f64 {
                Value::Number(f64::NAN)
            } else {
                Value::Number(f64::from(units[index as usize]))
            }
        }
        N::StringConcat => {
            let mut s = this_string(ctx, this, "String.prototype.concat")?;
            for arg in args {
                s.push_str(&ctx.heap.to_js_string(arg));
            }
            Value::Str(s)
        }
        N::StringIndexOf | N::StringLastIndexOf => {
            let s = this_string(ctx, this, "String.prototype.indexOf")?;
            let units = units_of(&s);
            let needle = units_of(&ctx.arg_string(args, 0));
            let found = if func == N::StringIndexOf {
                let from = relative_index(ctx.arg_number(args, 1).max(0.0), units.len());
                find_units(&units, &needle, from)
            } else {
                let n = ctx.arg_number(args, 1);
                let from = if n.is_nan() { units.len() } else { relative_index(n.max(0.0), units.len()) };
                rfind_units(&units, &needle, from)
            };
            Value::Number(found.map_or(-1.0, |i| i as f64))
        }
        N::StringLocaleCompare => {
            let s = this_string(ctx, this, "String.prototype.localeCompare")?;
            let other = ctx.arg_string(args, 0);
            Value::Number(match s.cmp(&other) {
                std::cmp::Ordering::Less => -1.0,
                std::cmp::Ordering::Equal => 0.0,
                std::cmp::Ordering::Greater => 1.0,
            })
        }
        N::StringMatch => {
            let s = this_string(ctx, this, "String.prototype.match")?;
            let pattern = ctx.arg(args, 0).clone();
            let re_id = regexp::coerce_to_regexp(ctx, &pattern)?;
            let Some(InternalData::Regexp(data)) = ctx.heap.get(re_id).data.clone() else {
                unreachable!("coerce_to_regexp returns a regexp");
            };
            if data.has_flag('g') {
                ctx.heap.set_prop(re_id, "lastIndex", Value::Number(0.0))?;
                let matches = global_matches(&data, &s)?;
                if matches.is_empty() {
                    Value::Null
                } else {
                    let array = ctx.realm.create_array(ctx.heap);
                    for (index, info) in matches.iter().enumerate() {
                        ctx.heap
                            .set_prop(array, &index.to_string(), Value::str(info.text.as_str()))?;
                    }
                    Value::Ref(array)
                }
            } else {
                match regexp::exec_at(&data, &s, 0)? {
                    Some(info) => regexp::match_to_array(ctx, &info, &s)?,
                    None => Value::Null,
                }
            }
        }
        N::StringSearch => {
            let s = this_string(ctx, this, "String.prototype.search")?;
            let pattern = ctx.arg(args, 0).clone();
            let re_id = regexp::coerce_to_regexp(ctx, &pattern)?;
            let Some(InternalData::Regexp(data)) = ctx.heap.get(re_id).data.clone() else {
                unreachable!("coerce_to_regexp returns a regexp");
            };
            match regexp::exec_at(&data, &s, 0)? {
                Some(info) => Value::Number(info.start as f64),
                None => Value::Number(-1.0),
            }
        }
        N::StringReplace => {
            // String replacements only; function replacements are routed
            // through the guest polyfill before reaching the native.
            let s = this_string(ctx, this, "String.prototype.replace")?;
            let replacement = ctx.arg_string(args, 1);
            match ctx.arg(args, 0) {
                Value::Ref(id) if matches!(ctx.heap.get(*id).data, Some(InternalData::Regexp(_))) => {
                    let Some(InternalData::Regexp(data)) = ctx.heap.get(*id).data.clone() else {
                        unreachable!()
                    };
                    let matches = if data.has_flag('g') {
                        global_matches(&data, &s)?
                    } else {
                        regexp::exec_at(&data, &s, 0)?.into_iter().collect()
                    };
                    let units = units_of(&s);
                    let mut out = String::new();
                    let mut cursor = 0;
                    for info in &matches {
                        out.push_str(&from_units(&units[cursor..info.start]));
                        out.push_str(&expand_replacement(&replacement, info, &s));
                        cursor = info.end;
                    }
                    out.push_str(&from_units(&units[cursor..]));
                    Value::Str(out)
                }
                pattern => {
                    let needle = ctx.heap.to_js_string(pattern);
                    let units = units_of(&s);
                    let needle_units = units_of(&needle);
                    match find_units(&units, &needle_units, 0) {
                        Some(at) => {
                            // Plain-string patterns still honor $-expansion.
                            let info = regexp::MatchInfo {
                                start: at,
                                end: at + needle_units.len(),
                                text: needle,
                                groups: Vec::new(),
                            };
                            let mut out = from_units(&units[..at]);
                            out.push_str(&expand_replacement(&replacement, &info, &s));
                            out.push_str(&from_units(&units[info.end..]));
                            Value::Str(out)
                        }
                        None => Value::Str(s),
                    }
                }
            }
        }
        N::StringSlice => {
            let s = this_string(ctx, this, "String.prototype.slice")?;
            let units = units_of(&s);
            let start = relative_index(ctx.arg_number(args, 0), units.len());
            let end = match ctx.arg(args, 1) {
                Value::Undefined => units.len(),
                other => {
                    let n = ctx.heap.to_number(&other.clone());
                    relative_index(n, units.len())
                }
            };
            if start >= end {
                Value::str("")
            } else {
                Value::str(from_units(&units[start..end]))
            }
        }
        N::StringSplit => {
            let s = this_string(ctx, this, "String.prototype.split")?;
            let limit = match ctx.arg(args, 1) {
                Value::Undefined => u32::MAX,
                other => crate::value::to_uint32(ctx.heap.to_number(&other.clone())),
            };
            let array = ctx.realm.create_array(ctx.heap);
            let push = |ctx: &mut NativeCtx<'_>, index: u32, text: String| -> RunResult<()> {
                ctx.heap.set_prop(array, &index.to_string(), Value::Str(text))?;
                Ok(())
            };
            match ctx.arg(args, 0) {
                Value::Undefined => {
                    if limit > 0 {
                        push(ctx, 0, s)?;
                    }
                }
                Value::Ref(id) if matches!(ctx.heap.get(*id).data, Some(InternalData::Regexp(_))) => {
                    let Some(InternalData::Regexp(data)) = ctx.heap.get(*id).data.clone() else {
                        unreachable!()
                    };
                    let units = units_of(&s);
                    let mut cursor = 0;
                    let mut count = 0u32;
                    for info in global_matches(&data, &s)? {
                        if info.start == 0 && info.end == 0 {
                            continue;
                        }
                        if count >= limit {
                            break;
                        }
                        push(ctx, count, from_units(&units[cursor..info.start]))?;
                        count += 1;
                        for group in &info.groups {
                            if count >= limit {
                                break;
                            }
                            if let Some(group) = group {
                                push(ctx, count, group.clone())?;
                                count += 1;
                            }
                        }
                        cursor = info.end;
                    }
                    if count < limit {
                        push(ctx, count, from_units(&units[cursor..]))?;
                    }
                }
                pattern => {
                    let separator = ctx.heap.to_js_string(&pattern.clone());
                    let units = units_of(&s);
                    if separator.is_empty() {
                        for (index, unit) in units.iter().enumerate() {
                            if index as u32 >= limit {
                                break;
                            }
                            push(ctx, index as u32, from_units(&[*unit]))?;
                        }
                    } else {
                        let needle = units_of(&separator);
                        let mut cursor = 0;
                        let mut count = 0u32;
                        while let Some(at) = find_units(&units, &needle, cursor) {
                            if count >= limit {
                                break;
                            }
                            push(ctx, count, from_units(&units[cursor..at]))?;
                            count += 1;
                            cursor = at + needle.len();
                            if needle.is_empty() {
                                break;
                            }
                        }
                        if count < limit {
                            push(ctx, count, from_units(&units[cursor..]))?;
                        }
                    }
                }
            }
            Value::Ref(array)
        }
        N::StringSubstr => {
            let s = this_string(ctx, this, "String.prototype.substr")?;
            let units = units_of(&s);
            let start = relative_index(ctx.arg_number(args, 0), units.len());
            let length = match ctx.arg(args, 1) {
                Value::Undefined => units.len() - start,
                other => {
                    let n = ctx.heap.to_number(&other.clone());
                    if n.is_nan() || n < 0.0 {
                        0
                    } else {
                        (n.trunc() as usize).min(units.len() - start)
                    }
                }
            };
            Value::str(from_units(&units[start..start + length]))
        }
        N::StringSubstring => {
            let s = this_string(ctx, this, "String.prototype.substring")?;
            let units = units_of(&s);
            let clamp = |n: f64| {
                if n.is_nan() || n < 0.0 {
                    0
                } else {
                    (n.trunc() as usize).min(units.len())
                }
            };
            let mut start = clamp(ctx.arg_number(args, 0));
            let mut end = match ctx.arg(args, 1) {
                Value::Undefined => units.len(),
                other => clamp(ctx.heap.to_number(&other.clone())),
            };
            if start > end {
                std::mem::swap(&mut start, &mut end);
            }
            Value::str(from_units(&units[start..end]))
        }
        N::StringToLowerCase => {
            let s = this_string(ctx, this, "String.prototype.toLowerCase")?;
            Value::Str(s.to_lowercase())
        }
        N::StringToUpperCase => {
            let s = this_string(ctx, this, "String.prototype.toUpperCase")?;
            Value::Str(s.to_uppercase())
        }
        N::StringTrim => {
            let s = this_string(ctx, this, "String.prototype.trim")?;
            Value::str(s.trim_matches(|c: char| c.is_whitespace() || matches!(c, '\u{FEFF}' | '\u{A0}')))
        }
        other => unreachable!("not a String builtin: {other:?}"),
    })
}
