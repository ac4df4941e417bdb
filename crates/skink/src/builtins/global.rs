use crate::{
    builtins::{NativeCtx, NativeFunc},
    error::{ErrorKind, RunError, RunResult},
    value::Value,
};

pub(crate) fn call(ctx: &mut NativeCtx<'_>, func: NativeFunc, args: &[Value]) -> RunResult<Value> {
    Ok(match func {
        NativeFunc::ParseInt => {
            let text = ctx.arg_string(args, 0);
            let radix = ctx.arg_number(args, 1);
            Value::Number(parse_int(&text, radix as i32))
        }
        NativeFunc::ParseFloat => Value::Number(parse_float(&ctx.arg_string(args, 0))),
        NativeFunc::IsNaN => Value::Bool(ctx.arg_number(args, 0).is_nan()),
        NativeFunc::IsFinite => Value::Bool(ctx.arg_number(args, 0).is_finite()),
        NativeFunc::EncodeUriComponent => Value::str(encode_uri(&ctx.arg_string(args, 0), URI_COMPONENT_UNRESERVED)),
        NativeFunc::EncodeUri => Value::str(encode_uri(&ctx.arg_string(args, 0), URI_UNRESERVED)),
        NativeFunc::DecodeUriComponent | NativeFunc::DecodeUri => {
            Value::str(decode_uri(&ctx.arg_string(args, 0))?)
        }
        other => unreachable!("not a global function: {other:?}"),
    })
}

fn is_space(c: char) -> bool {
    c.is_whitespace() || matches!(c, '\u{FEFF}' | '\u{A0}')
}

/// ES 15.1.2.2: sign, optional 0x, then as many digits as fit the radix.
fn parse_int(text: &str, radix: i32) -> f64 {
    let mut s = text.trim_matches(is_space);
    let mut sign = 1.0;
    if let Some(rest) = s.strip_prefix('-') {
        sign = -1.0;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }
    // Hex detection only applies when the radix was absent or is 16; an
    // explicit radix 10 must leave a 0x prefix to stop the digit scan.
    let detect_hex = radix == 0 || radix == 16;
    let mut radix = if radix == 0 { 10 } else { radix };
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }
    if detect_hex && (s.starts_with("0x") || s.starts_with("0X")) {
        s = &s[2..];
        radix = 16;
    }
    let radix = radix as u32;
    let mut value = 0.0f64;
    let mut any = false;
    for c in s.chars() {
        let Some(digit) = c.to_digit(radix) else { break };
        value = value * f64::from(radix) + f64::from(digit);
        any = true;
    }
    if any { sign * value } else { f64::NAN }
}

/// ES 15.1.2.3: the longest prefix that forms a decimal literal.
fn parse_float(text: &str) -> f64 {
    let s = text.trim_matches(is_space);
    let bytes = s.as_bytes();
    let mut end = 0;
    let mut i = 0;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    if s[i..].starts_with("Infinity") {
        return s.trim_start_matches('+').parse().unwrap_or(if bytes[0] == b'-' {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }
    let mut digits = 0;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
        digits += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
            digits += 1;
        }
    }
    if digits > 0 {
        end = i;
        // Optional exponent, only if complete.
        let mut j = i;
        if j < bytes.len() && (bytes[j] == b'e' || bytes[j] == b'E') {
            j += 1;
            if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
                j += 1;
            }
            let mut exp_digits = 0;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
                exp_digits += 1;
            }
            if exp_digits > 0 {
                end = j;
            }
        }
    }
    if end == 0 {
        return f64::NAN;
    }
    s[..end].parse().unwrap_or(f64::NAN)
}

/// Characters encodeURIComponent leaves as-is.
const URI_COMPONENT_UNRESERVED: &str = "-_.!~*'()";
/// encodeURI additionally preserves the URI syntax set.
const URI_UNRESERVED: &str = "-_.!~*'();/?:@&=+$,#";

fn encode_uri(text: &str, unreserved: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii_alphanumeric() || unreserved.contains(c) {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).as_bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    out
}

fn decode_uri(text: &str) -> RunResult<String> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    let malformed = || RunError::throw(ErrorKind::URIError, "URI malformed");
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = text.get(i + 1..i + 3).ok_or_else(malformed)?;
            let byte = u8::from_str_radix(hex, 16).map_err(|_| malformed())?;
            out.push(byte);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).map_err(|_| malformed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_radix_handling() {
        assert_eq!(parse_int("42", 0), 42.0);
        assert_eq!(parse_int("  -10  ", 0), -10.0);
        assert_eq!(parse_int("0x1f", 0), 31.0);
        assert_eq!(parse_int("0x1f", 16), 31.0);
        // An explicit radix 10 keeps the prefix: "0" parses, "x" stops it.
        assert_eq!(parse_int("0x1f", 10), 0.0);
        assert_eq!(parse_int("ff", 16), 255.0);
        assert_eq!(parse_int("12px", 0), 12.0);
        assert!(parse_int("", 0).is_nan());
        assert!(parse_int("x", 0).is_nan());
        assert!(parse_int("1", 1).is_nan());
    }

    #[test]
    fn parse_float_prefix() {
        assert_eq!(parse_float("3.5abc"), 3.5);
        assert_eq!(parse_float("  .5"), 0.5);
        assert_eq!(parse_float("1e2x"), 100.0);
        assert_eq!(parse_float("1e"), 1.0);
        assert_eq!(parse_float("-Infinity"), f64::NEG_INFINITY);
        assert!(parse_float("abc").is_nan());
    }

    #[test]
    fn uri_component_round_trip() {
        let input = "a b/ü?";
        let encoded = encode_uri(input, URI_COMPONENT_UNRESERVED);
        assert_eq!(encoded, "a%20b%2F%C3%BC%3F");
        assert_eq!(decode_uri(&encoded).unwrap(), input);
    }

    #[test]
    fn encode_uri_preserves_syntax() {
        assert_eq!(encode_uri("a b/c?d", URI_UNRESERVED), "a%20b/c?d");
    }

    #[test]
    fn malformed_percent_escape() {
        assert!(decode_uri("%").is_err());
        assert!(decode_uri("%zz").is_err());
        assert!(decode_uri("%ff").is_err());
    }
}
