use crate::{
    builtins::{NativeCtx, NativeFunc},
    error::{ErrorKind, RunError, RunResult},
    heap::InternalData,
    value::{Value, format_number, format_number_radix},
};

/// `this` as a number: the primitive itself or a boxed Number.
fn this_number(ctx: &NativeCtx<'_>, this: &Value, who: &str) -> RunResult<f64> {
    match this {
        Value::Number(n) => Ok(*n),
        Value::Ref(id) => match &ctx.heap.get(*id).data {
            Some(InternalData::Boxed(Value::Number(n))) => Ok(*n),
            _ => Err(RunError::throw(
                ErrorKind::TypeError,
                format!("{who} requires that 'this' be a Number"),
            )),
        },
        _ => Err(RunError::throw(
            ErrorKind::TypeError,
            format!("{who} requires that 'this' be a Number"),
        )),
    }
}

fn this_boolean(ctx: &NativeCtx<'_>, this: &Value, who: &str) -> RunResult<bool> {
    match this {
        Value::Bool(b) => Ok(*b),
        Value::Ref(id) => match &ctx.heap.get(*id).data {
            Some(InternalData::Boxed(Value::Bool(b))) => Ok(*b),
            _ => Err(RunError::throw(
                ErrorKind::TypeError,
                format!("{who} requires that 'this' be a Boolean"),
            )),
        },
        _ => Err(RunError::throw(
            ErrorKind::TypeError,
            format!("{who} requires that 'this' be a Boolean"),
        )),
    }
}

/// Rust's `{:e}` prints `1.5e2`; ES wants an explicit exponent sign.
fn fix_exponent_sign(mut s: String) -> String {
    if let Some(at) = s.find('e')
        && !matches!(s.as_bytes().get(at + 1), Some(b'+' | b'-'))
    {
        s.insert(at + 1, '+');
    }
    s
}

pub(crate) fn call_boolean(
    ctx: &mut NativeCtx<'_>,
    func: NativeFunc,
    this: &Value,
    args: &[Value],
    construct: bool,
) -> RunResult<Value> {
    Ok(match func {
        NativeFunc::BooleanCtor => {
            let b = ctx.arg(args, 0).to_boolean();
            if construct {
                let boxed = ctx
                    .realm
                    .box_primitive(ctx.heap, &Value::Bool(b))
                    .expect("booleans box");
                Value::Ref(boxed)
            } else {
                Value::Bool(b)
            }
        }
        NativeFunc::BooleanToString => {
            let b = this_boolean(ctx, this, "Boolean.prototype.toString")?;
            Value::str(if b { "true" } else { "false" })
        }
        NativeFunc::BooleanValueOf => Value::Bool(this_boolean(ctx, this, "Boolean.prototype.valueOf")?),
        other => unreachable!("not a Boolean builtin: {other:?}"),
    })
}

pub(crate) fn call(
    ctx: &mut NativeCtx<'_>,
    func: NativeFunc,
    this: &Value,
    args: &[Value],
    construct: bool,
) -> RunResult<Value> {
    Ok(match func {
        NativeFunc::NumberCtor => {
            let n = if args.is_empty() { 0.0 } else { ctx.arg_number(args, 0) };
            if construct {
                let boxed = ctx
                    .realm
                    .box_primitive(ctx.heap, &Value::Number(n))
                    .expect("numbers box");
                Value::Ref(boxed)
            } else {
                Value::Number(n)
            }
        }
        NativeFunc::NumberValueOf => Value::Number(this_number(ctx, this, "Number.prototype.valueOf")?),
        NativeFunc::NumberToString => {
            let n = this_number(ctx, this, "Number.prototype.toString")?;
            let radix = match ctx.arg(args, 0) {
                Value::Undefined => 10.0,
                other => ctx.heap.to_number(&other.clone()),
            };
            if radix.is_nan() || !(2.0..=36.0).contains(&radix.trunc()) {
                return Err(RunError::throw(
                    ErrorKind::RangeError,
                    "toString() radix must be between 2 and 36",
                ));
            }
            Value::Str(format_number_radix(n, radix.trunc() as u32))
        }
        NativeFunc::NumberToFixed => {
            let n = this_number(ctx, this, "Number.prototype.toFixed")?;
            let digits = ctx.arg_number(args, 0);
            let digits = if digits.is_nan() { 0.0 } else { digits.trunc() };
            if !(0.0..=20.0).contains(&digits) {
                return Err(RunError::throw(
                    ErrorKind::RangeError,
                    "toFixed() digits argument must be between 0 and 20",
                ));
            }
            if !n.is_finite() || n.abs() >= 1e21 {
                Value::Str(format_number(n))
            } else {
                Value::Str(format!("{n:.prec$}", prec = digits as usize))
            }
        }
        NativeFunc::NumberToExponential => {
            let n = this_number(ctx, this, "Number.prototype.toExponential")?;
            if !n.is_finite() {
                return Ok(Value::Str(format_number(n)));
            }
            let digits = match ctx.arg(args, 0) {
                Value::Undefined => None,
                other => {
                    let d = ctx.heap.to_number(&other.clone()).trunc();
                    if !(0.0..=20.0).contains(&d) {
                        return Err(RunError::throw(
                            ErrorKind::RangeError,
                            "toExponential() digits argument must be between 0 and 20",
                        ));
                    }
                    Some(d as usize)
                }
            };
            let text = match digits {
                Some(d) => format!("{n:.prec$e}", prec = d),
                None => format!("{n:e}"),
            };
            Value::Str(fix_exponent_sign(text))
        }
        NativeFunc::NumberToPrecision => {
            let n = this_number(ctx, this, "Number.prototype.toPrecision")?;
            let precision = match ctx.arg(args, 0) {
                Value::Undefined => return Ok(Value::Str(format_number(n))),
                other => ctx.heap.to_number(&other.clone()).trunc(),
            };
            if !n.is_finite() {
                return Ok(Value::Str(format_number(n)));
            }
            if !(1.0..=21.0).contains(&precision) {
                return Err(RunError::throw(
                    ErrorKind::RangeError,
                    "toPrecision() argument must be between 1 and 21",
                ));
            }
            let p = precision as usize;
            // Decompose via exponential form, then pick fixed or exponential
            // per 15.7.4.7.
            let exp_form = format!("{n:.prec$e}", prec = p - 1);
            let (mantissa, exponent) = exp_form.split_once('e').expect("{:e} always has an exponent");
            let e: i32 = exponent.parse().expect("exponent is an integer");
            if e < -6 || e >= p as i32 {
                Value::Str(fix_exponent_sign(format!("{mantissa}e{e}")))
            } else {
                let fraction_digits = (p as i32 - 1 - e).max(0) as usize;
                Value::Str(format!("{n:.prec$}", prec = fraction_digits))
            }
        }
        other => unreachable!("not a Number builtin: {other:?}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponent_sign_is_normalized() {
        assert_eq!(fix_exponent_sign("1.5e2".to_string()), "1.5e+2");
        assert_eq!(fix_exponent_sign("1.5e-2".to_string()), "1.5e-2");
    }
}
