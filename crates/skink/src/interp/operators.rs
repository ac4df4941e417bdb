//! Numeric and comparison semantics for the binary/unary handlers.
//!
//! Everything here resolves object operands through the class-based native
//! ToPrimitive, so no operator ever re-enters the step engine.

use crate::{
    ast::{BinaryOp, UnaryOp},
    error::{ErrorKind, RunError, RunResult},
    heap::{Heap, PropGet},
    value::{Value, str_to_number, to_int32, to_uint32},
};

/// ES abstract equality (`==`), with the null/undefined pairing and the
/// numeric/string/boxed coercion ladder.
pub(crate) fn abstract_equals(heap: &Heap, a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
        (Value::Number(x), Value::Number(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Ref(x), Value::Ref(y)) => x == y,
        (Value::Number(x), Value::Str(y)) => *x == str_to_number(y),
        (Value::Str(x), Value::Number(y)) => str_to_number(x) == *y,
        (Value::Bool(x), other) => abstract_equals(heap, &Value::Number(f64::from(*x)), other),
        (other, Value::Bool(y)) => abstract_equals(heap, other, &Value::Number(f64::from(*y))),
        (Value::Ref(_), Value::Number(_) | Value::Str(_)) => {
            let primitive = heap.to_primitive(a, true);
            abstract_equals(heap, &primitive, b)
        }
        (Value::Number(_) | Value::Str(_), Value::Ref(_)) => {
            let primitive = heap.to_primitive(b, true);
            abstract_equals(heap, a, &primitive)
        }
        _ => false,
    }
}

/// Relational comparison: both operands to primitives, string order when
/// both are strings, numeric otherwise. Returns `None` for NaN operands.
fn compare(heap: &Heap, left: &Value, right: &Value) -> Option<std::cmp::Ordering> {
    let left = heap.to_primitive(left, true);
    let right = heap.to_primitive(right, true);
    if let (Value::Str(a), Value::Str(b)) = (&left, &right) {
        return Some(a.cmp(b));
    }
    let a = left.to_number_primitive();
    let b = right.to_number_primitive();
    a.partial_cmp(&b)
}

pub(crate) fn binary(heap: &Heap, op: BinaryOp, left: &Value, right: &Value) -> RunResult<Value> {
    Ok(match op {
        BinaryOp::Add => {
            let left = heap.to_primitive(left, true);
            let right = heap.to_primitive(right, true);
            match (&left, &right) {
                (Value::Str(_), _) | (_, Value::Str(_)) => {
                    Value::Str(format!("{}{}", left.to_string_primitive(), right.to_string_primitive()))
                }
                _ => Value::Number(left.to_number_primitive() + right.to_number_primitive()),
            }
        }
        BinaryOp::Sub => Value::Number(heap.to_number(left) - heap.to_number(right)),
        BinaryOp::Mul => Value::Number(heap.to_number(left) * heap.to_number(right)),
        BinaryOp::Div => Value::Number(heap.to_number(left) / heap.to_number(right)),
        BinaryOp::Mod => Value::Number(heap.to_number(left) % heap.to_number(right)),
        BinaryOp::Shl => Value::Number(f64::from(to_int32(heap.to_number(left)) << (to_uint32(heap.to_number(right)) & 31))),
        BinaryOp::Shr => Value::Number(f64::from(to_int32(heap.to_number(left)) >> (to_uint32(heap.to_number(right)) & 31))),
        BinaryOp::UShr => Value::Number(f64::from(to_uint32(heap.to_number(left)) >> (to_uint32(heap.to_number(right)) & 31))),
        BinaryOp::BitAnd => Value::Number(f64::from(to_int32(heap.to_number(left)) & to_int32(heap.to_number(right)))),
        BinaryOp::BitOr => Value::Number(f64::from(to_int32(heap.to_number(left)) | to_int32(heap.to_number(right)))),
        BinaryOp::BitXor => Value::Number(f64::from(to_int32(heap.to_number(left)) ^ to_int32(heap.to_number(right)))),
        BinaryOp::EqEq => Value::Bool(abstract_equals(heap, left, right)),
        BinaryOp::NotEq => Value::Bool(!abstract_equals(heap, left, right)),
        BinaryOp::StrictEq => Value::Bool(left.strict_equals(right)),
        BinaryOp::StrictNotEq => Value::Bool(!left.strict_equals(right)),
        BinaryOp::Lt => Value::Bool(compare(heap, left, right) == Some(std::cmp::Ordering::Less)),
        BinaryOp::Gt => Value::Bool(compare(heap, left, right) == Some(std::cmp::Ordering::Greater)),
        BinaryOp::LtEq => Value::Bool(matches!(
            compare(heap, left, right),
            Some(std::cmp::Ordering::Less | std::cmp::Ordering::Equal)
        )),
        BinaryOp::GtEq => Value::Bool(matches!(
            compare(heap, left, right),
            Some(std::cmp::Ordering::Greater | std::cmp::Ordering::Equal)
        )),
        BinaryOp::In => {
            let Value::Ref(id) = right else {
                return Err(RunError::throw(
                    ErrorKind::TypeError,
                    "Cannot use 'in' operator on a non-object",
                ));
            };
            Value::Bool(heap.has_prop(*id, &heap.to_js_string(left)))
        }
        BinaryOp::Instanceof => {
            let Value::Ref(func) = right else {
                return Err(RunError::throw(ErrorKind::TypeError, "Right-hand side of 'instanceof' is not callable"));
            };
            if !heap.get(*func).is_function() {
                return Err(RunError::throw(ErrorKind::TypeError, "Right-hand side of 'instanceof' is not callable"));
            }
            let prototype = match heap.get_prop(*func, "prototype") {
                PropGet::Value(Value::Ref(p)) => p,
                _ => {
                    return Err(RunError::throw(
                        ErrorKind::TypeError,
                        "Function has non-object prototype in instanceof check",
                    ));
                }
            };
            match left {
                Value::Ref(id) => Value::Bool(heap.proto_chain_contains(*id, prototype)),
                _ => Value::Bool(false),
            }
        }
    })
}

/// The value-producing prefix operators (`delete` and `typeof` resolve
/// references and are handled by the evaluator itself).
pub(crate) fn unary(heap: &Heap, op: UnaryOp, operand: &Value) -> Value {
    match op {
        UnaryOp::Minus => Value::Number(-heap.to_number(operand)),
        UnaryOp::Plus => Value::Number(heap.to_number(operand)),
        UnaryOp::Not => Value::Bool(!operand.to_boolean()),
        UnaryOp::BitNot => Value::Number(f64::from(!to_int32(heap.to_number(operand)))),
        UnaryOp::Void => Value::Undefined,
        UnaryOp::Typeof | UnaryOp::Delete => unreachable!("resolved by the evaluator"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heap() -> Heap {
        Heap::new()
    }

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn addition_concatenates_with_strings() {
        let h = heap();
        let out = binary(&h, BinaryOp::Add, &num(1.0), &Value::str("2")).unwrap();
        assert!(matches!(out, Value::Str(s) if s == "12"));
        let out = binary(&h, BinaryOp::Add, &num(1.0), &num(2.0)).unwrap();
        assert!(matches!(out, Value::Number(n) if n == 3.0));
    }

    #[test]
    fn abstract_equality_ladder() {
        let h = heap();
        assert!(abstract_equals(&h, &Value::Null, &Value::Undefined));
        assert!(abstract_equals(&h, &num(1.0), &Value::str("1")));
        assert!(abstract_equals(&h, &Value::Bool(true), &num(1.0)));
        assert!(!abstract_equals(&h, &Value::Null, &num(0.0)));
        assert!(!abstract_equals(&h, &num(f64::NAN), &num(f64::NAN)));
    }

    #[test]
    fn bitwise_coercion() {
        let h = heap();
        let out = binary(&h, BinaryOp::UShr, &num(-1.0), &num(0.0)).unwrap();
        assert!(matches!(out, Value::Number(n) if n == 4_294_967_295.0));
        let out = binary(&h, BinaryOp::Shl, &num(1.0), &num(33.0)).unwrap();
        assert!(matches!(out, Value::Number(n) if n == 2.0));
    }

    #[test]
    fn relational_nan_is_false() {
        let h = heap();
        for op in [BinaryOp::Lt, BinaryOp::Gt, BinaryOp::LtEq, BinaryOp::GtEq] {
            let out = binary(&h, op, &num(f64::NAN), &num(1.0)).unwrap();
            assert!(matches!(out, Value::Bool(false)));
        }
    }

    #[test]
    fn string_relational_uses_code_order() {
        let h = heap();
        let out = binary(&h, BinaryOp::Lt, &Value::str("a"), &Value::str("b")).unwrap();
        assert!(matches!(out, Value::Bool(true)));
        // Mixed types compare numerically.
        let out = binary(&h, BinaryOp::Lt, &Value::str("10"), &num(9.0)).unwrap();
        assert!(matches!(out, Value::Bool(false)));
    }
}
