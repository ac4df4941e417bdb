use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{builtins::NativeCtx, error::RunResult, value::Value};

/// Every `Math` method; dispatch stays in one table so the function objects
/// carry plain enum data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum MathFn {
    Abs,
    Acos,
    Asin,
    Atan,
    Atan2,
    Ceil,
    Cos,
    Exp,
    Floor,
    Log,
    Max,
    Min,
    Pow,
    Random,
    Round,
    Sin,
    Sqrt,
    Tan,
}

impl MathFn {
    pub(crate) const ALL: [Self; 18] = [
        Self::Abs,
        Self::Acos,
        Self::Asin,
        Self::Atan,
        Self::Atan2,
        Self::Ceil,
        Self::Cos,
        Self::Exp,
        Self::Floor,
        Self::Log,
        Self::Max,
        Self::Min,
        Self::Pow,
        Self::Random,
        Self::Round,
        Self::Sin,
        Self::Sqrt,
        Self::Tan,
    ];

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Abs => "abs",
            Self::Acos => "acos",
            Self::Asin => "asin",
            Self::Atan => "atan",
            Self::Atan2 => "atan2",
            Self::Ceil => "ceil",
            Self::Cos => "cos",
            Self::Exp => "exp",
            Self::Floor => "floor",
            Self::Log => "log",
            Self::Max => "max",
            Self::Min => "min",
            Self::Pow => "pow",
            Self::Random => "random",
            Self::Round => "round",
            Self::Sin => "sin",
            Self::Sqrt => "sqrt",
            Self::Tan => "tan",
        }
    }

    pub(crate) fn arity(self) -> u32 {
        match self {
            Self::Random => 0,
            Self::Atan2 | Self::Pow | Self::Max | Self::Min => 2,
            _ => 1,
        }
    }
}

pub(crate) fn call(ctx: &mut NativeCtx<'_>, f: MathFn, args: &[Value]) -> RunResult<Value> {
    let x = ctx.arg_number(args, 0);
    let result = match f {
        MathFn::Abs => x.abs(),
        MathFn::Acos => x.acos(),
        MathFn::Asin => x.asin(),
        MathFn::Atan => x.atan(),
        MathFn::Atan2 => x.atan2(ctx.arg_number(args, 1)),
        MathFn::Ceil => x.ceil(),
        MathFn::Cos => x.cos(),
        MathFn::Exp => x.exp(),
        MathFn::Floor => x.floor(),
        MathFn::Log => x.ln(),
        MathFn::Max | MathFn::Min => {
            let max = f == MathFn::Max;
            let mut acc = if max { f64::NEG_INFINITY } else { f64::INFINITY };
            for arg in args {
                let n = ctx.heap.to_number(arg);
                if n.is_nan() {
                    acc = f64::NAN;
                    break;
                }
                acc = if max { acc.max(n) } else { acc.min(n) };
            }
            acc
        }
        MathFn::Pow => x.powf(ctx.arg_number(args, 1)),
        MathFn::Random => ctx.rng.r#gen::<f64>(),
        // ES rounds .5 towards +Infinity, unlike f64::round.
        MathFn::Round => (x + 0.5).floor(),
        MathFn::Sin => x.sin(),
        MathFn::Sqrt => x.sqrt(),
        MathFn::Tan => x.tan(),
    };
    Ok(Value::Number(result))
}
