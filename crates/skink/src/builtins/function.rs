use ahash::AHashSet;

use crate::{
    builtins::NativeCtx,
    error::{ErrorKind, RunError, RunResult},
    value::Value,
};

pub(crate) fn to_string(ctx: &mut NativeCtx<'_>, this: &Value) -> RunResult<Value> {
    match this {
        Value::Ref(id) if ctx.heap.get(*id).is_function() => {
            let mut visited = AHashSet::new();
            Ok(Value::str(ctx.heap.object_to_string(*id, &mut visited)))
        }
        _ => Err(RunError::throw(
            ErrorKind::TypeError,
            "Function.prototype.toString requires that 'this' be a Function",
        )),
    }
}
