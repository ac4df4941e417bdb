use ahash::AHashSet;

use crate::{
    builtins::NativeCtx,
    error::{ErrorKind, RunError, RunResult},
    value::Value,
};

/// Error constructors work identically with and without `new`: they build
/// a fresh instance chained to the kind's prototype.
pub(crate) fn construct(ctx: &mut NativeCtx<'_>, kind: ErrorKind, args: &[Value]) -> RunResult<Value> {
    let message = match ctx.arg(args, 0) {
        Value::Undefined => None,
        other => Some(ctx.heap.to_js_string(other)),
    };
    let id = ctx.realm.create_error(ctx.heap, kind, message.as_deref().unwrap_or(""));
    Ok(Value::Ref(id))
}

pub(crate) fn to_string(ctx: &mut NativeCtx<'_>, this: &Value) -> RunResult<Value> {
    match this {
        Value::Ref(id) => {
            let mut visited = AHashSet::new();
            Ok(Value::str(ctx.heap.object_to_string(*id, &mut visited)))
        }
        _ => Err(RunError::throw(
            ErrorKind::TypeError,
            "Error.prototype.toString called on non-object",
        )),
    }
}
