use ahash::AHashSet;

use crate::{
    builtins::{NativeCtx, NativeFunc},
    error::{ErrorKind, RunError, RunResult},
    heap::{JsClass, JsObject, ObjectId, PropDescriptor, PropGet},
    value::Value,
};

/// Coerces `this` to an object id, the common prelude of the prototype
/// methods.
pub(crate) fn this_object(ctx: &mut NativeCtx<'_>, this: &Value, who: &str) -> RunResult<ObjectId> {
    match this {
        Value::Ref(id) => Ok(*id),
        Value::Undefined | Value::Null => Err(RunError::throw(
            ErrorKind::TypeError,
            format!("{who} called on null or undefined"),
        )),
        primitive => ctx
            .realm
            .box_primitive(ctx.heap, primitive)
            .ok_or_else(|| RunError::throw(ErrorKind::TypeError, format!("{who} called on a primitive"))),
    }
}

fn expect_object(value: &Value, message: &str) -> RunResult<ObjectId> {
    match value {
        Value::Ref(id) => Ok(*id),
        _ => Err(RunError::throw(ErrorKind::TypeError, message)),
    }
}

/// Reads a `{value, writable, get, set, enumerable, configurable}` guest
/// object into a descriptor.
pub(crate) fn read_descriptor(ctx: &NativeCtx<'_>, value: &Value) -> RunResult<PropDescriptor> {
    let id = expect_object(value, "Property description must be an object")?;
    let mut descriptor = PropDescriptor::default();
    let fetch = |name: &str| match ctx.heap.get_prop(id, name) {
        PropGet::Value(v) => v,
        PropGet::Getter(_) => Value::Undefined,
    };
    if ctx.heap.has_prop(id, "value") {
        descriptor.value = Some(fetch("value"));
    }
    if ctx.heap.has_prop(id, "writable") {
        descriptor.writable = Some(fetch("writable").to_boolean());
    }
    if ctx.heap.has_prop(id, "enumerable") {
        descriptor.enumerable = Some(fetch("enumerable").to_boolean());
    }
    if ctx.heap.has_prop(id, "configurable") {
        descriptor.configurable = Some(fetch("configurable").to_boolean());
    }
    if ctx.heap.has_prop(id, "get") {
        descriptor.get = Some(fetch("get"));
    }
    if ctx.heap.has_prop(id, "set") {
        descriptor.set = Some(fetch("set"));
    }
    Ok(descriptor)
}

fn keys_to_array(ctx: &mut NativeCtx<'_>, keys: Vec<String>) -> RunResult<Value> {
    let array = ctx.realm.create_array(ctx.heap);
    for (index, key) in keys.into_iter().enumerate() {
        ctx.heap.set_prop(array, &index.to_string(), Value::Str(key))?;
    }
    Ok(Value::Ref(array))
}

pub(crate) fn call(ctx: &mut NativeCtx<'_>, func: NativeFunc, this: &Value, args: &[Value]) -> RunResult<Value> {
    Ok(match func {
        NativeFunc::ObjectCtor => match ctx.arg(args, 0) {
            Value::Undefined | Value::Null => Value::Ref(ctx.realm.create_plain_object(ctx.heap)),
            Value::Ref(id) => Value::Ref(*id),
            primitive => {
                let primitive = primitive.clone();
                Value::Ref(
                    ctx.realm
                        .box_primitive(ctx.heap, &primitive)
                        .expect("non-object primitives box"),
                )
            }
        },
        NativeFunc::ObjectGetPrototypeOf => {
            let id = expect_object(ctx.arg(args, 0), "Object.getPrototypeOf called on non-object")?;
            match ctx.heap.get(id).proto {
                Some(proto) => Value::Ref(proto),
                None => Value::Null,
            }
        }
        NativeFunc::ObjectCreate => {
            let proto = match ctx.arg(args, 0) {
                Value::Ref(id) => Some(*id),
                Value::Null => None,
                _ => {
                    return Err(RunError::throw(
                        ErrorKind::TypeError,
                        "Object prototype may only be an Object or null",
                    ));
                }
            };
            let id = ctx.heap.alloc(JsObject::new(None, JsClass::Object));
            // Routed through set_proto so the acyclic-chain invariant has a
            // single enforcement point.
            ctx.heap.set_proto(id, proto)?;
            Value::Ref(id)
        }
        NativeFunc::ObjectDefineProperty => {
            let id = expect_object(ctx.arg(args, 0), "Object.defineProperty called on non-object")?;
            let name = ctx.arg_string(args, 1);
            let descriptor = read_descriptor(ctx, ctx.arg(args, 2))?;
            ctx.heap.define_prop(id, &name, &descriptor)?;
            Value::Ref(id)
        }
        NativeFunc::ObjectGetOwnPropertyDescriptor => {
            let id = expect_object(ctx.arg(args, 0), "Object.getOwnPropertyDescriptor called on non-object")?;
            let name = ctx.arg_string(args, 1);
            let object = ctx.heap.get(id);
            let Some(prop) = object.properties.get(&name) else {
                return Ok(Value::Undefined);
            };
            let prop = prop.clone();
            let getter = object.getter.get(&name).copied();
            let setter = object.setter.get(&name).copied();
            let out = ctx.realm.create_plain_object(ctx.heap);
            if getter.is_some() || setter.is_some() {
                ctx.heap
                    .set_prop(out, "get", getter.map_or(Value::Undefined, Value::Ref))?;
                ctx.heap
                    .set_prop(out, "set", setter.map_or(Value::Undefined, Value::Ref))?;
            } else {
                ctx.heap.set_prop(out, "value", prop.value)?;
                ctx.heap.set_prop(out, "writable", Value::Bool(prop.writable))?;
            }
            ctx.heap.set_prop(out, "enumerable", Value::Bool(prop.enumerable))?;
            ctx.heap.set_prop(out, "configurable", Value::Bool(prop.configurable))?;
            Value::Ref(out)
        }
        NativeFunc::ObjectGetOwnPropertyNames => {
            let id = expect_object(ctx.arg(args, 0), "Object.getOwnPropertyNames called on non-object")?;
            let keys = ctx.heap.own_keys(id);
            keys_to_array(ctx, keys)?
        }
        NativeFunc::ObjectKeys => {
            let id = expect_object(ctx.arg(args, 0), "Object.keys called on non-object")?;
            let keys = ctx.heap.own_enumerable_keys(id);
            keys_to_array(ctx, keys)?
        }
        NativeFunc::ObjectPreventExtensions => {
            let id = expect_object(ctx.arg(args, 0), "Object.preventExtensions called on non-object")?;
            ctx.heap.get_mut(id).prevent_extensions = true;
            Value::Ref(id)
        }
        NativeFunc::ObjectIsExtensible => {
            let id = expect_object(ctx.arg(args, 0), "Object.isExtensible called on non-object")?;
            Value::Bool(!ctx.heap.get(id).prevent_extensions)
        }
        NativeFunc::ObjectFreeze | NativeFunc::ObjectSeal => {
            let id = expect_object(ctx.arg(args, 0), "Object.freeze called on non-object")?;
            let freeze = func == NativeFunc::ObjectFreeze;
            let object = ctx.heap.get_mut(id);
            object.prevent_extensions = true;
            for (name, prop) in &mut object.properties {
                prop.configurable = false;
                if freeze && !object.getter.contains_key(name) && !object.setter.contains_key(name) {
                    prop.writable = false;
                }
            }
            Value::Ref(id)
        }
        NativeFunc::ObjectIsFrozen | NativeFunc::ObjectIsSealed => {
            let id = expect_object(ctx.arg(args, 0), "Object.isFrozen called on non-object")?;
            let frozen = func == NativeFunc::ObjectIsFrozen;
            let object = ctx.heap.get(id);
            let sealed = object.prevent_extensions
                && object.properties.iter().all(|(name, prop)| {
                    let accessor = object.getter.contains_key(name) || object.setter.contains_key(name);
                    !prop.configurable && (!frozen || accessor || !prop.writable)
                });
            Value::Bool(sealed)
        }
        NativeFunc::ObjectToString => match this {
            Value::Undefined => Value::str("[object Undefined]"),
            Value::Null => Value::str("[object Null]"),
            Value::Ref(id) => Value::str(format!("[object {}]", ctx.heap.get(*id).class.as_str())),
            primitive => {
                let class = match primitive {
                    Value::Bool(_) => "Boolean",
                    Value::Number(_) => "Number",
                    _ => "String",
                };
                Value::str(format!("[object {class}]"))
            }
        },
        NativeFunc::ObjectToLocaleString => {
            let id = this_object(ctx, this, "Object.prototype.toLocaleString")?;
            let mut visited = AHashSet::new();
            Value::str(ctx.heap.object_to_string(id, &mut visited))
        }
        NativeFunc::ObjectValueOf => match this {
            Value::Ref(_) => this.clone(),
            Value::Undefined | Value::Null => {
                return Err(RunError::throw(
                    ErrorKind::TypeError,
                    "Object.prototype.valueOf called on null or undefined",
                ));
            }
            primitive => {
                let primitive = primitive.clone();
                Value::Ref(
                    ctx.realm
                        .box_primitive(ctx.heap, &primitive)
                        .expect("non-object primitives box"),
                )
            }
        },
        NativeFunc::ObjectHasOwnProperty => {
            let id = this_object(ctx, this, "Object.prototype.hasOwnProperty")?;
            let name = ctx.arg_string(args, 0);
            Value::Bool(ctx.heap.has_own_prop(id, &name))
        }
        NativeFunc::ObjectIsPrototypeOf => {
            let Value::Ref(candidate) = ctx.arg(args, 0) else {
                return Ok(Value::Bool(false));
            };
            let candidate = *candidate;
            let id = this_object(ctx, this, "Object.prototype.isPrototypeOf")?;
            Value::Bool(ctx.heap.proto_chain_contains(candidate, id))
        }
        NativeFunc::ObjectPropertyIsEnumerable => {
            let id = this_object(ctx, this, "Object.prototype.propertyIsEnumerable")?;
            let name = ctx.arg_string(args, 0);
            Value::Bool(
                ctx.heap
                    .get(id)
                    .properties
                    .get(&name)
                    .is_some_and(|prop| prop.enumerable),
            )
        }
        other => unreachable!("not an Object builtin: {other:?}"),
    })
}
