pub(crate) mod array;
pub(crate) mod date;
pub(crate) mod error;
pub(crate) mod function;
pub(crate) mod global;
pub(crate) mod json;
pub(crate) mod math;
pub(crate) mod number;
pub(crate) mod object;
pub(crate) mod polyfill;
pub(crate) mod regexp;
pub(crate) mod string;

use ahash::AHashMap;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ErrorKind, RunResult},
    heap::{FuncKind, Heap, InternalData, JsClass, JsObject, ObjectId, Prop, array_length_prop},
    value::Value,
};

pub(crate) use date::{DateField, DateStringKind};
pub(crate) use math::MathFn;

/// Every built-in function, one variant per method.
///
/// Function objects carry their variant in `FuncKind::Native`; invocation
/// dispatches through `call_native`. Keeping builtins as enum data (rather
/// than function pointers) is what lets the whole heap serialize.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub(crate) enum NativeFunc {
    // globals
    ParseInt,
    ParseFloat,
    IsNaN,
    IsFinite,
    /// Handled by the evaluator: direct eval needs the caller's scope.
    Eval,
    DecodeUri,
    DecodeUriComponent,
    EncodeUri,
    EncodeUriComponent,

    // Object
    ObjectCtor,
    ObjectGetPrototypeOf,
    ObjectCreate,
    ObjectDefineProperty,
    ObjectGetOwnPropertyDescriptor,
    ObjectGetOwnPropertyNames,
    ObjectKeys,
    ObjectPreventExtensions,
    ObjectIsExtensible,
    ObjectFreeze,
    ObjectIsFrozen,
    ObjectSeal,
    ObjectIsSealed,
    ObjectToString,
    ObjectToLocaleString,
    ObjectValueOf,
    ObjectHasOwnProperty,
    ObjectIsPrototypeOf,
    ObjectPropertyIsEnumerable,

    // Function
    /// Handled by the evaluator: compiles source into a guest function.
    FunctionCtor,
    /// Handled by the evaluator: re-dispatches the call machinery.
    FunctionApply,
    /// Handled by the evaluator: re-dispatches the call machinery.
    FunctionCall,
    FunctionToString,
    /// `Function.prototype` itself is callable and returns undefined.
    FunctionProtoNoop,

    // Array
    ArrayCtor,
    ArrayIsArray,
    ArrayConcat,
    ArrayIndexOf,
    ArrayJoin,
    ArrayLastIndexOf,
    ArrayPop,
    ArrayPush,
    ArrayReverse,
    ArrayShift,
    ArraySlice,
    ArraySplice,
    ArrayUnshift,
    /// Default (comparator-free) sort; the comparator path is a polyfill.
    ArraySort,
    ArrayToString,

    // String
    StringCtor,
    StringFromCharCode,
    StringCharAt,
    StringCharCodeAt,
    StringConcat,
    StringIndexOf,
    StringLastIndexOf,
    StringLocaleCompare,
    StringMatch,
    StringReplace,
    StringSearch,
    StringSlice,
    StringSplit,
    StringSubstr,
    StringSubstring,
    StringToLowerCase,
    StringToUpperCase,
    StringTrim,
    StringToString,

    // Boolean
    BooleanCtor,
    BooleanToString,
    BooleanValueOf,

    // Number
    NumberCtor,
    NumberToExponential,
    NumberToFixed,
    NumberToPrecision,
    NumberToString,
    NumberValueOf,

    // Date
    DateCtor,
    DateNow,
    DateParse,
    DateUtc,
    DateGet { field: DateField, utc: bool },
    DateSet { field: DateField, utc: bool },
    DateToString(DateStringKind),
    DateValueOf,
    DateSetTime,
    DateGetTimezoneOffset,

    // Math
    Math(MathFn),

    // RegExp
    RegexpCtor,
    RegexpExec,
    RegexpTest,
    RegexpToString,

    // Error family
    ErrorCtor(ErrorKind),
    ErrorToString,

    // JSON
    JsonParse,
    JsonStringify,
}

impl NativeFunc {
    /// The function's `name` and `length` properties.
    pub(crate) fn info(self) -> (&'static str, u32) {
        match self {
            Self::ParseInt => ("parseInt", 2),
            Self::ParseFloat => ("parseFloat", 1),
            Self::IsNaN => ("isNaN", 1),
            Self::IsFinite => ("isFinite", 1),
            Self::Eval => ("eval", 1),
            Self::DecodeUri => ("decodeURI", 1),
            Self::DecodeUriComponent => ("decodeURIComponent", 1),
            Self::EncodeUri => ("encodeURI", 1),
            Self::EncodeUriComponent => ("encodeURIComponent", 1),

            Self::ObjectCtor => ("Object", 1),
            Self::ObjectGetPrototypeOf => ("getPrototypeOf", 1),
            Self::ObjectCreate => ("create", 2),
            Self::ObjectDefineProperty => ("defineProperty", 3),
            Self::ObjectGetOwnPropertyDescriptor => ("getOwnPropertyDescriptor", 2),
            Self::ObjectGetOwnPropertyNames => ("getOwnPropertyNames", 1),
            Self::ObjectKeys => ("keys", 1),
            Self::ObjectPreventExtensions => ("preventExtensions", 1),
            Self::ObjectIsExtensible => ("isExtensible", 1),
            Self::ObjectFreeze => ("freeze", 1),
            Self::ObjectIsFrozen => ("isFrozen", 1),
            Self::ObjectSeal => ("seal", 1),
            Self::ObjectIsSealed => ("isSealed", 1),
            Self::ObjectToString => ("toString", 0),
            Self::ObjectToLocaleString => ("toLocaleString", 0),
            Self::ObjectValueOf => ("valueOf", 0),
            Self::ObjectHasOwnProperty => ("hasOwnProperty", 1),
            Self::ObjectIsPrototypeOf => ("isPrototypeOf", 1),
            Self::ObjectPropertyIsEnumerable => ("propertyIsEnumerable", 1),

            Self::FunctionCtor => ("Function", 1),
            Self::FunctionApply => ("apply", 2),
            Self::FunctionCall => ("call", 1),
            Self::FunctionToString => ("toString", 0),
            Self::FunctionProtoNoop => ("", 0),

            Self::ArrayCtor => ("Array", 1),
            Self::ArrayIsArray => ("isArray", 1),
            Self::ArrayConcat => ("concat", 1),
            Self::ArrayIndexOf => ("indexOf", 1),
            Self::ArrayJoin => ("join", 1),
            Self::ArrayLastIndexOf => ("lastIndexOf", 1),
            Self::ArrayPop => ("pop", 0),
            Self::ArrayPush => ("push", 1),
            Self::ArrayReverse => ("reverse", 0),
            Self::ArrayShift => ("shift", 0),
            Self::ArraySlice => ("slice", 2),
            Self::ArraySplice => ("splice", 2),
            Self::ArrayUnshift => ("unshift", 1),
            Self::ArraySort => ("sort", 1),
            Self::ArrayToString => ("toString", 0),

            Self::StringCtor => ("String", 1),
            Self::StringFromCharCode => ("fromCharCode", 1),
            Self::StringCharAt => ("charAt", 1),
            Self::StringCharCodeAt => ("charCodeAt", 1),
            Self::StringConcat => ("concat", 1),
            Self::StringIndexOf => ("indexOf", 1),
            Self::StringLastIndexOf => ("lastIndexOf", 1),
            Self::StringLocaleCompare => ("localeCompare", 1),
            Self::StringMatch => ("match", 1),
            Self::StringReplace => ("replace", 2),
            Self::StringSearch => ("search", 1),
            Self::StringSlice => ("slice", 2),
            Self::StringSplit => ("split", 2),
            Self::StringSubstr => ("substr", 2),
            Self::StringSubstring => ("substring", 2),
            Self::StringToLowerCase => ("toLowerCase", 0),
            Self::StringToUpperCase => ("toUpperCase", 0),
            Self::StringTrim => ("trim", 0),
            Self::StringToString => ("toString", 0),

            Self::BooleanCtor => ("Boolean", 1),
            Self::BooleanToString => ("toString", 0),
            Self::BooleanValueOf => ("valueOf", 0),

            Self::NumberCtor => ("Number", 1),
            Self::NumberToExponential => ("toExponential", 1),
            Self::NumberToFixed => ("toFixed", 1),
            Self::NumberToPrecision => ("toPrecision", 1),
            Self::NumberToString => ("toString", 1),
            Self::NumberValueOf => ("valueOf", 0),

            Self::DateCtor => ("Date", 7),
            Self::DateNow => ("now", 0),
            Self::DateParse => ("parse", 1),
            Self::DateUtc => ("UTC", 7),
            Self::DateGet { field, utc } => (field.getter_name(utc), 0),
            Self::DateSet { field, utc } => (field.setter_name(utc), field.setter_length()),
            Self::DateToString(kind) => (kind.name(), 0),
            Self::DateValueOf => ("valueOf", 0),
            Self::DateSetTime => ("setTime", 1),
            Self::DateGetTimezoneOffset => ("getTimezoneOffset", 0),

            Self::Math(f) => (f.name(), f.arity()),

            Self::RegexpCtor => ("RegExp", 2),
            Self::RegexpExec => ("exec", 1),
            Self::RegexpTest => ("test", 1),
            Self::RegexpToString => ("toString", 0),

            Self::ErrorCtor(kind) => (kind.into(), 1),
            Self::ErrorToString => ("toString", 0),

            Self::JsonParse => ("parse", 2),
            Self::JsonStringify => ("stringify", 3),
        }
    }

    /// Whether `new` may be applied to this builtin.
    pub(crate) fn is_constructor(self) -> bool {
        matches!(
            self,
            Self::ObjectCtor
                | Self::FunctionCtor
                | Self::ArrayCtor
                | Self::StringCtor
                | Self::BooleanCtor
                | Self::NumberCtor
                | Self::DateCtor
                | Self::RegexpCtor
                | Self::ErrorCtor(_)
        )
    }
}

/// Ids of the bootstrapped built-in objects.
///
/// Everything the evaluator needs to box primitives, build literals, and
/// raise guest errors lives here; only ids, so the realm serializes with
/// the rest of the interpreter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Realm {
    pub global_object: ObjectId,
    pub object_proto: ObjectId,
    pub function_proto: ObjectId,
    pub array_proto: ObjectId,
    pub string_proto: ObjectId,
    pub boolean_proto: ObjectId,
    pub number_proto: ObjectId,
    pub date_proto: ObjectId,
    pub regexp_proto: ObjectId,
    pub error_protos: AHashMap<ErrorKind, ObjectId>,
}

impl Realm {
    pub(crate) fn error_proto(&self, kind: ErrorKind) -> ObjectId {
        self.error_protos[&kind]
    }

    /// Builds a guest Error instance with `name` inherited from its proto
    /// and an own non-enumerable `message`.
    pub(crate) fn create_error(&self, heap: &mut Heap, kind: ErrorKind, message: &str) -> ObjectId {
        let id = heap.alloc(JsObject::new(Some(self.error_proto(kind)), JsClass::Error));
        if !message.is_empty() {
            heap.get_mut(id)
                .properties
                .insert("message".to_string(), Prop::builtin(Value::str(message)));
        }
        id
    }

    pub(crate) fn create_array(&self, heap: &mut Heap) -> ObjectId {
        let id = heap.alloc(JsObject::new(Some(self.array_proto), JsClass::Array));
        heap.get_mut(id)
            .properties
            .insert("length".to_string(), array_length_prop(0));
        id
    }

    pub(crate) fn create_plain_object(&self, heap: &mut Heap) -> ObjectId {
        heap.alloc(JsObject::new(Some(self.object_proto), JsClass::Object))
    }

    /// Boxes a primitive for `this`-binding in non-strict calls.
    pub(crate) fn box_primitive(&self, heap: &mut Heap, value: &Value) -> Option<ObjectId> {
        let (proto, class) = match value {
            Value::Bool(_) => (self.boolean_proto, JsClass::Boolean),
            Value::Number(_) => (self.number_proto, JsClass::Number),
            Value::Str(_) => (self.string_proto, JsClass::String),
            _ => return None,
        };
        let id = heap.alloc(JsObject::new(Some(proto), class));
        heap.get_mut(id).data = Some(InternalData::Boxed(value.clone()));
        Some(id)
    }

    /// The prototype primitive property lookups start from.
    pub(crate) fn primitive_proto(&self, value: &Value) -> Option<ObjectId> {
        match value {
            Value::Bool(_) => Some(self.boolean_proto),
            Value::Number(_) => Some(self.number_proto),
            Value::Str(_) => Some(self.string_proto),
            _ => None,
        }
    }
}

/// Heap/realm context handed to native implementations.
pub(crate) struct NativeCtx<'a> {
    pub heap: &'a mut Heap,
    pub realm: &'a Realm,
    pub rng: &'a mut ChaCha8Rng,
}

/// Shared fallback for absent arguments.
static UNDEFINED: Value = Value::Undefined;

impl NativeCtx<'_> {
    pub(crate) fn arg<'v>(&self, args: &'v [Value], index: usize) -> &'v Value {
        args.get(index).unwrap_or(&UNDEFINED)
    }

    pub(crate) fn arg_number(&self, args: &[Value], index: usize) -> f64 {
        self.heap.to_number(self.arg(args, index))
    }

    pub(crate) fn arg_string(&self, args: &[Value], index: usize) -> String {
        self.heap.to_js_string(self.arg(args, index))
    }
}

/// Dispatches a built-in call. The evaluator intercepts the handful of
/// variants that need its machinery (eval, Function, call/apply) before
/// ever reaching this table. `construct` distinguishes `new String(x)`
/// (boxing) from `String(x)` (conversion) and friends.
pub(crate) fn call_native(
    ctx: &mut NativeCtx<'_>,
    func: NativeFunc,
    this: &Value,
    args: &[Value],
    construct: bool,
) -> RunResult<Value> {
    use NativeFunc as N;
    match func {
        N::ParseInt
        | N::ParseFloat
        | N::IsNaN
        | N::IsFinite
        | N::DecodeUri
        | N::DecodeUriComponent
        | N::EncodeUri
        | N::EncodeUriComponent => global::call(ctx, func, args),
        N::Eval => unreachable!("eval is intercepted by the evaluator"),
        N::FunctionCtor | N::FunctionApply | N::FunctionCall => {
            unreachable!("function ctor/call/apply are intercepted by the evaluator")
        }
        N::FunctionProtoNoop => Ok(Value::Undefined),
        N::FunctionToString => function::to_string(ctx, this),

        N::ObjectCtor
        | N::ObjectGetPrototypeOf
        | N::ObjectCreate
        | N::ObjectDefineProperty
        | N::ObjectGetOwnPropertyDescriptor
        | N::ObjectGetOwnPropertyNames
        | N::ObjectKeys
        | N::ObjectPreventExtensions
        | N::ObjectIsExtensible
        | N::ObjectFreeze
        | N::ObjectIsFrozen
        | N::ObjectSeal
        | N::ObjectIsSealed
        | N::ObjectToString
        | N::ObjectToLocaleString
        | N::ObjectValueOf
        | N::ObjectHasOwnProperty
        | N::ObjectIsPrototypeOf
        | N::ObjectPropertyIsEnumerable => object::call(ctx, func, this, args),

        N::ArrayCtor
        | N::ArrayIsArray
        | N::ArrayConcat
        | N::ArrayIndexOf
        | N::ArrayJoin
        | N::ArrayLastIndexOf
        | N::ArrayPop
        | N::ArrayPush
        | N::ArrayReverse
        | N::ArrayShift
        | N::ArraySlice
        | N::ArraySplice
        | N::ArrayUnshift
        | N::ArraySort
        | N::ArrayToString => array::call(ctx, func, this, args),

        N::StringCtor
        | N::StringFromCharCode
        | N::StringCharAt
        | N::StringCharCodeAt
        | N::StringConcat
        | N::StringIndexOf
        | N::StringLastIndexOf
        | N::StringLocaleCompare
        | N::StringMatch
        | N::StringReplace
        | N::StringSearch
        | N::StringSlice
        | N::StringSplit
        | N::StringSubstr
        | N::StringSubstring
        | N::StringToLowerCase
        | N::StringToUpperCase
        | N::StringTrim
        | N::StringToString => string::call(ctx, func, this, args, construct),

        N::BooleanCtor | N::BooleanToString | N::BooleanValueOf => {
            number::call_boolean(ctx, func, this, args, construct)
        }
        N::NumberCtor
        | N::NumberToExponential
        | N::NumberToFixed
        | N::NumberToPrecision
        | N::NumberToString
        | N::NumberValueOf => number::call(ctx, func, this, args, construct),

        N::DateCtor
        | N::DateNow
        | N::DateParse
        | N::DateUtc
        | N::DateGet { .. }
        | N::DateSet { .. }
        | N::DateToString(_)
        | N::DateValueOf
        | N::DateSetTime
        | N::DateGetTimezoneOffset => date::call(ctx, func, this, args, construct),

        N::Math(f) => math::call(ctx, f, args),

        N::RegexpCtor | N::RegexpExec | N::RegexpTest | N::RegexpToString => regexp::call(ctx, func, this, args),

        N::ErrorCtor(kind) => error::construct(ctx, kind, args),
        N::ErrorToString => error::to_string(ctx, this),

        N::JsonParse | N::JsonStringify => json::call(ctx, func, this, args),
    }
}

// === bootstrap ===

/// Allocates a native function object.
pub(crate) fn native_function(heap: &mut Heap, function_proto: ObjectId, func: NativeFunc) -> ObjectId {
    let (name, length) = func.info();
    let id = heap.alloc(JsObject::new(Some(function_proto), JsClass::Function));
    let object = heap.get_mut(id);
    object.func = Some(FuncKind::Native(func));
    object.properties.insert(
        "length".to_string(),
        Prop {
            value: Value::Number(f64::from(length)),
            writable: false,
            enumerable: false,
            configurable: false,
        },
    );
    object.properties.insert(
        "name".to_string(),
        Prop {
            value: Value::str(name),
            writable: false,
            enumerable: false,
            configurable: true,
        },
    );
    id
}

/// Installs a method as a non-enumerable property.
pub(crate) fn add_method(heap: &mut Heap, function_proto: ObjectId, target: ObjectId, func: NativeFunc) {
    let id = native_function(heap, function_proto, func);
    let (name, _) = func.info();
    heap.get_mut(target)
        .properties
        .insert(name.to_string(), Prop::builtin(Value::Ref(id)));
}

/// Installs a non-enumerable data property.
pub(crate) fn add_data(heap: &mut Heap, target: ObjectId, name: &str, value: Value) {
    heap.get_mut(target)
        .properties
        .insert(name.to_string(), Prop::builtin(value));
}

/// Installs a permanent value (e.g. `undefined`, `NaN`, prototype links).
fn add_frozen(heap: &mut Heap, target: ObjectId, name: &str, value: Value) {
    heap.get_mut(target).properties.insert(
        name.to_string(),
        Prop {
            value,
            writable: false,
            enumerable: false,
            configurable: false,
        },
    );
}

/// Creates a constructor function and wires the `prototype.constructor`
/// back-link.
fn constructor(heap: &mut Heap, function_proto: ObjectId, global: ObjectId, func: NativeFunc, proto: ObjectId) -> ObjectId {
    let ctor = native_function(heap, function_proto, func);
    add_frozen(heap, ctor, "prototype", Value::Ref(proto));
    add_data(heap, proto, "constructor", Value::Ref(ctor));
    let (name, _) = func.info();
    add_data(heap, global, name, Value::Ref(ctor));
    ctor
}

/// Builds the global scope's object population in the fixed bootstrap
/// order: Object/Function prototypes first, then every other family.
pub(crate) fn install(heap: &mut Heap) -> Realm {
    use NativeFunc as N;

    // Raw prototypes must exist before anything links to them.
    let object_proto = heap.alloc(JsObject::new(None, JsClass::Object));
    let function_proto = heap.alloc(JsObject::new(Some(object_proto), JsClass::Function));
    heap.get_mut(function_proto).func = Some(FuncKind::Native(N::FunctionProtoNoop));

    let global_object = heap.alloc(JsObject::new(Some(object_proto), JsClass::Global));

    // Function then Object, so `Object instanceof Function` holds.
    let _function_ctor = constructor(heap, function_proto, global_object, N::FunctionCtor, function_proto);
    for func in [N::FunctionApply, N::FunctionCall, N::FunctionToString] {
        add_method(heap, function_proto, function_proto, func);
    }

    let object_ctor = constructor(heap, function_proto, global_object, N::ObjectCtor, object_proto);
    for func in [
        N::ObjectGetPrototypeOf,
        N::ObjectCreate,
        N::ObjectDefineProperty,
        N::ObjectGetOwnPropertyDescriptor,
        N::ObjectGetOwnPropertyNames,
        N::ObjectKeys,
        N::ObjectPreventExtensions,
        N::ObjectIsExtensible,
        N::ObjectFreeze,
        N::ObjectIsFrozen,
        N::ObjectSeal,
        N::ObjectIsSealed,
    ] {
        add_method(heap, function_proto, object_ctor, func);
    }
    for func in [
        N::ObjectToString,
        N::ObjectToLocaleString,
        N::ObjectValueOf,
        N::ObjectHasOwnProperty,
        N::ObjectIsPrototypeOf,
        N::ObjectPropertyIsEnumerable,
    ] {
        add_method(heap, function_proto, object_proto, func);
    }

    // Array: its prototype is itself an (empty) array.
    let array_proto = heap.alloc(JsObject::new(Some(object_proto), JsClass::Array));
    heap.get_mut(array_proto)
        .properties
        .insert("length".to_string(), array_length_prop(0));
    let array_ctor = constructor(heap, function_proto, global_object, N::ArrayCtor, array_proto);
    add_method(heap, function_proto, array_ctor, N::ArrayIsArray);
    for func in [
        N::ArrayConcat,
        N::ArrayIndexOf,
        N::ArrayJoin,
        N::ArrayLastIndexOf,
        N::ArrayPop,
        N::ArrayPush,
        N::ArrayReverse,
        N::ArrayShift,
        N::ArraySlice,
        N::ArraySplice,
        N::ArrayUnshift,
        N::ArraySort,
        N::ArrayToString,
    ] {
        add_method(heap, function_proto, array_proto, func);
    }

    // String: prototype is a boxed empty string.
    let string_proto = heap.alloc(JsObject::new(Some(object_proto), JsClass::String));
    heap.get_mut(string_proto).data = Some(InternalData::Boxed(Value::str("")));
    let string_ctor = constructor(heap, function_proto, global_object, N::StringCtor, string_proto);
    add_method(heap, function_proto, string_ctor, N::StringFromCharCode);
    for func in [
        N::StringCharAt,
        N::StringCharCodeAt,
        N::StringConcat,
        N::StringIndexOf,
        N::StringLastIndexOf,
        N::StringLocaleCompare,
        N::StringMatch,
        N::StringReplace,
        N::StringSearch,
        N::StringSlice,
        N::StringSplit,
        N::StringSubstr,
        N::StringSubstring,
        N::StringToLowerCase,
        N::StringToUpperCase,
        N::StringTrim,
        N::StringToString,
    ] {
        add_method(heap, function_proto, string_proto, func);
    }
    // valueOf shares the toString implementation (both unbox).
    let value_of = native_function(heap, function_proto, N::StringToString);
    add_data(heap, string_proto, "valueOf", Value::Ref(value_of));

    // Boolean.
    let boolean_proto = heap.alloc(JsObject::new(Some(object_proto), JsClass::Boolean));
    heap.get_mut(boolean_proto).data = Some(InternalData::Boxed(Value::Bool(false)));
    constructor(heap, function_proto, global_object, N::BooleanCtor, boolean_proto);
    for func in [N::BooleanToString, N::BooleanValueOf] {
        add_method(heap, function_proto, boolean_proto, func);
    }

    // Number, with its constants.
    let number_proto = heap.alloc(JsObject::new(Some(object_proto), JsClass::Number));
    heap.get_mut(number_proto).data = Some(InternalData::Boxed(Value::Number(0.0)));
    let number_ctor = constructor(heap, function_proto, global_object, N::NumberCtor, number_proto);
    for (name, value) in [
        ("MAX_VALUE", f64::MAX),
        ("MIN_VALUE", f64::MIN_POSITIVE),
        ("NaN", f64::NAN),
        ("NEGATIVE_INFINITY", f64::NEG_INFINITY),
        ("POSITIVE_INFINITY", f64::INFINITY),
    ] {
        add_frozen(heap, number_ctor, name, Value::Number(value));
    }
    for func in [
        N::NumberToExponential,
        N::NumberToFixed,
        N::NumberToPrecision,
        N::NumberToString,
        N::NumberValueOf,
    ] {
        add_method(heap, function_proto, number_proto, func);
    }
    let number_locale = native_function(heap, function_proto, N::NumberToString);
    add_data(heap, number_proto, "toLocaleString", Value::Ref(number_locale));

    // Date.
    let date_proto = heap.alloc(JsObject::new(Some(object_proto), JsClass::Date));
    heap.get_mut(date_proto).data = Some(InternalData::Date(f64::NAN));
    let date_ctor = constructor(heap, function_proto, global_object, N::DateCtor, date_proto);
    for func in [N::DateNow, N::DateParse, N::DateUtc] {
        add_method(heap, function_proto, date_ctor, func);
    }
    for field in DateField::ALL {
        for utc in [false, true] {
            add_method(heap, function_proto, date_proto, N::DateGet { field, utc });
            if field != DateField::Day {
                add_method(heap, function_proto, date_proto, N::DateSet { field, utc });
            }
        }
    }
    for kind in DateStringKind::ALL {
        add_method(heap, function_proto, date_proto, N::DateToString(kind));
    }
    for func in [N::DateValueOf, N::DateSetTime, N::DateGetTimezoneOffset] {
        add_method(heap, function_proto, date_proto, func);
    }
    let get_time = native_function(heap, function_proto, N::DateValueOf);
    add_data(heap, date_proto, "getTime", Value::Ref(get_time));

    // RegExp.
    let regexp_proto = heap.alloc(JsObject::new(Some(object_proto), JsClass::Regexp));
    constructor(heap, function_proto, global_object, N::RegexpCtor, regexp_proto);
    for func in [N::RegexpExec, N::RegexpTest, N::RegexpToString] {
        add_method(heap, function_proto, regexp_proto, func);
    }

    // Error and its subclasses, from one factory.
    let error_proto = heap.alloc(JsObject::new(Some(object_proto), JsClass::Error));
    add_data(heap, error_proto, "name", Value::str("Error"));
    add_data(heap, error_proto, "message", Value::str(""));
    add_method(heap, function_proto, error_proto, N::ErrorToString);
    constructor(heap, function_proto, global_object, N::ErrorCtor(ErrorKind::Error), error_proto);
    let mut error_protos = AHashMap::new();
    error_protos.insert(ErrorKind::Error, error_proto);
    for kind in [
        ErrorKind::EvalError,
        ErrorKind::RangeError,
        ErrorKind::ReferenceError,
        ErrorKind::SyntaxError,
        ErrorKind::TypeError,
        ErrorKind::URIError,
    ] {
        let proto = heap.alloc(JsObject::new(Some(error_proto), JsClass::Error));
        let name: &'static str = kind.into();
        add_data(heap, proto, "name", Value::str(name));
        add_data(heap, proto, "message", Value::str(""));
        constructor(heap, function_proto, global_object, N::ErrorCtor(kind), proto);
        error_protos.insert(kind, proto);
    }

    // Math.
    let math = heap.alloc(JsObject::new(Some(object_proto), JsClass::Math));
    for (name, value) in [
        ("E", std::f64::consts::E),
        ("LN2", std::f64::consts::LN_2),
        ("LN10", std::f64::consts::LN_10),
        ("LOG2E", std::f64::consts::LOG2_E),
        ("LOG10E", std::f64::consts::LOG10_E),
        ("PI", std::f64::consts::PI),
        ("SQRT1_2", std::f64::consts::FRAC_1_SQRT_2),
        ("SQRT2", std::f64::consts::SQRT_2),
    ] {
        add_frozen(heap, math, name, Value::Number(value));
    }
    for f in MathFn::ALL {
        add_method(heap, function_proto, math, N::Math(f));
    }
    add_data(heap, global_object, "Math", Value::Ref(math));

    // JSON.
    let json = heap.alloc(JsObject::new(Some(object_proto), JsClass::Json));
    for func in [N::JsonParse, N::JsonStringify] {
        add_method(heap, function_proto, json, func);
    }
    add_data(heap, global_object, "JSON", Value::Ref(json));

    // Global values and functions.
    add_frozen(heap, global_object, "undefined", Value::Undefined);
    add_frozen(heap, global_object, "NaN", Value::Number(f64::NAN));
    add_frozen(heap, global_object, "Infinity", Value::Number(f64::INFINITY));
    for func in [
        N::ParseInt,
        N::ParseFloat,
        N::IsNaN,
        N::IsFinite,
        N::Eval,
        N::DecodeUri,
        N::DecodeUriComponent,
        N::EncodeUri,
        N::EncodeUriComponent,
    ] {
        add_method(heap, function_proto, global_object, func);
    }

    Realm {
        global_object,
        object_proto,
        function_proto,
        array_proto,
        string_proto,
        boolean_proto,
        number_proto,
        date_proto,
        regexp_proto,
        error_protos,
    }
}
