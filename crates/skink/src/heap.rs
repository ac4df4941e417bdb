use std::{cell::OnceCell, collections::BTreeMap};

use ahash::{AHashMap, AHashSet};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    ast::NodeId,
    builtins::NativeFunc,
    error::{ErrorKind, RunError, RunResult},
    scope::ScopeId,
    value::{Value, array_index, format_number, str_to_number, to_uint32},
};

/// Index of an object in the arena heap.
///
/// Ids double as object identity: `===` on two `Ref`s compares ids. Slots
/// are never recycled during a run, so an id stays valid for the life of
/// the interpreter (the host owns overall lifetime, per the sandbox model).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId(u32);

impl ObjectId {
    pub(crate) fn new(index: usize) -> Self {
        Self(u32::try_from(index).expect("heap exceeds u32 object count"))
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    /// Raw id, exposed for host-side identity checks and diagnostics.
    #[must_use]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Object class tag, observable through `Object.prototype.toString`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum JsClass {
    Object,
    Function,
    Array,
    Error,
    Date,
    Regexp,
    Boolean,
    Number,
    String,
    Arguments,
    Math,
    Json,
    Global,
}

impl JsClass {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Object => "Object",
            Self::Function => "Function",
            Self::Array => "Array",
            Self::Error => "Error",
            Self::Date => "Date",
            Self::Regexp => "RegExp",
            Self::Boolean => "Boolean",
            Self::Number => "Number",
            Self::String => "String",
            Self::Arguments => "Arguments",
            Self::Math => "Math",
            Self::Json => "JSON",
            Self::Global => "global",
        }
    }
}

/// One property with its descriptor bits. A name is present in the table
/// iff it has bits, so orphan descriptors cannot exist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Prop {
    pub value: Value,
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
}

impl Prop {
    pub(crate) fn plain(value: Value) -> Self {
        Self {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
        }
    }

    /// The descriptor used for built-in methods and constructor back-links.
    pub(crate) fn builtin(value: Value) -> Self {
        Self {
            value,
            writable: true,
            enumerable: false,
            configurable: true,
        }
    }
}

/// Backing regexp state; the compiled program is rebuilt on demand after
/// deserialization.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct RegexpData {
    pub source: String,
    pub flags: String,
    #[serde(skip)]
    compiled: OnceCell<fancy_regex::Regex>,
}

impl Clone for RegexpData {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            flags: self.flags.clone(),
            compiled: OnceCell::new(),
        }
    }
}

impl RegexpData {
    pub(crate) fn new(source: &str, flags: &str) -> RunResult<Self> {
        let data = Self {
            source: source.to_string(),
            flags: flags.to_string(),
            compiled: OnceCell::new(),
        };
        // Compile eagerly so pattern errors surface at construction.
        data.regex()?;
        Ok(data)
    }

    pub(crate) fn has_flag(&self, flag: char) -> bool {
        self.flags.contains(flag)
    }

    /// Translates the ES pattern and compiles it.
    pub(crate) fn regex(&self) -> RunResult<&fancy_regex::Regex> {
        if let Some(regex) = self.compiled.get() {
            return Ok(regex);
        }
        let mut translated = String::new();
        if self.has_flag('i') {
            translated.push_str("(?i)");
        }
        if self.has_flag('m') {
            translated.push_str("(?m)");
        }
        if self.has_flag('s') {
            translated.push_str("(?s)");
        }
        // `[^]` and `[]` are ES idioms the regex engine rejects.
        let body = self.source.replace("[^]", r"[\s\S]").replace("[]", r"[^\s\S]");
        translated.push_str(&body);
        let regex = fancy_regex::Regex::new(&translated)
            .map_err(|e| RunError::throw(ErrorKind::SyntaxError, format!("invalid regular expression: {e}")))?;
        Ok(self.compiled.get_or_init(|| regex))
    }
}

/// Internal `data` slot of built-in instances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum InternalData {
    /// Boxed primitive backing Boolean/Number/String instances.
    Boxed(Value),
    /// Milliseconds since the epoch (possibly NaN for invalid dates).
    Date(f64),
    Regexp(RegexpData),
}

/// How a function object executes when called.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum FuncKind {
    /// A guest function: AST body plus the captured scope.
    Guest { node: NodeId, scope: ScopeId },
    /// A built-in, dispatched through the `NativeFunc` table.
    Native(NativeFunc),
    /// A host binding registered via `create_native_function`.
    Host { id: u32, ctor: bool },
    /// A host binding whose completion arrives asynchronously.
    AsyncHost { id: u32 },
}

/// One guest object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct JsObject {
    pub proto: Option<ObjectId>,
    pub class: JsClass,
    /// Ordered name -> property map; insertion order is observable through
    /// `for…in` and `Object.keys`.
    pub properties: IndexMap<String, Prop>,
    /// Sparse accessor maps. A name is an accessor iff it appears here; the
    /// property table then holds a non-writable placeholder.
    pub getter: AHashMap<String, ObjectId>,
    pub setter: AHashMap<String, ObjectId>,
    pub data: Option<InternalData>,
    pub func: Option<FuncKind>,
    pub prevent_extensions: bool,
}

impl JsObject {
    pub(crate) fn new(proto: Option<ObjectId>, class: JsClass) -> Self {
        Self {
            proto,
            class,
            properties: IndexMap::new(),
            getter: AHashMap::new(),
            setter: AHashMap::new(),
            data: None,
            func: None,
            prevent_extensions: false,
        }
    }

    pub(crate) fn is_function(&self) -> bool {
        self.func.is_some()
    }

    fn is_accessor(&self, name: &str) -> bool {
        self.getter.contains_key(name) || self.setter.contains_key(name)
    }
}

/// Result of a property read along the prototype chain.
#[derive(Debug)]
pub(crate) enum PropGet {
    Value(Value),
    /// An accessor was found; the evaluator must trampoline through the
    /// getter with the original base as `this`.
    Getter(ObjectId),
}

/// Result of a property write.
#[derive(Debug)]
pub(crate) enum SetOutcome {
    Done,
    /// An accessor was found; the evaluator must trampoline through the
    /// setter. The assigned value stays the expression result.
    CallSetter(ObjectId),
    /// Refused by `writable`/`prevent_extensions`; strict callers throw.
    Rejected,
}

/// Property descriptor options, all optional, matching
/// `{configurable, enumerable, writable, get, set, value}`.
#[derive(Debug, Clone, Default)]
pub(crate) struct PropDescriptor {
    pub value: Option<Value>,
    pub writable: Option<bool>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
    pub get: Option<Value>,
    pub set: Option<Value>,
}

impl PropDescriptor {
    pub(crate) fn is_accessor(&self) -> bool {
        self.get.is_some() || self.set.is_some()
    }

    pub(crate) fn is_data(&self) -> bool {
        self.value.is_some() || self.writable.is_some()
    }
}

/// Snapshot of heap state at a point in time, for host monitoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapStats {
    /// Total number of live objects on the heap.
    pub live_objects: usize,
    /// Breakdown of live objects by class tag.
    pub objects_by_class: BTreeMap<&'static str, usize>,
}

/// Arena of guest objects.
///
/// Slots grow monotonically; collection is left to the embedder dropping
/// the interpreter, which matches the sandbox's bounded-lifetime model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Heap {
    entries: Vec<JsObject>,
}

impl Heap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn alloc(&mut self, object: JsObject) -> ObjectId {
        let id = ObjectId::new(self.entries.len());
        self.entries.push(object);
        id
    }

    pub(crate) fn get(&self, id: ObjectId) -> &JsObject {
        &self.entries[id.index()]
    }

    pub(crate) fn get_mut(&mut self, id: ObjectId) -> &mut JsObject {
        &mut self.entries[id.index()]
    }

    pub(crate) fn stats(&self) -> HeapStats {
        let mut objects_by_class = BTreeMap::new();
        for entry in &self.entries {
            *objects_by_class.entry(entry.class.as_str()).or_insert(0) += 1;
        }
        HeapStats {
            live_objects: self.entries.len(),
            objects_by_class,
        }
    }

    // === prototype chain ===

    /// Assigns a prototype, rejecting assignments that would create a cycle.
    pub(crate) fn set_proto(&mut self, id: ObjectId, proto: Option<ObjectId>) -> RunResult<()> {
        if let Some(mut cursor) = proto {
            loop {
                if cursor == id {
                    return Err(RunError::CyclicProto);
                }
                match self.get(cursor).proto {
                    Some(next) => cursor = next,
                    None => break,
                }
            }
        }
        self.get_mut(id).proto = proto;
        Ok(())
    }

    /// Walks `lhs`'s prototype chain looking for `rhs` (`instanceof`,
    /// `isPrototypeOf`). The chain is acyclic by construction, so the walk
    /// needs no visited set.
    pub(crate) fn proto_chain_contains(&self, start: ObjectId, target: ObjectId) -> bool {
        let mut cursor = self.get(start).proto;
        while let Some(id) = cursor {
            if id == target {
                return true;
            }
            cursor = self.get(id).proto;
        }
        false
    }

    // === property reads ===

    /// Magic `length` and indexed reads on boxed strings.
    fn string_magic(&self, object: &JsObject, name: &str) -> Option<Value> {
        let InternalData::Boxed(Value::Str(s)) = object.data.as_ref()? else {
            return None;
        };
        if name == "length" {
            return Some(Value::Number(s.encode_utf16().count() as f64));
        }
        let index = array_index(name)?;
        let units: Vec<u16> = s.encode_utf16().collect();
        units.get(index as usize).map(|&unit| {
            Value::Str(String::from_utf16_lossy(&[unit]))
        })
    }

    /// Property read starting at `id`, walking the prototype chain.
    /// Accessors surface as `PropGet::Getter` for the evaluator to invoke.
    pub(crate) fn get_prop(&self, id: ObjectId, name: &str) -> PropGet {
        let mut cursor = Some(id);
        while let Some(cur) = cursor {
            let object = self.get(cur);
            if object.class == JsClass::String
                && let Some(value) = self.string_magic(object, name)
            {
                return PropGet::Value(value);
            }
            if object.is_accessor(name) && object.properties.contains_key(name) {
                return match object.getter.get(name) {
                    Some(&getter) => PropGet::Getter(getter),
                    // Setter-only properties read as undefined.
                    None => PropGet::Value(Value::Undefined),
                };
            }
            if let Some(prop) = object.properties.get(name) {
                return PropGet::Value(prop.value.clone());
            }
            cursor = object.proto;
        }
        PropGet::Value(Value::Undefined)
    }

    /// `in`-style lookup: own or inherited, accessors included.
    pub(crate) fn has_prop(&self, id: ObjectId, name: &str) -> bool {
        let mut cursor = Some(id);
        while let Some(cur) = cursor {
            let object = self.get(cur);
            if object.class == JsClass::String && self.string_magic(object, name).is_some() {
                return true;
            }
            if object.properties.contains_key(name) {
                return true;
            }
            cursor = object.proto;
        }
        false
    }

    pub(crate) fn has_own_prop(&self, id: ObjectId, name: &str) -> bool {
        let object = self.get(id);
        if object.class == JsClass::String && self.string_magic(object, name).is_some() {
            return true;
        }
        object.properties.contains_key(name)
    }

    /// Current array length, 0 when unset.
    pub(crate) fn array_length(&self, id: ObjectId) -> u32 {
        match self.get(id).properties.get("length") {
            Some(prop) => to_uint32(prop.value.to_number_primitive()),
            None => 0,
        }
    }

    // === property writes ===

    /// Property assignment following ES5 `[[Put]]`, reduced to the model's
    /// rules. Strict-mode failure handling is the caller's: a `Rejected`
    /// outcome becomes a TypeError there, silence otherwise.
    pub(crate) fn set_prop(&mut self, id: ObjectId, name: &str, value: Value) -> RunResult<SetOutcome> {
        // Setter lookup walks the whole chain first.
        let mut cursor = Some(id);
        while let Some(cur) = cursor {
            let object = self.get(cur);
            if object.is_accessor(name) && object.properties.contains_key(name) {
                return Ok(match object.setter.get(name) {
                    Some(&setter) => SetOutcome::CallSetter(setter),
                    // Getter-only: assignment is refused.
                    None => SetOutcome::Rejected,
                });
            }
            if object.properties.contains_key(name) && cur == id {
                break;
            }
            cursor = object.proto;
        }

        let is_array = self.get(id).class == JsClass::Array;
        if is_array && name == "length" {
            return self.set_array_length(id, &value).map(|()| SetOutcome::Done);
        }

        let object = self.get_mut(id);
        if let Some(prop) = object.properties.get_mut(name) {
            if !prop.writable {
                return Ok(SetOutcome::Rejected);
            }
            prop.value = value;
        } else {
            if object.prevent_extensions {
                return Ok(SetOutcome::Rejected);
            }
            object.properties.insert(name.to_string(), Prop::plain(value));
        }

        // Keep `length` one past the highest numeric index.
        if is_array
            && let Some(index) = array_index(name)
        {
            let length = self.array_length(id);
            if index >= length {
                self.get_mut(id)
                    .properties
                    .insert("length".to_string(), array_length_prop(index + 1));
            }
        }
        Ok(SetOutcome::Done)
    }

    /// Array `length` assignment: validates per ES5 15.4.5.1 and deletes
    /// indices at or above the new length.
    fn set_array_length(&mut self, id: ObjectId, value: &Value) -> RunResult<()> {
        let n = value.to_number_primitive();
        let new_len = to_uint32(n);
        if f64::from(new_len) != n {
            return Err(RunError::throw(ErrorKind::RangeError, "Invalid array length"));
        }
        let object = self.get_mut(id);
        let doomed: Vec<String> = object
            .properties
            .keys()
            .filter(|name| array_index(name).is_some_and(|i| i >= new_len))
            .cloned()
            .collect();
        for name in doomed {
            object.properties.shift_remove(&name);
            object.getter.remove(&name);
            object.setter.remove(&name);
        }
        object
            .properties
            .insert("length".to_string(), array_length_prop(new_len));
        Ok(())
    }

    /// ES5 `[[DefineOwnProperty]]`, reduced: data/accessor exclusivity and
    /// the non-configurable restrictions.
    pub(crate) fn define_prop(&mut self, id: ObjectId, name: &str, desc: &PropDescriptor) -> RunResult<()> {
        if desc.is_accessor() && desc.is_data() {
            return Err(RunError::throw(
                ErrorKind::TypeError,
                "property descriptors must not specify a value or be writable when a getter or setter has been specified",
            ));
        }
        for accessor in [&desc.get, &desc.set] {
            if let Some(value) = accessor
                && !matches!(value, Value::Undefined)
                && !matches!(value, Value::Ref(f) if self.get(*f).is_function())
            {
                return Err(RunError::throw(ErrorKind::TypeError, "getter/setter must be a function"));
            }
        }

        let object = self.get(id);
        let existing = object.properties.get(name);
        if let Some(prop) = existing {
            if !prop.configurable {
                let was_accessor = object.is_accessor(name);
                let changing_shape = desc.is_accessor() != was_accessor && (desc.is_accessor() || desc.is_data());
                let raising_flags = desc.configurable == Some(true)
                    || (desc.enumerable.is_some() && desc.enumerable != Some(prop.enumerable))
                    || (!was_accessor && desc.writable == Some(true) && !prop.writable);
                let writing_frozen = !was_accessor && !prop.writable && desc.value.is_some();
                if changing_shape || raising_flags || writing_frozen {
                    return Err(RunError::throw(
                        ErrorKind::TypeError,
                        format!("Cannot redefine property: {name}"),
                    ));
                }
            }
        } else if object.prevent_extensions {
            return Err(RunError::throw(
                ErrorKind::TypeError,
                format!("Cannot define property {name}, object is not extensible"),
            ));
        }

        let defaults = existing.map_or((false, false, false), |p| (p.writable, p.enumerable, p.configurable));
        // ES5 defaults for a fresh property are all-false; an existing
        // property keeps unspecified attributes.
        let fresh = existing.is_none();
        let writable = desc.writable.unwrap_or(if fresh { false } else { defaults.0 });
        let enumerable = desc.enumerable.unwrap_or(if fresh { false } else { defaults.1 });
        let configurable = desc.configurable.unwrap_or(if fresh { false } else { defaults.2 });

        let object = self.get_mut(id);
        if desc.is_accessor() {
            match &desc.get {
                Some(Value::Ref(f)) => {
                    object.getter.insert(name.to_string(), *f);
                }
                Some(_) => {
                    object.getter.remove(name);
                }
                None => {}
            }
            match &desc.set {
                Some(Value::Ref(f)) => {
                    object.setter.insert(name.to_string(), *f);
                }
                Some(_) => {
                    object.setter.remove(name);
                }
                None => {}
            }
            let placeholder = object.properties.get(name).map_or(Value::Undefined, |p| p.value.clone());
            object.properties.insert(
                name.to_string(),
                Prop {
                    value: placeholder,
                    // Accessors never carry a writable bit.
                    writable: false,
                    enumerable,
                    configurable,
                },
            );
        } else {
            let value = desc
                .value
                .clone()
                .or_else(|| object.properties.get(name).map(|p| p.value.clone()))
                .unwrap_or(Value::Undefined);
            // A data definition clears any previous accessor.
            object.getter.remove(name);
            object.setter.remove(name);
            object.properties.insert(
                name.to_string(),
                Prop {
                    value,
                    writable,
                    enumerable,
                    configurable,
                },
            );
        }

        let is_array = self.get(id).class == JsClass::Array;
        if is_array
            && let Some(index) = array_index(name)
        {
            let length = self.array_length(id);
            if index >= length {
                self.get_mut(id)
                    .properties
                    .insert("length".to_string(), array_length_prop(index + 1));
            }
        }
        Ok(())
    }

    /// `delete obj.name`: false on non-configurable properties, which the
    /// strict-mode caller converts into a TypeError.
    pub(crate) fn delete_prop(&mut self, id: ObjectId, name: &str) -> bool {
        let object = self.get_mut(id);
        match object.properties.get(name) {
            Some(prop) if !prop.configurable => false,
            Some(_) => {
                object.properties.shift_remove(name);
                object.getter.remove(name);
                object.setter.remove(name);
                true
            }
            None => true,
        }
    }

    /// Own enumerable keys in insertion order.
    pub(crate) fn own_enumerable_keys(&self, id: ObjectId) -> Vec<String> {
        self.get(id)
            .properties
            .iter()
            .filter(|(_, prop)| prop.enumerable)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Own keys regardless of enumerability, for `getOwnPropertyNames`.
    pub(crate) fn own_keys(&self, id: ObjectId) -> Vec<String> {
        self.get(id).properties.keys().cloned().collect()
    }

    // === conversions ===

    /// ToPrimitive. `number_hint` selects the valueOf-first ordering; the
    /// model resolves conversions natively by class rather than dispatching
    /// into guest toString overrides.
    pub(crate) fn to_primitive(&self, value: &Value, number_hint: bool) -> Value {
        let Value::Ref(id) = value else {
            return value.clone();
        };
        let object = self.get(*id);
        match &object.data {
            Some(InternalData::Boxed(primitive)) => primitive.clone(),
            Some(InternalData::Date(ms)) => {
                if number_hint {
                    Value::Number(*ms)
                } else {
                    Value::Str(crate::builtins::date::to_date_string(*ms))
                }
            }
            Some(InternalData::Regexp(data)) => Value::Str(format!("/{}/{}", data.source, data.flags)),
            None => {
                let mut visited = AHashSet::new();
                Value::Str(self.object_to_string(*id, &mut visited))
            }
        }
    }

    pub(crate) fn to_number(&self, value: &Value) -> f64 {
        if value.is_primitive() {
            value.to_number_primitive()
        } else {
            match self.to_primitive(value, true) {
                Value::Str(s) => str_to_number(&s),
                primitive => primitive.to_number_primitive(),
            }
        }
    }

    pub(crate) fn to_js_string(&self, value: &Value) -> String {
        if value.is_primitive() {
            value.to_string_primitive()
        } else {
            self.to_primitive(value, false).to_string_primitive()
        }
    }

    /// Class-based native toString with reentrancy detection: a cycle
    /// yields "..." inside arrays and "[object Error]" for errors.
    pub(crate) fn object_to_string(&self, id: ObjectId, visited: &mut AHashSet<ObjectId>) -> String {
        let object = self.get(id);
        match object.class {
            JsClass::Array => {
                if !visited.insert(id) {
                    return "...".to_string();
                }
                let out = self.array_join(id, ",", visited);
                visited.remove(&id);
                out
            }
            JsClass::Error => {
                if !visited.insert(id) {
                    return "[object Error]".to_string();
                }
                let name = match self.get_prop(id, "name") {
                    PropGet::Value(v) => self.value_to_string_with(&v, visited),
                    PropGet::Getter(_) => "Error".to_string(),
                };
                let message = match self.get_prop(id, "message") {
                    PropGet::Value(v @ (Value::Str(_) | Value::Number(_) | Value::Bool(_))) => {
                        self.value_to_string_with(&v, visited)
                    }
                    _ => String::new(),
                };
                visited.remove(&id);
                if message.is_empty() {
                    name
                } else {
                    format!("{name}: {message}")
                }
            }
            JsClass::Function => {
                let name = match self.get_prop(id, "name") {
                    PropGet::Value(Value::Str(s)) => s,
                    _ => String::new(),
                };
                format!("function {name}() {{ [native code] }}")
            }
            JsClass::Date => match &object.data {
                Some(InternalData::Date(ms)) => crate::builtins::date::to_date_string(*ms),
                _ => "[object Date]".to_string(),
            },
            JsClass::Regexp => match &object.data {
                Some(InternalData::Regexp(data)) => format!("/{}/{}", data.source, data.flags),
                _ => "[object RegExp]".to_string(),
            },
            _ => match &object.data {
                Some(InternalData::Boxed(primitive)) => primitive.to_string_primitive(),
                _ => format!("[object {}]", object.class.as_str()),
            },
        }
    }

    fn value_to_string_with(&self, value: &Value, visited: &mut AHashSet<ObjectId>) -> String {
        match value {
            Value::Ref(id) => self.object_to_string(*id, visited),
            primitive => primitive.to_string_primitive(),
        }
    }

    /// `Array.prototype.join` semantics: undefined/null elements render
    /// empty, recursion is cycle-guarded.
    pub(crate) fn array_join(&self, id: ObjectId, separator: &str, visited: &mut AHashSet<ObjectId>) -> String {
        let length = self.array_length(id);
        let mut parts = Vec::with_capacity(length as usize);
        for index in 0..length {
            let element = match self.get_prop(id, &format_number(f64::from(index))) {
                PropGet::Value(v) => v,
                PropGet::Getter(_) => Value::Undefined,
            };
            parts.push(match element {
                Value::Undefined | Value::Null => String::new(),
                Value::Ref(element_id) => self.object_to_string(element_id, visited),
                primitive => primitive.to_string_primitive(),
            });
        }
        parts.join(separator)
    }

    /// `typeof` needs the heap to tell functions from plain objects.
    pub(crate) fn type_of(&self, value: &Value) -> &'static str {
        match value {
            Value::Ref(id) if self.get(*id).is_function() => "function",
            other => other.type_of_primitive(),
        }
    }
}

/// The `length` property of arrays: writable, hidden, permanent.
pub(crate) fn array_length_prop(length: u32) -> Prop {
    Prop {
        value: Value::Number(f64::from(length)),
        writable: true,
        enumerable: false,
        configurable: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heap_with_object() -> (Heap, ObjectId) {
        let mut heap = Heap::new();
        let id = heap.alloc(JsObject::new(None, JsClass::Object));
        (heap, id)
    }

    fn get_value(heap: &Heap, id: ObjectId, name: &str) -> Value {
        match heap.get_prop(id, name) {
            PropGet::Value(v) => v,
            PropGet::Getter(_) => panic!("unexpected accessor"),
        }
    }

    #[test]
    fn set_then_get_roundtrip() {
        let (mut heap, id) = heap_with_object();
        assert!(matches!(heap.set_prop(id, "x", Value::Number(1.0)).unwrap(), SetOutcome::Done));
        assert!(matches!(get_value(&heap, id, "x"), Value::Number(n) if n == 1.0));
        assert!(matches!(get_value(&heap, id, "missing"), Value::Undefined));
    }

    #[test]
    fn prototype_chain_lookup() {
        let mut heap = Heap::new();
        let proto = heap.alloc(JsObject::new(None, JsClass::Object));
        let child = heap.alloc(JsObject::new(Some(proto), JsClass::Object));
        heap.set_prop(proto, "inherited", Value::Bool(true)).unwrap();
        assert!(matches!(get_value(&heap, child, "inherited"), Value::Bool(true)));
        assert!(heap.has_prop(child, "inherited"));
        assert!(!heap.has_own_prop(child, "inherited"));
    }

    #[test]
    fn proto_cycles_are_rejected() {
        let mut heap = Heap::new();
        let a = heap.alloc(JsObject::new(None, JsClass::Object));
        let b = heap.alloc(JsObject::new(Some(a), JsClass::Object));
        assert!(matches!(heap.set_proto(a, Some(b)), Err(RunError::CyclicProto)));
        // Chain unchanged.
        assert!(heap.get(a).proto.is_none());
    }

    #[test]
    fn non_writable_rejects_assignment() {
        let (mut heap, id) = heap_with_object();
        heap.define_prop(
            id,
            "ro",
            &PropDescriptor {
                value: Some(Value::Number(1.0)),
                writable: Some(false),
                enumerable: Some(true),
                configurable: Some(true),
                ..PropDescriptor::default()
            },
        )
        .unwrap();
        assert!(matches!(
            heap.set_prop(id, "ro", Value::Number(2.0)).unwrap(),
            SetOutcome::Rejected
        ));
        assert!(matches!(get_value(&heap, id, "ro"), Value::Number(n) if n == 1.0));
    }

    #[test]
    fn delete_respects_configurable() {
        let (mut heap, id) = heap_with_object();
        heap.set_prop(id, "soft", Value::Null).unwrap();
        heap.define_prop(
            id,
            "hard",
            &PropDescriptor {
                value: Some(Value::Null),
                configurable: Some(false),
                ..PropDescriptor::default()
            },
        )
        .unwrap();
        assert!(heap.delete_prop(id, "soft"));
        assert!(!heap.delete_prop(id, "hard"));
        assert!(heap.has_own_prop(id, "hard"));
    }

    #[test]
    fn descriptor_conflict_is_rejected() {
        let (mut heap, id) = heap_with_object();
        let getter = heap.alloc(JsObject::new(None, JsClass::Function));
        let err = heap.define_prop(
            id,
            "x",
            &PropDescriptor {
                value: Some(Value::Number(1.0)),
                get: Some(Value::Ref(getter)),
                ..PropDescriptor::default()
            },
        );
        assert!(err.is_err());
    }

    #[test]
    fn array_length_tracks_highest_index() {
        let mut heap = Heap::new();
        let array = heap.alloc(JsObject::new(None, JsClass::Array));
        heap.get_mut(array).properties.insert("length".into(), array_length_prop(0));
        heap.set_prop(array, "0", Value::Number(10.0)).unwrap();
        heap.set_prop(array, "5", Value::Number(50.0)).unwrap();
        assert_eq!(heap.array_length(array), 6);
        // Truncation removes indices above the new length.
        heap.set_prop(array, "length", Value::Number(2.0)).unwrap();
        assert_eq!(heap.array_length(array), 2);
        assert!(matches!(get_value(&heap, array, "5"), Value::Undefined));
        assert!(matches!(get_value(&heap, array, "0"), Value::Number(n) if n == 10.0));
    }

    #[test]
    fn invalid_array_length_throws() {
        let mut heap = Heap::new();
        let array = heap.alloc(JsObject::new(None, JsClass::Array));
        heap.get_mut(array).properties.insert("length".into(), array_length_prop(0));
        assert!(heap.set_prop(array, "length", Value::Number(-1.0)).is_err());
        assert!(heap.set_prop(array, "length", Value::Number(1.5)).is_err());
    }

    #[test]
    fn cyclic_array_to_string_renders_ellipsis() {
        let mut heap = Heap::new();
        let array = heap.alloc(JsObject::new(None, JsClass::Array));
        heap.get_mut(array).properties.insert("length".into(), array_length_prop(0));
        heap.set_prop(array, "0", Value::Number(1.0)).unwrap();
        heap.set_prop(array, "1", Value::Ref(array)).unwrap();
        let mut visited = AHashSet::new();
        assert_eq!(heap.object_to_string(array, &mut visited), "1,...");
    }

    #[test]
    fn insertion_order_is_preserved() {
        let (mut heap, id) = heap_with_object();
        for name in ["b", "a", "c"] {
            heap.set_prop(id, name, Value::Null).unwrap();
        }
        assert_eq!(heap.own_enumerable_keys(id), vec!["b", "a", "c"]);
    }
}
