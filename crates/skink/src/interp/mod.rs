mod frame;
mod handlers;
mod operators;

use std::{cell::RefCell, rc::Rc};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

pub(crate) use frame::{Completion, Frame, Reference};

use crate::{
    ast::{Ast, NodeId, NodeKind},
    builtins::{self, NativeCtx, Realm},
    error::{CodeLoc, ErrorKind, Exception, RunError, RunResult},
    heap::{FuncKind, Heap, HeapStats, JsClass, JsObject, ObjectId, Prop, PropGet, SetOutcome},
    object::{Object, lift_object, lower_value},
    parse::{ParseOptions, parse_program},
    scope::{HoistedDecl, Scope, ScopeGet, ScopeId, Scopes, hoist_declarations},
    value::Value,
};

/// Interpreter construction options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterpreterOptions {
    pub parse: ParseOptions,
    /// Seeds `Math.random` for reproducible runs; entropy-seeded otherwise.
    pub random_seed: Option<u64>,
}

/// Completion handle for an asynchronous host binding.
///
/// The host function receives one of these as its implicit last argument;
/// calling [`resolve`](Self::resolve) records the result. The interpreter
/// observes it at the next `step()`/`run()` entry and clears its paused
/// flag — results are never applied mid-step, so resolving from anywhere
/// outside `step()` is safe.
pub struct Resolver {
    call_id: u32,
    cell: Rc<RefCell<Vec<(u32, Object)>>>,
}

impl Resolver {
    pub fn resolve(self, value: Object) {
        self.cell.borrow_mut().push((self.call_id, value));
    }
}

/// A guest value held by the host, opaque except through the bridge.
#[derive(Debug, Clone)]
pub struct GuestValue(pub(crate) Value);

type SyncHostFn = Box<dyn FnMut(Vec<Object>) -> Object>;
type AsyncHostFn = Box<dyn FnMut(Vec<Object>, Resolver)>;

pub(crate) enum HostImpl {
    Sync(SyncHostFn),
    Async(AsyncHostFn),
}

/// Serializable metadata for one host binding; the closure itself lives in
/// the parallel `host_fns` vector and is re-registered after `load()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct HostFnMeta {
    name: String,
    length: u32,
    ctor: bool,
    is_async: bool,
}

/// A sandboxed, step-driven ES5 interpreter.
///
/// Guest execution advances one micro-step per [`step`](Self::step) call
/// over an explicit frame stack; the host interleaves its own work, pauses
/// at will, snapshots with [`dump`](Self::dump), and reaches the guest
/// only through the bridge methods. Guest code reaches the host only
/// through bindings registered with `create_native_function` and its
/// async sibling.
#[derive(Serialize, Deserialize)]
pub struct Interpreter {
    ast: Ast,
    heap: Heap,
    scopes: Scopes,
    realm: Realm,
    frames: Vec<Frame>,
    program: NodeId,
    global_scope: ScopeId,
    paused: bool,
    last_value: Value,
    rng: ChaCha8Rng,
    options: InterpreterOptions,
    host_fn_meta: Vec<HostFnMeta>,
    #[serde(skip)]
    host_fns: Vec<Option<HostImpl>>,
    #[serde(skip, default)]
    pending_results: Rc<RefCell<Vec<(u32, Object)>>>,
    pending_call: Option<u32>,
    next_call_id: u32,
}

impl std::fmt::Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("frames", &self.frames.len())
            .field("paused", &self.paused)
            .field("heap", &self.heap.stats().live_objects)
            .finish_non_exhaustive()
    }
}

impl Interpreter {
    /// Parses `code` and prepares it for stepping with default options.
    pub fn new(code: &str) -> Result<Self, Exception> {
        Self::with_options(code, InterpreterOptions::default())
    }

    pub fn with_options(code: &str, options: InterpreterOptions) -> Result<Self, Exception> {
        Self::with_setup(code, options, |_| {})
    }

    /// Full constructor: `setup` runs after built-ins are installed and
    /// before the first step, and may register additional bindings.
    pub fn with_setup(
        code: &str,
        options: InterpreterOptions,
        setup: impl FnOnce(&mut Interpreter),
    ) -> Result<Self, Exception> {
        let mut ast = Ast::new();
        let program = parse_program(&mut ast, code, &options.parse, None, None)?;
        Self::from_parts(ast, program, options, setup)
    }

    /// Builds an interpreter around an already-parsed program tree.
    pub fn from_ast(ast: Ast, program: NodeId, options: InterpreterOptions) -> Result<Self, Exception> {
        Self::from_parts(ast, program, options, |_| {})
    }

    fn from_parts(
        mut ast: Ast,
        program: NodeId,
        options: InterpreterOptions,
        setup: impl FnOnce(&mut Interpreter),
    ) -> Result<Self, Exception> {
        // Polyfill source compiles into the same arena, stripped of spans
        // so its frames never surface to location observers.
        let poly_mark = ast.len();
        let poly_program = parse_program(&mut ast, builtins::polyfill::POLYFILLS, &ParseOptions::default(), None, None)
            .expect("polyfill source parses");
        ast.strip_spans_from(poly_mark);

        let mut heap = Heap::new();
        let realm = builtins::install(&mut heap);
        let mut scopes = Scopes::new();
        let global_scope = scopes.alloc(Scope {
            object: realm.global_object,
            parent: None,
            strict: false,
            chain_lookup: true,
        });

        let rng = match options.random_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let global_this = Value::Ref(realm.global_object);
        let mut interp = Self {
            ast,
            heap,
            scopes,
            realm,
            frames: Vec::new(),
            program,
            global_scope,
            paused: false,
            last_value: Value::Undefined,
            rng,
            options,
            host_fn_meta: Vec::new(),
            host_fns: Vec::new(),
            pending_results: Rc::new(RefCell::new(Vec::new())),
            pending_call: None,
            next_call_id: 0,
        };

        // Execute the polyfills to completion through the step engine.
        interp.begin_program(poly_program, global_scope, global_this.clone());
        while interp.step()? {}

        setup(&mut interp);

        // Strict top-level programs make the global scope strict.
        if let NodeKind::Program { strict: true, .. } = interp.ast.kind(program) {
            interp.scopes.set_strict(global_scope, true);
        }
        interp.begin_program(program, global_scope, global_this);
        Ok(interp)
    }

    fn begin_program(&mut self, program: NodeId, scope: ScopeId, this: Value) {
        self.hoist_into(scope, program);
        self.frames = vec![Frame::new(program, scope, this)];
    }

    // === public execution surface ===

    /// Parses additional top-level statements onto the existing Program.
    ///
    /// Only legal while the stack root is still the Program frame (before
    /// an uncaught error tore execution down).
    pub fn append_code(&mut self, code: &str) -> Result<(), Exception> {
        let root_is_program = self
            .frames
            .first()
            .is_some_and(|frame| frame.node == self.program);
        if !root_is_program {
            return Err(host_error_to_exception(&RunError::AppendAfterCompletion));
        }
        let old_len = match self.ast.kind(self.program) {
            NodeKind::Program { body, .. } => body.len(),
            _ => unreachable!("program id always names a Program"),
        };
        parse_program(&mut self.ast, code, &self.options.parse.clone(), None, Some(self.program))?;
        // Hoist the appended statements; execution resumes from the old
        // body cursor.
        let new_statements: Vec<NodeId> = match self.ast.kind(self.program) {
            NodeKind::Program { body, .. } => body[old_len..].to_vec(),
            _ => unreachable!(),
        };
        for statement in new_statements {
            self.hoist_statement(self.global_scope, statement);
        }
        Ok(())
    }

    /// Performs one micro-step. Returns `true` while more work remains
    /// (including while paused), `false` once the Program completes.
    pub fn step(&mut self) -> Result<bool, Exception> {
        self.drain_async()?;
        if self.paused {
            return Ok(true);
        }
        if self.frames.is_empty() {
            return Ok(false);
        }
        if self.frames.len() == 1 && self.program_exhausted() {
            return Ok(false);
        }
        match self.dispatch_top() {
            Ok(()) => {}
            Err(RunError::Throw(value)) => self.unwind(Completion::Throw(value))?,
            Err(RunError::ThrowNew(kind, message)) => {
                let error = self.realm.create_error(&mut self.heap, kind, &message);
                self.unwind(Completion::Throw(Value::Ref(error)))?;
            }
            Err(host_error) => return Err(host_error_to_exception(&host_error)),
        }
        Ok(!self.frames.is_empty() && !(self.frames.len() == 1 && self.program_exhausted()))
    }

    /// Steps until the program completes or pauses. Returns `true` when
    /// suspension occurred, `false` on completion.
    pub fn run(&mut self) -> Result<bool, Exception> {
        loop {
            if !self.step()? {
                return Ok(false);
            }
            if self.paused {
                return Ok(true);
            }
        }
    }

    fn program_exhausted(&self) -> bool {
        let frame = &self.frames[0];
        match self.ast.kind(frame.node) {
            NodeKind::Program { body, .. } => frame.index >= body.len(),
            _ => false,
        }
    }

    /// The last expression-statement value, lowered cycle-safely.
    #[must_use]
    pub fn value(&self) -> Object {
        lower_value(&self.heap, &self.last_value)
    }

    /// Suspends execution; an async binding's resolver (or host code
    /// feeding one) resumes it.
    pub fn pause(&mut self) {
        self.paused = true;
    }

    #[must_use]
    pub fn paused(&self) -> bool {
        self.paused
    }

    /// Current evaluator stack depth, for host-visible stepping.
    #[must_use]
    pub fn stack_depth(&self) -> usize {
        self.frames.len()
    }

    /// Source location of the deepest frame that has one. Polyfill frames
    /// carry no location and are skipped.
    #[must_use]
    pub fn current_location(&self) -> Option<CodeLoc> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| self.ast.node(frame.node).loc.map(|loc| loc.start))
    }

    #[must_use]
    pub fn heap_stats(&self) -> HeapStats {
        self.heap.stats()
    }

    // === host object surface ===

    /// Handle to the global object.
    #[must_use]
    pub fn global(&self) -> ObjectId {
        self.realm.global_object
    }

    /// Reads a property (prototype-aware) and lowers it. Accessor
    /// properties lower as undefined from the host surface.
    #[must_use]
    pub fn get_property(&self, object: ObjectId, name: &str) -> Object {
        match self.heap.get_prop(object, name) {
            PropGet::Value(value) => lower_value(&self.heap, &value),
            PropGet::Getter(_) => Object::Undefined,
        }
    }

    /// Lifts `value` and writes it with default attributes.
    pub fn set_property(&mut self, object: ObjectId, name: &str, value: Object) -> Result<(), Exception> {
        let lifted = self
            .lift(&value)
            .map_err(|e| host_error_to_exception(&e))?;
        self.heap
            .set_prop(object, name, lifted)
            .map(|_| ())
            .map_err(|e| host_error_to_exception(&e))
    }

    /// Defines a property with explicit descriptor options
    /// `{configurable, enumerable, writable, get, set, value}`.
    pub fn define_property(
        &mut self,
        object: ObjectId,
        name: &str,
        descriptor: HostDescriptor,
    ) -> Result<(), Exception> {
        let value = match &descriptor.value {
            Some(v) => Some(self.lift(v).map_err(|e| host_error_to_exception(&e))?),
            None => None,
        };
        let desc = crate::heap::PropDescriptor {
            value,
            writable: descriptor.writable,
            enumerable: descriptor.enumerable,
            configurable: descriptor.configurable,
            get: descriptor.get.map(Value::Ref),
            set: descriptor.set.map(Value::Ref),
        };
        self.heap
            .define_prop(object, name, &desc)
            .map_err(|e| host_error_to_exception(&e))
    }

    /// Attaches a function object (typically from
    /// [`create_native_function`](Self::create_native_function)) as a
    /// non-enumerable property, the way built-ins are installed.
    pub fn set_function_property(&mut self, object: ObjectId, name: &str, func: ObjectId) {
        builtins::add_data(&mut self.heap, object, name, Value::Ref(func));
    }

    /// `native_to_guest`: lifts a host value into the guest heap.
    pub fn native_to_guest(&mut self, value: &Object) -> Result<GuestValue, Exception> {
        self.lift(value)
            .map(GuestValue)
            .map_err(|e| host_error_to_exception(&e))
    }

    /// `guest_to_native`: lowers a guest value, cycle-safely.
    #[must_use]
    pub fn guest_to_native(&self, value: &GuestValue) -> Object {
        lower_value(&self.heap, &value.0)
    }

    fn lift(&mut self, value: &Object) -> RunResult<Value> {
        lift_object(&mut self.heap, &self.realm, value)
    }

    // === host function bindings ===

    fn register_host(&mut self, name: &str, length: u32, ctor: bool, is_async: bool, implementation: HostImpl) -> ObjectId {
        self.host_fn_meta.push(HostFnMeta {
            name: name.to_string(),
            length,
            ctor,
            is_async,
        });
        self.host_fns.push(Some(implementation));
        let id = u32::try_from(self.host_fns.len() - 1).expect("host binding count fits u32");
        self.alloc_host_function(name, length, id, ctor, is_async)
    }

    fn alloc_host_function(&mut self, name: &str, length: u32, id: u32, ctor: bool, is_async: bool) -> ObjectId {
        let func = if is_async {
            FuncKind::AsyncHost { id }
        } else {
            FuncKind::Host { id, ctor }
        };
        let object_id = self
            .heap
            .alloc(JsObject::new(Some(self.realm.function_proto), JsClass::Function));
        let object = self.heap.get_mut(object_id);
        object.func = Some(func);
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
        object_id
    }

    /// Registers a synchronous host binding and returns its function
    /// object, ready to be attached with [`set_property`](Self::set_property).
    pub fn create_native_function(
        &mut self,
        name: &str,
        length: u32,
        f: impl FnMut(Vec<Object>) -> Object + 'static,
    ) -> ObjectId {
        self.register_host(name, length, false, false, HostImpl::Sync(Box::new(f)))
    }

    /// As [`create_native_function`](Self::create_native_function), but the
    /// function may also be invoked with `new`.
    pub fn create_native_constructor(
        &mut self,
        name: &str,
        length: u32,
        f: impl FnMut(Vec<Object>) -> Object + 'static,
    ) -> ObjectId {
        self.register_host(name, length, true, false, HostImpl::Sync(Box::new(f)))
    }

    /// Registers an asynchronous host binding. When the guest calls it,
    /// execution pauses; the host completes the call through the
    /// [`Resolver`] handed to `f`, and the next `step()`/`run()` resumes.
    pub fn create_async_function(
        &mut self,
        name: &str,
        length: u32,
        f: impl FnMut(Vec<Object>, Resolver) + 'static,
    ) -> ObjectId {
        self.register_host(name, length, false, true, HostImpl::Async(Box::new(f)))
    }

    /// Re-attaches the implementation of a binding after `load()`.
    pub fn bind_native_function(
        &mut self,
        name: &str,
        f: impl FnMut(Vec<Object>) -> Object + 'static,
    ) -> Result<(), Exception> {
        let index = self
            .host_fn_meta
            .iter()
            .position(|meta| meta.name == name && !meta.is_async)
            .ok_or_else(|| Exception::new(ErrorKind::Error, format!("no native binding named {name}")))?;
        self.host_fns[index] = Some(HostImpl::Sync(Box::new(f)));
        Ok(())
    }

    /// Re-attaches an async binding after `load()`.
    pub fn bind_async_function(
        &mut self,
        name: &str,
        f: impl FnMut(Vec<Object>, Resolver) + 'static,
    ) -> Result<(), Exception> {
        let index = self
            .host_fn_meta
            .iter()
            .position(|meta| meta.name == name && meta.is_async)
            .ok_or_else(|| Exception::new(ErrorKind::Error, format!("no async binding named {name}")))?;
        self.host_fns[index] = Some(HostImpl::Async(Box::new(f)));
        Ok(())
    }

    // === snapshotting ===

    /// Serializes the complete execution state (mid-run included). Host
    /// closures are not serialized; re-register them after `load()` with
    /// the `bind_*` methods before resuming.
    pub fn dump(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    pub fn load(bytes: &[u8]) -> Result<Self, postcard::Error> {
        let mut interp: Self = postcard::from_bytes(bytes)?;
        interp.host_fns.resize_with(interp.host_fn_meta.len(), || None);
        Ok(interp)
    }

    // === async plumbing ===

    fn drain_async(&mut self) -> Result<(), Exception> {
        let results: Vec<(u32, Object)> = self.pending_results.borrow_mut().drain(..).collect();
        for (call_id, result) in results {
            if self.pending_call != Some(call_id) {
                // Stale resolution from a superseded call; ignore.
                continue;
            }
            let lifted = self.lift(&result).map_err(|e| host_error_to_exception(&e))?;
            if let Some(frame) = self
                .frames
                .iter_mut()
                .rev()
                .find(|frame| frame.awaiting == Some(call_id))
            {
                frame.value = lifted;
                frame.ref_in = None;
                frame.awaiting = None;
                frame.matched = true;
                self.pending_call = None;
                self.paused = false;
            }
        }
        Ok(())
    }

    // === shared evaluator machinery (used by handlers) ===

    pub(crate) fn top(&self) -> &Frame {
        self.frames.last().expect("dispatch requires a frame")
    }

    pub(crate) fn top_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("dispatch requires a frame")
    }

    pub(crate) fn native_ctx(&mut self) -> NativeCtx<'_> {
        NativeCtx {
            heap: &mut self.heap,
            realm: &self.realm,
            rng: &mut self.rng,
        }
    }

    /// Pushes a child frame inheriting scope/this from the current top.
    pub(crate) fn push_child(&mut self, node: NodeId, components: bool) {
        let top = self.top();
        let mut frame = Frame::new(node, top.scope, top.this.clone());
        frame.components = components;
        self.frames.push(frame);
    }

    /// Pops the top frame, delivering `value` to the parent's inbox.
    pub(crate) fn pop_value(&mut self, value: Value) {
        self.frames.pop();
        if let Some(parent) = self.frames.last_mut() {
            parent.value = value;
            parent.ref_in = None;
        }
    }

    /// Pops the top frame, delivering a reference.
    pub(crate) fn pop_ref(&mut self, base: Option<Value>, name: String) {
        self.frames.pop();
        if let Some(parent) = self.frames.last_mut() {
            parent.ref_in = Some((base, name));
        }
    }

    /// Pushes a synthetic call frame (getter/setter trampoline or internal
    /// invocation): func/this/args are given directly, no AST involved.
    pub(crate) fn push_synth_call(&mut self, func: Value, this: Value, arguments: Vec<Value>) {
        let top = self.top();
        let mut frame = Frame::new(top.node, top.scope, top.this.clone());
        frame.synth_call = true;
        frame.func = func;
        frame.func_this = this;
        frame.arguments = arguments;
        frame.done_args = true;
        frame.done_callee = true;
        self.frames.push(frame);
    }

    /// Resolves a reference to a value, or to the getter that must be
    /// trampolined.
    pub(crate) fn get_reference(&mut self, reference: &Reference) -> RunResult<RefGet> {
        match reference {
            (None, name) => match self.scopes.get_value(&self.heap, self.top().scope, name) {
                ScopeGet::Value(value) => Ok(RefGet::Value(value)),
                ScopeGet::Getter { base, getter } => Ok(RefGet::Getter {
                    this: Value::Ref(base),
                    func: getter,
                }),
                ScopeGet::NotFound => Err(RunError::throw(
                    ErrorKind::ReferenceError,
                    format!("{name} is not defined"),
                )),
            },
            (Some(base), name) => self.get_member(base.clone(), name),
        }
    }

    /// Property read from an arbitrary base value, handling primitive
    /// prototypes and string magic.
    pub(crate) fn get_member(&mut self, base: Value, name: &str) -> RunResult<RefGet> {
        let start = match &base {
            Value::Undefined | Value::Null => {
                return Err(RunError::throw(
                    ErrorKind::TypeError,
                    format!("Cannot read properties of {} (reading '{name}')", base.to_string_primitive()),
                ));
            }
            Value::Str(s) => {
                if name == "length" {
                    return Ok(RefGet::Value(Value::Number(s.encode_utf16().count() as f64)));
                }
                if let Some(index) = crate::value::array_index(name) {
                    let units: Vec<u16> = s.encode_utf16().collect();
                    return Ok(match units.get(index as usize) {
                        Some(&unit) => RefGet::Value(Value::Str(String::from_utf16_lossy(&[unit]))),
                        None => RefGet::Value(Value::Undefined),
                    });
                }
                self.realm.string_proto
            }
            Value::Number(_) => self.realm.number_proto,
            Value::Bool(_) => self.realm.boolean_proto,
            Value::Ref(id) => *id,
        };
        Ok(match self.heap.get_prop(start, name) {
            PropGet::Value(value) => RefGet::Value(value),
            PropGet::Getter(func) => RefGet::Getter { this: base, func },
        })
    }

    /// Writes through a reference; `RefPut::Setter` asks the caller to
    /// trampoline (the assigned value stays the expression result).
    pub(crate) fn put_reference(&mut self, reference: &Reference, value: Value) -> RunResult<RefPut> {
        let strict = self.scopes.strict(self.top().scope);
        match reference {
            (None, name) => {
                let scope = self.top().scope;
                match self.scopes.set_value(&mut self.heap, scope, name, value)? {
                    crate::scope::ScopeSet::Done => Ok(RefPut::Done),
                    crate::scope::ScopeSet::CallSetter { base, setter } => Ok(RefPut::Setter {
                        this: Value::Ref(base),
                        func: setter,
                    }),
                    crate::scope::ScopeSet::Rejected => {
                        if strict {
                            Err(RunError::throw(
                                ErrorKind::TypeError,
                                format!("Cannot assign to read only property '{name}'"),
                            ))
                        } else {
                            Ok(RefPut::Done)
                        }
                    }
                    crate::scope::ScopeSet::Unresolved => Err(RunError::throw(
                        ErrorKind::ReferenceError,
                        format!("{name} is not defined"),
                    )),
                }
            }
            (Some(base), name) => match base {
                Value::Undefined | Value::Null => Err(RunError::throw(
                    ErrorKind::TypeError,
                    format!("Cannot set properties of {}", base.to_string_primitive()),
                )),
                Value::Str(_) | Value::Number(_) | Value::Bool(_) => {
                    // Writes to primitives evaporate; strict mode objects.
                    if strict {
                        Err(RunError::throw(
                            ErrorKind::TypeError,
                            format!("Cannot create property '{name}' on a primitive"),
                        ))
                    } else {
                        Ok(RefPut::Done)
                    }
                }
                Value::Ref(id) => match self.heap.set_prop(*id, name, value)? {
                    SetOutcome::Done => Ok(RefPut::Done),
                    SetOutcome::CallSetter(func) => Ok(RefPut::Setter {
                        this: base.clone(),
                        func,
                    }),
                    SetOutcome::Rejected => {
                        if strict {
                            Err(RunError::throw(
                                ErrorKind::TypeError,
                                format!("Cannot assign to read only property '{name}'"),
                            ))
                        } else {
                            Ok(RefPut::Done)
                        }
                    }
                },
            },
        }
    }

    /// Builds a guest function object for a FunctionDeclaration/Expression.
    pub(crate) fn create_function(&mut self, node: NodeId, scope: ScopeId) -> ObjectId {
        let (name, length) = match self.ast.kind(node) {
            NodeKind::FunctionDeclaration { id, params, .. } => {
                (self.ast.ident_name(*id).to_string(), params.len())
            }
            NodeKind::FunctionExpression { id, params, .. } => (
                id.map(|id| self.ast.ident_name(id).to_string()).unwrap_or_default(),
                params.len(),
            ),
            other => unreachable!("not a function node: {}", other.type_str()),
        };
        let func = self
            .heap
            .alloc(JsObject::new(Some(self.realm.function_proto), JsClass::Function));
        let prototype = self.realm.create_plain_object(&mut self.heap);
        self.heap
            .get_mut(prototype)
            .properties
            .insert("constructor".to_string(), Prop::builtin(Value::Ref(func)));
        let object = self.heap.get_mut(func);
        object.func = Some(FuncKind::Guest { node, scope });
        object.properties.insert(
            "prototype".to_string(),
            Prop {
                value: Value::Ref(prototype),
                writable: true,
                enumerable: false,
                configurable: false,
            },
        );
        object.properties.insert(
            "length".to_string(),
            Prop {
                value: Value::Number(length as f64),
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
        func
    }

    /// Single hoisting pass: binds `var` names to undefined and builds
    /// function-declaration objects immediately.
    pub(crate) fn hoist_into(&mut self, scope: ScopeId, body: NodeId) {
        let mut decls = Vec::new();
        hoist_declarations(&self.ast, body, &mut |decl| decls.push(decl));
        for decl in decls {
            match decl {
                HoistedDecl::Var(name) => {
                    self.scopes.declare(&mut self.heap, scope, &name, Value::Undefined, false);
                }
                HoistedDecl::Func { name, node } => {
                    let func = self.create_function(node, scope);
                    self.scopes.declare(&mut self.heap, scope, &name, Value::Ref(func), true);
                }
            }
        }
    }

    fn hoist_statement(&mut self, scope: ScopeId, statement: NodeId) {
        self.hoist_into(scope, statement);
    }

    /// The `arguments` object for a guest call.
    pub(crate) fn create_arguments(&mut self, args: &[Value], callee: ObjectId) -> ObjectId {
        let id = self.heap.alloc(JsObject::new(Some(self.realm.object_proto), JsClass::Arguments));
        for (index, value) in args.iter().enumerate() {
            self.heap
                .get_mut(id)
                .properties
                .insert(index.to_string(), Prop::plain(value.clone()));
        }
        let object = self.heap.get_mut(id);
        object
            .properties
            .insert("length".to_string(), Prop::builtin(Value::Number(args.len() as f64)));
        object
            .properties
            .insert("callee".to_string(), Prop::builtin(Value::Ref(callee)));
        id
    }

    /// Unwinds the stack with an abrupt completion (spec `unwind`).
    pub(crate) fn unwind(&mut self, completion: Completion) -> Result<(), Exception> {
        loop {
            let Some(top) = self.frames.last_mut() else {
                return match completion {
                    Completion::Throw(value) => Err(self.throw_to_exception(&value)),
                    other => Err(Exception::new(
                        ErrorKind::Error,
                        format!("abrupt completion escaped the program: {other:?}"),
                    )),
                };
            };

            // try/finally intercepts every completion kind.
            if !top.synth_call && matches!(self.ast.kind(top.node), NodeKind::TryStatement { .. }) {
                // A completion thrown out of the finalizer replaces the
                // stashed one and the frame can only re-raise.
                if top.mode == 3 {
                    top.mode = 4;
                }
                top.cv = Some(completion);
                return Ok(());
            }

            match &completion {
                Completion::Return(value) => {
                    let is_call = top.synth_call
                        || matches!(
                            self.ast.kind(top.node),
                            NodeKind::CallExpression { .. } | NodeKind::NewExpression { .. }
                        );
                    if is_call && top.done_exec {
                        top.value = value.clone();
                        top.ref_in = None;
                        // Marks the invocation as explicitly returned; a
                        // body that merely runs off its end completes with
                        // undefined instead of its last statement value.
                        top.matched = true;
                        return Ok(());
                    }
                }
                Completion::Break(label) => {
                    let hit = match label {
                        Some(name) => top.labels.iter().any(|l| l == name),
                        None => top.is_loop || top.is_switch,
                    };
                    if hit {
                        self.frames.pop();
                        if let Some(parent) = self.frames.last_mut() {
                            parent.value = Value::Undefined;
                            parent.ref_in = None;
                        }
                        return Ok(());
                    }
                }
                Completion::Continue(label) => {
                    let hit = match label {
                        Some(name) => top.is_loop && top.labels.iter().any(|l| l == name),
                        None => top.is_loop,
                    };
                    if hit {
                        // The loop frame resumes exactly as if its body had
                        // completed normally.
                        return Ok(());
                    }
                }
                Completion::Throw(_) => {}
            }
            self.frames.pop();
        }
    }

    /// Converts an uncaught guest throw into the matching host exception.
    fn throw_to_exception(&self, value: &Value) -> Exception {
        if let Value::Ref(id) = value
            && self.heap.get(*id).class == JsClass::Error
        {
            let name = match self.heap.get_prop(*id, "name") {
                PropGet::Value(v) => self.heap.to_js_string(&v),
                PropGet::Getter(_) => "Error".to_string(),
            };
            let message = match self.heap.get_prop(*id, "message") {
                PropGet::Value(v) => self.heap.to_js_string(&v),
                PropGet::Getter(_) => String::new(),
            };
            let kind = name.parse().unwrap_or(ErrorKind::Error);
            return Exception::new(kind, message);
        }
        Exception::new(ErrorKind::Error, self.heap.to_js_string(value))
    }

    pub(crate) fn host_fn_call(&mut self, id: u32, args: &[Value]) -> RunResult<Value> {
        let lowered: Vec<Object> = args.iter().map(|arg| lower_value(&self.heap, arg)).collect();
        let meta_name = self.host_fn_meta[id as usize].name.clone();
        let result = match self.host_fns.get_mut(id as usize).and_then(Option::as_mut) {
            Some(HostImpl::Sync(f)) => f(lowered),
            _ => return Err(RunError::UnboundNative(meta_name)),
        };
        self.lift(&result)
    }

    /// Starts an async host call: invokes the host closure with a resolver
    /// and pauses. The top frame is marked awaiting.
    pub(crate) fn host_async_call(&mut self, id: u32, args: &[Value]) -> RunResult<()> {
        let lowered: Vec<Object> = args.iter().map(|arg| lower_value(&self.heap, arg)).collect();
        let call_id = self.next_call_id;
        self.next_call_id += 1;
        let resolver = Resolver {
            call_id,
            cell: Rc::clone(&self.pending_results),
        };
        let meta_name = self.host_fn_meta[id as usize].name.clone();
        let Some(HostImpl::Async(f)) = self.host_fns.get_mut(id as usize).and_then(Option::as_mut) else {
            return Err(RunError::UnboundNative(meta_name));
        };
        f(lowered, resolver);
        self.pending_call = Some(call_id);
        self.paused = true;
        let frame = self.top_mut();
        frame.awaiting = Some(call_id);
        frame.done_exec = true;
        Ok(())
    }
}

/// Result of resolving a reference for reading.
pub(crate) enum RefGet {
    Value(Value),
    Getter { this: Value, func: ObjectId },
}

/// Result of resolving a reference for writing.
pub(crate) enum RefPut {
    Done,
    Setter { this: Value, func: ObjectId },
}

/// Host descriptor options for [`Interpreter::define_property`].
#[derive(Debug, Clone, Default)]
pub struct HostDescriptor {
    pub value: Option<Object>,
    pub writable: Option<bool>,
    pub enumerable: Option<bool>,
    pub configurable: Option<bool>,
    pub get: Option<ObjectId>,
    pub set: Option<ObjectId>,
}

fn host_error_to_exception(error: &RunError) -> Exception {
    match error {
        RunError::Throw(_) => Exception::new(ErrorKind::Error, "guest error escaped through a host path"),
        RunError::ThrowNew(kind, message) => Exception::new(*kind, message.clone()),
        RunError::AppendAfterCompletion => {
            Exception::new(ErrorKind::Error, "append_code requires the root Program frame")
        }
        RunError::CyclicProto => Exception::new(ErrorKind::Error, "prototype assignment would create a cycle"),
        RunError::UnboundNative(name) => Exception::new(
            ErrorKind::Error,
            format!("native binding {name} was not re-registered after load"),
        ),
        RunError::Internal(message) => Exception::new(ErrorKind::Error, format!("internal error: {message}")),
    }
}
