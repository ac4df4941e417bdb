use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{ast::NodeId, heap::ObjectId, scope::ScopeId, value::Value};

/// Abrupt-completion record carried by `unwind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) enum Completion {
    Break(Option<String>),
    Continue(Option<String>),
    Return(Value),
    Throw(Value),
}

/// A reference produced by evaluating an expression in target position:
/// `(base, name)`. A `None` base means a scope (identifier) reference.
pub(crate) type Reference = (Option<Value>, String);

/// One record of the explicit evaluator stack: the node under evaluation,
/// its environment, and the handler's in-progress sub-state.
///
/// Handlers advance through deterministic sub-states via the `done_*`
/// booleans and the scratch fields; the host may suspend between any two
/// steps and the whole stack (this struct included) serializes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Frame {
    pub node: NodeId,
    pub scope: ScopeId,
    pub this: Value,

    // Sub-state flags.
    pub done_left: bool,
    pub done_right: bool,
    pub done_callee: bool,
    pub done_args: bool,
    pub done_getter: bool,
    pub done_setter: bool,
    pub done_object: bool,
    pub done_exec: bool,
    /// Phase counter for the loop/try/switch state machines.
    pub mode: u8,

    // Result inboxes written by a popping child.
    pub value: Value,
    pub ref_in: Option<Reference>,

    /// This frame must produce a reference instead of a value (assignment
    /// targets, delete/typeof operands).
    pub components: bool,

    // Scratch.
    pub left: Value,
    pub func: Value,
    pub func_this: Value,
    pub arguments: Vec<Value>,
    pub saved_ref: Option<Reference>,
    pub index: usize,
    pub n: usize,
    pub aux: Option<u32>,

    // for-in iteration state.
    pub iter_obj: Option<ObjectId>,
    pub keys: Vec<String>,
    pub visited: AHashSet<String>,

    pub switch_value: Value,
    pub matched: bool,

    pub labels: SmallVec<[String; 2]>,
    pub is_loop: bool,
    pub is_switch: bool,
    pub is_ctor: bool,

    /// Stashed completion for a TryStatement mid-unwind.
    pub cv: Option<Completion>,
    /// Getter/setter trampoline: dispatch ignores the node kind and runs
    /// the stored func/this/arguments as a synthetic call.
    pub synth_call: bool,
    /// Pending async host call id; resolution fills `value` and clears it.
    pub awaiting: Option<u32>,
}

impl Frame {
    pub(crate) fn new(node: NodeId, scope: ScopeId, this: Value) -> Self {
        Self {
            node,
            scope,
            this,
            done_left: false,
            done_right: false,
            done_callee: false,
            done_args: false,
            done_getter: false,
            done_setter: false,
            done_object: false,
            done_exec: false,
            mode: 0,
            value: Value::Undefined,
            ref_in: None,
            components: false,
            left: Value::Undefined,
            func: Value::Undefined,
            func_this: Value::Undefined,
            arguments: Vec::new(),
            saved_ref: None,
            index: 0,
            n: 0,
            aux: None,
            iter_obj: None,
            keys: Vec::new(),
            visited: AHashSet::new(),
            switch_value: Value::Undefined,
            matched: false,
            labels: SmallVec::new(),
            is_loop: false,
            is_switch: false,
            is_ctor: false,
            cv: None,
            synth_call: false,
            awaiting: None,
        }
    }
}
