use serde::{Deserialize, Serialize};

use crate::{
    ast::{Ast, NodeId, NodeKind},
    heap::{Heap, ObjectId, PropGet, SetOutcome},
    value::Value,
};

/// Index of a scope in the scope arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScopeId(u32);

impl ScopeId {
    pub(crate) fn new(index: usize) -> Self {
        Self(u32::try_from(index).expect("scope arena exceeds u32 count"))
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// One scope: a property table (a heap object) chained to a parent.
///
/// For `with` scopes the table is the with-object itself and lookups are
/// prototype-aware; ordinary scopes only consult own properties. The global
/// scope's table is the global object and is also prototype-aware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Scope {
    pub object: ObjectId,
    pub parent: Option<ScopeId>,
    pub strict: bool,
    /// Lookup sees the object's own + inherited properties (with/global).
    pub chain_lookup: bool,
}

/// Result of an identifier read.
#[derive(Debug)]
pub(crate) enum ScopeGet {
    Value(Value),
    /// An accessor on a with-object or the global object; the evaluator
    /// trampolines through it with the holding object as `this`.
    Getter { base: ObjectId, getter: ObjectId },
    NotFound,
}

/// Result of an identifier write.
#[derive(Debug)]
pub(crate) enum ScopeSet {
    Done,
    CallSetter { base: ObjectId, setter: ObjectId },
    /// Assignment to a non-writable binding; strict callers throw.
    Rejected,
    /// No binding anywhere and strict mode forbids implicit globals.
    Unresolved,
}

/// A declaration surfaced by the hoisting pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum HoistedDecl {
    Var(String),
    Func { name: String, node: NodeId },
}

/// Single hoisting pass over a function (or program) body.
///
/// `VariableDeclaration` declarators bind as undefined; function
/// declarations surface with their node so the caller can build the
/// function object immediately. Function expressions and expression
/// statements are not descended into: nothing hoistable lives there.
pub(crate) fn hoist_declarations(ast: &Ast, node: NodeId, sink: &mut impl FnMut(HoistedDecl)) {
    match ast.kind(node) {
        NodeKind::VariableDeclaration { declarations } => {
            for &declarator in declarations {
                let NodeKind::VariableDeclarator { id, .. } = ast.kind(declarator) else {
                    continue;
                };
                sink(HoistedDecl::Var(ast.ident_name(*id).to_string()));
            }
        }
        NodeKind::FunctionDeclaration { id, .. } => {
            sink(HoistedDecl::Func {
                name: ast.ident_name(*id).to_string(),
                node,
            });
        }
        NodeKind::FunctionExpression { .. } | NodeKind::ExpressionStatement { .. } => {}
        other => {
            let mut children = Vec::new();
            other.children(&mut children);
            for child in children {
                hoist_declarations(ast, child, sink);
            }
        }
    }
}

/// Arena of scopes. Scopes are created at function entry, `catch`, and
/// `with`; they outlive their syntactic extent iff captured by a closure,
/// which the arena makes trivially true.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Scopes {
    scopes: Vec<Scope>,
}

impl Scopes {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn alloc(&mut self, scope: Scope) -> ScopeId {
        let id = ScopeId::new(self.scopes.len());
        self.scopes.push(scope);
        id
    }

    pub(crate) fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub(crate) fn strict(&self, id: ScopeId) -> bool {
        self.get(id).strict
    }

    pub(crate) fn set_strict(&mut self, id: ScopeId, strict: bool) {
        self.scopes[id.index()].strict = strict;
    }

    /// Whether `name` resolves anywhere in the chain (used by `typeof`,
    /// which must not throw on undeclared identifiers).
    pub(crate) fn has(&self, heap: &Heap, mut scope: ScopeId, name: &str) -> bool {
        loop {
            let s = self.get(scope);
            let found = if s.chain_lookup || s.parent.is_none() {
                heap.has_prop(s.object, name)
            } else {
                heap.has_own_prop(s.object, name)
            };
            if found {
                return true;
            }
            match s.parent {
                Some(parent) => scope = parent,
                None => return false,
            }
        }
    }

    /// `get_value_from_scope`: walks parent scopes; the global scope (and
    /// with-scopes) get prototype-aware lookup.
    pub(crate) fn get_value(&self, heap: &Heap, mut scope: ScopeId, name: &str) -> ScopeGet {
        loop {
            let s = self.get(scope);
            let chain = s.chain_lookup || s.parent.is_none();
            let found = if chain {
                heap.has_prop(s.object, name)
            } else {
                heap.has_own_prop(s.object, name)
            };
            if found {
                return match heap.get_prop(s.object, name) {
                    PropGet::Value(value) => ScopeGet::Value(value),
                    PropGet::Getter(getter) => ScopeGet::Getter {
                        base: s.object,
                        getter,
                    },
                };
            }
            match s.parent {
                Some(parent) => scope = parent,
                None => return ScopeGet::NotFound,
            }
        }
    }

    /// `set_value_to_scope`: writes to the nearest scope containing `name`;
    /// otherwise falls through to the global object unless strict.
    pub(crate) fn set_value(
        &self,
        heap: &mut Heap,
        start: ScopeId,
        name: &str,
        value: Value,
    ) -> crate::error::RunResult<ScopeSet> {
        let strict = self.strict(start);
        let mut scope = start;
        loop {
            let s = self.get(scope);
            let chain = s.chain_lookup || s.parent.is_none();
            let found = if chain {
                heap.has_prop(s.object, name)
            } else {
                heap.has_own_prop(s.object, name)
            };
            if found {
                let base = s.object;
                return Ok(match heap.set_prop(base, name, value)? {
                    SetOutcome::Done => ScopeSet::Done,
                    SetOutcome::CallSetter(setter) => ScopeSet::CallSetter { base, setter },
                    SetOutcome::Rejected => ScopeSet::Rejected,
                });
            }
            match s.parent {
                Some(parent) => scope = parent,
                None => {
                    if strict {
                        return Ok(ScopeSet::Unresolved);
                    }
                    // Implicit global.
                    let base = s.object;
                    return Ok(match heap.set_prop(base, name, value)? {
                        SetOutcome::Done => ScopeSet::Done,
                        SetOutcome::CallSetter(setter) => ScopeSet::CallSetter { base, setter },
                        SetOutcome::Rejected => ScopeSet::Rejected,
                    });
                }
            }
        }
    }

    /// `delete` on an identifier: removes the binding from the scope that
    /// holds it. Variable bindings are non-configurable, so this is a
    /// refused no-op for them; implicit globals delete normally.
    pub(crate) fn delete(&self, heap: &mut Heap, mut scope: ScopeId, name: &str) -> bool {
        loop {
            let s = self.get(scope);
            let chain = s.chain_lookup || s.parent.is_none();
            let found = if chain {
                heap.has_prop(s.object, name)
            } else {
                heap.has_own_prop(s.object, name)
            };
            if found {
                return heap.delete_prop(s.object, name);
            }
            match s.parent {
                Some(parent) => scope = parent,
                None => return true,
            }
        }
    }

    /// Declares a binding in exactly this scope if it isn't there already.
    pub(crate) fn declare(&self, heap: &mut Heap, scope: ScopeId, name: &str, value: Value, overwrite: bool) {
        let object = self.get(scope).object;
        if overwrite || !heap.has_own_prop(object, name) {
            // Bindings are writable and enumerable but never configurable,
            // which is what makes `delete x` a refused no-op.
            heap.get_mut(object).properties.insert(
                name.to_string(),
                crate::heap::Prop {
                    value,
                    writable: true,
                    enumerable: true,
                    configurable: false,
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        heap::{JsClass, JsObject},
        parse::{ParseOptions, parse_program},
    };

    fn scope_fixture() -> (Heap, Scopes, ScopeId, ScopeId) {
        let mut heap = Heap::new();
        let mut scopes = Scopes::new();
        let global_object = heap.alloc(JsObject::new(None, JsClass::Global));
        let global = scopes.alloc(Scope {
            object: global_object,
            parent: None,
            strict: false,
            chain_lookup: true,
        });
        let local_object = heap.alloc(JsObject::new(None, JsClass::Object));
        let local = scopes.alloc(Scope {
            object: local_object,
            parent: Some(global),
            strict: false,
            chain_lookup: false,
        });
        (heap, scopes, global, local)
    }

    #[test]
    fn lookup_walks_to_global() {
        let (mut heap, scopes, global, local) = scope_fixture();
        scopes.declare(&mut heap, global, "g", Value::Number(1.0), false);
        assert!(matches!(
            scopes.get_value(&heap, local, "g"),
            ScopeGet::Value(Value::Number(n)) if n == 1.0
        ));
        assert!(matches!(scopes.get_value(&heap, local, "missing"), ScopeGet::NotFound));
    }

    #[test]
    fn local_shadows_global() {
        let (mut heap, scopes, global, local) = scope_fixture();
        scopes.declare(&mut heap, global, "x", Value::Number(1.0), false);
        scopes.declare(&mut heap, local, "x", Value::Number(2.0), false);
        assert!(matches!(
            scopes.get_value(&heap, local, "x"),
            ScopeGet::Value(Value::Number(n)) if n == 2.0
        ));
    }

    #[test]
    fn assignment_targets_declaring_scope() {
        let (mut heap, scopes, global, local) = scope_fixture();
        scopes.declare(&mut heap, global, "x", Value::Number(1.0), false);
        scopes.set_value(&mut heap, local, "x", Value::Number(5.0)).unwrap();
        assert!(matches!(
            scopes.get_value(&heap, global, "x"),
            ScopeGet::Value(Value::Number(n)) if n == 5.0
        ));
    }

    #[test]
    fn implicit_global_unless_strict() {
        let (mut heap, mut scopes, global, local) = scope_fixture();
        assert!(matches!(
            scopes.set_value(&mut heap, local, "implicit", Value::Null).unwrap(),
            ScopeSet::Done
        ));
        assert!(matches!(scopes.get_value(&heap, global, "implicit"), ScopeGet::Value(_)));

        let strict_local = {
            let object = heap.alloc(JsObject::new(None, JsClass::Object));
            scopes.alloc(Scope {
                object,
                parent: Some(global),
                strict: true,
                chain_lookup: false,
            })
        };
        assert!(matches!(
            scopes.set_value(&mut heap, strict_local, "nope", Value::Null).unwrap(),
            ScopeSet::Unresolved
        ));
    }

    #[test]
    fn hoisting_collects_vars_and_functions() {
        let mut ast = Ast::new();
        let program = parse_program(
            &mut ast,
            "var a = 1; if (a) { var b; } function f() { var inner; } x = function g() {};",
            &ParseOptions::default(),
            None,
            None,
        )
        .unwrap();
        let mut decls = Vec::new();
        hoist_declarations(&ast, program, &mut |d| decls.push(d));
        let names: Vec<String> = decls
            .iter()
            .map(|d| match d {
                HoistedDecl::Var(name) => name.clone(),
                HoistedDecl::Func { name, .. } => format!("fn:{name}"),
            })
            .collect();
        // `inner` stays inside f; `g` is an expression and is skipped.
        assert_eq!(names, vec!["a", "b", "fn:f"]);
    }

    #[test]
    fn for_in_loop_variable_hoists() {
        let mut ast = Ast::new();
        let program = parse_program(
            &mut ast,
            "for (var k in o) {}",
            &ParseOptions::default(),
            None,
            None,
        )
        .unwrap();
        let mut decls = Vec::new();
        hoist_declarations(&ast, program, &mut |d| decls.push(d));
        assert_eq!(decls, vec![HoistedDecl::Var("k".to_string())]);
    }
}
