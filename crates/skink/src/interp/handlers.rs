//! One handler per AST node kind.
//!
//! Each dispatch inspects the top frame, advances its sub-state, and does
//! exactly one of: push a child frame, mutate scratch state, or pop with a
//! result. That discipline keeps every point between two steps a valid
//! suspension point.

use crate::{
    ast::{LitValue, NodeId, NodeKind, PropertyKind, UnaryOp, UpdateOp},
    builtins::{self, NativeFunc},
    error::{ErrorKind, RunError, RunResult},
    heap::{FuncKind, JsClass, JsObject, ObjectId, PropDescriptor, RegexpData},
    interp::{Completion, Frame, Interpreter, RefGet, RefPut, operators},
    scope::{Scope, ScopeId},
    value::Value,
};

impl Interpreter {
    pub(crate) fn dispatch_top(&mut self) -> RunResult<()> {
        if self.top().synth_call {
            return self.step_invocation(false);
        }
        let node = self.top().node;
        // Immutable pattern probe only; data is re-borrowed per handler.
        match self.ast.kind(node) {
            NodeKind::Program { .. } | NodeKind::BlockStatement { .. } => self.step_statement_list(node),
            NodeKind::ExpressionStatement { .. } => self.step_expression_statement(node),
            NodeKind::EmptyStatement | NodeKind::DebuggerStatement | NodeKind::FunctionDeclaration { .. } => {
                // Function declarations were hoisted; these are no-ops.
                self.pop_value(Value::Undefined);
                Ok(())
            }
            NodeKind::IfStatement { .. } | NodeKind::ConditionalExpression { .. } => self.step_conditional(node),
            NodeKind::WhileStatement { .. } | NodeKind::DoWhileStatement { .. } => self.step_while(node),
            NodeKind::ForStatement { .. } => self.step_for(node),
            NodeKind::ForInStatement { .. } => self.step_for_in(node),
            NodeKind::BreakStatement { .. } | NodeKind::ContinueStatement { .. } => self.step_break_continue(node),
            NodeKind::ReturnStatement { .. } => self.step_return(node),
            NodeKind::ThrowStatement { .. } => self.step_throw(node),
            NodeKind::TryStatement { .. } => self.step_try(node),
            NodeKind::WithStatement { .. } => self.step_with(node),
            NodeKind::LabeledStatement { .. } => self.step_labeled(node),
            NodeKind::SwitchStatement { .. } => self.step_switch(node),
            NodeKind::SwitchCase { .. } | NodeKind::CatchClause { .. } | NodeKind::Property { .. }
            | NodeKind::VariableDeclarator { .. } => {
                unreachable!("handled inline by the parent's handler")
            }
            NodeKind::VariableDeclaration { .. } => self.step_var_declaration(node),
            NodeKind::SequenceExpression { .. } => self.step_sequence(node),
            NodeKind::AssignmentExpression { .. } => self.step_assignment(node),
            NodeKind::BinaryExpression { .. } => self.step_binary(node),
            NodeKind::LogicalExpression { .. } => self.step_logical(node),
            NodeKind::UnaryExpression { .. } => self.step_unary(node),
            NodeKind::UpdateExpression { .. } => self.step_update(node),
            NodeKind::MemberExpression { .. } => self.step_member(node),
            NodeKind::CallExpression { .. } => self.step_call(node, false),
            NodeKind::NewExpression { .. } => self.step_call(node, true),
            NodeKind::ThisExpression => {
                let this = self.top().this.clone();
                self.pop_value(this);
                Ok(())
            }
            NodeKind::Identifier { .. } => self.step_identifier(node),
            NodeKind::Literal { .. } => self.step_literal(node),
            NodeKind::ArrayExpression { .. } => self.step_array_literal(node),
            NodeKind::ObjectExpression { .. } => self.step_object_literal(node),
            NodeKind::FunctionExpression { .. } => {
                let scope = self.top().scope;
                let func = self.create_function(node, scope);
                self.pop_value(Value::Ref(func));
                Ok(())
            }
        }
    }

    // === statements ===

    fn step_statement_list(&mut self, node: NodeId) -> RunResult<()> {
        let index = self.top().index;
        let next = match self.ast.kind(node) {
            NodeKind::Program { body, .. } | NodeKind::BlockStatement { body } => body.get(index).copied(),
            _ => unreachable!(),
        };
        match next {
            Some(statement) => {
                self.top_mut().index += 1;
                self.push_child(statement, false);
            }
            None => {
                if self.frames.len() == 1 {
                    // The root Program frame is never popped; `step`
                    // reports completion once the body is exhausted.
                    return Ok(());
                }
                let value = self.top().value.clone();
                self.pop_value(value);
            }
        }
        Ok(())
    }

    fn step_expression_statement(&mut self, node: NodeId) -> RunResult<()> {
        let NodeKind::ExpressionStatement { expression } = self.ast.kind(node) else {
            unreachable!()
        };
        let expression = *expression;
        if !self.top().done_exec {
            self.top_mut().done_exec = true;
            self.push_child(expression, false);
            return Ok(());
        }
        let value = self.top().value.clone();
        // Polyfill statements carry no span and stay invisible here.
        if self.ast.node(node).span.is_some() {
            self.last_value = value.clone();
        }
        self.pop_value(value);
        Ok(())
    }

    fn step_conditional(&mut self, node: NodeId) -> RunResult<()> {
        let (test, consequent, alternate, is_expression) = match self.ast.kind(node) {
            NodeKind::IfStatement {
                test,
                consequent,
                alternate,
            } => (*test, *consequent, *alternate, false),
            NodeKind::ConditionalExpression {
                test,
                consequent,
                alternate,
            } => (*test, *consequent, Some(*alternate), true),
            _ => unreachable!(),
        };
        let frame = self.top_mut();
        match frame.mode {
            0 => {
                frame.mode = 1;
                self.push_child(test, false);
            }
            1 => {
                frame.mode = 2;
                let branch = if frame.value.to_boolean() {
                    Some(consequent)
                } else {
                    alternate
                };
                match branch {
                    Some(branch) => self.push_child(branch, false),
                    None => self.pop_value(Value::Undefined),
                }
            }
            _ => {
                let value = if is_expression {
                    self.top().value.clone()
                } else {
                    Value::Undefined
                };
                self.pop_value(value);
            }
        }
        Ok(())
    }

    fn step_while(&mut self, node: NodeId) -> RunResult<()> {
        let (test, body, starts_in_body) = match self.ast.kind(node) {
            NodeKind::WhileStatement { test, body } => (*test, *body, false),
            NodeKind::DoWhileStatement { body, test } => (*test, *body, true),
            _ => unreachable!(),
        };
        let frame = self.top_mut();
        match frame.mode {
            0 => {
                frame.is_loop = true;
                if starts_in_body {
                    frame.mode = 2;
                    self.push_child(body, false);
                } else {
                    frame.mode = 1;
                    self.push_child(test, false);
                }
            }
            1 => {
                if frame.value.to_boolean() {
                    frame.mode = 2;
                    self.push_child(body, false);
                } else {
                    self.pop_value(Value::Undefined);
                }
            }
            _ => {
                frame.mode = 1;
                self.push_child(test, false);
            }
        }
        Ok(())
    }

    fn step_for(&mut self, node: NodeId) -> RunResult<()> {
        let NodeKind::ForStatement {
            init,
            test,
            update,
            body,
        } = self.ast.kind(node)
        else {
            unreachable!()
        };
        let (init, test, update, body) = (*init, *test, *update, *body);
        let frame = self.top_mut();
        match frame.mode {
            0 => {
                frame.is_loop = true;
                frame.mode = 1;
                if let Some(init) = init {
                    self.push_child(init, false);
                }
            }
            1 => match test {
                Some(test) => {
                    frame.mode = 2;
                    self.push_child(test, false);
                }
                None => {
                    frame.value = Value::Bool(true);
                    frame.mode = 2;
                }
            },
            2 => {
                if frame.value.to_boolean() {
                    frame.mode = 3;
                    self.push_child(body, false);
                } else {
                    self.pop_value(Value::Undefined);
                }
            }
            3 => match update {
                Some(update) => {
                    frame.mode = 4;
                    self.push_child(update, false);
                }
                None => frame.mode = 1,
            },
            _ => frame.mode = 1,
        }
        Ok(())
    }

    fn step_for_in(&mut self, node: NodeId) -> RunResult<()> {
        let NodeKind::ForInStatement { left, right, body } = self.ast.kind(node) else {
            unreachable!()
        };
        let (left, right, body) = (*left, *right, *body);
        match self.top().mode {
            0 => {
                let frame = self.top_mut();
                frame.is_loop = true;
                frame.mode = 1;
                self.push_child(right, false);
            }
            1 => {
                let value = self.top().value.clone();
                let object = match value {
                    Value::Undefined | Value::Null => {
                        self.pop_value(Value::Undefined);
                        return Ok(());
                    }
                    Value::Ref(id) => id,
                    primitive => self
                        .realm
                        .box_primitive(&mut self.heap, &primitive)
                        .expect("non-null primitives box"),
                };
                let keys = self.heap.own_keys(object);
                let frame = self.top_mut();
                frame.iter_obj = Some(object);
                frame.keys = keys;
                frame.index = 0;
                frame.mode = 2;
            }
            2 => self.step_for_in_next_key(left, body)?,
            3 => {
                // The left reference arrived; store the key through it.
                let key = self.top().switch_value.clone();
                let reference = self
                    .top_mut()
                    .ref_in
                    .take()
                    .ok_or_else(|| RunError::Internal("for-in target produced no reference".to_string()))?;
                match self.put_reference(&reference, key.clone())? {
                    RefPut::Done => {
                        self.top_mut().mode = 4;
                        self.push_child(body, false);
                    }
                    RefPut::Setter { this, func } => {
                        self.top_mut().mode = 5;
                        self.push_synth_call(Value::Ref(func), this, vec![key]);
                    }
                }
            }
            4 => {
                self.top_mut().mode = 2;
            }
            _ => {
                // Setter trampoline finished; run the body.
                self.top_mut().mode = 4;
                self.push_child(body, false);
            }
        }
        Ok(())
    }

    /// Advances to the next enumerable, not-yet-visited key, walking up the
    /// prototype chain as each object's snapshot is exhausted.
    fn step_for_in_next_key(&mut self, left: NodeId, body: NodeId) -> RunResult<()> {
        loop {
            let (object, index, exhausted) = {
                let frame = self.top();
                match frame.iter_obj {
                    Some(object) => (object, frame.index, frame.index >= frame.keys.len()),
                    None => {
                        self.pop_value(Value::Undefined);
                        return Ok(());
                    }
                }
            };
            if exhausted {
                let proto = self.heap.get(object).proto;
                let keys = proto.map(|p| self.heap.own_keys(p)).unwrap_or_default();
                let frame = self.top_mut();
                frame.iter_obj = proto;
                frame.keys = keys;
                frame.index = 0;
                if proto.is_none() {
                    self.pop_value(Value::Undefined);
                    return Ok(());
                }
                continue;
            }
            let key = self.top().keys[index].clone();
            self.top_mut().index += 1;
            if !self.top_mut().visited.insert(key.clone()) {
                continue;
            }
            // Deleted keys are skipped; non-enumerable ones still shadow.
            let live = self
                .heap
                .get(object)
                .properties
                .get(&key)
                .is_some_and(|prop| prop.enumerable);
            if !live {
                continue;
            }
            self.top_mut().switch_value = Value::Str(key.clone());
            // `var k` targets resolve directly; expressions re-evaluate as
            // a reference every iteration.
            if let NodeKind::VariableDeclaration { declarations } = self.ast.kind(left) {
                let declarator = declarations[0];
                let NodeKind::VariableDeclarator { id, .. } = self.ast.kind(declarator) else {
                    unreachable!()
                };
                let name = self.ast.ident_name(*id).to_string();
                let reference = (None, name);
                match self.put_reference(&reference, Value::Str(key.clone()))? {
                    RefPut::Done => {
                        self.top_mut().mode = 4;
                        self.push_child(body, false);
                    }
                    RefPut::Setter { this, func } => {
                        self.top_mut().mode = 5;
                        self.push_synth_call(Value::Ref(func), this, vec![Value::Str(key)]);
                    }
                }
            } else {
                self.top_mut().mode = 3;
                self.push_child(left, true);
            }
            return Ok(());
        }
    }

    fn step_break_continue(&mut self, node: NodeId) -> RunResult<()> {
        let (label, is_break) = match self.ast.kind(node) {
            NodeKind::BreakStatement { label } => (*label, true),
            NodeKind::ContinueStatement { label } => (*label, false),
            _ => unreachable!(),
        };
        let label = label.map(|id| self.ast.ident_name(id).to_string());
        self.frames.pop();
        let completion = if is_break {
            Completion::Break(label)
        } else {
            Completion::Continue(label)
        };
        self.unwind(completion)
            .map_err(|e| RunError::Internal(e.to_string()))
    }

    fn step_return(&mut self, node: NodeId) -> RunResult<()> {
        let NodeKind::ReturnStatement { argument } = self.ast.kind(node) else {
            unreachable!()
        };
        let argument = *argument;
        if let Some(argument) = argument
            && !self.top().done_exec
        {
            self.top_mut().done_exec = true;
            self.push_child(argument, false);
            return Ok(());
        }
        let value = if argument.is_some() {
            self.top().value.clone()
        } else {
            Value::Undefined
        };
        self.frames.pop();
        self.unwind(Completion::Return(value))
            .map_err(|e| RunError::Internal(e.to_string()))
    }

    fn step_throw(&mut self, node: NodeId) -> RunResult<()> {
        let NodeKind::ThrowStatement { argument } = self.ast.kind(node) else {
            unreachable!()
        };
        let argument = *argument;
        if !self.top().done_exec {
            self.top_mut().done_exec = true;
            self.push_child(argument, false);
            return Ok(());
        }
        let value = self.top().value.clone();
        self.frames.pop();
        Err(RunError::Throw(value))
    }

    fn step_try(&mut self, node: NodeId) -> RunResult<()> {
        let NodeKind::TryStatement {
            block,
            handler,
            finalizer,
        } = self.ast.kind(node)
        else {
            unreachable!()
        };
        let (block, handler, finalizer) = (*block, *handler, *finalizer);
        match self.top().mode {
            0 => {
                self.top_mut().mode = 1;
                self.push_child(block, false);
                Ok(())
            }
            1 => {
                // Block finished (normally or abruptly).
                if let Some(Completion::Throw(thrown)) = self.top().cv.clone()
                    && let Some(handler) = handler
                {
                    self.top_mut().cv = None;
                    let NodeKind::CatchClause { param, body } = self.ast.kind(handler) else {
                        unreachable!()
                    };
                    let (param, body) = (*param, *body);
                    let name = self.ast.ident_name(param).to_string();
                    let catch_scope = self.create_special_scope(false);
                    self.scopes.declare(&mut self.heap, catch_scope, &name, thrown, true);
                    self.top_mut().mode = 2;
                    let this = self.top().this.clone();
                    self.frames.push(Frame::new(body, catch_scope, this));
                    return Ok(());
                }
                self.enter_finalizer_or_finish(finalizer)
            }
            2 => {
                // Catch finished (normally, or its own abrupt completion is
                // stashed in cv).
                self.enter_finalizer_or_finish(finalizer)
            }
            3 => {
                // Finalizer finished normally; re-raise any stashed record.
                self.finish_try()
            }
            _ => {
                // Finalizer itself completed abruptly; its record replaced
                // the stashed one.
                self.finish_try()
            }
        }
    }

    fn enter_finalizer_or_finish(&mut self, finalizer: Option<NodeId>) -> RunResult<()> {
        match finalizer {
            Some(finalizer) => {
                self.top_mut().mode = 3;
                self.push_child(finalizer, false);
                Ok(())
            }
            None => self.finish_try(),
        }
    }

    fn finish_try(&mut self) -> RunResult<()> {
        let completion = self.top_mut().cv.take();
        self.frames.pop();
        match completion {
            None => {
                if let Some(parent) = self.frames.last_mut() {
                    parent.value = Value::Undefined;
                    parent.ref_in = None;
                }
                Ok(())
            }
            Some(Completion::Throw(value)) => Err(RunError::Throw(value)),
            Some(other) => self.unwind(other).map_err(|e| RunError::Internal(e.to_string())),
        }
    }

    fn step_with(&mut self, node: NodeId) -> RunResult<()> {
        let NodeKind::WithStatement { object, body } = self.ast.kind(node) else {
            unreachable!()
        };
        let (object, body) = (*object, *body);
        match self.top().mode {
            0 => {
                self.top_mut().mode = 1;
                self.push_child(object, false);
            }
            1 => {
                let value = self.top().value.clone();
                let object_id = self.to_object(&value)?;
                let parent = self.top().scope;
                let strict = self.scopes.strict(parent);
                let scope = self.scopes.alloc(Scope {
                    object: object_id,
                    parent: Some(parent),
                    strict,
                    chain_lookup: true,
                });
                self.top_mut().mode = 2;
                let this = self.top().this.clone();
                self.frames.push(Frame::new(body, scope, this));
            }
            _ => self.pop_value(Value::Undefined),
        }
        Ok(())
    }

    fn step_labeled(&mut self, node: NodeId) -> RunResult<()> {
        let NodeKind::LabeledStatement { label, body } = self.ast.kind(node) else {
            unreachable!()
        };
        let (label, body) = (*label, *body);
        if !self.top().done_exec {
            let name = self.ast.ident_name(label).to_string();
            let mut labels = self.top().labels.clone();
            labels.push(name);
            self.top_mut().done_exec = true;
            self.push_child(body, false);
            self.top_mut().labels = labels;
            return Ok(());
        }
        self.pop_value(Value::Undefined);
        Ok(())
    }

    fn step_switch(&mut self, node: NodeId) -> RunResult<()> {
        let NodeKind::SwitchStatement { discriminant, cases } = self.ast.kind(node) else {
            unreachable!()
        };
        let discriminant = *discriminant;
        let case_count = cases.len();
        match self.top().mode {
            0 => {
                let frame = self.top_mut();
                frame.is_switch = true;
                frame.mode = 1;
                self.push_child(discriminant, false);
            }
            1 => {
                let frame = self.top_mut();
                frame.switch_value = frame.value.clone();
                frame.index = 0;
                frame.mode = 2;
            }
            2 => {
                // Scan for a matching case; `aux` remembers a deferred
                // default clause.
                let index = self.top().index;
                if index >= case_count {
                    match self.top().aux {
                        Some(default_index) if !self.top().matched => {
                            let frame = self.top_mut();
                            frame.index = default_index as usize;
                            frame.n = 0;
                            frame.matched = true;
                            frame.mode = 4;
                        }
                        _ => self.pop_value(Value::Undefined),
                    }
                    return Ok(());
                }
                let case = self.case_at(node, index);
                let NodeKind::SwitchCase { test, .. } = self.ast.kind(case) else {
                    unreachable!()
                };
                match *test {
                    Some(test) => {
                        self.top_mut().mode = 3;
                        self.push_child(test, false);
                    }
                    None => {
                        let frame = self.top_mut();
                        frame.aux = Some(index as u32);
                        frame.index += 1;
                    }
                }
            }
            3 => {
                let frame = self.top_mut();
                if frame.value.strict_equals(&frame.switch_value) {
                    frame.matched = true;
                    frame.n = 0;
                    frame.mode = 4;
                } else {
                    frame.index += 1;
                    frame.mode = 2;
                }
            }
            _ => {
                // Fall-through execution from the matched case onward.
                let index = self.top().index;
                if index >= case_count {
                    self.pop_value(Value::Undefined);
                    return Ok(());
                }
                let case = self.case_at(node, index);
                let NodeKind::SwitchCase { consequent, .. } = self.ast.kind(case) else {
                    unreachable!()
                };
                let statement = consequent.get(self.top().n).copied();
                match statement {
                    Some(statement) => {
                        self.top_mut().n += 1;
                        self.push_child(statement, false);
                    }
                    None => {
                        let frame = self.top_mut();
                        frame.index += 1;
                        frame.n = 0;
                    }
                }
            }
        }
        Ok(())
    }

    fn case_at(&self, node: NodeId, index: usize) -> NodeId {
        let NodeKind::SwitchStatement { cases, .. } = self.ast.kind(node) else {
            unreachable!()
        };
        cases[index]
    }

    fn step_var_declaration(&mut self, node: NodeId) -> RunResult<()> {
        loop {
            let NodeKind::VariableDeclaration { declarations } = self.ast.kind(node) else {
                unreachable!()
            };
            let declarations = declarations.clone();
            let frame = self.top();
            if frame.done_setter {
                // A with-scope setter trampoline for the previous
                // declarator completed.
                let frame = self.top_mut();
                frame.done_setter = false;
                frame.index += 1;
                frame.done_exec = false;
                continue;
            }
            if frame.done_exec {
                // Initializer value arrived; assign it.
                let declarator = declarations[self.top().index];
                let NodeKind::VariableDeclarator { id, .. } = self.ast.kind(declarator) else {
                    unreachable!()
                };
                let name = self.ast.ident_name(*id).to_string();
                let value = self.top().value.clone();
                match self.put_reference(&(None, name), value.clone())? {
                    RefPut::Done => {
                        let frame = self.top_mut();
                        frame.index += 1;
                        frame.done_exec = false;
                        continue;
                    }
                    RefPut::Setter { this, func } => {
                        self.top_mut().done_setter = true;
                        self.push_synth_call(Value::Ref(func), this, vec![value]);
                        return Ok(());
                    }
                }
            }
            // Find the next declarator with an initializer.
            let mut index = self.top().index;
            while index < declarations.len() {
                let NodeKind::VariableDeclarator { init, .. } = self.ast.kind(declarations[index]) else {
                    unreachable!()
                };
                if let Some(init) = *init {
                    let frame = self.top_mut();
                    frame.index = index;
                    frame.done_exec = true;
                    self.push_child(init, false);
                    return Ok(());
                }
                index += 1;
            }
            self.pop_value(Value::Undefined);
            return Ok(());
        }
    }

    // === expressions ===

    fn step_sequence(&mut self, node: NodeId) -> RunResult<()> {
        let NodeKind::SequenceExpression { expressions } = self.ast.kind(node) else {
            unreachable!()
        };
        let expressions = expressions.clone();
        let index = self.top().index;
        if index < expressions.len() {
            self.top_mut().index += 1;
            self.push_child(expressions[index], false);
        } else {
            let value = self.top().value.clone();
            self.pop_value(value);
        }
        Ok(())
    }

    fn step_identifier(&mut self, node: NodeId) -> RunResult<()> {
        let name = self.ast.ident_name(node).to_string();
        if self.top().components {
            self.pop_ref(None, name);
            return Ok(());
        }
        if self.top().done_getter {
            let value = self.top().value.clone();
            self.pop_value(value);
            return Ok(());
        }
        match self.get_reference(&(None, name))? {
            RefGet::Value(value) => self.pop_value(value),
            RefGet::Getter { this, func } => {
                self.top_mut().done_getter = true;
                self.push_synth_call(Value::Ref(func), this, Vec::new());
            }
        }
        Ok(())
    }

    fn step_literal(&mut self, node: NodeId) -> RunResult<()> {
        let NodeKind::Literal { value } = self.ast.kind(node) else {
            unreachable!()
        };
        let result = match value {
            LitValue::Null => Value::Null,
            LitValue::Bool(b) => Value::Bool(*b),
            LitValue::Number(n) => Value::Number(*n),
            LitValue::Str(s) => Value::Str(s.clone()),
            LitValue::Regex { pattern, flags } => {
                let (pattern, flags) = (pattern.clone(), flags.clone());
                let data = RegexpData::new(&pattern, &flags)?;
                let id = self
                    .heap
                    .alloc(JsObject::new(Some(self.realm.regexp_proto), JsClass::Regexp));
                let mut ctx = self.native_ctx();
                builtins::regexp::populate_regexp(&mut ctx, id, data);
                Value::Ref(id)
            }
        };
        self.pop_value(result);
        Ok(())
    }

    fn step_array_literal(&mut self, node: NodeId) -> RunResult<()> {
        let NodeKind::ArrayExpression { elements } = self.ast.kind(node) else {
            unreachable!()
        };
        let elements = elements.clone();
        if matches!(self.top().left, Value::Undefined) {
            let array = self.realm.create_array(&mut self.heap);
            self.top_mut().left = Value::Ref(array);
        }
        let Value::Ref(array) = self.top().left.clone() else {
            unreachable!()
        };
        // Store the element that just finished evaluating.
        if self.top().done_exec {
            let index = self.top().index - 1;
            let value = self.top().value.clone();
            self.heap.set_prop(array, &index.to_string(), value)?;
            self.top_mut().done_exec = false;
        }
        let mut index = self.top().index;
        while index < elements.len() {
            match elements[index] {
                Some(element) => {
                    let frame = self.top_mut();
                    frame.index = index + 1;
                    frame.done_exec = true;
                    self.push_child(element, false);
                    return Ok(());
                }
                None => index += 1,
            }
        }
        // Trailing holes still extend the length.
        self.heap
            .set_prop(array, "length", Value::Number(elements.len() as f64))?;
        self.pop_value(Value::Ref(array));
        Ok(())
    }

    fn step_object_literal(&mut self, node: NodeId) -> RunResult<()> {
        let NodeKind::ObjectExpression { properties } = self.ast.kind(node) else {
            unreachable!()
        };
        let properties = properties.clone();
        if matches!(self.top().left, Value::Undefined) {
            let object = self.realm.create_plain_object(&mut self.heap);
            self.top_mut().left = Value::Ref(object);
        }
        let Value::Ref(object) = self.top().left.clone() else {
            unreachable!()
        };
        if self.top().done_exec {
            let property = properties[self.top().index - 1];
            let NodeKind::Property { key, kind, .. } = self.ast.kind(property) else {
                unreachable!()
            };
            let (key, kind) = (*key, *kind);
            let name = self.property_name(key);
            let value = self.top().value.clone();
            match kind {
                PropertyKind::Init => {
                    self.heap.set_prop(object, &name, value)?;
                }
                PropertyKind::Get => {
                    self.heap.define_prop(
                        object,
                        &name,
                        &PropDescriptor {
                            get: Some(value),
                            enumerable: Some(true),
                            configurable: Some(true),
                            ..PropDescriptor::default()
                        },
                    )?;
                }
                PropertyKind::Set => {
                    self.heap.define_prop(
                        object,
                        &name,
                        &PropDescriptor {
                            set: Some(value),
                            enumerable: Some(true),
                            configurable: Some(true),
                            ..PropDescriptor::default()
                        },
                    )?;
                }
            }
            self.top_mut().done_exec = false;
        }
        let index = self.top().index;
        if index < properties.len() {
            let NodeKind::Property { value, .. } = self.ast.kind(properties[index]) else {
                unreachable!()
            };
            let value = *value;
            let frame = self.top_mut();
            frame.index = index + 1;
            frame.done_exec = true;
            self.push_child(value, false);
            return Ok(());
        }
        self.pop_value(Value::Ref(object));
        Ok(())
    }

    fn property_name(&self, key: NodeId) -> String {
        match self.ast.kind(key) {
            NodeKind::Identifier { name } => name.clone(),
            NodeKind::Literal { value: LitValue::Str(s) } => s.clone(),
            NodeKind::Literal {
                value: LitValue::Number(n),
            } => crate::value::format_number(*n),
            other => unreachable!("invalid property key {}", other.type_str()),
        }
    }

    fn step_assignment(&mut self, node: NodeId) -> RunResult<()> {
        let NodeKind::AssignmentExpression { operator, left, right } = self.ast.kind(node) else {
            unreachable!()
        };
        let (operator, left, right) = (*operator, *left, *right);

        if !self.top().done_left {
            self.top_mut().done_left = true;
            self.push_child(left, true);
            return Ok(());
        }
        if self.top().saved_ref.is_none() {
            let reference = self
                .top_mut()
                .ref_in
                .take()
                .ok_or_else(|| RunError::Internal("assignment target produced no reference".to_string()))?;
            self.top_mut().saved_ref = Some(reference);
        }

        // Compound operators read the old value first, possibly through a
        // getter trampoline.
        if let Some(binary) = operator.binary_op() {
            if !self.top().done_getter {
                let reference = self.top().saved_ref.clone().expect("stashed above");
                match self.get_reference(&reference)? {
                    RefGet::Value(value) => {
                        let frame = self.top_mut();
                        frame.left = value;
                        frame.done_getter = true;
                    }
                    RefGet::Getter { this, func } => {
                        self.top_mut().done_getter = true;
                        self.top_mut().done_object = true;
                        self.push_synth_call(Value::Ref(func), this, Vec::new());
                        return Ok(());
                    }
                }
            } else if self.top().done_object && !self.top().done_right {
                // Getter result just arrived.
                let value = self.top().value.clone();
                let frame = self.top_mut();
                frame.left = value;
                frame.done_object = false;
            }
            if !self.top().done_right {
                self.top_mut().done_right = true;
                self.push_child(right, false);
                return Ok(());
            }
            if !self.top().done_setter {
                let old = self.top().left.clone();
                let rhs = self.top().value.clone();
                let result = operators::binary(&self.heap, binary, &old, &rhs)?;
                return self.finish_assignment(result);
            }
            let result = self.top().switch_value.clone();
            self.pop_value(result);
            return Ok(());
        }

        // Plain assignment: left, then right, then the write.
        if !self.top().done_right {
            self.top_mut().done_right = true;
            self.push_child(right, false);
            return Ok(());
        }
        if self.top().done_setter {
            // Setter trampoline finished; its return value is discarded.
            let result = self.top().switch_value.clone();
            self.pop_value(result);
            return Ok(());
        }
        let value = self.top().value.clone();
        self.finish_assignment(value)
    }

    /// Writes the computed value through the stashed reference, or pushes
    /// the setter trampoline. The assigned value (kept in `switch_value`)
    /// is the expression's result either way.
    fn finish_assignment(&mut self, value: Value) -> RunResult<()> {
        let reference = self.top().saved_ref.clone().expect("assignment stashes its target");
        match self.put_reference(&reference, value.clone())? {
            RefPut::Done => {
                self.pop_value(value);
                Ok(())
            }
            RefPut::Setter { this, func } => {
                let frame = self.top_mut();
                frame.done_setter = true;
                frame.switch_value = value.clone();
                self.push_synth_call(Value::Ref(func), this, vec![value]);
                Ok(())
            }
        }
    }

    fn step_binary(&mut self, node: NodeId) -> RunResult<()> {
        let NodeKind::BinaryExpression { operator, left, right } = self.ast.kind(node) else {
            unreachable!()
        };
        let (operator, left, right) = (*operator, *left, *right);
        if !self.top().done_left {
            self.top_mut().done_left = true;
            self.push_child(left, false);
            return Ok(());
        }
        if !self.top().done_right {
            let value = self.top().value.clone();
            let frame = self.top_mut();
            frame.left = value;
            frame.done_right = true;
            self.push_child(right, false);
            return Ok(());
        }
        let lhs = self.top().left.clone();
        let rhs = self.top().value.clone();
        let result = operators::binary(&self.heap, operator, &lhs, &rhs)?;
        self.pop_value(result);
        Ok(())
    }

    fn step_logical(&mut self, node: NodeId) -> RunResult<()> {
        let NodeKind::LogicalExpression { operator, left, right } = self.ast.kind(node) else {
            unreachable!()
        };
        let (operator, left, right) = (*operator, *left, *right);
        if !self.top().done_left {
            self.top_mut().done_left = true;
            self.push_child(left, false);
            return Ok(());
        }
        if !self.top().done_right {
            let value = self.top().value.clone();
            let short_circuit = match operator {
                crate::ast::LogicalOp::Or => value.to_boolean(),
                crate::ast::LogicalOp::And => !value.to_boolean(),
            };
            if short_circuit {
                self.pop_value(value);
                return Ok(());
            }
            self.top_mut().done_right = true;
            self.push_child(right, false);
            return Ok(());
        }
        let value = self.top().value.clone();
        self.pop_value(value);
        Ok(())
    }

    fn step_unary(&mut self, node: NodeId) -> RunResult<()> {
        let NodeKind::UnaryExpression { operator, argument } = self.ast.kind(node) else {
            unreachable!()
        };
        let (operator, argument) = (*operator, *argument);
        match operator {
            UnaryOp::Delete => self.step_delete(argument),
            UnaryOp::Typeof => self.step_typeof(argument),
            _ => {
                if !self.top().done_exec {
                    self.top_mut().done_exec = true;
                    self.push_child(argument, false);
                    return Ok(());
                }
                let value = self.top().value.clone();
                let result = operators::unary(&self.heap, operator, &value);
                self.pop_value(result);
                Ok(())
            }
        }
    }

    fn step_delete(&mut self, argument: NodeId) -> RunResult<()> {
        let is_reference = matches!(
            self.ast.kind(argument),
            NodeKind::Identifier { .. } | NodeKind::MemberExpression { .. }
        );
        if !self.top().done_exec {
            self.top_mut().done_exec = true;
            self.push_child(argument, is_reference);
            return Ok(());
        }
        if !is_reference {
            // `delete <non-reference>` evaluates the operand and yields true.
            self.pop_value(Value::Bool(true));
            return Ok(());
        }
        let strict = self.scopes.strict(self.top().scope);
        let reference = self.top_mut().ref_in.take();
        let result = match reference {
            None => true,
            Some((None, name)) => {
                let scope = self.top().scope;
                self.scopes.delete(&mut self.heap, scope, &name)
            }
            Some((Some(Value::Ref(id)), name)) => {
                let deleted = self.heap.delete_prop(id, &name);
                if !deleted && strict {
                    return Err(RunError::throw(
                        ErrorKind::TypeError,
                        format!("Cannot delete property '{name}'"),
                    ));
                }
                deleted
            }
            Some((Some(_), _)) => true,
        };
        self.pop_value(Value::Bool(result));
        Ok(())
    }

    fn step_typeof(&mut self, argument: NodeId) -> RunResult<()> {
        let is_identifier = matches!(self.ast.kind(argument), NodeKind::Identifier { .. });
        if !self.top().done_exec {
            self.top_mut().done_exec = true;
            self.push_child(argument, is_identifier);
            return Ok(());
        }
        if self.top().done_getter {
            let value = self.top().value.clone();
            let result = self.heap.type_of(&value);
            self.pop_value(Value::str(result));
            return Ok(());
        }
        if is_identifier {
            let reference = self
                .top_mut()
                .ref_in
                .take()
                .ok_or_else(|| RunError::Internal("typeof operand produced no reference".to_string()))?;
            let (_, name) = &reference;
            // An undeclared identifier reads as "undefined" without throwing.
            if !self.scopes.has(&self.heap, self.top().scope, name) {
                self.pop_value(Value::str("undefined"));
                return Ok(());
            }
            match self.get_reference(&reference)? {
                RefGet::Value(value) => {
                    let result = self.heap.type_of(&value);
                    self.pop_value(Value::str(result));
                }
                RefGet::Getter { this, func } => {
                    self.top_mut().done_getter = true;
                    self.push_synth_call(Value::Ref(func), this, Vec::new());
                }
            }
            return Ok(());
        }
        let value = self.top().value.clone();
        let result = self.heap.type_of(&value);
        self.pop_value(Value::str(result));
        Ok(())
    }

    fn step_update(&mut self, node: NodeId) -> RunResult<()> {
        let NodeKind::UpdateExpression {
            operator,
            argument,
            prefix,
        } = self.ast.kind(node)
        else {
            unreachable!()
        };
        let (operator, argument, prefix) = (*operator, *argument, *prefix);
        if !self.top().done_left {
            self.top_mut().done_left = true;
            self.push_child(argument, true);
            return Ok(());
        }
        if self.top().saved_ref.is_none() {
            let reference = self
                .top_mut()
                .ref_in
                .take()
                .ok_or_else(|| RunError::Internal("update target produced no reference".to_string()))?;
            self.top_mut().saved_ref = Some(reference);
        }
        if !self.top().done_getter {
            let reference = self.top().saved_ref.clone().expect("stashed above");
            match self.get_reference(&reference)? {
                RefGet::Value(value) => {
                    let frame = self.top_mut();
                    frame.left = value;
                    frame.done_getter = true;
                }
                RefGet::Getter { this, func } => {
                    let frame = self.top_mut();
                    frame.done_getter = true;
                    frame.done_object = true;
                    self.push_synth_call(Value::Ref(func), this, Vec::new());
                    return Ok(());
                }
            }
        } else if self.top().done_object && !self.top().done_setter {
            let value = self.top().value.clone();
            let frame = self.top_mut();
            frame.left = value;
            frame.done_object = false;
        }
        if self.top().done_setter {
            let result = self.top().switch_value.clone();
            self.pop_value(result);
            return Ok(());
        }
        let old = self.heap.to_number(&self.top().left.clone());
        let new = match operator {
            UpdateOp::Inc => old + 1.0,
            UpdateOp::Dec => old - 1.0,
        };
        let result = Value::Number(if prefix { new } else { old });
        let reference = self.top().saved_ref.clone().expect("stashed above");
        match self.put_reference(&reference, Value::Number(new))? {
            RefPut::Done => {
                self.pop_value(result);
                Ok(())
            }
            RefPut::Setter { this, func } => {
                let frame = self.top_mut();
                frame.done_setter = true;
                frame.switch_value = result;
                self.push_synth_call(Value::Ref(func), this, vec![Value::Number(new)]);
                Ok(())
            }
        }
    }

    fn step_member(&mut self, node: NodeId) -> RunResult<()> {
        let NodeKind::MemberExpression {
            object,
            property,
            computed,
        } = self.ast.kind(node)
        else {
            unreachable!()
        };
        let (object, property, computed) = (*object, *property, *computed);
        if !self.top().done_object {
            self.top_mut().done_object = true;
            self.push_child(object, false);
            return Ok(());
        }
        if self.top().done_getter {
            let value = self.top().value.clone();
            self.pop_value(value);
            return Ok(());
        }
        // Stash the base the first time we get past the object child.
        if self.top().saved_ref.is_none() {
            let base = self.top().value.clone();
            self.top_mut().saved_ref = Some((Some(base), String::new()));
        }
        let name = if computed {
            if !self.top().done_right {
                self.top_mut().done_right = true;
                self.push_child(property, false);
                return Ok(());
            }
            let key = self.top().value.clone();
            self.heap.to_js_string(&key)
        } else {
            self.ast.ident_name(property).to_string()
        };
        let (base, _) = self.top().saved_ref.clone().expect("stashed above");
        let base = base.expect("member base is a value");
        if self.top().components {
            self.pop_ref(Some(base), name);
            return Ok(());
        }
        match self.get_member(base, &name)? {
            RefGet::Value(value) => self.pop_value(value),
            RefGet::Getter { this, func } => {
                self.top_mut().done_getter = true;
                self.push_synth_call(Value::Ref(func), this, Vec::new());
            }
        }
        Ok(())
    }

    // === calls ===

    fn step_call(&mut self, node: NodeId, is_new: bool) -> RunResult<()> {
        let (callee, arg_nodes) = match self.ast.kind(node) {
            NodeKind::CallExpression { callee, arguments } | NodeKind::NewExpression { callee, arguments } => {
                (*callee, arguments.clone())
            }
            _ => unreachable!(),
        };
        if !self.top().done_callee {
            self.top_mut().done_callee = true;
            // `new` takes the callee as a plain value; calls evaluate it as
            // a reference so method calls see their receiver.
            self.push_child(callee, !is_new);
            return Ok(());
        }
        if !self.top().done_object {
            // Resolve the callee (possibly through a getter trampoline).
            if self.top().done_getter {
                let value = self.top().value.clone();
                let frame = self.top_mut();
                frame.func = value;
                frame.done_getter = false;
                frame.done_object = true;
            } else {
                let reference = self.top_mut().ref_in.take();
                match reference {
                    Some(reference) => {
                        if let (None, name) = &reference
                            && name == "eval"
                        {
                            // Direct eval runs in the caller's scope.
                            self.top_mut().n = 1;
                        }
                        let this = match &reference {
                            (Some(base), _) => base.clone(),
                            (None, _) => Value::Undefined,
                        };
                        self.top_mut().func_this = this;
                        match self.get_reference(&reference)? {
                            RefGet::Value(value) => {
                                let frame = self.top_mut();
                                frame.func = value;
                                frame.done_object = true;
                            }
                            RefGet::Getter { this, func } => {
                                self.top_mut().done_getter = true;
                                self.push_synth_call(Value::Ref(func), this, Vec::new());
                                return Ok(());
                            }
                        }
                    }
                    None => {
                        let value = self.top().value.clone();
                        let frame = self.top_mut();
                        frame.func = value;
                        frame.done_object = true;
                    }
                }
            }
            return Ok(());
        }
        if !self.top().done_args {
            // Collect the previous argument, then push the next.
            if self.top().arguments.len() < self.top().index {
                let value = self.top().value.clone();
                self.top_mut().arguments.push(value);
            }
            let index = self.top().index;
            if index < arg_nodes.len() {
                self.top_mut().index = index + 1;
                self.push_child(arg_nodes[index], false);
                return Ok(());
            }
            self.top_mut().done_args = true;
        }
        if !self.top().done_exec {
            if is_new {
                self.prepare_construct()?;
            }
            return self.step_invocation(is_new);
        }
        if self.top().awaiting.is_some() {
            // Still waiting on an async host call; `step` normally never
            // reaches here because paused_ short-circuits.
            return Ok(());
        }
        // Invocation finished. A body that ran off its end (no explicit
        // return) completes with undefined.
        let frame = self.top();
        let mut result = if frame.matched {
            frame.value.clone()
        } else {
            Value::Undefined
        };
        if frame.is_ctor && !matches!(result, Value::Ref(_)) {
            result = frame.func_this.clone();
        }
        self.pop_value(result);
        Ok(())
    }

    /// Builds the fresh `this` for a `new` expression from the callee's
    /// `prototype` property.
    fn prepare_construct(&mut self) -> RunResult<()> {
        let func = self.top().func.clone();
        let Value::Ref(func_id) = &func else {
            return Err(RunError::throw(
                ErrorKind::TypeError,
                format!("{} is not a constructor", self.heap.to_js_string(&func)),
            ));
        };
        let proto = match self.heap.get_prop(*func_id, "prototype") {
            crate::heap::PropGet::Value(Value::Ref(proto)) => proto,
            _ => self.realm.object_proto,
        };
        let this = self.heap.alloc(JsObject::new(Some(proto), JsClass::Object));
        let frame = self.top_mut();
        frame.func_this = Value::Ref(this);
        frame.is_ctor = true;
        Ok(())
    }

    /// Invokes the resolved callee of the top frame (shared by calls,
    /// `new`, and getter/setter trampolines).
    fn step_invocation(&mut self, _is_new: bool) -> RunResult<()> {
        if self.top().synth_call && self.top().done_exec {
            if self.top().awaiting.is_some() {
                return Ok(());
            }
            let frame = self.top();
            let value = if frame.matched {
                frame.value.clone()
            } else {
                Value::Undefined
            };
            self.pop_value(value);
            return Ok(());
        }
        loop {
            let func = self.top().func.clone();
            let Value::Ref(func_id) = func else {
                return Err(RunError::throw(
                    ErrorKind::TypeError,
                    format!("{} is not a function", self.heap.to_js_string(&func)),
                ));
            };
            let Some(kind) = self.heap.get(func_id).func.clone() else {
                return Err(RunError::throw(
                    ErrorKind::TypeError,
                    format!("{} is not a function", self.heap.to_js_string(&Value::Ref(func_id))),
                ));
            };
            match kind {
                FuncKind::Guest { node, scope } => return self.invoke_guest(func_id, node, scope),
                FuncKind::Host { id, ctor } => {
                    if self.top().is_ctor && !ctor {
                        return Err(RunError::throw(
                            ErrorKind::TypeError,
                            "host binding is not a constructor",
                        ));
                    }
                    let args = std::mem::take(&mut self.top_mut().arguments);
                    let result = self.host_fn_call(id, &args)?;
                    self.finish_invocation(result);
                    return Ok(());
                }
                FuncKind::AsyncHost { id } => {
                    if self.top().is_ctor {
                        return Err(RunError::throw(
                            ErrorKind::TypeError,
                            "async host binding is not a constructor",
                        ));
                    }
                    let args = self.top().arguments.clone();
                    return self.host_async_call(id, &args);
                }
                FuncKind::Native(native) => match native {
                    NativeFunc::FunctionCall => {
                        let frame = self.top_mut();
                        let mut args = std::mem::take(&mut frame.arguments);
                        let new_func = frame.func_this.clone();
                        let new_this = if args.is_empty() {
                            Value::Undefined
                        } else {
                            args.remove(0)
                        };
                        frame.func = new_func;
                        frame.func_this = new_this;
                        frame.arguments = args;
                    }
                    NativeFunc::FunctionApply => {
                        let frame = self.top_mut();
                        let args = std::mem::take(&mut frame.arguments);
                        let new_func = frame.func_this.clone();
                        let new_this = args.first().cloned().unwrap_or(Value::Undefined);
                        let spread = match args.get(1) {
                            None | Some(Value::Undefined | Value::Null) => Vec::new(),
                            Some(Value::Ref(list)) => {
                                let list = *list;
                                let length = self.heap.array_length(list);
                                (0..length)
                                    .map(|i| match self.heap.get_prop(list, &i.to_string()) {
                                        crate::heap::PropGet::Value(v) => v,
                                        crate::heap::PropGet::Getter(_) => Value::Undefined,
                                    })
                                    .collect()
                            }
                            Some(_) => {
                                return Err(RunError::throw(
                                    ErrorKind::TypeError,
                                    "CreateListFromArrayLike called on non-object",
                                ));
                            }
                        };
                        let frame = self.top_mut();
                        frame.func = new_func;
                        frame.func_this = new_this;
                        frame.arguments = spread;
                    }
                    NativeFunc::Eval => return self.invoke_eval(),
                    NativeFunc::FunctionCtor => return self.invoke_function_ctor(),
                    _ => {
                        let is_ctor = self.top().is_ctor;
                        if is_ctor && !native.is_constructor() {
                            let name = native.info().0;
                            return Err(RunError::throw(
                                ErrorKind::TypeError,
                                format!("{name} is not a constructor"),
                            ));
                        }
                        let this = self.top().func_this.clone();
                        let args = std::mem::take(&mut self.top_mut().arguments);
                        let result = {
                            let mut ctx = self.native_ctx();
                            builtins::call_native(&mut ctx, native, &this, &args, is_ctor)?
                        };
                        self.finish_invocation(result);
                        return Ok(());
                    }
                },
            }
        }
    }

    fn finish_invocation(&mut self, result: Value) {
        let frame = self.top();
        let result = if frame.is_ctor && !matches!(result, Value::Ref(_)) {
            frame.func_this.clone()
        } else {
            result
        };
        self.pop_value(result);
    }

    fn invoke_guest(&mut self, func_id: ObjectId, node: NodeId, parent_scope: ScopeId) -> RunResult<()> {
        let (params, body, strict, named_expr) = match self.ast.kind(node) {
            NodeKind::FunctionDeclaration { params, body, strict, .. } => (params.clone(), *body, *strict, None),
            NodeKind::FunctionExpression {
                id, params, body, strict, ..
            } => (params.clone(), *body, *strict, *id),
            other => unreachable!("guest function body is not a function: {}", other.type_str()),
        };
        let scope_object = self.heap.alloc(JsObject::new(None, JsClass::Object));
        let scope = self.scopes.alloc(Scope {
            object: scope_object,
            parent: Some(parent_scope),
            strict,
            chain_lookup: false,
        });

        // `this` boxing: strict mode passes the receiver through untouched.
        let receiver = self.top().func_this.clone();
        let this = if self.top().is_ctor || strict {
            receiver
        } else {
            match receiver {
                Value::Undefined | Value::Null => Value::Ref(self.realm.global_object),
                object @ Value::Ref(_) => object,
                primitive => Value::Ref(
                    self.realm
                        .box_primitive(&mut self.heap, &primitive)
                        .expect("non-object primitives box"),
                ),
            }
        };

        let args = std::mem::take(&mut self.top_mut().arguments);
        for (index, &param) in params.iter().enumerate() {
            let name = self.ast.ident_name(param).to_string();
            let value = args.get(index).cloned().unwrap_or(Value::Undefined);
            self.scopes.declare(&mut self.heap, scope, &name, value, true);
        }
        let arguments_object = self.create_arguments(&args, func_id);
        self.scopes
            .declare(&mut self.heap, scope, "arguments", Value::Ref(arguments_object), false);
        if let Some(name_id) = named_expr {
            let name = self.ast.ident_name(name_id).to_string();
            self.scopes
                .declare(&mut self.heap, scope, &name, Value::Ref(func_id), false);
        }
        self.hoist_into(scope, body);

        self.top_mut().done_exec = true;
        self.frames.push(Frame::new(body, scope, this));
        Ok(())
    }

    /// Direct or indirect `eval`: parses into the shared arena and runs the
    /// fresh Program frame in the appropriate scope.
    fn invoke_eval(&mut self) -> RunResult<()> {
        let direct = self.top().n == 1;
        let argument = self.top().arguments.first().cloned().unwrap_or(Value::Undefined);
        let Value::Str(source) = argument else {
            // Non-string arguments pass through unchanged.
            self.pop_value(argument);
            return Ok(());
        };
        let caller_scope = self.top().scope;
        let context_strict = direct && self.scopes.strict(caller_scope);
        let program = crate::parse::parse_eval(&mut self.ast, &source, context_strict)
            .map_err(|e| RunError::throw(ErrorKind::SyntaxError, e.message().to_string()))?;
        let strict = matches!(self.ast.kind(program), NodeKind::Program { strict: true, .. });
        let base_scope = if direct { caller_scope } else { self.global_scope };
        let scope = if strict {
            // Strict eval gets its own scope so bindings can't leak out.
            self.create_special_scope_under(base_scope, false)
        } else {
            base_scope
        };
        let this = if direct {
            self.top().this.clone()
        } else {
            Value::Ref(self.realm.global_object)
        };
        self.hoist_into(scope, program);
        let frame = self.top_mut();
        frame.done_exec = true;
        // Eval completes with the program's value, not undefined.
        frame.matched = true;
        self.frames.push(Frame::new(program, scope, this));
        Ok(())
    }

    /// `new Function(params..., body)`: compiles through the parser and
    /// closes over the global scope.
    fn invoke_function_ctor(&mut self) -> RunResult<()> {
        let args = std::mem::take(&mut self.top_mut().arguments);
        let mut texts: Vec<String> = args.iter().map(|arg| self.heap.to_js_string(arg)).collect();
        let body = texts.pop().unwrap_or_default();
        let source = format!("(function anonymous({}\n) {{\n{body}\n}})", texts.join(","));
        let program = crate::parse::parse_eval(&mut self.ast, &source, false)
            .map_err(|e| RunError::throw(ErrorKind::SyntaxError, e.message().to_string()))?;
        let NodeKind::Program { body, .. } = self.ast.kind(program) else {
            unreachable!()
        };
        let NodeKind::ExpressionStatement { expression } = self.ast.kind(body[0]) else {
            unreachable!("function ctor source is one expression statement")
        };
        let func_node = *expression;
        let func = self.create_function(func_node, self.global_scope);
        self.pop_value(Value::Ref(func));
        Ok(())
    }

    // === shared helpers ===

    /// A fresh ordinary scope chained under the current frame's scope
    /// (used for `catch`).
    pub(crate) fn create_special_scope(&mut self, chain_lookup: bool) -> ScopeId {
        let parent = self.top().scope;
        self.create_special_scope_under(parent, chain_lookup)
    }

    fn create_special_scope_under(&mut self, parent: ScopeId, chain_lookup: bool) -> ScopeId {
        let object = self.heap.alloc(JsObject::new(None, JsClass::Object));
        let strict = self.scopes.strict(parent);
        self.scopes.alloc(Scope {
            object,
            parent: Some(parent),
            strict,
            chain_lookup,
        })
    }

    /// ToObject for `with` and friends.
    fn to_object(&mut self, value: &Value) -> RunResult<ObjectId> {
        match value {
            Value::Ref(id) => Ok(*id),
            Value::Undefined | Value::Null => Err(RunError::throw(
                ErrorKind::TypeError,
                "Cannot convert undefined or null to object",
            )),
            primitive => Ok(self
                .realm
                .box_primitive(&mut self.heap, primitive)
                .expect("non-object primitives box")),
        }
    }
}
