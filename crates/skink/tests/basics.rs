//! End-to-end programs against their expected completion values.

use pretty_assertions::assert_eq;
use skink::{ErrorKind, Exception, Interpreter, Object};

fn run(code: &str) -> Object {
    let mut interp = Interpreter::new(code).expect("parse");
    assert!(!interp.run().expect("run"), "program should complete, not pause");
    interp.value()
}

fn run_err(code: &str) -> Exception {
    let mut interp = Interpreter::new(code).expect("parse");
    interp.run().expect_err("expected an uncaught guest error")
}

#[test]
fn arithmetic_on_variables() {
    assert_eq!(run("var a = 1; a + 2;"), Object::Number(3.0));
}

#[test]
fn function_declaration_and_call() {
    assert_eq!(run("function f(x){return x*x;} f(7);"), Object::Number(49.0));
}

#[test]
fn getter_in_object_literal() {
    assert_eq!(run("var o = {get x(){ return 42; }}; o.x;"), Object::Number(42.0));
}

#[test]
fn loop_push_join() {
    assert_eq!(
        run("var r = []; for (var i=0;i<3;i++) r.push(i); r.join(',');"),
        Object::String("0,1,2".to_string())
    );
}

#[test]
fn try_catch_error_fields() {
    assert_eq!(
        run("try { throw new RangeError(\"x\"); } catch(e) { e.name + ':' + e.message; }"),
        Object::String("RangeError:x".to_string())
    );
}

#[test]
fn strict_mode_implicit_global_throws() {
    assert_eq!(
        run("(function(){ \"use strict\"; try { undeclared = 1; return 'no'; } catch(e){ return e.name; } })();"),
        Object::String("ReferenceError".to_string())
    );
}

#[test]
fn empty_program_completes_immediately() {
    let mut interp = Interpreter::new("").unwrap();
    assert!(!interp.step().unwrap());
    assert_eq!(interp.value(), Object::Undefined);
}

#[test]
fn infinite_loop_never_finishes_within_budget() {
    let mut interp = Interpreter::new("for (;;) {}").unwrap();
    for _ in 0..10_000 {
        assert!(interp.step().unwrap(), "for(;;) must keep stepping");
    }
}

#[test]
fn loop_exits_through_break() {
    assert_eq!(run("var n = 0; for (;;) { if (n === 5) break; n++; } n;"), Object::Number(5.0));
}

#[test]
fn uncaught_throw_surfaces_as_matching_exception() {
    let err = run_err("throw new TypeError('boom');");
    assert_eq!(err.kind(), ErrorKind::TypeError);
    assert_eq!(err.message(), "boom");
    assert_eq!(err.to_string(), "TypeError: boom");
}

#[test]
fn uncaught_non_error_values_stringify() {
    let err = run_err("throw 'plain';");
    assert_eq!(err.kind(), ErrorKind::Error);
    assert_eq!(err.message(), "plain");
}

#[test]
fn closures_capture_their_scope() {
    assert_eq!(
        run("function make(n){ return function(){ return n += 1; }; } var c = make(10); c(); c();"),
        Object::Number(12.0)
    );
}

#[test]
fn hoisting_makes_functions_callable_early() {
    assert_eq!(run("var r = f(); function f(){ return 'hoisted'; } r;"), Object::String("hoisted".to_string()));
}

#[test]
fn this_binding_in_methods() {
    assert_eq!(
        run("var o = { n: 5, get2: function(){ return this.n * 2; } }; o.get2();"),
        Object::Number(10.0)
    );
}

#[test]
fn constructor_builds_instances() {
    assert_eq!(
        run("function Point(x, y){ this.x = x; this.y = y; } Point.prototype.sum = function(){ return this.x + this.y; }; new Point(3, 4).sum();"),
        Object::Number(7.0)
    );
}

#[test]
fn constructor_result_object_wins_over_this() {
    assert_eq!(
        run("function F(){ this.a = 1; return { a: 2 }; } new F().a;"),
        Object::Number(2.0)
    );
    assert_eq!(
        run("function G(){ this.a = 1; return 42; } new G().a;"),
        Object::Number(1.0)
    );
}

#[test]
fn switch_falls_through_and_defers_default() {
    let code = "
        function pick(x) {
            var out = '';
            switch (x) {
                case 1: out += 'one ';
                case 2: out += 'two'; break;
                default: out += 'other';
            }
            return out;
        }
        pick(1) + '|' + pick(2) + '|' + pick(9);
    ";
    assert_eq!(run(code), Object::String("one two|two|other".to_string()));
}

#[test]
fn labeled_break_and_continue() {
    let code = "
        var hits = 0;
        outer: for (var i = 0; i < 3; i++) {
            for (var j = 0; j < 3; j++) {
                if (j === 1) continue outer;
                if (i === 2) break outer;
                hits++;
            }
        }
        hits;
    ";
    assert_eq!(run(code), Object::Number(2.0));
}

#[test]
fn try_finally_runs_on_all_paths() {
    let code = "
        var log = '';
        function f(mode) {
            try {
                if (mode === 'throw') throw new Error('x');
                if (mode === 'return') return 'r';
                log += 'n';
            } catch (e) {
                log += 'c';
            } finally {
                log += 'f';
            }
            return 'end';
        }
        f('plain'); f('throw'); f('return');
        log;
    ";
    assert_eq!(run(code), Object::String("nfcff".to_string()));
}

#[test]
fn finally_reraises_pending_break() {
    let code = "
        var reached = 'no';
        var after = '';
        for (var i = 0; i < 3; i++) {
            try {
                break;
            } finally {
                after += 'f';
            }
            reached = 'yes';
        }
        after + ':' + reached + ':' + i;
    ";
    assert_eq!(run(code), Object::String("f:no:0".to_string()));
}

#[test]
fn do_while_runs_body_first() {
    assert_eq!(run("var n = 0; do { n++; } while (n < 0); n;"), Object::Number(1.0));
}

#[test]
fn with_statement_scopes_object_properties() {
    assert_eq!(
        run("var o = { x: 7 }; var r; with (o) { r = x + 1; x = 100; } o.x + ',' + r;"),
        Object::String("100,8".to_string())
    );
}

#[test]
fn direct_eval_sees_local_scope() {
    assert_eq!(
        run("function f(){ var secret = 9; return eval('secret + 1'); } f();"),
        Object::Number(10.0)
    );
}

#[test]
fn eval_parse_errors_become_guest_syntax_errors() {
    assert_eq!(
        run("try { eval('var ='); } catch (e) { e.name; }"),
        Object::String("SyntaxError".to_string())
    );
}

#[test]
fn typeof_undeclared_does_not_throw() {
    assert_eq!(run("typeof missing;"), Object::String("undefined".to_string()));
    assert_eq!(run("typeof {};"), Object::String("object".to_string()));
    assert_eq!(run("typeof 'x';"), Object::String("string".to_string()));
    assert_eq!(run("typeof typeof 1;"), Object::String("string".to_string()));
    assert_eq!(run("typeof function(){};"), Object::String("function".to_string()));
    assert_eq!(run("typeof null;"), Object::String("object".to_string()));
}

#[test]
fn delete_behaviors() {
    assert_eq!(run("var o = {a: 1}; delete o.a;"), Object::Bool(true));
    assert_eq!(run("var o = {a: 1}; delete o.a; 'a' in o;"), Object::Bool(false));
    // Variables refuse deletion outside strict mode.
    assert_eq!(run("var x = 1; delete x;"), Object::Bool(false));
    assert_eq!(run("var x = 1; delete x; x;"), Object::Number(1.0));
}

#[test]
fn update_expressions() {
    assert_eq!(run("var i = 5; [i++, i, ++i, i].join(',');"), Object::String("5,6,7,7".to_string()));
}

#[test]
fn sequence_and_conditional() {
    assert_eq!(run("(1, 2, 3);"), Object::Number(3.0));
    assert_eq!(run("true ? 'a' : 'b';"), Object::String("a".to_string()));
    assert_eq!(run("0 ? 'a' : 'b';"), Object::String("b".to_string()));
}

#[test]
fn abstract_and_strict_equality() {
    assert_eq!(run("null == undefined;"), Object::Bool(true));
    assert_eq!(run("null === undefined;"), Object::Bool(false));
    assert_eq!(run("1 == '1';"), Object::Bool(true));
    assert_eq!(run("1 === '1';"), Object::Bool(false));
    assert_eq!(run("NaN === NaN;"), Object::Bool(false));
}

#[test]
fn string_concatenation_coercion() {
    assert_eq!(run("1 + '2';"), Object::String("12".to_string()));
    assert_eq!(run("'' + [1, 2];"), Object::String("1,2".to_string()));
    assert_eq!(run("'' + {};"), Object::String("[object Object]".to_string()));
    assert_eq!(run("+[];"), Object::Number(0.0));
}

#[test]
fn bitwise_and_shift_semantics() {
    assert_eq!(run("-1 >>> 0;"), Object::Number(4_294_967_295.0));
    assert_eq!(run("5 & 3;"), Object::Number(1.0));
    assert_eq!(run("1 << 33;"), Object::Number(2.0));
    assert_eq!(run("~0;"), Object::Number(-1.0));
}

#[test]
fn instanceof_and_in() {
    assert_eq!(run("[] instanceof Array;"), Object::Bool(true));
    assert_eq!(run("[] instanceof Object;"), Object::Bool(true));
    assert_eq!(run("({}) instanceof Array;"), Object::Bool(false));
    assert_eq!(run("'length' in [];"), Object::Bool(true));
    assert_eq!(run("'x' in {x: undefined};"), Object::Bool(true));
    assert_eq!(run("'missing' in {};"), Object::Bool(false));
}

#[test]
fn named_function_expression_binds_its_own_name() {
    assert_eq!(
        run("var f = function fact(n){ return n <= 1 ? 1 : n * fact(n - 1); }; f(5);"),
        Object::Number(120.0)
    );
}

#[test]
fn arguments_object() {
    assert_eq!(
        run("function f(){ var s = 0; for (var i = 0; i < arguments.length; i++) s += arguments[i]; return s; } f(1, 2, 3, 4);"),
        Object::Number(10.0)
    );
}
