//! Object, property, and scope model semantics.

use pretty_assertions::assert_eq;
use skink::{Interpreter, Object};

fn run(code: &str) -> Object {
    let mut interp = Interpreter::new(code).expect("parse");
    assert!(!interp.run().expect("run"));
    interp.value()
}

#[test]
fn for_in_visits_enumerable_own_properties_once() {
    let code = "
        var o = { b: 1, a: 2, c: 3 };
        var seen = [];
        for (var k in o) seen.push(k);
        seen.join(',');
    ";
    assert_eq!(run(code), Object::String("b,a,c".to_string()));
}

#[test]
fn for_in_skips_non_enumerable_and_shadowed() {
    let code = "
        var proto = { shared: 1, shadowed: 2 };
        function C() { this.own = 3; this.shadowed = 4; }
        C.prototype = proto;
        Object.defineProperty(proto, 'hidden', { value: 9, enumerable: false });
        var seen = [];
        for (var k in new C()) seen.push(k);
        seen.sort().join(',');
    ";
    assert_eq!(run(code), Object::String("own,shadowed,shared".to_string()));
}

#[test]
fn for_in_skips_keys_deleted_mid_iteration() {
    let code = "
        var o = { a: 1, b: 2, c: 3 };
        var seen = [];
        for (var k in o) { seen.push(k); delete o.c; }
        seen.join(',');
    ";
    assert_eq!(run(code), Object::String("a,b".to_string()));
}

#[test]
fn delete_on_non_configurable_returns_false_and_keeps_property() {
    let code = "
        var o = {};
        Object.defineProperty(o, 'locked', { value: 1, configurable: false });
        [delete o.locked, o.locked].join(',');
    ";
    assert_eq!(run(code), Object::String("false,1".to_string()));
}

#[test]
fn strict_delete_on_non_configurable_throws() {
    let code = "
        'use strict';
        var o = {};
        Object.defineProperty(o, 'locked', { value: 1, configurable: false });
        try { delete o.locked; 'no'; } catch (e) { e.name; }
    ";
    assert_eq!(run(code), Object::String("TypeError".to_string()));
}

#[test]
fn setter_order_matches_evaluation_order() {
    // Law: `a.b = c` evaluates a, then c, then calls the setter; the
    // expression's value is c, not the setter's return value.
    let code = "
        var log = [];
        function track(tag, value) { log.push(tag); return value; }
        var backing;
        var o = { set b(v) { log.push('set:' + v); backing = v; return 'ignored'; } };
        var result = track('lhs', o).b = track('rhs', 5);
        log.push('result:' + result);
        log.push('backing:' + backing);
        log.join(' ');
    ";
    assert_eq!(
        run(code),
        Object::String("lhs rhs set:5 result:5 backing:5".to_string())
    );
}

#[test]
fn getters_and_setters_cooperate() {
    let code = "
        var o = { _x: 1,
                  get x() { return this._x; },
                  set x(v) { this._x = v * 10; } };
        o.x = 5;
        o.x;
    ";
    assert_eq!(run(code), Object::Number(50.0));
}

#[test]
fn compound_assignment_reads_through_getter_and_writes_through_setter() {
    let code = "
        var reads = 0, writes = 0, store = 4;
        var o = {
            get n() { reads++; return store; },
            set n(v) { writes++; store = v; }
        };
        o.n += 6;
        [reads, writes, store].join(',');
    ";
    assert_eq!(run(code), Object::String("1,1,10".to_string()));
}

#[test]
fn prototype_chain_reads_and_shadowing_writes() {
    let code = "
        var base = { x: 'base' };
        var child = Object.create(base);
        var before = child.x;
        child.x = 'child';
        [before, child.x, base.x].join(',');
    ";
    assert_eq!(run(code), Object::String("base,child,base".to_string()));
}

#[test]
fn object_keys_in_insertion_order() {
    assert_eq!(
        run("Object.keys({ z: 1, a: 2, m: 3 }).join(',');"),
        Object::String("z,a,m".to_string())
    );
}

#[test]
fn define_property_descriptor_rules() {
    let code = "
        var o = {};
        Object.defineProperty(o, 'x', { value: 1 });
        var d = Object.getOwnPropertyDescriptor(o, 'x');
        [d.value, d.writable, d.enumerable, d.configurable].join(',');
    ";
    assert_eq!(run(code), Object::String("1,false,false,false".to_string()));
}

#[test]
fn define_property_rejects_mixed_descriptors() {
    let code = "
        try {
            Object.defineProperty({}, 'x', { value: 1, get: function(){} });
            'no';
        } catch (e) { e.name; }
    ";
    assert_eq!(run(code), Object::String("TypeError".to_string()));
}

#[test]
fn non_writable_property_silently_ignored_then_strict_throws() {
    let code = "
        var o = {};
        Object.defineProperty(o, 'ro', { value: 1, writable: false });
        o.ro = 2;
        var soft = o.ro;
        var hard = (function(){ 'use strict'; try { o.ro = 3; return 'no'; } catch (e) { return e.name; } })();
        soft + ',' + hard;
    ";
    assert_eq!(run(code), Object::String("1,TypeError".to_string()));
}

#[test]
fn prevent_extensions_blocks_new_properties() {
    let code = "
        var o = { a: 1 };
        Object.preventExtensions(o);
        o.b = 2;
        o.a = 3;
        [o.a, 'b' in o, Object.isExtensible(o)].join(',');
    ";
    assert_eq!(run(code), Object::String("3,false,false".to_string()));
}

#[test]
fn freeze_makes_properties_immutable() {
    let code = "
        var o = { a: 1 };
        Object.freeze(o);
        o.a = 9;
        delete o.a;
        [o.a, Object.isFrozen(o)].join(',');
    ";
    assert_eq!(run(code), Object::String("1,true".to_string()));
}

#[test]
fn array_length_magic() {
    let code = "
        var a = [];
        a[4] = 'e';
        var grown = a.length;
        a.length = 2;
        [grown, a.length, 4 in a].join(',');
    ";
    assert_eq!(run(code), Object::String("5,2,false".to_string()));
}

#[test]
fn invalid_array_length_throws_range_error() {
    assert_eq!(
        run("try { [].length = -1; 'no'; } catch (e) { e.name; }"),
        Object::String("RangeError".to_string())
    );
}

#[test]
fn array_to_string_handles_cycles() {
    assert_eq!(
        run("var a = [1, 2]; a.push(a); '' + a;"),
        Object::String("1,2,...".to_string())
    );
}

#[test]
fn has_own_property_vs_in() {
    let code = "
        var base = { inherited: 1 };
        var o = Object.create(base);
        o.own = 2;
        [o.hasOwnProperty('own'), o.hasOwnProperty('inherited'), 'inherited' in o].join(',');
    ";
    assert_eq!(run(code), Object::String("true,false,true".to_string()));
}

#[test]
fn is_prototype_of_walks_the_chain() {
    let code = "
        var a = {};
        var b = Object.create(a);
        var c = Object.create(b);
        [a.isPrototypeOf(c), c.isPrototypeOf(a)].join(',');
    ";
    assert_eq!(run(code), Object::String("true,false".to_string()));
}

#[test]
fn object_prototype_to_string_renders_class_tags() {
    let code = "
        var ts = Object.prototype.toString;
        [ts.call([]), ts.call(new Date(0)), ts.call(/x/), ts.call('s'), ts.call(5), ts.call(null)].join('|');
    ";
    assert_eq!(
        run(code),
        Object::String(
            "[object Array]|[object Date]|[object RegExp]|[object String]|[object Number]|[object Null]".to_string()
        )
    );
}

#[test]
fn boxed_primitives_unwrap() {
    assert_eq!(run("new Number(5) + 1;"), Object::Number(6.0));
    assert_eq!(run("new String('ab').length;"), Object::Number(2.0));
    assert_eq!(run("typeof new Boolean(false);"), Object::String("object".to_string()));
    assert_eq!(run("new Boolean(false) ? 'truthy' : 'falsy';"), Object::String("truthy".to_string()));
}

#[test]
fn scope_shadowing_and_assignment_targets() {
    let code = "
        var x = 'global';
        function outer() {
            var x = 'outer';
            function inner() { x = 'changed'; return x; }
            inner();
            return x;
        }
        outer() + ',' + x;
    ";
    assert_eq!(run(code), Object::String("changed,global".to_string()));
}

#[test]
fn catch_scope_is_transient() {
    let code = "
        var e = 'outer';
        try { throw 'inner'; } catch (e) { var seen = e; }
        [e, seen].join(',');
    ";
    assert_eq!(run(code), Object::String("outer,inner".to_string()));
}
