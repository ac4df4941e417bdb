//! Built-in library behavior, including the guest-source polyfills.

use pretty_assertions::assert_eq;
use skink::{Interpreter, Object};

fn run(code: &str) -> Object {
    let mut interp = Interpreter::new(code).expect("parse");
    assert!(!interp.run().expect("run"));
    interp.value()
}

fn run_string(code: &str) -> String {
    match run(code) {
        Object::String(s) => s,
        other => panic!("expected a string result, got {other:?}"),
    }
}

// === Array ===

#[test]
fn array_mutators() {
    assert_eq!(run_string("var a = [1,2,3]; a.push(4); a.join('');"), "1234");
    assert_eq!(run_string("var a = [1,2,3]; [a.pop(), a.join(''), a.length].join('|');"), "3|12|2");
    assert_eq!(run_string("var a = [1,2,3]; [a.shift(), a.join('')].join('|');"), "1|23");
    assert_eq!(run_string("var a = [2,3]; [a.unshift(0,1), a.join('')].join('|');"), "4|0123");
    assert_eq!(run_string("[3,1,2].sort().join('');"), "123");
    assert_eq!(run_string("[1,2,3].reverse().join('');"), "321");
    assert_eq!(run_string("var a = [1,2,3,4,5]; [a.splice(1,2,'x').join(''), a.join('')].join('|');"), "23|1x45");
}

#[test]
fn array_accessors() {
    assert_eq!(run_string("[1,2].concat([3],4).join('');"), "1234");
    assert_eq!(run("[1,2,3,2].indexOf(2);"), Object::Number(1.0));
    assert_eq!(run("[1,2,3,2].lastIndexOf(2);"), Object::Number(3.0));
    assert_eq!(run("[1,2,3].indexOf(9);"), Object::Number(-1.0));
    assert_eq!(run_string("[1,2,3,4].slice(1,3).join('');"), "23");
    assert_eq!(run_string("[1,2,3,4].slice(-2).join('');"), "34");
    assert_eq!(run("Array.isArray([]);"), Object::Bool(true));
    assert_eq!(run("Array.isArray({});"), Object::Bool(false));
}

#[test]
fn array_higher_order_polyfills() {
    assert_eq!(run_string("[1,2,3].map(function(x){ return x * 2; }).join(',');"), "2,4,6");
    assert_eq!(run_string("[1,2,3,4].filter(function(x){ return x % 2 === 0; }).join(',');"), "2,4");
    assert_eq!(run("[1,2,3].reduce(function(a, b){ return a + b; });"), Object::Number(6.0));
    assert_eq!(run("[1,2,3].reduce(function(a, b){ return a + b; }, 10);"), Object::Number(16.0));
    assert_eq!(run_string("['a','b'].reduceRight(function(a, b){ return a + b; });"), "ba");
    assert_eq!(run("[1,2,3].every(function(x){ return x > 0; });"), Object::Bool(true));
    assert_eq!(run("[1,2,3].some(function(x){ return x > 2; });"), Object::Bool(true));
    assert_eq!(
        run_string("var out = []; [10, 20].forEach(function(v, i){ out.push(i + ':' + v); }); out.join(',');"),
        "0:10,1:20"
    );
}

#[test]
fn sort_with_comparator_is_the_polyfill_path() {
    assert_eq!(
        run_string("[10, 2, 33, 4].sort(function(a, b){ return a - b; }).join(',');"),
        "2,4,10,33"
    );
    // Default sort is string order, so the same input differs.
    assert_eq!(run_string("[10, 2, 33, 4].sort().join(',');"), "10,2,33,4");
}

#[test]
fn polyfilled_methods_are_not_enumerable() {
    assert_eq!(
        run_string("var seen = []; for (var k in [1]) seen.push(k); seen.join(',');"),
        "0"
    );
}

// === String ===

#[test]
fn string_methods() {
    assert_eq!(run_string("'hello'.charAt(1);"), "e");
    assert_eq!(run_string("'hello'.charAt(99);"), "");
    assert_eq!(run("'hello'.charCodeAt(0);"), Object::Number(104.0));
    assert!(matches!(run("''.charCodeAt(0);"), Object::Number(n) if n.is_nan()));
    assert_eq!(run("'héllo'.length;"), Object::Number(5.0));
}

#[test]
fn string_search_methods() {
    assert_eq!(run("'banana'.indexOf('an');"), Object::Number(1.0));
    assert_eq!(run("'banana'.lastIndexOf('an');"), Object::Number(3.0));
    assert_eq!(run("'banana'.indexOf('x');"), Object::Number(-1.0));
    assert_eq!(run_string("'Hello World'.toLowerCase();"), "hello world");
    assert_eq!(run_string("'Hello'.toUpperCase();"), "HELLO");
    assert_eq!(run_string("'  pad  '.trim();"), "pad");
    assert_eq!(run_string("'abcdef'.slice(1, 3);"), "bc");
    assert_eq!(run_string("'abcdef'.slice(-2);"), "ef");
    assert_eq!(run_string("'abcdef'.substring(4, 2);"), "cd");
    assert_eq!(run_string("'abcdef'.substr(2, 2);"), "cd");
    assert_eq!(run_string("'a,b,,c'.split(',').join('|');"), "a|b||c");
    assert_eq!(run_string("'abc'.split('').join('-');"), "a-b-c");
    assert_eq!(run_string("String.fromCharCode(104, 105);"), "hi");
    assert_eq!(run_string("'ab'.concat('cd', 'ef');"), "abcdef");
}

#[test]
fn string_replace_with_string_and_dollar_patterns() {
    assert_eq!(run_string("'a-b'.replace('-', '+');"), "a+b");
    assert_eq!(run_string("'john smith'.replace(/(\\w+) (\\w+)/, '$2 $1');"), "smith john");
    assert_eq!(run_string("'aaa'.replace(/a/, 'b');"), "baa");
    assert_eq!(run_string("'aaa'.replace(/a/g, 'b');"), "bbb");
}

#[test]
fn string_replace_with_function_is_the_polyfill_path() {
    assert_eq!(
        run_string("'a1b2'.replace(/\\d/g, function(m){ return '<' + m + '>'; });"),
        "a<1>b<2>"
    );
    assert_eq!(
        run_string("'x-y'.replace('-', function(m, at){ return '[' + at + ']'; });"),
        "x[1]y"
    );
}

#[test]
fn string_match_and_search() {
    assert_eq!(run_string("'a1b2c3'.match(/\\d/g).join(',');"), "1,2,3");
    assert_eq!(run("'abc'.match(/x/);"), Object::Null);
    assert_eq!(run("'hay needle hay'.search(/needle/);"), Object::Number(4.0));
    assert_eq!(run("'abc'.search(/x/);"), Object::Number(-1.0));
    assert_eq!(run_string("'a1b2'.match(/([a-z])(\\d)/)[2];"), "1");
}

// === RegExp ===

#[test]
fn regexp_exec_tracks_last_index_when_global() {
    let code = "
        var re = /\\d+/g;
        var out = [];
        var m;
        while ((m = re.exec('a12b345')) !== null) out.push(m[0] + '@' + m.index);
        out.join(' ');
    ";
    assert_eq!(run_string(code), "12@1 345@4");
}

#[test]
fn regexp_test_and_literals() {
    assert_eq!(run("/ab+c/.test('xabbc');"), Object::Bool(true));
    assert_eq!(run("/^ab$/.test('xab');"), Object::Bool(false));
    assert_eq!(run("/AB/i.test('ab');"), Object::Bool(true));
    assert_eq!(run_string("'' + /a[/]b/g;"), "/a[/]b/g");
    assert_eq!(run("new RegExp('a+').test('caat');"), Object::Bool(true));
    assert_eq!(run_string("var r = /x/gi; [r.source, r.global, r.ignoreCase].join(',');"), "x,true,true");
}

// === Number / parseInt / parseFloat ===

#[test]
fn number_formatting() {
    assert_eq!(run_string("(255).toString(16);"), "ff");
    assert_eq!(run_string("(3.14159).toFixed(2);"), "3.14");
    assert_eq!(run_string("(0.000001).toString();"), "0.000001");
    assert_eq!(run_string("(1e21).toString();"), "1e+21");
    assert_eq!(run_string("(123.456).toExponential(1);"), "1.2e+2");
    assert_eq!(run_string("(123.456).toPrecision(4);"), "123.5");
    assert_eq!(run_string("String(1/0);"), "Infinity");
    assert_eq!(run_string("String(-1/0);"), "-Infinity");
    assert_eq!(run_string("String(0/0);"), "NaN");
}

#[test]
fn global_numeric_functions() {
    assert_eq!(run("parseInt('42px');"), Object::Number(42.0));
    assert_eq!(run("parseInt('0x1f');"), Object::Number(31.0));
    assert_eq!(run("parseInt('0x1f', 16);"), Object::Number(31.0));
    // An explicit radix 10 does not strip the hex prefix.
    assert_eq!(run("parseInt('0x1f', 10);"), Object::Number(0.0));
    assert_eq!(run("parseInt('ff', 16);"), Object::Number(255.0));
    assert_eq!(run("parseFloat('3.5e1x');"), Object::Number(35.0));
    assert_eq!(run("isNaN('abc');"), Object::Bool(true));
    assert_eq!(run("isFinite('10');"), Object::Bool(true));
    assert_eq!(run("isFinite(1/0);"), Object::Bool(false));
}

#[test]
fn uri_codecs() {
    assert_eq!(run_string("encodeURIComponent('a b/c');"), "a%20b%2Fc");
    assert_eq!(run_string("decodeURIComponent('a%20b%2Fc');"), "a b/c");
    assert_eq!(run_string("encodeURI('a b/c?d=e');"), "a%20b/c?d=e");
    assert_eq!(
        run_string("try { decodeURIComponent('%'); } catch (e) { e.name; }"),
        "URIError"
    );
}

// === Math ===

#[test]
fn math_functions() {
    assert_eq!(run("Math.max(1, 9, 3);"), Object::Number(9.0));
    assert_eq!(run("Math.min(4, -2);"), Object::Number(-2.0));
    assert_eq!(run("Math.floor(2.9);"), Object::Number(2.0));
    assert_eq!(run("Math.ceil(2.1);"), Object::Number(3.0));
    assert_eq!(run("Math.round(2.5);"), Object::Number(3.0));
    assert_eq!(run("Math.round(-2.5);"), Object::Number(-2.0));
    assert_eq!(run("Math.pow(2, 10);"), Object::Number(1024.0));
    assert_eq!(run("Math.abs(-5);"), Object::Number(5.0));
    assert_eq!(run("Math.sqrt(81);"), Object::Number(9.0));
    assert_eq!(run("Math.max();"), Object::Number(f64::NEG_INFINITY));
}

// === JSON ===

#[test]
fn json_round_trip() {
    assert_eq!(
        run_string("JSON.stringify({ a: [1, true, null], b: 'x' });"),
        r#"{"a":[1,true,null],"b":"x"}"#
    );
    assert_eq!(run("JSON.parse('{\"n\": 3}').n;"), Object::Number(3.0));
    assert_eq!(run_string("JSON.parse('[1,2]').join('+');"), "1+2");
    assert_eq!(
        run_string("try { JSON.parse('nope'); } catch (e) { e.name; }"),
        "SyntaxError"
    );
    assert_eq!(
        run_string("var o = {}; o.me = o; try { JSON.stringify(o); } catch (e) { e.name; }"),
        "TypeError"
    );
    assert_eq!(run("JSON.stringify(undefined);"), Object::Undefined);
}

// === Date ===

#[test]
fn date_basics() {
    assert_eq!(run("new Date(86400000).getTime();"), Object::Number(86_400_000.0));
    assert_eq!(run("new Date(0).getUTCFullYear();"), Object::Number(1970.0));
    assert_eq!(run("new Date(2020, 0, 2).getMonth();"), Object::Number(0.0));
    assert_eq!(run("new Date(2020, 12, 1).getFullYear();"), Object::Number(2021.0));
    assert_eq!(run_string("new Date(0).toISOString();"), "1970-01-01T00:00:00.000Z");
    assert_eq!(run("Date.UTC(1970, 0, 2);"), Object::Number(86_400_000.0));
    assert_eq!(run("new Date('1970-01-02T00:00:00Z').getTime();"), Object::Number(86_400_000.0));
    assert!(matches!(run("new Date('garbage').getTime();"), Object::Number(n) if n.is_nan()));
    assert_eq!(run("new Date(0).getTimezoneOffset();"), Object::Number(0.0));
}

#[test]
fn date_setters() {
    assert_eq!(
        run("var d = new Date(0); d.setFullYear(2000); d.getFullYear();"),
        Object::Number(2000.0)
    );
    assert_eq!(
        run("var d = new Date(0); d.setTime(1000); d.getTime();"),
        Object::Number(1000.0)
    );
}

// === Function / bind polyfill ===

#[test]
fn call_apply_and_bind() {
    assert_eq!(
        run("function f(a, b){ return this.base + a + b; } f.call({base: 1}, 2, 3);"),
        Object::Number(6.0)
    );
    assert_eq!(
        run("function f(a, b){ return this.base + a + b; } f.apply({base: 10}, [20, 30]);"),
        Object::Number(60.0)
    );
    assert_eq!(
        run("function f(a, b){ return this.base + a + b; } var g = f.bind({base: 100}, 1); g(2);"),
        Object::Number(103.0)
    );
    assert_eq!(
        run("function T(v){ this.v = v; } var B = T.bind(null, 7); new B() instanceof T;"),
        Object::Bool(true)
    );
}

#[test]
fn object_create_with_descriptors_polyfill() {
    let code = "
        var o = Object.create({inherited: 1}, { own: { value: 2, enumerable: true } });
        [o.inherited, o.own].join(',');
    ";
    assert_eq!(run_string(code), "1,2");
}

#[test]
fn error_hierarchy() {
    assert_eq!(run_string("new TypeError('m').name;"), "TypeError");
    assert_eq!(run_string("'' + new RangeError('oops');"), "RangeError: oops");
    assert_eq!(run_string("'' + new Error();"), "Error");
    assert_eq!(run("new SyntaxError('x') instanceof Error;"), Object::Bool(true));
    assert_eq!(run("new Error('x') instanceof TypeError;"), Object::Bool(false));
}

#[test]
fn function_constructor_compiles_source() {
    assert_eq!(run("new Function('a', 'b', 'return a * b;')(6, 7);"), Object::Number(42.0));
    assert_eq!(
        run_string("try { new Function('syntax error here'); } catch (e) { e.name; }"),
        "SyntaxError"
    );
}

#[test]
fn to_locale_string_polyfill() {
    assert_eq!(run_string("[1, null, 'x'].toLocaleString();"), "1,,x");
}
