//! Host↔guest bridging: native bindings, async bindings, value lowering.

use std::{cell::RefCell, rc::Rc};

use pretty_assertions::assert_eq;
use skink::{Interpreter, InterpreterOptions, Object, Resolver};

#[test]
fn native_function_receives_lowered_args_and_returns() {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_in = Rc::clone(&seen);
    let mut interp = Interpreter::with_setup(
        "add(19, 23);",
        InterpreterOptions::default(),
        move |interp| {
            let add = interp.create_native_function("add", 2, move |args| {
                seen_in.borrow_mut().push(args.clone());
                match (&args[0], &args[1]) {
                    (Object::Number(a), Object::Number(b)) => Object::Number(a + b),
                    _ => Object::Undefined,
                }
            });
            let global = interp.global();
            interp.set_function_property(global, "add", add);
        },
    )
    .unwrap();
    assert!(!interp.run().unwrap());
    assert_eq!(interp.value(), Object::Number(42.0));
    assert_eq!(seen.borrow().len(), 1);
    assert_eq!(seen.borrow()[0], vec![Object::Number(19.0), Object::Number(23.0)]);
}

#[test]
fn native_function_observes_getter_invocations() {
    // The E3 shape: one getter access, observable through instrumentation.
    let count = Rc::new(RefCell::new(0));
    let count_in = Rc::clone(&count);
    let mut interp = Interpreter::with_setup(
        "var o = {get x(){ tick(); return 42; }}; o.x;",
        InterpreterOptions::default(),
        move |interp| {
            let tick = interp.create_native_function("tick", 0, move |_| {
                *count_in.borrow_mut() += 1;
                Object::Undefined
            });
            let global = interp.global();
            interp.set_function_property(global, "tick", tick);
        },
    )
    .unwrap();
    interp.run().unwrap();
    assert_eq!(interp.value(), Object::Number(42.0));
    assert_eq!(*count.borrow(), 1);
}

#[test]
fn async_function_pauses_and_resumes() {
    // E7: sleep(10) pauses; resolving with 0 resumes and completes.
    let resolver_slot: Rc<RefCell<Option<Resolver>>> = Rc::new(RefCell::new(None));
    let slot = Rc::clone(&resolver_slot);
    let mut interp = Interpreter::with_setup(
        "var t = sleep(10); t + 1;",
        InterpreterOptions::default(),
        move |interp| {
            let sleep = interp.create_async_function("sleep", 2, move |args, resolver| {
                assert_eq!(args, vec![Object::Number(10.0)]);
                *slot.borrow_mut() = Some(resolver);
            });
            let global = interp.global();
            interp.set_function_property(global, "sleep", sleep);
        },
    )
    .unwrap();

    assert!(interp.run().unwrap(), "first run must pause at the async call");
    assert!(interp.paused());

    resolver_slot.borrow_mut().take().unwrap().resolve(Object::Number(0.0));
    assert!(!interp.run().unwrap(), "second run must complete");
    assert_eq!(interp.value(), Object::Number(1.0));
}

#[test]
fn side_effect_order_is_preserved_between_step_and_run() {
    fn collect(code: &'static str, stepped: bool) -> Vec<String> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_in = Rc::clone(&log);
        let mut interp = Interpreter::with_setup(code, InterpreterOptions::default(), move |interp| {
            let emit = interp.create_native_function("emit", 1, move |args| {
                log_in.borrow_mut().push(args[0].to_string());
                Object::Undefined
            });
            let global = interp.global();
            interp.set_function_property(global, "emit", emit);
        })
        .unwrap();
        if stepped {
            while interp.step().unwrap() {}
        } else {
            interp.run().unwrap();
        }
        let out = log.borrow().clone();
        out
    }

    let code = "emit('a'); for (var i = 0; i < 2; i++) emit(i); emit('z');";
    let stepped = collect(code, true);
    let ran = collect(code, false);
    assert_eq!(stepped, vec!["a", "0", "1", "z"]);
    assert_eq!(stepped, ran);
}

#[test]
fn json_shaped_values_round_trip_through_the_bridge() {
    let mut interp = Interpreter::new("").unwrap();
    let input = Object::Map(vec![
        ("a".to_string(), Object::Number(1.0)),
        ("b".to_string(), Object::Array(vec![Object::Bool(true), Object::Null])),
        ("c".to_string(), Object::String("s".to_string())),
    ]);
    let guest = interp.native_to_guest(&input).unwrap();
    let output = interp.guest_to_native(&guest);
    assert_eq!(input, output);
}

#[test]
fn cyclic_graphs_preserve_topology() {
    let mut interp = Interpreter::new("var o = {}; o.self = o; o.list = [o];").unwrap();
    interp.run().unwrap();
    let global = interp.global();
    let o = interp.get_property(global, "o");
    let Object::Map(pairs) = &o else {
        panic!("expected a map, got {o:?}");
    };
    assert_eq!(pairs[0].0, "self");
    assert_eq!(pairs[0].1, Object::Cycle(0), "o.self points back at o");
    let Object::Array(items) = &pairs[1].1 else {
        panic!("expected o.list to lower as an array");
    };
    assert_eq!(items[0], Object::Cycle(0));

    // Lifting the lowered graph reproduces the cycle.
    let lifted = interp.native_to_guest(&o).unwrap();
    let relowered = interp.guest_to_native(&lifted);
    assert_eq!(o, relowered);
}

#[test]
fn get_and_set_property_on_the_global() {
    let mut interp = Interpreter::new("input * 2;").unwrap();
    let global = interp.global();
    interp.set_property(global, "input", Object::Number(21.0)).unwrap();
    interp.run().unwrap();
    assert_eq!(interp.value(), Object::Number(42.0));
    assert_eq!(interp.get_property(global, "input"), Object::Number(21.0));
}

#[test]
fn regexp_and_date_cross_the_bridge() {
    let mut interp = Interpreter::new("var re = /a+/gi; var d = new Date(86400000);").unwrap();
    interp.run().unwrap();
    let global = interp.global();
    assert_eq!(
        interp.get_property(global, "re"),
        Object::Regex {
            source: "a+".to_string(),
            flags: "gi".to_string()
        }
    );
    assert_eq!(interp.get_property(global, "d"), Object::Date(86_400_000.0));
}

#[test]
fn functions_lower_as_reprs() {
    let mut interp = Interpreter::new("var f = function named(){};").unwrap();
    interp.run().unwrap();
    let global = interp.global();
    let lowered = interp.get_property(global, "f");
    assert!(matches!(lowered, Object::Repr(text) if text.contains("named")));
}

#[test]
fn seeded_math_random_is_deterministic() {
    fn sample(seed: u64) -> Object {
        let options = InterpreterOptions {
            random_seed: Some(seed),
            ..InterpreterOptions::default()
        };
        let mut interp = Interpreter::with_options("Math.random();", options).unwrap();
        interp.run().unwrap();
        interp.value()
    }
    assert_eq!(sample(7), sample(7));
    let Object::Number(n) = sample(7) else { panic!() };
    assert!((0.0..1.0).contains(&n));
}
