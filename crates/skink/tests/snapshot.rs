//! Whole-interpreter snapshots: dump mid-run, load, resume.

use pretty_assertions::assert_eq;
use skink::{Interpreter, InterpreterOptions, Object};

#[test]
fn snapshot_round_trips_completed_state() {
    let mut interp = Interpreter::new("var a = [1, 2, 3]; a.length;").unwrap();
    interp.run().unwrap();
    let bytes = interp.dump().unwrap();
    let restored = Interpreter::load(&bytes).unwrap();
    assert_eq!(restored.value(), Object::Number(3.0));
}

#[test]
fn snapshot_resumes_mid_run() {
    let code = "var total = 0; for (var i = 0; i < 100; i++) { total += i; } total;";
    let mut original = Interpreter::new(code).unwrap();
    // Park the interpreter somewhere in the middle of the loop.
    for _ in 0..500 {
        assert!(original.step().unwrap());
    }
    let bytes = original.dump().unwrap();

    let mut restored = Interpreter::load(&bytes).unwrap();
    assert!(!restored.run().unwrap());
    assert_eq!(restored.value(), Object::Number(4950.0));

    // The original is unaffected and finishes identically.
    assert!(!original.run().unwrap());
    assert_eq!(original.value(), restored.value());
}

#[test]
fn snapshot_preserves_seeded_rng_stream() {
    let options = InterpreterOptions {
        random_seed: Some(1234),
        ..InterpreterOptions::default()
    };
    let mut interp = Interpreter::with_options("Math.random(); Math.random();", options).unwrap();
    // Run the first statement only, then snapshot.
    while interp.step().unwrap() {
        if interp.stack_depth() == 1 {
            break;
        }
    }
    let bytes = interp.dump().unwrap();
    interp.run().unwrap();
    let expected = interp.value();

    let mut restored = Interpreter::load(&bytes).unwrap();
    restored.run().unwrap();
    assert_eq!(restored.value(), expected);
}

#[test]
fn host_bindings_must_be_rebound_after_load() {
    let mut interp = Interpreter::with_setup(
        "var first = twice(5); var second = twice(first); second;",
        InterpreterOptions::default(),
        |interp| {
            let twice = interp.create_native_function("twice", 1, |args| match args[0] {
                Object::Number(n) => Object::Number(n * 2.0),
                _ => Object::Undefined,
            });
            let global = interp.global();
            interp.set_function_property(global, "twice", twice);
        },
    )
    .unwrap();

    // Execute until the first binding call completed, then snapshot.
    while interp.step().unwrap() {
        let global = interp.global();
        if interp.get_property(global, "first") != Object::Undefined {
            break;
        }
    }
    let bytes = interp.dump().unwrap();

    // Without rebinding, invoking the native is a host error.
    let mut unbound = Interpreter::load(&bytes).unwrap();
    assert!(unbound.run().is_err());

    let mut rebound = Interpreter::load(&bytes).unwrap();
    rebound
        .bind_native_function("twice", |args| match args[0] {
            Object::Number(n) => Object::Number(n * 2.0),
            _ => Object::Undefined,
        })
        .unwrap();
    assert!(!rebound.run().unwrap());
    assert_eq!(rebound.value(), Object::Number(20.0));
}
