//! Step-driven execution: equivalence with `run`, appending code, pausing.

use pretty_assertions::assert_eq;
use skink::{Interpreter, Object};

fn run_all_steps(interp: &mut Interpreter) -> usize {
    let mut steps = 0;
    while interp.step().unwrap() {
        steps += 1;
        assert!(steps < 1_000_000, "runaway program");
    }
    steps
}

#[test]
fn stepping_matches_running() {
    let code = "var total = 0; for (var i = 1; i <= 10; i++) { total += i; } total;";
    let mut stepped = Interpreter::new(code).unwrap();
    run_all_steps(&mut stepped);

    let mut ran = Interpreter::new(code).unwrap();
    assert!(!ran.run().unwrap());

    assert_eq!(stepped.value(), ran.value());
    assert_eq!(stepped.value(), Object::Number(55.0));
}

#[test]
fn step_reports_done_idempotently() {
    let mut interp = Interpreter::new("1 + 1;").unwrap();
    while interp.step().unwrap() {}
    assert!(!interp.step().unwrap());
    assert!(!interp.step().unwrap());
    assert_eq!(interp.value(), Object::Number(2.0));
}

#[test]
fn append_code_equals_concatenated_source() {
    let mut split = Interpreter::new("var a = 2;").unwrap();
    assert!(!split.run().unwrap());
    split.append_code("a * 21;").unwrap();
    assert!(!split.run().unwrap());

    let mut whole = Interpreter::new("var a = 2; a * 21;").unwrap();
    whole.run().unwrap();

    assert_eq!(split.value(), whole.value());
    assert_eq!(split.value(), Object::Number(42.0));
}

#[test]
fn append_code_sees_earlier_bindings_and_functions() {
    let mut interp = Interpreter::new("function double(x) { return x * 2; } var n = 3;").unwrap();
    interp.run().unwrap();
    interp.append_code("double(n);").unwrap();
    interp.run().unwrap();
    assert_eq!(interp.value(), Object::Number(6.0));
}

#[test]
fn append_code_after_uncaught_error_is_refused() {
    let mut interp = Interpreter::new("throw new Error('dead');").unwrap();
    assert!(interp.run().is_err());
    assert!(interp.append_code("1;").is_err());
}

#[test]
fn pause_stops_progress_until_cleared() {
    let mut interp = Interpreter::new("var n = 0; n = 1; n = 2;").unwrap();
    interp.step().unwrap();
    let depth = interp.stack_depth();
    interp.pause();
    assert!(interp.paused());
    for _ in 0..5 {
        assert!(interp.step().unwrap());
        assert_eq!(interp.stack_depth(), depth, "paused steps must not progress");
    }
}

#[test]
fn stack_depth_grows_inside_calls() {
    let mut interp = Interpreter::new("function f(){ return 1; } f();").unwrap();
    let mut max_depth = 0;
    while interp.step().unwrap() {
        max_depth = max_depth.max(interp.stack_depth());
    }
    assert!(max_depth > 2, "call execution should deepen the stack, saw {max_depth}");
}

#[test]
fn locations_surface_for_user_code_only() {
    let options = skink::InterpreterOptions {
        parse: skink::ParseOptions {
            locations: true,
            ..skink::ParseOptions::default()
        },
        ..skink::InterpreterOptions::default()
    };
    let mut interp = Interpreter::with_options("var x = 1;\nvar y = 2;", options).unwrap();
    let mut saw_line_two = false;
    while interp.step().unwrap() {
        if let Some(loc) = interp.current_location() {
            assert!(loc.line >= 1);
            saw_line_two |= loc.line == 2;
        }
    }
    assert!(saw_line_two, "stepping should reach the second line");
}

#[test]
fn heap_stats_report_guest_allocations() {
    let mut interp = Interpreter::new("var xs = [1, 2, 3]; var o = { a: xs };").unwrap();
    let before = interp.heap_stats().live_objects;
    interp.run().unwrap();
    let after = interp.heap_stats();
    assert!(after.live_objects > before);
    assert!(after.objects_by_class.contains_key("Array"));
}
