//! Parse-time failures surfaced through `Interpreter::new`.

use skink::{CodeLoc, ErrorKind, Exception, Interpreter, InterpreterOptions, ParseOptions};

fn parse_err(code: &str) -> Exception {
    Interpreter::new(code).expect_err("expected a parse error")
}

#[test]
fn parse_errors_are_syntax_errors_with_positions() {
    let err = parse_err("var = 1;");
    assert_eq!(err.kind(), ErrorKind::SyntaxError);
    assert!(err.loc().is_some());
}

#[test]
fn unterminated_block_comment_points_at_its_start() {
    let err = parse_err("1; /* never closed");
    assert_eq!(err.kind(), ErrorKind::SyntaxError);
    assert_eq!(err.loc(), Some(CodeLoc { line: 1, column: 3 }));
}

#[test]
fn unterminated_string() {
    assert_eq!(parse_err("'open").kind(), ErrorKind::SyntaxError);
}

#[test]
fn octal_in_strict_mode() {
    assert_eq!(parse_err("'use strict'; 010;").kind(), ErrorKind::SyntaxError);
    // Same digits parse as octal 8 outside strict mode.
    let mut interp = Interpreter::new("010;").unwrap();
    interp.run().unwrap();
    assert_eq!(interp.value(), skink::Object::Number(8.0));
}

#[test]
fn strict_delete_of_variable() {
    assert_eq!(parse_err("'use strict'; var x; delete x;").kind(), ErrorKind::SyntaxError);
}

#[test]
fn return_break_continue_placement() {
    assert_eq!(parse_err("return 1;").kind(), ErrorKind::SyntaxError);
    assert_eq!(parse_err("break;").kind(), ErrorKind::SyntaxError);
    assert_eq!(parse_err("continue;").kind(), ErrorKind::SyntaxError);
    assert_eq!(parse_err("x: { continue x; }").kind(), ErrorKind::SyntaxError);
}

#[test]
fn duplicate_accessors_and_strict_duplicate_data() {
    assert_eq!(parse_err("({ get x(){}, get x(){} });").kind(), ErrorKind::SyntaxError);
    assert_eq!(parse_err("({ x: 1, set x(v){} });").kind(), ErrorKind::SyntaxError);
    assert_eq!(parse_err("'use strict'; ({ x: 1, x: 2 });").kind(), ErrorKind::SyntaxError);
    assert!(Interpreter::new("({ x: 1, x: 2 });").is_ok());
}

#[test]
fn strict_argument_name_rules() {
    assert_eq!(
        parse_err("function f(a, a) { 'use strict'; }").kind(),
        ErrorKind::SyntaxError
    );
    assert_eq!(
        parse_err("function f(eval) { 'use strict'; }").kind(),
        ErrorKind::SyntaxError
    );
    assert!(Interpreter::new("function f(a, a) {}").is_ok());
}

#[test]
fn strict_semicolons_option_disables_asi() {
    let options = InterpreterOptions {
        parse: ParseOptions {
            strict_semicolons: true,
            ..ParseOptions::default()
        },
        ..InterpreterOptions::default()
    };
    assert!(Interpreter::with_options("var a = 1\nvar b = 2", options.clone()).is_err());
    assert!(Interpreter::with_options("var a = 1; var b = 2;", options).is_ok());
}

#[test]
fn forbid_reserved_option() {
    let options = InterpreterOptions {
        parse: ParseOptions {
            forbid_reserved: true,
            ..ParseOptions::default()
        },
        ..InterpreterOptions::default()
    };
    assert!(Interpreter::with_options("var class_ok = 1; var enum1 = 2;", options.clone()).is_ok());
    assert!(Interpreter::with_options("var x = enum;", options).is_err());
}

#[test]
fn regexp_flags_are_validated() {
    assert_eq!(parse_err("/a/zz;").kind(), ErrorKind::SyntaxError);
    assert!(Interpreter::new("/a/gimsy;").is_ok());
}

#[test]
fn invalid_regexp_body_throws_at_literal_evaluation() {
    // The lexer accepts the shape; compilation raises a guest SyntaxError.
    let mut interp = Interpreter::new("try { eval('/(/'); } catch (e) { e.name; }").unwrap();
    interp.run().unwrap();
    assert_eq!(interp.value(), skink::Object::String("SyntaxError".to_string()));
}

#[test]
fn with_in_strict_mode() {
    assert_eq!(parse_err("'use strict'; with ({}) {}").kind(), ErrorKind::SyntaxError);
}

#[test]
fn illegal_newline_after_throw() {
    assert_eq!(parse_err("function f(){ throw\n1; }").kind(), ErrorKind::SyntaxError);
}

#[test]
fn missing_catch_and_finally() {
    assert_eq!(parse_err("try { 1; }").kind(), ErrorKind::SyntaxError);
}
