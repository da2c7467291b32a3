mod common;

use common::{run, session, single_error};
use kali::error::{KaliError, Phase};
use kali::session::SessionOptions;

#[test]
fn definitions_persist_across_runs() {
    let (mut session, buffer) = session(true);

    session.run("var a = 1;").unwrap();
    session.run("fun f(): number { return a + 41; }").unwrap();
    session.run("class Greeter { hi(): string { return \"hi\"; } }").unwrap();
    session.run("print f(); print Greeter().hi();").unwrap();

    assert_eq!(buffer.contents(), "42\nhi\n");
}

#[test]
fn closures_outlive_the_run_that_made_them() {
    let (mut session, buffer) = session(false);

    session
        .run("fun make() { var n = 0; fun next() { n = n + 1; print n; } return next; }")
        .unwrap();
    session.run("var counter = make();").unwrap();
    session.run("counter();").unwrap();
    session.run("counter();").unwrap();

    assert_eq!(buffer.contents(), "1\n2\n");
}

#[test]
fn a_failed_run_does_not_poison_the_session() {
    let (mut session, buffer) = session(true);

    assert!(session.run("print 1 + \"a\";").is_err());
    assert!(session.run("print ;").is_err());
    session.run("print 3;").unwrap();

    assert_eq!(buffer.contents(), "3\n");
}

#[test]
fn a_rejected_line_leaves_no_bindings_behind() {
    let (mut session, buffer) = session(true);

    session.run("var x = 1;").unwrap();
    let errors = session
        .run("var x = \"s\"; var y: number = \"bad\";")
        .unwrap_err();
    assert_eq!(errors[0].phase(), Phase::Compile);

    let errors = session.run("print x + \"a\";").unwrap_err();
    assert_eq!(errors[0].phase(), Phase::Compile);

    session.run("print x + 1;").unwrap();
    assert_eq!(buffer.contents(), "2\n");
}

#[test]
fn a_runtime_failure_rolls_back_its_definitions() {
    let (mut session, buffer) = session(true);

    session.run("var x = 1;").unwrap();
    let errors = session
        .run("var x = \"s\"; var y = 2; print \"ab\" * (1 / 0);")
        .unwrap_err();
    assert_eq!(errors[0].phase(), Phase::Runtime);

    session.run("print x + 1;").unwrap();
    assert!(session.run("print y;").is_err());
    assert_eq!(buffer.contents(), "2\n");
}

#[test]
fn check_leaves_no_definitions() {
    let (mut session, _) = session(true);

    session.check("var z = 1;").unwrap();
    let errors = session.run("print z;").unwrap_err();
    assert_eq!(errors[0].phase(), Phase::Compile);
}

#[test]
fn check_does_not_execute() {
    let (mut session, buffer) = session(true);

    session.check("print 1;").unwrap();
    assert_eq!(buffer.contents(), "");

    let errors = session.check("print 1 < \"a\";").unwrap_err();
    assert_eq!(errors[0].phase(), Phase::Compile);
}

#[test]
fn check_runs_even_when_the_session_skips_it() {
    let (mut session, _) = session(false);
    assert_eq!(session.options(), SessionOptions { type_check: false });

    let errors = session.check("print true and 1;").unwrap_err();
    assert_eq!(errors[0].phase(), Phase::Compile);
}

#[test]
fn each_phase_has_its_exit_code() {
    let cases = [
        ("print ;", Phase::Syntax, 65),
        ("return 1;", Phase::Resolve, 65),
        ("var x: number = \"a\";", Phase::Compile, 66),
        ("print clock() + nil;", Phase::Compile, 66),
    ];

    for (source, phase, code) in cases {
        let (_, result) = run(source);
        let error = single_error(result);
        assert_eq!(error.phase(), phase, "{}", source);
        assert_eq!(error.phase().exit_code(), code, "{}", source);
    }

    let (_, result) = common::run_unchecked("print clock() + nil;");
    let error = single_error(result);
    assert_eq!(error.phase(), Phase::Runtime);
    assert_eq!(error.phase().exit_code(), 70);
}

#[test]
fn lexical_and_syntax_errors_are_reported_together() {
    let (output, result) = run("var x = @;\nprint ;");
    let errors = result.unwrap_err();

    assert_eq!(output, "");
    assert!(matches!(errors[0], KaliError::Lex { line: 1, .. }));
    assert!(errors.len() >= 2);
    assert!(errors.iter().all(|e| e.phase() == Phase::Syntax));
}

#[test]
fn resolver_errors_stop_before_type_checking() {
    let (output, result) = run("print 1; { var a = 1; var a = 2; } var x: number = \"a\";");
    let errors = result.unwrap_err();

    assert_eq!(output, "");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].phase(), Phase::Resolve);
}

#[test]
fn unchecked_sessions_expose_dynamic_semantics() {
    let (mut session, buffer) = session(false);

    session
        .run("var v = nil; v = 3; print v; print \"x\" or 1;")
        .unwrap();

    assert_eq!(buffer.contents(), "3\nx\n");
}

#[test]
fn type_errors_halt_before_any_output() {
    let (output, result) = run("print 1;\nprint \"a\" - 1;");

    assert_eq!(output, "");
    let error = single_error(result);
    assert_eq!(error.to_string(), "Operands of '-' must be numbers, got string and number.\n[line 2]");
}
