mod common;

use common::{output_of, run, run_unchecked, single_error, unchecked_output_of};
use kali::error::{KaliError, Phase};

// ─────────────────────────────────────────────────────────────────────────────
// Scoping and resolution
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn shadowing_leaves_the_outer_binding() {
    let output = output_of(
        "var a = \"outer\";
         {
           var a = \"inner\";
           print a;
         }
         print a;",
    );
    assert_eq!(output, "inner\nouter\n");
}

#[test]
fn closures_keep_the_binding_seen_at_definition() {
    let output = output_of(
        "var a = \"global\";
         {
           fun show() { print a; }
           show();
           var a = \"block\";
           show();
         }",
    );
    assert_eq!(output, "global\nglobal\n");
}

#[test]
fn assignment_updates_the_nearest_binding() {
    let output = output_of(
        "var a = 1;
         {
           a = 2;
           var b = 10;
           { b = b + a; print b; }
         }
         print a;",
    );
    assert_eq!(output, "12\n2\n");
}

// ─────────────────────────────────────────────────────────────────────────────
// Functions and closures
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn counters_share_their_captured_frame() {
    let output = unchecked_output_of(
        "fun makeCounter() {
           var i = 0;
           fun count() { i = i + 1; print i; }
           return count;
         }
         var c = makeCounter();
         c();
         c();
         var d = makeCounter();
         d();",
    );
    assert_eq!(output, "1\n2\n1\n");
}

#[test]
fn nested_functions_mutate_enclosing_locals() {
    let output = output_of(
        "fun outer(): number {
           var x = 1;
           fun inner(): number { x = x + 1; return x; }
           inner();
           return inner();
         }
         print outer();",
    );
    assert_eq!(output, "3\n");
}

#[test]
fn recursion_and_early_return() {
    let output = output_of(
        "fun fib(n: number): number {
           if (n < 2) return n;
           return fib(n - 1) + fib(n - 2);
         }
         for (var i = 0; i < 8; ++i) {
           if (i == 7) print fib(i);
         }",
    );
    assert_eq!(output, "13\n");
}

#[test]
fn return_unwinds_out_of_loops() {
    let output = output_of(
        "fun first(limit: number): number {
           var i = 0;
           while (true) {
             if (i >= limit) return i;
             i = i + 1;
           }
           return -1;
         }
         print first(4);",
    );
    assert_eq!(output, "4\n");
}

// ─────────────────────────────────────────────────────────────────────────────
// Classes
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn initializer_seeds_fields() {
    let output = output_of(
        "class Point {
           var x: number = 0;
           var y: number = 0;
           Point(x: number, y: number) { this.x = x; this.y = y; }
           sum(): number { return this.x + this.y; }
         }
         var p = Point(2, 3);
         print p.sum();
         print p.x;
         print Point(1, 1).y;",
    );
    assert_eq!(output, "5\n2\n1\n");
}

#[test]
fn field_initializers_run_superclass_first() {
    let output = output_of(
        "class A { var tag: string = \"a\"; }
         class B < A { var other: string = this.tag + \"b\"; }
         var b = B();
         print b.tag;
         print b.other;",
    );
    assert_eq!(output, "a\nab\n");
}

#[test]
fn overrides_and_super_calls() {
    let output = output_of(
        "class A {
           name(): string { return \"A\"; }
           greet(): string { return \"hi \" + this.name(); }
         }
         class B < A {
           name(): string { return \"B\"; }
           greet(): string { return super.greet() + \"!\"; }
         }
         print A().greet();
         print B().greet();",
    );
    assert_eq!(output, "hi A\nhi B!\n");
}

#[test]
fn super_skips_the_current_class_even_when_inherited() {
    let output = output_of(
        "class A { m(): string { return \"A\"; } }
         class B < A { m(): string { return \"B\" + super.m(); } }
         class C < B {}
         print C().m();",
    );
    assert_eq!(output, "BA\n");
}

#[test]
fn initializer_always_yields_the_instance() {
    let output = output_of(
        "class A {
           var n: number = 1;
           A() { this.n = 2; return; }
         }
         var a = A();
         print a.A();
         print a.n;",
    );
    assert_eq!(output, "A instance\n2\n");
}

#[test]
fn bound_methods_remember_their_instance() {
    let output = output_of(
        "class C {
           var n: number = 1;
           get(): number { return this.n; }
         }
         var c = C();
         var g = c.get;
         c.n = 5;
         print g();",
    );
    assert_eq!(output, "5\n");
}

#[test]
fn instances_are_independent() {
    let output = output_of(
        "class Box { var v: number = 0; }
         var a = Box();
         var b = Box();
         a.v = 1;
         print a.v;
         print b.v;",
    );
    assert_eq!(output, "1\n0\n");
}

#[test]
fn runtime_set_may_add_fields() {
    let output = unchecked_output_of("class A {} var a = A(); a.z = 3; print a.z;");
    assert_eq!(output, "3\n");
}

#[test]
fn undefined_property_is_a_runtime_error() {
    let (_, result) = run_unchecked("class A {} A().x;");
    assert_runtime_error(single_error(result), "Undefined property 'x'.");
}

// ─────────────────────────────────────────────────────────────────────────────
// Operators
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn prefix_and_postfix_increments() {
    let output = output_of(
        "var x = 5;
         print ++x;
         print x++;
         print x;
         print x--;
         print --x;",
    );
    assert_eq!(output, "6\n6\n7\n7\n5\n");
}

#[test]
fn increments_reach_captured_variables() {
    let output = output_of(
        "var n = 0;
         fun bump() { n++; }
         bump();
         bump();
         print n;",
    );
    assert_eq!(output, "2\n");
}

#[test]
fn string_repetition() {
    let output = output_of(
        "print \"ab\" * 3;
         print 2 * \"xy\";
         print \"ab\" * 0;
         print \"ab\" * -1;
         print \"ab\" * 2.7;",
    );
    assert_eq!(output, "ababab\nxyxy\n\n\nabab\n");
}

#[test]
fn oversized_repetition_is_a_runtime_error() {
    let (output, result) = run("var n = 1000000000;\nprint \"ab\" * (n * n * n);\nprint 1;");
    assert_eq!(output, "");
    let error = single_error(result);
    assert_eq!(error.to_string(), "String repetition is too large.\n[line 2]");

    let (_, result) = run("print (1 / 0) * \"ab\";");
    assert_runtime_error(single_error(result), "String repetition is too large.");

    assert_eq!(output_of("print \"\" * (1 / 0);"), "\n");
}

#[test]
fn same_type_comparisons() {
    let output = output_of(
        "print \"abc\" > \"zz\";
         print \"a\" < \"zz\";
         print true > false;
         print false >= false;
         print 1 <= 1;",
    );
    assert_eq!(output, "true\ntrue\ntrue\ntrue\ntrue\n");
}

#[test]
fn mixed_comparison_fails_in_both_layers() {
    let (_, checked) = run("print 1 < \"a\";");
    assert_eq!(single_error(checked).phase(), Phase::Compile);

    let (_, unchecked) = run_unchecked("print 1 < \"a\";");
    assert_runtime_error(single_error(unchecked), "Operands must be the same type.");
}

#[test]
fn logical_operators_diverge_between_layers() {
    let source = "print nil or \"default\"; print 1 and 2; print false and 1;";

    assert_eq!(unchecked_output_of(source), "default\n2\nfalse\n");

    let (output, checked) = run(source);
    assert_eq!(output, "");
    assert_eq!(single_error(checked).phase(), Phase::Compile);
}

#[test]
fn logical_operators_short_circuit() {
    let output = output_of(
        "var hits = 0;
         fun hit(): boolean { hits = hits + 1; return true; }
         print true or hit();
         print false and hit();
         print hits;",
    );
    assert_eq!(output, "true\nfalse\n0\n");
}

#[test]
fn equality_and_truthiness() {
    let output = unchecked_output_of(
        "print nil == nil;
         print nil == false;
         print 1 == 1;
         print \"a\" != \"a\";
         if (0) print \"zero is truthy\";
         if (\"\") print \"empty is truthy\";
         if (nil) print \"unreachable\";",
    );
    assert_eq!(
        output,
        "true\nfalse\ntrue\nfalse\nzero is truthy\nempty is truthy\n"
    );
}

#[test]
fn instances_compare_by_identity() {
    let output = output_of(
        "class A {}
         var a = A();
         var b = A();
         print a == a;
         print a == b;",
    );
    assert_eq!(output, "true\nfalse\n");
}

#[test]
fn division_follows_ieee() {
    assert_eq!(output_of("print 1 / 0; print 7 / 2;"), "inf\n3.5\n");
}

// ─────────────────────────────────────────────────────────────────────────────
// Display and natives
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn display_forms() {
    let output = output_of(
        "fun f() {}
         class C {}
         print 3;
         print 2.5;
         print nil;
         print true;
         print clock;
         print f;
         print C;
         print C();",
    );
    assert_eq!(
        output,
        "3\n2.5\nnil\ntrue\n<native fn>\n<fn f>\nC\nC instance\n"
    );
}

#[test]
fn clock_returns_seconds() {
    assert_eq!(output_of("print clock() > 1000000000;"), "true\n");
}

// ─────────────────────────────────────────────────────────────────────────────
// Runtime errors
// ─────────────────────────────────────────────────────────────────────────────

fn assert_runtime_error(error: KaliError, message: &str) {
    assert_eq!(error.phase(), Phase::Runtime);
    assert_eq!(error.phase().exit_code(), 70);
    assert_eq!(error.message(), message);
}

#[test]
fn output_before_a_runtime_error_stays() {
    let (output, result) = run_unchecked("print 1;\nprint -\"a\";\nprint 2;");

    assert_eq!(output, "1\n");
    let error = single_error(result);
    assert_eq!(error.to_string(), "Operand must be a number.\n[line 2]");
}

#[test]
fn calling_a_non_callable() {
    let (_, result) = run_unchecked("var a = 1; a();");
    assert_runtime_error(single_error(result), "Can only call functions and classes.");
}

#[test]
fn arity_is_checked_at_runtime() {
    let (_, result) = run_unchecked("fun f(a: number) {} f();");
    assert_runtime_error(single_error(result), "Expected 1 arguments but got 0.");
}

#[test]
fn undefined_globals() {
    let (_, result) = run_unchecked("print missing;");
    assert_runtime_error(single_error(result), "Undefined variable 'missing'.");

    let (_, result) = run_unchecked("missing = 1;");
    assert_runtime_error(single_error(result), "Undefined variable 'missing'.");
}

#[test]
fn mismatched_addition() {
    let (_, result) = run_unchecked("print 1 + \"a\";");
    assert_runtime_error(
        single_error(result),
        "Operands must be two numbers or two strings.",
    );
}

#[test]
fn superclass_must_be_a_class_at_runtime() {
    let (_, result) = run_unchecked("var NotAClass = 1; class B < NotAClass {}");
    assert_runtime_error(single_error(result), "Superclass must be a class.");
}
