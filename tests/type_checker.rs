use kali::error::{KaliError, Phase};
use kali::session::parse;
use kali::type_checker::TypeChecker;

fn check(source: &str) -> Result<(), KaliError> {
    let statements = parse(source).expect("source should parse");
    TypeChecker::new().check(&statements)
}

fn assert_checks(source: &str) {
    if let Err(e) = check(source) {
        panic!("expected {:?} to type-check, got: {}", source, e);
    }
}

/// Message of the first type error in `source`.
fn type_error(source: &str) -> String {
    let e = check(source).expect_err("source should not type-check");
    assert_eq!(e.phase(), Phase::Compile);
    e.message()
}

#[test]
fn declared_types_must_match_initializers() {
    assert_checks("var x: number = 1; var s: string = \"a\"; var b: boolean = true;");
    assert!(type_error("var x: number = \"a\";").starts_with("Type mismatch"));
}

#[test]
fn primitive_declarations_need_initializers() {
    assert_eq!(
        type_error("var x: number;"),
        "'x' of type number must be initialized."
    );
}

#[test]
fn unannotated_variables_take_the_initializer_type() {
    assert_checks("var x = 1; x = x + 2;");
    assert!(type_error("var x = 1; x = \"s\";").starts_with("Type mismatch"));
}

#[test]
fn arithmetic_rules() {
    assert_checks("print 1 + 2; print \"a\" + \"b\"; print 4 / 2 - 1;");
    assert_checks("print 3 * \"ab\"; print \"ab\" * 3; print 2 * 3;");
    assert!(type_error("print 1 + \"a\";").contains("two numbers or two strings"));
    assert!(type_error("print \"a\" - \"b\";").contains("must be numbers"));
    assert!(type_error("print \"a\" * \"b\";").starts_with("Operands of '*'"));
    assert!(type_error("print -\"a\";").starts_with("Operand of '-'"));
}

#[test]
fn comparisons_need_operands_of_one_type() {
    assert_checks("print 1 < 2; print \"a\" <= \"bb\"; print true > false;");
    assert!(type_error("print 1 < \"a\";").starts_with("Operands of '<'"));
    assert!(type_error("print nil >= nil;").starts_with("Operands of '>='"));
}

#[test]
fn equality_needs_compatible_types() {
    assert_checks("print 1 == 2; print \"a\" != \"b\";");
    assert_checks("class A {} var a: A = A(); print a == nil; print nil == a;");
    assert_eq!(type_error("print 1 == \"a\";"), "Cannot compare number with string.");
}

#[test]
fn logical_operators_need_booleans() {
    assert_checks("print true and false; print 1 < 2 or false;");
    assert!(type_error("print nil or \"default\";").starts_with("Operands of 'or'"));
    assert!(type_error("print 1 and 2;").starts_with("Operands of 'and'"));
}

#[test]
fn conditions_must_be_boolean() {
    assert_checks("if (1 < 2) print 1; else print 2; while (false) print 3;");
    assert!(type_error("if (1) print 1;").starts_with("Condition of 'if'"));
    assert!(type_error("while (nil) print 1;").starts_with("Condition of 'while'"));
}

#[test]
fn increments_need_numeric_variables() {
    assert_checks("var x = 5; ++x; x--; print x++ + --x;");
    assert_eq!(
        type_error("var s = \"a\"; s++;"),
        "Operand of '++' must be a number, got string."
    );
    assert_eq!(
        type_error("var a = 1; (a)++;"),
        "Operand of '++' must be a variable."
    );
}

#[test]
fn calls_check_arity_and_argument_types() {
    let decl = "fun f(a: number, b: string): string { return b * a; }";

    assert_checks(&format!("{} var r: string = f(2, \"x\");", decl));
    assert_eq!(
        type_error(&format!("{} f(1);", decl)),
        "Expected 2 arguments but got 1."
    );
    assert_eq!(
        type_error(&format!("{} f(\"x\", 2);", decl)),
        "Argument 1 to 'f' must be number, got string."
    );
    assert!(type_error("var x = 1; x();").starts_with("Can only call functions and classes"));
}

#[test]
fn call_result_has_the_declared_return_type() {
    assert!(type_error("fun f(): number { return 1; } var s: string = f();")
        .starts_with("Type mismatch"));
}

#[test]
fn return_types_are_enforced() {
    assert!(type_error("fun f(): number { return \"a\"; }").starts_with("Return type mismatch"));
    assert!(type_error("fun f() { return 1; }").starts_with("Return type mismatch"));
    assert_checks("fun f() { return; }");
}

#[test]
fn non_void_functions_must_return_on_every_path() {
    assert_checks("fun f(n: number): number { if (n < 0) return 0; else return n; }");
    assert_checks("fun f(n: number): number { if (n < 0) return 0; return n; }");
    assert_eq!(
        type_error("fun f(n: number): number { if (n < 0) return 0; }"),
        "'f' must return a number on every path."
    );
    assert!(type_error("fun f(): number { while (true) { return 1; } }")
        .starts_with("'f' must return"));
}

#[test]
fn recursion_sees_its_own_signature() {
    assert_checks(
        "fun fib(n: number): number {
           if (n < 2) return n;
           return fib(n - 1) + fib(n - 2);
         }
         print fib(10);",
    );
}

#[test]
fn globals_must_be_declared_before_use() {
    assert_eq!(type_error("print later; var later = 1;"), "Undefined variable 'later'.");
}

#[test]
fn unknown_annotation() {
    assert_eq!(type_error("var p: Point = nil;"), "Unknown type 'Point'.");
}

#[test]
fn subclass_instances_flow_into_superclass_slots() {
    let classes = "class A {} class B < A {}";

    assert_checks(&format!("{} var a: A = B();", classes));
    assert_checks(&format!("{} fun take(a: A) {{}} take(B());", classes));
    assert!(type_error(&format!("{} var b: B = A();", classes)).starts_with("Type mismatch"));
}

#[test]
fn same_named_classes_are_distinct_types() {
    assert!(type_error("class A {} var a: A = A(); class A {} var b: A = a;")
        .starts_with("Type mismatch"));
}

#[test]
fn class_slots_accept_nil() {
    assert_checks("class A {} var a: A; var b: A = nil; a = b;");
    assert!(type_error("var n: number = nil;").starts_with("Type mismatch"));
}

#[test]
fn fields_are_declared_and_typed() {
    let class = "class P { var x: number = 0; var next: P; }";

    assert_checks(&format!("{} var p = P(); p.x = 2; print p.x + 1; p.next = P();", class));
    assert_eq!(
        type_error(&format!("{} var p = P(); p.y = 1;", class)),
        "Undefined field 'y' on P."
    );
    assert!(type_error(&format!("{} var p = P(); p.x = \"s\";", class))
        .starts_with("Type mismatch"));
    assert_eq!(
        type_error(&format!("{} print P().z;", class)),
        "Undefined property 'z' on P."
    );
}

#[test]
fn property_access_needs_an_instance() {
    assert!(type_error("var n = 1; print n.x;").starts_with("Only instances have properties"));
    assert_eq!(type_error("var n = 1; n.x = 2;"), "Only instances have fields.");
}

#[test]
fn construction_checks_the_initializer() {
    let class = "class P {
                   var x: number = 0;
                   P(x: number) { this.x = x; }
                 }";

    assert_checks(&format!("{} var p: P = P(1);", class));
    assert_eq!(
        type_error(&format!("{} P();", class)),
        "Expected 1 arguments but got 0."
    );
    assert_eq!(
        type_error("class A {} A(1);"),
        "Expected 0 arguments but got 1."
    );
}

#[test]
fn methods_are_found_up_the_chain() {
    assert_checks(
        "class A { name(): string { return \"A\"; } }
         class B < A { shout(): string { return this.name() + \"!\"; } }
         var s: string = B().name();",
    );
}

#[test]
fn super_calls_use_the_superclass_signature() {
    assert_checks(
        "class A { m(): number { return 1; } }
         class B < A { m(): number { return super.m() + 1; } }",
    );
    assert_eq!(
        type_error(
            "class A {}
             class B < A { m() { super.missing(); } }"
        ),
        "Undefined property 'missing' on A."
    );
}

#[test]
fn superclass_must_be_a_class() {
    assert_eq!(
        type_error("var NotAClass = 1; class B < NotAClass {}"),
        "Superclass must be a class, got number."
    );
}

#[test]
fn initializers_cannot_declare_a_return_type() {
    assert_eq!(
        type_error("class A { A(): number { return 1; } }"),
        "An initializer can't declare a return type."
    );
}

#[test]
fn void_results_cannot_be_stored() {
    assert_eq!(
        type_error("fun f() {} var x = f();"),
        "Can't store a void value in 'x'."
    );
}

#[test]
fn globals_persist_between_checks() {
    let mut checker = TypeChecker::new();

    checker
        .check(&parse("var a = 1; class C {}").unwrap())
        .unwrap();
    checker
        .check(&parse("print a + 1; var c: C = C();").unwrap())
        .unwrap();

    let e = checker
        .check(&parse("a = \"s\";").unwrap())
        .unwrap_err();
    assert!(e.message().starts_with("Type mismatch"));
}

#[test]
fn clock_is_a_number() {
    assert_checks("var t: number = clock();");
}

#[test]
fn overrides_keep_the_inherited_signature() {
    assert_eq!(
        type_error(
            "class A { m(): number { return 1; } }
             class B < A { m(): string { return \"s\"; } }
             var a: A = B();
             print a.m() + 1;"
        ),
        "Method 'm' overrides A.m with an incompatible signature: \
         expected fun(): number, got fun(): string."
    );
    assert!(type_error(
        "class A { m(n: number) {} }
         class C < A {}
         class B < C { m(s: string) {} }"
    )
    .starts_with("Method 'm' overrides C.m"));
}

#[test]
fn overrides_may_narrow_the_return_type() {
    assert_checks(
        "class A { me(): A { return this; } }
         class B < A { me(): B { return this; } }
         var a: A = B().me();",
    );
}

#[test]
fn redeclared_fields_keep_the_inherited_type() {
    assert_eq!(
        type_error(
            "class A { var x: number = 1; }
             class B < A { var x: string = \"s\"; }
             var a: A = B();
             print a.x + 1;"
        ),
        "Field 'x' must keep its inherited type number, got string."
    );
    assert_checks("class A { var x: number = 1; } class B < A { var x: number = 2; }");
}

#[test]
fn fields_and_methods_cannot_share_a_name() {
    assert_eq!(
        type_error("class A { m(): number { return 1; } } class B < A { var m: number = 2; }"),
        "Field 'm' conflicts with a method of the same name."
    );
    assert_eq!(
        type_error("class A { var m: number = 1; } class B < A { m(): number { return 2; } }"),
        "Method 'm' conflicts with inherited field of type number."
    );
    assert!(type_error("class A { var m: number = 1; m() {} }").starts_with("Field 'm' conflicts"));
}
