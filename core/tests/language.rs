use lox_core::{LoxError, PrintHandler, Session};
use pretty_assertions::assert_eq;

fn run(source: &str) -> (Result<(), LoxError>, String) {
    let handler = PrintHandler::buffer();
    let mut session = Session::with_print_handler(handler.clone());
    let result = session.run(source);
    (result, handler.output())
}

fn output(source: &str) -> String {
    let (result, out) = run(source);
    if let Err(e) = result {
        panic!("program failed: {e}\noutput so far:\n{out}");
    }
    out
}

fn error(source: &str) -> LoxError {
    match run(source).0 {
        Ok(()) => panic!("expected an error from {source:?}"),
        Err(e) => e,
    }
}

#[test]
fn block_shadowing() {
    assert_eq!(
        output("var a = 1; { var a = 2; print a; } print a;"),
        "2\n1\n"
    );
}

#[test]
fn function_call_returns_value() {
    assert_eq!(output("fun add(a,b){ return a+b; } print add(2,3);"), "5\n");
}

#[test]
fn counter_closure() {
    let source = "
        fun counter() {
            var i = 0;
            fun inc() { i = i + 1; return i; }
            return inc;
        }
        var c = counter();
        print c();
        print c();
    ";
    assert_eq!(output(source), "1\n2\n");
}

#[test]
fn string_concatenation() {
    assert_eq!(output("print \"a\" + \"b\";"), "ab\n");
}

#[test]
fn adding_number_and_string_is_a_runtime_error() {
    let err = error("print 1 + \"b\";");
    assert!(err.is_runtime());
    assert_eq!(
        err.to_string(),
        "Operands must be two numbers or two strings.\n[line 1]"
    );
}

#[test]
fn separate_outer_calls_have_independent_counters() {
    let source = "
        fun counter() {
            var i = 0;
            fun inc() { i = i + 1; return i; }
            return inc;
        }
        var a = counter();
        var b = counter();
        print a();
        print a();
        print b();
    ";
    assert_eq!(output(source), "1\n2\n1\n");
}

#[test]
fn closures_from_one_call_share_state() {
    let source = "
        var inc;
        var get;
        fun pair() {
            var n = 0;
            fun i() { n = n + 1; }
            fun g() { return n; }
            inc = i;
            get = g;
        }
        pair();
        inc();
        inc();
        print get();
    ";
    assert_eq!(output(source), "2\n");
}

#[test]
fn closure_binding_is_fixed_at_resolution() {
    let source = "
        var a = \"global\";
        {
            fun show() { print a; }
            show();
            var a = \"block\";
            show();
        }
    ";
    assert_eq!(output(source), "global\nglobal\n");
}

#[test]
fn and_or_short_circuit() {
    let source = "
        var calls = 0;
        fun sideEffect() { calls = calls + 1; return true; }
        print false and sideEffect();
        print true or sideEffect();
        print calls;
        print true and sideEffect();
        print calls;
    ";
    assert_eq!(output(source), "false\ntrue\n0\ntrue\n1\n");
}

#[test]
fn arity_mismatch_is_reported() {
    let too_few = error("fun one(a) { return a; }\none();");
    assert_eq!(too_few.to_string(), "Expected 1 arguments but got 0.\n[line 2]");

    let too_many = error("fun one(a) { return a; } one(1, 2);");
    assert_eq!(too_many.message(), "Expected 1 arguments but got 2.");
}

#[test]
fn for_loop_scopes_its_variable() {
    let source = "
        for (var i = 0; i < 3; i = i + 1) print i;
        print i;
    ";
    let (result, out) = run(source);
    assert_eq!(out, "0\n1\n2\n");
    assert_eq!(result.unwrap_err().message(), "Undefined variable 'i'.");
}

#[test]
fn for_loop_closures_share_one_binding() {
    let source = "
        var f;
        for (var i = 0; i < 2; i = i + 1) {
            fun show() { print i; }
            if (i == 0) f = show;
        }
        f();
    ";
    assert_eq!(output(source), "2\n");
}

#[test]
fn recursive_functions() {
    let source = "
        fun fact(n) { if (n <= 1) return 1; return n * fact(n - 1); }
        print fact(10);
    ";
    assert_eq!(output(source), "3628800\n");
}

#[test]
fn nested_functions_see_parameters_of_outer() {
    let source = "
        fun outer(x) {
            fun inner(y) { return x + y; }
            return inner;
        }
        print outer(10)(5);
    ";
    assert_eq!(output(source), "15\n");
}

#[test]
fn statements_after_return_do_not_run() {
    let source = "
        fun f() { print \"before\"; return 1; print \"after\"; }
        print f();
    ";
    assert_eq!(output(source), "before\n1\n");
}

#[test]
fn block_comments_and_multiline_strings() {
    let source = "/* a\nb */ print \"one\ntwo\";\nprint nope;";
    let (result, out) = run(source);
    assert_eq!(out, "one\ntwo\n");
    assert_eq!(result.unwrap_err().line(), Some(4));
}

#[test]
fn static_errors_are_reported_together() {
    let err = error("{ var a = 1; var a = 2; }\nreturn 3;");
    match err {
        LoxError::Compile(errors) => {
            let rendered: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            assert_eq!(
                rendered,
                vec![
                    "[line 1] Error at 'a': Already a variable with this name in this scope.",
                    "[line 2] Error at 'return': Can't return from top-level code.",
                ]
            );
        }
        other => panic!("expected aggregated errors, got {other:?}"),
    }
}

#[test]
fn parse_error_names_the_expected_token() {
    let err = error("if (true print 1;");
    assert_eq!(
        err.to_string(),
        "[line 1] Error at 'print': Expect ')' after if condition."
    );
}

#[test]
fn unicode_names_are_variables() {
    assert_eq!(output("var café = 1; print café; var ñ2 = café + 1; print ñ2;"), "1\n2\n");
}

#[test]
fn reserved_words_cannot_be_used() {
    let err = error("var this = 1;");
    assert_eq!(err.message(), "Expect variable name.");
}

/// Runs `f` on a thread with room for the default call depth.
fn with_big_stack<T: Send + 'static>(f: impl FnOnce() -> T + Send + 'static) -> T {
    std::thread::Builder::new()
        .stack_size(256 * 1024 * 1024)
        .spawn(f)
        .unwrap()
        .join()
        .unwrap()
}

#[test]
fn deep_but_finite_recursion_succeeds() {
    let source = "
        fun count(n) { if (n == 0) return 0; return 1 + count(n - 1); }
        print count(1000);
        print count(3000);
    ";
    assert_eq!(with_big_stack(move || output(source)), "1000\n3000\n");
}

#[test]
fn runaway_recursion_is_a_runtime_error() {
    let err = with_big_stack(|| error("fun loop(n) { return loop(n + 1); } loop(0);"));
    assert!(err.is_runtime());
    assert_eq!(err.message(), "Stack overflow.");
}

#[test]
fn clock_is_a_global_native() {
    assert_eq!(
        output("var t = clock(); print t > 0; print clock() >= t;"),
        "true\ntrue\n"
    );
}

#[test]
fn values_print_in_canonical_form() {
    assert_eq!(
        output("print 1.0; print 0.1 + 0.2; print nil; print true; fun f() {} print f;"),
        "1\n0.30000000000000004\nnil\ntrue\n<fn f>\n"
    );
}
