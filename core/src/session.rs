//! Drives source text through every stage against one long-lived
//! interpreter, so consecutive runs share globals.

use crate::ast::Statement;
use crate::error::Result;
use crate::interpreter::{Interpreter, Value};
use crate::lexer::scan;
use crate::parser::Parser;
use crate::print::PrintHandler;
use crate::resolver::Resolver;

#[derive(Default)]
pub struct Session {
    interpreter: Interpreter,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_print_handler(handler: PrintHandler) -> Self {
        Self {
            interpreter: Interpreter::with_print_handler(handler),
        }
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn interpreter_mut(&mut self) -> &mut Interpreter {
        &mut self.interpreter
    }

    /// Scan and parse without running anything.
    pub fn parse(source: &str) -> Result<Vec<Statement>> {
        Parser::new(scan(source)?).parse()
    }

    /// Run a complete program. Nothing executes if scanning, parsing or
    /// resolution fails.
    pub fn run(&mut self, source: &str) -> Result<()> {
        let statements = Self::parse(source)?;
        self.execute(&statements)
    }

    /// Run one line of interactive input. A line that is not a valid
    /// program but is a single expression is evaluated and its value
    /// returned so the caller can echo it.
    pub fn run_line(&mut self, source: &str) -> Result<Option<Value>> {
        let tokens = scan(source)?;

        let program_error = match Parser::new(tokens.clone()).parse() {
            Ok(statements) => return self.execute(&statements).map(|()| None),
            Err(e) => e,
        };

        let Ok(expr) = Parser::new(tokens).parse_expression() else {
            return Err(program_error);
        };
        tracing::debug!("evaluating line as a bare expression");
        let locals = Resolver::new().resolve_expression(&expr)?;
        self.interpreter.resolve(locals);
        self.interpreter.evaluate_expression(&expr).map(Some)
    }

    fn execute(&mut self, statements: &[Statement]) -> Result<()> {
        let locals = Resolver::new().resolve(statements)?;
        self.interpreter.resolve(locals);
        self.interpreter.interpret(statements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoxError;

    fn session() -> (Session, PrintHandler) {
        let handler = PrintHandler::buffer();
        (Session::with_print_handler(handler.clone()), handler)
    }

    #[test]
    fn globals_persist_between_runs() {
        let (mut session, out) = session();
        session.run("var a = 1;").unwrap();
        session.run("fun bump() { a = a + 1; }").unwrap();
        session.run("bump(); print a;").unwrap();
        assert_eq!(out.output(), "2\n");
    }

    #[test]
    fn closures_survive_across_runs() {
        let (mut session, out) = session();
        session
            .run("fun make() { var n = 0; fun next() { n = n + 1; return n; } return next; }")
            .unwrap();
        session.run("var next = make();").unwrap();
        session.run("next();").unwrap();
        session.run("print next();").unwrap();
        assert_eq!(out.output(), "2\n");
    }

    #[test]
    fn static_errors_prevent_execution() {
        let (mut session, out) = session();
        let err = session.run("print \"before\"; { var a = a; }").unwrap_err();
        assert!(!err.is_runtime());
        assert_eq!(out.output(), "");
    }

    #[test]
    fn lexer_errors_surface_first() {
        let (mut session, _) = session();
        let err = session.run("print @;").unwrap_err();
        assert!(matches!(err, LoxError::LexerError { .. }));
    }

    #[test]
    fn runtime_error_keeps_earlier_output() {
        let (mut session, out) = session();
        let err = session.run("print 1; print -nil; print 2;").unwrap_err();
        assert!(err.is_runtime());
        assert_eq!(out.output(), "1\n");
    }

    #[test]
    fn line_evaluates_bare_expression() {
        let (mut session, out) = session();
        session.run_line("var x = 20;").unwrap();
        assert_eq!(session.run_line("x + 1").unwrap(), Some(Value::Number(21.0)));
        assert_eq!(session.run_line("print x;").unwrap(), None);
        assert_eq!(out.output(), "20\n");
    }

    #[test]
    fn line_assignment_expression_updates_global() {
        let (mut session, _) = session();
        session.run_line("var x = 1;").unwrap();
        assert_eq!(session.run_line("x = 5").unwrap(), Some(Value::Number(5.0)));
        assert_eq!(session.run_line("x").unwrap(), Some(Value::Number(5.0)));
    }

    #[test]
    fn line_reports_statement_error_when_not_an_expression() {
        let (mut session, _) = session();
        let err = session.run_line("print 1").unwrap_err();
        assert_eq!(err.to_string(), "[line 1] Error at end: Expect ';' after value.");
    }

    #[test]
    fn parse_only_does_not_execute() {
        let statements = Session::parse("print 1; print 2;").unwrap();
        assert_eq!(statements.len(), 2);
    }
}
