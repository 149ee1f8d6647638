mod environment;
mod value;

use std::rc::Rc;

pub use environment::Environment;
pub use value::{Function, Value};

use crate::ast::{Expr, Literal, Statement};
use crate::error::{LoxError, Result};
use crate::lexer::{Token, TokenKind};
use crate::native::NativeFunctionRegistry;
use crate::print::PrintHandler;
use crate::resolver::Locals;

/// Deepest chain of nested Lox calls before the run is aborted. Sized so a
/// host thread with a 64 MB stack never overflows first.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 4096;

/// How a statement finished. `Return` travels up to the nearest call.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Normal,
    Return(Value),
}

pub struct Interpreter {
    globals: Environment,
    environment: Environment,
    locals: Locals,
    printer: PrintHandler,
    call_depth: usize,
    max_call_depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_print_handler(PrintHandler::default())
    }

    pub fn with_print_handler(printer: PrintHandler) -> Self {
        let globals = Environment::new();
        for native in NativeFunctionRegistry::with_defaults().iter() {
            globals.define(&native.name, Value::Native(Rc::new(native.clone())));
        }

        Self {
            environment: globals.clone(),
            globals,
            locals: Locals::new(),
            printer,
            call_depth: 0,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }

    pub fn globals(&self) -> &Environment {
        &self.globals
    }

    /// Limits how deeply Lox calls may nest. The host thread's stack must
    /// be large enough for the chosen depth.
    pub fn set_max_call_depth(&mut self, depth: usize) {
        self.max_call_depth = depth;
    }

    /// Adds resolved scope distances. Earlier entries stay valid because node
    /// ids are never reused.
    pub fn resolve(&mut self, locals: Locals) {
        self.locals.extend(locals);
    }

    pub fn interpret(&mut self, statements: &[Statement]) -> Result<()> {
        let span = tracing::debug_span!("interpret", statements = statements.len());
        let _enter = span.enter();

        for stmt in statements {
            if let Completion::Return(_) = self.execute_statement(stmt)? {
                // The resolver rejects top-level returns, so only a caller
                // that skipped resolution can get here.
                return Err(LoxError::RuntimeError {
                    line: 0,
                    message: "Can't return from top-level code.".to_string(),
                });
            }
        }
        Ok(())
    }

    pub fn execute_statement(&mut self, statement: &Statement) -> Result<Completion> {
        match statement {
            Statement::ExprStatement(expr) => {
                self.evaluate_expression(expr)?;
            }
            Statement::Print(expr) => {
                let value = self.evaluate_expression(expr)?;
                self.printer.println(&value.to_string());
            }
            Statement::VariableDeclaration { name, initializer } => {
                let value = match initializer {
                    Some(init) => self.evaluate_expression(init)?,
                    None => Value::Nil,
                };
                self.environment.define(&name.lexeme, value);
            }
            Statement::BlockScope { body } => {
                let scope = Environment::with_enclosing(self.environment.clone());
                return self.execute_block(body, scope);
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate_expression(condition)?.is_truthy() {
                    return self.execute_statement(then_branch);
                } else if let Some(else_branch) = else_branch {
                    return self.execute_statement(else_branch);
                }
            }
            Statement::While { condition, body } => {
                while self.evaluate_expression(condition)?.is_truthy() {
                    if let Completion::Return(value) = self.execute_statement(body)? {
                        return Ok(Completion::Return(value));
                    }
                }
            }
            Statement::FunctionDeclaration(decl) => {
                let function = Function::new(Rc::clone(decl), self.environment.clone());
                self.environment
                    .define(&decl.name.lexeme, Value::Function(Rc::new(function)));
            }
            Statement::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate_expression(expr)?,
                    None => Value::Nil,
                };
                return Ok(Completion::Return(value));
            }
        }
        Ok(Completion::Normal)
    }

    /// Runs `statements` in `scope`, restoring the current environment
    /// afterwards whether or not they succeed.
    pub fn execute_block(
        &mut self,
        statements: &[Statement],
        scope: Environment,
    ) -> Result<Completion> {
        let previous = std::mem::replace(&mut self.environment, scope);

        let mut result = Ok(Completion::Normal);
        for stmt in statements {
            match self.execute_statement(stmt) {
                Ok(Completion::Normal) => continue,
                other => {
                    result = other;
                    break;
                }
            }
        }

        self.environment = previous;
        result
    }

    pub fn evaluate_expression(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                Literal::Nil => Value::Nil,
                Literal::Boolean(b) => Value::Boolean(*b),
                Literal::Number(n) => Value::Number(*n),
                Literal::String(s) => Value::String(s.clone()),
            }),
            Expr::Grouping(inner) => self.evaluate_expression(inner),
            Expr::Unary { operator, right } => {
                let right = self.evaluate_expression(right)?;
                match operator.kind {
                    TokenKind::Bang => Ok(Value::Boolean(!right.is_truthy())),
                    TokenKind::Minus => match right {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        _ => Err(LoxError::runtime(operator, "Operand must be a number.")),
                    },
                    _ => Err(LoxError::runtime(operator, "Unknown unary operator.")),
                }
            }
            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate_expression(left)?;
                let right = self.evaluate_expression(right)?;
                binary_op(operator, left, right)
            }
            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate_expression(left)?;
                let short_circuits = match operator.kind {
                    TokenKind::Or => left.is_truthy(),
                    _ => !left.is_truthy(),
                };
                if short_circuits {
                    Ok(left)
                } else {
                    self.evaluate_expression(right)
                }
            }
            Expr::Variable { id, name } => match self.locals.get(id) {
                Some(&distance) => self.environment.get_at(distance, name),
                None => self.globals.get(name),
            },
            Expr::Assign { id, name, value } => {
                let value = self.evaluate_expression(value)?;
                match self.locals.get(id) {
                    Some(&distance) => {
                        self.environment.assign_at(distance, name, value.clone())?
                    }
                    None => self.globals.assign(name, value.clone())?,
                }
                Ok(value)
            }
            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callee = self.evaluate_expression(callee)?;
                let mut args = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    args.push(self.evaluate_expression(argument)?);
                }
                self.call_value(callee, args, paren)
            }
        }
    }

    fn call_value(
        &mut self,
        callee: Value,
        arguments: Vec<Value>,
        paren: &Token,
    ) -> Result<Value> {
        match callee {
            Value::Function(function) => {
                check_arity(function.arity(), arguments.len(), paren)?;
                self.call_function(&function, arguments, paren)
            }
            Value::Native(native) => {
                check_arity(native.arity, arguments.len(), paren)?;
                tracing::trace!(name = %native.name, "native call");
                native
                    .call(&arguments)
                    .map_err(|message| LoxError::runtime(paren, message))
            }
            _ => Err(LoxError::runtime(paren, "Can only call functions.")),
        }
    }

    fn call_function(
        &mut self,
        function: &Function,
        arguments: Vec<Value>,
        paren: &Token,
    ) -> Result<Value> {
        if self.call_depth >= self.max_call_depth {
            return Err(LoxError::runtime(paren, "Stack overflow."));
        }

        let span = tracing::debug_span!(
            "call",
            name = %function.name(),
            depth = self.call_depth
        );
        let _enter = span.enter();

        let frame = Environment::with_enclosing(function.closure.clone());
        for (param, argument) in function.declaration.params.iter().zip(arguments) {
            frame.define(&param.lexeme, argument);
        }

        self.call_depth += 1;
        let completion = self.execute_block(&function.declaration.body, frame);
        self.call_depth -= 1;

        match completion? {
            Completion::Return(value) => Ok(value),
            Completion::Normal => Ok(Value::Nil),
        }
    }
}

fn check_arity(expected: usize, got: usize, paren: &Token) -> Result<()> {
    if expected == got {
        Ok(())
    } else {
        Err(LoxError::runtime(
            paren,
            format!("Expected {} arguments but got {}.", expected, got),
        ))
    }
}

fn binary_op(operator: &Token, left: Value, right: Value) -> Result<Value> {
    use self::Value::{Boolean, Number};

    match operator.kind {
        TokenKind::EqualEqual => return Ok(Boolean(left == right)),
        TokenKind::BangEqual => return Ok(Boolean(left != right)),
        TokenKind::Plus => {
            return match (left, right) {
                (Number(a), Number(b)) => Ok(Number(a + b)),
                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),
                _ => Err(LoxError::runtime(
                    operator,
                    "Operands must be two numbers or two strings.",
                )),
            };
        }
        _ => {}
    }

    let (Number(a), Number(b)) = (left, right) else {
        return Err(LoxError::runtime(operator, "Operands must be numbers."));
    };

    match operator.kind {
        TokenKind::Minus => Ok(Number(a - b)),
        TokenKind::Star => Ok(Number(a * b)),
        TokenKind::Slash => Ok(Number(a / b)),
        TokenKind::Greater => Ok(Boolean(a > b)),
        TokenKind::GreaterEqual => Ok(Boolean(a >= b)),
        TokenKind::Less => Ok(Boolean(a < b)),
        TokenKind::LessEqual => Ok(Boolean(a <= b)),
        _ => Err(LoxError::runtime(operator, "Unknown binary operator.")),
    }
}
