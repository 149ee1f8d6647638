//! Static scope resolution.
//!
//! Walks a program once before it runs and records, for every local
//! variable reference, how many scopes out its declaration lives. References
//! that are not found in any local scope are left out of the table and are
//! looked up as globals at run time.

use std::collections::HashMap;

use crate::ast::{Expr, FunctionDecl, NodeId, Statement};
use crate::error::{LoxError, Result};
use crate::lexer::Token;

/// Scope distance for each resolved variable reference.
pub type Locals = HashMap<NodeId, usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionKind {
    None,
    Function,
}

pub struct Resolver {
    /// Innermost scope last. `false` means declared but not yet initialized.
    scopes: Vec<HashMap<String, bool>>,
    current_function: FunctionKind,
    locals: Locals,
    errors: Vec<LoxError>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    pub fn new() -> Self {
        Self {
            scopes: Vec::new(),
            current_function: FunctionKind::None,
            locals: HashMap::new(),
            errors: Vec::new(),
        }
    }

    /// Resolve a whole program. All resolution errors are reported together.
    pub fn resolve(mut self, statements: &[Statement]) -> Result<Locals> {
        let span = tracing::debug_span!("resolve", statements = statements.len());
        let _enter = span.enter();

        self.resolve_statements(statements);
        self.finish()
    }

    /// Resolve a standalone expression at top level.
    pub fn resolve_expression(mut self, expr: &Expr) -> Result<Locals> {
        self.resolve_expr(expr);
        self.finish()
    }

    fn finish(self) -> Result<Locals> {
        if self.errors.is_empty() {
            tracing::debug!("resolved {} local references", self.locals.len());
            Ok(self.locals)
        } else {
            Err(LoxError::from_many(self.errors))
        }
    }

    fn resolve_statements(&mut self, statements: &[Statement]) {
        for stmt in statements {
            self.resolve_statement(stmt);
        }
    }

    fn resolve_statement(&mut self, stmt: &Statement) {
        match stmt {
            Statement::BlockScope { body } => {
                self.begin_scope();
                self.resolve_statements(body);
                self.end_scope();
            }
            Statement::VariableDeclaration { name, initializer } => {
                self.declare(name);
                if let Some(init) = initializer {
                    self.resolve_expr(init);
                }
                self.define(name);
            }
            Statement::FunctionDeclaration(decl) => {
                self.declare(&decl.name);
                self.define(&decl.name);
                self.resolve_function(decl, FunctionKind::Function);
            }
            Statement::ExprStatement(expr) | Statement::Print(expr) => self.resolve_expr(expr),
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition);
                self.resolve_statement(then_branch);
                if let Some(else_branch) = else_branch {
                    self.resolve_statement(else_branch);
                }
            }
            Statement::While { condition, body } => {
                self.resolve_expr(condition);
                self.resolve_statement(body);
            }
            Statement::Return { keyword, value } => {
                if self.current_function == FunctionKind::None {
                    self.error(keyword, "Can't return from top-level code.");
                }
                if let Some(value) = value {
                    self.resolve_expr(value);
                }
            }
        }
    }

    fn resolve_expr(&mut self, expr: &Expr) {
        match expr {
            Expr::Variable { id, name } => {
                if self
                    .scopes
                    .last()
                    .and_then(|scope| scope.get(&name.lexeme))
                    == Some(&false)
                {
                    self.error(name, "Can't read local variable in its own initializer.");
                }
                self.resolve_local(*id, name);
            }
            Expr::Assign { id, name, value } => {
                self.resolve_expr(value);
                self.resolve_local(*id, name);
            }
            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left);
                self.resolve_expr(right);
            }
            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee);
                for argument in arguments {
                    self.resolve_expr(argument);
                }
            }
            Expr::Grouping(inner) => self.resolve_expr(inner),
            Expr::Unary { right, .. } => self.resolve_expr(right),
            Expr::Literal(_) => {}
        }
    }

    fn resolve_function(&mut self, decl: &FunctionDecl, kind: FunctionKind) {
        let enclosing_function = self.current_function;
        self.current_function = kind;

        self.begin_scope();
        for param in &decl.params {
            self.declare(param);
            self.define(param);
        }
        self.resolve_statements(&decl.body);
        self.end_scope();

        self.current_function = enclosing_function;
    }

    fn resolve_local(&mut self, id: NodeId, name: &Token) {
        if let Some(index) = self
            .scopes
            .iter()
            .rposition(|scope| scope.contains_key(&name.lexeme))
        {
            let distance = self.scopes.len() - 1 - index;
            tracing::trace!(name = %name.lexeme, distance, "resolved local");
            self.locals.insert(id, distance);
        }
    }

    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) {
        let Some(scope) = self.scopes.last_mut() else {
            return;
        };

        if scope.contains_key(&name.lexeme) {
            self.error(name, "Already a variable with this name in this scope.");
            return;
        }
        scope.insert(name.lexeme.clone(), false);
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    fn error(&mut self, token: &Token, message: &str) {
        self.errors.push(LoxError::resolver(token, message));
    }
}

pub fn resolve(statements: &[Statement]) -> Result<Locals> {
    Resolver::new().resolve(statements)
}
