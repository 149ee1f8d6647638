use std::rc::Rc;

use crate::ast::{Expr, FunctionDecl, Literal, Statement};
use crate::error::{LoxError, Result};
use crate::lexer::{Token, TokenKind};

/// Upper bound on arguments in a call and parameters in a declaration.
pub const MAX_ARGUMENTS: usize = 255;

const MAX_NESTING: usize = 100;

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    recursive_depth: usize,
    /// Errors that do not stop the parse, such as an invalid assignment
    /// target. Any entry here still fails the parse as a whole.
    errors: Vec<LoxError>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        let mut tokens = tokens;
        if tokens.last().map(|t| t.kind) != Some(TokenKind::Eof) {
            let line = tokens.last().map_or(1, |t| t.line);
            tokens.push(Token::eof(line));
        }

        Self {
            tokens,
            current: 0,
            recursive_depth: 0,
            errors: Vec::new(),
        }
    }

    /// program → declaration* EOF
    pub fn parse(&mut self) -> Result<Vec<Statement>> {
        let span = tracing::debug_span!("parse", tokens = self.tokens.len());
        let _enter = span.enter();

        let mut statements = Vec::new();
        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    break;
                }
            }
        }

        self.finish(statements)
    }

    /// Parse the whole token stream as one expression, with no trailing `;`.
    pub fn parse_expression(&mut self) -> Result<Expr> {
        let result = self.expression().and_then(|expr| {
            if self.is_at_end() {
                Ok(expr)
            } else {
                Err(self.error(self.peek(), "Expect end of expression."))
            }
        });

        match result {
            Ok(expr) => self.finish(expr),
            Err(e) => {
                self.errors.push(e);
                Err(LoxError::from_many(std::mem::take(&mut self.errors)))
            }
        }
    }

    fn finish<T>(&mut self, parsed: T) -> Result<T> {
        if self.errors.is_empty() {
            tracing::debug!("parse completed");
            Ok(parsed)
        } else {
            Err(LoxError::from_many(std::mem::take(&mut self.errors)))
        }
    }

    fn declaration(&mut self) -> Result<Statement> {
        if self.match_token(&[TokenKind::Fun]) {
            self.nested("Statement nesting too deep.", |parser| {
                parser.function_declaration("function")
            })
        } else if self.match_token(&[TokenKind::Var]) {
            self.variable_declaration()
        } else {
            self.statement()
        }
    }

    fn function_declaration(&mut self, kind: &str) -> Result<Statement> {
        let name = self.consume(TokenKind::Identifier, &format!("Expect {} name.", kind))?;
        self.consume(
            TokenKind::LeftParen,
            &format!("Expect '(' after {} name.", kind),
        )?;

        let mut params = Vec::new();
        if !self.check(TokenKind::RightParen) {
            loop {
                if params.len() >= MAX_ARGUMENTS {
                    let err = self.error(
                        self.peek(),
                        &format!("Can't have more than {} parameters.", MAX_ARGUMENTS),
                    );
                    self.errors.push(err);
                }
                params.push(self.consume(TokenKind::Identifier, "Expect parameter name.")?);

                if !self.match_token(&[TokenKind::Comma]) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "Expect ')' after parameters.")?;

        self.consume(
            TokenKind::LeftBrace,
            &format!("Expect '{{' before {} body.", kind),
        )?;
        let body = self.block()?;

        Ok(Statement::FunctionDeclaration(Rc::new(FunctionDecl {
            name,
            params,
            body,
        })))
    }

    fn variable_declaration(&mut self) -> Result<Statement> {
        let name = self.consume(TokenKind::Identifier, "Expect variable name.")?;

        let initializer = if self.match_token(&[TokenKind::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenKind::Semicolon,
            "Expect ';' after variable declaration.",
        )?;
        Ok(Statement::VariableDeclaration { name, initializer })
    }

    fn statement(&mut self) -> Result<Statement> {
        self.nested("Statement nesting too deep.", Self::statement_kind)
    }

    fn statement_kind(&mut self) -> Result<Statement> {
        if self.match_token(&[TokenKind::For]) {
            self.for_statement()
        } else if self.match_token(&[TokenKind::If]) {
            self.if_statement()
        } else if self.match_token(&[TokenKind::Print]) {
            self.print_statement()
        } else if self.match_token(&[TokenKind::Return]) {
            self.return_statement()
        } else if self.match_token(&[TokenKind::While]) {
            self.while_statement()
        } else if self.match_token(&[TokenKind::LeftBrace]) {
            Ok(Statement::BlockScope {
                body: self.block()?,
            })
        } else {
            self.expression_statement()
        }
    }

    /// Desugars `for (init; cond; incr) body` into
    /// `{ init; while (cond) { body; incr; } }`.
    fn for_statement(&mut self) -> Result<Statement> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.match_token(&[TokenKind::Semicolon]) {
            None
        } else if self.match_token(&[TokenKind::Var]) {
            Some(self.variable_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if self.check(TokenKind::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenKind::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(increment) = increment {
            body = Statement::BlockScope {
                body: vec![body, Statement::ExprStatement(increment)],
            };
        }

        let condition = condition.unwrap_or(Expr::Literal(Literal::Boolean(true)));
        body = Statement::While {
            condition,
            body: Box::new(body),
        };

        if let Some(initializer) = initializer {
            body = Statement::BlockScope {
                body: vec![initializer, body],
            };
        }

        Ok(body)
    }

    fn if_statement(&mut self) -> Result<Statement> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after if condition.")?;

        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.match_token(&[TokenKind::Else]) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Statement::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn print_statement(&mut self) -> Result<Statement> {
        let value = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after value.")?;
        Ok(Statement::Print(value))
    }

    fn return_statement(&mut self) -> Result<Statement> {
        let keyword = self.previous();
        let value = if self.check(TokenKind::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };

        self.consume(TokenKind::Semicolon, "Expect ';' after return value.")?;
        Ok(Statement::Return { keyword, value })
    }

    fn while_statement(&mut self) -> Result<Statement> {
        self.consume(TokenKind::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(TokenKind::RightParen, "Expect ')' after condition.")?;
        let body = Box::new(self.statement()?);

        Ok(Statement::While { condition, body })
    }

    fn block(&mut self) -> Result<Vec<Statement>> {
        let mut statements = Vec::new();

        while !self.check(TokenKind::RightBrace) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }

        self.consume(TokenKind::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }

    fn expression_statement(&mut self) -> Result<Statement> {
        let expr = self.expression()?;
        self.consume(TokenKind::Semicolon, "Expect ';' after expression.")?;
        Ok(Statement::ExprStatement(expr))
    }

    fn expression(&mut self) -> Result<Expr> {
        self.nested("Expression nesting too deep.", Self::assignment)
    }

    /// Runs `parse` one level deeper, failing once `MAX_NESTING` levels of
    /// statements and expressions are open.
    fn nested<T>(
        &mut self,
        message: &str,
        parse: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        if self.recursive_depth >= MAX_NESTING {
            return Err(self.error(self.peek(), message));
        }

        self.recursive_depth += 1;
        let result = parse(self);
        self.recursive_depth -= 1;
        result
    }

    /// assignment → IDENTIFIER "=" assignment | logic_or
    fn assignment(&mut self) -> Result<Expr> {
        let expr = self.or()?;

        if self.match_token(&[TokenKind::Equal]) {
            let equals = self.previous();
            let value = self.nested("Expression nesting too deep.", Self::assignment)?;

            return match expr {
                Expr::Variable { name, .. } => Ok(Expr::assign(name, value)),
                other => {
                    let err = self.error(&equals, "Invalid assignment target.");
                    self.errors.push(err);
                    Ok(other)
                }
            };
        }

        Ok(expr)
    }

    fn or(&mut self) -> Result<Expr> {
        let mut expr = self.and()?;

        while self.match_token(&[TokenKind::Or]) {
            let operator = self.previous();
            let right = self.and()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn and(&mut self) -> Result<Expr> {
        let mut expr = self.equality()?;

        while self.match_token(&[TokenKind::And]) {
            let operator = self.previous();
            let right = self.equality()?;
            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr> {
        self.binary(
            &[TokenKind::BangEqual, TokenKind::EqualEqual],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> Result<Expr> {
        self.binary(
            &[
                TokenKind::Greater,
                TokenKind::GreaterEqual,
                TokenKind::Less,
                TokenKind::LessEqual,
            ],
            Self::term,
        )
    }

    fn term(&mut self) -> Result<Expr> {
        self.binary(&[TokenKind::Minus, TokenKind::Plus], Self::factor)
    }

    fn factor(&mut self) -> Result<Expr> {
        self.binary(&[TokenKind::Slash, TokenKind::Star], Self::unary)
    }

    /// One left-associative precedence level: an operand from the next level
    /// up, then any run of `operators` folded to the left.
    fn binary(
        &mut self,
        operators: &[TokenKind],
        operand: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let mut expr = operand(self)?;

        while self.match_token(operators) {
            let operator = self.previous();
            let right = operand(self)?;
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.match_token(&[TokenKind::Bang, TokenKind::Minus]) {
            let operator = self.previous();
            let right = self.nested("Expression nesting too deep.", Self::unary)?;
            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }

        self.call()
    }

    fn call(&mut self) -> Result<Expr> {
        let mut expr = self.primary()?;

        while self.match_token(&[TokenKind::LeftParen]) {
            expr = self.finish_call(expr)?;
        }

        Ok(expr)
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr> {
        let mut arguments = Vec::new();

        if !self.check(TokenKind::RightParen) {
            loop {
                if arguments.len() >= MAX_ARGUMENTS {
                    let err = self.error(
                        self.peek(),
                        &format!("Can't have more than {} arguments.", MAX_ARGUMENTS),
                    );
                    self.errors.push(err);
                }
                arguments.push(self.expression()?);

                if !self.match_token(&[TokenKind::Comma]) {
                    break;
                }
            }
        }

        let paren = self.consume(TokenKind::RightParen, "Expect ')' after arguments.")?;

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> Result<Expr> {
        if self.match_token(&[TokenKind::False]) {
            return Ok(Expr::Literal(Literal::Boolean(false)));
        }
        if self.match_token(&[TokenKind::True]) {
            return Ok(Expr::Literal(Literal::Boolean(true)));
        }
        if self.match_token(&[TokenKind::Nil]) {
            return Ok(Expr::Literal(Literal::Nil));
        }

        if self.match_token(&[TokenKind::Number, TokenKind::String]) {
            let token = self.previous();
            return match token.literal {
                Some(literal) => Ok(Expr::Literal(literal)),
                None => Err(self.error(&token, "Literal token without a value.")),
            };
        }

        if self.match_token(&[TokenKind::Identifier]) {
            return Ok(Expr::variable(self.previous()));
        }

        if self.match_token(&[TokenKind::LeftParen]) {
            let expr = self.expression()?;
            self.consume(TokenKind::RightParen, "Expect ')' after expression.")?;
            return Ok(Expr::Grouping(Box::new(expr)));
        }

        Err(self.error(self.peek(), "Expect expression."))
    }

    // Helper methods
    fn match_token(&mut self, kinds: &[TokenKind]) -> bool {
        for kind in kinds {
            if self.check(*kind) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn check(&self, kind: TokenKind) -> bool {
        if self.is_at_end() {
            false
        } else {
            self.peek().kind == kind
        }
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> Token {
        self.tokens[self.current.saturating_sub(1)].clone()
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> Result<Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(self.peek(), message))
        }
    }

    fn error(&self, token: &Token, message: &str) -> LoxError {
        LoxError::parser(token, message)
    }
}

pub fn parse(tokens: Vec<Token>) -> Result<Vec<Statement>> {
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::scan;
    use crate::printer::AstPrinter;
    use pretty_assertions::assert_eq;

    fn parse_source(source: &str) -> Result<Vec<Statement>> {
        parse(scan(source).unwrap())
    }

    fn print_program(source: &str) -> String {
        AstPrinter::print_program(&parse_source(source).unwrap())
    }

    fn print_expression(source: &str) -> String {
        let expr = Parser::new(scan(source).unwrap())
            .parse_expression()
            .unwrap();
        AstPrinter::print(&expr)
    }

    #[test]
    fn precedence_levels() {
        assert_eq!(print_expression("1 + 2 * 3"), "(+ 1 (* 2 3))");
        assert_eq!(print_expression("-a * b"), "(* (- a) b)");
        assert_eq!(print_expression("1 < 2 == true"), "(== (< 1 2) true)");
        assert_eq!(print_expression("a or b and c"), "(or a (and b c))");
        assert_eq!(print_expression("!!x"), "(! (! x))");
    }

    #[test]
    fn binary_levels_are_left_associative() {
        assert_eq!(print_expression("1 - 2 - 3"), "(- (- 1 2) 3)");
        assert_eq!(print_expression("8 / 4 / 2"), "(/ (/ 8 4) 2)");
    }

    #[test]
    fn assignment_is_right_associative() {
        assert_eq!(print_expression("a = b = 1"), "(= a (= b 1))");
    }

    #[test]
    fn grouping_overrides_precedence() {
        assert_eq!(print_expression("(1 + 2) * 3"), "(* (group (+ 1 2)) 3)");
    }

    #[test]
    fn call_chaining() {
        assert_eq!(print_expression("f(1)(2, x)()"), "(call (call (call f 1) 2 x))");
    }

    #[test]
    fn for_loop_desugars_into_while() {
        assert_eq!(
            print_program("for (var i = 0; i < 3; i = i + 1) print i;"),
            "(block (var i 0) (while (< i 3) (block (print i) (; (= i (+ i 1))))))"
        );
    }

    #[test]
    fn for_loop_without_clauses_loops_forever() {
        assert_eq!(print_program("for (;;) print 1;"), "(while true (print 1))");
    }

    #[test]
    fn statements() {
        assert_eq!(
            print_program("var a; if (a) print 1; else { print 2; } while (false) a = 3;"),
            "(var a)\n(if a (print 1) (block (print 2)))\n(while false (; (= a 3)))"
        );
    }

    #[test]
    fn function_declaration() {
        assert_eq!(
            print_program("fun add(a, b) { return a + b; }"),
            "(fun add (a b) (return (+ a b)))"
        );
    }

    #[test]
    fn invalid_assignment_target_reported_at_equals() {
        let err = parse_source("1 + 2 = 3;").unwrap_err();
        assert_eq!(
            err.to_string(),
            "[line 1] Error at '=': Invalid assignment target."
        );
    }

    #[test]
    fn missing_paren_after_condition() {
        let err = parse_source("if (true print 1;").unwrap_err();
        assert_eq!(
            err.to_string(),
            "[line 1] Error at 'print': Expect ')' after if condition."
        );
    }

    #[test]
    fn missing_semicolon_at_end() {
        let err = parse_source("print 1").unwrap_err();
        assert_eq!(err.to_string(), "[line 1] Error at end: Expect ';' after value.");
    }

    #[test]
    fn reserved_words_are_not_expressions() {
        let err = parse_source("print this;").unwrap_err();
        assert_eq!(err.to_string(), "[line 1] Error at 'this': Expect expression.");
    }

    #[test]
    fn too_many_arguments_does_not_abort_parse() {
        let args = vec!["1"; 256].join(", ");
        let err = parse_source(&format!("f({}); print 2;", args)).unwrap_err();
        assert_eq!(err.message(), "Can't have more than 255 arguments.");
        assert!(matches!(err, LoxError::ParserError { .. }));
    }

    #[test]
    fn max_arguments_is_accepted() {
        let args = vec!["1"; 255].join(", ");
        assert!(parse_source(&format!("f({});", args)).is_ok());
    }

    #[test]
    fn too_many_parameters_does_not_abort_parse() {
        let params: Vec<String> = (0..256).map(|i| format!("p{}", i)).collect();
        let source = format!("fun f({}) {{}} print 2;", params.join(", "));
        let err = parse_source(&source).unwrap_err();
        assert_eq!(err.message(), "Can't have more than 255 parameters.");
        assert!(matches!(err, LoxError::ParserError { .. }));
    }

    #[test]
    fn max_parameters_is_accepted() {
        let params: Vec<String> = (0..255).map(|i| format!("p{}", i)).collect();
        let program = parse_source(&format!("fun f({}) {{}}", params.join(", "))).unwrap();
        match &program[0] {
            Statement::FunctionDeclaration(decl) => assert_eq!(decl.params.len(), 255),
            other => panic!("expected a function, got {:?}", other),
        }
    }

    #[test]
    fn long_right_recursive_chains_are_rejected() {
        let source = format!("print {}1;", "-".repeat(10_000));
        let err = parse_source(&source).unwrap_err();
        assert_eq!(err.message(), "Expression nesting too deep.");

        let source = format!("{}1;", "a = ".repeat(10_000));
        let err = parse_source(&source).unwrap_err();
        assert_eq!(err.message(), "Expression nesting too deep.");
    }

    #[test]
    fn deeply_nested_blocks_are_rejected() {
        let source = format!("{}{}", "{".repeat(10_000), "}".repeat(10_000));
        let err = parse_source(&source).unwrap_err();
        assert_eq!(err.message(), "Statement nesting too deep.");

        let source = format!("{}print 1;", "if (true) ".repeat(10_000));
        let err = parse_source(&source).unwrap_err();
        assert_eq!(err.message(), "Statement nesting too deep.");

        let source = format!("{}{}", "fun f() { ".repeat(10_000), "}".repeat(10_000));
        let err = parse_source(&source).unwrap_err();
        assert_eq!(err.message(), "Statement nesting too deep.");
    }

    #[test]
    fn moderate_nesting_is_accepted() {
        let source = format!("{}print -!-1;{}", "{ ".repeat(40), "} ".repeat(40));
        assert!(parse_source(&source).is_ok());
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let source = format!("print {}1{};", "(".repeat(150), ")".repeat(150));
        let err = parse_source(&source).unwrap_err();
        assert_eq!(err.message(), "Expression nesting too deep.");
    }

    #[test]
    fn expression_mode_rejects_trailing_tokens() {
        let err = Parser::new(scan("1 2").unwrap()).parse_expression().unwrap_err();
        assert_eq!(err.message(), "Expect end of expression.");
    }

    #[test]
    fn parse_is_deterministic() {
        let source = "fun f(x) { return x * 2; } var y = f(3) + 1; print y;";
        assert_eq!(print_program(source), print_program(source));
    }
}
