//! Renders syntax trees as text, for debugging and for round-trip checks.
//!
//! Two forms are produced:
//! - a fully parenthesised prefix form, e.g. `(+ 1 (* 2 3))`
//! - source syntax, which the parser reads back into the same tree shape

use crate::ast::{Expr, Literal, Statement};

pub struct AstPrinter;

impl AstPrinter {
    /// Prefix form of an expression.
    pub fn print(expr: &Expr) -> String {
        match expr {
            Expr::Literal(literal) => Self::literal(literal),
            Expr::Grouping(inner) => Self::parenthesize("group", &[inner.as_ref()]),
            Expr::Unary { operator, right } => {
                Self::parenthesize(&operator.lexeme, &[right.as_ref()])
            }
            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => Self::parenthesize(&operator.lexeme, &[left.as_ref(), right.as_ref()]),
            Expr::Variable { name, .. } => name.lexeme.clone(),
            Expr::Assign { name, value, .. } => {
                format!("(= {} {})", name.lexeme, Self::print(value))
            }
            Expr::Call {
                callee, arguments, ..
            } => {
                let mut parts = vec![Self::print(callee)];
                parts.extend(arguments.iter().map(Self::print));
                format!("(call {})", parts.join(" "))
            }
        }
    }

    /// Prefix form of a statement.
    pub fn print_statement(stmt: &Statement) -> String {
        match stmt {
            Statement::ExprStatement(expr) => format!("(; {})", Self::print(expr)),
            Statement::Print(expr) => format!("(print {})", Self::print(expr)),
            Statement::VariableDeclaration { name, initializer } => match initializer {
                Some(init) => format!("(var {} {})", name.lexeme, Self::print(init)),
                None => format!("(var {})", name.lexeme),
            },
            Statement::BlockScope { body } => Self::group("block", body),
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => match else_branch {
                Some(else_branch) => format!(
                    "(if {} {} {})",
                    Self::print(condition),
                    Self::print_statement(then_branch),
                    Self::print_statement(else_branch)
                ),
                None => format!(
                    "(if {} {})",
                    Self::print(condition),
                    Self::print_statement(then_branch)
                ),
            },
            Statement::While { condition, body } => format!(
                "(while {} {})",
                Self::print(condition),
                Self::print_statement(body)
            ),
            Statement::FunctionDeclaration(decl) => {
                let params = decl
                    .params
                    .iter()
                    .map(|p| p.lexeme.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                let mut text = format!("(fun {} ({})", decl.name.lexeme, params);
                for stmt in &decl.body {
                    text.push(' ');
                    text.push_str(&Self::print_statement(stmt));
                }
                text.push(')');
                text
            }
            Statement::Return { value, .. } => match value {
                Some(value) => format!("(return {})", Self::print(value)),
                None => "(return)".to_string(),
            },
        }
    }

    pub fn print_program(statements: &[Statement]) -> String {
        statements
            .iter()
            .map(Self::print_statement)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Source syntax of an expression. Groupings are the only parentheses
    /// emitted, so this is exact for trees the parser produced.
    pub fn source(expr: &Expr) -> String {
        match expr {
            Expr::Literal(Literal::String(s)) => format!("\"{}\"", s),
            Expr::Literal(literal) => Self::literal(literal),
            Expr::Grouping(inner) => format!("({})", Self::source(inner)),
            Expr::Unary { operator, right } => {
                format!("{}{}", operator.lexeme, Self::source(right))
            }
            Expr::Binary {
                left,
                operator,
                right,
            }
            | Expr::Logical {
                left,
                operator,
                right,
            } => format!(
                "{} {} {}",
                Self::source(left),
                operator.lexeme,
                Self::source(right)
            ),
            Expr::Variable { name, .. } => name.lexeme.clone(),
            Expr::Assign { name, value, .. } => {
                format!("{} = {}", name.lexeme, Self::source(value))
            }
            Expr::Call {
                callee, arguments, ..
            } => format!(
                "{}({})",
                Self::source(callee),
                arguments
                    .iter()
                    .map(Self::source)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    fn literal(literal: &Literal) -> String {
        match literal {
            Literal::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn parenthesize(name: &str, exprs: &[&Expr]) -> String {
        let mut text = format!("({}", name);
        for expr in exprs {
            text.push(' ');
            text.push_str(&Self::print(expr));
        }
        text.push(')');
        text
    }

    fn group(name: &str, statements: &[Statement]) -> String {
        let mut text = format!("({}", name);
        for stmt in statements {
            text.push(' ');
            text.push_str(&Self::print_statement(stmt));
        }
        text.push(')');
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::{Token, TokenKind, scan};
    use crate::parser::Parser;

    fn parse_expr(source: &str) -> Expr {
        Parser::new(scan(source).unwrap())
            .parse_expression()
            .unwrap()
    }

    #[test]
    fn prints_hand_built_tree() {
        let expr = Expr::Binary {
            left: Box::new(Expr::Unary {
                operator: Token::new(TokenKind::Minus, "-", None, 1),
                right: Box::new(Expr::Literal(Literal::Number(123.0))),
            }),
            operator: Token::new(TokenKind::Star, "*", None, 1),
            right: Box::new(Expr::Grouping(Box::new(Expr::Literal(Literal::Number(
                45.67,
            ))))),
        };
        assert_eq!(AstPrinter::print(&expr), "(* (- 123) (group 45.67))");
    }

    #[test]
    fn source_form_reparses_to_same_shape() {
        for source in [
            "1 + 2 * 3",
            "(1 + 2) * -x",
            "a = b = \"str\"",
            "f(1, g(2))(x) or !y and z == nil",
            "1 - (2 - 3)",
        ] {
            let first = parse_expr(source);
            let printed = AstPrinter::source(&first);
            let second = parse_expr(&printed);
            assert_eq!(AstPrinter::print(&first), AstPrinter::print(&second));
        }
    }

    #[test]
    fn return_without_value() {
        let program = crate::parser::parse(scan("fun f() { return; }").unwrap()).unwrap();
        assert_eq!(AstPrinter::print_program(&program), "(fun f () (return))");
    }
}
