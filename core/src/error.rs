use crate::lexer::{Token, TokenKind};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoxError {
    #[error("[line {line}] Error: {message}")]
    LexerError { line: usize, message: String },

    #[error("[line {line}] Error{location}: {message}")]
    ParserError {
        line: usize,
        location: String,
        message: String,
    },

    #[error("[line {line}] Error{location}: {message}")]
    ResolverError {
        line: usize,
        location: String,
        message: String,
    },

    #[error("{message}\n[line {line}]")]
    RuntimeError { line: usize, message: String },

    /// Every static diagnostic gathered from one compilation unit.
    #[error("{}", render_all(.0))]
    Compile(Vec<LoxError>),
}

fn render_all(errors: &[LoxError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Describes where a token sits for diagnostics: ` at end` or ` at 'x'`.
fn location_of(token: &Token) -> String {
    if token.kind == TokenKind::Eof {
        " at end".to_string()
    } else {
        format!(" at '{}'", token.lexeme)
    }
}

impl LoxError {
    pub fn lexer(line: usize, message: impl Into<String>) -> Self {
        LoxError::LexerError {
            line,
            message: message.into(),
        }
    }

    pub fn parser(token: &Token, message: impl Into<String>) -> Self {
        LoxError::ParserError {
            line: token.line,
            location: location_of(token),
            message: message.into(),
        }
    }

    pub fn resolver(token: &Token, message: impl Into<String>) -> Self {
        LoxError::ResolverError {
            line: token.line,
            location: location_of(token),
            message: message.into(),
        }
    }

    pub fn runtime(token: &Token, message: impl Into<String>) -> Self {
        LoxError::RuntimeError {
            line: token.line,
            message: message.into(),
        }
    }

    /// Collapses a batch of diagnostics: one error stays itself, several
    /// become a `Compile` aggregate.
    pub fn from_many(mut errors: Vec<LoxError>) -> Self {
        if errors.len() == 1 {
            errors.remove(0)
        } else {
            LoxError::Compile(errors)
        }
    }

    /// True when execution was attempted and failed partway.
    pub fn is_runtime(&self) -> bool {
        matches!(self, LoxError::RuntimeError { .. })
    }

    pub fn line(&self) -> Option<usize> {
        match self {
            LoxError::LexerError { line, .. }
            | LoxError::ParserError { line, .. }
            | LoxError::ResolverError { line, .. }
            | LoxError::RuntimeError { line, .. } => Some(*line),
            LoxError::Compile(errors) => errors.first().and_then(LoxError::line),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            LoxError::LexerError { message, .. }
            | LoxError::ParserError { message, .. }
            | LoxError::ResolverError { message, .. }
            | LoxError::RuntimeError { message, .. } => message,
            LoxError::Compile(errors) => errors.first().map_or("", LoxError::message),
        }
    }
}

pub type Result<T> = std::result::Result<T, LoxError>;
