use std::fmt::Display;

use logos::{Lexer as LLexer, Logos, Skip};

use crate::ast::Literal;
use crate::error::{LoxError, Result};

/// Update the line count.
fn newline_callback(lex: &mut LLexer<TokenKind>) -> Skip {
    lex.extras += 1;
    Skip
}

/// Skip a `/* ... */` comment, counting the newlines it spans. An
/// unterminated comment runs to the end of input.
fn block_comment_callback(lex: &mut LLexer<TokenKind>) -> Skip {
    let rest = lex.remainder();
    let len = rest.find("*/").map_or(rest.len(), |end| end + 2);
    lex.extras += rest[..len].matches('\n').count();
    lex.bump(len);
    Skip
}

/// Consume a string literal up to the closing quote. Contents are taken
/// verbatim and may span lines.
fn string_callback(lex: &mut LLexer<TokenKind>) -> bool {
    let rest = lex.remainder();
    match rest.find('"') {
        Some(end) => {
            lex.extras += rest[..end].matches('\n').count();
            lex.bump(end + 1);
            true
        }
        None => {
            lex.extras += rest.matches('\n').count();
            lex.bump(rest.len());
            false
        }
    }
}

#[derive(Debug, Logos, PartialEq, Eq, Hash, Clone, Copy)]
#[logos(extras = usize)]
#[logos(skip r"[ \t\r\f]+")] // Skip whitespace
#[logos(skip r"//[^\n]*")] // Skip single-line comments
pub enum TokenKind {
    // Single-character tokens
    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("{")]
    LeftBrace,
    #[token("}")]
    RightBrace,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("-")]
    Minus,
    #[token("+")]
    Plus,
    #[token(";")]
    Semicolon,
    #[token("/")]
    Slash,
    #[token("*")]
    Star,

    // One or two character tokens
    #[token("!")]
    Bang,
    #[token("!=")]
    BangEqual,
    #[token("=")]
    Equal,
    #[token("==")]
    EqualEqual,
    #[token(">")]
    Greater,
    #[token(">=")]
    GreaterEqual,
    #[token("<")]
    Less,
    #[token("<=")]
    LessEqual,

    // Literals
    /// Any Unicode letter, then letters and decimal digits.
    #[regex(r"\p{L}[\p{L}\p{Nd}]*")]
    Identifier,
    #[token("\"", string_callback)]
    String,
    #[regex(r"[0-9]+(\.[0-9]+)?")]
    Number,

    // Keywords
    #[token("and")]
    And,
    #[token("class")]
    Class,
    #[token("else")]
    Else,
    #[token("false")]
    False,
    #[token("for")]
    For,
    #[token("fun")]
    Fun,
    #[token("if")]
    If,
    #[token("nil")]
    Nil,
    #[token("or")]
    Or,
    #[token("print")]
    Print,
    #[token("return")]
    Return,
    #[token("super")]
    Super,
    #[token("this")]
    This,
    #[token("true")]
    True,
    #[token("var")]
    Var,
    #[token("while")]
    While,

    // Consumed by callbacks, never emitted.
    #[regex(r"\n", newline_callback)]
    Newline,
    #[token("/*", block_comment_callback)]
    BlockComment,

    Eof,
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::LeftBrace => "{",
            TokenKind::RightBrace => "}",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Minus => "-",
            TokenKind::Plus => "+",
            TokenKind::Semicolon => ";",
            TokenKind::Slash => "/",
            TokenKind::Star => "*",
            TokenKind::Bang => "!",
            TokenKind::BangEqual => "!=",
            TokenKind::Equal => "=",
            TokenKind::EqualEqual => "==",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::Identifier => "identifier",
            TokenKind::String => "string",
            TokenKind::Number => "number",
            TokenKind::And => "and",
            TokenKind::Class => "class",
            TokenKind::Else => "else",
            TokenKind::False => "false",
            TokenKind::For => "for",
            TokenKind::Fun => "fun",
            TokenKind::If => "if",
            TokenKind::Nil => "nil",
            TokenKind::Or => "or",
            TokenKind::Print => "print",
            TokenKind::Return => "return",
            TokenKind::Super => "super",
            TokenKind::This => "this",
            TokenKind::True => "true",
            TokenKind::Var => "var",
            TokenKind::While => "while",
            TokenKind::Newline => "newline",
            TokenKind::BlockComment => "comment",
            TokenKind::Eof => "end of input",
        };
        write!(f, "{}", text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub literal: Option<Literal>,
    pub line: usize,
}

impl Token {
    pub fn new(
        kind: TokenKind,
        lexeme: impl Into<String>,
        literal: Option<Literal>,
        line: usize,
    ) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            literal,
            line,
        }
    }

    pub fn eof(line: usize) -> Self {
        Self::new(TokenKind::Eof, "", None, line)
    }

    /// An identifier token that did not come from scanning.
    pub fn identifier(name: &str, line: usize) -> Self {
        Self::new(TokenKind::Identifier, name, None, line)
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.literal {
            Some(literal) => write!(f, "{:?} {} {}", self.kind, self.lexeme, literal),
            None => write!(f, "{:?} {}", self.kind, self.lexeme),
        }
    }
}

pub struct Lexer<'a> {
    inner: LLexer<'a, TokenKind>,
    finished: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            inner: TokenKind::lexer_with_extras(input, 1),
            finished: false,
        }
    }

    fn make_token(&self, kind: TokenKind) -> Result<Token> {
        let slice = self.inner.slice();
        let line = self.inner.extras;

        let literal = match kind {
            TokenKind::Number => {
                let value = slice.parse::<f64>().map_err(|e| {
                    LoxError::lexer(line, format!("Invalid number '{}': {}", slice, e))
                })?;
                Some(Literal::Number(value))
            }
            TokenKind::String => Some(Literal::String(slice[1..slice.len() - 1].to_string())),
            _ => None,
        };

        Ok(Token::new(kind, slice, literal, line))
    }

    fn make_error(&self) -> LoxError {
        let line = self.inner.extras;
        if self.inner.slice().starts_with('"') {
            LoxError::lexer(line, "Unterminated string.")
        } else {
            LoxError::lexer(line, "Unexpected character.")
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.inner.next() {
            Some(Ok(kind)) => Some(self.make_token(kind)),
            Some(Err(())) => Some(Err(self.make_error())),
            None => {
                self.finished = true;
                Some(Ok(Token::eof(self.inner.extras)))
            }
        }
    }
}

impl<'a> Lexer<'a> {
    /// Scan the whole input, reporting every lexical error rather than just
    /// the first. The token list always ends with `Eof`.
    pub fn collect_tokens(self) -> Result<Vec<Token>> {
        let span = tracing::debug_span!("scan");
        let _enter = span.enter();

        let mut tokens = Vec::new();
        let mut errors = Vec::new();

        for result in self {
            match result {
                Ok(token) => tokens.push(token),
                Err(e) => {
                    tracing::debug!("lexer error: {}", e);
                    errors.push(e);
                }
            }
        }

        if errors.is_empty() {
            tracing::debug!("scanned {} tokens", tokens.len());
            Ok(tokens)
        } else {
            Err(LoxError::from_many(errors))
        }
    }
}

pub fn scan(source: &str) -> Result<Vec<Token>> {
    Lexer::new(source).collect_tokens()
}
