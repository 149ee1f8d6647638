pub mod ast;
pub mod error;
pub mod interpreter;
pub mod lexer;
pub mod native;
pub mod parser;
pub mod print;
pub mod printer;
pub mod resolver;
pub mod session;

pub use error::{LoxError, Result};
pub use interpreter::{Interpreter, Value};
pub use print::PrintHandler;
pub use session::Session;
