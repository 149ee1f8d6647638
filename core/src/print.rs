//! Destination for `print` statement output.
//!
//! Scripts and the REPL write to stdout. Tests and embedders capture into a
//! shared buffer they can read back after running code.

use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, Default)]
pub enum PrintHandler {
    #[default]
    Stdout,
    Buffer(Rc<RefCell<String>>),
}

impl PrintHandler {
    /// A capturing handler. Clones share the same buffer.
    pub fn buffer() -> Self {
        PrintHandler::Buffer(Rc::new(RefCell::new(String::new())))
    }

    pub fn println(&self, msg: &str) {
        match self {
            PrintHandler::Stdout => println!("{msg}"),
            PrintHandler::Buffer(buf) => {
                let mut buf = buf.borrow_mut();
                buf.push_str(msg);
                buf.push('\n');
            }
        }
    }

    /// Everything captured so far. Always empty for stdout.
    pub fn output(&self) -> String {
        match self {
            PrintHandler::Stdout => String::new(),
            PrintHandler::Buffer(buf) => buf.borrow().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_collects_lines() {
        let handler = PrintHandler::buffer();
        handler.println("one");
        handler.println("two");
        assert_eq!(handler.output(), "one\ntwo\n");
    }

    #[test]
    fn clones_share_the_buffer() {
        let handler = PrintHandler::buffer();
        let shared = handler.clone();
        shared.println("x");
        handler.println("y");
        assert_eq!(shared.output(), "x\ny\n");
    }

    #[test]
    fn stdout_captures_nothing() {
        assert_eq!(PrintHandler::Stdout.output(), "");
    }
}
