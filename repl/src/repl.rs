use std::collections::HashMap;

use colored::Colorize;
use lox_core::lexer::scan;
use lox_core::parser::Parser;
use lox_core::printer::AstPrinter;
use lox_core::{Session, Value};
use reedline::{DefaultPrompt, DefaultPromptSegment, Reedline, Signal};

type CommandFn = fn(&mut Repl, &[&str]) -> anyhow::Result<()>;

pub struct Repl {
    session: Session,
    commands: HashMap<String, CommandFn>,
    history: Vec<String>,
    /// Lines of an entry whose braces are not yet balanced.
    input_buffer: String,
    variables: HashMap<String, String>,
    line_number: usize,
    finished: bool,
}

impl Repl {
    pub fn new() -> Self {
        let mut commands = HashMap::new();
        commands.insert("help".to_string(), Self::cmd_help as CommandFn);
        commands.insert("exit".to_string(), Self::cmd_exit as CommandFn);
        commands.insert("quit".to_string(), Self::cmd_exit as CommandFn);
        commands.insert("history".to_string(), Self::cmd_history as CommandFn);
        commands.insert("env".to_string(), Self::cmd_env as CommandFn);
        commands.insert("set".to_string(), Self::cmd_set as CommandFn);
        commands.insert("debug".to_string(), Self::cmd_debug as CommandFn);

        let mut variables = HashMap::new();
        variables.insert("debug".to_string(), "false".to_string());

        Self {
            session: Session::new(),
            commands,
            history: Vec::new(),
            input_buffer: String::new(),
            variables,
            line_number: 1,
            finished: false,
        }
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        let span = tracing::debug_span!("repl");
        let _enter = span.enter();
        let mut editor = Reedline::create();

        println!("{}", "Lox REPL".bright_blue());
        println!(
            "{}",
            "Type ':help' for commands, ':exit' to quit.".bright_yellow()
        );

        while !self.finished {
            let prompt = self.make_prompt();
            let line = match editor.read_line(&prompt)? {
                Signal::Success(input) => input,
                Signal::CtrlC => {
                    self.input_buffer.clear();
                    continue;
                }
                Signal::CtrlD => break,
            };

            let trimmed = line.trim();
            if self.input_buffer.is_empty() {
                if let Some(command) = trimmed.strip_prefix(':') {
                    self.dispatch(command);
                    continue;
                }
                if trimmed.is_empty() {
                    continue;
                }
            }

            self.input_buffer.push_str(&line);
            self.input_buffer.push('\n');
            if brace_balance(&self.input_buffer) > 0 {
                continue;
            }

            let code = std::mem::take(&mut self.input_buffer);
            self.evaluate_and_print(&code);
            self.line_number += 1;
            self.history.push(code.trim_end().to_string());
        }

        println!("Goodbye!");
        Ok(())
    }

    fn make_prompt(&self) -> DefaultPrompt {
        let left = if self.input_buffer.is_empty() {
            format!("lox[{}]", self.line_number)
        } else {
            let depth = brace_balance(&self.input_buffer).max(0) as usize;
            format!("...{}", "  ".repeat(depth))
        };
        DefaultPrompt::new(
            DefaultPromptSegment::Basic(left),
            DefaultPromptSegment::Empty,
        )
    }

    fn dispatch(&mut self, command: &str) {
        let mut parts = command.split_whitespace();
        let Some(name) = parts.next() else {
            return;
        };
        let args: Vec<&str> = parts.collect();

        match self.commands.get(name).copied() {
            Some(handler) => {
                if let Err(e) = handler(self, &args) {
                    eprintln!("{}", format!("Error: {e}").red());
                }
            }
            None => eprintln!("{}", format!("Unknown command: {name}").red()),
        }
    }

    fn evaluate_and_print(&mut self, code: &str) {
        if self.get_var("debug") == "true" {
            self.print_syntax_tree(code);
        }

        match self.session.run_line(code) {
            Ok(Some(value)) => println!("=> {}", paint(&value)),
            Ok(None) => {}
            Err(e) => eprintln!("{}", e.to_string().red()),
        }
    }

    fn print_syntax_tree(&self, code: &str) {
        let Ok(tokens) = scan(code) else {
            return;
        };
        let tree = match Parser::new(tokens.clone()).parse() {
            Ok(statements) => AstPrinter::print_program(&statements),
            Err(_) => match Parser::new(tokens).parse_expression() {
                Ok(expr) => AstPrinter::print(&expr),
                Err(_) => return,
            },
        };
        println!("{}", tree.dimmed());
    }

    fn cmd_help(&mut self, _args: &[&str]) -> anyhow::Result<()> {
        println!("Available commands:");
        println!("  :help              Show this message");
        println!("  :exit, :quit       Leave the REPL");
        println!("  :history           Show previous entries");
        println!("  :env               List global bindings");
        println!("  :set key=value     Set a REPL variable");
        println!("                     max_call_depth=N limits Lox call nesting");
        println!("  :debug on|off      Print the syntax tree of each entry");
        println!("Entries with an open '{{' continue until it is closed.");
        println!("A bare expression without ';' is evaluated and echoed.");
        Ok(())
    }

    fn cmd_exit(&mut self, _args: &[&str]) -> anyhow::Result<()> {
        self.finished = true;
        Ok(())
    }

    fn cmd_history(&mut self, _args: &[&str]) -> anyhow::Result<()> {
        if self.history.is_empty() {
            println!("No command history.");
        }
        for (i, entry) in self.history.iter().enumerate() {
            println!("{}: {}", i + 1, entry);
        }
        Ok(())
    }

    fn cmd_env(&mut self, _args: &[&str]) -> anyhow::Result<()> {
        let bindings = self.session.interpreter().globals().bindings();
        for (name, value) in bindings {
            println!("  {name} = {}", paint(&value));
        }
        Ok(())
    }

    fn cmd_set(&mut self, args: &[&str]) -> anyhow::Result<()> {
        let (key, value) = parse_assignment(&args.join(" "))
            .ok_or_else(|| anyhow::anyhow!("Usage: :set key=value"))?;
        if key == "max_call_depth" {
            let depth: usize = value
                .parse()
                .map_err(|_| anyhow::anyhow!("max_call_depth must be a whole number"))?;
            self.session.interpreter_mut().set_max_call_depth(depth);
        }
        println!("Set {key} = {value}");
        self.variables.insert(key, value);
        Ok(())
    }

    fn cmd_debug(&mut self, args: &[&str]) -> anyhow::Result<()> {
        match args {
            [] => println!("Current debug setting: {}", self.get_var("debug")),
            ["on" | "true"] => {
                self.variables.insert("debug".to_string(), "true".to_string());
                println!("Debug mode enabled");
            }
            ["off" | "false"] => {
                self.variables.insert("debug".to_string(), "false".to_string());
                println!("Debug mode disabled");
            }
            _ => anyhow::bail!("Usage: :debug on|off"),
        }
        Ok(())
    }

    fn get_var(&self, key: &str) -> String {
        self.variables.get(key).cloned().unwrap_or_default()
    }
}

fn paint(value: &Value) -> String {
    match value {
        Value::Nil => "nil".dimmed().to_string(),
        Value::Boolean(b) => b.to_string().magenta().to_string(),
        Value::Number(_) => value.to_string().yellow().to_string(),
        Value::String(s) => format!("\"{s}\"").green().to_string(),
        Value::Function(_) | Value::Native(_) => value.to_string().cyan().to_string(),
    }
}

fn parse_assignment(text: &str) -> Option<(String, String)> {
    let (key, value) = text.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.trim().to_string()))
}

/// Open minus closed braces, ignoring string literals and comments.
fn brace_balance(text: &str) -> i64 {
    let mut balance = 0;
    let mut chars = text.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            in_string = c != '"';
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => balance += 1,
            '}' => balance -= 1,
            '/' if chars.peek() == Some(&'/') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut star = false;
                for next in chars.by_ref() {
                    if star && next == '/' {
                        break;
                    }
                    star = next == '*';
                }
            }
            _ => {}
        }
    }
    balance
}
