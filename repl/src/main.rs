mod error;
mod repl;

use std::env;
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use colored::Colorize;
use lox_core::Session;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::error::{CliError, Result};
use crate::repl::Repl;

const STACK_SIZE: usize = 64 * 1024 * 1024;

fn main() -> ExitCode {
    // Deeply recursive scripts need more than the default main-thread stack.
    let spawned = std::thread::Builder::new()
        .stack_size(STACK_SIZE)
        .spawn(run);

    match spawned {
        Ok(handle) => handle.join().unwrap_or_else(|_| ExitCode::from(70)),
        Err(e) => {
            eprintln!("could not start interpreter thread: {e}");
            ExitCode::from(71)
        }
    }
}

fn run() -> ExitCode {
    init_tracing();

    let args: Vec<String> = env::args().skip(1).collect();
    let interactive = args.is_empty();
    let result = match args.as_slice() {
        [] => Repl::new().run().map_err(CliError::from),
        [path] => run_file(PathBuf::from(path)),
        _ => Err(CliError::Usage),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if interactive {
                eprintln!("{}", e.to_string().red());
            } else {
                eprintln!("{e}");
            }
            ExitCode::from(e.exit_code())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn run_file(path: PathBuf) -> Result<()> {
    let span = tracing::info_span!("run_file", path = %path.display());
    let _enter = span.enter();

    let source = fs::read_to_string(&path).map_err(|source| CliError::Io {
        path: path.clone(),
        source,
    })?;
    tracing::debug!(bytes = source.len(), "read script");

    let mut session = Session::new();
    session.run(&source)?;

    tracing::debug!("execution complete");
    Ok(())
}
