use std::io;
use std::path::PathBuf;

use lox_core::LoxError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Usage: lox [script]")]
    Usage,

    #[error("Could not read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Lox(#[from] LoxError),

    #[error("REPL failed: {0}")]
    Repl(#[from] anyhow::Error),
}

impl CliError {
    /// Process exit status, following the BSD `sysexits` convention.
    pub fn exit_code(&self) -> u8 {
        match self {
            CliError::Usage => 64,
            CliError::Lox(e) if e.is_runtime() => 70,
            CliError::Lox(_) => 65,
            CliError::Io { .. } | CliError::Repl(_) => 74,
        }
    }
}

pub type Result<T> = std::result::Result<T, CliError>;
