//! Library catalog operator console.
//!
//! # Responsibility
//! - Load configuration, start logging, open the catalog database.
//! - Hand stdin/stdout to the interactive menu.

mod command;
mod config;
mod console;

use config::{CliConfig, ConfigError};
use console::Console;
use libsys_core::db::{open_db, DbError};
use libsys_core::{init_logging, LibraryService, LoggingError, SqliteLibraryRepository};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::process::ExitCode;

/// Bootstrap failure that ends the process.
#[derive(Debug)]
enum AppError {
    Config(ConfigError),
    Logging(LoggingError),
    Db(DbError),
    Io(io::Error),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "configuration error: {err}"),
            Self::Logging(err) => write!(f, "logging error: {err}"),
            Self::Db(err) => write!(f, "database error: {err}"),
            Self::Io(err) => write!(f, "console error: {err}"),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Logging(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Io(err) => Some(err),
        }
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<LoggingError> for AppError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<DbError> for AppError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<io::Error> for AppError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

fn main() -> ExitCode {
    // A missing .env file is fine; real environment variables still apply.
    dotenvy::dotenv().ok();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("libsys: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), AppError> {
    let config = CliConfig::from_env()?;
    if let Some(log_dir) = config.log_dir.as_deref() {
        init_logging(config.log_level, log_dir)?;
    }

    let mut conn = open_db(&config.db_path)?;
    let service = LibraryService::new(SqliteLibraryRepository::new(&mut conn));
    info!(
        "event=console_start module=cli status=ok version={}",
        libsys_core::core_version()
    );

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut console = Console::new(service, stdin.lock(), stdout.lock(), config.reports);
    console.run()?;
    Ok(())
}
