//! Run named code blocks embedded in Markdown files.
//!
//! A fenced block becomes runnable once its header carries a name, as in
//! `` ```python {name=hello, tag=ci} ``. The crate extracts such blocks
//! ([`parser`]), maps their language token to an interpreter command
//! ([`registry`]), picks the blocks an invocation targets ([`selector`]) and
//! runs them one after another as child processes ([`dispatch`],
//! [`executor`]). Every `run` is recorded in a bounded history ([`history`]).
//!
//! The main entry point is [`Interpreter`], which parses a command line and
//! drives the pieces above. Output is delivered through an [`OutputSink`], so
//! the same code serves the terminal and tests.

pub mod cli;
pub mod config;
pub mod dispatch;
pub mod document;
pub mod env;
pub mod error;
pub mod executor;
pub mod history;
mod interpreter;
pub mod io_adapters;
pub mod parser;
pub mod registry;
pub mod selector;

/// The command line front-end.
///
/// See [`Interpreter`] for the high-level API and examples.
pub use interpreter::Interpreter;

pub use config::Config;
pub use dispatch::{BatchReport, Dispatcher, Outcome};
pub use error::{ConfigError, EnvError, Error, HistoryError, SelectionError};
pub use executor::{ExecutionFailure, ExecutionResult, Executor, ProcessExecutor};
pub use history::{HistoryStore, Ledger};
pub use io_adapters::{MemSink, OutputSink, WriterSink};
pub use parser::{Snippet, extract};
pub use registry::{Binding, LanguageRegistry};
pub use selector::{SelectionSpec, select};
