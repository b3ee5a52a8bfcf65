use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the snippet pipeline.
///
/// Document and language errors are recoverable: a batch keeps going and the
/// error is reported next to whatever did run.
#[derive(Error, Debug)]
pub enum Error {
    #[error("cannot read document {}: {source}", .path.display())]
    DocumentRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("language '{lang}' is not configured, skipping code block '{name}'")]
    UnresolvedLanguage { lang: String, name: String },
}

/// A named or tagged selection matched nothing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("code block with name '{0}' not found")]
    NameNotFound(String),

    #[error("code block with tag '{0}' not found")]
    TagNotFound(String),
}

#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("history file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("history file {} is corrupt: {source}", .path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot encode history: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("cannot replace history file: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("no history entry with id {0}")]
    UnknownId(u64),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("section 'lang.{section}' is missing the '{field}' field")]
    MissingField { section: String, field: &'static str },

    #[error("section 'lang.{section}' has an invalid 'aliases' field, expected a comma-separated list of names")]
    InvalidAliases { section: String },

    #[error("section 'lang.{section}' has an empty 'command' field")]
    EmptyCommand { section: String },

    #[error("could not determine the home directory")]
    NoHome,
}

#[derive(Error, Debug)]
pub enum EnvError {
    #[error("malformed environment assignment '{0}', expected KEY=value")]
    Malformed(String),

    #[error("cannot load {}: {source}", .path.display())]
    Runenv {
        path: PathBuf,
        #[source]
        source: dotenvy::Error,
    },
}
