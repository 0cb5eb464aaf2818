use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing required setting: {0}")]
    MissingField(&'static str),

    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("malformed settings line {line}")]
    MalformedSettings { line: usize },

    #[error("could not determine user config directory")]
    NoConfigDir,

    #[error(
        "no configuration found, template written to {}, please edit and retry",
        path.display()
    )]
    TemplateWritten { path: PathBuf },
}
