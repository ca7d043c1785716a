use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("io error: {0}")]
    Io(String),
    #[error("config parse error: {0}")]
    ConfigParse(String),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("cli error: {0}")]
    Cli(String),
    #[error("runtime error: {0}")]
    Runtime(String),
}

impl ReplayError {
    pub fn io(path: &std::path::Path, error: impl std::fmt::Display) -> Self {
        Self::Io(format!("{}: {error}", path.display()))
    }
}

/// Conditions worth telling the operator about that never stop a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayWarning {
    EmptyInput(PathBuf),
    EmptyDirectory(PathBuf),
}

impl ReplayWarning {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::EmptyInput(_) => "empty_input",
            Self::EmptyDirectory(_) => "empty_directory",
        }
    }

    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::EmptyInput(path) | Self::EmptyDirectory(path) => path,
        }
    }
}

impl std::fmt::Display for ReplayWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyInput(path) => write!(f, "Input file {} is empty", path.display()),
            Self::EmptyDirectory(path) => {
                write!(f, "Input directory {} is empty", path.display())
            }
        }
    }
}
