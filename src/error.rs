use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by the tail detector and its change watcher
#[derive(Error, Debug)]
pub enum TailError {
    #[error("cannot read '{}': {source}", path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("watch on '{}' failed: {message}", path.display())]
    Watch { path: PathBuf, message: String },
}

impl TailError {
    pub fn file_system(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TailError::FileSystem {
            path: path.into(),
            source,
        }
    }

    pub fn watch(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        TailError::Watch {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A line the parser could not accept in its current mode
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{reason}: {line:?}")]
pub struct ParseError {
    pub line: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(line: &str, reason: impl Into<String>) -> Self {
        Self {
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}

/// Error categories delivered to the error sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    FileSystem,
    Parse,
    Watch,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::FileSystem => "file system error",
            ErrorKind::Parse => "parse error",
            ErrorKind::Watch => "watch error",
        };
        f.write_str(name)
    }
}

/// Structured error handed to the sink, then discarded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offending_line: Option<String>,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            offending_line: None,
        }
    }

    /// Build a record from a failure forwarded by the ordered queue.
    ///
    /// Parse failures keep their offending line; anything else a work item
    /// returns is still reported as a parse-kind failure, since the only work
    /// the pipeline queues is parsing.
    pub fn from_task_failure(err: &anyhow::Error) -> Self {
        match err.downcast_ref::<ParseError>() {
            Some(parse_err) => parse_err.into(),
            None => ErrorRecord::new(ErrorKind::Parse, format!("{:#}", err)),
        }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl From<&TailError> for ErrorRecord {
    fn from(err: &TailError) -> Self {
        let kind = match err {
            TailError::FileSystem { .. } => ErrorKind::FileSystem,
            TailError::Watch { .. } => ErrorKind::Watch,
        };
        ErrorRecord::new(kind, err.to_string())
    }
}

impl From<&ParseError> for ErrorRecord {
    fn from(err: &ParseError) -> Self {
        ErrorRecord {
            kind: ErrorKind::Parse,
            message: err.reason.clone(),
            offending_line: Some(err.line.clone()),
        }
    }
}
