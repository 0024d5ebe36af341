use std::fmt;
use thiserror::Error;

/// Every failure the world storage engine reports.
#[derive(Debug, Error)]
pub enum StrataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing tag: {name}")]
    MissingTag { name: String },

    #[error("tag {name} has the wrong type: expected {expected}, got {got}")]
    WrongType {
        name: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("unexpected value for {name}: expected {expected}, got {got}")]
    UnexpectedValue {
        name: String,
        expected: String,
        got: String,
    },

    #[error("{name} out of bounds: expected {expected}, got {got}")]
    Oob {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("unknown compression scheme: {0}")]
    UnknownCompression(u8),

    #[error("chunk read error: {0}")]
    Read(String),

    #[error("lost the lock on the world directory")]
    NoLock,

    #[error("conflicting writes for chunk {x}, {z}")]
    Conflict { x: i32, z: i32 },

    #[error(transparent)]
    Multi(#[from] MultiError),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}

impl StrataError {
    pub fn missing(name: &str) -> Self {
        StrataError::MissingTag {
            name: name.to_owned(),
        }
    }

    pub fn unexpected(name: &str, expected: impl fmt::Display, got: impl fmt::Display) -> Self {
        StrataError::UnexpectedValue {
            name: name.to_owned(),
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }

    pub fn oob(name: &str, expected: usize, got: usize) -> Self {
        StrataError::Oob {
            name: name.to_owned(),
            expected,
            got,
        }
    }
}

/// Failures collected from a batch operation, such as saving many chunks at
/// once, so one bad chunk does not stop the rest of the batch.
#[derive(Debug, Default)]
pub struct MultiError {
    pub errors: Vec<StrataError>,
}

impl MultiError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: StrataError) {
        self.errors.push(err);
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// `Ok(())` when nothing failed, otherwise the collected errors.
    pub fn into_result(self) -> crate::Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(StrataError::Multi(self))
        }
    }
}

impl fmt::Display for MultiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors occurred", self.errors.len())?;
        for err in &self.errors {
            write!(f, "; {}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for MultiError {}
