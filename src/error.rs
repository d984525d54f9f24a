use std::error;
use std::fmt;
use std::io;

/**
 * Error to represent a misconfigured run, a failed physics hook, or a broken
 * checkpoint. None of these is recoverable: the engine aborts the run rather
 * than continue with state whose invariants may no longer hold.
 */
#[derive(Debug)]
pub enum Error {
    InvalidBoundaryCondition(String),
    Checkpoint(String),
    Hook { level: usize, message: String },
    Io(io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        use Error::*;

        match self {
            InvalidBoundaryCondition(s) => write!(fmt, "invalid boundary condition: {}", s),
            Checkpoint(s) => write!(fmt, "bad checkpoint: {}", s),
            Hook { level, message } => write!(fmt, "physics hook failed on level {}: {}", level, message),
            Io(e) => write!(fmt, "io error: {}", e),
        }
    }
}

impl error::Error for Error {}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}
