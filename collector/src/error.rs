use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("statistics channel unreachable: {0}")]
    Unreachable(String),
    #[error("statistics request timed out")]
    Timeout,
    #[error("statistics channel answered with HTTP {0}")]
    Http(u16),
    #[error("malformed statistics response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = err.status() {
            FetchError::Http(status.as_u16())
        } else if err.is_connect() || err.is_request() {
            FetchError::Unreachable(err.to_string())
        } else {
            FetchError::MalformedResponse(err.to_string())
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("unsupported statistics schema: {0}")]
    UnsupportedSchema(String),
    #[error("statistics document is truncated: {0}")]
    Truncated(String),
}

#[derive(Error, Debug)]
pub enum EmitError {
    #[error("connecting to {address} failed: {reason}")]
    ConnectFailed { address: String, reason: String },
    #[error("writing to the sink failed after {written} of {total} bytes: {reason}")]
    WriteFailed {
        written: usize,
        total: usize,
        reason: String,
    },
    #[error("sink timed out")]
    Timeout,
}

/// The stage of a collection cycle, used to tag failures in the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    Parse,
    Emit,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Fetch => "fetch",
            Stage::Parse => "parse",
            Stage::Emit => "emit",
        })
    }
}

/// Any failure that aborts a single cycle. Never fatal to the process.
#[derive(Error, Debug)]
pub enum CycleError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Emit(#[from] EmitError),
}

impl CycleError {
    pub fn stage(&self) -> Stage {
        match self {
            CycleError::Fetch(_) => Stage::Fetch,
            CycleError::Parse(_) => Stage::Parse,
            CycleError::Emit(_) => Stage::Emit,
        }
    }
}
