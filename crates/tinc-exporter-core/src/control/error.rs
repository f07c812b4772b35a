use std::path::PathBuf;

use crate::scan::DecodeError;

/// Errors from a control-channel query.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("cannot read tinc pidfile {path}: {source}")]
    StateFileUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed tinc pidfile {path}: {source}")]
    StateFileMalformed { path: PathBuf, source: DecodeError },

    #[error("cannot connect to tinc control socket {path}: {source}")]
    TransportUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("undecodable response line {line:?}: {source}")]
    ProtocolViolation { line: String, source: DecodeError },

    #[error("control connection closed before the end of the response")]
    StreamClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
