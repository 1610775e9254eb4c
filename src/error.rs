//! Error taxonomy for the nuggets game (spec §7).
//!
//! Startup errors (`BadArguments`, `BadMap`, `SocketError` from a bind
//! failure) are fatal and map to a process exit code via [`NuggetsError::exit_code`].
//! Everything else is handled in place by the caller: a protocol error
//! becomes an `ERROR` reply, a rejected join becomes a `QUIT` reply, and an
//! unknown address is logged and dropped.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NuggetsError {
    #[error("bad arguments: {0}")]
    BadArguments(String),

    #[error("bad map: {0}")]
    BadMap(String),

    #[error("socket error: {0}")]
    SocketError(#[from] std::io::Error),

    #[error("malformed frame: {0}")]
    ProtocolError(String),

    #[error("Game is full: no more players can join.")]
    GameFull,

    #[error("Sorry - you must provide player's name.")]
    BadName,

    #[error("unrecognised keystroke: {0:?}")]
    InvalidKeystroke(char),

    #[error("message from unknown address")]
    UnknownAddress,

    #[error("out of memory")]
    OutOfMemory,
}

impl NuggetsError {
    /// Process exit code for startup-fatal variants (spec §6). Only
    /// meaningful for errors that abort `main` before the event loop starts.
    pub fn exit_code(&self) -> i32 {
        match self {
            NuggetsError::BadArguments(_) => 1,
            NuggetsError::BadMap(_) => 1,
            NuggetsError::SocketError(_) => 2,
            _ => 1,
        }
    }
}
