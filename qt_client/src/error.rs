use crate::session::SessionState;
use qt_protocol::{ClientError, Opcode};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("{operation} is not allowed in state {state}")]
    InvalidState {
        operation: Opcode,
        state: SessionState,
    },

    #[error("Console error: {0}")]
    Console(#[from] std::io::Error),
}

impl SessionError {
    /// True when the session cannot continue on its connection
    pub fn is_fatal(&self) -> bool {
        match self {
            SessionError::Client(e) => e.is_fatal(),
            SessionError::InvalidState { .. } => false,
            SessionError::Console(_) => true,
        }
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
