//! Interactive client for the QT clustering server.
//!
//! The [`session::Session`] drives the protocol client from a menu loop; the
//! binary wires it to stdin/stdout and a TCP connection.

pub mod config;
pub mod console;
pub mod error;
pub mod session;

pub use config::{ConfigError, Overrides, Settings};
pub use console::{Console, LineConsole, PromptLanguage, Prompts};
pub use error::{Result as SessionResult, SessionError};
pub use session::{FlowConfig, MenuChoice, SaveMode, Session, SessionState};
