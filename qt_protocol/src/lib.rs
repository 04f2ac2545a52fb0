//! # QT Protocol
//!
//! TCP protocol and client for driving a remote QT clustering server.
//!
//! This crate provides:
//! - Low-level protocol definitions (tagged values, framing)
//! - A TCP transport with explicit timeout policy
//! - A high-level client for the four server operations
//! - A scripted mock server for tests
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use qt_protocol::{QtClient, Radius, TransportConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = QtClient::connect("127.0.0.1", 8080, &TransportConfig::default())?;
//!
//! client.load_table("playtennis")?;
//! let clustering = client.run_clustering(Radius::new(2.0)?)?;
//! println!("{} clusters\n{}", clustering.cluster_count, clustering.description);
//!
//! client.save_to_file("playtennis.dat")?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod mock_server;
pub mod protocol;
pub mod transport;

// Re-export commonly used types
pub use client::{Clustering, Opcode, QtClient, Radius, ScriptedCodec, STATUS_OK};
pub use error::{ChannelError, ClientError, ConnectionError, ProtocolError};
pub use mock_server::{MockQtServer, MockScript, MockServerConfig, MockServerHandle};
pub use protocol::{Codec, Connection, Value, ValueTag};
pub use transport::{TcpTransport, TransportConfig};
