use crate::error::{ChannelError, ClientError, ConnectionError, ProtocolError};
use crate::protocol::{Codec, Connection, Value};
use crate::transport::{TcpTransport, TransportConfig};
use log::{debug, error, info, warn};
use strum::Display;

/// Status token the server sends for a successful request
pub const STATUS_OK: &str = "OK";

/// Operation codes understood by the clustering server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[repr(i64)]
pub enum Opcode {
    #[strum(serialize = "LOAD_TABLE")]
    LoadTable = 0,
    #[strum(serialize = "RUN_CLUSTERING")]
    RunClustering = 1,
    #[strum(serialize = "SAVE_TO_FILE")]
    SaveToFile = 2,
    #[strum(serialize = "LOAD_FROM_FILE")]
    LoadFromFile = 3,
}

impl TryFrom<i64> for Opcode {
    type Error = i64;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Opcode::LoadTable),
            1 => Ok(Opcode::RunClustering),
            2 => Ok(Opcode::SaveToFile),
            3 => Ok(Opcode::LoadFromFile),
            other => Err(other),
        }
    }
}

impl From<Opcode> for Value {
    fn from(opcode: Opcode) -> Self {
        Value::Int(opcode as i64)
    }
}

/// Clustering distance threshold, always finite and strictly positive
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Radius(f64);

impl Radius {
    pub fn new(value: f64) -> Result<Self, ClientError> {
        if value.is_finite() && value > 0.0 {
            Ok(Radius(value))
        } else {
            Err(ClientError::InvalidRadius(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

/// Result of a successful clustering run
#[derive(Debug, Clone, PartialEq)]
pub struct Clustering {
    pub cluster_count: i64,
    /// Server-produced description of the cluster set
    pub description: String,
}

/// Blocking client for the QT clustering server
///
/// Every operation is one request followed by exactly the reads it declares;
/// `&mut self` keeps a single request in flight. After a channel failure the
/// client refuses further requests instead of reading a stale reply.
pub struct QtClient<C: Codec> {
    codec: C,
    out_of_step: bool,
}

impl QtClient<Connection<TcpTransport>> {
    /// Connect to the clustering server
    pub fn connect(
        host: &str,
        port: u16,
        config: &TransportConfig,
    ) -> Result<Self, ConnectionError> {
        let transport = TcpTransport::connect(host, port, config)?;
        Ok(QtClient::new(Connection::new(transport)))
    }

    pub fn peer(&self) -> std::net::SocketAddr {
        self.codec.transport().peer()
    }
}

impl<C: Codec> QtClient<C> {
    pub fn new(codec: C) -> Self {
        QtClient {
            codec,
            out_of_step: false,
        }
    }

    /// False once a channel failure has left the connection unusable
    pub fn is_usable(&self) -> bool {
        !self.out_of_step
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    pub fn into_codec(self) -> C {
        self.codec
    }

    /// Ask the server to load a database table
    pub fn load_table(&mut self, table_name: &str) -> Result<(), ClientError> {
        let result = self.request(Opcode::LoadTable, vec![Value::from(table_name)]);
        self.track(result)?;
        info!("📋 Table '{}' loaded", table_name);
        Ok(())
    }

    /// Run QT clustering on the loaded table
    pub fn run_clustering(&mut self, radius: Radius) -> Result<Clustering, ClientError> {
        let result = self
            .request(Opcode::RunClustering, vec![Value::Float(radius.value())])
            .and_then(|()| {
                Ok(Clustering {
                    cluster_count: self.codec.receive_int()?,
                    description: self.codec.receive_text()?,
                })
            });
        let clustering = self.track(result)?;

        info!(
            "🎯 Clustering with radius {} produced {} clusters",
            radius.value(),
            clustering.cluster_count
        );
        Ok(clustering)
    }

    /// Persist the current cluster set on the server side
    pub fn save_to_file(&mut self, file_name: &str) -> Result<(), ClientError> {
        let result = self.request(Opcode::SaveToFile, vec![Value::from(file_name)]);
        self.track(result)?;
        info!("💾 Clusters saved to '{}'", file_name);
        Ok(())
    }

    /// Load a previously saved cluster set and return its description
    pub fn load_from_file(&mut self, file_name: &str) -> Result<String, ClientError> {
        let result = self
            .request(Opcode::LoadFromFile, vec![Value::from(file_name)])
            .and_then(|()| Ok(self.codec.receive_text()?));
        let description = self.track(result)?;
        info!("📂 Clusters loaded from '{}'", file_name);
        Ok(description)
    }

    /// Send the opcode and arguments, then read and check the status token
    fn request(&mut self, opcode: Opcode, arguments: Vec<Value>) -> Result<(), ClientError> {
        if self.out_of_step {
            warn!("❌ Refusing {} on a connection that is out of step", opcode);
            return Err(ChannelError::OutOfStep.into());
        }
        debug!("📤 Sending {} request", opcode);

        let mut values = Vec::with_capacity(arguments.len() + 1);
        values.push(Value::from(opcode));
        values.extend(arguments);
        self.codec.send_values(&values)?;

        let status = self.codec.receive_text()?;
        if status == STATUS_OK {
            Ok(())
        } else {
            warn!("❌ Server rejected {}: {}", opcode, status);
            Err(ProtocolError::from_status(status).into())
        }
    }

    /// Stop using the connection once a channel failure has hit an exchange
    fn track<T>(&mut self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        if let Err(ClientError::Channel(e)) = &result {
            if !self.out_of_step {
                error!("❌ Connection unusable after channel failure: {}", e);
                self.out_of_step = true;
            }
        }
        result
    }
}

/// In-memory codec that records sent values and replays scripted replies
#[derive(Debug, Default)]
pub struct ScriptedCodec {
    pub sent: Vec<Value>,
    replies: std::collections::VecDeque<Value>,
}

impl ScriptedCodec {
    pub fn with_replies<I, V>(replies: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        ScriptedCodec {
            sent: Vec::new(),
            replies: replies.into_iter().map(Into::into).collect(),
        }
    }

    pub fn push_reply(&mut self, value: impl Into<Value>) {
        self.replies.push_back(value.into());
    }

    /// Replies that were scripted but never read
    pub fn remaining_replies(&self) -> usize {
        self.replies.len()
    }
}

impl Codec for ScriptedCodec {
    fn send_values(&mut self, values: &[Value]) -> Result<(), ChannelError> {
        self.sent.extend_from_slice(values);
        Ok(())
    }

    fn receive_value(&mut self) -> Result<Value, ChannelError> {
        self.replies.pop_front().ok_or(ChannelError::Closed)
    }
}
