//! Scripted stand-in for the clustering server.
//!
//! The mock speaks the real wire protocol over TCP but fakes the clustering:
//! tables are a fixed list of names, a clustering run reports a configured
//! cluster count, and saved files live in memory shared by all clients.

use crate::client::{Opcode, STATUS_OK};
use crate::error::ChannelError;
use crate::protocol::{Codec, Connection, Value};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Behaviour of the mock server, loadable from JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MockScript {
    /// Table names LOAD_TABLE accepts
    pub tables: Vec<String>,
    /// Cluster count reported by every clustering run
    pub cluster_count: i64,
    /// Cluster sets available to LOAD_FROM_FILE before anything is saved
    pub files: HashMap<String, String>,
    /// Read requests but never answer them
    pub silent: bool,
    /// Wait this long before sending each reply
    pub reply_delay_ms: u64,
}

impl Default for MockScript {
    fn default() -> Self {
        Self {
            tables: vec!["playtennis".to_string()],
            cluster_count: 3,
            files: HashMap::new(),
            silent: false,
            reply_delay_ms: 0,
        }
    }
}

impl MockScript {
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

/// Configuration for the mock clustering server
#[derive(Debug, Clone)]
pub struct MockServerConfig {
    /// Address to bind the TCP server to (use "127.0.0.1:0" for random port)
    pub bind_address: String,
    pub script: MockScript,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:0".to_string(),
            script: MockScript::default(),
        }
    }
}

/// Every request received, in arrival order, across all clients
pub type RequestLog = Arc<Mutex<Vec<Vec<Value>>>>;

/// Mock clustering server that answers from a [`MockScript`]
pub struct MockQtServer {
    config: MockServerConfig,
    should_stop: Arc<AtomicBool>,
    files: Arc<Mutex<HashMap<String, String>>>,
    requests: RequestLog,
    next_client_id: Arc<AtomicUsize>,
    actual_port: Option<u16>,
}

impl MockQtServer {
    pub fn new(config: MockServerConfig) -> Self {
        info!("🧪 Mock clustering server configured:");
        info!("  📋 Tables: {:?}", config.script.tables);
        info!("  🎯 Cluster count: {}", config.script.cluster_count);
        info!("  🔇 Silent: {}", config.script.silent);
        info!("  ⏳ Reply delay: {} ms", config.script.reply_delay_ms);

        let files = Arc::new(Mutex::new(config.script.files.clone()));
        Self {
            config,
            should_stop: Arc::new(AtomicBool::new(false)),
            files,
            requests: Arc::new(Mutex::new(Vec::new())),
            next_client_id: Arc::new(AtomicUsize::new(1)),
            actual_port: None,
        }
    }

    /// Start accepting clients and return the actual bound port
    pub fn start(&mut self) -> Result<u16, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(&self.config.bind_address)?;
        let actual_port = listener.local_addr()?.port();
        self.actual_port = Some(actual_port);

        info!("🧪 Mock clustering server listening on 127.0.0.1:{}", actual_port);

        let should_stop = self.should_stop.clone();
        let next_client_id = self.next_client_id.clone();
        let script = self.config.script.clone();
        let files = self.files.clone();
        let requests = self.requests.clone();

        thread::spawn(move || {
            for stream in listener.incoming() {
                if should_stop.load(Ordering::Relaxed) {
                    break;
                }

                match stream {
                    Ok(stream) => {
                        let client_id = next_client_id.fetch_add(1, Ordering::Relaxed);
                        info!("📡 Client {} connected", client_id);

                        let mut session = ClientSession {
                            script: script.clone(),
                            files: files.clone(),
                            requests: requests.clone(),
                            table: None,
                            clusters: None,
                        };

                        thread::spawn(move || {
                            if let Err(e) = session.serve(stream) {
                                error!("Client {} error: {}", client_id, e);
                            }
                            info!("🔌 Client {} disconnected", client_id);
                        });
                    }
                    Err(e) => {
                        error!("Accept error: {}", e);
                    }
                }
            }
            debug!("Accept loop finished");
        });

        Ok(actual_port)
    }

    /// Start the server and keep it alive until the returned handle is dropped
    pub fn start_background(mut self) -> Result<MockServerHandle, Box<dyn std::error::Error>> {
        let port = self.start()?;
        Ok(MockServerHandle {
            port,
            requests: self.requests.clone(),
            should_stop: self.should_stop.clone(),
            _server: self,
        })
    }

    pub fn requests(&self) -> RequestLog {
        self.requests.clone()
    }

    pub fn stop(&self) {
        stop_accept_loop(&self.should_stop, self.actual_port);
    }
}

fn stop_accept_loop(should_stop: &AtomicBool, port: Option<u16>) {
    if should_stop.swap(true, Ordering::Relaxed) {
        return;
    }
    // Wake the blocking accept so the loop sees the flag
    if let Some(port) = port {
        let _ = TcpStream::connect(("127.0.0.1", port));
    }
}

/// Per-connection server state
struct ClientSession {
    script: MockScript,
    files: Arc<Mutex<HashMap<String, String>>>,
    requests: RequestLog,
    table: Option<String>,
    clusters: Option<String>,
}

impl ClientSession {
    fn serve(&mut self, stream: TcpStream) -> Result<(), ChannelError> {
        let mut connection = Connection::new(stream);

        loop {
            let opcode = match connection.receive_value() {
                Ok(Value::Int(code)) => code,
                Ok(other) => {
                    warn!("Expected opcode, received {:?}", other);
                    connection.send_values(&[Value::from("malformed request")])?;
                    return Ok(());
                }
                Err(ChannelError::Closed) => return Ok(()),
                Err(e) => return Err(e),
            };

            let opcode = match Opcode::try_from(opcode) {
                Ok(opcode) => opcode,
                Err(code) => {
                    self.record(vec![Value::Int(code)]);
                    connection.send_values(&[Value::Text(format!("unknown opcode {}", code))])?;
                    return Ok(());
                }
            };

            let argument = match opcode {
                Opcode::RunClustering => Value::Float(connection.receive_float()?),
                _ => Value::Text(connection.receive_text()?),
            };
            debug!("Mock received {} {:?}", opcode, argument);
            self.record(vec![Value::from(opcode), argument.clone()]);

            if self.script.silent {
                continue;
            }

            if self.script.reply_delay_ms > 0 {
                thread::sleep(Duration::from_millis(self.script.reply_delay_ms));
            }
            let reply = self.answer(opcode, argument);
            connection.send_values(&reply)?;
        }
    }

    fn record(&self, request: Vec<Value>) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }
    }

    fn answer(&mut self, opcode: Opcode, argument: Value) -> Vec<Value> {
        match (opcode, argument) {
            (Opcode::LoadTable, Value::Text(table)) => {
                if self.script.tables.contains(&table) {
                    self.table = Some(table);
                    self.clusters = None;
                    vec![Value::from(STATUS_OK)]
                } else {
                    vec![Value::from("table not found")]
                }
            }
            (Opcode::RunClustering, Value::Float(radius)) => {
                let Some(table) = &self.table else {
                    return vec![Value::from("no table loaded")];
                };
                if radius <= 0.0 {
                    return vec![Value::from("radius must be positive")];
                }
                let count = self.script.cluster_count;
                let description = format!("{} clusters on {} (radius {})", count, table, radius);
                self.clusters = Some(description.clone());
                vec![Value::from(STATUS_OK), Value::Int(count), Value::Text(description)]
            }
            (Opcode::SaveToFile, Value::Text(file_name)) => match &self.clusters {
                Some(clusters) => {
                    if let Ok(mut files) = self.files.lock() {
                        files.insert(file_name, clusters.clone());
                    }
                    vec![Value::from(STATUS_OK)]
                }
                None => vec![Value::from("no clusters to save")],
            },
            (Opcode::LoadFromFile, Value::Text(file_name)) => {
                let stored = self
                    .files
                    .lock()
                    .ok()
                    .and_then(|files| files.get(&file_name).cloned());
                match stored {
                    Some(clusters) => vec![Value::from(STATUS_OK), Value::Text(clusters)],
                    None => vec![Value::Text(format!("file not found: {}", file_name))],
                }
            }
            (opcode, _) => vec![Value::Text(format!("bad argument for {}", opcode))],
        }
    }
}

/// Keeps a background mock server running; stops it on drop
pub struct MockServerHandle {
    pub port: u16,
    pub requests: RequestLog,
    should_stop: Arc<AtomicBool>,
    _server: MockQtServer,
}

impl MockServerHandle {
    pub fn address(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    /// Snapshot of the requests received so far
    pub fn received(&self) -> Vec<Vec<Value>> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn stop(&self) {
        stop_accept_loop(&self.should_stop, Some(self.port));
    }
}

impl Drop for MockServerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
