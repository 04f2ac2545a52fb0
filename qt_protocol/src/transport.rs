use crate::error::ConnectionError;
use log::{debug, info, warn};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Socket deadlines for a connection
///
/// `None` blocks indefinitely. The default never times out a read, so a
/// stalled server blocks the client until it closes the connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportConfig {
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
}

/// Exclusive TCP channel to one clustering server, shut down on drop
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpTransport {
    pub fn connect(
        host: &str,
        port: u16,
        config: &TransportConfig,
    ) -> Result<Self, ConnectionError> {
        let address = format!("{}:{}", host, port);
        info!("📡 Connecting to clustering server at {}", address);

        let candidates: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|source| ConnectionError::Resolve {
                address: address.clone(),
                source,
            })?
            .collect();

        let mut last_error = None;
        for candidate in candidates {
            let attempt = match config.connect_timeout {
                Some(timeout) => TcpStream::connect_timeout(&candidate, timeout),
                None => TcpStream::connect(candidate),
            };
            match attempt {
                Ok(stream) => {
                    let transport = Self::from_stream(stream, candidate, config).map_err(
                        |source| ConnectionError::Connect {
                            address: address.clone(),
                            source,
                        },
                    )?;
                    info!("✅ Connected to clustering server at {}", candidate);
                    return Ok(transport);
                }
                Err(e) => {
                    debug!("Connection attempt to {} failed: {}", candidate, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(source) => Err(ConnectionError::Connect { address, source }),
            None => Err(ConnectionError::NoAddress(address)),
        }
    }

    fn from_stream(
        stream: TcpStream,
        peer: SocketAddr,
        config: &TransportConfig,
    ) -> io::Result<Self> {
        stream.set_read_timeout(config.read_timeout)?;
        stream.set_write_timeout(config.write_timeout)?;
        stream.set_nodelay(true)?;
        Ok(TcpTransport { stream, peer })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Read for TcpTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for TcpTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => debug!("🔌 Closed connection to {}", self.peer),
            Err(e) if e.kind() == io::ErrorKind::NotConnected => {}
            Err(e) => warn!("⚠️ Error closing connection to {}: {}", self.peer, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_connect_applies_timeouts() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let config = TransportConfig {
            connect_timeout: Some(Duration::from_secs(2)),
            read_timeout: Some(Duration::from_millis(250)),
            write_timeout: None,
        };
        let transport = TcpTransport::connect("127.0.0.1", port, &config).unwrap();

        assert_eq!(transport.peer().port(), port);
        assert_eq!(
            transport.stream.read_timeout().unwrap(),
            Some(Duration::from_millis(250))
        );
        assert_eq!(transport.stream.write_timeout().unwrap(), None);
    }

    #[test]
    fn test_connect_refused() {
        // Bind then drop to get a port with nothing listening
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let result = TcpTransport::connect("127.0.0.1", port, &TransportConfig::default());
        assert!(matches!(result, Err(ConnectionError::Connect { .. })));
    }

    #[test]
    fn test_drop_closes_connection() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let transport =
            TcpTransport::connect("127.0.0.1", port, &TransportConfig::default()).unwrap();
        let (mut server_side, _) = listener.accept().unwrap();
        drop(transport);

        let mut buf = [0u8; 1];
        assert_eq!(server_side.read(&mut buf).unwrap(), 0);
    }
}
