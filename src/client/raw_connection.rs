//! Raw TCP connection to a single node
//!
//! Blocking connection with buffered reader/writer halves. The address that
//! was actually dialed is captured at connect time so log lines and error
//! messages can name the node a shard iterator is talking to.

use std::io::{self, BufReader, BufWriter, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use super::control_plane::{ControlPlane, ControlPlaneExt};
use crate::utils::{ConnectionError, RespDecoder, RespEncoder, RespValue};

/// Raw connection wrapper
pub struct RawConnection {
    writer: BufWriter<TcpStream>,
    reader: BufReader<TcpStream>,
    /// Address as requested (`host:port`)
    address: String,
    /// Socket address actually dialed
    peer: SocketAddr,
}

impl RawConnection {
    /// Create new TCP connection to `host:port`
    pub fn connect_tcp(address: &str, connect_timeout: Duration) -> Result<Self, ConnectionError> {
        let connect_failed = |source: io::Error| ConnectionError::ConnectFailed {
            address: address.to_string(),
            source,
        };

        let peer = address
            .to_socket_addrs()
            .map_err(connect_failed)?
            .next()
            .ok_or_else(|| {
                connect_failed(io::Error::new(
                    io::ErrorKind::NotFound,
                    "No addresses found",
                ))
            })?;

        let stream = TcpStream::connect_timeout(&peer, connect_timeout).map_err(connect_failed)?;

        stream.set_nodelay(true).ok();

        let writer = BufWriter::with_capacity(65536, stream.try_clone().map_err(connect_failed)?);
        let reader = BufReader::with_capacity(65536, stream);

        debug!("Connected to {} ({})", address, peer);

        Ok(RawConnection {
            writer,
            reader,
            address: address.to_string(),
            peer,
        })
    }

    /// Address this connection was opened for
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Socket address that was dialed
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<()> {
        self.writer.write_all(buf)?;
        self.writer.flush()
    }

    fn read_response(&mut self) -> io::Result<RespValue> {
        RespDecoder::new(&mut self.reader).decode()
    }

    /// Set read timeout
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)
    }

    /// Set write timeout
    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.writer.get_ref().set_write_timeout(timeout)
    }
}

impl ControlPlane for RawConnection {
    fn execute(&mut self, args: &[&str]) -> io::Result<RespValue> {
        let mut encoder = RespEncoder::with_capacity(64);
        encoder.encode_command_str(args);
        self.execute_encoded(&encoder)
    }

    fn execute_encoded(&mut self, encoder: &RespEncoder) -> io::Result<RespValue> {
        self.send(encoder.as_bytes())?;
        self.read_response()
    }

    fn execute_pipeline(
        &mut self,
        encoder: &RespEncoder,
        count: usize,
    ) -> io::Result<Vec<RespValue>> {
        self.send(encoder.as_bytes())?;
        let mut responses = Vec::with_capacity(count);
        for _ in 0..count {
            responses.push(self.read_response()?);
        }
        Ok(responses)
    }
}

/// Connection factory for creating connections with common config
#[derive(Debug, Clone)]
pub struct ConnectionFactory {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub auth_password: Option<String>,
    pub auth_username: Option<String>,
    pub dbnum: Option<u32>,
}

impl ConnectionFactory {
    /// Create a new connection to `host:port`
    pub fn create(&self, address: &str) -> Result<RawConnection, ConnectionError> {
        let mut conn = RawConnection::connect_tcp(address, self.connect_timeout)?;

        conn.set_read_timeout(Some(self.read_timeout)).ok();
        conn.set_write_timeout(Some(self.write_timeout)).ok();

        if let Some(ref password) = self.auth_password {
            conn.authenticate(password, self.auth_username.as_deref())
                .map_err(|e| ConnectionError::AuthFailed(e.to_string()))?;
        }

        if let Some(db) = self.dbnum {
            conn.select_db(db)
                .map_err(|e| ConnectionError::SelectFailed {
                    db,
                    reason: e.to_string(),
                })?;
        }

        Ok(conn)
    }
}
