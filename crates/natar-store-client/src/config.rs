// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Connection parameters shared by a link and every handle spawned from it.

use crate::StoreError;
use natar_store_proto::{DEFAULT_HOST, DEFAULT_PORT};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Link configuration. Cloned into every session so all handles target the
/// same server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Store host name or address.
    pub host: String,
    /// Store TCP port.
    pub port: u16,
    /// Disable Nagle on every socket.
    pub nodelay: bool,
    /// Connect/read/write timeout for command sockets.
    pub io_timeout: Duration,
    /// Interval between liveness probes.
    pub ping_interval: Duration,
    /// Minimum spacing between reconnect attempts while the link is down.
    pub reconnect_interval: Duration,
    /// Bound of each subscription's message queue.
    pub queue_depth: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            nodelay: true,
            io_timeout: Duration::from_millis(500),
            ping_interval: Duration::from_millis(2000),
            reconnect_interval: Duration::from_millis(1000),
            queue_depth: 4,
        }
    }
}

impl LinkConfig {
    /// Config targeting `host:port` with default timings.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// `host:port` for log fields.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Open a socket to the store, trying each resolved address in turn.
    pub fn open_stream(&self) -> Result<TcpStream, StoreError> {
        let timeout = self.io_timeout.max(Duration::from_millis(1));
        let mut last_err = None;
        for addr in (self.host.as_str(), self.port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(self.nodelay)?;
                    stream.set_read_timeout(Some(timeout))?;
                    stream.set_write_timeout(Some(timeout))?;
                    return Ok(stream);
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(last_err.map_or(StoreError::LinkDown, StoreError::Io))
    }
}
