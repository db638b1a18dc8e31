use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::device::DeviceError;

const READ_BUFFER: usize = 4096;

/// Line-oriented request/response client for a rotctld/rigctld style daemon.
#[derive(Debug)]
pub struct ProtocolClient {
    stream: TcpStream,
    peer: String,
}

impl ProtocolClient {
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self, DeviceError> {
        let peer = format!("{}:{}", host, port);
        let unreachable = |reason: String| DeviceError::Connection {
            addr: peer.clone(),
            reason,
        };

        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|e| unreachable(e.to_string()))?;

        let mut last_error = None;
        for addr in addrs {
            log::debug!("Opening socket to {}", addr);
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    let _ = stream.set_nodelay(true);
                    return Ok(Self { stream, peer });
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(unreachable(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no addresses resolved".to_string()),
        ))
    }

    /// Send one command and return whatever the daemon answered in a single
    /// read, split into trimmed lines.
    pub fn send(&mut self, cmd: &str) -> Result<Vec<String>, DeviceError> {
        self.write_command(cmd)?;
        let mut lines = Vec::new();
        self.read_into(&mut lines)?;
        Ok(lines)
    }

    /// Like [`send`](Self::send) but keeps reading until at least
    /// `min_lines` lines have arrived. A `RPRT` status line ends the reply
    /// early and is reported as a protocol error.
    pub fn query(&mut self, cmd: &str, min_lines: usize) -> Result<Vec<String>, DeviceError> {
        self.write_command(cmd)?;
        let mut lines = Vec::new();
        while lines.len() < min_lines {
            self.read_into(&mut lines)?;
            if lines.iter().any(|l| l.starts_with("RPRT")) {
                return Err(DeviceError::Protocol {
                    command: cmd.to_string(),
                    response: lines,
                });
            }
        }
        Ok(lines)
    }

    pub fn close(&mut self) {
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => log::debug!("Closed socket to {}", self.peer),
            Err(e) if e.kind() == ErrorKind::NotConnected => {}
            Err(e) => log::debug!("Closing socket to {}: {}", self.peer, e),
        }
    }

    fn write_command(&mut self, cmd: &str) -> Result<(), DeviceError> {
        log::debug!("Sending '{}' to {}", cmd, self.peer);
        let line = format!("{}\n", cmd);
        self.stream
            .write_all(line.as_bytes())
            .map_err(|source| self.io_error(source))
    }

    fn read_into(&mut self, lines: &mut Vec<String>) -> Result<(), DeviceError> {
        let mut buf = [0u8; READ_BUFFER];
        let n = self
            .stream
            .read(&mut buf)
            .map_err(|source| self.io_error(source))?;
        if n == 0 {
            return Err(DeviceError::Closed {
                peer: self.peer.clone(),
            });
        }
        lines.extend(
            String::from_utf8_lossy(&buf[..n])
                .lines()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty()),
        );
        Ok(())
    }

    fn io_error(&self, source: std::io::Error) -> DeviceError {
        DeviceError::Io {
            peer: self.peer.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::testing::FakeDaemon;
    use crate::device::free_local_port;

    const TIMEOUT: Duration = Duration::from_secs(3);

    #[test]
    fn send_appends_newline_and_splits_reply() {
        let daemon = FakeDaemon::start(12.4, 45.6);
        let mut client = ProtocolClient::connect("127.0.0.1", daemon.port(), TIMEOUT).unwrap();

        let reply = client.query("p", 2).unwrap();
        assert_eq!(reply, vec!["12.4".to_string(), "45.6".to_string()]);

        let reply = client.send("F 145800000").unwrap();
        assert_eq!(reply, vec!["RPRT 0".to_string()]);

        client.close();
        assert_eq!(daemon.finish(), vec!["p", "F 145800000"]);
    }

    #[test]
    fn status_line_ends_a_query_with_an_error() {
        let daemon = FakeDaemon::failing(-5);
        let mut client = ProtocolClient::connect("127.0.0.1", daemon.port(), TIMEOUT).unwrap();

        match client.query("p", 2).unwrap_err() {
            DeviceError::Protocol { command, response } => {
                assert_eq!(command, "p");
                assert_eq!(response, vec!["RPRT -5".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        client.close();
        assert_eq!(daemon.finish(), vec!["p"]);
    }

    #[test]
    fn refused_connection_is_a_connection_error() {
        let port = free_local_port().unwrap();
        let err = ProtocolClient::connect("127.0.0.1", port, TIMEOUT).unwrap_err();
        match err {
            DeviceError::Connection { addr, .. } => assert_eq!(addr, format!("127.0.0.1:{port}")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn close_twice_is_harmless() {
        let daemon = FakeDaemon::start(0.0, 0.0);
        let mut client = ProtocolClient::connect("127.0.0.1", daemon.port(), TIMEOUT).unwrap();
        client.close();
        client.close();
        assert!(daemon.finish().is_empty());
    }
}
