//! Plain blocking TCP transport (unix).
//!
//! The readiness primitive is `poll(2)` on the socket. Poll failures and
//! socket errors are not returned in-band: they are reported through
//! [`fault::report`] and the primitive returns "nothing ready", which
//! [`Transport::select`](super::Transport::select) turns into an `IoWait`
//! error.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::os::fd::AsRawFd;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use rustix::event::{PollFd, PollFlags, Timespec};
use rustix::io::Errno;

use super::{NativeHandle, RawTransport};
use crate::config::{Endpoint, TransportConfig};
use crate::error::{Result, TransportError};
use crate::fault;

/// Blocking TCP socket transport.
#[derive(Debug)]
pub struct TcpTransport {
    endpoint: Endpoint,
    connection_timeout: Option<Duration>,
    read_write_timeout: Option<Duration>,
    keepalive: bool,
    stream: Option<TcpStream>,
}

impl TcpTransport {
    /// Create an unconnected transport for the configured endpoint.
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            endpoint: config.endpoint(),
            connection_timeout: config.connection_timeout(),
            read_write_timeout: config.read_write_timeout(),
            keepalive: config.keepalive,
            stream: None,
        }
    }

    /// Remote endpoint.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Whether a socket is open.
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn stream(&mut self) -> Result<&mut TcpStream> {
        self.stream.as_mut().ok_or(TransportError::NotConnected)
    }

    fn open(&self) -> Result<TcpStream> {
        let addrs = (self.endpoint.host.as_str(), self.endpoint.port).to_socket_addrs()?;

        let mut last_err = None;
        for addr in addrs {
            let attempt = match self.connection_timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => return Ok(stream),
                Err(e) => {
                    tracing::debug!(%addr, "Connect attempt failed: {}", e);
                    last_err = Some(e);
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| {
                std::io::Error::new(
                    ErrorKind::NotFound,
                    format!("{} resolved to no addresses", self.endpoint),
                )
            })
            .into())
    }
}

impl RawTransport for TcpTransport {
    fn connect(&mut self) -> Result<()> {
        let stream = self.open()?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(self.read_write_timeout)?;
        stream.set_write_timeout(self.read_write_timeout)?;
        if self.keepalive {
            rustix::net::sockopt::set_socket_keepalive(&stream, true)
                .map_err(std::io::Error::from)?;
        }

        tracing::debug!(endpoint = %self.endpoint, keepalive = self.keepalive, "TCP connected");
        self.stream = Some(stream);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            match stream.shutdown(Shutdown::Both) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotConnected => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn read(&mut self, len: usize) -> Result<Bytes> {
        let mut buf = BytesMut::zeroed(len);
        match self.stream()?.read_exact(&mut buf) {
            Ok(()) => Ok(buf.freeze()),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(TransportError::ConnectionClosed),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.stream()?.write_all(data)?;
        Ok(data.len())
    }

    fn socket(&self) -> Option<NativeHandle> {
        self.stream.as_ref().map(|s| s.as_raw_fd())
    }

    fn do_select(&mut self, timeout: Option<Duration>) -> Result<Option<usize>> {
        let stream = self.stream()?;
        let timespec = timeout.map(|d| Timespec {
            tv_sec: d.as_secs() as _,
            tv_nsec: d.subsec_nanos() as _,
        });

        let mut fds = [PollFd::new(&*stream, PollFlags::IN)];
        match rustix::event::poll(&mut fds, timespec.as_ref()) {
            Ok(0) => Ok(None),
            Ok(ready) => {
                if fds[0].revents().intersects(PollFlags::ERR | PollFlags::NVAL) {
                    report_socket_error(stream);
                    return Ok(None);
                }
                Ok(Some(ready))
            }
            Err(Errno::INTR) => Ok(None),
            Err(errno) => {
                fault::report(errno.raw_os_error(), errno.to_string());
                Ok(None)
            }
        }
    }
}

fn report_socket_error(stream: &TcpStream) {
    match rustix::net::sockopt::socket_error(stream) {
        Ok(Err(errno)) => fault::report(errno.raw_os_error(), errno.to_string()),
        Ok(Ok(())) => fault::report(0, "Socket error"),
        Err(errno) => fault::report(errno.raw_os_error(), errno.to_string()),
    }
}
