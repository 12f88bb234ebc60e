//! TCP adapters for the host runner.
//!
//! | Type                   | Implements        | Backed by                      |
//! |------------------------|-------------------|--------------------------------|
//! | [`TcpTransport`]       | `Transport`       | non-blocking `TcpStream`       |
//! | [`TcpControlListener`] | `InboundListener` | non-blocking `TcpListener`     |
//! | [`TcpOrchestratorLink`]| `OutboundLink`    | `TcpStream::connect_timeout`   |
//!
//! Every socket is switched to non-blocking mode right after it is created;
//! `WouldBlock` is reported as "nothing right now" (0 bytes).

use std::io::{self, ErrorKind, Read, Write};
use std::net::{IpAddr, Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use log::{debug, info, warn};

use crate::app::ports::{InboundListener, OutboundLink};
use crate::error::CommsError;
use crate::http::transport::Transport;

// ───────────────────────────────────────────────────────────────
// Stream
// ───────────────────────────────────────────────────────────────

pub struct TcpTransport {
    stream: TcpStream,
    open: bool,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> io::Result<Self> {
        stream.set_nonblocking(true)?;
        stream.set_nodelay(true)?;
        Ok(Self { stream, open: true })
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.peer_addr().ok()
    }
}

impl Transport for TcpTransport {
    type Error = io::Error;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, io::Error> {
        if !self.open {
            return Ok(0);
        }
        match self.stream.read(buf) {
            Ok(0) => {
                self.open = false;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) => {
                self.open = false;
                Err(e)
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, io::Error> {
        match self.stream.write(data) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Ok(0),
            Err(e) => {
                self.open = false;
                Err(e)
            }
        }
    }

    fn flush(&mut self) -> Result<(), io::Error> {
        match self.stream.flush() {
            Err(e) if e.kind() != ErrorKind::WouldBlock => Err(e),
            _ => Ok(()),
        }
    }

    fn available(&self) -> bool {
        let mut probe = [0u8; 1];
        matches!(self.stream.peek(&mut probe), Ok(n) if n > 0)
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn close(&mut self) {
        if self.open {
            let _ = self.stream.shutdown(Shutdown::Both);
            self.open = false;
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Inbound
// ───────────────────────────────────────────────────────────────

/// Command socket on the prop's fixed port.
pub struct TcpControlListener {
    listener: TcpListener,
}

impl TcpControlListener {
    pub fn bind(port: u16) -> io::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))?;
        listener.set_nonblocking(true)?;
        info!("listening on {}", listener.local_addr()?);
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

impl InboundListener for TcpControlListener {
    type Stream = TcpTransport;

    fn accept(&mut self) -> Option<TcpTransport> {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                debug!("inbound connection from {peer}");
                match TcpTransport::new(stream) {
                    Ok(t) => Some(t),
                    Err(e) => {
                        warn!("inbound socket setup failed: {e}");
                        None
                    }
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => None,
            Err(e) => {
                warn!("accept failed: {e}");
                None
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Outbound
// ───────────────────────────────────────────────────────────────

/// Fresh TCP connection to the orchestrator per report.
///
/// The orchestrator address is looked up once, when the link is built.
/// Name lookups block, so none happen inside the tick.
pub struct TcpOrchestratorLink {
    host: String,
    addr: SocketAddr,
    local_ip: Option<IpAddr>,
}

impl TcpOrchestratorLink {
    /// Resolve `host:port` (a literal IP or a name) and build the link.
    pub fn resolve(host: impl Into<String>, port: u16) -> io::Result<Self> {
        let host = host.into();
        let addr = (host.as_str(), port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(ErrorKind::NotFound, format!("no address for {host}")))?;
        info!("orchestrator {host}:{port} is {addr}");
        Ok(Self {
            host,
            addr,
            local_ip: None,
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Interface address that routes to `target`.  No packet is sent.
    fn route_ip(target: SocketAddr) -> Option<IpAddr> {
        let bind = if target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(bind).ok()?;
        socket.connect(target).ok()?;
        socket.local_addr().ok().map(|a| a.ip())
    }
}

impl OutboundLink for TcpOrchestratorLink {
    type Stream = TcpTransport;

    fn open(&mut self, timeout_ms: u32) -> Result<TcpTransport, CommsError> {
        let addr = self.addr;
        let timeout = Duration::from_millis(u64::from(timeout_ms.max(1)));
        let stream = TcpStream::connect_timeout(&addr, timeout).map_err(|e| {
            debug!("connect {addr} failed: {e}");
            CommsError::ConnectFailed
        })?;
        if let Ok(local) = stream.local_addr() {
            self.local_ip = Some(local.ip());
        }
        TcpTransport::new(stream).map_err(|_| CommsError::ConnectFailed)
    }

    fn local_ip(&self) -> Option<IpAddr> {
        self.local_ip.or_else(|| Self::route_ip(self.addr))
    }

    /// Forget the local interface address.  The orchestrator address
    /// resolved at startup is kept.
    fn reinitialize(&mut self) {
        warn!("outbound link reset ({} at {})", self.host, self.addr);
        self.local_ip = None;
    }
}
