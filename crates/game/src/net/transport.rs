//! Result-returning stream and datagram sockets.
//!
//! Live handles are move-only and close on drop. A connected handle closes
//! itself after any hard send or receive error, and a stream closes when a
//! read returns zero bytes (orderly peer shutdown). Using a handle after it has
//! closed is a programming error and aborts.

use std::io::{self, Read, Write};
use std::net::{
    IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream, ToSocketAddrs,
    UdpSocket,
};
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    V4,
    V6,
    Unspecified,
}

impl AddressFamily {
    fn admits(self, addr: &SocketAddr) -> bool {
        match self {
            AddressFamily::V4 => addr.is_ipv4(),
            AddressFamily::V6 => addr.is_ipv6(),
            AddressFamily::Unspecified => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Stream,
    Datagram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockingMode {
    Blocking,
    NonBlocking,
}

impl BlockingMode {
    fn is_nonblocking(self) -> bool {
        self == BlockingMode::NonBlocking
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub addr: SocketAddr,
    pub protocol: Protocol,
}

impl Endpoint {
    pub fn new(addr: SocketAddr, protocol: Protocol) -> Self {
        Self { addr, protocol }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("address resolution produced no endpoints")]
    NoEndpoints,
    #[error("endpoint is {found:?}, expected {expected:?}")]
    WrongProtocol { expected: Protocol, found: Protocol },
    #[error("datagram socket has no fixed peer")]
    NotConnected,
    #[error("connect attempt was abandoned")]
    Abandoned,
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Conditions a poll loop filters out and retries later.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::WouldBlock
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        }
    }
}

/// Resolves the well-known local endpoints for `port`.
///
/// With `loopback_only` the result holds the loopback address of each admitted
/// family; otherwise it holds the wildcard address, suitable for binding.
pub fn resolve(
    family: AddressFamily,
    protocol: Protocol,
    port: u16,
    loopback_only: bool,
) -> Result<Vec<Endpoint>, TransportError> {
    let candidates: [IpAddr; 2] = if loopback_only {
        [Ipv4Addr::LOCALHOST.into(), Ipv6Addr::LOCALHOST.into()]
    } else {
        [Ipv4Addr::UNSPECIFIED.into(), Ipv6Addr::UNSPECIFIED.into()]
    };

    collect_endpoints(
        candidates.into_iter().map(|ip| SocketAddr::new(ip, port)),
        family,
        protocol,
    )
}

/// Resolves a host name through the system resolver.
pub fn resolve_host(
    host: &str,
    port: u16,
    family: AddressFamily,
    protocol: Protocol,
) -> Result<Vec<Endpoint>, TransportError> {
    let addrs = (host, port).to_socket_addrs()?;
    collect_endpoints(addrs, family, protocol)
}

fn collect_endpoints(
    addrs: impl Iterator<Item = SocketAddr>,
    family: AddressFamily,
    protocol: Protocol,
) -> Result<Vec<Endpoint>, TransportError> {
    let endpoints: Vec<Endpoint> = addrs
        .filter(|addr| family.admits(addr))
        .map(|addr| Endpoint::new(addr, protocol))
        .collect();

    if endpoints.is_empty() {
        return Err(TransportError::NoEndpoints);
    }

    Ok(endpoints)
}

fn expect_protocol(endpoint: &Endpoint, expected: Protocol) -> Result<(), TransportError> {
    if endpoint.protocol != expected {
        return Err(TransportError::WrongProtocol {
            expected,
            found: endpoint.protocol,
        });
    }
    Ok(())
}

pub struct StreamListener {
    listener: TcpListener,
    mode: BlockingMode,
}

pub fn listen(endpoint: &Endpoint, mode: BlockingMode) -> Result<StreamListener, TransportError> {
    expect_protocol(endpoint, Protocol::Stream)?;

    let listener = TcpListener::bind(endpoint.addr)?;
    listener.set_nonblocking(mode.is_nonblocking())?;

    Ok(StreamListener { listener, mode })
}

impl StreamListener {
    /// Accepts one pending connection. With no connection pending on a
    /// non-blocking listener this is a transient error.
    pub fn accept(&self) -> Result<StreamConnection, TransportError> {
        let (stream, peer_addr) = self.listener.accept()?;
        stream.set_nonblocking(self.mode.is_nonblocking())?;
        Ok(StreamConnection::new(stream, peer_addr))
    }

    /// [`accept`](Self::accept) with transient conditions folded into `None`.
    pub fn poll_accept(&self) -> Result<Option<StreamConnection>, TransportError> {
        match self.accept() {
            Ok(connection) => Ok(Some(connection)),
            Err(e) if e.is_transient() => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TransportError> {
        Ok(self.listener.local_addr()?)
    }
}

/// An outgoing stream connection that has not been established yet.
///
/// The connect runs off the caller's thread, so [`check`](Self::check) never
/// blocks. Dropping the connector abandons the attempt.
pub struct StreamConnector {
    endpoint: Endpoint,
    mode: BlockingMode,
    pending: Option<Receiver<io::Result<TcpStream>>>,
    started: Instant,
}

pub fn connect_stream(
    endpoint: &Endpoint,
    mode: BlockingMode,
) -> Result<StreamConnector, TransportError> {
    expect_protocol(endpoint, Protocol::Stream)?;

    let (tx, rx) = mpsc::channel();
    let addr = endpoint.addr;
    thread::Builder::new()
        .name(format!("connect-{addr}"))
        .spawn(move || {
            let _ = tx.send(TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT));
        })?;

    Ok(StreamConnector {
        endpoint: *endpoint,
        mode,
        pending: Some(rx),
        started: Instant::now(),
    })
}

impl StreamConnector {
    /// `Ok(None)` while the attempt is in progress. A failed attempt is
    /// reported once; afterwards the connector is inactive and keeps
    /// returning `Ok(None)`.
    pub fn check(&mut self) -> Result<Option<StreamConnection>, TransportError> {
        let Some(rx) = &self.pending else {
            return Ok(None);
        };

        match rx.try_recv() {
            Ok(Ok(stream)) => {
                self.pending = None;
                stream.set_nonblocking(self.mode.is_nonblocking())?;
                let peer_addr = stream.peer_addr()?;
                Ok(Some(StreamConnection::new(stream, peer_addr)))
            }
            Ok(Err(e)) => {
                self.pending = None;
                Err(e.into())
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => {
                self.pending = None;
                Err(TransportError::Abandoned)
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.pending.is_some()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

pub struct StreamConnection {
    stream: Option<TcpStream>,
    peer_addr: SocketAddr,
}

impl StreamConnection {
    fn new(stream: TcpStream, peer_addr: SocketAddr) -> Self {
        Self {
            stream: Some(stream),
            peer_addr,
        }
    }

    fn open_stream(&mut self) -> &mut TcpStream {
        match self.stream.as_mut() {
            Some(stream) => stream,
            None => panic!("operation on closed stream connection to {}", self.peer_addr),
        }
    }

    pub fn send(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        match self.open_stream().write(bytes) {
            Ok(sent) => Ok(sent),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Reads into `buf`. `Ok(0)` means the peer shut down and the connection
    /// is now closed.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        match self.open_stream().read(buf) {
            Ok(0) if !buf.is_empty() => {
                log::debug!("stream {} closed by peer", self.peer_addr);
                self.close();
                Ok(0)
            }
            Ok(received) => Ok(received),
            Err(e) => Err(self.fail(e)),
        }
    }

    fn fail(&mut self, e: io::Error) -> TransportError {
        let error = TransportError::from(e);
        if !error.is_transient() {
            log::debug!("closing stream {}: {}", self.peer_addr, error);
            self.close();
        }
        error
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

impl Drop for StreamConnection {
    fn drop(&mut self) {
        self.close();
    }
}

pub struct DatagramSocket {
    socket: Option<UdpSocket>,
    local_addr: SocketAddr,
    peer: Option<SocketAddr>,
}

pub fn bind_datagram(endpoint: &Endpoint, mode: BlockingMode) -> Result<DatagramSocket, TransportError> {
    expect_protocol(endpoint, Protocol::Datagram)?;

    let socket = UdpSocket::bind(endpoint.addr)?;
    socket.set_nonblocking(mode.is_nonblocking())?;
    let local_addr = socket.local_addr()?;

    Ok(DatagramSocket {
        socket: Some(socket),
        local_addr,
        peer: None,
    })
}

/// Binds `local` and fixes `remote` as the only peer for
/// [`send`](DatagramSocket::send) and [`receive`](DatagramSocket::receive).
pub fn connect_datagram(
    local: &Endpoint,
    remote: &Endpoint,
    mode: BlockingMode,
) -> Result<DatagramSocket, TransportError> {
    expect_protocol(remote, Protocol::Datagram)?;

    let mut socket = bind_datagram(local, mode)?;
    socket.inner().connect(remote.addr)?;
    socket.peer = Some(remote.addr);
    Ok(socket)
}

impl DatagramSocket {
    fn inner(&mut self) -> &UdpSocket {
        match self.socket.as_ref() {
            Some(socket) => socket,
            None => panic!("operation on closed datagram socket {}", self.local_addr),
        }
    }

    pub fn send(&mut self, bytes: &[u8]) -> Result<usize, TransportError> {
        if self.peer.is_none() {
            return Err(TransportError::NotConnected);
        }
        match self.inner().send(bytes) {
            Ok(sent) => Ok(sent),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Unlike streams, a zero-length datagram is a valid message.
    pub fn receive(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        if self.peer.is_none() {
            return Err(TransportError::NotConnected);
        }
        match self.inner().recv(buf) {
            Ok(received) => Ok(received),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Per-destination send on an unconnected socket. Errors are reported
    /// without closing, since they concern a single destination.
    pub fn send_to(&mut self, bytes: &[u8], addr: SocketAddr) -> Result<usize, TransportError> {
        Ok(self.inner().send_to(bytes, addr)?)
    }

    pub fn receive_from(&mut self, buf: &mut [u8]) -> Result<(usize, SocketAddr), TransportError> {
        Ok(self.inner().recv_from(buf)?)
    }

    fn fail(&mut self, e: io::Error) -> TransportError {
        let error = TransportError::from(e);
        if !error.is_transient() {
            log::debug!("closing datagram socket {}: {}", self.local_addr, error);
            self.close();
        }
        error
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn is_open(&self) -> bool {
        self.socket.is_some()
    }

    pub fn close(&mut self) {
        self.socket = None;
    }
}
