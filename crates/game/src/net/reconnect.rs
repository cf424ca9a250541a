use std::time::{Duration, Instant};

use super::transport::{connect_stream, BlockingMode, Endpoint, StreamConnection, StreamConnector};

pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Keeps a stream connect attempt alive until it succeeds.
///
/// At most one attempt is outstanding. A pending attempt is polled until it
/// resolves; once it fails, a fresh one starts when `retry_interval` has
/// passed since the previous start.
pub struct Reconnector {
    endpoint: Endpoint,
    mode: BlockingMode,
    retry_interval: Duration,
    connector: Option<StreamConnector>,
    attempt_started: Instant,
    attempts: u32,
}

impl Reconnector {
    pub fn new(endpoint: Endpoint, mode: BlockingMode, retry_interval: Duration) -> Self {
        let now = Instant::now();
        let mut reconnector = Self {
            endpoint,
            mode,
            retry_interval,
            connector: None,
            attempt_started: now,
            attempts: 0,
        };
        reconnector.start_attempt(now);
        reconnector
    }

    fn start_attempt(&mut self, now: Instant) {
        self.attempts += 1;
        self.attempt_started = now;
        self.connector = match connect_stream(&self.endpoint, self.mode) {
            Ok(connector) => Some(connector),
            Err(e) => {
                log::warn!("connect attempt {} to {} failed: {}", self.attempts, self.endpoint.addr, e);
                None
            }
        };
    }

    /// Returns the open connection once an attempt succeeds.
    pub fn poll(&mut self, now: Instant) -> Option<StreamConnection> {
        if let Some(connector) = self.connector.as_mut() {
            match connector.check() {
                Ok(Some(connection)) => {
                    log::info!("connected to {} after {} attempt(s)", self.endpoint.addr, self.attempts);
                    self.connector = None;
                    return Some(connection);
                }
                Ok(None) if connector.is_active() => return None,
                Ok(None) => self.connector = None,
                Err(e) => {
                    log::debug!("connect attempt {} failed: {}", self.attempts, e);
                    self.connector = None;
                }
            }
        }

        if now.saturating_duration_since(self.attempt_started) >= self.retry_interval {
            log::debug!("retrying connection to {}", self.endpoint.addr);
            self.start_attempt(now);
        }

        None
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_attempt_pending(&self) -> bool {
        self.connector.as_ref().is_some_and(StreamConnector::is_active)
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddr, TcpListener};
    use std::thread;

    use super::*;
    use crate::net::transport::Protocol;

    #[test]
    fn test_reconnector_opens_connection() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let addr = listener.local_addr().unwrap();
        let endpoint = Endpoint::new(addr, Protocol::Stream);

        let mut reconnector =
            Reconnector::new(endpoint, BlockingMode::NonBlocking, Duration::from_millis(200));

        let start = Instant::now();
        let connection = loop {
            if let Some(connection) = reconnector.poll(Instant::now()) {
                break connection;
            }
            assert!(start.elapsed() < Duration::from_secs(5), "never connected");
            thread::sleep(Duration::from_millis(1));
        };

        assert!(connection.is_open());
        assert_eq!(connection.peer_addr(), addr);
    }

    #[test]
    fn test_reconnector_retries_after_interval() {
        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        drop(listener);

        let endpoint = Endpoint::new(addr, Protocol::Stream);
        let mut reconnector =
            Reconnector::new(endpoint, BlockingMode::NonBlocking, Duration::from_millis(20));
        assert_eq!(reconnector.attempts(), 1);

        let start = Instant::now();
        while reconnector.attempts() < 2 {
            assert!(reconnector.poll(Instant::now()).is_none());
            assert!(start.elapsed() < Duration::from_secs(5), "never retried");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_pending_attempt_is_not_replaced() {
        // Non-routable address: the connect hangs until its own timeout.
        let endpoint = Endpoint::new(SocketAddr::from(([10, 255, 255, 1], 9)), Protocol::Stream);
        let mut reconnector =
            Reconnector::new(endpoint, BlockingMode::NonBlocking, Duration::from_millis(10));

        let later = Instant::now() + Duration::from_millis(50);
        for _ in 0..5 {
            assert!(reconnector.poll(later).is_none());
            if !reconnector.is_attempt_pending() {
                // The network rejected the address outright; nothing to observe.
                return;
            }
            assert_eq!(reconnector.attempts(), 1);
        }
    }
}
