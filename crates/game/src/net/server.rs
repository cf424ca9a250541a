use std::net::SocketAddr;
use std::time::Instant;

use super::host::{ChannelError, Host, HostConfig, PeerEvent};
use super::peer::{PeerId, PeerState};
use crate::event::{Delivery, GameEvent};

/// A decoded message from one peer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Incoming {
    pub peer: PeerId,
    pub event: GameEvent,
}

/// Where replication and the tick loop put their outgoing events.
pub trait EventSink {
    fn send_with(&mut self, peer: PeerId, event: &GameEvent, delivery: Delivery);

    fn broadcast_with(&mut self, event: &GameEvent, delivery: Delivery);

    /// Drops a peer on the spot, without a local disconnect event.
    fn disconnect_now(&mut self, peer: PeerId);

    fn send(&mut self, peer: PeerId, event: &GameEvent) {
        self.send_with(peer, event, event.delivery());
    }

    fn broadcast(&mut self, event: &GameEvent) {
        self.broadcast_with(event, event.delivery());
    }
}

/// The server's connection to its peers as the game phases see it.
pub trait ServerLink: EventSink {
    /// Non-blocking; called once per frame.
    fn poll(&mut self) -> Result<(Vec<PeerEvent>, Vec<Incoming>), ChannelError>;

    fn connected_peer_count(&self) -> usize;

    /// Tells every connected peer the session is over. Reliable messages
    /// already sent still reach them.
    fn disconnect_all(&mut self);
}

/// Server side of the game protocol on top of a [`Host`].
pub struct NetServer {
    host: Host,
}

impl NetServer {
    pub fn bind(config: HostConfig) -> Result<Self, ChannelError> {
        Ok(Self {
            host: Host::server(config)?,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.host.local_addr()
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut Host {
        &mut self.host
    }

    pub fn connected_peer_count(&self) -> usize {
        self.host.connected_peer_count()
    }

    /// Non-blocking. Malformed messages are logged and dropped; the peer that
    /// sent them stays connected.
    pub fn poll(&mut self) -> Result<(Vec<PeerEvent>, Vec<Incoming>), ChannelError> {
        let (events, received) = self.host.poll()?;

        let messages = received
            .into_iter()
            .filter_map(|msg| match GameEvent::from_bytes(&msg.data) {
                Ok(event) => Some(Incoming {
                    peer: msg.peer,
                    event,
                }),
                Err(e) => {
                    log::warn!("dropping message from {}: {}", msg.peer, e);
                    None
                }
            })
            .collect();

        Ok((events, messages))
    }
}

impl ServerLink for NetServer {
    fn poll(&mut self) -> Result<(Vec<PeerEvent>, Vec<Incoming>), ChannelError> {
        NetServer::poll(self)
    }

    fn connected_peer_count(&self) -> usize {
        self.host.connected_peer_count()
    }

    fn disconnect_all(&mut self) {
        let peers: Vec<PeerId> = self.host.connected_peers().collect();
        for peer in peers {
            self.host.disconnect_later(peer);
        }
    }
}

impl EventSink for NetServer {
    fn send_with(&mut self, peer: PeerId, event: &GameEvent, delivery: Delivery) {
        log::debug!("-> {} {:?}", peer, event);
        if let Err(e) = self
            .host
            .send(peer, delivery.channel, &event.to_bytes(), delivery.flags)
        {
            log::warn!("failed to send to {}: {}", peer, e);
        }
    }

    fn broadcast_with(&mut self, event: &GameEvent, delivery: Delivery) {
        if !event.is_snapshot() {
            log::debug!("-> all {:?}", event);
        }
        if let Err(e) = self
            .host
            .broadcast(delivery.channel, &event.to_bytes(), delivery.flags)
        {
            log::warn!("broadcast failed: {}", e);
        }
    }

    fn disconnect_now(&mut self, peer: PeerId) {
        self.host.disconnect_now(peer);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClientEvent {
    Connected,
    Disconnected,
    Event(GameEvent),
}

/// Client side of the game protocol. Keeps trying to reach the server until
/// it accepts, including after a refusal.
pub struct NetClient {
    host: Host,
    server_addr: SocketAddr,
    server: PeerId,
    retry_at: Option<Instant>,
}

impl NetClient {
    pub fn connect(config: HostConfig, server_addr: SocketAddr) -> Result<Self, ChannelError> {
        let (host, server) = Host::client(config, server_addr)?;
        Ok(Self {
            host,
            server_addr,
            server,
            retry_at: None,
        })
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.server_addr
    }

    pub fn is_connected(&self) -> bool {
        self.host.peer_state(self.server) == Some(PeerState::Connected)
    }

    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn poll(&mut self) -> Result<Vec<ClientEvent>, ChannelError> {
        let now = Instant::now();
        if self.retry_at.is_some_and(|at| now >= at) {
            self.retry_at = None;
            self.server = self.host.connect(self.server_addr);
        }

        let (peer_events, received) = self.host.poll()?;
        let mut out = Vec::new();

        for event in peer_events {
            if event.peer() != self.server {
                continue;
            }
            match event {
                PeerEvent::Connect(_) => out.push(ClientEvent::Connected),
                PeerEvent::Disconnect(_) => {
                    log::info!("lost {}, retrying", self.server_addr);
                    self.retry_at = Some(now + self.host.config().connect_retry);
                    out.push(ClientEvent::Disconnected);
                }
            }
        }

        for msg in received.into_iter().filter(|m| m.peer == self.server) {
            match GameEvent::from_bytes(&msg.data) {
                Ok(event) => out.push(ClientEvent::Event(event)),
                Err(e) => log::warn!("dropping message from server: {}", e),
            }
        }

        Ok(out)
    }

    pub fn send(&mut self, event: &GameEvent) -> Result<(), ChannelError> {
        let delivery = event.delivery();
        self.host
            .send(self.server, delivery.channel, &event.to_bytes(), delivery.flags)
    }

    pub fn disconnect(&mut self) {
        self.host.disconnect_now(self.server);
    }
}
