use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::peer::{Peer, PeerId, PeerState};
use super::protocol::{
    MessageFrame, Packet, PacketError, PacketFlags, PacketKind, DEFAULT_CHANNEL_COUNT,
    MAX_PACKET_SIZE, MAX_PAYLOAD_SIZE,
};
use super::simulator::{LinkSimulation, LinkSimulator};
use super::stats::NetworkStats;
use super::transport::{bind_datagram, BlockingMode, DatagramSocket, Endpoint, Protocol, TransportError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    pub bind: SocketAddr,
    pub max_peers: usize,
    pub channel_count: u8,
    pub accept_incoming: bool,
    pub connect_retry: Duration,
    pub ping_interval: Duration,
    pub peer_timeout: Duration,
    pub min_resend: Duration,
    /// How long a gracefully disconnected peer may keep retransmitting.
    pub disconnect_linger: Duration,
    pub link: LinkSimulation,
    pub link_seed: u64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::UNSPECIFIED, super::protocol::DEFAULT_PORT)),
            max_peers: 8,
            channel_count: DEFAULT_CHANNEL_COUNT,
            accept_incoming: true,
            connect_retry: Duration::from_secs(2),
            ping_interval: Duration::from_millis(500),
            peer_timeout: Duration::from_secs(10),
            min_resend: Duration::from_millis(50),
            disconnect_linger: Duration::from_secs(2),
            link: LinkSimulation::default(),
            link_seed: 0,
        }
    }
}

impl HostConfig {
    pub fn server(bind: SocketAddr, max_peers: usize) -> Self {
        Self {
            bind,
            max_peers,
            ..Default::default()
        }
    }

    /// An ephemeral, outgoing-only host able to reach `server`.
    pub fn client_for(server: SocketAddr) -> Self {
        let bind = if server.is_ipv6() {
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
        } else {
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
        };
        Self {
            bind,
            max_peers: 1,
            accept_incoming: false,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerEvent {
    Connect(PeerId),
    Disconnect(PeerId),
}

impl PeerEvent {
    pub fn peer(&self) -> PeerId {
        match *self {
            PeerEvent::Connect(peer) | PeerEvent::Disconnect(peer) => peer,
        }
    }
}

/// An application message delivered by a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Received {
    pub peer: PeerId,
    pub channel: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("no such peer {0}")]
    UnknownPeer(PeerId),
    #[error("{0} is not connected yet")]
    NotConnected(PeerId),
    #[error("channel {channel} out of range, host has {count}")]
    InvalidChannel { channel: u8, count: u8 },
    #[error(transparent)]
    Packet(#[from] PacketError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// One endpoint of the reliable-datagram layer, holding any number of peers
/// up to its capacity.
///
/// Nothing happens on the wire between calls: [`service`](Self::service)
/// drains the socket, retransmits, keeps peers alive and times them out.
pub struct Host {
    socket: DatagramSocket,
    config: HostConfig,
    peers: HashMap<PeerId, Peer>,
    peers_by_addr: HashMap<SocketAddr, PeerId>,
    next_peer_id: u32,
    events: VecDeque<PeerEvent>,
    received: Vec<Received>,
    stats: NetworkStats,
    link: Option<LinkSimulator>,
    recv_buffer: [u8; MAX_PACKET_SIZE],
}

impl Host {
    pub fn bind(config: HostConfig) -> Result<Self, ChannelError> {
        let endpoint = Endpoint::new(config.bind, Protocol::Datagram);
        let socket = bind_datagram(&endpoint, BlockingMode::NonBlocking)?;
        let link = config
            .link
            .enabled
            .then(|| LinkSimulator::new(config.link.clone(), config.link_seed));

        log::debug!("host bound to {}", socket.local_addr());

        Ok(Self {
            socket,
            config,
            peers: HashMap::new(),
            peers_by_addr: HashMap::new(),
            next_peer_id: 1,
            events: VecDeque::new(),
            received: Vec::new(),
            stats: NetworkStats::default(),
            link,
            recv_buffer: [0u8; MAX_PACKET_SIZE],
        })
    }

    pub fn server(config: HostConfig) -> Result<Self, ChannelError> {
        Self::bind(config)
    }

    /// Binds an outgoing host and starts connecting it to `server`.
    pub fn client(config: HostConfig, server: SocketAddr) -> Result<(Self, PeerId), ChannelError> {
        let mut host = Self::bind(config)?;
        let peer = host.connect(server);
        Ok((host, peer))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr()
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn set_link_simulation(&mut self, simulation: LinkSimulation) {
        if !simulation.enabled {
            self.link = None;
        } else if let Some(link) = self.link.as_mut() {
            link.set_config(simulation.clone());
        } else {
            self.link = Some(LinkSimulator::new(simulation.clone(), self.config.link_seed));
        }
        self.config.link = simulation;
    }

    /// Starts connecting to `addr`. The peer surfaces as a connect event once
    /// the remote accepts; until then the attempt is repeated every
    /// `connect_retry`.
    pub fn connect(&mut self, addr: SocketAddr) -> PeerId {
        if let Some(&id) = self.peers_by_addr.get(&addr) {
            return id;
        }

        let id = self.insert_peer(addr, PeerState::Connecting, Instant::now());
        log::info!("connecting to {} as {}", addr, id);
        id
    }

    pub fn peer_state(&self, peer: PeerId) -> Option<PeerState> {
        self.peers.get(&peer).map(|p| p.state)
    }

    pub fn peer_addr(&self, peer: PeerId) -> Option<SocketAddr> {
        self.peers.get(&peer).map(|p| p.addr)
    }

    pub fn peer_rtt_ms(&self, peer: PeerId) -> Option<f32> {
        self.peers.get(&peer).map(|p| p.rtt().srtt_ms())
    }

    pub fn connected_peers(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.peers
            .values()
            .filter(|p| p.state == PeerState::Connected)
            .map(|p| p.id)
    }

    pub fn connected_peer_count(&self) -> usize {
        self.connected_peers().count()
    }

    pub fn send(
        &mut self,
        peer: PeerId,
        channel: u8,
        data: &[u8],
        flags: PacketFlags,
    ) -> Result<(), ChannelError> {
        self.validate(channel, data.len())?;

        let Some(target) = self.peers.get_mut(&peer) else {
            return Err(ChannelError::UnknownPeer(peer));
        };
        if target.state != PeerState::Connected {
            return Err(ChannelError::NotConnected(peer));
        }

        let frame = target.frame(channel, flags, data.to_vec());
        self.send_to_peer(peer, PacketKind::Message, Some(frame), Instant::now())
    }

    /// Sends to every connected peer.
    pub fn broadcast(&mut self, channel: u8, data: &[u8], flags: PacketFlags) -> Result<(), ChannelError> {
        self.validate(channel, data.len())?;

        let targets: Vec<PeerId> = self.connected_peers().collect();
        for peer in targets {
            if let Err(e) = self.send(peer, channel, data, flags) {
                log::warn!("broadcast to {} failed: {}", peer, e);
            }
        }
        Ok(())
    }

    fn validate(&self, channel: u8, len: usize) -> Result<(), ChannelError> {
        if channel >= self.config.channel_count {
            return Err(ChannelError::InvalidChannel {
                channel,
                count: self.config.channel_count,
            });
        }
        if len > MAX_PAYLOAD_SIZE {
            return Err(PacketError::PayloadTooLarge(len).into());
        }
        Ok(())
    }

    /// Notifies the remote and forgets the peer. A disconnect event for it is
    /// queued locally.
    pub fn disconnect(&mut self, peer: PeerId) {
        if self.drop_peer(peer) {
            self.events.push_back(PeerEvent::Disconnect(peer));
        }
    }

    /// Like [`disconnect`](Self::disconnect), without a local event.
    pub fn disconnect_now(&mut self, peer: PeerId) {
        self.drop_peer(peer);
    }

    /// Stops accepting traffic for `peer` but keeps retransmitting its
    /// unacknowledged reliable messages. The peer is dropped as by
    /// [`disconnect_now`](Self::disconnect_now) once everything is acked or
    /// `disconnect_linger` passes.
    pub fn disconnect_later(&mut self, peer: PeerId) {
        let linger = self.config.disconnect_linger;
        match self.peers.get_mut(&peer) {
            Some(p) if p.state == PeerState::Connected => {
                p.state = PeerState::Disconnecting;
                p.linger_until = Some(Instant::now() + linger);
            }
            Some(p) if p.state == PeerState::Connecting => self.disconnect_now(peer),
            _ => {}
        }
    }

    /// Peers still flushing after [`disconnect_later`](Self::disconnect_later).
    pub fn lingering_peer_count(&self) -> usize {
        self.peers
            .values()
            .filter(|p| p.state == PeerState::Disconnecting)
            .count()
    }

    fn drop_peer(&mut self, peer: PeerId) -> bool {
        if !self.peers.contains_key(&peer) {
            return false;
        }
        if let Err(e) = self.send_to_peer(peer, PacketKind::Disconnect, None, Instant::now()) {
            log::debug!("could not notify {} of disconnect: {}", peer, e);
        }
        self.remove_peer(peer);
        true
    }

    /// Services the socket and returns everything that happened since the last
    /// poll. Connect events always precede the first message of their peer.
    pub fn poll(&mut self) -> Result<(Vec<PeerEvent>, Vec<Received>), ChannelError> {
        self.service()?;
        Ok(self.take_events())
    }

    pub fn take_events(&mut self) -> (Vec<PeerEvent>, Vec<Received>) {
        (self.events.drain(..).collect(), std::mem::take(&mut self.received))
    }

    pub fn service(&mut self) -> Result<(), ChannelError> {
        let now = Instant::now();
        self.receive_all(now)?;
        self.maintain_peers(now);
        self.finish_disconnects(now);
        self.expire_peers(now);
        self.flush_link(now);
        Ok(())
    }

    fn receive_all(&mut self, now: Instant) -> Result<(), ChannelError> {
        loop {
            match self.socket.receive_from(&mut self.recv_buffer) {
                Ok((size, addr)) => match Packet::deserialize(&self.recv_buffer[..size]) {
                    Ok(packet) => {
                        self.stats.record_received(size);
                        self.handle_packet(packet, addr, now);
                    }
                    Err(e) => {
                        self.stats.packets_dropped += 1;
                        log::debug!("dropping datagram from {}: {}", addr, e);
                    }
                },
                Err(e) if e.is_transient() => return Ok(()),
                Err(TransportError::Io(e))
                    if matches!(
                        e.kind(),
                        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused
                    ) =>
                {
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn handle_packet(&mut self, packet: Packet, addr: SocketAddr, now: Instant) {
        let known = self.peers_by_addr.get(&addr).copied();

        let Some(id) = known else {
            match packet.header.kind {
                PacketKind::Connect => self.accept_incoming(addr, now),
                kind => log::debug!("ignoring {:?} from unknown {}", kind, addr),
            }
            return;
        };

        let Some(peer) = self.peers.get_mut(&id) else {
            return;
        };
        let fresh = peer.on_header(&packet.header, now);

        match packet.header.kind {
            PacketKind::Connect => {
                // Our accept was lost; repeat it.
                if peer.state == PeerState::Connected {
                    let _ = self.send_to_peer(id, PacketKind::Accept, None, now);
                }
            }
            PacketKind::Deny => {
                if peer.state == PeerState::Connecting {
                    log::info!("{} refused the connection", addr);
                    self.remove_peer(id);
                    self.events.push_back(PeerEvent::Disconnect(id));
                }
            }
            PacketKind::Disconnect => {
                let lingering = peer.state == PeerState::Disconnecting;
                log::info!("{} disconnected", id);
                self.remove_peer(id);
                if !lingering {
                    self.events.push_back(PeerEvent::Disconnect(id));
                }
            }
            PacketKind::Accept | PacketKind::Ping | PacketKind::Ack => {
                self.mark_connected(id);
            }
            PacketKind::Message => {
                self.mark_connected(id);
                let (Some(frame), Some(peer)) = (packet.frame, self.peers.get_mut(&id)) else {
                    return;
                };
                if !fresh || peer.state == PeerState::Disconnecting {
                    if frame.flags.is_reliable() {
                        peer.owe_ack();
                    }
                    return;
                }
                let channel = frame.channel;
                for data in peer.accept_frame(frame) {
                    self.received.push(Received {
                        peer: id,
                        channel,
                        data,
                    });
                }
            }
        }
    }

    fn mark_connected(&mut self, id: PeerId) {
        if let Some(peer) = self.peers.get_mut(&id) {
            if peer.state == PeerState::Connecting {
                peer.state = PeerState::Connected;
                log::info!("connected to {} as {}", peer.addr, id);
                self.events.push_back(PeerEvent::Connect(id));
            }
        }
    }

    fn accept_incoming(&mut self, addr: SocketAddr, now: Instant) {
        if !self.config.accept_incoming {
            log::debug!("ignoring connect from {}", addr);
            return;
        }

        if self.peers.len() >= self.config.max_peers {
            log::warn!("denying {}: host full", addr);
            match Packet::control(PacketKind::Deny, 0, 0, 0).serialize() {
                Ok(bytes) => self.transmit(bytes, addr, now),
                Err(e) => log::error!("failed to encode deny: {}", e),
            }
            return;
        }

        let id = self.insert_peer(addr, PeerState::Connected, now);
        log::info!("{} connected from {}", id, addr);
        let _ = self.send_to_peer(id, PacketKind::Accept, None, now);
        self.events.push_back(PeerEvent::Connect(id));
    }

    fn insert_peer(&mut self, addr: SocketAddr, state: PeerState, now: Instant) -> PeerId {
        let id = PeerId::new(self.next_peer_id);
        self.next_peer_id += 1;

        self.peers
            .insert(id, Peer::new(id, addr, state, self.config.channel_count, now));
        self.peers_by_addr.insert(addr, id);
        id
    }

    fn remove_peer(&mut self, id: PeerId) {
        if let Some(peer) = self.peers.remove(&id) {
            self.peers_by_addr.remove(&peer.addr);
        }
    }

    fn maintain_peers(&mut self, now: Instant) {
        let ids: Vec<PeerId> = self.peers.keys().copied().collect();

        for id in ids {
            let work = match self.peers.get_mut(&id) {
                Some(peer) => peer.maintenance(now, &self.config),
                None => continue,
            };

            if work.connect {
                let _ = self.send_to_peer(id, PacketKind::Connect, None, now);
            }
            for frame in work.resends {
                self.stats.resends += 1;
                let _ = self.send_to_peer(id, PacketKind::Message, Some(frame), now);
            }
            if work.ack {
                let _ = self.send_to_peer(id, PacketKind::Ack, None, now);
            } else if work.ping {
                let _ = self.send_to_peer(id, PacketKind::Ping, None, now);
            }
        }

        if let Some(rtt) = self.peers.values().next().map(|p| p.rtt().clone()) {
            self.stats.rtt_ms = rtt.srtt_ms();
            self.stats.rtt_variance = rtt.rtt_var_ms();
        }
    }

    fn finish_disconnects(&mut self, now: Instant) {
        let done: Vec<PeerId> = self
            .peers
            .values()
            .filter(|p| p.state == PeerState::Disconnecting)
            .filter(|p| p.unacked() == 0 || p.linger_until.is_some_and(|t| now >= t))
            .map(|p| p.id)
            .collect();

        for id in done {
            log::debug!("{} flushed, disconnecting", id);
            self.disconnect_now(id);
        }
    }

    fn expire_peers(&mut self, now: Instant) {
        let timeout = self.config.peer_timeout;
        let expired: Vec<PeerId> = self
            .peers
            .values()
            .filter(|p| p.state == PeerState::Connected)
            .filter(|p| now.saturating_duration_since(p.last_receive) > timeout)
            .map(|p| p.id)
            .collect();

        for id in expired {
            log::info!("{} timed out", id);
            self.remove_peer(id);
            self.events.push_back(PeerEvent::Disconnect(id));
        }
    }

    fn send_to_peer(
        &mut self,
        id: PeerId,
        kind: PacketKind,
        frame: Option<MessageFrame>,
        now: Instant,
    ) -> Result<(), ChannelError> {
        let Some(peer) = self.peers.get_mut(&id) else {
            return Err(ChannelError::UnknownPeer(id));
        };
        let addr = peer.addr;
        let bytes = peer.build(kind, frame, now)?;
        self.transmit(bytes, addr, now);
        Ok(())
    }

    fn transmit(&mut self, bytes: Vec<u8>, addr: SocketAddr, now: Instant) {
        match self.link.as_mut() {
            Some(link) => link.enqueue(bytes, addr, now),
            None => self.send_raw(&bytes, addr),
        }
    }

    fn flush_link(&mut self, now: Instant) {
        let Some(link) = self.link.as_mut() else {
            return;
        };
        for (bytes, addr) in link.take_due(now) {
            self.send_raw(&bytes, addr);
        }
    }

    fn send_raw(&mut self, bytes: &[u8], addr: SocketAddr) {
        match self.socket.send_to(bytes, addr) {
            Ok(sent) => self.stats.record_sent(sent),
            Err(e) => log::debug!("send to {} failed: {}", addr, e),
        }
    }
}

impl Drop for Host {
    fn drop(&mut self) {
        self.link = None;
        let ids: Vec<PeerId> = self.peers.keys().copied().collect();
        for id in ids {
            self.disconnect_now(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback_config() -> HostConfig {
        HostConfig::server(SocketAddr::from((Ipv4Addr::LOCALHOST, 0)), 4)
    }

    #[test]
    fn test_invalid_channel_rejected() {
        let mut host = Host::bind(loopback_config()).unwrap();
        let err = host.broadcast(5, b"x", PacketFlags::RELIABLE).unwrap_err();
        assert!(matches!(
            err,
            ChannelError::InvalidChannel {
                channel: 5,
                count: 2
            }
        ));
    }

    #[test]
    fn test_send_to_unknown_peer() {
        let mut host = Host::bind(loopback_config()).unwrap();
        let err = host
            .send(PeerId::new(99), 0, b"x", PacketFlags::RELIABLE)
            .unwrap_err();
        assert!(matches!(err, ChannelError::UnknownPeer(_)));
    }

    #[test]
    fn test_send_before_connected() {
        let mut host = Host::bind(HostConfig::client_for("127.0.0.1:9".parse().unwrap())).unwrap();
        let peer = host.connect("127.0.0.1:9".parse().unwrap());
        assert_eq!(host.peer_state(peer), Some(PeerState::Connecting));
        let err = host.send(peer, 0, b"x", PacketFlags::RELIABLE).unwrap_err();
        assert!(matches!(err, ChannelError::NotConnected(_)));
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let mut host = Host::bind(loopback_config()).unwrap();
        let big = vec![0u8; MAX_PAYLOAD_SIZE + 1];
        assert!(matches!(
            host.broadcast(0, &big, PacketFlags::UNSEQUENCED),
            Err(ChannelError::Packet(PacketError::PayloadTooLarge(_)))
        ));
    }

    #[test]
    fn test_disconnect_now_is_silent_locally() {
        let mut host = Host::bind(HostConfig::client_for("127.0.0.1:9".parse().unwrap())).unwrap();
        let peer = host.connect("127.0.0.1:9".parse().unwrap());
        host.disconnect_now(peer);
        assert!(host.peer_state(peer).is_none());
        assert!(host.take_events().0.is_empty());

        let peer = host.connect("127.0.0.1:9".parse().unwrap());
        host.disconnect(peer);
        assert_eq!(host.take_events().0, vec![PeerEvent::Disconnect(peer)]);
    }
}
