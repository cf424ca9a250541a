use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

use super::host::HostConfig;
use super::protocol::{
    sequence_greater_than, MessageFrame, Packet, PacketError, PacketFlags, PacketHeader,
    PacketKind,
};
use super::tracking::{is_acked, ReceiveWindow, RttEstimator};

/// Reliable messages further than this ahead of the next expected id are
/// dropped and left to retransmission.
const MAX_REORDER_DISTANCE: u32 = 256;

/// Identity of a peer within one host. Compared by value, never by the
/// address of the peer's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(u32);

impl PeerId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "peer#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Connecting,
    Connected,
    /// Flushing unacknowledged reliable messages before the host drops it.
    Disconnecting,
}

#[derive(Debug)]
struct InFlight {
    sequence: u32,
    sent_at: Instant,
    frame: MessageFrame,
}

#[derive(Debug, Default)]
struct ChannelState {
    next_reliable_out: u32,
    next_unreliable_out: u32,
    next_reliable_in: u32,
    last_unreliable_in: Option<u32>,
    reorder: BTreeMap<u32, Vec<u8>>,
}

/// Work a peer needs done on this service pass.
#[derive(Debug, Default)]
pub(crate) struct Maintenance {
    pub connect: bool,
    pub resends: Vec<MessageFrame>,
    pub ack: bool,
    pub ping: bool,
}

#[derive(Debug)]
pub(crate) struct Peer {
    pub id: PeerId,
    pub addr: SocketAddr,
    pub state: PeerState,
    pub last_receive: Instant,
    send_sequence: u32,
    window: ReceiveWindow,
    rtt: RttEstimator,
    channels: Vec<ChannelState>,
    in_flight: Vec<InFlight>,
    last_send: Instant,
    last_connect_attempt: Option<Instant>,
    ack_owed: bool,
    pub linger_until: Option<Instant>,
}

impl Peer {
    pub fn new(
        id: PeerId,
        addr: SocketAddr,
        state: PeerState,
        channel_count: u8,
        now: Instant,
    ) -> Self {
        Self {
            id,
            addr,
            state,
            last_receive: now,
            // Zero is the "nothing received yet" ack value.
            send_sequence: 1,
            window: ReceiveWindow::new(),
            rtt: RttEstimator::default(),
            channels: (0..channel_count).map(|_| ChannelState::default()).collect(),
            in_flight: Vec::new(),
            last_send: now,
            last_connect_attempt: None,
            ack_owed: false,
            linger_until: None,
        }
    }

    pub fn rtt(&self) -> &RttEstimator {
        &self.rtt
    }

    pub fn unacked(&self) -> usize {
        self.in_flight.len()
    }

    /// Stamps a new message id for `channel` and wraps `payload` in a frame.
    pub fn frame(&mut self, channel: u8, flags: PacketFlags, payload: Vec<u8>) -> MessageFrame {
        let state = &mut self.channels[channel as usize];
        let message_id = if flags.is_reliable() {
            let id = state.next_reliable_out;
            state.next_reliable_out = state.next_reliable_out.wrapping_add(1);
            id
        } else if flags.is_unsequenced() {
            0
        } else {
            let id = state.next_unreliable_out;
            state.next_unreliable_out = state.next_unreliable_out.wrapping_add(1);
            id
        };

        MessageFrame {
            channel,
            flags,
            message_id,
            payload,
        }
    }

    /// Serializes the next datagram for this peer, piggybacking acks, and
    /// tracks reliable frames until they are acknowledged.
    pub fn build(
        &mut self,
        kind: PacketKind,
        frame: Option<MessageFrame>,
        now: Instant,
    ) -> Result<Vec<u8>, PacketError> {
        let sequence = self.send_sequence;
        self.send_sequence = self.send_sequence.wrapping_add(1).max(1);

        let (ack, ack_bitfield) = self.window.ack_data();
        let packet = Packet {
            header: PacketHeader::new(kind, sequence, ack, ack_bitfield),
            frame,
        };
        let bytes = packet.serialize()?;

        if let Some(frame) = packet.frame.filter(|f| f.flags.is_reliable()) {
            self.in_flight.push(InFlight {
                sequence,
                sent_at: now,
                frame,
            });
        }

        self.last_send = now;
        self.ack_owed = false;
        Ok(bytes)
    }

    /// Records an incoming datagram header. Returns `false` for duplicates.
    pub fn on_header(&mut self, header: &PacketHeader, now: Instant) -> bool {
        self.last_receive = now;

        let rtt = &mut self.rtt;
        self.in_flight.retain(|pending| {
            if is_acked(pending.sequence, header.ack, header.ack_bitfield) {
                rtt.sample(pending.sent_at, now);
                false
            } else {
                true
            }
        });

        self.window.record(header.sequence)
    }

    /// Applies delivery rules to an incoming frame and returns the payloads
    /// that are ready for the application, in order.
    pub fn accept_frame(&mut self, frame: MessageFrame) -> Vec<Vec<u8>> {
        let Some(state) = self.channels.get_mut(frame.channel as usize) else {
            log::debug!("{}: message on unknown channel {}", self.id, frame.channel);
            return Vec::new();
        };

        if frame.flags.is_reliable() {
            self.ack_owed = true;
            return state.accept_reliable(frame.message_id, frame.payload);
        }

        if frame.flags.is_unsequenced() {
            return vec![frame.payload];
        }

        if state
            .last_unreliable_in
            .is_none_or(|last| sequence_greater_than(frame.message_id, last))
        {
            state.last_unreliable_in = Some(frame.message_id);
            vec![frame.payload]
        } else {
            Vec::new()
        }
    }

    pub fn owe_ack(&mut self) {
        self.ack_owed = true;
    }

    pub fn maintenance(&mut self, now: Instant, config: &HostConfig) -> Maintenance {
        match self.state {
            PeerState::Connecting => {
                let due = self
                    .last_connect_attempt
                    .is_none_or(|t| now.saturating_duration_since(t) >= config.connect_retry);
                if due {
                    self.last_connect_attempt = Some(now);
                }
                Maintenance {
                    connect: due,
                    ..Default::default()
                }
            }
            PeerState::Connected | PeerState::Disconnecting => {
                let timeout = self.rtt.resend_timeout(config.min_resend);
                let (due, waiting): (Vec<InFlight>, Vec<InFlight>) = std::mem::take(&mut self.in_flight)
                    .into_iter()
                    .partition(|f| now.saturating_duration_since(f.sent_at) >= timeout);
                self.in_flight = waiting;

                let resends: Vec<MessageFrame> = due.into_iter().map(|f| f.frame).collect();
                let idle = now.saturating_duration_since(self.last_send) >= config.ping_interval;
                let quiet = resends.is_empty();

                Maintenance {
                    connect: false,
                    ack: quiet && self.ack_owed,
                    ping: quiet && !self.ack_owed && idle,
                    resends,
                }
            }
        }
    }
}

impl ChannelState {
    fn accept_reliable(&mut self, message_id: u32, payload: Vec<u8>) -> Vec<Vec<u8>> {
        let ahead = message_id.wrapping_sub(self.next_reliable_in);
        if ahead >= MAX_REORDER_DISTANCE {
            // Already delivered, or too far ahead to buffer.
            return Vec::new();
        }

        if ahead > 0 {
            self.reorder.entry(message_id).or_insert(payload);
            return Vec::new();
        }

        let mut ready = vec![payload];
        self.next_reliable_in = self.next_reliable_in.wrapping_add(1);
        while let Some(next) = self.reorder.remove(&self.next_reliable_in) {
            ready.push(next);
            self.next_reliable_in = self.next_reliable_in.wrapping_add(1);
        }
        ready
    }
}
