use std::collections::{BTreeSet, VecDeque};

use super::host::{ChannelError, PeerEvent};
use super::peer::PeerId;
use super::server::{EventSink, Incoming, ServerLink};
use crate::event::{Delivery, GameEvent};

#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    To(PeerId, GameEvent),
    All(GameEvent),
    Dropped(PeerId),
}

/// In-memory [`ServerLink`]: records everything sent and replays scripted
/// peer traffic on the next poll.
#[derive(Debug, Default)]
pub struct RecordingLink {
    pub records: Vec<Recorded>,
    connected: BTreeSet<PeerId>,
    peer_events: VecDeque<PeerEvent>,
    messages: VecDeque<Incoming>,
}

impl RecordingLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a connect event for `peer`.
    pub fn connect(&mut self, peer: PeerId) {
        self.connected.insert(peer);
        self.peer_events.push_back(PeerEvent::Connect(peer));
    }

    /// Queues a disconnect event for `peer`, as if its link went away.
    pub fn drop_peer(&mut self, peer: PeerId) {
        self.connected.remove(&peer);
        self.peer_events.push_back(PeerEvent::Disconnect(peer));
    }

    /// Queues a message from `peer`.
    pub fn message(&mut self, peer: PeerId, event: GameEvent) {
        self.messages.push_back(Incoming { peer, event });
    }

    pub fn is_connected(&self, peer: PeerId) -> bool {
        self.connected.contains(&peer)
    }

    pub fn sent_to(&self, peer: PeerId) -> Vec<GameEvent> {
        self.records
            .iter()
            .filter_map(|r| match r {
                Recorded::To(p, event) if *p == peer => Some(*event),
                _ => None,
            })
            .collect()
    }

    pub fn broadcasts(&self) -> Vec<GameEvent> {
        self.records
            .iter()
            .filter_map(|r| match r {
                Recorded::All(event) => Some(*event),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl EventSink for RecordingLink {
    fn send_with(&mut self, peer: PeerId, event: &GameEvent, _delivery: Delivery) {
        self.records.push(Recorded::To(peer, *event));
    }

    fn broadcast_with(&mut self, event: &GameEvent, _delivery: Delivery) {
        self.records.push(Recorded::All(*event));
    }

    fn disconnect_now(&mut self, peer: PeerId) {
        self.connected.remove(&peer);
        self.records.push(Recorded::Dropped(peer));
    }
}

impl ServerLink for RecordingLink {
    fn poll(&mut self) -> Result<(Vec<PeerEvent>, Vec<Incoming>), ChannelError> {
        Ok((self.peer_events.drain(..).collect(), self.messages.drain(..).collect()))
    }

    fn connected_peer_count(&self) -> usize {
        self.connected.len()
    }

    fn disconnect_all(&mut self) {
        for peer in std::mem::take(&mut self.connected) {
            self.records.push(Recorded::Dropped(peer));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_link_default_delivery() {
        let mut link = RecordingLink::new();
        let peer = PeerId::new(3);

        link.send(peer, &GameEvent::Ready);
        link.broadcast(&GameEvent::GameOver);
        link.disconnect_now(peer);

        assert_eq!(link.sent_to(peer), vec![GameEvent::Ready]);
        assert_eq!(link.broadcasts(), vec![GameEvent::GameOver]);
        assert_eq!(link.records.last(), Some(&Recorded::Dropped(peer)));
    }

    #[test]
    fn test_recording_link_replays_scripted_traffic() {
        let mut link = RecordingLink::new();
        let (a, b) = (PeerId::new(1), PeerId::new(2));

        link.connect(a);
        link.connect(b);
        link.message(a, GameEvent::Ready);
        assert_eq!(link.connected_peer_count(), 2);

        let (events, messages) = link.poll().unwrap();
        assert_eq!(events, vec![PeerEvent::Connect(a), PeerEvent::Connect(b)]);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].peer, a);

        link.disconnect_now(b);
        assert!(!link.is_connected(b));
        assert_eq!(link.connected_peer_count(), 1);

        let (events, messages) = link.poll().unwrap();
        assert!(events.is_empty() && messages.is_empty());
    }
}
