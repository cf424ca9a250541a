use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use arena::net::Received;
use arena::{Host, HostConfig, LinkSimulation, PacketFlags, PeerEvent, PeerId};

static PORT_COUNTER: AtomicU16 = AtomicU16::new(41000);

fn next_port() -> u16 {
    PORT_COUNTER.fetch_add(10, Ordering::SeqCst)
}

fn server(max_peers: usize) -> (Host, SocketAddr) {
    let addr: SocketAddr = format!("127.0.0.1:{}", next_port()).parse().unwrap();
    let host = Host::server(HostConfig::server(addr, max_peers)).unwrap();
    (host, addr)
}

fn client(server_addr: SocketAddr) -> (Host, PeerId) {
    Host::client(HostConfig::client_for(server_addr), server_addr).unwrap()
}

/// Polls every host until `done` holds or `timeout_ms` passes. Returns all
/// events and messages seen per host.
fn pump(
    hosts: &mut [&mut Host],
    timeout_ms: u64,
    mut done: impl FnMut(&[(Vec<PeerEvent>, Vec<Received>)]) -> bool,
) -> Vec<(Vec<PeerEvent>, Vec<Received>)> {
    let mut seen: Vec<(Vec<PeerEvent>, Vec<Received>)> = hosts.iter().map(|_| (Vec::new(), Vec::new())).collect();
    let start = Instant::now();

    while start.elapsed() < Duration::from_millis(timeout_ms) {
        for (host, (events, received)) in hosts.iter_mut().zip(seen.iter_mut()) {
            let (new_events, new_received) = host.poll().unwrap();
            events.extend(new_events);
            received.extend(new_received);
        }
        if done(&seen) {
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }
    seen
}

fn connected(events: &[PeerEvent]) -> bool {
    events.iter().any(|e| matches!(e, PeerEvent::Connect(_)))
}

#[test]
fn test_handshake_surfaces_connect_on_both_sides() {
    let (mut server, addr) = server(4);
    let (mut client, server_peer) = client(addr);

    let seen = pump(&mut [&mut server, &mut client], 2000, |seen| {
        connected(&seen[0].0) && connected(&seen[1].0)
    });

    assert_eq!(seen[1].0, vec![PeerEvent::Connect(server_peer)]);
    assert_eq!(server.connected_peer_count(), 1);
    let client_peer = seen[0].0[0].peer();
    assert_eq!(
        server.peer_addr(client_peer).map(|a| a.port()),
        Some(client.local_addr().port())
    );
}

#[test]
fn test_reliable_messages_arrive_in_order() {
    let (mut server, addr) = server(4);
    let (mut client, server_peer) = client(addr);
    pump(&mut [&mut server, &mut client], 2000, |seen| connected(&seen[1].0));

    for i in 0..10u8 {
        client.send(server_peer, 0, &[i], PacketFlags::RELIABLE).unwrap();
    }

    let seen = pump(&mut [&mut server, &mut client], 2000, |seen| seen[0].1.len() >= 10);
    let payloads: Vec<u8> = seen[0].1.iter().map(|r| r.data[0]).collect();
    assert_eq!(payloads, (0..10).collect::<Vec<_>>());
    assert!(seen[0].1.iter().all(|r| r.channel == 0));
}

#[test]
fn test_reliable_delivery_survives_loss() {
    let (mut server, addr) = server(4);
    let (mut client, server_peer) = client(addr);
    pump(&mut [&mut server, &mut client], 2000, |seen| connected(&seen[1].0));

    client.set_link_simulation(LinkSimulation {
        enabled: true,
        loss_percent: 30.0,
        min_latency_ms: 1,
        max_latency_ms: 5,
        jitter_ms: 2,
    });

    for i in 0..30u8 {
        client.send(server_peer, 0, &[i], PacketFlags::RELIABLE).unwrap();
    }

    let seen = pump(&mut [&mut server, &mut client], 8000, |seen| seen[0].1.len() >= 30);
    let payloads: Vec<u8> = seen[0].1.iter().map(|r| r.data[0]).collect();
    assert_eq!(payloads, (0..30).collect::<Vec<_>>());
    assert!(client.stats().resends > 0);
}

#[test]
fn test_broadcast_reaches_every_peer() {
    let (mut server, addr) = server(4);
    let (mut a, _) = client(addr);
    let (mut b, _) = client(addr);
    pump(&mut [&mut server, &mut a, &mut b], 2000, |seen| {
        connected(&seen[1].0) && connected(&seen[2].0)
    });

    server.broadcast(1, b"snapshot", PacketFlags::UNSEQUENCED).unwrap();
    server.broadcast(0, b"event", PacketFlags::RELIABLE).unwrap();

    let seen = pump(&mut [&mut server, &mut a, &mut b], 2000, |seen| {
        seen[1].1.len() >= 2 && seen[2].1.len() >= 2
    });
    for (_, received) in &seen[1..] {
        assert!(received.iter().any(|r| r.channel == 1 && r.data == b"snapshot"));
        assert!(received.iter().any(|r| r.channel == 0 && r.data == b"event"));
    }
}

#[test]
fn test_full_host_denies_connection() {
    let (mut server, addr) = server(1);
    let (mut first, _) = client(addr);
    pump(&mut [&mut server, &mut first], 2000, |seen| connected(&seen[1].0));

    let (mut second, refused) = client(addr);
    let seen = pump(&mut [&mut server, &mut first, &mut second], 2000, |seen| !seen[2].0.is_empty());

    assert_eq!(seen[2].0, vec![PeerEvent::Disconnect(refused)]);
    assert_eq!(server.connected_peer_count(), 1);
}

#[test]
fn test_disconnect_reaches_remote() {
    let (mut server, addr) = server(4);
    let (mut client, server_peer) = client(addr);
    let seen = pump(&mut [&mut server, &mut client], 2000, |seen| {
        connected(&seen[0].0) && connected(&seen[1].0)
    });
    let client_peer = seen[0].0[0].peer();

    client.disconnect_now(server_peer);
    assert!(client.take_events().0.is_empty());

    let seen = pump(&mut [&mut server], 2000, |seen| !seen[0].0.is_empty());
    assert_eq!(seen[0].0, vec![PeerEvent::Disconnect(client_peer)]);
    assert_eq!(server.connected_peer_count(), 0);
}

#[test]
fn test_graceful_disconnect_resends_lost_message() {
    let (mut server, addr) = server(4);
    let (mut client, server_peer) = client(addr);
    let seen = pump(&mut [&mut server, &mut client], 2000, |seen| {
        connected(&seen[0].0) && connected(&seen[1].0)
    });
    let client_peer = seen[0].0[0].peer();

    server.set_link_simulation(LinkSimulation {
        enabled: true,
        loss_percent: 100.0,
        min_latency_ms: 0,
        max_latency_ms: 0,
        jitter_ms: 0,
    });
    server.send(client_peer, 0, b"over", PacketFlags::RELIABLE).unwrap();
    server.disconnect_later(client_peer);
    server.service().unwrap();

    assert_eq!(server.connected_peer_count(), 0);
    assert_eq!(server.lingering_peer_count(), 1);
    assert!(server.send(client_peer, 0, b"late", PacketFlags::RELIABLE).is_err());

    server.set_link_simulation(LinkSimulation::default());
    let seen = pump(&mut [&mut server, &mut client], 3000, |seen| !seen[1].0.is_empty());

    assert_eq!(seen[1].1.len(), 1);
    assert_eq!(seen[1].1[0].data, b"over");
    assert_eq!(seen[1].0, vec![PeerEvent::Disconnect(server_peer)]);
    assert!(seen[0].0.is_empty(), "the server raises no event for its own disconnect");
    assert_eq!(server.lingering_peer_count(), 0);
    assert!(server.stats().resends > 0);
}
