use std::net::SocketAddr;
use std::sync::atomic::{AtomicU16, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use arena::{
    Arena, ArenaRules, ClientEvent, ClientView, Direction, GameEvent, HostConfig, InputQueue,
    NetClient, NetServer, Session, TickRates, World,
};

static PORT_COUNTER: AtomicU16 = AtomicU16::new(42000);

fn next_port() -> u16 {
    PORT_COUNTER.fetch_add(10, Ordering::SeqCst)
}

struct Bot {
    client: NetClient,
    view: ClientView,
    events: Vec<ClientEvent>,
}

impl Bot {
    fn connect(server: SocketAddr) -> Self {
        Self {
            client: NetClient::connect(HostConfig::client_for(server), server).unwrap(),
            view: ClientView::new(ArenaRules::default().player_hp),
            events: Vec::new(),
        }
    }

    fn poll(&mut self) {
        for event in self.client.poll().unwrap() {
            if let ClientEvent::Event(game_event) = &event {
                self.view.apply(game_event);
            }
            self.events.push(event);
        }
    }
}

struct Harness {
    server: NetServer,
    session: Session,
    inputs: InputQueue,
    last_frame: Instant,
}

impl Harness {
    fn new(slots: usize) -> Self {
        let addr: SocketAddr = format!("127.0.0.1:{}", next_port()).parse().unwrap();
        let server = NetServer::bind(HostConfig::server(addr, 8)).unwrap();
        let session = Session::new(
            TickRates::default(),
            Box::new(move || Arena::new(World::testing_ground(slots, ArenaRules::default()), 3)),
        );
        Self {
            server,
            session,
            inputs: InputQueue::default(),
            last_frame: Instant::now(),
        }
    }

    fn addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    fn pump(&mut self, bots: &mut [&mut Bot], timeout_ms: u64, mut done: impl FnMut(&[&mut Bot]) -> bool) -> bool {
        let start = Instant::now();
        while start.elapsed() < Duration::from_millis(timeout_ms) {
            let now = Instant::now();
            let elapsed = now - self.last_frame;
            self.last_frame = now;

            assert!(self.session.frame(elapsed, &mut self.server, &mut self.inputs).unwrap());
            for bot in bots.iter_mut() {
                bot.poll();
            }
            if done(bots) {
                return true;
            }
            thread::sleep(Duration::from_millis(1));
        }
        false
    }
}

#[test]
fn test_late_joiner_catches_up() {
    let mut harness = Harness::new(4);
    let mut a = Bot::connect(harness.addr());
    let mut b = Bot::connect(harness.addr());
    assert!(harness.pump(&mut [&mut a, &mut b], 3000, |bots| {
        bots.iter().all(|bot| bot.view.players.len() == 2)
    }));

    let mut c = Bot::connect(harness.addr());
    assert!(harness.pump(&mut [&mut a, &mut b, &mut c], 3000, |bots| {
        bots.iter().all(|bot| bot.view.players.len() == 3)
    }));

    assert_eq!(c.view.local_slot(), Some(2));
    assert_eq!(c.view.players.keys().copied().collect::<Vec<_>>(), vec![0, 1, 2]);

    let mut local = vec![a.view.local_slot(), b.view.local_slot()];
    local.sort();
    assert_eq!(local, vec![Some(0), Some(1)]);

    let catch_up = c
        .events
        .iter()
        .filter(|e| matches!(e, ClientEvent::Event(GameEvent::Spawn { is_self: false, .. })))
        .count();
    assert_eq!(catch_up, 2);
}

#[test]
fn test_full_lobby_starts_game_and_streams_state() {
    let mut harness = Harness::new(2);
    let mut a = Bot::connect(harness.addr());
    let mut b = Bot::connect(harness.addr());

    assert!(harness.pump(&mut [&mut a, &mut b], 3000, |bots| bots.iter().all(|bot| bot.view.ready)));
    assert_eq!(harness.session.phase().name(), "in game");

    a.client
        .send(&GameEvent::Input {
            moving: false,
            direction: Direction::Up,
            firing: true,
        })
        .unwrap();

    let a_slot = a.view.local_slot().unwrap();
    assert!(harness.pump(&mut [&mut a, &mut b], 3000, |bots| {
        bots[1].view.bullets.values().any(|bullet| bullet.owner_slot == a_slot)
            && bots[1].view.players.values().all(|p| p.position != glam::Vec2::ZERO)
    }));
}

#[test]
fn test_newcomer_refused_while_game_runs() {
    let mut harness = Harness::new(2);
    let mut a = Bot::connect(harness.addr());
    let mut b = Bot::connect(harness.addr());
    assert!(harness.pump(&mut [&mut a, &mut b], 3000, |bots| bots.iter().all(|bot| bot.view.ready)));

    let mut late = Bot::connect(harness.addr());
    assert!(harness.pump(&mut [&mut a, &mut b, &mut late], 3000, |bots| {
        bots[2].events.contains(&ClientEvent::Disconnected)
    }));

    assert!(late.view.players.is_empty());
    assert!(!late.client.is_connected());
}

#[test]
fn test_everyone_leaving_returns_to_lobby() {
    let mut harness = Harness::new(2);
    let mut a = Bot::connect(harness.addr());
    let mut b = Bot::connect(harness.addr());
    assert!(harness.pump(&mut [&mut a, &mut b], 3000, |bots| bots.iter().all(|bot| bot.view.ready)));

    a.client.disconnect();
    assert!(harness.pump(&mut [&mut b], 3000, |bots| bots[0].view.game_over));

    assert_eq!(harness.session.phase().name(), "waiting for players");
    assert_eq!(harness.session.games_played(), 1);
}
