use std::net::SocketAddr;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;

use arena::{
    Arena, ArenaMap, InputEvent, InputQueue, NetServer, NetworkStats, PhysicsWorld, Session,
    SlotTable, World,
};

use crate::config::ServerConfig;

#[derive(Debug, Clone)]
pub struct SlotInfo {
    pub index: u8,
    pub peer: Option<String>,
    pub hp: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ServerStatus {
    pub addr: SocketAddr,
    pub phase: &'static str,
    pub uptime: Duration,
    pub games_played: u32,
    pub peers: usize,
    pub slots: Vec<SlotInfo>,
    pub bullets: usize,
    pub powerups: usize,
    pub network: NetworkStats,
}

fn arena_factory(config: &ServerConfig) -> Box<dyn FnMut() -> Arena> {
    let slots = config.slots;
    let rules = config.rules.clone();
    let seed = config.seed;
    let mut games = 0u64;

    Box::new(move || {
        let world = World::new(
            ArenaMap::testing_ground(),
            Box::new(PhysicsWorld::new()),
            SlotTable::standard(slots, rules.player_radius),
            rules.clone(),
        );
        let arena = Arena::new(world, seed.wrapping_add(games));
        games += 1;
        arena
    })
}

/// The game server process: one socket, one session, polled from a single
/// loop.
pub struct ArenaServer {
    net: NetServer,
    session: Session,
    inputs: InputQueue,
    last_frame: Instant,
    started: Instant,
}

impl ArenaServer {
    pub fn new(config: &ServerConfig) -> Result<Self> {
        anyhow::ensure!(config.slots > 0, "at least one player slot is required");
        anyhow::ensure!(
            config.host.max_peers >= config.slots,
            "max_peers ({}) must cover every slot ({})",
            config.host.max_peers,
            config.slots
        );

        let net = NetServer::bind(config.host.clone())?;
        let session = Session::new(config.ticks, arena_factory(config));
        let now = Instant::now();

        Ok(Self {
            net,
            session,
            inputs: InputQueue::default(),
            last_frame: now,
            started: now,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.net.local_addr()
    }

    pub fn push_input(&mut self, event: InputEvent) {
        self.inputs.push(event);
    }

    /// Runs one frame. Returns false once the session has stopped.
    pub fn frame(&mut self) -> Result<bool> {
        let now = Instant::now();
        let elapsed = now - self.last_frame;
        self.last_frame = now;

        Ok(self.session.frame(elapsed, &mut self.net, &mut self.inputs)?)
    }

    pub fn run_headless(&mut self) -> Result<()> {
        while self.frame()? {
            thread::sleep(Duration::from_millis(1));
        }
        Ok(())
    }

    pub fn status(&self) -> ServerStatus {
        let phase = self.session.phase();
        let (slots, bullets, powerups) = match phase.arena() {
            Some(arena) => {
                let world = &arena.world;
                let slots = world
                    .slots
                    .iter()
                    .map(|slot| {
                        let occupant = slot.occupant();
                        SlotInfo {
                            index: slot.index,
                            peer: occupant.map(|o| o.peer.to_string()),
                            hp: occupant
                                .and_then(|o| world.roster.player(o.entity))
                                .map(|p| p.state.hp),
                        }
                    })
                    .collect();
                (slots, world.roster.bullets().len(), world.roster.powerups().len())
            }
            None => (Vec::new(), 0, 0),
        };

        ServerStatus {
            addr: self.net.local_addr(),
            phase: phase.name(),
            uptime: self.started.elapsed(),
            games_played: self.session.games_played(),
            peers: self.net.connected_peer_count(),
            slots,
            bullets,
            powerups,
            network: self.net.host().stats().clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;

    fn config(slots: usize) -> ServerConfig {
        let mut config = ServerConfig {
            slots,
            ..Default::default()
        };
        config.host.bind = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
        config
    }

    #[test]
    fn test_status_of_fresh_server() {
        let mut server = ArenaServer::new(&config(3)).unwrap();
        assert!(server.frame().unwrap());

        let status = server.status();
        assert_eq!(status.phase, "waiting for players");
        assert_eq!(status.slots.len(), 3);
        assert!(status.slots.iter().all(|s| s.peer.is_none()));
        assert_eq!(status.peers, 0);
    }

    #[test]
    fn test_quit_stops_server() {
        let mut server = ArenaServer::new(&config(2)).unwrap();
        server.push_input(InputEvent::Quit);
        assert!(!server.frame().unwrap());
        assert!(server.run_headless().is_ok());
    }

    #[test]
    fn test_rejects_too_few_peers() {
        let mut config = config(4);
        config.host.max_peers = 2;
        assert!(ArenaServer::new(&config).is_err());
    }
}
