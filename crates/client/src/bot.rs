use std::net::SocketAddr;
use std::time::Instant;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use arena::{ArenaRules, ClientEvent, ClientView, Direction, GameEvent, HostConfig, NetClient};

use crate::config::ClientConfig;

pub fn choose_input(rng: &mut impl Rng, config: &ClientConfig) -> GameEvent {
    GameEvent::Input {
        moving: rng.gen_bool(config.move_chance),
        direction: Direction::ALL[rng.gen_range(0..Direction::ALL.len())],
        firing: rng.gen_bool(config.fire_chance),
    }
}

/// A headless player. Keeps reconnecting when dropped and sends random input
/// while it has a live player.
pub struct Bot {
    client: NetClient,
    view: ClientView,
    rng: StdRng,
    config: ClientConfig,
    next_input: Instant,
    bullets_seen: usize,
}

impl Bot {
    pub fn connect(server: SocketAddr, config: ClientConfig) -> Result<Self> {
        let client = NetClient::connect(HostConfig::client_for(server), server)?;
        log::info!("connecting to {}", server);

        Ok(Self {
            client,
            view: ClientView::new(ArenaRules::default().player_hp),
            rng: StdRng::seed_from_u64(config.seed),
            next_input: Instant::now(),
            config,
            bullets_seen: 0,
        })
    }

    pub fn view(&self) -> &ClientView {
        &self.view
    }

    pub fn bullets_seen(&self) -> usize {
        self.bullets_seen
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    pub fn frame(&mut self, now: Instant, dt: f32) -> Result<()> {
        for event in self.client.poll()? {
            match event {
                ClientEvent::Connected => log::info!("connected to {}", self.client.server_addr()),
                ClientEvent::Disconnected => {
                    log::info!("disconnected from {}", self.client.server_addr());
                    self.view.reset();
                }
                ClientEvent::Event(game_event) => self.apply(&game_event),
            }
        }
        self.view.tick(dt);

        if now >= self.next_input {
            self.next_input = now + self.config.input_interval;
            if self.view.ready && !self.view.game_over && self.view.local_player().is_some() {
                let input = choose_input(&mut self.rng, &self.config);
                self.client.send(&input)?;
            }
        }
        Ok(())
    }

    fn apply(&mut self, event: &GameEvent) {
        let had_slot = self.view.local_slot();
        self.view.apply(event);

        match *event {
            GameEvent::Ready => log::info!("game started"),
            GameEvent::GameOver => log::info!("game over"),
            GameEvent::SpawnBullet { .. } => self.bullets_seen += 1,
            GameEvent::Despawn { slot } if had_slot == Some(slot) => log::info!("our player died"),
            GameEvent::SetHp { slot, hp } if had_slot == Some(slot) => log::debug!("hp {}", hp),
            _ => {}
        }
        if had_slot.is_none() {
            if let Some(slot) = self.view.local_slot() {
                log::info!("playing in slot {}", slot);
            }
        }
    }
}
