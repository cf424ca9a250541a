use std::time::Duration;

use super::arena::Arena;
use super::command::InputQueue;
use super::tick::{FixedTimestep, NetTimer, TickRates};
use crate::event::GameEvent;
use crate::net::{ChannelError, PeerEvent, ServerLink};
use crate::replication::{self, Despawn};

/// Why a phase handed control back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome {
    /// Every slot is taken; the game can start.
    Ready,
    Quit,
    NoPlayers,
    GameOver,
}

/// Lobby: seats peers as they connect until every slot is taken.
pub struct WaitingForPlayers {
    arena: Arena,
}

impl WaitingForPlayers {
    pub fn new(arena: Arena) -> Self {
        Self { arena }
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn into_arena(self) -> Arena {
        self.arena
    }

    pub fn frame(
        &mut self,
        link: &mut dyn ServerLink,
        inputs: &mut InputQueue,
    ) -> Result<Option<PhaseOutcome>, ChannelError> {
        if inputs.drain_quit() {
            return Ok(Some(PhaseOutcome::Quit));
        }

        let (events, messages) = link.poll()?;
        for event in events {
            match event {
                PeerEvent::Connect(peer) => {
                    log::info!("{} connected", peer);
                    replication::spawn_player(&mut self.arena.world, peer, &mut *link);
                }
                PeerEvent::Disconnect(peer) => {
                    log::info!("{} disconnected", peer);
                    replication::despawn_player(&mut self.arena.world, Despawn::Peer(peer), &mut *link);
                }
            }
        }
        for message in messages {
            log::debug!("ignoring {:?} from {} before the game starts", message.event, message.peer);
        }

        if self.arena.world.slots.is_full() {
            log::info!("all {} slots taken", self.arena.world.slots.len());
            link.broadcast(&GameEvent::Ready);
            return Ok(Some(PhaseOutcome::Ready));
        }
        Ok(None)
    }
}

/// The running game: fixed simulation ticks plus a slower snapshot timer.
pub struct MainLoop {
    arena: Arena,
    timestep: FixedTimestep,
    net_timer: NetTimer,
    ticks: u64,
}

impl MainLoop {
    pub fn new(arena: Arena, rates: TickRates) -> Self {
        Self {
            arena,
            timestep: FixedTimestep::new(rates.simulation),
            net_timer: NetTimer::new(rates.network),
            ticks: 0,
        }
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    pub fn into_arena(self) -> Arena {
        self.arena
    }

    /// Simulation ticks run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn residual(&self) -> Duration {
        self.timestep.residual()
    }

    /// Runs every simulation tick owed for `elapsed`, then at most one
    /// snapshot broadcast.
    pub fn frame(
        &mut self,
        elapsed: Duration,
        link: &mut dyn ServerLink,
        inputs: &mut InputQueue,
    ) -> Result<Option<PhaseOutcome>, ChannelError> {
        self.timestep.accumulate(elapsed);

        while self.timestep.consume_tick() {
            if let Some(outcome) = self.tick(link, inputs)? {
                return Ok(Some(outcome));
            }
        }

        if self.net_timer.advance(elapsed) {
            self.arena.broadcast_snapshots(&mut *link);
        }
        Ok(None)
    }

    fn tick(&mut self, link: &mut dyn ServerLink, inputs: &mut InputQueue) -> Result<Option<PhaseOutcome>, ChannelError> {
        self.ticks += 1;

        if inputs.drain_quit() {
            return Ok(Some(PhaseOutcome::Quit));
        }

        let (events, messages) = link.poll()?;
        for event in events {
            match event {
                PeerEvent::Connect(peer) => {
                    log::info!("refusing {}, game in progress", peer);
                    link.disconnect_now(peer);
                }
                PeerEvent::Disconnect(peer) => {
                    log::info!("{} disconnected", peer);
                    replication::despawn_player(&mut self.arena.world, Despawn::Peer(peer), &mut *link);
                }
            }
        }
        for message in messages {
            match message.event {
                GameEvent::Input {
                    moving,
                    direction,
                    firing,
                } => {
                    self.arena.apply_input(message.peer, moving, direction, firing);
                }
                other => log::warn!("unexpected {:?} from {}", other, message.peer),
            }
        }

        self.arena.step(self.timestep.dt_secs(), &mut *link);

        if link.connected_peer_count() == 0 {
            log::info!("no players left");
            return Ok(Some(PhaseOutcome::NoPlayers));
        }
        if self.arena.is_game_over() {
            log::info!("game over");
            link.broadcast(&GameEvent::GameOver);
            return Ok(Some(PhaseOutcome::GameOver));
        }
        Ok(None)
    }
}

pub enum Phase {
    Waiting(WaitingForPlayers),
    Playing(MainLoop),
    Stopped,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Waiting(_) => "waiting for players",
            Phase::Playing(_) => "in game",
            Phase::Stopped => "stopped",
        }
    }

    pub fn arena(&self) -> Option<&Arena> {
        match self {
            Phase::Waiting(waiting) => Some(waiting.arena()),
            Phase::Playing(main) => Some(main.arena()),
            Phase::Stopped => None,
        }
    }
}

/// Cycles between the lobby and the game until told to quit. Every new lobby
/// starts from a fresh arena.
pub struct Session {
    phase: Phase,
    rates: TickRates,
    new_arena: Box<dyn FnMut() -> Arena>,
    games_played: u32,
}

impl Session {
    pub fn new(rates: TickRates, mut new_arena: Box<dyn FnMut() -> Arena>) -> Self {
        let phase = Phase::Waiting(WaitingForPlayers::new(new_arena()));
        Self {
            phase,
            rates,
            new_arena,
            games_played: 0,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn games_played(&self) -> u32 {
        self.games_played
    }

    /// Returns false once the server should shut down.
    pub fn frame(
        &mut self,
        elapsed: Duration,
        link: &mut dyn ServerLink,
        inputs: &mut InputQueue,
    ) -> Result<bool, ChannelError> {
        let outcome = match &mut self.phase {
            Phase::Waiting(waiting) => waiting.frame(link, inputs)?,
            Phase::Playing(main) => main.frame(elapsed, link, inputs)?,
            Phase::Stopped => return Ok(false),
        };
        let Some(outcome) = outcome else {
            return Ok(true);
        };

        self.phase = match (std::mem::replace(&mut self.phase, Phase::Stopped), outcome) {
            (_, PhaseOutcome::Quit) => Phase::Stopped,
            (Phase::Waiting(waiting), PhaseOutcome::Ready) => {
                log::info!("game started");
                Phase::Playing(MainLoop::new(waiting.into_arena(), self.rates))
            }
            (_, outcome) => {
                if outcome == PhaseOutcome::GameOver {
                    link.disconnect_all();
                }
                self.games_played += 1;
                log::info!("back to waiting for players");
                Phase::Waiting(WaitingForPlayers::new((self.new_arena)()))
            }
        };
        Ok(!matches!(self.phase, Phase::Stopped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Direction;
    use crate::net::{PeerId, Recorded, RecordingLink};
    use crate::player::ArenaRules;
    use crate::simulation::{InputEvent, Key};
    use crate::world::World;

    const FRAME: Duration = Duration::from_millis(16);

    fn arena(slots: usize) -> Arena {
        Arena::new(World::testing_ground(slots, ArenaRules::default()), 1)
    }

    fn full_lobby(link: &mut RecordingLink) -> MainLoop {
        let mut waiting = WaitingForPlayers::new(arena(2));
        let mut inputs = InputQueue::default();
        link.connect(PeerId::new(1));
        link.connect(PeerId::new(2));
        assert_eq!(waiting.frame(link, &mut inputs).unwrap(), Some(PhaseOutcome::Ready));
        link.clear();
        MainLoop::new(waiting.into_arena(), TickRates::default())
    }

    #[test]
    fn test_waiting_until_every_slot_taken() {
        let mut waiting = WaitingForPlayers::new(arena(2));
        let mut link = RecordingLink::new();
        let mut inputs = InputQueue::default();

        link.connect(PeerId::new(1));
        assert_eq!(waiting.frame(&mut link, &mut inputs).unwrap(), None);

        link.drop_peer(PeerId::new(1));
        link.connect(PeerId::new(2));
        assert_eq!(waiting.frame(&mut link, &mut inputs).unwrap(), None);
        assert_eq!(waiting.arena().world.slots.occupied_count(), 1);

        link.connect(PeerId::new(3));
        assert_eq!(
            waiting.frame(&mut link, &mut inputs).unwrap(),
            Some(PhaseOutcome::Ready)
        );
        assert_eq!(link.broadcasts().last(), Some(&GameEvent::Ready));
    }

    #[test]
    fn test_quit_key_in_lobby() {
        let mut waiting = WaitingForPlayers::new(arena(2));
        let mut link = RecordingLink::new();
        let mut inputs = InputQueue::default();
        inputs.push(InputEvent::Key {
            key: Key::Escape,
            pressed: true,
        });

        assert_eq!(
            waiting.frame(&mut link, &mut inputs).unwrap(),
            Some(PhaseOutcome::Quit)
        );
    }

    #[test]
    fn test_main_loop_refuses_newcomers() {
        let mut link = RecordingLink::new();
        let mut main = full_lobby(&mut link);
        let mut inputs = InputQueue::default();

        link.connect(PeerId::new(3));
        assert_eq!(main.frame(Duration::from_millis(40), &mut link, &mut inputs).unwrap(), None);

        assert!(link.records.contains(&Recorded::Dropped(PeerId::new(3))));
        assert_eq!(main.arena().world.slots.occupied_count(), 2);
    }

    #[test]
    fn test_input_moves_player() {
        let mut link = RecordingLink::new();
        let mut main = full_lobby(&mut link);
        let mut inputs = InputQueue::default();
        let start = main.arena().world.slots.get(0).unwrap().spawn_position;

        link.message(
            PeerId::new(1),
            GameEvent::Input {
                moving: true,
                direction: Direction::Right,
                firing: false,
            },
        );
        main.frame(Duration::from_millis(64), &mut link, &mut inputs).unwrap();

        let player = &main.arena().world.roster.players()[0];
        assert!(main.arena().world.position_of(player.body).x > start.x);
    }

    #[test]
    fn test_no_players_ends_game() {
        let mut link = RecordingLink::new();
        let mut main = full_lobby(&mut link);
        let mut inputs = InputQueue::default();

        link.drop_peer(PeerId::new(1));
        link.drop_peer(PeerId::new(2));
        assert_eq!(
            main.frame(Duration::from_millis(32), &mut link, &mut inputs).unwrap(),
            Some(PhaseOutcome::NoPlayers)
        );
    }

    #[test]
    fn test_last_player_standing_wins() {
        let mut link = RecordingLink::new();
        let mut main = full_lobby(&mut link);
        let mut inputs = InputQueue::default();

        link.drop_peer(PeerId::new(2));
        assert_eq!(
            main.frame(Duration::from_millis(32), &mut link, &mut inputs).unwrap(),
            Some(PhaseOutcome::GameOver)
        );
        assert_eq!(link.broadcasts().last(), Some(&GameEvent::GameOver));
    }

    #[test]
    fn test_tick_accumulator_converges() {
        let mut link = RecordingLink::new();
        let mut main = full_lobby(&mut link);
        let mut inputs = InputQueue::default();
        let frames = [5u64, 17, 33, 1, 48, 250, 3, 16, 16, 90];

        let mut total = Duration::ZERO;
        for ms in frames {
            let elapsed = Duration::from_millis(ms);
            total += elapsed;
            main.frame(elapsed, &mut link, &mut inputs).unwrap();
            assert!(main.residual() < Duration::from_millis(32));
        }

        let expected = (total.as_millis() / 32) as u64;
        assert!(main.ticks().abs_diff(expected) <= 1);
    }

    #[test]
    fn test_snapshots_at_most_once_per_frame() {
        let mut link = RecordingLink::new();
        let mut main = full_lobby(&mut link);
        let mut inputs = InputQueue::default();

        main.frame(FRAME, &mut link, &mut inputs).unwrap();
        assert!(link.broadcasts().iter().all(|e| !e.is_snapshot()));

        main.frame(Duration::from_millis(500), &mut link, &mut inputs).unwrap();
        let snapshots = link
            .broadcasts()
            .into_iter()
            .filter(|e| matches!(e, GameEvent::PlayerState { .. }))
            .count();
        assert_eq!(snapshots, 2, "one state per player, sent once");
    }

    #[test]
    fn test_session_cycles_back_to_lobby() {
        let mut link = RecordingLink::new();
        let mut inputs = InputQueue::default();
        let mut session = Session::new(TickRates::default(), Box::new(|| arena(2)));

        link.connect(PeerId::new(1));
        link.connect(PeerId::new(2));
        assert!(session.frame(FRAME, &mut link, &mut inputs).unwrap());
        assert_eq!(session.phase().name(), "in game");

        link.drop_peer(PeerId::new(2));
        assert!(session.frame(Duration::from_millis(32), &mut link, &mut inputs).unwrap());
        assert_eq!(session.phase().name(), "waiting for players");
        assert_eq!(session.games_played(), 1);
        assert_eq!(link.connected_peer_count(), 0, "everyone is dropped after game over");
        assert_eq!(session.phase().arena().unwrap().world.slots.occupied_count(), 0);

        inputs.push(InputEvent::Quit);
        assert!(!session.frame(FRAME, &mut link, &mut inputs).unwrap());
        assert_eq!(session.phase().name(), "stopped");
    }
}
