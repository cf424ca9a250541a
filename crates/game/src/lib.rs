pub mod codec;
pub mod event;
pub mod map;
pub mod net;
pub mod physics;
pub mod player;
pub mod replication;
pub mod simulation;
pub mod world;

pub use codec::{copy_span, CodecError, Decode, Encode, Endian, Reader, Writer};
pub use event::{Delivery, Direction, GameEvent, PowerupType, ProtocolError};
pub use map::{ArenaMap, TileKind};
pub use net::{
    ChannelError, ClientEvent, EventSink, Host, HostConfig, Incoming, LinkSimulation, NetClient,
    NetServer, NetworkStats, PacketFlags, PeerEvent, PeerId, ServerLink, DEFAULT_PORT,
};
pub use physics::{Physics, PhysicsWorld};
pub use player::{ArenaRules, PlayerController, PlayerState};
pub use replication::{despawn_player, spawn_player, ClientView, Despawn, SlotTable};
pub use simulation::{
    Arena, FixedTimestep, InputEvent, InputQueue, Key, MainLoop, NetTimer, Phase, PhaseOutcome,
    Session, TickRates, WaitingForPlayers,
};
pub use world::{EntityId, World};
