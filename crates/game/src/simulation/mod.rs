mod arena;
mod command;
mod phase;
mod tick;

pub use arena::Arena;
pub use command::{InputEvent, InputQueue, Key};
pub use phase::{MainLoop, Phase, PhaseOutcome, Session, WaitingForPlayers};
pub use tick::{FixedTimestep, NetTimer, TickRates};
