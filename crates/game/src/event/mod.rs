mod types;
mod wire;

pub use types::{Delivery, Direction, GameEvent, PowerupType, EVENT_CHANNEL, SNAPSHOT_CHANNEL};
pub use wire::ProtocolError;
