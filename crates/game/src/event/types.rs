use glam::Vec2;

use crate::net::PacketFlags;

/// Channel carrying ordered gameplay events.
pub const EVENT_CHANNEL: u8 = 0;
/// Channel carrying position snapshots.
pub const SNAPSHOT_CHANNEL: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
    UpLeft,
    UpRight,
    DownLeft,
    DownRight,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
        Direction::UpLeft,
        Direction::UpRight,
        Direction::DownLeft,
        Direction::DownRight,
    ];

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    /// Unit vector for this direction, y pointing up.
    pub fn to_vec(self) -> Vec2 {
        let v = match self {
            Direction::Up => Vec2::new(0.0, 1.0),
            Direction::Down => Vec2::new(0.0, -1.0),
            Direction::Left => Vec2::new(-1.0, 0.0),
            Direction::Right => Vec2::new(1.0, 0.0),
            Direction::UpLeft => Vec2::new(-1.0, 1.0),
            Direction::UpRight => Vec2::new(1.0, 1.0),
            Direction::DownLeft => Vec2::new(-1.0, -1.0),
            Direction::DownRight => Vec2::new(1.0, -1.0),
        };
        v.normalize()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PowerupType {
    PlayerHeal,
    PlayerSpeed,
    PlayerReloadSpeed,
    BulletBounce,
    BulletDamage,
    BulletSpeed,
}

impl PowerupType {
    pub const ALL: [PowerupType; 6] = [
        PowerupType::PlayerHeal,
        PowerupType::PlayerSpeed,
        PowerupType::PlayerReloadSpeed,
        PowerupType::BulletBounce,
        PowerupType::BulletDamage,
        PowerupType::BulletSpeed,
    ];

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            PowerupType::PlayerHeal => "heal",
            PowerupType::PlayerSpeed => "speed",
            PowerupType::PlayerReloadSpeed => "reload",
            PowerupType::BulletBounce => "bounce",
            PowerupType::BulletDamage => "damage",
            PowerupType::BulletSpeed => "bullet speed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub channel: u8,
    pub flags: PacketFlags,
}

impl Delivery {
    pub const RELIABLE: Delivery = Delivery {
        channel: EVENT_CHANNEL,
        flags: PacketFlags::RELIABLE,
    };

    pub const SNAPSHOT: Delivery = Delivery {
        channel: SNAPSHOT_CHANNEL,
        flags: PacketFlags::UNSEQUENCED,
    };
}

/// Every message the server and clients exchange. Wire tags follow
/// declaration order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GameEvent {
    Spawn {
        slot: u8,
        is_self: bool,
    },
    Despawn {
        slot: u8,
    },
    Input {
        moving: bool,
        direction: Direction,
        firing: bool,
    },
    PlayerState {
        slot: u8,
        position: Vec2,
        velocity: Vec2,
        direction: Direction,
    },
    SpawnBullet {
        slot: u8,
        id: u32,
        position: Vec2,
        velocity: Vec2,
    },
    BulletState {
        id: u32,
        position: Vec2,
        velocity: Vec2,
    },
    DespawnBullet {
        id: u32,
    },
    SpawnPowerup {
        kind: PowerupType,
        id: u32,
        position: Vec2,
    },
    DespawnPowerup {
        id: u32,
    },
    SetHp {
        slot: u8,
        hp: u32,
    },
    SetPowerupTimer {
        slot: u8,
        kind: PowerupType,
        seconds: f32,
    },
    ClearPowerupTimer {
        slot: u8,
        kind: PowerupType,
    },
    Ready,
    GameOver,
}

impl GameEvent {
    pub fn tag(&self) -> u8 {
        match self {
            Self::Spawn { .. } => 0,
            Self::Despawn { .. } => 1,
            Self::Input { .. } => 2,
            Self::PlayerState { .. } => 3,
            Self::SpawnBullet { .. } => 4,
            Self::BulletState { .. } => 5,
            Self::DespawnBullet { .. } => 6,
            Self::SpawnPowerup { .. } => 7,
            Self::DespawnPowerup { .. } => 8,
            Self::SetHp { .. } => 9,
            Self::SetPowerupTimer { .. } => 10,
            Self::ClearPowerupTimer { .. } => 11,
            Self::Ready => 12,
            Self::GameOver => 13,
        }
    }

    pub fn delivery(&self) -> Delivery {
        match self {
            Self::PlayerState { .. } | Self::BulletState { .. } => Delivery::SNAPSHOT,

            Self::Spawn { .. }
            | Self::Despawn { .. }
            | Self::Input { .. }
            | Self::SpawnBullet { .. }
            | Self::DespawnBullet { .. }
            | Self::SpawnPowerup { .. }
            | Self::DespawnPowerup { .. }
            | Self::SetHp { .. }
            | Self::SetPowerupTimer { .. }
            | Self::ClearPowerupTimer { .. }
            | Self::Ready
            | Self::GameOver => Delivery::RELIABLE,
        }
    }

    pub fn is_snapshot(&self) -> bool {
        self.delivery() == Delivery::SNAPSHOT
    }
}
