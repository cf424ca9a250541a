use std::io::{Read, Write};

use glam::Vec2;

use super::types::{Direction, GameEvent, PowerupType};
use crate::codec::{CodecError, Encode, Endian, Reader, Writer};

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("unknown event tag {0}")]
    UnknownTag(u8),
    #[error("invalid {field} byte {value}")]
    InvalidField { field: &'static str, value: u8 },
    #[error("truncated event")]
    Truncated,
    #[error("{0} trailing bytes after event")]
    TrailingBytes(usize),
    #[error(transparent)]
    Codec(CodecError),
}

impl From<CodecError> for ProtocolError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::UnexpectedEof => ProtocolError::Truncated,
            other => ProtocolError::Codec(other),
        }
    }
}

// Tag first, then fields in declaration order.
impl Encode for GameEvent {
    fn encode<W: Write>(&self, w: &mut Writer<W>) -> Result<(), CodecError> {
        w.try_write(&self.tag())?;
        match *self {
            GameEvent::Spawn { slot, is_self } => {
                w.try_write(&slot)?;
                w.try_write(&is_self)
            }
            GameEvent::Despawn { slot } => w.try_write(&slot),
            GameEvent::Input {
                moving,
                direction,
                firing,
            } => {
                w.try_write(&moving)?;
                w.try_write(&direction.to_u8())?;
                w.try_write(&firing)
            }
            GameEvent::PlayerState {
                slot,
                position,
                velocity,
                direction,
            } => {
                w.try_write(&slot)?;
                w.try_write(&position)?;
                w.try_write(&velocity)?;
                w.try_write(&direction.to_u8())
            }
            GameEvent::SpawnBullet {
                slot,
                id,
                position,
                velocity,
            } => {
                w.try_write(&slot)?;
                w.try_write(&id)?;
                w.try_write(&position)?;
                w.try_write(&velocity)
            }
            GameEvent::BulletState {
                id,
                position,
                velocity,
            } => {
                w.try_write(&id)?;
                w.try_write(&position)?;
                w.try_write(&velocity)
            }
            GameEvent::DespawnBullet { id } => w.try_write(&id),
            GameEvent::SpawnPowerup { kind, id, position } => {
                w.try_write(&kind.to_u8())?;
                w.try_write(&id)?;
                w.try_write(&position)
            }
            GameEvent::DespawnPowerup { id } => w.try_write(&id),
            GameEvent::SetHp { slot, hp } => {
                w.try_write(&slot)?;
                w.try_write(&hp)
            }
            GameEvent::SetPowerupTimer {
                slot,
                kind,
                seconds,
            } => {
                w.try_write(&slot)?;
                w.try_write(&kind.to_u8())?;
                w.try_write(&seconds)
            }
            GameEvent::ClearPowerupTimer { slot, kind } => {
                w.try_write(&slot)?;
                w.try_write(&kind.to_u8())
            }
            GameEvent::Ready | GameEvent::GameOver => Ok(()),
        }
    }
}

fn read_bool<R: Read>(r: &mut Reader<R>, field: &'static str) -> Result<bool, ProtocolError> {
    match r.try_read::<bool>() {
        Ok(value) => Ok(value),
        Err(CodecError::InvalidBool(value)) => Err(ProtocolError::InvalidField { field, value }),
        Err(e) => Err(e.into()),
    }
}

fn read_direction<R: Read>(r: &mut Reader<R>) -> Result<Direction, ProtocolError> {
    let value: u8 = r.try_read()?;
    Direction::from_u8(value).ok_or(ProtocolError::InvalidField {
        field: "direction",
        value,
    })
}

fn read_powerup<R: Read>(r: &mut Reader<R>) -> Result<PowerupType, ProtocolError> {
    let value: u8 = r.try_read()?;
    PowerupType::from_u8(value).ok_or(ProtocolError::InvalidField {
        field: "powerup type",
        value,
    })
}

fn read_event<R: Read>(r: &mut Reader<R>) -> Result<GameEvent, ProtocolError> {
    let tag: u8 = r.try_read()?;
    let event = match tag {
        0 => GameEvent::Spawn {
            slot: r.try_read()?,
            is_self: read_bool(r, "is_self")?,
        },
        1 => GameEvent::Despawn { slot: r.try_read()? },
        2 => GameEvent::Input {
            moving: read_bool(r, "moving")?,
            direction: read_direction(r)?,
            firing: read_bool(r, "firing")?,
        },
        3 => GameEvent::PlayerState {
            slot: r.try_read()?,
            position: r.try_read::<Vec2>()?,
            velocity: r.try_read::<Vec2>()?,
            direction: read_direction(r)?,
        },
        4 => GameEvent::SpawnBullet {
            slot: r.try_read()?,
            id: r.try_read()?,
            position: r.try_read::<Vec2>()?,
            velocity: r.try_read::<Vec2>()?,
        },
        5 => GameEvent::BulletState {
            id: r.try_read()?,
            position: r.try_read::<Vec2>()?,
            velocity: r.try_read::<Vec2>()?,
        },
        6 => GameEvent::DespawnBullet { id: r.try_read()? },
        7 => GameEvent::SpawnPowerup {
            kind: read_powerup(r)?,
            id: r.try_read()?,
            position: r.try_read::<Vec2>()?,
        },
        8 => GameEvent::DespawnPowerup { id: r.try_read()? },
        9 => GameEvent::SetHp {
            slot: r.try_read()?,
            hp: r.try_read()?,
        },
        10 => GameEvent::SetPowerupTimer {
            slot: r.try_read()?,
            kind: read_powerup(r)?,
            seconds: r.try_read()?,
        },
        11 => GameEvent::ClearPowerupTimer {
            slot: r.try_read()?,
            kind: read_powerup(r)?,
        },
        12 => GameEvent::Ready,
        13 => GameEvent::GameOver,
        other => return Err(ProtocolError::UnknownTag(other)),
    };
    Ok(event)
}

impl GameEvent {
    pub fn to_bytes(&self) -> Vec<u8> {
        crate::codec::to_bytes(self, Endian::Big)
    }

    /// Decodes exactly one event; leftover bytes are an error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = Reader::with_endian(bytes, Endian::Big);
        let event = read_event(&mut reader)?;
        match reader.remaining() {
            0 => Ok(event),
            n => Err(ProtocolError::TrailingBytes(n)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spawn_layout() {
        let bytes = GameEvent::Spawn {
            slot: 2,
            is_self: true,
        }
        .to_bytes();
        assert_eq!(bytes, vec![0, 2, 1]);
    }

    #[test]
    fn test_player_state_layout() {
        let bytes = GameEvent::PlayerState {
            slot: 1,
            position: Vec2::new(1.0, 2.0),
            velocity: Vec2::new(-1.0, 0.0),
            direction: Direction::Right,
        }
        .to_bytes();

        assert_eq!(bytes.len(), 1 + 1 + 8 + 8 + 1);
        assert_eq!(bytes[0], 3);
        assert_eq!(&bytes[2..6], &1.0f32.to_be_bytes());
        assert_eq!(&bytes[10..14], &(-1.0f32).to_be_bytes());
        assert_eq!(bytes[18], 3);
    }

    #[test]
    fn test_every_variant_decodes() {
        let events = [
            GameEvent::Spawn {
                slot: 3,
                is_self: false,
            },
            GameEvent::Despawn { slot: 1 },
            GameEvent::Input {
                moving: true,
                direction: Direction::DownLeft,
                firing: false,
            },
            GameEvent::SpawnBullet {
                slot: 0,
                id: 77,
                position: Vec2::new(5.0, 6.0),
                velocity: Vec2::new(500.0, 0.0),
            },
            GameEvent::DespawnBullet { id: 77 },
            GameEvent::SpawnPowerup {
                kind: PowerupType::BulletBounce,
                id: 78,
                position: Vec2::new(96.0, 32.0),
            },
            GameEvent::DespawnPowerup { id: 78 },
            GameEvent::SetHp { slot: 2, hp: 90 },
            GameEvent::SetPowerupTimer {
                slot: 2,
                kind: PowerupType::PlayerSpeed,
                seconds: 8.0,
            },
            GameEvent::ClearPowerupTimer {
                slot: 2,
                kind: PowerupType::PlayerSpeed,
            },
            GameEvent::Ready,
            GameEvent::GameOver,
        ];

        for event in events {
            assert_eq!(GameEvent::from_bytes(&event.to_bytes()).unwrap(), event);
        }
    }

    fn snapshots() -> [GameEvent; 2] {
        [
            GameEvent::PlayerState {
                slot: 3,
                position: Vec2::new(123.25, -7.5),
                velocity: Vec2::new(-141.42136, 141.42136),
                direction: Direction::UpLeft,
            },
            GameEvent::BulletState {
                id: 0xDEAD_BEEF,
                position: Vec2::new(f32::MIN_POSITIVE, 1.0e6),
                velocity: Vec2::new(875.0, -0.0),
            },
        ]
    }

    #[test]
    fn test_snapshots_decode_exactly() {
        for event in snapshots() {
            let decoded = GameEvent::from_bytes(&event.to_bytes()).unwrap();
            match (decoded, event) {
                (
                    GameEvent::PlayerState {
                        slot,
                        position,
                        velocity,
                        direction,
                    },
                    GameEvent::PlayerState {
                        slot: s,
                        position: p,
                        velocity: v,
                        direction: d,
                    },
                ) => {
                    assert_eq!(slot, s);
                    assert_eq!(position.to_array().map(f32::to_bits), p.to_array().map(f32::to_bits));
                    assert_eq!(velocity.to_array().map(f32::to_bits), v.to_array().map(f32::to_bits));
                    assert_eq!(direction, d);
                }
                (
                    GameEvent::BulletState { id, position, velocity },
                    GameEvent::BulletState {
                        id: i,
                        position: p,
                        velocity: v,
                    },
                ) => {
                    assert_eq!(id, i);
                    assert_eq!(position.to_array().map(f32::to_bits), p.to_array().map(f32::to_bits));
                    assert_eq!(velocity.to_array().map(f32::to_bits), v.to_array().map(f32::to_bits));
                }
                other => panic!("decoded into a different variant: {other:?}"),
            }
        }
    }

    #[test]
    fn test_truncated_snapshots() {
        for event in snapshots() {
            let bytes = event.to_bytes();
            assert_eq!(bytes.len(), if event.tag() == 3 { 19 } else { 21 });
            assert!(matches!(
                GameEvent::from_bytes(&bytes[..bytes.len() - 1]),
                Err(ProtocolError::Truncated)
            ));
        }
    }

    #[test]
    fn test_unknown_tag() {
        assert!(matches!(
            GameEvent::from_bytes(&[14]),
            Err(ProtocolError::UnknownTag(14))
        ));
        assert!(matches!(
            GameEvent::from_bytes(&[]),
            Err(ProtocolError::Truncated)
        ));
    }

    #[test]
    fn test_out_of_range_fields() {
        assert!(matches!(
            GameEvent::from_bytes(&[2, 1, 8, 0]),
            Err(ProtocolError::InvalidField {
                field: "direction",
                value: 8
            })
        ));
        assert!(matches!(
            GameEvent::from_bytes(&[0, 1, 2]),
            Err(ProtocolError::InvalidField { value: 2, .. })
        ));
        assert!(matches!(
            GameEvent::from_bytes(&[11, 0, 6]),
            Err(ProtocolError::InvalidField {
                field: "powerup type",
                ..
            })
        ));
    }

    #[test]
    fn test_truncated_and_trailing() {
        let bytes = GameEvent::SetHp { slot: 1, hp: 50 }.to_bytes();
        assert!(matches!(
            GameEvent::from_bytes(&bytes[..bytes.len() - 1]),
            Err(ProtocolError::Truncated)
        ));

        let mut long = bytes.clone();
        long.push(0);
        assert!(matches!(
            GameEvent::from_bytes(&long),
            Err(ProtocolError::TrailingBytes(1))
        ));
    }
}
