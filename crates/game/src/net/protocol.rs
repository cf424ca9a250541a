use std::io::{Read, Write};

use bitflags::bitflags;

use crate::codec::{CodecError, Encode, Endian, Reader, Writer};

pub const MAX_PACKET_SIZE: usize = 1200;
pub const PROTOCOL_VERSION: u16 = 1;
pub const PROTOCOL_MAGIC: u32 = 0x4152_4E41;
pub const DEFAULT_PORT: u16 = 6543;
pub const DEFAULT_CHANNEL_COUNT: u8 = 2;

const SEQUENCE_WRAP_THRESHOLD: u32 = u32::MAX / 2;

/// magic u32, version u16, kind u8, sequence u32, ack u32, ack_bitfield u32
pub const HEADER_SIZE: usize = 19;
/// channel u8, flags u8, message id u32, payload length u16
pub const FRAME_OVERHEAD: usize = 8;
pub const MAX_PAYLOAD_SIZE: usize = MAX_PACKET_SIZE - HEADER_SIZE - FRAME_OVERHEAD;

#[inline]
pub fn sequence_greater_than(s1: u32, s2: u32) -> bool {
    ((s1 > s2) && (s1 - s2 <= SEQUENCE_WRAP_THRESHOLD))
        || ((s1 < s2) && (s2 - s1 > SEQUENCE_WRAP_THRESHOLD))
}

bitflags! {
    /// Delivery class of one message. No flags means unreliable but
    /// sequenced: stale messages are dropped instead of delivered late.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PacketFlags: u8 {
        /// Retransmitted until acknowledged and delivered in order per channel.
        const RELIABLE = 1 << 0;
        /// Neither retransmitted nor ordered.
        const UNSEQUENCED = 1 << 1;
    }
}

impl PacketFlags {
    pub fn is_reliable(self) -> bool {
        self.contains(PacketFlags::RELIABLE)
    }

    pub fn is_unsequenced(self) -> bool {
        !self.is_reliable() && self.contains(PacketFlags::UNSEQUENCED)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Connect,
    Accept,
    Deny,
    Disconnect,
    Ping,
    Ack,
    Message,
}

impl PacketKind {
    fn to_u8(self) -> u8 {
        match self {
            PacketKind::Connect => 0,
            PacketKind::Accept => 1,
            PacketKind::Deny => 2,
            PacketKind::Disconnect => 3,
            PacketKind::Ping => 4,
            PacketKind::Ack => 5,
            PacketKind::Message => 6,
        }
    }

    fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => PacketKind::Connect,
            1 => PacketKind::Accept,
            2 => PacketKind::Deny,
            3 => PacketKind::Disconnect,
            4 => PacketKind::Ping,
            5 => PacketKind::Ack,
            6 => PacketKind::Message,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub magic: u32,
    pub version: u16,
    pub kind: PacketKind,
    pub sequence: u32,
    pub ack: u32,
    pub ack_bitfield: u32,
}

impl PacketHeader {
    pub fn new(kind: PacketKind, sequence: u32, ack: u32, ack_bitfield: u32) -> Self {
        Self {
            magic: PROTOCOL_MAGIC,
            version: PROTOCOL_VERSION,
            kind,
            sequence,
            ack,
            ack_bitfield,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.magic == PROTOCOL_MAGIC && self.version == PROTOCOL_VERSION
    }
}

impl Encode for PacketHeader {
    fn encode<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), CodecError> {
        writer.try_write(&self.magic)?;
        writer.try_write(&self.version)?;
        writer.try_write(&self.kind.to_u8())?;
        writer.try_write(&self.sequence)?;
        writer.try_write(&self.ack)?;
        writer.try_write(&self.ack_bitfield)
    }
}

/// One application message inside a datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFrame {
    pub channel: u8,
    pub flags: PacketFlags,
    pub message_id: u32,
    pub payload: Vec<u8>,
}

impl Encode for MessageFrame {
    fn encode<W: Write>(&self, writer: &mut Writer<W>) -> Result<(), CodecError> {
        writer.try_write(&self.channel)?;
        writer.try_write(&self.flags.bits())?;
        writer.try_write(&self.message_id)?;
        writer.try_write(&(self.payload.len() as u16))?;
        writer.write_bytes(&self.payload)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub header: PacketHeader,
    pub frame: Option<MessageFrame>,
}

#[derive(Debug, thiserror::Error)]
pub enum PacketError {
    #[error("malformed packet: {0}")]
    Codec(#[from] CodecError),
    #[error("bad magic {0:#010x}")]
    BadMagic(u32),
    #[error("unsupported protocol version {0}")]
    UnsupportedVersion(u16),
    #[error("unknown packet kind {0}")]
    UnknownKind(u8),
    #[error("unknown packet flags {0:#04x}")]
    UnknownFlags(u8),
    #[error("payload of {0} bytes exceeds the packet size")]
    PayloadTooLarge(usize),
    #[error("{0} trailing bytes after packet")]
    TrailingBytes(usize),
}

impl Packet {
    pub fn control(kind: PacketKind, sequence: u32, ack: u32, ack_bitfield: u32) -> Self {
        Self {
            header: PacketHeader::new(kind, sequence, ack, ack_bitfield),
            frame: None,
        }
    }

    pub fn message(sequence: u32, ack: u32, ack_bitfield: u32, frame: MessageFrame) -> Self {
        Self {
            header: PacketHeader::new(PacketKind::Message, sequence, ack, ack_bitfield),
            frame: Some(frame),
        }
    }

    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        if let Some(frame) = &self.frame {
            if frame.payload.len() > MAX_PAYLOAD_SIZE {
                return Err(PacketError::PayloadTooLarge(frame.payload.len()));
            }
        }

        let mut writer = Writer::with_endian(Vec::with_capacity(MAX_PACKET_SIZE), Endian::Big);
        writer.try_write(&self.header)?;
        if let Some(frame) = &self.frame {
            writer.try_write(frame)?;
        }
        Ok(writer.into_inner())
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, PacketError> {
        let mut reader = Reader::with_endian(bytes, Endian::Big);

        let magic: u32 = reader.try_read()?;
        if magic != PROTOCOL_MAGIC {
            return Err(PacketError::BadMagic(magic));
        }
        let version: u16 = reader.try_read()?;
        if version != PROTOCOL_VERSION {
            return Err(PacketError::UnsupportedVersion(version));
        }
        let raw_kind: u8 = reader.try_read()?;
        let kind = PacketKind::from_u8(raw_kind).ok_or(PacketError::UnknownKind(raw_kind))?;

        let header = PacketHeader {
            magic,
            version,
            kind,
            sequence: reader.try_read()?,
            ack: reader.try_read()?,
            ack_bitfield: reader.try_read()?,
        };

        let frame = match kind {
            PacketKind::Message => Some(read_frame(&mut reader)?),
            _ => None,
        };

        if reader.remaining() != 0 {
            return Err(PacketError::TrailingBytes(reader.remaining()));
        }

        Ok(Self { header, frame })
    }
}

fn read_frame<R: Read>(reader: &mut Reader<R>) -> Result<MessageFrame, PacketError> {
    let channel: u8 = reader.try_read()?;
    let raw_flags: u8 = reader.try_read()?;
    let flags = PacketFlags::from_bits(raw_flags).ok_or(PacketError::UnknownFlags(raw_flags))?;
    let message_id: u32 = reader.try_read()?;
    let len = reader.try_read::<u16>()? as usize;
    if len > MAX_PAYLOAD_SIZE {
        return Err(PacketError::PayloadTooLarge(len));
    }

    let mut payload = vec![0u8; len];
    reader.read_bytes(&mut payload)?;

    Ok(MessageFrame {
        channel,
        flags,
        message_id,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = PacketHeader::new(PacketKind::Ping, 0, 0, 0);
        assert_eq!(crate::codec::to_bytes(&header, Endian::Big).len(), HEADER_SIZE);

        let bytes = Packet::control(PacketKind::Accept, 1, 2, 3).serialize().unwrap();
        assert_eq!(&bytes[..4], &PROTOCOL_MAGIC.to_be_bytes());
        assert_eq!(&bytes[4..6], &PROTOCOL_VERSION.to_be_bytes());
        assert_eq!(bytes[6], 1);
        assert_eq!(&bytes[7..11], &1u32.to_be_bytes());
    }

    #[test]
    fn test_message_packet() {
        let frame = MessageFrame {
            channel: 1,
            flags: PacketFlags::UNSEQUENCED,
            message_id: 42,
            payload: vec![9, 8, 7],
        };
        let packet = Packet::message(5, 4, 0b1011, frame.clone());
        let bytes = packet.serialize().unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE + FRAME_OVERHEAD + 3);

        let decoded = Packet::deserialize(&bytes).unwrap();
        assert_eq!(decoded.header.kind, PacketKind::Message);
        assert_eq!(decoded.header.ack_bitfield, 0b1011);
        assert_eq!(decoded.frame, Some(frame));
    }

    #[test]
    fn test_rejects_foreign_datagrams() {
        let mut bytes = Packet::control(PacketKind::Ping, 0, 0, 0).serialize().unwrap();
        bytes[0] ^= 0xff;
        assert!(matches!(
            Packet::deserialize(&bytes),
            Err(PacketError::BadMagic(_))
        ));

        assert!(matches!(
            Packet::deserialize(&[0x41, 0x52]),
            Err(PacketError::Codec(CodecError::UnexpectedEof))
        ));
    }

    #[test]
    fn test_rejects_unknown_kind_and_trailing_bytes() {
        let mut bytes = Packet::control(PacketKind::Ping, 0, 0, 0).serialize().unwrap();
        bytes[6] = 99;
        assert!(matches!(
            Packet::deserialize(&bytes),
            Err(PacketError::UnknownKind(99))
        ));

        let mut bytes = Packet::control(PacketKind::Ping, 0, 0, 0).serialize().unwrap();
        bytes.push(0);
        assert!(matches!(
            Packet::deserialize(&bytes),
            Err(PacketError::TrailingBytes(1))
        ));
    }

    #[test]
    fn test_oversized_payload_refused() {
        let frame = MessageFrame {
            channel: 0,
            flags: PacketFlags::RELIABLE,
            message_id: 0,
            payload: vec![0; MAX_PAYLOAD_SIZE + 1],
        };
        assert!(matches!(
            Packet::message(0, 0, 0, frame).serialize(),
            Err(PacketError::PayloadTooLarge(_))
        ));
    }

    #[test]
    fn test_sequence_wrap() {
        assert!(sequence_greater_than(1, 0));
        assert!(sequence_greater_than(0, u32::MAX));
        assert!(!sequence_greater_than(u32::MAX, 0));
    }
}
