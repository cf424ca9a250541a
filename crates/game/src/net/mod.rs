mod host;
mod peer;
mod protocol;
mod reconnect;
#[cfg(any(test, feature = "test-util"))]
mod recording;
mod server;
mod simulator;
mod stats;
mod tracking;
pub mod transport;

pub use host::{ChannelError, Host, HostConfig, PeerEvent, Received};
pub use peer::{PeerId, PeerState};
pub use protocol::{
    sequence_greater_than, MessageFrame, Packet, PacketError, PacketFlags, PacketHeader,
    PacketKind, DEFAULT_CHANNEL_COUNT, DEFAULT_PORT, MAX_PACKET_SIZE, MAX_PAYLOAD_SIZE,
    PROTOCOL_MAGIC, PROTOCOL_VERSION,
};
pub use reconnect::{Reconnector, DEFAULT_RETRY_INTERVAL};
#[cfg(any(test, feature = "test-util"))]
pub use recording::{Recorded, RecordingLink};
pub use server::{ClientEvent, EventSink, Incoming, NetClient, NetServer, ServerLink};
pub use simulator::{LinkSimulation, LinkSimulator};
pub use stats::NetworkStats;
pub use tracking::{is_acked, ReceiveWindow, RttEstimator};
pub use transport::{
    bind_datagram, connect_datagram, connect_stream, listen, resolve, resolve_host,
    AddressFamily, BlockingMode, DatagramSocket, Endpoint, Protocol, StreamConnection,
    StreamConnector, StreamListener, TransportError,
};
