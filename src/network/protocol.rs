//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! Every message is one binary frame holding a fixed-size record:
//! a kind byte followed by little-endian fields, no variable-length parts.
//!
//! | Message      | Direction       | Layout                                        | Bytes |
//! |--------------|-----------------|-----------------------------------------------|-------|
//! | Hello        | server → joiner | kind, id:u32, x:f32, y:f32, hue:u8            | 14    |
//! | PlayerJoined | server → all    | kind, id:u32, x:f32, y:f32, hue:u8, moving:u8 | 15    |
//! | PlayerLeft   | server → all    | kind, id:u32                                  | 5     |
//! | PlayerMoving | server → all    | kind, id:u32, x:f32, y:f32, moving:u8         | 14    |
//! | AmmaMoving   | client → server | kind, direction:u8, start:u8                  | 3     |
//! | Ping         | client → server | kind, timestamp:f64                           | 9     |
//! | Pong         | server → client | kind, timestamp:f64                           | 9     |
//!
//! Layouts are declared once in the `wire_messages!` table; kinds, sizes and
//! the bincode-backed encoders and decoders all come from that table.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::vec2::Vec2;
use crate::game::events::GameEventData;
use crate::game::input::{Direction, MoveMask};
use crate::game::state::PlayerId;

// =============================================================================
// ERRORS
// =============================================================================

/// Reasons a record is rejected. Every one of them is a protocol violation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Zero-length frame.
    #[error("empty message")]
    Empty,

    /// Kind byte matches no message.
    #[error("unknown message kind {0}")]
    UnknownKind(u8),

    /// Known kind, but not one accepted here.
    #[error("unexpected {found:?} message, expected {expected}")]
    UnexpectedKind {
        /// What the decoder accepts
        expected: &'static str,
        /// What arrived
        found: MessageKind,
    },

    /// Record length does not match the kind's fixed size.
    #[error("{kind:?} message must be {expected} bytes, got {actual}")]
    WrongLength {
        /// Kind from the first byte
        kind: MessageKind,
        /// Fixed size of that kind
        expected: usize,
        /// Bytes received
        actual: usize,
    },

    /// A field failed to encode or decode, e.g. a direction byte above 3.
    #[error("bad record body: {0}")]
    Codec(String),

    /// Text frames carry no protocol records.
    #[error("text frames are not part of the protocol")]
    TextFrame,
}

impl From<bincode::Error> for WireError {
    fn from(e: bincode::Error) -> Self {
        WireError::Codec(e.to_string())
    }
}

// =============================================================================
// FIELDS
// =============================================================================

/// Hue quantized to one byte: `byte = floor(degrees / 360 * 256)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Hue(pub u8);

impl Hue {
    /// Width of one quantization step, in degrees.
    pub const STEP: f32 = 360.0 / 256.0;

    /// Quantize whole degrees. Values past 359 wrap around the circle.
    pub fn from_degrees(degrees: u16) -> Self {
        let degrees = u32::from(degrees % 360);
        Hue((degrees * 256 / 360) as u8)
    }

    /// Rescale back to degrees: `byte / 256 * 360`.
    pub fn degrees(self) -> f32 {
        f32::from(self.0) / 256.0 * 360.0
    }
}

/// Start/stop byte of a movement intent. Any non-zero value means start.
mod start_flag {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(start: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*start))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        u8::deserialize(deserializer).map(|byte| byte != 0)
    }
}

/// Read the kind byte without checking anything else.
pub fn peek_kind(bytes: &[u8]) -> Result<MessageKind, WireError> {
    let first = *bytes.first().ok_or(WireError::Empty)?;
    MessageKind::from_byte(first).ok_or(WireError::UnknownKind(first))
}

/// Check kind and length, then hand back the body after the kind byte.
fn record_body(expected: MessageKind, bytes: &[u8]) -> Result<&[u8], WireError> {
    let found = peek_kind(bytes)?;
    if found != expected {
        return Err(WireError::UnexpectedKind {
            expected: expected.name(),
            found,
        });
    }
    if bytes.len() != expected.size() {
        return Err(WireError::WrongLength {
            kind: expected,
            expected: expected.size(),
            actual: bytes.len(),
        });
    }
    Ok(&bytes[1..])
}

// =============================================================================
// MESSAGE SCHEMA
// =============================================================================

/// Declares every record: kind byte, total size, then the ordered fields.
///
/// Bodies go through bincode's default options, which write fixed-width
/// little-endian integers and floats with no framing of their own.
macro_rules! wire_messages {
    ($(
        $(#[$meta:meta])*
        $name:ident = $kind:literal, $size:literal {
            $( $(#[$fmeta:meta])* $field:ident : $ty:ty ),* $(,)?
        }
    )*) => {
        /// Message kind, the first byte of every record.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum MessageKind {
            $( $(#[$meta])* $name = $kind, )*
        }

        impl MessageKind {
            /// Every kind, in discriminant order.
            pub const ALL: &'static [MessageKind] = &[ $( MessageKind::$name, )* ];

            /// Kind for a discriminant byte.
            pub fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    $( $kind => Some(MessageKind::$name), )*
                    _ => None,
                }
            }

            /// Fixed record size, kind byte included.
            pub const fn size(self) -> usize {
                match self {
                    $( MessageKind::$name => $name::SIZE, )*
                }
            }

            /// Message name.
            pub const fn name(self) -> &'static str {
                match self {
                    $( MessageKind::$name => stringify!($name), )*
                }
            }
        }

        $(
            $(#[$meta])*
            #[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
            pub struct $name {
                $( $(#[$fmeta])* pub $field: $ty, )*
            }

            impl $name {
                /// Kind byte of this record.
                pub const KIND: MessageKind = MessageKind::$name;

                /// Encoded size in bytes, kind byte included.
                pub const SIZE: usize = $size;

                /// Encode into a fresh buffer of exactly `SIZE` bytes.
                pub fn encode(&self) -> Result<Vec<u8>, WireError> {
                    let mut out = Vec::with_capacity(Self::SIZE);
                    out.push(Self::KIND as u8);
                    bincode::serialize_into(&mut out, self)?;
                    debug_assert_eq!(out.len(), Self::SIZE);
                    Ok(out)
                }

                /// Decode, checking kind and length before any field.
                pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
                    let body = record_body(Self::KIND, bytes)?;
                    Ok(bincode::deserialize(body)?)
                }
            }
        )*
    };
}

wire_messages! {
    /// Joiner's own state, sent only to them.
    Hello = 0, 14 {
        /// Assigned id
        id: PlayerId,
        /// Spawn X
        x: f32,
        /// Spawn Y
        y: f32,
        /// Quantized hue
        hue: Hue,
    }

    /// A player present in the world.
    PlayerJoined = 1, 15 {
        /// Player id
        id: PlayerId,
        /// Position X
        x: f32,
        /// Position Y
        y: f32,
        /// Quantized hue
        hue: Hue,
        /// Committed movement mask
        moving: MoveMask,
    }

    /// A player left.
    PlayerLeft = 2, 5 {
        /// Player id
        id: PlayerId,
    }

    /// Movement change, with the position it starts from.
    PlayerMoving = 3, 14 {
        /// Player id
        id: PlayerId,
        /// Position X
        x: f32,
        /// Position Y
        y: f32,
        /// New committed movement mask
        moving: MoveMask,
    }

    /// Client starts or stops moving in one direction.
    AmmaMoving = 4, 3 {
        /// Direction index
        direction: Direction,
        /// Start (true) or stop (false)
        #[serde(with = "start_flag")]
        start: bool,
    }

    /// Latency probe.
    Ping = 5, 9 {
        /// Client clock value, opaque to the server
        timestamp: f64,
    }

    /// Probe answer, timestamp echoed unchanged.
    Pong = 6, 9 {
        /// Timestamp from the matching ping
        timestamp: f64,
    }
}

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClientMessage {
    /// Movement intent.
    AmmaMoving(AmmaMoving),
    /// Latency probe.
    Ping(Ping),
}

impl ClientMessage {
    /// Decode one binary frame.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        match peek_kind(bytes)? {
            MessageKind::AmmaMoving => AmmaMoving::decode(bytes).map(Self::AmmaMoving),
            MessageKind::Ping => Ping::decode(bytes).map(Self::Ping),
            found => Err(WireError::UnexpectedKind {
                expected: "client message",
                found,
            }),
        }
    }

    /// Encode to one binary frame.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        match self {
            Self::AmmaMoving(m) => m.encode(),
            Self::Ping(m) => m.encode(),
        }
    }
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ServerMessage {
    /// Greeting.
    Hello(Hello),
    /// Player present.
    PlayerJoined(PlayerJoined),
    /// Player gone.
    PlayerLeft(PlayerLeft),
    /// Movement change.
    PlayerMoving(PlayerMoving),
    /// Probe answer.
    Pong(Pong),
}

impl ServerMessage {
    /// Decode one binary frame.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        match peek_kind(bytes)? {
            MessageKind::Hello => Hello::decode(bytes).map(Self::Hello),
            MessageKind::PlayerJoined => PlayerJoined::decode(bytes).map(Self::PlayerJoined),
            MessageKind::PlayerLeft => PlayerLeft::decode(bytes).map(Self::PlayerLeft),
            MessageKind::PlayerMoving => PlayerMoving::decode(bytes).map(Self::PlayerMoving),
            MessageKind::Pong => Pong::decode(bytes).map(Self::Pong),
            found => Err(WireError::UnexpectedKind {
                expected: "server message",
                found,
            }),
        }
    }

    /// Encode to one binary frame.
    pub fn encode(&self) -> Result<Vec<u8>, WireError> {
        match self {
            Self::Hello(m) => m.encode(),
            Self::PlayerJoined(m) => m.encode(),
            Self::PlayerLeft(m) => m.encode(),
            Self::PlayerMoving(m) => m.encode(),
            Self::Pong(m) => m.encode(),
        }
    }

    /// Kind of the wrapped record.
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Hello(_) => Hello::KIND,
            Self::PlayerJoined(_) => PlayerJoined::KIND,
            Self::PlayerLeft(_) => PlayerLeft::KIND,
            Self::PlayerMoving(_) => PlayerMoving::KIND,
            Self::Pong(_) => Pong::KIND,
        }
    }
}

macro_rules! wrap_from {
    ($outer:ident { $($variant:ident),* }) => {
        $(
            impl From<$variant> for $outer {
                fn from(msg: $variant) -> Self {
                    $outer::$variant(msg)
                }
            }
        )*
    };
}

wrap_from!(ClientMessage { AmmaMoving, Ping });
wrap_from!(ServerMessage { Hello, PlayerJoined, PlayerLeft, PlayerMoving, Pong });

// =============================================================================
// CONVERSION FROM GAME EVENTS
// =============================================================================

impl From<&GameEventData> for ServerMessage {
    fn from(data: &GameEventData) -> Self {
        match *data {
            GameEventData::Hello {
                player_id,
                position: Vec2 { x, y },
                hue,
            } => Hello {
                id: player_id,
                x,
                y,
                hue: Hue::from_degrees(hue),
            }
            .into(),
            GameEventData::PlayerJoined {
                player_id,
                position: Vec2 { x, y },
                hue,
                moving,
            } => PlayerJoined {
                id: player_id,
                x,
                y,
                hue: Hue::from_degrees(hue),
                moving,
            }
            .into(),
            GameEventData::PlayerLeft { player_id } => PlayerLeft { id: player_id }.into(),
            GameEventData::PlayerMoving {
                player_id,
                position: Vec2 { x, y },
                moving,
            } => PlayerMoving {
                id: player_id,
                x,
                y,
                moving,
            }
            .into(),
            GameEventData::Pong { timestamp } => Pong { timestamp }.into(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_record_sizes() {
        assert_eq!(Hello::SIZE, 14);
        assert_eq!(PlayerJoined::SIZE, 15);
        assert_eq!(PlayerLeft::SIZE, 5);
        assert_eq!(PlayerMoving::SIZE, 14);
        assert_eq!(AmmaMoving::SIZE, 3);
        assert_eq!(Ping::SIZE, 9);
        assert_eq!(Pong::SIZE, 9);
    }

    #[test]
    fn test_kind_bytes() {
        for (index, kind) in MessageKind::ALL.iter().enumerate() {
            assert_eq!(*kind as u8 as usize, index);
            assert_eq!(MessageKind::from_byte(index as u8), Some(*kind));
        }
        assert_eq!(MessageKind::from_byte(7), None);
    }

    #[test]
    fn test_hello_layout_is_little_endian() {
        let bytes = Hello {
            id: PlayerId(0x0102_0304),
            x: 1.0,
            y: -2.0,
            hue: Hue(200),
        }
        .encode()
        .unwrap();

        assert_eq!(
            bytes,
            vec![0, 0x04, 0x03, 0x02, 0x01, 0x00, 0x00, 0x80, 0x3f, 0x00, 0x00, 0x00, 0xc0, 200]
        );
    }

    #[test]
    fn test_ping_layout() {
        let bytes = Ping { timestamp: 1.0 }.encode().unwrap();
        assert_eq!(bytes, vec![5, 0, 0, 0, 0, 0, 0, 0xf0, 0x3f]);
    }

    #[test]
    fn test_decode_amma_moving() {
        let msg = ClientMessage::decode(&[4, 1, 1]).unwrap();
        assert_eq!(
            msg,
            ClientMessage::AmmaMoving(AmmaMoving {
                direction: Direction::Right,
                start: true,
            })
        );

        // Any non-zero start byte means start
        let msg = AmmaMoving::decode(&[4, 3, 7]).unwrap();
        assert_eq!(msg.direction, Direction::Down);
        assert!(msg.start);

        let msg = AmmaMoving::decode(&[4, 0, 0]).unwrap();
        assert!(!msg.start);
    }

    #[test]
    fn test_reject_empty() {
        assert_eq!(ClientMessage::decode(&[]), Err(WireError::Empty));
    }

    #[test]
    fn test_reject_unknown_kind() {
        assert_eq!(ClientMessage::decode(&[42, 0, 0]), Err(WireError::UnknownKind(42)));
    }

    #[test]
    fn test_reject_wrong_length() {
        assert_eq!(
            ClientMessage::decode(&[4, 1]),
            Err(WireError::WrongLength {
                kind: MessageKind::AmmaMoving,
                expected: 3,
                actual: 2,
            })
        );
        assert!(matches!(
            ClientMessage::decode(&[5, 0, 0, 0, 0, 0, 0, 0, 0, 0]),
            Err(WireError::WrongLength { actual: 10, .. })
        ));
    }

    #[test]
    fn test_reject_server_kind_from_client() {
        let hello = Hello {
            id: PlayerId(1),
            x: 0.0,
            y: 0.0,
            hue: Hue(0),
        }
        .encode()
        .unwrap();

        assert_eq!(
            ClientMessage::decode(&hello),
            Err(WireError::UnexpectedKind {
                expected: "client message",
                found: MessageKind::Hello,
            })
        );
    }

    #[test]
    fn test_reject_bad_direction() {
        let err = AmmaMoving::decode(&[4, 4, 1]).unwrap_err();
        assert!(
            matches!(&err, WireError::Codec(msg) if msg.contains("invalid direction 4")),
            "{:?}",
            err
        );
        assert!(ClientMessage::decode(&[4, 255, 0]).is_err());
    }

    #[test]
    fn test_declared_sizes_match_bincode_bodies() {
        let id = PlayerId(7);
        let bodies = [
            (Hello::SIZE, bincode::serialized_size(&Hello { id, x: 0.0, y: 0.0, hue: Hue(0) })),
            (
                PlayerJoined::SIZE,
                bincode::serialized_size(&PlayerJoined {
                    id,
                    x: 0.0,
                    y: 0.0,
                    hue: Hue(0),
                    moving: MoveMask::NONE,
                }),
            ),
            (PlayerLeft::SIZE, bincode::serialized_size(&PlayerLeft { id })),
            (
                PlayerMoving::SIZE,
                bincode::serialized_size(&PlayerMoving {
                    id,
                    x: 0.0,
                    y: 0.0,
                    moving: MoveMask::NONE,
                }),
            ),
            (
                AmmaMoving::SIZE,
                bincode::serialized_size(&AmmaMoving {
                    direction: Direction::Up,
                    start: true,
                }),
            ),
            (Ping::SIZE, bincode::serialized_size(&Ping { timestamp: 0.0 })),
            (Pong::SIZE, bincode::serialized_size(&Pong { timestamp: 0.0 })),
        ];

        for (size, body) in bodies {
            assert_eq!(body.unwrap() as usize + 1, size);
        }
    }

    #[test]
    fn test_start_byte_encodes_as_zero_or_one() {
        let start = AmmaMoving {
            direction: Direction::Down,
            start: true,
        };
        assert_eq!(start.encode().unwrap(), vec![4, 3, 1]);

        let stop = AmmaMoving { start: false, ..start };
        assert_eq!(stop.encode().unwrap(), vec![4, 3, 0]);
    }

    #[test]
    fn test_struct_decode_checks_kind() {
        assert_eq!(
            Ping::decode(&Pong { timestamp: 3.0 }.encode().unwrap()),
            Err(WireError::UnexpectedKind {
                expected: "Ping",
                found: MessageKind::Pong,
            })
        );
    }

    #[test]
    fn test_hue_quantization_bounds() {
        for degrees in 0u16..360 {
            let hue = Hue::from_degrees(degrees);
            assert!(hue.degrees() <= f32::from(degrees), "{} -> {:?}", degrees, hue);
            assert!(f32::from(degrees) < hue.degrees() + Hue::STEP, "{} -> {:?}", degrees, hue);
        }
        assert_eq!(Hue::from_degrees(0), Hue(0));
        assert_eq!(Hue::from_degrees(359), Hue(255));
        assert_eq!(Hue::from_degrees(360), Hue(0));
    }

    #[test]
    fn test_every_hue_byte_survives_the_wire() {
        for byte in 0..=u8::MAX {
            let msg = PlayerJoined {
                id: PlayerId(9),
                x: 1.5,
                y: 2.5,
                hue: Hue(byte),
                moving: MoveMask::NONE,
            };
            let decoded = PlayerJoined::decode(&msg.encode().unwrap()).unwrap();
            assert_eq!(decoded.hue, Hue(byte));
            assert!(decoded.hue.degrees() < 360.0);
        }
    }

    #[test]
    fn test_event_conversion() {
        let data = GameEventData::PlayerMoving {
            player_id: PlayerId(2),
            position: Vec2::new(10.0, 20.0),
            moving: MoveMask::from_bits(0b0110),
        };

        let msg = ServerMessage::from(&data);
        assert_eq!(
            msg,
            ServerMessage::PlayerMoving(PlayerMoving {
                id: PlayerId(2),
                x: 10.0,
                y: 20.0,
                moving: MoveMask::from_bits(0b0110),
            })
        );
        assert_eq!(msg.kind(), MessageKind::PlayerMoving);
    }

    fn direction() -> impl Strategy<Value = Direction> {
        (0u8..4).prop_filter_map("direction", Direction::from_index)
    }

    proptest! {
        #[test]
        fn test_hello_roundtrip(id in any::<u32>(), x in -1e6f32..1e6, y in -1e6f32..1e6, hue in any::<u8>()) {
            let msg = ServerMessage::from(Hello { id: PlayerId(id), x, y, hue: Hue(hue) });
            prop_assert_eq!(ServerMessage::decode(&msg.encode().unwrap()), Ok(msg));
        }

        #[test]
        fn test_player_joined_roundtrip(
            id in any::<u32>(),
            x in -1e6f32..1e6,
            y in -1e6f32..1e6,
            hue in any::<u8>(),
            moving in any::<u8>(),
        ) {
            let msg = ServerMessage::from(PlayerJoined {
                id: PlayerId(id),
                x,
                y,
                hue: Hue(hue),
                moving: MoveMask::from_bits(moving),
            });
            prop_assert_eq!(ServerMessage::decode(&msg.encode().unwrap()), Ok(msg));
        }

        #[test]
        fn test_player_left_roundtrip(id in any::<u32>()) {
            let msg = ServerMessage::from(PlayerLeft { id: PlayerId(id) });
            prop_assert_eq!(ServerMessage::decode(&msg.encode().unwrap()), Ok(msg));
        }

        #[test]
        fn test_player_moving_roundtrip(
            id in any::<u32>(),
            x in -1e6f32..1e6,
            y in -1e6f32..1e6,
            moving in any::<u8>(),
        ) {
            let msg = ServerMessage::from(PlayerMoving {
                id: PlayerId(id),
                x,
                y,
                moving: MoveMask::from_bits(moving),
            });
            prop_assert_eq!(ServerMessage::decode(&msg.encode().unwrap()), Ok(msg));
        }

        #[test]
        fn test_amma_moving_roundtrip(direction in direction(), start in any::<bool>()) {
            let msg = ClientMessage::from(AmmaMoving { direction, start });
            prop_assert_eq!(ClientMessage::decode(&msg.encode().unwrap()), Ok(msg));
        }

        #[test]
        fn test_ping_pong_roundtrip(timestamp in -1e15f64..1e15) {
            let ping = ClientMessage::from(Ping { timestamp });
            prop_assert_eq!(ClientMessage::decode(&ping.encode().unwrap()), Ok(ping));

            let pong = ServerMessage::from(Pong { timestamp });
            prop_assert_eq!(ServerMessage::decode(&pong.encode().unwrap()), Ok(pong));
        }

        #[test]
        fn test_hue_degrees_roundtrip(degrees in 0u16..360) {
            let hue = Hue::from_degrees(degrees);
            let msg = Hello { id: PlayerId(0), x: 0.0, y: 0.0, hue };
            let decoded = Hello::decode(&msg.encode().unwrap()).unwrap();
            prop_assert_eq!(decoded.hue.degrees(), hue.degrees());
        }

        #[test]
        fn test_decode_never_panics(bytes in proptest::collection::vec(any::<u8>(), 0..32)) {
            let _ = ClientMessage::decode(&bytes);
            let _ = ServerMessage::decode(&bytes);
        }
    }
}
