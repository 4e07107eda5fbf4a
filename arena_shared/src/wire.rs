//! Wire protocol.
//!
//! Goals:
//! - Fixed-size records with a one-byte message-type discriminant.
//! - Multi-byte integers in network byte order.
//! - Floats carried as their 32-bit integer bit pattern, so a value
//!   reconstructs bit-exactly on the far side regardless of endianness.
//! - Names in fixed-size NUL-terminated buffers; an embedded NUL is the
//!   logical end of the string and readers never look past the declared
//!   buffer size.
//!
//! Serialization is explicit per message and versionable: every record has a
//! known wire size, and [`Msg::decode`] rejects any buffer shorter than the
//! size its discriminant declares, with no side effects.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::ecs::EntityId;

/// Identifies a connected client within a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u32);

/// Size of the name buffer in [`Msg::Join`].
pub const NAME_BUF: usize = 16;
/// Size of the level-name buffer in [`Msg::LevelInfo`].
pub const LEVEL_NAME_BUF: usize = 32;

/// Input codes accepted by the server. Everything else is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum InputCode {
    Up = 0,
    Down = 1,
    Left = 2,
    Right = 3,
    /// Primary action: melee attack.
    J = 4,
    /// Secondary action: shoot.
    K = 5,
}

impl InputCode {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(InputCode::Up),
            1 => Some(InputCode::Down),
            2 => Some(InputCode::Left),
            3 => Some(InputCode::Right),
            4 => Some(InputCode::J),
            5 => Some(InputCode::K),
            _ => None,
        }
    }
}

/// Obstacle kind carried by [`Msg::SpawnObstacle`].
pub const OBSTACLE_SOLID: u8 = 0;
pub const OBSTACLE_PLATFORM: u8 = 1;

/// Pickup kinds carried by [`Msg::SpawnPickup`].
pub const PICKUP_HEAL: u8 = 0;
pub const PICKUP_EXTRA_LIFE: u8 = 1;
pub const PICKUP_SCORE: u8 = 2;

/// Winner id used by [`Msg::MatchOver`] when the match ends without a single
/// surviving player (cooperative clear, all dead).
pub const NO_WINNER: u32 = 0;

/// Protocol message.
///
/// Positions travel as (x, y, z) bit patterns; the simulation is 2D and
/// always writes `z = 0.0`, but the slot stays on the wire for forward
/// compatibility with depth-sorted clients.
#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Client -> server: request to join, with a display name.
    Join { name: String },
    /// Server -> client: join accepted, here is your id.
    JoinAck { client_id: ClientId },
    /// Client -> server (or synthesized by the server on idle timeout):
    /// leave the room.
    Leave { client_id: ClientId },
    /// Client -> server: one input edge.
    Input {
        client_id: ClientId,
        code: u8,
        pressed: bool,
    },
    /// Server -> client: player position and velocity.
    PlayerPos {
        client_id: ClientId,
        x: f32,
        y: f32,
        z: f32,
        vel_x: f32,
        vel_y: f32,
    },
    /// Server -> client: enemy position.
    EnemyPos { id: EntityId, x: f32, y: f32, z: f32 },
    /// Server -> client: projectile position.
    ProjectilePos { id: EntityId, x: f32, y: f32, z: f32 },
    /// Server -> client: moving obstacle position.
    ObstaclePos { id: EntityId, x: f32, y: f32, z: f32 },
    /// Server -> client: enemy entered the world.
    SpawnEnemy {
        id: EntityId,
        x: f32,
        y: f32,
        vel_x: f32,
        vel_y: f32,
        width: f32,
        height: f32,
    },
    /// Server -> client: obstacle/platform entered the world.
    SpawnObstacle {
        id: EntityId,
        kind: u8,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        vel_x: f32,
        vel_y: f32,
    },
    /// Server -> client: projectile entered the world.
    SpawnProjectile {
        id: EntityId,
        owner: u32,
        x: f32,
        y: f32,
        vel_x: f32,
        vel_y: f32,
    },
    /// Server -> client: pickup entered the world.
    SpawnPickup {
        id: EntityId,
        kind: u8,
        x: f32,
        y: f32,
    },
    /// Server -> client: entity removed.
    Despawn { id: EntityId },
    /// Server -> client: player health.
    Health {
        client_id: ClientId,
        current: i16,
        max: i16,
    },
    /// Server -> client: room-wide team score.
    TeamScore { total: i32 },
    /// Server -> client: one player's individual score.
    PlayerScore { client_id: ClientId, score: u32 },
    /// Server -> client: a player is terminally dead.
    Death { client_id: ClientId },
    /// Server -> client: level transition.
    LevelInfo { index: u32, name: String },
    /// Server -> client: match ended. `winner` is a client id, or
    /// [`NO_WINNER`].
    MatchOver { winner: u32 },
}

mod kind {
    pub const JOIN: u8 = 1;
    pub const JOIN_ACK: u8 = 2;
    pub const LEAVE: u8 = 3;
    pub const INPUT: u8 = 4;
    pub const PLAYER_POS: u8 = 5;
    pub const ENEMY_POS: u8 = 6;
    pub const PROJECTILE_POS: u8 = 7;
    pub const OBSTACLE_POS: u8 = 8;
    pub const SPAWN_ENEMY: u8 = 9;
    pub const SPAWN_OBSTACLE: u8 = 10;
    pub const SPAWN_PROJECTILE: u8 = 11;
    pub const SPAWN_PICKUP: u8 = 12;
    pub const DESPAWN: u8 = 13;
    pub const HEALTH: u8 = 14;
    pub const TEAM_SCORE: u8 = 15;
    pub const PLAYER_SCORE: u8 = 16;
    pub const DEATH: u8 = 17;
    pub const LEVEL_INFO: u8 = 18;
    pub const MATCH_OVER: u8 = 19;
}

/// Decode failure. The caller drops the datagram; no state is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    /// Zero-length buffer.
    Empty,
    /// Discriminant not in the protocol. Ignored by policy.
    UnknownKind(u8),
    /// Buffer shorter than the record its discriminant declares.
    Truncated { kind: u8, need: usize, got: usize },
}

fn put_f32_bits(buf: &mut BytesMut, v: f32) {
    buf.put_u32(v.to_bits());
}

fn get_f32_bits(buf: &mut &[u8]) -> f32 {
    f32::from_bits(buf.get_u32())
}

fn put_fixed_str(buf: &mut BytesMut, s: &str, size: usize) {
    let bytes = s.as_bytes();
    let n = bytes.len().min(size);
    buf.put_slice(&bytes[..n]);
    for _ in n..size {
        buf.put_u8(0);
    }
}

fn get_fixed_str(buf: &mut &[u8], size: usize) -> String {
    let raw = &buf[..size];
    buf.advance(size);
    let end = raw.iter().position(|&b| b == 0).unwrap_or(size);
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

impl Msg {
    /// Wire discriminant of this message.
    pub fn kind(&self) -> u8 {
        match self {
            Msg::Join { .. } => kind::JOIN,
            Msg::JoinAck { .. } => kind::JOIN_ACK,
            Msg::Leave { .. } => kind::LEAVE,
            Msg::Input { .. } => kind::INPUT,
            Msg::PlayerPos { .. } => kind::PLAYER_POS,
            Msg::EnemyPos { .. } => kind::ENEMY_POS,
            Msg::ProjectilePos { .. } => kind::PROJECTILE_POS,
            Msg::ObstaclePos { .. } => kind::OBSTACLE_POS,
            Msg::SpawnEnemy { .. } => kind::SPAWN_ENEMY,
            Msg::SpawnObstacle { .. } => kind::SPAWN_OBSTACLE,
            Msg::SpawnProjectile { .. } => kind::SPAWN_PROJECTILE,
            Msg::SpawnPickup { .. } => kind::SPAWN_PICKUP,
            Msg::Despawn { .. } => kind::DESPAWN,
            Msg::Health { .. } => kind::HEALTH,
            Msg::TeamScore { .. } => kind::TEAM_SCORE,
            Msg::PlayerScore { .. } => kind::PLAYER_SCORE,
            Msg::Death { .. } => kind::DEATH,
            Msg::LevelInfo { .. } => kind::LEVEL_INFO,
            Msg::MatchOver { .. } => kind::MATCH_OVER,
        }
    }

    /// Total record size on the wire for a discriminant, including the
    /// discriminant byte itself.
    pub fn wire_size(kind_byte: u8) -> Option<usize> {
        let size = match kind_byte {
            kind::JOIN => 1 + NAME_BUF,
            kind::JOIN_ACK => 1 + 4,
            kind::LEAVE => 1 + 4,
            kind::INPUT => 1 + 4 + 1 + 1,
            kind::PLAYER_POS => 1 + 4 + 3 * 4 + 2 * 4,
            kind::ENEMY_POS | kind::PROJECTILE_POS | kind::OBSTACLE_POS => 1 + 4 + 3 * 4,
            kind::SPAWN_ENEMY => 1 + 4 + 6 * 4,
            kind::SPAWN_OBSTACLE => 1 + 4 + 1 + 6 * 4,
            kind::SPAWN_PROJECTILE => 1 + 4 + 4 + 4 * 4,
            kind::SPAWN_PICKUP => 1 + 4 + 1 + 2 * 4,
            kind::DESPAWN => 1 + 4,
            kind::HEALTH => 1 + 4 + 2 + 2,
            kind::TEAM_SCORE => 1 + 4,
            kind::PLAYER_SCORE => 1 + 4 + 4,
            kind::DEATH => 1 + 4,
            kind::LEVEL_INFO => 1 + 4 + LEVEL_NAME_BUF,
            kind::MATCH_OVER => 1 + 4,
            _ => return None,
        };
        Some(size)
    }

    /// Serializes into a fresh buffer.
    pub fn encode(&self) -> Bytes {
        let size = Msg::wire_size(self.kind()).expect("own kind is known");
        let mut buf = BytesMut::with_capacity(size);
        buf.put_u8(self.kind());
        match self {
            Msg::Join { name } => put_fixed_str(&mut buf, name, NAME_BUF),
            Msg::JoinAck { client_id } => buf.put_u32(client_id.0),
            Msg::Leave { client_id } => buf.put_u32(client_id.0),
            Msg::Input {
                client_id,
                code,
                pressed,
            } => {
                buf.put_u32(client_id.0);
                buf.put_u8(*code);
                buf.put_u8(u8::from(*pressed));
            }
            Msg::PlayerPos {
                client_id,
                x,
                y,
                z,
                vel_x,
                vel_y,
            } => {
                buf.put_u32(client_id.0);
                put_f32_bits(&mut buf, *x);
                put_f32_bits(&mut buf, *y);
                put_f32_bits(&mut buf, *z);
                put_f32_bits(&mut buf, *vel_x);
                put_f32_bits(&mut buf, *vel_y);
            }
            Msg::EnemyPos { id, x, y, z }
            | Msg::ProjectilePos { id, x, y, z }
            | Msg::ObstaclePos { id, x, y, z } => {
                buf.put_u32(id.0);
                put_f32_bits(&mut buf, *x);
                put_f32_bits(&mut buf, *y);
                put_f32_bits(&mut buf, *z);
            }
            Msg::SpawnEnemy {
                id,
                x,
                y,
                vel_x,
                vel_y,
                width,
                height,
            } => {
                buf.put_u32(id.0);
                for v in [x, y, vel_x, vel_y, width, height] {
                    put_f32_bits(&mut buf, *v);
                }
            }
            Msg::SpawnObstacle {
                id,
                kind,
                x,
                y,
                width,
                height,
                vel_x,
                vel_y,
            } => {
                buf.put_u32(id.0);
                buf.put_u8(*kind);
                for v in [x, y, width, height, vel_x, vel_y] {
                    put_f32_bits(&mut buf, *v);
                }
            }
            Msg::SpawnProjectile {
                id,
                owner,
                x,
                y,
                vel_x,
                vel_y,
            } => {
                buf.put_u32(id.0);
                buf.put_u32(*owner);
                for v in [x, y, vel_x, vel_y] {
                    put_f32_bits(&mut buf, *v);
                }
            }
            Msg::SpawnPickup { id, kind, x, y } => {
                buf.put_u32(id.0);
                buf.put_u8(*kind);
                put_f32_bits(&mut buf, *x);
                put_f32_bits(&mut buf, *y);
            }
            Msg::Despawn { id } => buf.put_u32(id.0),
            Msg::Health {
                client_id,
                current,
                max,
            } => {
                buf.put_u32(client_id.0);
                buf.put_i16(*current);
                buf.put_i16(*max);
            }
            Msg::TeamScore { total } => buf.put_i32(*total),
            Msg::PlayerScore { client_id, score } => {
                buf.put_u32(client_id.0);
                buf.put_u32(*score);
            }
            Msg::Death { client_id } => buf.put_u32(client_id.0),
            Msg::LevelInfo { index, name } => {
                buf.put_u32(*index);
                put_fixed_str(&mut buf, name, LEVEL_NAME_BUF);
            }
            Msg::MatchOver { winner } => buf.put_u32(*winner),
        }
        debug_assert_eq!(buf.len(), size);
        buf.freeze()
    }

    /// Parses one message. A buffer shorter than the declared record is
    /// rejected before any field is read.
    pub fn decode(buf: &[u8]) -> Result<Msg, WireError> {
        let Some(&kind_byte) = buf.first() else {
            return Err(WireError::Empty);
        };
        let need = Msg::wire_size(kind_byte).ok_or(WireError::UnknownKind(kind_byte))?;
        if buf.len() < need {
            return Err(WireError::Truncated {
                kind: kind_byte,
                need,
                got: buf.len(),
            });
        }

        let mut body = &buf[1..need];
        let msg = match kind_byte {
            kind::JOIN => Msg::Join {
                name: get_fixed_str(&mut body, NAME_BUF),
            },
            kind::JOIN_ACK => Msg::JoinAck {
                client_id: ClientId(body.get_u32()),
            },
            kind::LEAVE => Msg::Leave {
                client_id: ClientId(body.get_u32()),
            },
            kind::INPUT => Msg::Input {
                client_id: ClientId(body.get_u32()),
                code: body.get_u8(),
                pressed: body.get_u8() != 0,
            },
            kind::PLAYER_POS => Msg::PlayerPos {
                client_id: ClientId(body.get_u32()),
                x: get_f32_bits(&mut body),
                y: get_f32_bits(&mut body),
                z: get_f32_bits(&mut body),
                vel_x: get_f32_bits(&mut body),
                vel_y: get_f32_bits(&mut body),
            },
            kind::ENEMY_POS | kind::PROJECTILE_POS | kind::OBSTACLE_POS => {
                let id = EntityId(body.get_u32());
                let x = get_f32_bits(&mut body);
                let y = get_f32_bits(&mut body);
                let z = get_f32_bits(&mut body);
                match kind_byte {
                    kind::ENEMY_POS => Msg::EnemyPos { id, x, y, z },
                    kind::PROJECTILE_POS => Msg::ProjectilePos { id, x, y, z },
                    _ => Msg::ObstaclePos { id, x, y, z },
                }
            }
            kind::SPAWN_ENEMY => Msg::SpawnEnemy {
                id: EntityId(body.get_u32()),
                x: get_f32_bits(&mut body),
                y: get_f32_bits(&mut body),
                vel_x: get_f32_bits(&mut body),
                vel_y: get_f32_bits(&mut body),
                width: get_f32_bits(&mut body),
                height: get_f32_bits(&mut body),
            },
            kind::SPAWN_OBSTACLE => Msg::SpawnObstacle {
                id: EntityId(body.get_u32()),
                kind: body.get_u8(),
                x: get_f32_bits(&mut body),
                y: get_f32_bits(&mut body),
                width: get_f32_bits(&mut body),
                height: get_f32_bits(&mut body),
                vel_x: get_f32_bits(&mut body),
                vel_y: get_f32_bits(&mut body),
            },
            kind::SPAWN_PROJECTILE => Msg::SpawnProjectile {
                id: EntityId(body.get_u32()),
                owner: body.get_u32(),
                x: get_f32_bits(&mut body),
                y: get_f32_bits(&mut body),
                vel_x: get_f32_bits(&mut body),
                vel_y: get_f32_bits(&mut body),
            },
            kind::SPAWN_PICKUP => Msg::SpawnPickup {
                id: EntityId(body.get_u32()),
                kind: body.get_u8(),
                x: get_f32_bits(&mut body),
                y: get_f32_bits(&mut body),
            },
            kind::DESPAWN => Msg::Despawn {
                id: EntityId(body.get_u32()),
            },
            kind::HEALTH => Msg::Health {
                client_id: ClientId(body.get_u32()),
                current: body.get_i16(),
                max: body.get_i16(),
            },
            kind::TEAM_SCORE => Msg::TeamScore {
                total: body.get_i32(),
            },
            kind::PLAYER_SCORE => Msg::PlayerScore {
                client_id: ClientId(body.get_u32()),
                score: body.get_u32(),
            },
            kind::DEATH => Msg::Death {
                client_id: ClientId(body.get_u32()),
            },
            kind::LEVEL_INFO => Msg::LevelInfo {
                index: body.get_u32(),
                name: get_fixed_str(&mut body, LEVEL_NAME_BUF),
            },
            kind::MATCH_OVER => Msg::MatchOver {
                winner: body.get_u32(),
            },
            _ => unreachable!("size lookup already rejected unknown kinds"),
        };
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_bit_patterns_survive_roundtrip() {
        // NaN with payload, signaling-style NaN, subnormal, negative zero.
        let specials = [
            f32::from_bits(0x7fc0_0001),
            f32::from_bits(0x7f80_0001),
            f32::from_bits(0x0000_0001),
            f32::from_bits(0x8000_0000),
            f32::MAX,
            f32::MIN_POSITIVE,
        ];
        for v in specials {
            let msg = Msg::PlayerPos {
                client_id: ClientId(7),
                x: v,
                y: -v,
                z: 0.0,
                vel_x: v,
                vel_y: v,
            };
            let back = Msg::decode(&msg.encode()).unwrap();
            let Msg::PlayerPos { x, y, vel_x, .. } = back else {
                panic!("wrong kind");
            };
            assert_eq!(x.to_bits(), v.to_bits());
            assert_eq!(y.to_bits(), (-v).to_bits());
            assert_eq!(vel_x.to_bits(), v.to_bits());
        }
    }

    #[test]
    fn short_buffer_is_rejected_for_every_kind() {
        for kind_byte in 1..=19u8 {
            let need = Msg::wire_size(kind_byte).unwrap();
            let mut buf = vec![0u8; need];
            buf[0] = kind_byte;
            // One byte short of the declared record.
            let err = Msg::decode(&buf[..need - 1]).unwrap_err();
            assert_eq!(
                err,
                WireError::Truncated {
                    kind: kind_byte,
                    need,
                    got: need - 1
                }
            );
            // The exact size parses.
            assert!(Msg::decode(&buf).is_ok(), "kind {kind_byte}");
        }
    }

    #[test]
    fn trailing_bytes_are_tolerated() {
        let mut buf = Msg::Despawn { id: EntityId(9) }.encode().to_vec();
        buf.extend_from_slice(&[0xAA; 8]);
        assert_eq!(Msg::decode(&buf), Ok(Msg::Despawn { id: EntityId(9) }));
    }

    #[test]
    fn unknown_kind_and_empty_buffer() {
        assert_eq!(Msg::decode(&[]), Err(WireError::Empty));
        assert_eq!(Msg::decode(&[200, 0, 0]), Err(WireError::UnknownKind(200)));
        assert_eq!(Msg::decode(&[0]), Err(WireError::UnknownKind(0)));
    }

    #[test]
    fn name_buffer_is_nul_terminated_and_bounded() {
        // Embedded NUL ends the string.
        let msg = Msg::Join {
            name: "ab\0cd".to_string(),
        };
        let Msg::Join { name } = Msg::decode(&msg.encode()).unwrap() else {
            panic!("wrong kind");
        };
        assert_eq!(name, "ab");

        // A name filling the whole buffer decodes without running past it.
        let long = "x".repeat(NAME_BUF * 2);
        let msg = Msg::Join { name: long };
        let encoded = msg.encode();
        assert_eq!(encoded.len(), 1 + NAME_BUF);
        let Msg::Join { name } = Msg::decode(&encoded).unwrap() else {
            panic!("wrong kind");
        };
        assert_eq!(name.len(), NAME_BUF);
    }

    #[test]
    fn integers_are_network_byte_order() {
        let encoded = Msg::JoinAck {
            client_id: ClientId(0x0102_0304),
        }
        .encode();
        assert_eq!(&encoded[..], &[2, 0x01, 0x02, 0x03, 0x04]);

        let encoded = Msg::Health {
            client_id: ClientId(1),
            current: -2,
            max: 100,
        }
        .encode();
        assert_eq!(&encoded[5..7], &(-2i16).to_be_bytes());
    }

    #[test]
    fn input_code_whitelist() {
        assert_eq!(InputCode::from_u8(3), Some(InputCode::Right));
        assert_eq!(InputCode::from_u8(5), Some(InputCode::K));
        assert_eq!(InputCode::from_u8(6), None);
        assert_eq!(InputCode::from_u8(255), None);
    }
}
