//! Protocol-level codec checks across crate boundaries.

use arena_shared::ecs::EntityId;
use arena_shared::wire::{ClientId, Msg, WireError, NAME_BUF};

/// Unit-style test: representative protocol messages roundtrip correctly,
/// including bit patterns ordinary float serialization would destroy.
#[test]
fn protocol_messages_roundtrip() {
    let nan = f32::from_bits(0x7fc0_dead);
    let subnormal = f32::from_bits(0x0000_0007);

    let samples = vec![
        Msg::Join {
            name: "player-one".into(),
        },
        Msg::JoinAck {
            client_id: ClientId(1_000_001),
        },
        Msg::Input {
            client_id: ClientId(7),
            code: 3,
            pressed: true,
        },
        Msg::PlayerPos {
            client_id: ClientId(7),
            x: nan,
            y: subnormal,
            z: 0.0,
            vel_x: -0.0,
            vel_y: f32::MAX,
        },
        Msg::SpawnEnemy {
            id: EntityId(42),
            x: 600.0,
            y: 472.0,
            vel_x: -60.0,
            vel_y: 0.0,
            width: 28.0,
            height: 28.0,
        },
        Msg::Health {
            client_id: ClientId(7),
            current: -5,
            max: 100,
        },
        Msg::MatchOver { winner: 0 },
    ];

    for msg in samples {
        let encoded = msg.encode();
        let decoded = Msg::decode(&encoded).expect("decode");
        match (&msg, &decoded) {
            // Bit-for-bit float comparison; PartialEq would reject NaN.
            (
                Msg::PlayerPos {
                    x, y, vel_x, vel_y, ..
                },
                Msg::PlayerPos {
                    x: dx,
                    y: dy,
                    vel_x: dvx,
                    vel_y: dvy,
                    ..
                },
            ) => {
                assert_eq!(x.to_bits(), dx.to_bits());
                assert_eq!(y.to_bits(), dy.to_bits());
                assert_eq!(vel_x.to_bits(), dvx.to_bits());
                assert_eq!(vel_y.to_bits(), dvy.to_bits());
            }
            _ => assert_eq!(msg, decoded),
        }
    }
}

#[test]
fn undersized_buffer_is_rejected_with_no_partial_parse() {
    let encoded = Msg::Join {
        name: "x".repeat(NAME_BUF),
    }
    .encode();
    for cut in 1..encoded.len() {
        let err = Msg::decode(&encoded[..cut]).unwrap_err();
        assert!(matches!(err, WireError::Truncated { .. }), "cut at {cut}");
    }
}
