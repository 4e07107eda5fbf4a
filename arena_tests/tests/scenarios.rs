//! Multi-tick gameplay scenarios driven purely through the room's public
//! surface: packets in, wire messages out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arena_server::ingest::IngestQueue;
use arena_server::room::{RoomMember, RoomSim};
use arena_server::server::CLIENT_ID_BASE;
use arena_shared::ecs::EntityId;
use arena_shared::net::{RecordingTransport, Transport};
use arena_shared::wire::{ClientId, InputCode, Msg};
use arena_tests::{sandbox_levels, turret_levels};
use bytes::Bytes;
use tokio::sync::watch;

// Client ids mirror what the front end hands out, well clear of the room's
// registry entity ids.
fn member(n: u32, port: u16) -> RoomMember {
    RoomMember {
        id: ClientId(CLIENT_ID_BASE + n),
        addr: format!("127.0.0.1:{port}").parse().unwrap(),
        name: format!("p{n}"),
    }
}

fn input_packet(n: u32, code: InputCode, pressed: bool) -> Bytes {
    Msg::Input {
        client_id: ClientId(CLIENT_ID_BASE + n),
        code: code as u8,
        pressed,
    }
    .encode()
}

/// Clearing the wave by shooting the turret advances the room to the next
/// level, with scoring and exactly-once despawns observable on the wire.
#[test]
fn clearing_the_wave_advances_to_next_level() {
    let mut room = RoomSim::new(
        9,
        vec![member(1, 9001), member(2, 9002)],
        turret_levels(),
        60,
        false,
    );
    let queue = IngestQueue::new();
    let client1_addr = room.recipients()[0];

    let first = room.step(&queue);
    let enemy_id = first
        .iter()
        .find_map(|m| match m {
            Msg::SpawnEnemy { id, .. } => Some(*id),
            _ => None,
        })
        .expect("turret spawned on the first tick");

    let mut shot_despawns: HashMap<EntityId, usize> = HashMap::new();
    let mut my_shots: Vec<EntityId> = Vec::new();
    let mut enemy_despawns = 0;
    let mut team_score = 0;
    let mut next_level_seen = false;

    for tick in 1..600u32 {
        // Tap the shoot button every 20 ticks, well past the weapon
        // cooldown, so each press is a fresh edge.
        if tick % 20 == 0 {
            queue.enqueue(input_packet(1, InputCode::K, true), client1_addr);
        } else if tick % 20 == 1 {
            queue.enqueue(input_packet(1, InputCode::K, false), client1_addr);
        }

        for msg in room.step(&queue) {
            match msg {
                Msg::SpawnProjectile { id, owner, .. } if owner == CLIENT_ID_BASE + 1 => {
                    my_shots.push(id)
                }
                Msg::Despawn { id } if id == enemy_id => enemy_despawns += 1,
                Msg::Despawn { id } if my_shots.contains(&id) => {
                    *shot_despawns.entry(id).or_default() += 1;
                }
                Msg::TeamScore { total } => team_score = total,
                Msg::LevelInfo { index: 1, .. } => next_level_seen = true,
                _ => {}
            }
        }
        if next_level_seen {
            break;
        }
    }

    assert!(next_level_seen, "wave clear must load the next level");
    assert_eq!(enemy_despawns, 1, "the turret despawns exactly once");
    assert_eq!(team_score, 100, "kill credited to the team score");
    assert!(my_shots.len() >= 4, "four hits are needed for the kill");
    for (id, count) in shot_despawns {
        assert_eq!(count, 1, "projectile {id:?} despawned more than once");
    }
    assert!(!room.is_over(), "players persist across the transition");
}

/// The tick loop stops promptly when shutdown is signaled, and it
/// broadcast at least something while alive.
#[tokio::test]
async fn room_loop_stops_on_shutdown() -> anyhow::Result<()> {
    let room = RoomSim::new(
        3,
        vec![member(1, 9101), member(2, 9102)],
        sandbox_levels(),
        60,
        false,
    );
    let queue = Arc::new(IngestQueue::new());
    let transport = Arc::new(RecordingTransport::default());
    let dyn_transport: Arc<dyn Transport> = transport.clone();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = tokio::spawn(room.run(queue, dyn_transport, shutdown_rx));
    tokio::time::sleep(Duration::from_millis(120)).await;
    shutdown_tx.send(true)?;
    tokio::time::timeout(Duration::from_secs(1), task).await??;

    assert!(
        !transport.take().is_empty(),
        "a running room broadcasts state"
    );
    Ok(())
}
