//! Shared helpers for the integration tests.

use std::time::Duration;

use arena_shared::level::{
    EnemySpawn, LevelDef, LevelSet, ObstacleKind, ObstacleSpawn, PatternKind,
};
use arena_shared::wire::Msg;
use tokio::net::UdpSocket;

/// Full-width solid floor at the reference arena height.
pub fn floor() -> ObstacleSpawn {
    ObstacleSpawn {
        x: 0.0,
        y: 500.0,
        width: 850.0,
        height: 20.0,
        kind: ObstacleKind::Solid,
        vel_x: 0.0,
        vel_y: 0.0,
    }
}

/// One floored level without enemies; matches never auto-advance.
pub fn sandbox_levels() -> LevelSet {
    LevelSet::from_levels(vec![LevelDef {
        name: "sandbox".into(),
        obstacles: vec![floor()],
        ..Default::default()
    }])
}

/// A turret wave followed by a quiet level, both floored.
pub fn turret_levels() -> LevelSet {
    LevelSet::from_levels(vec![
        LevelDef {
            name: "turret-wave".into(),
            obstacles: vec![floor()],
            enemies: vec![EnemySpawn {
                x: 600.0,
                y: 472.0,
                pattern: PatternKind::Turret,
                health: 30,
                width: 28.0,
                height: 28.0,
                speed: 0.0,
                contact_damage: 10,
                score_value: 100,
            }],
            ..Default::default()
        },
        LevelDef {
            name: "cleared".into(),
            obstacles: vec![floor()],
            ..Default::default()
        },
    ])
}

/// Collects every decodable datagram arriving within `window`.
pub async fn collect_msgs(socket: &UdpSocket, window: Duration) -> Vec<Msg> {
    let deadline = tokio::time::Instant::now() + window;
    let mut msgs = Vec::new();
    let mut buf = [0u8; 2048];
    loop {
        let now = tokio::time::Instant::now();
        if now >= deadline {
            break;
        }
        match tokio::time::timeout(deadline - now, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => {
                if let Ok(msg) = Msg::decode(&buf[..len]) {
                    msgs.push(msg);
                }
            }
            _ => break,
        }
    }
    msgs
}
