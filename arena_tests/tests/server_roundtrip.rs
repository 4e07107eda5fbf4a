//! Full socket-based integration: join handshake, room start, input, and
//! state broadcast over real UDP.

use std::net::SocketAddr;
use std::time::Duration;

use arena_server::server::bind_ephemeral;
use arena_shared::wire::{ClientId, InputCode, Msg};
use arena_tests::{collect_msgs, sandbox_levels};
use tokio::net::UdpSocket;

async fn expect_join_ack(socket: &UdpSocket) -> anyhow::Result<ClientId> {
    let mut buf = [0u8; 2048];
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let now = tokio::time::Instant::now();
        anyhow::ensure!(now < deadline, "no JoinAck before deadline");
        let (len, _) = tokio::time::timeout(deadline - now, socket.recv_from(&mut buf)).await??;
        if let Ok(Msg::JoinAck { client_id }) = Msg::decode(&buf[..len]) {
            return Ok(client_id);
        }
    }
}

fn latest_player_x(msgs: &[Msg], who: ClientId) -> Option<f32> {
    msgs.iter().rev().find_map(|m| match m {
        Msg::PlayerPos { client_id, x, .. } if *client_id == who => Some(*x),
        _ => None,
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn join_input_broadcast_roundtrip() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();

    let (mut server, cfg) = bind_ephemeral(120).await?;
    server.set_levels(sandbox_levels());
    let server_addr: SocketAddr = cfg.listen_addr.parse()?;
    let server_task = tokio::spawn(server.run());

    // Two clients fill the default room.
    let c1 = UdpSocket::bind("127.0.0.1:0").await?;
    let c2 = UdpSocket::bind("127.0.0.1:0").await?;
    c1.send_to(
        &Msg::Join {
            name: "alice".into(),
        }
        .encode(),
        server_addr,
    )
    .await?;
    let id1 = expect_join_ack(&c1).await?;
    c2.send_to(&Msg::Join { name: "bob".into() }.encode(), server_addr)
        .await?;
    let id2 = expect_join_ack(&c2).await?;
    assert_ne!(id1, id2);

    // The room announces its level and starts streaming state.
    let msgs = collect_msgs(&c1, Duration::from_millis(400)).await;
    assert!(
        msgs.iter().any(|m| matches!(m, Msg::LevelInfo { .. })),
        "expected a LevelInfo broadcast"
    );
    assert!(
        msgs.iter().any(|m| matches!(m, Msg::SpawnObstacle { .. })),
        "expected the floor spawn"
    );
    let x0 = latest_player_x(&msgs, id1).expect("position updates for client 1");

    // Hold Right: the authoritative position starts moving.
    c1.send_to(
        &Msg::Input {
            client_id: id1,
            code: InputCode::Right as u8,
            pressed: true,
        }
        .encode(),
        server_addr,
    )
    .await?;
    let msgs = collect_msgs(&c1, Duration::from_millis(400)).await;
    let x1 = latest_player_x(&msgs, id1).expect("position updates after input");
    assert!(x1 > x0, "expected rightward movement: {x0} -> {x1}");

    // The second client observes the same world.
    let msgs2 = collect_msgs(&c2, Duration::from_millis(200)).await;
    assert!(latest_player_x(&msgs2, id1).is_some());

    server_task.abort();
    Ok(())
}

/// A two-player room where both clients leave finishes its task on its own
/// and stops broadcasting.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn leave_ends_an_emptied_room() -> anyhow::Result<()> {
    let (mut server, cfg) = bind_ephemeral(120).await?;
    server.set_levels(sandbox_levels());
    let server_addr: SocketAddr = cfg.listen_addr.parse()?;
    let server_task = tokio::spawn(server.run());

    let c1 = UdpSocket::bind("127.0.0.1:0").await?;
    let c2 = UdpSocket::bind("127.0.0.1:0").await?;
    c1.send_to(&Msg::Join { name: "a".into() }.encode(), server_addr)
        .await?;
    let id1 = expect_join_ack(&c1).await?;
    c2.send_to(&Msg::Join { name: "b".into() }.encode(), server_addr)
        .await?;
    let id2 = expect_join_ack(&c2).await?;

    tokio::time::sleep(Duration::from_millis(100)).await;
    c1.send_to(&Msg::Leave { client_id: id1 }.encode(), server_addr)
        .await?;
    c2.send_to(&Msg::Leave { client_id: id2 }.encode(), server_addr)
        .await?;

    // Broadcasts stop once the room tears down.
    tokio::time::sleep(Duration::from_millis(300)).await;
    let _ = collect_msgs(&c1, Duration::from_millis(100)).await;
    let quiet = collect_msgs(&c1, Duration::from_millis(200)).await;
    assert!(
        quiet.is_empty(),
        "expected silence after the room ended, got {} messages",
        quiet.len()
    );

    server_task.abort();
    Ok(())
}
