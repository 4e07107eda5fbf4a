//! Standalone server binary.
//!
//! Usage:
//!   cargo run -p arena_server -- [--addr 127.0.0.1:41000] [--tick-hz 60]
//!       [--levels-dir levels] [--room-size 2] [--idle-timeout 30]
//!       [--endless] [--config server.json]
//!
//! The server collects joiners into rooms of `--room-size` players and runs
//! one fixed-tick simulation loop per room, broadcasting world state over
//! the same UDP socket clients send input to.

use std::env;

use anyhow::Context;
use arena_server::server::ArenaServer;
use arena_shared::config::ServerConfig;
use tracing::info;

fn parse_args() -> ServerConfig {
    let mut cfg = ServerConfig::default();
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                match std::fs::read_to_string(&args[i + 1]) {
                    Ok(raw) => match ServerConfig::from_json_str(&raw) {
                        Ok(parsed) => cfg = parsed,
                        Err(err) => eprintln!("bad config {}: {err}", args[i + 1]),
                    },
                    Err(err) => eprintln!("unreadable config {}: {err}", args[i + 1]),
                }
                i += 2;
            }
            "--addr" if i + 1 < args.len() => {
                cfg.listen_addr = args[i + 1].clone();
                i += 2;
            }
            "--tick-hz" if i + 1 < args.len() => {
                cfg.tick_hz = args[i + 1].parse().unwrap_or(60);
                i += 2;
            }
            "--levels-dir" if i + 1 < args.len() => {
                cfg.levels_dir = args[i + 1].clone();
                i += 2;
            }
            "--room-size" if i + 1 < args.len() => {
                cfg.room_size = args[i + 1].parse().unwrap_or(2);
                i += 2;
            }
            "--idle-timeout" if i + 1 < args.len() => {
                cfg.idle_timeout_secs = args[i + 1].parse().unwrap_or(30);
                i += 2;
            }
            "--endless" => {
                cfg.endless = true;
                i += 1;
            }
            _ => i += 1,
        }
    }
    cfg
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args();
    info!(
        addr = %cfg.listen_addr,
        tick_hz = cfg.tick_hz,
        levels_dir = %cfg.levels_dir,
        room_size = cfg.room_size,
        "Starting server"
    );

    let server = ArenaServer::bind(cfg).await.context("create server")?;
    let local = server.local_addr()?;
    info!(%local, "Server listening");

    server.run().await
}
