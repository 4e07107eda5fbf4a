//! `arena_server`
//!
//! Server-side systems:
//! - Fixed timestep simulation loop, one task per room
//! - Packet ingestion queue between the receive path and the tick
//! - Input aggregation with edge-triggered actions
//! - Movement/physics, combat, and entity lifecycle
//! - Best-effort state broadcast over UDP
//!
//! Networking model: one shared UDP socket; inbound datagrams are routed to
//! rooms by sender address, outbound state fans out through the shared
//! transport.

pub mod broadcast;
pub mod combat;
pub mod entities;
pub mod events;
pub mod ingest;
pub mod input;
pub mod lifecycle;
pub mod physics;
pub mod room;
pub mod server;

pub use server::ArenaServer;
