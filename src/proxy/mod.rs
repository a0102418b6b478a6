//! Subprocess MCP proxy client.
//!
//! This module manages the long-lived `rwx mcp serve` child process and the
//! line-delimited JSON-RPC conversation with it over stdio. Concurrent
//! outstanding requests are multiplexed over the single byte stream and
//! correlated back by id.
//!
//! Submodules:
//! - `codec`: [`LinesCodec`](tokio_util::codec::LinesCodec)-based stream framing.
//! - `protocol`: JSON-RPC envelope and tool descriptor types.
//! - `mux`: request/response correlation over the shared channel.
//! - `spawner`: process spawning with environment isolation and stdio capture.
//! - `client`: session lifecycle — spawn, handshake, call, stop.

pub mod client;
pub mod codec;
pub mod mux;
pub mod protocol;
pub mod spawner;

pub use client::{ProxyClient, SessionState};
pub use protocol::ToolDescriptor;
