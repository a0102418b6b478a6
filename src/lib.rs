#![forbid(unsafe_code)]

//! `rwx-bridge` — MCP plugin for the RWX CI/CD platform.
//!
//! Proxies the standalone `rwx mcp serve` subprocess over line-delimited
//! JSON-RPC and wraps the `rwx` CLI with native CI tools (run launching,
//! status polling, log retrieval, workflow validation).

pub mod cloud;
pub mod config;
pub mod elicitation;
pub mod errors;
pub mod logs;
pub mod mcp;
pub mod proxy;
pub mod rwx_cli;
pub mod workflow;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};
