#![forbid(unsafe_code)]

//! `rwx-bridge` — MCP plugin binary for the RWX CI/CD platform.
//!
//! `serve` bootstraps the proxy subprocess and the stdio MCP transport;
//! `list-tools` and `call` are local testing utilities for the native tool
//! surface.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use rmcp::model::CallToolResult;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use rwx_bridge::cloud::CloudClient;
use rwx_bridge::config::{load_access_token, AccessToken};
use rwx_bridge::logs::LogStore;
use rwx_bridge::mcp::handler::{AppState, BridgeServer};
use rwx_bridge::mcp::{tools, transport};
use rwx_bridge::proxy::spawner::SpawnConfig;
use rwx_bridge::proxy::ProxyClient;
use rwx_bridge::rwx_cli::ensure_cli_version;
use rwx_bridge::workflow::RwxLintParser;
use rwx_bridge::{AppError, GlobalConfig, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "rwx-bridge", about = "MCP plugin for RWX CI/CD", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file; built-in defaults when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log output format (text or json). Logs always go to stderr.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Run the MCP server over stdio.
    Serve,
    /// Print the native tool catalog.
    ListTools,
    /// Invoke one native tool locally and print its result.
    Call {
        /// Tool name, e.g. `get_recent_runs`.
        tool: String,
        /// Tool arguments as a JSON object (defaults to `{}`).
        args_json: Option<String>,
    },
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let config = match &args.config {
        Some(path) => GlobalConfig::load_from_path(path)?,
        None => GlobalConfig::default(),
    };

    match args.command {
        CliCommand::Serve => serve(config).await,
        CliCommand::ListTools => {
            list_tools();
            Ok(())
        }
        CliCommand::Call { tool, args_json } => call_tool(config, &tool, args_json).await,
    }
}

// ── serve ────────────────────────────────────────────────────────────────────

async fn serve(config: GlobalConfig) -> Result<()> {
    info!("rwx-bridge server bootstrap");

    // Fail fast when the CLI the native tools depend on is unusable.
    ensure_cli_version().await?;

    let access_token = load_access_token().await;

    // ── Start the proxy subprocess ──────────────────────
    let proxy = Arc::new(ProxyClient::new());
    let spawn_config = SpawnConfig {
        command: config.proxy.command.clone(),
        args: config.proxy.args.clone(),
        working_dir: None,
    };
    proxy.start(&spawn_config).await?;

    let descriptors = proxy.tools().await;
    info!(
        proxied = descriptors.len(),
        "proxied tools from the standalone RWX MCP server"
    );

    // ── Build shared application state ──────────────────
    let state = build_state(config, Arc::clone(&proxy), access_token);
    let server = BridgeServer::new(state, &descriptors);

    // ── Serve stdio until shutdown ──────────────────────
    let ct = CancellationToken::new();
    let signal_ct = ct.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received");
        signal_ct.cancel();
    });

    let result = transport::serve_stdio(server, ct).await;

    proxy.stop().await;
    info!("rwx-bridge shut down");
    result
}

fn build_state(
    config: GlobalConfig,
    proxy: Arc<ProxyClient>,
    access_token: AccessToken,
) -> Arc<AppState> {
    let config = Arc::new(config);
    let cloud = CloudClient::new(config.cloud_base_url.clone(), access_token.clone());
    let logs = Arc::new(LogStore::new(cloud.clone(), &config.log_cache));

    Arc::new(AppState {
        config,
        proxy,
        cloud,
        logs,
        access_token,
        workflow_parser: Arc::new(RwxLintParser),
    })
}

// ── list-tools / call ────────────────────────────────────────────────────────

fn list_tools() {
    println!("Available tools:");
    for tool in BridgeServer::native_tools() {
        let description = tool.description.as_deref().unwrap_or("");
        println!("  {:<22} {description}", tool.name);
    }
}

async fn call_tool(config: GlobalConfig, tool: &str, args_json: Option<String>) -> Result<()> {
    let raw = args_json.unwrap_or_else(|| "{}".to_owned());
    let parsed: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|err| AppError::Config(format!("invalid JSON arguments: {err}")))?;
    let args = match parsed {
        serde_json::Value::Object(map) => Some(map),
        _ => {
            return Err(AppError::Config(
                "tool arguments must be a JSON object".into(),
            ));
        }
    };

    let access_token = load_access_token().await;
    // The proxy stays unstarted: `call` exercises native tools only.
    let state = build_state(config, Arc::new(ProxyClient::new()), access_token);

    let result = dispatch(&state, tool, args)
        .await
        .map_err(|err| AppError::Mcp(format!("{tool}: {err}")))?;

    print_result(&result);

    if result.is_error == Some(true) {
        std::process::exit(1);
    }
    Ok(())
}

async fn dispatch(
    state: &Arc<AppState>,
    tool: &str,
    args: Option<serde_json::Map<String, serde_json::Value>>,
) -> std::result::Result<CallToolResult, rmcp::ErrorData> {
    match tool {
        "launch_ci_run" => tools::launch_run::run(state, args).await,
        "wait_for_ci_run" => tools::wait_for_run::run(state, args).await,
        "get_run_results" => tools::run_results::run(state, args).await,
        "get_recent_runs" => tools::recent_runs::run(state, args).await,
        "get_task_logs" => tools::task_logs::run(state, args).await,
        "head_logs" => tools::head_logs::run(state, args).await,
        "tail_logs" => tools::tail_logs::run(state, args).await,
        "grep_logs" => tools::grep_logs::run(state, args).await,
        "get_artifacts" => tools::artifacts::run(state, args).await,
        "analyze_ci_run" => tools::analyze_run::run(state, args).await,
        "compare_runs" => tools::compare_runs::run(state, args).await,
        "validate_workflow" => tools::validate_workflow::run(state, args).await,
        "verify_rwx_cli" => tools::verify_cli::probe().await,
        "set_rwx_access_token" => tools::set_access_token::run(state, args).await,
        other => {
            let known: Vec<String> = BridgeServer::native_tools()
                .iter()
                .map(|t| t.name.to_string())
                .collect();
            error!(tool = other, "unknown tool");
            Err(rmcp::ErrorData::invalid_params(
                format!("unknown tool {other}; available: {}", known.join(", ")),
                None,
            ))
        }
    }
}

fn print_result(result: &CallToolResult) {
    if result.is_error == Some(true) {
        eprintln!("Error:");
    }

    for content in &result.content {
        if let Some(text) = content.as_text() {
            // Pretty-print when the payload is JSON.
            match serde_json::from_str::<serde_json::Value>(&text.text) {
                Ok(value) => match serde_json::to_string_pretty(&value) {
                    Ok(pretty) => println!("{pretty}"),
                    Err(_) => println!("{}", text.text),
                },
                Err(_) => println!("{}", text.text),
            }
        }
    }
}

// ── Infrastructure ───────────────────────────────────────────────────────────

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Stdout carries MCP frames; logging must stay on stderr.
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
