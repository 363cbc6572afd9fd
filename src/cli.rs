// Copyright (c) 2024-2026 The Courier Authors
//
// SPDX-License-Identifier: MIT
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "courier",
    about = "A streaming ReAct agent loop over a pluggable model provider",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// The task to hand to the agent.
    #[arg(value_name = "PROMPT")]
    pub prompt: Option<String>,

    /// Model to use, e.g. "mock" or "anthropic/claude-opus-4-5".
    /// Network-backed providers are registered but not wired up in-process;
    /// "mock" is the only driver guaranteed to run without an API key.
    #[arg(long, short = 'm', env = "COURIER_MODEL", default_value = "mock")]
    pub model: Option<String>,

    /// Path to config file (overrides auto-discovery).
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Path to a sqlite file used to persist interrupt checkpoints.
    /// Omit to keep checkpoints in memory for the lifetime of the process.
    #[arg(long, value_name = "PATH")]
    pub checkpoint_db: Option<PathBuf>,

    /// Resume a paused execution from a previously emitted checkpoint id.
    #[arg(long, value_name = "ID")]
    pub resume: Option<String>,

    /// Answer to a pending question, in `id=value` form. May be repeated.
    /// Only meaningful together with --resume.
    #[arg(long = "answer", value_name = "ID=VALUE")]
    pub answers: Vec<String>,

    /// Tenant id checkpoints are scoped under.
    #[arg(long, default_value = "local")]
    pub tenant: String,

    /// Maximum model/tool round trips before the run is aborted.
    #[arg(long, default_value_t = 10)]
    pub max_iterations: usize,

    /// Increase verbosity (-v = debug, -vv = trace).
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available models for the configured provider(s).
    ListModels {
        /// Filter by provider name (e.g. "openai", "anthropic", "mock").
        #[arg(long, short = 'p')]
        provider: Option<String>,
        /// Output as JSON instead of a formatted table.
        #[arg(long)]
        json: bool,
    },
    /// List all supported model providers.
    ListProviders {
        /// Show detailed information for each provider.
        #[arg(long, short = 'v')]
        verbose: bool,
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration and exit.
    ShowConfig,
}

/// Parse `--answer id=value` into `(id, value)`. The value is interpreted
/// as JSON when possible (so `--answer confirm=true` or
/// `--answer picks=["a","b"]` work), falling back to a plain string.
pub fn parse_answer(spec: &str) -> anyhow::Result<(String, serde_json::Value)> {
    let (id, raw) = spec
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("invalid --answer {spec:?}, expected ID=VALUE"))?;
    let value = serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
    Ok((id.to_string(), value))
}
