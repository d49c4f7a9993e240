// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Core turn-processing engine for the agent service tier.
///
/// This binary is a bootstrap, not a gateway: it wires together the policy
/// loader, tool registry, MCP client, provider adapters, event sink, and
/// worker pool, then either runs the pool until shutdown (`serve`) or drives
/// a single turn straight through the engine for local exercising (`submit`).
/// Webhook handling, HTTP ingress routing, and auth middleware live in the
/// (out-of-scope) gateway tier and are not implemented here.
#[derive(Parser, Debug)]
#[command(name = "turnforge", version, about)]
pub struct Cli {
    /// Path to a YAML config file layered on top of the discovered defaults.
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Write logs to stderr at debug level instead of the default info level.
    #[arg(long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the turn worker pool and block until shutdown (Ctrl-C).
    ///
    /// There is no turn ingress over the wire here — that arrives from the
    /// gateway tier, out of scope for this crate. `serve` exists to prove
    /// the wiring boots, holds its worker fibres open, and drains them
    /// gracefully on shutdown.
    Serve,

    /// Print the fully merged configuration as YAML and exit.
    ShowConfig,

    /// Run a single turn through the engine directly (no queue, no pool)
    /// and print its event stream to stdout, one JSON object per line.
    Submit {
        /// The turn's user-facing text.
        text: String,

        /// Provider name to target (defaults to `providers.default_provider_name`).
        #[arg(long)]
        provider: Option<String>,

        /// Model name (defaults to the provider's configured default model).
        #[arg(long, default_value = "default")]
        model: String,

        /// Enable MCP tools for this turn.
        #[arg(long)]
        mcp: bool,

        /// Subagent overlay to apply, if any.
        #[arg(long)]
        subagent: Option<String>,
    },
}
