// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! ragraph CLI - resource allocation graphs and deadlock detection

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use ragraph::commands::{self, allocate::Relation, check::CheckArgs, export::ExportFormat};
use ragraph::deadlock::DeadlockPolicy;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ragraph")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long)]
    quiet: bool,

    /// Configuration file path
    #[arg(short, long, env = "RAGRAPH_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Data directory override
    #[arg(long, env = "RAGRAPH_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR", value_parser = clap::builder::FalseyValueParser::new())]
    no_color: bool,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage resources
    Resource {
        /// Action: add, delete, list
        action: String,

        /// Resource name (or ID for delete)
        name: Option<String>,

        /// Number of units for a new resource
        #[arg(short, long, default_value_t = 1)]
        units: u32,
    },

    /// Manage processes
    Process {
        /// Action: add, remove, list
        action: String,

        /// Process name (or ID for remove)
        name: Option<String>,
    },

    /// Allocate resource units to a process
    Allocate {
        /// Process name or ID
        process: String,
        /// Resource name or ID
        resource: String,
        /// Units to allocate
        #[arg(short, long, default_value_t = 1)]
        units: u32,
    },

    /// Record that a process waits for resource units
    Request {
        /// Process name or ID
        process: String,
        /// Resource name or ID
        resource: String,
        /// Units requested
        #[arg(short, long, default_value_t = 1)]
        units: u32,
    },

    /// Release every unit of a resource held by a process
    Release {
        /// Process name or ID
        process: String,
        /// Resource name or ID
        resource: String,
    },

    /// Cancel a pending request
    Cancel {
        /// Process name or ID
        process: String,
        /// Resource name or ID
        resource: String,
    },

    /// Clear all processes, resources and history
    Reset,

    /// Export the allocation graph
    Graph {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<std::path::PathBuf>,
    },

    /// Detect deadlocks
    Check {
        /// Graph file to check instead of the stored state ("-" for stdin)
        #[arg(short, long)]
        file: Option<std::path::PathBuf>,

        /// Which cycles count: any-cycle, alternating
        #[arg(long, value_parser = parse_policy)]
        policy: Option<DeadlockPolicy>,

        /// Maximum number of cycles to list
        #[arg(long)]
        max_cycles: Option<usize>,

        /// Exit with an error when a deadlock is found
        #[arg(long)]
        fail_on_deadlock: bool,
    },

    /// Show resource utilisation and hold times
    Usage,

    /// Show configuration
    Config {
        /// Configuration key (omit to show all)
        key: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: clap_complete::Shell,
    },
}

fn parse_policy(s: &str) -> Result<DeadlockPolicy, String> {
    DeadlockPolicy::parse(s).ok_or_else(|| format!("unknown policy '{s}' (any-cycle, alternating)"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ragraph::config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    // Initialize logging
    let level = match cli.verbose {
        0 if cli.quiet => "error",
        0 => config.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let ctx = commands::Context {
        config,
        json: cli.json,
        color: !cli.no_color && !cli.json,
    };

    // Execute command
    match cli.command {
        Commands::Resource { action, name, units } => {
            commands::resource::run(&ctx, &action, name, units)
        }
        Commands::Process { action, name } => {
            commands::process::run(&ctx, &action, name)
        }
        Commands::Allocate { process, resource, units } => {
            commands::allocate::run(&ctx, Relation::Allocate, &process, &resource, units)
        }
        Commands::Request { process, resource, units } => {
            commands::allocate::run(&ctx, Relation::Request, &process, &resource, units)
        }
        Commands::Release { process, resource } => {
            commands::allocate::run(&ctx, Relation::Release, &process, &resource, 0)
        }
        Commands::Cancel { process, resource } => {
            commands::allocate::run(&ctx, Relation::Cancel, &process, &resource, 0)
        }
        Commands::Reset => {
            commands::allocate::reset(&ctx)
        }
        Commands::Graph { format, output } => {
            commands::export::run(&ctx, format, output)
        }
        Commands::Check { file, policy, max_cycles, fail_on_deadlock } => {
            let args = CheckArgs { file, policy, max_cycles, fail_on_deadlock };
            commands::check::run(&ctx, &args).map(|_| ())
        }
        Commands::Usage => {
            commands::usage::run(&ctx)
        }
        Commands::Config { key } => {
            commands::config::run(&ctx, key.as_deref())
        }
        Commands::Completions { shell } => {
            commands::completions::run(shell, &mut Cli::command())
        }
    }
}
