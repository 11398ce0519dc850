mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    canon::CanonMode, config::ConfigSubcommand, keys::KeysSubcommand,
    manifest::ManifestSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "packtrust",
    about = "Model pack trust and rollout control: build, sign, verify and activate packs",
    version,
    propagate_version = true
)]
struct Cli {
    /// Node root (default: auto-detect from .packtrust/ or .git/)
    #[arg(long, global = true, env = "PACKTRUST_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize .packtrust/ on this node
    Init {
        /// Node name (default: root directory name)
        #[arg(long)]
        node: Option<String>,
        /// Runtime version this node runs
        #[arg(long)]
        runtime_version: Option<String>,
        /// Gateway version this node runs
        #[arg(long)]
        gateway_version: Option<String>,
    },

    /// Build and inspect pack manifests
    Manifest {
        #[command(subcommand)]
        subcommand: ManifestSubcommand,
    },

    /// Sign a pack's manifest with the key in PACKTRUST_SIGNING_KEY_B64
    Sign {
        pack_dir: PathBuf,
        /// Key id recorded in signature.json (default: derived from the public key)
        #[arg(long)]
        key_id: Option<String>,
    },

    /// Verify a pack against the node key ring
    Verify {
        pack_dir: PathBuf,
        /// Evaluate key lifecycle at this Unix time in ms (default: now)
        #[arg(long)]
        now_ms: Option<i64>,
    },

    /// Manage the node key ring
    Keys {
        #[command(subcommand)]
        subcommand: KeysSubcommand,
    },

    /// Verify a pack and make it the active pack if every gate passes
    Apply {
        pack_dir: PathBuf,
        /// Authorization expiry, Unix ms; an apply without one is blocked
        #[arg(long, allow_hyphen_values = true)]
        expires_at_ms: Option<i64>,
        /// Decision time, Unix ms (default: now)
        #[arg(long)]
        now_ms: Option<i64>,
    },

    /// Show the persisted rollout state
    State,

    /// Print the canonical form of a JSON file
    Canon {
        file: PathBuf,
        #[arg(long, value_enum, default_value_t = CanonMode::General)]
        mode: CanonMode,
    },

    /// Validate the node configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init {
            node,
            runtime_version,
            gateway_version,
        } => cmd::init::run(
            &root,
            node.as_deref(),
            runtime_version.as_deref(),
            gateway_version.as_deref(),
        ),
        Commands::Manifest { subcommand } => cmd::manifest::run(subcommand, cli.json),
        Commands::Sign { pack_dir, key_id } => {
            cmd::sign::run(&pack_dir, key_id.as_deref(), cli.json)
        }
        Commands::Verify { pack_dir, now_ms } => {
            cmd::verify::run(&root, &pack_dir, now_ms, cli.json)
        }
        Commands::Keys { subcommand } => cmd::keys::run(&root, subcommand, cli.json),
        Commands::Apply {
            pack_dir,
            expires_at_ms,
            now_ms,
        } => cmd::apply::run(&root, &pack_dir, expires_at_ms, now_ms, cli.json),
        Commands::State => cmd::state::run(&root, cli.json),
        Commands::Canon { file, mode } => cmd::canon::run(&file, mode, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
