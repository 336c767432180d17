use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "charter",
    about = "Charter: append-only constitutional event ledger",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file. Defaults to ./charter.toml when present.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Override `ledger.data_dir` from the configuration.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Json,
    Jsonl,
    Csv,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Anchor {
    Genesis,
    ExternallyTimestamped,
    Pending,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the data directory, key file, and a default charter.toml
    Init(InitArgs),
    /// Append an event
    Append(AppendArgs),
    /// Show one event
    Show(ShowArgs),
    /// List events in an inclusive sequence range
    Range(RangeArgs),
    /// Query events by date range and type
    Query(QueryArgs),
    /// Report missing sequences in a range
    Continuity(ContinuityArgs),
    /// Orphan every event above a sequence and move HEAD there
    Rollback(RollbackArgs),
    /// Publish a Merkle checkpoint
    Checkpoint(CheckpointArgs),
    /// List published checkpoints
    Checkpoints,
    /// Build an inclusion proof for an event
    Prove(ProveArgs),
    /// Check a saved inclusion proof without a ledger
    VerifyProof(VerifyProofArgs),
    /// Export every valid event
    Export(ExportArgs),
    /// Verify a JSON export offline
    Verify(VerifyArgs),
    /// Check an attestation signature
    VerifyAttestation(VerifyAttestationArgs),
    /// Show public keys
    Keys,
    /// Ledger counters
    Stats,
}

#[derive(Args)]
pub struct InitArgs {
    /// Overwrite an existing charter.toml
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct AppendArgs {
    /// Namespaced event type, e.g. `executive.task.activated`
    pub event_type: String,
    /// Payload as a JSON object
    #[arg(short, long, default_value = "{}")]
    pub payload: String,
    /// Attributing agent: a UUID or `system`
    #[arg(long, default_value = "system")]
    pub agent: String,
}

#[derive(Args)]
pub struct ShowArgs {
    pub sequence: u64,
    #[arg(long)]
    pub include_orphaned: bool,
}

#[derive(Args)]
pub struct RangeArgs {
    pub start: u64,
    pub end: u64,
    #[arg(long)]
    pub include_orphaned: bool,
}

#[derive(Args)]
pub struct QueryArgs {
    /// RFC 3339 lower bound on the authority timestamp
    #[arg(long)]
    pub from: Option<String>,
    /// RFC 3339 upper bound on the authority timestamp
    #[arg(long)]
    pub to: Option<String>,
    /// Event type; repeat for several
    #[arg(long = "type")]
    pub types: Vec<String>,
    #[arg(long)]
    pub include_orphaned: bool,
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,
}

#[derive(Args)]
pub struct ContinuityArgs {
    pub start: u64,
    pub end: u64,
}

#[derive(Args)]
pub struct RollbackArgs {
    pub sequence: u64,
}

#[derive(Args)]
pub struct CheckpointArgs {
    /// Last covered sequence. Defaults to HEAD.
    pub up_to: Option<u64>,
    #[arg(long, value_enum, default_value = "pending")]
    pub anchor: Anchor,
}

#[derive(Args)]
pub struct ProveArgs {
    pub sequence: u64,
    /// Write the proof to a file instead of stdout
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct VerifyProofArgs {
    pub path: PathBuf,
}

#[derive(Args)]
pub struct ExportArgs {
    #[arg(long = "as", value_enum, default_value = "json")]
    pub layout: ExportFormat,
    #[arg(short, long)]
    pub out: Option<PathBuf>,
    /// Requesting identity: a UUID or `system`
    #[arg(long, default_value = "system")]
    pub requester: String,
    /// Also write signed attestation metadata to this path
    #[arg(long)]
    pub attest: Option<PathBuf>,
}

#[derive(Args)]
pub struct VerifyArgs {
    pub path: PathBuf,
}

#[derive(Args)]
pub struct VerifyAttestationArgs {
    pub path: PathBuf,
    /// Hex-encoded export verifying key
    #[arg(long)]
    pub key: String,
}
