use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;
use uuid::Uuid;

use charter_crypto::VerifyingKey;
use charter_export::{verify_signature, write_csv, write_json, write_jsonl};
use charter_sdk::{
    CharterConfig, EventQuery, KeyFile, LedgerContext, SdkError, StoredEvent, KEY_FILE,
};
use charter_types::{
    AnchorType, AttestationMetadata, Event, EventDraft, InclusionProof, Payload, VerificationResult,
    VerificationStatus,
};

use crate::cli::*;

const DEFAULT_CONFIG: &str = "charter.toml";

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(cli.config.as_deref(), cli.data_dir.clone())?;
    let out = Output { format: cli.format };
    match cli.command {
        Command::Init(args) => cmd_init(&config, cli.config.as_deref(), args),
        Command::Append(args) => cmd_append(&out, config, args),
        Command::Show(args) => cmd_show(&out, config, args),
        Command::Range(args) => cmd_range(&out, config, args),
        Command::Query(args) => cmd_query(&out, config, args),
        Command::Continuity(args) => cmd_continuity(&out, config, args),
        Command::Rollback(args) => cmd_rollback(&out, config, args),
        Command::Checkpoint(args) => cmd_checkpoint(&out, config, args),
        Command::Checkpoints => cmd_checkpoints(&out, config),
        Command::Prove(args) => cmd_prove(config, args),
        Command::VerifyProof(args) => cmd_verify_proof(&out, args),
        Command::Export(args) => cmd_export(config, args),
        Command::Verify(args) => cmd_verify(&out, args),
        Command::VerifyAttestation(args) => cmd_verify_attestation(args),
        Command::Keys => cmd_keys(&out, &config),
        Command::Stats => cmd_stats(&out, config),
    }
}

fn load_config(path: Option<&Path>, data_dir: Option<PathBuf>) -> anyhow::Result<CharterConfig> {
    let mut config = match path {
        Some(path) => CharterConfig::load(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => {
            CharterConfig::load(Path::new(DEFAULT_CONFIG))?
        }
        None => CharterConfig::default(),
    };
    if let Some(dir) = data_dir {
        config.ledger.data_dir = dir;
    }
    tracing::debug!(data_dir = %config.ledger.data_dir.display(), "configuration loaded");
    Ok(config)
}

struct Output {
    format: OutputFormat,
}

impl Output {
    fn json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    fn emit<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }
}

fn print_event(stored: &StoredEvent) {
    let event = &stored.event;
    let marker = if stored.orphaned {
        " (orphaned)".red().to_string()
    } else {
        String::new()
    };
    println!(
        "{}  {}  {}  {}{}",
        format!("#{}", event.sequence).yellow().bold(),
        event.content_hash.short_hex().dimmed(),
        event.event_type.cyan(),
        event.authority_timestamp.to_rfc3339(),
        marker
    );
}

fn print_events(out: &Output, events: &[StoredEvent]) -> anyhow::Result<()> {
    if out.json() {
        return out.emit(&events);
    }
    if events.is_empty() {
        println!("No events.");
    }
    for stored in events {
        print_event(stored);
    }
    Ok(())
}

fn cmd_init(
    config: &CharterConfig,
    config_path: Option<&Path>,
    args: InitArgs,
) -> anyhow::Result<()> {
    let config_path = config_path.unwrap_or(Path::new(DEFAULT_CONFIG));
    if config_path.exists() && !args.force {
        println!("{} {} already exists", "·".dimmed(), config_path.display());
    } else {
        fs::write(config_path, config.to_toml_string()?)
            .with_context(|| format!("writing {}", config_path.display()))?;
        println!("{} Wrote {}", "✓".green().bold(), config_path.display());
    }

    let data_dir = &config.ledger.data_dir;
    fs::create_dir_all(data_dir)?;
    let keys = KeyFile::load_or_generate(&data_dir.join(KEY_FILE))?;
    println!(
        "{} Initialized Charter ledger in {}",
        "✓".green().bold(),
        data_dir.display().to_string().bold()
    );
    println!("  Witness: {}", keys.witness_id.to_string().cyan());
    println!(
        "  Export key: {}",
        keys.export_verifying_key()?.to_hex().yellow()
    );
    Ok(())
}

fn cmd_append(out: &Output, config: CharterConfig, args: AppendArgs) -> anyhow::Result<()> {
    let payload: Payload =
        serde_json::from_str(&args.payload).context("payload must be a JSON object")?;
    let draft = if args.agent == charter_types::SYSTEM_AGENT {
        EventDraft::system(args.event_type, payload)
    } else {
        let agent = Uuid::parse_str(&args.agent).context("agent must be a UUID or `system`")?;
        EventDraft::by_agent(agent, args.event_type, payload)
    };

    let ctx = LedgerContext::open(config)?;
    match ctx.append(draft) {
        Ok(event) => print_appended(out, &event),
        Err(SdkError::CheckpointAfterAppend { event, source }) => {
            print_appended(out, &event)?;
            Err(anyhow::Error::new(*source).context(format!(
                "event #{} is committed; do not retry the append",
                event.sequence
            )))
        }
        Err(e) => Err(e.into()),
    }
}

fn print_appended(out: &Output, event: &Event) -> anyhow::Result<()> {
    if out.json() {
        return out.emit(event);
    }
    println!(
        "{} Appended {} {}",
        "✓".green().bold(),
        format!("#{}", event.sequence).yellow().bold(),
        event.event_type.cyan()
    );
    println!("  Hash: {}", event.content_hash.to_hex().dimmed());
    println!("  Prev: {}", event.prev_hash.to_hex().dimmed());
    Ok(())
}

fn cmd_show(out: &Output, config: CharterConfig, args: ShowArgs) -> anyhow::Result<()> {
    let ctx = LedgerContext::open(config)?;
    let Some(stored) = ctx.get(args.sequence, args.include_orphaned)? else {
        bail!("no event at sequence {}", args.sequence);
    };
    if out.json() {
        return out.emit(&stored);
    }
    let event = &stored.event;
    print_event(&stored);
    println!("  Id:        {}", event.event_id);
    println!("  Agent:     {}", event.agent_id);
    println!("  Witness:   {}", event.witness_id);
    println!("  Hash:      {}", event.content_hash);
    println!("  Prev:      {}", event.prev_hash);
    println!("  Payload:   {}", serde_json::to_string(&event.payload)?);
    Ok(())
}

fn cmd_range(out: &Output, config: CharterConfig, args: RangeArgs) -> anyhow::Result<()> {
    let ctx = LedgerContext::open(config)?;
    let events = ctx.read_range(args.start, args.end, args.include_orphaned)?;
    print_events(out, &events)
}

fn parse_time(value: &str) -> anyhow::Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(value)
        .with_context(|| format!("invalid RFC 3339 timestamp {value:?}"))?
        .with_timezone(&Utc))
}

fn cmd_query(out: &Output, config: CharterConfig, args: QueryArgs) -> anyhow::Result<()> {
    let mut query = EventQuery::new();
    if let Some(ref from) = args.from {
        query.start_date = Some(parse_time(from)?);
    }
    if let Some(ref to) = args.to {
        query.end_date = Some(parse_time(to)?);
    }
    if !args.types.is_empty() {
        query = query.with_types(args.types);
    }
    if args.include_orphaned {
        query = query.including_orphaned();
    }
    if let Some(limit) = args.limit {
        query = query.limit(limit);
    }

    let ctx = LedgerContext::open(config)?;
    let events = ctx.query(&query)?;
    print_events(out, &events)
}

fn cmd_continuity(out: &Output, config: CharterConfig, args: ContinuityArgs) -> anyhow::Result<()> {
    let ctx = LedgerContext::open(config)?;
    let (complete, missing) = ctx.continuity(args.start, args.end)?;
    if out.json() {
        return out.emit(&serde_json::json!({ "complete": complete, "missing": missing }));
    }
    if complete {
        println!(
            "{} {}..={} is contiguous",
            "✓".green().bold(),
            args.start,
            args.end
        );
    } else {
        println!("{} Missing sequences: {:?}", "✗".red().bold(), missing);
    }
    Ok(())
}

fn cmd_rollback(out: &Output, config: CharterConfig, args: RollbackArgs) -> anyhow::Result<()> {
    let ctx = LedgerContext::open(config)?;
    let orphaned = ctx.rollback_to(args.sequence)?;
    if out.json() {
        return out.emit(&serde_json::json!({ "head": args.sequence, "orphaned": orphaned }));
    }
    println!(
        "{} HEAD moved to {} ({} events orphaned)",
        "✓".green().bold(),
        format!("#{}", args.sequence).yellow().bold(),
        orphaned
    );
    Ok(())
}

fn cmd_checkpoint(out: &Output, config: CharterConfig, args: CheckpointArgs) -> anyhow::Result<()> {
    let ctx = LedgerContext::open(config)?;
    let up_to = match args.up_to {
        Some(sequence) => sequence,
        None => ctx.stats()?.head,
    };
    let anchor = match args.anchor {
        Anchor::Genesis => AnchorType::Genesis,
        Anchor::ExternallyTimestamped => AnchorType::ExternallyTimestamped,
        Anchor::Pending => AnchorType::Pending,
    };
    let checkpoint = ctx.create_anchored_checkpoint(up_to, anchor)?;
    if out.json() {
        return out.emit(&checkpoint);
    }
    println!(
        "{} Checkpoint over 1..={} ({} leaves, {})",
        "✓".green().bold(),
        checkpoint.event_sequence,
        checkpoint.leaf_count,
        checkpoint.anchor_type
    );
    println!("  Root: {}", checkpoint.anchor_hash.to_hex().yellow());
    Ok(())
}

fn cmd_checkpoints(out: &Output, config: CharterConfig) -> anyhow::Result<()> {
    let ctx = LedgerContext::open(config)?;
    let checkpoints = ctx.checkpoints().list_checkpoints()?;
    if out.json() {
        return out.emit(&checkpoints);
    }
    if checkpoints.is_empty() {
        println!("No checkpoints.");
    }
    for checkpoint in &checkpoints {
        println!(
            "{}  {}  {}  {}",
            format!("1..={}", checkpoint.event_sequence).yellow().bold(),
            checkpoint.anchor_hash.short_hex().dimmed(),
            checkpoint.anchor_type.to_string().cyan(),
            checkpoint.timestamp.to_rfc3339()
        );
    }
    println!(
        "Pending: {} events",
        ctx.checkpoints().pending_count()?.to_string().bold()
    );
    Ok(())
}

fn cmd_prove(config: CharterConfig, args: ProveArgs) -> anyhow::Result<()> {
    let ctx = LedgerContext::open(config)?;
    let proof = ctx.prove(args.sequence)?;
    let json = serde_json::to_string_pretty(&proof)?;
    match args.out {
        Some(path) => {
            fs::write(&path, json)?;
            let kind = match proof {
                InclusionProof::Merkle(_) => "Merkle",
                InclusionProof::HashChain(_) => "hash-chain",
            };
            eprintln!(
                "{} Wrote {} proof for #{} to {}",
                "✓".green().bold(),
                kind,
                args.sequence,
                path.display()
            );
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn report(out: &Output, result: &VerificationResult) -> anyhow::Result<()> {
    if out.json() {
        out.emit(result)?;
    } else {
        let status = match result.status {
            VerificationStatus::Valid => "VALID".green().bold(),
            VerificationStatus::Partial => "PARTIAL".yellow().bold(),
            VerificationStatus::Invalid => "INVALID".red().bold(),
        };
        println!("{} ({} events verified)", status, result.events_verified);
        let mark = |ok: bool| if ok { "✓".green() } else { "✗".red() };
        println!("  {} hash chain", mark(result.hash_chain_valid));
        println!("  {} merkle root", mark(result.merkle_valid));
        println!("  {} sequence completeness", mark(result.sequence_complete));
        println!("  {} state replay", mark(result.state_replay_valid));
        for issue in &result.issues {
            let at = issue
                .sequence
                .map(|s| format!("#{s}"))
                .unwrap_or_else(|| "-".into());
            println!("  {} {} {}", at.yellow(), format!("{:?}", issue.kind).red(), issue.message);
        }
    }
    if result.status != VerificationStatus::Valid {
        bail!("verification {}", result.status);
    }
    Ok(())
}

fn cmd_verify_proof(out: &Output, args: VerifyProofArgs) -> anyhow::Result<()> {
    let bytes = fs::read(&args.path).with_context(|| format!("reading {}", args.path.display()))?;
    let proof: InclusionProof = serde_json::from_slice(&bytes)?;
    let result = match proof {
        InclusionProof::Merkle(ref p) => charter_verify::verify_merkle_proof(p),
        InclusionProof::HashChain(ref p) => charter_verify::verify_hash_chain_proof(p),
    };
    report(out, &result)
}

fn cmd_export(config: CharterConfig, args: ExportArgs) -> anyhow::Result<()> {
    let ctx = LedgerContext::open(config)?;
    let export = ctx.export_complete(&args.requester)?;

    let sink: Box<dyn Write> = match args.out {
        Some(ref path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    };
    match args.layout {
        ExportFormat::Json => write_json(&export, sink)?,
        ExportFormat::Jsonl => write_jsonl(&export.events, sink)?,
        ExportFormat::Csv => write_csv(&export.events, sink)?,
    }

    if let Some(ref path) = args.attest {
        let attestation = ctx.attest(&export)?;
        fs::write(path, serde_json::to_string_pretty(&attestation)?)?;
    }
    eprintln!(
        "{} Exported {} events ({:?})",
        "✓".green().bold(),
        export.metadata.total_events,
        export.metadata.sequence_range
    );
    Ok(())
}

fn cmd_verify(out: &Output, args: VerifyArgs) -> anyhow::Result<()> {
    let file = File::open(&args.path).with_context(|| format!("opening {}", args.path.display()))?;
    let result = charter_verify::verify_offline_reader(io::BufReader::new(file))?;
    report(out, &result)
}

fn cmd_verify_attestation(args: VerifyAttestationArgs) -> anyhow::Result<()> {
    let bytes = fs::read(&args.path).with_context(|| format!("reading {}", args.path.display()))?;
    let attestation: AttestationMetadata = serde_json::from_slice(&bytes)?;
    let key = VerifyingKey::from_hex(&args.key).context("invalid verifying key")?;
    verify_signature(&attestation, &key)?;
    println!(
        "{} Attestation for {}..={} ({} events) is signed",
        "✓".green().bold(),
        attestation.sequence_start,
        attestation.sequence_end,
        attestation.event_count
    );
    Ok(())
}

fn cmd_keys(out: &Output, config: &CharterConfig) -> anyhow::Result<()> {
    let path = config.ledger.data_dir.join(KEY_FILE);
    let keys = KeyFile::load(&path).with_context(|| "run `charter init` first".to_string())?;
    let verifier = keys.event_signer()?.verifier();
    let export = keys.export_verifying_key()?;
    if out.json() {
        return out.emit(&serde_json::json!({
            "witness_id": keys.witness_id,
            "agent_key": verifier.agent.to_hex(),
            "witness_key": verifier.witness.to_hex(),
            "export_key": export.to_hex(),
        }));
    }
    println!("Witness:     {}", keys.witness_id.to_string().cyan());
    println!("Agent key:   {}", verifier.agent.to_hex());
    println!("Witness key: {}", verifier.witness.to_hex());
    println!("Export key:  {}", export.to_hex().yellow());
    Ok(())
}

fn cmd_stats(out: &Output, config: CharterConfig) -> anyhow::Result<()> {
    let ctx = LedgerContext::open(config)?;
    let stats = ctx.stats()?;
    let checkpoints = ctx.checkpoints().list_checkpoints()?.len();
    let pending = ctx.checkpoints().pending_count()?;
    let gaps = ctx.ledger().authorized_gaps()?;
    if out.json() {
        return out.emit(&serde_json::json!({
            "stats": stats,
            "checkpoints": checkpoints,
            "pending": pending,
            "authorized_gaps": gaps,
        }));
    }
    println!("HEAD:         {}", format!("#{}", stats.head).yellow().bold());
    println!("Max sequence: {}", stats.max_sequence);
    println!("Valid:        {}", stats.valid_events.to_string().green());
    println!("Orphaned:     {}", stats.orphaned_events.to_string().red());
    println!("Checkpoints:  {checkpoints} ({pending} pending)");
    for gap in gaps {
        println!("  rollback gap {}..={}", gap.start, gap.end);
    }
    Ok(())
}
