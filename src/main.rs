use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use golden_record::{
    db, fixtures, load_baseline, load_events, load_sources, save_golden, save_provenance,
    AuditFanout, AuditLog, BaselineOrigin, Config, DualModeEventProcessor, EventLog,
    GoldenRecordAssembler, LaneOutcome, SqliteAudit,
};

/// Golden customer record: multi-source merge plus real-time / batch updates
#[derive(Parser, Debug)]
#[command(name = "golden-record")]
#[command(version)]
struct Cli {
    /// TOML config file (defaults to ./golden-record.toml when present)
    #[arg(long, global = true, env = "GOLDEN_RECORD_CONFIG")]
    config: Option<PathBuf>,

    /// Directory for the golden record, provenance, event log and audit logs
    #[arg(long, global = true, env = "GOLDEN_RECORD_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Mirror audit entries into this SQLite database
    #[arg(long, global = true, env = "GOLDEN_RECORD_AUDIT_DB")]
    audit_db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge source snapshots into a golden record with provenance
    Merge {
        /// JSON array of source records (demo CRM + ERP feeds when omitted)
        #[arg(long)]
        sources: Option<PathBuf>,

        /// Systems consulted first for customer_id, in order
        #[arg(long, value_delimiter = ',')]
        id_priority: Vec<String>,
    },
    /// Apply updates through both lanes and compare their end states
    Sync {
        /// JSON array or JSONL file of update events (demo events when omitted)
        #[arg(long)]
        events: Option<PathBuf>,
    },
    /// Re-run the batch job over the committed event log
    Replay,
    /// merge followed by sync
    Run {
        #[arg(long)]
        sources: Option<PathBuf>,

        #[arg(long)]
        events: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "golden_record=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())
        .context("Failed to load configuration")?
        .with_overrides(cli.output_dir, cli.audit_db);
    info!(output_dir = %config.output_dir.display(), "configuration loaded");

    match cli.command {
        Command::Merge {
            sources,
            id_priority,
        } => run_merge(&config, sources.as_deref(), id_priority),
        Command::Sync { events } => run_sync(&config, events.as_deref()),
        Command::Replay => run_replay(&config),
        Command::Run { sources, events } => {
            run_merge(&config, sources.as_deref(), Vec::new())?;
            run_sync(&config, events.as_deref())
        }
    }
}

fn run_merge(config: &Config, sources: Option<&Path>, id_priority: Vec<String>) -> Result<()> {
    println!("🧩 Golden Record: merge");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let sources = match sources {
        Some(path) => load_sources(path)
            .with_context(|| format!("Failed to read sources from {}", path.display()))?,
        None => fixtures::demo_sources(),
    };
    println!("\n📂 {} source records", sources.len());

    let priority = if id_priority.is_empty() {
        config.id_priority.clone()
    } else {
        id_priority
    };
    let assembly = GoldenRecordAssembler::with_id_priority(priority)
        .assemble(&sources)
        .context("Failed to assemble golden record")?;

    println!("\n✨ Golden record:");
    println!("{}", serde_json::to_string_pretty(&assembly.golden)?);
    println!("\n🔍 Provenance:");
    println!("{}", serde_json::to_string_pretty(&assembly.provenance)?);

    save_golden(&config.golden_path(), &assembly.golden)
        .context("Failed to write golden record")?;
    save_provenance(&config.provenance_path(), &assembly.provenance)
        .context("Failed to write provenance")?;
    println!("\n💾 Wrote {}", config.golden_path().display());
    println!("💾 Wrote {}", config.provenance_path().display());

    if let Some(db_path) = &config.audit_db {
        let audit = SqliteAudit::open(db_path)
            .with_context(|| format!("Failed to open audit database {}", db_path.display()))?;
        if db::insert_assembly(audit.connection(), &assembly)? {
            println!("🗄️  Snapshot stored in {}", db_path.display());
        } else {
            println!("🗄️  Identical snapshot already in {}", db_path.display());
        }
    }

    Ok(())
}

/// One lane's sink: its text log plus the SQLite mirror when configured
fn lane_sink(log_path: &Path, audit_db: Option<&Path>) -> Result<AuditFanout> {
    let log = AuditLog::create(log_path)
        .with_context(|| format!("Failed to create audit log {}", log_path.display()))?;
    let mut sink = AuditFanout::new().with(log);
    if let Some(db_path) = audit_db {
        let mirror = SqliteAudit::open(db_path)
            .with_context(|| format!("Failed to open audit database {}", db_path.display()))?;
        sink = sink.with(mirror);
    }
    Ok(sink)
}

fn load_start_state(config: &Config) -> Result<golden_record::GoldenRecord> {
    let baseline = load_baseline(&config.golden_path()).context("Failed to load baseline")?;
    match baseline.origin {
        BaselineOrigin::File => println!("\n📂 Baseline: {}", config.golden_path().display()),
        BaselineOrigin::Fallback => println!("\n⚠️  Baseline file missing, using fallback record"),
    }
    Ok(baseline.record)
}

fn print_lane(outcome: &LaneOutcome, log_path: &Path) {
    println!(
        "   {} {} events → {}",
        outcome.lane.tag(),
        outcome.events_applied(),
        log_path.display()
    );
}

fn run_sync(config: &Config, events: Option<&Path>) -> Result<()> {
    println!("\n🔄 Golden Record: sync");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let baseline = load_start_state(config)?;
    let events = match events {
        Some(path) => load_events(path)
            .with_context(|| format!("Failed to read events from {}", path.display()))?,
        None => fixtures::demo_events(),
    };
    println!("📨 {} update events", events.len());

    let audit_db = config.audit_db.as_deref();
    let mut realtime_sink = lane_sink(&config.realtime_log_path(), audit_db)?;
    let mut batch_sink = lane_sink(&config.batch_log_path(), audit_db)?;

    let processor = DualModeEventProcessor::new(EventLog::new(config.event_log_path()));
    let outcome = processor
        .run(&baseline, &events, &mut realtime_sink, &mut batch_sink)
        .context("Update processing failed")?;

    println!("\n📝 Lanes:");
    print_lane(&outcome.realtime, &config.realtime_log_path());
    print_lane(&outcome.batch, &config.batch_log_path());

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if outcome.report.converged {
        println!("✅ {}", outcome.report.summary());
    } else {
        println!("❌ {}", outcome.report.summary());
    }
    println!("\n✨ Final state:");
    println!("{}", serde_json::to_string_pretty(&outcome.realtime.final_state)?);

    if !outcome.report.converged {
        anyhow::bail!("real-time and batch lanes diverged");
    }
    Ok(())
}

fn run_replay(config: &Config) -> Result<()> {
    println!("♻️  Golden Record: replay");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let baseline = load_start_state(config)?;
    let processor = DualModeEventProcessor::new(EventLog::new(config.event_log_path()));
    let receipt = processor
        .event_log()
        .recover()
        .with_context(|| format!("No committed event log at {}", config.event_log_path().display()))?;
    println!("📨 {} committed events", receipt.events());

    let mut sink = lane_sink(&config.batch_log_path(), config.audit_db.as_deref())?;
    let outcome = processor
        .replay(&baseline, &receipt, &mut sink)
        .context("Batch replay failed")?;

    print_lane(&outcome, &config.batch_log_path());
    println!("\n✨ Final state:");
    println!("{}", serde_json::to_string_pretty(&outcome.final_state)?);
    Ok(())
}
