use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use kbm_engine::{DedupEngine, EngineConfig, RunReport};
use kbm_merge::{JobOutcome, MergeJob, MergeOrdering};
use kbm_store::{InMemoryKnowledgeStore, Snapshot};
use kbm_stream::ProgressTracker;
use kbm_types::EntityId;

use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Run(args) => cmd_run(args, &format).await,
        Command::Plan(args) => cmd_plan(args, &format).await,
        Command::Merge(args) => cmd_merge(args, &format).await,
        Command::Offset(args) => cmd_offset(args, &format),
    }
}

async fn cmd_run(args: RunArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let store = load_store(&args.store.snapshot)?;
    let mut config = load_config(&args.store)?;
    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    if let Some(offset) = args.offset {
        config.offset = offset;
    }
    config.edit_groups |= args.edit_groups;

    let engine = DedupEngine::new(store.clone(), config)?;
    if let Some(group) = engine.edit_group() {
        tracing::info!(%group, "edit group");
    }
    let result = if args.ids.is_empty() {
        engine.run().await
    } else {
        engine.run_ids(parse_ids(&args.ids)?).await
    };

    if let Some(out) = &args.out {
        write_snapshot(&store, out)?;
    }
    let report = result.context("run stopped")?;
    print_report(&report, format)
}

async fn cmd_plan(args: PlanArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let store = load_store(&args.store.snapshot)?;
    let config = load_config(&args.store)?;
    let id: EntityId = args.id.parse()?;
    let engine = DedupEngine::new(store, config)?;
    let job = engine.plan(&id).await?;
    print_job(&job, format, true)
}

async fn cmd_merge(args: MergeArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let store = load_store(&args.store.snapshot)?;
    let config = load_config(&args.store)?;
    let first: EntityId = args.first.parse()?;
    let second: EntityId = args.second.parse()?;
    let ordering = MergeOrdering::parse(&args.strategy);

    let engine = DedupEngine::new(store.clone(), config)?;
    let job = engine.merge_pair(&first, &second, &ordering).await?;
    if let Some(out) = &args.out {
        write_snapshot(&store, out)?;
    }
    print_job(&job, format, false)
}

fn cmd_offset(args: OffsetArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let progress = ProgressTracker::new(args.offset, args.batch_size);
    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "offset": progress.current(),
                "resume_offset": progress.resume_offset(),
            })
        ),
        OutputFormat::Text => println!(
            "Current offset: {} (use {})",
            progress.current().to_string().bold(),
            progress.resume_offset().to_string().yellow().bold()
        ),
    }
    Ok(())
}

fn load_store(path: &Path) -> anyhow::Result<Arc<InMemoryKnowledgeStore>> {
    let snapshot = Snapshot::load(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    let store = InMemoryKnowledgeStore::from_snapshot(snapshot)
        .with_context(|| format!("invalid snapshot {}", path.display()))?;
    Ok(Arc::new(store))
}

fn load_config(args: &StoreArgs) -> anyhow::Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    config.safe_merge |= args.safe;
    Ok(config)
}

fn parse_ids(ids: &[String]) -> anyhow::Result<Vec<EntityId>> {
    ids.iter()
        .map(|s| s.trim().parse::<EntityId>().with_context(|| format!("bad entity id '{s}'")))
        .collect()
}

fn write_snapshot(store: &InMemoryKnowledgeStore, out: &Path) -> anyhow::Result<()> {
    store
        .snapshot()
        .save(out)
        .with_context(|| format!("failed to write snapshot {}", out.display()))?;
    println!("{} Wrote {}", "✓".green(), out.display().to_string().bold());
    Ok(())
}

fn print_report(report: &RunReport, format: &OutputFormat) -> anyhow::Result<()> {
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!("Processed {} candidate(s)", report.processed.to_string().bold());
    println!("  {} {}", "merged:      ".green(), report.merged);
    println!("  {} {}", "self-cleaned:".green(), report.self_cleaned);
    println!("  {} {}", "skipped:     ".dimmed(), report.skipped);
    println!("  {} {}", "ambiguous:   ".dimmed(), report.ambiguous);
    println!("  {} {}", "conflicts:   ".yellow(), report.conflicts);
    println!("  {} {}", "rolled back: ".red(), report.rolled_back);
    println!("  {} {}", "failed:      ".red(), report.failed);
    println!(
        "\nCurrent offset: {} (use {})\n",
        report.final_offset,
        report.resume_offset.to_string().yellow().bold()
    );
    Ok(())
}

fn print_job(job: &MergeJob, format: &OutputFormat, planning: bool) -> anyhow::Result<()> {
    if let OutputFormat::Json = format {
        let value = serde_json::json!({
            "source": job.source.id,
            "candidates": job.candidates,
            "target": job.target_id(),
            "source_claims": job.source_claims,
            "source_sitelinks": job.source_sitelinks,
            "target_claims": job.target_claims,
            "target_sitelinks": job.target_sitelinks,
            "edits": job.journal,
            "outcome": job.outcome,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Entity {}", job.source.id.to_string().yellow().bold());
    match job.target_id() {
        Some(target) => println!("  Target: {}", target.to_string().cyan()),
        None if job.candidates.is_empty() => println!("  Target: {}", "none".dimmed()),
        None => {
            let list: Vec<String> = job.candidates.iter().map(ToString::to_string).collect();
            println!("  Candidates: {}", list.join(", ").cyan());
        }
    }
    let steps = [
        ("source sitelinks to remove", job.source_sitelinks.len()),
        ("source claims to remove", job.source_claims.len()),
        ("target sitelinks to remove", job.target_sitelinks.len()),
        ("target claims to remove", job.target_claims.len()),
    ];
    for (label, count) in steps.iter().filter(|(_, n)| *n > 0) {
        println!("  {label}: {count}");
    }
    for edit in job.journal.edits() {
        println!("  {} {} on {}", "edited:".green(), edit.kind, edit.entity);
    }
    match &job.outcome {
        Some(outcome) => println!("{} {}", marker(outcome), outcome),
        None if planning && job.is_self_merge() => {
            println!(
                "{} would remove duplicate markers (entity is its own target)",
                "→".cyan().bold()
            )
        }
        None if planning => println!("{} would merge", "→".cyan().bold()),
        None => {}
    }
    Ok(())
}

fn marker(outcome: &JobOutcome) -> colored::ColoredString {
    if outcome.is_success() {
        "✓".green().bold()
    } else if outcome.is_failure() {
        "✗".red().bold()
    } else {
        "•".yellow().bold()
    }
}
