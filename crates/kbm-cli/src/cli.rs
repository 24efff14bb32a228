use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "kbm",
    about = "kbm: merge duplicate entities in a knowledge base",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Merge every flagged duplicate found by the candidate query
    Run(RunArgs),
    /// Show what would happen to one entity, without writing
    Plan(PlanArgs),
    /// Merge two entities into one
    Merge(MergeArgs),
    /// Print the resume offset for a reported offset
    Offset(OffsetArgs),
}

/// Where the knowledge base and configuration come from.
#[derive(Args, Clone, Debug)]
pub struct StoreArgs {
    /// JSON snapshot of the knowledge base
    #[arg(short, long)]
    pub snapshot: PathBuf,
    /// TOML engine configuration
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Refuse merges whose key properties disagree
    #[arg(long)]
    pub safe: bool,
}

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub store: StoreArgs,
    /// Number of workers
    #[arg(short = 't', long)]
    pub threads: Option<usize>,
    /// Query offset to start from
    #[arg(long)]
    pub offset: Option<u64>,
    /// Process these entities instead of the query results
    #[arg(long, value_delimiter = ',')]
    pub ids: Vec<String>,
    /// Tag every edit with an edit group
    #[arg(long)]
    pub edit_groups: bool,
    /// Write the resulting snapshot here
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct PlanArgs {
    pub id: String,
    #[command(flatten)]
    pub store: StoreArgs,
}

#[derive(Args)]
pub struct MergeArgs {
    pub first: String,
    pub second: String,
    #[command(flatten)]
    pub store: StoreArgs,
    /// Comma separated survivor strategies: id, claims, revisions, sitelinks
    #[arg(long, default_value = "id")]
    pub strategy: String,
    /// Write the resulting snapshot here
    #[arg(short, long)]
    pub out: Option<PathBuf>,
}

#[derive(Args)]
pub struct OffsetArgs {
    pub offset: u64,
    #[arg(long, default_value = "50")]
    pub batch_size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run() {
        let cli = Cli::try_parse_from([
            "kbm", "run", "-s", "kb.json", "-t", "4", "--offset", "100",
        ])
        .unwrap();
        if let Command::Run(args) = cli.command {
            assert_eq!(args.store.snapshot, PathBuf::from("kb.json"));
            assert_eq!(args.threads, Some(4));
            assert_eq!(args.offset, Some(100));
            assert!(args.ids.is_empty());
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_run_with_ids() {
        let cli = Cli::try_parse_from([
            "kbm", "run", "-s", "kb.json", "--ids", "Q1,Q2", "--out", "out.json",
        ])
        .unwrap();
        if let Command::Run(args) = cli.command {
            assert_eq!(args.ids, vec!["Q1", "Q2"]);
            assert_eq!(args.out, Some(PathBuf::from("out.json")));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_plan_json() {
        let cli =
            Cli::try_parse_from(["kbm", "--format", "json", "plan", "Q42", "-s", "kb.json"])
                .unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
        if let Command::Plan(args) = cli.command {
            assert_eq!(args.id, "Q42");
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_merge() {
        let cli = Cli::try_parse_from([
            "kbm", "merge", "Q1", "Q2", "-s", "kb.json", "--strategy", "claims,id", "--safe",
        ])
        .unwrap();
        if let Command::Merge(args) = cli.command {
            assert_eq!((args.first.as_str(), args.second.as_str()), ("Q1", "Q2"));
            assert_eq!(args.strategy, "claims,id");
            assert!(args.store.safe);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_offset() {
        let cli = Cli::try_parse_from(["kbm", "-v", "offset", "123"]).unwrap();
        assert!(cli.verbose);
        if let Command::Offset(args) = cli.command {
            assert_eq!(args.offset, 123);
            assert_eq!(args.batch_size, 50);
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn snapshot_is_required() {
        assert!(Cli::try_parse_from(["kbm", "run"]).is_err());
    }
}
