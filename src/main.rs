//! @ai:module:intent CLI entry point for the submission pipeline
//! @ai:module:layer presentation
//! @ai:module:public_api main

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use soltrack::{
    ingest, ArchiveScanner, BestTracker, CampaignFile, CampaignSet, IngestOptions, Publisher,
    ReportWriter, Scorer, SubmissionStore,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "soltrack")]
#[command(about = "Track, score and publish crowd-submitted districting solutions")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// Path to the campaign TOML file
    #[arg(long, default_value = "campaigns.toml")]
    config: PathBuf,

    /// Path to the submission database
    #[arg(long, default_value = ".status.sqlite3")]
    db: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest new archives, then write reports and publish best results
    Run {
        #[command(flatten)]
        common: CommonArgs,

        /// Directory to scan for solution archives
        #[arg(long, default_value = ".")]
        solutions: PathBuf,

        /// Keep going after per-archive failures
        #[arg(long, short)]
        keep_going: bool,

        /// Filename to write the HTML report to
        #[arg(long, default_value = "report.html")]
        report: PathBuf,

        /// Directory to write best-so-far displays to
        #[arg(long, default_value = "report")]
        outdir: PathBuf,

        /// Base URL used when generating cross-links
        #[arg(long)]
        root_url: Option<String>,

        /// Where to write the client config-override file
        #[arg(long)]
        config_override: Option<PathBuf>,
    },

    /// Ingest new archives into the database only
    Ingest {
        #[command(flatten)]
        common: CommonArgs,

        /// Directory to scan for solution archives
        #[arg(long, default_value = ".")]
        solutions: PathBuf,

        /// Keep going after per-archive failures
        #[arg(long, short)]
        keep_going: bool,
    },

    /// Write summary reports from the current database
    Report {
        #[command(flatten)]
        common: CommonArgs,

        /// Filename to write the HTML report to
        #[arg(long, default_value = "report.html")]
        report: PathBuf,

        /// Optional filename for a JSON copy of the report
        #[arg(long)]
        json: Option<PathBuf>,

        /// Where to write the client config-override file
        #[arg(long)]
        config_override: Option<PathBuf>,
    },

    /// Publish best-so-far artifact directories
    Publish {
        #[command(flatten)]
        common: CommonArgs,

        /// Directory the recorded archive paths are relative to
        #[arg(long, default_value = ".")]
        solutions: PathBuf,

        /// Directory to write best-so-far displays to
        #[arg(long, default_value = "report")]
        outdir: PathBuf,

        /// Base URL used when generating cross-links
        #[arg(long)]
        root_url: Option<String>,
    },

    /// List campaigns with submission counts and current best
    List {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Scan for archives without touching the database
    Scan {
        /// Directory to scan for solution archives
        #[arg(long, default_value = ".")]
        solutions: PathBuf,
    },

    /// Write a campaign file skeleton
    Init {
        /// Output path for the campaign file
        #[arg(short, long, default_value = "campaigns.toml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let directive = if cli.verbose {
        "soltrack=debug"
    } else {
        "soltrack=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(directive.parse()?),
        )
        .init();

    match cli.command {
        Commands::Run {
            common,
            solutions,
            keep_going,
            report,
            outdir,
            root_url,
            config_override,
        } => {
            let campaigns = CampaignSet::load(&common.config)?;
            let store = SubmissionStore::open(&common.db)?;

            run_ingest(&store, &campaigns, &solutions, keep_going)?;

            let best = BestTracker::new(&store).best_all()?;
            let writer = ReportWriter::new();
            writer.write_html(&best, &report)?;

            if let Some(path) = config_override {
                writer.write_config_override(&campaigns, &best, &path)?;
            }

            let root_url = root_url_or_default(root_url)?;
            Publisher::new(&campaigns, &solutions, &outdir, &root_url).publish_all(&best)?;
            Ok(())
        }

        Commands::Ingest {
            common,
            solutions,
            keep_going,
        } => {
            let campaigns = CampaignSet::load(&common.config)?;
            let store = SubmissionStore::open(&common.db)?;
            run_ingest(&store, &campaigns, &solutions, keep_going)
        }

        Commands::Report {
            common,
            report,
            json,
            config_override,
        } => {
            let campaigns = CampaignSet::load(&common.config)?;
            let store = SubmissionStore::open(&common.db)?;
            let best = BestTracker::new(&store).best_all()?;

            let writer = ReportWriter::new();
            writer.write_html(&best, &report)?;
            if let Some(path) = json {
                writer.write_json(&best, &path)?;
            }
            if let Some(path) = config_override {
                writer.write_config_override(&campaigns, &best, &path)?;
            }
            Ok(())
        }

        Commands::Publish {
            common,
            solutions,
            outdir,
            root_url,
        } => {
            let campaigns = CampaignSet::load(&common.config)?;
            let store = SubmissionStore::open(&common.db)?;
            let best = BestTracker::new(&store).best_all()?;

            let root_url = root_url_or_default(root_url)?;
            Publisher::new(&campaigns, &solutions, &outdir, &root_url).publish_all(&best)?;
            Ok(())
        }

        Commands::List { common } => {
            let campaigns = CampaignSet::load(&common.config)?;
            let store = SubmissionStore::open(&common.db)?;
            let tracker = BestTracker::new(&store);
            let counts = tracker.counts_by_config()?;

            println!(
                "{:<20} {:>10} {:>14} {:>8}",
                "campaign", "solutions", "best kmpp", "spread"
            );
            println!("{}", "-".repeat(56));

            for name in campaigns.names() {
                let count = counts.get(name).copied().unwrap_or(0);
                match tracker.best_for(name)? {
                    Some(best) => println!(
                        "{name:<20} {count:>10} {:>14} {:>8}",
                        best.kmpp, best.spread
                    ),
                    None => println!("{name:<20} {count:>10} {:>14} {:>8}", "-", "-"),
                }
            }
            Ok(())
        }

        Commands::Scan { solutions } => {
            let scanner = ArchiveScanner::new(&solutions)?;
            for found in scanner.scan() {
                println!("{}", found.key);
            }
            Ok(())
        }

        Commands::Init { output } => {
            CampaignFile::default().save(&output)?;
            println!("Campaign file skeleton saved to {}", output.display());
            Ok(())
        }
    }
}

fn run_ingest(
    store: &SubmissionStore,
    campaigns: &CampaignSet,
    solutions: &Path,
    keep_going: bool,
) -> Result<()> {
    if campaigns.is_empty() {
        tracing::warn!("no campaigns loaded; nothing can be scored");
    }

    let scorer = Scorer::new(campaigns);
    let summary = ingest(
        store,
        campaigns,
        &scorer,
        solutions,
        &IngestOptions { keep_going },
    )?;

    tracing::info!(
        "ingest done: {} recorded, {} already present, {} failed",
        summary.recorded,
        summary.already_present,
        summary.failed
    );
    Ok(())
}

fn root_url_or_default(root_url: Option<String>) -> Result<String> {
    match root_url {
        Some(url) => Ok(url),
        None => Ok(format!("file://{}", std::env::current_dir()?.display())),
    }
}
