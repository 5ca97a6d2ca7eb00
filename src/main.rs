use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dialoguer::Confirm;
use dupefind::delete::delete_marked;
use dupefind::{history, spawn_scan, ScanConfig, ScanEvent, ScanResult};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const BAR_STEPS: u64 = 1000;

#[derive(Parser, Debug)]
#[command(name = "dupefind", version, about = "Find and remove near-duplicate photos")]
struct Cli {
    /// Log debug details (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Duplicate workflows
    Duplicates {
        #[command(subcommand)]
        command: Dups,
    },

    /// Work with deletion history
    History {
        #[command(subcommand)]
        command: HistoryCmd,
    },
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Directory to scan
    #[arg(short, long, value_name = "DIR")]
    path: PathBuf,
    /// JSON config file (default: `<config dir>/dupefind/config.json`)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Hamming distance below which two hashes are duplicates
    #[arg(long)]
    threshold: Option<u32>,
    /// Hash grid size in bits per side
    #[arg(long)]
    hash_size: Option<u32>,
    /// Only match by file extension, ignoring names that merely contain ".jpg"
    #[arg(long)]
    strict_extensions: bool,
}

impl ScanArgs {
    fn to_config(&self) -> Result<ScanConfig> {
        let mut config = ScanConfig::load(self.config.as_deref())?;
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(hash_size) = self.hash_size {
            config.hash_size = hash_size;
        }
        if self.strict_extensions {
            config.legacy_jpg_match = false;
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand, Debug)]
enum Dups {
    /// Find and list duplicate groups
    Scan {
        #[command(flatten)]
        scan: ScanArgs,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Permanently delete every copy but the largest of each group
    Delete {
        #[command(flatten)]
        scan: ScanArgs,
        /// Only show what would be deleted
        #[arg(long)]
        dry_run: bool,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum HistoryCmd {
    /// List all deletion history records
    List {
        /// Directory containing the photos
        #[arg(short, long, value_name = "DIR")]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Duplicates { command } => match command {
            Dups::Scan { scan, json } => {
                let result = run_scan(&scan)?;
                if json {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                } else {
                    print_groups(&result);
                }
            }

            Dups::Delete { scan, dry_run, yes } => {
                let result = run_scan(&scan)?;
                print_groups(&result);
                if result.deletions_count == 0 {
                    return Ok(());
                }

                if !dry_run && !yes {
                    let confirmed = Confirm::new()
                        .with_prompt(format!(
                            "Are you sure you want to delete {} photos?",
                            result.deletions_count
                        ))
                        .default(false)
                        .interact()
                        .context("Failed to read confirmation")?;
                    if !confirmed {
                        println!("Aborted; no files were changed.");
                        return Ok(());
                    }
                }

                let report = delete_marked(&result, dry_run);
                for path in &report.deleted {
                    if dry_run {
                        println!("   🗑️  [dry-run] DELETE {}", path.display());
                    } else {
                        println!("   🗑️  Deleted {}", path.display());
                    }
                }

                if dry_run {
                    println!("\n⚠️  Dry-run only; no files were changed.");
                    return Ok(());
                }

                let records = history::records_for(&result, &report);
                history::append(&scan.path, &records).with_context(|| {
                    format!(
                        "Failed to write history file {:?}",
                        history::history_path(&scan.path)
                    )
                })?;
                println!(
                    "\n✅ Recorded deletion history in {}",
                    history::history_path(&scan.path).display()
                );

                if !report.is_clean() {
                    for failure in &report.failures {
                        eprintln!("⚠️  {}", failure);
                    }
                    anyhow::bail!(
                        "{} of {} file(s) could not be deleted",
                        report.failures.len(),
                        report.failures.len() + report.deleted.len()
                    );
                }
            }
        },

        Commands::History { command } => match command {
            HistoryCmd::List { path } => {
                let records = history::load(&path).with_context(|| {
                    format!(
                        "Could not open history file {:?}",
                        history::history_path(&path)
                    )
                })?;

                println!("🗂️  Deletion History:");
                for (i, record) in records.into_iter().enumerate() {
                    match record {
                        Ok(rec) => println!(
                            "[{}] {}\n     kept: {:?}\n     deleted: {:?}\n     failed: {:?}\n",
                            i, rec.timestamp, rec.retained, rec.deleted, rec.failed
                        ),
                        Err(err) => eprintln!("⚠️  Skipping malformed entry {}: {}", i, err),
                    }
                }
            }
        },
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Scan `args.path` on a worker thread, polling it to drive a progress bar.
fn run_scan(args: &ScanArgs) -> Result<ScanResult> {
    let config = args.to_config()?;
    println!("▶ Scanning for duplicates in: {}", args.path.display());

    let bar = ProgressBar::new(BAR_STEPS);
    bar.set_style(ProgressStyle::with_template(
        "{spinner:.green} [{bar:40.cyan/blue}] {percent:>3}% {msg}",
    )?);
    bar.set_message("Hashing…");

    let mut handle = spawn_scan(&args.path, config);
    loop {
        match handle.try_next()? {
            Some(ScanEvent::Progress(fraction)) => {
                if fraction >= 0.5 {
                    bar.set_message("Comparing…");
                }
                bar.set_position((fraction * BAR_STEPS as f64).round() as u64);
            }
            Some(ScanEvent::Done(result)) => {
                bar.finish_with_message("Scan complete");
                return Ok(result);
            }
            Some(ScanEvent::Failed(e)) => {
                bar.abandon_with_message("Scan failed");
                return Err(e).with_context(|| format!("Failed to scan {:?}", args.path));
            }
            None => thread::sleep(POLL_INTERVAL),
        }
    }
}

fn print_groups(result: &ScanResult) {
    for skipped in &result.skipped {
        eprintln!("⚠️  Skipped {}: {}", skipped.path.display(), skipped.reason);
    }

    if result.is_empty() {
        println!("No duplicates found.");
        return;
    }

    println!("Found {} duplicate group(s):", result.groups.len());
    for group in &result.groups {
        let short: String = group.key.chars().take(8).collect();
        println!("\n✨ Group {} ({})", short, group.len());
        for photo in &group.photos {
            let tag = if photo.is_marked() { "🗑️  DELETE" } else { "🏆 KEEP  " };
            println!(
                "   {} {:>10}  {}",
                tag,
                photo.size_text(),
                photo.path().display()
            );
        }
    }
    println!("\n{} photos to delete", result.deletions_count);
}
