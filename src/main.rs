use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};

use scout::{logging, Pipeline, Settings, Store};

#[derive(Parser)]
#[command(name = "scout", about = "Listing identifier ingestion and run metrics")]
struct Cli {
    /// Configuration file (default: config/config.yml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every configured source and store unseen identifiers
    Run {
        /// Print the metrics entry as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-render the found/added chart from stored history
    Report {
        /// Write the chart JSON here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Identifiers first seen between two dates (inclusive)
    List {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    /// Look up one identifier
    Show { id: String },
    /// Total stored identifiers
    Count,
    /// Metrics of every recorded run
    History,
    /// Record count and latest run
    Stats,
    /// Import `id,date` rows from a file
    Import { file: PathBuf },
    /// Tail the log file
    Logs {
        #[arg(short = 'n', long, default_value = "0")]
        entries: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("loading configuration")?;
    let _log_guard = logging::init(&settings.log_file);

    let t0 = Instant::now();

    let result = match cli.command {
        Commands::Run { json } => {
            let store = open_store(&settings)?;
            let pipeline = Pipeline::from_settings(&store, &settings)?;
            if settings.sources.is_empty() {
                println!("No sources configured; recording an empty run.");
            } else {
                println!(
                    "Fetching {} sources ({:.1}s between requests)...",
                    settings.sources.len(),
                    settings.request_delay.as_secs_f64()
                );
            }
            let entry = pipeline
                .trigger_ingestion_run()
                .await
                .context("ingestion run failed")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entry)?);
            } else {
                println!("Found {} identifiers, added {}.", entry.found, entry.added);
            }
            Ok(())
        }
        Commands::Report { out } => {
            let store = open_store(&settings)?;
            let pipeline = Pipeline::from_settings(&store, &settings)?;
            match pipeline.trigger_report_refresh()? {
                None => println!("No runs recorded yet; nothing to chart."),
                Some(chart) => {
                    let json = chart.to_json()?;
                    match out {
                        Some(path) => {
                            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                                std::fs::create_dir_all(dir)?;
                            }
                            std::fs::write(&path, json)
                                .with_context(|| format!("writing {}", path.display()))?;
                            println!("Wrote {} runs to {}", chart.x.len(), path.display());
                        }
                        None => println!("{}", json),
                    }
                }
            }
            Ok(())
        }
        Commands::List { from, to } => {
            let store = open_store(&settings)?;
            let pipeline = Pipeline::from_settings(&store, &settings)?;
            let start = from.and_hms_opt(0, 0, 0).context("invalid --from")?.and_utc();
            let end = to
                .and_hms_micro_opt(23, 59, 59, 999_999)
                .context("invalid --to")?
                .and_utc();
            let ids = pipeline.list_identifiers(&start, &end)?;
            for id in &ids {
                println!("{}", id);
            }
            println!("\n{} identifiers between {} and {}", ids.len(), from, to);
            Ok(())
        }
        Commands::Show { id } => {
            let store = open_store(&settings)?;
            match store.get_record(&id)? {
                Some(r) => println!("{}  first seen {}", r.id, r.first_seen.format("%Y-%m-%d %H:%M:%S")),
                None => println!("{} has not been seen.", id),
            }
            Ok(())
        }
        Commands::Count => {
            let store = open_store(&settings)?;
            let pipeline = Pipeline::from_settings(&store, &settings)?;
            println!("{}", pipeline.record_count()?);
            Ok(())
        }
        Commands::History => {
            let store = open_store(&settings)?;
            let entries = store.query_metrics()?;
            if entries.is_empty() {
                println!("No runs recorded.");
                return Ok(());
            }
            println!("{:<26} | {:>6} | {:>6}", "Run", "Found", "Added");
            println!("{}", "-".repeat(44));
            for e in &entries {
                println!(
                    "{:<26} | {:>6} | {:>6}",
                    e.run_time.format("%Y-%m-%d %H:%M:%S"),
                    e.found,
                    e.added
                );
            }
            println!("\n{} runs", entries.len());
            Ok(())
        }
        Commands::Stats => {
            let store = open_store(&settings)?;
            println!("Now:         {}", Utc::now().format("%a %d %b %Y, %I:%M%p"));
            println!("Identifiers: {}", store.count_records()?);
            match store.latest_metrics()? {
                Some(e) => println!(
                    "Last run:    {} (found {}, added {})",
                    e.run_time.format("%Y-%m-%d %H:%M:%S"),
                    e.found,
                    e.added
                ),
                None => println!("Last run:    never"),
            }
            println!("Sources:     {} ({})", settings.sources.len(), source_names(&settings));
            Ok(())
        }
        Commands::Import { file } => {
            let store = open_store(&settings)?;
            let f = std::fs::File::open(&file)
                .with_context(|| format!("opening {}", file.display()))?;
            let summary = scout::import::import_rows(&store, std::io::BufReader::new(f))?;
            println!(
                "Imported {} rows: {} added, {} already known.",
                summary.rows, summary.added, summary.duplicates
            );
            Ok(())
        }
        Commands::Logs { entries } => {
            for line in logging::tail_log(&settings.log_file, entries)? {
                println!("{}", line);
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_elapsed(elapsed));
    }

    result
}

fn open_store(settings: &Settings) -> anyhow::Result<Store> {
    Store::open(&settings.database)
        .with_context(|| format!("opening database {}", settings.database.display()))
}

fn source_names(settings: &Settings) -> String {
    if settings.sources.is_empty() {
        return "-".into();
    }
    settings
        .sources
        .iter()
        .map(|s| s.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_elapsed(d: std::time::Duration) -> String {
    match d.as_secs() {
        s if s < 60 => format!("{:.1}s", d.as_secs_f64()),
        s => format!("{}m {:02}s", s / 60, s % 60),
    }
}
