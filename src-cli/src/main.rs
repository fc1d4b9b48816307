//! leadfill-cli: inspect a lead spreadsheet or submit it into the target
//! form through a WebDriver endpoint (or the simulated form with `--dry-run`).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{debug, info, warn};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

use leadfill::automation::SimulatedTarget;
use leadfill::config::{load_config, resolve_config_path, TimingsConfig};
use leadfill::{
    CanonicalField, Config, IngestReport, Ingestor, JobController, JobSnapshot, JobStatus, LogEvent,
    PhoneNormalizer, SessionFactory, WebDriverFactory,
};

#[derive(Parser, Debug)]
#[command(name = "leadfill-cli")]
#[command(about = "Spreadsheet lead ingestion and web-form submission")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $LEADFILL_CONFIG, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Emit diagnostics as JSON instead of plain text
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the column mapping, row counts and repeated phones of a file
    Inspect {
        file: PathBuf,

        /// Print the full ingestion report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Submit every valid record of a file into the target form
    Run {
        file: PathBuf,

        /// Use the built-in simulated form instead of a browser
        #[arg(long)]
        dry_run: bool,

        /// Print every job log event to stdout as a JSON line
        #[arg(long)]
        events: bool,
    },
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)));
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;
    tracing_log::LogTracer::init().context("Failed to bridge log records into tracing")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs)?;

    info!("Starting leadfill-cli v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Inspect { file, json } => inspect(cli.config.as_deref(), &file, json),
        Command::Run {
            file,
            dry_run,
            events,
        } => run(cli.config.as_deref(), &file, dry_run, events).await,
    }
}

/// Loads the config if one can be found; `None` when no file exists.
fn find_config(explicit: Option<&Path>) -> Result<Option<Config>> {
    match resolve_config_path(explicit) {
        Some(path) => {
            let config = load_config(&path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?;
            info!("Configuration loaded from {}", path.display());
            Ok(Some(config))
        }
        None => Ok(None),
    }
}

fn ingest(file: &Path, normalizer: PhoneNormalizer) -> Result<IngestReport> {
    let report = Ingestor::new(normalizer).ingest_path(file);
    if let Some(diagnostic) = &report.diagnostic {
        bail!("Could not read {}: {}", file.display(), diagnostic);
    }
    Ok(report)
}

fn inspect(config: Option<&Path>, file: &Path, json: bool) -> Result<()> {
    let normalizer = find_config(config)?
        .map(|c| c.phone)
        .unwrap_or_default();
    let report = ingest(file, normalizer)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Columns:");
    for field in CanonicalField::ALL {
        let column = match report.mapping.header_for(field) {
            Some(header) => format!("'{}'", header),
            None => "(not mapped)".to_string(),
        };
        println!("  {:<12} {}", field.as_str(), column);
    }
    println!(
        "Rows: {} read, {} empty, {} invalid, {} valid",
        report.rows_read,
        report.rows_empty,
        report.rows_invalid,
        report.batch.len()
    );
    if report.batch.duplicate_phones.is_empty() {
        println!("Repeated phones: none");
    } else {
        println!("Repeated phones:");
        for phone in &report.batch.duplicate_phones {
            println!("  {}", phone);
        }
    }
    Ok(())
}

async fn run(config: Option<&Path>, file: &Path, dry_run: bool, events: bool) -> Result<()> {
    let (config, factory): (Config, Arc<dyn SessionFactory>) = match find_config(config)? {
        Some(mut config) if dry_run => {
            config.timings = TimingsConfig::immediate();
            config.target.probe.clear();
            (config, Arc::new(SimulatedTarget::new()))
        }
        None if dry_run => {
            let mut config = Config::for_target("simulated://lead-form");
            config.timings = TimingsConfig::immediate();
            (config, Arc::new(SimulatedTarget::new()))
        }
        Some(config) => {
            let factory = WebDriverFactory::new(config.webdriver.clone());
            (config, Arc::new(factory))
        }
        None => bail!("No config file found; pass --config or set LEADFILL_CONFIG"),
    };

    let report = ingest(file, config.phone.clone())?;
    if report.batch.is_empty() {
        warn!("No valid records in {}", file.display());
        return Ok(());
    }

    let controller = JobController::new(&config, factory);

    let handler_controller = controller.clone();
    ctrlc::set_handler(move || {
        if handler_controller.cancel() {
            eprintln!("Cancelling after the current record...");
        }
    })
    .context("Failed to install Ctrl-C handler")?;

    let forwarder = events.then(|| {
        let (done, finished) = oneshot::channel();
        (done, forward_events(controller.subscribe(), finished))
    });

    let job_id = controller.start(report.batch)?;
    info!("Job {} started", job_id);
    let snapshot = controller.wait().await;

    if let Some((done, handle)) = forwarder {
        let _ = done.send(());
        match handle.await {
            Ok(printed) => debug!("Forwarded {} log events", printed),
            Err(e) => warn!("Event forwarder ended abnormally: {}", e),
        }
    }
    print_summary(&snapshot);

    if snapshot.status == JobStatus::Failed {
        let reason = snapshot
            .failure
            .map(|f| f.message)
            .unwrap_or_else(|| "unknown failure".to_string());
        bail!("Job failed: {}", reason);
    }
    Ok(())
}

/// Prints job log events as JSON lines until `finished` fires. Events still
/// buffered at that point are printed first. Resolves to the number printed.
fn forward_events(
    mut receiver: broadcast::Receiver<LogEvent>,
    mut finished: oneshot::Receiver<()>,
) -> JoinHandle<usize> {
    tokio::spawn(async move {
        let mut printed = 0;
        loop {
            tokio::select! {
                biased;
                event = receiver.recv() => match event {
                    Ok(event) => {
                        print_event(&event);
                        printed += 1;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("Event stream fell behind, {} events dropped", skipped);
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = &mut finished => break,
            }
        }
        while let Ok(event) = receiver.try_recv() {
            print_event(&event);
            printed += 1;
        }
        printed
    })
}

fn print_event(event: &LogEvent) {
    match serde_json::to_string(event) {
        Ok(line) => println!("{}", line),
        Err(e) => warn!("Failed to encode log event: {}", e),
    }
}

fn print_summary(snapshot: &JobSnapshot) {
    println!(
        "Job {}: {} succeeded, {} failed, {} of {} processed",
        snapshot.status,
        snapshot.success_count,
        snapshot.error_count,
        snapshot.current_index,
        snapshot.total
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadfill::job::state::{LogEntry, LogLevel};
    use leadfill::LogBroadcaster;

    fn event(message: &str) -> LogEvent {
        LogEvent::from_entry(Some("job-1"), &LogEntry::new(LogLevel::Info, message, None))
    }

    #[tokio::test]
    async fn test_forwarder_keeps_going_after_falling_behind() {
        let broadcaster = LogBroadcaster::new(2);
        let receiver = broadcaster.subscribe();
        for i in 0..5 {
            broadcaster.send(event(&format!("line {}", i)));
        }

        let (done, finished) = oneshot::channel();
        done.send(()).unwrap();
        let printed = forward_events(receiver, finished).await.unwrap();

        // Three lines were overwritten; the two still buffered are printed.
        assert_eq!(printed, 2);
    }

    #[tokio::test]
    async fn test_forwarder_stops_when_job_finishes() {
        let broadcaster = LogBroadcaster::new(16);
        let (done, finished) = oneshot::channel();
        let handle = forward_events(broadcaster.subscribe(), finished);

        broadcaster.send(event("Job 1 started"));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        done.send(()).unwrap();

        let printed = tokio::time::timeout(std::time::Duration::from_secs(2), handle)
            .await
            .expect("forwarder did not stop")
            .unwrap();
        assert_eq!(printed, 1);
    }
}
