//! `aqmon`: air-quality snapshot pipeline CLI.
//!
//! Intended to be driven by an external scheduler:
//! - `aqmon collect` fetches the provider payload into the snapshot store
//! - `aqmon run` normalizes the latest snapshot, alerts and appends to the DB
//! - `aqmon report` prints the latest stored slice with grades
//! - `aqmon init-db` creates the readings table

use aqmon_service::alert::{LogNotifier, Notifier, SlackNotifier};
use aqmon_service::config::{self, Config, DEFAULT_CONFIG_PATH};
use aqmon_service::db::PgReadingStore;
use aqmon_service::ingest::airkorea;
use aqmon_service::ingest::DirSnapshotStore;
use aqmon_service::logging::{self, Component};
use aqmon_service::pipeline::{PipelineRunner, PipelineSettings};
use aqmon_service::report;
use clap::{Parser, Subcommand};
use std::process::ExitCode;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "aqmon", version, about = "Air-quality snapshot pipeline")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the current provider payload and store it as a new snapshot
    Collect,
    /// Process the most recent snapshot (normalize, alert, persist)
    Run,
    /// Print the most recent stored slice with grades
    Report,
    /// Create the readings table if it does not exist
    InitDb,
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();

    let config = match Config::load(&args.config) {
        Ok(config) => config.with_env(),
        Err(e) => {
            eprintln!("aqmon: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let level = config.logging.level.as_deref().unwrap_or("info");
    if let Err(e) = logging::init_logger(level, config.logging.file.as_deref()) {
        eprintln!("aqmon: cannot open log file: {}", e);
        return ExitCode::FAILURE;
    }

    let result = match args.command {
        Command::Collect => collect(&config),
        Command::Run => run(&config),
        Command::Report => print_report(&config),
        Command::InitDb => init_db(&config),
    };

    finish(result)
}

type CliResult = Result<ExitCode, Box<dyn std::error::Error>>;

/// Logs a subcommand error that nothing logged yet and picks the exit code.
fn finish(result: CliResult) -> ExitCode {
    match result {
        Ok(code) => code,
        Err(e) => {
            logging::error(Component::System, None, &e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn snapshot_store(config: &Config) -> DirSnapshotStore {
    DirSnapshotStore::new(&config.snapshot.dir, config.snapshot.prefix.clone())
}

fn reading_store(config: &Config) -> Result<PgReadingStore, Box<dyn std::error::Error>> {
    let url = config.database.url.as_deref().ok_or("DATABASE_URL is not set")?;
    Ok(PgReadingStore::new(url, config.database.table.clone(), config.database.idempotent)?)
}

fn notifier(config: &Config) -> Result<Box<dyn Notifier>, Box<dyn std::error::Error>> {
    match &config.notifier.webhook_url {
        Some(url) => {
            let timeout = Duration::from_secs(config.notifier.timeout_secs);
            Ok(Box::new(SlackNotifier::new(url.clone(), timeout)?))
        }
        None => {
            logging::warn(
                Component::Notify,
                None,
                "SLACK_WEBHOOK_URL not set; alerts will only be logged",
            );
            Ok(Box::new(LogNotifier))
        }
    }
}

fn collect(config: &Config) -> CliResult {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(config.collector.timeout_secs))
        .build()?;
    let api_key = config::api_key_from_env();
    airkorea::collect(
        &client,
        &config.collector,
        api_key.as_deref(),
        &snapshot_store(config),
        chrono::Utc::now(),
    )?;
    Ok(ExitCode::SUCCESS)
}

fn run(config: &Config) -> CliResult {
    let settings = PipelineSettings {
        district_suffix: config.normalize.district_suffix,
        alert_policy: config.alert.clone(),
    };
    let mut runner = PipelineRunner::new(
        snapshot_store(config),
        notifier(config)?,
        reading_store(config)?,
        settings,
    );
    match runner.run() {
        Ok(_) => Ok(ExitCode::SUCCESS),
        // The runner has already logged the failure with its stage.
        Err(_) => Ok(ExitCode::FAILURE),
    }
}

fn print_report(config: &Config) -> CliResult {
    let policy = config.grade_policy()?;
    let mut store = reading_store(config)?;
    match report::latest_slice(&mut store)? {
        Some((data_time, rows)) => {
            let graded = report::grade_rows(rows, &policy);
            print!("{}", report::render_table(&data_time, &graded));
        }
        None => println!("DB에 데이터가 없습니다."),
    }
    Ok(ExitCode::SUCCESS)
}

fn init_db(config: &Config) -> CliResult {
    reading_store(config)?.ensure_schema()?;
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_subscriber::layer::{Context, SubscriberExt};

    struct ErrorCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for ErrorCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::ERROR {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[test]
    fn test_failed_run_is_logged_once() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.snapshot.dir = dir.path().to_path_buf();
        // Never connected to: the run stops at loading the empty snapshot store.
        config.database.url = Some("postgresql://localhost/unused".to_string());

        let errors = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(ErrorCounter(errors.clone()));
        tracing::subscriber::with_default(subscriber, || {
            finish(run(&config));
        });

        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_setup_error_is_logged_by_finish() {
        let config = Config::default();
        let errors = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(ErrorCounter(errors.clone()));
        tracing::subscriber::with_default(subscriber, || {
            // No DATABASE_URL: fails before the runner exists.
            finish(init_db(&config));
        });

        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }
}
