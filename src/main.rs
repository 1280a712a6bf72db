//! Seedbed - spaced repetition with prerequisite unlocking
//!
//! CLI entry point with global panic handler.

use std::io::Write;
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};

use seedbed::cli::answer::{AnswerCommand, AnswerOptions};
use seedbed::cli::queue::{Queue, QueueCommand, QueueOptions};
use seedbed::cli::stats::{StatsCommand, StatsOptions};
use seedbed::cli::unlock::{UnlockCommand, UnlockOptions};
use seedbed::config::{seedbed_home, xp_log_path, Config};
use seedbed::core::{Difficulty, ItemKind, Outcome};
use seedbed::error::exit_codes;
use seedbed::review::ReviewSession;
use seedbed::stats::XpLedger;
use seedbed::storage::FileItemStore;

type CliResult = Result<ExitCode, Box<dyn std::error::Error>>;

// =============================================================================
// CLI Definition
// =============================================================================

/// Seedbed - spaced repetition with prerequisite unlocking
#[derive(Parser)]
#[command(name = "seedbed")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, short, global = true)]
    json: bool,

    /// Suppress output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Clock override (RFC 3339), defaults to the current time
    #[arg(long, global = true)]
    now: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// List items due for review
    Due {
        #[arg(long, value_enum, default_value = "word")]
        kind: KindArg,
        /// Maximum number of items
        #[arg(long, short)]
        limit: Option<usize>,
        /// Active level (derived from progress if omitted)
        #[arg(long)]
        level: Option<u32>,
    },

    /// List locked or new items whose prerequisites are met
    Learn {
        #[arg(long, value_enum, default_value = "word")]
        kind: KindArg,
        /// Maximum number of items
        #[arg(long, short)]
        limit: Option<usize>,
        /// Active level (derived from progress if omitted)
        #[arg(long)]
        level: Option<u32>,
    },

    /// List unlocked items waiting for their first lesson
    Lessons {
        #[arg(long, value_enum, default_value = "radical")]
        kind: KindArg,
        /// Maximum number of items
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Unlock one item, or every item whose gates are open
    Unlock {
        #[arg(long, value_enum)]
        kind: KindArg,
        /// Item to unlock (all available if omitted)
        id: Option<String>,
        /// Active level (derived from progress if omitted)
        #[arg(long)]
        level: Option<u32>,
    },

    /// Record an answer for one item
    Answer {
        #[arg(long, value_enum)]
        kind: KindArg,
        /// Item id
        id: String,
        /// Difficulty rating or correctness
        #[arg(value_enum)]
        outcome: OutcomeArg,
        /// User credited with XP
        #[arg(long, default_value = "local")]
        user: String,
        /// Collection credited with XP
        #[arg(long, default_value = "default")]
        collection: String,
    },

    /// Show progress summaries, forecast, and XP
    Stats {
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
        /// Forecast window in days
        #[arg(long, default_value = "7")]
        forecast_days: u32,
        /// User whose XP to show
        #[arg(long, default_value = "local")]
        user: String,
        /// Collection whose XP to show
        #[arg(long, default_value = "default")]
        collection: String,
    },

    /// Show the effective configuration
    Config {
        /// Write the effective configuration to .seedbed/config.toml
        #[arg(long)]
        save: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Word,
    Cloze,
    Radical,
    Kanji,
    Vocabulary,
}

impl From<KindArg> for ItemKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Word => ItemKind::Word,
            KindArg::Cloze => ItemKind::ClozeSentence,
            KindArg::Radical => ItemKind::Radical,
            KindArg::Kanji => ItemKind::Kanji,
            KindArg::Vocabulary => ItemKind::Vocabulary,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutcomeArg {
    Easy,
    Medium,
    Hard,
    Impossible,
    Correct,
    Incorrect,
}

impl From<OutcomeArg> for Outcome {
    fn from(outcome: OutcomeArg) -> Self {
        match outcome {
            OutcomeArg::Easy => Difficulty::Easy.into(),
            OutcomeArg::Medium => Difficulty::Medium.into(),
            OutcomeArg::Hard => Difficulty::Hard.into(),
            OutcomeArg::Impossible => Difficulty::Impossible.into(),
            OutcomeArg::Correct => Outcome::Correct,
            OutcomeArg::Incorrect => Outcome::Incorrect,
        }
    }
}

// =============================================================================
// Main Entry Point
// =============================================================================

fn main() -> ExitCode {
    setup_panic_handler();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("seedbed error: {}", e);
            ExitCode::from(exit_codes::ERROR as u8)
        }
    }
}

/// Set up the global panic handler.
///
/// On panic, logs to ~/.seedbed/crash.log and exits with code 3.
fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|info| {
        eprintln!("seedbed panic: {}", info);

        if let Some(home) = seedbed_home() {
            let crash_log = home.join("crash.log");
            if let Ok(mut file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&crash_log)
            {
                let timestamp = Utc::now().format("%Y-%m-%d %H:%M:%S UTC");
                let _ = writeln!(file, "[{}] {}", timestamp, info);
            }
        }

        std::process::exit(exit_codes::CRASH);
    }));
}

/// Run the CLI and return the exit code.
fn run() -> CliResult {
    let cli = Cli::parse();
    let now = parse_now(cli.now.as_deref())?;
    let (json, quiet) = (cli.json, cli.quiet);

    match cli.command {
        Commands::Due { kind, limit, level } => {
            run_queue(Queue::Due, kind.into(), limit, level, json, quiet, now)
        }
        Commands::Learn { kind, limit, level } => {
            run_queue(Queue::Learn, kind.into(), limit, level, json, quiet, now)
        }
        Commands::Lessons { kind, limit } => {
            run_queue(Queue::Lessons, kind.into(), limit, None, json, quiet, now)
        }
        Commands::Unlock { kind, id, level } => {
            run_unlock(kind.into(), id.as_deref(), level, json, quiet, now)
        }
        Commands::Answer {
            kind,
            id,
            outcome,
            user,
            collection,
        } => run_answer(kind.into(), &id, outcome.into(), &user, &collection, json, quiet, now),
        Commands::Stats {
            kind,
            forecast_days,
            user,
            collection,
        } => run_stats(kind.map(Into::into), forecast_days, &user, &collection, json, quiet, now),
        Commands::Config { save } => run_config(save, quiet),
    }
}

/// The clock is read once, here; everything below takes `now`.
fn parse_now(raw: Option<&str>) -> Result<DateTime<Utc>, Box<dyn std::error::Error>> {
    match raw {
        Some(raw) => Ok(DateTime::parse_from_rfc3339(raw)
            .map_err(|e| format!("invalid --now '{}': {}", raw, e))?
            .with_timezone(&Utc)),
        None => Ok(Utc::now()),
    }
}

/// Convert a success boolean to an exit code.
fn success_to_exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::from(exit_codes::SUCCESS as u8)
    } else {
        ExitCode::from(exit_codes::ERROR as u8)
    }
}

fn print_formatted(formatted: &str) {
    if !formatted.is_empty() {
        println!("{}", formatted);
    }
}

fn open_session(
    config: &Config,
    level: Option<u32>,
    user: &str,
    collection: &str,
) -> Result<ReviewSession<FileItemStore, XpLedger>, Box<dyn std::error::Error>> {
    let store = FileItemStore::new()?;
    let ledger_path = xp_log_path().ok_or("could not determine XP log path (no home directory)")?;
    Ok(ReviewSession::new(store, XpLedger::new(ledger_path), config)?
        .with_identity(user, collection)
        .with_level(level))
}

// =============================================================================
// Command Implementations
// =============================================================================

fn run_queue(
    queue: Queue,
    kind: ItemKind,
    limit: Option<usize>,
    level: Option<u32>,
    json: bool,
    quiet: bool,
    now: DateTime<Utc>,
) -> CliResult {
    let config = Config::load();
    let store = FileItemStore::new()?;

    let cmd = QueueCommand::new(store, config);
    let options = QueueOptions {
        json,
        quiet,
        kind,
        now,
        level,
        limit,
    };

    let output = cmd.run(queue, &options);
    print_formatted(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_unlock(
    kind: ItemKind,
    id: Option<&str>,
    level: Option<u32>,
    json: bool,
    quiet: bool,
    now: DateTime<Utc>,
) -> CliResult {
    let config = Config::load();
    let session = open_session(&config, level, "local", "default")?;

    let cmd = UnlockCommand::new(session);
    let options = UnlockOptions { json, quiet, now };

    let output = cmd.run(kind, id, &options);
    print_formatted(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

#[allow(clippy::too_many_arguments)]
fn run_answer(
    kind: ItemKind,
    id: &str,
    outcome: Outcome,
    user: &str,
    collection: &str,
    json: bool,
    quiet: bool,
    now: DateTime<Utc>,
) -> CliResult {
    let config = Config::load();
    let session = open_session(&config, None, user, collection)?;

    let cmd = AnswerCommand::new(session);
    let options = AnswerOptions { json, quiet, now };

    let output = cmd.run(kind, id, outcome, &options);
    print_formatted(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_stats(
    kind: Option<ItemKind>,
    forecast_days: u32,
    user: &str,
    collection: &str,
    json: bool,
    quiet: bool,
    now: DateTime<Utc>,
) -> CliResult {
    let config = Config::load();
    let session = open_session(&config, None, user, collection)?;

    let cmd = StatsCommand::new(session);
    let options = StatsOptions {
        json,
        quiet,
        now,
        kind,
        forecast_days,
    };

    let output = cmd.run(&options);
    print_formatted(&cmd.format_output(&output, &options));

    Ok(success_to_exit_code(output.success))
}

fn run_config(save: bool, quiet: bool) -> CliResult {
    let cwd = std::env::current_dir()?;
    let config = Config::load_from_cwd(&cwd);
    config.validate()?;

    if save {
        config.save_project(&cwd)?;
    }

    if !quiet {
        print!("{}", toml::to_string_pretty(&config)?);
    }

    Ok(ExitCode::from(exit_codes::SUCCESS as u8))
}
