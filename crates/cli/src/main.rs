// reconbot - daily settlement reconciliation (headless)

mod config;
mod exit_codes;
mod history;
mod notify;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use reconbot_recon::ReconError;
use tracing_subscriber::EnvFilter;

use exit_codes::{recon_exit_code, EXIT_SUCCESS, EXIT_USAGE};

/// Default location of the history log when neither flag nor env is set.
pub const DEFAULT_HISTORY_FILE: &str = "reconbot-history.json";

#[derive(Parser)]
#[command(name = "reconbot")]
#[command(about = "Reconcile a settlement file against a spreadsheet export")]
#[command(version)]
struct Cli {
    /// Only log warnings and errors (RUST_LOG overrides)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the newest pair of source files and record the run
    #[command(after_help = "\
Examples:
  reconbot run --inbox /srv/recon/inbox
  reconbot run --source-a IPAI_20240115.gz --source-b export.xlsx --manual
  reconbot run --inbox ./inbox --webhook https://hooks.example.com/recon --json
  reconbot run --inbox ./inbox --webhook https://a.example.com/h --webhook https://b.example.com/h")]
    Run {
        /// Drop directory holding the attachments (newest pair wins)
        #[arg(long, env = "RECON_INBOX", value_name = "DIR")]
        inbox: Option<PathBuf>,

        /// Settlement file (source A); overrides --inbox
        #[arg(long, value_name = "FILE", requires = "source_b")]
        source_a: Option<PathBuf>,

        /// Spreadsheet export (source B); overrides --inbox
        #[arg(long, value_name = "FILE", requires = "source_a")]
        source_b: Option<PathBuf>,

        /// TOML config (defaults apply when omitted)
        #[arg(long, env = "RECON_CONFIG", value_name = "FILE")]
        config: Option<PathBuf>,

        /// History log file
        #[arg(long, env = "RECON_HISTORY", value_name = "FILE", default_value = DEFAULT_HISTORY_FILE)]
        history: PathBuf,

        /// Mark the run as manually triggered
        #[arg(long)]
        manual: bool,

        /// POST the finished run to this URL (repeatable; the env var takes a
        /// comma-separated list)
        #[arg(long = "webhook", env = "RECON_WEBHOOK_URL", value_name = "URL", value_delimiter = ',')]
        webhooks: Vec<String>,

        /// Print the run as JSON on stdout
        #[arg(long)]
        json: bool,

        /// Leave consumed inbox files in place
        #[arg(long)]
        keep: bool,
    },

    /// List recorded runs, newest first
    #[command(after_help = "\
Examples:
  reconbot history
  reconbot history --limit 5
  reconbot history --json")]
    History {
        /// History log file
        #[arg(long, env = "RECON_HISTORY", value_name = "FILE", default_value = DEFAULT_HISTORY_FILE)]
        history: PathBuf,

        /// Show at most this many runs
        #[arg(long)]
        limit: Option<usize>,

        /// Print runs as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Check a config file without running
    Validate {
        /// Path to the TOML config
        config: PathBuf,
    },

    /// Print the effective configuration as TOML
    Config {
        /// TOML config to merge over the defaults
        #[arg(long, env = "RECON_CONFIG", value_name = "FILE")]
        config: Option<PathBuf>,
    },
}

fn init_logging(quiet: bool) {
    let default = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // A second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    let result = match cli.command {
        Commands::Run { inbox, source_a, source_b, config, history, manual, webhooks, json, keep } => {
            run::cmd_run(run::RunArgs {
                inbox,
                source_a,
                source_b,
                config,
                history,
                manual,
                webhooks,
                json,
                keep,
            })
        }
        Commands::History { history, limit, json } => history::cmd_history(history, limit, json),
        Commands::Validate { config } => config::cmd_validate(config),
        Commands::Config { config } => config::cmd_config(config),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let hint = match &err {
            ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => {
                Some("run `reconbot config` to see the defaults".to_string())
            }
            ReconError::SourceUnavailable { .. } => {
                Some("nothing was recorded; retry once both files have arrived".to_string())
            }
            ReconError::EmptySource { .. } => {
                Some("check the file layout against the configured columns".to_string())
            }
            ReconError::AmountOverflow(_) => {
                Some("check the amount columns and amount_scale in the config".to_string())
            }
            _ => None,
        };
        Self { code: recon_exit_code(&err), message: err.to_string(), hint }
    }
}
