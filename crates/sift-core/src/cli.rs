use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use chrono::NaiveDate;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        let key = k.trim();
        if key.is_empty() {
            return Err(anyhow!("empty key in: {s}"));
        }
        Ok(Self {
            key: key.to_string(),
            value: v.trim().to_string(),
        })
    }
}

/// A calendar month given as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthArg(pub NaiveDate);

impl std::str::FromStr for MonthArg {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let first = format!("{}-01", s.trim());
        NaiveDate::parse_from_str(&first, "%Y-%m-%d")
            .map(MonthArg)
            .map_err(|_| anyhow!("expected YYYY-MM, got: {s}"))
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "sift",
    version,
    about = "Sift: declarative filter panels and a date-picker engine",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(long = "settings", global = true)]
    pub settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print how a screen's fields are grouped into rows.
    Rows {
        /// Built-in screen name or path to a filter TOML file.
        source: String,
    },

    /// Print the six-week grid for a month.
    Calendar {
        #[arg(long = "month")]
        month: Option<MonthArg>,

        /// Selected date, in either accepted input format.
        #[arg(long = "selected")]
        selected: Option<String>,
    },

    /// Resolve typed date text.
    Parse { text: String },

    /// Resolve flyout placement for a trigger.
    Place {
        #[arg(long = "left", allow_hyphen_values = true)]
        left: f64,

        #[arg(long = "right", allow_hyphen_values = true)]
        right: f64,

        #[arg(long = "viewport")]
        viewport: f64,
    },

    /// Open a panel, edit it, apply it, and print what was emitted.
    Apply {
        source: String,

        #[arg(
            long = "applied",
            value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
            action = ArgAction::Append
        )]
        applied: Vec<KeyVal>,

        #[arg(
            long = "set",
            value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
            action = ArgAction::Append
        )]
        set: Vec<KeyVal>,

        #[arg(long = "json")]
        json: bool,
    },

    /// List the built-in screens.
    Screens,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Rows { .. } => "rows",
            Command::Calendar { .. } => "calendar",
            Command::Parse { .. } => "parse",
            Command::Place { .. } => "place",
            Command::Apply { .. } => "apply",
            Command::Screens => "screens",
        }
    }
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}
