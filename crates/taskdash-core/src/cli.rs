use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::task::Priority;
use crate::view::StatusFilter;

#[derive(Debug, Clone)]
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
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskdash",
    version,
    about = "Terminal dashboard for a task-management REST backend"
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    /// Override a configuration key, e.g. `--rc api.timeout=5`.
    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append,
        global = true
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "rcfile", global = true)]
    pub rcfile: Option<PathBuf>,

    /// Backend base URL (same as `--rc api.base=URL`).
    #[arg(long = "api", global = true)]
    pub api: Option<String>,

    /// Session file (same as `--rc session.location=PATH`).
    #[arg(long = "session", global = true)]
    pub session: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Check that the backend is reachable.
    Health,
    /// Create an account.
    Register(CredentialArgs),
    /// Log in and store the session token.
    Login(CredentialArgs),
    /// Forget the stored session.
    Logout,
    /// Renew the stored session token.
    Refresh,
    /// Show the logged-in user.
    Whoami,
    /// List tasks.
    List(ListArgs),
    /// Show one task.
    Show { id: String },
    /// Create a task.
    Add(AddArgs),
    /// Edit a task; unspecified fields keep their current values.
    Edit(EditArgs),
    /// Flip a task between active and completed.
    Toggle { id: String },
    /// Delete a task.
    Delete {
        id: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Task totals over the whole collection.
    Stats,
    /// Seven-day due histogram and priority distribution.
    Charts,
    /// Print the effective configuration.
    Config,
    /// Interactive session over a single task view.
    Shell,
}

#[derive(Args, Debug, Clone)]
pub struct CredentialArgs {
    pub login: String,

    /// Read from the first line of stdin when omitted.
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    #[arg(long, value_enum, default_value_t = StatusFilter::All)]
    pub filter: StatusFilter,

    #[arg(long)]
    pub search: Option<String>,

    #[arg(long, default_value_t = 1)]
    pub page: usize,

    /// Print the derived view as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    pub title: String,

    #[arg(long, short = 'd')]
    pub description: Option<String>,

    #[arg(long, short = 'p', value_enum, default_value_t = Priority::Medium)]
    pub priority: Priority,

    /// Due date as YYYY-MM-DD.
    #[arg(long)]
    pub due: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EditArgs {
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long, short = 'd')]
    pub description: Option<String>,

    #[arg(long, short = 'p', value_enum)]
    pub priority: Option<Priority>,

    #[arg(long, conflicts_with = "no_due")]
    pub due: Option<String>,

    /// Remove the due date.
    #[arg(long)]
    pub no_due: bool,
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
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

impl GlobalCli {
    /// Flag-level overrides in the order they should be applied.
    pub fn config_overrides(&self) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = self
            .rc_overrides
            .iter()
            .map(|kv| (kv.key.clone(), kv.value.clone()))
            .collect();
        if let Some(api) = &self.api {
            out.push(("api.base".to_string(), api.clone()));
        }
        if let Some(session) = &self.session {
            out.push((
                "session.location".to_string(),
                session.to_string_lossy().to_string(),
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Command, GlobalCli};
    use crate::task::Priority;
    use crate::view::StatusFilter;

    #[test]
    fn list_flags_parse() {
        let cli = GlobalCli::try_parse_from([
            "taskdash", "-vv", "list", "--filter", "completed", "--search", "report", "--page", "2",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::List(args) => {
                assert_eq!(args.filter, StatusFilter::Completed);
                assert_eq!(args.search.as_deref(), Some("report"));
                assert_eq!(args.page, 2);
                assert!(!args.json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn overrides_follow_flag_order() {
        let cli = GlobalCli::try_parse_from([
            "taskdash",
            "--rc",
            "rc.api.timeout=5",
            "--api",
            "http://tasks.example/api",
            "add",
            "Write report",
            "-p",
            "high",
        ])
        .unwrap();

        let overrides = cli.config_overrides();
        assert_eq!(overrides[0], ("rc.api.timeout".to_string(), "5".to_string()));
        assert_eq!(
            overrides[1],
            ("api.base".to_string(), "http://tasks.example/api".to_string())
        );
        match cli.command {
            Command::Add(args) => assert_eq!(args.priority, Priority::High),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn edit_rejects_due_and_no_due_together() {
        let result = GlobalCli::try_parse_from([
            "taskdash", "edit", "t-1", "--due", "2026-10-20", "--no-due",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_filter_is_rejected() {
        assert!(GlobalCli::try_parse_from(["taskdash", "list", "--filter", "pending"]).is_err());
    }
}
