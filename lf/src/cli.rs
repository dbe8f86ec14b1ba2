//! CLI command definitions and subcommands

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::debug;

use crate::domain::TaskStatus;

/// LeadFlow - lead-generation task orchestrator
#[derive(Parser)]
#[command(
    name = "lf",
    about = "Queue, schedule and run lead-generation scrapes",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// State document path (overrides storage.path)
    #[arg(long, global = true)]
    pub state: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Output format for listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Manage search presets
    Preset {
        #[command(subcommand)]
        command: PresetCommand,
    },

    /// Create and move tasks
    Task {
        #[command(subcommand)]
        command: TaskCommand,
    },

    /// Inspect collected leads
    Lead {
        #[command(subcommand)]
        command: LeadCommand,
    },

    /// Show or change automation settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },

    /// Run the scheduler
    Run {
        /// Drain due tasks and exit instead of running until Ctrl-C
        #[arg(long)]
        once: bool,
    },

    /// Summarize tasks and leads
    Status {
        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Preset subcommands
#[derive(Debug, Subcommand)]
pub enum PresetCommand {
    /// List all presets
    List {
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show one preset as JSON
    Show { id: String },

    /// Create a preset
    Create {
        name: String,

        #[arg(short, long, default_value = "")]
        description: String,

        /// Free-text keywords
        #[arg(short, long)]
        keywords: Option<String>,

        /// Job title filter (repeatable)
        #[arg(long = "title")]
        titles: Vec<String>,

        /// Location filter (repeatable)
        #[arg(long = "location")]
        locations: Vec<String>,

        /// Industry filter (repeatable)
        #[arg(long = "industry")]
        industries: Vec<String>,

        /// Max result pages per run
        #[arg(long)]
        page_limit: Option<u32>,
    },

    /// Delete a preset
    Delete { id: String },
}

/// Task subcommands
#[derive(Debug, Subcommand)]
pub enum TaskCommand {
    /// List tasks
    List {
        /// Filter by status (draft, pending, queued, running, completed, failed)
        #[arg(short, long)]
        status: Option<TaskStatus>,

        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show one task as JSON
    Show { id: String },

    /// Draft a sales navigator task from a preset
    Draft {
        preset_id: String,

        #[arg(short, long)]
        name: Option<String>,

        /// Lead list the results go to
        #[arg(long)]
        list: Option<String>,
    },

    /// Queue a sales navigator task for a preset
    Queue {
        preset_id: String,

        /// When to run (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Draft a task scraping followers of company pages
    Accounts {
        #[arg(required = true)]
        urls: Vec<String>,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(long)]
        list: Option<String>,
    },

    /// Draft a task scraping people who engaged with posts
    Posts {
        #[arg(required = true)]
        urls: Vec<String>,

        /// Include people who reacted
        #[arg(long)]
        reactions: bool,

        /// Include people who commented
        #[arg(long)]
        commenters: bool,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(long)]
        list: Option<String>,
    },

    /// Draft a task scraping a list of profiles
    Profiles {
        #[arg(required = true)]
        urls: Vec<String>,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(long)]
        list: Option<String>,
    },

    /// Schedule a task (-> pending)
    Schedule {
        id: String,

        /// When to run (RFC 3339); defaults to the task's schedule or now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Set task status directly
    Status { id: String, status: TaskStatus },

    /// Delete a task
    Delete { id: String },
}

/// Lead subcommands
#[derive(Debug, Subcommand)]
pub enum LeadCommand {
    /// List leads in insertion order
    List {
        #[arg(long, default_value = "0")]
        offset: usize,

        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,

        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Settings subcommands
#[derive(Debug, Subcommand)]
pub enum SettingsCommand {
    /// Show current settings (session cookie masked)
    Show,

    /// Change individual settings
    Set {
        #[arg(long)]
        headless: Option<bool>,

        #[arg(long)]
        executable_path: Option<String>,

        #[arg(long)]
        user_data_dir: Option<String>,

        #[arg(long)]
        session_cookie: Option<String>,

        #[arg(long)]
        min_delay_ms: Option<u64>,

        #[arg(long)]
        max_delay_ms: Option<u64>,

        #[arg(long)]
        randomize_delay: Option<bool>,
    },
}

/// Get the log file path
pub fn get_log_path() -> PathBuf {
    debug!("get_log_path: called");
    let path = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("leadflow")
        .join("logs")
        .join("leadflow.log");
    debug!(?path, "get_log_path: returning path");
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_task_status_command() {
        let cli = Cli::try_parse_from(["lf", "task", "status", "abc", "queued"]).unwrap();
        match cli.command {
            Command::Task {
                command: TaskCommand::Status { id, status },
            } => {
                assert_eq!(id, "abc");
                assert_eq!(status, TaskStatus::Queued);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_queue_with_time() {
        let cli = Cli::try_parse_from(["lf", "task", "queue", "p1", "--at", "2030-01-01T09:00:00Z"]).unwrap();
        match cli.command {
            Command::Task {
                command: TaskCommand::Queue { preset_id, at },
            } => {
                assert_eq!(preset_id, "p1");
                assert_eq!(at.unwrap().to_rfc3339(), "2030-01-01T09:00:00+00:00");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert!(Cli::try_parse_from(["lf", "task", "status", "abc", "paused"]).is_err());
    }

    #[test]
    fn test_global_state_flag() {
        let cli = Cli::try_parse_from(["lf", "status", "--state", "/tmp/s.json"]).unwrap();
        assert_eq!(cli.state, Some(PathBuf::from("/tmp/s.json")));
    }

    #[test]
    fn test_log_path() {
        assert!(get_log_path().ends_with("leadflow/logs/leadflow.log"));
    }
}
