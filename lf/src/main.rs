//! lf - LeadFlow command line

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info};

use leadflow::automation::CommandAutomationClient;
use leadflow::cli::{
    Cli, Command, LeadCommand, OutputFormat, PresetCommand, SettingsCommand, TaskCommand, get_log_path,
};
use leadflow::config::Config;
use leadflow::domain::{
    AccountFollowersPayload, LeadRecord, NewPreset, PostEngagementPayload, ProfileScrapePayload,
    SalesNavigatorPayload, SearchPreset, SearchTask, TaskPatch, TaskStatus,
};
use leadflow::scheduler::{RunLock, Scheduler};
use leadflow::state::{LeadStore, StateRepository, TaskLifecycleManager, open_store};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    // Logging isn't initialized yet, so nothing here can be traced
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(state) = cli.state {
        config.storage.path = state;
    }
    info!(path = %config.storage.path.display(), "LeadFlow using state document");

    let store = open_store(&config.storage.path)
        .with_context(|| format!("Failed to open state at {}", config.storage.path.display()))?;

    debug!(command = ?cli.command, "main: dispatching command");
    let result = match cli.command {
        Command::Preset { command } => cmd_preset(&store, command).await,
        Command::Task { command } => cmd_task(&store, command).await,
        Command::Lead { command } => cmd_lead(&store, command).await,
        Command::Settings { command } => cmd_settings(&store, command).await,
        Command::Run { once } => cmd_run(&config, &store, once).await,
        Command::Status { format } => cmd_status(&store, format).await,
    };

    // Stop the store actor even when the command failed
    store.shutdown().await.context("Failed to close state")?;
    result
}

// === Presets ===

async fn cmd_preset(store: &LeadStore, command: PresetCommand) -> Result<()> {
    debug!(?command, "cmd_preset: called");
    let repo = StateRepository::new(store.clone());

    match command {
        PresetCommand::List { format } => {
            let presets = repo.list_presets().await?;
            if format == OutputFormat::Json {
                return print_json(&presets);
            }
            if presets.is_empty() {
                println!("No presets");
            }
            for preset in &presets {
                print_preset_line(preset);
            }
        }
        PresetCommand::Show { id } => {
            let preset = repo
                .find_preset(&id)
                .await?
                .ok_or_else(|| eyre::eyre!("Preset not found: {}", id))?;
            print_json(&preset)?;
        }
        PresetCommand::Create {
            name,
            description,
            keywords,
            titles,
            locations,
            industries,
            page_limit,
        } => {
            let mut input = NewPreset::new(name);
            input.description = description;
            input.filters.keywords = keywords;
            input.filters.titles = titles;
            input.filters.locations = locations;
            input.filters.industries = industries;
            input.page_limit = page_limit;

            let preset = repo.create_preset(input).await?;
            println!("{} Created preset: {}", "✓".green(), preset.id.cyan());
        }
        PresetCommand::Delete { id } => {
            repo.delete_preset(&id).await?;
            println!("{} Deleted preset: {}", "✓".green(), id);
        }
    }
    Ok(())
}

fn print_preset_line(preset: &SearchPreset) {
    let last_run = match (preset.last_run_at, preset.last_result_count) {
        (Some(at), Some(count)) => format!("last run {} ({} leads)", at.format("%Y-%m-%d %H:%M"), count),
        _ => "never run".to_string(),
    };
    println!("{}  {}  {}", preset.id.yellow(), preset.name.bold(), last_run.dimmed());
}

// === Tasks ===

async fn cmd_task(store: &LeadStore, command: TaskCommand) -> Result<()> {
    debug!(?command, "cmd_task: called");
    let tasks = TaskLifecycleManager::new(store.clone());
    let repo = StateRepository::new(store.clone());

    match command {
        TaskCommand::List { status, format } => {
            let list = match status {
                Some(status) => tasks.list_by_status(status).await?,
                None => tasks.list().await?,
            };
            if format == OutputFormat::Json {
                return print_json(&list);
            }
            if list.is_empty() {
                println!("No tasks");
            }
            for task in &list {
                print_task_line(task);
            }
        }
        TaskCommand::Show { id } => {
            let task = tasks.get_required(&id).await?;
            print_json(&task)?;
        }
        TaskCommand::Draft { preset_id, name, list } => {
            let settings = repo.get_settings().await?;
            let payload = SalesNavigatorPayload {
                target_lead_list_name: list,
            };
            let task = tasks.create_draft(&preset_id, &settings, name, Some(payload)).await?;
            print_created(&task);
        }
        TaskCommand::Queue { preset_id, at } => {
            let settings = repo.get_settings().await?;
            let task = tasks.queue(&preset_id, &settings, at).await?;
            print_created(&task);
        }
        TaskCommand::Accounts { urls, name, list } => {
            let settings = repo.get_settings().await?;
            let payload = AccountFollowersPayload {
                account_urls: urls,
                target_lead_list_name: list,
            };
            let task = tasks.create_accounts_task(payload, &settings, name).await?;
            print_created(&task);
        }
        TaskCommand::Posts {
            urls,
            reactions,
            commenters,
            name,
            list,
        } => {
            let settings = repo.get_settings().await?;
            let payload = PostEngagementPayload {
                post_urls: urls,
                scrape_reactions: reactions,
                scrape_commenters: commenters,
                target_lead_list_name: list,
            };
            let task = tasks.create_post_task(payload, &settings, name).await?;
            print_created(&task);
        }
        TaskCommand::Profiles { urls, name, list } => {
            let settings = repo.get_settings().await?;
            let payload = ProfileScrapePayload {
                profile_urls: urls,
                target_lead_list_name: list,
            };
            let task = tasks.create_profile_task(payload, &settings, name).await?;
            print_created(&task);
        }
        TaskCommand::Schedule { id, at } => {
            let task = tasks.schedule(&id, at).await?;
            println!("{} Scheduled {} for {}", "✓".green(), task.id.cyan(), format_schedule(&task));
        }
        TaskCommand::Status { id, status } => {
            let task = tasks.update_status(&id, status, TaskPatch::new()).await?;
            println!("{} {} -> {}", "✓".green(), task.id.cyan(), colored_status(task.status));
        }
        TaskCommand::Delete { id } => {
            if tasks.delete(&id).await? {
                println!("{} Deleted task: {}", "✓".green(), id);
            } else {
                println!("No task {}", id);
            }
        }
    }
    Ok(())
}

fn print_created(task: &SearchTask) {
    println!(
        "{} Created {} task: {} ({})",
        "✓".green(),
        task.task_type(),
        task.id.cyan(),
        colored_status(task.status)
    );
}

fn print_task_line(task: &SearchTask) {
    let detail = match task.status {
        TaskStatus::Pending | TaskStatus::Queued => format!("at {}", format_schedule(task)),
        TaskStatus::Completed => format!("{} leads", task.result_lead_ids.len()),
        TaskStatus::Failed => task.error_message.clone().unwrap_or_default(),
        _ => String::new(),
    };
    println!(
        "{}  {:<10} {:<17} {}  {}",
        task.id.yellow(),
        colored_status(task.status),
        task.task_type().to_string(),
        task.display_name().bold(),
        detail.dimmed()
    );
}

fn format_schedule(task: &SearchTask) -> String {
    task.scheduled_for
        .map(|at| at.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn colored_status(status: TaskStatus) -> ColoredString {
    match status {
        TaskStatus::Draft => status.as_str().dimmed(),
        TaskStatus::Pending | TaskStatus::Queued => status.as_str().yellow(),
        TaskStatus::Running => status.as_str().cyan(),
        TaskStatus::Completed => status.as_str().green(),
        TaskStatus::Failed => status.as_str().red(),
    }
}

// === Leads ===

async fn cmd_lead(store: &LeadStore, command: LeadCommand) -> Result<()> {
    debug!(?command, "cmd_lead: called");
    let repo = StateRepository::new(store.clone());

    match command {
        LeadCommand::List { offset, limit, format } => {
            let leads = repo.list_leads_page(offset, limit).await?;
            if format == OutputFormat::Json {
                return print_json(&leads);
            }
            let total = repo.count_leads().await?;
            for lead in &leads {
                print_lead_line(lead);
            }
            println!("{}", format!("{} of {} leads", leads.len(), total).dimmed());
        }
    }
    Ok(())
}

fn print_lead_line(lead: &LeadRecord) {
    let context = [lead.headline.as_deref(), lead.company.as_deref(), lead.list_name.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" · ");
    println!("{}  {}  {}", lead.full_name.bold(), lead.profile_url.cyan(), context.dimmed());
}

// === Settings ===

async fn cmd_settings(store: &LeadStore, command: SettingsCommand) -> Result<()> {
    debug!(?command, "cmd_settings: called");
    let repo = StateRepository::new(store.clone());

    match command {
        SettingsCommand::Show => {
            let settings = repo.get_settings().await?;
            print_json(&settings.redacted())?;
        }
        SettingsCommand::Set {
            headless,
            executable_path,
            user_data_dir,
            session_cookie,
            min_delay_ms,
            max_delay_ms,
            randomize_delay,
        } => {
            repo.update_settings(move |settings| {
                if let Some(v) = headless {
                    settings.headless = v;
                }
                if let Some(v) = executable_path {
                    settings.executable_path = v;
                }
                if let Some(v) = user_data_dir {
                    settings.user_data_dir = Some(v).filter(|s| !s.is_empty());
                }
                if let Some(v) = session_cookie {
                    settings.session_cookie = Some(v).filter(|s| !s.is_empty());
                }
                if let Some(v) = min_delay_ms {
                    settings.min_delay_ms = v;
                }
                if let Some(v) = max_delay_ms {
                    settings.max_delay_ms = v;
                }
                if let Some(v) = randomize_delay {
                    settings.randomize_delay = v;
                }
            })
            .await?;
            println!("{} Settings saved (existing tasks keep their snapshot)", "✓".green());
        }
    }
    Ok(())
}

// === Scheduler ===

async fn cmd_run(config: &Config, store: &LeadStore, once: bool) -> Result<()> {
    debug!(once, "cmd_run: called");
    let program = config
        .automation
        .command
        .clone()
        .ok_or_else(|| eyre::eyre!("automation.command is not configured"))?;
    let client = Arc::new(CommandAutomationClient::new(
        program,
        config.automation.args.clone(),
        config.automation.timeout(),
    ));
    let _lock = RunLock::acquire(&config.storage.path)?;
    let scheduler = Scheduler::new(store.clone(), client, config.scheduler.clone());

    if once {
        let finished = scheduler.run_until_idle().await?;
        for task in &finished {
            print_task_line(task);
        }
        println!("{} tasks finished", finished.len());
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(()).await;
        }
    });

    println!("Scheduler running, Ctrl-C to stop");
    scheduler.run(shutdown_rx).await
}

// === Status ===

async fn cmd_status(store: &LeadStore, format: OutputFormat) -> Result<()> {
    debug!(?format, "cmd_status: called");
    let tasks = TaskLifecycleManager::new(store.clone());
    let repo = StateRepository::new(store.clone());

    let counts = tasks.counts().await?;
    let leads = repo.count_leads().await?;
    let presets = repo.list_presets().await?.len();

    if format == OutputFormat::Json {
        return print_json(&serde_json::json!({
            "tasks": counts,
            "leads": leads,
            "presets": presets,
        }));
    }

    println!("{}", "Tasks".bold());
    for status in TaskStatus::ALL {
        let count = match status {
            TaskStatus::Draft => counts.draft,
            TaskStatus::Pending => counts.pending,
            TaskStatus::Queued => counts.queued,
            TaskStatus::Running => counts.running,
            TaskStatus::Completed => counts.completed,
            TaskStatus::Failed => counts.failed,
        };
        println!("  {:<10} {}", colored_status(status), count);
    }
    println!("{} {}", "Leads:".bold(), leads);
    println!("{} {}", "Presets:".bold(), presets);
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
