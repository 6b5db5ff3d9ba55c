//! RemindKit command-line host.
//!
//! # Responsibility
//! - Expose reminder, counter and preference operations over one database.
//! - Run the foreground scheduler (`run`) or a single background tick (`poll`).
//!
//! # Invariants
//! - Logging is initialized before the database is opened.
//! - Each `poll` invocation runs exactly one coordinator tick.

mod notifier;

use anyhow::{bail, Context};
use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use clap::{Parser, Subcommand};
use log::info;
use notifier::ConsoleNotifier;
use remindkit_core::{
    default_log_level, init_logging, init_stderr_logging, CoreConfig, CounterService,
    CreateReminderRequest, DeliveryCoordinator, Notification, Notifier, PollReport,
    PreferenceRepository, ReminderScheduler, ReminderService, RepeatRule,
    SqlitePreferenceRepository, SqliteReminderStore, SystemClock,
};
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;
use uuid::Uuid;

const LOCAL_INPUT_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"];

/// Recurring reminders backed by SQLite.
#[derive(Parser)]
#[command(name = "remindkit", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Database file; overrides `db_path` from the config.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a reminder.
    Add {
        name: String,
        /// First due time: RFC 3339, or `YYYY-MM-DD HH:MM` in the calendar offset.
        #[arg(long)]
        due: String,
        /// `none|hourly|daily|weekly|monthly|yearly` or `every <n> <unit>`.
        #[arg(long, default_value = "none")]
        repeat: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List active reminders with their state.
    List,
    /// Delete a reminder.
    Remove { id: Uuid },
    /// Run one delivery tick and exit.
    ///
    /// Meant for host timers; schedule it no more often than
    /// `scheduler.background_min_interval_secs`.
    Poll,
    /// Run the foreground scheduler.
    Run {
        /// Stop after this many ticks; otherwise run until stdin closes.
        #[arg(long)]
        ticks: Option<u64>,
    },
    /// Manage time counters.
    #[command(subcommand)]
    Counter(CounterCommand),
    /// Manage stored preferences.
    #[command(subcommand)]
    Pref(PrefCommand),
    /// Send one ad-hoc notification through the console notifier.
    NotifyTest {
        #[arg(default_value = "RemindKit")]
        title: String,
        body: Option<String>,
    },
}

#[derive(Subcommand)]
enum CounterCommand {
    Add {
        title: String,
        /// Target time, same formats as `add --due`.
        #[arg(long)]
        target: String,
        #[arg(long)]
        description: Option<String>,
    },
    List,
    Remove { id: Uuid },
}

#[derive(Subcommand)]
enum PrefCommand {
    Get { key: String },
    Set { key: String, value: String },
    Remove { key: String },
    List,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => CoreConfig::load(path)?,
        None => CoreConfig::default(),
    };
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    config.validate()?;
    init_cli_logging(&config)?;

    let calendar = config
        .scheduler
        .calendar_offset()
        .context("calendar offset out of range")?;
    let notifier = ConsoleNotifier::new(config.notifications.permission()?);

    match cli.command {
        Command::Add {
            name,
            due,
            repeat,
            description,
        } => {
            let repeat_rule: RepeatRule = repeat
                .parse()
                .with_context(|| format!("invalid --repeat value `{repeat}`"))?;
            let service = ReminderService::new(open_store(&config)?);
            let reminder = service.create_reminder(CreateReminderRequest {
                name,
                description,
                due_at: parse_instant(&due, calendar)?,
                repeat_rule,
            })?;
            println!("{}", reminder.id);
        }
        Command::List => {
            let service = ReminderService::new(open_store(&config)?);
            for view in service.list_with_state(Utc::now())? {
                let reminder = view.reminder;
                println!(
                    "{}  {}  {:<16}  {:?}  {}",
                    reminder.id,
                    format_instant(reminder.due_at, calendar),
                    reminder.repeat_rule.to_string(),
                    view.state,
                    reminder.name
                );
            }
        }
        Command::Remove { id } => {
            let mut service = ReminderService::new(open_store(&config)?);
            service.delete_reminder(id)?;
            println!("removed {id}");
        }
        Command::Poll => {
            let mut coordinator =
                DeliveryCoordinator::new(open_store(&config)?, notifier).with_calendar(calendar);
            let report = coordinator.poll(&SystemClock)?;
            print_report(&report);
            println!(
                "next background poll: no sooner than {}s",
                config.scheduler.background_min_interval().as_secs()
            );
        }
        Command::Run { ticks } => {
            let coordinator =
                DeliveryCoordinator::new(open_store(&config)?, notifier).with_calendar(calendar);
            run_scheduler(coordinator, config.scheduler.poll_interval(), ticks)?;
        }
        Command::Counter(command) => {
            let store = open_store(&config)?;
            let service =
                CounterService::new(SqlitePreferenceRepository::new(store.connection()));
            match command {
                CounterCommand::Add {
                    title,
                    target,
                    description,
                } => {
                    let counter =
                        service.add_counter(title, description, parse_instant(&target, calendar)?)?;
                    println!("{}", counter.id);
                }
                CounterCommand::List => {
                    let board = service.board(Utc::now())?;
                    let sections = [("coming up", board.coming_up), ("elapsed", board.elapsed)];
                    for (heading, views) in sections {
                        if views.is_empty() {
                            continue;
                        }
                        println!("{heading}:");
                        for view in views {
                            println!(
                                "  {}  {:>14}  {}",
                                view.counter.id,
                                view.parts.to_string(),
                                view.counter.title
                            );
                        }
                    }
                }
                CounterCommand::Remove { id } => {
                    service.remove_counter(id)?;
                    println!("removed {id}");
                }
            }
        }
        Command::Pref(command) => {
            let store = open_store(&config)?;
            let prefs = SqlitePreferenceRepository::new(store.connection());
            match command {
                PrefCommand::Get { key } => match prefs.get(&key)? {
                    Some(value) => println!("{value}"),
                    None => bail!("preference `{key}` is not set"),
                },
                PrefCommand::Set { key, value } => prefs.set(&key, &value)?,
                PrefCommand::Remove { key } => {
                    if !prefs.remove(&key)? {
                        bail!("preference `{key}` is not set");
                    }
                }
                PrefCommand::List => {
                    for key in prefs.list_keys()? {
                        println!("{key}");
                    }
                }
            }
        }
        Command::NotifyTest { title, body } => {
            notifier
                .notify(&Notification::ad_hoc(title, body))
                .context("test notification was not delivered")?;
        }
    }

    Ok(())
}

/// File logs when a directory is configured; otherwise warnings and up on stderr
/// so command output stays readable.
fn init_cli_logging(config: &CoreConfig) -> anyhow::Result<()> {
    match &config.logging.dir {
        Some(dir) => {
            let level = config.logging.level.as_deref().unwrap_or(default_log_level());
            init_logging(level, dir)?;
        }
        None => {
            let level = config.logging.level.as_deref().unwrap_or("warn");
            init_stderr_logging(level)?;
        }
    }
    Ok(())
}

fn open_store(config: &CoreConfig) -> anyhow::Result<SqliteReminderStore> {
    SqliteReminderStore::open(&config.db_path)
        .with_context(|| format!("failed to open database `{}`", config.db_path.display()))
}

fn run_scheduler(
    coordinator: DeliveryCoordinator<SqliteReminderStore, ConsoleNotifier>,
    poll_interval: Duration,
    max_ticks: Option<u64>,
) -> anyhow::Result<()> {
    let permission = coordinator.notifier().permission();
    if !permission.is_granted() {
        eprintln!(
            "warning: notification permission is {}; owed reminders wait until it is granted",
            permission.as_str()
        );
    }

    let scheduler = ReminderScheduler::start(coordinator, SystemClock, poll_interval)?;
    let wait = poll_interval.min(Duration::from_millis(50));
    let stdin_closed = match max_ticks {
        Some(_) => None,
        None => {
            println!(
                "scheduler running every {}ms; close stdin (Ctrl+D) to stop",
                poll_interval.as_millis()
            );
            Some(watch_stdin()?)
        }
    };

    let mut blocked = false;
    while scheduler.is_running() {
        if let Some(report) = scheduler.last_report() {
            if let Some(banner) = permission_banner(blocked, &report) {
                eprintln!("{banner}");
                blocked = report.permission_blocked;
            }
        }
        if max_ticks.is_some_and(|limit| scheduler.ticks() >= limit) {
            break;
        }
        match &stdin_closed {
            Some(closed) => match closed.recv_timeout(wait) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            },
            None => std::thread::sleep(wait),
        }
    }

    let ticks = scheduler.ticks();
    scheduler.stop()?;
    info!("event=cli_run module=cli status=ok ticks={ticks}");
    Ok(())
}

/// Signals once stdin reaches end of file.
fn watch_stdin() -> anyhow::Result<Receiver<()>> {
    let (closed_tx, closed_rx) = mpsc::channel();
    std::thread::Builder::new()
        .name("remindkit-stdin".to_string())
        .spawn(move || {
            let mut sink = String::new();
            while matches!(std::io::stdin().read_line(&mut sink), Ok(read) if read > 0) {
                sink.clear();
            }
            // The receiver is gone once the scheduler has stopped on its own.
            let _ = closed_tx.send(());
        })
        .context("failed to spawn stdin watcher")?;
    Ok(closed_rx)
}

/// Line to show when a tick flips between blocked and delivering.
///
/// Ticks that never consulted permission (nothing owed) leave the state as is.
fn permission_banner(was_blocked: bool, report: &PollReport) -> Option<String> {
    let permission = report.permission?;
    match (was_blocked, report.permission_blocked) {
        (false, true) => Some(format!(
            "notifications blocked: permission is {} ({} owed)",
            permission.as_str(),
            report.owed
        )),
        (true, false) => {
            Some("notifications permitted again; owed reminders delivered".to_string())
        }
        _ => None,
    }
}

fn print_report(report: &PollReport) {
    if report.permission_blocked {
        println!(
            "skipped: notification permission is {} ({} owed)",
            report.permission.map(|p| p.as_str()).unwrap_or("unknown"),
            report.owed
        );
        return;
    }
    println!(
        "checked={} fired={} failures={}",
        report.checked,
        report.fired.len(),
        report.delivery_failures
    );
    for fired in &report.fired {
        match fired.next_due_at {
            Some(next) => println!(
                "  {} next={}",
                fired.id,
                next.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
            None => println!("  {} done", fired.id),
        }
    }
}

fn parse_instant(value: &str, calendar: FixedOffset) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value.trim()) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in LOCAL_INPUT_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value.trim(), format) {
            if let Some(local) = calendar.from_local_datetime(&naive).single() {
                return Ok(local.with_timezone(&Utc));
            }
        }
    }
    bail!("unrecognized time `{value}`; use RFC 3339 or `YYYY-MM-DD HH:MM`")
}

fn format_instant(value: DateTime<Utc>, calendar: FixedOffset) -> String {
    value
        .with_timezone(&calendar)
        .format("%Y-%m-%d %H:%M:%S %:z")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::{format_instant, parse_instant, permission_banner, Cli};
    use chrono::{FixedOffset, TimeZone, Utc};
    use clap::CommandFactory;
    use remindkit_core::{NotificationPermission, PollReport};

    fn report(permission: Option<NotificationPermission>, blocked: bool) -> PollReport {
        PollReport {
            now: Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap(),
            checked: 2,
            owed: 2,
            fired: Vec::new(),
            delivery_failures: 0,
            permission_blocked: blocked,
            permission,
            persisted: None,
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_rfc3339_and_local_formats() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap();

        assert_eq!(parse_instant("2024-05-01T09:00:00+02:00", utc).unwrap(), expected);
        assert_eq!(parse_instant("2024-05-01 09:00", plus_two).unwrap(), expected);
        assert_eq!(parse_instant("2024-05-01T07:00", utc).unwrap(), expected);
        assert!(parse_instant("tomorrow", utc).is_err());
    }

    #[test]
    fn formats_in_calendar_offset() {
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let instant = Utc.with_ymd_and_hms(2024, 5, 1, 7, 0, 0).unwrap();
        assert_eq!(format_instant(instant, plus_two), "2024-05-01 09:00:00 +02:00");
    }

    #[test]
    fn banner_appears_when_permission_blocks_and_clears_when_granted() {
        let denied = report(Some(NotificationPermission::Denied), true);
        let banner = permission_banner(false, &denied).unwrap();
        assert!(banner.contains("denied"));
        assert!(banner.contains("2 owed"));

        assert_eq!(permission_banner(true, &denied), None);

        let granted = report(Some(NotificationPermission::Granted), false);
        assert!(permission_banner(true, &granted).is_some());
        assert_eq!(permission_banner(false, &granted), None);
    }

    #[test]
    fn idle_ticks_do_not_change_the_banner() {
        let idle = report(None, false);
        assert_eq!(permission_banner(true, &idle), None);
        assert_eq!(permission_banner(false, &idle), None);
    }
}
