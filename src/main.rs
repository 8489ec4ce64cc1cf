use chrono::{DateTime, Utc};
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::{ColoredString, Colorize};
use pickr::calendar::{iso_week_of, parse_when, WEEKDAYS};
use pickr::logging::{self, LogFormat};
use pickr::{
    CalendarView, CommandPublisher, CommandRewriter, CommitStore, Config, Database, Dispatcher, DryRunPublisher,
    Publisher, RetryPolicy, RetryingPublisher, RetryingRewriter, ScheduleAllocator, ScheduleOutcome, SlotStatus,
    ToneGate, CURRENT_SCHEMA,
};
use std::error::Error;
use std::path::PathBuf;

type CliResult = Result<(), Box<dyn Error>>;

#[derive(Parser, Debug)]
#[command(name = "pickr")]
#[command(author, version, about = "Weekly post calendars and scheduled publishing")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Database file (default: PICKR_DB_PATH, then the nearest .pickr/pickr.db)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create .pickr with a database and default config here
    Init,

    /// Load niches, users, topics and drafts from a JSON bundle
    Import {
        /// Bundle file
        file: PathBuf,
    },

    /// Build this week's calendar for one user
    Schedule {
        /// User id or username
        user: String,

        /// Build a new calendar even if one exists for this week
        #[arg(long)]
        force: bool,
    },

    /// Build this week's calendar for every user
    ScheduleAll {
        /// Also rebuild users that already have one
        #[arg(long)]
        force: bool,
    },

    /// Show a user's calendar
    Calendar {
        /// User id or username
        user: String,

        /// ISO week number (default: current week)
        #[arg(long)]
        week: Option<u32>,

        /// ISO year (default: current year)
        #[arg(long)]
        year: Option<i32>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Commit a suggested send to a time
    Commit {
        send_id: i32,

        /// RFC 3339, or "YYYY-MM-DD HH:MM" in the posting timezone
        when: String,
    },

    /// Schedule a draft that has no suggested slot
    CommitNew {
        /// User id or username
        user: String,

        /// Draft post id
        draft: String,

        /// RFC 3339, or "YYYY-MM-DD HH:MM" in the posting timezone
        when: String,
    },

    /// Commit a suggested send at its calendar slot time
    Accept { send_id: i32 },

    /// Remove a send that has not been posted
    Uncommit { send_id: i32 },

    /// Publish every committed send that is due
    Dispatch {
        /// Keep running, dispatching every dispatch.interval_secs
        #[arg(long)]
        watch: bool,

        /// Log posts instead of publishing them
        #[arg(long)]
        dry_run: bool,
    },

    /// List committed sends waiting to go out
    Pending,

    /// Show database counts
    Status,

    /// Generate shell completions
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_format);

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn open_db(path: &Option<PathBuf>) -> Result<Database, Box<dyn Error>> {
    let db = match path {
        Some(p) => Database::open_at(p)?,
        None => Database::open()?,
    };
    Ok(db)
}

fn when_arg(raw: &str, config: &Config) -> Result<DateTime<Utc>, Box<dyn Error>> {
    parse_when(raw, config.schedule.utc_offset_minutes)
        .ok_or_else(|| format!("cannot read '{}' as a time (try 2026-03-09T09:00:00Z or \"2026-03-09 09:00\")", raw).into())
}

fn run(cli: Cli) -> CliResult {
    match cli.command {
        Command::Init => {
            let cwd = std::env::current_dir()?;
            pickr::init::init_project(&cwd)?;
            return Ok(());
        }
        Command::Completion { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "pickr", &mut std::io::stdout());
            return Ok(());
        }
        _ => {}
    }

    let config = Config::load()?;
    let db = open_db(&cli.db)?;
    let now = Utc::now();

    let rewriter = config.tone.rewrite_command.as_ref().map(|cmd| {
        RetryingRewriter::new(CommandRewriter::new(cmd.clone()), RetryPolicy::from(&config.dispatch.retry))
    });
    let gate = rewriter.as_ref().map(|r| ToneGate::new(r, config.tone.min_sample_chars));

    match cli.command {
        Command::Init | Command::Completion { .. } => {}

        Command::Import { file } => {
            let summary = db.import_file(&file, now)?;
            println!(
                "{} {} niches, {} users, {} topics, {} drafts, {} credentials",
                "Imported".green(),
                summary.niches,
                summary.users,
                summary.topics,
                summary.drafts,
                summary.credentials
            );
        }

        Command::Schedule { user, force } => {
            let user = db.find_user(&user)?;
            let mut allocator = ScheduleAllocator::new(&db, &config.schedule);
            if let Some(gate) = &gate {
                allocator = allocator.with_tone(gate);
            }
            match allocator.schedule_user(&user, now, force, &mut rand::rng())? {
                ScheduleOutcome::Created { calendar_id, iso_year, week, slots, committed, fallback } => {
                    println!(
                        "{} calendar {} for {} (week {} of {}): {} slots, {} committed{}",
                        "Created".green(),
                        calendar_id,
                        user.username.cyan(),
                        week,
                        iso_year,
                        slots,
                        committed,
                        if fallback { ", few topics so some repeat" } else { "" }
                    );
                }
                ScheduleOutcome::Skipped { reason } => {
                    println!("{} {}: {}", "Skipped".yellow(), user.username, reason);
                }
            }
        }

        Command::ScheduleAll { force } => {
            let mut allocator = ScheduleAllocator::new(&db, &config.schedule);
            if let Some(gate) = &gate {
                allocator = allocator.with_tone(gate);
            }
            let report = allocator.schedule_all(now, force, &mut rand::rng())?;
            println!(
                "{} {} calendars, {} users skipped, {} failed",
                "Scheduled".green(),
                report.created,
                report.skipped,
                report.failed.len()
            );
            for (user_id, error) in &report.failed {
                println!("   {} {}: {}", "Failed".red(), user_id, error);
            }
        }

        Command::Calendar { user, week, year, json } => {
            let user = db.find_user(&user)?;
            let (current_year, current_week) = iso_week_of(now, config.schedule.utc_offset_minutes);
            let year = year.unwrap_or(current_year);
            let week = week.unwrap_or(current_week);

            match db.calendar_for(&user.id, year, week, config.dispatch.max_failures)? {
                Some(view) if json => println!("{}", serde_json::to_string_pretty(&view)?),
                Some(view) => print_calendar(&view),
                None if json => println!("null"),
                None => println!("No calendar for {} in week {} of {}.", user.username, week, year),
            }
        }

        Command::Commit { send_id, when } => {
            let when = when_arg(&when, &config)?;
            let store = CommitStore::new(&db, config.dispatch.horizon_days, config.schedule.utc_offset_minutes);
            let send = store.commit(send_id, when, now)?;
            println!(
                "{} send {} for {}",
                "Committed".green(),
                send.id,
                send.scheduled_for.unwrap_or_default()
            );
        }

        Command::CommitNew { user, draft, when } => {
            let user = db.find_user(&user)?;
            let when = when_arg(&when, &config)?;
            let store = CommitStore::new(&db, config.dispatch.horizon_days, config.schedule.utc_offset_minutes);
            let send_id = store.commit_new(&user.id, &draft, when, now)?;
            println!("{} send {} for {}", "Committed".green(), send_id, pickr::db::format_ts(when));
        }

        Command::Accept { send_id } => {
            let store = CommitStore::new(&db, config.dispatch.horizon_days, config.schedule.utc_offset_minutes);
            let send = store.accept_slot(send_id, now)?;
            println!(
                "{} send {} for {}",
                "Committed".green(),
                send.id,
                send.scheduled_for.unwrap_or_default()
            );
        }

        Command::Uncommit { send_id } => {
            let store = CommitStore::new(&db, config.dispatch.horizon_days, config.schedule.utc_offset_minutes);
            store.uncommit(send_id)?;
            println!("{} send {}", "Removed".green(), send_id);
        }

        Command::Dispatch { watch, dry_run } => {
            let policy = RetryPolicy::from(&config.dispatch.retry);
            let publisher: Box<dyn Publisher> = match (&config.dispatch.publish_command, dry_run) {
                (_, true) => Box::new(DryRunPublisher),
                (Some(cmd), false) => Box::new(RetryingPublisher::new(CommandPublisher::new(cmd.clone()), policy)),
                (None, false) => {
                    return Err("no dispatch.publish_command configured (use --dry-run to test)".into());
                }
            };

            let mut dispatcher =
                Dispatcher::new(&db, publisher.as_ref(), &db).with_max_failures(config.dispatch.max_failures);
            if let Some(gate) = &gate {
                dispatcher = dispatcher.with_tone(gate);
            }

            if watch {
                println!(
                    "{} every {}s (Ctrl-C to stop)",
                    "Dispatching".cyan().bold(),
                    config.dispatch.interval_secs
                );
                dispatcher.watch(config.dispatch.interval(), None);
            } else {
                let report = dispatcher.dispatch_due(now)?;
                println!(
                    "{} {} posted, {} failed, {} deferred, {} users skipped ({} due)",
                    "Dispatched".green(),
                    report.posted,
                    report.failed,
                    report.deferred,
                    report.skipped_users,
                    report.due
                );
            }
        }

        Command::Pending => {
            let pending = db.get_pending_sends()?;
            if pending.is_empty() {
                println!("Nothing pending.");
            }
            for send in pending {
                let parked = config.dispatch.max_failures > 0 && send.failures >= config.dispatch.max_failures;
                let marker = if parked { "failed".red() } else { "scheduled".blue() };
                println!(
                    "{:>5}  {}  {:<12} {:<10} {}{}",
                    send.id,
                    send.scheduled_for.as_deref().unwrap_or("-"),
                    send.user_id,
                    marker,
                    send.draft_post_id,
                    send.last_error
                        .map(|e| format!("  ({} failures, last: {})", send.failures, e))
                        .unwrap_or_default()
                );
            }
        }

        Command::Status => {
            let summary = db.get_summary()?;
            let path = cli.db.clone().unwrap_or_else(Database::db_path);
            println!("{} {}", "Database:".bold(), path.display());
            println!("{} {}", "Schema:".bold(), CURRENT_SCHEMA);
            println!("  users:     {}", summary.total_users);
            println!("  topics:    {}", summary.total_topics);
            println!("  drafts:    {}", summary.total_drafts);
            println!("  calendars: {}", summary.total_calendars);
            println!("  pending:   {}", summary.pending_sends);
            println!("  posted:    {}", summary.posted_sends);
        }
    }

    Ok(())
}

fn status_label(status: &SlotStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        SlotStatus::Suggested => label.normal(),
        SlotStatus::Scheduled => label.blue(),
        SlotStatus::Posted => label.green(),
        SlotStatus::Failed => label.red(),
        SlotStatus::Removed => label.dimmed(),
    }
}

fn print_calendar(view: &CalendarView) {
    let cal = &view.calendar;
    println!(
        "{} week {} of {} (calendar {}, created {})\n",
        "Calendar".cyan().bold(),
        cal.week_number,
        cal.iso_year,
        cal.id,
        cal.created_at
    );
    println!("{}", cal.summary.trim_end());
    println!();

    for slot in &view.slots {
        let day = WEEKDAYS.get(slot.weekday as usize).copied().unwrap_or("?");
        let text: String = slot.text.chars().take(60).collect();
        let ellipsis = if slot.text.chars().count() > 60 { "..." } else { "" };
        println!(
            "{} {:02}:00  {:<10} {:>5}  {}{}",
            day,
            slot.hour,
            status_label(&slot.status),
            slot.send_id.map(|id| format!("#{}", id)).unwrap_or_default(),
            text,
            ellipsis
        );
    }
}
