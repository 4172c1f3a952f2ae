use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use lifetrack_api::{LifeTracker, UpdateProfileRequest};
use lifetrack_core::{life_score, ActionType, DocumentKind, TaskId, TaskStatus, DAY_FORMAT};
use lifetrack_store::{RemoteConfig, Store, StoreConfig};
use serde_json::{json, Value};
use time::OffsetDateTime;
use ulid::Ulid;

const CLI_CONTRACT_VERSION: &str = "cli.v1";

#[derive(Debug, Parser)]
#[command(name = "lt")]
#[command(about = "LifeTrack CLI")]
struct Cli {
    /// Local storage directory; ignored when a remote repository is selected.
    #[arg(long, default_value = "./lifetrack_data")]
    data_dir: PathBuf,

    /// `owner/name` slug of a remote repository; presence selects remote mode.
    #[arg(long)]
    remote_repo: Option<String>,

    #[arg(long)]
    remote_token: Option<String>,

    #[arg(long)]
    remote_token_file: Option<PathBuf>,

    #[arg(long, default_value = "main")]
    remote_branch: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Profile {
        #[command(subcommand)]
        command: Box<ProfileCommand>,
    },
    Task {
        #[command(subcommand)]
        command: Box<TaskCommand>,
    },
    Health {
        #[command(subcommand)]
        command: Box<HealthCommand>,
    },
    Journal {
        #[command(subcommand)]
        command: Box<JournalCommand>,
    },
    Stats(StatsArgs),
    Status(StatusArgs),
    History(HistoryArgs),
    Data {
        #[command(subcommand)]
        command: Box<DataCommand>,
    },
}

#[derive(Debug, Subcommand)]
enum ProfileCommand {
    Show,
    Set(ProfileSetArgs),
}

#[derive(Debug, Args)]
struct ProfileSetArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    height: f64,
    #[arg(long)]
    current_weight: f64,
    #[arg(long)]
    goal_weight: f64,
    #[arg(long)]
    calorie_limit: u32,
}

#[derive(Debug, Subcommand)]
enum TaskCommand {
    Add(TaskAddArgs),
    List,
    SetStatus(TaskSetStatusArgs),
    Archive,
}

#[derive(Debug, Args)]
struct TaskAddArgs {
    #[arg(long)]
    name: String,
    #[arg(long, default_value = "Daily Goal")]
    category: String,
}

#[derive(Debug, Args)]
struct TaskSetStatusArgs {
    /// List position of the task; an out-of-range index changes nothing.
    #[arg(long)]
    index: Option<usize>,
    /// Stable task identifier; unknown ids are an error.
    #[arg(long)]
    id: Option<String>,
    #[arg(long)]
    status: StatusArg,
}

#[derive(Debug, Subcommand)]
enum HealthCommand {
    Food(FoodArgs),
    Workout(WorkoutArgs),
    Weight(WeightArgs),
    Show(DateArgs),
    WeightHistory,
}

#[derive(Debug, Args)]
struct FoodArgs {
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    name: String,
    #[arg(long)]
    calories: u32,
}

#[derive(Debug, Args)]
struct WorkoutArgs {
    #[arg(long)]
    date: Option<String>,
    #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
    completed: bool,
}

#[derive(Debug, Args)]
struct WeightArgs {
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    kg: f64,
}

#[derive(Debug, Args)]
struct DateArgs {
    #[arg(long)]
    date: Option<String>,
}

#[derive(Debug, Subcommand)]
enum JournalCommand {
    Add(JournalAddArgs),
    List,
}

#[derive(Debug, Args)]
struct JournalAddArgs {
    #[arg(long)]
    title: String,
    #[arg(long)]
    content: String,
}

#[derive(Debug, Args)]
struct StatsArgs {
    #[arg(long)]
    year: i32,
    #[arg(long)]
    month: u8,
}

#[derive(Debug, Args)]
struct StatusArgs {
    #[arg(long)]
    date: Option<String>,
}

#[derive(Debug, Args)]
struct HistoryArgs {
    /// Filter by action type, e.g. `TASK_COMPLETE`.
    #[arg(long)]
    action: Option<String>,
}

#[derive(Debug, Subcommand)]
enum DataCommand {
    Load(DataLoadArgs),
    Save(DataSaveArgs),
}

#[derive(Debug, Args)]
struct DataLoadArgs {
    #[arg(long)]
    key: String,
}

#[derive(Debug, Args)]
struct DataSaveArgs {
    #[arg(long)]
    key: String,
    #[arg(long)]
    file: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StatusArg {
    Pending,
    Done,
}

impl StatusArg {
    fn into_status(self) -> TaskStatus {
        match self {
            Self::Pending => TaskStatus::Pending,
            Self::Done => TaskStatus::Done,
        }
    }
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let tracker = LifeTracker::new(open_store(&cli)?);

    match cli.command {
        Command::Profile { command } => run_profile(*command, &tracker),
        Command::Task { command } => run_task(*command, &tracker),
        Command::Health { command } => run_health(*command, &tracker),
        Command::Journal { command } => run_journal(*command, &tracker),
        Command::Stats(args) => run_stats(&args, &tracker),
        Command::Status(args) => run_status(&args, &tracker),
        Command::History(args) => run_history(&args, &tracker),
        Command::Data { command } => run_data(*command, tracker.store()),
    }
}

fn open_store(cli: &Cli) -> Result<Store> {
    let config = match &cli.remote_repo {
        Some(repo) => {
            let mut remote = RemoteConfig::new(remote_token(cli)?, repo.clone());
            remote.branch = cli.remote_branch.clone();
            StoreConfig::Remote(remote)
        }
        None => StoreConfig::Local { dir: cli.data_dir.clone() },
    };
    Store::open(config)
}

fn remote_token(cli: &Cli) -> Result<String> {
    if let Some(token) = &cli.remote_token {
        return Ok(token.clone());
    }
    if let Some(path) = &cli.remote_token_file {
        let token = fs::read_to_string(path)
            .with_context(|| format!("failed to read token file {}", path.display()))?;
        return Ok(token.trim().to_string());
    }
    Err(anyhow!("remote mode requires --remote-token or --remote-token-file"))
}

fn date_or_today(date: Option<String>) -> Result<String> {
    match date {
        Some(date) => Ok(date),
        None => OffsetDateTime::now_local()
            .unwrap_or_else(|_| OffsetDateTime::now_utc())
            .format(DAY_FORMAT)
            .context("failed to format today's date"),
    }
}

fn run_profile(command: ProfileCommand, tracker: &LifeTracker) -> Result<()> {
    match command {
        ProfileCommand::Show => {
            let loaded = tracker.profile()?;
            emit_json(json!({
                "origin": loaded.origin,
                "profile": loaded.value,
            }))
        }
        ProfileCommand::Set(args) => {
            let profile = tracker.update_profile(UpdateProfileRequest {
                name: args.name,
                height: args.height,
                current_weight: args.current_weight,
                goal_weight: args.goal_weight,
                calorie_limit: args.calorie_limit,
            })?;
            emit_json(json!({ "profile": profile }))
        }
    }
}

fn run_task(command: TaskCommand, tracker: &LifeTracker) -> Result<()> {
    match command {
        TaskCommand::Add(args) => {
            let task = tracker.add_task(&args.name, &args.category)?;
            emit_json(json!({ "task": task }))
        }
        TaskCommand::List => {
            let tasks = tracker.tasks()?;
            emit_json(json!({ "tasks": tasks }))
        }
        TaskCommand::SetStatus(args) => run_task_set_status(args, tracker),
        TaskCommand::Archive => {
            let archived = tracker.archive_completed_tasks()?;
            emit_json(json!({ "archived": archived }))
        }
    }
}

fn run_task_set_status(args: TaskSetStatusArgs, tracker: &LifeTracker) -> Result<()> {
    let status = args.status.into_status();
    match (args.index, args.id) {
        (Some(index), None) => match tracker.update_task_status(index, status)? {
            Some(task) => emit_json(json!({ "task": task })),
            None => emit_json(json!({
                "task": Value::Null,
                "note": "index out of range; nothing changed",
            })),
        },
        (None, Some(id)) => {
            let parsed = Ulid::from_string(&id)
                .map_err(|err| anyhow!("invalid task id `{id}`: {err}"))?;
            let task = tracker.update_task_status_by_id(TaskId(parsed), status)?;
            emit_json(json!({ "task": task }))
        }
        _ => Err(anyhow!("exactly one of --index or --id MUST be provided")),
    }
}

fn run_health(command: HealthCommand, tracker: &LifeTracker) -> Result<()> {
    match command {
        HealthCommand::Food(args) => {
            let date = date_or_today(args.date)?;
            let entry = tracker.add_food_log(&date, &args.name, args.calories)?;
            emit_json(json!({ "entry": entry }))
        }
        HealthCommand::Workout(args) => {
            let date = date_or_today(args.date)?;
            let entry = tracker.set_workout_status(&date, args.completed)?;
            emit_json(json!({ "entry": entry }))
        }
        HealthCommand::Weight(args) => {
            let date = date_or_today(args.date)?;
            let entry = tracker.log_weight(&date, args.kg)?;
            emit_json(json!({ "entry": entry }))
        }
        HealthCommand::Show(args) => {
            let date = date_or_today(args.date)?;
            let entry = tracker.daily_entry(&date)?;
            emit_json(json!({ "entry": entry }))
        }
        HealthCommand::WeightHistory => {
            let history = tracker.weight_history()?;
            emit_json(json!({ "weights": history }))
        }
    }
}

fn run_journal(command: JournalCommand, tracker: &LifeTracker) -> Result<()> {
    match command {
        JournalCommand::Add(args) => {
            let entry = tracker.add_journal_entry(&args.title, &args.content)?;
            emit_json(json!({ "entry": entry }))
        }
        JournalCommand::List => {
            let entries = tracker.journal_entries()?;
            emit_json(json!({ "entries": entries }))
        }
    }
}

fn run_stats(args: &StatsArgs, tracker: &LifeTracker) -> Result<()> {
    let stats = tracker.monthly_analytics(args.year, args.month)?;
    let score = life_score(&stats);
    let mut value = serde_json::to_value(&stats)?;
    if let Some(object) = value.as_object_mut() {
        object.insert("score".to_string(), json!(score));
    }
    emit_json(value)
}

fn run_status(args: &StatusArgs, tracker: &LifeTracker) -> Result<()> {
    let date = date_or_today(args.date.clone())?;
    let summary = tracker.daily_summary(&date)?;
    emit_json(serde_json::to_value(&summary)?)
}

fn run_history(args: &HistoryArgs, tracker: &LifeTracker) -> Result<()> {
    let records = tracker.history()?;
    let records = match &args.action {
        Some(raw) => {
            let action = ActionType::parse(raw)
                .ok_or_else(|| anyhow!("unknown action type `{raw}`"))?;
            records.into_iter().filter(|record| record.action_type == action).collect()
        }
        None => records,
    };
    emit_json(json!({ "records": records }))
}

fn run_data(command: DataCommand, store: &Store) -> Result<()> {
    match command {
        DataCommand::Load(args) => {
            let kind = DocumentKind::from_key(&args.key)?;
            let loaded = store.load_value(kind)?;
            emit_json(json!({
                "key": kind.as_str(),
                "origin": loaded.origin,
                "document": loaded.value,
            }))
        }
        DataCommand::Save(args) => {
            let kind = DocumentKind::from_key(&args.key)?;
            let body = fs::read_to_string(&args.file)
                .with_context(|| format!("failed to read {}", args.file.display()))?;
            let document: Value = serde_json::from_str(&body)
                .with_context(|| format!("{} is not valid JSON", args.file.display()))?;
            store.save_value(kind, &document)?;
            emit_json(json!({ "key": kind.as_str(), "saved": true }))
        }
    }
}
