use anyhow::{bail, Context, Result};
use chrono::{Duration, Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use waypoint_core::{
    Category, JsonFileStore, Plan, PlanRequest, PlanSource, Planner, TaskBook, TaskStatus,
    TaskStore, TextModel,
};

mod auth;
mod config;
mod llm;
mod state;

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("WAYPOINT_BUILD_SHA"), ")");

#[derive(Parser, Debug)]
#[command(name = "waypoint", version = VERSION, about = "Plan tasks as milestones, with or without an AI model")]
struct Cli {
    /// trace, debug, info, warn or error (overrides RUST_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a task and generate its milestones
    Create {
        name: String,

        #[arg(long, default_value = "Personal")]
        category: Category,

        /// YYYY-MM-DD (default: today)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// YYYY-MM-DD (default: start + 7 days)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Extra detail passed to the model
        #[arg(long)]
        context: Option<String>,
    },

    /// List tasks with their milestones, newest first
    List {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Flip a milestone between done and not done
    Toggle { task: u64, milestone: u32 },

    /// Mark a task completed
    Complete { task: u64 },

    /// Mark a task in progress
    Start { task: u64 },

    /// Remove every task
    Clear {
        #[arg(long)]
        yes: bool,
    },

    /// Dashboard and analytics figures
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// Productivity insights over your tasks
    Insights,

    /// Verify the configured API key and list usable models
    CheckKey,

    /// Store API keys in ~/.waypoint/auth.json
    Auth {
        #[command(subcommand)]
        command: AuthCommand,
    },

    /// Manage ~/.waypoint/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum AuthCommand {
    PasteGeminiKey,
    PasteOpenaiKey,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write the default config if none exists
    Init,
    Show,
}

fn setup_logging(cli_log_level: Option<&str>) -> Result<()> {
    // Priority: --log-level > RUST_LOG > warn
    let filter = match cli_log_level {
        Some(level) => EnvFilter::try_new(level)
            .with_context(|| format!("invalid log level '{level}'"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("init logging: {e}"))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    setup_logging(cli.log_level.as_deref())?;

    match cli.command {
        Command::Create {
            name,
            category,
            start,
            end,
            context,
        } => create(name, category, start, end, context.unwrap_or_default())?,

        Command::List { limit } => {
            let (_, book) = open_book()?;
            list(&book, limit.unwrap_or(usize::MAX));
        }

        Command::Toggle { task, milestone } => {
            let (store, mut book) = open_book()?;
            let done = book.toggle_milestone(task, milestone)?;
            store.save(&mut book)?;
            println!(
                "Milestone {milestone} of task {task} is now {}",
                if done { "done" } else { "not done" }
            );
        }

        Command::Complete { task } => set_status(task, TaskStatus::Completed)?,
        Command::Start { task } => set_status(task, TaskStatus::InProgress)?,

        Command::Clear { yes } => {
            let (store, mut book) = open_book()?;
            if !yes {
                bail!("refusing to remove {} task(s) without --yes", book.tasks.len());
            }
            let n = book.tasks.len();
            book.clear();
            store.save(&mut book)?;
            println!("Removed {n} task(s)");
        }

        Command::Stats { json } => {
            let (_, book) = open_book()?;
            print_stats(&book, json)?;
        }

        Command::Insights => {
            let cfg = config::load_config()?;
            let (_, book) = open_book()?;
            let insights = build_planner(&cfg)?.generate_insights(&book);
            println!("# Insights ({})\n", source_label(insights.source));
            for item in &insights.items {
                println!("- {item}");
            }
        }

        Command::CheckKey => check_key().await?,

        Command::Auth { command } => match command {
            AuthCommand::PasteGeminiKey => auth::paste_gemini_key()?,
            AuthCommand::PasteOpenaiKey => auth::paste_openai_key()?,
        },

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => {
                let cfg = config::load_config()?;
                println!("# {}\n", config::config_path()?.display());
                print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
            }
        },
    }

    Ok(())
}

fn build_planner(cfg: &config::Config) -> Result<Planner<Box<dyn TextModel>>> {
    let model = llm::config_from(&cfg.llm)?
        .map(|c| Box::new(llm::HttpModel::new(c)) as Box<dyn TextModel>);
    debug!(has_model = model.is_some(), "build_planner: called");
    Ok(Planner::new(model).with_options(cfg.planner.options()))
}

fn open_book() -> Result<(JsonFileStore, TaskBook)> {
    let cfg = config::load_config()?;
    let store = JsonFileStore::new(state::tasks_path(&cfg.store.path)?);
    let book = store.load()?;
    Ok((store, book))
}

fn create(
    name: String,
    category: Category,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    context: String,
) -> Result<()> {
    let start = start.unwrap_or_else(|| Local::now().date_naive());
    let end = end.unwrap_or(start + Duration::days(7));

    let request = PlanRequest::new(name, category.as_str(), start, end).with_context(context);
    request.validate()?;

    let cfg = config::load_config()?;
    let plan = build_planner(&cfg)?.generate_milestones(&request);
    print_plan(&request, &plan);

    let (store, mut book) = open_book()?;
    let id = book.add_task(&request, category, plan, Utc::now());
    store.save(&mut book)?;
    info!(id, path = %store.path().display(), "create: task saved");
    println!("\nSaved as task {id}");
    Ok(())
}

fn set_status(task: u64, status: TaskStatus) -> Result<()> {
    let (store, mut book) = open_book()?;
    book.set_status(task, status)?;
    store.save(&mut book)?;
    println!("Task {task} is now {status}");
    Ok(())
}

fn source_label(source: PlanSource) -> &'static str {
    match source {
        PlanSource::Ai => "AI generated",
        PlanSource::Fallback => "standard template",
    }
}

fn print_plan(request: &PlanRequest, plan: &Plan) {
    println!(
        "# {} ({} days, {})\n",
        request.task_name.trim(),
        request.duration_days(),
        source_label(plan.source)
    );
    for m in &plan.milestones {
        println!("{}. {} - {} day(s) [{}]", m.id, m.name, m.estimated_days, m.priority);
        println!("   {}", m.description);
    }

    if let Some(reason) = &plan.fallback_reason {
        println!("\nNote: {}", reason.user_message());
    }
    if plan.padded > 0 {
        println!("\nNote: added {} standard milestone(s) to a short AI plan.", plan.padded);
    }
    let r = &plan.reconciliation;
    if r.diverged {
        println!(
            "\nNote: milestones total {} days; the task spans {} days (each milestone takes at least 1 day).",
            r.total, r.target
        );
    }
}

fn list(book: &TaskBook, limit: usize) {
    if book.tasks.is_empty() {
        println!("No tasks yet. Create one with: waypoint create <name>");
        return;
    }
    for t in book.recent(limit) {
        let (done, total) = t.progress();
        println!(
            "#{} {} [{}] {} .. {} ({}, {}/{} milestones, {})",
            t.id,
            t.name,
            t.category,
            t.start_date,
            t.end_date,
            t.status,
            done,
            total,
            source_label(t.plan_source)
        );
        for m in &t.milestones {
            let mark = if m.completed { "x" } else { " " };
            println!("  [{mark}] {}. {} - {} day(s)", m.id, m.name, m.estimated_days);
        }
    }
}

fn print_stats(book: &TaskBook, json: bool) -> Result<()> {
    let stats = book.stats();
    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Tasks: {} total", stats.total);
    println!("  completed:   {}", stats.completed);
    println!("  in progress: {}", stats.in_progress);
    println!("  pending:     {}", stats.pending);
    println!("Completion rate: {:.1}%", stats.completion_rate);
    println!("Estimated days: {} (planned span {} days)", stats.estimated_days, stats.actual_days);

    if !stats.by_category.is_empty() {
        println!("\nBy category:");
        for (category, n) in &stats.by_category {
            println!("  {category}: {n}");
        }
    }
    if !book.tasks.is_empty() {
        println!("\nRecent:");
        for t in book.recent(5) {
            println!("  #{} {} ({})", t.id, t.name, t.status);
        }
    }
    Ok(())
}

async fn check_key() -> Result<()> {
    let cfg = config::load_config()?;
    let provider: llm::Provider = cfg.llm.provider.parse()?;
    let Some(mut llm_cfg) = llm::config_from(&cfg.llm)? else {
        bail!(
            "no {provider} API key found. Set {} (or add it to .env), or run: waypoint auth paste-{provider}-key",
            provider.env_var()
        );
    };
    println!("Provider: {provider}");
    println!("API key:  {}", auth::mask_key(&llm_cfg.api_key));

    if provider == llm::Provider::Gemini {
        let models = llm::list_models(&llm_cfg).await?;
        println!("Models supporting generateContent: {}", models.len());
        for m in &models {
            println!("  {m}");
        }
        let Some(picked) = llm::pick_model(&llm_cfg.model, &models) else {
            bail!("no model supports generateContent for this key");
        };
        if picked != llm_cfg.model {
            println!("Configured model {} is not offered; using {picked}", llm_cfg.model);
        }
        llm_cfg.model = picked;
    }

    let model = llm::HttpModel::new(llm_cfg.clone());
    match model.generate("Reply with the single word: ok") {
        Ok(reply) => println!("Test generation with {}: {}", llm_cfg.model, reply.trim()),
        Err(e) if e.is_quota() => println!("The key is valid but its quota is exhausted: {e}"),
        Err(e) => bail!("test generation failed: {e}"),
    }
    Ok(())
}
