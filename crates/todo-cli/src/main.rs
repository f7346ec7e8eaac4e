use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use todo_application::TodoContext;
use todo_core::storage::ClientStorage;
use todo_core::{TodoError, classify};
use todo_infrastructure::{ConfigService, FileClientStorage, TodoPaths};
use todo_interaction::ReqwestTransport;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::navigator::TerminalNavigator;

#[derive(Parser)]
#[command(name = "todo")]
#[command(about = "Todo CLI - manage your task list from the terminal", long_about = None)]
struct Cli {
    /// Backend base URL (overrides config.toml and TODO_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Log filter, e.g. `debug` or `todo_application=trace` (RUST_LOG wins)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Directory holding config.toml and storage.toml
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account and sign in
    Register {
        email: String,
        /// Read from TODO_PASSWORD or prompted when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign in
    Login {
        email: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign out and forget the stored token
    Logout,
    /// Show the signed-in user
    Whoami,
    /// List tasks
    List {
        #[arg(long, conflicts_with = "active")]
        completed: bool,
        #[arg(long)]
        active: bool,
    },
    /// Add a task
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<NaiveDate>,
    },
    /// Show one task
    Show { id: String },
    /// Mark a task completed
    Done { id: String },
    /// Mark a task not completed
    Undo { id: String },
    /// Flip a task's completion flag
    Toggle { id: String },
    /// Change a task
    Edit {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, conflicts_with = "clear_description")]
        description: Option<String>,
        #[arg(long)]
        clear_description: bool,
        #[arg(long, conflicts_with = "clear_due")]
        due: Option<NaiveDate>,
        #[arg(long)]
        clear_due: bool,
    },
    /// Delete a task
    Rm { id: String },
    /// Inspect the client configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file location
    Path,
    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let paths = TodoPaths::new(cli.config_dir.as_deref());
    let config_service = ConfigService::new(paths.clone());
    let mut config = config_service
        .get_config()
        .context("Failed to load configuration")?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    init_tracing(&config.log_level);

    let command = match cli.command {
        Commands::Config { action } => {
            return match action {
                ConfigAction::Path => commands::config::path(&config_service),
                ConfigAction::Show => commands::config::show(&config),
            };
        }
        other => other,
    };

    let storage = FileClientStorage::open(&paths).context("Failed to open client storage")?;
    let transport = ReqwestTransport::new(config.request_timeout())
        .context("Failed to create HTTP client")?;
    let ctx = TodoContext::create(
        config,
        Some(Arc::new(storage) as Arc<dyn ClientStorage>),
        Arc::new(transport),
        Arc::new(TerminalNavigator),
    );
    ctx.initialize().context("Failed to initialise session")?;

    let signs_in = matches!(command, Commands::Register { .. } | Commands::Login { .. });
    if let Err(err) = run(&ctx, command).await {
        tracing::debug!("Command failed: {}", err);
        let message = failure_message(&ctx, &err, signs_in);
        eprintln!("{} {}", "error:".red().bold(), message);
        ctx.dispose();
        std::process::exit(1);
    }

    ctx.dispose();
    Ok(())
}

async fn run(ctx: &TodoContext, command: Commands) -> todo_core::Result<()> {
    match command {
        Commands::Register { email, password } => commands::auth::register(ctx, &email, password).await,
        Commands::Login { email, password } => commands::auth::login(ctx, &email, password).await,
        Commands::Logout => commands::auth::logout(ctx).await,
        Commands::Whoami => commands::auth::whoami(ctx),
        Commands::List { completed, active } => commands::tasks::list(ctx, completed, active).await,
        Commands::Add {
            title,
            description,
            due,
        } => commands::tasks::add(ctx, title, description, due).await,
        Commands::Show { id } => commands::tasks::show(ctx, &id).await,
        Commands::Done { id } => commands::tasks::set_completed(ctx, &id, true).await,
        Commands::Undo { id } => commands::tasks::set_completed(ctx, &id, false).await,
        Commands::Toggle { id } => commands::tasks::toggle(ctx, &id).await,
        Commands::Edit {
            id,
            title,
            description,
            clear_description,
            due,
            clear_due,
        } => {
            let patch = commands::tasks::build_patch(title, description, clear_description, due, clear_due);
            commands::tasks::edit(ctx, &id, patch).await
        }
        Commands::Rm { id } => commands::tasks::remove(ctx, &id).await,
        Commands::Config { .. } => Ok(()),
    }
}

/// User-facing message for a failed command.
///
/// Sign-in failures were already recorded by the session controller; routing
/// them through `handle_error` would sign out whoever is currently signed in.
fn failure_message(ctx: &TodoContext, err: &TodoError, signs_in: bool) -> String {
    if signs_in {
        return ctx
            .session()
            .last_error()
            .unwrap_or_else(|| classify(err))
            .message;
    }
    ctx.session().handle_error(err).message
}

/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
