mod config;
mod graphql;
mod http;
mod scheduler;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use migration::{Migrator, MigratorTrait};
use platform_db::{DatabaseSettings, DbPool, connect};
use platform_obs::{ObsConfig, init_tracing};
use products_deals::{DbNotifier, DealIntake, GmailClient, OpenAiClient};
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    graphql::GraphqlData,
    http::{AppState, ServeConfig},
};

#[derive(Parser, Debug)]
#[command(name = "dealdesk", version, about = "Email-driven deal intake")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP + GraphQL server.
    Serve(ServeCommand),
    /// Run database migrations.
    #[command(subcommand)]
    Migrate(MigrateCommand),
    /// Run a single intake pass over a mail folder and print the counters.
    Intake {
        #[arg(long, help = "Folder (label) to scan; defaults to DEAL_INTAKE_FOLDER")]
        folder: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum MigrateCommand {
    /// Apply pending migrations.
    Up,
    /// Rollback the most recent migration.
    Down,
}

#[derive(Args, Debug)]
struct ServeCommand {
    #[arg(long, default_value = "0.0.0.0")]
    host: std::net::IpAddr,
    #[arg(long, default_value_t = 8080)]
    port: u16,
    #[arg(long, help = "Allow starting even when migrations are pending")]
    allow_dirty: bool,
    #[arg(long, value_name = "SECS", help = "Scan the intake folder on this period")]
    intake_interval_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing(ObsConfig::default())?;
    let cli = Cli::parse();
    let app_config = Arc::new(AppConfig::load()?);
    match cli.command {
        Command::Serve(cmd) => run_server(cmd, app_config).await,
        Command::Migrate(action) => match action {
            MigrateCommand::Up => migrate_up().await,
            MigrateCommand::Down => migrate_down().await,
        },
        Command::Intake { folder } => run_intake_once(folder, &app_config).await,
    }
}

async fn setup_pool() -> Result<DbPool> {
    let settings = DatabaseSettings::from_env();
    connect(&settings).await.map_err(Into::into)
}

fn build_intake(pool: &DbPool, config: &AppConfig) -> Result<DealIntake> {
    let (llm_config, gmail_config) = config.intake_collaborators()?;
    let llm = OpenAiClient::new(llm_config).context("failed to build LLM client")?;
    let mail = GmailClient::new(gmail_config).context("failed to build mail client")?;
    let notifier = DbNotifier::new(pool.clone());
    Ok(DealIntake::new(
        pool.clone(),
        Arc::new(mail),
        Arc::new(llm),
        Arc::new(notifier),
    ))
}

async fn run_server(cmd: ServeCommand, config: Arc<AppConfig>) -> Result<()> {
    let pool = setup_pool().await?;
    ensure_migrations(&pool, cmd.allow_dirty).await?;

    let intake = match build_intake(&pool, &config) {
        Ok(intake) => Some(Arc::new(intake)),
        Err(err) => {
            warn!(error = %err, "serving without deal intake");
            None
        }
    };

    if let (Some(secs), Some(intake)) = (cmd.intake_interval_secs, intake.clone()) {
        tokio::spawn(scheduler::run_scheduled_intake(
            intake,
            config.intake_folder.clone(),
            Duration::from_secs(secs.max(1)),
        ));
    }

    let schema = graphql::build_schema(GraphqlData {
        pool: pool.clone(),
        intake,
        default_folder: config.intake_folder.clone(),
    });
    let state = AppState {
        pool,
        schema,
        config,
    };
    http::serve(ServeConfig::new(cmd.host, cmd.port), state).await
}

async fn run_intake_once(folder: Option<String>, config: &AppConfig) -> Result<()> {
    let pool = setup_pool().await?;
    ensure_migrations(&pool, false).await?;
    let intake = build_intake(&pool, config)?;
    let folder = folder.unwrap_or_else(|| config.intake_folder.clone());
    let stats = intake
        .process_email_folder(&folder)
        .await
        .with_context(|| format!("intake pass over {folder} failed"))?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

async fn ensure_migrations(pool: &DbPool, allow_dirty: bool) -> Result<()> {
    let pending = Migrator::get_pending_migrations(pool).await?;
    if !pending.is_empty() && !allow_dirty {
        anyhow::bail!(
            "pending migrations detected; run `dealdesk migrate up` or pass --allow-dirty"
        );
    }
    Ok(())
}

async fn migrate_up() -> Result<()> {
    let pool = setup_pool().await?;
    Migrator::up(&pool, None).await?;
    info!("database migrations applied");
    Ok(())
}

async fn migrate_down() -> Result<()> {
    let pool = setup_pool().await?;
    Migrator::down(&pool, Some(1)).await?;
    info!("most recent migration rolled back");
    Ok(())
}
