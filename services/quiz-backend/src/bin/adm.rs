//! quiz-adm：运维命令行工具

use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use quiz_backend::migrations;
use quiz_backend::translation::{PostgresTranslationCache, TranslationCacheRepository};
use quiz_backend::usage::{PostgresUsageRepository, QuotaService, UsageStats, UsageTracker};
use quiz_backend::user::{NewUser, PostgresUserRepository, ROLE_ADMIN, UserService};
use quiz_bootstrap::{connect_database, init_runtime, run_migrations};
use quiz_common::UserId;
use quiz_config::AppConfig;
use quiz_errors::{AppError, AppResult};
use sqlx::PgPool;

/// Quiz backend administration
#[derive(Parser)]
#[command(name = "quiz-adm")]
#[command(about = "Administrative commands for the quiz backend")]
#[command(version)]
struct Cli {
    /// Configuration directory path
    #[arg(long, global = true, default_value = "config")]
    config_dir: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Translation cache maintenance
    #[command(subcommand)]
    Translation(TranslationCommand),

    /// User management
    #[command(subcommand)]
    User(UserCommand),

    /// Usage statistics
    #[command(subcommand)]
    Usage(UsageCommand),

    /// Apply pending database migrations
    Migrate,
}

#[derive(Subcommand)]
enum TranslationCommand {
    /// Delete expired cache entries
    Cleanup {
        /// Only report how many entries would be deleted
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum UserCommand {
    /// Create a user
    Create(CreateUserArgs),

    /// Set a new password for an existing user
    ResetPassword {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
    },
}

#[derive(Args)]
struct CreateUserArgs {
    #[arg(long)]
    username: String,
    #[arg(long)]
    password: String,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    language: Option<String>,
    #[arg(long)]
    level: Option<String>,
    /// Grant the admin role
    #[arg(long)]
    admin: bool,
}

#[derive(Subcommand)]
enum UsageCommand {
    /// Print usage statistics
    Show {
        #[arg(long)]
        service: Option<String>,
        #[arg(long, requires = "month")]
        year: Option<i32>,
        #[arg(long, requires = "year")]
        month: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config_dir)?;
    init_runtime(&config);
    let pool = connect_database(&config).await?;

    let result = match cli.command {
        Command::Translation(TranslationCommand::Cleanup { dry_run }) => {
            cleanup_cache(&pool, dry_run).await
        }
        Command::User(command) => user_command(&pool, command).await,
        Command::Usage(UsageCommand::Show {
            service,
            year,
            month,
        }) => show_usage(&pool, &config, service, year.zip(month)).await,
        Command::Migrate => {
            let report = run_migrations(&pool, &migrations::all()).await?;
            println!(
                "Applied {} migration(s), {} already applied",
                report.applied_count(),
                report.already_applied
            );
            Ok(())
        }
    };

    pool.close().await;
    result.map_err(Into::into)
}

async fn cleanup_cache(pool: &PgPool, dry_run: bool) -> AppResult<()> {
    let cache = PostgresTranslationCache::new(pool.clone());
    if dry_run {
        let count = cache.count_expired().await?;
        println!("{} expired translation cache entries would be deleted", count);
    } else {
        let deleted = cache.delete_expired().await?;
        println!("Deleted {} expired translation cache entries", deleted);
    }
    Ok(())
}

async fn user_command(pool: &PgPool, command: UserCommand) -> AppResult<()> {
    let users = UserService::new(Arc::new(PostgresUserRepository::new(pool.clone())));
    match command {
        UserCommand::Create(args) => {
            let user = users
                .create_user(NewUser {
                    username: args.username,
                    password: Some(args.password),
                    email: args.email,
                    timezone: None,
                    language: args.language,
                    level: args.level,
                })
                .await?;
            if args.admin {
                users.assign_role_by_name(UserId(user.id), ROLE_ADMIN).await?;
            }
            println!(
                "Created user {} (id {}){}",
                user.username,
                user.id,
                if args.admin { " with admin role" } else { "" }
            );
        }
        UserCommand::ResetPassword { username, password } => {
            let user = users
                .get_user_by_username(&username)
                .await?
                .ok_or_else(|| AppError::not_found(format!("user not found: {}", username)))?;
            users.update_password(UserId(user.id), &password).await?;
            println!("Password updated for {}", username);
        }
    }
    Ok(())
}

async fn show_usage(
    pool: &PgPool,
    config: &AppConfig,
    service: Option<String>,
    month: Option<(i32, u32)>,
) -> AppResult<()> {
    let tracker = QuotaService::new(
        Arc::new(PostgresUsageRepository::new(pool.clone())),
        config.translation.quota.clone(),
    );
    let rows = match (service.as_deref(), month) {
        (_, Some((year, month))) => {
            let rows = tracker.list_by_month(year, month).await?;
            match service.as_deref() {
                Some(name) => rows.into_iter().filter(|r| r.service_name == name).collect(),
                None => rows,
            }
        }
        (Some(name), None) => tracker.list_by_service(name).await?,
        (None, None) => tracker.list_all().await?,
    };
    print_usage(&tracker, &rows);
    Ok(())
}

fn print_usage(tracker: &dyn UsageTracker, rows: &[UsageStats]) {
    if rows.is_empty() {
        println!("No usage recorded");
        return;
    }
    println!(
        "{:<10} {:<16} {:<12} {:>14} {:>10} {:>12}",
        "MONTH", "SERVICE", "TYPE", "CHARACTERS", "REQUESTS", "QUOTA"
    );
    for row in rows {
        let quota = tracker.monthly_quota(&row.service_name);
        println!(
            "{:<10} {:<16} {:<12} {:>14} {:>10} {:>12}",
            row.usage_month.format("%Y-%m"),
            row.service_name,
            row.usage_type,
            row.characters_used,
            row.requests_made,
            if quota > 0 { quota.to_string() } else { "-".to_string() }
        );
    }
}
