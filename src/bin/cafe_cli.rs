use std::{str::FromStr, sync::Arc};

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{ArgAction, Args, Parser, Subcommand};
use sea_orm::Set;
use serde::Serialize;
use uuid::Uuid;

use cafe_api::{
    auth::{AuthConfig, AuthService, Role},
    config::{self, AppConfig},
    db::{self, DbPool},
    entities::user,
    repositories::UserRepository,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config().context("failed to load application config")?;
    config::init_tracing(&config.log_level, config.log_json);

    match cli.command {
        Commands::Migrate => {
            let pool = connect(&config).await?;
            db::run_migrations(&pool)
                .await
                .context("failed to run migrations")?;
            println!("Migrations applied");
        }
        Commands::CreateUser(args) => {
            let pool = connect(&config).await?;
            let created = create_user(Arc::new(pool), args).await?;
            if cli.json {
                print_json(&created)?;
            } else {
                println!(
                    "Created {} user {} (id {})",
                    created.role, created.email, created.id
                );
            }
        }
        Commands::IssueToken(args) => {
            let auth = AuthService::new(AuthConfig::from_app_config(&config));
            let token = auth
                .issue_token(args.user_id, args.email.clone(), args.role)
                .context("failed to issue token")?;
            if cli.json {
                print_json(&IssuedToken {
                    user_id: args.user_id,
                    role: args.role,
                    expires_in: config.jwt_expiration,
                    token,
                })?;
            } else {
                println!("{token}");
            }
        }
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "cafe-cli", about = "Cafe ordering admin tooling", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Create an account for a member, kiosk or staff
    CreateUser(CreateUserArgs),
    /// Mint an access token for an existing account
    IssueToken(IssueTokenArgs),
}

#[derive(Args)]
struct CreateUserArgs {
    #[arg(long)]
    email: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long, value_parser = parse_role, default_value = "member")]
    role: Role,
}

#[derive(Args)]
struct IssueTokenArgs {
    #[arg(long)]
    user_id: Uuid,
    #[arg(long)]
    email: Option<String>,
    #[arg(long, value_parser = parse_role)]
    role: Role,
}

#[derive(Serialize)]
struct CreatedUser {
    id: Uuid,
    email: String,
    full_name: String,
    role: Role,
}

#[derive(Serialize)]
struct IssuedToken {
    user_id: Uuid,
    role: Role,
    expires_in: usize,
    token: String,
}

fn parse_role(raw: &str) -> Result<Role, String> {
    Role::from_str(&raw.trim().to_lowercase())
        .map_err(|_| format!("unknown role '{raw}' (member, kiosk, barista, admin)"))
}

async fn connect(config: &AppConfig) -> Result<DbPool> {
    db::establish_connection_from_app_config(config)
        .await
        .context("failed to connect to database")
}

async fn create_user(db: Arc<DbPool>, args: CreateUserArgs) -> Result<CreatedUser> {
    let email = args.email.trim().to_lowercase();
    let full_name = args.name.trim().to_string();
    if !email.contains('@') {
        bail!("'{}' is not an email address", args.email);
    }
    if full_name.chars().count() < 2 {
        bail!("name must be at least 2 characters");
    }

    let users = UserRepository::new(db);
    if users.find_by_email(&email).await?.is_some() {
        bail!("a user with email {email} already exists");
    }

    let now = Utc::now();
    let model = users
        .create(user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email),
            full_name: Set(full_name),
            phone: Set(args.phone),
            role: Set(args.role),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .await?;

    Ok(CreatedUser {
        id: model.id,
        email: model.email,
        full_name: model.full_name,
        role: model.role,
    })
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
