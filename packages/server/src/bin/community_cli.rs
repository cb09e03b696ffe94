//! Operator CLI for the community platform.
//!
//! Runs migrations and the platform-level actions that have no other surface. Every command
//! prints a single JSON response.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use community_core::common::{
    Caller, CommunityId, GlobalRole, PageArgs, Permission, Permissions, Role, UserId,
};
use community_core::config::Config;
use community_core::domains::communities::actions::{
    add_member, assign_manager, create_community, revoke_manager, set_community_status,
};
use community_core::domains::communities::models::CommunityStatus;
use community_core::domains::identity::JwtIdentityProvider;
use community_core::domains::requests::actions::list_pending_for_community;
use community_core::kernel::{NatsNotificationBus, PgModerationStore, ServerDeps};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "community-cli")]
#[command(about = "Operator CLI for communities, managers and moderation queues")]
struct Cli {
    /// User id recorded as the actor of operator actions. Runs with super admin rights.
    #[arg(long, env = "OPERATOR_ID", global = true)]
    operator: Option<UserId>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,

    /// Create a community (starts pending)
    CreateCommunity {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },

    /// Open a community for submissions
    ActivateCommunity { community_id: CommunityId },

    /// Close a community to new submissions
    DeactivateCommunity { community_id: CommunityId },

    /// Add a user to a community's roster
    AddMember {
        community_id: CommunityId,
        user_id: UserId,
    },

    /// Grant manager permissions to a member
    AssignManager {
        community_id: CommunityId,
        user_id: UserId,
        /// Grant only these flags instead of all of them
        #[arg(long, value_delimiter = ',')]
        only: Vec<PermissionArg>,
    },

    /// Deactivate a manager grant
    RevokeManager {
        community_id: CommunityId,
        user_id: UserId,
    },

    /// Show everything waiting for a decision in a community
    ListPending {
        community_id: CommunityId,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Issue an access token (development)
    IssueToken {
        user_id: UserId,
        #[arg(long, value_enum, default_value = "user")]
        role: RoleArg,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum PermissionArg {
    ApproveJoinRequests,
    ManagePosts,
    ManageUsers,
    CreateEvents,
    ManageReports,
}

impl From<PermissionArg> for Permission {
    fn from(arg: PermissionArg) -> Self {
        match arg {
            PermissionArg::ApproveJoinRequests => Permission::ApproveJoinRequests,
            PermissionArg::ManagePosts => Permission::ManagePosts,
            PermissionArg::ManageUsers => Permission::ManageUsers,
            PermissionArg::CreateEvents => Permission::CreateEvents,
            PermissionArg::ManageReports => Permission::ManageReports,
        }
    }
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum RoleArg {
    User,
    Manager,
    Admin,
    SuperAdmin,
}

impl From<RoleArg> for GlobalRole {
    fn from(arg: RoleArg) -> Self {
        match arg {
            RoleArg::User => GlobalRole::User,
            RoleArg::Manager => GlobalRole::Manager,
            RoleArg::Admin => GlobalRole::Admin,
            RoleArg::SuperAdmin => GlobalRole::SuperAdmin,
        }
    }
}

// ============================================================================
// JSON Response Types
// ============================================================================

#[derive(Serialize)]
struct Response<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

fn output<T: Serialize>(data: T) -> Result<()> {
    let resp = Response {
        success: true,
        message: None,
        data: Some(data),
    };
    println!("{}", serde_json::to_string(&resp)?);
    Ok(())
}

fn output_error(message: String) {
    let resp: Response<()> = Response {
        success: false,
        message: Some(message),
        data: None,
    };
    match serde_json::to_string(&resp) {
        Ok(line) => println!("{}", line),
        Err(e) => eprintln!("failed to encode error response: {}", e),
    }
}

// ============================================================================
// Main
// ============================================================================

// Single-threaded so that notification tasks spawned by an action run before the final flush.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,community_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        output_error(format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env()?;
    let pool = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    if let Commands::Migrate = cli.command {
        return migrate(&pool).await;
    }

    let identity = Arc::new(JwtIdentityProvider::new(
        &config.jwt_secret,
        config.jwt_issuer.clone(),
    ));

    if let Commands::IssueToken { user_id, role } = cli.command {
        let token = identity.create_token(user_id, role.into())?;
        return output(serde_json::json!({ "user_id": user_id, "token": token }));
    }

    let bus = match &config.nats_url {
        Some(url) => Some(Arc::new(
            NatsNotificationBus::connect(url)
                .await
                .context("Failed to connect to NATS")?,
        )),
        None => None,
    };

    let deps = match &bus {
        Some(bus) => ServerDeps::builder()
            .store(Arc::new(PgModerationStore::new(pool.clone())))
            .identity(identity.clone())
            .notifications(bus.clone())
            .default_page_limit(config.default_page_limit)
            .build(),
        None => ServerDeps::builder()
            .store(Arc::new(PgModerationStore::new(pool.clone())))
            .identity(identity.clone())
            .default_page_limit(config.default_page_limit)
            .build(),
    };

    let operator = cli
        .operator
        .context("--operator (or OPERATOR_ID) is required for this command")?;
    let caller = Caller::new(operator, Role::SuperAdmin);

    execute(cli.command, &caller, &deps).await?;

    if let Some(bus) = bus {
        tokio::task::yield_now().await;
        bus.flush().await.context("Failed to flush notifications")?;
    }
    Ok(())
}

async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("migrations applied");
    output(serde_json::json!({ "migrated": true }))
}

async fn execute(command: Commands, caller: &Caller, deps: &ServerDeps) -> Result<()> {
    match command {
        Commands::Migrate | Commands::IssueToken { .. } => Ok(()),
        Commands::CreateCommunity { name, description } => {
            output(create_community(name, description, caller, deps).await?)
        }
        Commands::ActivateCommunity { community_id } => output(
            set_community_status(community_id, CommunityStatus::Active, caller, deps).await?,
        ),
        Commands::DeactivateCommunity { community_id } => output(
            set_community_status(community_id, CommunityStatus::Inactive, caller, deps).await?,
        ),
        Commands::AddMember {
            community_id,
            user_id,
        } => output(add_member(community_id, user_id, caller, deps).await?),
        Commands::AssignManager {
            community_id,
            user_id,
            only,
        } => {
            let permissions = (!only.is_empty()).then(|| {
                only.into_iter()
                    .fold(Permissions::none(), |acc, flag| acc.with(flag.into()))
            });
            output(assign_manager(community_id, user_id, permissions, caller, deps).await?)
        }
        Commands::RevokeManager {
            community_id,
            user_id,
        } => output(revoke_manager(community_id, user_id, caller, deps).await?),
        Commands::ListPending {
            community_id,
            page,
            limit,
        } => {
            let page = PageArgs { page, limit };
            output(list_pending_for_community(community_id, page, caller, deps).await?)
        }
    }
}
