use std::net::SocketAddr;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use mentorlink::diagnostics::{self, UserRef};
use mentorlink::server::{self, SeedState};
use mentorlink::{seed, Backend};

#[derive(Parser, Debug)]
#[command(name = "mentorlink-admin", version)]
#[command(about = "Operator tooling for the Mentorlink backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log at debug level, including every backend request
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the super-admin account if it does not exist yet
    SeedSuperAdmin {
        /// Call the deployed seed function instead of seeding locally
        #[arg(long)]
        remote: bool,
    },
    /// Serve the seed function over HTTP
    Serve {
        #[arg(long, env = "SEED_FUNCTION_ADDR", default_value = "127.0.0.1:54330")]
        addr: SocketAddr,
    },
    /// Show profile, roles, onboarding state and dashboard access of a user
    Diagnose {
        /// User id or email
        user: UserRef,
    },
    /// Create profile rows for accounts that lack one
    RepairProfiles {
        /// Write the changes instead of only reporting them
        #[arg(long)]
        apply: bool,
    },
    /// Remove duplicate role rows of a user, keeping the oldest
    DedupeRoles {
        user: Uuid,
        #[arg(long)]
        apply: bool,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let default_filter = if cli.debug {
        "mentorlink=debug,mentorlink_auth=debug,mentorlink_postgrest=debug,mentorlink_functions=debug,tower_http=debug"
    } else {
        "mentorlink=info,tower_http=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let backend = Backend::from_env().context("Failed to configure the backend client")?;

    match cli.command {
        Commands::SeedSuperAdmin { remote: true } => {
            let outcome = seed::seed_remote(&backend)
                .await
                .context("The seed function failed")?;
            print_json(&outcome)?;
        }
        Commands::SeedSuperAdmin { remote: false } => {
            let seed = backend.config().super_admin.clone();
            let outcome = seed::seed_super_admin(&backend, &seed).await?;
            print_json(&outcome)?;
        }
        Commands::Serve { addr } => {
            server::serve(addr, SeedState::new(backend))
                .await
                .with_context(|| format!("Seed function server on {} failed", addr))?;
        }
        Commands::Diagnose { user } => {
            let diagnosis = diagnostics::diagnose_user(&backend, &user)
                .await
                .with_context(|| format!("Failed to diagnose {}", user))?;
            print_json(&diagnosis)?;
        }
        Commands::RepairProfiles { apply } => {
            let report = diagnostics::repair_missing_profiles(&backend, !apply).await?;
            print_json(&report)?;
        }
        Commands::DedupeRoles { user, apply } => {
            let report = diagnostics::dedupe_roles(&backend, user, !apply).await?;
            print_json(&report)?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {:#}", err);
        std::process::exit(1);
    }
}
