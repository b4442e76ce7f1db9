use anyhow::Result;
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use std::sync::Arc;

use linktrail::auth::{Identity, NoAuth};
use linktrail::config::Config;
use linktrail::service::ResolutionService;
use linktrail::storage;
use linktrail::store::LinkStore;

#[derive(Parser)]
#[command(name = "linktrail-admin")]
#[command(about = "linktrail link administration CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a short link
    Shorten {
        /// Absolute http(s) URL to redirect to
        url: String,
        /// User id recorded as the link owner
        #[arg(long)]
        owner: Option<String>,
    },
    /// Show a link without recording a visit
    Show {
        token: String,
    },
    /// Show the visit history of a link
    Analytics {
        token: String,
    },
    /// List links, newest first
    List {
        /// Only links owned by this user id
        #[arg(long)]
        owner: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// Permanently delete a link and its visits
    Delete {
        token: String,
    },
}

fn format_millis(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| millis.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage = storage::connect(&config.database, config.storage_timeout()).await?;

    // Ensure database is initialized
    storage.init().await?;

    let service = ResolutionService::new(
        LinkStore::from_config(storage, &config),
        Arc::new(NoAuth),
    );

    match cli.command {
        Commands::Shorten { url, owner } => {
            let identity = owner.map(Identity::User).unwrap_or(Identity::Anonymous);
            let link = service.shorten_as(&url, &identity).await?;
            println!("✓ {} -> {}", link.token, link.target_url);
        }
        Commands::Show { token } => {
            let link = service.lookup(&token).await?;
            println!("Token:   {}", link.token);
            println!("Target:  {}", link.target_url);
            println!("Owner:   {}", link.owner_id.as_deref().unwrap_or("-"));
            println!("Visits:  {}", link.visit_count);
            println!("Created: {}", format_millis(link.created_at));
            println!("Updated: {}", format_millis(link.updated_at));
        }
        Commands::Analytics { token } => {
            let analytics = service.analytics(&token).await?;
            println!("Token:   {}", analytics.token);
            println!("Target:  {}", analytics.target_url);
            println!("Created: {}", format_millis(analytics.created_at));
            println!("Visits:  {}", analytics.total_visits());
            for visit in &analytics.visit_log {
                println!("  {}", format_millis(visit.timestamp));
            }
        }
        Commands::List { owner, limit } => {
            let links = service.list(owner.as_deref(), limit.clamp(1, 1000), 0).await?;
            if links.is_empty() {
                println!("No links found.");
            } else {
                println!("{:<10} {:<8} {:<20} {}", "Token", "Visits", "Owner", "Target");
                println!("{}", "-".repeat(80));
                for link in links {
                    println!(
                        "{:<10} {:<8} {:<20} {}",
                        link.token,
                        link.visit_count,
                        link.owner_id.as_deref().unwrap_or("-"),
                        link.target_url
                    );
                }
            }
        }
        Commands::Delete { token } => {
            service.remove(&token).await?;
            println!("✓ Deleted '{}'", token);
        }
    }

    Ok(())
}
