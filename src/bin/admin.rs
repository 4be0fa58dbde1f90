//! CLI administration tool for pdns-sensor.
//!
//! Provides commands for checking candidate names, submitting domains by
//! hand and inspecting the dedup cache without running the sensor.
//!
//! # Usage
//!
//! ```bash
//! # Check names against the admission rules
//! cargo run --bin pdns-admin -- validate example.com localhost
//! tail -f /var/log/names.txt | cargo run --bin pdns-admin -- validate
//!
//! # Submit domains to the collector
//! cargo run --bin pdns-admin -- submit example.com example.org
//!
//! # Check the Redis dedup cache
//! cargo run --bin pdns-admin -- cache check
//! cargo run --bin pdns-admin -- cache lookup example.com
//! ```
//!
//! # Environment Variables
//!
//! - `API_URL`: Collector endpoint for `submit` (default: Domains Project)
//! - `MAX_BATCH_SIZE`: Domains per submitted batch (default: 1024)
//! - `REDIS_URL` (required for `cache` unless `REDIS_HOST` is set): Redis connection string
//! - `REDIS_HOST`, `REDIS_PORT`, `REDIS_PASSWORD`, `REDIS_DB`: Redis components,
//!   used the same way the sensor uses them

use pdns_sensor::config::Config;
use pdns_sensor::domain::submitter::{BatchSubmitter, DEFAULT_MAX_BATCH_SIZE, DEFAULT_SUBMIT_INTERVAL};
use pdns_sensor::infrastructure::cache::{DedupCache, RedisCache};
use pdns_sensor::infrastructure::delivery::{DEFAULT_API_URL, DomainsProjectClient};
use pdns_sensor::utils::domain_validator::is_valid_domain;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Confirm;
use std::io::BufRead;
use std::sync::Arc;

/// CLI tool for managing pdns-sensor.
#[derive(Parser)]
#[command(name = "pdns-admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Check names against the admission rules (reads stdin when none given)
    Validate {
        domains: Vec<String>,
    },

    /// Submit domains to the collector
    Submit {
        #[arg(required = true)]
        domains: Vec<String>,

        /// Collector endpoint (overrides API_URL)
        #[arg(long)]
        api_url: Option<String>,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Dedup cache operations
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

/// Dedup cache subcommands.
#[derive(Subcommand)]
enum CacheAction {
    /// Check Redis connection
    Check,

    /// Show whether a domain is inside its dedup window
    Lookup { domain: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { domains } => handle_validate(domains)?,
        Commands::Submit {
            domains,
            api_url,
            yes,
        } => handle_submit(domains, api_url, yes).await?,
        Commands::Cache { action } => handle_cache_action(action).await?,
    }

    Ok(())
}

/// Prints a verdict for each name, lowercased the way the queue sees it.
///
/// # Output Format
///
/// ```text
///   ✓ example.com
///   ✗ localhost
///
///   Valid: 1 / 2
/// ```
fn handle_validate(domains: Vec<String>) -> Result<()> {
    let domains = if domains.is_empty() {
        std::io::stdin()
            .lock()
            .lines()
            .collect::<std::io::Result<Vec<_>>>()
            .context("Failed to read names from stdin")?
    } else {
        domains
    };

    let mut valid = 0;
    let mut total = 0;
    for domain in domains.iter().map(|d| d.trim()).filter(|d| !d.is_empty()) {
        total += 1;
        let domain = domain.to_lowercase();
        if is_valid_domain(&domain) {
            valid += 1;
            println!("  {} {}", "✓".green(), domain.cyan());
        } else {
            println!("  {} {}", "✗".red(), domain.bright_black());
        }
    }

    println!();
    println!(
        "  Valid: {} / {}",
        valid.to_string().bright_green().bold(),
        total.to_string().bright_white()
    );

    Ok(())
}

/// Submits valid names to the collector in batches, after confirmation.
///
/// Names are lowercased and filtered with the admission rules first. The
/// dedup cache is not consulted.
async fn handle_submit(domains: Vec<String>, api_url: Option<String>, yes: bool) -> Result<()> {
    println!("{}", "📤 Submit Domains".bright_blue().bold());
    println!();

    let mut accepted: Vec<String> = Vec::new();
    for domain in domains.iter().map(|d| d.trim().to_lowercase()) {
        if !is_valid_domain(&domain) {
            println!("  {} {}", "skipping invalid".yellow(), domain.bright_black());
        } else if !accepted.contains(&domain) {
            accepted.push(domain);
        }
    }

    if accepted.is_empty() {
        println!("{}", "⚠️  Nothing to submit".yellow());
        return Ok(());
    }

    let api_url = api_url
        .or_else(|| std::env::var("API_URL").ok())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let max_batch_size = std::env::var("MAX_BATCH_SIZE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_BATCH_SIZE);

    println!("  Collector: {}", api_url.cyan());
    println!(
        "  Domains:   {}",
        accepted.len().to_string().bright_white().bold()
    );
    println!();

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt("Submit these domains?")
            .default(true)
            .interact()?;

        if !confirmed {
            println!("{}", "❌ Cancelled".red());
            return Ok(());
        }
    }

    let client = DomainsProjectClient::new(api_url).context("Failed to build HTTP client")?;
    let submitter = BatchSubmitter::new(Arc::new(client), DEFAULT_SUBMIT_INTERVAL, max_batch_size);
    let report = submitter.submit_batches(&accepted).await;

    println!();
    if report.failed_batches == 0 {
        println!(
            "{}",
            format!("✅ Submitted {} domains in {} batches", report.drained, report.batches)
                .green()
                .bold()
        );
    } else {
        anyhow::bail!(
            "{} of {} batches failed ({} domains not delivered)",
            report.failed_batches,
            report.batches,
            report.failed_domains
        );
    }
    println!();

    Ok(())
}

/// Dispatches dedup cache commands.
async fn handle_cache_action(action: CacheAction) -> Result<()> {
    let redis_url = Config::load_redis_url().context("REDIS_URL or REDIS_HOST must be set")?;
    let cache = RedisCache::connect(&redis_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to Redis: {}", e))?;

    match action {
        CacheAction::Check => {
            if cache.health_check().await {
                println!("{}", "✅ Redis connection OK".green().bold());
            } else {
                anyhow::bail!("Redis did not answer PING");
            }
        }
        CacheAction::Lookup { domain } => {
            let domain = domain.trim().to_lowercase();
            let entry = cache
                .get(&domain)
                .await
                .map_err(|e| anyhow::anyhow!("Cache error: {}", e))?;

            match entry {
                Some(_) => println!(
                    "  {} {}",
                    domain.cyan(),
                    "admitted within the dedup window".green()
                ),
                None => println!("  {} {}", domain.cyan(), "not in cache".bright_black()),
            }
        }
    }

    Ok(())
}
