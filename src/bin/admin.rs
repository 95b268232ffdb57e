//! CLI administration tool for the ad click pipeline.
//!
//! Runs the maintenance operations of the service by hand, against the same
//! backends the server uses, without going through the HTTP API.
//!
//! # Usage
//!
//! ```bash
//! # Recompute the aggregate cache from the durable store
//! cargo run --bin admin -- rebuild
//! cargo run --bin admin -- rebuild --ad-id 42
//!
//! # Write cache counters into metadata_ads once, right now
//! cargo run --bin admin -- flush
//!
//! # List ads and their persisted counters
//! cargo run --bin admin -- ads list
//! cargo run --bin admin -- ads show 42
//!
//! # Check database connection
//! cargo run --bin admin -- db check
//! ```
//!
//! # Environment Variables
//!
//! Same as the server: `DATABASE_URL` and `REDIS_URL` are required.

use ad_click_pipeline::application::services::{AdService, RebuildReport, RebuildService};
use ad_click_pipeline::config::{self, Config};
use ad_click_pipeline::domain::flush_scheduler::FlushScheduler;
use ad_click_pipeline::domain::sync_state::SyncTracker;
use ad_click_pipeline::infrastructure::cache::RedisCache;
use ad_click_pipeline::infrastructure::persistence::{PgAdRepository, PgStatsRepository};
use ad_click_pipeline::{server, telemetry};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Confirm;
use sqlx::PgPool;
use std::sync::Arc;

/// CLI tool for operating the ad click pipeline.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Recompute aggregate cache records from ads_clicks
    Rebuild {
        /// Only rebuild this ad
        #[arg(long)]
        ad_id: Option<i64>,
    },

    /// Run one flush of cache counters into metadata_ads
    Flush {
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Inspect ads
    Ads {
        #[command(subcommand)]
        action: AdsAction,
    },

    /// Database operations
    Db {
        #[command(subcommand)]
        action: DbAction,
    },
}

#[derive(Subcommand)]
enum AdsAction {
    /// List all ads with their persisted click counters
    List,

    /// Show one ad
    Show {
        /// Ad id
        id: i64,
    },
}

/// Database operation subcommands.
#[derive(Subcommand)]
enum DbAction {
    /// Check database connection
    Check,

    /// Show database info
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = config::load_from_env()?;
    telemetry::init_tracing("warn", &config.log_format);

    let pool = server::connect_database(&config).await?;

    match cli.command {
        Commands::Rebuild { ad_id } => handle_rebuild(&config, &pool, ad_id).await?,
        Commands::Flush { yes } => handle_flush(&config, &pool, yes).await?,
        Commands::Ads { action } => handle_ads_action(action, &config, &pool).await?,
        Commands::Db { action } => handle_db_action(action, &pool).await?,
    }

    pool.close().await;
    Ok(())
}

async fn connect_cache(config: &Config) -> Result<RedisCache> {
    RedisCache::connect(&config.redis_url, config.cache_timeout())
        .await
        .context("Failed to connect to aggregate cache")
}

/// Recomputes `ad-<id>` and `time-<id>` records from the durable store.
///
/// Cache values are overwritten, so any clicks still only in the cache are
/// replaced by the store's count.
async fn handle_rebuild(config: &Config, pool: &PgPool, ad_id: Option<i64>) -> Result<()> {
    println!("{}", "🔄 Rebuilding aggregate cache".bright_blue().bold());
    println!();

    let cache = connect_cache(config).await?;
    let stats = PgStatsRepository::new(Arc::new(pool.clone()), config.store_timeout());
    let service = RebuildService::new(
        Arc::new(stats),
        Arc::new(cache),
        Arc::new(SyncTracker::new()),
    );

    let report = match ad_id {
        Some(id) => service.rebuild_ad(id).await,
        None => service.rebuild_all().await,
    }
    .map_err(|e| anyhow::anyhow!("Rebuild failed: {}", e))?;

    print_rebuild_report(&report);
    Ok(())
}

fn print_rebuild_report(report: &RebuildReport) {
    println!("  Rows:    {}", report.rows.to_string().bright_white().bold());
    println!(
        "  Written: {}",
        report.written.to_string().bright_green().bold()
    );
    if report.failed > 0 {
        println!("  Failed:  {}", report.failed.to_string().red().bold());
    }
    println!();

    if report.rows == 0 {
        println!("{}", "⚠️  No ad has a complete click row yet".yellow());
    } else if report.failed == 0 {
        println!("{}", "✅ Rebuild complete".green().bold());
    } else {
        println!("{}", "⚠️  Rebuild finished with failures".yellow().bold());
    }
    println!();
}

/// Runs a single flush tick with a confirmation prompt.
///
/// The running server flushes on its own schedule; this is for forcing a
/// write-back before maintenance.
async fn handle_flush(config: &Config, pool: &PgPool, skip_confirm: bool) -> Result<()> {
    println!("{}", "💾 Flush cache counters".bright_blue().bold());
    println!();
    println!("  Policy: {}", format!("{:?}", config.flush_policy).cyan());
    println!();

    if !skip_confirm {
        let confirmed = Confirm::new()
            .with_prompt("Write cache counters into metadata_ads?")
            .default(false)
            .interact()?;

        if !confirmed {
            println!("{}", "❌ Cancelled".red());
            return Ok(());
        }
    }

    let cache = connect_cache(config).await?;
    let ads = PgAdRepository::new(Arc::new(pool.clone()), config.store_timeout());
    let scheduler = FlushScheduler::new(
        Arc::new(cache),
        Arc::new(ads),
        Arc::new(SyncTracker::new()),
        config.flush_policy,
        config.flush_tick_timeout(),
    );

    let report = scheduler.tick().await;

    println!();
    println!("  Scanned:    {}", report.scanned.to_string().bright_white());
    println!(
        "  Reconciled: {}",
        report.reconciled.to_string().bright_green().bold()
    );
    println!("  Empty:      {}", report.empty.to_string().bright_black());
    if report.conflicts > 0 {
        println!("  Conflicts:  {}", report.conflicts.to_string().yellow());
    }
    if report.failed > 0 {
        println!("  Failed:     {}", report.failed.to_string().red().bold());
    }
    println!();

    if report.timed_out {
        println!(
            "{}",
            "⚠️  Flush hit its time limit before every key was processed".yellow()
        );
    } else if report.failed == 0 {
        println!("{}", "✅ Flush complete".green().bold());
    }
    println!();

    Ok(())
}

/// Lists ads with their persisted counters.
///
/// # Output Format
///
/// ```text
/// 📋 Ads
///
///   ID     Clicks     Target
///   ──────────────────────────────────────────────────────────
///   1      120        https://example.com/landing
/// ```
async fn handle_ads_action(action: AdsAction, config: &Config, pool: &PgPool) -> Result<()> {
    let repo = PgAdRepository::new(Arc::new(pool.clone()), config.store_timeout());
    let service = AdService::new(Arc::new(repo));

    match action {
        AdsAction::List => {
            println!("{}", "📋 Ads".bright_blue().bold());
            println!();

            let ads = service
                .list_ads()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to list ads: {}", e))?;

            if ads.is_empty() {
                println!("{}", "  No ads found".yellow());
                return Ok(());
            }

            println!(
                "  {:<6} {:<10} {}",
                "ID".bright_white().bold(),
                "Clicks".bright_white().bold(),
                "Target".bright_white().bold()
            );
            println!("  {}", "─".repeat(60).bright_black());

            for ad in &ads {
                println!(
                    "  {:<6} {:<10} {}",
                    ad.id.to_string().bright_black(),
                    ad.clicks.to_string().bright_green(),
                    ad.target_url.cyan()
                );
            }

            println!();
            println!("  Total: {}", ads.len().to_string().bright_white().bold());
            println!();
        }
        AdsAction::Show { id } => {
            let ad = service
                .get_ad(id)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to load ad {}: {}", id, e))?;

            println!("{}", format!("📄 Ad {}", ad.id).bright_blue().bold());
            println!();
            println!("  Image:  {}", ad.image_url.cyan());
            println!("  Target: {}", ad.target_url.cyan());
            println!("  Clicks: {}", ad.clicks.to_string().bright_green().bold());
            println!();
        }
    }

    Ok(())
}

/// Handles database diagnostic commands.
async fn handle_db_action(action: DbAction, pool: &PgPool) -> Result<()> {
    match action {
        DbAction::Check => {
            println!("{}", "🔍 Checking database connection...".bright_blue());

            sqlx::query("SELECT 1").fetch_one(pool).await?;

            println!("{}", "✅ Database connection OK".green().bold());
        }
        DbAction::Info => {
            println!("{}", "ℹ️  Database Information".bright_blue().bold());
            println!();

            let version: String = sqlx::query_scalar("SELECT version()")
                .fetch_one(pool)
                .await?;
            let clicks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM ads_clicks")
                .fetch_one(pool)
                .await?;
            let ads: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM metadata_ads")
                .fetch_one(pool)
                .await?;

            println!("  PostgreSQL:  {}", version.bright_white());
            println!("  Ads:         {}", ads.to_string().bright_green().bold());
            println!("  Click rows:  {}", clicks.to_string().bright_green().bold());
            println!();
        }
    }

    Ok(())
}
