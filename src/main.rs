mod config;
mod models;
mod pipeline;
mod scraper;
mod storage;
mod utils;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;
use crate::pipeline::{HarvestStats, Harvester};
use crate::storage::{Repository, RunSink, RunSummary};

#[derive(Parser)]
#[command(name = "timesjobs-harvester", about = "TimesJobs listing harvester", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Harvest jobs: search API first, listing pages as fallback
    Crawl(CrawlArgs),

    /// Write every stored job to a CSV file
    Export {
        #[arg(short, long, default_value = "data/jobs.csv")]
        out: PathBuf,
    },

    /// Show database statistics
    Stats,

    /// Apply schema migrations without crawling
    Migrate,
}

/// Overrides for the `[search]` / `[scraper]` configuration.
#[derive(Args)]
struct CrawlArgs {
    #[arg(long)]
    keyword: Option<String>,

    #[arg(long)]
    location: Option<String>,

    /// Experience range in years, e.g. "2-5"
    #[arg(long)]
    experience: Option<String>,

    #[arg(long)]
    function_area: Option<String>,

    /// Stop after this many jobs (default: unbounded)
    #[arg(long)]
    results: Option<usize>,

    #[arg(long)]
    max_pages: Option<u32>,

    /// Skip per-job detail fetches
    #[arg(long)]
    no_details: bool,

    /// Listing URL to start from (repeatable)
    #[arg(long = "start-url")]
    start_urls: Vec<String>,

    /// Proxy URL for outbound requests
    #[arg(long, env = "JOBS_PROXY_URL")]
    proxy: Option<String>,
}

impl CrawlArgs {
    fn apply(self, config: &mut AppConfig) {
        let search = &mut config.search;
        if self.keyword.is_some() {
            search.keyword = self.keyword;
        }
        if self.location.is_some() {
            search.location = self.location;
        }
        if let Some(exp) = self.experience {
            search.experience = Some(exp);
            search.experience_min = None;
            search.experience_max = None;
        }
        if self.function_area.is_some() {
            search.function_area = self.function_area;
        }
        if self.results.is_some() {
            search.results_wanted = self.results;
        }
        if let Some(pages) = self.max_pages {
            search.max_pages = pages;
        }
        if self.no_details {
            search.collect_details = false;
        }
        if !self.start_urls.is_empty() {
            search.start_urls = self.start_urls;
        }
        if self.proxy.is_some() {
            config.scraper.proxy_url = self.proxy;
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "timesjobs_harvester=info,warn",
        1 => "timesjobs_harvester=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let mut config = AppConfig::load()?;

    match cli.command {
        Command::Crawl(args) => {
            args.apply(&mut config);
            let _t = utils::Timer::start("Crawl");

            let repo = Repository::open(&config.storage.db_path)?;
            if config.storage.run_migrations {
                repo.run_migrations()?;
            }

            let harvester = Harvester::from_config(&config)?;
            info!("Criteria: {:?}", harvester.criteria());

            let run_id = repo.begin_scrape_run().context("Failed to start scrape run")?;
            let mut sink = RunSink::new(&repo, run_id);
            let mut stats = HarvestStats::default();
            let outcome = harvester.run(&mut sink, &mut stats).await;

            let summary = RunSummary {
                records_emitted: stats.total(),
                api_records: stats.api_records,
                fallback_records: stats.fallback_records,
                api_stop_reason: stats.api_stop.map(|r| r.to_string()),
                error: outcome.as_ref().err().map(|e| format!("{:#}", e)),
            };
            if let Err(e) = repo.finish_scrape_run(run_id, &summary) {
                warn!("Failed to record scrape run {}: {:#}", run_id, e);
            }

            outcome?;
            info!(
                "Done: {} jobs ({} api pages, {} listing pages)",
                stats.total(),
                stats.api_pages,
                stats.fallback_pages
            );
        }

        Command::Export { out } => {
            let repo = Repository::open(&config.storage.db_path)?;
            let jobs = repo.list_jobs()?;

            if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Could not create dir {:?}", parent))?;
            }
            let mut wtr = csv::Writer::from_path(&out)
                .with_context(|| format!("Failed to create {:?}", out))?;
            wtr.write_record([
                "job_id", "title", "company", "experience", "location", "skills", "salary",
                "job_type", "date_posted", "description_text", "url", "source",
            ])?;
            for job in &jobs {
                let skills = job.skills.as_ref().map(|s| s.join(", ")).unwrap_or_default();
                wtr.write_record([
                    job.job_id.as_deref().unwrap_or(""),
                    job.title.as_deref().unwrap_or(""),
                    job.company.as_deref().unwrap_or(""),
                    job.experience.as_deref().unwrap_or(""),
                    job.location.as_deref().unwrap_or(""),
                    skills.as_str(),
                    job.salary.as_deref().unwrap_or(""),
                    job.job_type.as_deref().unwrap_or(""),
                    job.date_posted.as_deref().unwrap_or(""),
                    job.description_text.as_deref().unwrap_or(""),
                    job.url.as_str(),
                    job.source.as_str(),
                ])?;
            }
            wtr.flush()?;
            info!("Exported {} jobs to {:?}", jobs.len(), out);
        }

        Command::Stats => {
            let repo = Repository::open(&config.storage.db_path)?;
            let jobs = repo.job_count()?;
            let runs = repo.run_count()?;
            println!("─────────────────────────────────");
            println!("  TimesJobs harvester: stats");
            println!("─────────────────────────────────");
            println!("  Jobs     : {}", utils::fmt_number(jobs));
            println!("  Runs     : {}", utils::fmt_number(runs));
            for (source, n) in repo.count_by_source()? {
                println!("  {:<9}: {}", source, utils::fmt_number(n));
            }
            println!("─────────────────────────────────");
        }

        Command::Migrate => {
            Repository::open(&config.storage.db_path)?.run_migrations()?;
            println!("Migrations applied.");
        }
    }

    Ok(())
}
