//! Acquisition orchestrator: search API first, HTML listing pages as fallback.
//!
//! ## Strategies
//!
//! 1. **API**: page through the search API. Each page's new items are enriched in
//!    batches, normalised and appended to the sink before the next page is requested.
//! 2. **HTML fallback**: entered only when the API strategy emitted nothing at all.
//!    Every seed listing page is scanned for job cards (summary fields included) and
//!    other job-detail links, which go through the same enrich → normalise → sink chain.
//!
//! Both strategies share one [`Deduplicator`] and one emitted-count, so the result
//! budget holds across them. Running out of pages before the budget is a normal end.

pub mod dedup;
pub mod pagination;

use crate::config::{AppConfig, seeds};
use crate::models::{DetailFragment, RawSummaryItem, SearchCriteria, SourceTag};
use crate::scraper::cleaner::normalize;
use crate::scraper::parsers::{extract_job_links, extract_listing_cards, find_next_page, parse_search_page};
use crate::scraper::{DetailEnricher, Failover, FetchRequest, HttpClient, TimesJobsSite, Transport};
use crate::storage::RecordSink;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub use self::dedup::{Deduplicator, identity_key};
pub use self::pagination::{PageReport, PaginationController, StopReason};

#[derive(Debug, Clone)]
pub struct HarvestOptions {
    pub collect_details: bool,
    pub concurrency: usize,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

#[derive(Debug, Default)]
pub struct HarvestStats {
    pub api_pages: u32,
    pub api_records: usize,
    pub api_stop: Option<StopReason>,
    pub fallback_entered: bool,
    pub fallback_pages: u32,
    pub fallback_records: usize,
}

impl HarvestStats {
    pub fn total(&self) -> usize {
        self.api_records + self.fallback_records
    }
}

/// Mutable state of one run. Only touched between batches.
struct RunState {
    dedup: Deduplicator,
    emitted: usize,
    budget: Option<usize>,
}

impl RunState {
    fn remaining(&self) -> Option<usize> {
        self.budget.map(|b| b.saturating_sub(self.emitted))
    }

    fn budget_reached(&self) -> bool {
        self.remaining() == Some(0)
    }
}

pub struct Harvester {
    criteria: SearchCriteria,
    seeds: Vec<String>,
    site: TimesJobsSite,
    failover: Failover,
    enricher: DetailEnricher,
    options: HarvestOptions,
}

impl Harvester {
    pub fn new(
        transport: Arc<dyn Transport>,
        site: TimesJobsSite,
        criteria: SearchCriteria,
        seeds: Vec<String>,
        options: HarvestOptions,
    ) -> Self {
        let failover = Failover::new(transport);
        Self {
            enricher: DetailEnricher::new(failover.clone(), site.clone()),
            failover,
            site,
            criteria,
            seeds,
            options,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let transport = HttpClient::new(&config.scraper).context("Failed to build HTTP client")?;
        if transport.has_proxy() {
            info!("Proxy configured; direct fallback on proxy/5xx failures");
        }
        let (criteria, seeds) = seeds::resolve(&config.search);

        Ok(Self::new(
            Arc::new(transport),
            TimesJobsSite::new(&config.scraper),
            criteria,
            seeds,
            HarvestOptions {
                collect_details: config.search.collect_details,
                concurrency: config.pipeline.concurrency,
                default_page_size: config.pipeline.default_page_size,
                max_page_size: config.pipeline.max_page_size,
            },
        ))
    }

    pub fn criteria(&self) -> &SearchCriteria {
        &self.criteria
    }

    /// Runs both strategies into `sink`. `stats` reflects what was written even when
    /// the run fails part-way.
    pub async fn run(&self, sink: &mut dyn RecordSink, stats: &mut HarvestStats) -> Result<()> {
        let mut state = RunState {
            dedup: Deduplicator::new(),
            emitted: 0,
            budget: self.criteria.result_budget,
        };

        info!("=== Strategy 1: search API ===");
        self.run_api(&mut state, stats, sink).await?;

        if state.emitted == 0 {
            info!("=== Strategy 2: HTML fallback ({} seed URLs) ===", self.seeds.len());
            stats.fallback_entered = true;
            self.run_html_fallback(&mut state, stats, sink).await?;
        }

        if stats.total() == 0 {
            warn!("No jobs found by either strategy");
        } else {
            info!(
                "Emitted {} jobs ({} api, {} html-fallback, {} distinct keys seen), budget {}",
                stats.total(),
                stats.api_records,
                stats.fallback_records,
                state.dedup.len(),
                self.criteria
                    .result_budget
                    .map(|b| b.to_string())
                    .unwrap_or_else(|| "unbounded".into()),
            );
        }

        Ok(())
    }

    // ── Strategy 1: API ───────────────────────────────────────────────────────

    async fn run_api(&self, state: &mut RunState, stats: &mut HarvestStats, sink: &mut dyn RecordSink) -> Result<()> {
        let mut pager = PaginationController::new(
            self.criteria.page_budget,
            self.options.default_page_size,
            self.options.max_page_size,
            state.budget,
        );

        loop {
            let Some(size) = pager.page_size(state.emitted) else {
                stats.api_stop = Some(StopReason::BudgetReached);
                break;
            };
            let page_no = pager.page();
            let request = self.site.search_request(&self.criteria, page_no, size);

            let page = match self.failover.attempt(&request).await {
                Ok(body) => parse_search_page(&body, &self.site),
                Err(e) => Err(e.into()),
            };
            stats.api_pages += 1;

            let page = match page {
                Ok(page) => page,
                Err(e) => {
                    warn!("API page {} failed, abandoning API strategy: {:#}", page_no, e);
                    stats.api_stop = pager.after_page(&PageReport::failed(), state.emitted);
                    break;
                }
            };

            let item_count = page.items.len();
            let fresh = self.claim_new(page.items, state);
            info!("API page {}: {} items, {} new", page_no, item_count, fresh.len());

            let report = PageReport {
                failed: false,
                items: item_count,
                new_items: fresh.len(),
                total: page.total,
                page_size: page.page_size,
            };

            self.emit(fresh, SourceTag::Api, state, sink, &mut stats.api_records).await?;

            if let Some(reason) = pager.after_page(&report, state.emitted) {
                debug!("API strategy stopped after page {}: {}", page_no, reason);
                stats.api_stop = Some(reason);
                break;
            }
        }

        Ok(())
    }

    // ── Strategy 2: HTML fallback ─────────────────────────────────────────────

    async fn run_html_fallback(
        &self,
        state: &mut RunState,
        stats: &mut HarvestStats,
        sink: &mut dyn RecordSink,
    ) -> Result<()> {
        for seed in &self.seeds {
            let mut page_url = seed.clone();
            let mut page_no = 1u32;

            loop {
                if state.budget_reached() {
                    return Ok(());
                }

                let html = match self.failover.attempt(&FetchRequest::get(&page_url)).await {
                    Ok(body) => body.into_text(),
                    Err(e) => {
                        warn!("Listing page {} failed: {}", page_url, e);
                        break;
                    }
                };
                stats.fallback_pages += 1;

                let items = listing_items(&html, &page_url, &self.site);
                let found = items.len();
                let fresh = self.claim_new(items, state);
                info!("Listing page {} of {}: {} jobs, {} new", page_no, seed, found, fresh.len());

                self.emit(fresh, SourceTag::HtmlFallback, state, sink, &mut stats.fallback_records)
                    .await?;

                if state.budget_reached() || page_no >= self.criteria.page_budget {
                    break;
                }
                match find_next_page(&html, &page_url, page_no, &self.site) {
                    Some(next) => {
                        page_url = next;
                        page_no += 1;
                    }
                    None => break,
                }
            }
        }

        Ok(())
    }

    // ── Shared steps ──────────────────────────────────────────────────────────

    /// Keep items whose identity key is unseen, up to the remaining budget.
    /// Items past the budget are left unclaimed.
    fn claim_new(&self, items: Vec<RawSummaryItem>, state: &mut RunState) -> Vec<RawSummaryItem> {
        let mut fresh = Vec::new();
        for item in items {
            if state.remaining().is_some_and(|r| fresh.len() >= r) {
                break;
            }
            let key = identity_key(item.id.as_deref(), item.url.as_deref(), item.title.as_deref());
            match key {
                Some(key) if state.dedup.is_new(&key) => fresh.push(item),
                Some(key) => debug!("Skipping duplicate {}", key),
                None => debug!("Skipping item without id, url or title"),
            }
        }
        fresh
    }

    /// Enrich in batches of `concurrency`, normalise, append. `written` grows per appended batch.
    async fn emit(
        &self,
        items: Vec<RawSummaryItem>,
        source: SourceTag,
        state: &mut RunState,
        sink: &mut dyn RecordSink,
        written: &mut usize,
    ) -> Result<()> {
        for batch in items.chunks(self.options.concurrency.max(1)) {
            let batch = match state.remaining() {
                Some(0) => break,
                Some(r) if r < batch.len() => &batch[..r],
                _ => batch,
            };

            let details = if self.options.collect_details {
                self.enricher.enrich_batch(batch).await
            } else {
                vec![DetailFragment::default(); batch.len()]
            };

            let records: Vec<_> = batch
                .iter()
                .zip(&details)
                .map(|(summary, detail)| normalize(summary, detail, source))
                .collect();

            sink.append(&records).context("Failed to append records")?;
            state.emitted += records.len();
            *written += records.len();

            for rec in &records {
                debug!("Saved {}: {}", source, rec.title.as_deref().unwrap_or(&rec.url));
            }
            info!(
                "Saved {} jobs ({}/{})",
                records.len(),
                state.emitted,
                state.budget.map(|b| b.to_string()).unwrap_or_else(|| "∞".into())
            );
        }

        Ok(())
    }
}

/// Job cards with their summary fields, then any other job-detail links on the page.
fn listing_items(html: &str, page_url: &str, site: &TimesJobsSite) -> Vec<RawSummaryItem> {
    let mut items = extract_listing_cards(html, page_url, site);
    let carded: HashSet<String> = items.iter().filter_map(|i| i.url.clone()).collect();

    items.extend(
        extract_job_links(html, page_url, site)
            .into_iter()
            .filter(|link| !carded.contains(&link.url))
            .map(|link| RawSummaryItem {
                url: Some(link.url),
                title: link.text,
                ..Default::default()
            }),
    );
    items
}

// ── Tests ─────────────────────────────────────────────────────────────────────
