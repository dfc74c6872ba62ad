use serde::Serialize;
use std::fmt;
use std::str::FromStr;

// ── Search criteria ───────────────────────────────────────────────────────────

/// Immutable input to one crawl run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchCriteria {
    pub keyword: Option<String>,
    pub location: Option<String>,
    pub experience_min: Option<u32>,
    pub experience_max: Option<u32>,
    pub function_area: Option<String>,
    /// `None` means unbounded: run until the pages or the API are exhausted.
    pub result_budget: Option<usize>,
    pub page_budget: u32,
}

// ── Salary ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SalaryInfo {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub currency: Option<String>,
    pub best_in_industry: bool,
    pub hidden: bool,
    /// Free-text salary scraped from markup ("3 - 6 Lakhs").
    pub text: Option<String>,
}

impl SalaryInfo {
    pub fn is_empty(&self) -> bool {
        self.min.is_none()
            && self.max.is_none()
            && self.text.is_none()
            && !self.best_in_industry
            && !self.hidden
    }
}

// ── Listing entry ─────────────────────────────────────────────────────────────

/// One entry from a listing page (API or HTML), before enrichment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSummaryItem {
    pub id: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub experience: Option<String>,
    pub experience_min: Option<f64>,
    pub experience_max: Option<f64>,
    pub location: Option<String>,
    /// Comma-delimited, as the source exposes it.
    pub skills: Option<String>,
    pub salary: SalaryInfo,
    pub job_type: Option<String>,
    pub date_posted: Option<String>,
    pub url: Option<String>,
    pub description_html: Option<String>,
}

// ── Enrichment output ─────────────────────────────────────────────────────────

/// Fields fetched for a single item. Present fields override the summary's.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailFragment {
    pub id: Option<String>,
    pub title: Option<String>,
    pub company: Option<String>,
    pub experience: Option<String>,
    pub experience_min: Option<f64>,
    pub experience_max: Option<f64>,
    pub location: Option<String>,
    pub skills: Option<String>,
    pub salary: SalaryInfo,
    pub job_type: Option<String>,
    pub date_posted: Option<String>,
    pub url: Option<String>,
    pub description_html: Option<String>,
    pub description_text: Option<String>,
}

impl DetailFragment {
    pub fn is_empty(&self) -> bool {
        *self == DetailFragment::default()
    }
}

impl From<RawSummaryItem> for DetailFragment {
    fn from(item: RawSummaryItem) -> Self {
        let description_text = item
            .description_html
            .as_deref()
            .map(crate::scraper::cleaner::clean_text)
            .filter(|t| !t.is_empty());

        Self {
            id: item.id,
            title: item.title,
            company: item.company,
            experience: item.experience,
            experience_min: item.experience_min,
            experience_max: item.experience_max,
            location: item.location,
            skills: item.skills,
            salary: item.salary,
            job_type: item.job_type,
            date_posted: item.date_posted,
            url: item.url,
            description_html: item.description_html,
            description_text,
        }
    }
}

// ── Canonical record ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum SourceTag {
    Api,
    HtmlFallback,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Api => "api",
            SourceTag::HtmlFallback => "html-fallback",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceTag {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "api" => Ok(SourceTag::Api),
            "html-fallback" => Ok(SourceTag::HtmlFallback),
            other => Err(anyhow::anyhow!("unknown source tag {:?}", other)),
        }
    }
}

/// The only entity persisted.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CanonicalRecord {
    pub title: Option<String>,
    pub company: Option<String>,
    pub experience: Option<String>,
    pub location: Option<String>,
    /// `None` = no skills listed.
    pub skills: Option<Vec<String>>,
    /// `None` = no salary disclosed.
    pub salary: Option<String>,
    pub job_type: Option<String>,
    pub date_posted: Option<String>,
    pub description_html: Option<String>,
    pub description_text: Option<String>,
    pub url: String,
    pub source: SourceTag,
    pub job_id: Option<String>,
}
