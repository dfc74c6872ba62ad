use super::TimesJobsSite;
use super::cleaner::{clean_text, collapse_whitespace, non_empty};
use super::http_client::ParsedBody;
use crate::models::{DetailFragment, RawSummaryItem, SalaryInfo};
use anyhow::{Result, bail};
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::HashSet;

// ── Lenient JSON accessors ────────────────────────────────────────────────────

/// First of `keys` holding a non-empty string or a number.
fn str_field(v: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match v.get(*k)? {
        Value::String(s) => non_empty(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// Strings, or arrays of strings, joined with `sep`.
fn list_field(v: &Value, keys: &[&str], sep: &str) -> Option<String> {
    keys.iter().find_map(|k| match v.get(*k)? {
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|i| i.as_str().and_then(non_empty))
                .collect();
            if parts.is_empty() { None } else { Some(parts.join(sep)) }
        }
        Value::String(s) => non_empty(s),
        _ => None,
    })
}

fn num_field(v: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| match v.get(*k)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    })
}

fn flag_field(v: &Value, keys: &[&str]) -> bool {
    keys.iter().any(|k| match v.get(*k) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => matches!(s.trim().to_lowercase().as_str(), "true" | "yes" | "1"),
        _ => false,
    })
}

fn count_field(v: &Value, keys: &[&str]) -> Option<usize> {
    num_field(v, keys).filter(|n| *n >= 0.0).map(|n| n as usize)
}

// ── Search API ────────────────────────────────────────────────────────────────

/// One page of search API results.
#[derive(Debug, Clone, Default)]
pub struct ApiPage {
    pub items: Vec<RawSummaryItem>,
    pub total: Option<usize>,
    pub page_size: Option<usize>,
}

pub fn parse_search_page(body: &ParsedBody, site: &TimesJobsSite) -> Result<ApiPage> {
    let Some(root) = body.as_json() else {
        bail!("search API returned markup instead of JSON");
    };

    let container = ["data", "result"]
        .iter()
        .find_map(|k| root.get(*k).filter(|v| v.is_object()))
        .unwrap_or(root);

    let jobs = if let Value::Array(items) = container {
        items.as_slice()
    } else {
        ["jobs", "jobDetails", "jobList", "results", "items"]
            .iter()
            .find_map(|k| container.get(*k).and_then(Value::as_array))
            .map(Vec::as_slice)
            .unwrap_or_default()
    };

    Ok(ApiPage {
        items: jobs.iter().map(|j| parse_api_job(j, site)).collect(),
        total: count_field(container, &["totalCount", "total", "totalJobs", "totalResults"]),
        page_size: count_field(container, &["pageSize", "size", "perPage"]),
    })
}

pub fn parse_api_job(job: &Value, site: &TimesJobsSite) -> RawSummaryItem {
    let id = str_field(job, &["jobId", "id", "jobid"]);
    let url = str_field(job, &["jobDetailUrl", "jdUrl", "url", "jobUrl"])
        .and_then(|href| site.absolute_url(&href, None))
        .or_else(|| id.as_deref().map(|id| site.job_url(id)));

    RawSummaryItem {
        title: str_field(job, &["title", "jobTitle", "designation"]),
        company: str_field(job, &["companyName", "company", "hiringCompany"]),
        experience: str_field(job, &["experience", "experienceText"]),
        experience_min: num_field(job, &["minExperience", "experienceFrom", "minExp"]),
        experience_max: num_field(job, &["maxExperience", "experienceTo", "maxExp"]),
        location: list_field(job, &["location", "locations", "jobLocation"], ", "),
        skills: list_field(job, &["skills", "keySkills", "keywords"], ", "),
        salary: SalaryInfo {
            min: num_field(job, &["minSalary", "salaryFrom", "lowSalary"]),
            max: num_field(job, &["maxSalary", "salaryTo", "highSalary"]),
            currency: str_field(job, &["currency", "salaryCurrency"]),
            best_in_industry: flag_field(job, &["isBestInIndustry", "bestInIndustry", "salaryBestInIndustry"]),
            hidden: flag_field(job, &["hideSalary", "isSalaryHidden", "salaryHidden"]),
            text: None,
        },
        job_type: list_field(job, &["jobType", "employmentType"], ", "),
        date_posted: str_field(job, &["postedDate", "datePosted", "postDate", "createdDate"]),
        description_html: str_field(job, &["description", "jobDescription", "jdHtml"]),
        id,
        url,
    }
}

/// Body of the id-keyed detail endpoint; may be wrapped in `data`/`job`.
pub fn parse_api_detail(body: &ParsedBody, site: &TimesJobsSite) -> Result<DetailFragment> {
    let Some(root) = body.as_json() else {
        bail!("detail API returned markup instead of JSON");
    };
    let job = ["data", "job", "jobDetail"]
        .iter()
        .find_map(|k| root.get(*k).filter(|v| v.is_object()))
        .unwrap_or(root);

    if !job.is_object() {
        bail!("detail API returned {} instead of an object", job);
    }

    Ok(DetailFragment::from(parse_api_job(job, site)))
}

// ── Listing markup ────────────────────────────────────────────────────────────

/// A job-detail link found on a listing page.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingLink {
    pub url: String,
    pub text: Option<String>,
}

/// Every href matching the site's job-detail convention, first occurrence wins.
pub fn extract_job_links(html: &str, page_url: &str, site: &TimesJobsSite) -> Vec<ListingLink> {
    let doc = Html::parse_document(html);
    let Ok(a_sel) = Selector::parse("a[href]") else { return vec![] };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for a in doc.select(&a_sel) {
        let Some(href) = a.value().attr("href") else { continue };
        let Some(url) = site.absolute_url(href, Some(page_url)) else { continue };
        if !site.is_detail_link(&url) || !seen.insert(url.clone()) {
            continue;
        }
        links.push(ListingLink {
            url,
            text: non_empty(&collapse_whitespace(&a.text().collect::<String>())),
        });
    }

    links
}

/// Material icon ligatures rendered as text inside listing cards.
const ICON_WORDS: [&str; 3] = ["card_travel", "location_on", "icons"];

fn card_text(el: ElementRef) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .filter(|w| !ICON_WORDS.iter().any(|i| w.eq_ignore_ascii_case(i)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn select_first<'a>(card: ElementRef<'a>, selectors: &str) -> Option<ElementRef<'a>> {
    let sel = Selector::parse(selectors).ok()?;
    let first = card.select(&sel).next();
    first
}

/// Last `ul li` in the card whose text satisfies `pred`.
fn card_list_item(card: ElementRef, pred: impl Fn(ElementRef, &str) -> bool) -> Option<String> {
    let sel = Selector::parse("ul li").ok()?;
    card.select(&sel)
        .filter(|li| pred(*li, &li.text().collect::<String>().to_lowercase()))
        .map(card_text)
        .filter(|t| !t.is_empty())
        .last()
}

fn parse_card(card: ElementRef, page_url: &str, site: &TimesJobsSite) -> Option<RawSummaryItem> {
    let anchor = select_first(card, "h2 a, h3 a, .job-title a, header h2 a")?;
    let url = site.absolute_url(anchor.value().attr("href")?, Some(page_url))?;

    let location_sel = Selector::parse(r#"[class*="location"]"#).ok()?;
    let skill_sel = Selector::parse(r#".srp-skills span, .srp-skills a, [class*="skills"] span, [class*="skills"] a"#).ok()?;
    let posted_sel = Selector::parse(r#".sim-posted span, [class*="posted"] span"#).ok()?;

    let mut skills: Vec<String> = Vec::new();
    for s in card.select(&skill_sel).map(card_text) {
        if !s.is_empty() && !skills.contains(&s) {
            skills.push(s);
        }
    }

    Some(RawSummaryItem {
        title: non_empty(&card_text(anchor)),
        company: select_first(card, r#"h3.joblist-comp-name, .comp-name, [class*="comp-name"]"#)
            .map(card_text)
            .and_then(|t| non_empty(&t)),
        experience: card_list_item(card, |_, t| {
            t.contains("experience") || t.contains("exp") || t.contains("yrs")
        }),
        location: card_list_item(card, |li, t| {
            t.contains("location") || t.contains("place") || li.select(&location_sel).next().is_some()
        }),
        skills: (!skills.is_empty()).then(|| skills.join(", ")),
        date_posted: card
            .select(&posted_sel)
            .map(card_text)
            .filter(|t| {
                let t = t.to_lowercase();
                ["posted", "ago", "days", "hours"].iter().any(|w| t.contains(w))
            })
            .last(),
        description_html: select_first(card, r#".list-job-dtl, .job-description, [class*="description"]"#)
            .map(|el| el.inner_html())
            .and_then(|h| non_empty(&h)),
        url: Some(url),
        ..Default::default()
    })
}

/// Structured `li.job-bx` cards on a search results page, first URL occurrence wins.
pub fn extract_listing_cards(html: &str, page_url: &str, site: &TimesJobsSite) -> Vec<RawSummaryItem> {
    let doc = Html::parse_document(html);
    let Ok(card_sel) = Selector::parse(r#"li[class*="job-bx"]"#) else { return vec![] };

    let mut seen = HashSet::new();
    doc.select(&card_sel)
        .filter_map(|card| parse_card(card, page_url, site))
        .filter(|item| item.url.as_ref().is_some_and(|u| seen.insert(u.clone())))
        .collect()
}

/// Link to listing page `current + 1`, via the `sequence=` query parameter.
pub fn find_next_page(html: &str, page_url: &str, current: u32, site: &TimesJobsSite) -> Option<String> {
    let doc = Html::parse_document(html);
    let sel = Selector::parse(r#"a[href*="sequence="]"#).ok()?;
    let wanted = (current + 1).to_string();

    doc.select(&sel)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| site.absolute_url(href, Some(page_url)))
        .find(|url| {
            url::Url::parse(url)
                .map(|u| u.query_pairs().any(|(k, v)| k == "sequence" && v == wanted.as_str()))
                .unwrap_or(false)
        })
}

// ── Detail markup: field extractors ───────────────────────────────────────────

/// One way of pulling job fields out of a parsed detail page.
pub trait FieldExtractor: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, doc: &Html) -> Option<DetailFragment>;
}

/// Embedded JSON-LD `JobPosting` block.
pub struct JsonLdExtractor;

/// Best-effort scraping of headings and description containers.
pub struct TextExtractor;

/// Extractors in priority order.
pub fn default_extractors() -> Vec<Box<dyn FieldExtractor>> {
    vec![Box::new(JsonLdExtractor), Box::new(TextExtractor)]
}

/// First extractor that finds anything wins.
pub fn extract_detail(html: &str, extractors: &[Box<dyn FieldExtractor>]) -> Option<(&'static str, DetailFragment)> {
    let doc = Html::parse_document(html);
    extractors
        .iter()
        .find_map(|ex| ex.extract(&doc).map(|fragment| (ex.name(), fragment)))
}

fn is_job_posting(v: &Value) -> bool {
    match v.get("@type") {
        Some(Value::String(t)) => t == "JobPosting",
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some("JobPosting")),
        _ => false,
    }
}

fn find_job_posting(v: &Value) -> Option<&Value> {
    if is_job_posting(v) {
        return Some(v);
    }
    match v {
        Value::Array(items) => items.iter().find_map(find_job_posting),
        Value::Object(_) => v
            .get("@graph")
            .and_then(Value::as_array)
            .and_then(|g| g.iter().find_map(find_job_posting)),
        _ => None,
    }
}

fn posting_location(posting: &Value) -> Option<String> {
    let place = |p: &Value| -> Option<String> {
        if let Some(s) = p.as_str() {
            return non_empty(s);
        }
        let address = p.get("address").unwrap_or(p);
        if let Some(s) = address.as_str() {
            return non_empty(s);
        }
        str_field(address, &["addressLocality", "addressRegion", "addressCountry", "name"])
    };

    match posting.get("jobLocation")? {
        Value::Array(places) => {
            let names: Vec<String> = places.iter().filter_map(place).collect();
            if names.is_empty() { None } else { Some(names.join(", ")) }
        }
        single => place(single),
    }
}

fn posting_salary(posting: &Value) -> SalaryInfo {
    let Some(base) = posting.get("baseSalary") else { return SalaryInfo::default() };
    let value = base.get("value").unwrap_or(base);
    let single = value.as_f64().or_else(|| num_field(value, &["value"]));

    SalaryInfo {
        min: num_field(value, &["minValue"]).or(single),
        max: num_field(value, &["maxValue"]),
        currency: str_field(base, &["currency"]).or_else(|| str_field(value, &["currency"])),
        ..Default::default()
    }
}

impl FieldExtractor for JsonLdExtractor {
    fn name(&self) -> &'static str {
        "json-ld"
    }

    fn extract(&self, doc: &Html) -> Option<DetailFragment> {
        let sel = Selector::parse(r#"script[type="application/ld+json"]"#).ok()?;

        let posting = doc
            .select(&sel)
            .filter_map(|el| serde_json::from_str::<Value>(el.inner_html().trim()).ok())
            .find_map(|v| find_job_posting(&v).cloned())?;

        let company = match posting.get("hiringOrganization") {
            Some(Value::String(s)) => non_empty(s),
            Some(org) => str_field(org, &["name"]),
            None => None,
        };
        let description_html = str_field(&posting, &["description"]);

        Some(DetailFragment {
            id: str_field(&posting, &["identifier"]).or_else(|| {
                posting
                    .get("identifier")
                    .and_then(|i| str_field(i, &["value"]))
            }),
            title: str_field(&posting, &["title", "name"]),
            company,
            experience: str_field(&posting, &["experienceRequirements"]),
            location: posting_location(&posting),
            skills: list_field(&posting, &["skills"], ", "),
            salary: posting_salary(&posting),
            job_type: list_field(&posting, &["employmentType"], ", "),
            date_posted: str_field(&posting, &["datePosted"]),
            url: str_field(&posting, &["url"]),
            description_text: description_html.as_deref().map(clean_text).filter(|t| !t.is_empty()),
            description_html,
            ..Default::default()
        })
    }
}

fn first_text(doc: &Html, selectors: &str) -> Option<String> {
    let sel = Selector::parse(selectors).ok()?;
    doc.select(&sel)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .find(|t| !t.is_empty())
}

/// Last element under `selectors` whose text mentions any of `needles`.
fn text_mentioning(doc: &Html, selectors: &str, needles: &[&str]) -> Option<String> {
    let sel = Selector::parse(selectors).ok()?;
    doc.select(&sel)
        .map(|el: ElementRef| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|t| {
            let lower = t.to_lowercase();
            !t.is_empty() && needles.iter().any(|n| lower.contains(n))
        })
        .last()
}

impl FieldExtractor for TextExtractor {
    fn name(&self) -> &'static str {
        "text"
    }

    fn extract(&self, doc: &Html) -> Option<DetailFragment> {
        let description_html = Selector::parse(r#".jd-desc, .job-description, [class*="job-desc"]"#)
            .ok()
            .and_then(|sel| doc.select(&sel).next())
            .map(|el| el.inner_html())
            .and_then(|h| non_empty(&h));

        let fragment = DetailFragment {
            title: first_text(doc, r#"h1, .jd-header-title, [class*="job-title"]"#),
            company: first_text(doc, r#".jd-header-comp-name, [class*="company-name"]"#),
            salary: SalaryInfo {
                text: text_mentioning(
                    doc,
                    r#"[class*="salary"], [class*="compensation"]"#,
                    &["lakh", "lpa", "₹", "inr"],
                ),
                ..Default::default()
            },
            job_type: text_mentioning(
                doc,
                r#"[class*="job-type"], [class*="employment"]"#,
                &["full", "part", "contract", "permanent"],
            ),
            description_text: description_html.as_deref().map(clean_text).filter(|t| !t.is_empty()),
            description_html,
            ..Default::default()
        };

        if fragment.is_empty() { None } else { Some(fragment) }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
