//! Seed URLs ↔ search criteria.
//!
//! Explicit configuration always wins; missing fields are back-filled from the
//! first seed URL that carries the matching query parameter.

use super::SearchConfig;
use crate::models::SearchCriteria;
use url::Url;

pub const SEARCH_PAGE_URL: &str = "https://www.timesjobs.com/candidate/job-search.html";

const KEYWORD_PARAM: &str = "txtKeywords";
const LOCATION_PARAM: &str = "txtLocation";
const FUNCTION_AREA_PARAM: &str = "cboPresFuncArea";
const EXP_MIN_PARAM: &str = "cboWorkExp1";
const EXP_MAX_PARAM: &str = "cboWorkExp2";

/// "2-5" → (2, 5) | "3" → (3, None) | "-4" → (None, 4)
pub fn parse_experience_range(s: &str) -> (Option<u32>, Option<u32>) {
    let mut parts = s.splitn(2, '-').map(|p| p.trim().parse::<u32>().ok());
    let min = parts.next().flatten();
    let max = parts.next().flatten();
    (min, max)
}

fn clean(s: &Option<String>) -> Option<String> {
    s.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Search page URL using the site's query-parameter conventions.
pub fn build_search_url(criteria: &SearchCriteria) -> String {
    let mut q = url::form_urlencoded::Serializer::new(String::new());
    if let Some(kw) = &criteria.keyword {
        q.append_pair("searchType", "personalizedSearch");
        q.append_pair("from", "submit");
        q.append_pair(KEYWORD_PARAM, kw);
    }
    if let Some(loc) = &criteria.location {
        q.append_pair(LOCATION_PARAM, loc);
    }
    if let Some(min) = criteria.experience_min {
        q.append_pair(EXP_MIN_PARAM, &min.to_string());
    }
    if let Some(max) = criteria.experience_max {
        q.append_pair(EXP_MAX_PARAM, &max.to_string());
    }

    let query = q.finish();
    if query.is_empty() {
        SEARCH_PAGE_URL.to_string()
    } else {
        format!("{}?{}", SEARCH_PAGE_URL, query)
    }
}

fn seed_param(seeds: &[Url], name: &str) -> Option<String> {
    seeds.iter().find_map(|u| {
        u.query_pairs()
            .find(|(k, v)| k == name && !v.trim().is_empty())
            .map(|(_, v)| v.trim().to_string())
    })
}

/// Resolve the run's criteria and the seed URLs to start the HTML path from.
pub fn resolve(search: &SearchConfig) -> (SearchCriteria, Vec<String>) {
    let seeds: Vec<String> = search
        .start_urls
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    let parsed: Vec<Url> = seeds.iter().filter_map(|s| Url::parse(s).ok()).collect();

    let (range_min, range_max) = search
        .experience
        .as_deref()
        .map(parse_experience_range)
        .unwrap_or((None, None));

    let criteria = SearchCriteria {
        keyword: clean(&search.keyword).or_else(|| seed_param(&parsed, KEYWORD_PARAM)),
        location: clean(&search.location).or_else(|| seed_param(&parsed, LOCATION_PARAM)),
        experience_min: search
            .experience_min
            .or(range_min)
            .or_else(|| seed_param(&parsed, EXP_MIN_PARAM).and_then(|v| v.parse().ok())),
        experience_max: search
            .experience_max
            .or(range_max)
            .or_else(|| seed_param(&parsed, EXP_MAX_PARAM).and_then(|v| v.parse().ok())),
        function_area: clean(&search.function_area).or_else(|| seed_param(&parsed, FUNCTION_AREA_PARAM)),
        result_budget: search.results_wanted.map(|n| n.max(1)),
        page_budget: search.max_pages.max(1),
    };

    let seeds = if seeds.is_empty() {
        vec![build_search_url(&criteria)]
    } else {
        seeds
    };

    (criteria, seeds)
}
