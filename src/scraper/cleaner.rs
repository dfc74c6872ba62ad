//! Normalisation: summary item + detail fragment → canonical record.

use crate::models::{CanonicalRecord, DetailFragment, RawSummaryItem, SalaryInfo, SourceTag};
use scraper::Html;

pub const BEST_IN_INDUSTRY: &str = "Best in Industry";
pub const SALARY_NOT_DISCLOSED: &str = "Not Disclosed";

const NATIVE_CURRENCY: &str = "INR";
const LAKH: f64 = 100_000.0;

const SKILL_MIN_CHARS: usize = 1;
const SKILL_MAX_CHARS: usize = 80;

/// Elements whose content never contributes to description text.
const NON_TEXT_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "iframe"];

// ── Text ──────────────────────────────────────────────────────────────────────

/// Plain-text projection of a description fragment.
/// Drops script/style/noscript/iframe content, then collapses whitespace.
pub fn clean_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let mut raw = String::new();

    for node in fragment.tree.root().descendants() {
        let Some(text) = node.value().as_text() else { continue };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|el| NON_TEXT_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            raw.push_str(text);
        }
    }

    collapse_whitespace(&raw)
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trimmed, non-empty, or `None`.
pub fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() { None } else { Some(s.to_string()) }
}

// ── Field formatters ──────────────────────────────────────────────────────────

/// 500000 INR → "5.00 LPA" | 90000 USD → "0.90 USD"
fn format_salary_bound(amount: f64, unit: &str) -> String {
    format!("{:.2} {}", amount / LAKH, unit)
}

pub fn format_salary(salary: &SalaryInfo) -> Option<String> {
    if salary.best_in_industry {
        return Some(BEST_IN_INDUSTRY.to_string());
    }
    if salary.hidden {
        return Some(SALARY_NOT_DISCLOSED.to_string());
    }

    let unit = match salary.currency.as_deref().map(str::trim) {
        None | Some("") => "LPA".to_string(),
        Some(c) if c.eq_ignore_ascii_case(NATIVE_CURRENCY) => "LPA".to_string(),
        Some(c) => c.to_uppercase(),
    };

    match (salary.min, salary.max) {
        (Some(lo), Some(hi)) => Some(format!(
            "{} - {}",
            format_salary_bound(lo, &unit),
            format_salary_bound(hi, &unit)
        )),
        (Some(v), None) | (None, Some(v)) => Some(format_salary_bound(v, &unit)),
        (None, None) => salary.text.as_deref().and_then(non_empty),
    }
}

fn format_years(v: Option<f64>) -> String {
    match v {
        Some(v) => v.to_string(),
        None => "?".to_string(),
    }
}

/// (2, 5) → "2 - 5 Yrs" | (None, 3) → "? - 3 Yrs" | free text passes through.
pub fn format_experience(min: Option<f64>, max: Option<f64>, text: Option<&str>) -> Option<String> {
    if min.is_none() && max.is_none() {
        return text.map(str::to_string);
    }
    Some(format!("{} - {} Yrs", format_years(min), format_years(max)))
}

pub fn parse_skills(s: &str) -> Option<Vec<String>> {
    let skills: Vec<String> = s
        .split(',')
        .map(str::trim)
        .filter(|skill| {
            let n = skill.chars().count();
            (SKILL_MIN_CHARS..=SKILL_MAX_CHARS).contains(&n)
        })
        .map(str::to_string)
        .collect();

    if skills.is_empty() { None } else { Some(skills) }
}

// ── Summary + detail → CanonicalRecord ────────────────────────────────────────

fn prefer(detail: &Option<String>, summary: &Option<String>) -> Option<String> {
    detail
        .as_deref()
        .and_then(non_empty)
        .or_else(|| summary.as_deref().and_then(non_empty))
}

pub fn normalize(summary: &RawSummaryItem, detail: &DetailFragment, source: SourceTag) -> CanonicalRecord {
    let (exp_min, exp_max) = if detail.experience_min.is_some() || detail.experience_max.is_some() {
        (detail.experience_min, detail.experience_max)
    } else {
        (summary.experience_min, summary.experience_max)
    };
    let experience_text = prefer(&detail.experience, &summary.experience);

    let salary = if detail.salary.is_empty() { &summary.salary } else { &detail.salary };

    let description_html = prefer(&detail.description_html, &summary.description_html);
    let description_text = description_html
        .as_deref()
        .map(clean_text)
        .filter(|t| !t.is_empty());

    CanonicalRecord {
        title: prefer(&detail.title, &summary.title),
        company: prefer(&detail.company, &summary.company),
        experience: format_experience(exp_min, exp_max, experience_text.as_deref()),
        location: prefer(&detail.location, &summary.location),
        skills: prefer(&detail.skills, &summary.skills)
            .as_deref()
            .and_then(parse_skills),
        salary: format_salary(salary),
        job_type: prefer(&detail.job_type, &summary.job_type),
        date_posted: prefer(&detail.date_posted, &summary.date_posted),
        description_html,
        description_text,
        url: prefer(&detail.url, &summary.url).unwrap_or_default(),
        source,
        job_id: prefer(&detail.id, &summary.id),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn salary(min: Option<f64>, max: Option<f64>, currency: &str) -> SalaryInfo {
        SalaryInfo {
            min,
            max,
            currency: Some(currency.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_format_salary_range_inr() {
        let s = salary(Some(500_000.0), Some(800_000.0), "INR");
        assert_eq!(format_salary(&s).as_deref(), Some("5.00 LPA - 8.00 LPA"));
    }

    #[test]
    fn test_format_salary_single_bound_and_foreign_currency() {
        assert_eq!(
            format_salary(&salary(Some(1_250_000.0), None, "INR")).as_deref(),
            Some("12.50 LPA")
        );
        assert_eq!(
            format_salary(&salary(None, Some(90_000.0), "usd")).as_deref(),
            Some("0.90 USD")
        );
        assert_eq!(format_salary(&SalaryInfo::default()), None);
    }

    #[test]
    fn test_format_salary_flags_win_over_bounds() {
        let mut s = salary(Some(500_000.0), Some(800_000.0), "INR");
        s.hidden = true;
        assert_eq!(format_salary(&s).as_deref(), Some(SALARY_NOT_DISCLOSED));
        s.best_in_industry = true;
        assert_eq!(format_salary(&s).as_deref(), Some(BEST_IN_INDUSTRY));
    }

    #[test]
    fn test_format_salary_text_fallback() {
        let s = SalaryInfo {
            text: Some("  3 - 6 Lakhs ".into()),
            ..Default::default()
        };
        assert_eq!(format_salary(&s).as_deref(), Some("3 - 6 Lakhs"));
    }

    #[test]
    fn test_format_experience() {
        assert_eq!(format_experience(Some(2.0), Some(5.0), None).as_deref(), Some("2 - 5 Yrs"));
        assert_eq!(format_experience(None, Some(3.0), Some("x")).as_deref(), Some("? - 3 Yrs"));
        assert_eq!(format_experience(Some(1.5), None, None).as_deref(), Some("1.5 - ? Yrs"));
        assert_eq!(
            format_experience(None, None, Some("3 to 6 yrs")).as_deref(),
            Some("3 to 6 yrs")
        );
        assert_eq!(format_experience(None, None, None), None);
    }

    #[test]
    fn test_parse_skills_filters_blank_and_overlong() {
        let input = "Java, , X, ThisIsAWayTooLongSkillNameExceedingEightyCharactersXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXX";
        assert_eq!(parse_skills(input), Some(vec!["Java".to_string(), "X".to_string()]));
        assert_eq!(parse_skills(" , ,"), None);
    }

    #[test]
    fn test_clean_text_strips_hidden_elements() {
        let html = "<div>\n  Hello <script>var x = 1;</script><style>p{}</style>\
                    <noscript>enable js</noscript><iframe>frame</iframe>\t <b>world</b>  </div>";
        assert_eq!(clean_text(html), "Hello world");
        assert_eq!(clean_text(html), clean_text(html));
        assert_eq!(clean_text(""), "");
    }

    #[test]
    fn test_normalize_prefers_detail_then_summary() {
        let summary = RawSummaryItem {
            id: Some("42".into()),
            title: Some("Summary title".into()),
            company: Some("Acme".into()),
            experience: Some("2-4 yrs".into()),
            skills: Some("Rust, Tokio".into()),
            salary: salary(Some(500_000.0), Some(800_000.0), "INR"),
            url: Some("https://example.com/job-detail/42".into()),
            ..Default::default()
        };
        let detail = DetailFragment {
            title: Some("Senior Rust Engineer".into()),
            company: Some("   ".into()),
            description_html: Some("<p>Ship   it</p>".into()),
            ..Default::default()
        };

        let rec = normalize(&summary, &detail, SourceTag::Api);
        assert_eq!(rec.title.as_deref(), Some("Senior Rust Engineer"));
        assert_eq!(rec.company.as_deref(), Some("Acme"));
        assert_eq!(rec.experience.as_deref(), Some("2-4 yrs"));
        assert_eq!(rec.skills, Some(vec!["Rust".to_string(), "Tokio".to_string()]));
        assert_eq!(rec.salary.as_deref(), Some("5.00 LPA - 8.00 LPA"));
        assert_eq!(rec.description_text.as_deref(), Some("Ship it"));
        assert_eq!(rec.url, "https://example.com/job-detail/42");
        assert_eq!(rec.job_id.as_deref(), Some("42"));
        assert_eq!(rec.source, SourceTag::Api);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let summary = RawSummaryItem {
            title: Some("Dev".into()),
            experience_min: Some(1.0),
            description_html: Some("<p>a <script>b</script> c</p>".into()),
            url: Some("https://example.com/jobdetail.html?id=1".into()),
            ..Default::default()
        };
        let detail = DetailFragment::default();
        let a = serde_json::to_string(&normalize(&summary, &detail, SourceTag::HtmlFallback)).unwrap();
        let b = serde_json::to_string(&normalize(&summary, &detail, SourceTag::HtmlFallback)).unwrap();
        assert_eq!(a, b);
        assert!(a.contains("\"1 - ? Yrs\""));
        assert!(a.contains("\"a c\""));
    }
}
