//! Per-item detail fetches. Failures degrade to an empty fragment.

use super::TimesJobsSite;
use super::failover::Failover;
use super::http_client::FetchRequest;
use super::parsers::{FieldExtractor, default_extractors, extract_detail, parse_api_detail};
use crate::models::{DetailFragment, RawSummaryItem};
use futures::future::join_all;
use tracing::debug;

pub struct DetailEnricher {
    failover: Failover,
    site: TimesJobsSite,
    extractors: Vec<Box<dyn FieldExtractor>>,
}

impl DetailEnricher {
    pub fn new(failover: Failover, site: TimesJobsSite) -> Self {
        Self {
            failover,
            site,
            extractors: default_extractors(),
        }
    }

    pub async fn enrich(&self, item: &RawSummaryItem) -> DetailFragment {
        if let Some(id) = item.id.as_deref() {
            match self.from_api(id).await {
                Ok(fragment) if !fragment.is_empty() => return fragment,
                Ok(_) => debug!("Detail API returned no fields for job {}", id),
                Err(e) => debug!("Detail API failed for job {}: {:#}", id, e),
            }
        }

        if let Some(url) = item.url.as_deref() {
            match self.from_page(url).await {
                Ok(Some(fragment)) => return fragment,
                Ok(None) => debug!("No job fields found on {}", url),
                Err(e) => debug!("Detail page failed for {}: {:#}", url, e),
            }
        }

        DetailFragment::default()
    }

    /// Enrich a whole batch concurrently. Output order matches `items`.
    pub async fn enrich_batch(&self, items: &[RawSummaryItem]) -> Vec<DetailFragment> {
        join_all(items.iter().map(|item| self.enrich(item))).await
    }

    async fn from_api(&self, id: &str) -> anyhow::Result<DetailFragment> {
        let body = self.failover.attempt(&self.site.detail_request(id)).await?;
        parse_api_detail(&body, &self.site)
    }

    async fn from_page(&self, url: &str) -> anyhow::Result<Option<DetailFragment>> {
        let html = self.failover.attempt(&FetchRequest::get(url)).await?.into_text();

        Ok(extract_detail(&html, &self.extractors).map(|(source, mut fragment)| {
            debug!("{}: fields from {} extractor", url, source);
            fragment.url.get_or_insert_with(|| url.to_string());
            fragment
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScraperConfig;
    use crate::scraper::http_client::{ParsedBody, TransportError};
    use crate::scraper::testing::ScriptedTransport;
    use serde_json::json;
    use std::sync::Arc;

    fn enricher(transport: &Arc<ScriptedTransport>) -> DetailEnricher {
        DetailEnricher::new(
            Failover::new(transport.clone()),
            TimesJobsSite::new(&ScraperConfig::default()),
        )
    }

    const DETAIL_PAGE: &str = r#"<html><head><script type="application/ld+json">
        {"@type": "JobPosting", "title": "From Page", "hiringOrganization": "Umbrella"}
        </script></head></html>"#;

    #[tokio::test]
    async fn test_api_detail_preferred() {
        let t = Arc::new(ScriptedTransport::new(|req, _| {
            assert!(req.url.contains("/7"), "{}", req.url);
            Ok(ParsedBody::Json(json!({"data": {"title": "From API"}})))
        }));

        let item = RawSummaryItem {
            id: Some("7".into()),
            url: Some("https://www.timesjobs.com/job-detail/7".into()),
            ..Default::default()
        };
        let fragment = enricher(&t).enrich(&item).await;
        assert_eq!(fragment.title.as_deref(), Some("From API"));
        assert_eq!(t.calls(), 1);
    }

    #[tokio::test]
    async fn test_api_failure_falls_through_to_page() {
        let t = Arc::new(ScriptedTransport::new(|req, _| {
            if req.url.contains("job-detail/page") {
                Ok(ParsedBody::Text(DETAIL_PAGE.into()))
            } else {
                Err(TransportError::with_status(404, "no such job"))
            }
        }));

        let item = RawSummaryItem {
            id: Some("8".into()),
            url: Some("https://www.timesjobs.com/job-detail/page".into()),
            ..Default::default()
        };
        let fragment = enricher(&t).enrich(&item).await;
        assert_eq!(fragment.title.as_deref(), Some("From Page"));
        assert_eq!(fragment.company.as_deref(), Some("Umbrella"));
        assert_eq!(fragment.url.as_deref(), Some("https://www.timesjobs.com/job-detail/page"));
        assert_eq!(t.calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_api_detail_falls_through_to_page() {
        let t = Arc::new(ScriptedTransport::new(|req, _| {
            if req.url.contains("/api/") {
                Ok(ParsedBody::Json(json!({"status": "ok"})))
            } else {
                Ok(ParsedBody::Text(DETAIL_PAGE.into()))
            }
        }));

        let item = RawSummaryItem {
            id: Some("10".into()),
            url: Some("https://www.timesjobs.com/job-detail/10".into()),
            ..Default::default()
        };
        let fragment = enricher(&t).enrich(&item).await;
        assert_eq!(fragment.title.as_deref(), Some("From Page"));
        assert_eq!(t.calls(), 2);
        assert_eq!(t.requests()[1].url, "https://www.timesjobs.com/job-detail/10");
    }

    #[tokio::test]
    async fn test_everything_failing_yields_empty_fragment() {
        let t = Arc::new(ScriptedTransport::new(|_, _| Err(TransportError::new("connection refused"))));
        let e = enricher(&t);

        let item = RawSummaryItem {
            id: Some("9".into()),
            url: Some("https://www.timesjobs.com/job-detail/9".into()),
            ..Default::default()
        };
        assert!(e.enrich(&item).await.is_empty());

        let bare = RawSummaryItem {
            title: Some("No id, no url".into()),
            ..Default::default()
        };
        assert!(e.enrich(&bare).await.is_empty());
        assert_eq!(t.calls(), 2);
    }

    #[tokio::test]
    async fn test_batch_preserves_order() {
        let t = Arc::new(ScriptedTransport::new(|req, _| {
            let id = req.url.rsplit('/').next().unwrap_or_default().to_string();
            Ok(ParsedBody::Json(json!({"title": format!("job {}", id)})))
        }));

        let items: Vec<RawSummaryItem> = (1..=4)
            .map(|i| RawSummaryItem {
                id: Some(i.to_string()),
                ..Default::default()
            })
            .collect();
        let titles: Vec<Option<String>> = enricher(&t)
            .enrich_batch(&items)
            .await
            .into_iter()
            .map(|f| f.title)
            .collect();

        assert_eq!(
            titles,
            vec![
                Some("job 1".into()),
                Some("job 2".into()),
                Some("job 3".into()),
                Some("job 4".into())
            ]
        );
    }
}
