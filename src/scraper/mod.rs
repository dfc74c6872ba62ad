pub mod cleaner;
pub mod enricher;
pub mod failover;
pub mod http_client;
pub mod parsers;

use crate::config::ScraperConfig;
use crate::models::SearchCriteria;
use serde_json::{Map, Value, json};

pub use self::enricher::DetailEnricher;
pub use self::failover::Failover;
pub use self::http_client::{FetchRequest, HttpClient, Transport};

// ── TimesJobs endpoints ───────────────────────────────────────────────────────

/// URL conventions of the target site.
#[derive(Debug, Clone)]
pub struct TimesJobsSite {
    base_url: String,
    search_api_url: String,
    detail_api_url: String,
    detail_link_markers: Vec<String>,
}

impl TimesJobsSite {
    pub fn new(config: &ScraperConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            search_api_url: config.search_api_url.clone(),
            detail_api_url: config.detail_api_url.clone(),
            detail_link_markers: config.detail_link_markers.clone(),
        }
    }

    /// POST body for one page of the search API.
    pub fn search_request(&self, criteria: &SearchCriteria, page: u32, page_size: usize) -> FetchRequest {
        let mut payload = Map::new();
        let mut put = |key: &str, value: Value| {
            payload.insert(key.to_string(), value);
        };

        if let Some(kw) = &criteria.keyword {
            put("keyword", json!(kw));
        }
        if let Some(loc) = &criteria.location {
            put("location", json!(loc));
        }
        if let Some(min) = criteria.experience_min {
            put("experienceFrom", json!(min));
        }
        if let Some(max) = criteria.experience_max {
            put("experienceTo", json!(max));
        }
        if let Some(area) = &criteria.function_area {
            put("functionAreaId", json!(area));
        }
        put("pageNumber", json!(page));
        put("pageSize", json!(page_size));

        FetchRequest::post_json(self.search_api_url.clone(), Value::Object(payload))
    }

    /// e.g. `…/job-detail/{id}` → `…/job-detail/12345`
    pub fn detail_request(&self, id: &str) -> FetchRequest {
        let encoded = url::form_urlencoded::byte_serialize(id.as_bytes()).collect::<String>();
        FetchRequest::get(self.detail_api_url.replace("{id}", &encoded))
    }

    /// Public job page for an API id, used when the API omits the URL.
    pub fn job_url(&self, id: &str) -> String {
        let encoded = url::form_urlencoded::byte_serialize(id.as_bytes()).collect::<String>();
        format!("{}/candidate/job-detail.html?jobid={}", self.base_url, encoded)
    }

    /// Resolve `href` against `page_url` (or the site root).
    pub fn absolute_url(&self, href: &str, page_url: Option<&str>) -> Option<String> {
        let base = page_url.unwrap_or(&self.base_url);
        let base = url::Url::parse(base).ok()?;
        let resolved = base.join(href.trim()).ok()?;
        match resolved.scheme() {
            "http" | "https" => Some(resolved.to_string()),
            _ => None,
        }
    }

    pub fn is_detail_link(&self, url: &str) -> bool {
        let lower = url.to_lowercase();
        self.detail_link_markers
            .iter()
            .any(|m| lower.contains(&m.to_lowercase()))
    }
}

// ── Test support ──────────────────────────────────────────────────────────────

#[cfg(test)]
pub mod testing {
    use super::http_client::{FetchRequest, ParsedBody, Transport, TransportError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    type Responder = Box<dyn Fn(&FetchRequest, bool) -> Result<ParsedBody, TransportError> + Send + Sync>;

    /// In-memory transport answering from a closure and recording every call.
    pub struct ScriptedTransport {
        responder: Responder,
        proxy: bool,
        log: Mutex<Vec<(FetchRequest, bool)>>,
    }

    impl ScriptedTransport {
        pub fn new(
            responder: impl Fn(&FetchRequest, bool) -> Result<ParsedBody, TransportError> + Send + Sync + 'static,
        ) -> Self {
            Self {
                responder: Box::new(responder),
                proxy: false,
                log: Mutex::new(Vec::new()),
            }
        }

        pub fn with_proxy(
            responder: impl Fn(&FetchRequest, bool) -> Result<ParsedBody, TransportError> + Send + Sync + 'static,
        ) -> Self {
            Self { proxy: true, ..Self::new(responder) }
        }

        pub fn requests(&self) -> Vec<FetchRequest> {
            self.log.lock().unwrap().iter().map(|(r, _)| r.clone()).collect()
        }

        pub fn proxy_flags(&self) -> Vec<bool> {
            self.log.lock().unwrap().iter().map(|(_, p)| *p).collect()
        }

        pub fn calls(&self) -> usize {
            self.log.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn fetch(&self, request: &FetchRequest, via_proxy: bool) -> Result<ParsedBody, TransportError> {
            self.log.lock().unwrap().push((request.clone(), via_proxy));
            (self.responder)(request, via_proxy)
        }

        fn has_proxy(&self) -> bool {
            self.proxy
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> TimesJobsSite {
        TimesJobsSite::new(&ScraperConfig::default())
    }

    #[test]
    fn test_search_request_payload() {
        let criteria = SearchCriteria {
            keyword: Some("rust".into()),
            experience_min: Some(2),
            page_budget: 3,
            ..Default::default()
        };
        let req = site().search_request(&criteria, 2, 15);
        let payload = req.payload.unwrap();
        assert_eq!(payload["keyword"], "rust");
        assert_eq!(payload["experienceFrom"], 2);
        assert_eq!(payload["pageNumber"], 2);
        assert_eq!(payload["pageSize"], 15);
        assert!(payload.get("location").is_none());
    }

    #[test]
    fn test_detail_request_encodes_id() {
        let req = site().detail_request("a b/1");
        assert!(req.url.ends_with("a+b%2F1"), "{}", req.url);
    }

    #[test]
    fn test_absolute_url_and_detail_links() {
        let s = site();
        let url = s
            .absolute_url("/job-detail/rust-dev-123", Some("https://www.timesjobs.com/candidate/job-search.html"))
            .unwrap();
        assert_eq!(url, "https://www.timesjobs.com/job-detail/rust-dev-123");
        assert!(s.is_detail_link(&url));
        assert!(!s.is_detail_link("https://www.timesjobs.com/about"));
        assert_eq!(s.absolute_url("javascript:void(0)", None), None);
    }
}
