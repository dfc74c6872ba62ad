//! Proxy-first fetching with a single direct retry.

use super::http_client::{FetchRequest, ParsedBody, Transport, TransportError};
use std::sync::Arc;
use tracing::warn;

#[derive(Clone)]
pub struct Failover {
    transport: Arc<dyn Transport>,
}

impl Failover {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// At most two physical attempts: proxied, then direct when the proxied
    /// attempt failed with a proxy-related or 5xx error.
    pub async fn attempt(&self, request: &FetchRequest) -> Result<ParsedBody, TransportError> {
        let use_proxy = self.transport.has_proxy();

        match self.transport.fetch(request, use_proxy).await {
            Ok(body) => Ok(body),
            Err(e) if use_proxy && (e.is_proxy_related() || e.is_server_error()) => {
                warn!("Proxied request to {} failed ({}), retrying direct", request.url, e);
                self.transport.fetch(request, false).await
            }
            Err(e) => Err(e),
        }
    }
}
