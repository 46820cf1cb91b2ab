//! Concurrent per-source fetching
//!
//! Every remote source is fetched at once; results are collected back into
//! input order, so the merged list does not depend on which feed answered
//! first. A failed or timed-out source contributes nothing.

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::{SourceFetcher, fetch_with_timeout};
use crate::classify::{self, PayloadKind};
use crate::clash::Bridge;
use crate::link::{self, b64};
use crate::model::Source;
use crate::observability::Metrics;

#[derive(Clone)]
pub struct Orchestrator {
    fetcher: Arc<dyn SourceFetcher>,
    body_timeout: Duration,
    metrics: Arc<Metrics>,
}

impl Orchestrator {
    pub fn new(
        fetcher: Arc<dyn SourceFetcher>,
        body_timeout: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { fetcher, body_timeout, metrics }
    }

    pub fn fetcher(&self) -> &dyn SourceFetcher {
        self.fetcher.as_ref()
    }

    /// One link list per source, positionally aligned with `sources`.
    pub async fn fetch_all(
        &self,
        sources: &[&Source],
        user_agent: &str,
        prepend_source_name: bool,
    ) -> Vec<Vec<String>> {
        let fetches = sources
            .iter()
            .map(|source| self.fetch_source(source, user_agent, prepend_source_name));
        join_all(fetches).await
    }

    /// Fetch and expand a single source. Errors are logged, never raised.
    pub async fn fetch_source(
        &self,
        source: &Source,
        user_agent: &str,
        prepend_source_name: bool,
    ) -> Vec<String> {
        let fetched =
            fetch_with_timeout(self.fetcher(), &source.url, user_agent, self.body_timeout).await;
        let body = match fetched {
            Ok(body) => body,
            Err(e) => {
                warn!(source = %source.label(), error = %e, "source fetch failed");
                self.metrics.source_failed();
                return Vec::new();
            }
        };

        let links = self.links_from_body(&body, user_agent).await;
        debug!(source = %source.label(), count = links.len(), "source expanded");

        if prepend_source_name && !source.name.is_empty() {
            links.iter().map(|l| link::prepend_name(l, &source.name)).collect()
        } else {
            links
        }
    }

    /// Classify a feed body and extract its links.
    pub async fn links_from_body(&self, body: &str, user_agent: &str) -> Vec<String> {
        if classify::classify(body) == PayloadKind::Structured {
            let bridge = Bridge::new(self.fetcher(), self.body_timeout);
            match bridge.expand(body, user_agent).await {
                Ok(links) => return links,
                Err(e) => warn!(error = %e, "structured feed unreadable, treating as link list"),
            }
        }

        let text = if classify::looks_like_base64(body) || classify::is_base64_blob(body) {
            b64::decode_text(body).unwrap_or_else(|| body.to_string())
        } else {
            body.to_string()
        };

        let mut dropped = 0u64;
        let links: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|line| link::has_known_scheme(line))
            .filter(|line| {
                let keep = has_clean_fragment(line);
                if !keep {
                    dropped += 1;
                }
                keep
            })
            .map(str::to_string)
            .collect();

        if dropped > 0 {
            debug!(dropped, "links with corrupted names dropped");
            self.metrics.links_dropped(dropped);
        }
        links
    }
}

/// False when the display name embeds a URL or is not valid percent-encoded
/// UTF-8. Links without a fragment pass.
fn has_clean_fragment(line: &str) -> bool {
    if !line.contains('#') {
        return true;
    }
    match link::fragment_name(line) {
        Some(name) => !name.contains("https://"),
        None => false,
    }
}
