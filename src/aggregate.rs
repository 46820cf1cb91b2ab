//! Merging manual entries and remote feeds into one node list

use std::collections::HashSet;
use tracing::debug;

use crate::fetch::Orchestrator;
use crate::humanize::format_bytes;
use crate::link::{self, b64, uri, vmess};
use crate::model::Source;

/// Name prefix for manual links when source-name prefixing is on.
pub const MANUAL_PREFIX: &str = "Manual";

const PLACEHOLDER_BASE: &str = "trojan://00000000-0000-0000-0000-000000000000@127.0.0.1:443";

/// The merged node list plus the synthetic remaining-traffic entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedNodes {
    pub placeholder: String,
    pub nodes: Vec<String>,
}

impl MergedNodes {
    /// Placeholder first, then every node, newline-joined.
    pub fn to_text(&self) -> String {
        std::iter::once(self.placeholder.as_str())
            .chain(self.nodes.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn to_base64(&self) -> String {
        b64::encode(self.to_text())
    }
}

/// Trojan link whose name reports the remaining traffic. Never a real server.
pub fn traffic_placeholder(remaining: u64) -> String {
    let name = format!("Remaining Traffic ≫ {}", format_bytes(remaining));
    format!("{}#{}", PLACEHOLDER_BASE, uri::encode_component(&name))
}

/// Remaining bytes summed over enabled sources with a known total.
pub fn total_remaining(sources: &[&Source]) -> u64 {
    sources
        .iter()
        .filter(|s| s.enabled)
        .filter_map(|s| s.user_info)
        .filter(|info| info.total > 0)
        .map(|info| info.remaining())
        .fold(0u64, u64::saturating_add)
}

/// Links from manual sources, in source order. vmess payloads are normalized
/// so equivalent entries compare equal.
pub fn manual_links(sources: &[&Source], prepend_source_name: bool) -> Vec<String> {
    sources
        .iter()
        .filter(|s| !s.is_remote())
        .flat_map(|s| s.url.lines())
        .map(str::trim)
        .filter(|line| link::has_known_scheme(line))
        .map(|line| {
            let line = if line.starts_with(vmess::SCHEME_PREFIX) {
                vmess::normalize(line).unwrap_or_else(|| line.to_string())
            } else {
                line.to_string()
            };
            if prepend_source_name {
                link::prepend_name(&line, MANUAL_PREFIX)
            } else {
                line
            }
        })
        .collect()
}

/// Trim, drop empties, keep the first occurrence of each link.
pub fn dedup(links: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen = HashSet::new();
    links
        .into_iter()
        .filter_map(|link| {
            let trimmed = link.trim();
            if trimmed.is_empty() || !seen.insert(trimmed.to_string()) {
                return None;
            }
            Some(trimmed.to_string())
        })
        .collect()
}

/// Manual links first, then each remote source in source order, deduplicated.
pub async fn aggregate(
    orchestrator: &Orchestrator,
    sources: &[&Source],
    user_agent: &str,
    prepend_source_name: bool,
) -> MergedNodes {
    let manual = manual_links(sources, prepend_source_name);

    let remote: Vec<&Source> = sources.iter().copied().filter(|s| s.is_remote()).collect();
    let fetched = orchestrator.fetch_all(&remote, user_agent, prepend_source_name).await;

    let total = manual.len() + fetched.iter().map(Vec::len).sum::<usize>();
    let nodes = dedup(manual.into_iter().chain(fetched.into_iter().flatten()));
    debug!(total, unique = nodes.len(), "nodes merged");

    MergedNodes {
        placeholder: traffic_placeholder(total_remaining(sources)),
        nodes,
    }
}
