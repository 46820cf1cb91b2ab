//! Traffic probing via the `subscription-userinfo` header

use futures::future::join_all;
use std::time::Duration;
use tracing::{debug, warn};

use super::{SourceFetcher, probe_with_timeout};
use crate::model::{Source, TrafficInfo};

/// Parse `upload=1; download=2; total=3; expire=4`.
///
/// Non-numeric values and unknown keys are ignored. `None` when no known key
/// carried a number.
pub fn parse_userinfo(header: &str) -> Option<TrafficInfo> {
    let mut info = TrafficInfo::default();
    let mut seen = false;

    for part in header.split(';') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        let Ok(number) = value.trim().parse::<u64>() else {
            continue;
        };
        match key.trim() {
            "upload" => info.upload = number,
            "download" => info.download = number,
            "total" => info.total = number,
            "expire" => info.expire = Some(number),
            _ => continue,
        }
        seen = true;
    }

    seen.then_some(info)
}

/// Probe every enabled remote source concurrently and store fresh traffic info
/// in place. Sources without a usable header keep what they had.
///
/// Returns the number of sources updated.
pub async fn probe_all(
    fetcher: &dyn SourceFetcher,
    sources: &mut [Source],
    user_agent: &str,
    timeout: Duration,
) -> usize {
    let probes = sources.iter().map(|source| async move {
        if !source.enabled || !source.is_remote() {
            return None;
        }
        match probe_with_timeout(fetcher, &source.url, user_agent, timeout).await {
            Ok(Some(header)) => parse_userinfo(&header),
            Ok(None) => {
                debug!(source = %source.label(), "no subscription-userinfo header");
                None
            }
            Err(e) => {
                warn!(source = %source.label(), error = %e, "traffic probe failed");
                None
            }
        }
    });
    let results = join_all(probes).await;

    let mut updated = 0;
    for (source, info) in sources.iter_mut().zip(results) {
        if let Some(info) = info {
            source.user_info = Some(info);
            updated += 1;
        }
    }
    updated
}
