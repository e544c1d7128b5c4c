// Resource governor: keeps browser-backed scraping from sinking the
// process.
//
// Feed parsing is cheap and never gated. Browser rendering is the expensive
// path: above the hard memory limit it is skipped for the cycle, above the
// soft threshold it gets an extra pre-scrape delay, and every browser use is
// followed by a cooldown so the render service can release page memory
// before the next source starts.

use std::collections::HashSet;
use std::time::Duration;

use tracing::{info, warn};

use newsdesk_common::{MonitoringType, Source};

/// Above this resident size, no new browser-backed scraping this cycle.
const HARD_MEMORY_LIMIT: u64 = 450 * 1024 * 1024;

/// Above this resident size, insert an extra delay before scraping.
const SOFT_MEMORY_LIMIT: u64 = 400 * 1024 * 1024;

/// Pause after every browser-backed extraction.
const BROWSER_COOLDOWN: Duration = Duration::from_secs(2);

/// Extra pause before scraping under soft memory pressure.
const SOFT_PRESSURE_DELAY: Duration = Duration::from_secs(1);

/// Point-in-time resident memory reading.
pub trait MemorySampler: Send + Sync {
    /// Resident set size in bytes, or None when the platform gives no
    /// answer.
    fn resident_bytes(&self) -> Option<u64>;
}

/// Reads VmRSS from /proc/self/status. Non-Linux platforms report None,
/// which disables the memory gate rather than guessing.
pub struct ProcMemorySampler;

impl MemorySampler for ProcMemorySampler {
    fn resident_bytes(&self) -> Option<u64> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
        let kb: u64 = line.split_whitespace().nth(1)?.parse().ok()?;
        Some(kb * 1024)
    }
}

pub struct ResourceGovernor {
    sampler: Box<dyn MemorySampler>,
    /// Hostnames known to wedge or bloat the renderer; never scraped.
    skip_list: HashSet<String>,
}

impl ResourceGovernor {
    pub fn new(sampler: Box<dyn MemorySampler>) -> Self {
        Self {
            sampler,
            skip_list: HashSet::new(),
        }
    }

    pub fn with_skip_list(mut self, hosts: impl IntoIterator<Item = String>) -> Self {
        self.skip_list = hosts.into_iter().map(|h| h.to_lowercase()).collect();
        self
    }

    /// Gate for browser-backed scraping. Feed sources always pass; their
    /// work is lightweight regardless of memory pressure.
    pub fn should_attempt_scraping(&self, source: &Source) -> bool {
        if source.monitoring == MonitoringType::Rss {
            return true;
        }

        if let Some(host) = host_of(&source.url) {
            if self.skip_list.contains(&host) {
                info!(source = source.name.as_str(), host = host.as_str(), "Source is skip-listed");
                return false;
            }
        }

        match self.sampler.resident_bytes() {
            Some(resident) if resident > HARD_MEMORY_LIMIT => {
                warn!(
                    source = source.name.as_str(),
                    resident_mb = resident / (1024 * 1024),
                    limit_mb = HARD_MEMORY_LIMIT / (1024 * 1024),
                    "Memory over hard limit, skipping scrape this cycle"
                );
                false
            }
            _ => true,
        }
    }

    /// Extra delay owed before a scrape under soft pressure, if any.
    pub fn pre_scrape_delay(&self) -> Option<Duration> {
        match self.sampler.resident_bytes() {
            Some(resident) if resident > SOFT_MEMORY_LIMIT => Some(SOFT_PRESSURE_DELAY),
            _ => None,
        }
    }

    /// Cooldown after browser-backed extraction. The render service frees
    /// page memory out-of-process; this pause gives it room before the next
    /// source starts.
    pub async fn after_browser_use(&self) {
        tokio::time::sleep(BROWSER_COOLDOWN).await;
    }
}

fn host_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    struct FixedSampler(Option<u64>);

    impl MemorySampler for FixedSampler {
        fn resident_bytes(&self) -> Option<u64> {
            self.0
        }
    }

    fn source(monitoring: MonitoringType, url: &str) -> Source {
        Source {
            id: Uuid::new_v4(),
            url: url.to_string(),
            name: "Test Source".to_string(),
            category: "news".to_string(),
            monitoring,
            paused: false,
            last_checked_at: Some(Utc::now()),
        }
    }

    #[test]
    fn over_limit_blocks_scraping_but_never_rss() {
        let governor = ResourceGovernor::new(Box::new(FixedSampler(Some(500 * 1024 * 1024))));
        let scraping = source(MonitoringType::Scraping, "https://heavy.example/news");
        let rss = source(MonitoringType::Rss, "https://light.example/feed.xml");

        assert!(!governor.should_attempt_scraping(&scraping));
        assert!(governor.should_attempt_scraping(&rss));
    }

    #[test]
    fn under_limit_allows_scraping() {
        let governor = ResourceGovernor::new(Box::new(FixedSampler(Some(100 * 1024 * 1024))));
        let scraping = source(MonitoringType::Scraping, "https://ok.example/news");
        assert!(governor.should_attempt_scraping(&scraping));
    }

    #[test]
    fn soft_pressure_adds_delay() {
        let governor = ResourceGovernor::new(Box::new(FixedSampler(Some(420 * 1024 * 1024))));
        assert!(governor.pre_scrape_delay().is_some());

        let governor = ResourceGovernor::new(Box::new(FixedSampler(Some(100 * 1024 * 1024))));
        assert!(governor.pre_scrape_delay().is_none());
    }

    #[test]
    fn skip_listed_hosts_never_scraped() {
        let governor = ResourceGovernor::new(Box::new(FixedSampler(Some(1))))
            .with_skip_list(["pathological.example".to_string()]);
        let source = source(MonitoringType::Adk, "https://pathological.example/page");
        assert!(!governor.should_attempt_scraping(&source));
    }

    #[test]
    fn unknown_memory_does_not_gate() {
        let governor = ResourceGovernor::new(Box::new(FixedSampler(None)));
        let scraping = source(MonitoringType::Scraping, "https://ok.example/news");
        assert!(governor.should_attempt_scraping(&scraping));
    }
}
