//! Font readiness detection.
//!
//! Loading a web font is fire-and-forget: the stylesheet is fetched in the
//! background and each face lands in the [`FontRegistry`] whenever its
//! download finishes. There is no single "all fonts loaded" signal, so
//! readiness is judged by watching the registry size settle.
//!
//! ## Stability heuristic
//!
//! The registry is polled every [`PollConfig::interval`]. A counter starts
//! at [`PollConfig::lives`]; a poll that sees the same size as the previous
//! one spends a life, a poll that sees a different size restores them all.
//! Polling stops when no lives remain, i.e. `lives` intervals after the
//! last observed change. This is an approximation: a font that takes longer
//! than that window to arrive is still added to the registry, it just
//! misses this round of publishing.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

use super::registry::FontRegistry;
use super::stylesheet::{extract_stylesheet_url, parse_font_faces};
use crate::error::CardError;

/// Polling parameters for the stability heuristic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollConfig {
    /// Time between two registry size checks
    pub interval: Duration,
    /// Consecutive unchanged checks before loading counts as finished
    pub lives: u32,
}

impl PollConfig {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(500);
    pub const DEFAULT_LIVES: u32 = 5;
    /// Shorter intervals are raised to this
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Self::DEFAULT_INTERVAL,
            lives: Self::DEFAULT_LIVES,
        }
    }
}

/// Source of stylesheets and font files.
#[async_trait]
pub trait FontFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> Result<String, CardError>;
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, CardError>;
}

/// [`FontFetcher`] over HTTP.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, CardError> {
        // No browser user agent: font CDNs then serve TrueType instead of WOFF2
        let client = reqwest::Client::builder()
            .user_agent("namecard/0.1")
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CardError::Http(format!("HTTP client error: {}", e)))?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, CardError> {
        self.client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CardError::Http(format!("Failed to fetch {}: {}", url, e)))
    }
}

#[async_trait]
impl FontFetcher for HttpFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, CardError> {
        self.get(url)
            .await?
            .text()
            .await
            .map_err(|e| CardError::Http(format!("Failed to read {}: {}", url, e)))
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, CardError> {
        self.get(url)
            .await?
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| CardError::Http(format!("Failed to read {}: {}", url, e)))
    }
}

/// Result of a [`FontReadinessDetector::load`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// The stylesheet was requested before; nothing was fetched. Returned
    /// once the first request for it has settled.
    AlreadyRequested { url: String },
    /// Loading settled and `fonts` was published.
    Loaded {
        url: String,
        fonts: Vec<String>,
        polls: u32,
    },
}

#[derive(Default)]
struct Requests {
    /// Every stylesheet URL requested so far
    seen: HashSet<String>,
    /// Requested URLs whose first load has not published yet
    settling: HashSet<String>,
}

/// Loads web fonts from pasted markup and publishes the available families.
pub struct FontReadinessDetector {
    registry: Arc<FontRegistry>,
    fetcher: Arc<dyn FontFetcher>,
    poll: PollConfig,
    requests: Mutex<Requests>,
    available: watch::Sender<Vec<String>>,
}

impl FontReadinessDetector {
    pub fn new(registry: Arc<FontRegistry>, fetcher: Arc<dyn FontFetcher>, poll: PollConfig) -> Self {
        let (available, _) = watch::channel(registry.families());
        Self {
            registry,
            fetcher,
            poll,
            requests: Mutex::new(Requests::default()),
            available,
        }
    }

    pub fn registry(&self) -> &Arc<FontRegistry> {
        &self.registry
    }

    /// Families published by the last settled load.
    pub fn available_fonts(&self) -> Vec<String> {
        self.available.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<String>> {
        self.available.subscribe()
    }

    /// True if `url` has been requested before.
    pub fn was_requested(&self, url: &str) -> bool {
        self.requests().seen.contains(url)
    }

    fn requests(&self) -> std::sync::MutexGuard<'_, Requests> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Load the fonts referenced by `markup` and wait until they settle.
    ///
    /// Fails only when the markup names no stylesheet. Download and parse
    /// failures are logged and leave the published list as it was.
    pub async fn load(&self, markup: &str) -> Result<LoadOutcome, CardError> {
        let url = extract_stylesheet_url(markup)?;

        let repeat = {
            let mut requests = self.requests();
            if requests.seen.insert(url.clone()) {
                requests.settling.insert(url.clone());
                None
            } else {
                // Subscribe under the lock so the settling load's publish is seen
                Some(requests.settling.contains(&url).then(|| self.available.subscribe()))
            }
        };
        if let Some(pending) = repeat {
            println!("[fonts] Stylesheet already requested: {}", url);
            if let Some(mut published) = pending {
                let _ = published.changed().await;
            }
            return Ok(LoadOutcome::AlreadyRequested { url });
        }

        println!("[fonts] Requesting stylesheet {}", url);
        tokio::spawn(fetch_stylesheet(
            self.fetcher.clone(),
            self.registry.clone(),
            url.clone(),
        ));

        let publish = Publish { detector: self, url: &url };
        let registry = self.registry.clone();
        let polls = wait_until_stable(move || registry.len(), self.poll).await;
        drop(publish);

        let fonts = self.available_fonts();
        println!(
            "[fonts] Font set settled after {} polls: {} families",
            polls,
            fonts.len()
        );

        Ok(LoadOutcome::Loaded { url, fonts, polls })
    }
}

/// Publishes the registry's families and ends the settling state of `url`
/// when dropped, including when the load is cancelled mid-poll.
struct Publish<'a> {
    detector: &'a FontReadinessDetector,
    url: &'a str,
}

impl Drop for Publish<'_> {
    fn drop(&mut self) {
        let mut requests = self.detector.requests();
        requests.settling.remove(self.url);
        self.detector.available.send_replace(self.detector.registry.families());
    }
}

/// Poll `probe` until it reports the same value `config.lives` times in a row.
///
/// Returns the number of polls made (not counting the initial reading).
pub async fn wait_until_stable(probe: impl Fn() -> usize, config: PollConfig) -> u32 {
    let mut ticker = tokio::time::interval(config.interval.max(PollConfig::MIN_INTERVAL));
    // The first tick completes immediately
    ticker.tick().await;

    let mut last = probe();
    let mut lives = config.lives;
    let mut polls = 0;

    while lives > 0 {
        ticker.tick().await;
        polls += 1;

        let size = probe();
        if size == last {
            lives -= 1;
        } else {
            last = size;
            lives = config.lives;
        }
    }
    polls
}

/// Fetch a stylesheet and load every face it declares, concurrently.
async fn fetch_stylesheet(fetcher: Arc<dyn FontFetcher>, registry: Arc<FontRegistry>, url: String) {
    let css = match fetcher.fetch_text(&url).await {
        Ok(css) => css,
        Err(e) => {
            eprintln!("[fonts] {}", e);
            return;
        }
    };

    let rules = parse_font_faces(&css, &url);
    if rules.is_empty() {
        eprintln!("[fonts] No loadable @font-face rules in {}", url);
        return;
    }

    let loads = rules.into_iter().map(|rule| {
        let fetcher = fetcher.clone();
        let registry = registry.clone();
        async move {
            let bytes = fetcher.fetch_bytes(&rule.src).await?;
            registry.add_bytes(&rule.family, rule.bold, rule.italic, bytes)?;
            Ok::<_, CardError>(rule.family)
        }
    });

    for result in futures::future::join_all(loads).await {
        match result {
            Ok(family) => println!("[fonts] Loaded {}", family),
            Err(e) => eprintln!("[fonts] {}", e),
        }
    }
}
