//! Default request headers for transports built by the engine.
//!
//! When a caller supplies no headers of their own, requests carry a
//! browser-like User-Agent picked at random from a small set of current
//! desktop browsers. Some download mirrors reject unknown clients outright.

use rand::seq::SliceRandom;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};

/// Browser User-Agents used for generated default headers.
pub(crate) const BROWSER_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (X11; Linux x86_64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_7_1) AppleWebKit/605.1.15 (KHTML, like Gecko) \
     Version/18.1 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
];

/// Picks one of [`BROWSER_USER_AGENTS`] at random.
#[must_use]
pub(crate) fn random_browser_user_agent() -> &'static str {
    BROWSER_USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(BROWSER_USER_AGENTS[0])
}

/// Generates the header set used when the caller supplies none.
#[must_use]
pub(crate) fn generate_default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    let agent = HeaderValue::from_static(random_browser_user_agent());
    headers.insert(USER_AGENT, agent);
    headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
    headers
}
