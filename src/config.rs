//! Runtime settings for fetching and batch refreshes.

use std::time::Duration;

/// Browser identity sent to the portal. Government portals tend to reject
/// obvious automation user agents.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const ACCEPT: &str = "text/html,application/xhtml+xml";
pub const ACCEPT_LANGUAGE: &str = "pt-BR,pt;q=0.9,en;q=0.8";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_BATCH_DELAY: Duration = Duration::from_millis(3500);
pub const MAX_REDIRECTS: usize = 10;

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub timeout: Duration,
    pub user_agent: String,
    pub accept_language: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: BROWSER_USER_AGENT.to_string(),
            accept_language: ACCEPT_LANGUAGE.to_string(),
        }
    }
}

impl FetchConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Pacing for sequential batch refreshes
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Pause after each fetch before the next one starts
    pub delay: Duration,
    /// Stop after this many items (None = all)
    pub limit: Option<usize>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_BATCH_DELAY,
            limit: None,
        }
    }
}
