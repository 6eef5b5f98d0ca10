use std::sync::Arc;

use siteblock_core::{BlockedWebsite, SyncConfig};
use siteblock_engine::{should_block, Blocker, SyncHook};
use siteblock_storage::HostStore;

/// One execution context (popup, options page, content script) with its
/// hooks already active.
pub struct TestSurface {
    pub blocker: Blocker,
    pub websites: SyncHook<Vec<BlockedWebsite>>,
    pub enabled: SyncHook<bool>,
}

impl TestSurface {
    pub fn new(store: Arc<dyn HostStore>, config: &SyncConfig) -> Self {
        let blocker = Blocker::new(store, config);
        let mut websites = blocker.website_hook();
        let mut enabled = blocker.enabled_hook();
        websites.activate();
        enabled.activate();
        Self { blocker, websites, enabled }
    }

    /// Domains this surface currently renders, in stored order.
    pub fn domains(&self) -> Vec<String> {
        self.websites.with(|ws| ws.iter().map(|w| w.domain.clone()).collect())
    }

    pub fn sees(&self, domain: &str) -> bool {
        self.websites.with(|ws| ws.iter().any(|w| w.domain == domain))
    }

    pub fn record(&self, domain: &str) -> Option<BlockedWebsite> {
        self.websites.with(|ws| ws.iter().find(|w| w.domain == domain).cloned())
    }

    /// Verdict from the hooked state only, as a content script would compute it.
    pub fn would_block(&self, hostname: &str) -> bool {
        let enabled = self.enabled.current();
        self.websites.with(|ws| should_block(ws, enabled, hostname))
    }

    /// Tear down and bring the hooks back, as when a popup is reopened.
    pub fn reopen(&mut self) {
        self.websites.deactivate();
        self.enabled.deactivate();
        self.websites.activate();
        self.enabled.activate();
    }
}
