pub mod accessor;
pub mod enabled;
pub mod error;
pub mod notifier;
pub mod preferences;
pub mod sync;
pub mod verdict;

pub use accessor::BlockedWebsites;
pub use enabled::EnabledFlag;
pub use error::EngineError;
pub use notifier::{ChangeNotifier, Subscription};
pub use preferences::LanguagePreference;
pub use sync::{HookPhase, SyncHook};
pub use verdict::should_block;

use std::sync::Arc;

use siteblock_core::{BlockedWebsite, ContextId, Language, SyncConfig};
use siteblock_storage::HostStore;

/// Everything one execution context needs: accessors over the shared store
/// and one change notifier per stored key.
///
/// Hooks created from the same `Blocker` share that notifier, so a context
/// holds at most one native listener per key.
pub struct Blocker {
    context: ContextId,
    websites: BlockedWebsites,
    enabled: EnabledFlag,
    language: LanguagePreference,
    website_changes: ChangeNotifier<Vec<BlockedWebsite>>,
    enabled_changes: ChangeNotifier<bool>,
    language_changes: ChangeNotifier<Language>,
}

impl Blocker {
    pub fn new(store: Arc<dyn HostStore>, config: &SyncConfig) -> Self {
        let websites = BlockedWebsites::new(Arc::clone(&store));
        let enabled = EnabledFlag::new(Arc::clone(&store), config.enabled_default);
        let language = LanguagePreference::new(store, config.default_language);
        let context = ContextId::new();
        tracing::debug!(%context, "created blocker context");
        Self {
            context,
            website_changes: websites.notifier(),
            enabled_changes: enabled.notifier(),
            language_changes: language.notifier(),
            websites,
            enabled,
            language,
        }
    }

    pub fn context_id(&self) -> ContextId {
        self.context
    }

    pub fn websites(&self) -> &BlockedWebsites {
        &self.websites
    }

    pub fn enabled(&self) -> &EnabledFlag {
        &self.enabled
    }

    pub fn language(&self) -> &LanguagePreference {
        &self.language
    }

    /// Call `callback` with the validated collection after every change.
    pub fn subscribe(
        &self,
        callback: impl Fn(&Vec<BlockedWebsite>) + Send + Sync + 'static,
    ) -> Subscription {
        self.website_changes.subscribe(callback)
    }

    pub fn website_hook(&self) -> SyncHook<Vec<BlockedWebsite>> {
        self.websites.hook(self.website_changes.clone())
    }

    pub fn enabled_hook(&self) -> SyncHook<bool> {
        self.enabled.hook(self.enabled_changes.clone())
    }

    pub fn language_hook(&self) -> SyncHook<Language> {
        self.language.hook(self.language_changes.clone())
    }

    /// Fresh verdict for `hostname`. The enabled flag degrades to its
    /// default on a read error; the collection read does not.
    pub fn is_blocked(&self, hostname: &str) -> Result<bool, EngineError> {
        let websites = self.websites.get_all()?;
        Ok(should_block(&websites, self.enabled.get(), hostname))
    }
}
