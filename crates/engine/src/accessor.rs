use std::sync::Arc;

use serde_json::Value;
use siteblock_core::website::{dedup, validate_collection};
use siteblock_core::{ActivePage, BlockedWebsite, Outcome, StorageKey};
use siteblock_storage::{HostStore, StorageError};

use crate::error::EngineError;
use crate::notifier::ChangeNotifier;
use crate::sync::SyncHook;

/// Typed access to the blocked-websites collection.
///
/// Every mutation is read, transform, write. There is no locking between
/// contexts; concurrent writers resolve as last write wins and the change
/// stream brings everyone to the final state.
#[derive(Clone)]
pub struct BlockedWebsites {
    store: Arc<dyn HostStore>,
    key: StorageKey,
}

impl BlockedWebsites {
    pub fn new(store: Arc<dyn HostStore>) -> Self {
        Self::with_key(store, StorageKey::blocked_websites())
    }

    pub fn with_key(store: Arc<dyn HostStore>, key: StorageKey) -> Self {
        Self { store, key }
    }

    pub fn key(&self) -> &StorageKey {
        &self.key
    }

    /// Best-effort parse of a raw stored value. Anything that is not a
    /// sequence reads as empty.
    pub fn parse(raw: Option<&Value>) -> Vec<BlockedWebsite> {
        raw.and_then(validate_collection).map(dedup).unwrap_or_default()
    }

    pub fn get_all(&self) -> Result<Vec<BlockedWebsite>, EngineError> {
        let raw = self.store.get(self.key.as_str())?;
        let websites = Self::parse(raw.as_ref());
        tracing::debug!(key = %self.key, count = websites.len(), "read blocked websites");
        Ok(websites)
    }

    /// Add records, keeping the existing record when a domain repeats.
    pub fn append(&self, websites: Vec<BlockedWebsite>) -> Result<bool, EngineError> {
        let mut all = self.get_all()?;
        all.extend(websites);
        self.write(&normalize(all))?;
        Ok(true)
    }

    /// Overwrite the collection. If the write fails the previous collection
    /// is written back; if that fails too the result is
    /// [`EngineError::Rollback`].
    pub fn replace_all(&self, websites: Vec<BlockedWebsite>) -> Result<bool, EngineError> {
        let snapshot = self.get_all()?;
        let replacement = normalize(websites);
        let Err(original) = self.write(&replacement) else {
            return Ok(true);
        };

        tracing::warn!(key = %self.key, error = %original, "replace failed; restoring previous collection");
        match self.write(&snapshot) {
            Ok(()) => Err(EngineError::Storage(original)),
            Err(recovery) => {
                tracing::error!(
                    key = %self.key,
                    original = %original,
                    recovery = %recovery,
                    "could not restore previous collection"
                );
                Err(EngineError::Rollback { original, recovery })
            }
        }
    }

    /// Replace records whose domain matches one of `updates`. Updates for
    /// domains not already stored are ignored.
    pub fn merge_by_key(&self, updates: Vec<BlockedWebsite>) -> Result<bool, EngineError> {
        let updates = normalize(updates);
        let merged = self
            .get_all()?
            .into_iter()
            .map(|current| {
                updates
                    .iter()
                    .find(|u| u.domain == current.domain)
                    .cloned()
                    .unwrap_or(current)
            })
            .collect();
        self.replace_all(merged)
    }

    pub fn upsert(&self, website: BlockedWebsite) -> Result<bool, EngineError> {
        let domain = website.domain.trim().to_string();
        if self.find(&domain)?.is_some() {
            self.merge_by_key(vec![website])
        } else {
            self.append(vec![website])
        }
    }

    /// Removing a domain that is not stored still rewrites the collection
    /// and reports success.
    pub fn remove(&self, domain: &str) -> Result<bool, EngineError> {
        let domain = domain.trim();
        let remaining = self
            .get_all()?
            .into_iter()
            .filter(|w| w.domain != domain)
            .collect();
        self.replace_all(remaining)
    }

    pub fn find(&self, domain: &str) -> Result<Option<BlockedWebsite>, EngineError> {
        let domain = domain.trim();
        Ok(self.get_all()?.into_iter().find(|w| w.domain == domain))
    }

    /// Flip `blocked` on a stored record. `Ok(false)` if the domain is absent.
    pub fn toggle(&self, domain: &str) -> Result<bool, EngineError> {
        match self.find(domain)? {
            Some(website) => {
                let blocked = !website.blocked;
                self.merge_by_key(vec![website.with_blocked(blocked)])
            }
            None => {
                tracing::debug!(domain, "toggle on unknown domain");
                Ok(false)
            }
        }
    }

    /// Block `domain`, creating a record titled after the domain if needed.
    pub fn add_domain(&self, domain: &str) -> Result<bool, EngineError> {
        let website = match self.find(domain)? {
            Some(existing) => existing.with_blocked(true),
            None => BlockedWebsite::new(domain.trim(), domain.trim()).with_blocked(true),
        };
        self.upsert(website)
    }

    /// Block the page the host reports as open. An invalid page is logged and
    /// reported as `Ok(false)`.
    pub fn add_active_page(&self, page: &ActivePage) -> Result<bool, EngineError> {
        match page.to_record() {
            Ok(website) => self.upsert(website),
            Err(e) => {
                tracing::warn!(error = %e, "ignoring invalid active page");
                Ok(false)
            }
        }
    }

    /// Insert the active page as blocked, or toggle it when already stored.
    pub fn toggle_active_page(&self, page: &ActivePage) -> Result<bool, EngineError> {
        let website = match page.to_record() {
            Ok(website) => website,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring invalid active page");
                return Ok(false);
            }
        };
        if self.find(&website.domain)?.is_some() {
            self.toggle(&website.domain)
        } else {
            self.append(vec![website])
        }
    }

    /// Delete the whole collection from the store.
    pub fn clear(&self) -> Result<bool, EngineError> {
        self.store.remove(self.key.as_str())?;
        Ok(true)
    }

    pub fn notifier(&self) -> ChangeNotifier<Vec<BlockedWebsite>> {
        ChangeNotifier::new(Arc::clone(&self.store), self.key.clone(), Self::parse)
    }

    /// A hook over `notifier` that seeds with [`Self::get_all`], degrading a
    /// failed read to an empty collection.
    pub fn hook(&self, notifier: ChangeNotifier<Vec<BlockedWebsite>>) -> SyncHook<Vec<BlockedWebsite>> {
        let accessor = self.clone();
        SyncHook::new(notifier, Vec::new(), move || {
            Outcome::from(accessor.get_all()).unwrap_or(Vec::new())
        })
    }

    fn write(&self, websites: &[BlockedWebsite]) -> Result<(), StorageError> {
        let value = Value::Array(websites.iter().map(BlockedWebsite::to_value).collect());
        tracing::debug!(key = %self.key, count = websites.len(), "writing blocked websites");
        self.store.set(self.key.as_str(), value)
    }
}

/// Re-run the record validators over typed input and drop repeated domains.
fn normalize(websites: Vec<BlockedWebsite>) -> Vec<BlockedWebsite> {
    let raw = Value::Array(websites.iter().map(BlockedWebsite::to_value).collect());
    validate_collection(&raw).map(dedup).unwrap_or_default()
}

impl std::fmt::Debug for BlockedWebsites {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockedWebsites").field("key", &self.key).finish()
    }
}
