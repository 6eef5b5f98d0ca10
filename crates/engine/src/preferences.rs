use std::sync::Arc;

use serde_json::Value;
use siteblock_core::language::validate_language;
use siteblock_core::{Language, Outcome, StorageKey};
use siteblock_storage::HostStore;

use crate::error::EngineError;
use crate::notifier::ChangeNotifier;
use crate::sync::SyncHook;

/// Stored UI language. Unknown or missing tags read as the default.
#[derive(Clone)]
pub struct LanguagePreference {
    store: Arc<dyn HostStore>,
    key: StorageKey,
    default: Language,
}

impl LanguagePreference {
    pub fn new(store: Arc<dyn HostStore>, default: Language) -> Self {
        Self {
            store,
            key: StorageKey::language(),
            default,
        }
    }

    pub fn key(&self) -> &StorageKey {
        &self.key
    }

    pub fn try_get(&self) -> Result<Language, EngineError> {
        let raw = self.store.get(self.key.as_str())?;
        Ok(validate_language(raw.as_ref(), self.default))
    }

    pub fn get(&self) -> Language {
        Outcome::from(self.try_get()).unwrap_or(self.default)
    }

    pub fn set(&self, language: Language) -> Result<bool, EngineError> {
        self.store.set(self.key.as_str(), language.to_value())?;
        tracing::debug!(%language, "set language preference");
        Ok(true)
    }

    pub fn notifier(&self) -> ChangeNotifier<Language> {
        let default = self.default;
        ChangeNotifier::new(Arc::clone(&self.store), self.key.clone(), move |raw: Option<&Value>| {
            validate_language(raw, default)
        })
    }

    pub fn hook(&self, notifier: ChangeNotifier<Language>) -> SyncHook<Language> {
        let preference = self.clone();
        SyncHook::new(notifier, self.default, move || preference.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use siteblock_storage::MemoryStore;

    #[test]
    fn set_and_get() {
        let store = Arc::new(MemoryStore::new());
        let pref = LanguagePreference::new(store.clone(), Language::English);
        assert_eq!(pref.get(), Language::English);
        pref.set(Language::Portuguese).unwrap();
        assert_eq!(pref.get(), Language::Portuguese);
        assert_eq!(store.get("i18n-v1").unwrap(), Some(json!("pt-BR")));
    }

    #[test]
    fn garbage_reads_as_default() {
        let store = Arc::new(MemoryStore::new());
        store.set("i18n-v1", json!("klingon")).unwrap();
        let pref = LanguagePreference::new(store, Language::Portuguese);
        assert_eq!(pref.get(), Language::Portuguese);
    }

    #[test]
    fn hook_sees_changes_from_another_handle() {
        let store = Arc::new(MemoryStore::new());
        let popup = LanguagePreference::new(store.clone(), Language::English);
        let options = LanguagePreference::new(store, Language::English);
        let mut hook = popup.hook(popup.notifier());
        hook.activate();
        options.set(Language::Portuguese).unwrap();
        assert_eq!(hook.current(), Language::Portuguese);
    }
}
